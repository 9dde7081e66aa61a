use super::error::LutError;

/// One LUT axis: a strictly increasing sequence of at least two nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalPartition {
    sequence: Vec<f64>,
}

impl IntervalPartition {
    pub fn new(sequence: Vec<f64>) -> Result<Self, LutError> {
        if sequence.len() < 2 {
            return Err(LutError::InvalidDimension(format!(
                "an axis needs at least 2 nodes, got {}",
                sequence.len()
            )));
        }

        for (i, pair) in sequence.windows(2).enumerate() {
            if !(pair[0] < pair[1]) {
                return Err(LutError::InvalidDimension(format!(
                    "nodes must be strictly increasing, node {} ({}) >= node {} ({})",
                    i,
                    pair[0],
                    i + 1,
                    pair[1]
                )));
            }
        }

        Ok(Self { sequence })
    }

    pub fn from_f32(sequence: &[f32]) -> Result<Self, LutError> {
        Self::new(sequence.iter().map(|&v| v as f64).collect())
    }

    pub fn cardinality(&self) -> usize {
        self.sequence.len()
    }

    pub fn min(&self) -> f64 {
        self.sequence[0]
    }

    pub fn max(&self) -> f64 {
        self.sequence[self.sequence.len() - 1]
    }

    pub fn get(&self, i: usize) -> f64 {
        self.sequence[i]
    }

    pub fn sequence(&self) -> &[f64] {
        &self.sequence
    }
}

/// Lower node index and fractional position inside the bracketing interval.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FracIndex {
    pub i: usize,
    pub f: f64,
}

/// Scratch space for one interpolation: N fractional indices and 2^N vertex values.
///
/// Never share a workspace between threads; each worker creates its own.
#[derive(Debug, Clone)]
pub struct LutWorkspace {
    pub frac: Vec<FracIndex>,
    vertices: Vec<f64>,
}

impl LutWorkspace {
    pub fn new(dimension_count: usize) -> Self {
        Self {
            frac: vec![FracIndex::default(); dimension_count],
            vertices: vec![0.0; 1 << dimension_count],
        }
    }
}

/// Multilinear interpolation table over an arbitrary number of axes.
///
/// Values are stored row-major with the last axis varying fastest.
#[derive(Debug, Clone)]
pub struct LookupTable {
    values: Vec<f32>,
    dimensions: Vec<IntervalPartition>,
    strides: Vec<usize>,
    offsets: Vec<usize>,
}

impl LookupTable {
    pub fn new(values: Vec<f32>, dimensions: Vec<IntervalPartition>) -> Result<Self, LutError> {
        if dimensions.is_empty() {
            return Err(LutError::InvalidDimension(
                "a LUT needs at least one axis".to_string(),
            ));
        }

        let expected: usize = dimensions.iter().map(|d| d.cardinality()).product();
        if values.len() != expected {
            return Err(LutError::SizeMismatch {
                expected,
                actual: values.len(),
            });
        }

        let n = dimensions.len();
        let mut strides = vec![0; n];
        let mut stride = 1;
        for i in (0..n).rev() {
            strides[i] = stride;
            stride *= dimensions[i].cardinality();
        }

        // offsets[j] for the 2^n corners of the unit hyper-cube, bit i of j selects axis i
        let mut offsets = vec![0; 1 << n];
        for i in 0..n {
            let k = 1 << i;
            for j in 0..k {
                offsets[k + j] = offsets[j] + strides[i];
            }
        }

        Ok(Self {
            values,
            dimensions,
            strides,
            offsets,
        })
    }

    pub fn from_f32_axes(values: Vec<f32>, axes: &[&[f32]]) -> Result<Self, LutError> {
        let dimensions = axes
            .iter()
            .map(|axis| IntervalPartition::from_f32(axis))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(values, dimensions)
    }

    pub fn dimension_count(&self) -> usize {
        self.dimensions.len()
    }

    pub fn dimension(&self, i: usize) -> &IntervalPartition {
        &self.dimensions[i]
    }

    pub fn dimensions(&self) -> &[IntervalPartition] {
        &self.dimensions
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn workspace(&self) -> LutWorkspace {
        LutWorkspace::new(self.dimensions.len())
    }

    /// Interpolated value at `coordinates`, one per axis.
    ///
    /// # Panics
    /// If the number of coordinates differs from the number of axes.
    pub fn value(&self, coordinates: &[f64]) -> f64 {
        let mut workspace = self.workspace();
        self.value_in(coordinates, &mut workspace)
    }

    /// Same as [`LookupTable::value`] but reuses the caller's scratch space.
    pub fn value_in(&self, coordinates: &[f64], workspace: &mut LutWorkspace) -> f64 {
        assert_eq!(
            coordinates.len(),
            self.dimensions.len(),
            "coordinate count does not match LUT dimension count"
        );

        for (i, &coordinate) in coordinates.iter().enumerate() {
            workspace.frac[i] = Self::compute_frac_index(&self.dimensions[i], coordinate);
        }

        self.value_at(&workspace.frac, &mut workspace.vertices)
    }

    /// Evaluates the table at precomputed fractional indices.
    ///
    /// `vertices` must hold at least `2^N` entries.
    pub fn value_at(&self, frac: &[FracIndex], vertices: &mut [f64]) -> f64 {
        let n = self.dimensions.len();
        assert_eq!(frac.len(), n, "fractional index count does not match LUT");

        let origin: usize = frac
            .iter()
            .zip(&self.strides)
            .map(|(fi, stride)| fi.i * stride)
            .sum();

        for (v, offset) in vertices.iter_mut().zip(&self.offsets) {
            *v = self.values[origin + offset] as f64;
        }

        for i in (0..n).rev() {
            let m = 1 << i;
            let f = frac[i].f;
            for j in 0..m {
                vertices[j] += f * (vertices[m + j] - vertices[j]);
            }
        }

        vertices[0]
    }

    /// Locates `coordinate` on `partition`.
    ///
    /// Coordinates outside the axis are clamped to its ends; the maximum maps to
    /// `(len - 2, 1.0)`.
    pub fn compute_frac_index(partition: &IntervalPartition, coordinate: f64) -> FracIndex {
        let nodes = partition.sequence();
        let mut lo = 0;
        let mut hi = nodes.len() - 1;

        while hi > lo + 1 {
            let m = (lo + hi) >> 1;
            if coordinate < nodes[m] {
                hi = m;
            } else {
                lo = m;
            }
        }

        let f = (coordinate - nodes[lo]) / (nodes[hi] - nodes[lo]);

        FracIndex {
            i: lo,
            f: truncate(f),
        }
    }
}

fn truncate(f: f64) -> f64 {
    if f < 0.0 {
        0.0
    } else if f > 1.0 {
        1.0
    } else {
        f
    }
}
