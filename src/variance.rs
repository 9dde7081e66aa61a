use ndarray::{Array2, ArrayView2, Zip};

/// Standard deviation over the 3x3 neighbourhood of every pixel.
///
/// Borders are extended by copying the edge pixels. Each neighbourhood is
/// scaled by `factor(row, col)` of its centre pixel before the statistics are
/// taken.
pub fn local_variance<F>(band: ArrayView2<f32>, factor: F) -> Array2<f32>
where
    F: Fn(usize, usize) -> f64 + Sync,
{
    let (rows, cols) = band.dim();
    let mut out = Array2::zeros((rows, cols));
    if rows == 0 || cols == 0 {
        return out;
    }

    Zip::indexed(&mut out).par_for_each(|(r, c), v| {
        let scale = factor(r, c);
        // shifted by the centre value, flat neighbourhoods give exactly 0
        let centre = band[[r, c]] as f64 * scale;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        for dr in -1i64..=1 {
            for dc in -1i64..=1 {
                let rr = (r as i64 + dr).clamp(0, rows as i64 - 1) as usize;
                let cc = (c as i64 + dc).clamp(0, cols as i64 - 1) as usize;
                let d = band[[rr, cc]] as f64 * scale - centre;
                sum += d;
                sum_sq += d * d;
            }
        }
        *v = (sum_sq / 9.0 - sum * sum / 81.0).max(0.0).sqrt() as f32;
    });

    out
}

/// Scale factor of a TOA band: AATSR reflectances are in percent and
/// normalised by the sun zenith cosine, other sensors are used as is.
pub fn toa_factor(elevation_geometry: bool, cal2meris: f64, sun_elevation: f64) -> f64 {
    if elevation_geometry {
        let mus = (90.0 - sun_elevation).to_radians().cos();
        0.01 / (cal2meris * mus)
    } else {
        1.0
    }
}
