use ndarray::{Array1, Array2, ArrayView1};
use serde::Deserialize;

use crate::auxdata::N2bCoefficients;

/// Flat column-packed positions of VIS-VIS, VIS-NIR, VIS-SW, NIR-NIR, NIR-SW
/// and SW-SW in the 3x3 broadband error matrix.
pub const BBDR_ERROR_INDICES: [usize; 6] = [0, 1, 2, 4, 7, 8];

/// Missing-value marker used in BBDR products.
pub const NO_DATA_VALUE: f64 = -9999.0;

/// How the square root of a broadband error variance is taken.
///
/// `Raw` may yield NaN for negative variances, `Abs` takes the magnitude first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqrtPolicy {
    Abs,
    #[default]
    Raw,
}

impl SqrtPolicy {
    pub fn sqrt(self, value: f64) -> f64 {
        match self {
            SqrtPolicy::Abs => value.abs().sqrt(),
            SqrtPolicy::Raw => value.sqrt(),
        }
    }
}

/// Per-band error contributions of the SDR retrieval.
#[derive(Debug, Clone)]
pub struct ErrorTerms {
    pub rad: Array1<f64>,
    pub aod: Array1<f64>,
    pub cwv: Array1<f64>,
    pub ozo: Array1<f64>,
    pub coreg: Array1<f64>,
}

impl ErrorTerms {
    pub fn zeros(num_bands: usize) -> Self {
        Self {
            rad: Array1::zeros(num_bands),
            aod: Array1::zeros(num_bands),
            cwv: Array1::zeros(num_bands),
            ozo: Array1::zeros(num_bands),
            coreg: Array1::zeros(num_bands),
        }
    }

    /// SDR error matrix.
    ///
    /// Aerosol, water vapour and ozone errors are shared by all bands and
    /// enter as outer products, radiometric and co-registration errors only
    /// on the diagonal.
    pub fn covariance(&self) -> Array2<f64> {
        let mut cov = outer_product(self.aod.view());
        cov += &outer_product(self.cwv.view());
        cov += &outer_product(self.ozo.view());
        cov.diag_mut()
            .zip_mut_with(&self.rad, |c, r| *c += r * r);
        cov.diag_mut()
            .zip_mut_with(&self.coreg, |c, e| *c += e * e);
        cov
    }
}

/// `v * v^T`
pub fn outer_product(v: ArrayView1<f64>) -> Array2<f64> {
    let column = v.view().insert_axis(ndarray::Axis(1));
    let row = v.view().insert_axis(ndarray::Axis(0));
    column.dot(&row)
}

/// Broadband error matrix `A * sigma_sdr * A^T + diag(rmse^2)`.
pub fn propagate(n2b: &N2bCoefficients, sigma_sdr: &Array2<f64>) -> Array2<f64> {
    let mut sigma = n2b.coef.dot(sigma_sdr).dot(&n2b.coef.t());
    sigma
        .diag_mut()
        .zip_mut_with(&n2b.rmse, |s, r| *s += r * r);
    sigma
}

/// Square roots of the six distinct broadband error entries.
pub fn extract_errors(sigma_bbdr: &Array2<f64>, policy: SqrtPolicy) -> [f64; 6] {
    // transposed iteration walks the matrix column by column
    let packed: Vec<f64> = sigma_bbdr.t().iter().copied().collect();
    BBDR_ERROR_INDICES.map(|i| policy.sqrt(packed[i]))
}

/// Copy of a square matrix with everything off the diagonal set to zero.
pub fn rectangular_diagonal_matrix(m: &Array2<f64>) -> Option<Array2<f64>> {
    if !m.is_square() {
        return None;
    }
    Some(Array2::from_diag(&m.diag()))
}

pub fn rectangular_diagonal_flat(m: &Array2<f64>) -> Option<Array1<f64>> {
    if !m.is_square() {
        return None;
    }
    Some(m.diag().to_owned())
}

/// Neither NaN nor the product fill value.
pub fn is_valid(value: f64) -> bool {
    !value.is_nan() && value != NO_DATA_VALUE
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr1, arr2};

    fn n2b(coef: Array2<f64>, rmse: Array1<f64>) -> N2bCoefficients {
        let n = coef.ncols();
        N2bCoefficients {
            coef,
            intercept: Array1::zeros(3),
            rmse,
            coef_d: Array2::zeros((3, n)),
            intercept_d: Array1::zeros(3),
        }
    }

    #[test]
    fn test_diagonal_helpers() {
        let m = arr2(&[[2.0, 8.0, 7.0], [4.0, 3.0, 9.0], [6.0, 5.0, 12.0]]);
        assert_eq!(
            rectangular_diagonal_matrix(&m).unwrap(),
            arr2(&[[2.0, 0.0, 0.0], [0.0, 3.0, 0.0], [0.0, 0.0, 12.0]])
        );
        assert_eq!(rectangular_diagonal_flat(&m).unwrap(), arr1(&[2.0, 3.0, 12.0]));

        let wide = Array2::<f64>::zeros((2, 3));
        assert!(rectangular_diagonal_matrix(&wide).is_none());
        assert!(rectangular_diagonal_flat(&wide).is_none());
    }

    #[test]
    fn test_fill_values() {
        assert!(is_valid(0.3));
        assert!(!is_valid(f64::NAN));
        assert!(!is_valid(-9999.0));
    }

    #[test]
    fn test_extraction_order() {
        // column-packed position k holds k*k, so the extracted values are the indices
        let mut sigma = Array2::zeros((3, 3));
        for k in 0..9 {
            sigma[[k % 3, k / 3]] = (k * k) as f64;
        }
        let errors = extract_errors(&sigma, SqrtPolicy::Raw);
        assert_eq!(errors, [0.0, 1.0, 2.0, 4.0, 7.0, 8.0]);
    }

    #[test]
    fn test_sqrt_policies() {
        let sigma = arr2(&[[4.0, -9.0, 1.0], [-9.0, 16.0, 0.0], [1.0, 0.0, 25.0]]);

        let raw = extract_errors(&sigma, SqrtPolicy::Raw);
        assert_eq!(raw[0], 2.0);
        assert!(raw[1].is_nan());
        assert_eq!(raw[3], 4.0);

        let abs = extract_errors(&sigma, SqrtPolicy::Abs);
        assert_eq!(abs[1], 3.0);
        assert_eq!(abs[5], 5.0);
    }

    #[test]
    fn test_outer_product_terms() {
        let mut terms = ErrorTerms::zeros(2);
        terms.aod = arr1(&[1.0, 2.0]);
        terms.rad = arr1(&[0.5, 0.0]);
        terms.coreg = arr1(&[0.0, 1.0]);

        let cov = terms.covariance();
        assert_eq!(cov, arr2(&[[1.25, 2.0], [2.0, 5.0]]));
    }

    #[test]
    fn test_propagation_adds_rmse() {
        let coef = arr2(&[[1.0, 0.0], [0.0, 1.0], [0.5, 0.5]]);
        let table = n2b(coef, arr1(&[0.1, 0.2, 0.3]));
        let sigma_sdr = arr2(&[[0.04, 0.01], [0.01, 0.09]]);

        let sigma = propagate(&table, &sigma_sdr);
        assert_abs_diff_eq!(sigma[[0, 0]], 0.05, epsilon = 1e-12);
        assert_abs_diff_eq!(sigma[[1, 1]], 0.13, epsilon = 1e-12);
        assert_abs_diff_eq!(sigma[[0, 1]], 0.01, epsilon = 1e-12);
        assert_abs_diff_eq!(sigma[[2, 2]], 0.0375 + 0.09, epsilon = 1e-12);
        assert_abs_diff_eq!(sigma[[0, 2]], sigma[[2, 0]], epsilon = 1e-15);
    }
}
