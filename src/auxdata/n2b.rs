use std::fs;
use std::path::Path;

use ndarray::{Array1, Array2};

use super::error::AuxdataError;

/// Broadband channels: VIS, NIR, SW.
pub const N_SPC: usize = 3;

pub fn rmse_file_name(instrument: &str) -> String {
    format!("N2B_coefs_{}_rmse_v2.txt", instrument)
}

pub fn ddw_dup_file_name(instrument: &str) -> String {
    format!("N2B_coefs_{}_Ddw_Dup.txt", instrument)
}

/// Narrowband to broadband regression coefficients.
///
/// `coef` / `intercept` / `rmse` convert SDR to BBDR, `coef_d` / `intercept_d`
/// convert the per-band diffuse ratios and spherical albedo for kernel weighting.
#[derive(Debug, Clone)]
pub struct N2bCoefficients {
    pub coef: Array2<f64>,
    pub intercept: Array1<f64>,
    pub rmse: Array1<f64>,
    pub coef_d: Array2<f64>,
    pub intercept_d: Array1<f64>,
}

struct Block {
    coef: Array2<f64>,
    intercept: Array1<f64>,
    rmse: Option<Array1<f64>>,
}

impl N2bCoefficients {
    /// Reads both coefficient tables of `instrument` from `dir`.
    pub fn load(dir: &Path, instrument: &str, num_bands: usize) -> Result<Self, AuxdataError> {
        let rmse_path = dir.join(rmse_file_name(instrument));
        let d_path = dir.join(ddw_dup_file_name(instrument));

        let read = |p: &Path| {
            fs::read_to_string(p).map_err(|source| AuxdataError::Io {
                path: p.display().to_string(),
                source,
            })
        };

        let main = parse_blocks(&read(&rmse_path)?, &rmse_path.display().to_string(), num_bands, true)?;
        let diffuse = parse_blocks(&read(&d_path)?, &d_path.display().to_string(), num_bands, false)?;

        Ok(Self {
            coef: main.coef,
            intercept: main.intercept,
            rmse: main.rmse.unwrap_or_else(|| Array1::zeros(N_SPC)),
            coef_d: diffuse.coef,
            intercept_d: diffuse.intercept,
        })
    }

    pub fn num_bands(&self) -> usize {
        self.coef.ncols()
    }
}

/// One block per broadband: a skipped label line, a header of band indices,
/// one coefficient per index, the intercept and optionally the rmse.
fn parse_blocks(
    text: &str,
    path: &str,
    num_bands: usize,
    with_rmse: bool,
) -> Result<Block, AuxdataError> {
    let mut lines = text.lines().enumerate();
    let mut coef = Array2::zeros((N_SPC, num_bands));
    let mut intercept = Array1::zeros(N_SPC);
    let mut rmse = Array1::zeros(N_SPC);

    let err = |line: usize, reason: String| AuxdataError::Coefficients {
        path: path.to_string(),
        line: line + 1,
        reason,
    };

    let mut next_line = |what: &str| {
        lines
            .next()
            .ok_or_else(|| err(text.lines().count(), format!("unexpected end of file, expected {}", what)))
    };

    for spc in 0..N_SPC {
        next_line("block label")?;

        let (header_no, header) = next_line("band index header")?;
        let indices = header
            .split_whitespace()
            .map(|token| {
                token
                    .parse::<usize>()
                    .map_err(|e| err(header_no, format!("invalid band index '{}': {}", token, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        for index in indices {
            if index >= num_bands {
                return Err(err(
                    header_no,
                    format!("band index {} out of range for {} bands", index, num_bands),
                ));
            }
            coef[[spc, index]] = parse_value(next_line("coefficient")?, &err)?;
        }

        intercept[spc] = parse_value(next_line("intercept")?, &err)?;
        if with_rmse {
            rmse[spc] = parse_value(next_line("rmse")?, &err)?;
        }
    }

    Ok(Block {
        coef,
        intercept,
        rmse: with_rmse.then_some(rmse),
    })
}

fn parse_value<F>((line_no, line): (usize, &str), err: &F) -> Result<f64, AuxdataError>
where
    F: Fn(usize, String) -> AuxdataError,
{
    line.trim()
        .parse::<f64>()
        .map_err(|e| err(line_no, format!("invalid number '{}': {}", line.trim(), e)))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::N_SPC;

    /// Coefficient table where broadband `spc` uses every band with weight
    /// `weights[spc][band]`.
    pub fn table(weights: &[Vec<f64>; N_SPC], intercepts: [f64; N_SPC], rmse: Option<[f64; N_SPC]>) -> String {
        let labels = ["VIS", "NIR", "SW"];
        let mut out = String::new();
        for spc in 0..N_SPC {
            out.push_str(labels[spc]);
            out.push('\n');
            let header: Vec<String> = (0..weights[spc].len()).map(|i| i.to_string()).collect();
            out.push_str(&header.join(" "));
            out.push('\n');
            for w in &weights[spc] {
                out.push_str(&format!("{}\n", w));
            }
            out.push_str(&format!("{}\n", intercepts[spc]));
            if let Some(r) = rmse {
                out.push_str(&format!("{}\n", r[spc]));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::table;
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_parse_rmse_table() {
        let text = "VIS\n0 2\n0.5\n0.25\n0.01\n0.02\nNIR\n1\n 0.9 \n-0.03\n0.04\nSW\n2 1 0\n0.1\n0.2\n0.3\n0.0\n0.05\n";
        let block = parse_blocks(text, "mem", 3, true).unwrap();

        assert_eq!(block.coef.row(0).to_vec(), vec![0.5, 0.0, 0.25]);
        assert_eq!(block.coef.row(1).to_vec(), vec![0.0, 0.9, 0.0]);
        assert_eq!(block.coef.row(2).to_vec(), vec![0.3, 0.2, 0.1]);
        assert_eq!(block.intercept.to_vec(), vec![0.01, -0.03, 0.0]);
        assert_eq!(block.rmse.unwrap().to_vec(), vec![0.02, 0.04, 0.05]);
    }

    #[test]
    fn test_band_index_out_of_range() {
        let text = "VIS\n0 5\n0.5\n0.25\n0.01\n0.02\n";
        let result = parse_blocks(text, "mem", 3, true);
        assert!(matches!(result, Err(AuxdataError::Coefficients { line: 2, .. })));
    }

    #[test]
    fn test_bad_number_reports_line() {
        let text = "VIS\n0\nabc\n";
        let result = parse_blocks(text, "mem", 1, false);
        assert!(matches!(result, Err(AuxdataError::Coefficients { line: 3, .. })));
    }

    #[test]
    fn test_truncated_table() {
        let text = "VIS\n0\n0.5\n0.1\n";
        assert!(parse_blocks(text, "mem", 1, false).is_err());
    }

    #[test]
    fn test_load_both_tables() {
        let dir = tempdir().unwrap();
        let weights = [vec![0.5, 0.5], vec![0.2, 0.8], vec![0.0, 1.0]];
        fs::write(
            dir.path().join(rmse_file_name("AVHRR")),
            table(&weights, [0.01, 0.02, 0.03], Some([0.1, 0.2, 0.3])),
        )
        .unwrap();
        fs::write(
            dir.path().join(ddw_dup_file_name("AVHRR")),
            table(&weights, [-0.01, -0.02, -0.03], None),
        )
        .unwrap();

        let n2b = N2bCoefficients::load(dir.path(), "AVHRR", 2).unwrap();
        assert_eq!(n2b.num_bands(), 2);
        assert_eq!(n2b.coef[[1, 1]], 0.8);
        assert_eq!(n2b.rmse.to_vec(), vec![0.1, 0.2, 0.3]);
        assert_eq!(n2b.intercept_d.to_vec(), vec![-0.01, -0.02, -0.03]);
        assert_eq!(n2b.coef_d[[2, 1]], 1.0);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let result = N2bCoefficients::load(dir.path(), "MERIS", 15);
        assert!(matches!(result, Err(AuxdataError::Io { .. })));
    }
}
