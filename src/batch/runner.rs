use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use ndarray::ArrayView2;
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::auxdata::{AuxdataError, BbdrAuxdata};
use crate::bbdr::pixel::{BBDR_BAND_NAMES, sdr_band_names};
use crate::bbdr::{BbdrProcessor, PixelInput, SdrPixelInput, Status};
use crate::config::{Config, Mode};
use crate::error::{BbdrError, BbdrResult};
use crate::lut::GasStrategy;
use crate::readers::{Raster, ReadError, band_path, read_band, write_raster};
use crate::sensor::{Sensor, SensorParams};
use crate::variance::{local_variance, toa_factor};

/// Product ozone means closer than this to the loaded one reuse the gas tables.
const OZONE_MEAN_TOLERANCE: f64 = 1e-4;

/// Outcome of one processed product.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductSummary {
    pub name: String,
    pub output_directory: PathBuf,
    pub pixels: usize,
    /// Pixels written with status LAND or SNOW.
    pub retrieved: usize,
}

/// Runs the configured mode over every product below the input directory.
#[derive(Debug)]
pub struct BatchRunner<'a> {
    config: &'a Config,
    aux: &'a BbdrAuxdata,
    products: Vec<PathBuf>,
}

impl<'a> BatchRunner<'a> {
    pub fn new(config: &'a Config, aux: &'a BbdrAuxdata) -> BbdrResult<Self> {
        let marker = product_marker(config.mode(), aux.sensor());
        let products = find_products(config.input_directory(), config.output_directory(), &marker);
        if products.is_empty() {
            return Err(BbdrError::NoProducts(config.input_directory().to_path_buf()));
        }

        info!(
            "Found {} {} products below {}",
            products.len(),
            aux.sensor(),
            config.input_directory().display()
        );
        Ok(Self {
            config,
            aux,
            products,
        })
    }

    pub fn products(&self) -> &[PathBuf] {
        &self.products
    }

    /// Processes every product. Products that cannot be read or written are
    /// logged and skipped.
    pub fn run(&self) -> Vec<ProductSummary> {
        let mut summaries = Vec::with_capacity(self.products.len());
        for product in &self.products {
            match self.process_product(product) {
                Ok(summary) => {
                    info!(
                        "✓ {}: {} of {} pixels retrieved",
                        summary.name, summary.retrieved, summary.pixels
                    );
                    summaries.push(summary);
                }
                Err(e) => warn!("✗ Skipping {}: {}", product.display(), e),
            }
        }
        summaries
    }

    pub fn process_product(&self, product: &Path) -> BbdrResult<ProductSummary> {
        let name = product_name(product);
        info!("Processing {} in {:?} mode", name, self.config.mode());

        let (rasters, band_names) = match self.config.mode() {
            Mode::Bbdr | Mode::Sdr => {
                let bands = ToaBands::read(product, self.aux.sensor())?;
                let product_aux = self.product_auxdata(&bands)?;
                let aux = product_aux.as_ref().unwrap_or(self.aux);
                let processor = BbdrProcessor::new(aux, self.config.covariance_sqrt());

                if self.config.mode() == Mode::Bbdr {
                    let rasters = render(bands.geometry.dim, BBDR_BAND_NAMES.len(), |idx, buffers| {
                        bands.with_pixel(idx, buffers, |input| processor.compute_bbdr(input).values())
                    });
                    let names = BBDR_BAND_NAMES.iter().map(|s| s.to_string()).collect();
                    (rasters, names)
                } else {
                    let names = sdr_band_names(bands.toa.len());
                    let rasters = render(bands.geometry.dim, names.len(), |idx, buffers| {
                        bands.with_pixel(idx, buffers, |input| processor.compute_sdr(input).values())
                    });
                    (rasters, names)
                }
            }
            Mode::BbdrFromSdr => {
                let bands = SdrBands::read(product, self.aux.sensor())?;
                let processor = BbdrProcessor::new(self.aux, self.config.covariance_sqrt());
                let rasters = render(bands.geometry.dim, BBDR_BAND_NAMES.len(), |idx, buffers| {
                    bands.with_pixel(idx, buffers, |input| processor.compute_bbdr_from_sdr(input).values())
                });
                let names = BBDR_BAND_NAMES.iter().map(|s| s.to_string()).collect();
                (rasters, names)
            }
        };

        let output_directory = self.config.output_directory().join(&name);
        fs::create_dir_all(&output_directory)?;
        for (raster, band) in rasters.iter().zip(&band_names) {
            write_raster(band_path(&output_directory, band), raster)?;
        }

        // status is always the last band
        let status = rasters.last().map(|r| r.buffer.as_slice()).unwrap_or_default();
        let retrieved = status
            .iter()
            .filter(|&&v| Status::from_code(v as i32).is_some_and(Status::is_retrievable))
            .count();

        Ok(ProductSummary {
            name,
            output_directory,
            pixels: status.len(),
            retrieved,
        })
    }

    /// Image mean of the ozone band for sensors whose gas tables are resolved
    /// at a fixed ozone amount, unless the config pins it.
    fn product_ozone_mean(&self, bands: &ToaBands) -> Option<f64> {
        if self.config.ozone_mean().is_some()
            || self.aux.sensor().params().gas_strategy != GasStrategy::CwvPerPixel
        {
            return None;
        }
        bands.ozone.as_ref()?.valid_mean()
    }

    fn product_auxdata(&self, bands: &ToaBands) -> Result<Option<BbdrAuxdata>, AuxdataError> {
        match self.product_ozone_mean(bands) {
            Some(mean) if (mean - self.aux.ozone_mean()).abs() > OZONE_MEAN_TOLERANCE => {
                info!(
                    "Product ozone mean {:.4} atm-cm differs from {:.4}, reloading auxiliary data",
                    mean,
                    self.aux.ozone_mean()
                );
                BbdrAuxdata::load(self.config.lut_root(), self.aux.sensor(), mean).map(Some)
            }
            _ => Ok(None),
        }
    }
}

/// File whose presence marks a directory as a product.
pub fn product_marker(mode: Mode, sensor: Sensor) -> String {
    match mode {
        Mode::BbdrFromSdr => "sdr_1.tif".to_string(),
        Mode::Bbdr | Mode::Sdr => format!("{}.tif", sensor.params().bands.toa[0]),
    }
}

/// Directories below `root` holding a file named `marker`, sorted. Anything
/// inside `exclude` is ignored so earlier outputs are not picked up again.
pub fn find_products(root: &Path, exclude: &Path, marker: &str) -> Vec<PathBuf> {
    let mut products = BTreeSet::new();

    let entries = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.path() != exclude)
        .filter_map(|e| e.ok());

    for entry in entries {
        if entry.file_type().is_file()
            && entry.file_name().to_string_lossy() == marker
            && let Some(parent) = entry.path().parent()
        {
            products.insert(parent.to_path_buf());
        }
    }

    products.into_iter().collect()
}

fn product_name(product: &Path) -> String {
    product
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "product".to_string())
}

/// Evaluates `pixel` for every pixel, rows in parallel, and splits the
/// per-pixel values into one raster per band.
fn render<F, V>(dim: (u32, u32), band_count: usize, pixel: F) -> Vec<Raster>
where
    F: Fn(usize, &mut PixelBuffers) -> V + Sync,
    V: AsRef<[f64]>,
{
    let (width, height) = dim;
    let row_len = width as usize * band_count;
    let mut interleaved = vec![f32::NAN; row_len * height as usize];

    if row_len > 0 {
        interleaved
            .par_chunks_mut(row_len)
            .enumerate()
            .for_each_init(PixelBuffers::default, |buffers, (row, chunk)| {
                for (col, out) in chunk.chunks_mut(band_count).enumerate() {
                    let values = pixel(row * width as usize + col, buffers);
                    for (o, v) in out.iter_mut().zip(values.as_ref()) {
                        *o = *v as f32;
                    }
                }
            });
    }

    (0..band_count)
        .map(|b| {
            let buffer = interleaved.iter().skip(b).step_by(band_count).copied().collect();
            Raster::new(width, height, buffer)
        })
        .collect()
}

/// Per-worker scratch holding one pixel's spectral values and their variances.
#[derive(Default)]
struct PixelBuffers {
    values: Vec<f64>,
    variance: Vec<f64>,
}

impl PixelBuffers {
    fn load(&mut self, idx: usize, values: &[Raster], variance: &[Raster]) {
        self.values.clear();
        self.values.extend(values.iter().map(|r| r.buffer[idx] as f64));
        self.variance.clear();
        self.variance.extend(variance.iter().map(|r| r.buffer[idx] as f64));
    }
}

fn mask_set(value: f32) -> bool {
    value != 0.0 && !value.is_nan()
}

/// Reads bands of one product, all with the shape of the first one.
struct ProductReader<'p> {
    product: &'p Path,
    dim: (u32, u32),
}

impl<'p> ProductReader<'p> {
    fn open(product: &'p Path, first_band: &str) -> Result<(Self, Raster), ReadError> {
        let raster = read_band(product, first_band)?;
        let reader = Self {
            product,
            dim: raster.dim(),
        };
        reader.check(first_band, &raster)?;
        Ok((reader, raster))
    }

    fn check(&self, band: &str, raster: &Raster) -> Result<(), ReadError> {
        let (width, height) = self.dim;
        if raster.dim() != self.dim || raster.buffer.len() != width as usize * height as usize {
            return Err(ReadError::Shape {
                band: band.to_string(),
                expected: self.dim,
                actual: raster.dim(),
            });
        }
        Ok(())
    }

    fn read(&self, band: &str) -> Result<Raster, ReadError> {
        let raster = read_band(self.product, band)?;
        self.check(band, &raster)?;
        Ok(raster)
    }

    fn read_optional(&self, band: Option<&str>) -> Result<Option<Raster>, ReadError> {
        band.map(|b| self.read(b)).transpose()
    }

    fn has_band(&self, band: &str) -> bool {
        band_path(self.product, band).is_file()
    }
}

/// Bands shared by TOA and SDR products.
struct GeometryBands {
    dim: (u32, u32),
    vza: Raster,
    vaa: Raster,
    sza: Raster,
    saa: Raster,
    dem: Raster,
    aot: Raster,
    aot_err: Raster,
    snow: Raster,
}

impl GeometryBands {
    fn read<'p>(product: &'p Path, params: &SensorParams) -> Result<(Self, ProductReader<'p>), ReadError> {
        let names = &params.bands;
        let (reader, vza) = ProductReader::open(product, names.vza)?;
        let bands = Self {
            dim: reader.dim,
            vza,
            vaa: reader.read(names.vaa)?,
            sza: reader.read(names.sza)?,
            saa: reader.read(names.saa)?,
            dem: reader.read(names.dem)?,
            aot: reader.read(names.aot)?,
            aot_err: reader.read(names.aot_err)?,
            snow: reader.read(names.snow_mask)?,
        };
        debug!("{}: {}x{} pixels", product.display(), bands.dim.0, bands.dim.1);
        Ok((bands, reader))
    }
}

struct ToaBands {
    geometry: GeometryBands,
    ozone: Option<Raster>,
    cwv: Option<Raster>,
    land: Raster,
    toa: Vec<Raster>,
    toa_var: Vec<Raster>,
}

impl ToaBands {
    fn read(product: &Path, sensor: Sensor) -> Result<Self, ReadError> {
        let params = sensor.params();
        let (geometry, reader) = GeometryBands::read(product, params)?;

        let toa = params
            .bands
            .toa
            .iter()
            .map(|band| reader.read(band))
            .collect::<Result<Vec<_>, _>>()?;

        let toa_var = params
            .bands
            .toa
            .iter()
            .zip(&toa)
            .enumerate()
            .map(|(i, (band, raster))| {
                let var_band = format!("{}_var", band);
                if reader.has_band(&var_band) {
                    reader.read(&var_band)
                } else {
                    toa_variance(band, raster, &geometry.sza, params, i)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            ozone: reader.read_optional(params.bands.ozone)?,
            cwv: reader.read_optional(params.bands.cwv)?,
            land: reader.read(params.bands.land_mask)?,
            geometry,
            toa,
            toa_var,
        })
    }

    fn with_pixel<T>(
        &self,
        idx: usize,
        buffers: &mut PixelBuffers,
        f: impl FnOnce(&PixelInput) -> T,
    ) -> T {
        let g = &self.geometry;
        buffers.load(idx, &self.toa, &self.toa_var);
        let input = PixelInput {
            vza: g.vza.buffer[idx] as f64,
            vaa: g.vaa.buffer[idx] as f64,
            sza: g.sza.buffer[idx] as f64,
            saa: g.saa.buffer[idx] as f64,
            dem: g.dem.buffer[idx] as f64,
            aot: g.aot.buffer[idx] as f64,
            aot_err: g.aot_err.buffer[idx] as f64,
            ozone: self.ozone.as_ref().map_or(0.0, |r| r.buffer[idx] as f64),
            cwv: self.cwv.as_ref().map_or(0.0, |r| r.buffer[idx] as f64),
            land: mask_set(self.land.buffer[idx]),
            snow: mask_set(g.snow.buffer[idx]),
            toa: &buffers.values,
            toa_var: &buffers.variance,
        };
        f(&input)
    }
}

/// Local standard deviation of a TOA band for products without a variance band.
fn toa_variance(
    band: &str,
    toa: &Raster,
    sza: &Raster,
    params: &SensorParams,
    index: usize,
) -> Result<Raster, ReadError> {
    let (width, height) = toa.dim();
    let view = ArrayView2::from_shape((height as usize, width as usize), &toa.buffer).map_err(|_| {
        ReadError::Shape {
            band: band.to_string(),
            expected: (width, height),
            actual: toa.dim(),
        }
    })?;

    let cal = params.cal2meris[index];
    let variance = local_variance(view, |r, c| {
        let sun = sza.buffer[r * width as usize + c] as f64;
        toa_factor(params.elevation_geometry, cal, sun)
    });
    debug!("Computed local variance of {}", band);

    Ok(Raster::new(width, height, variance.into_raw_vec()))
}

struct SdrBands {
    geometry: GeometryBands,
    status: Raster,
    sdr: Vec<Raster>,
    sdr_error: Vec<Raster>,
}

impl SdrBands {
    fn read(product: &Path, sensor: Sensor) -> Result<Self, ReadError> {
        let params = sensor.params();
        let (geometry, reader) = GeometryBands::read(product, params)?;
        let n = sensor.num_bands();

        let read_series = |prefix: &str| {
            (1..=n)
                .map(|i| reader.read(&format!("{}_{}", prefix, i)))
                .collect::<Result<Vec<_>, _>>()
        };

        Ok(Self {
            sdr: read_series("sdr")?,
            sdr_error: read_series("sdr_error")?,
            status: reader.read("status")?,
            geometry,
        })
    }

    fn with_pixel<T>(
        &self,
        idx: usize,
        buffers: &mut PixelBuffers,
        f: impl FnOnce(&SdrPixelInput) -> T,
    ) -> T {
        let g = &self.geometry;
        buffers.load(idx, &self.sdr, &self.sdr_error);
        let input = SdrPixelInput {
            vza: g.vza.buffer[idx] as f64,
            vaa: g.vaa.buffer[idx] as f64,
            sza: g.sza.buffer[idx] as f64,
            saa: g.saa.buffer[idx] as f64,
            dem: g.dem.buffer[idx] as f64,
            aot: g.aot.buffer[idx] as f64,
            aot_err: g.aot_err.buffer[idx] as f64,
            snow: mask_set(g.snow.buffer[idx]),
            status: Status::from_code(self.status.buffer[idx] as i32).unwrap_or(Status::Invalid),
            sdr: &buffers.values,
            toa_var: &buffers.variance,
        };
        f(&input)
    }
}
