use std::env;
use std::path::PathBuf;

use log::info;

use bbdr::auxdata::BbdrAuxdata;
use bbdr::batch::BatchRunner;
use bbdr::config::Config;
use bbdr::sensor::OZO_CONSTANT_VALUE;
use bbdr::solar;

const DEFAULT_CONFIG: &str = "./data/config/bbdr_config.json";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    info!("Loading config from {}", config_path.display());
    let config = Config::from_file(&config_path)?;

    let ozone_mean = config.ozone_mean().unwrap_or(OZO_CONSTANT_VALUE);
    let aux = BbdrAuxdata::load(config.lut_root(), config.sensor(), ozone_mean)?;

    if let Some(date) = config.acquisition_date() {
        for latitude in [0.0, 45.0, 70.0] {
            info!(
                "{}: noon sun zenith at {:.0}° latitude is {:.2}°",
                date,
                latitude,
                solar::compute_sza_for_date(latitude, date)
            );
        }
    }

    let runner = BatchRunner::new(&config, &aux)?;
    let summaries = runner.run();

    println!(
        "{} {:?} products processed, {} skipped",
        summaries.len(),
        config.mode(),
        runner.products().len() - summaries.len()
    );
    for summary in &summaries {
        println!(
            "  {}: {}/{} pixels retrieved -> {}",
            summary.name,
            summary.retrieved,
            summary.pixels,
            summary.output_directory.display()
        );
    }

    Ok(())
}
