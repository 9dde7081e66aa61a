//! Per-pixel atmospheric correction, narrowband to broadband conversion and
//! BRDF kernels.

pub mod covariance;
pub mod kernels;
pub mod pixel;
pub mod processor;

pub use covariance::SqrtPolicy;
pub use pixel::{BbdrOutput, PixelInput, SdrOutput, SdrPixelInput, Status};
pub use processor::BbdrProcessor;
