//! Bidirectional broadband reflectance (BBDR) retrieval from top-of-atmosphere
//! or surface reflectance rasters of MERIS, AATSR, VGT, PROBA-V and AVHRR.

pub mod auxdata;
pub mod batch;
pub mod bbdr;
pub mod config;
pub mod error;
pub mod lut;
pub mod readers;
pub mod sensor;
pub mod solar;
pub mod variance;

pub use error::{BbdrError, BbdrResult};
