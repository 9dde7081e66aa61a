pub mod aot;
pub mod error;
pub mod gas;
pub mod lookup_table;
pub mod nsky;
pub mod reader;

pub use aot::AotLookupTable;
pub use error::LutError;
pub use gas::{GasLookupTable, GasStrategy};
pub use lookup_table::{FracIndex, IntervalPartition, LookupTable, LutWorkspace};
pub use nsky::NskyLookupTable;
