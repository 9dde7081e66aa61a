pub mod runner;

pub use runner::{BatchRunner, ProductSummary, find_products, product_marker};
