pub mod dataset;
pub mod errors;
pub mod estimator;
pub mod params;

pub use dataset::*;
pub use errors::*;
pub use estimator::*;
pub use params::*;
