pub mod config;
pub mod errors;
pub mod point;
pub mod units;

pub use config::*;
pub use errors::*;
pub use point::*;
pub use units::*;
