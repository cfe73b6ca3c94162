//! Utility modules

pub mod error;
pub mod logging;

pub use error::log_error;
pub use logging::init_logging;
