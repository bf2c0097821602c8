pub mod error;
pub mod log_format;
pub mod logger;
pub mod sampling;
pub mod validation;
