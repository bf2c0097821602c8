pub mod app;
pub mod factory;

pub use crate::domain::ports::Connector;
pub use crate::utils::error::Result;
