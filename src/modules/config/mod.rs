pub mod settings;

pub use settings::{ConfigError, LinkConfig, ServiceConfig};
