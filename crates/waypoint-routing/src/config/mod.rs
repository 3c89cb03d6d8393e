//! Router configuration

pub mod defaults;
pub mod options;

pub use defaults::RouterDefaults;
pub use options::{ConfigSource, RouterOptions};
