pub mod settings;

pub use settings::{ClientConfig, ServiceConfig, Settings, UnroutablePolicy};
