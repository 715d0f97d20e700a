// src/config/mod.rs

//! Declarative configuration: raw serde model, file loading with imports,
//! and construction of engine objects.

pub mod build;
pub mod loader;
pub mod model;

pub use build::{build, parse_duration, BuiltConfig};
pub use loader::{discover, load};
pub use model::ConfigFile;
