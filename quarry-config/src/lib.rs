//! Configuration loading for Quarry.
//!
//! Typed configuration structs are deserialized from JSON/TOML/env files or assembled from
//! prefixed environment variables, then checked through [`Validate`] before use.

pub mod env;
pub mod error;
pub mod loader;
pub mod validation;

pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use validation::{ConfigValidator, Validate};

use serde::de::DeserializeOwned;
use std::path::Path;

/// Load a typed configuration from a file, detecting the format from its extension.
pub fn load_file<T: DeserializeOwned + Validate>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    ConfigLoader::auto(path)?.load_validated(path)
}
