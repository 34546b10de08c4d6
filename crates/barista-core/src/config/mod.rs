//! Configuration for the assistant
//!
//! A single YAML document describes the model provider, the retrieval index,
//! the outlet database, the scraper endpoints and the HTTP service. All fields
//! have defaults.

pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;

#[cfg(test)]
mod tests;

use crate::errors::AgentError;
use std::path::Path;

/// Load a configuration from a YAML file, falling back to defaults when it is absent
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<BaristaConfig, AgentError> {
    ConfigLoader::from_file_or_default(path).await
}
