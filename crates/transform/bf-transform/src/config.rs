//! Transform selection.

use bf_error::{BfError, ReaderError, Result, TransformError};
use bf_types::RunConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Which transform each worker context instantiates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformSpec {
    /// Registered transform name
    pub name: String,

    /// Script source for the `rhai` transform
    #[serde(default)]
    pub script: Option<String>,
}

impl TransformSpec {
    /// Selects a registered transform by name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: None,
        }
    }

    /// Selects the script transform with inline source.
    pub fn script(source: impl Into<String>) -> Self {
        Self {
            name: crate::script::SCRIPT_TRANSFORM_NAME.to_string(),
            script: Some(source.into()),
        }
    }

    /// Builds the spec for a run, reading the script file if one is configured.
    pub async fn from_run_config(config: &RunConfig) -> Result<Self> {
        let mut spec = Self::named(config.transform.trim());
        if let Some(path) = &config.script_path {
            spec.script = Some(load_script_from_file(path).await?);
        }
        Ok(spec)
    }
}

async fn load_script_from_file(path: &Path) -> Result<String> {
    debug!(path = %path.display(), "Loading transform script");

    let display = path.display().to_string();
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ReaderError::from_io(&display, e))?;

    String::from_utf8(bytes).map_err(|e| {
        BfError::Transform(TransformError::Load(format!(
            "Script {display} is not valid UTF-8: {e}"
        )))
    })
}
