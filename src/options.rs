use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Settings for a shader instantiation, loadable from JSON.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct InstantiationOptions {
    /// Emit every instantiation only once, even when it is referenced again. This also makes
    /// graphs that reference each other terminate. Without it every reference is
    /// instantiated again.
    pub skip_duplicates: bool,
    /// Extension marking a dependency as another graph.
    pub graph_extension: String,
    /// Extensions tried, in order, for plain archive names without one.
    pub include_extensions: Vec<String>,
}

impl Default for InstantiationOptions {
    fn default() -> Self {
        Self {
            skip_duplicates: true,
            graph_extension: "graph".to_string(),
            include_extensions: vec!["hlsl".to_string(), "h".to_string(), "sh".to_string()],
        }
    }
}

impl InstantiationOptions {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn skip_duplicates(mut self, skip_duplicates: bool) -> Self {
        self.skip_duplicates = skip_duplicates;
        self
    }
}
