use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Result, ScopeError};

pub const DEFAULT_MARKUP_FILE: &str = "index.html";
pub const DEFAULT_STYLESHEET_FILE: &str = "style.scss";
pub const DEFAULT_SCRIPT_FILE: &str = "script.js";

/// Options for the component engine. Must be supplied before the first document
/// is processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeOptions {
    /// Root directory whose immediate subdirectories are components.
    pub components_dir: PathBuf,
    #[serde(default = "default_markup_file")]
    pub markup_file: String,
    #[serde(default = "default_stylesheet_file")]
    pub stylesheet_file: String,
    #[serde(default = "default_script_file")]
    pub script_file: String,
}

fn default_markup_file() -> String {
    DEFAULT_MARKUP_FILE.to_string()
}

fn default_stylesheet_file() -> String {
    DEFAULT_STYLESHEET_FILE.to_string()
}

fn default_script_file() -> String {
    DEFAULT_SCRIPT_FILE.to_string()
}

impl ScopeOptions {
    pub fn new(components_dir: impl Into<PathBuf>) -> Self {
        Self {
            components_dir: components_dir.into(),
            markup_file: default_markup_file(),
            stylesheet_file: default_stylesheet_file(),
            script_file: default_script_file(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ScopeError::Config {
            message: e.to_string(),
        })
    }

    /// The three artifact names every component directory must contain.
    pub fn required_files(&self) -> [&str; 3] {
        [
            self.markup_file.as_str(),
            self.stylesheet_file.as_str(),
            self.script_file.as_str(),
        ]
    }

    /// Absolute components root. Relative paths resolve against the working directory.
    pub fn resolve_components_dir(&self) -> Result<PathBuf> {
        if self.components_dir.is_absolute() {
            return Ok(self.components_dir.clone());
        }
        let cwd = std::env::current_dir().map_err(|e| ScopeError::Config {
            message: format!("cannot resolve working directory: {}", e),
        })?;
        Ok(cwd.join(&self.components_dir))
    }
}
