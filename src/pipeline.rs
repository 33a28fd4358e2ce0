//! Build-pipeline boundary: one file buffer in, one file buffer out.

use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::assemble::Assembler;
use crate::config::ScopeOptions;
use crate::error::{Result, ScopeError};
use crate::registry::{ComponentRegistry, RegistryProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Markup,
    Stylesheet,
    Script,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "html" | "htm" => Some(Self::Markup),
            "css" | "scss" => Some(Self::Stylesheet),
            "js" | "mjs" | "cjs" => Some(Self::Script),
            _ => None,
        }
    }
}

/// A file travelling through the build. `contents: None` is a null file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineFile {
    pub path: PathBuf,
    pub contents: Option<Vec<u8>>,
}

impl PipelineFile {
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            contents: Some(contents.into()),
        }
    }

    pub fn null(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            contents: None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.contents
            .as_deref()
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
    }
}

pub struct Pipeline<P> {
    assembler: Assembler<P>,
}

impl Pipeline<ComponentRegistry> {
    pub fn from_options(options: ScopeOptions) -> Self {
        Self::new(ComponentRegistry::new(options))
    }
}

impl<P: RegistryProvider> Pipeline<P> {
    pub fn new(registry: P) -> Self {
        Self {
            assembler: Assembler::new(registry),
        }
    }

    pub fn assembler(&self) -> &Assembler<P> {
        &self.assembler
    }

    /// Forget the registry. The next document rebuilds it from disk.
    pub fn invalidate(&self) {
        self.assembler.invalidate();
    }

    pub fn process_text(&self, kind: DocumentKind, text: &str) -> Result<String> {
        match kind {
            DocumentKind::Markup => self.assembler.assemble_markup(text),
            DocumentKind::Stylesheet => self.assembler.assemble_styles(text),
            DocumentKind::Script => self.assembler.assemble_scripts(text),
        }
    }

    pub fn process(&self, kind: DocumentKind, mut file: PipelineFile) -> Result<PipelineFile> {
        // The registry gate runs even for null files.
        self.assembler.prepare()?;

        let Some(bytes) = file.contents.take() else {
            debug!(path = %file.path.display(), "null file passed through");
            return Ok(file);
        };
        let text = String::from_utf8(bytes).map_err(|_| ScopeError::Encoding {
            path: file.path.clone(),
        })?;

        let output = self.process_text(kind, &text)?;
        file.contents = Some(output.into_bytes());
        Ok(file)
    }

    /// Process many files concurrently against one registry build.
    pub fn process_all(&self, files: Vec<(DocumentKind, PipelineFile)>) -> Result<Vec<PipelineFile>> {
        self.assembler.prepare()?;
        files
            .into_par_iter()
            .map(|(kind, file)| self.process(kind, file))
            .collect()
    }
}
