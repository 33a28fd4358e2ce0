use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub const ERR_DISCOVERY: &str = "SCOPE-DISCOVERY";
pub const ERR_STYLE: &str = "SCOPE-STYLE";
pub const ERR_MARKUP: &str = "SCOPE-MARKUP";
pub const ERR_ENCODING: &str = "SCOPE-ENCODING";
pub const ERR_CONFIG: &str = "SCOPE-CONFIG";

#[derive(Debug, Error)]
pub enum ScopeError {
    /// The components root could not be read. Fatal to the registry build.
    #[error("failed to read components directory {}: {source}", path.display())]
    Discovery {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse stylesheet of component '{component}' at {line}:{column}: {message}")]
    StyleParse {
        component: String,
        message: String,
        line: u32,
        column: u32,
    },

    #[error("failed to parse markup: {message}")]
    MarkupParse { message: String },

    #[error("document {} is not valid UTF-8", path.display())]
    Encoding { path: PathBuf },

    #[error("invalid options: {message}")]
    Config { message: String },
}

impl ScopeError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Discovery { .. } => ERR_DISCOVERY,
            Self::StyleParse { .. } => ERR_STYLE,
            Self::MarkupParse { .. } => ERR_MARKUP,
            Self::Encoding { .. } => ERR_ENCODING,
            Self::Config { .. } => ERR_CONFIG,
        }
    }
}

pub type Result<T, E = ScopeError> = std::result::Result<T, E>;
