use thiserror::Error;

use crate::codes::ErrorCode;

pub type Result<T> = std::result::Result<T, RteError>;

#[derive(Debug, Error)]
pub enum RteError {
    #[error("header error: {0}")]
    Header(String),

    #[error("fatal decode error {code:?}: {detail}")]
    Fatal { code: ErrorCode, detail: String },

    #[error("format definition errors ({0} reported)")]
    FmtParsing(u32),

    #[error("bad parameters: {0}")]
    BadParameters(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RteError {
    pub fn fatal(code: ErrorCode, detail: impl Into<String>) -> Self {
        RteError::Fatal { code, detail: detail.into() }
    }
}
