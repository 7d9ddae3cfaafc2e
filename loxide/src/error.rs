use thiserror::Error;

use crate::token::Span;
use crate::value::Value;

#[derive(Debug, Error)]
pub enum LoxError {
    #[error("could not read script: {0}")]
    Io(#[from] std::io::Error),

    #[error("lexical error")]
    Scan { message: String, span: Span },

    #[error("parse error")]
    Parse { message: String, span: Span },

    #[error("resolution error")]
    Resolution { message: String, span: Span },

    #[error("runtime error")]
    Runtime { message: String, span: Span },

    /// Control flow for `return`, consumed by function calls. Never reported.
    #[error("")]
    Return(Value),

    /// Script errors were already reported, just signal failure.
    #[error("")]
    ScriptFailed,
}
