use thiserror::Error;

use crate::scanner::Section;

/// Errors raised while scanning or parsing a `.dg` unit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Malformed DSL structure.
    #[error("{message} (in {section} section at offset {offset})")]
    Syntax {
        section: Section,
        offset: usize,
        message: String,
    },
    /// An embedded Rust fragment failed to parse.
    #[error("could not parse {context}: {message}")]
    Embedded { context: String, message: String },
    #[error("failed to parse tags: trailing comma is not allowed")]
    TrailingComma,
}

impl ParseError {
    pub fn syntax(section: Section, offset: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            section,
            offset,
            message: message.into(),
        }
    }

    pub fn embedded(context: impl Into<String>, message: impl ToString) -> Self {
        Self::Embedded {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Message without location details.
    pub fn message(&self) -> String {
        match self {
            Self::Syntax { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Result type for parse operations.
pub type Result<T> = std::result::Result<T, ParseError>;
