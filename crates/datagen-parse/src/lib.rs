//! Scanner and structural parser for `.dg` model sources.

pub mod embedded;
pub mod errors;
pub mod parser;
pub mod scanner;

pub use embedded::{EmbeddedParser, SynParser};
pub use errors::{ParseError, Result};
pub use parser::{parse_model, parse_model_with, parse_unit};
pub use scanner::{MetadataEntry, ScanState, Scanner, Section, Token, TokenKind, on_lbrace, on_rbrace};
