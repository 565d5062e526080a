//! Pull-based scanner for `.dg` sources.
//!
//! The scanner is a finite-state machine. [`ScanState`] names the next thing the scanner
//! expects to read, while [`Section`] and [`MetadataEntry`] record where in the model body it
//! currently is. Brace events drive the section transitions through [`on_lbrace`] and
//! [`on_rbrace`], which are pure so the nesting rules can be tested on their own.

use std::fmt;

use serde::Serialize;

use crate::errors::{ParseError, Result};

const COMMENT_MARKER: &str = "//";
const KEYWORD_MODEL: &str = "model";
const KEYWORD_FUNC: &str = "func";

/// Section of the model body the scanner is inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Fields,
    Misc,
    Metadata,
    Gens,
    GenFn,
    Calls,
    Serialiser,
    None,
}

impl Section {
    /// Section introduced by a header keyword.
    pub fn from_header(header: &str) -> Option<Self> {
        match header {
            "fields" => Some(Self::Fields),
            "misc" => Some(Self::Misc),
            "metadata" => Some(Self::Metadata),
            "gens" => Some(Self::Gens),
            "calls" => Some(Self::Calls),
            "serialiser" => Some(Self::Serialiser),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fields => "fields",
            Self::Misc => "misc",
            Self::Metadata => "metadata",
            Self::Gens => "gens",
            Self::GenFn => "gen fn",
            Self::Calls => "calls",
            Self::Serialiser => "serialiser",
            Self::None => "model",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position inside the `metadata { count: .. tags: { .. } }` sub-grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataEntry {
    Count,
    Tags,
    MetadataEof,
}

/// What the scanner reads next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanState {
    Model,
    ModelName,
    OpenBrace,
    CloseBrace,
    SectionHeader,
    RawBody,
    MetadataEntry,
    MetadataColon,
    MetadataCount,
    GenFnKeyword,
    GenFnName,
    OpenParen,
    GenFnParams,
    CloseParen,
    Done,
}

/// Token kinds produced by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Model,
    ModelName(String),
    LBrace,
    RBrace,
    SectionHeader(Section),
    /// Verbatim text between a pair of balanced braces.
    Body(String),
    Count,
    Tags,
    Colon,
    CountValue(i64),
    Func,
    FnName(String),
    LParen,
    FnParams(String),
    RParen,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Model => f.write_str("'model'"),
            Self::ModelName(name) => write!(f, "model name '{name}'"),
            Self::LBrace => f.write_str("'{'"),
            Self::RBrace => f.write_str("'}'"),
            Self::SectionHeader(section) => write!(f, "section '{section}'"),
            Self::Body(_) => f.write_str("body"),
            Self::Count => f.write_str("'count'"),
            Self::Tags => f.write_str("'tags'"),
            Self::Colon => f.write_str("':'"),
            Self::CountValue(value) => write!(f, "count {value}"),
            Self::Func => f.write_str("'func'"),
            Self::FnName(name) => write!(f, "gen fn name '{name}'"),
            Self::LParen => f.write_str("'('"),
            Self::FnParams(_) => f.write_str("parameter list"),
            Self::RParen => f.write_str("')'"),
            Self::Eof => f.write_str("end of input"),
        }
    }
}

/// A token and the byte offset where it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

/// State entered after consuming a `{` in `section`.
pub fn on_lbrace(section: Section, entry: MetadataEntry) -> ScanState {
    match section {
        Section::None => ScanState::SectionHeader,
        Section::Metadata if entry == MetadataEntry::Tags => ScanState::RawBody,
        Section::Metadata => ScanState::MetadataEntry,
        Section::Gens => ScanState::GenFnKeyword,
        Section::Fields | Section::Misc | Section::GenFn | Section::Calls | Section::Serialiser => {
            ScanState::RawBody
        }
    }
}

/// State and section entered after consuming a `}` in `section`.
pub fn on_rbrace(section: Section, entry: MetadataEntry) -> (ScanState, Section) {
    match section {
        Section::None => (ScanState::Done, Section::None),
        Section::GenFn => (ScanState::GenFnKeyword, Section::Gens),
        Section::Metadata if entry != MetadataEntry::MetadataEof => {
            (ScanState::MetadataEntry, Section::Metadata)
        }
        other => (ScanState::SectionHeader, other),
    }
}

/// Label used in "incomplete body" errors for a raw body read in `section`.
fn body_label(section: Section, entry: MetadataEntry) -> &'static str {
    match section {
        Section::Metadata if entry == MetadataEntry::Tags => "tags",
        Section::GenFn => "fn",
        other => other.as_str(),
    }
}

type Step = Result<(ScanState, TokenKind)>;

/// Stateful lexer over one `.dg` source.
#[derive(Debug)]
pub struct Scanner<'a> {
    input: &'a str,
    pos: usize,
    width: usize,
    state: ScanState,
    section: Section,
    metadata_entry: MetadataEntry,
    error: Option<ParseError>,
}

impl<'a> Scanner<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            width: 0,
            state: ScanState::Model,
            section: Section::None,
            metadata_entry: MetadataEntry::Count,
            error: None,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn section(&self) -> Section {
        self.section
    }

    pub fn metadata_entry(&self) -> MetadataEntry {
        self.metadata_entry
    }

    pub fn offset(&self) -> usize {
        self.pos
    }

    /// Produce the next token. After the first failure every call returns that same error.
    pub fn next_token(&mut self) -> Result<Token> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }

        self.skip_trivia();
        let offset = self.pos;
        let step = match self.state {
            ScanState::Model => self.scan_model(),
            ScanState::ModelName => self.scan_model_name(),
            ScanState::OpenBrace => self.scan_open_brace(),
            ScanState::CloseBrace => self.scan_close_brace(),
            ScanState::SectionHeader => self.scan_section_header(),
            ScanState::RawBody => self.scan_raw_body(),
            ScanState::MetadataEntry => self.scan_metadata_entry(),
            ScanState::MetadataColon => self.scan_metadata_colon(),
            ScanState::MetadataCount => self.scan_metadata_count(),
            ScanState::GenFnKeyword => self.scan_gen_fn_keyword(),
            ScanState::GenFnName => self.scan_gen_fn_name(),
            ScanState::OpenParen => self.scan_open_paren(),
            ScanState::GenFnParams => self.scan_gen_fn_params(),
            ScanState::CloseParen => self.scan_close_paren(),
            ScanState::Done => Ok((ScanState::Done, TokenKind::Eof)),
        };

        match step {
            Ok((next, kind)) => {
                self.state = next;
                Ok(Token { kind, offset })
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Latch `err` unless an earlier error is already recorded; returns the winning error.
    pub fn fail(&mut self, err: ParseError) -> ParseError {
        self.error.get_or_insert(err).clone()
    }

    fn error(&self, message: impl Into<String>) -> Step {
        Err(ParseError::syntax(self.section, self.pos, message))
    }

    fn scan_model(&mut self) -> Step {
        let val = self.consume_string();
        if val != KEYWORD_MODEL {
            return self.error(format!("expected '{KEYWORD_MODEL}', got '{val}'"));
        }
        Ok((ScanState::ModelName, TokenKind::Model))
    }

    fn scan_model_name(&mut self) -> Step {
        let val = self.consume_string();
        if !is_identifier(val) {
            return self.error(format!("expected valid model name, got '{val}'"));
        }
        Ok((ScanState::OpenBrace, TokenKind::ModelName(val.to_string())))
    }

    fn scan_open_brace(&mut self) -> Step {
        match self.next_char() {
            Some('{') => Ok((
                on_lbrace(self.section, self.metadata_entry),
                TokenKind::LBrace,
            )),
            other => {
                self.backup_if(other);
                self.error(format!("expected '{{', got '{}'", describe(other)))
            }
        }
    }

    fn scan_close_brace(&mut self) -> Step {
        match self.next_char() {
            Some('}') => {
                let (next, section) = on_rbrace(self.section, self.metadata_entry);
                self.section = section;
                Ok((next, TokenKind::RBrace))
            }
            other => {
                self.backup_if(other);
                self.error(format!("expected '}}', got '{}'", describe(other)))
            }
        }
    }

    fn scan_section_header(&mut self) -> Step {
        let val = self.consume_string();
        if val.is_empty() {
            // Nothing but the model's closing brace can follow.
            self.section = Section::None;
            return self.scan_close_brace();
        }

        match Section::from_header(val) {
            Some(section) => {
                self.section = section;
                if section == Section::Metadata {
                    self.metadata_entry = MetadataEntry::Count;
                }
                Ok((ScanState::OpenBrace, TokenKind::SectionHeader(section)))
            }
            None => self.error(format!(
                "expected section header: one of 'fields', 'misc', 'metadata', 'gens', 'calls', 'serialiser'; got '{val}'"
            )),
        }
    }

    fn scan_raw_body(&mut self) -> Step {
        let label = body_label(self.section, self.metadata_entry);
        match self.consume_body_till_rbrace() {
            Some(body) => Ok((ScanState::CloseBrace, TokenKind::Body(body.to_string()))),
            None => self.error(format!("invalid {label} body incomplete body")),
        }
    }

    fn scan_metadata_entry(&mut self) -> Step {
        let mut val = self.consume_string();
        if let Some(stripped) = val.strip_suffix(':') {
            // Leave the colon for the next state.
            self.pos -= 1;
            val = stripped;
        }

        match val {
            "count" => {
                self.metadata_entry = MetadataEntry::Count;
                Ok((ScanState::MetadataColon, TokenKind::Count))
            }
            "tags" => {
                self.metadata_entry = MetadataEntry::Tags;
                Ok((ScanState::MetadataColon, TokenKind::Tags))
            }
            "" => {
                self.metadata_entry = MetadataEntry::MetadataEof;
                self.scan_close_brace()
            }
            _ => self.error("invalid metadata field"),
        }
    }

    fn scan_metadata_colon(&mut self) -> Step {
        let val = self.consume_string();
        if val != ":" {
            return self.error("expected colon (:)");
        }
        match self.metadata_entry {
            MetadataEntry::Count => Ok((ScanState::MetadataCount, TokenKind::Colon)),
            MetadataEntry::Tags => Ok((ScanState::OpenBrace, TokenKind::Colon)),
            MetadataEntry::MetadataEof => self.error("invalid metadata field"),
        }
    }

    fn scan_metadata_count(&mut self) -> Step {
        let val = self.consume_string();
        match val.parse::<i64>() {
            Ok(count) => Ok((ScanState::MetadataEntry, TokenKind::CountValue(count))),
            Err(_) => self.error(format!("invalid count '{val}'")),
        }
    }

    fn scan_gen_fn_keyword(&mut self) -> Step {
        let val = self.consume_string();
        if val.is_empty() {
            // End of the gens section.
            return self.scan_close_brace();
        }
        if val != KEYWORD_FUNC {
            return self.error(format!(
                "invalid gens body, expected {KEYWORD_FUNC}, got '{val}'"
            ));
        }
        Ok((ScanState::GenFnName, TokenKind::Func))
    }

    fn scan_gen_fn_name(&mut self) -> Step {
        let val = self.consume_string();
        if !is_identifier(val) {
            let got = if val.is_empty() {
                describe(self.peek_char()).to_string()
            } else {
                val.to_string()
            };
            return self.error(format!("expected gen fn name, got '{got}'"));
        }
        Ok((ScanState::OpenParen, TokenKind::FnName(val.to_string())))
    }

    fn scan_open_paren(&mut self) -> Step {
        match self.next_char() {
            Some('(') => Ok((ScanState::GenFnParams, TokenKind::LParen)),
            other => {
                self.backup_if(other);
                self.error(format!("expected '(', got '{}'", describe(other)))
            }
        }
    }

    fn scan_gen_fn_params(&mut self) -> Step {
        let start = self.pos;
        let mut depth = 0usize;
        loop {
            match self.next_char() {
                Some('(') => depth += 1,
                Some(')') if depth == 0 => {
                    self.backup();
                    let params = self.input[start..self.pos].to_string();
                    return Ok((ScanState::CloseParen, TokenKind::FnParams(params)));
                }
                Some(')') => depth -= 1,
                Some(_) => {}
                None => return self.error("invalid fn params incomplete body"),
            }
        }
    }

    fn scan_close_paren(&mut self) -> Step {
        match self.next_char() {
            Some(')') => {
                self.section = Section::GenFn;
                Ok((ScanState::OpenBrace, TokenKind::RParen))
            }
            other => {
                self.backup_if(other);
                self.error(format!("expected ')', got '{}'", describe(other)))
            }
        }
    }

    /// Maximal run of bytes that are not whitespace, braces or parens.
    fn consume_string(&mut self) -> &'a str {
        self.skip_trivia();
        let start = self.pos;
        while let Some(c) = self.next_char() {
            if c.is_whitespace() || matches!(c, '{' | '}' | '(' | ')') {
                self.backup();
                break;
            }
        }
        &self.input[start..self.pos]
    }

    /// Text up to, not including, the `}` matching the brace just consumed.
    ///
    /// Braces inside string, raw string and char literals and inside comments do not count
    /// towards nesting. Returns `None` when the input ends first.
    fn consume_body_till_rbrace(&mut self) -> Option<&'a str> {
        self.skip_trivia();
        let start = self.pos;
        let mut nesting = 1usize;
        loop {
            match self.next_char()? {
                '{' => nesting += 1,
                '}' => {
                    nesting -= 1;
                    if nesting == 0 {
                        self.backup();
                        return Some(&self.input[start..self.pos]);
                    }
                }
                '"' => self.skip_string_literal()?,
                '\'' => self.skip_char_literal(),
                'r' => self.skip_raw_string()?,
                '/' if self.peek_char() == Some('/') => self.skip_line(),
                '/' if self.peek_char() == Some('*') => self.skip_block_comment()?,
                _ => {}
            }
        }
    }

    fn skip_string_literal(&mut self) -> Option<()> {
        loop {
            match self.next_char()? {
                '\\' => {
                    self.next_char()?;
                }
                '"' => return Some(()),
                _ => {}
            }
        }
    }

    /// Skip the rest of `r"..."`, `r#"..."#` or `br#"..."#` after its `r`.
    ///
    /// An `r` that ends an identifier, or starts a raw identifier such as `r#type`, is left alone.
    fn skip_raw_string(&mut self) -> Option<()> {
        let r_pos = self.pos - 1;
        let mut before = self.input[..r_pos].chars().rev();
        let starts_token = match before.next() {
            Some('b') => !before.next().is_some_and(is_ident_char),
            Some(c) => !is_ident_char(c),
            None => true,
        };
        if !starts_token {
            return Some(());
        }

        let rest = &self.input[self.pos..];
        let hashes = rest.bytes().take_while(|&b| b == b'#').count();
        if rest.as_bytes().get(hashes) != Some(&b'"') {
            return Some(());
        }
        let terminator = format!("\"{}", "#".repeat(hashes));
        let content = &rest[hashes + 1..];
        let end = content.find(&terminator)?;
        self.pos += hashes + 1 + end + terminator.len();
        self.width = 0;
        Some(())
    }

    /// Skip a `/* .. */` comment after its `/`, honouring nested comments.
    fn skip_block_comment(&mut self) -> Option<()> {
        self.next_char()?;
        let mut depth = 1usize;
        loop {
            match self.next_char()? {
                '/' if self.peek_char() == Some('*') => {
                    self.next_char();
                    depth += 1;
                }
                '*' if self.peek_char() == Some('/') => {
                    self.next_char();
                    depth -= 1;
                    if depth == 0 {
                        return Some(());
                    }
                }
                _ => {}
            }
        }
    }

    /// Skip `'x'` or `'\n'`; a lifetime such as `'a` is left alone.
    fn skip_char_literal(&mut self) {
        let rest = &self.input[self.pos..];
        let mut chars = rest.char_indices();
        let skip = match (chars.next(), chars.next(), chars.next()) {
            (Some((_, '\\')), Some(_), _) => rest[1..].find('\'').map(|idx| idx + 2),
            (Some(_), Some((idx, '\'')), _) => Some(idx + 1),
            _ => None,
        };
        if let Some(skip) = skip {
            self.pos += skip;
            self.width = 0;
        }
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.next_char() {
            if c == '\n' {
                break;
            }
        }
    }

    /// Skip whitespace and `//` comments, repeatedly.
    fn skip_trivia(&mut self) {
        loop {
            while let Some(c) = self.peek_char() {
                if !c.is_whitespace() {
                    break;
                }
                self.next_char();
            }
            if !self.input[self.pos..].starts_with(COMMENT_MARKER) {
                return;
            }
            self.pos += COMMENT_MARKER.len();
            self.skip_line();
        }
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.input[self.pos..].chars().next()?;
        self.width = c.len_utf8();
        self.pos += self.width;
        Some(c)
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn backup(&mut self) {
        self.pos -= self.width;
        self.width = 0;
    }

    fn backup_if(&mut self, consumed: Option<char>) {
        if consumed.is_some() {
            self.backup();
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn describe(c: Option<char>) -> String {
    c.map(String::from).unwrap_or_else(|| "EOF".to_string())
}

fn is_identifier(val: &str) -> bool {
    let mut chars = val.chars();
    match chars.next() {
        Some(first) if first == '_' || first.is_alphabetic() => {
            chars.all(|c| c == '_' || c.is_alphanumeric())
        }
        _ => false,
    }
}
