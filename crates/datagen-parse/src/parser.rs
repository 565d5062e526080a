use std::path::Path;

use tracing::debug;

use datagen_core::{Metadata, ModelDefinition};

use crate::embedded::{EmbeddedParser, SynParser};
use crate::errors::{ParseError, Result};
use crate::scanner::{Scanner, Section, Token, TokenKind};

/// Parse one `.dg` unit with the default `syn` adapter.
pub fn parse_model(source: &str, qualified_name: &str) -> Result<ModelDefinition> {
    parse_model_with(source, qualified_name, &SynParser)
}

/// Parse raw unit bytes as collected from a source tree.
pub fn parse_unit(
    source: &[u8],
    qualified_name: &str,
    source_path: Option<&Path>,
) -> Result<ModelDefinition> {
    let text = std::str::from_utf8(source).map_err(|err| {
        ParseError::syntax(Section::None, err.valid_up_to(), "invalid UTF-8 in source")
    })?;
    let mut model = parse_model(text, qualified_name)?;
    model.source_path = source_path.map(Path::to_path_buf);
    Ok(model)
}

/// Parse one `.dg` unit using `embedded` for the Rust fragments.
pub fn parse_model_with<P: EmbeddedParser + ?Sized>(
    source: &str,
    qualified_name: &str,
    embedded: &P,
) -> Result<ModelDefinition> {
    let parser = Parser {
        scanner: Scanner::new(source),
        embedded,
        model: ModelDefinition::new(qualified_name),
    };
    parser.parse()
}

/// Recursive-descent driver over the scanner's token stream.
struct Parser<'a, P: ?Sized> {
    scanner: Scanner<'a>,
    embedded: &'a P,
    model: ModelDefinition,
}

impl<P: EmbeddedParser + ?Sized> Parser<'_, P> {
    fn parse(mut self) -> Result<ModelDefinition> {
        self.expect(TokenKind::Model, "'model'")?;
        let name = match self.next()?.kind {
            TokenKind::ModelName(name) => name,
            other => return Err(self.unexpected(other, "model name")),
        };
        self.model.name = name;
        self.expect(TokenKind::LBrace, "'{'")?;

        loop {
            let token = self.next()?;
            match token.kind {
                TokenKind::SectionHeader(section) => {
                    self.expect(TokenKind::LBrace, "'{'")?;
                    self.parse_section(section)?;
                }
                TokenKind::RBrace => break,
                other => return Err(self.unexpected(other, "section header or '}'")),
            }
        }

        self.model.attach_init_args();
        debug!(
            model = %self.model.name,
            qualified_name = %self.model.qualified_name,
            fields = self.model.fields().len(),
            gens = self.model.gen_functions().len(),
            "parsed model"
        );
        Ok(self.model)
    }

    fn parse_section(&mut self, section: Section) -> Result<()> {
        match section {
            Section::Fields => {
                let body = self.body()?;
                let fields = self.embedded(|p| p.parse_field_list(&body))?;
                self.model.fields = Some(fields);
                self.expect(TokenKind::RBrace, "'}'")
            }
            Section::Misc => {
                let body = self.body()?;
                self.model.misc = Some(body.trim().to_string());
                self.expect(TokenKind::RBrace, "'}'")
            }
            Section::Calls => {
                let body = self.body()?;
                self.model.calls = self.embedded(|p| p.parse_call_list(&body))?;
                self.expect(TokenKind::RBrace, "'}'")
            }
            Section::Serialiser => {
                let body = self.body()?;
                let block = self.embedded(|p| p.parse_block(&body))?;
                self.model.serialiser = Some(block.text);
                self.expect(TokenKind::RBrace, "'}'")
            }
            Section::Metadata => self.parse_metadata(),
            Section::Gens => self.parse_gens(),
            Section::GenFn | Section::None => Err(self.fail(ParseError::syntax(
                section,
                self.scanner.offset(),
                format!("unexpected section '{section}'"),
            ))),
        }
    }

    fn parse_metadata(&mut self) -> Result<()> {
        let mut metadata = Metadata::default();
        let mut seen_count = false;
        let mut seen_tags = false;

        loop {
            let token = self.next()?;
            match token.kind {
                TokenKind::Count => {
                    self.once(&mut seen_count, "count", &token)?;
                    self.expect(TokenKind::Colon, "':'")?;
                    match self.next()?.kind {
                        TokenKind::CountValue(count) => metadata.set_count(count),
                        other => return Err(self.unexpected(other, "count value")),
                    }
                }
                TokenKind::Tags => {
                    self.once(&mut seen_tags, "tags", &token)?;
                    self.expect(TokenKind::Colon, "':'")?;
                    self.expect(TokenKind::LBrace, "'{'")?;
                    let body = self.body()?;
                    metadata.tags = self.embedded(|p| p.parse_string_map(&body))?;
                    self.expect(TokenKind::RBrace, "'}'")?;
                }
                TokenKind::RBrace => break,
                other => return Err(self.unexpected(other, "'count', 'tags' or '}'")),
            }
        }

        self.model.metadata = metadata;
        Ok(())
    }

    fn parse_gens(&mut self) -> Result<()> {
        let mut gen_functions = Vec::new();

        loop {
            match self.next()?.kind {
                TokenKind::Func => {}
                TokenKind::RBrace => break,
                other => return Err(self.unexpected(other, "'func' or '}'")),
            }

            let name = match self.next()?.kind {
                TokenKind::FnName(name) => name,
                other => return Err(self.unexpected(other, "gen fn name")),
            };
            self.expect(TokenKind::LParen, "'('")?;
            let params_text = match self.next()?.kind {
                TokenKind::FnParams(params) => params,
                other => return Err(self.unexpected(other, "parameter list")),
            };
            self.expect(TokenKind::RParen, "')'")?;
            self.expect(TokenKind::LBrace, "'{'")?;
            let body = self.body()?;
            self.expect(TokenKind::RBrace, "'}'")?;

            let params = self.embedded(|p| p.parse_param_list(&params_text))?;
            let body = self.embedded(|p| p.parse_block(&body))?;
            gen_functions.push(datagen_core::GenFunction { name, params, body });
        }

        self.model.gen_functions = Some(gen_functions);
        Ok(())
    }

    fn next(&mut self) -> Result<Token> {
        self.scanner.next_token()
    }

    fn body(&mut self) -> Result<String> {
        match self.next()?.kind {
            TokenKind::Body(body) => Ok(body),
            other => Err(self.unexpected(other, "body")),
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<()> {
        let token = self.next()?;
        if token.kind == kind {
            Ok(())
        } else {
            Err(self.unexpected(token.kind, what))
        }
    }

    fn once(&mut self, seen: &mut bool, entry: &str, token: &Token) -> Result<()> {
        if std::mem::replace(seen, true) {
            return Err(self.fail(ParseError::syntax(
                Section::Metadata,
                token.offset,
                format!("duplicate metadata entry '{entry}'"),
            )));
        }
        Ok(())
    }

    /// Run an embedded parse, latching its error on the scanner.
    fn embedded<T>(&mut self, parse: impl FnOnce(&P) -> Result<T>) -> Result<T> {
        parse(self.embedded).map_err(|err| self.fail(err))
    }

    fn unexpected(&mut self, got: TokenKind, expected: &str) -> ParseError {
        let err = ParseError::syntax(
            self.scanner.section(),
            self.scanner.offset(),
            format!("expected {expected}, got {got}"),
        );
        self.fail(err)
    }

    fn fail(&mut self, err: ParseError) -> ParseError {
        self.scanner.fail(err)
    }
}
