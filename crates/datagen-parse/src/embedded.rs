//! Adapter between the DSL and the Rust fragments embedded in it.
//!
//! Field types, generator parameters, generator bodies and calls are Rust source. They are
//! parsed with `syn` only to extract names, arities and whether a value is returned; the text
//! itself is forwarded to the generated program unchanged.

use std::collections::BTreeMap;

use quote::ToTokens;
use syn::visit::{self, Visit};

use datagen_core::{CallExpression, CodeBlock, Field, Param, TypeExpr};

use crate::errors::{ParseError, Result};

/// Parser for embedded fragments.
pub trait EmbeddedParser {
    /// Parse a single type, e.g. `Vec<String>` or `fn(lo: i64, hi: i64) -> i64`.
    fn parse_type(&self, text: &str) -> Result<TypeExpr>;

    /// Parse the contents of a `fields { .. }` section.
    fn parse_field_list(&self, text: &str) -> Result<Vec<Field>>;

    /// Parse a generator parameter list, without the surrounding parens.
    fn parse_param_list(&self, text: &str) -> Result<Vec<Param>>;

    /// Parse a block body, without the surrounding braces.
    fn parse_block(&self, text: &str) -> Result<CodeBlock>;

    /// Parse the contents of a `calls { .. }` section.
    fn parse_call_list(&self, text: &str) -> Result<Vec<CallExpression>>;

    /// Parse the contents of a `tags: { .. }` literal.
    fn parse_string_map(&self, text: &str) -> Result<BTreeMap<String, String>>;
}

/// [`EmbeddedParser`] backed by `syn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SynParser;

impl EmbeddedParser for SynParser {
    fn parse_type(&self, text: &str) -> Result<TypeExpr> {
        let ty: syn::Type =
            syn::parse_str(text).map_err(|err| ParseError::embedded("type", err))?;
        type_expr(&ty)
    }

    fn parse_field_list(&self, text: &str) -> Result<Vec<Field>> {
        let fields: syn::FieldsNamed = syn::parse_str(&format!("{{{text}}}"))
            .map_err(|err| ParseError::embedded("field list", err))?;

        fields
            .named
            .iter()
            .map(|field| {
                let name = field
                    .ident
                    .as_ref()
                    .map(ToString::to_string)
                    .ok_or_else(|| ParseError::embedded("field list", "unnamed field"))?;
                Ok(Field::new(name, type_expr(&field.ty)?))
            })
            .collect()
    }

    fn parse_param_list(&self, text: &str) -> Result<Vec<Param>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let signature: syn::Signature = syn::parse_str(&format!("fn __datagen_params({text})"))
            .map_err(|err| ParseError::embedded("parameter list", err))?;

        signature
            .inputs
            .iter()
            .map(|input| match input {
                syn::FnArg::Typed(pat_type) => match pat_type.pat.as_ref() {
                    syn::Pat::Ident(ident) => Ok(Param::new(
                        ident.ident.to_string(),
                        render_tokens(&pat_type.ty),
                    )),
                    other => Err(ParseError::embedded(
                        "parameter list",
                        format!("unsupported parameter pattern '{}'", render_tokens(other)),
                    )),
                },
                syn::FnArg::Receiver(_) => Err(ParseError::embedded(
                    "parameter list",
                    "self parameters are not allowed",
                )),
            })
            .collect()
    }

    fn parse_block(&self, text: &str) -> Result<CodeBlock> {
        let block: syn::Block = syn::parse_str(&format!("{{{text}}}"))
            .map_err(|err| ParseError::embedded("block", err))?;

        let mut finder = ReturnFinder::default();
        finder.visit_block(&block);

        Ok(CodeBlock {
            text: text.trim().to_string(),
            has_return: finder.found || has_tail_expression(&block),
        })
    }

    fn parse_call_list(&self, text: &str) -> Result<Vec<CallExpression>> {
        split_top_level(text, &[',', ';', '\n'])
            .into_iter()
            .map(str::trim)
            .filter(|entry| !entry.is_empty() && !entry.starts_with("//"))
            .map(parse_call)
            .collect()
    }

    fn parse_string_map(&self, text: &str) -> Result<BTreeMap<String, String>> {
        let stripped = strip_line_comments(text);
        let trimmed = stripped.trim();
        if trimmed.ends_with(',') {
            return Err(ParseError::TrailingComma);
        }
        if trimmed.is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&format!("{{{trimmed}}}"))
            .map_err(|err| ParseError::embedded("tags", err))
    }
}

fn type_expr(ty: &syn::Type) -> Result<TypeExpr> {
    match ty {
        syn::Type::BareFn(func) => {
            let params = func
                .inputs
                .iter()
                .enumerate()
                .map(|(idx, arg)| {
                    let name = arg
                        .name
                        .as_ref()
                        .map(|(ident, _)| ident.to_string())
                        .unwrap_or_else(|| format!("arg{idx}"));
                    Param::new(name, render_tokens(&arg.ty))
                })
                .collect();
            let output = match &func.output {
                syn::ReturnType::Default => None,
                syn::ReturnType::Type(_, ty) => Some(render_tokens(ty)),
            };
            Ok(TypeExpr::Function { params, output })
        }
        syn::Type::Paren(inner) => type_expr(&inner.elem),
        other => Ok(TypeExpr::plain(render_tokens(other))),
    }
}

fn parse_call(raw: &str) -> Result<CallExpression> {
    let cleaned = strip_line_comments(raw);
    let entry = cleaned.trim();
    let not_a_call = || {
        ParseError::embedded(
            "calls",
            format!("calls body must contain only call expressions, got '{entry}'"),
        )
    };

    let expr: syn::Expr =
        syn::parse_str(entry).map_err(|err| ParseError::embedded("calls", err))?;
    let syn::Expr::Call(call) = expr else {
        return Err(not_a_call());
    };
    let syn::Expr::Path(path) = call.func.as_ref() else {
        return Err(not_a_call());
    };
    let target = path
        .path
        .get_ident()
        .map(ToString::to_string)
        .ok_or_else(not_a_call)?;

    // Keep argument text as written rather than re-rendering the token stream.
    let open = entry.find('(').ok_or_else(not_a_call)?;
    let close = entry.rfind(')').ok_or_else(not_a_call)?;
    let args = split_top_level(&entry[open + 1..close], &[','])
        .into_iter()
        .map(str::trim)
        .filter(|arg| !arg.is_empty())
        .map(ToString::to_string)
        .collect::<Vec<_>>();

    if args.len() != call.args.len() {
        return Err(ParseError::embedded(
            "calls",
            format!("could not split arguments of '{entry}'"),
        ));
    }

    Ok(CallExpression { target, args })
}

#[derive(Default)]
struct ReturnFinder {
    found: bool,
}

impl<'ast> Visit<'ast> for ReturnFinder {
    fn visit_expr_return(&mut self, node: &'ast syn::ExprReturn) {
        self.found = true;
        visit::visit_expr_return(self, node);
    }
}

fn has_tail_expression(block: &syn::Block) -> bool {
    matches!(
        block.stmts.last(),
        Some(syn::Stmt::Expr(_, None))
            | Some(syn::Stmt::Macro(syn::StmtMacro {
                semi_token: None,
                ..
            }))
    )
}

/// Render tokens compactly, e.g. `Vec < u8 >` as `Vec<u8>`.
pub(crate) fn render_tokens<T: ToTokens + ?Sized>(tokens: &T) -> String {
    let raw = tokens.to_token_stream().to_string();
    let mut out = raw
        .replace(" < ", "<")
        .replace("< ", "<")
        .replace(" <", "<")
        .replace(" >", ">")
        .replace(" ,", ",")
        .replace(" :: ", "::")
        .replace(":: ", "::")
        .replace(" ;", ";")
        .replace("& ", "&");
    out.truncate(out.trim_end().len());
    out
}

/// Split on any of `separators` at nesting depth zero, outside string and char literals.
pub(crate) fn split_top_level<'a>(text: &'a str, separators: &[char]) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            '/' if matches!(chars.peek(), Some((_, '/'))) => {
                // Line comment; the newline ending it is still a separator.
                while let Some((_, next)) = chars.peek() {
                    if *next == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            _ if depth == 0 && separators.contains(&c) => {
                parts.push(&text[start..idx]);
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Remove `//` comments that are not inside string literals.
fn strip_line_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        if c == '/' && chars.peek() == Some(&'/') {
            for next in chars.by_ref() {
                if next == '\n' {
                    out.push('\n');
                    break;
                }
            }
            continue;
        }
        if c == '"' {
            in_string = true;
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_list_supports_plain_and_function_types() {
        let fields = SynParser
            .parse_field_list(
                "id: i64, tags: Vec<String>, score: fn(lo: i64, hi: i64) -> f64, flag: fn() -> bool,",
            )
            .unwrap();

        assert_eq!(fields.len(), 4);
        assert_eq!(fields[0].ty, TypeExpr::plain("i64"));
        assert_eq!(fields[1].ty, TypeExpr::plain("Vec<String>"));
        assert_eq!(
            fields[2].ty,
            TypeExpr::Function {
                params: vec![Param::new("lo", "i64"), Param::new("hi", "i64")],
                output: Some("f64".to_string()),
            }
        );
        assert_eq!(fields[3].ty.arity(), 0);
    }

    #[test]
    fn empty_field_list_is_empty() {
        assert!(SynParser.parse_field_list("  ").unwrap().is_empty());
    }

    #[test]
    fn param_list_extracts_names_and_types() {
        let params = SynParser
            .parse_param_list("iter: usize, names: &[&str]")
            .unwrap();
        assert_eq!(
            params,
            vec![Param::new("iter", "usize"), Param::new("names", "&[&str]")]
        );
        assert!(SynParser.parse_param_list("").unwrap().is_empty());
        assert!(SynParser.parse_param_list("&self").is_err());
    }

    #[test]
    fn block_detects_nested_returns_and_tail_expressions() {
        let nested = SynParser
            .parse_block("if iter > 3 { return 1; } let x = 2;")
            .unwrap();
        assert!(nested.has_return);

        let tail = SynParser.parse_block("let x = iter * 2;\n x as i64").unwrap();
        assert!(tail.has_return);

        let macro_tail = SynParser.parse_block(r#"format!("user-{}", iter)"#).unwrap();
        assert!(macro_tail.has_return);

        let none = SynParser.parse_block("let x = 1;").unwrap();
        assert!(!none.has_return);

        assert!(SynParser.parse_block("let = ;").is_err());
    }

    #[test]
    fn call_list_keeps_argument_text() {
        let calls = SynParser
            .parse_call_list("score(1, 100)\nlabel(\"a, b\".to_string());  flag()")
            .unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].target, "score");
        assert_eq!(calls[0].args, vec!["1", "100"]);
        assert_eq!(calls[1].args, vec!["\"a, b\".to_string()"]);
        assert!(calls[2].args.is_empty());
    }

    #[test]
    fn call_list_rejects_non_calls() {
        let err = SynParser.parse_call_list("score(1), x + 1").unwrap_err();
        assert!(err.to_string().contains("only call expressions"));
    }

    #[test]
    fn tags_parse_to_map() {
        let tags = SynParser
            .parse_string_map(r#" "env": "prod", "team": "x" "#)
            .unwrap();
        assert_eq!(tags.get("env").map(String::as_str), Some("prod"));
        assert_eq!(tags.get("team").map(String::as_str), Some("x"));
    }

    #[test]
    fn tags_reject_trailing_comma() {
        for body in [
            r#""env": "prod","#,
            "\"env\": \"prod\",   \n  ",
            "\"env\": \"prod\", // owner comes later\n",
        ] {
            let err = SynParser.parse_string_map(body).unwrap_err();
            assert_eq!(err, ParseError::TrailingComma);
            assert!(err.to_string().contains("trailing comma"));
        }
    }

    #[test]
    fn tags_keep_comment_markers_inside_strings() {
        let tags = SynParser
            .parse_string_map(r#""url": "http://example.com" // docs"#)
            .unwrap();
        assert_eq!(tags.get("url").map(String::as_str), Some("http://example.com"));
    }

    #[test]
    fn render_tokens_is_compact() {
        let ty: syn::Type = syn::parse_str("std::collections::HashMap<String, Vec<u8>>").unwrap();
        assert_eq!(
            render_tokens(&ty),
            "std::collections::HashMap<String, Vec<u8>>"
        );
    }
}
