use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("failed to register template\n  template: {name}\n  cause: {source}")]
    Template {
        name: &'static str,
        #[source]
        source: Box<handlebars::TemplateError>,
    },
    #[error("failed to render template\n  template: {template}\n  path: {path}\n  cause: {message}")]
    Render {
        template: &'static str,
        path: PathBuf,
        message: String,
    },
    #[error("failed to write generated file\n  path: {path}\n  cause: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "`{name}` is declared more than once in {location}; a model file and a directory at the same level cannot share a name"
    )]
    AccessorClash { location: String, name: String },
    #[error("unsupported sink kind {0:?}, expected mysql or postgres")]
    UnsupportedSink(String),
}

impl CodegenError {
    pub(crate) fn render(
        template: &'static str,
        path: impl Into<PathBuf>,
        message: impl ToString,
    ) -> Self {
        Self::Render {
            template,
            path: path.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CodegenError>;
