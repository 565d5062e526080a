use std::path::{Path, PathBuf};
use std::time::Instant;

use datagen_core::{DirectoryNode, ModelDefinition};
use datagen_runtime::SinkKind;
use handlebars::Handlebars;
use serde::Serialize;
use tracing::{debug, info};

use crate::errors::{CodegenError, Result};
use crate::names::rust_ident;
use crate::options::CodegenOptions;
use crate::project::{GeneratedFile, GeneratedProject};
use crate::templates::{COMMONS, MODEL_SECTIONS, SINK_BINDING};
use crate::views::{BindingView, CommonsView, ModelView};

/// Renders validated models into the sources of a standalone Cargo project.
pub struct CodegenEngine {
    registry: Handlebars<'static>,
    options: CodegenOptions,
}

impl CodegenEngine {
    pub fn new(options: CodegenOptions) -> Result<Self> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(handlebars::no_escape);

        for &(name, source) in MODEL_SECTIONS.iter().chain(COMMONS) {
            registry
                .register_template_string(name, source)
                .map_err(|source| CodegenError::Template {
                    name,
                    source: Box::new(source),
                })?;
        }

        Ok(Self { registry, options })
    }

    pub fn options(&self) -> &CodegenOptions {
        &self.options
    }

    /// Render every artifact. Nothing is returned unless all of them render.
    pub fn generate(
        &self,
        models: &[ModelDefinition],
        tree: &DirectoryNode,
    ) -> Result<GeneratedProject> {
        let started = Instant::now();
        let mut files = Vec::new();

        for model in models {
            files.push(self.render_model(model)?);
        }

        let commons = CommonsView::build(
            &self.options.package_name,
            models,
            tree,
            &self.options.sinks,
        )?;
        files.extend(self.render_commons(&commons)?);

        for kind in &self.options.sinks {
            for model in models {
                let view = BindingView::build(*kind, model);
                let path = Path::new("src/sinks")
                    .join(kind.as_str())
                    .join(format!("{}.rs", view.module));
                files.push(self.render(SINK_BINDING, path, &view)?);
            }
        }

        files.extend(self.runtime_files(&self.options.sinks)?);

        info!(
            event = "codegen_finished",
            models = models.len(),
            files = files.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "generated project sources"
        );
        Ok(GeneratedProject { files })
    }

    fn render_model(&self, model: &ModelDefinition) -> Result<GeneratedFile> {
        let path = PathBuf::from("src/models")
            .join(format!("{}.rs", rust_ident(&model.qualified_name)));
        let view = ModelView::build(model)
            .map_err(|message| CodegenError::render("model", &path, message))?;

        let mut contents = String::new();
        for &(section, _) in MODEL_SECTIONS {
            let rendered = self
                .registry
                .render(section, &view)
                .map_err(|err| CodegenError::render(section, &path, err))?;
            contents.push_str(&rendered);
        }
        debug!(model = %model.qualified_name, path = %path.display(), "rendered model");

        self.checked(GeneratedFile {
            path,
            contents,
            template: "model",
        })
    }

    fn render_commons(&self, view: &CommonsView) -> Result<Vec<GeneratedFile>> {
        let mut files = vec![
            self.render("cargo_toml", "Cargo.toml", view)?,
            self.render("main", "src/main.rs", view)?,
            self.render("commands", "src/commands.rs", view)?,
            self.render("model_manager", "src/model_manager.rs", view)?,
            self.render("sink_manager", "src/sink_manager.rs", view)?,
            self.render("tags", "src/tags.rs", view)?,
            self.render("runtime_mod", "src/runtime/mod.rs", view)?,
            self.render("models_mod", "src/models/mod.rs", view)?,
            self.render("sinks_mod", "src/sinks/mod.rs", view)?,
        ];
        for kind in &view.sink_kinds {
            let path = Path::new("src/sinks").join(kind.module).join("mod.rs");
            files.push(self.render("sink_kind_mod", path, view)?);
        }
        Ok(files)
    }

    fn runtime_files(&self, sinks: &[SinkKind]) -> Result<Vec<GeneratedFile>> {
        datagen_runtime::SOURCES
            .iter()
            .copied()
            .chain(sinks.iter().map(|kind| datagen_runtime::sink_source(*kind)))
            .map(|(module, source)| {
                self.checked(GeneratedFile {
                    path: Path::new("src/runtime").join(format!("{module}.rs")),
                    contents: source.to_string(),
                    template: module,
                })
            })
            .collect()
    }

    fn render<T: Serialize>(
        &self,
        template: &'static str,
        path: impl Into<PathBuf>,
        data: &T,
    ) -> Result<GeneratedFile> {
        let path = path.into();
        let contents = self
            .registry
            .render(template, data)
            .map_err(|err| CodegenError::render(template, &path, err))?;
        self.checked(GeneratedFile {
            path,
            contents,
            template,
        })
    }

    /// Reject Rust sources that do not parse.
    fn checked(&self, file: GeneratedFile) -> Result<GeneratedFile> {
        let is_rust = file.path.extension().is_some_and(|ext| ext == "rs");
        if self.options.verify_syntax && is_rust {
            syn::parse_file(&file.contents).map_err(|err| {
                CodegenError::render(
                    file.template,
                    &file.path,
                    format!("generated code does not parse: {err}"),
                )
            })?;
        }
        Ok(file)
    }
}
