//! Render contexts handed to the templates.
//!
//! Everything a template prints is computed here, so templates stay free of logic beyond
//! `#each` and `#if`.

use std::collections::BTreeSet;

use datagen_core::{DG_DIR_DELIMITER, DirectoryNode, Field, GenFunction, ModelDefinition};
use datagen_runtime::SinkKind;
use serde::Serialize;

use crate::errors::{self, CodegenError};
use crate::names::{rust_ident, str_literal};

#[derive(Debug, Clone, Serialize)]
pub struct TagView {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldView {
    pub name: String,
    pub value_type: String,
    /// Expression producing the value for cache slot `next`.
    pub gen_call: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParamView {
    pub name: String,
    pub ty: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenView {
    pub name: String,
    pub params: Vec<ParamView>,
    pub value_type: String,
    pub body: String,
}

/// Context of every per-model section.
#[derive(Debug, Clone, Serialize)]
pub struct ModelView {
    pub name: String,
    pub name_lit: String,
    pub xml_tag: String,
    pub module: String,
    pub misc: String,
    pub count: usize,
    pub tags: Vec<TagView>,
    pub fields: Vec<FieldView>,
    pub gens: Vec<GenView>,
    pub serialiser: String,
}

impl ModelView {
    /// Build the context, failing on models that would not compile.
    pub fn build(model: &ModelDefinition) -> Result<Self, String> {
        let fields = model
            .fields()
            .iter()
            .map(|field| field_view(model, field))
            .collect::<Result<Vec<_>, _>>()?;
        let gens = model
            .gen_functions()
            .iter()
            .map(|func| gen_view(model, func))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: model.base_name().to_string(),
            name_lit: str_literal(&model.qualified_name),
            xml_tag: str_literal(model.base_name()),
            module: rust_ident(&model.qualified_name),
            misc: model.misc.clone().unwrap_or_default(),
            count: model.metadata.count,
            tags: model
                .metadata
                .tags
                .iter()
                .map(|(key, value)| TagView {
                    key: str_literal(key),
                    value: str_literal(value),
                })
                .collect(),
            fields,
            gens,
            serialiser: model.serialiser.clone().unwrap_or_default(),
        })
    }
}

fn value_type(field: &Field) -> Result<String, String> {
    field
        .ty
        .value_type()
        .map(str::to_string)
        .ok_or_else(|| format!("field {} must declare a return type", field.name))
}

fn field_view(model: &ModelDefinition, field: &Field) -> Result<FieldView, String> {
    let func = model
        .gen_function(&field.name)
        .ok_or_else(|| format!("field {} has no gen function", field.name))?;

    let gen_call = if func.params.is_empty() {
        format!("self.gen_{}()", field.name)
    } else {
        let mut args = vec!["next as _".to_string()];
        args.extend(field.init_args.iter().flatten().cloned());
        format!("self.gen_{}({})", field.name, args.join(", "))
    };

    Ok(FieldView {
        name: field.name.clone(),
        value_type: value_type(field)?,
        gen_call,
    })
}

fn gen_view(model: &ModelDefinition, func: &GenFunction) -> Result<GenView, String> {
    let field = model
        .field(&func.name)
        .ok_or_else(|| format!("gen func {} has no matching field", func.name))?;
    Ok(GenView {
        name: func.name.clone(),
        params: func
            .params
            .iter()
            .map(|param| ParamView {
                name: param.name.clone(),
                ty: param.ty.clone(),
            })
            .collect(),
        value_type: value_type(field)?,
        body: func.body.text.clone(),
    })
}

/// Context of one model's table binding for one backend.
#[derive(Debug, Clone, Serialize)]
pub struct BindingView {
    pub kind: &'static str,
    pub variant: &'static str,
    pub module: String,
    pub table: String,
    pub columns: Vec<String>,
    pub quoted_columns: String,
}

impl BindingView {
    pub fn build(kind: SinkKind, model: &ModelDefinition) -> Self {
        let names: Vec<&str> = model.fields().iter().map(|f| f.name.as_str()).collect();
        let quoted: Vec<String> = names
            .iter()
            .map(|name| match kind {
                SinkKind::Mysql => format!("`{name}`"),
                SinkKind::Postgres => format!("\"{name}\""),
            })
            .collect();
        Self {
            kind: kind.as_str(),
            variant: variant(kind),
            module: rust_ident(&model.qualified_name),
            table: str_literal(model.base_name()),
            columns: names.iter().map(|name| str_literal(name)).collect(),
            quoted_columns: str_literal(&quoted.join(", ")),
        }
    }
}

fn variant(kind: SinkKind) -> &'static str {
    match kind {
        SinkKind::Mysql => "Mysql",
        SinkKind::Postgres => "Postgres",
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SinkKindView {
    pub module: &'static str,
    pub variant: &'static str,
    pub sink_type: &'static str,
    pub adapter: &'static str,
    pub sqlx_feature: &'static str,
}

impl SinkKindView {
    pub fn new(kind: SinkKind) -> Self {
        let (adapter, sqlx_feature) = match kind {
            SinkKind::Mysql => ("MySqlSink", "mysql"),
            SinkKind::Postgres => ("PostgresSink", "postgres"),
        };
        Self {
            module: kind.as_str(),
            variant: variant(kind),
            sink_type: kind.as_str(),
            adapter,
            sqlx_feature,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessorView {
    pub accessor: String,
    pub target: String,
}

/// One level of the generated registry tree.
#[derive(Debug, Clone, Serialize)]
pub struct DirView {
    pub struct_name: String,
    /// Source directory this level mirrors, for error messages.
    #[serde(skip)]
    pub location: String,
    pub models: Vec<AccessorView>,
    pub children: Vec<AccessorView>,
}

/// Path from the registry root to a model generator, e.g. `datagen.billing.Invoice`.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryEntry {
    pub module: String,
    pub path: String,
}

/// Context shared by the once-per-run artifacts.
#[derive(Debug, Clone, Serialize)]
pub struct CommonsView {
    pub package_name: String,
    pub modules: Vec<String>,
    pub root: DirView,
    pub dirs: Vec<DirView>,
    pub registry: Vec<RegistryEntry>,
    pub bindings: Vec<BindingView>,
    pub sink_kinds: Vec<SinkKindView>,
    pub runtime_modules: Vec<&'static str>,
    pub sqlx_features: String,
}

impl CommonsView {
    pub fn build(
        package_name: &str,
        models: &[ModelDefinition],
        tree: &DirectoryNode,
        sinks: &[SinkKind],
    ) -> errors::Result<Self> {
        let known: BTreeSet<&str> = models.iter().map(|m| m.qualified_name.as_str()).collect();
        let mut placed = BTreeSet::new();
        let mut dirs = Vec::new();
        let mut registry = Vec::new();

        let mut root = walk(
            tree,
            &[],
            "datagen",
            &known,
            models,
            &mut placed,
            &mut dirs,
            &mut registry,
        );
        root.struct_name = "Datagen".to_string();

        // Units handed in without a place in the tree hang off the root.
        for model in models {
            if placed.contains(model.qualified_name.as_str()) {
                continue;
            }
            let accessor = rust_ident(model.base_name());
            let module = rust_ident(&model.qualified_name);
            registry.push(RegistryEntry {
                module: module.clone(),
                path: format!("datagen.{accessor}"),
            });
            root.models.push(AccessorView {
                accessor,
                target: module,
            });
        }

        let bindings = sinks
            .iter()
            .flat_map(|kind| models.iter().map(|model| BindingView::build(*kind, model)))
            .collect();
        let features: Vec<String> = sinks
            .iter()
            .map(|kind| format!("{:?}", SinkKindView::new(*kind).sqlx_feature))
            .collect();

        let mut runtime_modules: Vec<&'static str> =
            datagen_runtime::SOURCES.iter().map(|(name, _)| *name).collect();
        runtime_modules.extend(sinks.iter().map(|kind| kind.as_str()));
        runtime_modules.sort_unstable();

        for level in std::iter::once(&root).chain(&dirs) {
            check_accessors(level)?;
        }

        Ok(Self {
            package_name: package_name.to_string(),
            modules: models.iter().map(|m| rust_ident(&m.qualified_name)).collect(),
            root,
            dirs,
            registry,
            bindings,
            sink_kinds: sinks.iter().map(|kind| SinkKindView::new(*kind)).collect(),
            runtime_modules,
            sqlx_features: features.join(", "),
        })
    }
}

/// Members of one registry level become struct fields and methods, so their names must differ.
fn check_accessors(level: &DirView) -> errors::Result<()> {
    let mut seen: BTreeSet<&str> = BTreeSet::from(["__links"]);
    for member in level.models.iter().chain(&level.children) {
        if !seen.insert(member.accessor.as_str()) {
            return Err(CodegenError::AccessorClash {
                location: level.location.clone(),
                name: member.accessor.clone(),
            });
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn walk<'a>(
    node: &'a DirectoryNode,
    segments: &[&'a str],
    path: &str,
    known: &BTreeSet<&str>,
    models: &[ModelDefinition],
    placed: &mut BTreeSet<&'a str>,
    dirs: &mut Vec<DirView>,
    registry: &mut Vec<RegistryEntry>,
) -> DirView {
    let mut view = DirView {
        struct_name: format!("Dir_{}", rust_ident(&segments.join(DG_DIR_DELIMITER))),
        location: if segments.is_empty() {
            "the source root".to_string()
        } else {
            format!("directory {}", segments.join("/"))
        },
        models: Vec::new(),
        children: Vec::new(),
    };

    for qualified in node.models.keys() {
        if !known.contains(qualified.as_str()) {
            continue;
        }
        let Some(model) = models.iter().find(|m| &m.qualified_name == qualified) else {
            continue;
        };
        placed.insert(qualified.as_str());
        let accessor = rust_ident(model.base_name());
        let module = rust_ident(qualified);
        registry.push(RegistryEntry {
            module: module.clone(),
            path: format!("{path}.{accessor}"),
        });
        view.models.push(AccessorView {
            accessor,
            target: module,
        });
    }

    for child in &node.children {
        let mut nested = segments.to_vec();
        nested.push(child.name.as_str());
        let accessor = rust_ident(&child.name);
        let child_view = walk(
            child,
            &nested,
            &format!("{path}.{accessor}"),
            known,
            models,
            placed,
            dirs,
            registry,
        );
        view.children.push(AccessorView {
            accessor,
            target: child_view.struct_name.clone(),
        });
        dirs.push(child_view);
    }

    view
}
