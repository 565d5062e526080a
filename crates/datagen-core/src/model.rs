use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Separator placed between directory segments and the file stem in a qualified name.
///
/// It has to survive as part of a Rust identifier in generated code, so it only uses
/// lowercase letters and underscores.
pub const DG_DIR_DELIMITER: &str = "___dgdir___";

/// Record count used when a model declares no count, or a non-positive one.
pub const DEFAULT_METADATA_COUNT: usize = 1;

/// Extension of DSL source units.
pub const DG_EXTENSION: &str = "dg";

/// Named, typed parameter of a function-typed field or a generator function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: String,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }
}

/// Structured type of a declared field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeExpr {
    /// Any value type: paths, generics, arrays, tuples, references.
    Plain { ty: String },
    /// `fn(a: A, b: B) -> R`; the field stores `R` and its generator takes the params.
    Function {
        params: Vec<Param>,
        output: Option<String>,
    },
}

impl TypeExpr {
    pub fn plain(ty: impl Into<String>) -> Self {
        Self::Plain { ty: ty.into() }
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Self::Function { .. })
    }

    /// Declared parameter count; zero for plain types.
    pub fn arity(&self) -> usize {
        self.params().len()
    }

    pub fn params(&self) -> &[Param] {
        match self {
            Self::Plain { .. } => &[],
            Self::Function { params, .. } => params,
        }
    }

    /// Type of the value kept in the record for this field.
    pub fn value_type(&self) -> Option<&str> {
        match self {
            Self::Plain { ty } => Some(ty),
            Self::Function { output, .. } => output.as_deref(),
        }
    }
}

/// One declared field of a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub ty: TypeExpr,
    /// Literal arguments taken from the matching `calls` entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_args: Option<Vec<String>>,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: TypeExpr) -> Self {
        Self {
            name: name.into(),
            ty,
            init_args: None,
        }
    }
}

/// Model-level metadata: how many records to produce and the tags used for filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub count: usize,
    pub tags: BTreeMap<String, String>,
    /// Count as written in the source, kept so validation can flag non-positive values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_count: Option<i64>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            count: DEFAULT_METADATA_COUNT,
            tags: BTreeMap::new(),
            declared_count: None,
        }
    }
}

impl Metadata {
    /// Record a declared count, falling back to the default for non-positive values.
    pub fn set_count(&mut self, declared: i64) {
        self.declared_count = Some(declared);
        self.count = usize::try_from(declared)
            .ok()
            .filter(|count| *count > 0)
            .unwrap_or(DEFAULT_METADATA_COUNT);
    }
}

/// Verbatim block of embedded code with the structural facts extracted from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlock {
    pub text: String,
    pub has_return: bool,
}

/// User-supplied generator producing one field's value per iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenFunction {
    pub name: String,
    pub params: Vec<Param>,
    pub body: CodeBlock,
}

/// Literal invocation recorded in the `calls` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallExpression {
    pub target: String,
    pub args: Vec<String>,
}

/// One parsed `.dg` unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDefinition {
    pub name: String,
    pub qualified_name: String,
    pub fields: Option<Vec<Field>>,
    pub metadata: Metadata,
    pub misc: Option<String>,
    pub gen_functions: Option<Vec<GenFunction>>,
    pub calls: Vec<CallExpression>,
    pub serialiser: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<PathBuf>,
}

impl ModelDefinition {
    pub fn new(qualified_name: impl Into<String>) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            ..Self::default()
        }
    }

    /// File stem the model was read from: the last segment of the qualified name.
    pub fn base_name(&self) -> &str {
        let last = self
            .qualified_name
            .rsplit(DG_DIR_DELIMITER)
            .next()
            .unwrap_or(&self.qualified_name);
        last.strip_suffix(".dg").unwrap_or(last)
    }

    pub fn fields(&self) -> &[Field] {
        self.fields.as_deref().unwrap_or_default()
    }

    pub fn gen_functions(&self) -> &[GenFunction] {
        self.gen_functions.as_deref().unwrap_or_default()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields().iter().find(|field| field.name == name)
    }

    pub fn gen_function(&self, name: &str) -> Option<&GenFunction> {
        self.gen_functions().iter().find(|func| func.name == name)
    }

    /// Copy call arguments onto the fields they target. The first matching call wins.
    pub fn attach_init_args(&mut self) {
        let Some(fields) = self.fields.as_mut() else {
            return;
        };
        for field in fields.iter_mut() {
            field.init_args = self
                .calls
                .iter()
                .find(|call| call.target == field.name)
                .map(|call| call.args.clone());
        }
    }
}

/// Join directory segments and a file stem into a qualified model name.
pub fn qualified_name<S: AsRef<str>>(segments: &[S], stem: &str) -> String {
    let mut parts: Vec<&str> = segments
        .iter()
        .map(AsRef::as_ref)
        .filter(|segment| !segment.is_empty())
        .collect();
    parts.push(stem);
    parts.join(DG_DIR_DELIMITER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_name_uses_last_segment() {
        let model = ModelDefinition::new(qualified_name(&["billing", "eu"], "Invoice"));
        assert_eq!(model.qualified_name, "billing___dgdir___eu___dgdir___Invoice");
        assert_eq!(model.base_name(), "Invoice");

        let flat = ModelDefinition::new("users.dg");
        assert_eq!(flat.base_name(), "users");
    }

    #[test]
    fn non_positive_count_falls_back_to_default() {
        let mut metadata = Metadata::default();
        metadata.set_count(-3);
        assert_eq!(metadata.count, DEFAULT_METADATA_COUNT);
        assert_eq!(metadata.declared_count, Some(-3));

        metadata.set_count(25);
        assert_eq!(metadata.count, 25);
    }

    #[test]
    fn init_args_come_from_first_matching_call() {
        let mut model = ModelDefinition::new("orders");
        model.fields = Some(vec![
            Field::new(
                "total",
                TypeExpr::Function {
                    params: vec![Param::new("lo", "i64"), Param::new("hi", "i64")],
                    output: Some("i64".to_string()),
                },
            ),
            Field::new("id", TypeExpr::plain("i64")),
        ]);
        model.calls = vec![
            CallExpression {
                target: "total".to_string(),
                args: vec!["1".to_string(), "10".to_string()],
            },
            CallExpression {
                target: "total".to_string(),
                args: vec!["5".to_string()],
            },
        ];

        model.attach_init_args();

        let total = model.field("total").unwrap();
        assert_eq!(total.init_args.as_deref(), Some(&["1".to_string(), "10".to_string()][..]));
        assert!(model.field("id").unwrap().init_args.is_none());
    }

    #[test]
    fn type_expr_reports_arity_and_value_type() {
        let func = TypeExpr::Function {
            params: vec![Param::new("seed", "u64")],
            output: Some("String".to_string()),
        };
        assert!(func.is_function());
        assert_eq!(func.arity(), 1);
        assert_eq!(func.value_type(), Some("String"));

        let plain = TypeExpr::plain("Vec<u8>");
        assert_eq!(plain.arity(), 0);
        assert_eq!(plain.value_type(), Some("Vec<u8>"));
    }
}
