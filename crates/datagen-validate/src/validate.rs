use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use datagen_core::{CallExpression, ModelDefinition, TypeExpr};

use crate::errors::{ValidationIssue, ValidationReport};

/// Validate a parsed model, accumulating every violation.
pub fn validate_model(model: &ModelDefinition) -> ValidationReport {
    let mut report = ValidationReport::default();

    validate_required_sections(model, &mut report);
    validate_duplicate_fields(model, &mut report);
    validate_missing_gens(model, &mut report);
    validate_extra_gens(model, &mut report);
    validate_gen_returns(model, &mut report);
    validate_calls(model, &mut report);
    validate_file_name(model, &mut report);
    validate_count(model, &mut report);

    debug!(
        model = %model.qualified_name,
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        "validated model"
    );
    report
}

fn validate_required_sections(model: &ModelDefinition, report: &mut ValidationReport) {
    if model.fields.is_none() {
        report.push_error(ValidationIssue::error(
            "missing_section",
            "/fields",
            "model has no fields section",
            Some("add a `fields { .. }` section, even if empty".to_string()),
        ));
    }
    if model.gen_functions.is_none() {
        report.push_error(ValidationIssue::error(
            "missing_section",
            "/gens",
            "model has no gens section",
            Some("add a `gens { .. }` section, even if empty".to_string()),
        ));
    }
}

fn validate_duplicate_fields(model: &ModelDefinition, report: &mut ValidationReport) {
    let mut seen = BTreeSet::new();
    let duplicates: Vec<&str> = model
        .fields()
        .iter()
        .map(|field| field.name.as_str())
        .filter(|name| !seen.insert(*name))
        .collect();

    if !duplicates.is_empty() {
        report.push_error(ValidationIssue::error(
            "duplicate_field",
            "/fields",
            format!("model has duplicate field names: {}", duplicates.join(", ")),
            None,
        ));
    }
}

fn validate_missing_gens(model: &ModelDefinition, report: &mut ValidationReport) {
    if model.fields.is_none() || model.gen_functions.is_none() {
        return;
    }
    let gens = gen_names(model);
    let missing: Vec<&str> = model
        .fields()
        .iter()
        .map(|field| field.name.as_str())
        .filter(|name| !gens.contains(name))
        .collect();

    if !missing.is_empty() {
        report.push_error(ValidationIssue::error(
            "missing_gen",
            "/gens",
            format!("model has missing gen functions: {}", missing.join(", ")),
            Some("every field needs a `func <field>(iter: usize, ..)` in gens".to_string()),
        ));
    }
}

fn validate_extra_gens(model: &ModelDefinition, report: &mut ValidationReport) {
    if model.fields.is_none() || model.gen_functions.is_none() {
        return;
    }
    let fields: BTreeSet<&str> = model.fields().iter().map(|f| f.name.as_str()).collect();
    let extras: Vec<&str> = gen_names(model)
        .into_iter()
        .filter(|name| !fields.contains(name))
        .collect();

    if !extras.is_empty() {
        report.push_error(ValidationIssue::error(
            "extra_gen",
            "/gens",
            format!("found extra gen functions: {}", extras.join(", ")),
            None,
        ));
    }
}

fn validate_gen_returns(model: &ModelDefinition, report: &mut ValidationReport) {
    for gen_fn in model.gen_functions() {
        if !gen_fn.body.has_return {
            report.push_error(ValidationIssue::error(
                "missing_return",
                format!("/gens/{}", gen_fn.name),
                format!("gen func {} must return a value", gen_fn.name),
                Some("end the body with an expression or add a `return`".to_string()),
            ));
        }
    }
}

fn validate_calls(model: &ModelDefinition, report: &mut ValidationReport) {
    if model.fields.is_none() {
        return;
    }

    let mut calls: BTreeMap<&str, Vec<&CallExpression>> = BTreeMap::new();
    for call in &model.calls {
        calls.entry(call.target.as_str()).or_default().push(call);
    }

    let mut function_fields = BTreeSet::new();
    for field in model.fields() {
        let TypeExpr::Function { params, output } = &field.ty else {
            continue;
        };
        if !function_fields.insert(field.name.as_str()) {
            continue;
        }
        let path = format!("/fields/{}", field.name);

        if output.is_none() {
            report.push_error(ValidationIssue::error(
                "missing_return_type",
                path.clone(),
                format!("field {} must declare a return type", field.name),
                None,
            ));
        }

        let expected = params.len();
        if expected == 0 {
            continue;
        }

        match calls.get(field.name.as_str()).map(Vec::as_slice) {
            None | Some([]) => report.push_error(ValidationIssue::error(
                "missing_call",
                path,
                format!("missing call for field {}", field.name),
                Some(format!("add `{}(..)` to the calls section", field.name)),
            )),
            Some([call, rest @ ..]) => {
                if !rest.is_empty() {
                    report.push_error(ValidationIssue::error(
                        "duplicate_call",
                        format!("/calls/{}", field.name),
                        format!("duplicate call for field {}", field.name),
                        None,
                    ));
                }
                let actual = call.args.len();
                if actual != expected {
                    report.push_error(ValidationIssue::error(
                        "call_arity",
                        format!("/calls/{}", field.name),
                        format!("field {} expects {expected} args, got {actual}", field.name),
                        None,
                    ));
                }
            }
        }
    }

    for target in calls.keys() {
        if !function_fields.contains(target) {
            report.push_error(ValidationIssue::error(
                "unknown_call",
                format!("/calls/{target}"),
                format!("unknown call {target}"),
                Some("calls may only target fields with a function type".to_string()),
            ));
        }
    }
}

fn validate_file_name(model: &ModelDefinition, report: &mut ValidationReport) {
    let base = model.base_name();
    if base != model.name {
        report.push_error(ValidationIssue::error(
            "model_name_mismatch",
            "/name",
            format!(
                "model should be in file named {}.dg, found in {base}.dg",
                model.name
            ),
            Some(format!("rename the file or the model to `{base}`")),
        ));
    }
}

fn validate_count(model: &ModelDefinition, report: &mut ValidationReport) {
    if let Some(declared) = model.metadata.declared_count.filter(|count| *count <= 0) {
        report.push_warning(ValidationIssue::warning(
            "non_positive_count",
            "/metadata/count",
            format!(
                "count {declared} is not positive, using {}",
                model.metadata.count
            ),
            None,
        ));
    }
}

fn gen_names(model: &ModelDefinition) -> BTreeSet<&str> {
    model
        .gen_functions()
        .iter()
        .map(|gen_fn| gen_fn.name.trim())
        .filter(|name| !name.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use datagen_core::{CodeBlock, Field, GenFunction, Param};

    use super::*;

    fn gen_fn(name: &str) -> GenFunction {
        GenFunction {
            name: name.to_string(),
            params: vec![Param::new("iter", "usize")],
            body: CodeBlock {
                text: "iter as i64".to_string(),
                has_return: true,
            },
        }
    }

    fn model(fields: &[&str], gens: &[&str]) -> ModelDefinition {
        let mut model = ModelDefinition::new("m");
        model.name = "m".to_string();
        model.fields = Some(
            fields
                .iter()
                .map(|name| Field::new(*name, TypeExpr::plain("i64")))
                .collect(),
        );
        model.gen_functions = Some(gens.iter().map(|name| gen_fn(name)).collect());
        model
    }

    #[test]
    fn matching_fields_and_gens_pass() {
        let report = validate_model(&model(&["a", "b"], &["a", "b"]));
        assert!(report.is_ok(), "{report}");
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn empty_sections_are_not_missing() {
        let report = validate_model(&model(&[], &[]));
        assert!(report.is_ok(), "{report}");
    }

    #[test]
    fn missing_sections_are_reported_once_each() {
        let mut definition = ModelDefinition::new("m");
        definition.name = "m".to_string();
        let report = validate_model(&definition);
        assert_eq!(report.error_codes(), ["missing_section", "missing_section"]);
    }

    #[test]
    fn duplicates_are_listed() {
        let report = validate_model(&model(&["a", "a", "b", "b"], &["a", "b"]));
        assert_eq!(
            report.errors[0].message,
            "model has duplicate field names: a, b"
        );
    }

    #[test]
    fn missing_return_is_reported() {
        let mut definition = model(&["a"], &["a"]);
        if let Some(gens) = definition.gen_functions.as_mut() {
            gens[0].body.has_return = false;
        }
        let report = validate_model(&definition);
        assert_eq!(report.errors[0].message, "gen func a must return a value");
    }

    #[test]
    fn zero_arity_function_fields_need_no_call() {
        let mut definition = model(&[], &["f"]);
        definition.fields = Some(vec![Field::new(
            "f",
            TypeExpr::Function {
                params: Vec::new(),
                output: Some("i64".to_string()),
            },
        )]);
        assert!(validate_model(&definition).is_ok());
    }

    #[test]
    fn function_field_without_output_is_reported() {
        let mut definition = model(&[], &["f"]);
        definition.fields = Some(vec![Field::new(
            "f",
            TypeExpr::Function {
                params: Vec::new(),
                output: None,
            },
        )]);
        let report = validate_model(&definition);
        assert_eq!(report.error_codes(), ["missing_return_type"]);
        assert_eq!(report.errors[0].message, "field f must declare a return type");
    }

    #[test]
    fn non_positive_count_warns() {
        let mut definition = model(&["a"], &["a"]);
        definition.metadata.set_count(-3);
        let report = validate_model(&definition);
        assert!(report.is_ok());
        assert_eq!(report.warnings[0].code, "non_positive_count");
    }
}
