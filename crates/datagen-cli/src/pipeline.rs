use std::path::{Path, PathBuf};
use std::time::Instant;

use datagen_core::{DG_DIR_DELIMITER, DG_EXTENSION, DirectoryNode, ModelDefinition};
use datagen_parse::parse_unit;
use datagen_validate::{ValidationIssue, validate_model};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

/// Outcome of one `.dg` unit, as printed by `check` and stored in `report.json`.
#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub unit: String,
    pub path: PathBuf,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl UnitReport {
    pub fn failure_summary(&self) -> String {
        if let Some(error) = &self.parse_error {
            return format!("{}: {error}", self.path.display());
        }
        let messages: Vec<String> = self
            .errors
            .iter()
            .map(|issue| format!("{} ({})", issue.message, issue.code))
            .collect();
        format!("{}: {}", self.path.display(), messages.join("; "))
    }
}

pub struct Analysis {
    pub reports: Vec<UnitReport>,
    pub models: Vec<ModelDefinition>,
}

impl Analysis {
    pub fn failures(&self) -> impl Iterator<Item = &UnitReport> {
        self.reports.iter().filter(|report| !report.ok)
    }
}

/// Parse and validate every unit of `tree` in parallel.
///
/// Units are reported in tree order; a model is kept only when its unit has no errors.
pub fn analyze_tree(root: &Path, tree: &DirectoryNode) -> Analysis {
    let started = Instant::now();
    let outcomes: Vec<(UnitReport, Option<ModelDefinition>)> = tree
        .units()
        .into_par_iter()
        .map(|(name, source)| analyze_unit(root, name, source))
        .collect();

    let mut reports = Vec::with_capacity(outcomes.len());
    let mut models = Vec::with_capacity(outcomes.len());
    for (report, model) in outcomes {
        reports.push(report);
        models.extend(model);
    }

    let failed = reports.iter().filter(|report| !report.ok).count();
    info!(
        event = "units_parsed",
        units = reports.len(),
        failed,
        duration_ms = started.elapsed().as_millis() as u64,
        "parsed and validated units"
    );
    Analysis { reports, models }
}

fn analyze_unit(root: &Path, name: &str, source: &[u8]) -> (UnitReport, Option<ModelDefinition>) {
    let path = unit_path(root, name);
    let mut report = UnitReport {
        unit: name.to_string(),
        path: path.clone(),
        ok: false,
        parse_error: None,
        errors: Vec::new(),
        warnings: Vec::new(),
    };

    let model = match parse_unit(source, name, Some(&path)) {
        Ok(model) => model,
        Err(err) => {
            warn!(unit = name, error = %err, "unit failed to parse");
            report.parse_error = Some(err.to_string());
            return (report, None);
        }
    };

    let validation = validate_model(&model);
    report.ok = validation.is_ok();
    report.errors = validation.errors;
    report.warnings = validation.warnings;
    if !report.ok {
        warn!(unit = name, errors = report.errors.len(), "unit failed validation");
        return (report, None);
    }
    (report, Some(model))
}

/// Location of a unit on disk, rebuilt from its qualified name.
pub fn unit_path(root: &Path, qualified: &str) -> PathBuf {
    if root.is_file() {
        return root.to_path_buf();
    }
    let mut path = root.to_path_buf();
    let mut segments = qualified.split(DG_DIR_DELIMITER).peekable();
    while let Some(segment) = segments.next() {
        if segments.peek().is_some() {
            path.push(segment);
        } else {
            path.push(format!("{segment}.{DG_EXTENSION}"));
        }
    }
    path
}

/// Render a unit report the way `check` prints it.
pub fn render_report(report: &UnitReport) -> String {
    let mut out = String::new();
    let mark = if report.ok { "✔" } else { "✘" };
    out.push_str(&format!("{mark} {} ({})\n", report.unit, report.path.display()));
    if let Some(error) = &report.parse_error {
        out.push_str(&format!("    parse error: {error}\n"));
    }
    for (label, issues) in [("error", &report.errors), ("warning", &report.warnings)] {
        for issue in issues {
            out.push_str(&format!("    {label} [{}] {}: {}", issue.code, issue.path, issue.message));
            if let Some(hint) = &issue.hint {
                out.push_str(&format!(" (hint: {hint})"));
            }
            out.push('\n');
        }
    }
    out
}
