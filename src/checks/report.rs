use crate::checks::LintOutcome;
use crate::error::{Error, Result};
use crate::models::Diagnostic;
use serde::Serialize;
use std::str::FromStr;

/// How lint findings get written out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self> {
        match input.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(Error::General(format!(
                "unknown output format '{}', expected 'text' or 'json'",
                other
            ))),
        }
    }
}

#[derive(Serialize)]
struct Report<'a> {
    diagnostics: &'a [Diagnostic],
    summary: Summary,
}

#[derive(Serialize)]
struct Summary {
    errors: usize,
    warnings: usize,
    files_checked: usize,
    files_fixed: usize,
}

/// Renders a lint outcome for people or for machines
pub fn render(outcome: &LintOutcome, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(outcome)),
        OutputFormat::Json => render_json(outcome),
    }
}

fn render_text(outcome: &LintOutcome) -> String {
    let mut out = String::new();

    for diagnostic in &outcome.diagnostics {
        out.push_str(&diagnostic.to_string());
        out.push('\n');
    }

    let mut summary = if outcome.diagnostics.is_empty() {
        format!("No problems found in {} file(s)", outcome.files_checked)
    } else {
        format!(
            "Found {} error(s) and {} warning(s) in {} file(s)",
            outcome.errors(),
            outcome.warnings(),
            outcome.files_checked
        )
    };
    if outcome.files_fixed > 0 {
        summary.push_str(&format!(", rewrote {} file(s)", outcome.files_fixed));
    }
    out.push_str(&summary);
    out.push('\n');

    out
}

fn render_json(outcome: &LintOutcome) -> Result<String> {
    let report = Report {
        diagnostics: &outcome.diagnostics,
        summary: Summary {
            errors: outcome.errors(),
            warnings: outcome.warnings(),
            files_checked: outcome.files_checked,
            files_fixed: outcome.files_fixed,
        },
    };
    let mut rendered = serde_json::to_string_pretty(&report)?;
    rendered.push('\n');
    Ok(rendered)
}
