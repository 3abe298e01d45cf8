use crate::checks::{check_set, CheckOptions};
use crate::error::{Error, Result};
use crate::manifest::writer::{write_pyproject, write_requirements};
use crate::manifest::{
    detect_source, discover_manifests, source_for, ExtractOptions, Extraction, SourceKind,
};
use crate::models::{Diagnostic, Severity};
use crate::utils::FileTrackerGuard;
use log::{debug, info};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// What to lint and how
#[derive(Debug, Clone)]
pub struct LintOptions {
    /// Resolve `-r`/`-c` directives and lint the included files too
    pub follow_includes: bool,

    /// Accept requirements without any version constraint
    pub allow_unpinned: bool,

    /// Report warnings as errors
    pub strict: bool,

    /// Rewrite manifests in canonical form
    pub fix: bool,

    /// Roll written files back when a later write fails
    pub restore_enabled: bool,
}

impl Default for LintOptions {
    fn default() -> Self {
        LintOptions {
            follow_includes: true,
            allow_unpinned: false,
            strict: false,
            fix: false,
            restore_enabled: true,
        }
    }
}

/// Outcome of a lint run
#[derive(Debug, Default)]
pub struct LintOutcome {
    /// Findings, sorted by file and line
    pub diagnostics: Vec<Diagnostic>,
    pub files_checked: usize,
    pub files_fixed: usize,
}

impl LintOutcome {
    pub fn errors(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    pub fn warnings(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }
}

/// Lints the manifests at `path`, a single file or a directory to search
pub fn run_lint(path: &Path, options: &LintOptions) -> Result<LintOutcome> {
    let targets = resolve_targets(path)?;
    if targets.is_empty() {
        return Err(Error::ManifestParsing(format!(
            "no dependency manifests found in '{}'",
            path.display()
        )));
    }

    let extract_options = ExtractOptions {
        follow_includes: options.follow_includes,
    };
    let check_options = CheckOptions {
        allow_unpinned: options.allow_unpinned,
    };

    let mut outcome = LintOutcome::default();
    let mut seen_files: HashSet<PathBuf> = HashSet::new();
    let mut extractions: Vec<(PathBuf, SourceKind, Extraction)> = Vec::new();

    for (target, kind) in &targets {
        debug!("Checking {}", target.display());
        seen_files.insert(target.clone());

        let extraction = source_for(*kind).extract(target, &extract_options)?;
        for manifest in &extraction.files {
            seen_files.insert(manifest.path.clone());
        }

        outcome.diagnostics.extend(extraction.diagnostics.iter().cloned());
        for set in &extraction.sets {
            if let Some(label) = &set.label {
                debug!("Checking group '{}'", label);
            }
            outcome.diagnostics.extend(check_set(set, &check_options));
        }

        extractions.push((target.clone(), *kind, extraction));
    }

    outcome.files_checked = seen_files.len();

    if options.fix {
        outcome.files_fixed = apply_fixes(&extractions, options.restore_enabled)?;
        if outcome.files_fixed > 0 {
            info!("Formatted {} file(s)", outcome.files_fixed);
        }
    }

    if options.strict {
        for diagnostic in &mut outcome.diagnostics {
            if diagnostic.severity == Severity::Warning {
                diagnostic.severity = Severity::Error;
            }
        }
    }

    // Stable report order, and shared includes report only once
    outcome.diagnostics.sort_by(|a, b| {
        a.path
            .cmp(&b.path)
            .then_with(|| a.line.unwrap_or(0).cmp(&b.line.unwrap_or(0)))
            .then_with(|| a.message.cmp(&b.message))
    });
    outcome.diagnostics.dedup();

    Ok(outcome)
}

fn resolve_targets(path: &Path) -> Result<Vec<(PathBuf, SourceKind)>> {
    if path.is_dir() {
        let manifests = discover_manifests(path);
        debug!("Discovered {} manifest(s) in {}", manifests.len(), path.display());
        Ok(manifests
            .into_iter()
            .filter_map(|p| detect_source(&p).map(|kind| (p, kind)))
            .collect())
    } else if path.is_file() {
        match detect_source(path) {
            Some(kind) => Ok(vec![(path.to_path_buf(), kind)]),
            None => Err(Error::ManifestParsing(format!(
                "'{}' is not a recognized manifest file",
                path.display()
            ))),
        }
    } else {
        Err(Error::FileOperation {
            path: path.to_path_buf(),
            message: "Path does not exist or is not accessible".to_string(),
        })
    }
}

/// Rewrites every fixable manifest, restoring all of them if any write fails
fn apply_fixes(
    extractions: &[(PathBuf, SourceKind, Extraction)],
    restore_enabled: bool,
) -> Result<usize> {
    let mut file_tracker = FileTrackerGuard::new_with_restore(restore_enabled);

    let result = (|| -> Result<usize> {
        let mut fixed = 0;
        for (target, kind, extraction) in extractions {
            match kind {
                SourceKind::Requirements => {
                    for manifest in &extraction.files {
                        if write_requirements(manifest, &mut file_tracker)? {
                            fixed += 1;
                        }
                    }
                }
                SourceKind::PyProject => {
                    if write_pyproject(target, &mut file_tracker)? {
                        fixed += 1;
                    }
                }
                SourceKind::Conda => {
                    debug!("Conda environments are checked only: {}", target.display());
                }
            }
        }
        Ok(fixed)
    })();

    match result {
        Ok(fixed) => Ok(fixed),
        Err(error) => {
            info!("An error occurred during formatting. Rolling back changes...");
            file_tracker.force_rollback();
            drop(file_tracker);
            Err(Error::General(format!(
                "{}\nNote: File changes have been rolled back to their original state.",
                error
            )))
        }
    }
}
