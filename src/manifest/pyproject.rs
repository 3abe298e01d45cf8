use crate::error::{Error, Result};
use crate::manifest::requirements::looks_like_direct_reference;
use crate::manifest::{
    ExtractOptions, Extraction, ManifestSource, RequirementSet, Role, SetMember, find_line,
};
use crate::models::{Diagnostic, Requirement};
use log::{debug, info};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// The standard `[project]` metadata of a pyproject.toml, reduced to the
/// parts that carry requirements
#[derive(Debug, Deserialize)]
struct PyProjectToml {
    project: Option<Project>,
}

#[derive(Debug, Deserialize)]
struct Project {
    dependencies: Option<Vec<String>>,
    #[serde(rename = "optional-dependencies")]
    optional_dependencies: Option<BTreeMap<String, Vec<String>>>,
    dynamic: Option<Vec<String>>,
}

impl Project {
    /// Fields listed in `dynamic` are filled in by the build backend, so
    /// there is nothing in the file to lint
    fn is_dynamic(&self, field: &str) -> bool {
        self.dynamic
            .as_ref()
            .is_some_and(|dynamic| dynamic.iter().any(|d| d == field))
    }
}

pub struct PyProjectSource;

impl ManifestSource for PyProjectSource {
    fn extract(&self, path: &Path, _options: &ExtractOptions) -> Result<Extraction> {
        info!("Reading pyproject manifest: {}", path.display());

        let content = fs::read_to_string(path).map_err(|e| Error::FileOperation {
            path: path.to_path_buf(),
            message: format!("Failed to read pyproject.toml: {}", e),
        })?;

        let mut extraction = Extraction::default();

        let pyproject: PyProjectToml = match toml::from_str(&content) {
            Ok(pyproject) => pyproject,
            Err(e) => {
                extraction.diagnostics.push(Diagnostic::error(
                    "syntax",
                    path,
                    None,
                    format!("invalid TOML: {}", e),
                ));
                return Ok(extraction);
            }
        };

        let Some(project) = pyproject.project else {
            debug!("No [project] table in {}", path.display());
            return Ok(extraction);
        };

        if let Some(dependencies) = &project.dependencies {
            if project.is_dynamic("dependencies") {
                debug!("Skipping dynamic dependencies in {}", path.display());
            } else {
                let set = parse_group(
                    path,
                    "project.dependencies",
                    dependencies,
                    &content,
                    &mut extraction.diagnostics,
                );
                extraction.sets.push(set);
            }
        }

        if let Some(groups) = &project.optional_dependencies {
            if project.is_dynamic("optional-dependencies") {
                debug!(
                    "Skipping dynamic optional dependencies in {}",
                    path.display()
                );
            } else {
                for (group, dependencies) in groups {
                    let label = format!("project.optional-dependencies.{}", group);
                    let set = parse_group(
                        path,
                        &label,
                        dependencies,
                        &content,
                        &mut extraction.diagnostics,
                    );
                    extraction.sets.push(set);
                }
            }
        }

        debug!(
            "Collected {} dependency groups from {}",
            extraction.sets.len(),
            path.display()
        );
        Ok(extraction)
    }
}

fn parse_group(
    path: &Path,
    label: &str,
    entries: &[String],
    content: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> RequirementSet {
    let mut members = Vec::new();

    for text in entries {
        let text = text.trim();
        if looks_like_direct_reference(text) {
            debug!("Skipping direct reference in {}: {}", label, text);
            continue;
        }

        match Requirement::parse(text) {
            Ok(mut requirement) => {
                requirement.line = find_line(content, text);
                members.push(SetMember {
                    path: path.to_path_buf(),
                    role: Role::Install,
                    requirement,
                });
            }
            Err(message) => {
                diagnostics.push(Diagnostic::error(
                    "syntax",
                    path,
                    find_line(content, text),
                    format!("in {}: {}", label, message),
                ));
            }
        }
    }

    RequirementSet {
        label: Some(label.to_string()),
        members,
    }
}
