use crate::error::{Error, Result};
use crate::manifest::requirements::looks_like_direct_reference;
use crate::manifest::{
    ExtractOptions, Extraction, ManifestSource, RequirementSet, Role, SetMember, find_line,
};
use crate::models::{Diagnostic, Requirement};
use log::{debug, info};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// A Conda environment.yml, reduced to the parts that matter here.
/// Conda's own package specs have their own grammar and stay out of
/// scope; only the nested `pip:` list holds pip requirements.
#[derive(Debug, Deserialize)]
struct CondaEnvironment {
    name: Option<String>,
    dependencies: Option<Vec<CondaDependency>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CondaDependency {
    /// A Conda package spec such as `python=3.11` or `numpy`
    Spec(String),
    /// A nested mapping, in practice always `pip:` with its own list
    Mapping(HashMap<String, Vec<String>>),
}

pub struct CondaSource;

impl ManifestSource for CondaSource {
    fn extract(&self, path: &Path, _options: &ExtractOptions) -> Result<Extraction> {
        let content = fs::read_to_string(path).map_err(|e| Error::FileOperation {
            path: path.to_path_buf(),
            message: format!("Failed to read environment file: {}", e),
        })?;

        let mut extraction = Extraction::default();

        let environment: CondaEnvironment = match serde_yml::from_str(&content) {
            Ok(environment) => environment,
            Err(e) => {
                extraction.diagnostics.push(Diagnostic::error(
                    "syntax",
                    path,
                    None,
                    format!("invalid YAML: {}", e),
                ));
                return Ok(extraction);
            }
        };

        info!(
            "Reading Conda environment '{}' from {}",
            environment.name.as_deref().unwrap_or("unnamed"),
            path.display()
        );

        let Some(dependencies) = environment.dependencies else {
            debug!("No dependencies in {}", path.display());
            return Ok(extraction);
        };

        let mut members = Vec::new();
        for dependency in &dependencies {
            match dependency {
                CondaDependency::Spec(spec) => {
                    debug!("Skipping Conda package spec: {}", spec);
                }
                CondaDependency::Mapping(mapping) => {
                    if let Some(pip_entries) = mapping.get("pip") {
                        debug!("Processing {} pip requirements", pip_entries.len());
                        collect_pip_requirements(
                            path,
                            pip_entries,
                            &content,
                            &mut members,
                            &mut extraction.diagnostics,
                        );
                    }
                }
            }
        }

        extraction.sets.push(RequirementSet {
            label: Some("dependencies.pip".to_string()),
            members,
        });
        Ok(extraction)
    }
}

fn collect_pip_requirements(
    path: &Path,
    entries: &[String],
    content: &str,
    members: &mut Vec<SetMember>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for entry in entries {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }

        // Option entries like `-r requirements.txt` belong to pip itself
        if entry.starts_with('-') {
            debug!("Skipping pip option in environment file: {}", entry);
            continue;
        }
        if looks_like_direct_reference(entry) {
            debug!("Skipping direct reference in environment file: {}", entry);
            continue;
        }

        match Requirement::parse(entry) {
            Ok(mut requirement) => {
                requirement.line = find_line(content, entry);
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
                    find_line(content, entry),
                    format!("in pip dependencies: {}", message),
                ));
            }
        }
    }
}
