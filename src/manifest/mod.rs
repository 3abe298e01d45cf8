use crate::error::Result;
use crate::models::{Diagnostic, Requirement};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

pub mod conda;
pub mod pyproject;
pub mod requirements;
pub mod writer;

pub use requirements::{Entry, EntryKind, Manifest};

/// The manifest formats that can carry pip requirements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// `requirements.txt` and friends
    Requirements,
    /// `[project.dependencies]` in `pyproject.toml`
    PyProject,
    /// The `pip:` block of a Conda `environment.yml`
    Conda,
}

/// How a requirement takes part in an install.
///
/// Members of a constraints file (`-c`) only restrict versions of packages
/// installed elsewhere, so checks that reason about what gets installed
/// leave them out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Install,
    Constraint,
}

/// A requirement together with the file it came from
#[derive(Debug, Clone)]
pub struct SetMember {
    pub path: PathBuf,
    pub role: Role,
    pub requirement: Requirement,
}

/// Requirements that install together and must be consistent with each
/// other. A requirements file forms one set with everything it includes;
/// each pyproject dependency group forms its own.
#[derive(Debug, Clone, Default)]
pub struct RequirementSet {
    /// Group name for formats that have them, like `optional-dependencies.excel`
    pub label: Option<String>,
    pub members: Vec<SetMember>,
}

/// Everything extracted from one manifest and its includes
#[derive(Debug, Default)]
pub struct Extraction {
    pub sets: Vec<RequirementSet>,
    pub diagnostics: Vec<Diagnostic>,
    /// Line oriented files that the formatter can rewrite
    pub files: Vec<Manifest>,
}

/// Options that change how sources read their files
#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    /// Follow `-r` and `-c` references to other files
    pub follow_includes: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            follow_includes: true,
        }
    }
}

/// Trait for manifest formats that requirements can be extracted from
pub trait ManifestSource {
    /// Reads the manifest at `path` and collects its requirement sets
    /// along with any findings made during parsing
    fn extract(&self, path: &Path, options: &ExtractOptions) -> Result<Extraction>;
}

/// Picks the source implementation for a manifest based on its file name
pub fn detect_source(path: &Path) -> Option<SourceKind> {
    let file_name = path.file_name().and_then(|n| n.to_str())?;

    if file_name == "pyproject.toml" {
        return Some(SourceKind::PyProject);
    }
    if file_name == "environment.yml" || file_name == "environment.yaml" {
        return Some(SourceKind::Conda);
    }
    if file_name.ends_with(".txt") || file_name.ends_with(".in") {
        return Some(SourceKind::Requirements);
    }

    None
}

/// Returns the source implementation for a manifest kind
pub fn source_for(kind: SourceKind) -> Box<dyn ManifestSource> {
    match kind {
        SourceKind::Requirements => Box::new(requirements::RequirementsSource),
        SourceKind::PyProject => Box::new(pyproject::PyProjectSource),
        SourceKind::Conda => Box::new(conda::CondaSource),
    }
}

/// Best effort line lookup for formats whose parsers do not report
/// positions. Returns the first line containing `needle`.
pub(crate) fn find_line(content: &str, needle: &str) -> Option<usize> {
    content
        .lines()
        .position(|line| line.contains(needle))
        .map(|index| index + 1)
}

/// Finds the manifests to lint in a directory.
///
/// Picks up `requirements.txt`, `requirements-*.txt` variants such as
/// `requirements-dev.txt`, `pyproject.toml` and a Conda environment file.
/// Nested directories are not searched.
pub fn discover_manifests(dir: &Path) -> Vec<PathBuf> {
    let mut manifests = Vec::new();

    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.filter_map(std::result::Result::ok) {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            let is_requirements = file_name == "requirements.txt"
                || (file_name.starts_with("requirements-") && file_name.ends_with(".txt"));
            let is_pyproject = file_name == "pyproject.toml";
            let is_conda = file_name == "environment.yml" || file_name == "environment.yaml";

            if is_requirements || is_pyproject || is_conda {
                info!("Found manifest: {}", path.display());
                manifests.push(path);
            }
        }
    }

    manifests.sort();
    manifests
}
