use crate::error::{Error, Result};
use crate::manifest::{
    ExtractOptions, Extraction, ManifestSource, RequirementSet, Role, SetMember,
};
use crate::models::{Diagnostic, Requirement};
use log::{debug, info};
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// A requirements file parsed line by line.
///
/// Every physical line is kept as an [`Entry`], including blanks and
/// comments, so the file can be written back with everything the linter
/// does not touch left exactly as it was.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub path: PathBuf,
    pub entries: Vec<Entry>,
}

/// One logical line of a requirements file. Continuation lines joined
/// with `\` form a single entry.
#[derive(Debug, Clone)]
pub struct Entry {
    /// One-based number of the first physical line
    pub line: usize,
    /// The physical text as written, including continuation lines
    pub raw: String,
    pub kind: EntryKind,
    /// Comment after the entry on the same line
    pub trailing_comment: Option<String>,
}

#[derive(Debug, Clone)]
pub enum EntryKind {
    Blank,
    Comment,
    Requirement(Requirement),
    /// `-r other.txt` or `-c constraints.txt`
    Include { path: String, constraint: bool },
    /// `-e ./local/project`
    Editable { target: String },
    /// A direct reference: a VCS requirement, an archive URL or a local path
    Url { name: Option<String>, url: String },
    /// A global option line such as `--index-url https://...`
    Flag {
        name: String,
        value: Option<String>,
        known: bool,
    },
    Invalid { message: String },
}

/// Options that take a value, like `--index-url https://pypi.example.com`
const VALUE_FLAGS: &[&str] = &[
    "-i",
    "--index-url",
    "--extra-index-url",
    "-f",
    "--find-links",
    "--trusted-host",
    "--no-binary",
    "--only-binary",
    "--use-feature",
];

/// Options that stand on their own
const BARE_FLAGS: &[&str] = &[
    "--no-index",
    "--pre",
    "--prefer-binary",
    "--require-hashes",
    "--no-build-isolation",
    "--use-pep517",
];

pub struct RequirementsSource;

impl ManifestSource for RequirementsSource {
    fn extract(&self, path: &Path, options: &ExtractOptions) -> Result<Extraction> {
        info!("Reading requirements file: {}", path.display());

        let mut loader = Loader {
            follow_includes: options.follow_includes,
            stack: Vec::new(),
            visited: HashSet::new(),
            members: Vec::new(),
            extraction: Extraction::default(),
        };
        loader.load_file(path, Role::Install)?;

        debug!("Collected {} requirements", loader.members.len());
        let mut extraction = loader.extraction;
        extraction.sets.push(RequirementSet {
            label: None,
            members: loader.members,
        });
        Ok(extraction)
    }
}

/// Walks a requirements file and everything it includes, collecting the
/// requirements into one set
struct Loader {
    follow_includes: bool,
    /// Files currently being processed, for cycle detection
    stack: Vec<PathBuf>,
    /// Files processed at least once, so shared includes load only once
    visited: HashSet<PathBuf>,
    members: Vec<SetMember>,
    extraction: Extraction,
}

impl Loader {
    fn load_file(&mut self, path: &Path, role: Role) -> Result<()> {
        let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());

        let content = fs::read_to_string(path).map_err(|e| Error::FileOperation {
            path: path.to_path_buf(),
            message: format!("Failed to read requirements file: {}", e),
        })?;

        // A file counts as visited only once it has been read, so every
        // line naming an unreadable include gets its own finding
        self.visited.insert(canonical.clone());

        let manifest = parse_manifest(path, &content);
        self.stack.push(canonical);

        for entry in &manifest.entries {
            match &entry.kind {
                EntryKind::Requirement(requirement) => {
                    debug!(
                        "Found requirement '{}' at {}:{}",
                        requirement.name,
                        path.display(),
                        entry.line
                    );
                    self.members.push(SetMember {
                        path: path.to_path_buf(),
                        role,
                        requirement: requirement.clone(),
                    });
                }
                EntryKind::Include {
                    path: target,
                    constraint,
                } => {
                    self.load_include(path, entry, target, *constraint, role);
                }
                EntryKind::Invalid { message } => {
                    self.extraction.diagnostics.push(Diagnostic::error(
                        "syntax",
                        path,
                        Some(entry.line),
                        message.clone(),
                    ));
                }
                EntryKind::Flag {
                    name, known: false, ..
                } => {
                    self.extraction.diagnostics.push(Diagnostic::warning(
                        "unknown-option",
                        path,
                        Some(entry.line),
                        format!("unknown option '{}'", name),
                    ));
                }
                EntryKind::Flag { name, .. } => {
                    debug!("Option '{}' at {}:{}", name, path.display(), entry.line);
                }
                EntryKind::Editable { target } => {
                    debug!("Editable requirement '{}' in {}", target, path.display());
                }
                EntryKind::Url { url, .. } => {
                    debug!("Direct reference '{}' in {}", url, path.display());
                }
                EntryKind::Blank | EntryKind::Comment => {}
            }
        }

        self.stack.pop();
        self.extraction.files.push(manifest);
        Ok(())
    }

    fn load_include(&mut self, path: &Path, entry: &Entry, target: &str, constraint: bool, role: Role) {
        if !self.follow_includes {
            debug!("Not following include '{}' from {}", target, path.display());
            return;
        }

        // Includes resolve relative to the file that names them
        let resolved = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.join(target),
            _ => PathBuf::from(target),
        };
        let resolved_canonical = fs::canonicalize(&resolved).unwrap_or_else(|_| resolved.clone());

        // A constraints file restricts versions instead of installing
        let child_role = if constraint { Role::Constraint } else { role };

        if self.stack.contains(&resolved_canonical) {
            self.extraction.diagnostics.push(Diagnostic::error(
                "include",
                path,
                Some(entry.line),
                format!("include cycle through '{}'", target),
            ));
        } else if self.visited.contains(&resolved_canonical) {
            debug!("Already processed include: {}", resolved.display());
        } else if let Err(e) = self.load_file(&resolved, child_role) {
            self.extraction.diagnostics.push(Diagnostic::error(
                "include",
                path,
                Some(entry.line),
                format!("cannot read '{}': {}", target, e),
            ));
        }
    }
}

/// Parses requirements file content into entries, one per logical line.
pub fn parse_manifest(path: &Path, content: &str) -> Manifest {
    let lines: Vec<&str> = content.lines().collect();
    let mut entries = Vec::new();
    let mut index = 0;

    while index < lines.len() {
        let start = index;
        let first = lines[index];
        let mut raw_lines = vec![first];
        let mut logical = String::new();

        if first.trim_start().starts_with('#') {
            // Comment lines never continue, even when they end with '\'
            logical.push_str(first);
            index += 1;
        } else {
            let mut current = first;
            loop {
                match current.strip_suffix('\\') {
                    Some(stripped) => {
                        logical.push_str(stripped);
                        index += 1;
                        if index >= lines.len() {
                            break;
                        }
                        current = lines[index];
                        raw_lines.push(current);
                    }
                    None => {
                        logical.push_str(current);
                        index += 1;
                        break;
                    }
                }
            }
        }

        let (code, trailing_comment) = split_comment(&logical);
        let kind = classify_line(code.trim(), trailing_comment.is_some(), start + 1);

        entries.push(Entry {
            line: start + 1,
            raw: raw_lines.join("\n"),
            kind,
            trailing_comment,
        });
    }

    Manifest {
        path: path.to_path_buf(),
        entries,
    }
}

fn classify_line(text: &str, has_comment: bool, line: usize) -> EntryKind {
    if text.is_empty() {
        return if has_comment {
            EntryKind::Comment
        } else {
            EntryKind::Blank
        };
    }

    if text.starts_with('-') {
        return parse_option_line(text);
    }

    if looks_like_direct_reference(text) {
        return parse_direct_reference(text);
    }

    match Requirement::parse(text) {
        Ok(mut requirement) => {
            requirement.line = Some(line);
            EntryKind::Requirement(requirement)
        }
        Err(message) => EntryKind::Invalid { message },
    }
}

/// Cuts an inline comment off a logical line. A `#` only starts a comment
/// at the beginning of the line or after whitespace, so URL fragments like
/// `#egg=name` survive.
fn split_comment(text: &str) -> (&str, Option<String>) {
    let bytes = text.as_bytes();
    for (i, _) in text.match_indices('#') {
        if i == 0 || bytes[i - 1].is_ascii_whitespace() {
            return (&text[..i], Some(text[i..].trim_end().to_string()));
        }
    }
    (text, None)
}

fn parse_option_line(text: &str) -> EntryKind {
    let (flag, value) = match text.find(|c: char| c == '=' || c.is_whitespace()) {
        Some(pos) => {
            let value = text[pos + 1..].trim();
            (
                &text[..pos],
                if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                },
            )
        }
        None => (text, None),
    };

    match flag {
        "-r" | "--requirement" => match value {
            Some(path) => EntryKind::Include {
                path,
                constraint: false,
            },
            None => EntryKind::Invalid {
                message: format!("'{}' needs a file path", flag),
            },
        },
        "-c" | "--constraint" => match value {
            Some(path) => EntryKind::Include {
                path,
                constraint: true,
            },
            None => EntryKind::Invalid {
                message: format!("'{}' needs a file path", flag),
            },
        },
        "-e" | "--editable" => match value {
            Some(target) => EntryKind::Editable { target },
            None => EntryKind::Invalid {
                message: format!("'{}' needs a path or URL", flag),
            },
        },
        "--hash" => EntryKind::Invalid {
            message: "'--hash' must follow a requirement on the same line".to_string(),
        },
        _ if VALUE_FLAGS.contains(&flag) => match value {
            Some(v) => EntryKind::Flag {
                name: flag.to_string(),
                value: Some(v),
                known: true,
            },
            None => EntryKind::Invalid {
                message: format!("'{}' needs a value", flag),
            },
        },
        _ if BARE_FLAGS.contains(&flag) => EntryKind::Flag {
            name: flag.to_string(),
            value,
            known: true,
        },
        _ => EntryKind::Flag {
            name: flag.to_string(),
            value,
            known: false,
        },
    }
}

pub(crate) fn looks_like_direct_reference(text: &str) -> bool {
    const VCS_PREFIXES: &[&str] = &["git+", "hg+", "svn+", "bzr+"];
    const ARCHIVE_SUFFIXES: &[&str] = &[".whl", ".tar.gz", ".tar.bz2", ".zip"];

    text.contains("://")
        || VCS_PREFIXES.iter().any(|p| text.starts_with(p))
        || text.starts_with("./")
        || text.starts_with("../")
        || text.starts_with('/')
        || ARCHIVE_SUFFIXES.iter().any(|s| text.ends_with(s))
}

fn parse_direct_reference(text: &str) -> EntryKind {
    // `name @ url` names the package directly
    if let Some((head, tail)) = text.split_once('@') {
        let head = head.trim();
        let name_re =
            Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?(?:\[[^\]]*\])?$").unwrap();
        if name_re.is_match(head) {
            let name = head.split('[').next().unwrap_or(head).trim();
            return EntryKind::Url {
                name: Some(name.to_string()),
                url: tail.trim().to_string(),
            };
        }
    }

    // VCS requirements name the package in the egg fragment
    if let Some((_, fragment)) = text.split_once('#') {
        for part in fragment.split('&') {
            if let Some(egg) = part.strip_prefix("egg=") {
                return EntryKind::Url {
                    name: Some(egg.to_string()),
                    url: text.to_string(),
                };
            }
        }
    }

    // Wheel file names start with the package name
    let last_segment = text.rsplit('/').next().unwrap_or(text);
    if last_segment.ends_with(".whl") {
        if let Some(name) = last_segment.split('-').next() {
            if !name.is_empty() {
                return EntryKind::Url {
                    name: Some(name.to_string()),
                    url: text.to_string(),
                };
            }
        }
    }

    EntryKind::Url {
        name: None,
        url: text.to_string(),
    }
}
