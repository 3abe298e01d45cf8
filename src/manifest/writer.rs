use crate::error::{Error, Result};
use crate::manifest::requirements::looks_like_direct_reference;
use crate::manifest::{Entry, EntryKind, Manifest};
use crate::models::Requirement;
use crate::utils::FileTrackerGuard;
use log::{debug, info};
use std::fs;
use std::path::Path;
use toml_edit::{Array, DocumentMut, Formatted, Item, Value};

/// Renders a parsed requirements file in canonical form.
///
/// Requirement and include entries are rewritten with normalized spacing;
/// everything else, including comments, blank lines, option lines, direct
/// references and requirements carrying per-requirement options such as
/// `--hash`, stays exactly as written. Entries keep their order.
pub fn render_requirements(manifest: &Manifest) -> String {
    let mut output = String::new();
    for entry in &manifest.entries {
        output.push_str(&render_entry(entry));
        output.push('\n');
    }
    output
}

fn render_entry(entry: &Entry) -> String {
    match &entry.kind {
        // The canonical form carries no per-requirement options, so
        // entries that have them are not safe to re-spell
        EntryKind::Requirement(requirement)
            if requirement.hashes.is_empty() && requirement.options.is_empty() =>
        {
            with_comment(requirement.to_string(), entry)
        }
        EntryKind::Include { path, constraint } => {
            let flag = if *constraint { "-c" } else { "-r" };
            with_comment(format!("{} {}", flag, path), entry)
        }
        _ => entry.raw.clone(),
    }
}

fn with_comment(text: String, entry: &Entry) -> String {
    match &entry.trailing_comment {
        Some(comment) => format!("{}  {}", text, comment),
        None => text,
    }
}

/// Writes the canonical form of a requirements file back to disk if it
/// differs from what is there. Returns whether the file changed.
pub fn write_requirements(manifest: &Manifest, guard: &mut FileTrackerGuard) -> Result<bool> {
    let rendered = render_requirements(manifest);
    let current = fs::read_to_string(&manifest.path).map_err(|e| Error::FileOperation {
        path: manifest.path.clone(),
        message: format!("Failed to read file for formatting: {}", e),
    })?;

    if rendered == current {
        debug!("Already formatted: {}", manifest.path.display());
        return Ok(false);
    }

    guard.track_file(&manifest.path)?;
    fs::write(&manifest.path, &rendered).map_err(|e| Error::FileOperation {
        path: manifest.path.clone(),
        message: format!("Failed to write formatted file: {}", e),
    })?;

    info!("Formatted {}", manifest.path.display());
    Ok(true)
}

/// Rewrites the dependency strings of a pyproject.toml in canonical form.
///
/// Only the string values inside `[project]` dependency arrays change;
/// table layout, comments and entry order are left to toml_edit to
/// preserve. Returns whether the file changed.
pub fn write_pyproject(path: &Path, guard: &mut FileTrackerGuard) -> Result<bool> {
    let content = fs::read_to_string(path).map_err(|e| Error::FileOperation {
        path: path.to_path_buf(),
        message: format!("Failed to read pyproject.toml: {}", e),
    })?;

    // Unparseable files already carry a syntax finding, nothing to format
    let Ok(mut doc) = content.parse::<DocumentMut>() else {
        return Ok(false);
    };

    let mut changed = false;
    if let Some(project) = doc.get_mut("project").and_then(Item::as_table_mut) {
        if let Some(array) = project.get_mut("dependencies").and_then(Item::as_array_mut) {
            changed |= canonicalize_array(array);
        }
        if let Some(groups) = project
            .get_mut("optional-dependencies")
            .and_then(Item::as_table_mut)
        {
            for (_, item) in groups.iter_mut() {
                if let Some(array) = item.as_array_mut() {
                    changed |= canonicalize_array(array);
                }
            }
        }
    }

    if !changed {
        debug!("Already formatted: {}", path.display());
        return Ok(false);
    }

    guard.track_file(path)?;
    fs::write(path, doc.to_string()).map_err(|e| Error::FileOperation {
        path: path.to_path_buf(),
        message: format!("Failed to write pyproject.toml: {}", e),
    })?;

    info!("Formatted {}", path.display());
    Ok(true)
}

fn canonicalize_array(array: &mut Array) -> bool {
    let mut changed = false;

    for item in array.iter_mut() {
        let Some(text) = item.as_str().map(str::to_string) else {
            continue;
        };
        if looks_like_direct_reference(&text) {
            continue;
        }
        let Ok(requirement) = Requirement::parse(&text) else {
            continue;
        };
        if !requirement.hashes.is_empty() || !requirement.options.is_empty() {
            continue;
        }

        let canonical = requirement.to_string();
        if canonical != text {
            let decor = item.decor().clone();
            *item = Value::String(Formatted::new(canonical));
            *item.decor_mut() = decor;
            changed = true;
        }
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::requirements::parse_manifest;
    use tempfile::TempDir;

    fn render(content: &str) -> String {
        let manifest = parse_manifest(Path::new("requirements.txt"), content);
        render_requirements(&manifest)
    }

    #[test]
    fn test_canonical_spacing() {
        let content = "pandas >= 1.5.3\nopenpyxl>=3.1.2\n";
        assert_eq!(render(content), "pandas>=1.5.3\nopenpyxl>=3.1.2\n");
    }

    #[test]
    fn test_comments_and_blanks_survive() {
        let content = "# header\n\npandas >= 1.5.3  # excel support\n";
        assert_eq!(render(content), "# header\n\npandas>=1.5.3  # excel support\n");
    }

    #[test]
    fn test_untouched_entries_stay_verbatim() {
        let content = "\
--index-url   https://pypi.example.com/simple
git+https://github.com/org/tool.git@v1.2#egg=tool
-e  ./local/project
not a requirement!!
";
        assert_eq!(render(content), content);
    }

    #[test]
    fn test_hashed_requirements_stay_verbatim() {
        let content = "pandas==1.5.3 \\\n    --hash=sha256:abc\n";
        assert_eq!(render(content), content);
    }

    #[test]
    fn test_requirements_with_options_stay_verbatim() {
        let content = "pandas==1.5.3 --config-settings=editable_mode=compat\n";
        assert_eq!(render(content), content);
    }

    #[test]
    fn test_include_is_normalized() {
        assert_eq!(render("-r  dev.txt\n--constraint=c.txt\n"), "-r dev.txt\n-c c.txt\n");
    }

    #[test]
    fn test_order_is_never_changed() {
        let content = "zlib-state>=0.1\naaa-lib>=2.0\n";
        assert_eq!(render(content), content);
    }

    #[test]
    fn test_write_requirements_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("requirements.txt");
        fs::write(&path, "pandas >= 1.5.3\n").unwrap();

        let manifest = parse_manifest(&path, &fs::read_to_string(&path).unwrap());
        let mut guard = FileTrackerGuard::new_with_restore(false);

        assert!(write_requirements(&manifest, &mut guard).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "pandas>=1.5.3\n");

        // A second pass finds nothing to do
        let manifest = parse_manifest(&path, &fs::read_to_string(&path).unwrap());
        assert!(!write_requirements(&manifest, &mut guard).unwrap());
    }

    #[test]
    fn test_write_pyproject_keeps_layout() {
        let content = r#"[project]
name = "demo"
# the important bits
dependencies = [
    "pandas >= 1.5.3",  # excel reports
    "sqlalchemy>=2.0.25",
]
"#;
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("pyproject.toml");
        fs::write(&path, content).unwrap();

        let mut guard = FileTrackerGuard::new_with_restore(false);
        assert!(write_pyproject(&path, &mut guard).unwrap());

        let formatted = fs::read_to_string(&path).unwrap();
        assert!(formatted.contains("\"pandas>=1.5.3\",  # excel reports"));
        assert!(formatted.contains("# the important bits"));
        assert!(formatted.contains("\"sqlalchemy>=2.0.25\","));
    }
}
