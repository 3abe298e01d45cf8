use reqlint::manifest::requirements::{parse_manifest, RequirementsSource};
use reqlint::manifest::{EntryKind, ExtractOptions, Extraction, ManifestSource, Role};
use reqlint::models::Severity;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Helper function to create a temporary test project with requirements files.
///
/// # Arguments
///
/// * `files` - A vector of tuples containing filename and content for each requirements file
///
/// # Returns
///
/// A tuple containing the temporary directory and its path
fn create_test_project(files: Vec<(&str, &str)>) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let project_dir = temp_dir.path().to_path_buf();

    for (filename, content) in files {
        let file_path = project_dir.join(filename);
        fs::write(&file_path, content).unwrap();
    }

    (temp_dir, project_dir)
}

fn extract(project_dir: &Path, file: &str) -> Extraction {
    let source = RequirementsSource;
    source
        .extract(&project_dir.join(file), &ExtractOptions::default())
        .unwrap()
}

/// Test basic parsing of a requirements.txt file with simple dependencies.
///
/// This test verifies that:
/// 1. Basic package requirements are correctly parsed
/// 2. Version specifiers are properly extracted
/// 3. Every requirement lands in a single unlabeled set as an install
#[test]
fn test_basic_requirements() {
    let content = r#"
pandas>=1.5.3
openpyxl==3.1.2
pywin32>=305
sqlalchemy==2.0.25
sql_metadata==2.10.0
    "#;

    let (_temp_dir, project_dir) = create_test_project(vec![("requirements.txt", content)]);
    let extraction = extract(&project_dir, "requirements.txt");

    assert!(extraction.diagnostics.is_empty());
    assert_eq!(extraction.sets.len(), 1);

    let set = &extraction.sets[0];
    assert!(set.label.is_none());
    assert_eq!(set.members.len(), 5);
    assert!(set.members.iter().all(|m| m.role == Role::Install));

    let pandas = set
        .members
        .iter()
        .find(|m| m.requirement.name == "pandas")
        .unwrap();
    assert_eq!(pandas.requirement.specifiers.to_string(), ">=1.5.3");
    assert_eq!(pandas.requirement.line, Some(2));

    let sqlalchemy = set
        .members
        .iter()
        .find(|m| m.requirement.name == "sqlalchemy")
        .unwrap();
    assert_eq!(sqlalchemy.requirement.specifiers.to_string(), "==2.0.25");
}

/// Test handling of comments and empty lines in requirements files.
///
/// This test verifies that:
/// 1. Comment and blank lines never become requirements
/// 2. Trailing comments are split off and kept with the entry
/// 3. A `#` with no whitespace before it stays part of the requirement text
#[test]
fn test_comments_and_empty_lines() {
    let content = "# Excel reports\npandas>=1.5.3  # dataframe handling\n\nopenpyxl==3.1.2\n";

    let (_temp_dir, project_dir) = create_test_project(vec![("requirements.txt", content)]);
    let extraction = extract(&project_dir, "requirements.txt");

    assert_eq!(extraction.sets[0].members.len(), 2);

    let manifest = &extraction.files[0];
    assert!(matches!(manifest.entries[0].kind, EntryKind::Comment));
    assert!(matches!(manifest.entries[1].kind, EntryKind::Requirement(_)));
    assert_eq!(
        manifest.entries[1].trailing_comment.as_deref(),
        Some("# dataframe handling")
    );
    assert!(matches!(manifest.entries[2].kind, EntryKind::Blank));
}

/// Test handling of environment markers in requirements.
///
/// This test verifies that:
/// 1. Environment markers are correctly parsed
/// 2. Package names and versions are extracted properly
/// 3. Markers are stored on the requirement
#[test]
fn test_environment_markers() {
    let content = r#"
pywin32>=305 ; sys_platform == "win32"
pandas==1.5.3; python_version >= "3.8"
    "#;

    let (_temp_dir, project_dir) = create_test_project(vec![("requirements.txt", content)]);
    let extraction = extract(&project_dir, "requirements.txt");

    let members = &extraction.sets[0].members;
    assert_eq!(members.len(), 2);

    let pywin32 = members
        .iter()
        .find(|m| m.requirement.name == "pywin32")
        .unwrap();
    assert_eq!(
        pywin32.requirement.markers.as_deref(),
        Some(r#"sys_platform == "win32""#)
    );

    let pandas = members
        .iter()
        .find(|m| m.requirement.name == "pandas")
        .unwrap();
    assert_eq!(
        pandas.requirement.markers.as_deref(),
        Some(r#"python_version >= "3.8""#)
    );
}

/// Test handling of complex version specifiers.
///
/// This test verifies that:
/// 1. Different version comparison operators are handled
/// 2. Multiple clauses in one specifier are kept in order
/// 3. Extras are parsed off the name
#[test]
fn test_complex_version_specifiers() {
    let content = r#"
pandas>=1.5.3,<3.0.0
sqlalchemy[asyncio]~=2.0.25
openpyxl>3.0.0,<=3.1.2
sql-metadata!=2.9.0,>=2.8.0
    "#;

    let (_temp_dir, project_dir) = create_test_project(vec![("requirements.txt", content)]);
    let extraction = extract(&project_dir, "requirements.txt");

    let members = &extraction.sets[0].members;
    assert_eq!(members.len(), 4);

    let pandas = members
        .iter()
        .find(|m| m.requirement.name == "pandas")
        .unwrap();
    assert_eq!(pandas.requirement.specifiers.to_string(), ">=1.5.3,<3.0.0");

    let sqlalchemy = members
        .iter()
        .find(|m| m.requirement.name == "sqlalchemy")
        .unwrap();
    assert_eq!(sqlalchemy.requirement.extras, vec!["asyncio"]);
    assert_eq!(sqlalchemy.requirement.specifiers.to_string(), "~=2.0.25");

    let sql_metadata = members
        .iter()
        .find(|m| m.requirement.name == "sql-metadata")
        .unwrap();
    assert_eq!(
        sql_metadata.requirement.specifiers.to_string(),
        "!=2.9.0,>=2.8.0"
    );
}

/// Test line continuations and per-requirement hash options.
///
/// This test verifies that:
/// 1. Lines joined with a trailing backslash form one logical entry
/// 2. `--hash` values are collected onto the requirement
/// 3. The raw text keeps every physical line for writing back
#[test]
fn test_line_continuations_and_hashes() {
    let content = "pandas==1.5.3 \\\n    --hash=sha256:aaaa \\\n    --hash=sha256:bbbb\nopenpyxl==3.1.2\n";

    let (_temp_dir, project_dir) = create_test_project(vec![("requirements.txt", content)]);
    let extraction = extract(&project_dir, "requirements.txt");

    let members = &extraction.sets[0].members;
    assert_eq!(members.len(), 2);

    let pandas = members
        .iter()
        .find(|m| m.requirement.name == "pandas")
        .unwrap();
    assert_eq!(
        pandas.requirement.hashes,
        vec!["sha256:aaaa", "sha256:bbbb"]
    );
    assert_eq!(pandas.requirement.line, Some(1));

    let manifest = &extraction.files[0];
    assert_eq!(manifest.entries.len(), 2);
    assert_eq!(
        manifest.entries[0].raw,
        "pandas==1.5.3 \\\n    --hash=sha256:aaaa \\\n    --hash=sha256:bbbb"
    );
    assert_eq!(manifest.entries[1].line, 4);
}

/// Test space separated values for per-requirement options.
///
/// This test verifies that:
/// 1. `--hash alg:hex` without '=' reads like the '=' spelling
/// 2. The option value never bleeds into the version text
/// 3. No finding is produced for the line
#[test]
fn test_space_form_option_values() {
    let content = "pandas==1.5.3 --hash sha256:0123456789abcdef\n";

    let (_temp_dir, project_dir) = create_test_project(vec![("requirements.txt", content)]);
    let extraction = extract(&project_dir, "requirements.txt");

    assert!(extraction.diagnostics.is_empty());

    let members = &extraction.sets[0].members;
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].requirement.specifiers.to_string(), "==1.5.3");
    assert_eq!(members[0].requirement.hashes, vec!["sha256:0123456789abcdef"]);
}

/// Test handling of editable installs and direct URL references.
///
/// This test verifies that:
/// 1. Editable installs (-e flag) are recognized
/// 2. VCS and archive URLs are kept as URL entries, not requirements
/// 3. A `name @ url` reference records the name
#[test]
fn test_editable_and_urls() {
    let content = r#"
-e ./local/project
git+https://github.com/user/project.git@v1.0.0#egg=project
https://files.pythonhosted.org/packages/openpyxl-3.1.2-py2.py3-none-any.whl
pandas @ https://example.com/pandas-1.5.3.tar.gz
    "#;

    let (_temp_dir, project_dir) = create_test_project(vec![("requirements.txt", content)]);
    let extraction = extract(&project_dir, "requirements.txt");

    // None of these are version-checkable requirements
    assert!(extraction.sets[0].members.is_empty());
    assert!(extraction.diagnostics.is_empty());

    let manifest = &extraction.files[0];
    let kinds: Vec<&EntryKind> = manifest
        .entries
        .iter()
        .map(|e| &e.kind)
        .filter(|k| !matches!(k, EntryKind::Blank))
        .collect();

    assert!(matches!(kinds[0], EntryKind::Editable { target } if target == "./local/project"));
    assert!(matches!(kinds[1], EntryKind::Url { name: Some(n), .. } if n == "project"));
    assert!(matches!(kinds[2], EntryKind::Url { name: Some(n), .. } if n == "openpyxl"));
    assert!(matches!(kinds[3], EntryKind::Url { name: Some(n), .. } if n == "pandas"));
}

/// Test that malformed requirement lines turn into syntax diagnostics.
///
/// This test verifies that:
/// 1. Invalid lines are reported with their line number
/// 2. The messages say what is wrong in installer terms
/// 3. Valid requirements around them are still extracted
#[test]
fn test_invalid_lines_get_syntax_diagnostics() {
    let content = "pandas=1.5.3\nopenpyxl==3.1.2\nsqlalchemy>=\n";

    let (_temp_dir, project_dir) = create_test_project(vec![("requirements.txt", content)]);
    let extraction = extract(&project_dir, "requirements.txt");

    assert_eq!(extraction.sets[0].members.len(), 1);
    assert_eq!(extraction.diagnostics.len(), 2);

    let first = &extraction.diagnostics[0];
    assert_eq!(first.severity, Severity::Error);
    assert_eq!(first.check, "syntax");
    assert_eq!(first.line, Some(1));
    assert!(first.message.contains("use '==' to pin"));

    let second = &extraction.diagnostics[1];
    assert_eq!(second.line, Some(3));
    assert!(second.message.contains("missing a version"));
}

/// Test recognition of global option lines.
///
/// This test verifies that:
/// 1. Known options pass through without findings
/// 2. Unknown options produce a warning
/// 3. A standalone --hash line is rejected
#[test]
fn test_option_lines() {
    let content = "--index-url https://pypi.example.com/simple\n--no-index\n--proxy http://proxy\n--hash=sha256:abcd\npandas==1.5.3\n";

    let (_temp_dir, project_dir) = create_test_project(vec![("requirements.txt", content)]);
    let extraction = extract(&project_dir, "requirements.txt");

    assert_eq!(extraction.sets[0].members.len(), 1);

    let warnings: Vec<_> = extraction
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Warning)
        .collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].check, "unknown-option");
    assert_eq!(warnings[0].line, Some(3));
    assert!(warnings[0].message.contains("--proxy"));

    let errors: Vec<_> = extraction
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].line, Some(4));
    assert!(errors[0].message.contains("--hash"));
}

/// Test handling of packages without version specifications.
///
/// This test verifies that:
/// 1. Bare package names parse as requirements
/// 2. Their specifier sets are empty
#[test]
fn test_packages_without_versions() {
    let content = "pandas\nopenpyxl\nsql_metadata\n";

    let (_temp_dir, project_dir) = create_test_project(vec![("requirements.txt", content)]);
    let extraction = extract(&project_dir, "requirements.txt");

    let members = &extraction.sets[0].members;
    assert_eq!(members.len(), 3);
    for member in members {
        assert!(member.requirement.specifiers.is_empty());
    }
}

/// Test handling of a missing requirements file.
///
/// This test verifies that:
/// 1. A nonexistent path is a hard error, not a finding
/// 2. The error names the failed read
#[test]
fn test_missing_requirements_file() {
    let temp_dir = TempDir::new().unwrap();

    let source = RequirementsSource;
    let result = source.extract(
        &temp_dir.path().join("requirements.txt"),
        &ExtractOptions::default(),
    );

    assert!(result.is_err());
    assert!(result.unwrap_err().contains("Failed to read requirements file"));
}

/// Test that parsing keeps every physical line as an entry.
///
/// This test verifies that:
/// 1. Entry line numbers are one-based physical positions
/// 2. Raw text is preserved for blanks, comments and options alike
#[test]
fn test_parse_manifest_keeps_all_lines() {
    let content = "# header\n\npandas==1.5.3\n--no-index\n";
    let manifest = parse_manifest(Path::new("requirements.txt"), content);

    assert_eq!(manifest.entries.len(), 4);
    assert_eq!(manifest.entries[0].raw, "# header");
    assert_eq!(manifest.entries[0].line, 1);
    assert!(matches!(manifest.entries[1].kind, EntryKind::Blank));
    assert_eq!(manifest.entries[2].line, 3);
    assert!(
        matches!(&manifest.entries[3].kind, EntryKind::Flag { name, known: true, .. } if name == "--no-index")
    );
}
