use crate::checks::{run_lint, report, LintOptions, OutputFormat};
use crate::error::{Error, Result};
use clap::{Arg, ArgAction, Command};
use log::info;
use std::path::PathBuf;

/// Command line arguments for the manifest linter
#[derive(Debug)]
pub struct Args {
    /// Path to a manifest file or a project directory
    pub path: PathBuf,

    /// Whether to report warnings as errors
    pub strict: bool,

    /// Output format for the report
    pub format: OutputFormat,

    /// Whether to rewrite manifests in canonical form
    pub fix: bool,

    /// Whether to leave `-r`/`-c` directives unresolved
    pub no_follow: bool,

    /// Whether to accept requirements without version constraints
    pub allow_unpinned: bool,

    /// Whether to disable automatic restore on error
    pub disable_restore: bool,
}

/// Configures and runs the CLI
pub fn run() -> Result<Args> {
    let mut cmd = Command::new("reqlint")
        .version(env!("CARGO_PKG_VERSION"))
        .about("A linter and formatter for Python dependency manifests")
        .long_about(
            "Reqlint checks the dependency manifests of a Python project for problems the \
            installer would only reveal later: malformed requirement lines, packages declared \
            twice, version ranges no release can satisfy, and more. It understands pip \
            requirements files with their include directives, the [project] tables of \
            pyproject.toml, and the pip section of conda environment files.",
        );

    cmd = cmd.arg(
        Arg::new("PATH")
            .help("The manifest file or project directory to check")
            .long_help(
                "Specifies what to check. A directory is searched for requirements.txt, \
                requirements-*.txt, pyproject.toml and environment.yml files; a single \
                file is checked as the manifest type its name suggests.",
            )
            .value_parser(clap::value_parser!(PathBuf))
            .default_value("."),
    );

    cmd = cmd.arg(
        Arg::new("strict")
            .long("strict")
            .help("Treat warnings as errors")
            .long_help(
                "When this flag is set, every warning is reported as an error and fails \
                the run. Useful in CI, where an unpinned or redundant requirement should \
                block a merge rather than scroll past.",
            )
            .action(ArgAction::SetTrue),
    );

    cmd = cmd.arg(
        Arg::new("format")
            .long("format")
            .help("Output format for the report: text or json")
            .long_help(
                "Selects how findings are printed. The default 'text' format writes one \
                line per finding followed by a summary. The 'json' format writes a single \
                document with every finding and the summary, for consumption by other tools.",
            )
            .value_parser(clap::value_parser!(String))
            .default_value("text"),
    );

    cmd = cmd.arg(
        Arg::new("fix")
            .long("fix")
            .help("Rewrite manifests in canonical form")
            .long_help(
                "Rewrites requirement lines in their canonical spelling, for example \
                'pandas >= 1.5.3' becomes 'pandas>=1.5.3'. Comments, blank lines, options, \
                editable installs and direct URL references are left exactly as they are, \
                and the order of lines never changes.",
            )
            .action(ArgAction::SetTrue),
    );

    cmd = cmd.arg(
        Arg::new("no-follow")
            .long("no-follow")
            .help("Do not resolve -r/-c include directives")
            .long_help(
                "By default, requirements files named by '-r' and '-c' directives are \
                loaded and checked as part of the including file. With this flag the \
                directives are left alone and only the named file itself is checked.",
            )
            .action(ArgAction::SetTrue),
    );

    cmd = cmd.arg(
        Arg::new("allow-unpinned")
            .long("allow-unpinned")
            .help("Do not warn about requirements without a version constraint")
            .long_help(
                "Disables the 'unpinned' warning for requirements that accept any version, \
                such as a bare package name. Handy for loose application manifests where \
                floating to the latest release is intended.",
            )
            .action(ArgAction::SetTrue),
    );

    cmd = cmd.arg(
        Arg::new("disable-restore")
            .long("disable-restore")
            .help("Disable automatic file restore on error")
            .long_help(
                "When this flag is set, files rewritten by --fix are not restored to their \
                original state if a later write fails. This can be useful in automated \
                environments or when you want to inspect the partially formatted state.",
            )
            .action(ArgAction::SetTrue),
    );

    let after_help = "EXAMPLES:
# Check the manifests of the project in the current directory
reqlint .

# Check a single requirements file
reqlint requirements/prod.txt

# Fail on warnings, for CI pipelines
reqlint . --strict

# Rewrite manifests in canonical form
reqlint . --fix

# Emit the report as JSON
reqlint . --format json

# Check files without resolving their includes
reqlint requirements.txt --no-follow

For more information and documentation, visit:
https://github.com/stvnksslr/reqlint";

    cmd = cmd.after_help(after_help);

    let matches = cmd.get_matches();

    let format = matches
        .get_one::<String>("format")
        .map(|value| value.parse::<OutputFormat>())
        .transpose()?
        .unwrap_or_default();

    let args = Args {
        path: matches
            .get_one::<PathBuf>("PATH")
            .cloned()
            .unwrap_or_else(|| PathBuf::from(".")),
        strict: matches.get_flag("strict"),
        format,
        fix: matches.get_flag("fix"),
        no_follow: matches.get_flag("no-follow"),
        allow_unpinned: matches.get_flag("allow-unpinned"),
        disable_restore: matches.get_flag("disable-restore"),
    };

    execute(&args)?;
    Ok(args)
}

/// Runs the lint with the provided arguments
pub fn execute(args: &Args) -> Result<()> {
    info!("Checking manifests at: {}", args.path.display());

    let options = LintOptions {
        follow_includes: !args.no_follow,
        allow_unpinned: args.allow_unpinned,
        strict: args.strict,
        fix: args.fix,
        restore_enabled: !args.disable_restore,
    };

    let outcome = run_lint(&args.path, &options)?;
    print!("{}", report::render(&outcome, args.format)?);

    let errors = outcome.errors();
    if errors > 0 {
        return Err(Error::General(format!(
            "found {} error(s) in {} file(s)",
            errors, outcome.files_checked
        )));
    }

    Ok(())
}
