pub mod lint;
pub mod report;

pub use lint::{run_lint, LintOptions, LintOutcome};
pub use report::OutputFormat;

use crate::manifest::{RequirementSet, Role, SetMember};
use crate::models::{Comparator, Diagnostic, Specifier, Version};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Switches for the individual checks
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckOptions {
    /// Accept requirements that leave the version completely open
    pub allow_unpinned: bool,
}

/// Runs every check that works on a whole requirement set
pub fn check_set(set: &RequirementSet, options: &CheckOptions) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    diagnostics.extend(check_duplicates(set));
    diagnostics.extend(check_constraint_extras(set));
    if !options.allow_unpinned {
        diagnostics.extend(check_unpinned(set));
    }
    diagnostics.extend(check_conflicts(set));
    diagnostics.extend(check_redundant(set));
    diagnostics
}

fn install_members(set: &RequirementSet) -> impl Iterator<Item = &SetMember> {
    set.members.iter().filter(|m| m.role == Role::Install)
}

fn location(member: &SetMember) -> String {
    match member.requirement.line {
        Some(line) => format!("{}:{}", member.path.display(), line),
        None => member.path.display().to_string(),
    }
}

/// Flags packages declared more than once in a set. Names compare in
/// normalized form, so `SQL-Metadata` and `sql_metadata` collide.
pub fn check_duplicates(set: &RequirementSet) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let mut seen: HashMap<String, &SetMember> = HashMap::new();

    for member in install_members(set) {
        let normalized = member.requirement.normalized_name();
        match seen.get(normalized.as_str()) {
            Some(first) => {
                let message = if first.requirement.name == member.requirement.name {
                    format!(
                        "'{}' is declared more than once, first at {}",
                        member.requirement.name,
                        location(first)
                    )
                } else {
                    format!(
                        "'{}' duplicates '{}' declared at {}",
                        member.requirement.name,
                        first.requirement.name,
                        location(first)
                    )
                };
                diagnostics.push(Diagnostic::error(
                    "duplicate-package",
                    &member.path,
                    member.requirement.line,
                    message,
                ));
            }
            None => {
                seen.insert(normalized, member);
            }
        }
    }

    diagnostics
}

/// Constraints restrict versions only, so extras have no meaning there
/// and the installer rejects them.
pub fn check_constraint_extras(set: &RequirementSet) -> Vec<Diagnostic> {
    set.members
        .iter()
        .filter(|m| m.role == Role::Constraint && !m.requirement.extras.is_empty())
        .map(|m| {
            Diagnostic::error(
                "constraint-extras",
                &m.path,
                m.requirement.line,
                format!("constraint '{}' must not name extras", m.requirement.name),
            )
        })
        .collect()
}

/// Flags requirements that accept any version at all. An exclusion like
/// `!=2.0` still counts as unpinned because it bounds nothing.
pub fn check_unpinned(set: &RequirementSet) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for member in install_members(set) {
        let specifiers = &member.requirement.specifiers;
        if specifiers.is_constrained() {
            continue;
        }
        let message = if specifiers.is_empty() {
            format!("'{}' has no version constraint", member.requirement.name)
        } else {
            format!(
                "'{}' only excludes versions and accepts any other",
                member.requirement.name
            )
        };
        diagnostics.push(Diagnostic::warning(
            "unpinned",
            &member.path,
            member.requirement.line,
            message,
        ));
    }

    diagnostics
}

/// Flags specifier sets no version can satisfy, like `>=2.0,<1.0`, and
/// installs that a constraints file shuts out entirely.
pub fn check_conflicts(set: &RequirementSet) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for member in &set.members {
        let specs = &member.requirement.specifiers.specifiers;
        if let Some((a, b)) = find_conflict(specs) {
            diagnostics.push(Diagnostic::warning(
                "unsatisfiable",
                &member.path,
                member.requirement.line,
                format!(
                    "'{}': no version satisfies both '{}' and '{}'",
                    member.requirement.name, a, b
                ),
            ));
        }
    }

    // Constraints narrow installs of the same package, so clauses from the
    // two declarations have to agree with each other as well
    let constraints: Vec<&SetMember> = set
        .members
        .iter()
        .filter(|m| m.role == Role::Constraint)
        .collect();
    if constraints.is_empty() {
        return diagnostics;
    }

    'members: for member in install_members(set) {
        let name = member.requirement.normalized_name();
        for constraint in &constraints {
            if constraint.requirement.normalized_name() != name {
                continue;
            }
            for a in &member.requirement.specifiers.specifiers {
                for b in &constraint.requirement.specifiers.specifiers {
                    if clauses_conflict(a, b) {
                        diagnostics.push(Diagnostic::warning(
                            "unsatisfiable",
                            &member.path,
                            member.requirement.line,
                            format!(
                                "'{}': '{}' cannot meet constraint '{}' from {}",
                                member.requirement.name,
                                a,
                                b,
                                location(constraint)
                            ),
                        ));
                        continue 'members;
                    }
                }
            }
        }
    }

    diagnostics
}

fn find_conflict(specs: &[Specifier]) -> Option<(&Specifier, &Specifier)> {
    for (i, a) in specs.iter().enumerate() {
        for b in &specs[i + 1..] {
            if clauses_conflict(a, b) {
                return Some((a, b));
            }
        }
    }
    None
}

/// Whether no version can satisfy `a` and `b` at the same time
fn clauses_conflict(a: &Specifier, b: &Specifier) -> bool {
    // An exact pin names one version, so the other clause has to accept it
    if a.is_exact() {
        return !b.contains(&a.version);
    }
    if b.is_exact() {
        return !a.contains(&b.version);
    }

    if a.is_lower_bound() && b.is_upper_bound() {
        return bounds_conflict(a, b);
    }
    if b.is_lower_bound() && a.is_upper_bound() {
        return bounds_conflict(b, a);
    }

    // ~= and == wildcards admit a single release series
    match (series_cap(a), series_cap(b)) {
        (Some(prefix_a), Some(prefix_b)) => {
            let shared = prefix_a.len().min(prefix_b.len());
            prefix_a[..shared] != prefix_b[..shared]
        }
        (Some(prefix), None) if b.is_lower_bound() => {
            lower_bound_exceeds_series(prefix, &b.version)
        }
        (None, Some(prefix)) if a.is_lower_bound() => {
            lower_bound_exceeds_series(prefix, &a.version)
        }
        (Some(prefix), None) if b.is_upper_bound() => upper_bound_below_series(prefix, &b.version),
        (None, Some(prefix)) if a.is_upper_bound() => upper_bound_below_series(prefix, &a.version),
        _ => false,
    }
}

fn bounds_conflict(lower: &Specifier, upper: &Specifier) -> bool {
    match lower.version.cmp(&upper.version) {
        Ordering::Greater => true,
        // Touching bounds only leave room when both ends are inclusive
        Ordering::Equal => {
            lower.comparator == Comparator::Greater || upper.comparator == Comparator::Less
        }
        Ordering::Less => false,
    }
}

/// The release prefix a clause confines versions to, if it names one.
/// `!=` wildcards punch a hole instead of naming a series, so they are out.
fn series_cap(spec: &Specifier) -> Option<&[u64]> {
    if spec.comparator == Comparator::NotEqual {
        return None;
    }
    spec.series_prefix()
}

fn lower_bound_exceeds_series(prefix: &[u64], lower: &Version) -> bool {
    let mut next = prefix.to_vec();
    match next.last_mut() {
        Some(last) => *last += 1,
        None => return false,
    }
    // The series ends just below the next release at its prefix depth
    *lower >= Version::from_release(next)
}

fn upper_bound_below_series(prefix: &[u64], upper: &Version) -> bool {
    *upper < Version::from_release(prefix.to_vec())
}

/// Flags clauses another clause already makes unnecessary, like `>=1.0`
/// next to `>=2.0`.
pub fn check_redundant(set: &RequirementSet) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for member in &set.members {
        let specs = &member.requirement.specifiers.specifiers;
        let mut found = None;

        'clauses: for (i, candidate) in specs.iter().enumerate() {
            for (j, other) in specs.iter().enumerate() {
                if i == j {
                    continue;
                }
                if candidate == other {
                    if j < i {
                        found = Some(format!("'{}' is given twice", candidate));
                        break 'clauses;
                    }
                    continue;
                }
                if implies(other, candidate) {
                    found = Some(format!(
                        "'{}' is already implied by '{}'",
                        candidate, other
                    ));
                    break 'clauses;
                }
            }
        }

        if let Some(detail) = found {
            diagnostics.push(Diagnostic::warning(
                "redundant",
                &member.path,
                member.requirement.line,
                format!("'{}': {}", member.requirement.name, detail),
            ));
        }
    }

    diagnostics
}

/// Whether clause `a` makes clause `b` unnecessary
fn implies(a: &Specifier, b: &Specifier) -> bool {
    // An exact pin decides the version, so any clause it satisfies is noise
    if a.is_exact() && !b.is_exact() {
        return b.contains(&a.version);
    }

    if matches!(a.comparator, Comparator::Greater | Comparator::GreaterEqual)
        && matches!(b.comparator, Comparator::Greater | Comparator::GreaterEqual)
    {
        return match a.version.cmp(&b.version) {
            Ordering::Greater => true,
            // At the same version the strict bound implies the inclusive one
            Ordering::Equal => a.comparator == Comparator::Greater,
            Ordering::Less => false,
        };
    }

    if matches!(a.comparator, Comparator::Less | Comparator::LessEqual)
        && matches!(b.comparator, Comparator::Less | Comparator::LessEqual)
    {
        return match a.version.cmp(&b.version) {
            Ordering::Less => true,
            Ordering::Equal => a.comparator == Comparator::Less,
            Ordering::Greater => false,
        };
    }

    false
}
