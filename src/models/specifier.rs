use crate::models::version::Version;
use std::cmp::Ordering;
use std::fmt;

/// Comparison operator of a version specifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `<=`
    LessEqual,
    /// `>=`
    GreaterEqual,
    /// `<`
    Less,
    /// `>`
    Greater,
    /// `~=`
    Compatible,
}

impl Comparator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparator::Equal => "==",
            Comparator::NotEqual => "!=",
            Comparator::LessEqual => "<=",
            Comparator::GreaterEqual => ">=",
            Comparator::Less => "<",
            Comparator::Greater => ">",
            Comparator::Compatible => "~=",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single version clause such as `>=1.5.3` or `==1.5.*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Specifier {
    pub comparator: Comparator,
    pub version: Version,
    /// Set for prefix clauses like `==1.5.*`, only valid with `==`/`!=`
    pub wildcard: bool,
}

impl Specifier {
    /// Parses a single clause like `>=1.5.3`.
    ///
    /// Follows the installer's rules for which operators accept which
    /// version forms: wildcards only with `==`/`!=` on a plain release,
    /// local tags only with `==`/`!=`, and `~=` requires at least two
    /// release segments.
    pub fn parse(input: &str) -> Result<Specifier, String> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err("empty version specifier".to_string());
        }

        if let Some(rest) = trimmed.strip_prefix("===") {
            return Err(format!(
                "arbitrary equality '==={}' is not supported, use '=={}'",
                rest.trim(),
                rest.trim()
            ));
        }

        let (comparator, rest) = if let Some(rest) = trimmed.strip_prefix("==") {
            (Comparator::Equal, rest)
        } else if let Some(rest) = trimmed.strip_prefix("!=") {
            (Comparator::NotEqual, rest)
        } else if let Some(rest) = trimmed.strip_prefix("<=") {
            (Comparator::LessEqual, rest)
        } else if let Some(rest) = trimmed.strip_prefix(">=") {
            (Comparator::GreaterEqual, rest)
        } else if let Some(rest) = trimmed.strip_prefix("~=") {
            (Comparator::Compatible, rest)
        } else if let Some(rest) = trimmed.strip_prefix('<') {
            (Comparator::Less, rest)
        } else if let Some(rest) = trimmed.strip_prefix('>') {
            (Comparator::Greater, rest)
        } else if trimmed.starts_with('=') {
            return Err(format!(
                "'{}' uses a single '=', use '==' to pin a version",
                trimmed
            ));
        } else {
            return Err(format!("'{}' is missing a comparison operator", trimmed));
        };

        let version_text = rest.trim();
        if version_text.is_empty() {
            return Err(format!("'{}' is missing a version", trimmed));
        }

        let (version_text, wildcard) = match version_text.strip_suffix(".*") {
            Some(prefix) => (prefix, true),
            None => (version_text, false),
        };

        let version: Version = version_text.parse()?;

        if wildcard {
            if !matches!(comparator, Comparator::Equal | Comparator::NotEqual) {
                return Err(format!(
                    "'.*' can only be used with '==' or '!=', not '{}'",
                    comparator
                ));
            }
            if version.pre.is_some()
                || version.post.is_some()
                || version.dev.is_some()
                || version.local.is_some()
            {
                return Err(format!(
                    "'.*' can only follow a plain release version, not '{}'",
                    version_text
                ));
            }
        }

        if version.local.is_some()
            && !matches!(comparator, Comparator::Equal | Comparator::NotEqual)
        {
            return Err(format!(
                "a local version cannot be used with '{}'",
                comparator
            ));
        }

        if comparator == Comparator::Compatible {
            if version.release.len() < 2 {
                return Err(format!(
                    "'~={}' needs at least two release segments",
                    version
                ));
            }
            if version.local.is_some() {
                return Err("a local version cannot be used with '~='".to_string());
            }
        }

        Ok(Specifier {
            comparator,
            version,
            wildcard,
        })
    }

    /// Whether a concrete version satisfies this clause
    pub fn contains(&self, candidate: &Version) -> bool {
        match self.comparator {
            Comparator::Equal => self.matches_equal(candidate),
            Comparator::NotEqual => !self.matches_equal(candidate),
            Comparator::LessEqual => candidate.cmp(&self.version) != Ordering::Greater,
            Comparator::GreaterEqual => candidate.cmp(&self.version) != Ordering::Less,
            Comparator::Less => candidate.cmp(&self.version) == Ordering::Less,
            Comparator::Greater => candidate.cmp(&self.version) == Ordering::Greater,
            Comparator::Compatible => {
                candidate.cmp(&self.version) != Ordering::Less
                    && self.release_prefix_matches(candidate, self.version.release.len() - 1)
            }
        }
    }

    /// Whether this clause pins an exact version, like `==1.5.3`
    pub fn is_exact(&self) -> bool {
        self.comparator == Comparator::Equal && !self.wildcard
    }

    /// Whether this clause bounds the version from below
    pub fn is_lower_bound(&self) -> bool {
        matches!(
            self.comparator,
            Comparator::Greater | Comparator::GreaterEqual | Comparator::Compatible
        )
    }

    /// Whether this clause bounds the version from above
    pub fn is_upper_bound(&self) -> bool {
        matches!(self.comparator, Comparator::Less | Comparator::LessEqual)
    }

    /// The release prefix implied by `~=` or a wildcard clause.
    ///
    /// `~=2.0.1` constrains to the `2.0` series and `==1.5.*` to the `1.5`
    /// series, so redundancy and conflict checks can reason about both the
    /// same way.
    pub fn series_prefix(&self) -> Option<&[u64]> {
        match self.comparator {
            Comparator::Compatible => {
                Some(&self.version.release[..self.version.release.len() - 1])
            }
            Comparator::Equal | Comparator::NotEqual if self.wildcard => {
                Some(&self.version.release[..])
            }
            _ => None,
        }
    }

    fn matches_equal(&self, candidate: &Version) -> bool {
        if self.wildcard {
            return candidate.epoch == self.version.epoch
                && self.release_prefix_matches(candidate, self.version.release.len());
        }
        // A pin without a local tag matches any local build of that version
        if self.version.local.is_none() {
            let mut public = candidate.clone();
            public.local = None;
            public == self.version
        } else {
            candidate == &self.version
        }
    }

    fn release_prefix_matches(&self, candidate: &Version, segments: usize) -> bool {
        (0..segments).all(|i| candidate.release_segment(i) == self.version.release_segment(i))
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.comparator, self.version)?;
        if self.wildcard {
            write!(f, ".*")?;
        }
        Ok(())
    }
}

/// A comma separated list of clauses, such as `>=1.5.3,<2.0`.
///
/// An empty set places no constraint on the version at all, which is what
/// a bare `pandas` line means.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecifierSet {
    pub specifiers: Vec<Specifier>,
}

impl SpecifierSet {
    pub fn parse(input: &str) -> Result<SpecifierSet, String> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(SpecifierSet::default());
        }

        let mut specifiers = Vec::new();
        for clause in trimmed.split(',') {
            if clause.trim().is_empty() {
                return Err(format!("empty clause in specifier list '{}'", trimmed));
            }
            specifiers.push(Specifier::parse(clause)?);
        }
        Ok(SpecifierSet { specifiers })
    }

    pub fn is_empty(&self) -> bool {
        self.specifiers.is_empty()
    }

    /// Whether a concrete version satisfies every clause in the set
    #[allow(dead_code)]
    pub fn contains(&self, candidate: &Version) -> bool {
        self.specifiers.iter().all(|s| s.contains(candidate))
    }

    /// Whether the set restricts the version at all.
    ///
    /// `~=` and wildcard pins count as constrained even though they are
    /// not exact pins.
    pub fn is_constrained(&self) -> bool {
        self.specifiers
            .iter()
            .any(|s| s.comparator != Comparator::NotEqual)
    }
}

impl fmt::Display for SpecifierSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .specifiers
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(",");
        f.write_str(&joined)
    }
}
