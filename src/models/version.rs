use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Pre-release phase of a version, ordered alpha < beta < release candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreRelease {
    Alpha(u64),
    Beta(u64),
    Rc(u64),
}

impl fmt::Display for PreRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreRelease::Alpha(n) => write!(f, "a{}", n),
            PreRelease::Beta(n) => write!(f, "b{}", n),
            PreRelease::Rc(n) => write!(f, "rc{}", n),
        }
    }
}

/// A package version under the standard version-specifier grammar.
///
/// Covers the forms that appear in dependency manifests: an optional
/// epoch (`1!2.0`), dotted numeric release segments, pre-release markers
/// (`1.0a1`, `1.0b2`, `1.0rc1`), post and dev releases (`1.0.post1`,
/// `1.0.dev3`) and a local tag (`1.0+cpu`). Release segments compare with
/// trailing-zero padding, so `1.2` and `1.2.0` are equal.
#[derive(Debug, Clone, Eq)]
pub struct Version {
    pub epoch: u64,
    pub release: Vec<u64>,
    pub pre: Option<PreRelease>,
    pub post: Option<u64>,
    pub dev: Option<u64>,
    pub local: Option<String>,
}

/// Position of a version relative to its final release, used for ordering.
/// A bare dev release sorts before any pre-release, which sorts before the
/// final release.
#[derive(PartialEq, Eq, PartialOrd, Ord)]
enum Phase {
    DevOnly,
    Pre(PreRelease),
    Final,
}

impl Version {
    /// Creates a plain release version from its numeric segments
    pub fn from_release(release: Vec<u64>) -> Self {
        Version {
            epoch: 0,
            release,
            pre: None,
            post: None,
            dev: None,
            local: None,
        }
    }

    /// Release segments with trailing zeros removed, for comparison
    pub fn trimmed_release(&self) -> &[u64] {
        let mut max = self.release.len();
        while max > 1 && self.release[max - 1] == 0 {
            max -= 1;
        }
        &self.release[0..max]
    }

    /// Release segment at `index`, padded with zeros past the end
    pub fn release_segment(&self, index: usize) -> u64 {
        self.release.get(index).copied().unwrap_or(0)
    }

    fn phase(&self) -> Phase {
        match self.pre {
            Some(pre) => Phase::Pre(pre),
            None if self.post.is_none() && self.dev.is_some() => Phase::DevOnly,
            None => Phase::Final,
        }
    }

    // None sorts after Some so that `1.0.dev1 < 1.0`.
    fn dev_key(&self) -> (bool, u64) {
        match self.dev {
            Some(n) => (false, n),
            None => (true, 0),
        }
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Version) -> bool {
        self.epoch == other.epoch
            && self.trimmed_release() == other.trimmed_release()
            && self.pre == other.pre
            && self.post == other.post
            && self.dev == other.dev
            && self.local == other.local
    }
}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.epoch.hash(state);
        self.trimmed_release().hash(state);
        self.pre.hash(state);
        self.post.hash(state);
        self.dev.hash(state);
        self.local.hash(state);
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Version) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Version) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| self.trimmed_release().cmp(other.trimmed_release()))
            .then_with(|| self.phase().cmp(&other.phase()))
            .then_with(|| self.post.cmp(&other.post))
            .then_with(|| self.dev_key().cmp(&other.dev_key()))
            .then_with(|| self.local.cmp(&other.local))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch != 0 {
            write!(f, "{}!", self.epoch)?;
        }
        let release = self
            .release
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(".");
        write!(f, "{}", release)?;
        if let Some(pre) = &self.pre {
            write!(f, "{}", pre)?;
        }
        if let Some(post) = self.post {
            write!(f, ".post{}", post)?;
        }
        if let Some(dev) = self.dev {
            write!(f, ".dev{}", dev)?;
        }
        if let Some(local) = &self.local {
            write!(f, "+{}", local)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let re = Regex::new(
            r"(?ix)^v?
              (?:(?P<epoch>[0-9]+)!)?
              (?P<release>[0-9]+(?:\.[0-9]+)*)
              (?:[-_.]?(?P<pre_l>a|alpha|b|beta|c|rc|pre|preview)[-_.]?(?P<pre_n>[0-9]+)?)?
              (?P<post>-(?P<post_n1>[0-9]+)|[-_.]?(?:post|rev|r)[-_.]?(?P<post_n2>[0-9]+)?)?
              (?P<dev>[-_.]?dev[-_.]?(?P<dev_n>[0-9]+)?)?
              (?:\+(?P<local>[a-z0-9]+(?:[-_.][a-z0-9]+)*))?$",
        )
        .unwrap();

        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("empty version".to_string());
        }

        let captures = re
            .captures(trimmed)
            .ok_or_else(|| format!("invalid version '{}'", trimmed))?;

        let parse_number = |text: &str| {
            text.parse::<u64>()
                .map_err(|_| format!("version segment '{}' is out of range", text))
        };

        let epoch = match captures.name("epoch") {
            Some(m) => parse_number(m.as_str())?,
            None => 0,
        };

        let mut release = Vec::new();
        for segment in captures["release"].split('.') {
            release.push(parse_number(segment)?);
        }

        let pre = match captures.name("pre_l") {
            Some(label) => {
                let number = match captures.name("pre_n") {
                    Some(m) => parse_number(m.as_str())?,
                    None => 0,
                };
                Some(match label.as_str().to_ascii_lowercase().as_str() {
                    "a" | "alpha" => PreRelease::Alpha(number),
                    "b" | "beta" => PreRelease::Beta(number),
                    _ => PreRelease::Rc(number),
                })
            }
            None => None,
        };

        // A bare `post` or `dev` marker without a number means release 0
        let post = match captures.name("post") {
            Some(_) => match captures.name("post_n1").or_else(|| captures.name("post_n2")) {
                Some(m) => Some(parse_number(m.as_str())?),
                None => Some(0),
            },
            None => None,
        };

        let dev = match captures.name("dev") {
            Some(_) => match captures.name("dev_n") {
                Some(m) => Some(parse_number(m.as_str())?),
                None => Some(0),
            },
            None => None,
        };

        let local = captures
            .name("local")
            .map(|m| m.as_str().to_ascii_lowercase());

        Ok(Version {
            epoch,
            release,
            pre,
            post,
            dev,
            local,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ver(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_plain_release() {
        let v = ver("1.5.3");
        assert_eq!(v.release, vec![1, 5, 3]);
        assert_eq!(v.epoch, 0);
        assert!(v.pre.is_none());
        assert!(v.post.is_none());
        assert!(v.dev.is_none());
    }

    #[test]
    fn test_parse_single_segment() {
        // pywin32-style integer versions are valid
        let v = ver("306");
        assert_eq!(v.release, vec![306]);
    }

    #[test]
    fn test_parse_full_forms() {
        let cases = vec![
            ("1!2.0", Version { epoch: 1, ..Version::from_release(vec![2, 0]) }),
            (
                "1.0a1",
                Version { pre: Some(PreRelease::Alpha(1)), ..Version::from_release(vec![1, 0]) },
            ),
            (
                "1.0.beta2",
                Version { pre: Some(PreRelease::Beta(2)), ..Version::from_release(vec![1, 0]) },
            ),
            (
                "1.0rc1",
                Version { pre: Some(PreRelease::Rc(1)), ..Version::from_release(vec![1, 0]) },
            ),
            ("1.0.post2", Version { post: Some(2), ..Version::from_release(vec![1, 0]) }),
            ("1.0.dev3", Version { dev: Some(3), ..Version::from_release(vec![1, 0]) }),
            (
                "1.0+cpu",
                Version { local: Some("cpu".to_string()), ..Version::from_release(vec![1, 0]) },
            ),
        ];

        for (input, expected) in cases {
            assert_eq!(ver(input), expected, "failed for input: {:?}", input);
        }
    }

    #[test]
    fn test_parse_invalid() {
        for input in ["", "abc", "1.2.3-", "1..2", ".", "1.2.x", "==1.0"] {
            assert!(input.parse::<Version>().is_err(), "accepted: {:?}", input);
        }
    }

    #[test]
    fn test_trailing_zero_equality() {
        assert_eq!(ver("1.2"), ver("1.2.0"));
        assert_eq!(ver("1.2.0.0"), ver("1.2"));
        assert_ne!(ver("1.2"), ver("1.2.1"));
    }

    #[test]
    fn test_ordering_chain() {
        // The canonical ordering chain for a single release
        let chain = [
            "1.0.dev456",
            "1.0a1",
            "1.0a2.dev456",
            "1.0a12.dev456",
            "1.0a12",
            "1.0b1.dev456",
            "1.0b2",
            "1.0b2.post345.dev456",
            "1.0b2.post345",
            "1.0rc1.dev456",
            "1.0rc1",
            "1.0",
            "1.0.post456.dev34",
            "1.0.post456",
            "1.1.dev1",
        ];

        for pair in chain.windows(2) {
            assert!(
                ver(pair[0]) < ver(pair[1]),
                "expected {} < {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_epoch_dominates() {
        assert!(ver("1!1.0") > ver("2.0"));
        assert!(ver("1!1.0") < ver("2!0.1"));
    }

    #[test]
    fn test_display_roundtrip() {
        for input in ["1.5.3", "306", "1!2.0", "1.0a1", "1.0.post2", "1.0.dev3", "1.0+cpu"] {
            assert_eq!(ver(input).to_string(), input);
        }
    }

    #[test]
    fn test_display_normalizes_spellings() {
        assert_eq!(ver("1.0.alpha1").to_string(), "1.0a1");
        assert_eq!(ver("1.0.rev2").to_string(), "1.0.post2");
        assert_eq!(ver("V1.2").to_string(), "1.2");
    }
}
