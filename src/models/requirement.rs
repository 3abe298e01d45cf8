use crate::models::specifier::SpecifierSet;
use regex::Regex;
use std::fmt;

/// A single named dependency with its version constraint.
///
/// This is the parsed form of a line like `pandas>=1.5.3` or
/// `sqlalchemy[asyncio]==2.0.25 ; python_version >= "3.8"`, independent of
/// which manifest format it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Requirement {
    pub name: String,
    pub extras: Vec<String>,
    pub specifiers: SpecifierSet,
    /// Environment marker text after `;`, stored verbatim
    pub markers: Option<String>,
    /// Values of per-requirement `--hash=` options
    pub hashes: Vec<String>,
    /// Other per-requirement options such as `--config-settings`, as written
    pub options: Vec<String>,
    /// One-based line in the source file, when the format has lines
    pub line: Option<usize>,
}

impl Requirement {
    /// Parses a requirement such as `pandas>=1.5.3`.
    ///
    /// Accepts the forms an installer accepts for named requirements:
    /// extras in brackets, a comma separated specifier list optionally in
    /// parentheses, an environment marker after `;` and trailing
    /// per-requirement options such as `--hash=...`. Reports a message
    /// describing the first problem found otherwise.
    pub fn parse(input: &str) -> Result<Requirement, String> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err("empty requirement".to_string());
        }

        let (text, hashes, options) = split_requirement_options(trimmed)?;

        let (head, markers) = match text.split_once(';') {
            Some((head, marker)) => {
                let marker = marker.trim();
                if marker.is_empty() {
                    return Err("environment marker after ';' is empty".to_string());
                }
                (head.trim().to_string(), Some(marker.to_string()))
            }
            None => (text, None),
        };

        let name_re = Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?").unwrap();
        let name_match = name_re
            .find(&head)
            .ok_or_else(|| format!("'{}' does not start with a valid package name", head))?;
        let name = name_match.as_str().to_string();
        let mut rest = head[name_match.end()..].trim_start();

        let mut extras = Vec::new();
        if let Some(after_bracket) = rest.strip_prefix('[') {
            let closing = after_bracket
                .find(']')
                .ok_or_else(|| format!("'{}' is missing ']' after its extras", head))?;
            for extra in after_bracket[..closing].split(',') {
                let extra = extra.trim();
                if extra.is_empty() {
                    continue;
                }
                let full_match = name_re.find(extra).map_or(false, |m| m.len() == extra.len());
                if !full_match {
                    return Err(format!("'{}' is not a valid extra name", extra));
                }
                extras.push(extra.to_string());
            }
            rest = after_bracket[closing + 1..].trim_start();
        }

        // The parenthesised form `pandas (>=1.5.3)` is accepted by installers
        let rest = rest.trim();
        let rest = match rest.strip_prefix('(') {
            Some(inner) => inner
                .strip_suffix(')')
                .ok_or_else(|| format!("'{}' is missing ')' after its specifiers", head))?
                .trim(),
            None => rest,
        };

        let specifiers = SpecifierSet::parse(rest)?;

        Ok(Requirement {
            name,
            extras,
            specifiers,
            markers,
            hashes,
            options,
            line: None,
        })
    }

    /// The name in comparison form: lowercased, with runs of `-`, `_` and
    /// `.` collapsed to a single `-`. `Python-Dateutil` and
    /// `python_dateutil` normalize to the same name.
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.extras.is_empty() {
            write!(f, "[{}]", self.extras.join(","))?;
        }
        if !self.specifiers.is_empty() {
            write!(f, "{}", self.specifiers)?;
        }
        if let Some(markers) = &self.markers {
            write!(f, " ; {}", markers)?;
        }
        Ok(())
    }
}

/// Normalizes a package name for comparison
pub fn normalize_name(name: &str) -> String {
    Regex::new(r"[-_.]+")
        .unwrap()
        .replace_all(&name.to_lowercase(), "-")
        .to_string()
}

/// Splits trailing per-requirement options off a requirement, returning the
/// remaining text, any `--hash` values and the other options as written.
/// Both the `--option=value` and `--option value` spellings are accepted,
/// matching the installer's own line parser.
fn split_requirement_options(text: &str) -> Result<(String, Vec<String>, Vec<String>), String> {
    if !text.contains("--") {
        return Ok((text.to_string(), Vec::new(), Vec::new()));
    }

    let mut kept = Vec::new();
    let mut hashes = Vec::new();
    let mut options = Vec::new();
    let mut tokens = text.split_whitespace().peekable();

    while let Some(token) = tokens.next() {
        if let Some(value) = token.strip_prefix("--hash=") {
            if value.is_empty() {
                return Err("'--hash' option has no value".to_string());
            }
            hashes.push(value.to_string());
        } else if token == "--hash" {
            match tokens.next() {
                Some(value) if !value.starts_with("--") => hashes.push(value.to_string()),
                _ => return Err("'--hash' option has no value".to_string()),
            }
        } else if token.starts_with("--") {
            if token.contains('=') {
                options.push(token.to_string());
            } else {
                // A bare option takes the next token as its value
                match tokens.peek() {
                    Some(value) if !value.starts_with("--") => {
                        options.push(format!("{} {}", token, value));
                        tokens.next();
                    }
                    _ => options.push(token.to_string()),
                }
            }
        } else {
            kept.push(token);
        }
    }
    Ok((kept.join(" "), hashes, options))
}
