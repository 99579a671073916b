use std::fmt;
use std::str::FromStr;

/// Raised when a package name cannot be imported as a Python module path.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("`{name}` is not an importable module name ({reason})")]
pub struct InvalidPackageName {
    name: String,
    reason: &'static str,
}

impl InvalidPackageName {
    fn new(name: &str, reason: &'static str) -> Self {
        Self {
            name: name.to_string(),
            reason,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A dotted Python module path such as `wikiextractor` or `pkg.sub`.
///
/// Only ASCII identifiers are accepted; the name is later embedded in the
/// probe script, so anything else is rejected up front.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageName(String);

impl PackageName {
    /// Parses and validates a module path.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPackageName`] when the value is empty or any dotted
    /// segment is not a Python identifier.
    pub fn parse(raw: &str) -> Result<Self, InvalidPackageName> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InvalidPackageName::new(raw, "empty name"));
        }
        for segment in trimmed.split('.') {
            let mut chars = segment.chars();
            let Some(first) = chars.next() else {
                return Err(InvalidPackageName::new(trimmed, "empty segment"));
            };
            if !(first == '_' || first.is_ascii_alphabetic()) {
                return Err(InvalidPackageName::new(
                    trimmed,
                    "segments must start with a letter or underscore",
                ));
            }
            if !chars.all(|ch| ch == '_' || ch.is_ascii_alphanumeric()) {
                return Err(InvalidPackageName::new(
                    trimmed,
                    "segments may only contain letters, digits, and underscores",
                ));
            }
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Top-level module, i.e. the part before the first dot.
    #[must_use]
    pub fn root(&self) -> &str {
        self.0.split('.').next().unwrap_or(&self.0)
    }
}

impl FromStr for PackageName {
    type Err = InvalidPackageName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
