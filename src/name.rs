use std::{fmt::Display, ops::Deref, str::FromStr};

use anyhow::{anyhow, bail};
use serde_with::{DeserializeFromStr, SerializeDisplay};

/// An npm package name.
///
/// # Format
///
/// Either a plain name like `left-pad` or a scoped name like `@types/node`.
/// Scope and name are non-empty ascii strings of lowercase letters `a-z` ,
/// digits `0-9` , hyphens `-` , underscores `_` and dots `.` , not starting
/// with a dot or an underscore.
#[derive(Clone, Debug, PartialEq, Eq, Hash, SerializeDisplay, DeserializeFromStr)]
pub struct PackageName(String);

impl PackageName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The name with the scope separator flattened to a hyphen, safe for
    /// use in a file name.
    pub fn flattened(&self) -> String {
        self.0.replace('/', "-")
    }

    /// The part after the scope, as used by the registry's tarball paths.
    pub fn basename(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl Deref for PackageName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromStr for PackageName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix('@') {
            Some(rest) => {
                let (scope, name) = rest
                    .split_once('/')
                    .ok_or(anyhow!("scoped name must contain a slash"))?;
                check_part(scope)?;
                check_part(name)?;
            }
            None => check_part(s)?,
        }
        Ok(PackageName(s.to_string()))
    }
}

fn check_part(part: &str) -> anyhow::Result<()> {
    let first = part.chars().next().ok_or(anyhow!("must not be empty"))?;
    if first == '.' || first == '_' {
        bail!("must not start with {first:?}");
    }
    for c in part.chars() {
        if !(c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.')) {
            bail!("invalid character {c:?}");
        }
    }
    Ok(())
}

impl Display for PackageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
