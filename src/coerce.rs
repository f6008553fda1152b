use semver::Version;

/// Tag queried when a range cannot be narrowed to a concrete version.
pub const LATEST: &str = "latest";

/// Normalize a dependency range into a single version to query the
/// registry with.
///
/// A leading caret or tilde is dropped. Anything that then parses as a
/// concrete semver version is kept unchanged; otherwise the first
/// `N[.N[.N]]` run in the string is zero-filled. Ranges without any
/// digits fall back to the [`LATEST`] tag.
pub fn coerce(range: &str) -> String {
    let range = range.trim();
    let stripped = range.strip_prefix(['^', '~']).unwrap_or(range);
    if Version::parse(stripped).is_ok() {
        return stripped.to_string();
    }
    match lossy(stripped) {
        Some(version) => version.to_string(),
        None => LATEST.to_string(),
    }
}

/// Zero-filled version from the first contiguous `N[.N[.N]]` substring.
fn lossy(s: &str) -> Option<Version> {
    let start = s.find(|c: char| c.is_ascii_digit())?;
    let mut parts = [0u64; 3];
    let mut idx = 0;
    let mut rest = &s[start..];
    loop {
        let end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        parts[idx] = rest[..end].parse().ok()?;
        idx += 1;
        rest = &rest[end..];
        if idx == 3 || !rest.starts_with('.') {
            break;
        }
        rest = &rest[1..];
        if !rest.starts_with(|c: char| c.is_ascii_digit()) {
            break;
        }
    }
    Some(Version::new(parts[0], parts[1], parts[2]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_concrete_versions() {
        assert_eq!(coerce("1.2.3"), "1.2.3");
        assert_eq!(coerce("1.0.0-beta.1"), "1.0.0-beta.1");
    }

    #[test]
    fn strips_caret_and_tilde() {
        assert_eq!(coerce("^1.2.3"), "1.2.3");
        assert_eq!(coerce("~0.4.1"), "0.4.1");
    }

    #[test]
    fn zero_fills_partial_versions() {
        assert_eq!(coerce("1.2"), "1.2.0");
        assert_eq!(coerce("~1.2"), "1.2.0");
        assert_eq!(coerce("2"), "2.0.0");
        assert_eq!(coerce("1.x"), "1.0.0");
        assert_eq!(coerce(">=2.1"), "2.1.0");
    }

    #[test]
    fn falls_back_to_latest() {
        assert_eq!(coerce("garbage"), LATEST);
        assert_eq!(coerce(""), LATEST);
        assert_eq!(coerce("*"), LATEST);
        assert_eq!(coerce("latest"), LATEST);
    }
}
