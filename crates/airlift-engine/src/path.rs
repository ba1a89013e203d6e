//! Resource path validation and canonicalization
//!
//! Remote resource paths arrive from callers in whatever shape the UI or the
//! platform produced them: padded with whitespace, missing the leading slash,
//! or outright broken. This module turns a raw path into its canonical
//! absolute form, or rejects it before any transport activity happens.

use airlift_types::{Result, TransferError};

/// Canonicalize a raw resource path
///
/// Leading and trailing whitespace is trimmed first. The trimmed value is
/// rejected when it is empty, ends with `/` (a directory, not a file), or
/// contains control characters anywhere. A missing leading `/` is prepended.
/// The function is pure and idempotent: feeding a canonical path back in
/// returns it unchanged.
///
/// # Examples
///
/// ```rust
/// use airlift_engine::path::normalize;
///
/// assert_eq!(normalize("  fw/app.bin ").unwrap(), "/fw/app.bin");
/// assert_eq!(normalize("/fw/app.bin").unwrap(), "/fw/app.bin");
/// assert!(normalize("fw/").is_err());
/// ```
pub fn normalize(raw: &str) -> Result<String> {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return Err(TransferError::invalid_argument(
            "resource path cannot be empty or blank",
        ));
    }
    if trimmed.ends_with('/') {
        return Err(TransferError::invalid_argument(format!(
            "resource path '{trimmed}' points to a directory, not a file"
        )));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(TransferError::invalid_argument(format!(
            "resource path '{}' contains control characters",
            trimmed.escape_debug()
        )));
    }

    if trimmed.starts_with('/') {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("/{trimmed}"))
    }
}

/// Canonicalize a whole collection of raw resource paths
///
/// All inputs are validated before any is accepted: when one or more entries
/// are invalid, the returned `InvalidArgument` error names every offending
/// entry, and no canonical paths are produced. Duplicates are preserved;
/// collapsing them is the batch scheduler's concern.
pub fn normalize_many<I, S>(raws: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut canonical = Vec::new();
    let mut rejected = Vec::new();

    for raw in raws {
        match normalize(raw.as_ref()) {
            Ok(path) => canonical.push(path),
            Err(error) => rejected.push(error.to_string()),
        }
    }

    if rejected.is_empty() {
        Ok(canonical)
    } else {
        Err(TransferError::invalid_argument(format!(
            "{} resource path(s) rejected: {}",
            rejected.len(),
            rejected.join("; ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airlift_types::ErrorKind;
    use proptest::prelude::*;
    use rstest::rstest;

    proptest! {
        #[test]
        fn test_normalize_is_idempotent(raw in ".*") {
            if let Ok(canonical) = normalize(&raw) {
                prop_assert_eq!(normalize(&canonical).unwrap(), canonical);
            }
        }

        #[test]
        fn test_canonical_paths_are_absolute(raw in ".*") {
            if let Ok(canonical) = normalize(&raw) {
                prop_assert!(canonical.starts_with('/'));
                prop_assert!(!canonical.ends_with('/'));
                prop_assert!(!canonical.chars().any(char::is_control));
            }
        }
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("\t\t")]
    #[case("foo/bar/")]
    #[case("/foo/bar/")]
    #[case("/")]
    #[case("foo\rbar")]
    #[case("foo\nbar")]
    #[case("foo\x0cbar")]
    fn test_rejected_paths(#[case] raw: &str) {
        let error = normalize(raw).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidArgument);
    }

    #[rstest]
    #[case("fw/app.bin", "/fw/app.bin")]
    #[case("/fw/app.bin", "/fw/app.bin")]
    #[case("  fw/app.bin  ", "/fw/app.bin")]
    #[case("  /fw/app.bin", "/fw/app.bin")]
    #[case("file with spaces.bin", "/file with spaces.bin")]
    fn test_canonical_forms(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize(raw).unwrap(), expected);
    }

    #[test]
    fn test_case_is_preserved() {
        assert_eq!(normalize("FW/App.BIN").unwrap(), "/FW/App.BIN");
    }

    #[test]
    fn test_normalize_many_happy_path() {
        let canonical = normalize_many(["a.bin", "/b.bin", "  c.bin "]).unwrap();
        assert_eq!(canonical, vec!["/a.bin", "/b.bin", "/c.bin"]);
    }

    #[test]
    fn test_normalize_many_names_every_offender() {
        let error = normalize_many(["good.bin", "bad/", "", "also-good.bin"]).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidArgument);

        let message = error.to_string();
        assert!(message.contains("2 resource path(s) rejected"));
        assert!(message.contains("bad/"));
        assert!(message.contains("empty or blank"));
    }

    #[test]
    fn test_normalize_many_keeps_duplicates() {
        let canonical = normalize_many(["a.bin", "/a.bin", " a.bin"]).unwrap();
        assert_eq!(canonical.len(), 3);
        assert!(canonical.iter().all(|p| p == "/a.bin"));
    }
}
