//! Secret wrapper for tokens and client secrets

use std::fmt;
use std::path::Path;

use zeroize::Zeroize;

use crate::error::{Error, Result};

/// Sensitive value - redacted in Debug/Display/logs, zeroized on drop.
///
/// Access tokens, refresh tokens, client secrets and webhook URLs (which embed
/// the webhook code) all travel through the workspace wrapped in this type.
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Expose the inner value (use sparingly)
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl Secret<String> {
    /// True when the wrapped string is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<String> for Secret<String> {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Secret<String> {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: Zeroize + PartialEq> PartialEq for Secret<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T: Zeroize + Eq> Eq for Secret<T> {}

/// Read a secret from a file, trimming surrounding whitespace.
///
/// Returns `Ok(None)` when the file holds only whitespace, so an empty secret
/// file behaves like an unset one.
pub fn read_secret_file(path: &Path) -> Result<Option<Secret<String>>> {
    let contents = std::fs::read_to_string(path).map_err(|source| Error::SecretFile {
        path: path.to_path_buf(),
        source,
    })?;
    let value = contents.trim();
    if value.is_empty() {
        return Ok(None);
    }
    Ok(Some(Secret::new(value.to_owned())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_redacts_debug_and_display() {
        let secret = Secret::new(String::from("at_live_token"));
        assert_eq!(format!("{secret:?}"), "[REDACTED]");
        assert_eq!(format!("{secret}"), "[REDACTED]");
    }

    #[test]
    fn test_secret_exposes_value() {
        let secret = Secret::from("rt_refresh");
        assert_eq!(secret.expose(), "rt_refresh");
    }

    #[test]
    fn test_secret_equality_compares_inner_value() {
        assert_eq!(Secret::from("a"), Secret::from("a"));
        assert_ne!(Secret::from("a"), Secret::from("b"));
    }

    #[test]
    fn test_blank_secret_detection() {
        assert!(Secret::from("  \n").is_blank());
        assert!(!Secret::from("x").is_blank());
    }

    #[test]
    fn test_read_secret_file_trims_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, "  at_from_file\n").unwrap();

        let secret = read_secret_file(&path).unwrap().unwrap();
        assert_eq!(secret.expose(), "at_from_file");
    }

    #[test]
    fn test_read_secret_file_whitespace_only_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, " \n\t ").unwrap();

        assert!(read_secret_file(&path).unwrap().is_none());
    }

    #[test]
    fn test_read_secret_file_missing_names_path() {
        let err = read_secret_file(Path::new("/nonexistent/portal/secret")).unwrap_err();
        assert!(
            err.to_string().contains("/nonexistent/portal/secret"),
            "error should name the path, got: {err}"
        );
    }
}
