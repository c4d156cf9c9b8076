//! Artifact digests for publishing and verifying updates.
//!
//! Publishers record `sha256:<hex>` in the manifest's `signature` field.
//! Before an update is applied the downloaded artifact is hashed again and
//! compared; a mismatch aborts the update.
//!
//! ```rust
//! use kiosk_updater::update::integrity::parse_signature;
//!
//! assert_eq!(parse_signature("sha256:ABCD").unwrap(), "abcd");
//! assert!(parse_signature("md5:abcd").is_err());
//! ```

use crate::error::{Result, UpdateError};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

const SIGNATURE_PREFIX: &str = "sha256:";

/// Compute the SHA-256 hex digest of a file's contents.
///
/// Reads in 64 KiB chunks so installer-sized files are never fully buffered.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path).map_err(|e| {
        UpdateError::Filesystem(format!("cannot open {} for hashing: {e}", path.display()))
    })?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 65_536];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Formats a digest as a manifest signature (`sha256:<hex>`).
pub fn signature_for(digest_hex: &str) -> String {
    format!("{SIGNATURE_PREFIX}{}", digest_hex.to_ascii_lowercase())
}

/// Extracts the lowercase hex digest from a `sha256:<hex>` signature.
pub fn parse_signature(signature: &str) -> Result<String> {
    let digest = signature
        .trim()
        .strip_prefix(SIGNATURE_PREFIX)
        .ok_or_else(|| {
            UpdateError::Parse(format!("unsupported signature format {signature:?}"))
        })?;
    if digest.is_empty() || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(UpdateError::Parse(format!(
            "signature digest is not hex: {signature:?}"
        )));
    }
    Ok(digest.to_ascii_lowercase())
}

/// Verifies `path` against a `sha256:<hex>` signature.
///
/// # Errors
///
/// [`UpdateError::Parse`] for an unusable signature,
/// [`UpdateError::Filesystem`] if the file cannot be read, and
/// [`UpdateError::Integrity`] when the digests differ.
pub fn verify(path: &Path, signature: &str) -> Result<()> {
    let expected = parse_signature(signature)?;
    let actual = sha256_file(path)?;
    if actual != expected {
        warn!(
            path = %path.display(),
            expected = %expected,
            actual = %actual,
            "artifact digest mismatch"
        );
        return Err(UpdateError::Integrity(format!(
            "{} has digest {actual}, expected {expected}",
            path.display()
        )));
    }
    info!(path = %path.display(), "artifact digest ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(content: &[u8]) -> NamedTempFile {
        let mut f = NamedTempFile::new().expect("create temp file");
        f.write_all(content).expect("write content");
        f
    }

    fn digest_of(content: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content);
        format!("{:x}", hasher.finalize())
    }

    #[test]
    fn sha256_file_matches_in_memory_digest() {
        let content = b"kiosk installer bytes";
        let f = write_temp(content);
        assert_eq!(sha256_file(f.path()).unwrap(), digest_of(content));
    }

    #[test]
    fn sha256_file_spans_multiple_chunks() {
        let content = vec![7u8; 200_000];
        let f = write_temp(&content);
        assert_eq!(sha256_file(f.path()).unwrap(), digest_of(&content));
    }

    #[test]
    fn sha256_of_missing_file_is_filesystem_error() {
        let err = sha256_file(Path::new("/nonexistent/kiosk.exe")).unwrap_err();
        assert!(matches!(err, UpdateError::Filesystem(_)));
    }

    #[test]
    fn verify_accepts_matching_signature_in_any_case() {
        let content = b"payload";
        let f = write_temp(content);
        let upper = format!("sha256:{}", digest_of(content).to_uppercase());
        assert!(verify(f.path(), &upper).is_ok());
        assert!(verify(f.path(), &signature_for(&digest_of(content))).is_ok());
    }

    #[test]
    fn verify_rejects_tampered_file() {
        let f = write_temp(b"tampered");
        let sig = signature_for(&digest_of(b"original"));
        let err = verify(f.path(), &sig).unwrap_err();
        assert!(matches!(err, UpdateError::Integrity(_)));
    }

    #[test]
    fn parse_signature_rejects_bad_input() {
        assert!(parse_signature("abcd").is_err());
        assert!(parse_signature("sha256:").is_err());
        assert!(parse_signature("sha256:xyz").is_err());
    }
}
