//! SHA-256 content fingerprints.
//!
//! In-memory content and files hash identically: files are streamed through
//! the same hasher in 4096-byte chunks. Remote files are hashed by running
//! `sha256sum` (or `shasum -a 256`) on the host, which yields the same hex
//! digest for the same bytes.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{io_err, BackendError};

const CHUNK_SIZE: usize = 4096;

/// Lowercase hex SHA-256 of `bytes`.
pub fn digest(bytes: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes.as_ref());
    hex::encode(hasher.finalize())
}

/// Lowercase hex SHA-256 of everything `reader` yields.
pub fn digest_reader<R: Read>(mut reader: R) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Lowercase hex SHA-256 of a local file.
///
/// A missing file is reported as [`BackendError::PathNotFound`].
pub fn digest_file(path: &Path) -> Result<String, BackendError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(BackendError::PathNotFound {
                path: path.display().to_string(),
            })
        }
        Err(e) => return Err(io_err(path, e)),
    };
    digest_reader(file).map_err(|e| io_err(path, e))
}

/// Extract the digest from `sha256sum`/`shasum` output (`<hex>  <path>`).
pub(crate) fn parse_digest_output(stdout: &str) -> Option<String> {
    let field = stdout.split_whitespace().next()?;
    let valid = field.len() == 64 && field.chars().all(|c| c.is_ascii_hexdigit());
    valid.then(|| field.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn known_vectors() {
        assert_eq!(
            digest(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            digest("x"),
            "2d711642b726b04401627ca9fbac32f5c8530fb1903cc4db02258717921a4881"
        );
    }

    #[test]
    fn file_digest_matches_content_digest_across_chunk_boundary() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("big.md");
        let content = "abcdefgh".repeat(1500);
        std::fs::write(&path, &content).unwrap();
        assert_eq!(digest_file(&path).unwrap(), digest(content.as_bytes()));
    }

    #[test]
    fn missing_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = digest_file(&tmp.path().join("absent")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn parses_sha256sum_and_shasum_output() {
        let hex = "2d711642b726b04401627ca9fbac32f5c8530fb1903cc4db02258717921a4881";
        assert_eq!(
            parse_digest_output(&format!("{hex}  /srv/app/x.md\n")).as_deref(),
            Some(hex)
        );
        assert_eq!(parse_digest_output("").as_deref(), None);
        assert_eq!(parse_digest_output("not-a-digest file").as_deref(), None);
    }
}
