use super::error::IntegrityError;
use sha1::{Digest, Sha1};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

/// SHA-1 of a file as lowercase hex, read in chunks.
pub fn sha1_hex(path: &Path) -> Result<String, IntegrityError> {
    let io_err = |source: std::io::Error| IntegrityError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = BufReader::new(File::open(path).map_err(io_err)?);
    let mut hasher = Sha1::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = reader.read(&mut buffer).map_err(io_err)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Compare the file digest with `expected`. An empty expectation skips the
/// check and returns `Ok(None)`.
pub fn verify(path: &Path, expected: &str) -> Result<Option<String>, IntegrityError> {
    let expected = expected.trim().to_ascii_lowercase();
    if expected.is_empty() {
        debug!(path = %path.display(), "No digest configured, skipping integrity check");
        return Ok(None);
    }

    let actual = sha1_hex(path)?;
    if actual != expected {
        return Err(IntegrityError::Mismatch {
            path: path.to_path_buf(),
            expected,
            actual,
        });
    }

    info!(path = %path.display(), digest = %actual, "Integrity check passed");
    Ok(Some(actual))
}
