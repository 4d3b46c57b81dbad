//! Content preparation for uploaded observation files.
//!
//! - `.gz` is inflated in-process with `flate2`.
//! - `.Z` (Unix `compress`) is handed to the system `gzip -dc`, which reads
//!   the LZW container.
//! - Anything else is read as-is.
//!
//! Callers treat every [`DecompressError`] as "no usable content".

use std::{io::Read, path::Path, process::Stdio};

use flate2::read::GzDecoder;
use tokio::process::Command;

// ---

#[derive(thiserror::Error, Debug)]
pub enum DecompressError {
    // ---
    #[error("failed to read upload: {0}")]
    Io(#[from] std::io::Error),

    #[error("gzip stream is corrupt: {0}")]
    Gzip(std::io::Error),

    #[error("unix compress container could not be expanded: {0}")]
    UnixCompress(String),
}

/// Container format, decided from the original file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    // ---
    Plain,
    Gzip,
    UnixCompress,
}

impl Container {
    pub fn from_name(name: &str) -> Self {
        // ---
        if name.ends_with(".Z") || name.ends_with(".z") {
            Container::UnixCompress
        } else if name.to_ascii_lowercase().ends_with(".gz") {
            Container::Gzip
        } else {
            Container::Plain
        }
    }
}

/// Return the decompressed content of the file at `path`.
pub async fn decompress(path: &Path, container: Container) -> Result<Vec<u8>, DecompressError> {
    // ---
    match container {
        Container::Plain => Ok(tokio::fs::read(path).await?),
        Container::Gzip => {
            let raw = tokio::fs::read(path).await?;
            gunzip(&raw)
        }
        Container::UnixCompress => uncompress(path).await,
    }
}

fn gunzip(raw: &[u8]) -> Result<Vec<u8>, DecompressError> {
    // ---
    let mut out = Vec::new();
    GzDecoder::new(raw)
        .read_to_end(&mut out)
        .map_err(DecompressError::Gzip)?;
    Ok(out)
}

async fn uncompress(path: &Path) -> Result<Vec<u8>, DecompressError> {
    // ---
    let output = Command::new("gzip")
        .arg("-dc")
        .arg(path)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| DecompressError::UnixCompress(format!("gzip could not be started: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DecompressError::UnixCompress(format!(
            "gzip exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::scratch::ScratchFile;
    use flate2::{write::GzEncoder, Compression};
    use std::io::Write;

    #[test]
    fn test_container_from_name() {
        // ---
        assert_eq!(Container::from_name("ALGO0010.24o.Z"), Container::UnixCompress);
        assert_eq!(Container::from_name("ALGO00CAN_R_20240010000_01D_30S_MO.rnx.gz"), Container::Gzip);
        assert_eq!(Container::from_name("ALGO0010.24O"), Container::Plain);
    }

    #[tokio::test]
    async fn test_gzip_upload_is_inflated() {
        // ---
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"END OF HEADER\n").unwrap();
        let gz = enc.finish().unwrap();

        let dir = std::env::temp_dir();
        let file = ScratchFile::write(&dir, "decompress-test", ".gz", &gz)
            .await
            .unwrap();

        let content = decompress(file.path(), Container::Gzip).await.unwrap();
        assert_eq!(content, b"END OF HEADER\n");
    }

    #[tokio::test]
    async fn test_corrupt_gzip_is_an_error() {
        // ---
        let dir = std::env::temp_dir();
        let file = ScratchFile::write(&dir, "decompress-test", ".gz", b"not gzip at all")
            .await
            .unwrap();

        let err = decompress(file.path(), Container::Gzip).await.unwrap_err();
        assert!(matches!(err, DecompressError::Gzip(_)));
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        // ---
        let path = std::env::temp_dir().join("decompress-test-does-not-exist.rnx");
        let err = decompress(&path, Container::Plain).await.unwrap_err();
        assert!(matches!(err, DecompressError::Io(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unix_compress_is_expanded() {
        // ---
        let fixture = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/ALGO0010.24o.Z");

        let content = decompress(&fixture, Container::UnixCompress).await.unwrap();
        let text = String::from_utf8(content).unwrap();

        assert!(text.contains("END OF HEADER"));
        assert!(text.contains("       12.5000"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_corrupt_unix_compress_is_an_error() {
        // ---
        let dir = std::env::temp_dir();
        let file = ScratchFile::write(&dir, "decompress-test", ".Z", b"not compressed")
            .await
            .unwrap();

        let err = decompress(file.path(), Container::UnixCompress).await.unwrap_err();
        assert!(matches!(err, DecompressError::UnixCompress(_)));
    }
}
