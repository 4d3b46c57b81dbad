//! Request-scoped temporary files.
//!
//! A [`ScratchFile`] owns a uniquely named path and removes it when dropped,
//! so every exit path of a request (success, early return, error or panic
//! unwinding) cleans up after itself.

use std::path::{Path, PathBuf};

use uuid::Uuid;

// ---

#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    // ---
    /// Reserve a unique path in `dir`. The file itself is not created.
    ///
    /// `suffix` is appended after the random component, so callers can keep a
    /// meaningful extension (e.g. `.Z`) for downstream tools.
    pub fn reserve(dir: &Path, prefix: &str, suffix: &str) -> Self {
        // ---
        let name = format!("{}-{}{}", prefix, Uuid::new_v4(), sanitize(suffix));
        ScratchFile {
            path: dir.join(name),
        }
    }

    /// Reserve a path and write `contents` to it.
    pub async fn write(
        dir: &Path,
        prefix: &str,
        suffix: &str,
        contents: &[u8],
    ) -> std::io::Result<Self> {
        // ---
        let scratch = Self::reserve(dir, prefix, suffix);
        tokio::fs::write(&scratch.path, contents).await?;
        Ok(scratch)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        // ---
        // Synchronous unlink: callers rely on the file being gone as soon as
        // the guard is dropped, and uploads are bounded by MAX_UPLOAD_MB.
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::trace!("Removed scratch file {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Failed to remove scratch file {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// Keep only characters that are safe in a file name.
fn sanitize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[tokio::test]
    async fn test_scratch_file_removed_on_drop() {
        // ---
        let dir = std::env::temp_dir();
        let path = {
            let scratch = ScratchFile::write(&dir, "scratch-test", ".txt", b"hello")
                .await
                .unwrap();
            assert!(scratch.path().exists());
            scratch.path().to_path_buf()
        };

        assert!(!path.exists(), "scratch file should be gone after drop");
    }

    #[test]
    fn test_reserve_is_unique_and_sanitized() {
        // ---
        let dir = std::env::temp_dir();
        let a = ScratchFile::reserve(&dir, "up", "/../evil.Z");
        let b = ScratchFile::reserve(&dir, "up", "/../evil.Z");

        assert_ne!(a.path(), b.path());
        assert_eq!(a.path().parent(), Some(dir.as_path()));
        assert!(a.path().to_string_lossy().ends_with("..evil.Z"));
    }
}
