use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Atomically write content to a file
///
/// This function writes to a temporary file in the same directory,
/// syncs to disk, then renames to the target path. This ensures
/// the write is atomic on Unix and NTFS filesystems.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_directory_exists(parent)?;
        }
    }

    let temp_path = path.with_extension("tmp");

    {
        let mut file = File::create(&temp_path).with_context(|| {
            format!("Failed to create temporary file: {}", temp_path.display())
        })?;

        file.write_all(content)
            .context("Failed to write to temporary file")?;

        file.sync_all().context("Failed to sync file to disk")?;
    }

    // The file holds the admin password hash
    set_owner_only(&temp_path)?;

    std::fs::rename(&temp_path, path).with_context(|| {
        format!(
            "Failed to rename {} to {}",
            temp_path.display(),
            path.display()
        )
    })?;

    Ok(())
}

/// Ensure a directory exists, creating it and all parents if needed
pub fn ensure_directory_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    }

    Ok(())
}

/// Restrict a file to its owner (Unix only, no-op on Windows)
pub fn set_owner_only(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let metadata = std::fs::metadata(path)
            .with_context(|| format!("Failed to get metadata for: {}", path.display()))?;

        let mut permissions = metadata.permissions();
        permissions.set_mode(0o600);

        std::fs::set_permissions(path, permissions)
            .with_context(|| format!("Failed to set permissions for: {}", path.display()))?;
    }

    #[cfg(not(unix))]
    {
        let _ = path;
    }

    Ok(())
}

/// Check if running with administrator/root privileges
///
/// Without them, processes owned by other users cannot be inspected or
/// terminated.
pub fn is_elevated() -> bool {
    #[cfg(unix)]
    {
        unsafe { libc::geteuid() == 0 }
    }

    #[cfg(windows)]
    {
        // Writing to the system temp directory requires elevation. A more
        // robust check would query the process token.
        let test_path = std::path::PathBuf::from(r"C:\Windows\Temp\app-lock-test.tmp");
        match std::fs::OpenOptions::new().write(true).create(true).truncate(true).open(&test_path) {
            Ok(_) => {
                let _ = std::fs::remove_file(&test_path);
                true
            }
            Err(_) => false,
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;

    #[test]
    fn test_atomic_write() {
        let temp_dir = tempdir().unwrap();
        let test_file = temp_dir.path().join("test_atomic_write.txt");

        let content = b"test content";
        atomic_write(&test_file, content).unwrap();

        let mut file = File::open(&test_file).unwrap();
        let mut read_content = Vec::new();
        file.read_to_end(&mut read_content).unwrap();

        assert_eq!(content, &read_content[..]);
        assert!(!test_file.with_extension("tmp").exists());
    }

    #[test]
    fn test_atomic_write_nested_path() {
        let temp_dir = tempdir().unwrap();
        let test_file = temp_dir.path().join("nested").join("path").join("test.txt");

        atomic_write(&test_file, b"nested content").unwrap();
        assert_eq!(std::fs::read(&test_file).unwrap(), b"nested content");
    }

    #[test]
    fn test_atomic_write_overwrites() {
        let temp_dir = tempdir().unwrap();
        let test_file = temp_dir.path().join("config.yaml");

        atomic_write(&test_file, b"first").unwrap();
        atomic_write(&test_file, b"second").unwrap();
        assert_eq!(std::fs::read_to_string(&test_file).unwrap(), "second");
    }

    #[cfg(unix)]
    #[test]
    fn test_atomic_write_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempdir().unwrap();
        let test_file = temp_dir.path().join("secret.yaml");
        atomic_write(&test_file, b"hash").unwrap();

        let mode = std::fs::metadata(&test_file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_ensure_directory_exists_idempotent() {
        let temp_dir = tempdir().unwrap();
        let test_dir = temp_dir.path().join("idempotent_test");

        ensure_directory_exists(&test_dir).unwrap();
        assert!(test_dir.is_dir());

        ensure_directory_exists(&test_dir).unwrap();
        assert!(test_dir.is_dir());
    }
}
