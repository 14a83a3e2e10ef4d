//! Shared helpers: atomic file writes and human-readable formatting.

use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{Result, TallyError};

/// Write `content` to `path` atomically.
///
/// The bytes go to a temporary file in the same directory, which is synced
/// and then renamed over `path`. Readers see the old file or the new one,
/// never a partial write. Missing parent directories are created.
pub fn atomic_write(path: impl AsRef<Path>, content: &[u8]) -> Result<()> {
    let path = path.as_ref();

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        Some(_) => Path::new("."),
        None => {
            return Err(TallyError::io(
                format!("Cannot determine parent directory for: {}", path.display()),
                io::Error::new(io::ErrorKind::InvalidInput, "No parent directory"),
            ))
        }
    };

    if !parent.exists() {
        std::fs::create_dir_all(parent)
            .map_err(|e| TallyError::io(format!("Failed to create directory: {}", parent.display()), e))?;
    }

    let mut temp_file = NamedTempFile::new_in(parent).map_err(|e| {
        TallyError::io(
            format!("Failed to create temporary file in: {}", parent.display()),
            e,
        )
    })?;

    temp_file
        .write_all(content)
        .and_then(|()| temp_file.flush())
        .and_then(|()| temp_file.as_file().sync_all())
        .map_err(|e| TallyError::io(format!("Failed to write temporary file for: {}", path.display()), e))?;

    temp_file
        .persist(path)
        .map_err(|e| TallyError::io(format!("Failed to replace: {}", path.display()), e.error))?;

    Ok(())
}

/// Format a byte count (`1.5 KB`, `12.0 MB`).
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Format an integer with thousands separators.
#[must_use]
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_write_creates_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/out.json");

        atomic_write(&path, b"first").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"first");

        atomic_write(&path, b"second").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");

        // No temp files left behind.
        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }
}
