use std::io::Write;

use tracing::debug;
use vfs::VfsPath;

use crate::error::{PipelineError, PipelineResult};

pub const DEFAULT_BACKUP_SUFFIX: &str = ".bak";

/// `<file><suffix>` next to `path`.
///
/// # Errors
///
/// Fails if the backup name is not a valid path.
pub fn backup_path(path: &VfsPath, suffix: &str) -> PipelineResult<VfsPath> {
    Ok(path.parent().join(format!("{}{suffix}", path.filename()))?)
}

/// Overwrite `path` with `contents`, first copying its original bytes to
/// `<file><suffix>`. An existing backup is never overwritten.
///
/// Returns the backup path when one was created.
///
/// # Errors
///
/// Fails if the backup or the file cannot be written.
pub fn write_with_backup(
    path: &VfsPath,
    contents: &str,
    suffix: &str,
) -> PipelineResult<Option<VfsPath>> {
    let mut created = None;
    if path.is_file()? {
        let backup = backup_path(path, suffix)?;
        if backup.exists()? {
            debug!(backup = backup.as_str(), "keeping existing backup");
        } else {
            path.copy_file(&backup).map_err(|source| PipelineError::Write {
                path: backup.as_str().to_string(),
                source,
            })?;
            created = Some(backup);
        }
    } else {
        path.parent().create_dir_all()?;
    }
    let mut file = path.create_file().map_err(|source| PipelineError::Write {
        path: path.as_str().to_string(),
        source,
    })?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn read(path: &VfsPath) -> String {
        let mut out = String::new();
        path.open_file()
            .expect("open")
            .read_to_string(&mut out)
            .expect("read");
        out
    }

    #[test]
    fn backup_is_written_once() -> PipelineResult<()> {
        let root = VfsPath::new(vfs::MemoryFS::new());
        let values = root.join("values.yaml")?;
        write_with_backup(&values, "env: []\n", ".bak")?;
        assert!(!root.join("values.yaml.bak")?.exists()?);

        let backup = write_with_backup(&values, "env: {}\n", ".bak")?;
        assert_eq!(
            backup.map(|b| b.as_str().to_string()),
            Some("/values.yaml.bak".to_string())
        );
        write_with_backup(&values, "env: {a: {}}\n", ".bak")?;
        assert_eq!(read(&root.join("values.yaml.bak")?), "env: []\n");
        assert_eq!(read(&values), "env: {a: {}}\n");
        Ok(())
    }
}
