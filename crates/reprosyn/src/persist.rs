use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::ReproError;

/// How artifacts are named and deduplicated on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistMode {
    /// `<name>_<hash>.py` — content-addressed reproduction programs.
    Program,
    /// `<name>_<hash>.json` — content-addressed JSON form.
    Json,
    /// `<name>.py` — one file per entry point, no hash suffix.
    Survey,
    /// `<name>.validate` — one file per implementation identifier,
    /// first writer wins; consumed by the external driver patcher.
    Validate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    Written(PathBuf),
    /// An identical (or, for unhashed modes, same-named) artifact already
    /// exists; existing files are never overwritten.
    Duplicate(PathBuf),
}

pub fn content_hash(artifact: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(artifact.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

/// Idempotently writes one artifact.
///
/// The content hash covers the artifact body only; the optional `header`
/// line is written ahead of the body but never hashed, so the same body
/// reached through differently named kernels deduplicates.
///
/// The write uses exclusive-create semantics so a concurrent duplicate loses
/// cleanly instead of racing past an existence check. Any other I/O failure
/// aborts the batch.
pub fn persist(
    out_dir: &Path,
    name: &str,
    header: Option<&str>,
    artifact: &str,
    mode: PersistMode,
) -> Result<PersistOutcome, ReproError> {
    let filename = match mode {
        PersistMode::Program => format!("{name}_{}.py", content_hash(artifact)),
        PersistMode::Json => format!("{name}_{}.json", content_hash(artifact)),
        PersistMode::Survey => format!("{name}.py"),
        PersistMode::Validate => format!("{name}.validate"),
    };
    let path = out_dir.join(filename);

    let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
            return Ok(PersistOutcome::Duplicate(path));
        }
        Err(err) => {
            return Err(ReproError::Persistence {
                path,
                source: err,
            })
        }
    };

    let mut content = String::with_capacity(artifact.len() + 1);
    if let Some(header) = header {
        content.push_str(header);
        content.push('\n');
    }
    content.push_str(artifact);
    content.push('\n');

    file.write_all(content.as_bytes())
        .map_err(|err| ReproError::Persistence {
            path: path.clone(),
            source: err,
        })?;
    Ok(PersistOutcome::Written(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_artifacts_deduplicate() {
        let dir = tempfile::tempdir().unwrap();
        let first = persist(dir.path(), "Add", None, "x = 1", PersistMode::Program).unwrap();
        let second = persist(dir.path(), "Add", None, "x = 1", PersistMode::Program).unwrap();
        assert!(matches!(first, PersistOutcome::Written(_)));
        assert!(matches!(second, PersistOutcome::Duplicate(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn different_content_gets_a_different_path() {
        let dir = tempfile::tempdir().unwrap();
        persist(dir.path(), "Add", None, "x = 1", PersistMode::Program).unwrap();
        persist(dir.path(), "Add", None, "x = 2", PersistMode::Program).unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn header_is_written_but_not_hashed() {
        let dir = tempfile::tempdir().unwrap();
        let first =
            persist(dir.path(), "Add", Some("# AddOp"), "x = 1", PersistMode::Program).unwrap();
        let second = persist(
            dir.path(),
            "Add",
            Some("# AddOpCuda"),
            "x = 1",
            PersistMode::Program,
        )
        .unwrap();
        let PersistOutcome::Written(path) = first else {
            panic!("expected a write");
        };
        // Same body under a different header is the same artifact.
        assert!(matches!(second, PersistOutcome::Duplicate(_)));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "# AddOp\nx = 1\n");
    }

    #[test]
    fn validation_mode_keeps_the_first_writer() {
        let dir = tempfile::tempdir().unwrap();
        persist(dir.path(), "AddOp", None, "int\n1", PersistMode::Validate).unwrap();
        let second = persist(dir.path(), "AddOp", None, "int\n2", PersistMode::Validate).unwrap();
        assert!(matches!(second, PersistOutcome::Duplicate(_)));
        let content = std::fs::read_to_string(dir.path().join("AddOp.validate")).unwrap();
        assert_eq!(content, "int\n1\n");
    }

    #[test]
    fn missing_destination_directory_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent");
        let result = persist(&missing, "Add", None, "x = 1", PersistMode::Program);
        assert!(matches!(result, Err(ReproError::Persistence { .. })));
    }
}
