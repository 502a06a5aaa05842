//! Append-only JSON-lines archive of experience batches.
//!
//! Attached as an [`ExperienceSink`], it receives every batch right before an
//! optimization pass clears the learning buffer.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::agent::{Experience, ExperienceSink};
use crate::settings::AppSettings;

/// Archive errors.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Cannot determine data directory")]
    NoDataDir,
}

/// Experience archive stored as one JSON object per line.
#[derive(Debug, Clone)]
pub struct ExperienceArchive {
    path: PathBuf,
}

impl ExperienceArchive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Archive in the platform data directory.
    pub fn default_location() -> Result<Self, ArchiveError> {
        AppSettings::data_dir()
            .map(|dir| Self::new(dir.join("experiences.jsonl")))
            .ok_or(ArchiveError::NoDataDir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `batch`, creating the file and parent directories if needed.
    pub fn append(&self, batch: &[Experience]) -> Result<(), ArchiveError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = BufWriter::new(file);
        for experience in batch {
            serde_json::to_writer(&mut writer, experience)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Read every archived experience, skipping lines that fail to parse.
    pub fn load(&self) -> Result<Vec<Experience>, ArchiveError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let mut experiences = Vec::new();
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(experience) => experiences.push(experience),
                Err(e) => tracing::warn!("Skipping archive line {}: {}", number + 1, e),
            }
        }
        Ok(experiences)
    }
}

impl ExperienceSink for ExperienceArchive {
    fn persist(&mut self, batch: &[Experience]) -> anyhow::Result<()> {
        self.append(batch)?;
        tracing::debug!("Archived {} experiences to {}", batch.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Action, Outcome, Snapshot};

    #[test]
    fn test_append_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut archive = ExperienceArchive::new(dir.path().join("nested/experiences.jsonl"));

        let batch = vec![
            Experience::new(Snapshot::empty(), Action::NoOp, Outcome::success()),
            Experience::new(Snapshot::empty(), Action::Wait { duration_ms: 5 }, Outcome::success()),
        ];
        archive.persist(&batch).unwrap();
        archive.persist(&batch[..1]).unwrap();

        let loaded = archive.load().unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0].id, batch[0].id);
        assert_eq!(loaded[1].action, Action::Wait { duration_ms: 5 });
    }

    #[test]
    fn test_load_skips_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("experiences.jsonl");
        let archive = ExperienceArchive::new(&path);
        archive
            .append(&[Experience::new(Snapshot::empty(), Action::NoOp, Outcome::success())])
            .unwrap();
        fs::write(&path, format!("{}not json\n", fs::read_to_string(&path).unwrap())).unwrap();

        assert_eq!(archive.load().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let archive = ExperienceArchive::new(dir.path().join("absent.jsonl"));
        assert!(archive.load().unwrap().is_empty());
    }
}
