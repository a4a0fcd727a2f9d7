//! Save/load of trained controllers and training checkpoints
//!
//! Features:
//! - Versioned JSON envelope (`version`, `kind`, `payload`)
//! - Atomic replace (write `<path>.tmp`, then rename over the target)
//! - A missing file is "nothing saved yet", not an error

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::controller::Genome;
use crate::error::PersistenceError;
use crate::evolve::Checkpoint;

/// Current on-disk format version
pub const FORMAT_VERSION: u32 = 1;

pub const WINNER_FILE: &str = "winner.json";
const WINNER_KIND: &str = "winner";
const CHECKPOINT_KIND: &str = "checkpoint";
const CHECKPOINT_PREFIX: &str = "checkpoint-";
const CHECKPOINT_SUFFIX: &str = ".json";

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    kind: &'a str,
    payload: &'a T,
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    kind: String,
    payload: serde_json::Value,
}

/// Write `payload` wrapped in an envelope, replacing `path` atomically
pub fn save_record<T: Serialize>(path: &Path, kind: &str, payload: &T) -> Result<(), PersistenceError> {
    let envelope = EnvelopeRef {
        version: FORMAT_VERSION,
        kind,
        payload,
    };
    let json = serde_json::to_string_pretty(&envelope).map_err(|source| PersistenceError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
    }
    let tmp = tmp_path(path);
    fs::write(&tmp, json).map_err(|source| io_error(&tmp, source))?;
    fs::rename(&tmp, path).map_err(|source| io_error(path, source))?;
    Ok(())
}

/// Read an envelope of the given kind; `Ok(None)` when the file does not exist
pub fn load_record<T: DeserializeOwned>(
    path: &Path,
    kind: &'static str,
) -> Result<Option<T>, PersistenceError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(io_error(path, source)),
    };

    let json_error = |source| PersistenceError::Json {
        path: path.to_path_buf(),
        source,
    };
    let envelope: Envelope = serde_json::from_str(&text).map_err(json_error)?;
    if envelope.version != FORMAT_VERSION {
        return Err(PersistenceError::VersionMismatch {
            path: path.to_path_buf(),
            found: envelope.version,
            expected: FORMAT_VERSION,
        });
    }
    if envelope.kind != kind {
        return Err(PersistenceError::KindMismatch {
            path: path.to_path_buf(),
            found: envelope.kind,
            expected: kind,
        });
    }
    serde_json::from_value(envelope.payload).map(Some).map_err(json_error)
}

pub fn save_winner(path: &Path, genome: &Genome) -> Result<(), PersistenceError> {
    save_record(path, WINNER_KIND, genome)?;
    log::info!("Saved winner #{} to {}", genome.id, path.display());
    Ok(())
}

pub fn load_winner(path: &Path) -> Result<Option<Genome>, PersistenceError> {
    load_record(path, WINNER_KIND)
}

/// `<dir>/checkpoint-<generation>.json`
pub fn checkpoint_path(dir: &Path, generation: u32) -> PathBuf {
    dir.join(format!("{CHECKPOINT_PREFIX}{generation}{CHECKPOINT_SUFFIX}"))
}

/// Save under the checkpoint's generation number; returns the file written
pub fn save_checkpoint(dir: &Path, checkpoint: &Checkpoint) -> Result<PathBuf, PersistenceError> {
    let path = checkpoint_path(dir, checkpoint.population.generation());
    save_record(&path, CHECKPOINT_KIND, checkpoint)?;
    log::info!("Saved checkpoint {}", path.display());
    Ok(path)
}

pub fn load_checkpoint(path: &Path) -> Result<Option<Checkpoint>, PersistenceError> {
    let checkpoint: Option<Checkpoint> = load_record(path, CHECKPOINT_KIND)?;
    if let Some(checkpoint) = &checkpoint {
        log::info!(
            "Loaded checkpoint {} (generation {})",
            path.display(),
            checkpoint.population.generation()
        );
    }
    Ok(checkpoint)
}

/// Checkpoint file with the highest generation in `dir`, if any
pub fn latest_checkpoint(dir: &Path) -> Result<Option<PathBuf>, PersistenceError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(io_error(dir, source)),
    };

    let mut latest: Option<(u32, PathBuf)> = None;
    for entry in entries {
        let entry = entry.map_err(|source| io_error(dir, source))?;
        let name = entry.file_name();
        let Some(generation) = name.to_str().and_then(checkpoint_generation) else {
            continue;
        };
        if latest.as_ref().is_none_or(|(best, _)| generation > *best) {
            latest = Some((generation, entry.path()));
        }
    }
    Ok(latest.map(|(_, path)| path))
}

fn checkpoint_generation(file_name: &str) -> Option<u32> {
    file_name
        .strip_prefix(CHECKPOINT_PREFIX)?
        .strip_suffix(CHECKPOINT_SUFFIX)?
        .parse()
        .ok()
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn io_error(path: &Path, source: io::Error) -> PersistenceError {
    PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainingConfig;
    use crate::evolve::Population;
    use crate::stats::Statistics;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;
    use tempfile::tempdir;

    fn genome() -> Genome {
        Genome::random(12, 3, &mut Pcg32::seed_from_u64(8))
    }

    #[test]
    fn test_winner_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(WINNER_FILE);
        let winner = genome();

        save_winner(&path, &winner).unwrap();
        assert_eq!(load_winner(&path).unwrap(), Some(winner));
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn test_missing_files_load_as_none() {
        let dir = tempdir().unwrap();
        assert!(load_winner(&dir.path().join("nope.json")).unwrap().is_none());
        assert!(load_checkpoint(&dir.path().join("checkpoint-3.json")).unwrap().is_none());
        assert!(latest_checkpoint(&dir.path().join("missing-dir")).unwrap().is_none());
        assert!(latest_checkpoint(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_version_mismatch_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(WINNER_FILE);
        let json = serde_json::json!({ "version": 99, "kind": "winner", "payload": genome() });
        fs::write(&path, json.to_string()).unwrap();

        assert!(matches!(
            load_winner(&path),
            Err(PersistenceError::VersionMismatch { found: 99, expected: FORMAT_VERSION, .. })
        ));
    }

    #[test]
    fn test_kind_mismatch_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("checkpoint-1.json");
        save_record(&path, WINNER_KIND, &genome()).unwrap();
        assert!(matches!(
            load_checkpoint(&path),
            Err(PersistenceError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(WINNER_FILE);
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_winner(&path), Err(PersistenceError::Json { .. })));
    }

    #[test]
    fn test_overwrite_replaces_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(WINNER_FILE);
        save_winner(&path, &genome()).unwrap();
        let second = Genome::random(13, 0, &mut Pcg32::seed_from_u64(1));
        save_winner(&path, &second).unwrap();
        assert_eq!(load_winner(&path).unwrap(), Some(second));
    }

    #[test]
    fn test_latest_checkpoint_picks_highest_generation() {
        let dir = tempdir().unwrap();
        for name in ["checkpoint-9.json", "checkpoint-10.json", "checkpoint-2.json"] {
            fs::write(dir.path().join(name), "{}").unwrap();
        }
        fs::write(dir.path().join("checkpoint-99.json.tmp"), "{}").unwrap();
        fs::write(dir.path().join("winner.json"), "{}").unwrap();
        fs::write(dir.path().join("checkpoint-x.json"), "{}").unwrap();

        let latest = latest_checkpoint(dir.path()).unwrap().unwrap();
        assert_eq!(latest.file_name().unwrap(), "checkpoint-10.json");
    }

    #[test]
    fn test_checkpoint_round_trip() {
        let dir = tempdir().unwrap();
        let config = TrainingConfig {
            population_size: 4,
            hidden_nodes: 2,
            ..TrainingConfig::default()
        };
        let checkpoint = Checkpoint {
            population: Population::random(&config, &mut Pcg32::seed_from_u64(4)),
            statistics: Statistics::new(),
            champion: Some(genome()),
            config: config.clone(),
        };

        let path = save_checkpoint(dir.path(), &checkpoint).unwrap();
        assert_eq!(path, checkpoint_path(dir.path(), 0));
        let loaded = load_checkpoint(&path).unwrap().unwrap();
        assert_eq!(loaded.population, checkpoint.population);
        assert_eq!(loaded.champion, checkpoint.champion);
        assert_eq!(latest_checkpoint(dir.path()).unwrap(), Some(path));
    }
}
