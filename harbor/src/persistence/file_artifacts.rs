use crate::clock::Clock;
use crate::domain::{ArtifactCategory, ArtifactStats, CleanupReport, bytes_to_mb};
use crate::ports::ArtifactStore;
use chrono::Duration;
use parking_lot::ReentrantMutex;
use serde_json::Value;
use shared::config::ArtifactSettings;
use shared::{Error, Result};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tempfile::NamedTempFile;
use tracing::{error, info, warn};

const MAX_NAME_LEN: usize = 128;
const PAYLOAD_EXT: &str = "bin";
const JSON_EXT: &str = "json";

/// Filesystem store for rendered artifacts and saved query results.
///
/// Layout under the data directory:
/// `visualizations/<id>@<kind>.bin`, `metadata/<id>@<kind>.json` and
/// `queries/<hash>.json`. Every file is replaced atomically.
pub struct FileArtifactStore {
    data_dir: PathBuf,
    clock: Arc<dyn Clock>,
    lock: ReentrantMutex<()>,
}

impl FileArtifactStore {
    pub fn open(settings: ArtifactSettings, clock: Arc<dyn Clock>) -> Result<Self> {
        for category in ArtifactCategory::ALL {
            let dir = settings.data_dir.join(category.dir_name());
            fs::create_dir_all(&dir).map_err(|e| {
                Error::Config(format!("Failed to create directory {}: {}", dir.display(), e))
            })?;
        }

        info!(data_dir = %settings.data_dir.display(), "artifact store opened");

        Ok(Self {
            data_dir: settings.data_dir,
            clock,
            lock: ReentrantMutex::new(()),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn dir(&self, category: ArtifactCategory) -> PathBuf {
        self.data_dir.join(category.dir_name())
    }

    fn artifact_paths(&self, id: &str, kind: &str) -> Result<(PathBuf, PathBuf)> {
        validate_name("id", id)?;
        validate_name("kind", kind)?;
        let stem = format!("{id}@{kind}");

        Ok((
            self.dir(ArtifactCategory::Visualizations)
                .join(format!("{stem}.{PAYLOAD_EXT}")),
            self.dir(ArtifactCategory::Metadata)
                .join(format!("{stem}.{JSON_EXT}")),
        ))
    }

    fn record_path(&self, hash: &str) -> Result<PathBuf> {
        validate_name("hash", hash)?;
        Ok(self
            .dir(ArtifactCategory::Queries)
            .join(format!("{hash}.{JSON_EXT}")))
    }

    fn try_save(&self, id: &str, kind: &str, payload: &[u8], metadata: &Value) -> Result<PathBuf> {
        let _guard = self.lock.lock();
        let (payload_path, metadata_path) = self.artifact_paths(id, kind)?;

        let metadata_bytes = serde_json::to_vec_pretty(metadata)?;
        write_atomic(&payload_path, payload)?;
        write_atomic(&metadata_path, &metadata_bytes)?;

        Ok(payload_path)
    }

    fn try_load(&self, id: &str, kind: &str) -> Result<Option<Vec<u8>>> {
        let _guard = self.lock.lock();
        let (payload_path, _) = self.artifact_paths(id, kind)?;
        read_optional(&payload_path)
    }

    fn try_load_metadata(&self, id: &str, kind: &str) -> Result<Option<Value>> {
        let _guard = self.lock.lock();
        let (_, metadata_path) = self.artifact_paths(id, kind)?;
        match read_optional(&metadata_path)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn try_save_record(&self, hash: &str, record: &Value) -> Result<PathBuf> {
        let _guard = self.lock.lock();
        let path = self.record_path(hash)?;
        write_atomic(&path, &serde_json::to_vec_pretty(record)?)?;
        Ok(path)
    }

    fn try_load_record(&self, hash: &str) -> Result<Option<Value>> {
        let _guard = self.lock.lock();
        let path = self.record_path(hash)?;
        match read_optional(&path)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn try_cleanup(&self, older_than: Duration) -> Result<CleanupReport> {
        let _guard = self.lock.lock();
        let mut report = CleanupReport::default();

        // A window reaching before the earliest representable time covers nothing
        let Some(cutoff) = self.clock.now().checked_sub_signed(older_than) else {
            warn!(
                older_than_days = older_than.num_days(),
                "cleanup window out of range, nothing to remove"
            );
            return Ok(report);
        };
        let cutoff: SystemTime = cutoff.into();

        for category in ArtifactCategory::ALL {
            let dir = self.dir(category);
            let listing = match fs::read_dir(&dir) {
                Ok(listing) => listing,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "cannot list artifact directory");
                    report.failed += 1;
                    continue;
                }
            };

            for dir_entry in listing {
                let path = match dir_entry {
                    Ok(dir_entry) => dir_entry.path(),
                    Err(e) => {
                        warn!(dir = %dir.display(), error = %e, "cannot read directory entry");
                        report.failed += 1;
                        continue;
                    }
                };

                match remove_if_older(&path, cutoff) {
                    Ok(true) => {
                        info!(path = %path.display(), "cleaned up old file");
                        report.removed += 1;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "failed to clean up file");
                        report.failed += 1;
                    }
                }
            }
        }

        Ok(report)
    }

    fn try_stats(&self) -> Result<ArtifactStats> {
        let _guard = self.lock.lock();
        let mut stats = ArtifactStats::default();
        let mut total_bytes = 0u64;

        for category in ArtifactCategory::ALL {
            for dir_entry in fs::read_dir(self.dir(category))? {
                let metadata = dir_entry?.metadata()?;
                if !metadata.is_file() {
                    continue;
                }
                *stats.count_mut(category) += 1;
                stats.total_files += 1;
                total_bytes += metadata.len();
            }
        }

        stats.total_size_mb = bytes_to_mb(total_bytes);
        Ok(stats)
    }
}

impl ArtifactStore for FileArtifactStore {
    fn save(&self, id: &str, kind: &str, payload: &[u8], metadata: &Value) -> Result<PathBuf> {
        self.try_save(id, kind, payload, metadata).inspect_err(
            |e| error!(op = "save", id, kind, error = %e, "artifact operation failed"),
        )
    }

    fn load(&self, id: &str, kind: &str) -> Result<Option<Vec<u8>>> {
        self.try_load(id, kind).inspect_err(
            |e| error!(op = "load", id, kind, error = %e, "artifact operation failed"),
        )
    }

    fn load_metadata(&self, id: &str, kind: &str) -> Result<Option<Value>> {
        self.try_load_metadata(id, kind).inspect_err(
            |e| error!(op = "load_metadata", id, kind, error = %e, "artifact operation failed"),
        )
    }

    fn save_record(&self, hash: &str, record: &Value) -> Result<PathBuf> {
        self.try_save_record(hash, record).inspect_err(
            |e| error!(op = "save_record", hash, error = %e, "artifact operation failed"),
        )
    }

    fn load_record(&self, hash: &str) -> Result<Option<Value>> {
        self.try_load_record(hash).inspect_err(
            |e| error!(op = "load_record", hash, error = %e, "artifact operation failed"),
        )
    }

    fn cleanup(&self, older_than: Duration) -> Result<CleanupReport> {
        self.try_cleanup(older_than)
            .inspect_err(|e| error!(op = "cleanup", error = %e, "artifact operation failed"))
    }

    fn stats(&self) -> Result<ArtifactStats> {
        self.try_stats()
            .inspect_err(|e| error!(op = "stats", error = %e, "artifact operation failed"))
    }
}

impl std::fmt::Debug for FileArtifactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileArtifactStore")
            .field("data_dir", &self.data_dir)
            .finish()
    }
}

/// Names become file names, so only a conservative character set passes.
fn validate_name(label: &str, value: &str) -> Result<()> {
    let valid = !value.is_empty()
        && value.len() <= MAX_NAME_LEN
        && !value.starts_with('.')
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidKey(format!(
            "{label} '{value}' must be 1-{MAX_NAME_LEN} characters of [A-Za-z0-9._-] and not start with '.'"
        )))
    }
}

/// Write through a temp file in the target directory, then rename over the target.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::StorageFailure(format!("{} has no parent", path.display())))?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::from(e.error))?;
    Ok(())
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn remove_if_older(path: &Path, cutoff: SystemTime) -> std::io::Result<bool> {
    let metadata = fs::metadata(path)?;
    if !metadata.is_file() || metadata.modified()? >= cutoff {
        return Ok(false);
    }
    fs::remove_file(path)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::Utc;
    use serde_json::json;
    use std::fs::File;

    fn open_store(dir: &Path, clock: Arc<ManualClock>) -> FileArtifactStore {
        FileArtifactStore::open(
            ArtifactSettings {
                data_dir: dir.to_path_buf(),
            },
            clock,
        )
        .unwrap()
    }

    fn backdate(path: &Path, days: u64) {
        let when = SystemTime::now() - std::time::Duration::from_secs(days * 24 * 60 * 60);
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(when)
            .unwrap();
    }

    #[test]
    fn test_save_and_load_artifact() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = open_store(temp_dir.path(), Arc::new(ManualClock::default()));

        let metadata = json!({"plot_type": "map", "variable": "product/vertical_column"});
        let path = store.save("job1", "map", b"\x89PNG-bytes", &metadata).unwrap();

        assert!(path.starts_with(temp_dir.path().join("visualizations")));
        assert_eq!(store.load("job1", "map").unwrap(), Some(b"\x89PNG-bytes".to_vec()));
        assert_eq!(store.load_metadata("job1", "map").unwrap(), Some(metadata));
    }

    #[test]
    fn test_overwrite_keeps_latest_payload() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = open_store(temp_dir.path(), Arc::new(ManualClock::default()));

        store.save("job1", "map", b"first", &json!({"n": 1})).unwrap();
        store.save("job1", "map", b"second", &json!({"n": 2})).unwrap();

        assert_eq!(store.load("job1", "map").unwrap(), Some(b"second".to_vec()));
        assert_eq!(store.load_metadata("job1", "map").unwrap(), Some(json!({"n": 2})));
        assert_eq!(store.stats().unwrap().visualizations, 1);
    }

    #[test]
    fn test_kind_is_part_of_identity() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = open_store(temp_dir.path(), Arc::new(ManualClock::default()));

        store.save("job1", "map", b"map", &json!({})).unwrap();
        store.save("job1", "timeseries", b"series", &json!({})).unwrap();

        assert_eq!(store.load("job1", "map").unwrap(), Some(b"map".to_vec()));
        assert_eq!(store.load("job1", "timeseries").unwrap(), Some(b"series".to_vec()));
        assert_eq!(store.load("job2", "map").unwrap(), None);
        assert_eq!(store.load_metadata("job2", "map").unwrap(), None);
    }

    #[test]
    fn test_records_round_trip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = open_store(temp_dir.path(), Arc::new(ManualClock::default()));

        let record = json!({"job_id": "abc", "files_processed": 2});
        store.save_record("deadbeef", &record).unwrap();

        assert_eq!(store.load_record("deadbeef").unwrap(), Some(record));
        assert_eq!(store.load_record("cafebabe").unwrap(), None);
    }

    #[test]
    fn test_rejects_unsafe_names() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = open_store(temp_dir.path(), Arc::new(ManualClock::default()));

        for bad in ["", "../escape", "a/b", ".hidden", "with@sign", "back\\slash"] {
            assert!(
                matches!(store.save(bad, "map", b"x", &json!({})), Err(Error::InvalidKey(_))),
                "accepted id {bad:?}"
            );
            assert!(matches!(store.load_record(bad), Err(Error::InvalidKey(_))));
        }
        assert!(matches!(store.load("job1", "a/b"), Err(Error::InvalidKey(_))));
    }

    #[test]
    fn test_cleanup_removes_only_old_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = open_store(temp_dir.path(), Arc::new(ManualClock::new(Utc::now())));

        let old_payload = store.save("old", "map", b"old", &json!({})).unwrap();
        let old_record = store.save_record("oldhash", &json!({})).unwrap();
        backdate(&old_payload, 40);
        backdate(&temp_dir.path().join("metadata").join("old@map.json"), 40);
        backdate(&old_record, 40);

        store.save("new", "map", b"new", &json!({})).unwrap();
        store.save_record("newhash", &json!({"fresh": true})).unwrap();

        let report = store.cleanup(Duration::days(30)).unwrap();
        assert_eq!(report, CleanupReport { removed: 3, failed: 0 });

        assert_eq!(store.load("old", "map").unwrap(), None);
        assert_eq!(store.load_record("oldhash").unwrap(), None);
        assert_eq!(store.load("new", "map").unwrap(), Some(b"new".to_vec()));
        assert!(store.load_record("newhash").unwrap().is_some());
    }

    #[test]
    fn test_cleanup_uses_injected_clock() {
        let temp_dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = open_store(temp_dir.path(), clock.clone());

        store.save("job1", "map", b"png", &json!({})).unwrap();
        assert_eq!(store.cleanup(Duration::days(30)).unwrap().removed, 0);

        clock.advance(Duration::days(31));
        assert_eq!(store.cleanup(Duration::days(30)).unwrap().removed, 2);
        assert_eq!(store.stats().unwrap().total_files, 0);
    }

    #[test]
    fn test_cleanup_with_huge_window_removes_nothing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = open_store(temp_dir.path(), Arc::new(ManualClock::new(Utc::now())));

        let payload = store.save("job1", "map", b"png", &json!({})).unwrap();
        backdate(&payload, 400);

        let report = store.cleanup(Duration::days(100_000_000)).unwrap();
        assert_eq!(report, CleanupReport::default());
        assert!(store.load("job1", "map").unwrap().is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_cleanup_skips_files_it_cannot_inspect() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = open_store(temp_dir.path(), Arc::new(ManualClock::new(Utc::now())));

        let old_record = store.save_record("oldhash", &json!({})).unwrap();
        backdate(&old_record, 40);
        std::os::unix::fs::symlink(
            temp_dir.path().join("gone.json"),
            temp_dir.path().join("queries").join("dangling.json"),
        )
        .unwrap();

        let report = store.cleanup(Duration::days(30)).unwrap();
        assert_eq!(report, CleanupReport { removed: 1, failed: 1 });
        assert_eq!(store.load_record("oldhash").unwrap(), None);
    }

    #[test]
    fn test_stats_counts_per_category() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = open_store(temp_dir.path(), Arc::new(ManualClock::default()));

        store.save("job1", "map", &[0u8; 2048], &json!({})).unwrap();
        store.save("job2", "map", &[0u8; 2048], &json!({})).unwrap();
        store.save_record("hash1", &json!({"a": 1})).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.visualizations, 2);
        assert_eq!(stats.metadata, 2);
        assert_eq!(stats.queries, 1);
        assert_eq!(stats.total_files, 5);
        assert!(stats.total_size_mb >= 0.0);
    }

    #[test]
    fn test_artifacts_survive_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        {
            let store = open_store(temp_dir.path(), Arc::new(ManualClock::default()));
            store.save("job1", "map", b"persisted", &json!({})).unwrap();
        }

        let store = open_store(temp_dir.path(), Arc::new(ManualClock::default()));
        assert_eq!(store.load("job1", "map").unwrap(), Some(b"persisted".to_vec()));
    }
}
