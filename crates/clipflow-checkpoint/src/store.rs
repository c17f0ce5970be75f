//! Checkpoint store.
//!
//! One JSON file per subject under a root directory. Saves are atomic
//! (temp file + rename); reads never fail the caller and fall back to a fresh
//! record when the file is missing or unreadable.

use metrics::counter;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::backup::{self, BackupKind, BACKUP_SEPARATOR, FILE_PREFIX, FILE_SUFFIX, RESET_BACKUP_CAP};
use crate::error::{CheckpointError, CheckpointResult};
use crate::fs_utils;
use crate::record::CheckpointRecord;
use crate::registry::StageRegistry;
use crate::subject::SubjectId;

/// Counter bumped on every successful save.
pub const CHECKPOINT_SAVES_TOTAL: &str = "clipflow_checkpoint_saves_total";
/// Counter bumped when a checkpoint file cannot be parsed.
pub const CHECKPOINT_CORRUPT_TOTAL: &str = "clipflow_checkpoint_corrupt_total";

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding checkpoint files
    pub root: PathBuf,
    /// Ordinary backups kept per subject
    pub max_backups: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("checkpoints"),
            max_backups: 1,
        }
    }
}

impl StoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            root: std::env::var("CHECKPOINT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("checkpoints")),
            max_backups: std::env::var("CHECKPOINT_MAX_BACKUPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1),
        }
    }
}

/// Listing entry for one subject.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckpointSummary {
    pub file: PathBuf,
    pub subject_id: String,
    pub video_path: String,
    pub current_stage: usize,
    pub current_stage_name: String,
    /// Completed stages labelled `<i> (<name>)`
    pub stages_completed: Vec<String>,
    pub raw_stages_completed: Vec<usize>,
    pub error_count: usize,
    pub last_updated: i64,
}

/// Result of a backup cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Distinct subjects seen under the root
    pub subjects: usize,
    /// Backup files deleted
    pub removed: usize,
    /// Backup files left
    pub remaining: usize,
}

/// Durable checkpoint persistence rooted at one directory.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    root: PathBuf,
    max_backups: usize,
}

impl CheckpointStore {
    pub fn new(root: impl Into<PathBuf>, max_backups: usize) -> Self {
        Self {
            root: root.into(),
            max_backups,
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.root.clone(), config.max_backups)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_backups(&self) -> usize {
        self.max_backups
    }

    /// Path of a subject's primary checkpoint file.
    pub fn checkpoint_path(&self, subject: &SubjectId) -> PathBuf {
        self.root
            .join(format!("{}{}{}", FILE_PREFIX, subject, FILE_SUFFIX))
    }

    /// Load a subject's record, or start a fresh one.
    ///
    /// A missing file yields a fresh record. A corrupt or unreadable file also
    /// yields a fresh record and logs a warning, since prior progress is lost.
    pub async fn open(&self, subject: &SubjectId, video_path: &str) -> CheckpointRecord {
        if let Err(e) = fs::create_dir_all(&self.root).await {
            warn!(root = %self.root.display(), "Failed to create checkpoint directory: {}", e);
        }

        let path = self.checkpoint_path(subject);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(subject = %subject, "No checkpoint found, starting fresh");
                return CheckpointRecord::fresh(subject.clone(), video_path);
            }
            Err(e) => {
                warn!(
                    subject = %subject,
                    file = %path.display(),
                    "Failed to read checkpoint, starting fresh: {}", e
                );
                counter!(CHECKPOINT_CORRUPT_TOTAL).increment(1);
                return CheckpointRecord::fresh(subject.clone(), video_path);
            }
        };

        match serde_json::from_slice::<CheckpointRecord>(&bytes) {
            Ok(mut record) => {
                record.subject = subject.clone();
                if record.video_path.is_empty() {
                    record.video_path = video_path.to_string();
                }
                info!(
                    subject = %subject,
                    current_stage = record.current_stage,
                    completed = record.stages_completed.len(),
                    "Loaded checkpoint"
                );
                record
            }
            Err(e) => {
                warn!(
                    subject = %subject,
                    file = %path.display(),
                    "Corrupt checkpoint discarded, starting fresh: {}", e
                );
                counter!(CHECKPOINT_CORRUPT_TOTAL).increment(1);
                CheckpointRecord::fresh(subject.clone(), video_path)
            }
        }
    }

    /// Persist a record.
    ///
    /// Writes a temp file, optionally copies the previous primary into the
    /// ordinary backup namespace (then trims it to `max_backups`), and renames
    /// the temp file over the primary. Any failure removes the temp file and
    /// is returned to the caller.
    pub async fn save(
        &self,
        record: &mut CheckpointRecord,
        create_backup: bool,
    ) -> CheckpointResult<()> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| CheckpointError::io(&self.root, e))?;

        record.touch();
        let path = self.checkpoint_path(&record.subject);
        let bytes = serde_json::to_vec_pretty(record)?;
        let tmp = fs_utils::write_temp(&path, &bytes).await?;

        if create_backup && fs::try_exists(&path).await.unwrap_or(false) {
            if let Err(e) =
                backup::create_backup(&self.root, &record.subject, &path, BackupKind::Ordinary).await
            {
                fs_utils::discard(&tmp).await;
                return Err(e);
            }
            backup::trim_backups(
                &self.root,
                record.subject.as_str(),
                BackupKind::Ordinary,
                self.max_backups,
            )
            .await;
        }

        fs_utils::replace_with(&tmp, &path).await?;
        counter!(CHECKPOINT_SAVES_TOTAL).increment(1);
        debug!(subject = %record.subject, file = %path.display(), "Checkpoint saved");
        Ok(())
    }

    /// Merge stage descriptors into the record, saving only on change.
    pub async fn register(
        &self,
        record: &mut CheckpointRecord,
        registry: &StageRegistry,
    ) -> CheckpointResult<()> {
        if registry.merge_into(&mut record.stage_names) {
            self.save(record, false).await?;
        }
        Ok(())
    }

    /// Mark a stage complete and persist.
    pub async fn mark_stage_complete(
        &self,
        record: &mut CheckpointRecord,
        index: usize,
        name: &str,
        data: Option<Value>,
    ) -> CheckpointResult<()> {
        record.mark_stage_complete(index, name, data);
        info!(subject = %record.subject, stage = index, stage_name = name, "Stage complete");
        self.save(record, true).await
    }

    /// Append to the error log and persist immediately.
    pub async fn add_error(
        &self,
        record: &mut CheckpointRecord,
        index: usize,
        name: &str,
        message: &str,
        recovered: bool,
    ) -> CheckpointResult<()> {
        record.push_error(index, name, message, recovered);
        warn!(
            subject = %record.subject,
            stage = index,
            stage_name = name,
            recovered,
            "Stage error recorded: {}", message
        );
        self.save(record, true).await
    }

    /// Back up the current file into the reset namespace and start over.
    ///
    /// The returned record keeps the stage names and the video path; progress,
    /// payloads and errors are cleared.
    pub async fn reset(&self, record: &CheckpointRecord) -> CheckpointResult<CheckpointRecord> {
        let path = self.checkpoint_path(&record.subject);
        if fs::try_exists(&path).await.unwrap_or(false) {
            backup::create_backup(&self.root, &record.subject, &path, BackupKind::Reset).await?;
            backup::trim_backups(
                &self.root,
                record.subject.as_str(),
                BackupKind::Reset,
                RESET_BACKUP_CAP,
            )
            .await;
        }

        let mut fresh = record.cleared();
        self.save(&mut fresh, false).await?;
        info!(subject = %record.subject, "Checkpoint reset");
        Ok(fresh)
    }

    /// Summaries of every primary checkpoint under `root`, newest first.
    ///
    /// Backup and temp files are ignored; unparseable files are skipped.
    pub async fn list_all(root: impl AsRef<Path>) -> Vec<CheckpointSummary> {
        let root = root.as_ref();
        let mut summaries = Vec::new();

        for (subject, path) in primary_files(root).await {
            let record = match fs::read(&path).await.ok().and_then(|bytes| {
                serde_json::from_slice::<CheckpointRecord>(&bytes).ok()
            }) {
                Some(record) => record,
                None => {
                    warn!(file = %path.display(), "Skipping unreadable checkpoint");
                    continue;
                }
            };

            summaries.push(CheckpointSummary {
                file: path,
                subject_id: subject,
                video_path: record.video_path.clone(),
                current_stage: record.current_stage,
                current_stage_name: record.stage_name(record.current_stage),
                stages_completed: record.completed_labels(),
                raw_stages_completed: record.stages_completed.iter().copied().collect(),
                error_count: record.errors.len(),
                last_updated: record.metadata.last_updated,
            });
        }

        summaries.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        summaries
    }

    /// Trim backups of every subject under `root`.
    ///
    /// Ordinary backups are cut to `max_per_subject`, reset backups to
    /// [`RESET_BACKUP_CAP`], independently.
    pub async fn cleanup_backups(root: impl AsRef<Path>, max_per_subject: usize) -> CleanupReport {
        let root = root.as_ref();

        let mut subjects: BTreeSet<String> = primary_files(root)
            .await
            .into_iter()
            .map(|(subject, _)| subject)
            .collect();
        subjects.extend(
            backup::scan_backups(root, None)
                .await
                .into_iter()
                .map(|b| b.subject),
        );

        let mut removed = 0;
        for subject in &subjects {
            removed +=
                backup::trim_backups(root, subject, BackupKind::Ordinary, max_per_subject).await;
            removed += backup::trim_backups(root, subject, BackupKind::Reset, RESET_BACKUP_CAP).await;
        }

        let remaining = backup::scan_backups(root, None).await.len();
        info!(
            root = %root.display(),
            subjects = subjects.len(),
            removed,
            remaining,
            "Checkpoint backup cleanup finished"
        );

        CleanupReport {
            subjects: subjects.len(),
            removed,
            remaining,
        }
    }
}

/// Primary checkpoint files under `root` as `(subject, path)`.
async fn primary_files(root: &Path) -> Vec<(String, PathBuf)> {
    let mut files = Vec::new();
    let mut entries = match fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(_) => return files,
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().into_owned();
        if backup::parse_backup_name(&name).is_some() {
            continue;
        }
        let Some(subject) = name
            .strip_prefix(FILE_PREFIX)
            .and_then(|rest| rest.strip_suffix(FILE_SUFFIX))
        else {
            continue;
        };
        if subject.is_empty() || subject.contains(BACKUP_SEPARATOR) {
            continue;
        }
        files.push((subject.to_string(), entry.path()));
    }

    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store(dir: &TempDir, max_backups: usize) -> CheckpointStore {
        CheckpointStore::new(dir.path(), max_backups)
    }

    async fn ordinary_backups(dir: &TempDir, subject: &str) -> Vec<backup::BackupFile> {
        backup::scan_backups(dir.path(), Some(subject))
            .await
            .into_iter()
            .filter(|b| b.kind == BackupKind::Ordinary)
            .collect()
    }

    #[tokio::test]
    async fn test_open_missing_returns_fresh() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, 1);
        let record = store.open(&SubjectId::new("demo"), "demo.mp4").await;
        assert_eq!(record.current_stage, 0);
        assert_eq!(record.video_path, "demo.mp4");
        assert_eq!(record.subject().as_str(), "demo");
    }

    #[tokio::test]
    async fn test_save_and_reopen() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, 1);
        let subject = SubjectId::new("demo");

        let mut record = store.open(&subject, "demo.mp4").await;
        store
            .mark_stage_complete(&mut record, 0, "extract", Some(json!({"frames": 2})))
            .await
            .unwrap();

        let reopened = store.open(&subject, "ignored.mp4").await;
        assert_eq!(reopened.current_stage, 1);
        assert!(reopened.is_stage_completed(0));
        assert_eq!(reopened.stage_data(0), Some(&json!({"frames": 2})));
        assert_eq!(reopened.video_path, "demo.mp4");
        assert!(store.checkpoint_path(&subject).ends_with("checkpoint_demo.json"));
    }

    #[tokio::test]
    async fn test_corrupt_file_falls_back_to_fresh() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, 1);
        let subject = SubjectId::new("demo");
        fs::write(store.checkpoint_path(&subject), b"{\"video_path\": \"demo.mp4\", \"curr")
            .await
            .unwrap();

        let record = store.open(&subject, "demo.mp4").await;
        assert_eq!(record.current_stage, 0);
        assert!(record.stages_completed.is_empty());
    }

    #[tokio::test]
    async fn test_crash_before_rename_keeps_previous_record() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, 1);
        let subject = SubjectId::new("demo");

        let mut record = store.open(&subject, "demo.mp4").await;
        store
            .mark_stage_complete(&mut record, 0, "extract", None)
            .await
            .unwrap();

        // Simulate a crash after a partial temp write: the rename never happened
        let tmp = fs_utils::temp_path_for(&store.checkpoint_path(&subject));
        fs::write(&tmp, b"{\"video_path\": ").await.unwrap();

        let reopened = store.open(&subject, "demo.mp4").await;
        assert_eq!(reopened.current_stage, 1);
        assert!(reopened.is_stage_completed(0));

        // The stray temp file is not listed as a checkpoint
        let listed = CheckpointStore::list_all(dir.path()).await;
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_save_propagates_and_cleans_temp() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, 1);
        let subject = SubjectId::new("demo");
        let path = store.checkpoint_path(&subject);
        // Occupy the primary path with a non-empty directory
        fs::create_dir_all(path.join("blocker")).await.unwrap();

        let mut record = store.open(&subject, "demo.mp4").await;
        let result = store.save(&mut record, false).await;

        assert!(matches!(result, Err(CheckpointError::Io { .. })));
        assert!(!fs_utils::temp_path_for(&path).exists());
    }

    #[tokio::test]
    async fn test_backup_cap_keeps_most_recent() {
        for k in [1usize, 2, 3] {
            let dir = TempDir::new().unwrap();
            let store = store(&dir, k);
            let subject = SubjectId::new("demo");
            let mut record = store.open(&subject, "demo.mp4").await;

            for i in 0..6 {
                record.current_stage = i;
                store.save(&mut record, true).await.unwrap();
            }

            let backups = ordinary_backups(&dir, "demo").await;
            assert!(backups.len() <= k, "k={} found {}", k, backups.len());
            assert_eq!(backups.len(), k.min(5));

            // Backups hold the states written just before the newest saves
            let mut stages: Vec<usize> = Vec::new();
            for b in &backups {
                let bytes = fs::read(&b.path).await.unwrap();
                let r: CheckpointRecord = serde_json::from_slice(&bytes).unwrap();
                stages.push(r.current_stage);
            }
            stages.sort_unstable();
            let expected: Vec<usize> = (5 - k.min(5)..5).collect();
            assert_eq!(stages, expected, "k={}", k);
        }
    }

    #[tokio::test]
    async fn test_first_save_creates_no_backup() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, 3);
        let mut record = store.open(&SubjectId::new("demo"), "demo.mp4").await;
        store.save(&mut record, true).await.unwrap();
        assert!(ordinary_backups(&dir, "demo").await.is_empty());
    }

    #[tokio::test]
    async fn test_reset_preserves_registry() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, 1);
        let subject = SubjectId::new("demo");
        let registry = StageRegistry::new()
            .with_stage(0, "extract", "Extract frames")
            .with_stage(1, "analyze", "Analyze frames");

        let mut record = store.open(&subject, "demo.mp4").await;
        store.register(&mut record, &registry).await.unwrap();
        store
            .mark_stage_complete(&mut record, 0, "extract", Some(json!([1, 2])))
            .await
            .unwrap();
        store
            .add_error(&mut record, 1, "analyze", "upstream unavailable", false)
            .await
            .unwrap();
        let names_before = record.stage_names.clone();

        let fresh = store.reset(&record).await.unwrap();
        assert_eq!(fresh.stage_names, names_before);
        assert!(fresh.stages_completed.is_empty());
        assert!(fresh.data.is_empty());
        assert!(fresh.errors.is_empty());
        assert_eq!(fresh.current_stage, 0);

        let reopened = store.open(&subject, "demo.mp4").await;
        assert_eq!(reopened.stage_names, names_before);
        assert_eq!(reopened.current_stage, 0);

        let resets: Vec<_> = backup::scan_backups(dir.path(), Some("demo"))
            .await
            .into_iter()
            .filter(|b| b.kind == BackupKind::Reset)
            .collect();
        assert_eq!(resets.len(), 1);
    }

    #[tokio::test]
    async fn test_reset_backups_capped() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, 5);
        let subject = SubjectId::new("demo");
        let mut record = store.open(&subject, "demo.mp4").await;
        store.save(&mut record, false).await.unwrap();

        for _ in 0..4 {
            record = store.reset(&record).await.unwrap();
        }

        let resets = backup::scan_backups(dir.path(), Some("demo"))
            .await
            .into_iter()
            .filter(|b| b.kind == BackupKind::Reset)
            .count();
        assert_eq!(resets, RESET_BACKUP_CAP);
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, 1);
        let subject = SubjectId::new("demo");
        let registry = StageRegistry::new().with_stage(0, "extract", "");

        let mut record = store.open(&subject, "demo.mp4").await;
        store.register(&mut record, &registry).await.unwrap();
        let saved_at = record.metadata.last_updated;
        store.register(&mut record, &registry).await.unwrap();

        assert_eq!(record.metadata.last_updated, saved_at);
        assert_eq!(record.stage_name(0), "extract");
        assert!(store.checkpoint_path(&subject).exists());
    }

    #[tokio::test]
    async fn test_add_error_persists_immediately() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, 1);
        let subject = SubjectId::new("demo");
        let mut record = store.open(&subject, "demo.mp4").await;

        store
            .add_error(&mut record, 2, "detect", "model timeout", true)
            .await
            .unwrap();

        let reopened = store.open(&subject, "demo.mp4").await;
        assert_eq!(reopened.errors.len(), 1);
        assert_eq!(reopened.errors[0].stage, 2);
        assert_eq!(reopened.errors[0].message, "model timeout");
        assert!(reopened.errors[0].was_recovered);
    }

    #[tokio::test]
    async fn test_list_all_sorted_and_defensive() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, 2);

        let mut older = store.open(&SubjectId::new("older"), "older.mp4").await;
        store
            .mark_stage_complete(&mut older, 0, "extract", None)
            .await
            .unwrap();
        older.metadata.last_updated -= 100;
        let bytes = serde_json::to_vec(&older).unwrap();
        fs::write(store.checkpoint_path(older.subject()), bytes)
            .await
            .unwrap();

        let mut newer = store.open(&SubjectId::new("newer"), "newer.mp4").await;
        store
            .mark_stage_complete(&mut newer, 0, "extract", None)
            .await
            .unwrap();
        store
            .mark_stage_complete(&mut newer, 1, "analyze", None)
            .await
            .unwrap();
        store
            .add_error(&mut newer, 2, "detect", "boom", false)
            .await
            .unwrap();

        fs::write(dir.path().join("checkpoint_broken.json"), b"not json")
            .await
            .unwrap();
        fs::write(dir.path().join("unrelated.json"), b"{}").await.unwrap();

        let listed = CheckpointStore::list_all(dir.path()).await;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].subject_id, "newer");
        assert_eq!(listed[0].current_stage, 2);
        assert_eq!(listed[0].current_stage_name, "Stage 2");
        assert_eq!(listed[0].stages_completed, vec!["0 (extract)", "1 (analyze)"]);
        assert_eq!(listed[0].raw_stages_completed, vec![0, 1]);
        assert_eq!(listed[0].error_count, 1);
        assert_eq!(listed[1].subject_id, "older");
    }

    #[tokio::test]
    async fn test_list_all_missing_root() {
        let dir = TempDir::new().unwrap();
        let listed = CheckpointStore::list_all(dir.path().join("nope")).await;
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_backups_per_subject() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, 10);

        for name in ["a", "b"] {
            let mut record = store.open(&SubjectId::new(name), "x.mp4").await;
            for _ in 0..5 {
                store.save(&mut record, true).await.unwrap();
            }
            for _ in 0..3 {
                record = store.reset(&record).await.unwrap();
            }
        }

        // 4 ordinary + 2 reset per subject
        assert_eq!(backup::scan_backups(dir.path(), None).await.len(), 12);

        let report = CheckpointStore::cleanup_backups(dir.path(), 1).await;
        assert_eq!(report.subjects, 2);
        assert_eq!(report.removed, 6);
        assert_eq!(report.remaining, 6);
        assert_eq!(ordinary_backups(&dir, "a").await.len(), 1);
        assert_eq!(ordinary_backups(&dir, "b").await.len(), 1);
    }

    #[tokio::test]
    async fn test_backup_rotation_spares_subject_named_like_a_backup() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, 1);

        let lookalike = SubjectId::new("daily_backup_7");
        let mut other = store.open(&lookalike, "other.mp4").await;
        store
            .mark_stage_complete(&mut other, 0, "extract", None)
            .await
            .unwrap();
        let other_path = store.checkpoint_path(&lookalike);
        assert!(other_path.exists());

        let mut daily = store.open(&SubjectId::new("daily"), "daily.mp4").await;
        for _ in 0..3 {
            store.save(&mut daily, true).await.unwrap();
        }
        assert_eq!(ordinary_backups(&dir, "daily").await.len(), 1);
        assert!(ordinary_backups(&dir, "daily_backup_7").await.is_empty());

        CheckpointStore::cleanup_backups(dir.path(), 0).await;
        assert!(other_path.exists());
        assert_eq!(store.open(&lookalike, "other.mp4").await.current_stage, 1);

        let mut listed: Vec<String> = CheckpointStore::list_all(dir.path())
            .await
            .into_iter()
            .map(|s| s.subject_id)
            .collect();
        listed.sort();
        assert_eq!(listed, vec!["daily", "daily_backup_7"]);
    }
}
