//! Backup naming and rotation.
//!
//! Backups sit next to the primary file:
//! - ordinary: `checkpoint_<subject>~backup_<millis>[_<n>].json`
//! - reset:    `checkpoint_<subject>~reset_<millis>[_<n>].json`
//!
//! Subject ids never contain `~`, so a backup name cannot be read as the
//! primary file of another subject. The optional `_<n>` counter separates
//! backups taken within the same millisecond. Rotation keeps the newest
//! files per subject and kind.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;

use crate::error::{CheckpointError, CheckpointResult};
use crate::subject::SubjectId;

/// Number of reset backups kept per subject.
pub const RESET_BACKUP_CAP: usize = 2;

pub(crate) const FILE_PREFIX: &str = "checkpoint_";
pub(crate) const FILE_SUFFIX: &str = ".json";

/// Separates the subject from the backup stamp.
pub(crate) const BACKUP_SEPARATOR: char = '~';

/// Backup namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackupKind {
    /// Taken before an ordinary save
    Ordinary,
    /// Taken before a reset
    Reset,
}

impl BackupKind {
    fn marker(&self) -> &'static str {
        match self {
            BackupKind::Ordinary => "backup_",
            BackupKind::Reset => "reset_",
        }
    }
}

/// A backup file found on disk.
#[derive(Debug, Clone)]
pub(crate) struct BackupFile {
    pub path: PathBuf,
    pub subject: String,
    pub kind: BackupKind,
    pub millis: i64,
    pub seq: u32,
    pub modified: Option<SystemTime>,
}

/// Parse a backup file name into `(subject, kind, millis, seq)`.
pub(crate) fn parse_backup_name(file_name: &str) -> Option<(String, BackupKind, i64, u32)> {
    let inner = file_name
        .strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_SUFFIX)?;
    let (subject, tail) = inner.split_once(BACKUP_SEPARATOR)?;
    if subject.is_empty() {
        return None;
    }

    let (kind, stamp) = [BackupKind::Ordinary, BackupKind::Reset]
        .into_iter()
        .find_map(|kind| tail.strip_prefix(kind.marker()).map(|stamp| (kind, stamp)))?;
    let (millis, seq) = match stamp.split_once('_') {
        Some((millis, seq)) => (millis.parse().ok()?, seq.parse().ok()?),
        None => (stamp.parse().ok()?, 0),
    };
    Some((subject.to_string(), kind, millis, seq))
}

fn backup_file_name(subject: &str, kind: BackupKind, millis: i64, seq: u32) -> String {
    let stamp = if seq == 0 {
        millis.to_string()
    } else {
        format!("{}_{}", millis, seq)
    };
    format!(
        "{}{}{}{}{}{}",
        FILE_PREFIX,
        subject,
        BACKUP_SEPARATOR,
        kind.marker(),
        stamp,
        FILE_SUFFIX
    )
}

/// Copy `primary` into a new backup file. Returns the backup path.
pub(crate) async fn create_backup(
    root: &Path,
    subject: &SubjectId,
    primary: &Path,
    kind: BackupKind,
) -> CheckpointResult<PathBuf> {
    let millis = Utc::now().timestamp_millis();
    // Continue after the highest counter used in this millisecond, so the
    // newest backup always sorts last even after older ones were trimmed.
    let seq = scan_backups(root, Some(subject.as_str()))
        .await
        .into_iter()
        .filter(|b| b.kind == kind && b.millis == millis)
        .map(|b| b.seq + 1)
        .max()
        .unwrap_or(0);
    let target = root.join(backup_file_name(subject.as_str(), kind, millis, seq));

    fs::copy(primary, &target)
        .await
        .map_err(|e| CheckpointError::io(&target, e))?;

    tracing::debug!(subject = %subject, backup = %target.display(), "Created checkpoint backup");
    Ok(target)
}

/// All backup files under `root`, optionally narrowed to one subject.
pub(crate) async fn scan_backups(root: &Path, subject: Option<&str>) -> Vec<BackupFile> {
    let mut found = Vec::new();
    let mut entries = match fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(_) => return found,
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some((owner, kind, millis, seq)) = parse_backup_name(&name) else {
            continue;
        };
        if subject.is_some_and(|s| s != owner) {
            continue;
        }
        let modified = entry.metadata().await.ok().and_then(|m| m.modified().ok());
        found.push(BackupFile {
            path: entry.path(),
            subject: owner,
            kind,
            millis,
            seq,
            modified,
        });
    }

    found
}

/// Keep the newest `keep` backups of one subject and kind. Returns how many were removed.
pub(crate) async fn trim_backups(
    root: &Path,
    subject: &str,
    kind: BackupKind,
    keep: usize,
) -> usize {
    let mut backups: Vec<BackupFile> = scan_backups(root, Some(subject))
        .await
        .into_iter()
        .filter(|b| b.kind == kind)
        .collect();

    // Newest first
    backups.sort_by(|a, b| {
        (b.millis, b.seq, b.modified).cmp(&(a.millis, a.seq, a.modified))
    });

    let mut removed = 0;
    for stale in backups.iter().skip(keep) {
        match fs::remove_file(&stale.path).await {
            Ok(()) => {
                removed += 1;
                tracing::debug!(backup = %stale.path.display(), "Removed old checkpoint backup");
            }
            Err(e) => {
                tracing::warn!("Failed to remove old backup {}: {}", stale.path.display(), e);
            }
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_backup_names_round_trip() {
        let name = backup_file_name("demo", BackupKind::Ordinary, 1700000000123, 0);
        assert_eq!(name, "checkpoint_demo~backup_1700000000123.json");
        assert_eq!(
            parse_backup_name(&name),
            Some(("demo".to_string(), BackupKind::Ordinary, 1700000000123, 0))
        );

        let name = backup_file_name("demo", BackupKind::Reset, 42, 3);
        assert_eq!(name, "checkpoint_demo~reset_42_3.json");
        assert_eq!(
            parse_backup_name(&name),
            Some(("demo".to_string(), BackupKind::Reset, 42, 3))
        );
    }

    #[test]
    fn test_parse_rejects_primary_and_foreign_files() {
        assert_eq!(parse_backup_name("checkpoint_demo.json"), None);
        assert_eq!(parse_backup_name("checkpoint_demo.json.tmp"), None);
        assert_eq!(parse_backup_name("notes.txt"), None);
        assert_eq!(parse_backup_name("checkpoint_my_backup_plan.json"), None);
        assert_eq!(parse_backup_name("checkpoint_~backup_7.json"), None);
        assert_eq!(parse_backup_name("checkpoint_demo~copy_7.json"), None);
    }

    #[test]
    fn test_subject_shaped_like_a_backup_is_a_primary() {
        assert_eq!(parse_backup_name("checkpoint_daily_backup_7.json"), None);
        assert_eq!(parse_backup_name("checkpoint_a_reset_3_1.json"), None);
        assert_eq!(
            parse_backup_name("checkpoint_a_reset_b_backup_7~backup_9.json"),
            Some(("a_reset_b_backup_7".to_string(), BackupKind::Ordinary, 9, 0))
        );
    }

    #[tokio::test]
    async fn test_same_millisecond_backups_do_not_clobber() {
        let dir = TempDir::new().unwrap();
        let subject = SubjectId::new("demo");
        let primary = dir.path().join("checkpoint_demo.json");
        fs::write(&primary, b"{}").await.unwrap();

        let mut paths = Vec::new();
        for _ in 0..5 {
            paths.push(
                create_backup(dir.path(), &subject, &primary, BackupKind::Ordinary)
                    .await
                    .unwrap(),
            );
        }
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 5);
        assert_eq!(scan_backups(dir.path(), Some("demo")).await.len(), 5);
    }

    #[tokio::test]
    async fn test_trim_keeps_newest_per_kind() {
        let dir = TempDir::new().unwrap();
        for (millis, seq) in [(100, 0), (300, 0), (200, 0), (300, 1)] {
            let name = backup_file_name("demo", BackupKind::Ordinary, millis, seq);
            fs::write(dir.path().join(name), b"{}").await.unwrap();
        }
        let reset = backup_file_name("demo", BackupKind::Reset, 1, 0);
        fs::write(dir.path().join(&reset), b"{}").await.unwrap();
        let other = backup_file_name("other", BackupKind::Ordinary, 1, 0);
        fs::write(dir.path().join(&other), b"{}").await.unwrap();

        let removed = trim_backups(dir.path(), "demo", BackupKind::Ordinary, 2).await;
        assert_eq!(removed, 2);

        let mut left: Vec<(i64, u32)> = scan_backups(dir.path(), Some("demo"))
            .await
            .into_iter()
            .filter(|b| b.kind == BackupKind::Ordinary)
            .map(|b| (b.millis, b.seq))
            .collect();
        left.sort();
        assert_eq!(left, vec![(300, 0), (300, 1)]);
        assert!(dir.path().join(reset).exists());
        assert!(dir.path().join(other).exists());
    }
}
