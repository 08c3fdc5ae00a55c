#![forbid(unsafe_code)]

//! Sync bookkeeping: which source videos already reached which destination.
//!
//! One row per YouTube video id. Each destination owns a nullable status
//! column holding the time the upload succeeded (or a `skipped:` marker when
//! the destination does not apply to that video). A row is finished once every
//! tracked destination column is non-null.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use libsql::{Builder, Connection, Row, params};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::discovery::ListedVideo;

/// Destinations a video can be mirrored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Rutube,
    TikTok,
    Instagram,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Rutube, Platform::TikTok, Platform::Instagram];

    /// Column holding this platform's status in the `synced` table.
    fn column(self) -> &'static str {
        match self {
            Platform::Rutube => "rutube_status",
            Platform::TikTok => "tiktok_status",
            Platform::Instagram => "instagram_status",
        }
    }

    pub fn is_primary(self) -> bool {
        self == Platform::Rutube
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Platform::Rutube => "rutube",
            Platform::TikTok => "tiktok",
            Platform::Instagram => "instagram",
        })
    }
}

impl FromStr for Platform {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rutube" => Ok(Platform::Rutube),
            "tiktok" => Ok(Platform::TikTok),
            "instagram" | "insta" => Ok(Platform::Instagram),
            other => bail!("unknown platform: {other}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub external_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rutube_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tiktok_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instagram_status: Option<String>,
    pub created_at: String,
}

impl SyncRecord {
    fn new(external_id: &str, title: &str, description: Option<&str>) -> Self {
        Self {
            external_id: external_id.to_owned(),
            title: title.to_owned(),
            description: description.unwrap_or_default().to_owned(),
            rutube_status: None,
            tiktok_status: None,
            instagram_status: None,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn status(&self, platform: Platform) -> Option<&str> {
        match platform {
            Platform::Rutube => self.rutube_status.as_deref(),
            Platform::TikTok => self.tiktok_status.as_deref(),
            Platform::Instagram => self.instagram_status.as_deref(),
        }
    }

    fn status_mut(&mut self, platform: Platform) -> &mut Option<String> {
        match platform {
            Platform::Rutube => &mut self.rutube_status,
            Platform::TikTok => &mut self.tiktok_status,
            Platform::Instagram => &mut self.instagram_status,
        }
    }

    pub fn is_fully_synced(&self, tracked: &[Platform]) -> bool {
        tracked.iter().all(|platform| self.status(*platform).is_some())
    }
}

/// Tracked platforms that still need an upload. A missing row needs all of
/// them.
pub fn pending_platforms(record: Option<&SyncRecord>, tracked: &[Platform]) -> Vec<Platform> {
    tracked
        .iter()
        .copied()
        .filter(|platform| record.is_none_or(|record| record.status(*platform).is_none()))
        .collect()
}

/// A listed video that still has work left, with the exact platforms to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub video: ListedVideo,
    pub pending: Vec<Platform>,
}

/// Keeps listing order; drops videos whose tracked statuses are all set.
pub async fn select_candidates(
    listed: &[ListedVideo],
    repo: &dyn SyncRepository,
    tracked: &[Platform],
) -> Result<Vec<Candidate>> {
    let mut candidates = Vec::new();
    for video in listed {
        let record = repo.get(&video.id).await?;
        if record
            .as_ref()
            .is_some_and(|record| record.is_fully_synced(tracked))
        {
            continue;
        }
        candidates.push(Candidate {
            video: video.clone(),
            pending: pending_platforms(record.as_ref(), tracked),
        });
    }
    Ok(candidates)
}

/// Storage seam for sync bookkeeping. Errors here are fatal to a run.
#[async_trait]
pub trait SyncRepository: Send + Sync {
    async fn get(&self, external_id: &str) -> Result<Option<SyncRecord>>;

    async fn list(&self) -> Result<Vec<SyncRecord>>;

    /// Writes `status` into the platform column, creating the row if needed.
    /// Title and description are refreshed when non-empty.
    async fn record_status(
        &self,
        external_id: &str,
        title: &str,
        description: Option<&str>,
        platform: Platform,
        status: &str,
    ) -> Result<()>;

    /// Sets the platform column back to null. Missing rows are left alone.
    async fn clear_status(&self, external_id: &str, platform: Platform) -> Result<()>;

    /// Only the repair tool deletes rows.
    async fn delete(&self, external_id: &str) -> Result<bool>;

    async fn is_synced(&self, external_id: &str, platform: Platform) -> Result<bool> {
        Ok(self
            .get(external_id)
            .await?
            .is_some_and(|record| record.status(platform).is_some()))
    }

    async fn mark_synced(
        &self,
        external_id: &str,
        title: &str,
        platform: Platform,
        description: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.record_status(external_id, title, description, platform, &now)
            .await
    }

    async fn mark_skipped(
        &self,
        external_id: &str,
        title: &str,
        platform: Platform,
        reason: &str,
    ) -> Result<()> {
        self.record_status(
            external_id,
            title,
            None,
            platform,
            &format!("skipped:{reason}"),
        )
        .await
    }
}

async fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;
        "#,
    )
    .await?;
    Ok(())
}

async fn ensure_schema(conn: &Connection) -> Result<()> {
    migrate_legacy_table(conn).await?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS synced (
            external_id TEXT PRIMARY KEY,
            title TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL DEFAULT '',
            rutube_status TEXT,
            tiktok_status TEXT,
            instagram_status TEXT,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .await?;

    Ok(())
}

/// The cursor is consumed here so the table is unlocked before any `ALTER`.
async fn has_legacy_layout(conn: &Connection) -> Result<bool> {
    let mut rows = conn.query("PRAGMA table_info(synced)", params![]).await?;
    let mut found = false;
    while let Some(row) = rows.next().await? {
        let column: String = row.get(1)?;
        found |= column == "y_id";
    }
    Ok(found)
}

/// Older databases only had `synced (y_id, title)` and a row meant "on
/// Rutube". Those rows are carried over with a Rutube status.
async fn migrate_legacy_table(conn: &Connection) -> Result<()> {
    if !has_legacy_layout(conn).await? {
        return Ok(());
    }

    let migrated_at = Utc::now().to_rfc3339();
    let tx = conn.transaction().await?;
    tx.execute("ALTER TABLE synced RENAME TO synced_legacy", params![])
        .await?;
    tx.execute(
        r#"
        CREATE TABLE synced (
            external_id TEXT PRIMARY KEY,
            title TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL DEFAULT '',
            rutube_status TEXT,
            tiktok_status TEXT,
            instagram_status TEXT,
            created_at TEXT NOT NULL
        )
        "#,
        params![],
    )
    .await?;
    tx.execute(
        r#"
        INSERT INTO synced (external_id, title, rutube_status, created_at)
        SELECT y_id, COALESCE(title, ''), ?1, ?1 FROM synced_legacy
        "#,
        params![migrated_at.as_str()],
    )
    .await?;
    tx.execute("DROP TABLE synced_legacy", params![]).await?;
    tx.commit().await?;

    Ok(())
}

/// SQLite-backed store living next to the working directory.
#[derive(Debug)]
pub struct SqliteSyncStore {
    conn: Connection,
}

impl SqliteSyncStore {
    /// Opens (and if necessary creates) the DB and ensures the schema exists.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating sync DB directory {}", parent.display()))?;
        }

        let db = Builder::new_local(path)
            .build()
            .await
            .with_context(|| format!("opening sync DB {}", path.display()))?;

        let conn = db.connect()?;
        configure_connection(&conn).await?;
        ensure_schema(&conn).await?;
        Ok(Self { conn })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT external_id, title, description, rutube_status, tiktok_status,
           instagram_status, created_at
    FROM synced
"#;

#[async_trait]
impl SyncRepository for SqliteSyncStore {
    async fn get(&self, external_id: &str) -> Result<Option<SyncRecord>> {
        let stmt = self
            .conn
            .prepare(&format!("{SELECT_COLUMNS} WHERE external_id = ?1"))
            .await?;
        let mut rows = stmt.query([external_id]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_record(&row)?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<SyncRecord>> {
        let stmt = self
            .conn
            .prepare(&format!("{SELECT_COLUMNS} ORDER BY created_at ASC, rowid ASC"))
            .await?;
        let mut rows = stmt.query(params![]).await?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(row_to_record(&row)?);
        }
        Ok(records)
    }

    async fn record_status(
        &self,
        external_id: &str,
        title: &str,
        description: Option<&str>,
        platform: Platform,
        status: &str,
    ) -> Result<()> {
        let column = platform.column();
        let created_at = Utc::now().to_rfc3339();
        self.conn
            .execute(
                &format!(
                    r#"
                    INSERT INTO synced (external_id, title, description, {column}, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ON CONFLICT(external_id) DO UPDATE SET
                        title = CASE WHEN excluded.title = '' THEN synced.title ELSE excluded.title END,
                        description = CASE
                            WHEN excluded.description = '' THEN synced.description
                            ELSE excluded.description
                        END,
                        {column} = excluded.{column}
                    "#
                ),
                params![
                    external_id,
                    title,
                    description.unwrap_or_default(),
                    status,
                    created_at.as_str(),
                ],
            )
            .await
            .with_context(|| format!("recording {platform} status for {external_id}"))?;
        Ok(())
    }

    async fn clear_status(&self, external_id: &str, platform: Platform) -> Result<()> {
        let column = platform.column();
        self.conn
            .execute(
                &format!("UPDATE synced SET {column} = NULL WHERE external_id = ?1"),
                params![external_id],
            )
            .await
            .with_context(|| format!("clearing {platform} status for {external_id}"))?;
        Ok(())
    }

    async fn delete(&self, external_id: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM synced WHERE external_id = ?1", params![external_id])
            .await?;
        Ok(removed > 0)
    }
}

/// Column order must match `SELECT_COLUMNS`.
fn row_to_record(row: &Row) -> Result<SyncRecord> {
    Ok(SyncRecord {
        external_id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        rutube_status: row.get(3)?,
        tiktok_status: row.get(4)?,
        instagram_status: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// In-memory store with the same semantics, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySyncStore {
    rows: Mutex<BTreeMap<String, SyncRecord>>,
}

impl MemorySyncStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = SyncRecord>) -> Self {
        let rows = records
            .into_iter()
            .map(|record| (record.external_id.clone(), record))
            .collect();
        Self {
            rows: Mutex::new(rows),
        }
    }
}

#[async_trait]
impl SyncRepository for MemorySyncStore {
    async fn get(&self, external_id: &str) -> Result<Option<SyncRecord>> {
        Ok(self.rows.lock().get(external_id).cloned())
    }

    async fn list(&self) -> Result<Vec<SyncRecord>> {
        Ok(self.rows.lock().values().cloned().collect())
    }

    async fn record_status(
        &self,
        external_id: &str,
        title: &str,
        description: Option<&str>,
        platform: Platform,
        status: &str,
    ) -> Result<()> {
        let mut rows = self.rows.lock();
        let record = rows
            .entry(external_id.to_owned())
            .or_insert_with(|| SyncRecord::new(external_id, title, description));
        if !title.is_empty() {
            record.title = title.to_owned();
        }
        if let Some(description) = description.filter(|value| !value.is_empty()) {
            record.description = description.to_owned();
        }
        *record.status_mut(platform) = Some(status.to_owned());
        Ok(())
    }

    async fn clear_status(&self, external_id: &str, platform: Platform) -> Result<()> {
        if let Some(record) = self.rows.lock().get_mut(external_id) {
            *record.status_mut(platform) = None;
        }
        Ok(())
    }

    async fn delete(&self, external_id: &str) -> Result<bool> {
        Ok(self.rows.lock().remove(external_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    const BOTH: [Platform; 2] = [Platform::Rutube, Platform::TikTok];

    fn listed(id: &str) -> ListedVideo {
        ListedVideo {
            id: id.into(),
            title: format!("Video {id}"),
            description: None,
            upload_date: None,
        }
    }

    fn record(id: &str, rutube: Option<&str>, tiktok: Option<&str>) -> SyncRecord {
        SyncRecord {
            external_id: id.into(),
            title: format!("Video {id}"),
            description: String::new(),
            rutube_status: rutube.map(str::to_owned),
            tiktok_status: tiktok.map(str::to_owned),
            instagram_status: None,
            created_at: "2024-01-01T00:00:00+00:00".into(),
        }
    }

    async fn create_store() -> Result<(tempfile::TempDir, SqliteSyncStore, PathBuf)> {
        let dir = tempdir()?;
        let path = dir.path().join("state/sync_db.sqlite");
        let store = SqliteSyncStore::open(&path).await?;
        Ok((dir, store, path))
    }

    /// Opening a fresh store creates the file, WAL mode and the `synced` table.
    #[tokio::test]
    async fn opens_store_and_creates_schema() -> Result<()> {
        let (_temp, store, path) = create_store().await?;
        assert!(path.exists(), "database file should be created");

        let mut rows = store.conn.query("PRAGMA journal_mode", params![]).await?;
        let journal_row = rows.next().await?.context("missing journal_mode row")?;
        let journal: String = journal_row.get(0)?;
        assert_eq!(journal.to_lowercase(), "wal");

        let mut rows = store
            .conn
            .query(
                "SELECT name FROM sqlite_master WHERE type='table' AND name=?1",
                ["synced"],
            )
            .await?;
        let exists: Option<String> = rows
            .next()
            .await?
            .map(|row| row.get::<String>(0))
            .transpose()?;
        assert_eq!(exists.as_deref(), Some("synced"));
        Ok(())
    }

    /// Marking an unknown id creates a row with only that platform populated.
    #[tokio::test]
    async fn mark_synced_creates_row_with_single_status() -> Result<()> {
        let (_temp, store, _path) = create_store().await?;
        store
            .mark_synced("abc123", "First", Platform::TikTok, Some("desc"))
            .await?;

        let row = store.get("abc123").await?.expect("row created");
        assert_eq!(row.title, "First");
        assert_eq!(row.description, "desc");
        assert!(row.tiktok_status.is_some());
        assert!(row.rutube_status.is_none());
        assert!(row.instagram_status.is_none());
        assert!(!row.created_at.is_empty());
        assert!(store.is_synced("abc123", Platform::TikTok).await?);
        assert!(!store.is_synced("abc123", Platform::Rutube).await?);
        Ok(())
    }

    /// A second status keeps the first one and the original creation time.
    #[tokio::test]
    async fn second_platform_keeps_existing_status() -> Result<()> {
        let (_temp, store, _path) = create_store().await?;
        store
            .mark_synced("vid", "Title", Platform::Rutube, Some("long text"))
            .await?;
        let first = store.get("vid").await?.expect("row");

        store.mark_synced("vid", "", Platform::TikTok, None).await?;
        let second = store.get("vid").await?.expect("row");

        assert_eq!(second.rutube_status, first.rutube_status);
        assert!(second.tiktok_status.is_some());
        assert_eq!(second.title, "Title");
        assert_eq!(second.description, "long text");
        assert_eq!(second.created_at, first.created_at);
        Ok(())
    }

    #[tokio::test]
    async fn skipped_marker_counts_as_done() -> Result<()> {
        let (_temp, store, _path) = create_store().await?;
        store
            .mark_skipped("wide", "Wide", Platform::TikTok, "horizontal")
            .await?;
        let row = store.get("wide").await?.expect("row");
        assert_eq!(row.tiktok_status.as_deref(), Some("skipped:horizontal"));
        assert!(store.is_synced("wide", Platform::TikTok).await?);
        Ok(())
    }

    #[tokio::test]
    async fn delete_and_list() -> Result<()> {
        let (_temp, store, _path) = create_store().await?;
        store.mark_synced("a", "A", Platform::Rutube, None).await?;
        store.mark_synced("b", "B", Platform::Rutube, None).await?;
        assert_eq!(store.list().await?.len(), 2);

        assert!(store.delete("a").await?);
        assert!(!store.delete("a").await?);
        let remaining = store.list().await?;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].external_id, "b");
        Ok(())
    }

    #[tokio::test]
    async fn clear_status_keeps_other_columns() -> Result<()> {
        let (_temp, store, _path) = create_store().await?;
        store.mark_synced("v", "V", Platform::Rutube, None).await?;
        store.mark_synced("v", "V", Platform::TikTok, None).await?;
        store.clear_status("v", Platform::Rutube).await?;
        store.clear_status("missing", Platform::Rutube).await?;

        let row = store.get("v").await?.expect("row kept");
        assert!(row.rutube_status.is_none());
        assert!(row.tiktok_status.is_some());
        assert!(store.get("missing").await?.is_none());
        Ok(())
    }

    /// Databases from the single-destination era are carried over as Rutube rows.
    #[tokio::test]
    async fn migrates_legacy_two_column_table() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("legacy.sqlite");
        {
            let db = Builder::new_local(&path).build().await?;
            let conn = db.connect()?;
            conn.execute_batch(
                r#"
                CREATE TABLE synced (y_id TEXT PRIMARY KEY, title TEXT);
                INSERT INTO synced VALUES ('old1', 'Old video');
                "#,
            )
            .await?;
        }

        let store = SqliteSyncStore::open(&path).await?;
        let row = store.get("old1").await?.expect("legacy row migrated");
        assert_eq!(row.title, "Old video");
        assert!(row.rutube_status.is_some());
        assert!(row.tiktok_status.is_none());
        assert!(!has_legacy_layout(&store.conn).await?);
        Ok(())
    }

    /// A legacy table with several rows migrates in one go, and the migrated
    /// file opens again without touching the data.
    #[tokio::test]
    async fn migrated_legacy_database_reopens() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("legacy.sqlite");
        {
            let db = Builder::new_local(&path).build().await?;
            let conn = db.connect()?;
            conn.execute_batch(
                r#"
                CREATE TABLE synced (y_id TEXT PRIMARY KEY, title TEXT);
                INSERT INTO synced VALUES ('old1', 'First');
                INSERT INTO synced VALUES ('old2', NULL);
                INSERT INTO synced VALUES ('old3', 'Third');
                "#,
            )
            .await?;
        }

        {
            let store = SqliteSyncStore::open(&path).await?;
            assert_eq!(store.list().await?.len(), 3);
            store.mark_synced("old2", "Second", Platform::TikTok, None).await?;
        }

        let reopened = SqliteSyncStore::open(&path).await?;
        let rows = reopened.list().await?;
        assert_eq!(rows.len(), 3);
        let second = reopened.get("old2").await?.expect("row kept");
        assert_eq!(second.title, "Second");
        assert!(second.rutube_status.is_some());
        assert!(second.tiktok_status.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn reader_returns_none_for_missing_entries() -> Result<()> {
        let (_temp, store, _path) = create_store().await?;
        assert!(store.get("ghost").await?.is_none());
        assert!(!store.is_synced("ghost", Platform::Rutube).await?);
        Ok(())
    }

    /// A row with Rutube done and TikTok null is selected for TikTok only.
    #[tokio::test]
    async fn candidate_needs_only_missing_platform() -> Result<()> {
        let repo = MemorySyncStore::with_records([record("abc123", Some("2024-01-01"), None)]);
        let candidates = select_candidates(&[listed("abc123")], &repo, &BOTH).await?;
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].video.id, "abc123");
        assert_eq!(candidates[0].pending, vec![Platform::TikTok]);
        Ok(())
    }

    #[tokio::test]
    async fn fully_synced_rows_are_never_candidates() -> Result<()> {
        let repo = MemorySyncStore::with_records([
            record("done", Some("2024-01-01"), Some("2024-01-02")),
            record("skipped", Some("2024-01-01"), Some("skipped:horizontal")),
        ]);
        let candidates =
            select_candidates(&[listed("done"), listed("skipped")], &repo, &BOTH).await?;
        assert!(candidates.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn absent_rows_need_every_tracked_platform() -> Result<()> {
        let repo = MemorySyncStore::new();
        let candidates = select_candidates(&[listed("new1"), listed("new2")], &repo, &BOTH).await?;
        let ids: Vec<_> = candidates.iter().map(|c| c.video.id.as_str()).collect();
        assert_eq!(ids, vec!["new1", "new2"]);
        assert!(candidates.iter().all(|c| c.pending == BOTH.to_vec()));
        Ok(())
    }

    /// Untracked platforms never keep a row in the candidate list.
    #[tokio::test]
    async fn untracked_platform_is_ignored() -> Result<()> {
        let repo = MemorySyncStore::with_records([record("abc123", Some("2024-01-01"), None)]);
        let candidates =
            select_candidates(&[listed("abc123")], &repo, &[Platform::Rutube]).await?;
        assert!(candidates.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn memory_store_matches_sqlite_semantics() -> Result<()> {
        let repo = MemorySyncStore::new();
        repo.mark_synced("x", "X", Platform::Instagram, Some("d"))
            .await?;
        repo.mark_synced("x", "", Platform::Rutube, None).await?;
        let row = repo.get("x").await?.expect("row");
        assert_eq!(row.title, "X");
        assert_eq!(row.description, "d");
        assert!(row.is_fully_synced(&[Platform::Rutube, Platform::Instagram]));
        assert!(!row.is_fully_synced(&Platform::ALL));
        Ok(())
    }

    #[test]
    fn platform_parses_names() {
        assert_eq!("Rutube".parse::<Platform>().unwrap(), Platform::Rutube);
        assert_eq!("insta".parse::<Platform>().unwrap(), Platform::Instagram);
        assert!("vk".parse::<Platform>().is_err());
        assert_eq!(Platform::TikTok.to_string(), "tiktok");
    }
}
