use anyhow::{anyhow, bail, Context, Result};
use directories::ProjectDirs;
use sqlx::any::AnyPoolOptions;
use sqlx::{any::AnyConnectOptions, migrate::Migrator, AnyPool, ConnectOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Once;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

use crate::dao::{self, HistoryRow, ProgressInsert, WatchlistRow};
use crate::mapping::library_entry_from_item;
use crate::storage::{Library, LibraryEntry, Profile, Progress, WatchProgress, FINISHED_FRACTION};
use crate::types::{ContentItem, MediaKind};

// Ensure drivers are installed exactly once for sqlx::any
static INSTALL_DRIVERS: Once = Once::new();

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Clone)]
pub struct Database {
    pool: AnyPool,
}

impl Database {
    /// Open a pool. Without a URL, use a SQLite file in the user's data directory.
    pub async fn connect(database_url: Option<&str>) -> Result<Self> {
        INSTALL_DRIVERS.call_once(sqlx::any::install_default_drivers);

        let url = match database_url {
            Some(u) if !u.trim().is_empty() => u.trim().to_string(),
            _ => default_sqlite_url()?,
        };

        let opts = AnyConnectOptions::from_str(&url)
            .with_context(|| format!("invalid database URL: {url}"))?
            .disable_statement_logging();

        // Each connection to an in-memory SQLite database is its own database.
        let max = if url.contains(":memory:") || url.contains("mode=memory") { 1 } else { 5 };
        let pool = AnyPoolOptions::new()
            .max_connections(max)
            .connect_with(opts)
            .await
            .with_context(|| format!("failed to connect to database: {url}"))?;
        debug!(url = %url, "library database opened");

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.context("running migrations")
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    async fn require_profile(&self, profile_id: &str) -> Result<()> {
        if !dao::profile_exists(&self.pool, profile_id).await? {
            bail!("unknown profile: {profile_id}");
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Library for Database {
    async fn create_profile(&self, name: &str) -> Result<Profile> {
        let name = name.trim();
        if name.is_empty() {
            bail!("profile name is empty");
        }
        let profile = Profile { id: uuid::Uuid::new_v4().to_string(), name: name.to_string(), created_at: stamp() };
        dao::insert_profile(&self.pool, &profile.id, &profile.name, profile.created_at).await?;
        Ok(profile)
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        let rows = dao::list_profiles(&self.pool).await?;
        Ok(rows.into_iter().map(|(id, name, created_at)| Profile { id, name, created_at }).collect())
    }

    async fn add_to_watchlist(&self, profile_id: &str, item: &ContentItem) -> Result<()> {
        self.require_profile(profile_id).await?;
        let entry = library_entry_from_item(profile_id, item);
        dao::upsert_watchlist(&self.pool, &entry, stamp()).await
    }

    async fn remove_from_watchlist(&self, profile_id: &str, id: u64, kind: MediaKind) -> Result<bool> {
        Ok(dao::delete_watchlist(&self.pool, profile_id, id as i64, kind.as_str()).await? > 0)
    }

    async fn watchlist(&self, profile_id: &str) -> Result<Vec<LibraryEntry>> {
        dao::list_watchlist(&self.pool, profile_id).await?.into_iter().map(entry_from_row).collect()
    }

    async fn in_watchlist(&self, profile_id: &str, id: u64, kind: MediaKind) -> Result<bool> {
        dao::watchlist_contains(&self.pool, profile_id, id as i64, kind.as_str()).await
    }

    async fn record_progress(&self, profile_id: &str, item: &ContentItem, progress: Progress) -> Result<()> {
        let valid = progress.duration_secs > 0.0 && progress.position_secs >= 0.0;
        if !valid {
            bail!("invalid progress {}/{}s", progress.position_secs, progress.duration_secs);
        }
        self.require_profile(profile_id).await?;
        let insert = ProgressInsert {
            entry: library_entry_from_item(profile_id, item),
            season: progress.season.map(i64::from),
            episode: progress.episode.map(i64::from),
            position_secs: progress.position_secs.min(progress.duration_secs),
            duration_secs: progress.duration_secs,
        };
        dao::upsert_progress(&self.pool, &insert, stamp()).await
    }

    async fn continue_watching(&self, profile_id: &str, limit: usize) -> Result<Vec<WatchProgress>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        dao::list_unfinished(&self.pool, profile_id, FINISHED_FRACTION, limit)
            .await?
            .into_iter()
            .map(progress_from_row)
            .collect()
    }

    async fn clear_history(&self, profile_id: &str) -> Result<u64> {
        dao::clear_history(&self.pool, profile_id).await
    }
}

fn parse_kind(kind: &str) -> Result<MediaKind> {
    kind.parse().map_err(|e: String| anyhow!(e))
}

fn text(value: String) -> Option<String> {
    Some(value).filter(|v| v != dao::NO_TEXT)
}

fn number(value: i64) -> Option<u32> {
    Some(value).filter(|v| *v != dao::NO_NUMBER).and_then(|v| u32::try_from(v).ok())
}

fn entry_from_row(row: WatchlistRow) -> Result<LibraryEntry> {
    let (id, kind, title, image, backdrop, year, added_at) = row;
    Ok(LibraryEntry {
        id: id as u64,
        kind: parse_kind(&kind)?,
        title,
        image: text(image),
        backdrop: text(backdrop),
        year: text(year),
        added_at,
    })
}

fn progress_from_row(row: HistoryRow) -> Result<WatchProgress> {
    let (id, kind, title, image, backdrop, year, season, episode, position_secs, duration_secs, updated_at) = row;
    Ok(WatchProgress {
        entry: LibraryEntry {
            id: id as u64,
            kind: parse_kind(&kind)?,
            title,
            image: text(image),
            backdrop: text(backdrop),
            year: text(year),
            added_at: updated_at,
        },
        season: number(season),
        episode: number(episode),
        position_secs,
        duration_secs,
    })
}

static LAST_STAMP: AtomicI64 = AtomicI64::new(0);

/// Epoch milliseconds, strictly increasing within the process so rows written
/// back to back keep their order.
fn stamp() -> i64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0);
    let prev = match LAST_STAMP.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1))) {
        Ok(p) | Err(p) => p,
    };
    now.max(prev + 1)
}

pub fn sqlite_url(path: &Path) -> String {
    let path = path.to_string_lossy().replace(' ', "%20");
    format!("sqlite://{path}?mode=rwc")
}

fn default_sqlite_url() -> Result<String> {
    let proj = ProjectDirs::from("dev", "marquee", "marquee")
        .context("unable to determine data directory for default sqlite path")?;
    let dir: PathBuf = proj.data_dir().to_path_buf();
    std::fs::create_dir_all(&dir).with_context(|| format!("creating data dir: {}", dir.display()))?;
    Ok(sqlite_url(&dir.join("marquee.db")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{BACKDROP_PLACEHOLDER, POSTER_PLACEHOLDER};
    use crate::types::NOT_AVAILABLE;

    async fn open(dir: &tempfile::TempDir) -> Database {
        let db = Database::connect(Some(&sqlite_url(&dir.path().join("library.db")))).await.unwrap();
        db.run_migrations().await.unwrap();
        db
    }

    fn item(id: u64, kind: MediaKind, title: &str) -> ContentItem {
        ContentItem {
            id,
            title: title.into(),
            image: format!("https://image.tmdb.org/t/p/w500/{id}.jpg"),
            backdrop: String::new(),
            rating: "7.5".into(),
            year: "2019".into(),
            kind,
            overview: String::new(),
        }
    }

    fn at(position_secs: f64, duration_secs: f64) -> Progress {
        Progress { season: None, episode: None, position_secs, duration_secs }
    }

    #[tokio::test]
    async fn profiles_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir).await;
        let kid = db.create_profile("  Kids ").await.unwrap();
        db.create_profile("Parents").await.unwrap();
        assert_eq!(kid.name, "Kids");
        let names: Vec<String> = db.list_profiles().await.unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Kids", "Parents"]);
        assert!(db.create_profile(" ").await.is_err());
    }

    #[tokio::test]
    async fn watchlist_is_idempotent_and_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir).await;
        let p = db.create_profile("Me").await.unwrap().id;

        db.add_to_watchlist(&p, &item(1, MediaKind::Movie, "First")).await.unwrap();
        db.add_to_watchlist(&p, &item(1, MediaKind::Tv, "Same id, a show")).await.unwrap();
        db.add_to_watchlist(&p, &item(1, MediaKind::Movie, "First (renamed)")).await.unwrap();

        let list = db.watchlist(&p).await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].kind, MediaKind::Tv);
        assert_eq!(list[1].title, "First (renamed)");
        assert!(db.in_watchlist(&p, 1, MediaKind::Movie).await.unwrap());

        assert!(db.remove_from_watchlist(&p, 1, MediaKind::Movie).await.unwrap());
        assert!(!db.remove_from_watchlist(&p, 1, MediaKind::Movie).await.unwrap());
        assert!(!db.in_watchlist(&p, 1, MediaKind::Movie).await.unwrap());
    }

    #[tokio::test]
    async fn placeholders_are_not_stored() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir).await;
        let p = db.create_profile("Me").await.unwrap().id;
        let mut bare = item(5, MediaKind::Movie, "Bare");
        bare.image = POSTER_PLACEHOLDER.into();
        bare.year = NOT_AVAILABLE.into();
        db.add_to_watchlist(&p, &bare).await.unwrap();
        let saved = &db.watchlist(&p).await.unwrap()[0];
        assert_eq!(saved.image, None);
        assert_eq!(saved.year, None);
    }

    #[tokio::test]
    async fn bare_movie_progress_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir).await;
        let p = db.create_profile("Me").await.unwrap().id;
        let mut bare = item(8, MediaKind::Movie, "No Art");
        bare.image = POSTER_PLACEHOLDER.into();
        bare.backdrop = BACKDROP_PLACEHOLDER.into();
        bare.year = NOT_AVAILABLE.into();

        db.add_to_watchlist(&p, &bare).await.unwrap();
        db.record_progress(&p, &bare, at(120.0, 5400.0)).await.unwrap();

        let saved = &db.watchlist(&p).await.unwrap()[0];
        assert_eq!((saved.id, saved.title.as_str()), (8, "No Art"));
        assert_eq!((saved.image.as_deref(), saved.backdrop.as_deref(), saved.year.as_deref()), (None, None, None));

        let rows = db.continue_watching(&p, 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!((rows[0].season, rows[0].episode), (None, None));
        assert_eq!(rows[0].entry.image, None);
        assert_eq!(rows[0].position_secs, 120.0);
    }

    #[tokio::test]
    async fn unknown_profile_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir).await;
        assert!(db.add_to_watchlist("ghost", &item(1, MediaKind::Movie, "x")).await.is_err());
        assert!(db.record_progress("ghost", &item(1, MediaKind::Movie, "x"), at(1.0, 2.0)).await.is_err());
    }

    #[tokio::test]
    async fn continue_watching_skips_finished_titles() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir).await;
        let p = db.create_profile("Me").await.unwrap().id;

        db.record_progress(&p, &item(1, MediaKind::Movie, "Half"), at(3000.0, 6000.0)).await.unwrap();
        db.record_progress(&p, &item(2, MediaKind::Movie, "Done"), at(5900.0, 6000.0)).await.unwrap();
        let episode = Progress { season: Some(2), episode: Some(3), position_secs: 60.0, duration_secs: 2400.0 };
        db.record_progress(&p, &item(3, MediaKind::Tv, "Show"), episode).await.unwrap();
        // newer report for the first title moves it to the front
        db.record_progress(&p, &item(1, MediaKind::Movie, "Half"), at(3600.0, 6000.0)).await.unwrap();

        let rows = db.continue_watching(&p, 10).await.unwrap();
        let ids: Vec<u64> = rows.iter().map(|r| r.entry.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(rows[0].position_secs, 3600.0);
        assert_eq!((rows[1].season, rows[1].episode), (Some(2), Some(3)));
        assert!((rows[0].fraction() - 0.6).abs() < 1e-9);

        assert_eq!(db.continue_watching(&p, 1).await.unwrap().len(), 1);
        assert_eq!(db.clear_history(&p).await.unwrap(), 3);
        assert!(db.continue_watching(&p, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_progress_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir).await;
        let p = db.create_profile("Me").await.unwrap().id;
        assert!(db.record_progress(&p, &item(1, MediaKind::Movie, "x"), at(10.0, 0.0)).await.is_err());
        assert!(db.record_progress(&p, &item(1, MediaKind::Movie, "x"), at(-1.0, 10.0)).await.is_err());
    }

    #[test]
    fn stamps_strictly_increase() {
        let a = stamp();
        let b = stamp();
        assert!(b > a);
    }
}
