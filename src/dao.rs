use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::AnyPool;

/// Cached display fields of a title saved to a profile's library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryEntryInsert {
    pub profile_id: String,
    pub content_id: i64,
    pub kind: String, // "movie" | "tv"
    pub title: String,
    pub image: Option<String>,
    pub backdrop: Option<String>,
    pub year: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressInsert {
    pub entry: LibraryEntryInsert,
    pub season: Option<i64>,
    pub episode: Option<i64>,
    pub position_secs: f64,
    pub duration_secs: f64,
}

pub type ProfileRow = (String, String, i64);
// The `Any` driver cannot decode NULL, so nullable columns are read through
// COALESCE: '' for absent text, -1 for absent season/episode.
pub type WatchlistRow = (i64, String, String, String, String, String, i64);
pub type HistoryRow = (i64, String, String, String, String, String, i64, i64, f64, f64, i64);

pub const NO_TEXT: &str = "";
pub const NO_NUMBER: i64 = -1;

pub async fn insert_profile(pool: &AnyPool, id: &str, name: &str, created_at: i64) -> Result<()> {
    sqlx::query("INSERT INTO profiles(id, name, created_at) VALUES(?, ?, ?)")
        .bind(id)
        .bind(name)
        .bind(created_at)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn list_profiles(pool: &AnyPool) -> Result<Vec<ProfileRow>> {
    let rows = sqlx::query_as::<_, ProfileRow>("SELECT id, name, created_at FROM profiles ORDER BY created_at, name")
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn profile_exists(pool: &AnyPool, id: &str) -> Result<bool> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM profiles WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(exists.is_some())
}

/// Insert or refresh the cached fields; `added_at` of an existing row is kept.
pub async fn upsert_watchlist(pool: &AnyPool, e: &LibraryEntryInsert, added_at: i64) -> Result<()> {
    sqlx::query(
        "INSERT INTO watchlist(profile_id, content_id, kind, title, image, backdrop, year, added_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(profile_id, content_id, kind) DO UPDATE SET
           title=excluded.title, image=excluded.image, backdrop=excluded.backdrop, year=excluded.year",
    )
    .bind(&e.profile_id)
    .bind(e.content_id)
    .bind(&e.kind)
    .bind(&e.title)
    .bind(&e.image)
    .bind(&e.backdrop)
    .bind(&e.year)
    .bind(added_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_watchlist(pool: &AnyPool, profile_id: &str, content_id: i64, kind: &str) -> Result<u64> {
    let res = sqlx::query("DELETE FROM watchlist WHERE profile_id = ? AND content_id = ? AND kind = ?")
        .bind(profile_id)
        .bind(content_id)
        .bind(kind)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}

pub async fn watchlist_contains(pool: &AnyPool, profile_id: &str, content_id: i64, kind: &str) -> Result<bool> {
    let hit: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM watchlist WHERE profile_id = ? AND content_id = ? AND kind = ?")
            .bind(profile_id)
            .bind(content_id)
            .bind(kind)
            .fetch_optional(pool)
            .await?;
    Ok(hit.is_some())
}

pub async fn list_watchlist(pool: &AnyPool, profile_id: &str) -> Result<Vec<WatchlistRow>> {
    let rows = sqlx::query_as::<_, WatchlistRow>(
        "SELECT content_id, kind, title,
                COALESCE(image, ''), COALESCE(backdrop, ''), COALESCE(year, ''), added_at
         FROM watchlist WHERE profile_id = ?
         ORDER BY added_at DESC, rowid DESC",
    )
    .bind(profile_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// One row per title and profile; a newer report replaces the older one.
pub async fn upsert_progress(pool: &AnyPool, p: &ProgressInsert, updated_at: i64) -> Result<()> {
    let e = &p.entry;
    sqlx::query(
        "INSERT INTO watch_history(
            profile_id, content_id, kind, title, image, backdrop, year,
            season, episode, position_secs, duration_secs, updated_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(profile_id, content_id, kind) DO UPDATE SET
           title=excluded.title, image=excluded.image, backdrop=excluded.backdrop, year=excluded.year,
           season=excluded.season, episode=excluded.episode,
           position_secs=excluded.position_secs, duration_secs=excluded.duration_secs,
           updated_at=excluded.updated_at",
    )
    .bind(&e.profile_id)
    .bind(e.content_id)
    .bind(&e.kind)
    .bind(&e.title)
    .bind(&e.image)
    .bind(&e.backdrop)
    .bind(&e.year)
    .bind(p.season)
    .bind(p.episode)
    .bind(p.position_secs)
    .bind(p.duration_secs)
    .bind(updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// History rows still in progress (position below `finished` of the duration), newest first.
pub async fn list_unfinished(pool: &AnyPool, profile_id: &str, finished: f64, limit: i64) -> Result<Vec<HistoryRow>> {
    let rows = sqlx::query_as::<_, HistoryRow>(
        "SELECT content_id, kind, title,
                COALESCE(image, ''), COALESCE(backdrop, ''), COALESCE(year, ''),
                COALESCE(season, -1), COALESCE(episode, -1), position_secs, duration_secs, updated_at
         FROM watch_history
         WHERE profile_id = ? AND duration_secs > 0 AND position_secs < duration_secs * ?
         ORDER BY updated_at DESC, rowid DESC
         LIMIT ?",
    )
    .bind(profile_id)
    .bind(finished)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn clear_history(pool: &AnyPool, profile_id: &str) -> Result<u64> {
    let res = sqlx::query("DELETE FROM watch_history WHERE profile_id = ?")
        .bind(profile_id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}
