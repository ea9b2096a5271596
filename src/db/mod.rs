use crate::auth::AuthSession;
use serde::{Deserialize, Serialize};

#[cfg(target_arch = "wasm32")]
use gloo_storage::{errors::StorageError, LocalStorage, Storage};

/// Error type for database operations on native platforms
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct DbError(String);

#[cfg(not(target_arch = "wasm32"))]
impl DbError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        Self(err.to_string())
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        Self(err.to_string())
    }
}

const SETTINGS_KEY: &str = "anitunes.app_settings";
const SESSION_KEY: &str = "anitunes.auth_session";

/// Client preferences stored locally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    pub video_volume: f64,
    #[serde(default)]
    pub muted: bool,
    #[serde(default = "default_submit_comparisons")]
    pub submit_comparisons: bool,
}

fn default_submit_comparisons() -> bool {
    true
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            video_volume: 0.5,
            muted: false,
            submit_comparisons: default_submit_comparisons(),
        }
    }
}

impl AppSettings {
    fn normalized(mut self) -> Self {
        self.video_volume = normalize_volume(self.video_volume);
        self
    }
}

pub fn normalize_volume(value: f64) -> f64 {
    if !value.is_finite() {
        return AppSettings::default().video_volume;
    }
    value.clamp(0.0, 1.0)
}

// Native storage: a key/value table in SQLite.

#[cfg(not(target_arch = "wasm32"))]
fn put_value(conn: &rusqlite::Connection, key: &str, json: &str) -> Result<(), DbError> {
    conn.execute(
        "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
        [key, json],
    )?;
    Ok(())
}

#[cfg(not(target_arch = "wasm32"))]
fn get_value(conn: &rusqlite::Connection, key: &str) -> Result<Option<String>, DbError> {
    use rusqlite::OptionalExtension;

    let value = conn
        .query_row(
            "SELECT value FROM settings WHERE key = ?1",
            [key],
            |row: &rusqlite::Row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

#[cfg(not(target_arch = "wasm32"))]
fn create_tables(conn: &rusqlite::Connection) -> Result<(), DbError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

#[cfg(not(target_arch = "wasm32"))]
fn get_db_connection() -> Result<rusqlite::Connection, DbError> {
    let data_dir = dirs::data_dir()
        .map(|dir| dir.join("anitunes"))
        .unwrap_or_else(|| std::path::PathBuf::from(".anitunes"));
    std::fs::create_dir_all(&data_dir)
        .map_err(|e| DbError::new(format!("Failed to create data dir: {}", e)))?;
    let conn = rusqlite::Connection::open(data_dir.join("anitunes.db"))
        .map_err(|e| DbError::new(format!("Failed to open database: {}", e)))?;
    create_tables(&conn)?;
    Ok(conn)
}

#[cfg(not(target_arch = "wasm32"))]
fn load_settings_from(conn: &rusqlite::Connection) -> Result<AppSettings, DbError> {
    match get_value(conn, SETTINGS_KEY)? {
        Some(json) => Ok(serde_json::from_str::<AppSettings>(&json)?.normalized()),
        None => Ok(AppSettings::default()),
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn load_session_from(conn: &rusqlite::Connection) -> Result<Option<AuthSession>, DbError> {
    match get_value(conn, SESSION_KEY)? {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub async fn save_settings(settings: AppSettings) -> Result<(), DbError> {
    let conn = get_db_connection()?;
    put_value(&conn, SETTINGS_KEY, &serde_json::to_string(&settings)?)
}

#[cfg(target_arch = "wasm32")]
pub async fn save_settings(settings: AppSettings) -> Result<(), StorageError> {
    LocalStorage::set(SETTINGS_KEY, settings)
}

#[cfg(not(target_arch = "wasm32"))]
pub async fn load_settings() -> Result<AppSettings, DbError> {
    let conn = get_db_connection()?;
    load_settings_from(&conn)
}

#[cfg(target_arch = "wasm32")]
pub async fn load_settings() -> Result<AppSettings, StorageError> {
    match LocalStorage::get::<AppSettings>(SETTINGS_KEY) {
        Ok(settings) => Ok(settings.normalized()),
        Err(_) => Ok(AppSettings::default()),
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub async fn save_session(session: Option<AuthSession>) -> Result<(), DbError> {
    let conn = get_db_connection()?;
    match session {
        Some(session) => put_value(&conn, SESSION_KEY, &serde_json::to_string(&session)?),
        None => {
            conn.execute("DELETE FROM settings WHERE key = ?1", [SESSION_KEY])?;
            Ok(())
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub async fn save_session(session: Option<AuthSession>) -> Result<(), StorageError> {
    match session {
        Some(session) => LocalStorage::set(SESSION_KEY, session),
        None => {
            LocalStorage::delete(SESSION_KEY);
            Ok(())
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub async fn load_session() -> Result<Option<AuthSession>, DbError> {
    let conn = get_db_connection()?;
    load_session_from(&conn)
}

#[cfg(target_arch = "wasm32")]
pub async fn load_session() -> Result<Option<AuthSession>, StorageError> {
    Ok(LocalStorage::get::<AuthSession>(SESSION_KEY).ok())
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;

    fn memory_db() -> rusqlite::Connection {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        conn
    }

    #[test]
    fn missing_settings_fall_back_to_defaults() {
        let conn = memory_db();
        assert_eq!(load_settings_from(&conn).unwrap(), AppSettings::default());
        assert_eq!(load_session_from(&conn).unwrap(), None);
    }

    #[test]
    fn stored_volume_is_clamped() {
        let conn = memory_db();
        put_value(&conn, SETTINGS_KEY, r#"{"video_volume": 7.5, "muted": true}"#).unwrap();
        let settings = load_settings_from(&conn).unwrap();
        assert_eq!(settings.video_volume, 1.0);
        assert!(settings.muted);
        assert!(settings.submit_comparisons);
    }

    #[test]
    fn session_round_trips_through_sqlite_file() {
        let dir = tempfile::tempdir().unwrap();
        let conn = rusqlite::Connection::open(dir.path().join("anitunes.db")).unwrap();
        create_tables(&conn).unwrap();
        let session = AuthSession {
            access_token: "jwt".into(),
            refresh_token: None,
            expires_at: Some(42),
        };
        put_value(&conn, SESSION_KEY, &serde_json::to_string(&session).unwrap()).unwrap();
        assert_eq!(load_session_from(&conn).unwrap(), Some(session));
    }

    #[test]
    fn non_finite_volume_resets() {
        assert_eq!(normalize_volume(f64::NAN), 0.5);
        assert_eq!(normalize_volume(-1.0), 0.0);
    }
}
