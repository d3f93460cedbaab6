//! Subscriber persistence.
//!
//! `SubscriberStore` is the read side the dispatcher needs. `SqliteSubscriberStore`
//! also carries the write operations used by the subscription front end and
//! admin tooling.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use crate::subscriber::{bare_phone, parse_send_time, Channel, NewSubscriber, Subscriber, WHATSAPP_PREFIX};

/// Errors that can occur during subscriber store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Input failed validation; every problem is listed.
    #[error("Validation error: {}", .0.join(" "))]
    Validation(Vec<String>),

    /// Capacity reached; existing subscribers can still be updated.
    #[error("Subscriber limit reached ({0})")]
    CapacityReached(usize),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Read access to the subscriber list.
pub trait SubscriberStore: Send + Sync {
    /// All subscribers in insertion order.
    fn list_all(&self) -> StoreResult<Vec<Subscriber>>;
}

/// What `upsert` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted(i64),
    Updated(usize),
}

/// Matches a bare phone and its legacy `whatsapp:`-prefixed form
const PHONE_MATCH: &str = "(phone_number = ?1 OR phone_number = ?2)";

const SELECT_COLUMNS: &str = "id, phone_number, location, lon, lat, channel, \
     send_time_morning, send_time_afternoon, wind, gust, gif, forecast_days, only_weird_weather";

/// SQLite-backed subscriber store.
///
/// Rows are keyed by the bare phone number, so switching channel updates the
/// existing row. The channel prefix is only added when addressing a message.
pub struct SqliteSubscriberStore {
    conn: Mutex<Connection>,
    max_subscribers: usize,
}

impl SqliteSubscriberStore {
    /// Open (or create) the database at `path`.
    ///
    /// Creates the parent directory and schema if they don't exist.
    pub fn open<P: AsRef<Path>>(path: P, max_subscribers: usize) -> StoreResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Storage(format!("Failed to create {}: {}", parent.display(), e))
                })?;
            }
        }

        tracing::info!("Opening subscriber database at {}", path.as_ref().display());
        let conn = Connection::open(path)?;
        Self::with_connection(conn, max_subscribers)
    }

    /// In-memory store (for testing).
    pub fn in_memory(max_subscribers: usize) -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?, max_subscribers)
    }

    fn with_connection(conn: Connection, max_subscribers: usize) -> StoreResult<Self> {
        let store = Self {
            conn: Mutex::new(conn),
            max_subscribers,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        self.conn.lock().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS subscribers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                phone_number TEXT NOT NULL,
                location TEXT NOT NULL,
                lon REAL NOT NULL,
                lat REAL NOT NULL,
                channel TEXT NOT NULL DEFAULT 'whatsapp',
                send_time_morning TEXT,
                send_time_afternoon TEXT,
                wind INTEGER NOT NULL DEFAULT 0,
                gust INTEGER NOT NULL DEFAULT 0,
                gif INTEGER NOT NULL DEFAULT 0,
                forecast_days INTEGER NOT NULL DEFAULT 1,
                only_weird_weather INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_subscribers_phone ON subscribers(phone_number);
            "#,
        )?;
        Ok(())
    }

    fn row_to_subscriber(row: &rusqlite::Row) -> rusqlite::Result<Subscriber> {
        let channel: String = row.get(5)?;
        let morning: Option<String> = row.get(6)?;
        let afternoon: Option<String> = row.get(7)?;
        let forecast_days: i64 = row.get(11)?;

        Ok(Subscriber {
            id: row.get(0)?,
            phone_number: bare_phone(&row.get::<_, String>(1)?).to_string(),
            location: row.get(2)?,
            longitude: row.get(3)?,
            latitude: row.get(4)?,
            channel: Channel::from_db(&channel),
            send_time_morning: morning.as_deref().and_then(parse_send_time),
            send_time_afternoon: afternoon.as_deref().and_then(parse_send_time),
            wind: row.get::<_, i32>(8)? != 0,
            gust: row.get::<_, i32>(9)? != 0,
            gif: row.get::<_, i32>(10)? != 0,
            forecast_days: u8::try_from(forecast_days).unwrap_or(1),
            only_weird_weather: row.get::<_, i32>(12)? != 0,
        })
    }

    fn validated(data: &NewSubscriber) -> StoreResult<()> {
        let errors = data.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(StoreError::Validation(errors))
        }
    }

    /// Insert a new subscriber row. Returns the new row id.
    pub fn insert(&self, data: &NewSubscriber) -> StoreResult<i64> {
        Self::validated(data)?;
        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO subscribers (
                phone_number, location, lon, lat, channel,
                send_time_morning, send_time_afternoon,
                wind, gust, gif, forecast_days, only_weird_weather
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                data.normalized_phone(),
                data.location.trim(),
                data.longitude,
                data.latitude,
                data.channel.as_str(),
                data.send_time_morning,
                data.send_time_afternoon,
                data.wind as i32,
                data.gust as i32,
                data.gif as i32,
                data.forecast_days,
                data.only_weird_weather as i32,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Update every row with the same phone number. Returns rows updated.
    pub fn update_by_phone(&self, data: &NewSubscriber) -> StoreResult<usize> {
        Self::validated(data)?;
        let (phone, legacy) = phone_keys(&data.phone_number);
        let sql = format!(
            r#"
            UPDATE subscribers
            SET phone_number = ?1, location = ?3, lon = ?4, lat = ?5, channel = ?6,
                send_time_morning = ?7, send_time_afternoon = ?8,
                wind = ?9, gust = ?10, gif = ?11, forecast_days = ?12, only_weird_weather = ?13,
                updated_at = CURRENT_TIMESTAMP
            WHERE {}
            "#,
            PHONE_MATCH
        );
        let updated = self.conn.lock().execute(
            &sql,
            params![
                phone,
                legacy,
                data.location.trim(),
                data.longitude,
                data.latitude,
                data.channel.as_str(),
                data.send_time_morning,
                data.send_time_afternoon,
                data.wind as i32,
                data.gust as i32,
                data.gif as i32,
                data.forecast_days,
                data.only_weird_weather as i32,
            ],
        )?;
        Ok(updated)
    }

    /// Insert, or update the existing rows for the same phone number.
    ///
    /// New phone numbers are rejected once the store holds `max_subscribers`.
    pub fn upsert(&self, data: &NewSubscriber) -> StoreResult<UpsertOutcome> {
        Self::validated(data)?;

        if self.get_by_phone(&data.normalized_phone())?.is_some() {
            let rows = self.update_by_phone(data)?;
            tracing::info!("Updated {} subscriber row(s)", rows);
            return Ok(UpsertOutcome::Updated(rows));
        }

        if self.count()? >= self.max_subscribers {
            return Err(StoreError::CapacityReached(self.max_subscribers));
        }

        let id = self.insert(data)?;
        tracing::info!("Inserted subscriber {}", id);
        Ok(UpsertOutcome::Inserted(id))
    }

    /// First subscriber with this phone number, with or without channel prefix.
    pub fn get_by_phone(&self, phone: &str) -> StoreResult<Option<Subscriber>> {
        let (phone, legacy) = phone_keys(phone);
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {} FROM subscribers WHERE {} ORDER BY id LIMIT 1",
            SELECT_COLUMNS, PHONE_MATCH
        );
        let subscriber = conn
            .query_row(&sql, params![phone, legacy], Self::row_to_subscriber)
            .optional()?;
        Ok(subscriber)
    }

    pub fn count(&self) -> StoreResult<usize> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM subscribers", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Returns true if a row was deleted.
    pub fn delete_by_id(&self, id: i64) -> StoreResult<bool> {
        let deleted = self
            .conn
            .lock()
            .execute("DELETE FROM subscribers WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    /// Remove every row for this phone number. Returns rows deleted.
    pub fn delete_by_phone(&self, phone: &str) -> StoreResult<usize> {
        let (phone, legacy) = phone_keys(phone);
        let sql = format!("DELETE FROM subscribers WHERE {}", PHONE_MATCH);
        let deleted = self.conn.lock().execute(&sql, params![phone, legacy])?;
        Ok(deleted)
    }

    /// Remove all subscribers. Returns rows deleted.
    pub fn clear(&self) -> StoreResult<usize> {
        let deleted = self.conn.lock().execute("DELETE FROM subscribers", [])?;
        tracing::warn!("Deleted all {} subscribers", deleted);
        Ok(deleted)
    }
}

/// Bare phone and its `whatsapp:`-prefixed form
fn phone_keys(phone: &str) -> (String, String) {
    let bare = bare_phone(phone);
    (bare.to_string(), format!("{}{}", WHATSAPP_PREFIX, bare))
}

impl SubscriberStore for SqliteSubscriberStore {
    fn list_all(&self) -> StoreResult<Vec<Subscriber>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {} FROM subscribers ORDER BY id", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::row_to_subscriber)?;
        let subscribers = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(subscribers)
    }
}
