//! Append-only prediction log
//!
//! Every served prediction is appended as one row. Rows are never updated
//! or deleted; reading them back is an offline reporting concern.

use crate::error::LogWriteError;
use crate::models::PredictionRecord;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Destination for served-prediction records
pub trait PredictionLog: Send + Sync {
    fn append(&self, record: &PredictionRecord) -> Result<(), LogWriteError>;
}

const CREATE_PREDICTIONS: &str = "CREATE TABLE IF NOT EXISTS predictions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    city TEXT NOT NULL,
    temperature REAL NOT NULL,
    humidity REAL NOT NULL,
    pressure REAL NOT NULL,
    wind_speed REAL NOT NULL,
    condition_code INTEGER NOT NULL,
    model_used TEXT NOT NULL,
    prediction REAL NOT NULL
)";

/// SQLite table with one row per served prediction
///
/// A single connection sits behind a mutex, so each append is one
/// complete INSERT and concurrent writers never observe each other.
pub struct SqlitePredictionLog {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqlitePredictionLog {
    /// Open or create the database at `path` and ensure the table exists
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory {:?}", parent))?;
        }
        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open prediction log {:?}", path))?;
        conn.execute(CREATE_PREDICTIONS, [])
            .context("Failed to initialize prediction log schema")?;

        debug!(path = %path.display(), "Opened prediction log");
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PredictionLog for SqlitePredictionLog {
    fn append(&self, record: &PredictionRecord) -> Result<(), LogWriteError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| LogWriteError("prediction log lock poisoned".to_string()))?;
        conn.execute(
            "INSERT INTO predictions (timestamp, city, temperature, humidity, pressure,
                wind_speed, condition_code, model_used, prediction)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.timestamp.to_rfc3339(),
                record.city,
                record.temperature,
                record.humidity,
                record.pressure,
                record.wind_speed,
                record.condition_code,
                record.model_used,
                record.prediction,
            ],
        )?;
        Ok(())
    }
}

/// In-process log for embedding and tests
#[derive(Default)]
pub struct MemoryPredictionLog {
    records: Mutex<Vec<PredictionRecord>>,
}

impl MemoryPredictionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<PredictionRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PredictionLog for MemoryPredictionLog {
    fn append(&self, record: &PredictionRecord) -> Result<(), LogWriteError> {
        self.records
            .lock()
            .map_err(|_| LogWriteError("prediction log lock poisoned".to_string()))?
            .push(record.clone());
        Ok(())
    }
}

/// Read every logged prediction in insertion order
///
/// The database must already exist. Rows whose timestamp does not parse
/// are skipped.
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<PredictionRecord>> {
    let path = path.as_ref();
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("Failed to open prediction log {:?}", path))?;

    let mut stmt = conn
        .prepare(
            "SELECT id, timestamp, city, temperature, humidity, pressure, wind_speed,
                    condition_code, model_used, prediction
             FROM predictions ORDER BY id",
        )
        .with_context(|| format!("Failed to query prediction log {:?}", path))?;

    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            PredictionRecord {
                timestamp: DateTime::<Utc>::MIN_UTC,
                city: row.get(2)?,
                temperature: row.get(3)?,
                humidity: row.get(4)?,
                pressure: row.get(5)?,
                wind_speed: row.get(6)?,
                condition_code: row.get(7)?,
                model_used: row.get(8)?,
                prediction: row.get(9)?,
            },
        ))
    })?;

    let mut records = Vec::new();
    for row in rows {
        let (id, timestamp, mut record) = row.context("Failed to read prediction row")?;
        match DateTime::parse_from_rfc3339(&timestamp) {
            Ok(ts) => {
                record.timestamp = ts.with_timezone(&Utc);
                records.push(record);
            }
            Err(e) => warn!(id, error = %e, "Skipping prediction row with bad timestamp"),
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn record(city: &str, prediction: f64) -> PredictionRecord {
        PredictionRecord {
            timestamp: Utc::now(),
            city: city.to_string(),
            temperature: 30.0,
            humidity: 70.0,
            pressure: 1008.0,
            wind_speed: 3.5,
            condition_code: 800,
            model_used: "Linear Regression".to_string(),
            prediction,
        }
    }

    #[test]
    fn test_sqlite_append_and_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs/predictions.db");
        let log = SqlitePredictionLog::open(&path).unwrap();

        let first = record("Chennai", 29.5);
        log.append(&first).unwrap();
        log.append(&record("Oslo", 4.25)).unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], first);
        assert_eq!(records[1].city, "Oslo");
        assert_eq!(records[1].prediction, 4.25);
    }

    #[test]
    fn test_reopen_keeps_existing_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("predictions.db");

        SqlitePredictionLog::open(&path).unwrap().append(&record("Lima", 18.0)).unwrap();
        SqlitePredictionLog::open(&path).unwrap().append(&record("Lima", 18.5)).unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].prediction, 18.5);
    }

    #[test]
    fn test_ids_autoincrement_in_append_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("predictions.db");
        let log = SqlitePredictionLog::open(&path).unwrap();
        for i in 0..3 {
            log.append(&record("Quito", i as f64)).unwrap();
        }

        let conn = Connection::open(&path).unwrap();
        let ids: Vec<i64> = conn
            .prepare("SELECT id FROM predictions ORDER BY id")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_concurrent_appends_all_land() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("predictions.db");
        let log = Arc::new(SqlitePredictionLog::open(&path).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let log = log.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        log.append(&record(&format!("city-{t}"), i as f64)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(read_records(&path).unwrap().len(), 400);
    }

    #[test]
    fn test_bad_timestamp_rows_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("predictions.db");
        let log = SqlitePredictionLog::open(&path).unwrap();
        log.append(&record("Chennai", 29.5)).unwrap();

        let conn = Connection::open(&path).unwrap();
        conn.execute(
            "INSERT INTO predictions (timestamp, city, temperature, humidity, pressure,
                wind_speed, condition_code, model_used, prediction)
             VALUES ('yesterday', 'Oslo', 1, 2, 3, 4, 800, 'Decision Tree', 5)",
            [],
        )
        .unwrap();
        log.append(&record("Chennai", 30.0)).unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.city == "Chennai"));
    }

    #[test]
    fn test_missing_database_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.db");
        let err = read_records(&path).unwrap_err();
        assert!(format!("{err:#}").contains("prediction log"));
        assert!(!path.exists());
    }

    #[test]
    fn test_memory_log() {
        let log = MemoryPredictionLog::new();
        assert!(log.is_empty());
        log.append(&record("Chennai", 29.5)).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log.records()[0].model_used, "Linear Regression");
    }
}
