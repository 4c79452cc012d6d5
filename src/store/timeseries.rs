//! Time-series store - SQLite table of readings keyed by topic
//!
//! Timestamps are epoch milliseconds. Each reading keeps both a string value
//! and an optional numeric shadow so boolean and string points can be
//! aggregated alongside numeric ones.

use super::{Reading, ReadingSource, SeriesRow, StoreResult};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS data (
        topic TEXT NOT NULL,
        ts INTEGER NOT NULL,
        string_value TEXT,
        double_value REAL,
        PRIMARY KEY (topic, ts)
    );
    CREATE INDEX IF NOT EXISTS idx_data_ts ON data(ts);
";

/// Connection factory for the time-series database
#[derive(Debug, Clone)]
pub struct TimeSeriesStore {
    path: PathBuf,
    busy_timeout: Duration,
}

impl TimeSeriesStore {
    pub fn new(path: impl Into<PathBuf>, busy_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            busy_timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a scoped connection; it is released when dropped
    pub fn connect(&self) -> StoreResult<TimeSeriesConnection> {
        TimeSeriesConnection::open(&self.path, self.busy_timeout)
    }
}

/// An open connection to the time-series database
pub struct TimeSeriesConnection {
    conn: Connection,
}

impl TimeSeriesConnection {
    /// Open (or create) the database file and ensure the schema exists
    pub fn open(path: &Path, busy_timeout: Duration) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self { conn })
    }

    /// In-memory database, mostly for tests and dry runs
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Insert or replace a single reading
    pub fn insert_reading(&self, reading: &Reading) -> StoreResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO data (topic, ts, string_value, double_value)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                reading.topic,
                reading.ts,
                reading.string_value,
                reading.double_value
            ],
        )?;
        Ok(())
    }

    /// Insert many readings in one transaction
    pub fn insert_readings(&mut self, readings: &[Reading]) -> StoreResult<usize> {
        if readings.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO data (topic, ts, string_value, double_value)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for reading in readings {
                stmt.execute(params![
                    reading.topic,
                    reading.ts,
                    reading.string_value,
                    reading.double_value
                ])?;
            }
        }
        tx.commit()?;

        Ok(readings.len())
    }

    /// Import readings from CSV with a `topic,ts,string_value,double_value` header.
    ///
    /// `double_value` may be empty; when it is, a numeric `string_value` is
    /// used as the numeric shadow.
    pub fn import_csv<R: Read>(&mut self, reader: R) -> StoreResult<usize> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut readings = Vec::new();

        for (line, record) in csv_reader.deserialize::<CsvReading>().enumerate() {
            let record = record?;
            let string_value = record.string_value.filter(|s| !s.is_empty());
            let double_value = record
                .double_value
                .or_else(|| string_value.as_deref().and_then(|s| s.parse::<f64>().ok()));

            if record.topic.is_empty() {
                return Err(super::StoreError::Import(format!(
                    "row {}: empty topic",
                    line + 1
                )));
            }

            readings.push(Reading {
                topic: record.topic,
                ts: record.ts,
                string_value,
                double_value,
            });
        }

        let count = self.insert_readings(&readings)?;
        tracing::info!("Imported {} readings", count);
        Ok(count)
    }

    /// Number of stored readings
    pub fn count(&self) -> StoreResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM data", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

#[derive(Debug, serde::Deserialize)]
struct CsvReading {
    topic: String,
    ts: i64,
    #[serde(default)]
    string_value: Option<String>,
    #[serde(default)]
    double_value: Option<f64>,
}

impl ReadingSource for TimeSeriesConnection {
    fn latest_reading(&self, topic: &str) -> StoreResult<Option<Reading>> {
        let reading = self
            .conn
            .query_row(
                "SELECT ts, string_value, double_value FROM data
                 WHERE topic = ?1 ORDER BY ts DESC LIMIT 1",
                params![topic],
                |row| {
                    Ok(Reading {
                        topic: topic.to_string(),
                        ts: row.get(0)?,
                        string_value: row.get(1)?,
                        double_value: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(reading)
    }

    fn fetch_rows(
        &self,
        sql: &str,
        topic: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> StoreResult<Vec<SeriesRow>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params![topic, start_ms, end_ms], |row| {
            Ok(SeriesRow {
                ts: row.get(0)?,
                text: row.get(1)?,
                number: row.get(2)?,
            })
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    fn list_topics(&self) -> StoreResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT DISTINCT topic FROM data ORDER BY topic")?;
        let topics = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(topics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_creates_file() {
        let dir = tempdir().unwrap();
        let store = TimeSeriesStore::new(dir.path().join("ts").join("data.db"), Duration::from_secs(1));
        let conn = store.connect().unwrap();
        assert_eq!(conn.count().unwrap(), 0);
        assert!(store.path().exists());
    }

    #[test]
    fn test_latest_reading() {
        let conn = TimeSeriesConnection::open_in_memory().unwrap();
        conn.insert_reading(&Reading::number("ahu/sat", 1_000, 55.0)).unwrap();
        conn.insert_reading(&Reading::number("ahu/sat", 3_000, 57.5)).unwrap();
        conn.insert_reading(&Reading::number("ahu/sat", 2_000, 56.0)).unwrap();

        let latest = conn.latest_reading("ahu/sat").unwrap().unwrap();
        assert_eq!(latest.ts, 3_000);
        assert_eq!(latest.double_value, Some(57.5));

        assert!(conn.latest_reading("ahu/missing").unwrap().is_none());
    }

    #[test]
    fn test_fetch_rows_respects_bounds() {
        let mut conn = TimeSeriesConnection::open_in_memory().unwrap();
        let readings: Vec<Reading> = (1..=5)
            .map(|i| Reading::number("t", i * 1_000, i as f64))
            .collect();
        conn.insert_readings(&readings).unwrap();

        let rows = conn
            .fetch_rows(
                "SELECT ts, string_value, double_value FROM data
                 WHERE topic = ?1 AND ts > ?2 AND ts <= ?3 ORDER BY ts DESC",
                "t",
                1_000,
                4_000,
            )
            .unwrap();

        let ts: Vec<i64> = rows.iter().map(|r| r.ts).collect();
        assert_eq!(ts, vec![4_000, 3_000, 2_000]);
    }

    #[test]
    fn test_list_topics() {
        let conn = TimeSeriesConnection::open_in_memory().unwrap();
        conn.insert_reading(&Reading::text("b/status", 1, "ok")).unwrap();
        conn.insert_reading(&Reading::text("a/status", 1, "ok")).unwrap();
        conn.insert_reading(&Reading::text("a/status", 2, "ok")).unwrap();

        assert_eq!(conn.list_topics().unwrap(), vec!["a/status", "b/status"]);
    }

    #[test]
    fn test_import_csv() {
        let mut conn = TimeSeriesConnection::open_in_memory().unwrap();
        let csv = "topic,ts,string_value,double_value\n\
                   ahu/sat,1000,55.5,\n\
                   ahu/fan,1000,t,1\n\
                   ahu/mode,1000,cooling,\n";

        assert_eq!(conn.import_csv(csv.as_bytes()).unwrap(), 3);

        let sat = conn.latest_reading("ahu/sat").unwrap().unwrap();
        assert_eq!(sat.double_value, Some(55.5));
        let mode = conn.latest_reading("ahu/mode").unwrap().unwrap();
        assert_eq!(mode.double_value, None);
        assert_eq!(mode.string_value.as_deref(), Some("cooling"));
    }
}
