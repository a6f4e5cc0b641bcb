//! Per-generation progress history in SQLite: one row per finished generation
//! with the population size, total fitness and top fitness.

use crate::db::GenerationRecord;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad timestamp {0:?}")]
    Timestamp(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProgressRow {
    pub generation_id: u32,
    pub population_size: usize,
    pub total_fitness: f64,
    pub top_fitness: f64,
    pub recorded_at: DateTime<Utc>,
}

impl ProgressRow {
    pub fn average_fitness(&self) -> f64 {
        if self.population_size == 0 {
            0.0
        } else {
            self.total_fitness / self.population_size as f64
        }
    }
}

pub struct ProgressLedger {
    conn: Connection,
}

impl ProgressLedger {
    pub fn open(path: &Path) -> Result<Self, ProgressError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, ProgressError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, ProgressError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS generations (
                generation_id   INTEGER PRIMARY KEY,
                population_size INTEGER NOT NULL,
                total_fitness   REAL NOT NULL,
                top_fitness     REAL NOT NULL,
                recorded_at     TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self { conn })
    }

    /// Insert or replace the row for this generation.
    pub fn record(&self, row: &ProgressRow) -> Result<(), ProgressError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO generations
                (generation_id, population_size, total_fitness, top_fitness, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                row.generation_id as i64,
                row.population_size as i64,
                row.total_fitness,
                row.top_fitness,
                row.recorded_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn record_generation(&self, record: &GenerationRecord) -> Result<(), ProgressError> {
        self.record(&ProgressRow {
            generation_id: record.generation_id,
            population_size: record.population_size,
            total_fitness: record.total_fitness,
            top_fitness: record.elite_fitness,
            recorded_at: Utc::now(),
        })
    }

    /// The newest `limit` rows, oldest first.
    pub fn history(&self, limit: usize) -> Result<Vec<ProgressRow>, ProgressError> {
        let mut stmt = self.conn.prepare(
            "SELECT generation_id, population_size, total_fitness, top_fitness, recorded_at
             FROM (SELECT * FROM generations ORDER BY generation_id DESC LIMIT ?1)
             ORDER BY generation_id ASC",
        )?;
        let raw = stmt
            .query_map(params![limit as i64], |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, i64>(1)?,
                    r.get::<_, f64>(2)?,
                    r.get::<_, f64>(3)?,
                    r.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(id, size, total, top, at)| {
                let recorded_at = DateTime::parse_from_rfc3339(&at)
                    .map_err(|_| ProgressError::Timestamp(at.clone()))?
                    .with_timezone(&Utc);
                Ok(ProgressRow {
                    generation_id: id as u32,
                    population_size: size as usize,
                    total_fitness: total,
                    top_fitness: top,
                    recorded_at,
                })
            })
            .collect()
    }
}
