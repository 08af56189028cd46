//! Baseline storage operations.

#![allow(clippy::missing_errors_doc)]

use crate::baseline::BaselineRecord;
use crate::error::StorageError;
use crate::traits::StoredBaseline;
use chrono::{SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::core::SqliteBaselineStore;

impl SqliteBaselineStore {
    /// Save a baseline record, replacing one with the same id.
    pub async fn save_baseline(&self, record: &BaselineRecord) -> Result<StoredBaseline, StorageError> {
        let blob = serde_json::to_string(record).map_err(|e| StorageError::Serialization {
            message: format!("Failed to encode baseline {}: {e}", record.id),
        })?;
        let saved_at = Utc::now();
        let sample_count = i64::try_from(record.sample_count).unwrap_or(i64::MAX);

        sqlx::query(
            "INSERT OR REPLACE INTO baselines \
             (id, captured_at, saved_at, quality, quality_score, sample_count, record) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(record.captured_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .bind(saved_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .bind(record.quality.to_string())
        .bind(record.quality_score)
        .bind(sample_count)
        .bind(&blob)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::query_error("INSERT baselines", format!("{e}")))?;

        tracing::info!(baseline_id = %record.id, bytes = blob.len(), "Baseline saved");

        Ok(StoredBaseline {
            id: record.id.clone(),
            captured_at: record.captured_at,
            saved_at,
            quality: record.quality.to_string(),
            quality_score: record.quality_score,
            sample_count: record.sample_count as u64,
        })
    }

    fn decode(row: &SqliteRow) -> Result<BaselineRecord, StorageError> {
        let id: String = row.get("id");
        let blob: String = row.get("record");
        serde_json::from_str(&blob).map_err(|e| StorageError::Serialization {
            message: format!("Failed to decode baseline {id}: {e}"),
        })
    }

    /// Load a baseline record by id.
    pub async fn load_baseline(&self, id: &str) -> Result<BaselineRecord, StorageError> {
        let row = sqlx::query("SELECT id, record FROM baselines WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Self::query_error("SELECT baselines", format!("{e}")))?;

        match row {
            Some(row) => Self::decode(&row),
            None => Err(StorageError::BaselineNotFound {
                baseline_id: id.to_string(),
            }),
        }
    }

    /// Load the most recently saved baseline.
    pub async fn load_latest_baseline(&self) -> Result<Option<BaselineRecord>, StorageError> {
        let row = sqlx::query("SELECT id, record FROM baselines ORDER BY saved_at DESC, rowid DESC LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Self::query_error("SELECT latest baseline", format!("{e}")))?;

        row.as_ref().map(Self::decode).transpose()
    }

    /// List saved baselines, newest first.
    pub async fn list_baselines(&self, limit: u32) -> Result<Vec<StoredBaseline>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, captured_at, saved_at, quality, quality_score, sample_count \
             FROM baselines ORDER BY saved_at DESC, rowid DESC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Self::query_error("SELECT baselines", format!("{e}")))?;

        rows.iter()
            .map(|row| {
                let captured_at: String = row.get("captured_at");
                let saved_at: String = row.get("saved_at");
                let sample_count: i64 = row.get("sample_count");
                Ok(StoredBaseline {
                    id: row.get("id"),
                    captured_at: Self::parse_datetime(&captured_at)?,
                    saved_at: Self::parse_datetime(&saved_at)?,
                    quality: row.get("quality"),
                    quality_score: row.get("quality_score"),
                    sample_count: u64::try_from(sample_count).unwrap_or(0),
                })
            })
            .collect()
    }
}
