use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use shared::{AttendanceRecord, AttendanceStatus};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::storage::change_feed::BroadcastChangeFeed;
use crate::storage::connection::DbConnection;
use crate::storage::traits::AttendanceStorage;

/// Repository for attendance records. Every committed replace is published
/// to the change feed so open marking screens see it.
#[derive(Clone)]
pub struct AttendanceRepository {
    db: DbConnection,
    feed: BroadcastChangeFeed,
}

impl AttendanceRepository {
    pub fn new(db: DbConnection, feed: BroadcastChangeFeed) -> Self {
        Self { db, feed }
    }

    fn map_row(row: &SqliteRow) -> Result<AttendanceRecord> {
        let status: String = row.get("status");
        Ok(AttendanceRecord {
            id: row.get("id"),
            date: row.get::<NaiveDate, _>("date"),
            student_id: row.get("student_id"),
            subject_id: row.get("subject_id"),
            status: status.parse()?,
            marked_by_id: row.get("marked_by_id"),
            marked_at: row.get::<DateTime<Utc>, _>("marked_at"),
        })
    }
}

/// Records passed to a replace must all belong to the replaced (date, subject)
pub(crate) fn ensure_batch_matches(
    date: NaiveDate,
    subject_id: &str,
    records: &[AttendanceRecord],
) -> Result<()> {
    if let Some(stray) = records
        .iter()
        .find(|r| r.date != date || r.subject_id != subject_id)
    {
        return Err(anyhow::anyhow!(
            "Record {} does not belong to {} / {}",
            stray.id,
            date,
            subject_id
        ));
    }
    Ok(())
}

#[async_trait]
impl AttendanceStorage for AttendanceRepository {
    async fn fetch_attendance(
        &self,
        date: NaiveDate,
        subject_id: &str,
    ) -> Result<HashMap<String, AttendanceStatus>> {
        let rows = sqlx::query(
            r#"
            SELECT student_id, status
            FROM attendance_records
            WHERE date = ? AND subject_id = ?
            "#,
        )
        .bind(date)
        .bind(subject_id)
        .fetch_all(self.db.pool())
        .await?;

        let mut statuses = HashMap::with_capacity(rows.len());
        for row in &rows {
            let status: String = row.get("status");
            statuses.insert(row.get("student_id"), status.parse()?);
        }

        debug!("Fetched {} records for {} / {}", statuses.len(), date, subject_id);
        Ok(statuses)
    }

    async fn replace_attendance(
        &self,
        date: NaiveDate,
        subject_id: &str,
        records: &[AttendanceRecord],
    ) -> Result<()> {
        ensure_batch_matches(date, subject_id, records)?;

        let mut tx = self.db.pool().begin().await?;

        let deleted = sqlx::query("DELETE FROM attendance_records WHERE date = ? AND subject_id = ?")
            .bind(date)
            .bind(subject_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        for record in records {
            sqlx::query(
                r#"
                INSERT INTO attendance_records
                    (id, date, student_id, subject_id, status, marked_by_id, marked_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&record.id)
            .bind(record.date)
            .bind(&record.student_id)
            .bind(&record.subject_id)
            .bind(record.status.as_str())
            .bind(&record.marked_by_id)
            .bind(record.marked_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(
            "Replaced attendance for {} / {}: {} removed, {} inserted",
            date,
            subject_id,
            deleted,
            records.len()
        );

        for record in records {
            self.feed.publish(record);
        }
        Ok(())
    }

    async fn list_student_records(&self, student_id: &str) -> Result<Vec<AttendanceRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, date, student_id, subject_id, status, marked_by_id, marked_at
            FROM attendance_records
            WHERE student_id = ?
            ORDER BY date ASC
            "#,
        )
        .bind(student_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(Self::map_row).collect()
    }
}
