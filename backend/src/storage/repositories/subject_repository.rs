use anyhow::Result;
use async_trait::async_trait;
use shared::Subject;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::storage::connection::DbConnection;
use crate::storage::traits::SubjectStorage;

/// Repository for subject operations
#[derive(Clone)]
pub struct SubjectRepository {
    db: DbConnection,
}

impl SubjectRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    fn map_row(row: &SqliteRow) -> Subject {
        Subject {
            id: row.get("id"),
            code: row.get("code"),
            name: row.get("name"),
            faculty_id: row.get("faculty_id"),
            course_id: row.get("course_id"),
        }
    }
}

#[async_trait]
impl SubjectStorage for SubjectRepository {
    async fn store_subject(&self, subject: &Subject) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO subjects (id, code, name, faculty_id, course_id)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&subject.id)
        .bind(&subject.code)
        .bind(&subject.name)
        .bind(&subject.faculty_id)
        .bind(&subject.course_id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    async fn get_subject(&self, subject_id: &str) -> Result<Option<Subject>> {
        let row = sqlx::query(
            r#"
            SELECT id, code, name, faculty_id, course_id
            FROM subjects
            WHERE id = ?
            "#,
        )
        .bind(subject_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(Self::map_row))
    }

    async fn list_subjects(&self) -> Result<Vec<Subject>> {
        let rows = sqlx::query(
            r#"
            SELECT id, code, name, faculty_id, course_id
            FROM subjects
            ORDER BY code ASC
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(Self::map_row).collect())
    }

    async fn update_subject(&self, subject: &Subject) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE subjects
            SET code = ?, name = ?, faculty_id = ?, course_id = ?
            WHERE id = ?
            "#,
        )
        .bind(&subject.code)
        .bind(&subject.name)
        .bind(&subject.faculty_id)
        .bind(&subject.course_id)
        .bind(&subject.id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(anyhow::anyhow!("Subject not found: {}", subject.id));
        }
        Ok(())
    }

    async fn delete_subject(&self, subject_id: &str) -> Result<bool> {
        let mut tx = self.db.pool().begin().await?;

        sqlx::query("DELETE FROM attendance_records WHERE subject_id = ?")
            .bind(subject_id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM subjects WHERE id = ?")
            .bind(subject_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject(id: &str, code: &str, name: &str) -> Subject {
        Subject {
            id: id.to_string(),
            code: code.to_string(),
            name: name.to_string(),
            faculty_id: "1".to_string(),
            course_id: "1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_subjects_round_trip_ordered_by_code() {
        let db = DbConnection::init_test().await.expect("Failed to create test database");
        let repo = SubjectRepository::new(db);

        repo.store_subject(&subject("4", "CS401", "Artificial Intelligence")).await.unwrap();
        repo.store_subject(&subject("1", "CS201", "Data Structures")).await.unwrap();

        let subjects = repo.list_subjects().await.unwrap();
        assert_eq!(subjects[0].code, "CS201");
        assert_eq!(subjects[1].code, "CS401");

        let mut ai = repo.get_subject("4").await.unwrap().unwrap();
        ai.faculty_id = "2".to_string();
        repo.update_subject(&ai).await.unwrap();
        assert_eq!(repo.get_subject("4").await.unwrap().unwrap().faculty_id, "2");

        assert!(repo.delete_subject("4").await.unwrap());
        assert_eq!(repo.list_subjects().await.unwrap().len(), 1);
    }
}
