use anyhow::Result;
use async_trait::async_trait;
use shared::Student;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::storage::connection::DbConnection;
use crate::storage::traits::StudentStorage;

/// Repository for student operations
#[derive(Clone)]
pub struct StudentRepository {
    db: DbConnection,
}

impl StudentRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    fn map_row(row: &SqliteRow) -> Student {
        Student {
            id: row.get("id"),
            roll_number: row.get("roll_number"),
            name: row.get("name"),
            course: row.get("course"),
            year: row.get::<i64, _>("year") as u32,
            section: row.get("section"),
            image_url: row.get("image_url"),
        }
    }
}

#[async_trait]
impl StudentStorage for StudentRepository {
    async fn store_student(&self, student: &Student) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO students (id, roll_number, name, course, year, section, image_url)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&student.id)
        .bind(&student.roll_number)
        .bind(&student.name)
        .bind(&student.course)
        .bind(student.year as i64)
        .bind(&student.section)
        .bind(&student.image_url)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    async fn get_student(&self, student_id: &str) -> Result<Option<Student>> {
        let row = sqlx::query(
            r#"
            SELECT id, roll_number, name, course, year, section, image_url
            FROM students
            WHERE id = ?
            "#,
        )
        .bind(student_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(Self::map_row))
    }

    async fn list_students(&self) -> Result<Vec<Student>> {
        let rows = sqlx::query(
            r#"
            SELECT id, roll_number, name, course, year, section, image_url
            FROM students
            ORDER BY roll_number ASC
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(Self::map_row).collect())
    }

    async fn update_student(&self, student: &Student) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE students
            SET roll_number = ?, name = ?, course = ?, year = ?, section = ?, image_url = ?
            WHERE id = ?
            "#,
        )
        .bind(&student.roll_number)
        .bind(&student.name)
        .bind(&student.course)
        .bind(student.year as i64)
        .bind(&student.section)
        .bind(&student.image_url)
        .bind(&student.id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(anyhow::anyhow!("Student not found: {}", student.id));
        }
        Ok(())
    }

    async fn delete_student(&self, student_id: &str) -> Result<bool> {
        let mut tx = self.db.pool().begin().await?;

        sqlx::query("DELETE FROM attendance_records WHERE student_id = ?")
            .bind(student_id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM students WHERE id = ?")
            .bind(student_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}
