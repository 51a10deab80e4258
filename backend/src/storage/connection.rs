use anyhow::Result;
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool};
use std::sync::Arc;

/// Database used when the configuration names none
pub const DEFAULT_DATABASE_URL: &str = "sqlite:attendance.db";

/// DbConnection manages the SQLite pool and schema
#[derive(Clone)]
pub struct DbConnection {
    pool: Arc<SqlitePool>,
}

impl DbConnection {
    /// Create a new database connection
    pub async fn new(url: &str) -> Result<Self> {
        // Create database if it doesn't exist
        if !Sqlite::database_exists(url).await.unwrap_or(false) {
            Sqlite::create_database(url).await?
        }

        let pool = SqlitePool::connect(url).await?;

        Self::setup_schema(&pool).await?;

        Ok(Self { pool: Arc::new(pool) })
    }

    /// Initialize a test database with a unique name
    pub async fn init_test() -> Result<Self> {
        let test_id = uuid::Uuid::new_v4().simple().to_string();
        let db_url = format!("sqlite:file:memdb_{}?mode=memory&cache=shared", test_id);

        Self::new(&db_url).await
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Set up the required database schema
    async fn setup_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS students (
                id TEXT PRIMARY KEY,
                roll_number TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                course TEXT NOT NULL,
                year INTEGER NOT NULL,
                section TEXT NOT NULL,
                image_url TEXT
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subjects (
                id TEXT PRIMARY KEY,
                code TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                faculty_id TEXT NOT NULL,
                course_id TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS attendance_records (
                id TEXT PRIMARY KEY,
                date TEXT NOT NULL,
                student_id TEXT NOT NULL,
                subject_id TEXT NOT NULL,
                status TEXT NOT NULL CHECK (status IN ('present', 'absent')),
                marked_by_id TEXT NOT NULL,
                marked_at TEXT NOT NULL,
                UNIQUE (date, subject_id, student_id)
            );
            "#,
        )
        .execute(pool)
        .await?;

        // Marking screen lookups
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_attendance_date_subject
            ON attendance_records(date, subject_id);
            "#,
        )
        .execute(pool)
        .await?;

        // Per-student summaries
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_attendance_student
            ON attendance_records(student_id);
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}
