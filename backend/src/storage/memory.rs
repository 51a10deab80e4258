//! # In-Memory Storage
//!
//! A storage backend that keeps everything in process memory. Used when the
//! portal runs with `storage.backend: memory` and as the fake collaborator in
//! tests. Behaves like the SQL backend: unique roll numbers and subject
//! codes, full-replace saves, and change feed publication.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use shared::{AttendanceRecord, AttendanceStatus, Student, Subject};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use super::change_feed::BroadcastChangeFeed;
use super::repositories::attendance_repository::ensure_batch_matches;
use super::traits::{AttendanceStorage, StudentStorage, SubjectStorage};

#[derive(Default)]
struct MemoryState {
    students: HashMap<String, Student>,
    subjects: HashMap<String, Subject>,
    records: Vec<AttendanceRecord>,
}

#[derive(Clone)]
pub struct InMemoryStorage {
    state: Arc<RwLock<MemoryState>>,
    feed: BroadcastChangeFeed,
}

impl InMemoryStorage {
    pub fn new(feed: BroadcastChangeFeed) -> Self {
        Self {
            state: Arc::new(RwLock::new(MemoryState::default())),
            feed,
        }
    }

    /// Number of stored records for (date, subject)
    pub async fn record_count(&self, date: NaiveDate, subject_id: &str) -> usize {
        let state = self.state.read().await;
        state
            .records
            .iter()
            .filter(|r| r.date == date && r.subject_id == subject_id)
            .count()
    }
}

#[async_trait]
impl StudentStorage for InMemoryStorage {
    async fn store_student(&self, student: &Student) -> Result<()> {
        let mut state = self.state.write().await;
        if state.students.contains_key(&student.id) {
            return Err(anyhow::anyhow!("Student already exists: {}", student.id));
        }
        if state
            .students
            .values()
            .any(|s| s.roll_number == student.roll_number)
        {
            return Err(anyhow::anyhow!("Roll number already in use: {}", student.roll_number));
        }
        state.students.insert(student.id.clone(), student.clone());
        Ok(())
    }

    async fn get_student(&self, student_id: &str) -> Result<Option<Student>> {
        Ok(self.state.read().await.students.get(student_id).cloned())
    }

    async fn list_students(&self) -> Result<Vec<Student>> {
        let state = self.state.read().await;
        let mut students: Vec<Student> = state.students.values().cloned().collect();
        students.sort_by(|a, b| a.roll_number.cmp(&b.roll_number));
        Ok(students)
    }

    async fn update_student(&self, student: &Student) -> Result<()> {
        let mut state = self.state.write().await;
        if state
            .students
            .values()
            .any(|s| s.id != student.id && s.roll_number == student.roll_number)
        {
            return Err(anyhow::anyhow!("Roll number already in use: {}", student.roll_number));
        }
        match state.students.get_mut(&student.id) {
            Some(existing) => {
                *existing = student.clone();
                Ok(())
            }
            None => Err(anyhow::anyhow!("Student not found: {}", student.id)),
        }
    }

    async fn delete_student(&self, student_id: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        state.records.retain(|r| r.student_id != student_id);
        Ok(state.students.remove(student_id).is_some())
    }
}

#[async_trait]
impl SubjectStorage for InMemoryStorage {
    async fn store_subject(&self, subject: &Subject) -> Result<()> {
        let mut state = self.state.write().await;
        if state.subjects.contains_key(&subject.id) {
            return Err(anyhow::anyhow!("Subject already exists: {}", subject.id));
        }
        if state.subjects.values().any(|s| s.code == subject.code) {
            return Err(anyhow::anyhow!("Subject code already in use: {}", subject.code));
        }
        state.subjects.insert(subject.id.clone(), subject.clone());
        Ok(())
    }

    async fn get_subject(&self, subject_id: &str) -> Result<Option<Subject>> {
        Ok(self.state.read().await.subjects.get(subject_id).cloned())
    }

    async fn list_subjects(&self) -> Result<Vec<Subject>> {
        let state = self.state.read().await;
        let mut subjects: Vec<Subject> = state.subjects.values().cloned().collect();
        subjects.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(subjects)
    }

    async fn update_subject(&self, subject: &Subject) -> Result<()> {
        let mut state = self.state.write().await;
        if state
            .subjects
            .values()
            .any(|s| s.id != subject.id && s.code == subject.code)
        {
            return Err(anyhow::anyhow!("Subject code already in use: {}", subject.code));
        }
        match state.subjects.get_mut(&subject.id) {
            Some(existing) => {
                *existing = subject.clone();
                Ok(())
            }
            None => Err(anyhow::anyhow!("Subject not found: {}", subject.id)),
        }
    }

    async fn delete_subject(&self, subject_id: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        state.records.retain(|r| r.subject_id != subject_id);
        Ok(state.subjects.remove(subject_id).is_some())
    }
}

#[async_trait]
impl AttendanceStorage for InMemoryStorage {
    async fn fetch_attendance(
        &self,
        date: NaiveDate,
        subject_id: &str,
    ) -> Result<HashMap<String, AttendanceStatus>> {
        let state = self.state.read().await;
        Ok(state
            .records
            .iter()
            .filter(|r| r.date == date && r.subject_id == subject_id)
            .map(|r| (r.student_id.clone(), r.status))
            .collect())
    }

    async fn replace_attendance(
        &self,
        date: NaiveDate,
        subject_id: &str,
        records: &[AttendanceRecord],
    ) -> Result<()> {
        ensure_batch_matches(date, subject_id, records)?;

        {
            let mut state = self.state.write().await;
            state
                .records
                .retain(|r| !(r.date == date && r.subject_id == subject_id));
            state.records.extend(records.iter().cloned());
        }
        info!(
            "Replaced attendance for {} / {} with {} records",
            date,
            subject_id,
            records.len()
        );

        for record in records {
            self.feed.publish(record);
        }
        Ok(())
    }

    async fn list_student_records(&self, student_id: &str) -> Result<Vec<AttendanceRecord>> {
        let state = self.state.read().await;
        let mut records: Vec<AttendanceRecord> = state
            .records
            .iter()
            .filter(|r| r.student_id == student_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.date);
        Ok(records)
    }
}
