//! # Storage Traits
//!
//! This module defines the storage abstraction traits that allow different
//! storage backends to be used interchangeably in the domain layer.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use shared::{AttendanceRecord, AttendanceStatus, Student, Subject};
use std::collections::HashMap;

use super::change_feed::ChannelHandle;

/// Trait defining the interface for student storage operations
#[async_trait]
pub trait StudentStorage: Send + Sync {
    /// Store a new student
    async fn store_student(&self, student: &Student) -> Result<()>;

    /// Retrieve a specific student by ID
    async fn get_student(&self, student_id: &str) -> Result<Option<Student>>;

    /// List all students ordered by roll number
    async fn list_students(&self) -> Result<Vec<Student>>;

    /// Update an existing student
    async fn update_student(&self, student: &Student) -> Result<()>;

    /// Delete a student and their attendance records.
    /// Returns true if the student was found and deleted
    async fn delete_student(&self, student_id: &str) -> Result<bool>;
}

/// Trait defining the interface for subject storage operations
#[async_trait]
pub trait SubjectStorage: Send + Sync {
    async fn store_subject(&self, subject: &Subject) -> Result<()>;

    async fn get_subject(&self, subject_id: &str) -> Result<Option<Subject>>;

    /// List all subjects ordered by code
    async fn list_subjects(&self) -> Result<Vec<Subject>>;

    async fn update_subject(&self, subject: &Subject) -> Result<()>;

    async fn delete_subject(&self, subject_id: &str) -> Result<bool>;
}

/// Trait defining the interface for attendance record storage
#[async_trait]
pub trait AttendanceStorage: Send + Sync {
    /// Existing marks for one (date, subject), keyed by student id
    async fn fetch_attendance(
        &self,
        date: NaiveDate,
        subject_id: &str,
    ) -> Result<HashMap<String, AttendanceStatus>>;

    /// Delete every record for (date, subject) and insert `records` in its place.
    /// Implementations publish each inserted record to their change feed.
    async fn replace_attendance(
        &self,
        date: NaiveDate,
        subject_id: &str,
        records: &[AttendanceRecord],
    ) -> Result<()>;

    /// All records of one student across subjects and dates
    async fn list_student_records(&self, student_id: &str) -> Result<Vec<AttendanceRecord>>;
}

/// Push feed of attendance changes, filtered by subject on the feed side
pub trait ChangeFeed: Send + Sync {
    /// Open a subscription. The handshake result arrives on the handle as a
    /// `ChannelMessage::Status`.
    fn subscribe(&self, subject_id: &str) -> ChannelHandle;

    /// Close a subscription and release its resources
    fn unsubscribe(&self, handle: ChannelHandle);
}

/// Durable key/value storage for client session data
pub trait SessionStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    fn remove_item(&self, key: &str) -> Result<()>;
}
