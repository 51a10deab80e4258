//! # Attendance Service
//!
//! Loading and saving the attendance of one class.
//!
//! ## Business Rules
//!
//! - Only today's attendance can be marked or saved; other dates are read-only
//! - A save covers the whole roster: students missing from the request are
//!   saved as absent
//! - A save replaces everything stored for (date, subject)
//! - A save with nobody present either warns or is rejected, per
//!   [`ZeroPresentPolicy`]

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared::{
    AttendanceRecord, AttendanceStats, AttendanceStatus, SaveAttendanceRequest,
    SaveAttendanceResponse, Student,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::clock::Clock;
use crate::storage::{AttendanceStorage, StudentStorage};

pub const SAVE_SUCCESS_MESSAGE: &str = "Attendance saved successfully";
pub const ZERO_PRESENT_WARNING: &str = "No students are marked present";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroPresentPolicy {
    #[default]
    WarnAndProceed,
    Block,
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("Attendance for {date} is read-only; only today ({today}) can be marked")]
    ReadOnlyDate { date: NaiveDate, today: NaiveDate },
    #[error("No students are marked present")]
    NoStudentsPresent,
    #[error("Unknown student: {0}")]
    UnknownStudent(String),
    #[error("Student listed more than once: {0}")]
    DuplicateStudent(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Failed to save attendance: {0}")]
    Storage(#[source] anyhow::Error),
}

#[derive(Clone)]
pub struct AttendanceService {
    students: Arc<dyn StudentStorage>,
    attendance: Arc<dyn AttendanceStorage>,
    clock: Arc<dyn Clock>,
    zero_present_policy: ZeroPresentPolicy,
}

impl AttendanceService {
    pub fn new(
        students: Arc<dyn StudentStorage>,
        attendance: Arc<dyn AttendanceStorage>,
        clock: Arc<dyn Clock>,
        zero_present_policy: ZeroPresentPolicy,
    ) -> Self {
        Self {
            students,
            attendance,
            clock,
            zero_present_policy,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn is_editable(&self, date: NaiveDate) -> bool {
        date == self.clock.today()
    }

    pub fn ensure_editable(&self, date: NaiveDate) -> Result<(), SaveError> {
        let today = self.clock.today();
        if date != today {
            return Err(SaveError::ReadOnlyDate { date, today });
        }
        Ok(())
    }

    /// Students ordered by roll number
    pub async fn roster(&self) -> Result<Vec<Student>> {
        self.students.list_students().await
    }

    pub async fn fetch_attendance(
        &self,
        date: NaiveDate,
        subject_id: &str,
    ) -> Result<HashMap<String, AttendanceStatus>> {
        info!("Fetching attendance for {} / {}", date, subject_id);
        let statuses = self.attendance.fetch_attendance(date, subject_id).await?;
        info!("Found {} existing records", statuses.len());
        Ok(statuses)
    }

    /// Replace the stored attendance of (date, subject) with the request
    pub async fn save(&self, request: SaveAttendanceRequest) -> Result<SaveAttendanceResponse, SaveError> {
        info!(
            "Saving attendance for {} / {} ({} statuses)",
            request.date,
            request.subject_id,
            request.statuses.len()
        );

        self.ensure_editable(request.date)?;
        if request.subject_id.trim().is_empty() {
            return Err(SaveError::InvalidRequest("subject_id is required".to_string()));
        }
        if request.marked_by_id.trim().is_empty() {
            return Err(SaveError::InvalidRequest("marked_by_id is required".to_string()));
        }

        let roster = self.roster().await.map_err(SaveError::Storage)?;
        let known: HashSet<&str> = roster.iter().map(|s| s.id.as_str()).collect();

        let mut requested: HashMap<&str, AttendanceStatus> = HashMap::new();
        for entry in &request.statuses {
            if !known.contains(entry.student_id.as_str()) {
                return Err(SaveError::UnknownStudent(entry.student_id.clone()));
            }
            if requested.insert(entry.student_id.as_str(), entry.status).is_some() {
                return Err(SaveError::DuplicateStudent(entry.student_id.clone()));
            }
        }

        let marked_at = Utc::now();
        let records: Vec<AttendanceRecord> = roster
            .iter()
            .map(|student| AttendanceRecord {
                id: AttendanceRecord::generate_id(request.date, &student.id, &request.subject_id),
                date: request.date,
                student_id: student.id.clone(),
                subject_id: request.subject_id.clone(),
                status: requested
                    .get(student.id.as_str())
                    .copied()
                    .unwrap_or_default(),
                marked_by_id: request.marked_by_id.clone(),
                marked_at,
            })
            .collect();

        let present_count = records.iter().filter(|r| r.status.is_present()).count();
        let mut warning = None;
        if present_count == 0 && !records.is_empty() {
            match self.zero_present_policy {
                ZeroPresentPolicy::Block => {
                    warn!("Rejecting save for {} / {}: nobody present", request.date, request.subject_id);
                    return Err(SaveError::NoStudentsPresent);
                }
                ZeroPresentPolicy::WarnAndProceed => {
                    warn!("Saving {} / {} with nobody present", request.date, request.subject_id);
                    warning = Some(ZERO_PRESENT_WARNING.to_string());
                }
            }
        }

        self.attendance
            .replace_attendance(request.date, &request.subject_id, &records)
            .await
            .map_err(SaveError::Storage)?;

        info!(
            "Saved {} records ({} present) for {} / {}",
            records.len(),
            present_count,
            request.date,
            request.subject_id
        );

        Ok(SaveAttendanceResponse {
            saved_count: records.len(),
            present_count,
            warning,
            success_message: SAVE_SUCCESS_MESSAGE.to_string(),
        })
    }

    /// Head counts for (date, subject) against the current roster
    pub async fn stats(&self, date: NaiveDate, subject_id: &str) -> Result<AttendanceStats> {
        let roster = self.roster().await?;
        let stored = self.attendance.fetch_attendance(date, subject_id).await?;

        let total = roster.len() as u32;
        let present = roster
            .iter()
            .filter(|s| stored.get(&s.id).map(|st| st.is_present()).unwrap_or(false))
            .count() as u32;

        Ok(AttendanceStats {
            total_students: total,
            present_students: present,
            absent_students: total - present,
        })
    }
}
