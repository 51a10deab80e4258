//! # Summary Service
//!
//! Attendance percentages for the dashboards: one student's overall and
//! per-subject figures, and the same for the whole class.

use anyhow::Result;
use shared::{
    AttendanceRecord, AttendanceSummary, Student, StudentAttendance, Subject, SubjectAttendance,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::storage::{AttendanceStorage, StudentStorage, SubjectStorage};

/// Totals and percentage for a set of records.
/// The percentage is rounded to the nearest whole number, half up, and is 0
/// when there are no classes.
pub fn summarize<'a>(records: impl IntoIterator<Item = &'a AttendanceRecord>) -> AttendanceSummary {
    let mut total = 0u32;
    let mut present = 0u32;
    for record in records {
        total += 1;
        if record.status.is_present() {
            present += 1;
        }
    }

    AttendanceSummary {
        total_classes: total,
        present,
        absent: total - present,
        percentage: percentage(present, total),
    }
}

/// `present / total` as a whole percentage, rounded half up
fn percentage(present: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let (present, total) = (u64::from(present), u64::from(total));
    // present <= total, so the result is at most 100
    ((present * 200 + total) / (2 * total)) as u32
}

#[derive(Clone)]
pub struct SummaryService {
    students: Arc<dyn StudentStorage>,
    subjects: Arc<dyn SubjectStorage>,
    attendance: Arc<dyn AttendanceStorage>,
}

impl SummaryService {
    pub fn new(
        students: Arc<dyn StudentStorage>,
        subjects: Arc<dyn SubjectStorage>,
        attendance: Arc<dyn AttendanceStorage>,
    ) -> Self {
        Self {
            students,
            subjects,
            attendance,
        }
    }

    /// Overall and per-subject attendance of one student, `None` if unknown
    pub async fn student_attendance(&self, student_id: &str) -> Result<Option<StudentAttendance>> {
        info!("Summarizing attendance for student {}", student_id);

        let Some(student) = self.students.get_student(student_id).await? else {
            warn!("Student not found: {}", student_id);
            return Ok(None);
        };
        let subjects = self.subjects.list_subjects().await?;
        let attendance = self.build(student, &subjects).await?;
        Ok(Some(attendance))
    }

    /// Attendance of every student, in roll number order
    pub async fn class_report(&self) -> Result<Vec<StudentAttendance>> {
        let students = self.students.list_students().await?;
        let subjects = self.subjects.list_subjects().await?;
        info!("Building class report for {} students", students.len());

        let mut report = Vec::with_capacity(students.len());
        for student in students {
            report.push(self.build(student, &subjects).await?);
        }
        Ok(report)
    }

    async fn build(&self, student: Student, subjects: &[Subject]) -> Result<StudentAttendance> {
        let records = self.attendance.list_student_records(&student.id).await?;

        let per_subject = subjects
            .iter()
            .map(|subject| SubjectAttendance {
                subject_id: subject.id.clone(),
                subject_name: subject.name.clone(),
                subject_code: subject.code.clone(),
                summary: summarize(records.iter().filter(|r| r.subject_id == subject.id)),
            })
            .collect();

        Ok(StudentAttendance {
            overall: summarize(&records),
            subjects: per_subject,
            student,
        })
    }
}
