use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Attendance status of one student for one class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    /// Students without a record are treated as absent
    #[default]
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, AttendanceStatus::Present)
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "present" => Ok(AttendanceStatus::Present),
            "absent" => Ok(AttendanceStatus::Absent),
            other => Err(StatusParseError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusParseError(pub String);

impl fmt::Display for StatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid attendance status: '{}'", self.0)
    }
}

impl std::error::Error for StatusParseError {}

/// A student on the roster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    /// Unique display key, e.g. "O19CS001"
    pub roll_number: String,
    pub name: String,
    pub course: String,
    pub year: u32,
    pub section: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// A subject taught by one faculty member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    /// Unique display key, e.g. "CS301"
    pub code: String,
    pub name: String,
    pub faculty_id: String,
    pub course_id: String,
}

/// One stored attendance mark, unique per (date, subject_id, student_id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    /// Format: "{date}-{student_id}-{subject_id}"
    pub id: String,
    pub date: NaiveDate,
    pub student_id: String,
    pub subject_id: String,
    pub status: AttendanceStatus,
    pub marked_by_id: String,
    pub marked_at: DateTime<Utc>,
}

impl AttendanceRecord {
    pub fn generate_id(date: NaiveDate, student_id: &str, subject_id: &str) -> String {
        format!("{}-{}-{}", date, student_id, subject_id)
    }
}

/// Change pushed by the realtime feed. Extra columns in the payload are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceChangeEvent {
    pub student_id: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

/// Status of one student in a save request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentStatus {
    pub student_id: String,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Faculty,
    Admin,
}

/// The signed-in portal user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub role: UserRole,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceSummary {
    pub total_classes: u32,
    pub present: u32,
    pub absent: u32,
    /// Rounded to the nearest whole percent, 0 when there are no classes
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectAttendance {
    pub subject_id: String,
    pub subject_name: String,
    pub subject_code: String,
    pub summary: AttendanceSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentAttendance {
    pub student: Student,
    pub overall: AttendanceSummary,
    pub subjects: Vec<SubjectAttendance>,
}

/// Head counts for one (date, subject)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceStats {
    pub total_students: u32,
    pub present_students: u32,
    pub absent_students: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateStudentRequest {
    pub roll_number: String,
    pub name: String,
    pub course: String,
    pub year: u32,
    pub section: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UpdateStudentRequest {
    pub roll_number: Option<String>,
    pub name: Option<String>,
    pub course: Option<String>,
    pub year: Option<u32>,
    pub section: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentListResponse {
    pub students: Vec<Student>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSubjectRequest {
    pub code: String,
    pub name: String,
    pub faculty_id: String,
    pub course_id: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UpdateSubjectRequest {
    pub code: Option<String>,
    pub name: Option<String>,
    pub faculty_id: Option<String>,
    pub course_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectListResponse {
    pub subjects: Vec<Subject>,
}

/// Existing marks for one (date, subject), keyed by student id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceMapResponse {
    pub date: NaiveDate,
    pub subject_id: String,
    pub statuses: BTreeMap<String, AttendanceStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveAttendanceRequest {
    pub date: NaiveDate,
    pub subject_id: String,
    pub statuses: Vec<StudentStatus>,
    pub marked_by_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveAttendanceResponse {
    pub saved_count: usize,
    pub present_count: usize,
    /// Set when the save went through despite a policy warning
    pub warning: Option<String>,
    pub success_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentUserResponse {
    pub user: Option<AuthUser>,
}

/// Requests students and visitors send to the administrators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdminRequest {
    AddStudent { roll_number: String, name: String },
    Support { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminRequestResponse {
    pub success: bool,
    pub message: String,
}
