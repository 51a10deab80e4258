//! # Roster Service
//!
//! Student and subject management for administrators.
//!
//! ## Business Rules
//!
//! - Roll numbers and subject codes are unique
//! - Names, roll numbers, codes, course and section cannot be blank
//! - Year of study is at least 1
//! - Deleting a student or subject also deletes their attendance records

use shared::{
    CreateStudentRequest, CreateSubjectRequest, Student, Subject, UpdateStudentRequest,
    UpdateSubjectRequest,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::storage::{StudentStorage, SubjectStorage};

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("{0}")]
    Invalid(String),
    #[error("Roll number already in use: {0}")]
    DuplicateRollNumber(String),
    #[error("Subject code already in use: {0}")]
    DuplicateSubjectCode(String),
    #[error("Student not found: {0}")]
    StudentNotFound(String),
    #[error("Subject not found: {0}")]
    SubjectNotFound(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

fn required(field: &str, value: &str) -> Result<String, RosterError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RosterError::Invalid(format!("{} cannot be empty", field)));
    }
    Ok(trimmed.to_string())
}

fn valid_year(year: u32) -> Result<u32, RosterError> {
    if year == 0 {
        return Err(RosterError::Invalid("Year must be at least 1".to_string()));
    }
    Ok(year)
}

#[derive(Clone)]
pub struct RosterService {
    students: Arc<dyn StudentStorage>,
    subjects: Arc<dyn SubjectStorage>,
}

impl RosterService {
    pub fn new(students: Arc<dyn StudentStorage>, subjects: Arc<dyn SubjectStorage>) -> Self {
        Self { students, subjects }
    }

    pub async fn list_students(&self) -> Result<Vec<Student>, RosterError> {
        let students = self.students.list_students().await?;
        info!("Found {} students", students.len());
        Ok(students)
    }

    /// Students whose name or roll number contains `query`, ignoring case.
    /// A blank query matches everyone.
    pub async fn search_students(&self, query: &str) -> Result<Vec<Student>, RosterError> {
        let needle = query.trim().to_lowercase();
        let students = self.students.list_students().await?;
        if needle.is_empty() {
            return Ok(students);
        }

        let matches: Vec<Student> = students
            .into_iter()
            .filter(|s| {
                s.name.to_lowercase().contains(&needle)
                    || s.roll_number.to_lowercase().contains(&needle)
            })
            .collect();
        info!("Search '{}' matched {} students", needle, matches.len());
        Ok(matches)
    }

    pub async fn get_student(&self, student_id: &str) -> Result<Student, RosterError> {
        self.students
            .get_student(student_id)
            .await?
            .ok_or_else(|| RosterError::StudentNotFound(student_id.to_string()))
    }

    pub async fn create_student(&self, request: CreateStudentRequest) -> Result<Student, RosterError> {
        info!("Creating student: roll_number={}", request.roll_number);

        let student = Student {
            id: Uuid::new_v4().to_string(),
            roll_number: required("Roll number", &request.roll_number)?,
            name: required("Name", &request.name)?,
            course: required("Course", &request.course)?,
            year: valid_year(request.year)?,
            section: required("Section", &request.section)?,
            image_url: request.image_url.filter(|url| !url.trim().is_empty()),
        };
        self.ensure_roll_number_free(&student.roll_number, None).await?;

        self.students.store_student(&student).await?;
        info!("Created student {} with ID {}", student.roll_number, student.id);
        Ok(student)
    }

    pub async fn update_student(
        &self,
        student_id: &str,
        request: UpdateStudentRequest,
    ) -> Result<Student, RosterError> {
        info!("Updating student: {}", student_id);
        let mut student = self.get_student(student_id).await?;

        if let Some(roll_number) = request.roll_number {
            student.roll_number = required("Roll number", &roll_number)?;
        }
        if let Some(name) = request.name {
            student.name = required("Name", &name)?;
        }
        if let Some(course) = request.course {
            student.course = required("Course", &course)?;
        }
        if let Some(year) = request.year {
            student.year = valid_year(year)?;
        }
        if let Some(section) = request.section {
            student.section = required("Section", &section)?;
        }
        if let Some(image_url) = request.image_url {
            student.image_url = Some(image_url).filter(|url| !url.trim().is_empty());
        }
        self.ensure_roll_number_free(&student.roll_number, Some(student_id))
            .await?;

        self.students.update_student(&student).await?;
        Ok(student)
    }

    pub async fn delete_student(&self, student_id: &str) -> Result<(), RosterError> {
        info!("Deleting student: {}", student_id);
        if !self.students.delete_student(student_id).await? {
            warn!("Student not found: {}", student_id);
            return Err(RosterError::StudentNotFound(student_id.to_string()));
        }
        Ok(())
    }

    pub async fn list_subjects(&self) -> Result<Vec<Subject>, RosterError> {
        Ok(self.subjects.list_subjects().await?)
    }

    pub async fn create_subject(&self, request: CreateSubjectRequest) -> Result<Subject, RosterError> {
        info!("Creating subject: code={}", request.code);

        let subject = Subject {
            id: Uuid::new_v4().to_string(),
            code: required("Code", &request.code)?,
            name: required("Name", &request.name)?,
            faculty_id: required("Faculty", &request.faculty_id)?,
            course_id: required("Course", &request.course_id)?,
        };
        self.ensure_code_free(&subject.code, None).await?;

        self.subjects.store_subject(&subject).await?;
        info!("Created subject {} with ID {}", subject.code, subject.id);
        Ok(subject)
    }

    pub async fn update_subject(
        &self,
        subject_id: &str,
        request: UpdateSubjectRequest,
    ) -> Result<Subject, RosterError> {
        info!("Updating subject: {}", subject_id);
        let mut subject = self
            .subjects
            .get_subject(subject_id)
            .await?
            .ok_or_else(|| RosterError::SubjectNotFound(subject_id.to_string()))?;

        if let Some(code) = request.code {
            subject.code = required("Code", &code)?;
        }
        if let Some(name) = request.name {
            subject.name = required("Name", &name)?;
        }
        if let Some(faculty_id) = request.faculty_id {
            subject.faculty_id = required("Faculty", &faculty_id)?;
        }
        if let Some(course_id) = request.course_id {
            subject.course_id = required("Course", &course_id)?;
        }
        self.ensure_code_free(&subject.code, Some(subject_id)).await?;

        self.subjects.update_subject(&subject).await?;
        Ok(subject)
    }

    pub async fn delete_subject(&self, subject_id: &str) -> Result<(), RosterError> {
        info!("Deleting subject: {}", subject_id);
        if !self.subjects.delete_subject(subject_id).await? {
            return Err(RosterError::SubjectNotFound(subject_id.to_string()));
        }
        Ok(())
    }

    async fn ensure_roll_number_free(
        &self,
        roll_number: &str,
        except_id: Option<&str>,
    ) -> Result<(), RosterError> {
        let taken = self
            .students
            .list_students()
            .await?
            .iter()
            .any(|s| s.roll_number == roll_number && Some(s.id.as_str()) != except_id);
        if taken {
            return Err(RosterError::DuplicateRollNumber(roll_number.to_string()));
        }
        Ok(())
    }

    async fn ensure_code_free(&self, code: &str, except_id: Option<&str>) -> Result<(), RosterError> {
        let taken = self
            .subjects
            .list_subjects()
            .await?
            .iter()
            .any(|s| s.code == code && Some(s.id.as_str()) != except_id);
        if taken {
            return Err(RosterError::DuplicateSubjectCode(code.to_string()));
        }
        Ok(())
    }
}
