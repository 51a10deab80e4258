//! Demo roster loaded into an empty store when `storage.seed_demo_data` is set.

use anyhow::Result;
use shared::{Student, Subject};
use tracing::info;

use super::traits::{StudentStorage, SubjectStorage};

const DEMO_STUDENTS: [(&str, &str, &str); 10] = [
    ("O19CS001", "Arun Kumar", "A"),
    ("O19CS002", "Priya Singh", "A"),
    ("O19CS003", "Rahul Sharma", "A"),
    ("O19CS004", "Nisha Patel", "A"),
    ("O19CS005", "Vikram Mehra", "A"),
    ("O19CS006", "Anjali Desai", "A"),
    ("O19CS007", "Sanjay Gupta", "A"),
    ("O19CS008", "Kavita Reddy", "A"),
    ("O19CS009", "Rohan Kapoor", "B"),
    ("O19CS010", "Meera Rajput", "B"),
];

// (code, name, faculty id)
const DEMO_SUBJECTS: [(&str, &str, &str); 4] = [
    ("CS201", "Data Structures", "2"),
    ("CS301", "Database Systems", "1"),
    ("CS302", "Computer Networks", "2"),
    ("CS401", "Artificial Intelligence", "1"),
];

pub fn demo_students() -> Vec<Student> {
    DEMO_STUDENTS
        .iter()
        .enumerate()
        .map(|(index, (roll_number, name, section))| Student {
            id: (index + 1).to_string(),
            roll_number: roll_number.to_string(),
            name: name.to_string(),
            course: "B.Tech".to_string(),
            year: 3,
            section: section.to_string(),
            image_url: None,
        })
        .collect()
}

pub fn demo_subjects() -> Vec<Subject> {
    DEMO_SUBJECTS
        .iter()
        .enumerate()
        .map(|(index, (code, name, faculty_id))| Subject {
            id: (index + 1).to_string(),
            code: code.to_string(),
            name: name.to_string(),
            faculty_id: faculty_id.to_string(),
            course_id: "1".to_string(),
        })
        .collect()
}

/// Insert the demo roster if no students and no subjects exist yet.
/// Returns true when anything was inserted.
pub async fn seed_demo_data(
    students: &dyn StudentStorage,
    subjects: &dyn SubjectStorage,
) -> Result<bool> {
    if !students.list_students().await?.is_empty() || !subjects.list_subjects().await?.is_empty() {
        info!("Roster already populated, skipping demo data");
        return Ok(false);
    }

    for student in demo_students() {
        students.store_student(&student).await?;
    }
    for subject in demo_subjects() {
        subjects.store_subject(&subject).await?;
    }
    info!(
        "Seeded demo roster: {} students, {} subjects",
        DEMO_STUDENTS.len(),
        DEMO_SUBJECTS.len()
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::change_feed::BroadcastChangeFeed;
    use crate::storage::memory::InMemoryStorage;

    #[tokio::test]
    async fn test_seed_only_into_empty_store() {
        let storage = InMemoryStorage::new(BroadcastChangeFeed::new());

        assert!(seed_demo_data(&storage, &storage).await.unwrap());
        assert!(!seed_demo_data(&storage, &storage).await.unwrap());

        let students = storage.list_students().await.unwrap();
        assert_eq!(students.len(), 10);
        assert_eq!(students[0].roll_number, "O19CS001");
        assert_eq!(storage.list_subjects().await.unwrap().len(), 4);
    }
}
