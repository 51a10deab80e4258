//! Per-session draft of attendance marks for one (date, subject).

use shared::AttendanceStatus;
use std::collections::{BTreeMap, HashMap};

/// Student id → status. Students without an entry read as absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttendanceStore {
    statuses: HashMap<String, AttendanceStatus>,
}

impl AttendanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, student_id: &str) -> AttendanceStatus {
        self.statuses.get(student_id).copied().unwrap_or_default()
    }

    pub fn set(&mut self, student_id: &str, status: AttendanceStatus) {
        self.statuses.insert(student_id.to_string(), status);
    }

    pub fn replace_all(&mut self, statuses: HashMap<String, AttendanceStatus>) {
        self.statuses = statuses;
    }

    pub fn contains(&self, student_id: &str) -> bool {
        self.statuses.contains_key(student_id)
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    pub fn present_count(&self) -> usize {
        self.statuses.values().filter(|s| s.is_present()).count()
    }

    /// Ordered copy of the draft
    pub fn snapshot(&self) -> BTreeMap<String, AttendanceStatus> {
        self.statuses
            .iter()
            .map(|(id, status)| (id.clone(), *status))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_entries_read_absent() {
        let store = AttendanceStore::new();
        assert_eq!(store.get("nobody"), AttendanceStatus::Absent);
        assert!(store.is_empty());
    }

    #[test]
    fn test_replace_all_discards_previous_entries() {
        let mut store = AttendanceStore::new();
        store.set("A", AttendanceStatus::Present);

        let mut next = HashMap::new();
        next.insert("B".to_string(), AttendanceStatus::Absent);
        store.replace_all(next);

        assert!(!store.contains("A"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.present_count(), 0);
    }
}
