//! # Reconciliation
//!
//! Builds the attendance draft for one (date, subject) from three inputs:
//! the records already stored, clicks made on this screen and changes pushed
//! by other clients.
//!
//! ## Precedence
//!
//! 1. Selecting (date, subject) seeds every roster student as absent.
//! 2. Stored records overlay the seed, except for students already touched
//!    by a click or a push since the seed.
//! 3. A click overwrites whatever is held.
//! 4. A push for the active date and subject overwrites whatever is held,
//!    including a click that has not been saved yet. Under
//!    [`ConflictPolicy::KeepUnsavedLocal`] the unsaved click is kept instead.
//!
//! Later arrival wins; timestamps carried by the data are never compared.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use shared::{AttendanceChangeEvent, AttendanceStatus, StudentStatus};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

use super::attendance_store::AttendanceStore;

/// What to do when a pushed change hits a student with an unsaved click
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    #[default]
    LastArrivalWins,
    KeepUnsavedLocal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AttendanceCounts {
    pub present: usize,
    pub absent: usize,
}

impl AttendanceCounts {
    pub fn total(&self) -> usize {
        self.present + self.absent
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemoteOutcome {
    Applied {
        student_id: String,
        status: AttendanceStatus,
    },
    OtherDate,
    OtherSubject,
    UnknownStudent,
    KeptLocal,
}

#[derive(Debug, Clone)]
pub struct Reconciler {
    date: NaiveDate,
    subject_id: String,
    policy: ConflictPolicy,
    roster: Vec<String>,
    known: HashSet<String>,
    draft: AttendanceStore,
    // Students set by a click or push since the seed
    touched: HashSet<String>,
    unsaved_local: HashSet<String>,
    counts: AttendanceCounts,
}

impl Reconciler {
    /// Seed every roster student as absent for (date, subject)
    pub fn new<I, S>(date: NaiveDate, subject_id: &str, roster: I, policy: ConflictPolicy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ordered = Vec::new();
        let mut known = HashSet::new();
        for id in roster {
            let id = id.into();
            if known.insert(id.clone()) {
                ordered.push(id);
            }
        }

        let seed: HashMap<String, AttendanceStatus> = ordered
            .iter()
            .map(|id| (id.clone(), AttendanceStatus::Absent))
            .collect();
        let mut draft = AttendanceStore::new();
        draft.replace_all(seed);

        let mut reconciler = Self {
            date,
            subject_id: subject_id.to_string(),
            policy,
            roster: ordered,
            known,
            draft,
            touched: HashSet::new(),
            unsaved_local: HashSet::new(),
            counts: AttendanceCounts::default(),
        };
        reconciler.recount();
        reconciler
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    pub fn is_known(&self, student_id: &str) -> bool {
        self.known.contains(student_id)
    }

    pub fn get(&self, student_id: &str) -> AttendanceStatus {
        self.draft.get(student_id)
    }

    pub fn counts(&self) -> AttendanceCounts {
        self.counts
    }

    pub fn snapshot(&self) -> BTreeMap<String, AttendanceStatus> {
        self.draft.snapshot()
    }

    /// True when a click has not been saved yet
    pub fn has_unsaved_changes(&self) -> bool {
        !self.unsaved_local.is_empty()
    }

    /// Overlay stored records. Returns how many students took a stored value.
    pub fn overlay_existing(&mut self, existing: &HashMap<String, AttendanceStatus>) -> usize {
        let mut applied = 0;
        for (student_id, status) in existing {
            if !self.known.contains(student_id) {
                debug!("Ignoring stored record for unknown student {}", student_id);
                continue;
            }
            if self.touched.contains(student_id) {
                debug!("Stored record for {} is older than a newer edit", student_id);
                continue;
            }
            self.draft.set(student_id, *status);
            applied += 1;
        }
        self.recount();
        applied
    }

    /// Record a click. Returns false for students outside the roster.
    pub fn apply_local(&mut self, student_id: &str, status: AttendanceStatus) -> bool {
        if !self.known.contains(student_id) {
            return false;
        }
        self.draft.set(student_id, status);
        self.touched.insert(student_id.to_string());
        self.unsaved_local.insert(student_id.to_string());
        self.recount();
        true
    }

    /// Apply a change pushed for `subject_id`
    pub fn apply_remote(&mut self, subject_id: &str, event: &AttendanceChangeEvent) -> RemoteOutcome {
        if subject_id != self.subject_id {
            return RemoteOutcome::OtherSubject;
        }
        if event.date != self.date {
            return RemoteOutcome::OtherDate;
        }
        if !self.known.contains(&event.student_id) {
            return RemoteOutcome::UnknownStudent;
        }
        if self.policy == ConflictPolicy::KeepUnsavedLocal
            && self.unsaved_local.contains(&event.student_id)
        {
            return RemoteOutcome::KeptLocal;
        }

        self.draft.set(&event.student_id, event.status);
        self.touched.insert(event.student_id.clone());
        self.unsaved_local.remove(&event.student_id);
        self.recount();
        RemoteOutcome::Applied {
            student_id: event.student_id.clone(),
            status: event.status,
        }
    }

    /// One status per roster student, in roster order
    pub fn statuses_for_save(&self) -> Vec<StudentStatus> {
        self.roster
            .iter()
            .map(|id| StudentStatus {
                student_id: id.clone(),
                status: self.draft.get(id),
            })
            .collect()
    }

    pub fn mark_saved(&mut self) {
        self.unsaved_local.clear();
    }

    fn recount(&mut self) {
        let present = self.draft.present_count();
        self.counts = AttendanceCounts {
            present,
            absent: self.draft.len() - present,
        };
    }
}
