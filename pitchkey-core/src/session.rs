//! # Recording Session Module
//!
//! Collects the strongest detected note over time while a session is active,
//! then hands the sequence to the key estimator when the session stops. The
//! capture side runs on the audio path, so the log's critical section is
//! limited to a single push.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::key::{estimate_key, KeyEstimate};
use crate::DetectedNote;

/// Key text reported when a session ends without any captured notes.
pub const NO_NOTES_RECORDED: &str = "No notes recorded";

#[derive(Default)]
struct SessionLog {
    notes: Vec<String>,
    last_note: String,
}

/// Note log for one recording pass.
///
/// `capture` is called from the audio path after each processed block;
/// `start` and `stop` belong to the host. All state is interior, so one
/// shared instance can serve both sides.
#[derive(Default)]
pub struct RecordingSession {
    recording: AtomicBool,
    log: Mutex<SessionLog>,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }

    /// Clears any previous log and begins capturing.
    pub fn start(&self) {
        let mut log = self.lock_log();
        log.notes.clear();
        log.last_note.clear();
        self.recording.store(true, Ordering::Release);
    }

    /// Appends the strongest note's name, skipping consecutive repeats so a
    /// held note lands in the log once. No-op unless a session is active or
    /// when no note is currently detected.
    pub fn capture(&self, notes: &[DetectedNote]) {
        if !self.recording.load(Ordering::Acquire) {
            return;
        }
        let Some(strongest) = notes.first() else {
            return;
        };

        let mut log = self.lock_log();
        if strongest.name != log.last_note {
            log.last_note.clone_from(&strongest.name);
            log.notes.push(strongest.name.clone());
        }
    }

    /// Ends capture, runs the key estimator once over the captured sequence,
    /// and returns the sequence together with the estimate. `None` means the
    /// log was empty.
    pub fn stop(&self) -> (Vec<String>, Option<KeyEstimate>) {
        self.recording.store(false, Ordering::Release);

        let notes = {
            let mut log = self.lock_log();
            log.last_note.clear();
            std::mem::take(&mut log.notes)
        };

        let estimate = estimate_key(&notes);
        (notes, estimate)
    }

    fn lock_log(&self) -> std::sync::MutexGuard<'_, SessionLog> {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Snapshot of a finished session, ready for JSON export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    /// Captured note names, in playing order.
    pub notes: Vec<String>,
    /// Estimated key, or the no-data sentinel.
    pub key: String,
}

impl SessionReport {
    pub fn new(notes: Vec<String>, estimate: Option<KeyEstimate>) -> Self {
        let key = match estimate {
            Some(estimate) => estimate.to_string(),
            None => NO_NOTES_RECORDED.to_string(),
        };
        Self { notes, key }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(name: &str, magnitude: f32) -> DetectedNote {
        DetectedNote {
            name: name.to_string(),
            frequency: 0.0,
            magnitude,
            midi_note: -1,
        }
    }

    #[test]
    fn capture_only_runs_while_recording() {
        let session = RecordingSession::new();
        session.capture(&[note("C", 0.5)]);
        let (notes, estimate) = session.stop();
        assert!(notes.is_empty());
        assert!(estimate.is_none());
    }

    #[test]
    fn consecutive_duplicates_are_collapsed() {
        let session = RecordingSession::new();
        session.start();
        session.capture(&[note("C", 0.5)]);
        session.capture(&[note("C", 0.6)]);
        session.capture(&[note("D", 0.5)]);
        session.capture(&[note("C", 0.5)]);

        let (notes, _) = session.stop();
        assert_eq!(notes, ["C", "D", "C"]);
    }

    #[test]
    fn only_the_strongest_note_is_logged() {
        let session = RecordingSession::new();
        session.start();
        session.capture(&[note("E", 0.9), note("C", 0.4)]);

        let (notes, _) = session.stop();
        assert_eq!(notes, ["E"]);
    }

    #[test]
    fn stop_estimates_the_key() {
        let session = RecordingSession::new();
        session.start();
        for name in ["C", "D", "E", "F", "G", "A", "B"] {
            session.capture(&[note(name, 0.5)]);
        }

        let (notes, estimate) = session.stop();
        assert_eq!(notes.len(), 7);
        assert_eq!(estimate.unwrap().to_string(), "C Major");
    }

    #[test]
    fn start_clears_the_previous_session() {
        let session = RecordingSession::new();
        session.start();
        session.capture(&[note("C", 0.5)]);
        session.stop();

        session.start();
        let (notes, estimate) = session.stop();
        assert!(notes.is_empty());
        assert!(estimate.is_none());
    }

    #[test]
    fn empty_session_reports_the_sentinel() {
        let report = SessionReport::new(Vec::new(), None);
        assert_eq!(report.key, NO_NOTES_RECORDED);
    }
}
