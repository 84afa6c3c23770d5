//! # PitchKey - console note and key detector
//!
//! This binary wires the headless detector core to a live microphone and a
//! minimal console interface.
//!
//! ## Architecture
//! - **Audio thread**: cpal stream callback forwarding sample blocks
//! - **Main thread**: analysis loop driving the detector and console output
//! - **Stdin thread**: line-based commands (record/stop, save, quit)
//! - **Communication**: crossbeam channels for thread-safe data exchange

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, unbounded, Receiver};
use pitchkey_core::audio;
use pitchkey_core::detector::{DetectorConfig, NoteDetector};
use pitchkey_core::monophonic::MonophonicDetector;
use pitchkey_core::polyphonic::PolyphonicDetector;
use pitchkey_core::session::{RecordingSession, SessionReport};
use pitchkey_core::DetectedNote;
use std::io::BufRead;
use std::thread;

/// Where `s` writes the last finished session.
const REPORT_PATH: &str = "pitchkey-session.json";

/// Queue depth for audio blocks in flight; late blocks are dropped by the
/// capture side rather than stalling the callback.
const AUDIO_QUEUE_BLOCKS: usize = 32;

/// Nominal host block size handed to the detector at preparation time.
const EXPECTED_BLOCK_SIZE: usize = 512;

fn main() -> Result<()> {
    env_logger::init();

    let polyphonic = std::env::args().any(|arg| arg == "--poly");

    let (audio_tx, audio_rx) = bounded::<Vec<f32>>(AUDIO_QUEUE_BLOCKS);
    let (stream, sample_rate) =
        audio::start_capture(audio_tx).context("failed to start audio capture")?;

    let mut detector: Box<dyn NoteDetector> = if polyphonic {
        println!("PitchKey - polyphonic mode (up to 4 simultaneous notes)");
        Box::new(PolyphonicDetector::new(DetectorConfig::default()))
    } else {
        println!("PitchKey - monophonic mode");
        Box::new(MonophonicDetector::new(DetectorConfig::default()))
    };
    detector.prepare(sample_rate as f32, EXPECTED_BLOCK_SIZE);

    let session = RecordingSession::new();
    let commands = spawn_stdin_reader();

    println!("Commands: r = start/stop recording, s = save last session, q = quit");

    let mut last_report: Option<SessionReport> = None;
    let mut last_display = String::new();

    loop {
        crossbeam_channel::select! {
            recv(audio_rx) -> block => {
                let Ok(block) = block else {
                    log::warn!("audio stream channel closed");
                    break;
                };
                detector.process_block(&block);
                let notes = detector.detected_notes();
                session.capture(&notes);
                print_notes(&notes, &mut last_display);
            }
            recv(commands) -> line => {
                let Ok(line) = line else { break };
                match line.trim() {
                    "r" => {
                        if session.is_recording() {
                            let (notes, estimate) = session.stop();
                            let report = SessionReport::new(notes, estimate);
                            println!(
                                "Recorded {} notes: {}",
                                report.notes.len(),
                                report.notes.join(" ")
                            );
                            println!("Estimated key: {}", report.key);
                            last_report = Some(report);
                        } else {
                            session.start();
                            println!("Recording... press r again to stop.");
                        }
                    }
                    "s" => save_report(last_report.as_ref())?,
                    "q" => break,
                    "" => {}
                    other => println!("Unknown command: {other}"),
                }
            }
        }
    }

    drop(stream);
    Ok(())
}

/// Prints the detected note list whenever it changes.
fn print_notes(notes: &[DetectedNote], last_display: &mut String) {
    let display = if notes.is_empty() {
        String::new()
    } else {
        notes
            .iter()
            .map(|note| format!("{} ({:.1} Hz)", note.name, note.frequency))
            .collect::<Vec<_>>()
            .join("  ")
    };

    if display != *last_display {
        if display.is_empty() {
            println!("-");
        } else {
            println!("{display}");
        }
        *last_display = display;
    }
}

/// Writes the last finished session to disk as JSON.
fn save_report(report: Option<&SessionReport>) -> Result<()> {
    match report {
        Some(report) => {
            let json = serde_json::to_string_pretty(report)?;
            std::fs::write(REPORT_PATH, json)
                .with_context(|| format!("failed to write {REPORT_PATH}"))?;
            println!("Session saved to {REPORT_PATH}");
        }
        None => println!("No finished session to save yet."),
    }
    Ok(())
}

/// Forwards stdin lines to the main loop without blocking it.
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = unbounded();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}
