use std::time::Duration;

use library::LibraryError;
use tracing::{info, warn};

use crate::state::{AppState, LastScan};

/// Starts a scan on a blocking task without waiting for it. Returns false
/// when a scan is already running.
pub fn start_scan(state: &AppState, trigger: &'static str) -> bool {
    if state.scanner.is_scanning() {
        info!("Scan already in progress; {} trigger ignored", trigger);
        return false;
    }

    let state = state.clone();
    tokio::spawn(async move {
        let scanner = state.scanner.clone();
        let result = tokio::task::spawn_blocking(move || scanner.start()).await;
        match result {
            Ok(Ok(summary)) => {
                *state.last_scan.write() = LastScan::Finished(summary);
            }
            Ok(Err(LibraryError::AlreadyScanning)) => {
                info!("Scan already in progress; {} trigger ignored", trigger);
            }
            Ok(Err(err)) => {
                let message = err.to_string();
                warn!("Scan failed: {}", message);
                *state.last_scan.write() = LastScan::Failed(message);
            }
            Err(err) => {
                let message = err.to_string();
                warn!("Scan task join error: {}", message);
                *state.last_scan.write() = LastScan::Failed(message);
            }
        }
    });
    true
}

/// Attempts a scan every `minutes`. A tick that finds a scan running is
/// dropped, never queued.
pub fn spawn_scan_timer(state: AppState, minutes: u64) {
    if minutes == 0 {
        return;
    }
    info!("Scanning every {} minutes", minutes);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(minutes * 60));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // the first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            start_scan(&state, "timer");
        }
    });
}
