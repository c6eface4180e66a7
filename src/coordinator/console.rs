//! Interactive console for the coordinator process
//!
//! A line-oriented command interface on stdin, serving as the task
//! submission entry point while the server runs:
//!
//! ```text
//! > add https://example.com 5
//! > status
//! > workers
//! ```

use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::coordinator::server::SharedState;
use crate::metrics;

/// Run the console until stdin closes or shutdown is signaled
pub async fn run_console(state: SharedState, mut shutdown_rx: tokio::sync::watch::Receiver<bool>) {
    println!("Command interface ready. Type 'help' for available commands.");

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        let line = tokio::select! {
            _ = shutdown_rx.changed() => break,
            line = lines.next_line() => line,
        };

        match line {
            Ok(Some(line)) => handle_command(&state, line.trim()).await,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "console read failed");
                break;
            }
        }
    }
}

async fn handle_command(state: &SharedState, line: &str) {
    if line.is_empty() {
        return;
    }

    let mut parts = line.splitn(3, ' ');
    match parts.next() {
        Some("add") => {
            let Some(raw_url) = parts.next() else {
                println!("Usage: add <url> [priority]");
                return;
            };

            if url::Url::parse(raw_url).is_err() {
                println!("Not a valid URL: {raw_url}");
                return;
            }

            let priority = match parts.next() {
                Some(raw) => match raw.trim().parse::<i32>() {
                    Ok(p) => p,
                    Err(_) => {
                        println!("Priority must be an integer, got '{raw}'");
                        return;
                    }
                },
                None => 5,
            };

            let id = {
                let mut guard = state.lock().await;
                guard.queue.enqueue(raw_url, priority)
            };
            metrics::record_task_enqueued();
            println!("Added task {id} for URL {raw_url} with priority {priority}");
        }

        Some("status") => {
            let stats = state.lock().await.queue.stats();
            println!(
                "Status: {} pending, {} active, {} completed, {} failed",
                stats.pending, stats.active, stats.completed, stats.failed
            );
        }

        Some("workers") => {
            let guard = state.lock().await;
            if guard.registry.is_empty() {
                println!("No workers registered");
            }
            let now = Utc::now();
            for record in guard.registry.records() {
                let last_seen = (now - record.last_heartbeat).num_seconds();
                println!(
                    "Worker {}: status={}, last seen {last_seen}s ago",
                    record.worker_id,
                    record.status.as_str()
                );
            }
        }

        Some("help") => {
            println!("Available commands:");
            println!("  add <url> [priority] - Queue a URL to fetch (priority defaults to 5)");
            println!("  status               - Show task counts per category");
            println!("  workers              - List registered workers");
            println!("  help                 - Show this help");
        }

        _ => {
            println!("Unknown command. Type 'help' for available commands.");
        }
    }
}
