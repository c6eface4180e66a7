//! Prometheus metrics for the coordinator
//!
//! Call `init_metrics()` at process startup to register all metrics. If
//! initialization never ran (library use, unit tests) every recording
//! helper is a no-op, so instrumented code needs no feature gating.

use prometheus::{register_counter, register_gauge, Counter, Encoder, Gauge, TextEncoder};
use std::sync::OnceLock;

/// Container for all coordinator metrics
struct CoordinatorMetrics {
    tasks_enqueued: Counter,
    tasks_assigned: Counter,
    tasks_completed: Counter,
    tasks_failed: Counter,
    heartbeats: Counter,
    heartbeat_errors: Counter,
    registered_workers: Gauge,
}

/// Registered exactly once per process; `None` when registration failed
static METRICS: OnceLock<Option<CoordinatorMetrics>> = OnceLock::new();

fn register_all() -> Result<CoordinatorMetrics, prometheus::Error> {
    Ok(CoordinatorMetrics {
        tasks_enqueued: register_counter!(
            "fetchq_tasks_enqueued_total",
            "Total tasks added to the pending set"
        )?,
        tasks_assigned: register_counter!(
            "fetchq_tasks_assigned_total",
            "Total tasks handed to workers"
        )?,
        tasks_completed: register_counter!(
            "fetchq_tasks_completed_total",
            "Total tasks finished successfully"
        )?,
        tasks_failed: register_counter!(
            "fetchq_tasks_failed_total",
            "Total tasks finished with an error"
        )?,
        heartbeats: register_counter!(
            "fetchq_heartbeats_total",
            "Total heartbeats accepted"
        )?,
        heartbeat_errors: register_counter!(
            "fetchq_heartbeat_errors_total",
            "Total heartbeats rejected"
        )?,
        registered_workers: register_gauge!(
            "fetchq_registered_workers",
            "Number of registered workers"
        )?,
    })
}

/// Register all Prometheus metrics
///
/// Safe to call more than once; only the first call registers. If that
/// registration fails, every later call reports the failure and all
/// recording helpers stay no-ops.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let mut first_error = None;
    METRICS.get_or_init(|| match register_all() {
        Ok(metrics) => Some(metrics),
        Err(e) => {
            first_error = Some(e);
            None
        }
    });

    match first_error {
        Some(e) => Err(e),
        None if metrics().is_none() => Err(prometheus::Error::Msg(
            "metrics registration failed at startup".to_string(),
        )),
        None => Ok(()),
    }
}

fn metrics() -> Option<&'static CoordinatorMetrics> {
    METRICS.get().and_then(|m| m.as_ref())
}

pub fn record_task_enqueued() {
    if let Some(m) = metrics() {
        m.tasks_enqueued.inc();
    }
}

pub fn record_task_assigned() {
    if let Some(m) = metrics() {
        m.tasks_assigned.inc();
    }
}

pub fn record_task_completed() {
    if let Some(m) = metrics() {
        m.tasks_completed.inc();
    }
}

pub fn record_task_failed() {
    if let Some(m) = metrics() {
        m.tasks_failed.inc();
    }
}

pub fn record_heartbeat() {
    if let Some(m) = metrics() {
        m.heartbeats.inc();
    }
}

pub fn record_heartbeat_error() {
    if let Some(m) = metrics() {
        m.heartbeat_errors.inc();
    }
}

pub fn set_registered_workers(count: usize) {
    if let Some(m) = metrics() {
        m.registered_workers.set(count as f64);
    }
}

/// Encode all registered metrics in the Prometheus text format
pub fn encode_metrics() -> String {
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
