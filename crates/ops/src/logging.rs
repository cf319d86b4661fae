//! Structured logging integration for events
//!
//! Converts domain events into tracing records with structured fields and
//! installs the subscriber a front end uses.

use abroot_events::{
    AppEvent, EventReceiver, GuardEvent, LockEvent, OverlayEvent, TransactionEvent,
};
use tracing::{debug, error, info, trace, warn, Level};

/// Initialize tracing
///
/// `RUST_LOG` wins when set. Otherwise the filter is `info`, raised to
/// `debug` in verbose mode. JSON mode emits one JSON object per record.
pub fn init_tracing(json_mode: bool, verbose: bool) {
    let default_filter = if verbose {
        "info,abroot=debug,abroot_ops=debug"
    } else {
        "info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    // A subscriber may already be installed (tests, embedding front ends)
    let _ = if json_mode {
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .try_init()
    };
}

/// Log an `AppEvent` using the tracing infrastructure with structured fields
pub fn log_event_with_tracing(event: &AppEvent) {
    let meta = event.meta();
    let source = meta.source.as_str();
    let event_id = meta.event_id;

    match event {
        AppEvent::Transaction(TransactionEvent::Started {
            transaction_id,
            operation,
            dry_run,
        }) => {
            info!(source, %event_id, %transaction_id, operation = %operation, dry_run, "Transaction started");
        }
        AppEvent::Transaction(TransactionEvent::StepStarted {
            transaction_id,
            step,
        }) => {
            info!(source, %event_id, %transaction_id, step = %step, "Transaction step");
        }
        AppEvent::Transaction(TransactionEvent::Completed {
            transaction_id,
            duration_ms,
        }) => {
            info!(source, %event_id, %transaction_id, duration_ms, "Transaction completed");
        }
        AppEvent::Transaction(TransactionEvent::Failed {
            transaction_id,
            step,
            failure,
        }) => {
            error!(
                source,
                %event_id,
                %transaction_id,
                step = %step,
                code = ?failure.code,
                message = %failure.message,
                hint = ?failure.hint,
                "Transaction failed"
            );
        }
        AppEvent::Lock(LockEvent::StaleDetected { path, pid }) => {
            warn!(source, %event_id, path = %path, pid = ?pid, "Stale transaction lock");
        }
        AppEvent::Overlay(OverlayEvent::UnmountDeferred { combiner, message }) => {
            warn!(source, %event_id, combiner = %combiner, message = %message, "Combiner left mounted after merge");
        }
        AppEvent::Guard(GuardEvent::HealingFailed { path, failure }) => {
            error!(
                source,
                %event_id,
                path = %path,
                code = ?failure.code,
                message = %failure.message,
                "Skeleton repair failed"
            );
        }
        other => log_generic(other, source, event_id),
    }
}

/// Everything without dedicated fields is logged with its serialized form
fn log_generic(event: &AppEvent, source: &str, event_id: uuid::Uuid) {
    let fields = event.log_fields();
    match event.log_level() {
        Level::ERROR => error!(source, %event_id, fields = %fields, "event"),
        Level::WARN => warn!(source, %event_id, fields = %fields, "event"),
        Level::INFO => info!(source, %event_id, fields = %fields, "event"),
        Level::DEBUG => debug!(source, %event_id, fields = %fields, "event"),
        Level::TRACE => trace!(source, %event_id, fields = %fields, "event"),
    }
}

/// Spawn a task logging every event until all senders are dropped
#[must_use]
pub fn spawn_event_logger(mut rx: EventReceiver) -> tokio::task::JoinHandle<usize> {
    tokio::spawn(async move {
        let mut count = 0;
        while let Some(event) = rx.recv().await {
            log_event_with_tracing(&event);
            count += 1;
        }
        count
    })
}
