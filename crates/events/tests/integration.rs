//! Integration tests for events

#[cfg(test)]
mod tests {
    use abroot_errors::LockError;
    use abroot_events::*;

    #[tokio::test]
    async fn test_event_sender_emit() {
        let (tx, mut rx) = channel();

        tx.emit_error("test error");
        tx.emit_debug("test debug");

        let event1 = rx.recv().await.unwrap();
        assert!(matches!(event1, AppEvent::General(GeneralEvent::Error { .. })));

        let event2 = rx.recv().await.unwrap();
        assert!(matches!(
            event2,
            AppEvent::General(GeneralEvent::Debug { .. })
        ));
    }

    #[tokio::test]
    async fn test_dropped_receiver() {
        let (tx, rx) = channel();
        drop(rx);

        // Should not panic when receiver is dropped
        tx.emit_warning("ignored");
    }

    #[test]
    fn test_absent_sender_is_silent() {
        let sender: Option<EventSender> = None;
        sender.emit_warning("nobody listens");
    }

    #[test]
    fn test_deferred_unmount_is_a_warning() {
        let event = AppEvent::Overlay(OverlayEvent::UnmountDeferred {
            combiner: "/var/lib/abroot/overlay/combined".into(),
            message: "EBUSY".into(),
        });
        assert_eq!(event.log_level(), tracing::Level::WARN);
        assert_eq!(event.event_source(), EventSource::Overlay);
        assert!(event.meta().transaction_id.is_none());
    }

    #[test]
    fn test_transaction_events_carry_their_id() {
        let id = abroot_types::Uuid::new_v4();
        let event = AppEvent::Transaction(TransactionEvent::StepStarted {
            transaction_id: id,
            step: "merge overlay".into(),
        });
        let meta = event.meta();
        assert_eq!(meta.transaction_id, Some(id));
        assert_eq!(meta.source.as_str(), "transaction");
        assert_eq!(meta.level, EventLevel::Info);
    }

    #[test]
    fn test_failure_context_from_error() {
        let err = LockError::Stale {
            path: "/tmp/ABSystem.Upgrade.lock".into(),
            pid: Some(7),
            since: None,
        };
        let ctx = FailureContext::from_error(&err);
        assert_eq!(ctx.code.as_deref(), Some("lock.stale"));
        assert!(ctx.hint.is_some());
        assert!(!ctx.retryable);
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = AppEvent::Lock(LockEvent::Released {
            path: "/tmp/x.lock".into(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["domain"], "lock");
        assert_eq!(json["event"]["type"], "released");
    }
}
