mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{fixture, fixture_with, request, test_config, RecordingMailer};
use ticketlelo_server::models::{BatchPatch, EventPatch, TicketStatus};
use ticketlelo_server::services::IssueError;
use ticketlelo_server::store::{CatalogStore, RegistrationStore};
use uuid::Uuid;

async fn wait_for_sends(mailer: &RecordingMailer, expected: usize) {
    for _ in 0..50 {
        if mailer.sent() >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_issue_stores_unused_ticket() {
    let fx = fixture().await;
    let registration = fx
        .state
        .issuer
        .issue(request(&fx, "  Alice Okafor ", " Alice@Example.COM "))
        .await
        .unwrap();

    assert_eq!(registration.status, TicketStatus::Unused);
    assert!(registration.used_at.is_none());
    assert_eq!(registration.full_name, "Alice Okafor");
    assert_eq!(registration.email, "alice@example.com");
    assert!(registration.ticket_id.as_str().starts_with("TKT-"));

    let stored = fx
        .store
        .find_by_ticket_id(&registration.ticket_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.id, registration.id);

    wait_for_sends(&fx.mailer, 1).await;
    assert_eq!(fx.mailer.sent(), 1);
}

#[tokio::test]
async fn test_sequential_duplicate_is_rejected() {
    let fx = fixture().await;
    fx.state
        .issuer
        .issue(request(&fx, "Alice", "alice@example.com"))
        .await
        .unwrap();

    let second = fx
        .state
        .issuer
        .issue(request(&fx, "Alice Again", "ALICE@example.com"))
        .await;
    assert!(matches!(second, Err(IssueError::DuplicateRegistration)));

    let stored = fx.store.list_by_event(fx.event.id).await.unwrap();
    assert_eq!(stored.len(), 1);
}

/// The duplicate check and the insert are separate store calls, so concurrent
/// submissions for the same attendee may both succeed. This records the race
/// rather than asserting it cannot happen.
#[tokio::test]
async fn test_concurrent_duplicates_are_a_known_race() {
    let fx = fixture().await;
    let issuer = Arc::clone(&fx.state.issuer);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let issuer = Arc::clone(&issuer);
            let request = request(&fx, "Racer", "racer@example.com");
            tokio::spawn(async move { issuer.issue(request).await })
        })
        .collect();

    let mut issued = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => issued += 1,
            Err(IssueError::DuplicateRegistration) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert!(issued >= 1);
    let stored = fx.store.list_by_event(fx.event.id).await.unwrap();
    assert_eq!(stored.len(), issued);
}

/// `total_tickets` is informational; issuance past it still succeeds.
#[tokio::test]
async fn test_capacity_is_not_enforced() {
    let fx = fixture().await;
    assert_eq!(fx.event.total_tickets, 2);

    for i in 0..3 {
        fx.state
            .issuer
            .issue(request(&fx, "Guest", &format!("guest{i}@example.com")))
            .await
            .unwrap();
    }

    let stored = fx.store.list_by_event(fx.event.id).await.unwrap();
    assert_eq!(stored.len(), 3);
}

#[tokio::test]
async fn test_delivery_failure_does_not_fail_issuance() {
    let fx = fixture_with(RecordingMailer::failing(), test_config()).await;

    let registration = fx
        .state
        .issuer
        .issue(request(&fx, "Efe", "efe@example.com"))
        .await
        .unwrap();
    wait_for_sends(&fx.mailer, 1).await;

    assert_eq!(fx.mailer.sent(), 1);
    let stored = fx
        .store
        .find_by_ticket_id(&registration.ticket_id)
        .await
        .unwrap();
    assert!(stored.is_some());
}

#[tokio::test]
async fn test_redeliver_reports_delivery_failure_without_changing_ticket() {
    let fx = fixture_with(RecordingMailer::failing(), test_config()).await;
    let registration = fx
        .state
        .issuer
        .issue(request(&fx, "Femi", "femi@example.com"))
        .await
        .unwrap();

    let result = fx.state.issuer.redeliver(&registration.ticket_id).await;
    assert!(result.is_err());

    let stored = fx
        .store
        .find_by_ticket_id(&registration.ticket_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, TicketStatus::Unused);
}

#[tokio::test]
async fn test_unknown_event_or_batch_is_rejected() {
    let fx = fixture().await;

    let mut missing_event = request(&fx, "Gbenga", "gbenga@example.com");
    missing_event.event_id = Uuid::new_v4().to_string();
    assert!(matches!(
        fx.state.issuer.issue(missing_event).await,
        Err(IssueError::EventNotFound(_))
    ));

    let mut garbage_event = request(&fx, "Gbenga", "gbenga@example.com");
    garbage_event.event_id = "not-a-uuid".to_string();
    assert!(matches!(
        fx.state.issuer.issue(garbage_event).await,
        Err(IssueError::EventNotFound(_))
    ));

    let mut missing_batch = request(&fx, "Gbenga", "gbenga@example.com");
    missing_batch.batch_id = Uuid::new_v4().to_string();
    assert!(matches!(
        fx.state.issuer.issue(missing_batch).await,
        Err(IssueError::BatchNotFound(_))
    ));

    assert!(fx.store.list_by_event(fx.event.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_form_is_rejected_before_any_write() {
    let fx = fixture().await;

    let mut bad = request(&fx, "H", "not-an-email");
    bad.phone = "123".to_string();
    match fx.state.issuer.issue(bad).await {
        Err(IssueError::Validation(errors)) => {
            let fields = errors.field_errors();
            assert!(fields.contains_key("full_name"));
            assert!(fields.contains_key("email"));
            assert!(fields.contains_key("phone"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }

    assert!(fx.store.list_by_event(fx.event.id).await.unwrap().is_empty());
    assert_eq!(fx.mailer.sent(), 0);
}

#[tokio::test]
async fn test_inactive_event_or_batch_is_closed_for_registration() {
    let fx = fixture().await;

    fx.store
        .update_event(
            fx.event.id,
            EventPatch {
                is_active: Some(false),
                ..EventPatch::default()
            },
        )
        .await
        .unwrap();
    assert!(matches!(
        fx.state
            .issuer
            .issue(request(&fx, "Ifeoma", "ifeoma@example.com"))
            .await,
        Err(IssueError::EventNotFound(_))
    ));

    fx.store
        .update_event(
            fx.event.id,
            EventPatch {
                is_active: Some(true),
                ..EventPatch::default()
            },
        )
        .await
        .unwrap();
    fx.store
        .update_batch(
            fx.batch.id,
            BatchPatch {
                is_active: Some(false),
                ..BatchPatch::default()
            },
        )
        .await
        .unwrap();
    assert!(matches!(
        fx.state
            .issuer
            .issue(request(&fx, "Ifeoma", "ifeoma@example.com"))
            .await,
        Err(IssueError::BatchNotFound(_))
    ));

    assert!(fx.store.list_by_event(fx.event.id).await.unwrap().is_empty());
}
