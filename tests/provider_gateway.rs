mod support;

use std::time::Duration;

use scheduled_messaging::{
    application::services::delivery::GatewayConfig,
    domain::{
        errors::DomainError,
        models::{DeliveryOutcome, DeliveryState, MessageKind, ProviderHealth, ProviderSlot},
    },
};

use support::{ScriptedProvider, Step, domestic, gateway, gateway_config};

const TEXT: &str = "Reminder: meeting at 3pm";

#[tokio::test]
async fn healthy_primary_handles_the_send() {
    let primary = ScriptedProvider::new("primary");
    let backup = ScriptedProvider::new("backup");
    let gateway = gateway(&primary, Some(&backup), gateway_config());

    let result = gateway
        .send_message(MessageKind::Text, &domestic(3), TEXT, "ACME")
        .await
        .unwrap();

    assert_eq!(result.status, DeliveryOutcome::Accepted);
    assert_eq!(result.provider, ProviderSlot::Primary);
    assert_eq!(result.accepted_count, 3);
    assert_eq!(result.rejected_count, 0);
    assert_eq!(result.provider_message_id.as_deref(), Some("primary-1"));
    assert_eq!(backup.sends(), 0);
}

#[tokio::test]
async fn transient_error_is_retried_once_on_the_same_backend() {
    let primary = ScriptedProvider::new("primary");
    primary.script([Step::Network]);
    let backup = ScriptedProvider::new("backup");
    let gateway = gateway(&primary, Some(&backup), gateway_config());

    let result = gateway
        .send_message(MessageKind::Text, &domestic(1), TEXT, "ACME")
        .await
        .unwrap();

    assert_eq!(result.provider, ProviderSlot::Primary);
    assert_eq!(primary.sends(), 2);
    assert_eq!(backup.sends(), 0);
}

#[tokio::test]
async fn exhausted_primary_fails_over_to_backup() {
    let primary = ScriptedProvider::new("primary");
    primary.always(Step::Timeout);
    let backup = ScriptedProvider::new("backup");
    let gateway = gateway(&primary, Some(&backup), gateway_config());

    let result = gateway
        .send_message(MessageKind::Text, &domestic(2), TEXT, "ACME")
        .await
        .unwrap();

    assert_eq!(result.provider, ProviderSlot::Backup);
    assert_eq!(result.status, DeliveryOutcome::Accepted);
    assert_eq!(primary.sends(), 2);
    assert_eq!(backup.sends(), 1);
}

#[tokio::test]
async fn server_errors_fail_over_without_internal_retry() {
    let primary = ScriptedProvider::new("primary");
    primary.always(Step::ServerError);
    let backup = ScriptedProvider::new("backup");
    let gateway = gateway(&primary, Some(&backup), gateway_config());

    let result = gateway
        .send_message(MessageKind::Voice, &domestic(1), TEXT, "ACME")
        .await
        .unwrap();

    assert_eq!(result.provider, ProviderSlot::Backup);
    assert_eq!(primary.sends(), 1);
}

#[tokio::test]
async fn stalled_provider_is_cut_off_by_the_timeout() {
    let primary = ScriptedProvider::new("primary");
    primary.always(Step::Hang);
    let backup = ScriptedProvider::new("backup");
    let gateway = gateway(
        &primary,
        Some(&backup),
        GatewayConfig {
            request_timeout: Duration::from_millis(50),
            ..gateway_config()
        },
    );

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        gateway.send_message(MessageKind::Text, &domestic(1), TEXT, "ACME"),
    )
    .await
    .expect("gateway must not hang")
    .unwrap();

    assert_eq!(result.provider, ProviderSlot::Backup);
}

#[tokio::test]
async fn both_backends_down_is_provider_unavailable() {
    let primary = ScriptedProvider::new("primary");
    primary.always(Step::Network);
    let backup = ScriptedProvider::new("backup");
    backup.always(Step::ServerError);
    let gateway = gateway(&primary, Some(&backup), gateway_config());

    let err = gateway
        .send_message(MessageKind::Text, &domestic(1), TEXT, "ACME")
        .await
        .unwrap_err();

    match err {
        DomainError::ProviderUnavailable(reason) => {
            assert!(reason.contains("primary"));
            assert!(reason.contains("backup"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn disabled_backup_is_never_tried() {
    let primary = ScriptedProvider::new("primary");
    primary.always(Step::Network);
    let backup = ScriptedProvider::new("backup");
    let gateway = gateway(
        &primary,
        Some(&backup),
        GatewayConfig {
            backup_enabled: false,
            ..gateway_config()
        },
    );

    let err = gateway
        .send_message(MessageKind::Text, &domestic(1), TEXT, "ACME")
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::ProviderUnavailable(_)));
    assert_eq!(backup.sends(), 0);
    assert_eq!(gateway.health_check().await.backup, ProviderHealth::Disabled);
}

#[tokio::test]
async fn rejected_request_does_not_fail_over() {
    let primary = ScriptedProvider::new("primary");
    primary.script([Step::Rejected]);
    let backup = ScriptedProvider::new("backup");
    let gateway = gateway(&primary, Some(&backup), gateway_config());

    let result = gateway
        .send_message(MessageKind::Text, &domestic(2), TEXT, "UNKNOWN")
        .await
        .unwrap();

    assert_eq!(result.status, DeliveryOutcome::Rejected);
    assert_eq!(result.accepted_count, 0);
    assert_eq!(result.rejected_count, 2);
    assert_eq!(primary.sends(), 1);
    assert_eq!(backup.sends(), 0);
}

#[tokio::test]
async fn per_recipient_rejections_make_a_partial_result() {
    let recipients = domestic(3);
    let primary = ScriptedProvider::new("primary");
    primary.script([Step::RejectSome(vec![recipients[1].clone()])]);
    let gateway = gateway(&primary, None, gateway_config());

    let result = gateway
        .send_message(MessageKind::Text, &recipients, TEXT, "ACME")
        .await
        .unwrap();

    assert_eq!(result.status, DeliveryOutcome::Partial);
    assert_eq!(result.accepted_count, 2);
    assert_eq!(result.rejected_count, 1);
    let accepted: Vec<&String> = result.accepted_recipients(&recipients).collect();
    assert_eq!(accepted, vec![&recipients[0], &recipients[2]]);
}

#[tokio::test]
async fn unhealthy_primary_is_routed_behind_backup() {
    let primary = ScriptedProvider::new("primary");
    primary.set_healthy(false);
    let backup = ScriptedProvider::new("backup");
    let gateway = gateway(&primary, Some(&backup), gateway_config());

    let health = gateway.health_check().await;
    assert_eq!(health.primary, ProviderHealth::Unhealthy);
    assert_eq!(health.backup, ProviderHealth::Healthy);

    let result = gateway
        .send_message(MessageKind::Text, &domestic(1), TEXT, "ACME")
        .await
        .unwrap();
    assert_eq!(result.provider, ProviderSlot::Backup);
    assert_eq!(primary.sends(), 0);
}

#[tokio::test]
async fn primary_is_preferred_again_once_healthy() {
    let primary = ScriptedProvider::new("primary");
    primary.set_healthy(false);
    let backup = ScriptedProvider::new("backup");
    let gateway = gateway(&primary, Some(&backup), gateway_config());
    gateway.health_check().await;

    primary.set_healthy(true);
    gateway.health_check().await;

    let result = gateway
        .send_message(MessageKind::Text, &domestic(1), TEXT, "ACME")
        .await
        .unwrap();
    assert_eq!(result.provider, ProviderSlot::Primary);
}

#[tokio::test]
async fn status_lookup_goes_to_the_accepting_backend() {
    let primary = ScriptedProvider::new("primary");
    let backup = ScriptedProvider::new("backup");
    let gateway = gateway(&primary, Some(&backup), gateway_config());

    let status = gateway
        .message_status(ProviderSlot::Backup, "backup-7")
        .await
        .unwrap();
    assert_eq!(status.provider, ProviderSlot::Backup);
    assert_eq!(status.state, DeliveryState::Delivered);
    assert_eq!(status.detail.as_deref(), Some("backup confirmed"));
}
