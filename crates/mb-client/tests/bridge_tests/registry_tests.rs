//! Registry reconciliation and reload tests

use super::common::*;
use mb_types::{BridgeError, ToolKey};
use std::time::Duration;

#[tokio::test]
async fn test_set_disabled_servers_converges_and_is_idempotent() {
    let companion = CompanionMock::start().await;
    companion.mock_set_disabled_servers_ok().await;
    companion
        .mock_list_servers(&[stdio_entry("a", true, &[]), stdio_entry("b", true, &[])])
        .await;
    // Exactly one start for "a" across both passes; "b" is never started.
    companion.mock_start_expect("a", 1).await;
    companion.mock_list_tools("a", &["t"]).await;

    let (service, host) = service_with_host(&companion);

    service
        .registry()
        .set_disabled_servers(&["b".to_string()])
        .await
        .unwrap();
    assert!(service.manager().is_connected("a"));
    assert!(!service.manager().is_connected("b"));

    // Second application with the same input performs no extra work.
    service
        .registry()
        .set_disabled_servers(&["b".to_string()])
        .await
        .unwrap();
    assert!(service.manager().is_connected("a"));
    assert_eq!(host.registered_keys(), vec![ToolKey::new("a", "t")]);
}

#[tokio::test]
async fn test_disabling_a_connected_server_disconnects_it() {
    let companion = CompanionMock::start().await;
    companion.mock_start("a", 200).await;
    companion.mock_list_tools("a", &["t"]).await;
    companion.mock_stop("a", 200).await;
    companion.mock_set_disabled_servers_ok().await;
    companion.mock_list_servers(&[stdio_entry("a", true, &[])]).await;

    let (service, host) = service_with_host(&companion);
    service
        .connect_and_register(&stdio_config("a"), &[])
        .await
        .unwrap();

    service
        .registry()
        .set_disabled_servers(&["a".to_string()])
        .await
        .unwrap();

    assert!(!service.manager().is_connected("a"));
    assert!(host.registered_keys().is_empty());
}

#[tokio::test]
async fn test_delete_tears_down_an_in_flight_connect() {
    let companion = CompanionMock::start().await;
    companion.mock_start_delayed("slow", 200).await;
    companion.mock_stop("slow", 200).await;
    companion.mock_delete_ok("slow").await;

    let (service, _host) = service_with_host(&companion);
    let manager = service.manager().clone();
    let config = stdio_config("slow");

    let connect = tokio::spawn(async move { manager.connect(&config).await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Delete while the connect is still opening: the connection entry is
    // claimed, so the deleted server can never surface as Connected.
    service.registry().delete("slow").await.unwrap();

    assert!(connect.await.unwrap().is_err());
    assert!(!service.manager().is_connected("slow"));
    assert!(service.manager().transport("slow").is_none());
}

#[tokio::test]
async fn test_set_disabled_servers_collects_per_server_failures() {
    let companion = CompanionMock::start().await;
    companion.mock_set_disabled_servers_ok().await;
    companion
        .mock_list_servers(&[stdio_entry("a", true, &[]), stdio_entry("b", true, &[])])
        .await;
    companion.mock_start("a", 200).await;
    companion.mock_list_tools("a", &["t"]).await;
    companion.mock_start("b", 500).await;

    let (service, _host) = service_with_host(&companion);

    let result = service.registry().set_disabled_servers(&[]).await;
    match result {
        Err(BridgeError::Aggregate(failures)) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].server, "b");
        }
        other => panic!("expected aggregate error, got {other:?}"),
    }

    // The healthy server still came up.
    assert!(service.manager().is_connected("a"));
    assert!(!service.manager().is_connected("b"));
}

#[tokio::test]
async fn test_feature_disabled_connects_nothing() {
    let companion = CompanionMock::start().await;
    companion.mock_set_disabled_servers_ok().await;
    companion.mock_list_servers(&[stdio_entry("a", true, &[])]).await;
    companion.mock_start_expect("a", 0).await;

    let (service, _host) = service_with_host(&companion);
    service.set_feature_enabled(false);

    service.registry().set_disabled_servers(&[]).await.unwrap();
    assert!(!service.manager().is_connected("a"));
}

#[tokio::test]
async fn test_set_disabled_tools_persists_then_applies_diff() {
    let companion = CompanionMock::start().await;
    companion.mock_start("srv", 200).await;
    companion.mock_list_tools("srv", &["a", "b"]).await;
    companion.mock_set_disabled_tools_ok("srv").await;

    let (service, host) = service_with_host(&companion);
    service
        .connect_and_register(&stdio_config("srv"), &[])
        .await
        .unwrap();
    assert_eq!(service.cache().registered_count("srv"), 2);

    service
        .registry()
        .set_disabled_tools("srv", &["a".to_string()])
        .await
        .unwrap();

    assert_eq!(host.registered_keys(), vec![ToolKey::new("srv", "b")]);
    assert_eq!(
        host.events().last().unwrap(),
        &HostEvent::Unregister(ToolKey::new("srv", "a")),
        "only the flipped tool produced a host call"
    );
}

#[tokio::test]
async fn test_reload_all_registers_new_tools_and_aggregates_failures() {
    let companion = CompanionMock::start().await;
    companion.mock_start("grows", 200).await;
    companion.mock_start("broken", 200).await;
    // First listing has one tool; the post-reload listing has two.
    companion.mock_list_tools_once("grows", &["a"]).await;
    companion.mock_list_tools("grows", &["a", "b"]).await;
    companion.mock_list_tools("broken", &["x"]).await;
    companion.mock_reload("grows", 200).await;
    companion.mock_reload("broken", 500).await;

    let (service, host) = service_with_host(&companion);
    service
        .connect_and_register(&stdio_config("grows"), &[])
        .await
        .unwrap();
    service
        .connect_and_register(&stdio_config("broken"), &[])
        .await
        .unwrap();

    let result = service.reload_all().await;
    match result {
        Err(BridgeError::Aggregate(failures)) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].server, "broken");
        }
        other => panic!("expected aggregate error, got {other:?}"),
    }

    // The healthy server picked up its new tool.
    assert!(host
        .registered_keys()
        .contains(&ToolKey::new("grows", "b")));
    assert_eq!(service.cache().registered_count("grows"), 2);
}
