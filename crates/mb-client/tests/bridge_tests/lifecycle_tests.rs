//! Connection lifecycle tests against the companion surface

use super::common::*;
use mb_client::ConnectionState;
use mb_types::{BridgeError, ToolKey};
use std::time::Duration;

#[tokio::test]
async fn test_connect_registers_only_enabled_tools() {
    let companion = CompanionMock::start().await;
    companion.mock_start("files", 200).await;
    companion.mock_list_tools("files", &["read", "write"]).await;

    let (service, host) = service_with_host(&companion);
    let config = stdio_config("files");

    let added = service
        .connect_and_register(&config, &["write".to_string()])
        .await
        .unwrap();

    assert_eq!(added, 1);
    assert!(service.manager().is_connected("files"));
    assert_eq!(
        host.registered_keys(),
        vec![ToolKey::new("files", "read")],
        "the remotely disabled tool is never registered"
    );
}

#[tokio::test]
async fn test_connect_failure_rolls_back_to_disconnected() {
    let companion = CompanionMock::start().await;
    companion.mock_start("files", 500).await;

    let (service, host) = service_with_host(&companion);
    let config = stdio_config("files");

    let result = service.connect_and_register(&config, &[]).await;
    assert!(matches!(result, Err(BridgeError::PluginMisconfigured)));
    assert_eq!(
        service.manager().state("files"),
        ConnectionState::Disconnected
    );
    assert!(host.events().is_empty());
}

#[tokio::test]
async fn test_disconnect_unregisters_all_even_when_remote_stop_fails() {
    let companion = CompanionMock::start().await;
    companion.mock_start("files", 200).await;
    companion.mock_list_tools("files", &["read", "write"]).await;
    companion.mock_stop("files", 500).await;

    let (service, host) = service_with_host(&companion);
    let config = stdio_config("files");

    service.connect_and_register(&config, &[]).await.unwrap();
    assert_eq!(service.cache().registered_count("files"), 2);

    service.manager().disconnect("files").await.unwrap();

    assert!(!service.manager().is_connected("files"));
    assert_eq!(service.cache().registered_count("files"), 0);
    assert!(service.cache().cached_tools("files").is_none());
    assert!(
        host.registered_keys().is_empty(),
        "local cleanup happens even when the remote stop fails"
    );
}

#[tokio::test]
async fn test_add_reports_connect_warning_but_keeps_config() {
    let companion = CompanionMock::start().await;
    companion.mock_add_ok().await;
    companion.mock_start("flaky", 500).await;
    companion
        .mock_list_servers(&[stdio_entry("flaky", true, &[])])
        .await;

    let (service, _host) = service_with_host(&companion);
    let config = stdio_config("flaky");

    let outcome = service.registry().add("flaky", &config).await.unwrap();
    assert!(matches!(
        outcome.connect_warning,
        Some(BridgeError::PluginMisconfigured)
    ));
    assert!(!service.manager().is_connected("flaky"));

    // The configuration survived the failed connect.
    let entries = service.registry().list().await.unwrap();
    assert!(entries.iter().any(|e| e.name == "flaky"));
}

#[tokio::test]
async fn test_missing_plugin_maps_to_not_installed() {
    // Nothing mounted: every endpoint answers 404.
    let companion = CompanionMock::start().await;
    let (service, _host) = service_with_host(&companion);

    let result = service.registry().list().await;
    assert!(matches!(result, Err(BridgeError::PluginNotInstalled)));
}

#[tokio::test]
async fn test_disconnect_during_connect_fails_the_connect_and_stops_remote() {
    let companion = CompanionMock::start().await;
    companion.mock_start_delayed("slow", 200).await;
    // The orphaned transport must be closed exactly once.
    companion.mock_stop_expect("slow", 1).await;

    let (service, _host) = service_with_host(&companion);
    let manager = service.manager().clone();
    let config = stdio_config("slow");

    let connect = tokio::spawn(async move { manager.connect(&config).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    service.manager().disconnect("slow").await.unwrap();

    let result = connect.await.unwrap();
    assert!(
        matches!(result, Err(BridgeError::Connection(_))),
        "a connect that lost to disconnect must not report success"
    );
    assert_eq!(
        service.manager().state("slow"),
        ConnectionState::Disconnected
    );
    assert!(service.manager().transport("slow").is_none());
}

#[tokio::test]
async fn test_shutdown_disconnects_every_server() {
    let companion = CompanionMock::start().await;
    for name in ["one", "two"] {
        companion.mock_start(name, 200).await;
        companion.mock_list_tools(name, &["t"]).await;
        companion.mock_stop(name, 200).await;
    }

    let (service, host) = service_with_host(&companion);
    service
        .connect_and_register(&stdio_config("one"), &[])
        .await
        .unwrap();
    service
        .connect_and_register(&stdio_config("two"), &[])
        .await
        .unwrap();

    service.shutdown().await;

    assert!(service.manager().connected_servers().is_empty());
    assert!(host.registered_keys().is_empty());
}
