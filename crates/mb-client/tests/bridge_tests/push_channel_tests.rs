//! Push-channel tests against a live feed
//!
//! Requests leave over a wiremock outbound endpoint; responses are pushed by
//! the test through a real WebSocket feed.

use super::common::*;
use mb_client::channel::{HttpOutbound, OutboundLeg, RpcChannel};
use mb_client::transport::{ChannelTransport, ServerTransport};
use mb_types::BridgeError;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn outbound_endpoint() -> (MockServer, Arc<dyn OutboundLeg>) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let outbound = HttpOutbound::new(format!("{}/rpc", server.uri()), HashMap::new()).unwrap();
    (server, Arc::new(outbound))
}

#[tokio::test]
async fn test_round_trip_over_live_feed() {
    let feed = PushFeedMock::start().await;
    let (endpoint, outbound) = outbound_endpoint().await;

    let channel = Arc::new(RpcChannel::new("srv", outbound, feed.url()));
    channel.open().await.unwrap();

    let send = channel.send("tools/call", Some(json!({"name": "echo"})));
    let respond = async {
        let request = wait_for_rpc_request(&endpoint, 1).await;
        assert_eq!(request.method, "tools/call");
        let id = request.id.unwrap().as_u64().unwrap();
        feed.push_response(id, json!({"content": "hello"}));
    };

    let (result, ()) = tokio::join!(send, respond);
    assert_eq!(result.unwrap(), json!({"content": "hello"}));
    assert_eq!(channel.pending_count(), 0);
}

#[tokio::test]
async fn test_mismatched_id_does_not_terminate_request() {
    let feed = PushFeedMock::start().await;
    let (endpoint, outbound) = outbound_endpoint().await;

    let channel = Arc::new(RpcChannel::new("srv", outbound, feed.url()));
    channel.open().await.unwrap();

    let send = channel.send("tools/list", None);
    let respond = async {
        let request = wait_for_rpc_request(&endpoint, 1).await;
        let id = request.id.unwrap().as_u64().unwrap();

        // A response for a different request must be dropped, leaving the
        // original caller waiting.
        feed.push_response(id + 1000, json!({"wrong": true}));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(channel.pending_count(), 1);

        feed.push_response(id, json!({"tools": []}));
    };

    let (result, ()) = tokio::join!(send, respond);
    assert_eq!(result.unwrap(), json!({"tools": []}));
}

#[tokio::test]
async fn test_feed_loss_fails_pending_and_closes_channel() {
    let mut feed = PushFeedMock::start().await;
    let (endpoint, outbound) = outbound_endpoint().await;

    let channel = Arc::new(RpcChannel::new("srv", outbound, feed.url()));
    channel.open().await.unwrap();

    let send = channel.send("tools/list", None);
    let kill = async {
        wait_for_rpc_request(&endpoint, 1).await;
        feed.close_feed();
    };

    let (result, ()) = tokio::join!(send, kill);
    match result {
        Err(BridgeError::Connection(message)) => {
            assert!(message.contains("tools/list"), "names the waiting method");
        }
        other => panic!("expected connection error, got {other:?}"),
    }

    // The channel closed itself; later sends are rejected outright.
    assert!(matches!(
        channel.send("tools/list", None).await,
        Err(BridgeError::Closed)
    ));
}

#[tokio::test]
async fn test_channel_transport_handshake_and_tool_listing() {
    let feed = PushFeedMock::start().await;
    let (endpoint, outbound) = outbound_endpoint().await;

    let channel = Arc::new(RpcChannel::new("srv", outbound, feed.url()));
    channel.open().await.unwrap();

    // The handshake resolves on dispatch alone; nothing is pushed back.
    let result = channel
        .send("initialize", Some(json!({"client": "mcp-bridge"})))
        .await
        .unwrap();
    assert_eq!(result, Value::Null);
    assert_eq!(channel.pending_count(), 0);

    let transport = ChannelTransport::new(channel);
    let list = transport.list_tools();
    let respond = async {
        let request = wait_for_rpc_request(&endpoint, 2).await;
        assert_eq!(request.method, "tools/list");
        let id = request.id.unwrap().as_u64().unwrap();
        feed.push_response(id, json!({"tools": [{"name": "echo"}, {"name": "sum"}]}));
    };

    let (tools, ()) = tokio::join!(list, respond);
    let tools = tools.unwrap();
    assert_eq!(tools.len(), 2);
    assert!(tools.iter().all(|t| t.enabled));
}
