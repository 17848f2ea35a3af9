//! Authenticated HTTP access to the companion server-side plugin
//!
//! Every method maps to one endpoint of the companion's JSON surface.
//! Non-2xx outcomes are translated into the typed error taxonomy (404 means
//! the plugin is absent, 500 that it is misconfigured).

use mb_types::{BridgeError, BridgeResult, RegistryEntry, ServerConfig, ToolDescriptor};
use reqwest::{Client, Method, RequestBuilder};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

/// HTTP gateway to the companion plugin.
pub struct HttpGateway {
    /// Base URL of the companion plugin, without trailing slash
    base_url: String,

    /// HTTP client
    client: Client,

    /// Caller-supplied auth headers, sent with every request
    headers: HashMap<String, String>,
}

impl HttpGateway {
    /// Create a gateway for the companion plugin at `base_url`.
    pub fn new(base_url: impl Into<String>, headers: HashMap<String, String>) -> BridgeResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BridgeError::Connection(format!("Failed to create HTTP client: {e}")))?;

        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Ok(Self {
            base_url,
            client,
            headers,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.client.request(method, url);
        for (key, value) in &self.headers {
            builder = builder.header(key, value);
        }
        builder
    }

    /// Send a request and translate the outcome.
    ///
    /// Transport-level failures become `Connection`; non-2xx statuses go
    /// through `BridgeError::from_status`.
    async fn execute(&self, builder: RequestBuilder) -> BridgeResult<Value> {
        let response = builder
            .send()
            .await
            .map_err(|e| BridgeError::Connection(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::from_status(status.as_u16(), body));
        }

        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }

        let body = response
            .text()
            .await
            .map_err(|e| BridgeError::Connection(format!("Failed to read response body: {e}")))?;

        if body.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(BridgeError::from)
    }

    async fn get(&self, path: &str) -> BridgeResult<Value> {
        self.execute(self.request(Method::GET, path)).await
    }

    async fn post(&self, path: &str, body: Option<Value>) -> BridgeResult<Value> {
        let mut builder = self.request(Method::POST, path);
        if let Some(body) = body {
            builder = builder.json(&body);
        }
        self.execute(builder).await
    }

    async fn delete(&self, path: &str) -> BridgeResult<Value> {
        self.execute(self.request(Method::DELETE, path)).await
    }

    /// `GET /servers` — list the remote server registry.
    pub async fn list_servers(&self) -> BridgeResult<Vec<RegistryEntry>> {
        let value = self.get("/servers").await?;
        serde_json::from_value(value).map_err(BridgeError::from)
    }

    /// `POST /servers` — add a server configuration.
    pub async fn add_server(&self, name: &str, config: &ServerConfig) -> BridgeResult<()> {
        self.post("/servers", Some(json!({ "name": name, "config": config })))
            .await?;
        Ok(())
    }

    /// `DELETE /servers/{name}` — delete a server configuration.
    pub async fn delete_server(&self, name: &str) -> BridgeResult<()> {
        self.delete(&format!("/servers/{name}")).await?;
        Ok(())
    }

    /// `POST /servers/{name}/start` — ask the companion to bring the managed
    /// transport up.
    pub async fn start_server(&self, name: &str) -> BridgeResult<()> {
        self.post(&format!("/servers/{name}/start"), None).await?;
        Ok(())
    }

    /// `POST /servers/{name}/stop` — ask the companion to tear the managed
    /// transport down.
    pub async fn stop_server(&self, name: &str) -> BridgeResult<()> {
        self.post(&format!("/servers/{name}/stop"), None).await?;
        Ok(())
    }

    /// `GET /servers/{name}/list-tools` — the server's tool descriptors.
    pub async fn list_tools(&self, name: &str) -> BridgeResult<Vec<ToolDescriptor>> {
        let value = self.get(&format!("/servers/{name}/list-tools")).await?;
        serde_json::from_value(value).map_err(BridgeError::from)
    }

    /// `POST /servers/{name}/call-tool` — invoke one tool.
    pub async fn call_tool(&self, name: &str, tool: &str, arguments: Value) -> BridgeResult<Value> {
        let value = self
            .post(
                &format!("/servers/{name}/call-tool"),
                Some(json!({ "toolName": tool, "arguments": arguments })),
            )
            .await?;
        Ok(value.get("result").cloned().unwrap_or(value))
    }

    /// `POST /servers/{name}/reload-tools` — trigger remote re-discovery.
    pub async fn reload_tools(&self, name: &str) -> BridgeResult<()> {
        self.post(&format!("/servers/{name}/reload-tools"), None)
            .await?;
        Ok(())
    }

    /// `POST /servers/disabled` — persist the disabled-server set.
    pub async fn set_disabled_servers(&self, disabled: &[String]) -> BridgeResult<()> {
        self.post("/servers/disabled", Some(json!({ "disabledServers": disabled })))
            .await?;
        Ok(())
    }

    /// `POST /servers/{name}/disabled-tools` — persist one server's
    /// disabled-tool set.
    pub async fn set_disabled_tools(&self, name: &str, disabled: &[String]) -> BridgeResult<()> {
        self.post(
            &format!("/servers/{name}/disabled-tools"),
            Some(json!({ "disabledTools": disabled })),
        )
        .await?;
        Ok(())
    }
}
