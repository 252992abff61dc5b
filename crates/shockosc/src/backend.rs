//! Remote device control.
//!
//! The engine only knows [`ControlBackend`]. The HTTP backend posts to the
//! control API; the dry-run backend logs what would have been sent.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use shockconf::{BackendConfig, ControlType};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// One command for one physical device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Control {
    pub device: Uuid,
    pub control_type: ControlType,
    pub intensity: u8,
    /// Milliseconds.
    pub duration: u32,
}

#[async_trait]
pub trait ControlBackend: Send + Sync {
    /// Submit a batch of commands. No retries.
    async fn control(&self, controls: Vec<Control>) -> Result<()>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ControlRequest<'a> {
    shocks: Vec<WireControl>,
    custom_name: &'a str,
}

#[derive(Debug, Serialize)]
struct WireControl {
    id: Uuid,
    #[serde(rename = "type")]
    kind: &'static str,
    intensity: u8,
    duration: u32,
    exclusive: bool,
}

impl From<&Control> for WireControl {
    fn from(control: &Control) -> Self {
        Self {
            id: control.device,
            kind: api_type_name(control.control_type),
            intensity: control.intensity,
            duration: control.duration,
            exclusive: true,
        }
    }
}

fn api_type_name(control: ControlType) -> &'static str {
    match control {
        ControlType::Stop => "Stop",
        ControlType::Shock => "Shock",
        ControlType::Vibrate => "Vibrate",
        ControlType::Sound => "Sound",
    }
}

pub struct HttpControlBackend {
    client: reqwest::Client,
    endpoint: String,
    token: String,
    custom_name: String,
}

impl HttpControlBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(concat!("shockosc/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!("{}/2/shockers/control", config.api_url.trim_end_matches('/')),
            token: config.api_token.clone(),
            custom_name: config.custom_name.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    // traceparent header so the request joins the current trace
    fn inject_trace_context(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        use opentelemetry::trace::TraceContextExt;
        use tracing_opentelemetry::OpenTelemetrySpanExt;

        let span = tracing::Span::current();
        let context = span.context();
        let ctx_span = context.span();
        let span_context = ctx_span.span_context();

        if span_context.is_valid() {
            let flags = if span_context.is_sampled() { "01" } else { "00" };
            let traceparent = format!(
                "00-{}-{}-{}",
                span_context.trace_id(),
                span_context.span_id(),
                flags
            );
            builder.header("traceparent", traceparent)
        } else {
            builder
        }
    }
}

#[async_trait]
impl ControlBackend for HttpControlBackend {
    async fn control(&self, controls: Vec<Control>) -> Result<()> {
        if controls.is_empty() {
            return Ok(());
        }

        let body = ControlRequest {
            shocks: controls.iter().map(WireControl::from).collect(),
            custom_name: &self.custom_name,
        };

        let builder = self
            .client
            .post(&self.endpoint)
            .header("OpenShockToken", &self.token)
            .json(&body);
        let response = self
            .inject_trace_context(builder)
            .send()
            .await
            .context("Failed to call control API")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read error body>".to_string());
            anyhow::bail!("Control API returned {status}: {error_body}");
        }

        Ok(())
    }
}

/// Logs commands instead of sending them.
#[derive(Debug, Default)]
pub struct DryRunBackend;

#[async_trait]
impl ControlBackend for DryRunBackend {
    async fn control(&self, controls: Vec<Control>) -> Result<()> {
        for control in &controls {
            info!(
                device = %control.device,
                control = %control.control_type,
                intensity = control.intensity,
                duration_ms = control.duration,
                "Dry run control"
            );
        }
        Ok(())
    }
}
