//! Game client connection.
//!
//! [`GameConnection`] is the seam between the engine and the wire. The UDP
//! implementation speaks OSC through `rosc` and fetches the avatar's full
//! parameter set from the client's OSCQuery HTTP endpoint.

use crate::address::{CHATBOX_INPUT, VOICE_INPUT};
use crate::registry::ParamValue;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rosc::{decoder, encoder, OscMessage, OscPacket, OscType};
use serde_json::Value;
use shockconf::OscConfig;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tracing::{debug, trace};

/// Send and receive OSC messages to and from the game client.
#[async_trait]
pub trait GameConnection: Send + Sync {
    async fn send(&self, message: OscMessage) -> Result<()>;

    /// Wait for the next inbound message.
    async fn receive(&self) -> Result<OscMessage>;

    /// Full address to value map of the current avatar.
    async fn fetch_parameters(&self) -> Result<HashMap<String, ParamValue>>;
}

/// Chat message shown above the avatar, sent immediately.
pub fn chatbox_message(text: &str) -> OscMessage {
    OscMessage {
        addr: CHATBOX_INPUT.to_string(),
        args: vec![OscType::String(text.to_string()), OscType::Bool(true)],
    }
}

pub fn voice_message(pressed: bool) -> OscMessage {
    OscMessage {
        addr: VOICE_INPUT.to_string(),
        args: vec![OscType::Bool(pressed)],
    }
}

/// Plain UDP OSC connection to a local game client.
pub struct UdpGameConnection {
    socket: UdpSocket,
    target: SocketAddr,
    pending: Mutex<VecDeque<OscMessage>>,
    http: reqwest::Client,
    oscquery_url: Option<String>,
}

impl UdpGameConnection {
    pub async fn bind(config: &OscConfig) -> Result<Self> {
        let target = tokio::net::lookup_host(config.send_address())
            .await
            .with_context(|| format!("Failed to resolve {}", config.send_address()))?
            .next()
            .ok_or_else(|| anyhow!("No address for {}", config.send_address()))?;

        let socket = UdpSocket::bind((config.host.as_str(), config.receive_port))
            .await
            .with_context(|| {
                format!("Failed to bind {}:{}", config.host, config.receive_port)
            })?;

        let oscquery_url = (!config.oscquery_url.is_empty())
            .then(|| config.oscquery_url.trim_end_matches('/').to_string());

        debug!(
            local = %socket.local_addr()?,
            %target,
            oscquery = ?oscquery_url,
            "OSC connection ready"
        );

        Ok(Self {
            socket,
            target,
            pending: Mutex::new(VecDeque::new()),
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .context("Failed to build HTTP client")?,
            oscquery_url,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

#[async_trait]
impl GameConnection for UdpGameConnection {
    async fn send(&self, message: OscMessage) -> Result<()> {
        let bytes = encoder::encode(&OscPacket::Message(message))
            .map_err(|e| anyhow!("Failed to encode OSC message: {e:?}"))?;
        self.socket.send_to(&bytes, self.target).await?;
        Ok(())
    }

    async fn receive(&self) -> Result<OscMessage> {
        loop {
            if let Some(message) = self.pending.lock().await.pop_front() {
                return Ok(message);
            }

            let mut buf = [0u8; decoder::MTU];
            let (len, from) = self.socket.recv_from(&mut buf).await?;
            let (_, packet) = decoder::decode_udp(&buf[..len])
                .map_err(|e| anyhow!("Failed to decode OSC packet from {from}: {e:?}"))?;

            let mut pending = self.pending.lock().await;
            flatten_packet(packet, &mut pending);
            trace!(queued = pending.len(), "Decoded OSC packet");
        }
    }

    async fn fetch_parameters(&self) -> Result<HashMap<String, ParamValue>> {
        let Some(base) = &self.oscquery_url else {
            debug!("OSCQuery disabled, starting from an empty parameter set");
            return Ok(HashMap::new());
        };

        let url = format!("{base}/avatar");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to query {url}"))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("OSCQuery {url} returned {status}");
        }

        let root: Value = response
            .json()
            .await
            .context("Failed to parse OSCQuery response")?;
        Ok(flatten_oscquery(&root))
    }
}

/// Unpack bundles recursively, keeping message order.
fn flatten_packet(packet: OscPacket, out: &mut VecDeque<OscMessage>) {
    match packet {
        OscPacket::Message(message) => out.push_back(message),
        OscPacket::Bundle(bundle) => {
            for content in bundle.content {
                flatten_packet(content, out);
            }
        }
    }
}

/// Collect `FULL_PATH -> VALUE[0]` for every node of an OSCQuery tree.
pub fn flatten_oscquery(root: &Value) -> HashMap<String, ParamValue> {
    let mut out = HashMap::new();
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        if let (Some(path), Some(value)) = (
            node.get("FULL_PATH").and_then(Value::as_str),
            node.get("VALUE").and_then(|v| v.get(0)),
        ) {
            out.insert(path.to_string(), ParamValue::from(value));
        }

        if let Some(contents) = node.get("CONTENTS").and_then(Value::as_object) {
            stack.extend(contents.values());
        }
    }

    out
}
