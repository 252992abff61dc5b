//! In-memory game connection and control backend for engine tests.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rosc::{OscMessage, OscType};
use shockconf::{
    BehaviourConfig, DurationRange, GroupConfig, IntensityRange, ShockOscConfig,
};
use shockosc::{Control, ControlBackend, Engine, GameConnection, ParamValue};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

pub const FOO: Uuid = Uuid::from_u128(1);
pub const BAR: Uuid = Uuid::from_u128(2);
pub const FOO_LEFT: Uuid = Uuid::from_u128(0xa);
pub const FOO_RIGHT: Uuid = Uuid::from_u128(0xb);
pub const BAR_DEVICE: Uuid = Uuid::from_u128(0xc);

/// Records everything sent, replays whatever the test pushes.
pub struct MockGame {
    sent: Mutex<Vec<OscMessage>>,
    inbound: tokio::sync::Mutex<mpsc::Receiver<OscMessage>>,
    parameters: Mutex<HashMap<String, ParamValue>>,
}

impl MockGame {
    pub fn new() -> (Arc<Self>, mpsc::Sender<OscMessage>) {
        let (tx, rx) = mpsc::channel(64);
        let game = Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            inbound: tokio::sync::Mutex::new(rx),
            parameters: Mutex::new(HashMap::new()),
        });
        (game, tx)
    }

    pub fn sent(&self) -> Vec<OscMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn take_sent(&self) -> Vec<OscMessage> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }

    pub fn sent_to(&self, addr: &str) -> Vec<OscMessage> {
        self.sent().into_iter().filter(|m| m.addr == addr).collect()
    }

    pub fn chat_lines(&self) -> Vec<String> {
        self.sent_to("/chatbox/input")
            .into_iter()
            .filter_map(|m| match m.args.first() {
                Some(OscType::String(text)) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn set_parameters(&self, parameters: HashMap<String, ParamValue>) {
        *self.parameters.lock().unwrap() = parameters;
    }
}

#[async_trait]
impl GameConnection for MockGame {
    async fn send(&self, message: OscMessage) -> Result<()> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn receive(&self) -> Result<OscMessage> {
        match self.inbound.lock().await.recv().await {
            Some(message) => Ok(message),
            None => std::future::pending().await,
        }
    }

    async fn fetch_parameters(&self) -> Result<HashMap<String, ParamValue>> {
        Ok(self.parameters.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct MockBackend {
    batches: Mutex<Vec<Vec<Control>>>,
    fail: AtomicBool,
}

impl MockBackend {
    pub fn batches(&self) -> Vec<Vec<Control>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn controls(&self) -> Vec<Control> {
        self.batches().into_iter().flatten().collect()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ControlBackend for MockBackend {
    async fn control(&self, controls: Vec<Control>) -> Result<()> {
        self.batches.lock().unwrap().push(controls);
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("backend unavailable"));
        }
        Ok(())
    }
}

/// `Foo` maps to two devices, `Bar` to one.
pub fn config() -> ShockOscConfig {
    let mut config = ShockOscConfig {
        behaviour: BehaviourConfig {
            intensity_range: IntensityRange { min: 10, max: 20 },
            duration_range: DurationRange { min: 1_000, max: 5_000 },
            random_duration_step: 100,
            hold_time: 250,
            cooldown_time: 5_000,
            ..BehaviourConfig::default()
        },
        ..ShockOscConfig::default()
    };
    config.groups.insert(
        FOO,
        GroupConfig {
            name: "Foo".to_string(),
            shockers: vec![FOO_LEFT, FOO_RIGHT],
        },
    );
    config.groups.insert(
        BAR,
        GroupConfig {
            name: "Bar".to_string(),
            shockers: vec![BAR_DEVICE],
        },
    );
    config
}

pub struct Harness {
    pub engine: Arc<Engine>,
    pub game: Arc<MockGame>,
    pub backend: Arc<MockBackend>,
    pub inbound: mpsc::Sender<OscMessage>,
}

pub fn harness(config: ShockOscConfig) -> Harness {
    let (game, inbound) = MockGame::new();
    let backend = Arc::new(MockBackend::default());
    let engine = Engine::new(config, game.clone(), backend.clone());
    Harness {
        engine,
        game,
        backend,
        inbound,
    }
}

/// Message to `/avatar/parameters/ShockOsc/<name>`.
pub fn app_param(name: &str, value: OscType) -> OscMessage {
    OscMessage {
        addr: format!("/avatar/parameters/ShockOsc/{name}"),
        args: vec![value],
    }
}

/// Message to `/avatar/parameters/<name>`.
pub fn avatar_param(name: &str, value: OscType) -> OscMessage {
    OscMessage {
        addr: format!("/avatar/parameters/{name}"),
        args: vec![value],
    }
}

/// Poll `condition` until it holds or `timeout` passes.
pub async fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
