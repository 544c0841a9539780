//! テスト用の message と handler
//!
//! message は `Journal` を持つ。registry が生成する handler（テストの状態を
//! 渡せない）でも、観測できる痕跡を残せる。

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::app::CancelToken;
use crate::domain::{HandlerError, Message};
use crate::typed::{Handler, HandlerType, MessageTypes};

#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

#[derive(Debug)]
pub struct Ping {
    pub seq: u32,
    pub journal: Journal,
}

impl Ping {
    pub fn new(seq: u32, journal: &Journal) -> Self {
        Self {
            seq,
            journal: journal.clone(),
        }
    }
}

impl Message for Ping {}

#[derive(Debug)]
pub struct Pong {
    pub seq: u32,
    pub journal: Journal,
}

impl Pong {
    pub fn new(seq: u32, journal: &Journal) -> Self {
        Self {
            seq,
            journal: journal.clone(),
        }
    }
}

impl Message for Pong {}

/// A message nothing handles.
#[derive(Debug)]
pub struct Orphan;

impl Message for Orphan {}

#[derive(Default)]
pub struct PingHandler;

#[async_trait]
impl Handler<Ping> for PingHandler {
    async fn handle(&self, message: &Ping, _cancel: &CancelToken) -> Result<(), HandlerError> {
        message.journal.record(format!("PingHandler:{}", message.seq));
        Ok(())
    }
}

impl HandlerType for PingHandler {
    fn message_types(types: &mut MessageTypes<Self>) {
        types.add::<Ping>();
    }
}

#[derive(Default)]
pub struct AltPingHandler;

#[async_trait]
impl Handler<Ping> for AltPingHandler {
    async fn handle(&self, message: &Ping, _cancel: &CancelToken) -> Result<(), HandlerError> {
        message.journal.record(format!("AltPingHandler:{}", message.seq));
        Ok(())
    }
}

impl HandlerType for AltPingHandler {
    fn message_types(types: &mut MessageTypes<Self>) {
        types.add::<Ping>();
    }
}

#[derive(Default)]
pub struct PingPongHandler;

#[async_trait]
impl Handler<Ping> for PingPongHandler {
    async fn handle(&self, message: &Ping, _cancel: &CancelToken) -> Result<(), HandlerError> {
        message.journal.record(format!("PingPongHandler:ping:{}", message.seq));
        Ok(())
    }
}

#[async_trait]
impl Handler<Pong> for PingPongHandler {
    async fn handle(&self, message: &Pong, _cancel: &CancelToken) -> Result<(), HandlerError> {
        message.journal.record(format!("PingPongHandler:pong:{}", message.seq));
        Ok(())
    }
}

impl HandlerType for PingPongHandler {
    fn message_types(types: &mut MessageTypes<Self>) {
        types.add::<Ping>().add::<Pong>();
    }
}

/// Needs a prefix at construction time, so it has no `Default`.
pub struct ConfiguredPingHandler {
    pub prefix: String,
}

#[async_trait]
impl Handler<Ping> for ConfiguredPingHandler {
    async fn handle(&self, message: &Ping, _cancel: &CancelToken) -> Result<(), HandlerError> {
        message.journal.record(format!("{}:{}", self.prefix, message.seq));
        Ok(())
    }
}

impl HandlerType for ConfiguredPingHandler {
    fn message_types(types: &mut MessageTypes<Self>) {
        types.add::<Ping>();
    }
}

pub struct FailingHandler {
    reason: String,
}

impl FailingHandler {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Handler<Ping> for FailingHandler {
    async fn handle(&self, _message: &Ping, _cancel: &CancelToken) -> Result<(), HandlerError> {
        Err(HandlerError::new(self.reason.clone()))
    }
}

impl HandlerType for FailingHandler {
    fn message_types(types: &mut MessageTypes<Self>) {
        types.add::<Ping>();
    }
}

/// Sleeps, then records `{name}:{seq}`. Returns `Cancelled` if the token
/// fires first.
pub struct SlowPingHandler {
    name: String,
    delay: Duration,
}

impl SlowPingHandler {
    pub fn new(name: impl Into<String>, delay: Duration) -> Self {
        Self {
            name: name.into(),
            delay,
        }
    }
}

#[async_trait]
impl Handler<Ping> for SlowPingHandler {
    async fn handle(&self, message: &Ping, cancel: &CancelToken) -> Result<(), HandlerError> {
        tokio::select! {
            _ = tokio::time::sleep(self.delay) => {
                message.journal.record(format!("{}:{}", self.name, message.seq));
                Ok(())
            }
            _ = cancel.cancelled() => Err(HandlerError::Cancelled),
        }
    }
}

impl HandlerType for SlowPingHandler {
    fn message_types(types: &mut MessageTypes<Self>) {
        types.add::<Ping>();
    }
}
