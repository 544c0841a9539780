use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures::channel::mpsc;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{Duration, sleep};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use relay_core::typed::{HandlerDescriptor, HandlerModule, MessageTypes};
use relay_core::{
    CancelToken, CompositeHandler, DispatcherBuilder, DispatcherConfig, Handler, HandlerError,
    HandlerRegistry, HandlerType, Message,
};

#[derive(Debug)]
struct OrderPlaced {
    order_id: u64,
    amount_cents: u64,
}

impl Message for OrderPlaced {}

#[derive(Debug)]
struct OrderCancelled {
    order_id: u64,
    reason: String,
}

impl Message for OrderCancelled {}

/// Nobody handles these; they show up as `handled=false`.
#[derive(Debug)]
struct Heartbeat;

impl Message for Heartbeat {}

/// One line of stdin.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Input {
    OrderPlaced { order_id: u64, amount_cents: u64 },
    OrderCancelled { order_id: u64, reason: String },
    Heartbeat,
}

impl Input {
    fn into_message(self) -> Arc<dyn Message> {
        match self {
            Input::OrderPlaced {
                order_id,
                amount_cents,
            } => Arc::new(OrderPlaced {
                order_id,
                amount_cents,
            }),
            Input::OrderCancelled { order_id, reason } => {
                Arc::new(OrderCancelled { order_id, reason })
            }
            Input::Heartbeat => Arc::new(Heartbeat),
        }
    }
}

/// Keeps a running revenue total.
#[derive(Default)]
struct Billing {
    total_cents: AtomicU64,
}

#[async_trait]
impl Handler<OrderPlaced> for Billing {
    async fn handle(&self, order: &OrderPlaced, _cancel: &CancelToken) -> Result<(), HandlerError> {
        if order.amount_cents == 0 {
            return Err(HandlerError::new(format!(
                "order {} has no amount",
                order.order_id
            )));
        }
        let total = self.total_cents.fetch_add(order.amount_cents, Ordering::Relaxed)
            + order.amount_cents;
        info!(order_id = order.order_id, total_cents = total, "billed");
        Ok(())
    }
}

impl HandlerType for Billing {
    fn message_types(types: &mut MessageTypes<Self>) {
        types.add::<OrderPlaced>();
    }
}

/// Pretends to send an email.
#[derive(Default)]
struct Notifier;

#[async_trait]
impl Handler<OrderPlaced> for Notifier {
    async fn handle(&self, order: &OrderPlaced, cancel: &CancelToken) -> Result<(), HandlerError> {
        tokio::select! {
            _ = sleep(Duration::from_millis(50)) => {
                info!(order_id = order.order_id, "confirmation sent");
                Ok(())
            }
            _ = cancel.cancelled() => Err(HandlerError::Cancelled),
        }
    }
}

impl HandlerType for Notifier {
    fn message_types(types: &mut MessageTypes<Self>) {
        types.add::<OrderPlaced>();
    }
}

#[derive(Default)]
struct AuditLog;

#[async_trait]
impl Handler<OrderCancelled> for AuditLog {
    async fn handle(&self, order: &OrderCancelled, _cancel: &CancelToken) -> Result<(), HandlerError> {
        info!(order_id = order.order_id, reason = %order.reason, "cancellation audited");
        Ok(())
    }
}

impl HandlerType for AuditLog {
    fn message_types(types: &mut MessageTypes<Self>) {
        types.add::<OrderCancelled>();
    }
}

struct OrderHandlers;

impl HandlerModule for OrderHandlers {
    fn name(&self) -> &str {
        "orders"
    }

    fn exported_handlers(&self) -> Vec<HandlerDescriptor> {
        vec![HandlerDescriptor::of::<AuditLog>()]
    }
}

fn load_config() -> Result<DispatcherConfig, Box<dyn Error>> {
    match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)?;
            Ok(DispatcherConfig::from_json(&json)?)
        }
        None => Ok(DispatcherConfig {
            name: "relay-cli".to_string(),
            warn_on_unhandled: true,
        }),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;

    // (A) handlers: scanned audit log + a concurrent fan-out for new orders
    let mut registry = HandlerRegistry::new();
    registry.register_scan(&[&OrderHandlers]);
    registry.register_instance(Arc::new(CompositeHandler::concurrent(vec![
        Arc::new(Billing::default()) as Arc<dyn Handler<OrderPlaced>>,
        Arc::new(Notifier) as Arc<dyn Handler<OrderPlaced>>,
    ])));

    let dispatcher = DispatcherBuilder::new()
        .with_registry(registry)
        .with_config(config)
        .expect_message::<OrderPlaced>()
        .expect_message::<OrderCancelled>()
        .build()?;

    // (B) stdin JSON lines -> message stream
    let (tx, rx) = mpsc::unbounded::<Arc<dyn Message>>();
    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Input>(&line) {
                Ok(input) => {
                    if tx.unbounded_send(input.into_message()).is_err() {
                        break;
                    }
                }
                Err(err) => warn!(%err, line = %line, "skipping unreadable line"),
            }
        }
    });

    // (C) dispatch until stdin closes or a handler fails
    let handle = dispatcher.spawn(rx, |result| {
        println!(
            "{} handled={}",
            result.message().type_name(),
            result.handled()
        );
    });

    let outcome = handle.join().await;
    reader.abort();

    // (D) report and exit. tokio reads stdin on a blocking thread that
    // abort() cannot interrupt, so returning from main would wait for the
    // next line on an interactive terminal.
    match outcome {
        Ok(summary) => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
            std::process::exit(0);
        }
        Err(err) => {
            eprintln!("dispatch failed: {err}");
            std::process::exit(1);
        }
    }
}
