//! JSON-lines command loop.
//!
//! Commands, task firings and relay events all arrive on one channel and are
//! handled one at a time, so a firing never interleaves with a command.

use std::io::{self, BufRead, BufReader, Write};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use notif_bridge::{ErrorBody, MethodCall, MethodResponse, NotificationBridge};
use notif_domain::events::{NotificationEvent, Subscription};
use notif_domain::NotificationService;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::config::HostConfig;
use crate::file_store::FileStore;
use crate::presenter::LogPresenter;
use crate::runner::{FiredTask, ThreadTaskRunner};

pub const INVALID_REQUEST: &str = "INVALID_REQUEST";

#[derive(Debug)]
pub enum HostMessage {
    Command(String),
    Fired(FiredTask),
    Event(NotificationEvent),
    InputClosed,
}

#[derive(Deserialize)]
struct TapArgs {
    id: String,
    #[serde(default)]
    payload: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActionArgs {
    id: String,
    action_id: String,
}

pub struct Host<W: Write> {
    bridge: NotificationBridge,
    runner: Arc<ThreadTaskRunner>,
    messages: Sender<HostMessage>,
    out: W,
}

impl<W: Write> Host<W> {
    pub fn new(
        bridge: NotificationBridge,
        runner: Arc<ThreadTaskRunner>,
        messages: Sender<HostMessage>,
        out: W,
    ) -> Self {
        Self {
            bridge,
            runner,
            messages,
            out,
        }
    }

    pub fn bridge(&self) -> &NotificationBridge {
        &self.bridge
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Processes messages until the input side closes.
    pub fn run(mut self, messages: Receiver<HostMessage>) -> Result<()> {
        for message in messages {
            if !self.handle(message)? {
                break;
            }
        }
        info!("command loop finished");
        Ok(())
    }

    /// Handles one message. Returns `false` once the loop should stop.
    pub fn handle(&mut self, message: HostMessage) -> Result<bool> {
        match message {
            HostMessage::Command(line) => {
                let line = line.trim();
                if !line.is_empty() {
                    self.command(line)?;
                }
            }
            HostMessage::Fired(fired) => {
                if self.runner.claim(&fired) {
                    let outcome = self.bridge.on_task_fired(&fired.payload);
                    debug!(tag = %fired.tag, ?outcome, "handled fired task");
                }
            }
            HostMessage::Event(event) => self.write_line(&json!({ "event": event }))?,
            HostMessage::InputClosed => return Ok(false),
        }
        Ok(true)
    }

    fn command(&mut self, line: &str) -> Result<()> {
        let call: MethodCall = match serde_json::from_str(line) {
            Ok(call) => call,
            Err(err) => {
                warn!(error = %err, "unparsable command line");
                let response = MethodResponse::Error(ErrorBody {
                    code: INVALID_REQUEST.to_string(),
                    message: err.to_string(),
                });
                return self.write_line(&response);
            }
        };

        let response = match call.method.as_str() {
            "listen" => {
                spawn_event_forwarder(self.bridge.listen(), self.messages.clone())?;
                MethodResponse::Ok(Value::Bool(true))
            }
            "cancelListen" => {
                self.bridge.cancel_listen();
                MethodResponse::Ok(Value::Bool(true))
            }
            "notificationTapped" => match TapArgs::deserialize(&call.arguments) {
                Ok(args) => {
                    self.bridge.notification_tapped(&args.id, args.payload);
                    MethodResponse::Ok(Value::Bool(true))
                }
                Err(_) => MethodResponse::Ok(Value::Bool(false)),
            },
            "actionPressed" => match ActionArgs::deserialize(&call.arguments) {
                Ok(args) => {
                    self.bridge.action_pressed(&args.id, &args.action_id);
                    MethodResponse::Ok(Value::Bool(true))
                }
                Err(_) => MethodResponse::Ok(Value::Bool(false)),
            },
            _ => self.bridge.handle_call(&call),
        };
        self.write_line(&response)
    }

    fn write_line(&mut self, value: &impl serde::Serialize) -> Result<()> {
        serde_json::to_writer(&mut self.out, value).context("encoding reply")?;
        self.out.write_all(b"\n").context("writing reply")?;
        self.out.flush().context("flushing reply")
    }
}

/// Forwards relay events onto the command loop until the subscription ends.
pub fn spawn_event_forwarder(subscription: Subscription, messages: Sender<HostMessage>) -> Result<()> {
    thread::Builder::new()
        .name("event-forwarder".into())
        .spawn(move || {
            while let Some(event) = subscription.recv() {
                if messages.send(HostMessage::Event(event)).is_err() {
                    break;
                }
            }
            debug!("event subscription ended");
        })
        .context("spawning event forwarder")?;
    Ok(())
}

/// Feeds each input line to the command loop, then signals end of input.
pub fn spawn_line_reader<R>(reader: R, messages: Sender<HostMessage>) -> Result<()>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name("command-reader".into())
        .spawn(move || {
            for line in reader.lines() {
                match line {
                    Ok(line) => {
                        if messages.send(HostMessage::Command(line)).is_err() {
                            return;
                        }
                    }
                    Err(err) => {
                        warn!(%err, "failed to read command input");
                        break;
                    }
                }
            }
            let _ = messages.send(HostMessage::InputClosed);
        })
        .context("spawning command reader")?;
    Ok(())
}

/// Wires the file store, thread runner and log presenter to the bridge and
/// serves stdin until it closes.
pub fn run(config: HostConfig) -> Result<()> {
    let store = Arc::new(FileStore::open(&config.store_path)?);
    let (tx, rx) = mpsc::channel();

    let fired_tx = tx.clone();
    let runner = Arc::new(ThreadTaskRunner::new(move |fired| {
        let _ = fired_tx.send(HostMessage::Fired(fired));
    }));
    let service = NotificationService::builder()
        .with_config(config.notifications.clone())
        .with_store(store)
        .with_task_runner(runner.clone())
        .with_presenter(Arc::new(LogPresenter::new()))
        .build()
        .context("building notification service")?;
    let bridge = NotificationBridge::new(service);

    let report = bridge.on_boot();
    info!(
        path = %config.store_path.display(),
        rearmed = report.rearmed,
        expired = report.expired,
        corrupt = report.corrupt,
        "notification host ready"
    );

    spawn_line_reader(BufReader::new(io::stdin()), tx.clone())?;
    Host::new(bridge, runner, tx, io::stdout()).run(rx)
}
