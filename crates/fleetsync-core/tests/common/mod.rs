// Scripted push connector shared by the integration tests.
#![allow(dead_code, clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::time::Instant;

use fleetsync_api::models::BusPayload;
use fleetsync_api::{Error, PushConnector, PushFrame, PushSession};
use fleetsync_core::{ChannelDispatcher, ChannelEvent, EventKind};

/// What the next connect attempt does.
pub enum Outcome {
    Refuse,
    Accept(mpsc::UnboundedReceiver<Result<PushFrame, Error>>),
    /// Never completes; only cancellation gets past it.
    Hang,
}

#[derive(Default)]
struct Script {
    outcomes: VecDeque<Outcome>,
    attempts: Vec<Instant>,
    announces: usize,
}

/// Plays back `Outcome`s in order, then refuses every later attempt.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    script: Arc<Mutex<Script>>,
}

impl ScriptedConnector {
    pub fn new(outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                outcomes: outcomes.into_iter().collect(),
                ..Script::default()
            })),
        }
    }

    /// When each connect attempt started.
    pub fn attempts(&self) -> Vec<Instant> {
        self.script.lock().unwrap().attempts.clone()
    }

    pub fn announces(&self) -> usize {
        self.script.lock().unwrap().announces
    }
}

impl PushConnector for ScriptedConnector {
    type Session = ScriptedSession;

    async fn connect(&self) -> Result<ScriptedSession, Error> {
        let outcome = {
            let mut script = self.script.lock().unwrap();
            script.attempts.push(Instant::now());
            script.outcomes.pop_front()
        };
        match outcome {
            Some(Outcome::Accept(frames)) => Ok(ScriptedSession {
                frames,
                script: Arc::clone(&self.script),
            }),
            Some(Outcome::Hang) => std::future::pending().await,
            Some(Outcome::Refuse) | None => {
                Err(Error::WebSocketConnect("connection refused".into()))
            }
        }
    }
}

pub struct ScriptedSession {
    frames: mpsc::UnboundedReceiver<Result<PushFrame, Error>>,
    script: Arc<Mutex<Script>>,
}

impl PushSession for ScriptedSession {
    async fn announce(&mut self) -> Result<(), Error> {
        self.script.lock().unwrap().announces += 1;
        Ok(())
    }

    async fn next_frame(&mut self) -> Option<Result<PushFrame, Error>> {
        self.frames.recv().await
    }

    async fn close(&mut self) {
        self.frames.close();
    }
}

/// Server side of an accepted session. Dropping it closes the session.
pub struct SessionFeed(mpsc::UnboundedSender<Result<PushFrame, Error>>);

impl SessionFeed {
    pub fn send(&self, frame: PushFrame) {
        let _ = self.0.send(Ok(frame));
    }

    pub fn update(&self, payload: BusPayload) {
        self.send(PushFrame::Update(payload));
    }

    pub fn fail(&self, error: Error) {
        let _ = self.0.send(Err(error));
    }
}

/// An `Accept` outcome plus the feed that drives it.
pub fn accepted() -> (Outcome, SessionFeed) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Outcome::Accept(rx), SessionFeed(tx))
}

pub fn bus(id: &str) -> BusPayload {
    BusPayload {
        vehicle_id: Some(id.into()),
        ..BusPayload::default()
    }
}

/// Record every event the dispatcher publishes, in order.
pub fn record(dispatcher: &ChannelDispatcher) -> Arc<Mutex<Vec<ChannelEvent>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    for kind in [EventKind::Connected, EventKind::Disconnected, EventKind::Update] {
        let log = Arc::clone(&log);
        dispatcher.subscribe(kind, move |event: &ChannelEvent| {
            log.lock().unwrap().push(event.clone());
            Ok(())
        });
    }
    log
}

pub fn events(log: &Arc<Mutex<Vec<ChannelEvent>>>) -> Vec<ChannelEvent> {
    log.lock().unwrap().clone()
}
