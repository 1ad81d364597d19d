use std::fmt;

use crate::channel::event::START_TRAINING;
use crate::channel::{Channel, Connector, EventFilter, ServerEvent, Subscription};
use crate::error::{ClientError, RequestError, SessionError};
use crate::model::ModelConfig;
use crate::train::request::TrainingRequest;
use crate::train::status::TrainingStatus;

/// Where the session reads the persisted model configuration from when the
/// channel opens.
pub trait ConfigSource {
    fn model_config(&self) -> Result<ModelConfig, ClientError>;
}

impl<F> ConfigSource for F
where
    F: Fn() -> Result<ModelConfig, ClientError>,
{
    fn model_config(&self) -> Result<ModelConfig, ClientError> {
        self()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Connecting,
    AwaitingStart,
    Training,
    Completed,
    Evaluated,
}

impl Phase {
    /// True while a channel is open for this run.
    pub fn is_active(self) -> bool {
        matches!(self, Phase::Connecting | Phase::AwaitingStart | Phase::Training)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Connecting => "connecting",
            Phase::AwaitingStart => "awaiting start",
            Phase::Training => "training",
            Phase::Completed => "completed",
            Phase::Evaluated => "evaluated",
        };
        f.write_str(s)
    }
}

/// An open channel plus the session's own subscription to it.
struct Link {
    channel: Box<dyn Channel>,
    events: Subscription,
}

impl Link {
    /// Closes the channel but keeps the subscription, so events that were
    /// already delivered can still be folded.
    fn release(self) -> Subscription {
        self.channel.close();
        self.events
    }
}

enum State {
    Idle,
    Connecting(Link),
    AwaitingStart(Link),
    Training(Link),
    Completed(Subscription),
    Evaluated,
}

impl State {
    fn phase(&self) -> Phase {
        match self {
            State::Idle => Phase::Idle,
            State::Connecting(_) => Phase::Connecting,
            State::AwaitingStart(_) => Phase::AwaitingStart,
            State::Training(_) => Phase::Training,
            State::Completed(_) => Phase::Completed,
            State::Evaluated => Phase::Evaluated,
        }
    }

    fn events(&self) -> Option<&Subscription> {
        match self {
            State::Connecting(link) | State::AwaitingStart(link) | State::Training(link) => {
                Some(&link.events)
            }
            State::Completed(tail) => Some(tail),
            State::Idle | State::Evaluated => None,
        }
    }

    fn channel(&self) -> Option<&dyn Channel> {
        match self {
            State::Connecting(link) | State::AwaitingStart(link) | State::Training(link) => {
                Some(link.channel.as_ref())
            }
            _ => None,
        }
    }
}

/// Drives one training run at a time over a bidirectional channel.
///
/// Events are queued on the session's subscription and folded into
/// [`TrainingStatus`] by [`TrainingSession::pump`], one at a time and in
/// arrival order. The channel handle only exists while a run is active.
pub struct TrainingSession<S: ConfigSource> {
    source: S,
    state: State,
    epochs: u32,
    status: TrainingStatus,
    last_error: Option<String>,
}

impl<S: ConfigSource> TrainingSession<S> {
    pub fn new(source: S) -> Self {
        TrainingSession {
            source,
            state: State::Idle,
            epochs: 0,
            status: TrainingStatus::default(),
            last_error: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn status(&self) -> &TrainingStatus {
        &self.status
    }

    /// The most recent failure of this run, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn epochs(&self) -> u32 {
        self.epochs
    }

    /// Opens a channel and waits for it to connect; the start request is
    /// sent from [`pump`](Self::pump) once the connection is acknowledged.
    pub fn start(&mut self, connector: &dyn Connector, epochs: u32) -> Result<(), SessionError> {
        if self.phase().is_active() {
            return Err(SessionError::AlreadyRunning);
        }
        if epochs == 0 {
            return Err(RequestError::NoEpochs.into());
        }

        self.epochs = epochs;
        self.status = TrainingStatus::starting();
        self.last_error = None;

        match connector.connect() {
            Ok(channel) => {
                let events = channel.subscribe(EventFilter::All);
                self.state = State::Connecting(Link { channel, events });
                log::info!("training session connecting ({epochs} epochs)");
                Ok(())
            }
            Err(e) => {
                log::warn!("could not open training channel: {e}");
                self.fail(format!("Failed to connect: {e}"));
                self.state = State::Idle;
                Err(e.into())
            }
        }
    }

    /// Subscribes an extra listener to the active run's channel.
    pub fn subscribe(&self, filter: EventFilter) -> Option<Subscription> {
        self.state.channel().map(|ch| ch.subscribe(filter))
    }

    /// Applies every queued event; returns how many were handled.
    pub fn pump(&mut self) -> usize {
        let events = match self.state.events() {
            Some(sub) => sub.drain(),
            None => return 0,
        };
        let count = events.len();
        for event in events {
            self.apply(event);
        }
        count
    }

    /// Folds a single event into the session.
    pub fn apply(&mut self, event: ServerEvent) {
        let before = self.phase();
        let state = std::mem::replace(&mut self.state, State::Idle);
        self.state = self.transition(state, event);
        let after = self.phase();
        if before != after {
            log::info!("training session {before} -> {after}");
        }
    }

    fn transition(&mut self, state: State, event: ServerEvent) -> State {
        match (state, event) {
            (State::Connecting(link), ServerEvent::Connected) => self.send_start(link),

            (State::AwaitingStart(link) | State::Training(link), ServerEvent::Progress(p)) => {
                self.status.record_progress(&p);
                State::Training(link)
            }

            (State::AwaitingStart(link) | State::Training(link), ServerEvent::Complete) => {
                self.status.record_complete();
                State::Completed(link.release())
            }

            (
                State::AwaitingStart(link) | State::Training(link),
                ServerEvent::TestMetrics(metrics),
            ) => {
                self.status.record_test_metrics(&metrics);
                link.release();
                State::Evaluated
            }
            (State::Completed(_), ServerEvent::TestMetrics(metrics)) => {
                self.status.record_test_metrics(&metrics);
                State::Evaluated
            }

            // Completion may trail the test metrics.
            (State::Evaluated, ServerEvent::Complete) => {
                self.status.record_complete();
                State::Evaluated
            }

            (
                State::Connecting(link) | State::AwaitingStart(link) | State::Training(link),
                ServerEvent::Disconnected { reason },
            ) => {
                log::warn!("training channel lost: {reason}");
                link.release();
                self.fail(format!("Connection lost: {reason}"));
                State::Idle
            }

            (state, ServerEvent::Other { name, .. }) => {
                log::debug!("ignoring '{name}' event while {}", state.phase());
                state
            }
            (
                state,
                event @ (ServerEvent::Connected
                | ServerEvent::Progress(_)
                | ServerEvent::Complete
                | ServerEvent::TestMetrics(_)
                | ServerEvent::Disconnected { .. }),
            ) => {
                log::debug!("ignoring {:?} while {}", event.kind(), state.phase());
                state
            }
        }
    }

    fn send_start(&mut self, link: Link) -> State {
        let config = match self.source.model_config() {
            Ok(config) => config,
            Err(e) => {
                log::warn!("failed to fetch model configuration: {e}");
                link.release();
                self.fail(e.to_string());
                return State::Idle;
            }
        };
        let request = match TrainingRequest::from_config(&config, self.epochs) {
            Ok(request) => request,
            Err(e) => {
                link.release();
                self.fail(e.to_string());
                return State::Idle;
            }
        };
        let payload = match serde_json::to_value(&request) {
            Ok(payload) => payload,
            Err(e) => {
                link.release();
                self.fail(e.to_string());
                return State::Idle;
            }
        };
        if let Err(e) = link.channel.emit(START_TRAINING, &payload) {
            link.release();
            self.fail(format!("Failed to start training: {e}"));
            return State::Idle;
        }
        log::info!("requested {} epochs with {:?} loss", request.epochs, request.loss);
        State::AwaitingStart(link)
    }

    fn fail(&mut self, message: String) {
        self.status.is_training = false;
        self.last_error = Some(message);
    }

    /// Closes the channel without telling the backend; the backend keeps
    /// training but its events are no longer observed.
    pub fn detach(&mut self) {
        let state = std::mem::replace(&mut self.state, State::Idle);
        self.state = match state {
            State::Connecting(link) | State::AwaitingStart(link) | State::Training(link) => {
                link.channel.close();
                self.status.is_training = false;
                log::info!("training session detached");
                State::Idle
            }
            settled => settled,
        };
    }
}

impl<S: ConfigSource> Drop for TrainingSession<S> {
    fn drop(&mut self) {
        self.detach();
    }
}
