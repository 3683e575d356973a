//! Calculator state owner and action dispatcher.
//!
//! [`CalculatorCore`] holds the only copy of the form inputs and the last
//! computed results. The UI form and the conversational agent both mutate it
//! through the same validated dispatch path, and both read it back through
//! the same accessors, so they cannot disagree about the current state.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
    thread::{self, ThreadId},
    time::Duration,
};

use serde::Serialize;
use shared::{
    domain::{Field, FormData, Results},
    protocol::{
        AssistantAction, AssistantAppState, AssistantEvent, CalculatorState,
        ACTION_CALCULATION_ERROR, ACTION_FEEDBACK, ACTION_RESULTS,
    },
};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

pub mod agent_bridge;
pub mod dispatch;
pub mod engine;
pub mod feedback;
pub mod messages;

pub use agent_bridge::{
    AgentBridge, AgentConnector, AgentError, AgentRuntime, MissingAgentConnector, SnapshotSource,
};
pub use dispatch::{parse_action, CalculatorCommand, ParsedAction};
pub use engine::{compute, try_compute, CalculationError};
pub use feedback::{FeedbackChannel, FeedbackMessage, DEFAULT_FEEDBACK_TTL};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct CoreSettings {
    pub feedback_ttl: Duration,
    pub results_action_id: String,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            feedback_ttl: DEFAULT_FEEDBACK_TTL,
            results_action_id: ACTION_RESULTS.to_string(),
        }
    }
}

/// Change notifications for the rendering layer.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    FormChanged(FormData),
    ResultsReady(Results),
    FeedbackChanged(Option<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Ui,
    Agent,
}

impl Origin {
    pub fn as_str(self) -> &'static str {
        match self {
            Origin::Ui => "ui",
            Origin::Agent => "agent",
        }
    }
}

/// Everything the form renderer needs for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderState {
    pub form_data: FormData,
    pub results: Option<Results>,
    pub feedback_message: Option<String>,
}

enum QueuedAction {
    Envelope(AssistantAction, Origin),
    Command(CalculatorCommand, Origin),
}

#[derive(Default)]
struct DispatchQueue {
    pending: VecDeque<QueuedAction>,
    /// Thread currently draining `pending`, if any.
    drainer: Option<ThreadId>,
}

/// Releases the queue when a drain ends, including by unwinding.
struct DrainGuard<'a> {
    queue: &'a Mutex<DispatchQueue>,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        let mut queue = lock_recover(self.queue);
        queue.drainer = None;
        if !queue.pending.is_empty() {
            warn!(
                dropped = queue.pending.len(),
                "dispatch: drain aborted, queued actions discarded"
            );
            queue.pending.clear();
        }
    }
}

pub struct CalculatorCore {
    settings: CoreSettings,
    state: RwLock<CalculatorState>,
    queue: Mutex<DispatchQueue>,
    dispatch_lock: Mutex<()>,
    feedback: FeedbackChannel,
    agent: RwLock<Option<AgentBridge>>,
    events: broadcast::Sender<CoreEvent>,
}

impl CalculatorCore {
    pub fn new(settings: CoreSettings) -> Arc<Self> {
        Self::new_with_form(settings, FormData::default())
    }

    /// Starts from `form_data` as given; it is not validated here, so an
    /// out-of-range seed surfaces as a calculation error on `calculate`.
    pub fn new_with_form(settings: CoreSettings, form_data: FormData) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            feedback: FeedbackChannel::new(settings.feedback_ttl, events.clone()),
            settings,
            state: RwLock::new(CalculatorState {
                form_data,
                results: None,
            }),
            queue: Mutex::new(DispatchQueue::default()),
            dispatch_lock: Mutex::new(()),
            agent: RwLock::new(None),
            events,
        })
    }

    pub fn settings(&self) -> &CoreSettings {
        &self.settings
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<CoreEvent> {
        self.events.subscribe()
    }

    pub fn form_data(&self) -> FormData {
        read_recover(&self.state).form_data
    }

    pub fn results(&self) -> Option<Results> {
        read_recover(&self.state).results
    }

    pub fn feedback(&self) -> &FeedbackChannel {
        &self.feedback
    }

    pub fn feedback_message(&self) -> Option<String> {
        self.feedback.text()
    }

    pub fn view(&self) -> RenderState {
        let state = read_recover(&self.state).clone();
        RenderState {
            form_data: state.form_data,
            results: state.results,
            feedback_message: self.feedback.text(),
        }
    }

    pub fn snapshot(&self) -> AssistantAppState {
        let calculator_state = read_recover(&self.state).clone();
        debug!(?calculator_state, "agent: state requested");
        AssistantAppState { calculator_state }
    }

    /// Validates and applies an inbound agent action envelope.
    pub fn dispatch(&self, action: AssistantAction) {
        self.dispatch_from(action, Origin::Agent);
    }

    pub fn dispatch_from(&self, action: AssistantAction, origin: Origin) {
        self.enqueue([QueuedAction::Envelope(action, origin)]);
    }

    pub fn dispatch_command(&self, command: CalculatorCommand, origin: Origin) {
        self.enqueue([QueuedAction::Command(command, origin)]);
    }

    /// Whole-form edit from the UI. Each changed field goes through the same
    /// validated path as an agent `set_*` action.
    pub fn on_form_change(&self, form_data: FormData) {
        let current = self.form_data();
        let mut commands = Vec::new();
        if form_data.gender != current.gender {
            commands.push(CalculatorCommand::SetGender(form_data.gender));
        }
        if form_data.age != current.age {
            commands.push(CalculatorCommand::SetAge(form_data.age));
        }
        if form_data.height != current.height {
            commands.push(CalculatorCommand::SetHeight(form_data.height));
        }
        if form_data.weight != current.weight {
            commands.push(CalculatorCommand::SetWeight(form_data.weight));
        }
        if form_data.goal != current.goal {
            commands.push(CalculatorCommand::SetGoal(form_data.goal));
        }
        self.enqueue(
            commands
                .into_iter()
                .map(|command| QueuedAction::Command(command, Origin::Ui)),
        );
    }

    pub fn on_calculate(&self) {
        self.dispatch_command(CalculatorCommand::Calculate, Origin::Ui);
    }

    /// Queues actions and drains the queue one action at a time.
    ///
    /// A dispatch issued by the draining thread itself (from inside a
    /// confirmation handler) is appended and runs after the current action.
    /// Other threads wait for the running drain and then process their own
    /// actions before returning, so a caller always observes its own edit.
    fn enqueue(&self, actions: impl IntoIterator<Item = QueuedAction>) {
        let current = thread::current().id();
        {
            let mut queue = lock_recover(&self.queue);
            if queue.drainer == Some(current) {
                queue.pending.extend(actions);
                return;
            }
        }

        let _serialized = lock_recover(&self.dispatch_lock);
        {
            let mut queue = lock_recover(&self.queue);
            queue.pending.extend(actions);
            queue.drainer = Some(current);
        }
        let _drain = DrainGuard { queue: &self.queue };

        loop {
            let next = lock_recover(&self.queue).pending.pop_front();
            let Some(next) = next else {
                return;
            };
            match next {
                QueuedAction::Envelope(action, origin) => self.process_envelope(action, origin),
                QueuedAction::Command(command, origin) => self.apply_command(command, origin),
            }
        }
    }

    fn process_envelope(&self, action: AssistantAction, origin: Origin) {
        debug!(action_type = %action.kind, payload = ?action.payload, "dispatch: action received");
        match parse_action(&action) {
            ParsedAction::Command(command) => self.apply_command(command, origin),
            ParsedAction::Rejected { kind } => {
                debug!(action_type = kind, "dispatch: payload rejected, action ignored");
            }
            ParsedAction::Unknown(kind) => {
                warn!(action_type = %kind, "dispatch: unknown action type");
            }
        }
    }

    fn apply_command(&self, command: CalculatorCommand, origin: Origin) {
        if command == CalculatorCommand::Calculate {
            self.calculate(origin);
            return;
        }
        if !command.is_valid() {
            debug!(
                command = command.name(),
                origin = origin.as_str(),
                "dispatch: value out of range, action ignored"
            );
            return;
        }

        let form_data = {
            let mut state = write_recover(&self.state);
            let form = &mut state.form_data;
            match command {
                CalculatorCommand::SetGender(gender) => form.gender = gender,
                CalculatorCommand::SetAge(age) => form.age = age,
                CalculatorCommand::SetHeight(height) => form.height = height,
                CalculatorCommand::SetWeight(weight) => form.weight = weight,
                CalculatorCommand::SetGoal(goal) => form.goal = goal,
                CalculatorCommand::Calculate => {}
            }
            *form
        };
        info!(
            command = command.name(),
            field = command.field().map(Field::as_str),
            origin = origin.as_str(),
            "dispatch: field updated"
        );
        let _ = self.events.send(CoreEvent::FormChanged(form_data));

        if let Some(text) = messages::field_confirmation(&command) {
            self.send_to_agent(ACTION_FEEDBACK, &text);
            self.feedback.show(text);
        }
    }

    fn calculate(&self, origin: Origin) {
        let form_data = self.form_data();
        match try_compute(&form_data) {
            Ok(results) => {
                write_recover(&self.state).results = Some(results);
                info!(
                    origin = origin.as_str(),
                    mifflin = results.mifflin,
                    harris = results.harris,
                    "dispatch: calculation complete"
                );
                let _ = self.events.send(CoreEvent::ResultsReady(results));
                let summary = messages::results_summary(&results);
                self.send_to_agent(&self.settings.results_action_id, &summary);
                self.feedback.show(messages::CALCULATION_DONE);
            }
            Err(err) => {
                error!(origin = origin.as_str(), "dispatch: error calculating results: {err}");
                self.feedback.show(messages::CALCULATION_FAILED);
                self.send_to_agent(ACTION_CALCULATION_ERROR, &err.to_string());
            }
        }
    }

    /// Connects an agent runtime. A failed connection leaves the core
    /// running without one; returns whether a runtime is now attached.
    pub async fn attach_agent(self: &Arc<Self>, connector: Arc<dyn AgentConnector>) -> bool {
        let source = SnapshotSource::new(self);
        match agent_bridge::connect_isolated(connector, source).await {
            Ok(runtime) => {
                *write_recover(&self.agent) = Some(AgentBridge::new(runtime));
                info!("agent: runtime attached");
                true
            }
            Err(err) => {
                warn!("agent: failed to initialize assistant: {err:#}");
                false
            }
        }
    }

    pub fn detach_agent(&self) {
        if write_recover(&self.agent).take().is_some() {
            info!("agent: runtime detached");
        }
    }

    pub fn has_agent(&self) -> bool {
        read_recover(&self.agent).is_some()
    }

    /// Inbound notification from the agent runtime.
    pub fn handle_agent_event(&self, event: AssistantEvent) {
        match &event {
            AssistantEvent::Character { character_id } => {
                info!(character = ?character_id, "agent: character event");
            }
            AssistantEvent::Insets { .. } => debug!("agent: insets event"),
            AssistantEvent::Start { payload } => {
                info!(%payload, "agent: start event");
                if let Some(bridge) = self.agent_bridge() {
                    bridge.log_initial_data();
                }
            }
            AssistantEvent::Command { detail, .. } => info!(%detail, "agent: command event"),
            AssistantEvent::Error { detail } => warn!(%detail, "agent: error event"),
            AssistantEvent::Data { kind, .. } => debug!(event_type = %kind, "agent: data event"),
        }

        if let Some(action) = event.action() {
            self.dispatch(action.clone());
        }
    }

    /// Cancels the pending feedback expiry and drops the agent connection.
    pub fn shutdown(&self) {
        self.feedback.cancel_expiry();
        self.detach_agent();
        info!("dispatch: calculator shut down");
    }

    fn agent_bridge(&self) -> Option<AgentBridge> {
        read_recover(&self.agent).clone()
    }

    fn send_to_agent(&self, action_id: &str, value: &str) {
        match self.agent_bridge() {
            Some(bridge) => bridge.send(action_id, value),
            None => debug!(action_id, "agent: not attached, skipping send"),
        }
    }
}

pub(crate) fn lock_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read_recover<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_recover<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
