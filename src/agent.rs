use nanoid::nanoid;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::action::{tool_definitions, ActionRequest};
use crate::browser::BrowserPage;
use crate::executor::ActionExecutor;
use crate::llm::ChatModel;
use crate::observation::ObservationBuilder;
use crate::registry::ElementRegistry;
use crate::transcript::{Message, Transcript};

// ========================= Core Types =========================

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AgentError {
    #[error("stale element handle {index} (issued in generation {generation}, registry is at {current})")]
    StaleHandle { index: usize, generation: u64, current: u64 },
    #[error("malformed action: {0}")]
    MalformedAction(String),
    #[error("browser error: {0}")]
    Browser(String),
    #[error("model error: {0}")]
    Model(String),
    #[error("config error: {0}")]
    Config(String),
}

/// Where the loop is. Carried as `state` on the per-round log events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    AwaitingObservation,
    AwaitingModel,
    DispatchingAction,
    Terminated,
}

#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub run_id: String,
    /// Free text of the reply that carried no tool call.
    pub final_message: Option<String>,
    /// Number of actions dispatched.
    pub rounds: usize,
    pub transcript: Transcript,
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Debug copy of every screenshot, overwritten each time. `None` disables it.
    pub screenshot_path: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self { screenshot_path: Some(PathBuf::from("screenshot.png")) }
    }
}

// ========================= Agent Core =========================

pub struct Agent<P, M>
where
    P: BrowserPage,
    M: ChatModel,
{
    page: P,
    model: M,
    registry: ElementRegistry<P::Element>,
    observer: ObservationBuilder,
    state: LoopState,
}

impl<P, M> Agent<P, M>
where
    P: BrowserPage,
    M: ChatModel,
{
    pub fn new(page: P, model: M, cfg: AgentConfig) -> Self {
        Self {
            page,
            model,
            registry: ElementRegistry::new(),
            observer: ObservationBuilder::new(cfg.screenshot_path),
            state: LoopState::AwaitingObservation,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn registry(&self) -> &ElementRegistry<P::Element> {
        &self.registry
    }

    pub fn into_page(self) -> P {
        self.page
    }

    pub async fn run(&mut self, task: &str) -> Result<RunReport, AgentError> {
        self.run_transcript(Transcript::with_task(task)).await
    }

    /// Drive observe -> ask -> act until the model answers without a tool call.
    ///
    /// There is no step or time budget: the model alone decides when to stop.
    /// Any error aborts the run and is returned as-is.
    pub async fn run_transcript(&mut self, mut transcript: Transcript) -> Result<RunReport, AgentError> {
        let run_id = nanoid!();
        let tools = tool_definitions();
        let mut rounds = 0usize;
        info!(run_id = %run_id, "run started");

        loop {
            self.state = LoopState::AwaitingObservation;
            let screen = self.observer.capture(&self.page).await?;
            transcript.push(screen);

            self.state = LoopState::AwaitingModel;
            debug!(state = ?self.state, messages = transcript.len(), "querying model");
            let reply = self.model.complete(transcript.messages(), &tools).await?;

            let Some(call) = reply.tool_calls.first() else {
                self.state = LoopState::Terminated;
                let final_message = reply.content.clone();
                if let Some(text) = final_message.as_deref() {
                    info!(run_id = %run_id, rounds, "agent message: {}", text.trim());
                }
                info!(run_id = %run_id, rounds, state = ?self.state, "run finished");
                return Ok(RunReport { run_id, final_message, rounds, transcript });
            };

            self.state = LoopState::DispatchingAction;
            transcript.push(reply.to_message());
            if reply.tool_calls.len() > 1 {
                debug!(dropped = reply.tool_calls.len() - 1, "ignoring extra tool calls in this turn");
            }
            let action = ActionRequest::from_tool_call(call)?;
            info!(round = rounds, state = ?self.state, tool = action.tool_name(), action = ?action, "dispatching action");

            let observation = ActionExecutor::execute(&self.page, &mut self.registry, &action).await?;
            info!(round = rounds, state = ?self.state, clickable = observation.labels.len(), "action result");
            transcript.push(Message::tool_result(call, observation.to_string()));
            rounds += 1;
        }
    }
}

/// Run one task on `page` and always close it afterwards.
///
/// If the loop fails, that error wins and a teardown failure is only logged.
pub async fn run_session<P, M>(page: P, model: M, cfg: AgentConfig, task: &str) -> Result<RunReport, AgentError>
where
    P: BrowserPage,
    M: ChatModel,
{
    let mut agent = Agent::new(page, model, cfg);
    let outcome = agent.run(task).await;
    if let Err(e) = &outcome {
        warn!("run aborted: {}", e);
    }
    let closed = agent.into_page().close().await;
    match (outcome, closed) {
        (Ok(report), Ok(())) => Ok(report),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close_err)) => {
            warn!("browser teardown failed after abort: {}", close_err);
            Err(e)
        }
    }
}
