pub mod action;
pub mod agent;
pub mod browser;
pub mod executor;
pub mod llm;
pub mod observation;
pub mod registry;
pub mod transcript;

pub use action::ActionRequest;
pub use agent::{run_session, Agent, AgentConfig, AgentError, LoopState, RunReport};
pub use browser::{BrowserConfig, BrowserPage, ChromiumPage};
pub use llm::{AssistantReply, ChatClient, ChatConfig, ChatModel};
pub use observation::{Observation, ObservationBuilder};
pub use registry::{ElementRegistry, Handle, LabelMap};
pub use transcript::{Message, ToolCall, Transcript};
