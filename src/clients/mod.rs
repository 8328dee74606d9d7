pub mod assistant;
pub mod chat;
pub mod fetch;
pub mod search;

pub use assistant::{
    AssistantApi, AssistantSpec, OpenAiAssistantClient, PendingToolCall, Run, RunState,
    ThreadMessage, ToolOutput,
};
pub use chat::{ChatModel, OpenAiChatModel};
pub use fetch::{DocumentFetcher, HttpFetcher};
pub use search::{SearchProvider, SerpApiClient};
