use crate::{AgentSpec, Result};
use agent_llm::{
    CompletionRequest, CompletionResponse, LLMProvider, Llm, LlmConfig, Message, StopReason,
    TokenUsage,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Replies with queued answers in order and records every request
#[derive(Default)]
pub(crate) struct ScriptedProvider {
    replies: Mutex<VecDeque<String>>,
    pub(crate) requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub(crate) fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(ToString::to_string).collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.messages[0].content.clone())
            .collect()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn complete(&self, request: CompletionRequest) -> agent_llm::Result<CompletionResponse> {
        self.requests.lock().unwrap().push(request);
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "done".to_string());
        Ok(CompletionResponse {
            message: Message::assistant(reply),
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 5,
            },
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub(crate) fn llm(provider: Arc<ScriptedProvider>) -> Arc<Llm> {
    Arc::new(Llm::new(provider, LlmConfig::new("gpt-4o-mini")))
}

pub(crate) fn agent(role: &str, llm: Arc<Llm>) -> Result<AgentSpec> {
    AgentSpec::builder()
        .role(role)
        .goal(format!("{role} goal"))
        .backstory(format!("{role} backstory"))
        .llm(llm)
        .build()
}
