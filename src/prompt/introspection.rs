//! 结论：基于完整账本，对用户说明意图、是否达成、未达成的原因
//!
//! 终端面向人类的自由文本，不做结构化解析。

use crate::core::AgentError;
use crate::llm::Brain;
use crate::memory::Ledger;
use crate::observability::{AgentEvent, Telemetry};
use crate::prompt::section;

pub struct IntrospectionPrompt {
    prompt: String,
}

impl IntrospectionPrompt {
    pub fn new(request: &str, memory: &Ledger) -> Self {
        let history = memory
            .to_prompt_json()
            .unwrap_or_else(|| "No action was performed.".to_string());
        let mut prompt = String::new();
        prompt.push_str(&section(
            "Precondition",
            "Below are the actions you (the assistant) have performed to achieve the user request. \
             You are talking to the user: use \"you\" instead of \"the user\".",
        ));
        prompt.push_str(&section("User request", &format!("<user_request>{request}</user_request>")));
        prompt.push_str(&section("Actions performed", &history));
        prompt.push_str(&section(
            "Task",
            "Tell the user's intention first, then think seriously about whether you have achieved it \
             based on the actions performed. If you did not, explain why.",
        ));
        prompt.push_str(&section("Output format", "text"));
        prompt.push_str(&section(
            "Output example",
            "Your intention is to calculate a math expression, and I tried to open the calculator. \
             But I failed because I do not have the ability to open it. I have not achieved your intention.",
        ));
        Self { prompt }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn invoke(&self, brain: &Brain) -> Result<String, AgentError> {
        Ok(brain.complete(&self.prompt)?.trim().to_string())
    }

    /// 流式：每个 chunk 推送为 ConclusionChunk 事件
    pub fn stream(&self, brain: &Brain, telemetry: &Telemetry) -> Result<String, AgentError> {
        let full = brain.stream(&self.prompt, |chunk| {
            telemetry.emit(AgentEvent::ConclusionChunk {
                text: chunk.to_string(),
            });
        })?;
        Ok(full.trim().to_string())
    }
}
