//! 请求分解：一次 LLM 调用把原始请求拆成最小、有序、带前置条件的步骤
//!
//! 分解结果只作为下游上下文，不做结构化解析，因此这里没有重试。
//! 空请求直接返回固定的「什么都不做」，不调用 LLM。

use serde::{Deserialize, Serialize};

use crate::core::AgentError;
use crate::llm::Brain;
use crate::prompt::section;

pub const DO_NOTHING: &str = "Don't do anything.";

/// 一次分配得到的请求：原文 + 分步描述；分配后不再重新推导
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRequest {
    pub raw: String,
    pub by_step: String,
}

impl Default for ResolvedRequest {
    fn default() -> Self {
        Self::do_nothing()
    }
}

impl ResolvedRequest {
    pub fn new(raw: impl Into<String>, by_step: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            by_step: by_step.into(),
        }
    }

    pub fn do_nothing() -> Self {
        Self::new(DO_NOTHING, DO_NOTHING)
    }

    pub fn is_do_nothing(&self) -> bool {
        self.raw == DO_NOTHING && self.by_step == DO_NOTHING
    }
}

const OUTPUT_EXAMPLE: &str = "step_1: (Start) Open the door
step_2: (After: door opened) Go into the room
step_3: (After: walked in the room) Find the toys in the room
step_...: (After: found toys) ...";

pub struct RequestResolverPrompt {
    request: String,
    prompt: String,
}

impl RequestResolverPrompt {
    pub fn new(request: &str) -> Self {
        let mut prompt = String::new();
        prompt.push_str(&section(
            "Task",
            "Tell the user's intention based on <user_request>, broken down into minimal, ordered steps.",
        ));
        prompt.push_str(&section("User request", &format!("<user_request>{request}</user_request>")));
        prompt.push_str(&section(
            "Important",
            "Preserve every detail mentioned in <user_request> verbatim, especially information with \
             accuracy requirements: all numbers, parameters, locations, dates/times, names, proper nouns \
             and entities. Never paraphrase them.",
        ));
        prompt.push_str(&section(
            "Hints",
            "- Deduce and analyse the request step by step.\n\
             - Break the intention(s) down into steps as granular as possible.\n\
             - Keep track of the steps' interdependence and order; each step states its precondition.\n\
             - Make the output brief, concise and accurate. Thought process is not required.",
        ));
        prompt.push_str(&section(
            "Output format",
            "step_{n}: ({condition_for_step_n}) {action_of_step_n}",
        ));
        prompt.push_str(&section("Output example", OUTPUT_EXAMPLE));
        Self {
            request: request.to_string(),
            prompt,
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn invoke(&self, brain: &Brain) -> Result<ResolvedRequest, AgentError> {
        if self.request.trim().is_empty() {
            return Ok(ResolvedRequest::do_nothing());
        }
        tracing::debug!(prompt = %self.prompt, "request resolver prompt");
        let by_step = brain.complete(&self.prompt)?;
        tracing::debug!(by_step = %by_step, "request resolved");
        Ok(ResolvedRequest::new(self.request.clone(), by_step.trim()))
    }
}
