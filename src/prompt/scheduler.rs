//! 旧式调度：一次 LLM 调用给出能力名的静态有序计划
//!
//! 现在只用于预估步数（计划长度），格式不对时宽松地当作空计划处理。

use crate::capability::CapabilitySet;
use crate::core::AgentError;
use crate::llm::Brain;
use crate::prompt::section;

pub struct SchedulerPrompt<'a> {
    capabilities: &'a CapabilitySet,
    prompt: String,
}

impl<'a> SchedulerPrompt<'a> {
    pub fn new(request_by_step: &str, capabilities: &'a CapabilitySet) -> Self {
        let abilities = serde_json::to_string_pretty(&capabilities.descriptors())
            .unwrap_or_else(|_| "[]".to_string());
        let mut prompt = String::new();
        prompt.push_str(&section(
            "Precondition",
            "Below are the abilities you have (you can only use the following abilities).",
        ));
        prompt.push_str(&section("User request", request_by_step));
        prompt.push_str(&section(
            "Task",
            "Plan your workflow with the abilities you have to accomplish the user request. \
             Make sure your use of abilities is appropriate; an ability may appear more than once.",
        ));
        prompt.push_str(&section(
            "Output format",
            "[{ability1.name}, {ability2.name}, ...] sequential and well-organized, with no additional information",
        ));
        prompt.push_str(&section("Output example", "[do_step_one, do_step_two, do_step_three]"));
        prompt.push_str(&section("Abilities", &abilities));
        Self {
            capabilities,
            prompt,
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// 从回复中取 `[a, b, c]`，只保留已注册的能力名
    pub fn parse(&self, reply: &str) -> Vec<String> {
        let (Some(start), Some(end)) = (reply.find('['), reply.rfind(']')) else {
            return Vec::new();
        };
        if end <= start {
            return Vec::new();
        }
        reply[start + 1..end]
            .split(',')
            .map(|s| s.trim().trim_matches(|c| c == '"' || c == '\'' || c == '`').trim())
            .filter(|s| self.capabilities.contains(s))
            .map(str::to_string)
            .collect()
    }

    pub fn invoke(&self, brain: &Brain) -> Result<Vec<String>, AgentError> {
        if self.capabilities.is_empty() {
            return Ok(Vec::new());
        }
        let reply = brain.complete(&self.prompt)?;
        let plan = self.parse(&reply);
        tracing::debug!(?plan, "schedule");
        Ok(plan)
    }
}
