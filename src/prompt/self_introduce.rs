//! 自我介绍：只根据当前能力说明自己能做什么

use serde_json::Value;

use crate::agent::AgentProfile;
use crate::capability::Description;
use crate::core::AgentError;
use crate::llm::Brain;
use crate::prompt::section;

pub struct SelfIntroducePrompt {
    prompt: String,
}

/// 介绍时只保留名称与简要描述，参数与返回值对介绍没有帮助
fn brief(profile: &AgentProfile) -> Value {
    let abilities: Vec<Value> = profile
        .capabilities
        .iter()
        .map(|d| {
            let description = match &d.description {
                Description::Text(t) => Value::String(t.clone()),
                Description::Structured(s) => Value::String(format!(
                    "{} {}",
                    s.brief_description, s.detailed_description
                )),
            };
            serde_json::json!({ "capability_name": d.capability_name, "description": description })
        })
        .collect();
    serde_json::json!({ "name": profile.name, "abilities": abilities })
}

impl SelfIntroducePrompt {
    pub fn new(profile: &AgentProfile) -> Self {
        let info = serde_json::to_string_pretty(&brief(profile)).unwrap_or_default();
        let mut prompt = String::new();
        prompt.push_str(&section(
            "Task",
            "Introduce yourself briefly based on the information provided. \
             Only tell what you exactly can do based on your abilities.",
        ));
        prompt.push_str(&section("Your name", &profile.name));
        prompt.push_str(&section("Information", &info));
        prompt.push_str(&section("Output format", "My name is <name>. What can I do: ..."));
        Self { prompt }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn invoke(&self, brain: &Brain) -> Result<String, AgentError> {
        let intro = brain.complete(&self.prompt)?;
        tracing::debug!(intro = %intro, "self introduction");
        Ok(intro.trim().to_string())
    }
}
