//! 执行器：调用选中的能力，再让 LLM 给出结构化摘要
//!
//! 摘要对象必须包含 capability / arguments / result / summary 四个键，缺失时有界重试。
//! 委派能力的参数在摘要与账本中统一脱敏为 "asked for a favor"。
//! 能力本身抛出的错误不在这里处理，原样上抛。

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::capability::{delegation, Arguments, Capability};
use crate::core::{AgentError, RecoveryEngine};
use crate::llm::Brain;
use crate::memory::{ActionRecord, Ledger};
use crate::observability::Telemetry;
use crate::prompt::reply::parse_summary_object;
use crate::prompt::{section, ReplyViolation};

/// 委派能力参数的脱敏文本
pub const FAVOR: &str = "asked for a favor";

const REQUIRED_KEYS: [&str; 4] = ["capability", "arguments", "result", "summary"];

/// LLM 需要输出的摘要对象（schemars 生成 Schema 拼入 prompt）
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExecutionSummary {
    /// Name of the ability you just used
    pub capability: String,
    /// The params you used
    pub arguments: Value,
    /// What the ability returned
    pub result: Value,
    /// One or two sentences telling what you have done and what came out of it
    pub summary: String,
}

/// 一次执行的产物：写入账本的结构化记录、自然语言摘要，以及委派带回的子账本
#[derive(Debug, Clone)]
pub struct Execution {
    pub record: ActionRecord,
    pub summary: String,
    pub imported: Option<Ledger>,
}

fn summary_schema_json() -> String {
    let schema = schema_for!(ExecutionSummary);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

fn parse_summary(reply: &str) -> Result<String, ReplyViolation> {
    let object = parse_summary_object(reply, &REQUIRED_KEYS)?;
    Ok(match object.get("summary") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    })
}

pub struct ExecutorPrompt<'a> {
    capability: &'a Capability,
    arguments: &'a Arguments,
}

impl<'a> ExecutorPrompt<'a> {
    pub fn new(capability: &'a Capability, arguments: &'a Arguments) -> Self {
        Self {
            capability,
            arguments,
        }
    }

    /// 摘要中展示的参数（委派能力脱敏）
    fn shown_arguments(&self) -> Value {
        if self.capability.is_delegation() {
            json!(FAVOR)
        } else {
            Value::Object(self.arguments.clone())
        }
    }

    fn summary_prompt(&self, arguments: &Value, returned: &Value) -> String {
        let ability = serde_json::to_string_pretty(&self.capability.descriptor())
            .unwrap_or_else(|_| self.capability.name().to_string());
        let mut prompt = String::new();
        prompt.push_str(&section(
            "Precondition",
            "Below is an ability you just used, the params you chose for it, and what it returned.",
        ));
        prompt.push_str(&section("Ability", &ability));
        prompt.push_str(&section("Params", &arguments.to_string()));
        prompt.push_str(&section("Result", &returned.to_string()));
        prompt.push_str(&section(
            "Task",
            "Explain what you have done. Output exactly one JSON object following <schema>; \
             copy the ability name, params and result as given, and write the summary in your own words.",
        ));
        prompt.push_str(&section("Schema", &format!("<schema>\n{}\n</schema>", summary_schema_json())));
        prompt.push_str(&section(
            "Output example",
            r#"{"capability": "open_calculator", "arguments": {}, "result": true, "summary": "I opened the calculator for you."}"#,
        ));
        prompt
    }

    pub fn execute(
        &self,
        brain: &Brain,
        telemetry: &Telemetry,
        recovery: &RecoveryEngine,
        max_retries: usize,
    ) -> Result<Execution, AgentError> {
        let name = self.capability.name();
        let raw = self
            .capability
            .invoke(self.arguments)
            .map_err(|source| AgentError::capability(name, source))?;
        let (returned, imported) = if self.capability.is_delegation() {
            delegation::unpack(raw)
        } else {
            (raw, None)
        };
        tracing::debug!(capability = name, returned = %returned, "capability returned");

        let arguments = self.shown_arguments();
        let prompt = self.summary_prompt(&arguments, &returned);
        let summary = recovery.retry(brain, telemetry, "executor", &prompt, max_retries, parse_summary)?;

        Ok(Execution {
            record: ActionRecord {
                capability: name.to_string(),
                arguments,
                returned,
            },
            summary,
            imported,
        })
    }
}
