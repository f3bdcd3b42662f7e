//! 逐步决策（核心状态机 DECIDE）
//!
//! 给定请求、分步描述、完整账本与能力集合，要求 LLM：
//! 按时间列出相关历史 -> 判断请求是否已完成 -> 若未完成判断能力能否推进 ->
//! 选一个能力并给出有理由的参数 / 或输出任务失败 / 任务完成令牌。
//! 回复必须满足 reply 模块的语法；能力名与参数键再做语义校验，违规由 RecoveryEngine 有界重试。

use crate::capability::{Arguments, CapabilitySet};
use crate::core::{AgentError, RecoveryEngine};
use crate::llm::Brain;
use crate::memory::Ledger;
use crate::observability::Telemetry;
use crate::prompt::reply::{self, END_TOKEN, MISSION_COMPLETE, MISSION_FAILED, SEPARATOR};
use crate::prompt::{section, ReplyViolation, ResolvedRequest};

/// 一次决策的结果
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// 请求已完成（true）
    Complete,
    /// 无能力可推进（false）
    Failed,
    /// 执行一个能力
    Act {
        capability: String,
        arguments: Arguments,
    },
}

impl Decision {
    /// 决策名称：能力名或任务令牌
    pub fn label(&self) -> &str {
        match self {
            Decision::Complete => MISSION_COMPLETE,
            Decision::Failed => MISSION_FAILED,
            Decision::Act { capability, .. } => capability,
        }
    }
}

fn output_example() -> String {
    format!(
        r#"Step 1: In the history, "buying two tomatoes" and "going home" already happened, in that order.
Step 2: The request also asks to cook the tomatoes with a frying pan and to put them on the dining table; those parts are still pending, so the request is not fully accomplished.
Step 3: Among my abilities, "do_cook" can complete the cooking and "arrange_dishes" can complete the placing.
Step 4: "do_cook" is the most relevant next move because cooking must happen before placing. I use "tomatoes" as the ingredient and "frying pan" as the utensil because the request names them exactly.
Step 5: Not applicable, an ability can advance the request.
Step 6: Not applicable, the request is not accomplished yet.
{SEPARATOR}
{{
  "ingredient": "tomatoes",
  "cooking_utensils": "frying pan"
}}
[do_cook]
{END_TOKEN}"#
    )
}

pub struct NextMovePrompt<'a> {
    capabilities: &'a CapabilitySet,
    prompt: String,
}

impl<'a> NextMovePrompt<'a> {
    pub fn new(request: &ResolvedRequest, capabilities: &'a CapabilitySet, memory: &Ledger) -> Self {
        let abilities = serde_json::to_string_pretty(&capabilities.descriptors())
            .unwrap_or_else(|_| "[]".to_string());
        let history = memory
            .to_prompt_json()
            .unwrap_or_else(|| "Nothing happened before you.".to_string());

        let mut prompt = String::new();
        prompt.push_str(&section(
            "Precondition",
            "Below are the abilities you have (you can only use these abilities). \
             <history> shows the events that happened before you, and there is a <user_request>.",
        ));
        prompt.push_str(&section(
            "User request",
            &format!("<user_request>{}</user_request>", request.raw),
        ));
        prompt.push_str(&section(
            "User request by step",
            &format!("<user_request_by_step>\n{}\n</user_request_by_step>", request.by_step),
        ));
        prompt.push_str(&section("Abilities", &abilities));
        prompt.push_str(&section("History", &format!("<history>\n{history}\n</history>")));
        prompt.push_str(&section(
            "Instructions you must follow step by step",
            &format!(
                "1. Find the events in <history> related to <user_request> and list them in the order they occurred.\n\
                 2. Analyse whether <user_request> has been fully and properly accomplished, and give your basis.\n\
                 3. If not fully accomplished: analyse whether your abilities can complete the unfinished part.\n\
                 4. If not fully accomplished and an ability can advance it: choose the single most relevant ability \
                 as your next move and explain it. Then explain, and generate, the values of its params.\n\
                 5. If not fully accomplished and no ability can advance it: choose the special ability \
                 \"{MISSION_FAILED}\" (not a real ability).\n\
                 6. If fully accomplished: choose the special ability \"{MISSION_COMPLETE}\" (not a real ability)."
            ),
        ));
        prompt.push_str(&section(
            "Output format",
            &format!(
                "{{step1_thought_process}}\n...\n{{step6_thought_process}}\n{SEPARATOR}\n\
                 {{\"name_of_param_1\": value_for_param_1, ...}}\n[ability.name]\n{END_TOKEN}"
            ),
        ));
        prompt.push_str(&section(
            "Hints",
            &format!(
                "- Output the thought processes of all steps (1 to 6).\n\
                 - Output \"{SEPARATOR}\" exactly once, after the thought processes.\n\
                 - After it output exactly one JSON object with the params of the chosen ability only \
                 (use {{}} for the special abilities), then the chosen ability name surrounded by \"[ ]\".\n\
                 - Only one single ability can be chosen.\n\
                 - Finish with \"{END_TOKEN}\" exactly once."
            ),
        ));
        prompt.push_str(&section("Output example", &output_example()));

        Self {
            capabilities,
            prompt,
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// 合法名称：已注册能力 + 两个任务令牌
    pub fn valid_names(&self) -> Vec<String> {
        let mut names = self.capabilities.names();
        names.push(MISSION_COMPLETE.to_string());
        names.push(MISSION_FAILED.to_string());
        names
    }

    /// 语法解析 + 语义校验（能力名、参数键）
    pub fn parse(&self, reply: &str) -> Result<Decision, ReplyViolation> {
        let mv = reply::parse_next_move(reply)?;
        if mv.is_complete() {
            return Ok(Decision::Complete);
        }
        if mv.is_failed() {
            return Ok(Decision::Failed);
        }
        let capability = self.capabilities.get(&mv.name).ok_or_else(|| {
            ReplyViolation::UnknownCapability {
                name: mv.name.clone(),
                valid: self.valid_names(),
            }
        })?;
        capability.validate_arguments(&mv.arguments)?;
        Ok(Decision::Act {
            capability: mv.name,
            arguments: mv.arguments,
        })
    }

    pub fn invoke(
        &self,
        brain: &Brain,
        telemetry: &Telemetry,
        recovery: &RecoveryEngine,
        max_retries: usize,
    ) -> Result<Decision, AgentError> {
        tracing::debug!(prompt = %self.prompt, "next move prompt");
        let decision = recovery.retry(brain, telemetry, "next_move", &self.prompt, max_retries, |r| {
            self.parse(r)
        })?;
        tracing::info!(decision = decision.label(), "next move");
        Ok(decision)
    }
}
