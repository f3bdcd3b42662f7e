//! 错误恢复引擎
//!
//! 把协议违规（ReplyViolation）映射为一段有针对性的纠正提示，拼到原 prompt 之后重新发给神谕；
//! 重试次数有上限，耗尽后抛出 AgentError::OracleIncapable。

use crate::core::AgentError;
use crate::llm::Brain;
use crate::observability::{AgentEvent, Telemetry};
use crate::prompt::reply::{END_TOKEN, MISSION_COMPLETE, MISSION_FAILED, SEPARATOR};
use crate::prompt::ReplyViolation;

/// 语义化错误恢复：违规 -> 纠正提示
#[derive(Debug, Default, Clone, Copy)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    /// 根据违规类型给出纠正提示
    pub fn correction(&self, violation: &ReplyViolation) -> String {
        match violation {
            ReplyViolation::SeparatorCount(n) => format!(
                "Your previous output contained {n} \"{SEPARATOR}\" separators. \
                 You must output \"{SEPARATOR}\" exactly once, after all your thought processes."
            ),
            ReplyViolation::EndTokenCount(n) => format!(
                "Your previous output contained {n} \"{END_TOKEN}\" tokens. \
                 You must output \"{END_TOKEN}\" exactly once, as the very last line."
            ),
            ReplyViolation::EndBeforeSeparator => format!(
                "In your previous output \"{END_TOKEN}\" came before \"{SEPARATOR}\". \
                 Output \"{SEPARATOR}\", then the params and the ability, then \"{END_TOKEN}\"."
            ),
            ReplyViolation::ObjectCount(n) => format!(
                "Your previous output contained {n} JSON objects after \"{SEPARATOR}\". \
                 Output exactly one JSON object holding the params (use {{}} when there are none)."
            ),
            ReplyViolation::MalformedObject(e) => format!(
                "The params in your previous output were not a valid JSON object ({e}). \
                 Output the params as one valid JSON object."
            ),
            ReplyViolation::NameTokenCount(n) => format!(
                "Your previous output contained {n} bracketed names after \"{SEPARATOR}\". \
                 Output exactly one ability name surrounded by \"[ ]\", e.g. [ability_name]."
            ),
            ReplyViolation::UnknownCapability { name, valid } => format!(
                "\"{name}\" is not one of your abilities. You can only choose one of {:?}, \
                 or \"{MISSION_COMPLETE}\" / \"{MISSION_FAILED}\".",
                valid
            ),
            ReplyViolation::UnexpectedArguments {
                capability,
                unexpected,
                expected,
            } => format!(
                "Ability \"{capability}\" does not accept the params {:?}. \
                 Its params are exactly {:?}.",
                unexpected, expected
            ),
            ReplyViolation::MissingArguments {
                capability,
                missing,
                expected,
            } => format!(
                "Ability \"{capability}\" needs the params {:?} which you did not provide. \
                 Its params are {:?}.",
                missing, expected
            ),
            ReplyViolation::MissingKeys { missing, required } => format!(
                "Your previous output lacked the keys {:?}. \
                 Output one JSON object containing all of {:?}.",
                missing, required
            ),
        }
    }

    /// 带纠正提示的有界重试：首次调用 + 最多 max_retries 次重发
    pub fn retry<T, F>(
        &self,
        brain: &Brain,
        telemetry: &Telemetry,
        stage: &'static str,
        prompt: &str,
        max_retries: usize,
        mut parse: F,
    ) -> Result<T, AgentError>
    where
        F: FnMut(&str) -> Result<T, ReplyViolation>,
    {
        let mut attempt_prompt = prompt.to_string();
        let mut attempts = 0;
        loop {
            attempts += 1;
            let reply = brain.complete(&attempt_prompt)?;
            tracing::debug!(stage, attempts, reply = %reply, "oracle reply");
            let violation = match parse(&reply) {
                Ok(v) => return Ok(v),
                Err(v) => v,
            };
            if attempts > max_retries {
                tracing::error!(stage, attempts, %violation, "retries exhausted");
                return Err(AgentError::OracleIncapable {
                    oracle: brain.model_name().to_string(),
                    stage,
                    attempts,
                    last: violation,
                });
            }
            let correction = self.correction(&violation);
            tracing::warn!(stage, attempts, %violation, "protocol violation, reissuing");
            telemetry.emit(AgentEvent::Recovery {
                stage: stage.to_string(),
                attempt: attempts,
                violation: violation.to_string(),
            });
            attempt_prompt = format!(
                "{prompt}\n\n[correction] Attempt {attempts} was rejected. {correction}"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use std::sync::Arc;

    fn strict(reply: &str) -> Result<usize, ReplyViolation> {
        reply
            .parse::<usize>()
            .map_err(|e| ReplyViolation::MalformedObject(e.to_string()))
    }

    #[test]
    fn test_correction_unknown_capability_lists_names() {
        let msg = RecoveryEngine::new().correction(&ReplyViolation::UnknownCapability {
            name: "fly".to_string(),
            valid: vec!["calculator".to_string(), "write_file".to_string()],
        });
        assert!(msg.contains("fly"));
        assert!(msg.contains("calculator"));
        assert!(msg.contains(MISSION_COMPLETE));
    }

    #[test]
    fn test_correction_unexpected_arguments_lists_keys() {
        let msg = RecoveryEngine::new().correction(&ReplyViolation::UnexpectedArguments {
            capability: "calculator".to_string(),
            unexpected: vec!["expression".to_string()],
            expected: vec!["expr".to_string()],
        });
        assert!(msg.contains("expression"));
        assert!(msg.contains("\"expr\""));
    }

    #[test]
    fn test_retry_recovers_and_amends_prompt() {
        let mock = Arc::new(MockLlmClient::new(["nope", "7"]));
        let brain = Brain::new(mock.clone());
        let out = RecoveryEngine::new()
            .retry(&brain, &Telemetry::disabled(), "test", "base", 3, strict)
            .unwrap();
        assert_eq!(out, 7);
        let prompts = mock.prompts();
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[0], "base");
        assert!(prompts[1].starts_with("base"));
        assert!(prompts[1].contains("[correction]"));
    }

    #[test]
    fn test_retry_exhaustion_is_fatal_and_bounded() {
        let mock = Arc::new(MockLlmClient::default().with_fallback("never a number"));
        let brain = Brain::new(mock.clone());
        let err = RecoveryEngine::new()
            .retry(&brain, &Telemetry::disabled(), "test", "base", 2, strict)
            .unwrap_err();
        match err {
            AgentError::OracleIncapable {
                oracle, attempts, ..
            } => {
                assert_eq!(oracle, "mock");
                assert_eq!(attempts, 3);
            }
            other => panic!("Expected OracleIncapable, got {other:?}"),
        }
        assert_eq!(mock.call_count(), 3);
    }
}
