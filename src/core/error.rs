//! Agent 错误类型
//!
//! 协议违规（ReplyViolation）在本层内部通过重试消化，不会出现在这里；
//! 只有重试耗尽、神谕传输失败、能力调用失败与构造期校验失败才会上抛。

use thiserror::Error;

use crate::llm::LlmError;
use crate::prompt::ReplyViolation;

/// 能力（Capability）调用或注册时的错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CapabilityError {
    #[error("missing argument: {0}")]
    MissingArgument(String),

    #[error("invalid argument {name}: {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("{0}")]
    Failed(String),

    /// 委派链下游 Agent 的神谕重试耗尽；穿过委派边界后还原为 AgentError::OracleIncapable
    #[error("delegate oracle \"{oracle}\" gave up ({stage}, {attempts} attempts, last violation: {last})")]
    OracleIncapable {
        oracle: String,
        stage: &'static str,
        attempts: usize,
        last: ReplyViolation,
    },
}

impl CapabilityError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    /// 子 Agent 的错误交回父 Agent：神谕失败保留结构，其余转为文本
    pub fn from_delegate(error: AgentError) -> Self {
        match error {
            AgentError::OracleIncapable {
                oracle,
                stage,
                attempts,
                last,
            } => Self::OracleIncapable {
                oracle,
                stage,
                attempts,
                last,
            },
            other => Self::Failed(other.to_string()),
        }
    }
}

/// Agent 运行过程中可能上抛的错误
#[derive(Error, Debug)]
pub enum AgentError {
    /// 重试耗尽：模型无法遵守输出协议
    #[error(
        "The model \"{oracle}\" is too dumb to be my brain ({stage}, {attempts} attempts, last violation: {last}); swap it or change its temperature"
    )]
    OracleIncapable {
        oracle: String,
        stage: &'static str,
        attempts: usize,
        last: ReplyViolation,
    },

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Capability {name} failed: {source}")]
    Capability {
        name: String,
        #[source]
        source: CapabilityError,
    },

    #[error("Invalid capability: {0}")]
    InvalidCapability(String),

    #[error("Invalid termination parameters: {0}")]
    InvalidTermination(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl AgentError {
    /// 包装能力调用失败；来自委派链下游的神谕失败还原为 OracleIncapable
    pub fn capability(name: impl Into<String>, source: CapabilityError) -> Self {
        match source {
            CapabilityError::OracleIncapable {
                oracle,
                stage,
                attempts,
                last,
            } => Self::OracleIncapable {
                oracle,
                stage,
                attempts,
                last,
            },
            source => Self::Capability {
                name: name.into(),
                source,
            },
        }
    }
}

impl From<config::ConfigError> for AgentError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
