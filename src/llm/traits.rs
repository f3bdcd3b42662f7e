//! LLM 客户端抽象（即「神谕」）
//!
//! 所有后端实现 LlmClient：complete（非流式）、complete_stream（流式 Token）。
//! 本层不假设任何结构化的 function calling，一切结构由上层协议强制。

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{stream, Stream};
use thiserror::Error;

/// 流式完成返回的 Token 流
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// 神谕适配层的传输错误（超时、限流等由适配层自行处理，这里只做透传）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Request(String),

    #[error("Rate limited, retry after {retry_after_ms} ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("LLM returned no content")]
    EmptyResponse,

    #[error("Blocking bridge failed: {0}")]
    Runtime(String),
}

/// LLM 客户端 trait：非流式完成与流式完成（返回 Token 流）
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    /// 流式完成，默认把整段回复作为单个 chunk
    async fn complete_stream(&self, prompt: &str) -> Result<CompletionStream, LlmError> {
        let content = self.complete(prompt).await?;
        Ok(Box::pin(stream::iter(vec![Ok(content)])))
    }

    /// 模型标识，用于致命错误中指明是哪个模型不胜任
    fn model_name(&self) -> &str {
        "unknown"
    }
}
