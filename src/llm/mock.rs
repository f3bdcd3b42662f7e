//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按顺序回放预设回复，并记录收到的每条 prompt，便于断言调用次数与内容。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream;

use crate::llm::{CompletionStream, LlmClient, LlmError};

/// Mock 客户端：脚本化回复
#[derive(Debug, Default)]
pub struct MockLlmClient {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
    fallback: Option<String>,
}

impl MockLlmClient {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
            fallback: None,
        }
    }

    /// 脚本耗尽后一直返回该回复（否则返回 LlmError::EmptyResponse）
    pub fn with_fallback(mut self, reply: impl Into<String>) -> Self {
        self.fallback = Some(reply.into());
        self
    }

    /// 已收到的全部 prompt（按调用顺序）
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// 尚未消费的脚本回复数
    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|q| q.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        if let Ok(mut p) = self.prompts.lock() {
            p.push(prompt.to_string());
        }
        let next = self.replies.lock().ok().and_then(|mut q| q.pop_front());
        next.or_else(|| self.fallback.clone())
            .ok_or(LlmError::EmptyResponse)
    }

    async fn complete_stream(&self, prompt: &str) -> Result<CompletionStream, LlmError> {
        let content = self.complete(prompt).await?;
        // 按空白切分成多个 chunk，模拟逐段到达
        let chunks: Vec<Result<String, LlmError>> = content
            .split_inclusive(' ')
            .map(|s| Ok(s.to_string()))
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
