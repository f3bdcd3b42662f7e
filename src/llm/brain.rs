//! Brain：控制循环使用的同步神谕句柄
//!
//! 包装 Arc<dyn LlmClient>，把 complete / complete_stream 转成阻塞调用。

use std::fmt;
use std::sync::Arc;

use futures_util::StreamExt;

use crate::llm::{LlmClient, LlmError};
use crate::runtime;

/// 可克隆的同步 LLM 句柄；多个 Agent 可共享同一个后端
#[derive(Clone)]
pub struct Brain {
    client: Arc<dyn LlmClient>,
}

impl fmt::Debug for Brain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Brain")
            .field("model", &self.client.model_name())
            .finish()
    }
}

impl Brain {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    pub fn model_name(&self) -> &str {
        self.client.model_name()
    }

    /// 阻塞式非流式完成
    pub fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let client = self.client.clone();
        runtime::block_on(async move { client.complete(prompt).await })
            .map_err(|e| LlmError::Runtime(e.to_string()))?
    }

    /// 阻塞式流式完成：每到达一个 chunk 回调一次 on_chunk，返回拼接后的全文
    pub fn stream<F>(&self, prompt: &str, mut on_chunk: F) -> Result<String, LlmError>
    where
        F: FnMut(&str) + Send,
    {
        let client = self.client.clone();
        runtime::block_on(async move {
            let mut stream = client.complete_stream(prompt).await?;
            let mut full = String::new();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                on_chunk(&chunk);
                full.push_str(&chunk);
            }
            Ok(full)
        })
        .map_err(|e| LlmError::Runtime(e.to_string()))?
    }
}
