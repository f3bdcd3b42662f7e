//! Foreman - 由 LLM 驱动的自主任务执行循环
//!
//! 模块划分：
//! - **agent**: 编排器（分解 -> 逐步决策 -> 执行 -> 记账 -> 结论）与构建器
//! - **capability**: 能力描述符、注册表、委派适配器
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误、有界重试恢复、自适应终止策略
//! - **llm**: LLM 客户端抽象、同步 Brain 句柄与 Mock
//! - **memory**: 任务内只追加账本
//! - **observability**: tracing 初始化、Telemetry 句柄与过程事件
//! - **prompt**: 各阶段 prompt 构建与严格格式回复解析
//! - **runtime**: 异步到同步的阻塞桥

pub mod agent;
pub mod capability;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod prompt;
pub mod runtime;

pub use agent::{Agent, AgentBuilder, AgentProfile, Outcome, Report};
pub use capability::{Arguments, Capability, CapabilitySet, ParamKind};
pub use crate::config::{load_config, AppConfig};
pub use crate::core::{AgentError, CapabilityError, Personality};
pub use llm::{Brain, LlmClient, LlmError, MockLlmClient};
pub use memory::Ledger;
