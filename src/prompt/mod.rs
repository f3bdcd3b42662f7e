//! Prompt 构建层：每个构建器产出一段指令文本，以及与之配套的解析/校验
//!
//! - request_resolver：把原始请求分解为有序步骤
//! - scheduler：旧式静态计划，用于预估步数
//! - next_move：逐步决策（核心状态机），严格格式 + 有界重试
//! - executor：调用能力并生成结构化摘要
//! - introspection：基于账本的最终结论
//! - self_introduce：按当前能力自我介绍
//! - reply：结构化回复解析器（语法规则）

pub mod executor;
pub mod introspection;
pub mod next_move;
pub mod reply;
pub mod request_resolver;
pub mod scheduler;
pub mod self_introduce;

pub use executor::{Execution, ExecutorPrompt, ExecutionSummary};
pub use introspection::IntrospectionPrompt;
pub use next_move::{Decision, NextMovePrompt};
pub use reply::{RawMove, ReplyViolation};
pub use request_resolver::{RequestResolverPrompt, ResolvedRequest, DO_NOTHING};
pub use scheduler::SchedulerPrompt;
pub use self_introduce::SelfIntroducePrompt;

/// 以 `## 标题` 开头的一段 prompt
pub(crate) fn section(title: &str, body: &str) -> String {
    format!("## {}\n{}\n\n", title, body.trim_end())
}
