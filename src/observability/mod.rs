//! 可观测性：全局 subscriber 安装，以及按 Agent 注入的 Telemetry 句柄

pub mod events;

pub use events::AgentEvent;

use tokio::sync::mpsc::UnboundedSender;
use tracing::Span;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 安装 fmt + EnvFilter（默认 info，可通过 RUST_LOG 覆盖）
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}

/// 显式作用域的遥测句柄：构造 Agent 时注入，替代模块级日志单例
#[derive(Debug, Clone)]
pub struct Telemetry {
    span: Span,
    events: Option<UnboundedSender<AgentEvent>>,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::disabled()
    }
}

impl Telemetry {
    /// 以 agent 名称开一个 span
    pub fn for_agent(name: &str) -> Self {
        Self {
            span: tracing::info_span!("agent", name = %name),
            events: None,
        }
    }

    /// 不记录 span、不推送事件
    pub fn disabled() -> Self {
        Self {
            span: Span::none(),
            events: None,
        }
    }

    pub fn with_events(mut self, tx: UnboundedSender<AgentEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// 推送事件；接收端已关闭时忽略
    pub fn emit(&self, event: AgentEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}
