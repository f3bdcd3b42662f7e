//! Agent 过程事件：用于流式展示分解、决策、动作、恢复与结论

use serde::Serialize;

/// 单步过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// 请求已分解
    Resolved { agent: String, by_step: String },
    /// 步数更新（当前第几步 / 预估步数）
    StepUpdate {
        agent: String,
        step: usize,
        expected_steps: usize,
    },
    /// 终止策略抽样
    Stopped { agent: String, draw: f64, p: f64 },
    /// 下一步决策（能力名或任务令牌）
    Decision {
        agent: String,
        decision: String,
        arguments: serde_json::Value,
    },
    /// 动作已执行并写入账本
    Action {
        agent: String,
        capability: String,
        summary: String,
    },
    /// 协议违规后的重试
    Recovery {
        stage: String,
        attempt: usize,
        violation: String,
    },
    /// 结论的一小段（流式输出）
    ConclusionChunk { text: String },
    /// 最终结论
    Concluded {
        agent: String,
        success: bool,
        response: String,
    },
}
