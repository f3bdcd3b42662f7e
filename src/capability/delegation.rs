//! 委派适配器：把一个 Agent 包装成父 Agent 的普通能力
//!
//! 名称 `__delegate__talk_to_<child>`；显式参数 `instruction`（交给子 Agent 的具体请求），
//! 隐式参数 `request`（父 Agent 的分步描述）、`memory`（父账本快照）、`depth`（委派深度），
//! 由编排器在参数校验之后注入。
//!
//! 子 Agent 跑完整个控制循环后，返回信封 `{success, response, memory}`；
//! 执行器用 [`unpack`] 拆出子账本并入父账本。
//! 深度超过上限、或子 Agent 正在运行（委派成环）时，以普通返回值拒绝，而不是报错或死锁。

use std::sync::{Arc, Mutex, TryLockError};

use serde_json::{json, Map, Value};

use crate::agent::Agent;
use crate::capability::{str_arg, Arguments, ArgDoc, Capability, ParamKind, StructuredDescription};
use crate::core::{AgentError, CapabilityError};
use crate::memory::Ledger;

/// 委派能力名前缀（编排器据此识别委派能力）
pub const DELEGATION_PREFIX: &str = "__delegate__talk_to_";

/// 委派能力的显式参数
pub const INSTRUCTION: &str = "instruction";

fn refusal(child: &str, reason: &str) -> Value {
    json!({
        "success": false,
        "response": format!("{child} refused the favor: {reason}."),
    })
}

fn describe(child: &str, introduction: &str) -> StructuredDescription {
    let mut extra = Map::new();
    extra.insert(
        format!("self_introduction_from_{child}"),
        Value::String(introduction.to_string()),
    );
    extra.insert(
        "hint".to_string(),
        Value::String(format!(
            "By reading <self_introduction_from_{child}>, you can learn what {child} can do, \
             and then decide whether to initiate a conversation with {child} according to its abilities."
        )),
    );
    StructuredDescription {
        brief_description: format!("Initiates a conversation with \"{child}\" to use its abilities."),
        detailed_description: format!(
            "First, carefully consider and explore {child}'s potential abilities in solving your tasks, \
             then, if you need {child}'s help, you must tell comprehensively, precisely and exactly \
             what you need {child} to do."
        ),
        args: vec![ArgDoc {
            name: INSTRUCTION.to_string(),
            kind: ParamKind::String,
            description: format!(
                "A comprehensive, precise and exact instruction to be processed by {child}."
            ),
        }],
        returns: format!("{child}'s response to your instruction."),
        extra,
    }
}

/// 把共享的子 Agent 包装为委派能力（会调用一次子 Agent 的自我介绍）
pub fn delegate(child: Arc<Mutex<Agent>>) -> Result<Capability, AgentError> {
    let (name, introduction, max_depth) = {
        let mut agent = child
            .lock()
            .map_err(|_| AgentError::InvalidCapability("delegate agent lock poisoned".to_string()))?;
        let introduction = agent.introduce()?;
        (agent.name().to_string(), introduction, agent.max_depth())
    };
    tracing::debug!(child = %name, "delegation capability generated");

    let child_name = name.clone();
    Capability::builder(format!("{DELEGATION_PREFIX}{name}"))
        .description(describe(&name, &introduction))
        .param(INSTRUCTION, ParamKind::String, "instruction for the delegate")
        .returns("str")
        .delegation()
        .sync(move |args: &Arguments| {
            let instruction = str_arg(args, INSTRUCTION)?;
            let by_step = args
                .get("request")
                .and_then(Value::as_str)
                .unwrap_or(instruction);
            let depth = args.get("depth").and_then(Value::as_u64).unwrap_or(1) as usize;
            if depth > max_depth {
                tracing::warn!(child = %child_name, depth, max_depth, "delegation too deep");
                return Ok(refusal(&child_name, "the delegation chain is too deep"));
            }
            let memory = match args.get("memory") {
                Some(v) if !v.is_null() => {
                    Ledger::from_value(v.clone()).map_err(|e| CapabilityError::InvalidArgument {
                        name: "memory".to_string(),
                        reason: e.to_string(),
                    })?
                }
                _ => Ledger::new(),
            };

            let mut agent = match child.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::WouldBlock) => {
                    tracing::warn!(child = %child_name, "delegation cycle");
                    return Ok(refusal(&child_name, "it is busy with a task already"));
                }
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            };
            agent
                .relay(instruction, by_step)
                .map_err(CapabilityError::from_delegate)?;
            agent.bring_in_memory(&memory);
            let report = agent
                .run_at_depth(depth)
                .map_err(CapabilityError::from_delegate)?;
            Ok(json!({
                "success": report.outcome.success,
                "response": report.outcome.response,
                "memory": report.memory.to_value(),
            }))
        })
}

/// 拆信封：返回 (对父 Agent 可见的结果, 子账本)
pub fn unpack(raw: Value) -> (Value, Option<Ledger>) {
    match raw {
        Value::Object(mut envelope) => {
            let ledger = envelope.remove("memory").and_then(|m| match Ledger::from_value(m) {
                Ok(l) => Some(l),
                Err(e) => {
                    tracing::warn!(error = %e, "delegate returned an unreadable ledger");
                    None
                }
            });
            (Value::Object(envelope), ledger)
        }
        other => (other, None),
    }
}
