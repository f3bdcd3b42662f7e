//! Agent 编排器
//!
//! RESOLVE -> LOOP{ 预算检查 -> [停止?] -> 选择下一步 -> 执行 -> 记账 } -> 结论 -> 重置。
//! 每次 assign / relay 都重置本任务状态（账本、步数、终止概率）；结论之后再次重置，Agent 可复用。
//! 委派能力在参数校验之后注入 request / memory / depth 三个隐式参数。

pub mod builder;

pub use builder::AgentBuilder;

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::capability::{self, Capability, CapabilityDescriptor, CapabilitySet};
use crate::core::{AgentError, RecoveryEngine, TerminationPolicy};
use crate::llm::Brain;
use crate::memory::Ledger;
use crate::observability::{AgentEvent, Telemetry};
use crate::prompt::{
    Decision, ExecutorPrompt, IntrospectionPrompt, NextMovePrompt, RequestResolverPrompt,
    ResolvedRequest, SchedulerPrompt, SelfIntroducePrompt,
};

/// 一次任务的对外结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,
    pub response: String,
}

/// 结果 + 重置前的账本快照（委派时随信封带回父 Agent）
#[derive(Debug, Clone)]
pub struct Report {
    pub outcome: Outcome,
    pub memory: Ledger,
}

/// 自我描述：名称、模型、能力列表
#[derive(Debug, Clone, Serialize)]
pub struct AgentProfile {
    pub name: String,
    pub brain: String,
    pub capabilities: Vec<CapabilityDescriptor>,
}

/// 运行期设置（来自 AppConfig 或构建器）
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub next_move_retries: usize,
    pub executor_retries: usize,
    pub max_depth: usize,
    pub stream_conclusion: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            next_move_retries: 6,
            executor_retries: 3,
            max_depth: 8,
            stream_conclusion: false,
        }
    }
}

pub struct Agent {
    name: String,
    brain: Brain,
    capabilities: CapabilitySet,
    memory: Ledger,
    termination: TerminationPolicy,
    request: ResolvedRequest,
    step: usize,
    depth: usize,
    /// 自我介绍缓存；能力变化后失效
    introduction: Option<String>,
    telemetry: Telemetry,
    recovery: RecoveryEngine,
    settings: Settings,
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("brain", &self.brain)
            .field("capabilities", &self.capabilities.names())
            .field("step", &self.step)
            .field("memory", &self.memory.len())
            .finish()
    }
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(&self.profile()).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

impl Agent {
    pub fn builder(brain: Brain) -> AgentBuilder {
        AgentBuilder::new(brain)
    }

    /// 默认设置 + 给定能力
    pub fn new(brain: Brain, capabilities: impl IntoIterator<Item = Capability>) -> Result<Self, AgentError> {
        AgentBuilder::new(brain).capabilities(capabilities).build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn brain(&self) -> &Brain {
        &self.brain
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn memory(&self) -> &Ledger {
        &self.memory
    }

    pub fn termination(&self) -> &TerminationPolicy {
        &self.termination
    }

    pub fn termination_mut(&mut self) -> &mut TerminationPolicy {
        &mut self.termination
    }

    pub fn request(&self) -> &ResolvedRequest {
        &self.request
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn max_depth(&self) -> usize {
        self.settings.max_depth
    }

    pub fn profile(&self) -> AgentProfile {
        AgentProfile {
            name: self.name.clone(),
            brain: self.brain.model_name().to_string(),
            capabilities: self.capabilities.descriptors(),
        }
    }

    // ---------- 能力 ----------

    /// 授予能力；同名已存在时忽略并返回 false
    pub fn grant(&mut self, capability: Capability) -> bool {
        let granted = self.capabilities.grant(capability);
        if granted {
            self.introduction = None;
        }
        granted
    }

    pub fn grant_all(&mut self, capabilities: impl IntoIterator<Item = Capability>) -> usize {
        capabilities
            .into_iter()
            .map(|c| self.grant(c))
            .filter(|granted| *granted)
            .count()
    }

    pub fn revoke(&mut self, name: &str) -> Option<Capability> {
        let revoked = self.capabilities.revoke(name);
        if revoked.is_some() {
            self.introduction = None;
        }
        revoked
    }

    pub fn revoke_all<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) -> usize {
        names.into_iter().filter(|n| self.revoke(n).is_some()).count()
    }

    /// 按当前能力自我介绍（缓存到能力变化为止）
    pub fn introduce(&mut self) -> Result<String, AgentError> {
        if let Some(intro) = &self.introduction {
            return Ok(intro.clone());
        }
        let intro = SelfIntroducePrompt::new(&self.profile()).invoke(&self.brain)?;
        self.introduction = Some(intro.clone());
        Ok(intro)
    }

    /// 包装为委派能力，交给其他 Agent 使用
    pub fn delegate(self) -> Result<Capability, AgentError> {
        capability::delegate(Arc::new(Mutex::new(self)))
    }

    // ---------- 请求 ----------

    /// 分解新请求并重置本任务状态
    pub fn assign(&mut self, request: &str) -> Result<&mut Self, AgentError> {
        let _entered = self.telemetry.span().clone().entered();
        let resolved = RequestResolverPrompt::new(request).invoke(&self.brain)?;
        tracing::info!(request = %resolved.raw, "request assigned");
        self.telemetry.emit(AgentEvent::Resolved {
            agent: self.name.clone(),
            by_step: resolved.by_step.clone(),
        });
        self.request = resolved;
        self.prepare()?;
        Ok(self)
    }

    pub fn reassign(&mut self, request: &str) -> Result<&mut Self, AgentError> {
        self.assign(request)
    }

    /// 接收已分解好的请求（不再调用分解器）
    pub fn relay(&mut self, request: &str, by_step: &str) -> Result<&mut Self, AgentError> {
        self.request = ResolvedRequest::new(request, by_step);
        tracing::info!(agent = %self.name, request, "request relayed");
        self.prepare()?;
        Ok(self)
    }

    /// 按键取并集并入外部账本，返回新增条数
    pub fn bring_in_memory(&mut self, memory: &Ledger) -> usize {
        let added = self.memory.merge(memory);
        tracing::debug!(agent = %self.name, added, "memory brought in");
        added
    }

    /// 旧式静态计划：能力名序列
    pub fn plan(&self) -> Result<Vec<String>, AgentError> {
        SchedulerPrompt::new(&self.request.by_step, &self.capabilities).invoke(&self.brain)
    }

    /// 清空本任务状态：账本、步数、终止概率（预估步数归零）
    pub fn reposition(&mut self) -> &mut Self {
        self.memory.clear();
        self.step = 0;
        self.termination.reset(0);
        self
    }

    fn prepare(&mut self) -> Result<(), AgentError> {
        self.reposition();
        let expected = if self.request.by_step.trim().is_empty() || self.request.is_do_nothing() {
            0
        } else {
            self.plan()?.len()
        };
        self.termination.reset(expected);
        tracing::debug!(agent = %self.name, expected_steps = expected, "steps estimated");
        Ok(())
    }

    // ---------- 执行 ----------

    /// 跑到结论并返回 {success, response}
    pub fn just_do_it(&mut self) -> Result<Outcome, AgentError> {
        self.run().map(|report| report.outcome)
    }

    /// 跑到结论；同时返回重置前的账本快照
    pub fn run(&mut self) -> Result<Report, AgentError> {
        let _entered = self.telemetry.span().clone().entered();
        let outcome = self.drive().and_then(|success| self.conclude(success));
        let memory = std::mem::take(&mut self.memory);
        self.reposition();
        match outcome {
            Ok(outcome) => Ok(Report { outcome, memory }),
            Err(e) => {
                tracing::error!(agent = %self.name, error = %e, "task aborted");
                Err(e)
            }
        }
    }

    pub(crate) fn run_at_depth(&mut self, depth: usize) -> Result<Report, AgentError> {
        self.depth = depth;
        let report = self.run();
        self.depth = 0;
        report
    }

    /// 控制循环；返回任务是否成功
    fn drive(&mut self) -> Result<bool, AgentError> {
        loop {
            self.telemetry.emit(AgentEvent::StepUpdate {
                agent: self.name.clone(),
                step: self.step,
                expected_steps: self.termination.expected_steps(),
            });
            if self.termination.is_over_budget(self.step) {
                let check = self.termination.check();
                tracing::debug!(step = self.step, draw = check.draw, p = check.p, stop = check.stop, "over budget");
                if check.stop {
                    tracing::info!(agent = %self.name, step = self.step, "stopped by termination policy");
                    self.telemetry.emit(AgentEvent::Stopped {
                        agent: self.name.clone(),
                        draw: check.draw,
                        p: check.p,
                    });
                    return Ok(false);
                }
            }

            let decision = NextMovePrompt::new(&self.request, &self.capabilities, &self.memory).invoke(
                &self.brain,
                &self.telemetry,
                &self.recovery,
                self.settings.next_move_retries,
            )?;
            self.telemetry.emit(AgentEvent::Decision {
                agent: self.name.clone(),
                decision: decision.label().to_string(),
                arguments: match &decision {
                    Decision::Act { arguments, .. } => Value::Object(arguments.clone()),
                    _ => json!({}),
                },
            });

            let (name, mut arguments) = match decision {
                Decision::Complete => return Ok(true),
                Decision::Failed => return Ok(false),
                Decision::Act {
                    capability,
                    arguments,
                } => (capability, arguments),
            };
            let capability = self
                .capabilities
                .get(&name)
                .cloned()
                .ok_or_else(|| AgentError::InvalidCapability(format!("{name} is not granted")))?;
            if capability.is_delegation() {
                arguments.insert("request".to_string(), json!(self.request.by_step));
                arguments.insert("memory".to_string(), self.memory.to_value());
                arguments.insert("depth".to_string(), json!(self.depth + 1));
            }

            let execution = ExecutorPrompt::new(&capability, &arguments).execute(
                &self.brain,
                &self.telemetry,
                &self.recovery,
                self.settings.executor_retries,
            )?;
            if let Some(imported) = &execution.imported {
                let added = self.memory.merge(imported);
                tracing::debug!(capability = %name, added, "delegate memory merged");
            }
            tracing::info!(agent = %self.name, capability = %name, summary = %execution.summary, "action performed");
            self.telemetry.emit(AgentEvent::Action {
                agent: self.name.clone(),
                capability: name,
                summary: execution.summary.clone(),
            });
            self.memory
                .record(self.name.clone(), execution.summary, execution.record);
            self.step += 1;
        }
    }

    fn conclude(&mut self, success: bool) -> Result<Outcome, AgentError> {
        let introspection = IntrospectionPrompt::new(&self.request.raw, &self.memory);
        let response = if self.settings.stream_conclusion {
            introspection.stream(&self.brain, &self.telemetry)?
        } else {
            introspection.invoke(&self.brain)?
        };
        tracing::debug!(agent = %self.name, success, conclusion = %response, "concluded");
        self.telemetry.emit(AgentEvent::Concluded {
            agent: self.name.clone(),
            success,
            response: response.clone(),
        });
        Ok(Outcome { success, response })
    }
}
