//! Agent 构建器：统一的 Agent 初始化逻辑
//!
//! 可逐项设置，也可从 AppConfig 一次性读取；build 时校验终止参数并（可选）分解初始请求。

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::agent::{Agent, Settings};
use crate::capability::{delegate, Capability, CapabilitySet};
use crate::config::AppConfig;
use crate::core::{AgentError, Personality, RecoveryEngine, TerminationPolicy};
use crate::llm::Brain;
use crate::memory::Ledger;
use crate::observability::{AgentEvent, Telemetry};
use crate::prompt::ResolvedRequest;

/// 未命名时生成 `agent-<6 位十六进制>`
fn generate_name() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("agent-{}", &id[..6])
}

/// Agent 构建器
pub struct AgentBuilder {
    brain: Brain,
    name: Option<String>,
    capabilities: Vec<Capability>,
    delegates: Vec<Arc<Mutex<Agent>>>,
    personality: Personality,
    p_beta: Option<(f64, f64)>,
    samples: usize,
    seed: Option<u64>,
    request: Option<String>,
    events: Option<UnboundedSender<AgentEvent>>,
    settings: Settings,
}

impl AgentBuilder {
    pub fn new(brain: Brain) -> Self {
        Self {
            brain,
            name: None,
            capabilities: Vec::new(),
            delegates: Vec::new(),
            personality: Personality::Prudent,
            p_beta: None,
            samples: 1,
            seed: None,
            request: None,
            events: None,
            settings: Settings::default(),
        }
    }

    /// 从配置创建：名称、性格 / p、beta、抽样次数、重试上限、委派深度、流式结论
    pub fn from_config(config: &AppConfig, brain: Brain) -> Self {
        let mut builder = Self::new(brain)
            .personality(config.agent.personality)
            .samples(config.agent.samples)
            .next_move_retries(config.protocol.next_move_retries)
            .executor_retries(config.protocol.executor_retries)
            .max_depth(config.delegation.max_depth)
            .stream_conclusion(config.conclusion.stream);
        if let Some(name) = &config.agent.name {
            builder = builder.name(name);
        }
        if let (Some(p), Some(beta)) = (config.agent.p, config.agent.beta) {
            builder = builder.termination(p, beta);
        }
        builder
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    pub fn capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities.extend(capabilities);
        self
    }

    /// 把另一个 Agent 作为委派能力授予（build 时生成，会请求一次对方的自我介绍）
    pub fn delegate(mut self, agent: Arc<Mutex<Agent>>) -> Self {
        self.delegates.push(agent);
        self
    }

    /// 使用性格预设（会清除显式的 p / beta）
    pub fn personality(mut self, personality: Personality) -> Self {
        self.personality = personality;
        self.p_beta = None;
        self
    }

    /// 显式终止参数，覆盖性格预设
    pub fn termination(mut self, p: f64, beta: f64) -> Self {
        self.p_beta = Some((p, beta));
        self
    }

    pub fn samples(mut self, samples: usize) -> Self {
        self.samples = samples;
        self
    }

    /// 固定终止策略的随机种子（测试用）
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// 初始请求：build 时分解
    pub fn request(mut self, request: impl Into<String>) -> Self {
        self.request = Some(request.into());
        self
    }

    pub fn events(mut self, tx: UnboundedSender<AgentEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn next_move_retries(mut self, retries: usize) -> Self {
        self.settings.next_move_retries = retries;
        self
    }

    pub fn executor_retries(mut self, retries: usize) -> Self {
        self.settings.executor_retries = retries;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.settings.max_depth = depth;
        self
    }

    pub fn stream_conclusion(mut self, stream: bool) -> Self {
        self.settings.stream_conclusion = stream;
        self
    }

    pub fn build(self) -> Result<Agent, AgentError> {
        if self.settings.next_move_retries == 0 {
            return Err(AgentError::Config(
                "next_move_retries must be at least 1".to_string(),
            ));
        }
        let termination = match self.p_beta {
            Some((p, beta)) => TerminationPolicy::new(p, beta)?,
            None => TerminationPolicy::from_personality(self.personality)?,
        };
        let mut termination = termination.with_samples(self.samples)?;
        if let Some(seed) = self.seed {
            termination = termination.with_seed(seed);
        }

        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(generate_name);
        let mut telemetry = Telemetry::for_agent(&name);
        if let Some(tx) = self.events {
            telemetry = telemetry.with_events(tx);
        }

        let mut capabilities = CapabilitySet::new();
        for c in self.capabilities {
            capabilities.grant(c);
        }
        for d in self.delegates {
            capabilities.grant(delegate(d)?);
        }

        let mut agent = Agent {
            name,
            brain: self.brain,
            capabilities,
            memory: Ledger::new(),
            termination,
            request: ResolvedRequest::default(),
            step: 0,
            depth: 0,
            introduction: None,
            telemetry,
            recovery: RecoveryEngine::new(),
            settings: self.settings,
        };
        tracing::debug!(agent = %agent.name, capabilities = ?agent.capabilities.names(), "agent built");
        if let Some(request) = self.request {
            agent.assign(&request)?;
        }
        Ok(agent)
    }
}
