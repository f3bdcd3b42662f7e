//! 自适应随机终止策略
//!
//! 超出预估步数后，每一步先抽样决定是否停止，再无论结果如何执行惩罚 p <- (β·p) mod 1.0。
//! 注意：取模会在 p 越过 1.0 后回绕到很小的值，反而放宽停止条件；保持原样。

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::core::AgentError;

/// 预设性格
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Personality {
    /// 容忍度低、惩罚高
    Prudent,
    /// 初始停止概率极低，探索更久
    Inquisitive,
}

impl Personality {
    /// (p0, beta)
    pub fn parameters(self) -> (f64, f64) {
        match self {
            Personality::Prudent => (0.3, 1.5),
            Personality::Inquisitive => (0.001, 1.25),
        }
    }
}

/// 单次超预算检查的结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopCheck {
    pub stop: bool,
    /// 本次抽样均值
    pub draw: f64,
    /// 抽样时使用的 p
    pub p: f64,
}

/// 终止状态：当前 p、基准 p、惩罚系数、预估步数
#[derive(Debug, Clone)]
pub struct TerminationPolicy {
    base_p: f64,
    p: f64,
    beta: f64,
    samples: usize,
    expected_steps: usize,
    rng: StdRng,
}

impl TerminationPolicy {
    pub fn new(p: f64, beta: f64) -> Result<Self, AgentError> {
        if !(p > 0.0 && p < 1.0) {
            return Err(AgentError::InvalidTermination(format!(
                "p must be within (0, 1), got {p}"
            )));
        }
        if !(beta > 0.0 && beta.is_finite()) {
            return Err(AgentError::InvalidTermination(format!(
                "beta must be positive, got {beta}"
            )));
        }
        Ok(Self {
            base_p: p,
            p,
            beta,
            samples: 1,
            expected_steps: 0,
            rng: StdRng::from_entropy(),
        })
    }

    /// 按性格预设构造
    pub fn from_personality(personality: Personality) -> Result<Self, AgentError> {
        let (p, beta) = personality.parameters();
        Self::new(p, beta)
    }

    /// 每次决策的抽样次数（取均值以降低方差）
    pub fn with_samples(mut self, samples: usize) -> Result<Self, AgentError> {
        if samples == 0 {
            return Err(AgentError::InvalidTermination(
                "samples must be at least 1".to_string(),
            ));
        }
        self.samples = samples;
        Ok(self)
    }

    /// 固定随机种子（测试用）
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn p(&self) -> f64 {
        self.p
    }

    pub fn base_p(&self) -> f64 {
        self.base_p
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn expected_steps(&self) -> usize {
        self.expected_steps
    }

    /// 新任务：p 回到基准，写入新的预估步数
    pub fn reset(&mut self, expected_steps: usize) {
        self.p = self.base_p;
        self.expected_steps = expected_steps;
    }

    pub fn is_over_budget(&self, step: usize) -> bool {
        step >= self.expected_steps
    }

    fn draw(&mut self) -> f64 {
        let total: f64 = (0..self.samples).map(|_| self.rng.gen::<f64>()).sum();
        total / self.samples as f64
    }

    /// p <- (β·p) mod 1.0
    pub fn punish(&mut self) {
        self.p = (self.beta * self.p) % 1.0;
    }

    /// 超预算步：抽样判断是否停止，然后惩罚
    pub fn check(&mut self) -> StopCheck {
        let p = self.p;
        let draw = self.draw();
        let stop = draw <= p;
        self.punish();
        StopCheck { stop, draw, p }
    }
}
