//! 核心：错误类型、有界重试恢复、自适应终止策略

pub mod error;
pub mod recovery;
pub mod termination;

pub use error::{AgentError, CapabilityError};
pub use recovery::RecoveryEngine;
pub use termination::{Personality, StopCheck, TerminationPolicy};
