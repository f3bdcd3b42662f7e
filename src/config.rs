//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `FOREMAN__*` 覆盖（双下划线表示嵌套，如 `FOREMAN__AGENT__PERSONALITY=prudent`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::Personality;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentSection,
    pub protocol: ProtocolSection,
    pub delegation: DelegationSection,
    pub conclusion: ConclusionSection,
}

/// [agent] 段：名称、性格；显式给出 p / beta 时覆盖性格预设
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSection {
    pub name: Option<String>,
    #[serde(default = "default_personality")]
    pub personality: Personality,
    pub p: Option<f64>,
    pub beta: Option<f64>,
    /// 每次终止检查的抽样次数（取均值降低方差）
    #[serde(default = "default_samples")]
    pub samples: usize,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            name: None,
            personality: default_personality(),
            p: None,
            beta: None,
            samples: default_samples(),
        }
    }
}

fn default_personality() -> Personality {
    Personality::Prudent
}

fn default_samples() -> usize {
    1
}

/// [protocol] 段：严格格式回复的重试上限
#[derive(Debug, Clone, Deserialize)]
pub struct ProtocolSection {
    #[serde(default = "default_next_move_retries")]
    pub next_move_retries: usize,
    #[serde(default = "default_executor_retries")]
    pub executor_retries: usize,
}

impl Default for ProtocolSection {
    fn default() -> Self {
        Self {
            next_move_retries: default_next_move_retries(),
            executor_retries: default_executor_retries(),
        }
    }
}

fn default_next_move_retries() -> usize {
    6
}

fn default_executor_retries() -> usize {
    3
}

/// [delegation] 段：委派深度上限
#[derive(Debug, Clone, Deserialize)]
pub struct DelegationSection {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for DelegationSection {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

fn default_max_depth() -> usize {
    8
}

/// [conclusion] 段：结论是否以流式事件推送
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConclusionSection {
    #[serde(default)]
    pub stream: bool,
}

/// 从 config 目录加载配置，环境变量 FOREMAN__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 FOREMAN__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("FOREMAN")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

/// 重新从磁盘与环境变量加载配置
pub fn reload_config() -> Result<AppConfig, config::ConfigError> {
    load_config(None)
}
