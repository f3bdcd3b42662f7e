//! 能力描述符
//!
//! 能力 = 名称 + 描述 + 有序参数 + 返回类型标记 + 绑定的调用闭包。
//! 注册时静态声明并校验（不做运行时反射）；异步闭包在调用时阻塞到完成，对外始终是同步契约。

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::capability::delegation::DELEGATION_PREFIX;
use crate::core::{AgentError, CapabilityError};
use crate::prompt::reply::{MISSION_COMPLETE, MISSION_FAILED};
use crate::prompt::ReplyViolation;
use crate::runtime;

/// 调用参数（JSON 对象，原样转发给闭包）
pub type Arguments = Map<String, Value>;

/// 绑定的同步调用闭包
pub type Invocation = Arc<dyn Fn(&Arguments) -> Result<Value, CapabilityError> + Send + Sync>;

/// 委派能力的隐式参数，由编排器在校验之后注入
pub const IMPLICIT_PARAMS: [&str; 3] = ["request", "memory", "depth"];

/// 参数类型标记（供 LLM 理解）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Any,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParamKind,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub required: bool,
    /// 可变参数收集器：不计入 parameters_required，且允许任意额外键
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub variadic: bool,
}

/// 单个参数的文档（结构化描述中使用）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgDoc {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParamKind,
    pub description: String,
}

/// 结构化描述：简介、详述、参数说明、返回说明，以及任意补充字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredDescription {
    pub brief_description: String,
    pub detailed_description: String,
    #[serde(default)]
    pub args: Vec<ArgDoc>,
    #[serde(default)]
    pub returns: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 能力描述：自由文本或结构化
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Description {
    Text(String),
    Structured(StructuredDescription),
}

impl Default for Description {
    fn default() -> Self {
        Description::Text(String::new())
    }
}

impl From<&str> for Description {
    fn from(s: &str) -> Self {
        Description::Text(s.to_string())
    }
}

impl From<String> for Description {
    fn from(s: String) -> Self {
        Description::Text(s)
    }
}

impl From<StructuredDescription> for Description {
    fn from(s: StructuredDescription) -> Self {
        Description::Structured(s)
    }
}

/// 对外展示（prompt / 自我介绍）用的描述符；同一能力多次生成结果相同
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub capability_name: String,
    pub description: Description,
    pub parameters_required: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Param>,
    pub returns: String,
}

/// 能力：创建后不可变，按名称判等
#[derive(Clone)]
pub struct Capability {
    name: String,
    description: Description,
    params: Vec<Param>,
    returns: String,
    call: Invocation,
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .finish()
    }
}

impl PartialEq for Capability {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Capability {}

impl Capability {
    pub fn builder(name: impl Into<String>) -> CapabilityBuilder {
        CapabilityBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &Description {
        &self.description
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn returns(&self) -> &str {
        &self.returns
    }

    pub fn is_delegation(&self) -> bool {
        self.name.starts_with(DELEGATION_PREFIX)
    }

    /// 有序参数名（不含可变参数收集器）
    pub fn parameter_names(&self) -> Vec<String> {
        self.params
            .iter()
            .filter(|p| !p.variadic)
            .map(|p| p.name.clone())
            .collect()
    }

    fn accepts_extra(&self) -> bool {
        self.params.iter().any(|p| p.variadic)
    }

    pub fn descriptor(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            capability_name: self.name.clone(),
            description: self.description.clone(),
            parameters_required: self.parameter_names(),
            parameters: self.params.clone(),
            returns: self.returns.clone(),
        }
    }

    /// 校验神谕给出的参数：不允许未声明的键，必需参数不能缺
    pub fn validate_arguments(&self, args: &Arguments) -> Result<(), ReplyViolation> {
        let expected = self.parameter_names();
        if !self.accepts_extra() {
            let unexpected: Vec<String> = args
                .keys()
                .filter(|k| !expected.iter().any(|e| e == *k))
                .cloned()
                .collect();
            if !unexpected.is_empty() {
                return Err(ReplyViolation::UnexpectedArguments {
                    capability: self.name.clone(),
                    unexpected,
                    expected,
                });
            }
        }
        let missing: Vec<String> = self
            .params
            .iter()
            .filter(|p| p.required && !p.variadic && !args.contains_key(&p.name))
            .map(|p| p.name.clone())
            .collect();
        if !missing.is_empty() {
            return Err(ReplyViolation::MissingArguments {
                capability: self.name.clone(),
                missing,
                expected,
            });
        }
        Ok(())
    }

    /// 原样转发参数并返回原始结果
    pub fn invoke(&self, args: &Arguments) -> Result<Value, CapabilityError> {
        (self.call)(args)
    }
}

/// 能力构建器：声明参数后用 sync / asynchronous 绑定闭包，build 时校验
pub struct CapabilityBuilder {
    name: String,
    description: Description,
    params: Vec<Param>,
    returns: String,
    delegation: bool,
}

impl CapabilityBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: Description::default(),
            params: Vec::new(),
            returns: "any".to_string(),
            delegation: false,
        }
    }

    pub fn description(mut self, description: impl Into<Description>) -> Self {
        self.description = description.into();
        self
    }

    /// 必需参数
    pub fn param(mut self, name: impl Into<String>, kind: ParamKind, description: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            kind,
            description: description.into(),
            required: true,
            variadic: false,
        });
        self
    }

    /// 可选参数
    pub fn optional_param(
        mut self,
        name: impl Into<String>,
        kind: ParamKind,
        description: impl Into<String>,
    ) -> Self {
        self.params.push(Param {
            name: name.into(),
            kind,
            description: description.into(),
            required: false,
            variadic: false,
        });
        self
    }

    /// 可变参数收集器
    pub fn variadic(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            kind: ParamKind::Any,
            description: String::new(),
            required: false,
            variadic: true,
        });
        self
    }

    pub fn returns(mut self, returns: impl Into<String>) -> Self {
        self.returns = returns.into();
        self
    }

    pub(crate) fn delegation(mut self) -> Self {
        self.delegation = true;
        self
    }

    /// 绑定同步闭包
    pub fn sync<F>(self, f: F) -> Result<Capability, AgentError>
    where
        F: Fn(&Arguments) -> Result<Value, CapabilityError> + Send + Sync + 'static,
    {
        self.build(Arc::new(f))
    }

    /// 绑定异步闭包：每次调用在私有运行时上跑到完成再返回
    pub fn asynchronous<F, Fut>(self, f: F) -> Result<Capability, AgentError>
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, CapabilityError>> + Send,
    {
        let name = self.name.clone();
        self.build(Arc::new(move |args: &Arguments| {
            runtime::block_on(f(args.clone())).map_err(|e| {
                CapabilityError::failed(format!("{name}: blocking bridge failed: {e}"))
            })?
        }))
    }

    fn validate(&self) -> Result<(), AgentError> {
        let name = &self.name;
        if name.is_empty() {
            return Err(AgentError::InvalidCapability("empty name".to_string()));
        }
        if name.chars().any(|c| c.is_whitespace() || c == '[' || c == ']') {
            return Err(AgentError::InvalidCapability(format!(
                "name {name:?} must not contain whitespace or brackets"
            )));
        }
        if name == MISSION_COMPLETE || name == MISSION_FAILED {
            return Err(AgentError::InvalidCapability(format!(
                "name {name:?} is reserved"
            )));
        }
        if name.starts_with(DELEGATION_PREFIX) != self.delegation {
            return Err(AgentError::InvalidCapability(format!(
                "prefix {DELEGATION_PREFIX:?} is reserved for delegation capabilities ({name})"
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for p in &self.params {
            if p.name.is_empty() {
                return Err(AgentError::InvalidCapability(format!(
                    "{name}: empty parameter name"
                )));
            }
            if !seen.insert(p.name.as_str()) {
                return Err(AgentError::InvalidCapability(format!(
                    "{name}: duplicate parameter {}",
                    p.name
                )));
            }
            if !self.delegation && IMPLICIT_PARAMS.contains(&p.name.as_str()) {
                return Err(AgentError::InvalidCapability(format!(
                    "{name}: parameter {} is reserved for delegation",
                    p.name
                )));
            }
        }
        Ok(())
    }

    fn build(self, call: Invocation) -> Result<Capability, AgentError> {
        self.validate()?;
        Ok(Capability {
            name: self.name,
            description: self.description,
            params: self.params,
            returns: self.returns,
            call,
        })
    }
}

/// 取字符串参数
pub fn str_arg<'a>(args: &'a Arguments, name: &str) -> Result<&'a str, CapabilityError> {
    match args.get(name) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(CapabilityError::InvalidArgument {
            name: name.to_string(),
            reason: format!("expected a string, got {other}"),
        }),
        None => Err(CapabilityError::MissingArgument(name.to_string())),
    }
}
