//! 记忆账本：当前任务内已执行动作的有序、按键索引、只追加记录
//!
//! 键 = SHA-256(内容 + 纳秒时间戳 + 进程内单调序号)，即使内容完全相同也不会重复。
//! 序列化为有序 JSON 数组，插入顺序在 prompt 与委派传递中保持不变。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

static KEY_NONCE: AtomicU64 = AtomicU64::new(0);

/// 结构化动作记录：调用了哪个能力、用了什么参数、返回了什么
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub capability: String,
    pub arguments: Value,
    pub returned: Value,
}

/// 单条记忆
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub key: String,
    pub timestamp: DateTime<Utc>,
    pub agent: String,
    pub summary: String,
    pub record: ActionRecord,
}

impl MemoryEntry {
    pub fn new(agent: impl Into<String>, summary: impl Into<String>, record: ActionRecord) -> Self {
        let agent = agent.into();
        let summary = summary.into();
        let timestamp = Utc::now();
        let key = entry_key(&agent, &summary, &record, &timestamp);
        Self {
            key,
            timestamp,
            agent,
            summary,
            record,
        }
    }
}

fn entry_key(agent: &str, summary: &str, record: &ActionRecord, timestamp: &DateTime<Utc>) -> String {
    let nonce = KEY_NONCE.fetch_add(1, Ordering::Relaxed);
    let content = serde_json::to_string(&(agent, summary, record)).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hasher.update(timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true).as_bytes());
    hasher.update(nonce.to_le_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..16])
}

/// 有序账本；Clone 即值拷贝，委派时父子账本互不影响
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<MemoryEntry>", into = "Vec<MemoryEntry>")]
pub struct Ledger {
    entries: Vec<MemoryEntry>,
    index: HashMap<String, usize>,
}

impl From<Vec<MemoryEntry>> for Ledger {
    fn from(entries: Vec<MemoryEntry>) -> Self {
        let mut ledger = Ledger::new();
        for e in entries {
            ledger.insert(e);
        }
        ledger
    }
}

impl From<Ledger> for Vec<MemoryEntry> {
    fn from(ledger: Ledger) -> Self {
        ledger.entries
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条新记忆并返回其键
    pub fn record(
        &mut self,
        agent: impl Into<String>,
        summary: impl Into<String>,
        record: ActionRecord,
    ) -> String {
        let entry = MemoryEntry::new(agent, summary, record);
        let key = entry.key.clone();
        self.insert(entry);
        key
    }

    /// 插入已有条目；键已存在时忽略并返回 false
    pub fn insert(&mut self, entry: MemoryEntry) -> bool {
        if self.index.contains_key(&entry.key) {
            return false;
        }
        self.index.insert(entry.key.clone(), self.entries.len());
        self.entries.push(entry);
        true
    }

    /// 按键取并集合并，新条目按对方顺序追加；返回新增条数
    pub fn merge(&mut self, other: &Ledger) -> usize {
        other
            .entries
            .iter()
            .filter(|e| self.insert((*e).clone()))
            .count()
    }

    pub fn get(&self, key: &str) -> Option<&MemoryEntry> {
        self.index.get(key).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn entries(&self) -> &[MemoryEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &MemoryEntry> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(&self.entries).unwrap_or(Value::Array(Vec::new()))
    }

    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// 供 prompt 使用的 JSON 文本；空账本返回 None
    pub fn to_prompt_json(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        serde_json::to_string_pretty(&self.entries).ok()
    }
}
