//! 能力注册表
//!
//! 按名称存储 Capability（名称唯一），支持 grant / revoke / get / names；
//! 有序存储保证 prompt 中能力列表的顺序稳定。

use std::collections::BTreeMap;

use crate::capability::{Capability, CapabilityDescriptor};

#[derive(Debug, Clone, Default)]
pub struct CapabilitySet {
    capabilities: BTreeMap<String, Capability>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 授予能力；同名能力已存在时保留原有的并返回 false
    pub fn grant(&mut self, capability: Capability) -> bool {
        if self.capabilities.contains_key(capability.name()) {
            tracing::debug!(capability = capability.name(), "already granted");
            return false;
        }
        self.capabilities
            .insert(capability.name().to_string(), capability);
        true
    }

    pub fn revoke(&mut self, name: &str) -> Option<Capability> {
        self.capabilities.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Capability> {
        self.capabilities.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.capabilities.keys().cloned().collect()
    }

    pub fn descriptors(&self) -> Vec<CapabilityDescriptor> {
        self.capabilities.values().map(Capability::descriptor).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.capabilities.values()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        let mut set = Self::new();
        for c in iter {
            set.grant(c);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn cap(name: &str, returns: &str) -> Capability {
        Capability::builder(name)
            .returns(returns)
            .sync(|_| Ok(Value::Null))
            .unwrap()
    }

    #[test]
    fn test_grant_dedups_by_name() {
        let mut set = CapabilitySet::new();
        assert!(set.grant(cap("a", "first")));
        assert!(!set.grant(cap("a", "second")));
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("a").unwrap().returns(), "first");
    }

    #[test]
    fn test_revoke_and_names_are_ordered() {
        let mut set: CapabilitySet = [cap("zeta", ""), cap("alpha", ""), cap("mid", "")]
            .into_iter()
            .collect();
        assert_eq!(set.names(), vec!["alpha", "mid", "zeta"]);
        assert!(set.revoke("mid").is_some());
        assert!(set.revoke("mid").is_none());
        assert!(!set.contains("mid"));
        assert_eq!(set.descriptors().len(), 2);
    }
}
