//! Node type registry.
//!
//! Maps a symbolic type name to structural rules and a constructor
//! capability. The same registry type serves the model layer (constructors
//! that build model nodes) and the view layer (constructors that build view
//! variants); each editing session owns its own instances.

use std::collections::HashMap;

use smol_str::SmolStr;

use crate::config::DuplicatePolicy;
use crate::error::ModelError;

/// Structural rules for a node type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRules {
    /// Branch types have children; leaf types do not.
    pub can_have_children: bool,
    /// When false every child must be a leaf (a paragraph holds text, not
    /// other paragraphs).
    pub can_have_grandchildren: bool,
    /// Whether a structural break inside the node splits it.
    pub can_be_split: bool,
}

impl NodeRules {
    /// Branch holding leaves only, splittable (paragraph, heading).
    pub const fn branch() -> Self {
        Self {
            can_have_children: true,
            can_have_grandchildren: false,
            can_be_split: true,
        }
    }

    /// Branch holding other branches, not splittable (table cell, list).
    pub const fn container() -> Self {
        Self {
            can_have_children: true,
            can_have_grandchildren: true,
            can_be_split: false,
        }
    }

    /// Leaf with its own open/close markers (image, rule).
    pub const fn leaf() -> Self {
        Self {
            can_have_children: false,
            can_have_grandchildren: false,
            can_be_split: false,
        }
    }

    pub const fn splittable(mut self, can_be_split: bool) -> Self {
        self.can_be_split = can_be_split;
        self
    }
}

/// A registered node type.
#[derive(Debug, Clone)]
pub struct Registration<C> {
    pub rules: NodeRules,
    pub ctor: C,
}

/// Registry of node types, generic over the constructor capability.
#[derive(Debug, Clone)]
pub struct NodeRegistry<C> {
    entries: HashMap<SmolStr, Registration<C>>,
    policy: DuplicatePolicy,
}

impl<C> Default for NodeRegistry<C> {
    fn default() -> Self {
        Self::new(DuplicatePolicy::default())
    }
}

impl<C> NodeRegistry<C> {
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self {
            entries: HashMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Associate `name` with rules and a constructor.
    pub fn register(
        &mut self,
        name: impl Into<SmolStr>,
        rules: NodeRules,
        ctor: C,
    ) -> Result<(), ModelError> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            match self.policy {
                DuplicatePolicy::Reject => {
                    return Err(ModelError::DuplicateType { type_name: name });
                }
                DuplicatePolicy::Overwrite => {
                    tracing::warn!(
                        target: "folio::registry",
                        type_name = %name,
                        "overwriting existing node type registration"
                    );
                }
            }
        }
        self.entries.insert(name, Registration { rules, ctor });
        Ok(())
    }

    pub fn unregister(&mut self, name: &str) -> Option<Registration<C>> {
        self.entries.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn lookup(&self, name: &str) -> Result<&Registration<C>, ModelError> {
        self.entries
            .get(name)
            .ok_or_else(|| ModelError::UnknownType {
                type_name: SmolStr::new(name),
            })
    }

    pub fn rules(&self, name: &str) -> Result<NodeRules, ModelError> {
        self.lookup(name).map(|r| r.rules)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<SmolStr> {
        let mut names: Vec<_> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    /// Construct through the registered capability.
    pub fn create<A, T>(&self, name: &str, args: A) -> Result<T, ModelError>
    where
        C: Fn(A) -> T,
    {
        let registration = self.lookup(name)?;
        Ok((registration.ctor)(args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Ctor = fn(usize) -> String;

    fn label(n: usize) -> String {
        format!("node-{n}")
    }

    fn shout(n: usize) -> String {
        format!("NODE-{n}")
    }

    #[test]
    fn test_register_and_create() {
        let mut registry: NodeRegistry<Ctor> = NodeRegistry::default();
        registry
            .register("paragraph", NodeRules::branch(), label)
            .unwrap();

        assert!(registry.contains("paragraph"));
        assert_eq!(registry.rules("paragraph").unwrap(), NodeRules::branch());
        assert_eq!(registry.create("paragraph", 3).unwrap(), "node-3");
    }

    #[test]
    fn test_unknown_type() {
        let registry: NodeRegistry<Ctor> = NodeRegistry::default();
        let err = registry.create("table", 1).unwrap_err();
        assert_eq!(
            err,
            ModelError::UnknownType {
                type_name: "table".into()
            }
        );
    }

    #[test]
    fn test_duplicate_rejected_by_default() {
        let mut registry: NodeRegistry<Ctor> = NodeRegistry::default();
        registry.register("image", NodeRules::leaf(), label).unwrap();
        let err = registry
            .register("image", NodeRules::leaf(), shout)
            .unwrap_err();
        assert!(matches!(err, ModelError::DuplicateType { .. }));
        // First registration still wins.
        assert_eq!(registry.create("image", 1).unwrap(), "node-1");
    }

    #[test]
    fn test_duplicate_overwrite_policy() {
        let mut registry: NodeRegistry<Ctor> = NodeRegistry::new(DuplicatePolicy::Overwrite);
        registry.register("image", NodeRules::leaf(), label).unwrap();
        registry
            .register("image", NodeRules::leaf().splittable(true), shout)
            .unwrap();
        assert_eq!(registry.create("image", 1).unwrap(), "NODE-1");
        assert!(registry.rules("image").unwrap().can_be_split);
    }

    #[test]
    fn test_names_sorted() {
        let mut registry: NodeRegistry<Ctor> = NodeRegistry::default();
        registry.register("table", NodeRules::container(), label).unwrap();
        registry.register("div", NodeRules::container(), label).unwrap();
        assert_eq!(registry.names(), vec!["div", "table"]);
        assert!(registry.unregister("div").is_some());
        assert!(!registry.contains("div"));
    }
}
