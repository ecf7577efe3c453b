use serde::{Deserialize, Serialize};

use stockerp_core::{AggregateId, Entity, ValueObject};

/// Analytic account identifier (unique within its chart).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalyticAccountId(pub AggregateId);

impl AnalyticAccountId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for AnalyticAccountId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Account type. Only `Normal` accounts can be chosen on an analytic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyticAccountKind {
    /// Top of a tree; one analytic dimension.
    Root,
    /// Grouping node.
    View,
    Normal,
}

/// One node of an analytic tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticAccount {
    pub id: AnalyticAccountId,
    pub name: String,
    pub code: Option<String>,
    pub kind: AnalyticAccountKind,
    /// `None` only for roots.
    pub root: Option<AnalyticAccountId>,
    /// `None` only for roots.
    pub parent: Option<AnalyticAccountId>,
}

impl AnalyticAccount {
    pub fn is_root(&self) -> bool {
        self.kind == AnalyticAccountKind::Root
    }

    /// Root of the tree this account belongs to (itself for a root).
    pub fn root_id(&self) -> AnalyticAccountId {
        self.root.unwrap_or(self.id)
    }

    pub fn to_ref(&self) -> AnalyticAccountRef {
        AnalyticAccountRef {
            account: self.id,
            root: self.root_id(),
        }
    }
}

impl Entity for AnalyticAccount {
    type Id = AnalyticAccountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// An account together with the root it belongs to.
///
/// Lets aggregates outside the chart check root membership without loading
/// the chart itself.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnalyticAccountRef {
    pub account: AnalyticAccountId,
    pub root: AnalyticAccountId,
}

impl ValueObject for AnalyticAccountRef {}

/// Conjunctive lookup filter over a chart's accounts. Unset fields match all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountFilter {
    pub name: Option<String>,
    pub kind: Option<AnalyticAccountKind>,
    pub root: Option<AnalyticAccountId>,
    pub parent: Option<AnalyticAccountId>,
}

impl AccountFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn kind(mut self, kind: AnalyticAccountKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn root(mut self, root: AnalyticAccountId) -> Self {
        self.root = Some(root);
        self
    }

    pub fn parent(mut self, parent: AnalyticAccountId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn matches(&self, account: &AnalyticAccount) -> bool {
        self.name.as_deref().is_none_or(|n| account.name == n)
            && self.kind.is_none_or(|k| account.kind == k)
            && self.root.is_none_or(|r| account.root == Some(r))
            && self.parent.is_none_or(|p| account.parent == Some(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(kind: AnalyticAccountKind, root: Option<AnalyticAccountId>) -> AnalyticAccount {
        AnalyticAccount {
            id: AnalyticAccountId::new(AggregateId::new()),
            name: "Account".to_string(),
            code: None,
            kind,
            root,
            parent: root,
        }
    }

    #[test]
    fn root_is_its_own_root() {
        let root = account(AnalyticAccountKind::Root, None);
        assert_eq!(root.root_id(), root.id);

        let child = account(AnalyticAccountKind::Normal, Some(root.id));
        assert_eq!(child.to_ref().root, root.id);
        assert_eq!(child.to_ref().account, child.id);
    }

    #[test]
    fn empty_filter_matches_everything() {
        let root = account(AnalyticAccountKind::Root, None);
        assert!(AccountFilter::new().matches(&root));
        assert!(!AccountFilter::new().root(root.id).matches(&root));
        assert!(AccountFilter::new().name("Account").kind(AnalyticAccountKind::Root).matches(&root));
    }
}
