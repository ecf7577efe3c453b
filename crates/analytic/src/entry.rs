use serde::{Deserialize, Serialize};

use stockerp_core::ValueObject;

use crate::account::AnalyticAccountId;

/// One slot: the account chosen for a root, or none.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnalyticEntry {
    pub root: AnalyticAccountId,
    pub account: Option<AnalyticAccountId>,
}

impl AnalyticEntry {
    pub fn unset(root: AnalyticAccountId) -> Self {
        Self { root, account: None }
    }
}

impl ValueObject for AnalyticEntry {}

/// Ordered analytic slots carried by warehouse configurations and purchase
/// lines.
///
/// A well-formed sequence holds exactly one slot per root, in root order;
/// [`AnalyticEntries::aligned_to`] restores that shape after roots change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalyticEntries(Vec<AnalyticEntry>);

impl ValueObject for AnalyticEntries {}

impl AnalyticEntries {
    /// One unset slot per root.
    pub fn blank(roots: &[AnalyticAccountId]) -> Self {
        roots.iter().copied().map(AnalyticEntry::unset).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, AnalyticEntry> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[AnalyticEntry] {
        &self.0
    }

    pub fn roots(&self) -> impl Iterator<Item = AnalyticAccountId> + '_ {
        self.0.iter().map(|e| e.root)
    }

    pub fn slot(&self, root: AnalyticAccountId) -> Option<&AnalyticEntry> {
        self.0.iter().find(|e| e.root == root)
    }

    /// Account chosen for `root`; `None` when the slot is unset or missing.
    pub fn account_for(&self, root: AnalyticAccountId) -> Option<AnalyticAccountId> {
        self.slot(root).and_then(|e| e.account)
    }

    /// Set (or clear) the account of an existing slot.
    ///
    /// Returns `false` when there is no slot for `root`.
    pub fn set_account(
        &mut self,
        root: AnalyticAccountId,
        account: Option<AnalyticAccountId>,
    ) -> bool {
        match self.0.iter_mut().find(|e| e.root == root) {
            Some(entry) => {
                entry.account = account;
                true
            }
            None => false,
        }
    }

    /// True when no slot has an account.
    pub fn is_unset(&self) -> bool {
        self.0.iter().all(|e| e.account.is_none())
    }

    /// Reshape to exactly one slot per root in `roots` order, keeping the
    /// account already chosen for each root that survives.
    pub fn aligned_to(&self, roots: &[AnalyticAccountId]) -> Self {
        roots
            .iter()
            .map(|&root| AnalyticEntry {
                root,
                account: self.account_for(root),
            })
            .collect()
    }

    pub fn is_aligned_to(&self, roots: &[AnalyticAccountId]) -> bool {
        self.0.len() == roots.len() && self.0.iter().zip(roots).all(|(e, r)| e.root == *r)
    }
}

impl FromIterator<AnalyticEntry> for AnalyticEntries {
    fn from_iter<I: IntoIterator<Item = AnalyticEntry>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a AnalyticEntries {
    type Item = &'a AnalyticEntry;
    type IntoIter = core::slice::Iter<'a, AnalyticEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
