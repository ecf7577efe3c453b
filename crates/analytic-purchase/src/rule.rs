use core::str::FromStr;

use serde::{Deserialize, Serialize};

use stockerp_analytic::{AnalyticAccountId, AnalyticEntries};
use stockerp_core::{CompanyId, DomainError};
use stockerp_stock::Location;

/// When a line's analytic accounts are taken from the warehouse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyticTiming {
    /// Accounts are stamped when the line is created; saving only reshapes
    /// the slots to the current roots.
    #[default]
    Line,
    /// Saving recomputes every line from the warehouse set at that moment.
    Save,
}

impl FromStr for AnalyticTiming {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "line" => Ok(Self::Line),
            "save" => Ok(Self::Save),
            other => Err(DomainError::validation(format!(
                "unknown analytic timing '{other}' (expected 'line' or 'save')"
            ))),
        }
    }
}

/// Analytic slots of `location` for `company_id`.
///
/// `None` when the location is not a warehouse or has no configuration for
/// the company.
pub fn warehouse_analytics(location: &Location, company_id: CompanyId) -> Option<&AnalyticEntries> {
    if !location.is_warehouse() {
        return None;
    }
    location.analytic_accounts(company_id)
}

/// Entries for a new purchase line: one slot per root, in root order, holding
/// the warehouse's account for that root or nothing.
pub fn line_analytic_entries(
    roots: &[AnalyticAccountId],
    warehouse: Option<&AnalyticEntries>,
) -> AnalyticEntries {
    let mut entries = AnalyticEntries::blank(roots);
    if let Some(configured) = warehouse {
        for &root in roots {
            entries.set_account(root, configured.account_for(root));
        }
    }
    entries
}

/// Entries a line must hold once its purchase is saved.
pub fn reconcile_line(
    roots: &[AnalyticAccountId],
    current: &AnalyticEntries,
    warehouse: Option<&AnalyticEntries>,
    timing: AnalyticTiming,
) -> AnalyticEntries {
    match timing {
        AnalyticTiming::Line => current.aligned_to(roots),
        AnalyticTiming::Save => line_analytic_entries(roots, warehouse),
    }
}
