use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockerp_core::{
    Aggregate, AggregateId, AggregateRoot, CompanyId, DomainError, DomainResult, find_by_id,
};
use stockerp_events::Event;

use crate::account::{
    AccountFilter, AnalyticAccount, AnalyticAccountId, AnalyticAccountKind, AnalyticAccountRef,
};
use crate::entry::AnalyticEntries;

/// Analytic chart identifier. A company owns exactly one chart.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalyticChartId(pub AggregateId);

impl AnalyticChartId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    /// The chart stream of `company` shares the company's uuid.
    pub fn of_company(company_id: CompanyId) -> Self {
        Self(AggregateId::from_uuid(*company_id.as_uuid()))
    }
}

impl core::fmt::Display for AnalyticChartId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: AnalyticChart.
///
/// Accounts are kept in creation order, which is also the order of
/// [`AnalyticChart::roots`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticChart {
    id: AnalyticChartId,
    company_id: Option<CompanyId>,
    accounts: Vec<AnalyticAccount>,
    version: u64,
    created: bool,
}

impl AnalyticChart {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: AnalyticChartId) -> Self {
        Self {
            id,
            company_id: None,
            accounts: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> AnalyticChartId {
        self.id
    }

    pub fn company_id(&self) -> Option<CompanyId> {
        self.company_id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn accounts(&self) -> &[AnalyticAccount] {
        &self.accounts
    }

    pub fn get(&self, id: AnalyticAccountId) -> Option<&AnalyticAccount> {
        find_by_id(&self.accounts, &id)
    }

    /// Root ids in creation order.
    pub fn roots(&self) -> Vec<AnalyticAccountId> {
        self.accounts
            .iter()
            .filter(|a| a.is_root())
            .map(|a| a.id)
            .collect()
    }

    pub fn find(&self, filter: &AccountFilter) -> Vec<&AnalyticAccount> {
        self.accounts.iter().filter(|a| filter.matches(a)).collect()
    }

    /// Direct children of `parent`, in creation order.
    pub fn children(&self, parent: AnalyticAccountId) -> Vec<&AnalyticAccount> {
        self.accounts
            .iter()
            .filter(|a| a.parent == Some(parent))
            .collect()
    }

    /// Reference to an account that may be chosen on an analytic entry.
    pub fn assignable_ref(&self, id: AnalyticAccountId) -> DomainResult<AnalyticAccountRef> {
        let account = self.get(id).ok_or_else(DomainError::not_found)?;
        if account.kind != AnalyticAccountKind::Normal {
            return Err(DomainError::validation(format!(
                "analytic account '{}' is not a normal account",
                account.name
            )));
        }
        Ok(account.to_ref())
    }

    /// Check that every slot names a known root once and that every chosen
    /// account is a normal account of that root.
    pub fn validate_entries(&self, entries: &AnalyticEntries) -> DomainResult<()> {
        let mut seen = HashSet::new();
        for entry in entries {
            let root = self
                .get(entry.root)
                .filter(|a| a.is_root())
                .ok_or_else(|| DomainError::validation(format!("unknown analytic root {}", entry.root)))?;
            if !seen.insert(entry.root) {
                return Err(DomainError::validation(format!(
                    "duplicate analytic slot for root '{}'",
                    root.name
                )));
            }
            if let Some(account_id) = entry.account {
                let account = self.assignable_ref(account_id)?;
                if account.root != entry.root {
                    return Err(DomainError::validation(format!(
                        "analytic account {account_id} does not belong to root '{}'",
                        root.name
                    )));
                }
            }
        }
        Ok(())
    }
}

impl AggregateRoot for AnalyticChart {
    type Id = AnalyticChartId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateChart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateChart {
    pub company_id: CompanyId,
    pub chart_id: AnalyticChartId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CreateAccount (roots included).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAccount {
    pub company_id: CompanyId,
    pub chart_id: AnalyticChartId,
    pub account_id: AnalyticAccountId,
    pub name: String,
    pub code: Option<String>,
    pub kind: AnalyticAccountKind,
    pub root: Option<AnalyticAccountId>,
    pub parent: Option<AnalyticAccountId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalyticCommand {
    CreateChart(CreateChart),
    CreateAccount(CreateAccount),
}

/// Event: ChartCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartCreated {
    pub company_id: CompanyId,
    pub chart_id: AnalyticChartId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AccountCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCreated {
    pub company_id: CompanyId,
    pub chart_id: AnalyticChartId,
    pub account: AnalyticAccount,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalyticEvent {
    ChartCreated(ChartCreated),
    AccountCreated(AccountCreated),
}

impl Event for AnalyticEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AnalyticEvent::ChartCreated(_) => "analytic.chart.created",
            AnalyticEvent::AccountCreated(_) => "analytic.chart.account_created",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AnalyticEvent::ChartCreated(e) => e.occurred_at,
            AnalyticEvent::AccountCreated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for AnalyticChart {
    type Command = AnalyticCommand;
    type Event = AnalyticEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AnalyticEvent::ChartCreated(e) => {
                self.id = e.chart_id;
                self.company_id = Some(e.company_id);
                self.accounts.clear();
                self.created = true;
            }
            AnalyticEvent::AccountCreated(e) => {
                self.accounts.push(e.account.clone());
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            AnalyticCommand::CreateChart(cmd) => self.handle_create_chart(cmd),
            AnalyticCommand::CreateAccount(cmd) => self.handle_create_account(cmd),
        }
    }
}

impl AnalyticChart {
    fn ensure_company(&self, company_id: CompanyId) -> Result<(), DomainError> {
        if self.company_id != Some(company_id) {
            return Err(DomainError::invariant("company mismatch"));
        }
        Ok(())
    }

    fn ensure_chart_id(&self, chart_id: AnalyticChartId) -> Result<(), DomainError> {
        if self.id != chart_id {
            return Err(DomainError::invariant("chart_id mismatch"));
        }
        Ok(())
    }

    fn handle_create_chart(&self, cmd: &CreateChart) -> Result<Vec<AnalyticEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("analytic chart already exists"));
        }

        Ok(vec![AnalyticEvent::ChartCreated(ChartCreated {
            company_id: cmd.company_id,
            chart_id: cmd.chart_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_create_account(
        &self,
        cmd: &CreateAccount,
    ) -> Result<Vec<AnalyticEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_company(cmd.company_id)?;
        self.ensure_chart_id(cmd.chart_id)?;

        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if self.get(cmd.account_id).is_some() {
            return Err(DomainError::conflict("analytic account already exists"));
        }

        match cmd.kind {
            AnalyticAccountKind::Root => {
                if cmd.root.is_some() || cmd.parent.is_some() {
                    return Err(DomainError::validation(
                        "root accounts cannot have a root or parent",
                    ));
                }
            }
            AnalyticAccountKind::View | AnalyticAccountKind::Normal => {
                let root_id = cmd
                    .root
                    .ok_or_else(|| DomainError::validation("non-root account requires a root"))?;
                let parent_id = cmd
                    .parent
                    .ok_or_else(|| DomainError::validation("non-root account requires a parent"))?;

                match self.get(root_id) {
                    Some(root) if root.is_root() => {}
                    Some(_) => return Err(DomainError::validation("root must be a root account")),
                    None => return Err(DomainError::validation("unknown root account")),
                }

                let parent = self
                    .get(parent_id)
                    .ok_or_else(|| DomainError::validation("unknown parent account"))?;
                if parent.root_id() != root_id {
                    return Err(DomainError::invariant(
                        "parent must belong to the same root",
                    ));
                }
                if parent.kind == AnalyticAccountKind::Normal {
                    return Err(DomainError::validation(
                        "normal accounts cannot have children",
                    ));
                }
            }
        }

        Ok(vec![AnalyticEvent::AccountCreated(AccountCreated {
            company_id: cmd.company_id,
            chart_id: cmd.chart_id,
            account: AnalyticAccount {
                id: cmd.account_id,
                name: cmd.name.trim().to_string(),
                code: cmd.code.clone(),
                kind: cmd.kind,
                root: cmd.root,
                parent: cmd.parent,
            },
            occurred_at: cmd.occurred_at,
        })])
    }
}
