//! Application service over the chart, location and purchase aggregates.
//!
//! This is where the analytic propagation rule meets stored state: the
//! workflow loads the company's roots and the purchase's warehouse, asks
//! `stockerp-analytic-purchase` for the entries and dispatches the result.

use chrono::Utc;

use stockerp_analytic::{
    AccountFilter, AnalyticAccount, AnalyticAccountId, AnalyticAccountKind, AnalyticChart,
    AnalyticChartId, AnalyticCommand, AnalyticEntries, CreateAccount, CreateChart,
};
use stockerp_analytic_purchase::{
    AnalyticTiming, line_analytic_entries, reconcile_line, warehouse_analytics,
};
use stockerp_core::{AggregateId, AggregateRoot, CompanyId, ExpectedVersion, TenantId};
use stockerp_purchasing::{
    AddLine, Confirm, CreatePurchase, ProductId, Purchase, PurchaseCommand, PurchaseId,
    PurchaseState, Quote, SaveLines, SetLineAnalytics, SetWarehouse, SupplierId,
};
use stockerp_stock::{
    AddCompanyConfiguration, AssignAnalyticAccount, CreateLocation, Location, LocationCommand,
    LocationId, LocationKind, WarehouseLocations,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::config::Config;
use crate::event_store::EventStore;

const CHART: &str = "analytic.chart";
const LOCATION: &str = "stock.location";
const PURCHASE: &str = "purchasing.purchase";

/// Input for a new analytic account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub name: String,
    pub code: Option<String>,
    pub kind: AnalyticAccountKind,
    pub root: AnalyticAccountId,
    pub parent: AnalyticAccountId,
}

impl NewAccount {
    /// A normal account directly under its root.
    pub fn normal(name: impl Into<String>, root: AnalyticAccountId) -> Self {
        Self {
            name: name.into(),
            code: None,
            kind: AnalyticAccountKind::Normal,
            root,
            parent: root,
        }
    }
}

/// Input for a new location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLocation {
    pub name: String,
    pub code: Option<String>,
    pub kind: LocationKind,
    pub parent: Option<LocationId>,
    pub warehouse: Option<WarehouseLocations>,
}

impl NewLocation {
    pub fn storage(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: None,
            kind: LocationKind::Storage,
            parent: None,
            warehouse: None,
        }
    }

    pub fn warehouse(
        name: impl Into<String>,
        code: impl Into<String>,
        locations: WarehouseLocations,
    ) -> Self {
        Self {
            name: name.into(),
            code: Some(code.into()),
            kind: LocationKind::Warehouse,
            parent: None,
            warehouse: Some(locations),
        }
    }
}

/// Input for a new purchase line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: i64,
}

/// The operations a purchasing user performs, each one a dispatched command.
#[derive(Debug)]
pub struct PurchaseWorkflow<S> {
    dispatcher: CommandDispatcher<S>,
    timing: AnalyticTiming,
}

impl<S> PurchaseWorkflow<S>
where
    S: EventStore,
{
    pub fn new(store: S, timing: AnalyticTiming) -> Self {
        Self {
            dispatcher: CommandDispatcher::new(store),
            timing,
        }
    }

    pub fn from_config(store: S, config: &Config) -> Self {
        Self::new(store, config.analytic_timing)
    }

    pub fn timing(&self) -> AnalyticTiming {
        self.timing
    }

    pub fn dispatcher(&self) -> &CommandDispatcher<S> {
        &self.dispatcher
    }

    // ---- analytic chart -------------------------------------------------

    /// The company's chart; an empty, not-created chart when none exists yet.
    pub fn chart(&self, tenant_id: TenantId, company_id: CompanyId) -> Result<AnalyticChart, DispatchError> {
        let chart_id = AnalyticChartId::of_company(company_id);
        self.dispatcher
            .load(tenant_id, chart_id.0, |_, id| AnalyticChart::empty(AnalyticChartId::new(id)))
    }

    pub fn create_chart(
        &self,
        tenant_id: TenantId,
        company_id: CompanyId,
    ) -> Result<AnalyticChart, DispatchError> {
        let chart_id = AnalyticChartId::of_company(company_id);
        let command = AnalyticCommand::CreateChart(CreateChart {
            company_id,
            chart_id,
            occurred_at: Utc::now(),
        });
        let (chart, _) = self.dispatcher.dispatch(tenant_id, chart_id.0, CHART, command, |_, id| {
            AnalyticChart::empty(AnalyticChartId::new(id))
        })?;
        tracing::info!(%tenant_id, %company_id, "analytic chart created");
        Ok(chart)
    }

    /// Roots of the company's chart in creation order.
    pub fn roots(
        &self,
        tenant_id: TenantId,
        company_id: CompanyId,
    ) -> Result<Vec<AnalyticAccountId>, DispatchError> {
        Ok(self.chart(tenant_id, company_id)?.roots())
    }

    pub fn find_accounts(
        &self,
        tenant_id: TenantId,
        company_id: CompanyId,
        filter: &AccountFilter,
    ) -> Result<Vec<AnalyticAccount>, DispatchError> {
        let chart = self.chart(tenant_id, company_id)?;
        Ok(chart.find(filter).into_iter().cloned().collect())
    }

    /// Create a root (a new analytic dimension), creating the chart first if
    /// the company has none.
    pub fn create_root(
        &self,
        tenant_id: TenantId,
        company_id: CompanyId,
        name: impl Into<String>,
    ) -> Result<AnalyticAccountId, DispatchError> {
        self.create_account_inner(
            tenant_id,
            company_id,
            name.into(),
            None,
            AnalyticAccountKind::Root,
            None,
            None,
        )
    }

    pub fn create_account(
        &self,
        tenant_id: TenantId,
        company_id: CompanyId,
        account: NewAccount,
    ) -> Result<AnalyticAccountId, DispatchError> {
        self.create_account_inner(
            tenant_id,
            company_id,
            account.name,
            account.code,
            account.kind,
            Some(account.root),
            Some(account.parent),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn create_account_inner(
        &self,
        tenant_id: TenantId,
        company_id: CompanyId,
        name: String,
        code: Option<String>,
        kind: AnalyticAccountKind,
        root: Option<AnalyticAccountId>,
        parent: Option<AnalyticAccountId>,
    ) -> Result<AnalyticAccountId, DispatchError> {
        if !self.chart(tenant_id, company_id)?.is_created() {
            self.create_chart(tenant_id, company_id)?;
        }

        let chart_id = AnalyticChartId::of_company(company_id);
        let account_id = AnalyticAccountId::new(AggregateId::new());
        let command = AnalyticCommand::CreateAccount(CreateAccount {
            company_id,
            chart_id,
            account_id,
            name,
            code,
            kind,
            root,
            parent,
            occurred_at: Utc::now(),
        });
        self.dispatcher.dispatch(tenant_id, chart_id.0, CHART, command, |_, id| {
            AnalyticChart::empty(AnalyticChartId::new(id))
        })?;

        tracing::debug!(%tenant_id, %company_id, %account_id, ?kind, "analytic account created");
        Ok(account_id)
    }

    // ---- locations ------------------------------------------------------

    pub fn location(&self, tenant_id: TenantId, location_id: LocationId) -> Result<Location, DispatchError> {
        let location = self
            .dispatcher
            .load(tenant_id, location_id.0, |_, id| Location::empty(LocationId::new(id)))?;
        if !location.is_created() {
            return Err(DispatchError::NotFound);
        }
        Ok(location)
    }

    pub fn create_location(
        &self,
        tenant_id: TenantId,
        location: NewLocation,
    ) -> Result<LocationId, DispatchError> {
        let location_id = LocationId::new(AggregateId::new());
        let command = LocationCommand::CreateLocation(CreateLocation {
            location_id,
            name: location.name,
            code: location.code,
            kind: location.kind,
            parent: location.parent,
            warehouse: location.warehouse,
            occurred_at: Utc::now(),
        });
        self.dispatch_location(tenant_id, location_id, command)?;
        Ok(location_id)
    }

    /// Add the company's configuration to a warehouse: one unset analytic
    /// slot per root the company has right now.
    pub fn add_company_configuration(
        &self,
        tenant_id: TenantId,
        location_id: LocationId,
        company_id: CompanyId,
    ) -> Result<Location, DispatchError> {
        let roots = self.roots(tenant_id, company_id)?;
        let command = LocationCommand::AddCompanyConfiguration(AddCompanyConfiguration {
            location_id,
            company_id,
            roots,
            occurred_at: Utc::now(),
        });
        let location = self.dispatch_location(tenant_id, location_id, command)?;
        tracing::info!(%tenant_id, %company_id, %location_id, "warehouse configured for company");
        Ok(location)
    }

    /// Choose (or clear) the warehouse's account for `root`.
    pub fn assign_analytic_account(
        &self,
        tenant_id: TenantId,
        location_id: LocationId,
        company_id: CompanyId,
        root: AnalyticAccountId,
        account: Option<AnalyticAccountId>,
    ) -> Result<Location, DispatchError> {
        let account = match account {
            Some(id) => Some(self.chart(tenant_id, company_id)?.assignable_ref(id)?),
            None => None,
        };
        let command = LocationCommand::AssignAnalyticAccount(AssignAnalyticAccount {
            location_id,
            company_id,
            root,
            account,
            occurred_at: Utc::now(),
        });
        self.dispatch_location(tenant_id, location_id, command)
    }

    fn dispatch_location(
        &self,
        tenant_id: TenantId,
        location_id: LocationId,
        command: LocationCommand,
    ) -> Result<Location, DispatchError> {
        let (location, _) = self.dispatcher.dispatch(
            tenant_id,
            location_id.0,
            LOCATION,
            command,
            |_, id| Location::empty(LocationId::new(id)),
        )?;
        Ok(location)
    }

    // ---- purchases ------------------------------------------------------

    pub fn purchase(&self, tenant_id: TenantId, purchase_id: PurchaseId) -> Result<Purchase, DispatchError> {
        let purchase = self
            .dispatcher
            .load(tenant_id, purchase_id.0, |_, id| Purchase::empty(PurchaseId::new(id)))?;
        if !purchase.is_created() {
            return Err(DispatchError::NotFound);
        }
        Ok(purchase)
    }

    pub fn create_purchase(
        &self,
        tenant_id: TenantId,
        company_id: CompanyId,
        supplier_id: SupplierId,
    ) -> Result<PurchaseId, DispatchError> {
        let purchase_id = PurchaseId::new(AggregateId::new());
        let command = PurchaseCommand::CreatePurchase(CreatePurchase {
            company_id,
            purchase_id,
            supplier_id,
            occurred_at: Utc::now(),
        });
        self.dispatch_purchase(tenant_id, purchase_id, command)?;
        tracing::info!(%tenant_id, %company_id, %purchase_id, "purchase created");
        Ok(purchase_id)
    }

    /// Set (or unset) the purchase's warehouse. Lines already on the purchase
    /// keep their accounts until the purchase is saved.
    pub fn set_warehouse(
        &self,
        tenant_id: TenantId,
        company_id: CompanyId,
        purchase_id: PurchaseId,
        warehouse: Option<LocationId>,
    ) -> Result<Purchase, DispatchError> {
        if let Some(location_id) = warehouse {
            if !self.location(tenant_id, location_id)?.is_warehouse() {
                return Err(DispatchError::Validation(format!(
                    "location {location_id} is not a warehouse"
                )));
            }
        }
        let command = PurchaseCommand::SetWarehouse(SetWarehouse {
            company_id,
            purchase_id,
            warehouse,
            occurred_at: Utc::now(),
        });
        self.dispatch_purchase(tenant_id, purchase_id, command)
    }

    /// Add a line whose analytic accounts come from the warehouse the
    /// purchase has right now.
    pub fn add_line(
        &self,
        tenant_id: TenantId,
        company_id: CompanyId,
        purchase_id: PurchaseId,
        line: NewLine,
    ) -> Result<Purchase, DispatchError> {
        let purchase = self.purchase(tenant_id, purchase_id)?;
        let chart = self.chart(tenant_id, company_id)?;
        let warehouse = self.warehouse_of(tenant_id, &purchase)?;
        let analytic_accounts = line_analytic_entries(
            &chart.roots(),
            warehouse
                .as_ref()
                .and_then(|w| warehouse_analytics(w, company_id)),
        );
        chart.validate_entries(&analytic_accounts)?;

        let command = PurchaseCommand::AddLine(AddLine {
            company_id,
            purchase_id,
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
            expected_version: ExpectedVersion::Exact(purchase.version()),
            analytic_accounts,
            occurred_at: Utc::now(),
        });
        self.dispatch_purchase(tenant_id, purchase_id, command)
    }

    /// Choose (or clear) a line's account for `root` by hand.
    ///
    /// The line is aligned to the current roots first; the account must be a
    /// normal account of `root`.
    pub fn set_line_account(
        &self,
        tenant_id: TenantId,
        company_id: CompanyId,
        purchase_id: PurchaseId,
        line_no: u32,
        root: AnalyticAccountId,
        account: Option<AnalyticAccountId>,
    ) -> Result<Purchase, DispatchError> {
        let purchase = self.purchase(tenant_id, purchase_id)?;
        let chart = self.chart(tenant_id, company_id)?;
        let line = purchase
            .line(line_no)
            .ok_or_else(|| DispatchError::Validation(format!("unknown line {line_no}")))?;

        let mut analytic_accounts = line.analytic_accounts.aligned_to(&chart.roots());
        if !analytic_accounts.set_account(root, account) {
            return Err(DispatchError::Validation(format!("unknown analytic root {root}")));
        }
        chart.validate_entries(&analytic_accounts)?;

        let command = PurchaseCommand::SetLineAnalytics(SetLineAnalytics {
            company_id,
            purchase_id,
            line_no,
            expected_version: ExpectedVersion::Exact(purchase.version()),
            analytic_accounts,
            occurred_at: Utc::now(),
        });
        self.dispatch_purchase(tenant_id, purchase_id, command)
    }

    /// Bring every line's analytic entries to their saved form.
    ///
    /// All changed lines are written in one commit against the version the
    /// entries were computed from; a concurrent change to the purchase fails
    /// the save with `DispatchError::Concurrency`. Unchanged lines produce no
    /// event, and a quoted or confirmed purchase is left as it is.
    pub fn save_purchase(
        &self,
        tenant_id: TenantId,
        company_id: CompanyId,
        purchase_id: PurchaseId,
    ) -> Result<Purchase, DispatchError> {
        let purchase = self.purchase(tenant_id, purchase_id)?;
        if purchase.state() != PurchaseState::Draft {
            tracing::debug!(
                %tenant_id,
                %purchase_id,
                state = ?purchase.state(),
                "purchase is locked, nothing to save"
            );
            return Ok(purchase);
        }

        let chart = self.chart(tenant_id, company_id)?;
        let roots = chart.roots();
        let warehouse = self.warehouse_of(tenant_id, &purchase)?;
        let configured = warehouse
            .as_ref()
            .and_then(|w| warehouse_analytics(w, company_id));

        let mut lines: Vec<(u32, AnalyticEntries)> = Vec::new();
        for line in purchase.lines() {
            let saved = reconcile_line(&roots, &line.analytic_accounts, configured, self.timing);
            if saved != line.analytic_accounts {
                chart.validate_entries(&saved)?;
                lines.push((line.line_no, saved));
            }
        }

        let changed = lines.len();
        let purchase = if lines.is_empty() {
            purchase
        } else {
            let command = PurchaseCommand::SaveLines(SaveLines {
                company_id,
                purchase_id,
                expected_version: ExpectedVersion::Exact(purchase.version()),
                lines,
                occurred_at: Utc::now(),
            });
            self.dispatch_purchase(tenant_id, purchase_id, command)?
        };

        tracing::info!(
            %tenant_id,
            %purchase_id,
            timing = ?self.timing,
            lines = purchase.lines().len(),
            changed,
            "purchase saved"
        );
        Ok(purchase)
    }

    /// Save, then move the purchase to quotation.
    pub fn quote(
        &self,
        tenant_id: TenantId,
        company_id: CompanyId,
        purchase_id: PurchaseId,
    ) -> Result<Purchase, DispatchError> {
        self.save_purchase(tenant_id, company_id, purchase_id)?;
        let command = PurchaseCommand::Quote(Quote {
            company_id,
            purchase_id,
            occurred_at: Utc::now(),
        });
        self.dispatch_purchase(tenant_id, purchase_id, command)
    }

    pub fn confirm(
        &self,
        tenant_id: TenantId,
        company_id: CompanyId,
        purchase_id: PurchaseId,
    ) -> Result<Purchase, DispatchError> {
        let command = PurchaseCommand::Confirm(Confirm {
            company_id,
            purchase_id,
            occurred_at: Utc::now(),
        });
        self.dispatch_purchase(tenant_id, purchase_id, command)
    }

    fn warehouse_of(
        &self,
        tenant_id: TenantId,
        purchase: &Purchase,
    ) -> Result<Option<Location>, DispatchError> {
        purchase
            .warehouse()
            .map(|location_id| self.location(tenant_id, location_id))
            .transpose()
    }

    fn dispatch_purchase(
        &self,
        tenant_id: TenantId,
        purchase_id: PurchaseId,
        command: PurchaseCommand,
    ) -> Result<Purchase, DispatchError> {
        let (purchase, _) = self.dispatcher.dispatch(
            tenant_id,
            purchase_id.0,
            PURCHASE,
            command,
            |_, id| Purchase::empty(PurchaseId::new(id)),
        )?;
        Ok(purchase)
    }
}
