use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockerp_analytic::{AnalyticAccountId, AnalyticAccountRef, AnalyticEntries};
use stockerp_core::{Aggregate, AggregateId, AggregateRoot, CompanyId, DomainError};
use stockerp_events::Event;

/// Location identifier (tenant-scoped via the event stream).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(pub AggregateId);

impl LocationId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for LocationId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    Supplier,
    Customer,
    LostFound,
    Warehouse,
    Storage,
    Production,
    View,
}

/// Sub-locations every warehouse routes goods through.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseLocations {
    pub input: LocationId,
    pub output: LocationId,
    pub storage: LocationId,
}

/// Per-company settings of a warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyConfiguration {
    pub company_id: CompanyId,
    pub analytic_accounts: AnalyticEntries,
}

/// Aggregate root: Location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    id: LocationId,
    name: String,
    code: Option<String>,
    kind: LocationKind,
    parent: Option<LocationId>,
    warehouse: Option<WarehouseLocations>,
    companies: Vec<CompanyConfiguration>,
    version: u64,
    created: bool,
}

impl Location {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: LocationId) -> Self {
        Self {
            id,
            name: String::new(),
            code: None,
            kind: LocationKind::Storage,
            parent: None,
            warehouse: None,
            companies: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> LocationId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn kind(&self) -> LocationKind {
        self.kind
    }

    pub fn parent(&self) -> Option<LocationId> {
        self.parent
    }

    pub fn is_warehouse(&self) -> bool {
        self.kind == LocationKind::Warehouse
    }

    pub fn warehouse_locations(&self) -> Option<&WarehouseLocations> {
        self.warehouse.as_ref()
    }

    pub fn companies(&self) -> &[CompanyConfiguration] {
        &self.companies
    }

    pub fn company_configuration(&self, company_id: CompanyId) -> Option<&CompanyConfiguration> {
        self.companies.iter().find(|c| c.company_id == company_id)
    }

    /// Analytic slots configured for `company_id`, if the warehouse has a
    /// configuration for it.
    pub fn analytic_accounts(&self, company_id: CompanyId) -> Option<&AnalyticEntries> {
        self.company_configuration(company_id)
            .map(|c| &c.analytic_accounts)
    }
}

impl AggregateRoot for Location {
    type Id = LocationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateLocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateLocation {
    pub location_id: LocationId,
    pub name: String,
    pub code: Option<String>,
    pub kind: LocationKind,
    pub parent: Option<LocationId>,
    /// Required for (and only for) `LocationKind::Warehouse`.
    pub warehouse: Option<WarehouseLocations>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddCompanyConfiguration.
///
/// `roots` is the company's analytic roots in chart order; the configuration
/// starts with one unset slot per root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddCompanyConfiguration {
    pub location_id: LocationId,
    pub company_id: CompanyId,
    pub roots: Vec<AnalyticAccountId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AssignAnalyticAccount (`account: None` clears the slot).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignAnalyticAccount {
    pub location_id: LocationId,
    pub company_id: CompanyId,
    pub root: AnalyticAccountId,
    pub account: Option<AnalyticAccountRef>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationCommand {
    CreateLocation(CreateLocation),
    AddCompanyConfiguration(AddCompanyConfiguration),
    AssignAnalyticAccount(AssignAnalyticAccount),
}

/// Event: LocationCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationCreated {
    pub location_id: LocationId,
    pub name: String,
    pub code: Option<String>,
    pub kind: LocationKind,
    pub parent: Option<LocationId>,
    pub warehouse: Option<WarehouseLocations>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CompanyConfigurationAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyConfigurationAdded {
    pub location_id: LocationId,
    pub company_id: CompanyId,
    pub analytic_accounts: AnalyticEntries,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AnalyticAccountAssigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticAccountAssigned {
    pub location_id: LocationId,
    pub company_id: CompanyId,
    pub root: AnalyticAccountId,
    pub account: Option<AnalyticAccountId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationEvent {
    LocationCreated(LocationCreated),
    CompanyConfigurationAdded(CompanyConfigurationAdded),
    AnalyticAccountAssigned(AnalyticAccountAssigned),
}

impl Event for LocationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LocationEvent::LocationCreated(_) => "stock.location.created",
            LocationEvent::CompanyConfigurationAdded(_) => "stock.location.company_added",
            LocationEvent::AnalyticAccountAssigned(_) => "stock.location.analytic_assigned",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LocationEvent::LocationCreated(e) => e.occurred_at,
            LocationEvent::CompanyConfigurationAdded(e) => e.occurred_at,
            LocationEvent::AnalyticAccountAssigned(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Location {
    type Command = LocationCommand;
    type Event = LocationEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LocationEvent::LocationCreated(e) => {
                self.id = e.location_id;
                self.name = e.name.clone();
                self.code = e.code.clone();
                self.kind = e.kind;
                self.parent = e.parent;
                self.warehouse = e.warehouse;
                self.companies.clear();
                self.created = true;
            }
            LocationEvent::CompanyConfigurationAdded(e) => {
                self.companies.push(CompanyConfiguration {
                    company_id: e.company_id,
                    analytic_accounts: e.analytic_accounts.clone(),
                });
            }
            LocationEvent::AnalyticAccountAssigned(e) => {
                if let Some(config) = self
                    .companies
                    .iter_mut()
                    .find(|c| c.company_id == e.company_id)
                {
                    config.analytic_accounts.set_account(e.root, e.account);
                }
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LocationCommand::CreateLocation(cmd) => self.handle_create(cmd),
            LocationCommand::AddCompanyConfiguration(cmd) => self.handle_add_company(cmd),
            LocationCommand::AssignAnalyticAccount(cmd) => self.handle_assign(cmd),
        }
    }
}

impl Location {
    fn ensure_location_id(&self, location_id: LocationId) -> Result<(), DomainError> {
        if self.id != location_id {
            return Err(DomainError::invariant("location_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateLocation) -> Result<Vec<LocationEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("location already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        match (cmd.kind, cmd.warehouse) {
            (LocationKind::Warehouse, None) => {
                return Err(DomainError::validation(
                    "warehouse requires input, output and storage locations",
                ));
            }
            (LocationKind::Warehouse, Some(_)) => {
                if cmd.code.as_deref().is_none_or(|c| c.trim().is_empty()) {
                    return Err(DomainError::validation("warehouse requires a code"));
                }
            }
            (_, Some(_)) => {
                return Err(DomainError::validation(
                    "only warehouses have input, output and storage locations",
                ));
            }
            (_, None) => {}
        }

        Ok(vec![LocationEvent::LocationCreated(LocationCreated {
            location_id: cmd.location_id,
            name: cmd.name.trim().to_string(),
            code: cmd.code.clone(),
            kind: cmd.kind,
            parent: cmd.parent,
            warehouse: cmd.warehouse,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_company(
        &self,
        cmd: &AddCompanyConfiguration,
    ) -> Result<Vec<LocationEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_location_id(cmd.location_id)?;

        if !self.is_warehouse() {
            return Err(DomainError::invariant(
                "company configurations only exist on warehouses",
            ));
        }
        if self.company_configuration(cmd.company_id).is_some() {
            return Err(DomainError::conflict(
                "warehouse already configured for company",
            ));
        }

        let mut seen = HashSet::new();
        if !cmd.roots.iter().all(|r| seen.insert(*r)) {
            return Err(DomainError::validation("duplicate analytic root"));
        }

        Ok(vec![LocationEvent::CompanyConfigurationAdded(
            CompanyConfigurationAdded {
                location_id: cmd.location_id,
                company_id: cmd.company_id,
                analytic_accounts: AnalyticEntries::blank(&cmd.roots),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_assign(
        &self,
        cmd: &AssignAnalyticAccount,
    ) -> Result<Vec<LocationEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_location_id(cmd.location_id)?;

        let entries = self
            .analytic_accounts(cmd.company_id)
            .ok_or_else(DomainError::not_found)?;
        let slot = entries
            .slot(cmd.root)
            .ok_or_else(|| DomainError::validation("warehouse has no slot for analytic root"))?;

        if let Some(account) = cmd.account {
            // Invariant: the chosen account lives under the slot's root.
            if account.root != cmd.root {
                return Err(DomainError::validation(
                    "analytic account belongs to another root",
                ));
            }
        }

        let account = cmd.account.map(|a| a.account);
        if slot.account == account {
            return Ok(vec![]);
        }

        Ok(vec![LocationEvent::AnalyticAccountAssigned(
            AnalyticAccountAssigned {
                location_id: cmd.location_id,
                company_id: cmd.company_id,
                root: cmd.root,
                account,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}
