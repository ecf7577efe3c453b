use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockerp_analytic::AnalyticEntries;
use stockerp_core::{
    Aggregate, AggregateId, AggregateRoot, CompanyId, DomainError, Entity, ExpectedVersion,
    find_by_id,
};
use stockerp_events::Event;
use stockerp_stock::LocationId;

macro_rules! aggregate_newtype {
    ($(#[$meta:meta])* $t:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $t(pub AggregateId);

        impl $t {
            pub fn new(id: AggregateId) -> Self {
                Self(id)
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

aggregate_newtype!(
    /// Purchase identifier (tenant-scoped via the event stream).
    PurchaseId
);
aggregate_newtype!(
    /// Supplier party reference.
    SupplierId
);
aggregate_newtype!(
    /// Purchased product reference.
    ProductId
);

/// Purchase state lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseState {
    Draft,
    Quotation,
    Confirmed,
}

/// Purchase line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: i64,
    /// Smallest currency unit (e.g. cents).
    pub unit_price: i64,
    pub analytic_accounts: AnalyticEntries,
}

impl Entity for PurchaseLine {
    type Id = u32;

    fn id(&self) -> &Self::Id {
        &self.line_no
    }
}

/// Aggregate root: Purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Purchase {
    id: PurchaseId,
    company_id: Option<CompanyId>,
    supplier_id: Option<SupplierId>,
    warehouse: Option<LocationId>,
    state: PurchaseState,
    lines: Vec<PurchaseLine>,
    version: u64,
    created: bool,
}

impl Purchase {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PurchaseId) -> Self {
        Self {
            id,
            company_id: None,
            supplier_id: None,
            warehouse: None,
            state: PurchaseState::Draft,
            lines: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PurchaseId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn company_id(&self) -> Option<CompanyId> {
        self.company_id
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn warehouse(&self) -> Option<LocationId> {
        self.warehouse
    }

    pub fn state(&self) -> PurchaseState {
        self.state
    }

    pub fn lines(&self) -> &[PurchaseLine] {
        &self.lines
    }

    pub fn line(&self, line_no: u32) -> Option<&PurchaseLine> {
        find_by_id(&self.lines, &line_no)
    }
}

impl AggregateRoot for Purchase {
    type Id = PurchaseId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreatePurchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePurchase {
    pub company_id: CompanyId,
    pub purchase_id: PurchaseId,
    pub supplier_id: SupplierId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetWarehouse (`None` unsets it). Draft only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetWarehouse {
    pub company_id: CompanyId,
    pub purchase_id: PurchaseId,
    pub warehouse: Option<LocationId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddLine. Draft only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLine {
    pub company_id: CompanyId,
    pub purchase_id: PurchaseId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: i64,
    /// Entries decided against the purchase at this version.
    pub expected_version: ExpectedVersion,
    pub analytic_accounts: AnalyticEntries,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetLineAnalytics. Draft only; no event when nothing changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetLineAnalytics {
    pub company_id: CompanyId,
    pub purchase_id: PurchaseId,
    pub line_no: u32,
    pub expected_version: ExpectedVersion,
    pub analytic_accounts: AnalyticEntries,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SaveLines. Rewrites the entries of several lines in one commit.
///
/// Draft only. Lines whose entries are unchanged emit nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveLines {
    pub company_id: CompanyId,
    pub purchase_id: PurchaseId,
    pub expected_version: ExpectedVersion,
    pub lines: Vec<(u32, AnalyticEntries)>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub company_id: CompanyId,
    pub purchase_id: PurchaseId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Confirm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirm {
    pub company_id: CompanyId,
    pub purchase_id: PurchaseId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseCommand {
    CreatePurchase(CreatePurchase),
    SetWarehouse(SetWarehouse),
    AddLine(AddLine),
    SetLineAnalytics(SetLineAnalytics),
    SaveLines(SaveLines),
    Quote(Quote),
    Confirm(Confirm),
}

/// Event: PurchaseCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseCreated {
    pub company_id: CompanyId,
    pub purchase_id: PurchaseId,
    pub supplier_id: SupplierId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: WarehouseSet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseSet {
    pub company_id: CompanyId,
    pub purchase_id: PurchaseId,
    pub warehouse: Option<LocationId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAdded {
    pub company_id: CompanyId,
    pub purchase_id: PurchaseId,
    pub line: PurchaseLine,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineAnalyticsSet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAnalyticsSet {
    pub company_id: CompanyId,
    pub purchase_id: PurchaseId,
    pub line_no: u32,
    pub analytic_accounts: AnalyticEntries,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseQuoted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseQuoted {
    pub company_id: CompanyId,
    pub purchase_id: PurchaseId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseConfirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseConfirmed {
    pub company_id: CompanyId,
    pub purchase_id: PurchaseId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseEvent {
    PurchaseCreated(PurchaseCreated),
    WarehouseSet(WarehouseSet),
    LineAdded(LineAdded),
    LineAnalyticsSet(LineAnalyticsSet),
    PurchaseQuoted(PurchaseQuoted),
    PurchaseConfirmed(PurchaseConfirmed),
}

impl Event for PurchaseEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseEvent::PurchaseCreated(_) => "purchasing.purchase.created",
            PurchaseEvent::WarehouseSet(_) => "purchasing.purchase.warehouse_set",
            PurchaseEvent::LineAdded(_) => "purchasing.purchase.line_added",
            PurchaseEvent::LineAnalyticsSet(_) => "purchasing.purchase.line_analytics_set",
            PurchaseEvent::PurchaseQuoted(_) => "purchasing.purchase.quoted",
            PurchaseEvent::PurchaseConfirmed(_) => "purchasing.purchase.confirmed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseEvent::PurchaseCreated(e) => e.occurred_at,
            PurchaseEvent::WarehouseSet(e) => e.occurred_at,
            PurchaseEvent::LineAdded(e) => e.occurred_at,
            PurchaseEvent::LineAnalyticsSet(e) => e.occurred_at,
            PurchaseEvent::PurchaseQuoted(e) => e.occurred_at,
            PurchaseEvent::PurchaseConfirmed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Purchase {
    type Command = PurchaseCommand;
    type Event = PurchaseEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseEvent::PurchaseCreated(e) => {
                self.id = e.purchase_id;
                self.company_id = Some(e.company_id);
                self.supplier_id = Some(e.supplier_id);
                self.warehouse = None;
                self.state = PurchaseState::Draft;
                self.lines.clear();
                self.created = true;
            }
            PurchaseEvent::WarehouseSet(e) => {
                self.warehouse = e.warehouse;
            }
            PurchaseEvent::LineAdded(e) => {
                self.lines.push(e.line.clone());
            }
            PurchaseEvent::LineAnalyticsSet(e) => {
                if let Some(line) = self.lines.iter_mut().find(|l| l.line_no == e.line_no) {
                    line.analytic_accounts = e.analytic_accounts.clone();
                }
            }
            PurchaseEvent::PurchaseQuoted(_) => {
                self.state = PurchaseState::Quotation;
            }
            PurchaseEvent::PurchaseConfirmed(_) => {
                self.state = PurchaseState::Confirmed;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseCommand::CreatePurchase(cmd) => self.handle_create(cmd),
            PurchaseCommand::SetWarehouse(cmd) => self.handle_set_warehouse(cmd),
            PurchaseCommand::AddLine(cmd) => self.handle_add_line(cmd),
            PurchaseCommand::SetLineAnalytics(cmd) => self.handle_set_line_analytics(cmd),
            PurchaseCommand::SaveLines(cmd) => self.handle_save_lines(cmd),
            PurchaseCommand::Quote(cmd) => self.handle_quote(cmd),
            PurchaseCommand::Confirm(cmd) => self.handle_confirm(cmd),
        }
    }
}

impl Purchase {
    fn ensure_existing(
        &self,
        company_id: CompanyId,
        purchase_id: PurchaseId,
    ) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.company_id != Some(company_id) {
            return Err(DomainError::invariant("company mismatch"));
        }
        if self.id != purchase_id {
            return Err(DomainError::invariant("purchase_id mismatch"));
        }
        Ok(())
    }

    fn ensure_draft(&self) -> Result<(), DomainError> {
        if self.state != PurchaseState::Draft {
            return Err(DomainError::invariant(
                "cannot modify purchase once quoted or confirmed",
            ));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreatePurchase) -> Result<Vec<PurchaseEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("purchase already exists"));
        }

        Ok(vec![PurchaseEvent::PurchaseCreated(PurchaseCreated {
            company_id: cmd.company_id,
            purchase_id: cmd.purchase_id,
            supplier_id: cmd.supplier_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_warehouse(
        &self,
        cmd: &SetWarehouse,
    ) -> Result<Vec<PurchaseEvent>, DomainError> {
        self.ensure_existing(cmd.company_id, cmd.purchase_id)?;
        self.ensure_draft()?;

        if self.warehouse == cmd.warehouse {
            return Ok(vec![]);
        }

        Ok(vec![PurchaseEvent::WarehouseSet(WarehouseSet {
            company_id: cmd.company_id,
            purchase_id: cmd.purchase_id,
            warehouse: cmd.warehouse,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_line(&self, cmd: &AddLine) -> Result<Vec<PurchaseEvent>, DomainError> {
        self.ensure_existing(cmd.company_id, cmd.purchase_id)?;
        cmd.expected_version.check(self.version)?;
        self.ensure_draft()?;

        if cmd.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if cmd.unit_price < 0 {
            return Err(DomainError::validation("unit price cannot be negative"));
        }

        let next_line_no = (self.lines.len() as u32) + 1;
        Ok(vec![PurchaseEvent::LineAdded(LineAdded {
            company_id: cmd.company_id,
            purchase_id: cmd.purchase_id,
            line: PurchaseLine {
                line_no: next_line_no,
                product_id: cmd.product_id,
                quantity: cmd.quantity,
                unit_price: cmd.unit_price,
                analytic_accounts: cmd.analytic_accounts.clone(),
            },
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_line_analytics(
        &self,
        cmd: &SetLineAnalytics,
    ) -> Result<Vec<PurchaseEvent>, DomainError> {
        self.ensure_existing(cmd.company_id, cmd.purchase_id)?;
        cmd.expected_version.check(self.version)?;
        self.ensure_draft()?;

        let line = self.existing_line(cmd.line_no)?;
        if line.analytic_accounts == cmd.analytic_accounts {
            return Ok(vec![]);
        }

        Ok(vec![PurchaseEvent::LineAnalyticsSet(LineAnalyticsSet {
            company_id: cmd.company_id,
            purchase_id: cmd.purchase_id,
            line_no: cmd.line_no,
            analytic_accounts: cmd.analytic_accounts.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_save_lines(&self, cmd: &SaveLines) -> Result<Vec<PurchaseEvent>, DomainError> {
        self.ensure_existing(cmd.company_id, cmd.purchase_id)?;
        cmd.expected_version.check(self.version)?;
        self.ensure_draft()?;

        let mut seen = HashSet::new();
        let mut events = Vec::new();
        for (line_no, analytic_accounts) in &cmd.lines {
            if !seen.insert(*line_no) {
                return Err(DomainError::validation(format!("line {line_no} saved twice")));
            }
            if self.existing_line(*line_no)?.analytic_accounts == *analytic_accounts {
                continue;
            }
            events.push(PurchaseEvent::LineAnalyticsSet(LineAnalyticsSet {
                company_id: cmd.company_id,
                purchase_id: cmd.purchase_id,
                line_no: *line_no,
                analytic_accounts: analytic_accounts.clone(),
                occurred_at: cmd.occurred_at,
            }));
        }
        Ok(events)
    }

    fn existing_line(&self, line_no: u32) -> Result<&PurchaseLine, DomainError> {
        self.line(line_no)
            .ok_or_else(|| DomainError::validation(format!("unknown line {line_no}")))
    }

    fn handle_quote(&self, cmd: &Quote) -> Result<Vec<PurchaseEvent>, DomainError> {
        self.ensure_existing(cmd.company_id, cmd.purchase_id)?;

        if self.state != PurchaseState::Draft {
            return Err(DomainError::invariant("only draft purchases can be quoted"));
        }
        if self.lines.is_empty() {
            return Err(DomainError::validation("cannot quote purchase without lines"));
        }
        if self.warehouse.is_none() {
            return Err(DomainError::validation("warehouse is required to quote"));
        }

        Ok(vec![PurchaseEvent::PurchaseQuoted(PurchaseQuoted {
            company_id: cmd.company_id,
            purchase_id: cmd.purchase_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm(&self, cmd: &Confirm) -> Result<Vec<PurchaseEvent>, DomainError> {
        self.ensure_existing(cmd.company_id, cmd.purchase_id)?;

        if self.state != PurchaseState::Quotation {
            return Err(DomainError::invariant(
                "cannot confirm purchase before it is quoted",
            ));
        }

        Ok(vec![PurchaseEvent::PurchaseConfirmed(PurchaseConfirmed {
            company_id: cmd.company_id,
            purchase_id: cmd.purchase_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockerp_analytic::AnalyticAccountId;

    fn test_purchase_id() -> PurchaseId {
        PurchaseId::new(AggregateId::new())
    }

    fn test_product_id() -> ProductId {
        ProductId::new(AggregateId::new())
    }

    fn test_warehouse() -> LocationId {
        LocationId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn run(purchase: &mut Purchase, command: PurchaseCommand) -> Result<usize, DomainError> {
        let events = purchase.handle(&command)?;
        for e in &events {
            purchase.apply(e);
        }
        Ok(events.len())
    }

    fn created(company_id: CompanyId) -> Purchase {
        let purchase_id = test_purchase_id();
        let mut purchase = Purchase::empty(purchase_id);
        run(
            &mut purchase,
            PurchaseCommand::CreatePurchase(CreatePurchase {
                company_id,
                purchase_id,
                supplier_id: SupplierId::new(AggregateId::new()),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        purchase
    }

    fn add_line(
        purchase: &mut Purchase,
        quantity: i64,
        analytic_accounts: AnalyticEntries,
    ) -> Result<usize, DomainError> {
        let command = PurchaseCommand::AddLine(AddLine {
            company_id: purchase.company_id().unwrap(),
            purchase_id: purchase.id_typed(),
            product_id: test_product_id(),
            quantity,
            unit_price: 1000,
            expected_version: ExpectedVersion::Any,
            analytic_accounts,
            occurred_at: test_time(),
        });
        run(purchase, command)
    }

    fn set_warehouse(purchase: &mut Purchase, warehouse: Option<LocationId>) -> usize {
        let command = PurchaseCommand::SetWarehouse(SetWarehouse {
            company_id: purchase.company_id().unwrap(),
            purchase_id: purchase.id_typed(),
            warehouse,
            occurred_at: test_time(),
        });
        run(purchase, command).unwrap()
    }

    fn quote(purchase: &mut Purchase) -> Result<usize, DomainError> {
        let command = PurchaseCommand::Quote(Quote {
            company_id: purchase.company_id().unwrap(),
            purchase_id: purchase.id_typed(),
            occurred_at: test_time(),
        });
        run(purchase, command)
    }

    #[test]
    fn lines_are_numbered_and_keep_their_analytics() {
        let mut purchase = created(CompanyId::new());
        let root = AnalyticAccountId::new(AggregateId::new());
        let mut entries = AnalyticEntries::blank(&[root]);
        entries.set_account(root, Some(AnalyticAccountId::new(AggregateId::new())));

        add_line(&mut purchase, 2, AnalyticEntries::blank(&[root])).unwrap();
        add_line(&mut purchase, 3, entries.clone()).unwrap();

        assert_eq!(purchase.lines().len(), 2);
        assert_eq!(purchase.lines()[0].line_no, 1);
        assert!(purchase.lines()[0].analytic_accounts.is_unset());
        assert_eq!(purchase.line(2).unwrap().analytic_accounts, entries);
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let mut purchase = created(CompanyId::new());
        let err = add_line(&mut purchase, 0, AnalyticEntries::default()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn warehouse_can_be_set_after_lines() {
        let mut purchase = created(CompanyId::new());
        add_line(&mut purchase, 4, AnalyticEntries::default()).unwrap();

        let warehouse = test_warehouse();
        assert_eq!(set_warehouse(&mut purchase, Some(warehouse)), 1);
        assert_eq!(purchase.warehouse(), Some(warehouse));

        // Re-setting the same warehouse is a no-op.
        assert_eq!(set_warehouse(&mut purchase, Some(warehouse)), 0);
    }

    #[test]
    fn set_line_analytics_is_idempotent() {
        let mut purchase = created(CompanyId::new());
        let root = AnalyticAccountId::new(AggregateId::new());
        add_line(&mut purchase, 1, AnalyticEntries::default()).unwrap();

        let cmd = PurchaseCommand::SetLineAnalytics(SetLineAnalytics {
            company_id: purchase.company_id().unwrap(),
            purchase_id: purchase.id_typed(),
            line_no: 1,
            expected_version: ExpectedVersion::Any,
            analytic_accounts: AnalyticEntries::blank(&[root]),
            occurred_at: test_time(),
        });
        assert_eq!(run(&mut purchase, cmd.clone()).unwrap(), 1);
        assert_eq!(run(&mut purchase, cmd).unwrap(), 0);
        assert_eq!(purchase.lines()[0].analytic_accounts.len(), 1);
    }

    #[test]
    fn set_line_analytics_rejects_unknown_line() {
        let mut purchase = created(CompanyId::new());
        let command = PurchaseCommand::SetLineAnalytics(SetLineAnalytics {
            company_id: purchase.company_id().unwrap(),
            purchase_id: purchase.id_typed(),
            line_no: 7,
            expected_version: ExpectedVersion::Any,
            analytic_accounts: AnalyticEntries::default(),
            occurred_at: test_time(),
        });
        let err = run(&mut purchase, command).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn quote_requires_warehouse_and_lines() {
        let mut purchase = created(CompanyId::new());
        assert!(matches!(quote(&mut purchase), Err(DomainError::Validation(_))));

        add_line(&mut purchase, 5, AnalyticEntries::default()).unwrap();
        assert!(matches!(quote(&mut purchase), Err(DomainError::Validation(_))));

        set_warehouse(&mut purchase, Some(test_warehouse()));
        quote(&mut purchase).unwrap();
        assert_eq!(purchase.state(), PurchaseState::Quotation);
    }

    #[test]
    fn quoted_purchase_is_locked() {
        let mut purchase = created(CompanyId::new());
        add_line(&mut purchase, 5, AnalyticEntries::default()).unwrap();
        set_warehouse(&mut purchase, Some(test_warehouse()));
        quote(&mut purchase).unwrap();

        let err = add_line(&mut purchase, 1, AnalyticEntries::default()).unwrap_err();
        match err {
            DomainError::InvariantViolation(msg) if msg.contains("once quoted or confirmed") => {}
            _ => panic!("Expected InvariantViolation for modifying a quoted purchase"),
        }
    }

    #[test]
    fn confirm_requires_quotation() {
        let mut purchase = created(CompanyId::new());
        let confirm = PurchaseCommand::Confirm(Confirm {
            company_id: purchase.company_id().unwrap(),
            purchase_id: purchase.id_typed(),
            occurred_at: test_time(),
        });
        assert!(purchase.handle(&confirm).is_err());

        add_line(&mut purchase, 5, AnalyticEntries::default()).unwrap();
        set_warehouse(&mut purchase, Some(test_warehouse()));
        quote(&mut purchase).unwrap();
        run(&mut purchase, confirm).unwrap();
        assert_eq!(purchase.state(), PurchaseState::Confirmed);
    }

    #[test]
    fn other_company_cannot_touch_purchase() {
        let mut purchase = created(CompanyId::new());
        let err = purchase
            .handle(&PurchaseCommand::SetWarehouse(SetWarehouse {
                company_id: CompanyId::new(),
                purchase_id: purchase.id_typed(),
                warehouse: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(set_warehouse(&mut purchase, None), 0);
    }

    fn save_lines(
        purchase: &Purchase,
        expected_version: ExpectedVersion,
        lines: Vec<(u32, AnalyticEntries)>,
    ) -> PurchaseCommand {
        PurchaseCommand::SaveLines(SaveLines {
            company_id: purchase.company_id().unwrap(),
            purchase_id: purchase.id_typed(),
            expected_version,
            lines,
            occurred_at: test_time(),
        })
    }

    #[test]
    fn save_lines_decides_every_changed_line_at_once() {
        let mut purchase = created(CompanyId::new());
        let root = AnalyticAccountId::new(AggregateId::new());
        for _ in 0..3 {
            add_line(&mut purchase, 1, AnalyticEntries::blank(&[root])).unwrap();
        }
        let mut filled = AnalyticEntries::blank(&[root]);
        filled.set_account(root, Some(AnalyticAccountId::new(AggregateId::new())));

        let command = save_lines(
            &purchase,
            ExpectedVersion::Exact(purchase.version()),
            vec![
                (1, filled.clone()),
                (2, AnalyticEntries::blank(&[root])),
                (3, filled.clone()),
            ],
        );
        let events = purchase.handle(&command).unwrap();
        assert_eq!(events.len(), 2);

        run(&mut purchase, command).unwrap();
        assert_eq!(purchase.line(1).unwrap().analytic_accounts, filled);
        assert!(purchase.line(2).unwrap().analytic_accounts.is_unset());
        assert_eq!(purchase.line(3).unwrap().analytic_accounts, filled);
    }

    #[test]
    fn save_lines_rejects_a_stale_version() {
        let mut purchase = created(CompanyId::new());
        add_line(&mut purchase, 1, AnalyticEntries::default()).unwrap();
        let seen = purchase.version();
        set_warehouse(&mut purchase, Some(test_warehouse()));

        let root = AnalyticAccountId::new(AggregateId::new());
        let command = save_lines(
            &purchase,
            ExpectedVersion::Exact(seen),
            vec![(1, AnalyticEntries::blank(&[root]))],
        );
        let err = purchase.handle(&command).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn save_lines_rejects_unknown_or_repeated_lines() {
        let mut purchase = created(CompanyId::new());
        add_line(&mut purchase, 1, AnalyticEntries::default()).unwrap();
        let root = AnalyticAccountId::new(AggregateId::new());
        let blank = AnalyticEntries::blank(&[root]);

        let unknown = save_lines(&purchase, ExpectedVersion::Any, vec![(4, blank.clone())]);
        assert!(matches!(purchase.handle(&unknown), Err(DomainError::Validation(_))));

        let repeated = save_lines(
            &purchase,
            ExpectedVersion::Any,
            vec![(1, blank.clone()), (1, blank)],
        );
        assert!(matches!(purchase.handle(&repeated), Err(DomainError::Validation(_))));
    }

    #[test]
    fn add_line_rejects_a_stale_version() {
        let mut purchase = created(CompanyId::new());
        let seen = purchase.version();
        set_warehouse(&mut purchase, Some(test_warehouse()));

        let command = PurchaseCommand::AddLine(AddLine {
            company_id: purchase.company_id().unwrap(),
            purchase_id: purchase.id_typed(),
            product_id: test_product_id(),
            quantity: 1,
            unit_price: 10,
            expected_version: ExpectedVersion::Exact(seen),
            analytic_accounts: AnalyticEntries::default(),
            occurred_at: test_time(),
        });
        assert!(matches!(purchase.handle(&command), Err(DomainError::Conflict(_))));
    }

    proptest::proptest! {
        #[test]
        fn line_numbers_are_consecutive(quantities in proptest::collection::vec(1i64..1_000, 1..12)) {
            let mut purchase = created(CompanyId::new());
            for &q in &quantities {
                add_line(&mut purchase, q, AnalyticEntries::default()).unwrap();
            }
            let numbers: Vec<u32> = purchase.lines().iter().map(|l| l.line_no).collect();
            let expected: Vec<u32> = (1..=quantities.len() as u32).collect();
            proptest::prop_assert_eq!(numbers, expected);
            proptest::prop_assert_eq!(purchase.version(), quantities.len() as u64 + 1);
        }
    }
}
