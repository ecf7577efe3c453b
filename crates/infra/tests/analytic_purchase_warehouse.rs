//! Purchases inherit the analytic accounts configured on their warehouse.

use anyhow::Result;

use stockerp_analytic::{AccountFilter, AnalyticAccountId, AnalyticAccountKind};
use stockerp_analytic_purchase::AnalyticTiming;
use stockerp_core::{AggregateId, CompanyId, TenantId};
use stockerp_infra::{
    InMemoryEventStore, NewAccount, NewLine, NewLocation, PurchaseWorkflow,
};
use stockerp_purchasing::{ProductId, PurchaseId, SupplierId};
use stockerp_stock::{LocationId, WarehouseLocations};

struct Setup {
    workflow: PurchaseWorkflow<InMemoryEventStore>,
    tenant: TenantId,
    company: CompanyId,
    roots: Vec<AnalyticAccountId>,
    /// Children of each root, in creation order.
    accounts: Vec<Vec<AnalyticAccountId>>,
    /// Warehouse with no company configuration.
    wh: LocationId,
    /// Warehouse configured with "Account 1.1" and "Account 2.2".
    wh2: LocationId,
}

fn setup(timing: AnalyticTiming) -> Result<Setup> {
    stockerp_observability::init();

    let workflow = PurchaseWorkflow::new(InMemoryEventStore::new(), timing);
    let tenant = TenantId::new();
    let company = CompanyId::new();

    let mut roots = Vec::new();
    let mut accounts = Vec::new();
    for r in 1..=2 {
        let root = workflow.create_root(tenant, company, format!("Root {r}"))?;
        let children = (1..=2)
            .map(|c| {
                workflow.create_account(
                    tenant,
                    company,
                    NewAccount::normal(format!("Account {r}.{c}"), root),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        roots.push(root);
        accounts.push(children);
    }

    let wh = warehouse(&workflow, tenant, "Warehouse", "WH")?;
    let wh2 = warehouse(&workflow, tenant, "Warehouse 2", "WH2")?;
    workflow.add_company_configuration(tenant, wh2, company)?;
    workflow.assign_analytic_account(tenant, wh2, company, roots[0], Some(accounts[0][0]))?;
    workflow.assign_analytic_account(tenant, wh2, company, roots[1], Some(accounts[1][1]))?;

    Ok(Setup {
        workflow,
        tenant,
        company,
        roots,
        accounts,
        wh,
        wh2,
    })
}

fn warehouse(
    workflow: &PurchaseWorkflow<InMemoryEventStore>,
    tenant: TenantId,
    name: &str,
    code: &str,
) -> Result<LocationId> {
    let locations = WarehouseLocations {
        input: workflow.create_location(tenant, NewLocation::storage("Input"))?,
        output: workflow.create_location(tenant, NewLocation::storage("Output"))?,
        storage: workflow.create_location(tenant, NewLocation::storage("Storage"))?,
    };
    Ok(workflow.create_location(tenant, NewLocation::warehouse(name, code, locations))?)
}

impl Setup {
    fn purchase(&self) -> Result<PurchaseId> {
        Ok(self
            .workflow
            .create_purchase(self.tenant, self.company, SupplierId::new(AggregateId::new()))?)
    }

    fn add_line(&self, purchase: PurchaseId) -> Result<()> {
        let line = NewLine {
            product_id: ProductId::new(AggregateId::new()),
            quantity: 10,
            unit_price: 500,
        };
        self.workflow.add_line(self.tenant, self.company, purchase, line)?;
        Ok(())
    }

    fn line_accounts(&self, purchase: PurchaseId, line_no: u32) -> Result<Vec<Option<AnalyticAccountId>>> {
        let purchase = self.workflow.purchase(self.tenant, purchase)?;
        let line = purchase
            .line(line_no)
            .ok_or_else(|| anyhow::anyhow!("line {line_no} missing"))?;
        assert_eq!(line.analytic_accounts.roots().collect::<Vec<_>>(), self.roots);
        Ok(line.analytic_accounts.iter().map(|e| e.account).collect())
    }
}

#[test]
fn chart_lists_roots_and_their_children() -> Result<()> {
    let s = setup(AnalyticTiming::Line)?;

    let roots = s.workflow.find_accounts(
        s.tenant,
        s.company,
        &AccountFilter::new().kind(AnalyticAccountKind::Root),
    )?;
    assert_eq!(
        roots.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(),
        vec!["Root 1", "Root 2"]
    );

    let children = s
        .workflow
        .find_accounts(s.tenant, s.company, &AccountFilter::new().parent(s.roots[1]))?;
    assert_eq!(
        children.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(),
        vec!["Account 2.1", "Account 2.2"]
    );
    Ok(())
}

#[test]
fn unconfigured_warehouse_leaves_every_entry_unset() -> Result<()> {
    let s = setup(AnalyticTiming::Line)?;

    let purchase = s.purchase()?;
    s.workflow.set_warehouse(s.tenant, s.company, purchase, Some(s.wh))?;
    s.add_line(purchase)?;
    s.workflow.save_purchase(s.tenant, s.company, purchase)?;

    assert_eq!(s.line_accounts(purchase, 1)?, vec![None, None]);
    Ok(())
}

#[test]
fn configured_warehouse_fills_the_line_entries() -> Result<()> {
    let s = setup(AnalyticTiming::Line)?;

    let purchase = s.purchase()?;
    s.workflow.set_warehouse(s.tenant, s.company, purchase, Some(s.wh2))?;
    s.add_line(purchase)?;
    s.workflow.save_purchase(s.tenant, s.company, purchase)?;

    assert_eq!(
        s.line_accounts(purchase, 1)?,
        vec![Some(s.accounts[0][0]), Some(s.accounts[1][1])]
    );
    Ok(())
}

#[test]
fn only_lines_added_after_the_warehouse_inherit_it() -> Result<()> {
    let s = setup(AnalyticTiming::Line)?;

    let purchase = s.purchase()?;
    s.add_line(purchase)?;
    s.workflow.set_warehouse(s.tenant, s.company, purchase, Some(s.wh2))?;
    s.add_line(purchase)?;
    s.workflow.save_purchase(s.tenant, s.company, purchase)?;

    assert_eq!(s.line_accounts(purchase, 1)?, vec![None, None]);
    assert_eq!(
        s.line_accounts(purchase, 2)?,
        vec![Some(s.accounts[0][0]), Some(s.accounts[1][1])]
    );
    Ok(())
}

#[test]
fn save_timing_fills_lines_added_before_the_warehouse() -> Result<()> {
    let s = setup(AnalyticTiming::Save)?;

    let purchase = s.purchase()?;
    s.add_line(purchase)?;
    s.workflow.set_warehouse(s.tenant, s.company, purchase, Some(s.wh2))?;
    s.add_line(purchase)?;
    s.workflow.save_purchase(s.tenant, s.company, purchase)?;

    let expected = vec![Some(s.accounts[0][0]), Some(s.accounts[1][1])];
    assert_eq!(s.line_accounts(purchase, 1)?, expected);
    assert_eq!(s.line_accounts(purchase, 2)?, expected);
    Ok(())
}

#[test]
fn saving_twice_appends_nothing_new() -> Result<()> {
    let s = setup(AnalyticTiming::Save)?;

    let purchase = s.purchase()?;
    s.add_line(purchase)?;
    s.workflow.set_warehouse(s.tenant, s.company, purchase, Some(s.wh2))?;
    s.workflow.save_purchase(s.tenant, s.company, purchase)?;

    let store = s.workflow.dispatcher().store();
    let before = store.event_count(s.tenant)?;
    s.workflow.save_purchase(s.tenant, s.company, purchase)?;
    assert_eq!(store.event_count(s.tenant)?, before);
    Ok(())
}

#[test]
fn confirmed_purchase_keeps_its_accounts() -> Result<()> {
    let s = setup(AnalyticTiming::Line)?;

    let purchase = s.purchase()?;
    s.workflow.set_warehouse(s.tenant, s.company, purchase, Some(s.wh2))?;
    s.add_line(purchase)?;
    s.workflow.quote(s.tenant, s.company, purchase)?;
    s.workflow.confirm(s.tenant, s.company, purchase)?;

    // Clearing the warehouse configuration afterwards does not touch the line.
    s.workflow
        .assign_analytic_account(s.tenant, s.wh2, s.company, s.roots[0], None)?;
    assert_eq!(
        s.line_accounts(purchase, 1)?,
        vec![Some(s.accounts[0][0]), Some(s.accounts[1][1])]
    );
    Ok(())
}
