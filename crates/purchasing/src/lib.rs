//! Purchasing domain module (purchases, event-sourced).
//!
//! This crate contains business rules for purchases, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage). Which analytic
//! accounts a line receives is decided outside the aggregate and handed in
//! through the commands.

pub mod purchase;

pub use purchase::{
    AddLine, Confirm, CreatePurchase, LineAdded, LineAnalyticsSet, ProductId, Purchase,
    PurchaseCommand, PurchaseConfirmed, PurchaseCreated, PurchaseEvent, PurchaseId, PurchaseLine,
    PurchaseQuoted, PurchaseState, Quote, SaveLines, SetLineAnalytics, SetWarehouse, SupplierId,
    WarehouseSet,
};
