//! Analytic accounting domain module (event-sourced).
//!
//! An analytic chart holds one or more roots (dimensions), each owning a tree
//! of accounts. Other modules reference the chart through
//! [`AnalyticEntries`]: one `(root, account?)` slot per root, in root order.

pub mod account;
pub mod chart;
pub mod entry;

pub use account::{AccountFilter, AnalyticAccount, AnalyticAccountId, AnalyticAccountKind, AnalyticAccountRef};
pub use chart::{
    AccountCreated, AnalyticChart, AnalyticChartId, AnalyticCommand, AnalyticEvent, ChartCreated,
    CreateAccount, CreateChart,
};
pub use entry::{AnalyticEntries, AnalyticEntry};
