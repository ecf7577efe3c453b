//! Stock locations domain module (event-sourced).
//!
//! Warehouses carry one configuration per company; each configuration holds
//! the analytic accounts that purchases made against the warehouse inherit.

pub mod location;

pub use location::{
    AddCompanyConfiguration, AnalyticAccountAssigned, AssignAnalyticAccount,
    CompanyConfiguration, CompanyConfigurationAdded, CreateLocation, Location, LocationCommand,
    LocationCreated, LocationEvent, LocationId, LocationKind, WarehouseLocations,
};
