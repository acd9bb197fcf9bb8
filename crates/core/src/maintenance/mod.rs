//! Daily batch job keeping every portfolio's cached history current.

pub mod maintenance_model;
pub mod maintenance_service;


pub use maintenance_model::{MaintenanceConfig, MaintenanceSummary};
pub use maintenance_service::MaintenanceService;
