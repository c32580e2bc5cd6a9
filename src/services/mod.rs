pub mod aggregator;
pub mod dashboard;
pub mod install;
pub mod setup;
pub mod validation;
