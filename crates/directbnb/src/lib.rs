//! DirectBnB booking backend: lead capture, package catalog, Stripe checkout,
//! scraped property listings and static site deployment.

pub mod access;
pub mod app;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod deploy;
pub mod error;
pub mod leads;
pub mod memory;
pub mod properties;
pub mod repository;
pub(crate) mod responses;
pub mod site;
pub mod telemetry;
pub mod users;
pub mod validation;
pub mod wizard;
