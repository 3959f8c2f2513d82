//! usage-billing-service: usage metering, quota enforcement, billing
//! calculation, order pricing and usage reporting for brands.

pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;
pub mod workers;
