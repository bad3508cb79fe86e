pub mod api_url;
pub mod auth;
pub mod backtest;
pub mod client;
pub mod commands;
pub mod config;
pub mod context;
pub mod environments;
pub mod error;
pub mod models;
pub mod performance;
pub mod results;
pub mod session;
pub mod simulations;
pub mod stocks;
pub mod strategies;
pub mod strategy;

pub use client::ApiClient;
pub use error::{ApiError, ValidationError};
