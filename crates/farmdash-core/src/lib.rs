pub mod aggregate;
pub mod commands;
pub mod config;
pub mod error;
pub mod fetchers;
pub mod gateway;
pub mod network;
pub mod normalize;
pub mod offline;
pub mod optimistic;
pub mod state;
pub mod sync;
pub mod telemetry;
pub mod types;
pub mod validation;
