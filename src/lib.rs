pub mod alerts;
pub mod api;
pub mod auth;
pub mod entities;
pub mod geo;
pub mod live;
pub mod metrics;
pub mod migrator;
pub mod telemetry;
pub mod tracking;

pub use sea_orm;
