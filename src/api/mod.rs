pub mod alert;
pub mod auth;
pub mod customer;
pub mod middleware;
pub mod ws;
