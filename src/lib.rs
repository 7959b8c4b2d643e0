pub mod api;
pub mod error;
pub mod models;
pub mod schedule;
pub mod services;
pub mod state;
pub mod store;
