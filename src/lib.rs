pub mod app;
pub mod auth;
pub mod categories;
pub mod client;
pub mod config;
pub mod db;
pub mod envelope;
pub mod error;
pub mod extract;
pub mod mail;
pub mod memory;
pub mod products;
pub mod state;
pub mod upload;
pub mod validation;
