//! Book Collection API: a JWT-secured REST service for personal book
//! collections, plus the test runner and load generator that exercise it.

pub mod app;
pub mod config;
pub mod db;
pub mod errors;
pub mod extract;
pub mod handlers;
pub mod harness;
pub mod loadtest;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod services;
pub mod state;
