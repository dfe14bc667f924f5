pub mod aliases;
pub mod app_error;
pub mod app_state;
pub mod bootstrap;
pub mod choices;
pub mod config;
pub mod db;
pub mod middleware;
pub mod models;
pub mod notifications;
pub mod pricing;
pub mod routes;
pub mod schema;
pub mod serial;
pub mod swagger;
