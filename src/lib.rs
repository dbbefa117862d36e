pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod pagination;
pub mod routes;
pub mod services;
pub mod state;

#[cfg(test)]
pub mod testing;
