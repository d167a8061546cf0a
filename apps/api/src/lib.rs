pub mod cli;
pub mod client;
pub mod config;
pub mod csv_import;
pub mod db;
pub mod errors;
pub mod models;
pub mod routes;
pub mod state;
