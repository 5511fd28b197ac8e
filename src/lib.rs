pub mod api;
pub mod board;
pub mod config;
pub mod error;
pub mod geo;
pub mod models;
pub mod observability;
pub mod resources;
pub mod state;
pub mod upstream;
pub mod views;
