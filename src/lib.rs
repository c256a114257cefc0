pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod extract;
pub mod images;
pub mod recipes;
pub mod state;
pub mod storage;
