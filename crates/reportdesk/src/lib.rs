#![forbid(unsafe_code)]

pub mod auth;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod console;
pub mod db;
pub mod error;
pub mod models;
pub mod notice;
pub mod reports;
pub mod routes;
pub mod sql;

pub use cli::app::{Cli, Command};
pub use console::Console;
