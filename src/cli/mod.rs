//! Command-line entry point for the background removal server

mod config;
#[path = "main.rs"]
mod main_impl;

pub use main_impl::{main, Cli};
