//! Entity browser and project clone trigger for a database platform.

pub mod browser;
pub mod cache;
pub mod clone;
pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod notify;
pub mod platform;
pub mod prefs;
pub mod store;
