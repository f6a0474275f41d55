pub mod batch;
pub mod cli;
pub mod config;
pub mod converter;
pub mod engine;
pub mod error;
pub mod policy;
pub mod prefs;
pub mod report;
pub mod util;

pub const APP_NAME: &str = "mdconvert";
