pub mod app;
pub mod auth;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod form;
pub mod models;
pub mod presenter;
pub mod storage;

pub use app::PromptApp;
pub use config::AppConfig;
pub use error::{Error, Result};
