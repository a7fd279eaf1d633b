pub mod auth;
pub mod chat_api;
pub mod config;
pub mod feedback;
pub mod medlab;
pub mod monitor;
pub mod rbac;
