pub mod accounts;
pub mod chatbot;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod mail;
pub mod models;
pub mod pricing;
pub mod rbac;
pub mod reservations;
pub mod security;
pub mod session;
pub mod wizard;
