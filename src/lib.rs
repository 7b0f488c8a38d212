//! Desktop print helper: decodes deep links carrying frame numbers, fetches
//! their documents and prints them one at a time.

pub mod alerts;
pub mod api;
pub mod app;
pub mod audit;
pub mod auth;
pub mod config;
pub mod deeplink;
pub mod document;
pub mod error;
pub mod guard;
pub mod logging;
pub mod printer;
pub mod progress;
pub mod report;
pub mod runner;
pub mod server;
pub mod spool;
