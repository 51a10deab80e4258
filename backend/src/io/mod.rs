//! # IO Module
//!
//! Interface layer between HTTP clients and the domain services.
//!
//! ## Key Responsibilities
//!
//! - **API Endpoints**: REST endpoints under `/api`
//! - **Change Stream**: server-sent events relaying the attendance change feed
//! - **Error Translation**: domain errors mapped to HTTP status codes
//! - **Client Logging**: forwarding client log lines into the server log

pub mod rest;

pub use rest::*;
