//! Company Intelligence API Library
//!
//! UK company search, profile lookup, and AI-assisted risk analysis on top of
//! the Companies House REST API and an OpenAI-compatible chat-completion
//! endpoint.
//!
//! # Modules
//!
//! - `analysis`: Risk analysis via the language model, with a deterministic fallback.
//! - `companies_house`: Companies House registry client.
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers and router assembly.
//! - `models`: Registry, analysis, and API data models.

pub mod analysis;
pub mod companies_house;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
