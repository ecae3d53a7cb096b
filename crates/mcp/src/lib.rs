//! Leadbridge MCP (Model Context Protocol) server
//!
//! Lets an AI agent search and edit Odoo CRM leads and partners, ask
//! questions in natural language and plan bulk updates.
//!
//! ## Architecture
//!
//! - `LeadbridgeMcpServer`: the MCP handler, one method per tool
//! - `tools`: tool parameters and the tool catalogue
//!
//! All behaviour lives in [`leadbridge_agent::Toolkit`]; this crate only
//! marshals arguments and encodes results.

mod server;
mod tools;

pub use server::LeadbridgeMcpServer;
pub use tools::*;
