//! MCP server exposing search, question answering and knowledge-base
//! management over stdio.

pub mod server;
pub mod tools;
