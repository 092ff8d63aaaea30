//! Copychain: streaming step-chain generation of marketing copy
//!
//! A fixed catalog of copywriting steps is generated one at a time. Each step streams
//! its text from an LLM gateway over server-sent events, and every completed step feeds
//! the prompt context of the steps after it.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod pipeline;
pub mod project;
pub mod session;
pub mod sse;
