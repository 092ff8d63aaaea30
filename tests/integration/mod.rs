//! Integration tests for the copychain step-chain engine

mod cli_route;
mod navigation;
mod step_chain;
mod stream_parser;
