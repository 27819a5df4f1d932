//! HTTP adapters - REST clients for the POS backend.

pub mod polling_client;

pub use polling_client::HttpPollTransport;
