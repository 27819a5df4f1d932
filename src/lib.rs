//! Comanda Notify - real-time notifications for the Comanda POS
//!
//! This crate implements the client side of the POS notification stream:
//! a Socket.IO channel as the primary transport, HTTP polling as the
//! fallback, and category-based dispatch of order and stock events.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::{ClientError, NotificationClient};
pub use domain::notification::{listener, EventCategory, NotificationEvent};
