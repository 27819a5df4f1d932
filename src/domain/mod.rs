//! Domain layer - the notification vocabulary.

pub mod notification;
