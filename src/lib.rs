//! Communications core for relaying news articles by email and social post.
//!
//! The [`system::System`] facade is the entry point. It routes every request
//! through a [`comms::CommsManager`], which switches each remote capability
//! between a live and an offline transport and keeps content searches in a
//! SQLite-backed [`cache`].

pub mod cache;
pub mod comms;
pub mod config;
pub mod env;
pub mod logging;
pub mod system;
