#![doc(html_root_url = "https://docs.rs/mirror-dom/0.1.0")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Applies an ordered stream of [`Change`]s to a [`DisplaySurface`], resolving component placeholders on the way,
//! and bridges native UI events back to the application runtime as correlated [`RemoteCall`]s.
//!
//! The [`Document`] owns its [`NodeStore`] explicitly, so any number of documents can coexist in one process.
//! [`MemorySurface`] is a headless surface, [`web::WebSurface`] renders into the browser DOM.
//!
//! # Logging
//!
//! All logging goes through [`tracing`]. Attribute values, text content and event payloads only appear in log messages
//! with the `"dangerous-logging"` feature enabled.

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod change;
pub mod config;
pub mod document;
pub mod error;
pub mod event;
pub mod handles;
pub mod memory;
mod mutation;
pub mod node;
pub mod rc_hash_map;
pub mod remote;
pub mod resolve;
pub mod store;
pub mod surface;
pub mod web;

pub use change::{Action, Change};
pub use config::Config;
pub use document::Document;
pub use error::{ApplyError, CallError, ChangeError, ResolveError, SurfaceError, TransportError};
pub use event::{EventBridge, EventSource, NativeEvent};
pub use memory::MemorySurface;
pub use node::{Node, NodeId, NodeKind};
pub use remote::{RemoteCall, RemoteCalls, Transport};
pub use store::NodeStore;
pub use surface::DisplaySurface;
