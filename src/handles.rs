use crate::node::NodeId;
use hashbrown::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

struct Entry<T> {
	component: Option<NodeId>,
	handle: T,
}

/// Maps ids to opaque native handles (host windows, menus, dock tiles), and components to the handle they render into.
///
/// Shared between the UI thread and IPC callbacks, so every access is serialized by a lock.
pub struct HandleTable<T> {
	entries: Mutex<HashMap<NodeId, Entry<T>>>,
}

impl<T> Default for HandleTable<T> {
	fn default() -> Self {
		Self {
			entries: Mutex::default(),
		}
	}
}

impl<T> core::fmt::Debug for HandleTable<T> {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("HandleTable").field("len", &self.len()).finish_non_exhaustive()
	}
}

impl<T> HandleTable<T> {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	fn lock(&self) -> MutexGuard<'_, HashMap<NodeId, Entry<T>>> {
		self.entries.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Registers `handle` under `id`, optionally as the host of `component`.
	///
	/// Returns the handle previously registered under `id`.
	pub fn insert(&self, id: impl Into<NodeId>, component: Option<NodeId>, handle: T) -> Option<T> {
		let id = id.into();
		let previous = self.lock().insert(id.clone(), Entry { component, handle });
		if previous.is_some() {
			warn!(%id, "Replaced native handle.");
		}
		previous.map(|entry| entry.handle)
	}

	/// Associates an already registered handle with `component` (or none).
	///
	/// Returns whether `id` was registered.
	pub fn set_component(&self, id: &str, component: Option<NodeId>) -> bool {
		match self.lock().get_mut(id) {
			Some(entry) => {
				entry.component = component;
				true
			}
			None => {
				debug!(id, "No native handle to associate.");
				false
			}
		}
	}

	pub fn remove(&self, id: &str) -> Option<T> {
		self.lock().remove(id).map(|entry| entry.handle)
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.lock().len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.lock().is_empty()
	}
}

impl<T: Clone> HandleTable<T> {
	#[must_use]
	pub fn get(&self, id: &str) -> Option<T> {
		self.lock().get(id).map(|entry| entry.handle.clone())
	}

	/// The handle hosting `component`, if any.
	#[must_use]
	pub fn get_by_component(&self, component: &str) -> Option<T> {
		self.lock()
			.values()
			.find(|entry| entry.component.as_deref() == Some(component))
			.map(|entry| entry.handle.clone())
	}
}
