//! The change interpreter.

use crate::{
	change::{Change, WireChange},
	config::Config,
	error::{ApplyError, ChangeError, ResolveError},
	node::{Node, NodeId},
	resolve::resolve,
	store::NodeStore,
	surface::DisplaySurface,
};
use core::fmt;
use serde::Deserialize;
use tracing::{debug, error, instrument, trace, trace_span, warn};

/// One live document: a [`NodeStore`] mirrored onto a [`DisplaySurface`].
///
/// # Correct Use
///
/// Changes must be applied strictly in the order the diff producer emitted them,
/// from the thread (or task) that owns the display surface.
/// Splitting a batch into several consecutive [`apply`](`Document::apply`) calls has no observable effect.
pub struct Document<S: DisplaySurface> {
	pub(crate) config: Config,
	pub(crate) store: NodeStore<S::Node>,
	pub(crate) surface: S,
	/// The node marked by the last `mountRoot`, usually a component placeholder.
	pub(crate) root: Option<NodeId>,
	/// The concrete node last handed to [`DisplaySurface::mount`].
	pub(crate) mounted: Option<NodeId>,
}

impl<S: DisplaySurface> fmt::Debug for Document<S> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Document")
			.field("config", &self.config)
			.field("nodes", &self.store.len())
			.field("root", &self.root)
			.field("mounted", &self.mounted)
			.finish_non_exhaustive()
	}
}

impl<S: DisplaySurface> Document<S> {
	#[must_use]
	pub fn new(surface: S) -> Self {
		Self::with_config(surface, Config::default())
	}

	#[must_use]
	pub fn with_config(surface: S, config: Config) -> Self {
		Self {
			config,
			store: NodeStore::new(),
			surface,
			root: None,
			mounted: None,
		}
	}

	/// Applies `changes` in order.
	///
	/// Structural changes whose referents are already gone are skipped.
	///
	/// # Errors
	///
	/// On the first change that can't be applied, without applying any further changes.
	/// Changes before it remain applied; the caller decides whether to re-render from scratch or abandon the document.
	#[instrument(skip(self, changes), fields(len = changes.len()))]
	pub fn apply(&mut self, changes: &[Change]) -> Result<(), ApplyError> {
		for (index, change) in changes.iter().enumerate() {
			let span = trace_span!("Applying change", index, action = %change.action(), node_id = %change.node_id());
			let _enter = span.enter();
			if let Err(kind) = self.apply_one(change) {
				error!("Aborting change batch: {}", kind);
				return Err(ApplyError {
					index,
					action: Some(change.action()),
					node_id: Some(change.node_id().clone()),
					kind,
				});
			}
		}
		Ok(())
	}

	/// Decodes and applies a JSON change batch record by record.
	///
	/// # Errors
	///
	/// Like [`Document::apply`], and additionally for undecodable input, unknown action tags
	/// and records missing required fields. Records before the offending one remain applied.
	#[instrument(skip(self, json), fields(len = json.len()))]
	pub fn apply_json(&mut self, json: &str) -> Result<(), ApplyError> {
		let records: Vec<serde_json::Value> = serde_json::from_str(json).map_err(|error| {
			error!("Change batch is not a JSON array: {}", error);
			ApplyError {
				index: 0,
				action: None,
				node_id: None,
				kind: ChangeError::Decode(error.to_string()),
			}
		})?;
		self.apply_records(&records)
	}

	/// Like [`Document::apply_json`], for already parsed records.
	///
	/// # Errors
	///
	/// See [`Document::apply_json`].
	pub fn apply_records(&mut self, records: &[serde_json::Value]) -> Result<(), ApplyError> {
		for (index, record) in records.iter().enumerate() {
			let wire = WireChange::deserialize(record).map_err(|error| {
				error!(index, "Undecodable change record: {}", error);
				ApplyError {
					index,
					action: None,
					node_id: None,
					kind: ChangeError::Decode(error.to_string()),
				}
			})?;
			let (action, node_id) = (wire.action(), wire.reported_id().cloned());
			let change = Change::try_from(wire).map_err(|kind| {
				error!(index, ?action, "Aborting change batch: {}", kind);
				ApplyError { index, action, node_id, kind }
			})?;
			self.apply(core::slice::from_ref(&change)).map_err(|error| ApplyError { index, ..error })?;
		}
		Ok(())
	}

	fn apply_one(&mut self, change: &Change) -> Result<(), ChangeError> {
		match change {
			Change::MountRoot { node_id } => self.mount_root(node_id),
			Change::CreateElement { node_id, tag, namespace, owner } => self.create_element(node_id, tag, namespace.as_deref(), owner.as_ref()),
			Change::CreateText { node_id, owner } => self.create_text(node_id, owner.as_ref()),
			Change::CreateComponent { node_id, component_type, owner } => self.create_component(node_id, component_type, owner.as_ref()),
			Change::SetComponentRoot { node_id, root_id } => self.set_component_root(node_id, root_id),
			Change::DeleteNode { node_id } => {
				self.delete_node(node_id);
				Ok(())
			}
			Change::SetAttribute { node_id, key, value } => self.set_attribute(node_id, key, value),
			Change::SetAttributes { node_id, attributes } => self.set_attributes(node_id, attributes),
			Change::DeleteAttribute { node_id, key } => self.delete_attribute(node_id, key),
			Change::SetText { node_id, value } => self.set_text(node_id, value),
			Change::AppendChild { parent_id, child_id } => self.append_child(parent_id, child_id),
			Change::RemoveChild { parent_id, child_id } => self.remove_child(parent_id, child_id),
			Change::ReplaceChild { parent_id, old_id, new_child_id } => self.replace_child(parent_id, old_id, new_child_id),
		}
	}

	/// Resolves `id` through component indirection to the nearest concrete node.
	///
	/// # Errors
	///
	/// See [`resolve`].
	pub fn resolve(&self, id: &str) -> Result<Option<NodeId>, ResolveError> {
		resolve(&self.store, id, self.config.resolve_depth_limit)
	}

	/// Resolves `id` for a structural operation, treating absence like an unmounted component.
	pub(crate) fn resolve_handle(&self, id: &str) -> Result<Option<S::Node>, ChangeError> {
		match self.resolve(id) {
			Ok(Some(concrete)) => Ok(self.store.find(&concrete).and_then(Node::handle).cloned()),
			Ok(None) => {
				debug!(id, "Nothing to attach yet.");
				Ok(None)
			}
			Err(ResolveError::NotFound(id)) => {
				debug!(%id, "Node not found.");
				Ok(None)
			}
			Err(error) => Err(error.into()),
		}
	}

	/// Re-resolves the document root and mounts it if its concrete content changed (or always, if `force`d).
	pub(crate) fn refresh_mount(&mut self, force: bool) -> Result<(), ChangeError> {
		let root = match &self.root {
			Some(root) => root,
			None => return Ok(()),
		};
		let concrete = match self.resolve(root)? {
			Some(concrete) => concrete,
			None => {
				debug!(%root, "Document root has no concrete content yet.");
				return Ok(());
			}
		};
		if !force && self.mounted.as_ref() == Some(&concrete) {
			trace!(%concrete, "Document root content unchanged.");
			return Ok(());
		}

		let handle = match self.store.find(&concrete).and_then(Node::handle) {
			Some(handle) => handle.clone(),
			None => return Err(ChangeError::NotFound(concrete)),
		};
		match self.surface.mount(&handle) {
			Ok(()) => {
				debug!(%root, %concrete, "Mounted document root.");
				self.mounted = Some(concrete);
			}
			Err(error) => error!(%root, %concrete, "Failed to mount document root: {}", error),
		}
		Ok(())
	}

	#[must_use]
	pub fn config(&self) -> &Config {
		&self.config
	}

	#[must_use]
	pub fn store(&self) -> &NodeStore<S::Node> {
		&self.store
	}

	#[must_use]
	pub fn surface(&self) -> &S {
		&self.surface
	}

	pub fn surface_mut(&mut self) -> &mut S {
		&mut self.surface
	}

	#[must_use]
	pub fn into_surface(self) -> S {
		self.surface
	}

	/// The node marked as document root, if any.
	#[must_use]
	pub fn root(&self) -> Option<&NodeId> {
		self.root.as_ref()
	}

	/// The concrete node currently displayed as document root, if any.
	#[must_use]
	pub fn mounted(&self) -> Option<&NodeId> {
		self.mounted.as_ref()
	}

	/// The component that rendered `id`, for routing events raised on it.
	#[must_use]
	pub fn owner_of(&self, id: &str) -> Option<&NodeId> {
		self.store.find(id).and_then(Node::owner)
	}

	/// Drops all node records and forgets the root, e.g. before a full re-render.
	///
	/// The display surface is left as is until the next mount.
	pub fn reset(&mut self) {
		if !self.store.is_empty() {
			warn!(nodes = self.store.len(), "Discarding all node records.");
		}
		self.store.clear();
		self.root = None;
		self.mounted = None;
	}
}
