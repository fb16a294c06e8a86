//! The mutation operations behind each [`Change`](`crate::change::Change`).

use crate::{
	document::Document,
	error::ChangeError,
	node::{Attributes, Node, NodeId, NodeKind, Shape},
	surface::DisplaySurface,
};
use hashbrown::HashMap;
use tracing::{debug, error, trace, warn};

macro_rules! value {
	($value:expr) => {{
		if cfg!(feature = "dangerous-logging") {
			$value
		} else {
			"…"
		}
	}};
}

impl<S: DisplaySurface> Document<S> {
	pub(crate) fn mount_root(&mut self, node_id: &NodeId) -> Result<(), ChangeError> {
		if !self.store.contains(node_id) {
			return Err(ChangeError::NotFound(node_id.clone()));
		}
		if let Some(previous) = self.root.replace(node_id.clone()) {
			if previous != *node_id {
				debug!(%previous, "Replacing document root.");
			}
		}
		self.refresh_mount(true)
	}

	pub(crate) fn create_element(&mut self, node_id: &NodeId, tag: &str, namespace: Option<&str>, owner: Option<&NodeId>) -> Result<(), ChangeError> {
		if self.store.contains(node_id) {
			return Err(ChangeError::DuplicateId(node_id.clone()));
		}
		let handle = self.surface.create_element(node_id, tag, namespace)?;
		self.store.create(
			node_id.clone(),
			NodeKind::Element {
				tag: tag.to_owned(),
				namespace: namespace.map(ToOwned::to_owned),
				attributes: Attributes::new(),
				owner: owner.cloned(),
				handle,
			},
		)?;
		Ok(())
	}

	pub(crate) fn create_text(&mut self, node_id: &NodeId, owner: Option<&NodeId>) -> Result<(), ChangeError> {
		if self.store.contains(node_id) {
			return Err(ChangeError::DuplicateId(node_id.clone()));
		}
		let handle = self.surface.create_text(node_id)?;
		self.store.create(
			node_id.clone(),
			NodeKind::Text {
				text: String::new(),
				owner: owner.cloned(),
				handle,
			},
		)?;
		Ok(())
	}

	pub(crate) fn create_component(&mut self, node_id: &NodeId, component_type: &str, owner: Option<&NodeId>) -> Result<(), ChangeError> {
		self.store.create(
			node_id.clone(),
			NodeKind::Component {
				component_type: component_type.to_owned(),
				root_id: None,
				owner: owner.cloned(),
			},
		)?;
		Ok(())
	}

	pub(crate) fn set_component_root(&mut self, node_id: &NodeId, root_id: &NodeId) -> Result<(), ChangeError> {
		if !self.store.contains(root_id) {
			return Err(ChangeError::NotFound(root_id.clone()));
		}
		self.bind_component(node_id, root_id)
	}

	/// Last writer wins: any previous binding is replaced.
	fn bind_component(&mut self, node_id: &NodeId, root_id: &NodeId) -> Result<(), ChangeError> {
		match self.store.set_root(node_id, Some(root_id.clone()))? {
			Some(previous) if previous != *root_id => debug!(component = %node_id, %previous, %root_id, "Rebound component."),
			Some(_) => trace!(component = %node_id, %root_id, "Component binding unchanged."),
			None => trace!(component = %node_id, %root_id, "Bound component."),
		}
		self.refresh_mount(false)
	}

	pub(crate) fn delete_node(&mut self, node_id: &NodeId) {
		match self.store.remove(node_id) {
			Some(node) => {
				if let Some(handle) = node.handle() {
					self.surface.release(node_id, handle);
				}
			}
			None => debug!(%node_id, "Node already deleted."),
		}
		if self.root.as_ref() == Some(node_id) {
			warn!(%node_id, "Deleted the document root. Its content stays displayed until the next mount.");
			self.root = None;
		}
		if self.mounted.as_ref() == Some(node_id) {
			self.mounted = None;
		}
	}

	pub(crate) fn set_attribute(&mut self, node_id: &NodeId, key: &str, value: &str) -> Result<(), ChangeError> {
		let Self { store, surface, .. } = self;
		let (attributes, handle) = element_parts(store.get_mut(node_id)?.kind_mut(), node_id)?;
		if attributes.get(key).map(String::as_str) == Some(value) {
			trace!(%node_id, key, "Attribute unchanged.");
			return Ok(());
		}
		match surface.set_attribute(handle, key, value) {
			Ok(()) => {
				attributes.insert(key.to_owned(), value.to_owned());
			}
			Err(error) => error!(%node_id, key, value = value!(value), "Failed to set attribute: {}", error),
		}
		Ok(())
	}

	pub(crate) fn set_attributes(&mut self, node_id: &NodeId, new_attributes: &HashMap<String, String>) -> Result<(), ChangeError> {
		let Self { store, surface, config, .. } = self;
		let (attributes, handle) = element_parts(store.get_mut(node_id)?.kind_mut(), node_id)?;

		let stale: Vec<String> = attributes
			.keys()
			.filter(|key| !new_attributes.contains_key(*key) && **key != *config.identity_attribute)
			.cloned()
			.collect();
		for key in stale {
			match surface.remove_attribute(handle, &key) {
				Ok(()) => {
					attributes.remove(&key);
				}
				Err(error) => error!(%node_id, key = %key, "Failed to remove attribute: {}", error),
			}
		}

		for (key, value) in new_attributes {
			if attributes.get(key) == Some(value) {
				continue;
			}
			match surface.set_attribute(handle, key, value) {
				Ok(()) => {
					attributes.insert(key.clone(), value.clone());
				}
				Err(error) => error!(%node_id, key = %key, value = value!(value.as_str()), "Failed to set attribute: {}", error),
			}
		}
		Ok(())
	}

	pub(crate) fn delete_attribute(&mut self, node_id: &NodeId, key: &str) -> Result<(), ChangeError> {
		let Self { store, surface, .. } = self;
		let (attributes, handle) = element_parts(store.get_mut(node_id)?.kind_mut(), node_id)?;
		if !attributes.contains_key(key) {
			debug!(%node_id, key, "Attribute already absent.");
			return Ok(());
		}
		match surface.remove_attribute(handle, key) {
			Ok(()) => {
				attributes.remove(key);
			}
			Err(error) => error!(%node_id, key, "Failed to remove attribute: {}", error),
		}
		Ok(())
	}

	pub(crate) fn set_text(&mut self, node_id: &NodeId, value: &str) -> Result<(), ChangeError> {
		let Self { store, surface, .. } = self;
		let (text, handle) = match store.get_mut(node_id)?.kind_mut() {
			NodeKind::Text { text, handle, .. } => (text, handle),
			_ => {
				return Err(ChangeError::WrongNodeKind {
					id: node_id.clone(),
					expected: Shape::Text,
				})
			}
		};
		if text == value {
			trace!(%node_id, "Text unchanged.");
			return Ok(());
		}
		match surface.set_text(handle, value) {
			Ok(()) => {
				text.clear();
				text.push_str(value);
			}
			Err(error) => error!(%node_id, text = value!(value), "Failed to set text: {}", error),
		}
		Ok(())
	}

	pub(crate) fn append_child(&mut self, parent_id: &NodeId, child_id: &NodeId) -> Result<(), ChangeError> {
		let parent = match self.store.find(parent_id) {
			Some(parent) => parent,
			None => {
				debug!(%parent_id, "Parent not found. Skipping append.");
				return Ok(());
			}
		};

		// Appending to a component means "this is my content".
		if parent.is_component() {
			if !self.store.contains(child_id) {
				debug!(%parent_id, %child_id, "Child not found. Skipping component binding.");
				return Ok(());
			}
			return self.bind_component(parent_id, child_id);
		}

		let parent = concrete_handle(parent.handle(), parent_id)?;
		let child = match self.resolve_handle(child_id)? {
			Some(child) => child,
			None => return Ok(()),
		};
		if let Err(error) = self.surface.append_child(&parent, &child) {
			error!(%parent_id, %child_id, "Failed to append child: {}", error);
		}
		Ok(())
	}

	pub(crate) fn remove_child(&mut self, parent_id: &NodeId, child_id: &NodeId) -> Result<(), ChangeError> {
		let parent = match self.store.find(parent_id) {
			Some(parent) => parent,
			None => {
				debug!(%parent_id, "Parent not found. Skipping removal.");
				return Ok(());
			}
		};

		if parent.is_component() && (parent.root_id() == Some(child_id) || self.resolves_alike(parent_id, child_id)?) {
			debug!(component = %parent_id, %child_id, "Unbinding component.");
			self.store.set_root(parent_id, None)?;
			return Ok(());
		}

		let parent = match self.structural_parent(parent, parent_id)? {
			Some(parent) => parent,
			None => {
				debug!(%parent_id, "Component has no concrete content. Skipping removal.");
				return Ok(());
			}
		};
		let child = match self.resolve_handle(child_id)? {
			Some(child) => child,
			None => return Ok(()),
		};
		if let Err(error) = self.surface.remove_child(&parent, &child) {
			error!(%parent_id, %child_id, "Failed to remove child: {}", error);
		}
		Ok(())
	}

	pub(crate) fn replace_child(&mut self, parent_id: &NodeId, old_id: &NodeId, new_child_id: &NodeId) -> Result<(), ChangeError> {
		let parent = match self.store.find(parent_id) {
			Some(parent) => parent,
			None => {
				debug!(%parent_id, "Parent not found. Skipping replacement.");
				return Ok(());
			}
		};

		if parent.is_component() && (parent.root_id() == Some(old_id) || self.resolves_alike(parent_id, old_id)?) {
			if !self.store.contains(new_child_id) {
				debug!(component = %parent_id, %new_child_id, "New child not found. Skipping replacement.");
				return Ok(());
			}
			return self.bind_component(parent_id, new_child_id);
		}

		// Otherwise the change targets the children of the placeholder's concrete content.
		let parent = match self.structural_parent(parent, parent_id)? {
			Some(parent) => parent,
			None => {
				debug!(%parent_id, "Component has no concrete content. Skipping replacement.");
				return Ok(());
			}
		};
		let old_child = match self.resolve_handle(old_id)? {
			Some(old_child) => old_child,
			None => return Ok(()),
		};
		let new_child = match self.resolve_handle(new_child_id)? {
			Some(new_child) => new_child,
			None => return Ok(()),
		};
		if let Err(error) = self.surface.replace_child(&parent, &new_child, &old_child) {
			error!(%parent_id, %old_id, %new_child_id, "Failed to replace child: {}", error);
		}
		Ok(())
	}

	/// The live node that structural changes on `parent` apply to: its own handle, or a placeholder's resolved content.
	fn structural_parent(&self, parent: &Node<S::Node>, parent_id: &NodeId) -> Result<Option<S::Node>, ChangeError> {
		if parent.is_component() {
			self.resolve_handle(parent_id)
		} else {
			concrete_handle(parent.handle(), parent_id).map(Some)
		}
	}

	/// Whether `child_id` resolves to the same concrete node as the placeholder `component_id`, i.e. is its content.
	fn resolves_alike(&self, component_id: &NodeId, child_id: &NodeId) -> Result<bool, ChangeError> {
		let resolved_child = match self.resolve(child_id) {
			Ok(Some(resolved_child)) => resolved_child,
			Ok(None) | Err(_) => return Ok(false),
		};
		Ok(self.resolve(component_id)?.as_ref() == Some(&resolved_child))
	}
}

fn element_parts<'a, H>(kind: &'a mut NodeKind<H>, node_id: &NodeId) -> Result<(&'a mut Attributes, &'a H), ChangeError> {
	match kind {
		NodeKind::Element { attributes, handle, .. } => Ok((attributes, handle)),
		_ => Err(ChangeError::WrongNodeKind {
			id: node_id.clone(),
			expected: Shape::Element,
		}),
	}
}

fn concrete_handle<H: Clone>(handle: Option<&H>, node_id: &NodeId) -> Result<H, ChangeError> {
	handle.cloned().ok_or_else(|| ChangeError::WrongNodeKind {
		id: node_id.clone(),
		expected: Shape::Element,
	})
}
