use crate::{
	error::ChangeError,
	node::{Node, NodeId, NodeKind, Shape},
};
use hashbrown::{hash_map::Entry, HashMap};
use tracing::trace;

/// Owns every node record of one document.
///
/// The store is the single source of truth for node existence and identity.
/// Display surfaces only ever see handles of concrete nodes.
#[derive(Debug)]
pub struct NodeStore<H> {
	nodes: HashMap<NodeId, Node<H>>,
}

impl<H> Default for NodeStore<H> {
	fn default() -> Self {
		Self::new()
	}
}

impl<H> NodeStore<H> {
	#[must_use]
	pub fn new() -> Self {
		Self { nodes: HashMap::new() }
	}

	/// Installs a new record.
	///
	/// # Errors
	///
	/// Iff `id` is already present, in which case the store is left unchanged.
	pub fn create(&mut self, id: NodeId, kind: NodeKind<H>) -> Result<&mut Node<H>, ChangeError> {
		match self.nodes.entry(id) {
			Entry::Occupied(occupied) => Err(ChangeError::DuplicateId(occupied.key().clone())),
			Entry::Vacant(vacant) => {
				trace!(id = %vacant.key(), "Created node record.");
				let id = vacant.key().clone();
				Ok(vacant.insert(Node::new(id, kind)))
			}
		}
	}

	/// # Errors
	///
	/// [`ChangeError::NotFound`] iff `id` is absent.
	pub fn get(&self, id: &str) -> Result<&Node<H>, ChangeError> {
		self.nodes.get(id).ok_or_else(|| ChangeError::NotFound(id.into()))
	}

	/// # Errors
	///
	/// [`ChangeError::NotFound`] iff `id` is absent.
	pub fn get_mut(&mut self, id: &str) -> Result<&mut Node<H>, ChangeError> {
		self.nodes.get_mut(id).ok_or_else(|| ChangeError::NotFound(id.into()))
	}

	/// Like [`NodeStore::get`], for callers that treat absence as a normal outcome.
	#[must_use]
	pub fn find(&self, id: &str) -> Option<&Node<H>> {
		self.nodes.get(id)
	}

	#[must_use]
	pub fn contains(&self, id: &str) -> bool {
		self.nodes.contains_key(id)
	}

	/// Removes a record, returning it if it was present.
	///
	/// Removing an absent id is a no-op, so redundant deletions are harmless.
	pub fn remove(&mut self, id: &str) -> Option<Node<H>> {
		let removed = self.nodes.remove(id);
		match &removed {
			Some(_) => trace!(id, "Removed node record."),
			None => trace!(id, "Node record already absent."),
		}
		removed
	}

	/// Binds or rebinds a component placeholder's content, returning the previous binding.
	///
	/// # Errors
	///
	/// [`ChangeError::NotFound`] if `id` is absent, [`ChangeError::WrongNodeKind`] if it is concrete.
	pub fn set_root(&mut self, id: &str, new_root: Option<NodeId>) -> Result<Option<NodeId>, ChangeError> {
		let node = self.get_mut(id)?;
		match node.kind_mut() {
			NodeKind::Component { root_id, .. } => Ok(core::mem::replace(root_id, new_root)),
			_ => Err(ChangeError::WrongNodeKind {
				id: id.into(),
				expected: Shape::Component,
			}),
		}
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	pub fn ids(&self) -> impl Iterator<Item = &NodeId> {
		self.nodes.keys()
	}

	pub fn nodes(&self) -> impl Iterator<Item = &Node<H>> {
		self.nodes.values()
	}

	pub fn clear(&mut self) {
		self.nodes.clear()
	}
}
