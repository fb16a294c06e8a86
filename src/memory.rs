//! A headless, in-memory [`DisplaySurface`].
//!
//! It follows DOM semantics closely enough to catch protocol errors (removing a non-child,
//! inserting a node into its own subtree, appending to text…) and records every call it receives,
//! which makes it the reference surface for tests of diff producers.

use crate::{error::SurfaceError, surface::DisplaySurface};
use core::fmt::Write as _;
use hashbrown::HashSet;
use std::collections::BTreeMap;
use tracing::trace;

/// Handle to a node of a [`MemorySurface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemoryNode(usize);

/// One recorded [`DisplaySurface`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
	CreateElement { id: String, tag: String, namespace: Option<String> },
	CreateText { id: String },
	SetAttribute { node: MemoryNode, key: String, value: String },
	RemoveAttribute { node: MemoryNode, key: String },
	AppendChild { parent: MemoryNode, child: MemoryNode },
	RemoveChild { parent: MemoryNode, child: MemoryNode },
	ReplaceChild { parent: MemoryNode, new_child: MemoryNode, old_child: MemoryNode },
	SetText { node: MemoryNode, text: String },
	Mount { root: MemoryNode },
	Release { node: MemoryNode },
}

#[derive(Debug)]
enum Content {
	Element {
		tag: String,
		namespace: Option<String>,
		attributes: BTreeMap<String, String>,
		children: Vec<MemoryNode>,
	},
	Text(String),
}

#[derive(Debug)]
struct Entry {
	id: String,
	parent: Option<MemoryNode>,
	content: Content,
}

#[derive(Debug, Default)]
pub struct MemorySurface {
	entries: Vec<Entry>,
	mounted: Option<MemoryNode>,
	ops: Vec<Op>,
	rejected_tags: HashSet<String>,
}

impl MemorySurface {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Makes [`DisplaySurface::create_element`] fail for `tag` from now on.
	pub fn reject_tag(&mut self, tag: impl Into<String>) {
		self.rejected_tags.insert(tag.into());
	}

	/// Every call received so far, in order.
	#[must_use]
	pub fn ops(&self) -> &[Op] {
		&self.ops
	}

	pub fn take_ops(&mut self) -> Vec<Op> {
		core::mem::take(&mut self.ops)
	}

	/// How many times [`DisplaySurface::mount`] was called.
	#[must_use]
	pub fn mount_count(&self) -> usize {
		self.ops.iter().filter(|op| matches!(op, Op::Mount { .. })).count()
	}

	#[must_use]
	pub fn mounted(&self) -> Option<MemoryNode> {
		self.mounted
	}

	/// The most recently created node stamped with `id`.
	#[must_use]
	pub fn find(&self, id: &str) -> Option<MemoryNode> {
		self.entries.iter().rposition(|entry| entry.id == id).map(MemoryNode)
	}

	#[must_use]
	pub fn node_id(&self, node: MemoryNode) -> Option<&str> {
		self.entries.get(node.0).map(|entry| entry.id.as_str())
	}

	#[must_use]
	pub fn parent(&self, node: MemoryNode) -> Option<MemoryNode> {
		self.entries.get(node.0).and_then(|entry| entry.parent)
	}

	#[must_use]
	pub fn tag(&self, node: MemoryNode) -> Option<&str> {
		match &self.entries.get(node.0)?.content {
			Content::Element { tag, .. } => Some(tag),
			Content::Text(_) => None,
		}
	}

	#[must_use]
	pub fn namespace(&self, node: MemoryNode) -> Option<&str> {
		match &self.entries.get(node.0)?.content {
			Content::Element { namespace, .. } => namespace.as_deref(),
			Content::Text(_) => None,
		}
	}

	#[must_use]
	pub fn attributes(&self, node: MemoryNode) -> Option<&BTreeMap<String, String>> {
		match &self.entries.get(node.0)?.content {
			Content::Element { attributes, .. } => Some(attributes),
			Content::Text(_) => None,
		}
	}

	#[must_use]
	pub fn children(&self, node: MemoryNode) -> &[MemoryNode] {
		match self.entries.get(node.0).map(|entry| &entry.content) {
			Some(Content::Element { children, .. }) => children,
			_ => &[],
		}
	}

	#[must_use]
	pub fn text(&self, node: MemoryNode) -> Option<&str> {
		match &self.entries.get(node.0)?.content {
			Content::Text(text) => Some(text),
			Content::Element { .. } => None,
		}
	}

	/// Serializes the subtree at `node` as compact HTML, attributes sorted by name.
	#[must_use]
	pub fn render(&self, node: MemoryNode) -> String {
		let mut html = String::new();
		self.render_into(node, &mut html);
		html
	}

	/// [`MemorySurface::render`] of the mounted root, or an empty string.
	#[must_use]
	pub fn render_mounted(&self) -> String {
		self.mounted.map(|root| self.render(root)).unwrap_or_default()
	}

	fn render_into(&self, node: MemoryNode, html: &mut String) {
		let entry = match self.entries.get(node.0) {
			Some(entry) => entry,
			None => return,
		};
		match &entry.content {
			Content::Text(text) => html.push_str(&escape(text)),
			Content::Element { tag, attributes, children, .. } => {
				html.push('<');
				html.push_str(tag);
				for (key, value) in attributes {
					// Writing to a `String` can't fail.
					let _ = write!(html, " {}=\"{}\"", key, escape(value));
				}
				html.push('>');
				for &child in children {
					self.render_into(child, html);
				}
				let _ = write!(html, "</{}>", tag);
			}
		}
	}

	fn entry(&self, node: MemoryNode) -> Result<&Entry, SurfaceError> {
		self.entries.get(node.0).ok_or_else(|| SurfaceError::new(format!("unknown node {:?}", node)))
	}

	fn children_mut(&mut self, parent: MemoryNode) -> Result<&mut Vec<MemoryNode>, SurfaceError> {
		match self.entries.get_mut(parent.0).map(|entry| &mut entry.content) {
			Some(Content::Element { children, .. }) => Ok(children),
			Some(Content::Text(_)) => Err(SurfaceError::new(format!("{:?} is a text node and can't have children", parent))),
			None => Err(SurfaceError::new(format!("unknown node {:?}", parent))),
		}
	}

	fn is_inclusive_ancestor(&self, ancestor: MemoryNode, mut node: MemoryNode) -> bool {
		loop {
			if node == ancestor {
				return true;
			}
			match self.parent(node) {
				Some(parent) => node = parent,
				None => return false,
			}
		}
	}

	/// Checks that `child` may be inserted into `parent`.
	fn check_insertion(&self, parent: MemoryNode, child: MemoryNode) -> Result<(), SurfaceError> {
		self.entry(child)?;
		if let Content::Text(_) = self.entry(parent)?.content {
			return Err(SurfaceError::new(format!("{:?} is a text node and can't have children", parent)));
		}
		if self.is_inclusive_ancestor(child, parent) {
			return Err(SurfaceError::new(format!("inserting {:?} into {:?} would create a cycle", child, parent)));
		}
		Ok(())
	}

	fn detach(&mut self, node: MemoryNode) {
		if let Some(parent) = self.entries[node.0].parent.take() {
			if let Ok(children) = self.children_mut(parent) {
				children.retain(|&child| child != node);
			}
		}
	}

	fn update_element(&mut self, node: MemoryNode, update: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<(), SurfaceError> {
		match self.entries.get_mut(node.0).map(|entry| &mut entry.content) {
			Some(Content::Element { attributes, .. }) => {
				update(attributes);
				Ok(())
			}
			Some(Content::Text(_)) => Err(SurfaceError::new(format!("{:?} is a text node and has no attributes", node))),
			None => Err(SurfaceError::new(format!("unknown node {:?}", node))),
		}
	}

	fn push(&mut self, id: &str, content: Content) -> MemoryNode {
		self.entries.push(Entry {
			id: id.to_owned(),
			parent: None,
			content,
		});
		MemoryNode(self.entries.len() - 1)
	}
}

impl DisplaySurface for MemorySurface {
	type Node = MemoryNode;

	fn create_element(&mut self, id: &str, tag: &str, namespace: Option<&str>) -> Result<MemoryNode, SurfaceError> {
		if self.rejected_tags.contains(tag) {
			return Err(SurfaceError::new(format!("<{}> is rejected", tag)));
		}
		self.ops.push(Op::CreateElement {
			id: id.to_owned(),
			tag: tag.to_owned(),
			namespace: namespace.map(ToOwned::to_owned),
		});
		let node = self.push(
			id,
			Content::Element {
				tag: tag.to_owned(),
				namespace: namespace.map(ToOwned::to_owned),
				attributes: BTreeMap::new(),
				children: Vec::new(),
			},
		);
		trace!(id, tag, ?node, "Created element.");
		Ok(node)
	}

	fn create_text(&mut self, id: &str) -> Result<MemoryNode, SurfaceError> {
		self.ops.push(Op::CreateText { id: id.to_owned() });
		Ok(self.push(id, Content::Text(String::new())))
	}

	fn set_attribute(&mut self, node: &MemoryNode, key: &str, value: &str) -> Result<(), SurfaceError> {
		self.ops.push(Op::SetAttribute {
			node: *node,
			key: key.to_owned(),
			value: value.to_owned(),
		});
		self.update_element(*node, |attributes| {
			attributes.insert(key.to_owned(), value.to_owned());
		})
	}

	fn remove_attribute(&mut self, node: &MemoryNode, key: &str) -> Result<(), SurfaceError> {
		self.ops.push(Op::RemoveAttribute { node: *node, key: key.to_owned() });
		self.update_element(*node, |attributes| {
			attributes.remove(key);
		})
	}

	fn append_child(&mut self, parent: &MemoryNode, child: &MemoryNode) -> Result<(), SurfaceError> {
		self.ops.push(Op::AppendChild { parent: *parent, child: *child });
		self.check_insertion(*parent, *child)?;
		self.detach(*child);
		self.children_mut(*parent)?.push(*child);
		self.entries[child.0].parent = Some(*parent);
		Ok(())
	}

	fn remove_child(&mut self, parent: &MemoryNode, child: &MemoryNode) -> Result<(), SurfaceError> {
		self.ops.push(Op::RemoveChild { parent: *parent, child: *child });
		if self.entry(*child)?.parent != Some(*parent) {
			return Err(SurfaceError::new(format!("{:?} is not a child of {:?}", child, parent)));
		}
		self.detach(*child);
		Ok(())
	}

	fn replace_child(&mut self, parent: &MemoryNode, new_child: &MemoryNode, old_child: &MemoryNode) -> Result<(), SurfaceError> {
		self.ops.push(Op::ReplaceChild {
			parent: *parent,
			new_child: *new_child,
			old_child: *old_child,
		});
		if self.entry(*old_child)?.parent != Some(*parent) {
			return Err(SurfaceError::new(format!("{:?} is not a child of {:?}", old_child, parent)));
		}
		if new_child == old_child {
			return Ok(());
		}
		self.check_insertion(*parent, *new_child)?;
		self.detach(*new_child);
		let children = self.children_mut(*parent)?;
		let position = children
			.iter()
			.position(|child| child == old_child)
			.ok_or_else(|| SurfaceError::new(format!("{:?} is not a child of {:?}", old_child, parent)))?;
		children[position] = *new_child;
		self.entries[old_child.0].parent = None;
		self.entries[new_child.0].parent = Some(*parent);
		Ok(())
	}

	fn set_text(&mut self, node: &MemoryNode, text: &str) -> Result<(), SurfaceError> {
		self.ops.push(Op::SetText { node: *node, text: text.to_owned() });
		match self.entries.get_mut(node.0).map(|entry| &mut entry.content) {
			Some(Content::Text(existing)) => {
				existing.clear();
				existing.push_str(text);
				Ok(())
			}
			Some(Content::Element { .. }) => Err(SurfaceError::new(format!("{:?} is not a text node", node))),
			None => Err(SurfaceError::new(format!("unknown node {:?}", node))),
		}
	}

	fn mount(&mut self, root: &MemoryNode) -> Result<(), SurfaceError> {
		self.ops.push(Op::Mount { root: *root });
		self.entry(*root)?;
		self.detach(*root);
		self.mounted = Some(*root);
		Ok(())
	}

	fn release(&mut self, _id: &str, node: &MemoryNode) {
		self.ops.push(Op::Release { node: *node });
	}
}

fn escape(text: &str) -> String {
	let mut escaped = String::with_capacity(text.len());
	for c in text.chars() {
		match c {
			'&' => escaped.push_str("&amp;"),
			'<' => escaped.push_str("&lt;"),
			'>' => escaped.push_str("&gt;"),
			'"' => escaped.push_str("&quot;"),
			c => escaped.push(c),
		}
	}
	escaped
}
