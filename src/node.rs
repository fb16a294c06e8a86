//! Records of the mirrored node tree.

use core::{borrow::Borrow, fmt, ops::Deref};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Opaque, globally unique node identifier assigned by the diff producer.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Arc<str>);

impl NodeId {
	#[must_use]
	pub fn new(id: impl Into<Arc<str>>) -> Self {
		Self(id.into())
	}

	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl Deref for NodeId {
	type Target = str;

	fn deref(&self) -> &str {
		&self.0
	}
}

impl Borrow<str> for NodeId {
	fn borrow(&self) -> &str {
		&self.0
	}
}

impl From<&str> for NodeId {
	fn from(id: &str) -> Self {
		Self(id.into())
	}
}

impl From<String> for NodeId {
	fn from(id: String) -> Self {
		Self(id.into())
	}
}

impl fmt::Debug for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(&*self.0, f)
	}
}

impl fmt::Display for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Attribute name to value, as last written to the display surface.
pub type Attributes = HashMap<String, String>;

/// Which of the three node shapes a record has, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
	Element,
	Text,
	Component,
}

impl fmt::Display for Shape {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Shape::Element => "element",
			Shape::Text => "text",
			Shape::Component => "component placeholder",
		})
	}
}

/// The payload of a [`Node`].
///
/// `H` is the display surface's handle type. Only concrete nodes carry one;
/// component placeholders exist purely in the store.
#[derive(Debug, Clone)]
pub enum NodeKind<H> {
	Element {
		tag: String,
		namespace: Option<String>,
		attributes: Attributes,
		owner: Option<NodeId>,
		handle: H,
	},
	Text {
		text: String,
		owner: Option<NodeId>,
		handle: H,
	},
	Component {
		component_type: String,
		/// The node currently standing in as this component's content.
		root_id: Option<NodeId>,
		owner: Option<NodeId>,
	},
}

/// A record in the [`NodeStore`](`crate::store::NodeStore`).
#[derive(Debug, Clone)]
pub struct Node<H> {
	id: NodeId,
	kind: NodeKind<H>,
}

impl<H> Node<H> {
	#[must_use]
	pub fn new(id: NodeId, kind: NodeKind<H>) -> Self {
		Self { id, kind }
	}

	#[must_use]
	pub fn id(&self) -> &NodeId {
		&self.id
	}

	#[must_use]
	pub fn kind(&self) -> &NodeKind<H> {
		&self.kind
	}

	pub fn kind_mut(&mut self) -> &mut NodeKind<H> {
		&mut self.kind
	}

	#[must_use]
	pub fn shape(&self) -> Shape {
		match self.kind {
			NodeKind::Element { .. } => Shape::Element,
			NodeKind::Text { .. } => Shape::Text,
			NodeKind::Component { .. } => Shape::Component,
		}
	}

	#[must_use]
	pub fn is_component(&self) -> bool {
		matches!(self.kind, NodeKind::Component { .. })
	}

	/// The display surface handle, for concrete nodes.
	#[must_use]
	pub fn handle(&self) -> Option<&H> {
		match &self.kind {
			NodeKind::Element { handle, .. } | NodeKind::Text { handle, .. } => Some(handle),
			NodeKind::Component { .. } => None,
		}
	}

	/// The bound content of a component placeholder.
	///
	/// Always [`None`] for concrete nodes.
	#[must_use]
	pub fn root_id(&self) -> Option<&NodeId> {
		match &self.kind {
			NodeKind::Component { root_id, .. } => root_id.as_ref(),
			_ => None,
		}
	}

	/// The id of the component this node was rendered by, if any.
	#[must_use]
	pub fn owner(&self) -> Option<&NodeId> {
		match &self.kind {
			NodeKind::Element { owner, .. } | NodeKind::Text { owner, .. } | NodeKind::Component { owner, .. } => owner.as_ref(),
		}
	}

	#[must_use]
	pub fn attributes(&self) -> Option<&Attributes> {
		match &self.kind {
			NodeKind::Element { attributes, .. } => Some(attributes),
			_ => None,
		}
	}

	#[must_use]
	pub fn text(&self) -> Option<&str> {
		match &self.kind {
			NodeKind::Text { text, .. } => Some(text),
			_ => None,
		}
	}
}
