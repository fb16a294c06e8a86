//! The change vocabulary and its wire format.
//!
//! A change stream is an ordered JSON array of flat records `{"Action": <tag>, ...fields}`.
//! The tag may be a string or an integer code:
//!
//! | Code | Tags | Fields |
//! |---|---|---|
//! | 0 | `mountRoot`, `setRoot` | `NodeID` |
//! | 1 | `newNode`, `createElem` | `NodeID`, `Type`/`Tag`, `Namespace`?, `CompoID`?, `IsCompo`? |
//! | 2 | `delNode`, `deleteNode` | `NodeID` |
//! | 3 | `setAttr` | `NodeID`, `Key`, `Value`? |
//! | 4 | `delAttr` | `NodeID`, `Key` |
//! | 5 | `setText` | `NodeID`, `Value`? |
//! | 6 | `appendChild` | `ParentID`/`NodeID`, `ChildID` |
//! | 7 | `removeChild` | `ParentID`/`NodeID`, `ChildID` |
//! | 8 | `replaceChild` | `ParentID`/`NodeID`, `ChildID` + `NewChildID`, or `OldID` + `ChildID` |
//! | 9 | `createText` | `NodeID`, `CompoID`? |
//! | 10 | `createCompo` | `NodeID`, `ComponentType`/`Type`/`Name`, `CompoID`? |
//! | 11 | `setCompoRoot` | `NodeID`, `RootID` |
//! | 12 | `setAttrs` | `NodeID`, `Attrs` |
//!
//! Changing this table is a breaking change for every diff producer.

use crate::{error::ChangeError, node::NodeId};
use core::fmt;
use hashbrown::HashMap;
use serde::{de, Deserialize, Deserializer, Serialize};

/// Field-less tag of a [`Change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
	MountRoot,
	CreateElement,
	DeleteNode,
	SetAttribute,
	DeleteAttribute,
	SetText,
	AppendChild,
	RemoveChild,
	ReplaceChild,
	CreateText,
	CreateComponent,
	SetComponentRoot,
	SetAttributes,
}

impl Action {
	const ALL: [Action; 13] = [
		Action::MountRoot,
		Action::CreateElement,
		Action::DeleteNode,
		Action::SetAttribute,
		Action::DeleteAttribute,
		Action::SetText,
		Action::AppendChild,
		Action::RemoveChild,
		Action::ReplaceChild,
		Action::CreateText,
		Action::CreateComponent,
		Action::SetComponentRoot,
		Action::SetAttributes,
	];

	/// The integer wire code.
	#[must_use]
	pub fn code(self) -> u8 {
		self as u8
	}

	#[must_use]
	pub fn from_code(code: u64) -> Option<Self> {
		Self::ALL.get(usize::try_from(code).ok()?).copied()
	}

	/// The canonical string tag.
	#[must_use]
	pub fn tag(self) -> &'static str {
		match self {
			Action::MountRoot => "mountRoot",
			Action::CreateElement => "newNode",
			Action::DeleteNode => "delNode",
			Action::SetAttribute => "setAttr",
			Action::DeleteAttribute => "delAttr",
			Action::SetText => "setText",
			Action::AppendChild => "appendChild",
			Action::RemoveChild => "removeChild",
			Action::ReplaceChild => "replaceChild",
			Action::CreateText => "createText",
			Action::CreateComponent => "createCompo",
			Action::SetComponentRoot => "setCompoRoot",
			Action::SetAttributes => "setAttrs",
		}
	}

	/// Parses any accepted string tag, including legacy aliases.
	#[must_use]
	pub fn from_tag(tag: &str) -> Option<Self> {
		Some(match tag {
			"mountRoot" | "setRoot" => Action::MountRoot,
			"newNode" | "createElem" => Action::CreateElement,
			"delNode" | "deleteNode" => Action::DeleteNode,
			"setAttr" => Action::SetAttribute,
			"delAttr" => Action::DeleteAttribute,
			"setText" => Action::SetText,
			"appendChild" => Action::AppendChild,
			"removeChild" => Action::RemoveChild,
			"replaceChild" => Action::ReplaceChild,
			"createText" => Action::CreateText,
			"createCompo" => Action::CreateComponent,
			"setCompoRoot" => Action::SetComponentRoot,
			"setAttrs" => Action::SetAttributes,
			_ => return None,
		})
	}
}

impl fmt::Display for Action {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.tag())
	}
}

/// One incremental mutation instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "Action")]
pub enum Change {
	/// Marks `node_id` as the document root and displays its resolved content.
	#[serde(rename = "mountRoot", rename_all = "PascalCase")]
	MountRoot {
		#[serde(rename = "NodeID")]
		node_id: NodeId,
	},
	/// Creates a concrete element, in `namespace` if given.
	#[serde(rename = "newNode", rename_all = "PascalCase")]
	CreateElement {
		#[serde(rename = "NodeID")]
		node_id: NodeId,
		#[serde(rename = "Type")]
		tag: String,
		#[serde(skip_serializing_if = "Option::is_none")]
		namespace: Option<String>,
		#[serde(rename = "CompoID", skip_serializing_if = "Option::is_none")]
		owner: Option<NodeId>,
	},
	/// Creates an empty text node.
	#[serde(rename = "createText", rename_all = "PascalCase")]
	CreateText {
		#[serde(rename = "NodeID")]
		node_id: NodeId,
		#[serde(rename = "CompoID", skip_serializing_if = "Option::is_none")]
		owner: Option<NodeId>,
	},
	/// Creates an unbound component placeholder.
	#[serde(rename = "createCompo", rename_all = "PascalCase")]
	CreateComponent {
		#[serde(rename = "NodeID")]
		node_id: NodeId,
		component_type: String,
		#[serde(rename = "CompoID", skip_serializing_if = "Option::is_none")]
		owner: Option<NodeId>,
	},
	/// Binds or rebinds a placeholder's content.
	#[serde(rename = "setCompoRoot", rename_all = "PascalCase")]
	SetComponentRoot {
		#[serde(rename = "NodeID")]
		node_id: NodeId,
		#[serde(rename = "RootID")]
		root_id: NodeId,
	},
	/// Removes a node record. Children are deleted by their own changes.
	#[serde(rename = "delNode", rename_all = "PascalCase")]
	DeleteNode {
		#[serde(rename = "NodeID")]
		node_id: NodeId,
	},
	/// Sets a single attribute, leaving all others in place.
	#[serde(rename = "setAttr", rename_all = "PascalCase")]
	SetAttribute {
		#[serde(rename = "NodeID")]
		node_id: NodeId,
		key: String,
		value: String,
	},
	/// Replaces the complete attribute set, except for the identity attribute.
	#[serde(rename = "setAttrs", rename_all = "PascalCase")]
	SetAttributes {
		#[serde(rename = "NodeID")]
		node_id: NodeId,
		#[serde(rename = "Attrs")]
		attributes: HashMap<String, String>,
	},
	#[serde(rename = "delAttr", rename_all = "PascalCase")]
	DeleteAttribute {
		#[serde(rename = "NodeID")]
		node_id: NodeId,
		key: String,
	},
	#[serde(rename = "setText", rename_all = "PascalCase")]
	SetText {
		#[serde(rename = "NodeID")]
		node_id: NodeId,
		value: String,
	},
	/// Appends the resolved child, or binds a placeholder parent's content.
	#[serde(rename = "appendChild", rename_all = "PascalCase")]
	AppendChild {
		#[serde(rename = "ParentID")]
		parent_id: NodeId,
		#[serde(rename = "ChildID")]
		child_id: NodeId,
	},
	#[serde(rename = "removeChild", rename_all = "PascalCase")]
	RemoveChild {
		#[serde(rename = "ParentID")]
		parent_id: NodeId,
		#[serde(rename = "ChildID")]
		child_id: NodeId,
	},
	/// Swaps the resolved `old_id` for the resolved `new_child_id`, or rebinds a placeholder parent.
	#[serde(rename = "replaceChild", rename_all = "PascalCase")]
	ReplaceChild {
		#[serde(rename = "ParentID")]
		parent_id: NodeId,
		#[serde(rename = "ChildID")]
		old_id: NodeId,
		#[serde(rename = "NewChildID")]
		new_child_id: NodeId,
	},
}

impl Change {
	#[must_use]
	pub fn action(&self) -> Action {
		match self {
			Change::MountRoot { .. } => Action::MountRoot,
			Change::CreateElement { .. } => Action::CreateElement,
			Change::CreateText { .. } => Action::CreateText,
			Change::CreateComponent { .. } => Action::CreateComponent,
			Change::SetComponentRoot { .. } => Action::SetComponentRoot,
			Change::DeleteNode { .. } => Action::DeleteNode,
			Change::SetAttribute { .. } => Action::SetAttribute,
			Change::SetAttributes { .. } => Action::SetAttributes,
			Change::DeleteAttribute { .. } => Action::DeleteAttribute,
			Change::SetText { .. } => Action::SetText,
			Change::AppendChild { .. } => Action::AppendChild,
			Change::RemoveChild { .. } => Action::RemoveChild,
			Change::ReplaceChild { .. } => Action::ReplaceChild,
		}
	}

	/// The node the change is primarily about: the created/mutated node, or the parent of structural changes.
	#[must_use]
	pub fn node_id(&self) -> &NodeId {
		match self {
			Change::MountRoot { node_id }
			| Change::CreateElement { node_id, .. }
			| Change::CreateText { node_id, .. }
			| Change::CreateComponent { node_id, .. }
			| Change::SetComponentRoot { node_id, .. }
			| Change::DeleteNode { node_id }
			| Change::SetAttribute { node_id, .. }
			| Change::SetAttributes { node_id, .. }
			| Change::DeleteAttribute { node_id, .. }
			| Change::SetText { node_id, .. } => node_id,
			Change::AppendChild { parent_id, .. } | Change::RemoveChild { parent_id, .. } | Change::ReplaceChild { parent_id, .. } => parent_id,
		}
	}
}

/// A decoded but not yet validated `Action` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireAction {
	Known(Action),
	Unknown(String),
}

impl<'de> Deserialize<'de> for WireAction {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		struct Visitor;
		impl<'de> de::Visitor<'de> for Visitor {
			type Value = WireAction;

			fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
				formatter.write_str("a change action tag or code")
			}

			fn visit_u64<E: de::Error>(self, code: u64) -> Result<WireAction, E> {
				Ok(Action::from_code(code).map_or_else(|| WireAction::Unknown(code.to_string()), WireAction::Known))
			}

			fn visit_i64<E: de::Error>(self, code: i64) -> Result<WireAction, E> {
				match u64::try_from(code) {
					Ok(code) => self.visit_u64(code),
					Err(_) => Ok(WireAction::Unknown(code.to_string())),
				}
			}

			fn visit_str<E: de::Error>(self, tag: &str) -> Result<WireAction, E> {
				Ok(Action::from_tag(tag).map_or_else(|| WireAction::Unknown(tag.to_owned()), WireAction::Known))
			}
		}
		deserializer.deserialize_any(Visitor)
	}
}

/// One change record as it appears on the wire, with every field optional.
///
/// Unknown fields are ignored, so producers may attach extra diagnostics.
#[derive(Debug, Clone, Deserialize)]
#[allow(non_snake_case)]
pub struct WireChange {
	pub Action: WireAction,
	#[serde(default)]
	pub NodeID: Option<NodeId>,
	#[serde(default)]
	pub ParentID: Option<NodeId>,
	#[serde(default)]
	pub ChildID: Option<NodeId>,
	#[serde(default)]
	pub NewChildID: Option<NodeId>,
	#[serde(default)]
	pub OldID: Option<NodeId>,
	#[serde(default)]
	pub RootID: Option<NodeId>,
	#[serde(default)]
	pub CompoID: Option<NodeId>,
	#[serde(default, alias = "Tag", alias = "TagName")]
	pub Type: Option<String>,
	#[serde(default, alias = "Name")]
	pub ComponentType: Option<String>,
	#[serde(default)]
	pub Namespace: Option<String>,
	#[serde(default)]
	pub Key: Option<String>,
	#[serde(default, alias = "Text")]
	pub Value: Option<String>,
	#[serde(default)]
	pub Attrs: Option<HashMap<String, String>>,
	#[serde(default)]
	pub IsCompo: bool,
}

impl WireChange {
	/// The best node id to report for this record, even if it is malformed.
	#[must_use]
	pub fn reported_id(&self) -> Option<&NodeId> {
		self.ParentID.as_ref().or(self.NodeID.as_ref())
	}

	/// The action tag, if it is known.
	#[must_use]
	pub fn action(&self) -> Option<Action> {
		match self.Action {
			WireAction::Known(action) => Some(action),
			WireAction::Unknown(_) => None,
		}
	}
}

impl TryFrom<WireChange> for Change {
	type Error = ChangeError;

	fn try_from(wire: WireChange) -> Result<Self, ChangeError> {
		let action = match wire.Action {
			WireAction::Known(action) => action,
			WireAction::Unknown(tag) => return Err(ChangeError::UnsupportedChange(tag)),
		};
		let missing = |field| ChangeError::MalformedChange { action, field };

		Ok(match action {
			Action::MountRoot => Change::MountRoot {
				node_id: wire.NodeID.ok_or_else(|| missing("NodeID"))?,
			},
			Action::CreateElement => {
				let node_id = wire.NodeID.ok_or_else(|| missing("NodeID"))?;
				if wire.IsCompo {
					Change::CreateComponent {
						node_id,
						component_type: wire.ComponentType.or(wire.Type).ok_or_else(|| missing("Type"))?,
						owner: wire.CompoID,
					}
				} else {
					match wire.Type {
						Some(tag) if tag == "text" => Change::CreateText { node_id, owner: wire.CompoID },
						Some(tag) => Change::CreateElement {
							node_id,
							tag,
							namespace: wire.Namespace.filter(|namespace| !namespace.is_empty()),
							owner: wire.CompoID,
						},
						None => return Err(missing("Type")),
					}
				}
			}
			Action::CreateText => Change::CreateText {
				node_id: wire.NodeID.ok_or_else(|| missing("NodeID"))?,
				owner: wire.CompoID,
			},
			Action::CreateComponent => Change::CreateComponent {
				node_id: wire.NodeID.ok_or_else(|| missing("NodeID"))?,
				component_type: wire.ComponentType.or(wire.Type).ok_or_else(|| missing("ComponentType"))?,
				owner: wire.CompoID,
			},
			Action::SetComponentRoot => Change::SetComponentRoot {
				node_id: wire.NodeID.ok_or_else(|| missing("NodeID"))?,
				root_id: wire.RootID.ok_or_else(|| missing("RootID"))?,
			},
			Action::DeleteNode => Change::DeleteNode {
				node_id: wire.NodeID.ok_or_else(|| missing("NodeID"))?,
			},
			Action::SetAttribute => Change::SetAttribute {
				node_id: wire.NodeID.ok_or_else(|| missing("NodeID"))?,
				key: wire.Key.ok_or_else(|| missing("Key"))?,
				value: wire.Value.unwrap_or_default(),
			},
			Action::SetAttributes => Change::SetAttributes {
				node_id: wire.NodeID.ok_or_else(|| missing("NodeID"))?,
				attributes: wire.Attrs.unwrap_or_default(),
			},
			Action::DeleteAttribute => Change::DeleteAttribute {
				node_id: wire.NodeID.ok_or_else(|| missing("NodeID"))?,
				key: wire.Key.ok_or_else(|| missing("Key"))?,
			},
			Action::SetText => Change::SetText {
				node_id: wire.NodeID.ok_or_else(|| missing("NodeID"))?,
				value: wire.Value.unwrap_or_default(),
			},
			Action::AppendChild => Change::AppendChild {
				parent_id: wire.ParentID.or(wire.NodeID).ok_or_else(|| missing("ParentID"))?,
				child_id: wire.ChildID.ok_or_else(|| missing("ChildID"))?,
			},
			Action::RemoveChild => Change::RemoveChild {
				parent_id: wire.ParentID.or(wire.NodeID).ok_or_else(|| missing("ParentID"))?,
				child_id: wire.ChildID.ok_or_else(|| missing("ChildID"))?,
			},
			Action::ReplaceChild => {
				let parent_id = wire.ParentID.or(wire.NodeID).ok_or_else(|| missing("ParentID"))?;
				let (old_id, new_child_id) = match (wire.OldID, wire.ChildID, wire.NewChildID) {
					(_, Some(old_id), Some(new_child_id)) => (old_id, new_child_id),
					(Some(old_id), Some(new_child_id), None) => (old_id, new_child_id),
					(_, None, _) => return Err(missing("ChildID")),
					(None, Some(_), None) => return Err(missing("NewChildID")),
				};
				Change::ReplaceChild { parent_id, old_id, new_child_id }
			}
		})
	}
}

/// Decodes a single JSON change record.
///
/// # Errors
///
/// [`ChangeError::Decode`] if the record isn't an object with an `Action`,
/// [`ChangeError::UnsupportedChange`] or [`ChangeError::MalformedChange`] otherwise.
pub fn decode(record: &serde_json::Value) -> Result<Change, ChangeError> {
	WireChange::deserialize(record).map_err(|error| ChangeError::Decode(error.to_string()))?.try_into()
}

/// Decodes a complete JSON change batch, failing on the first bad record.
///
/// [`Document::apply_json`](`crate::document::Document::apply_json`) instead decodes lazily
/// so that records before a bad one are still applied.
///
/// # Errors
///
/// The index and cause of the first record that could not be decoded.
pub fn decode_batch(json: &str) -> Result<Vec<Change>, (usize, ChangeError)> {
	let records: Vec<serde_json::Value> = serde_json::from_str(json).map_err(|error| (0, ChangeError::Decode(error.to_string())))?;
	records.iter().enumerate().map(|(index, record)| decode(record).map_err(|error| (index, error))).collect()
}
