//! The event bridge: turns native UI events into [`RemoteCall`]s for the application runtime.
//!
//! Normalization works on the abstract [`NativeEvent`] and [`DataTransfer`] traits,
//! so it's host independent. [`crate::web`] implements them for `web-sys` events.

use crate::{
	error::CallError,
	node::NodeId,
	remote::{RemoteCall, RemoteCalls},
};
use core::{cell::Cell, future::Future};
use serde::Serialize;
use serde_json::{Map, Value};
use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, instrument, trace, warn};

/// Sent as `FileOverride` with drop-target payloads.
pub const FILE_OVERRIDE_MARKER: &str = "xxx";
/// The [`RemoteCall::override_marker`] of drop-target calls, telling the remote side to substitute the file list.
pub const FILES_OVERRIDE: &str = "Files";
/// The transfer format drag payloads travel in.
pub const DRAG_FORMAT: &str = "text";
/// The dataset key a drag source's payload is read from (`data-drag`).
pub const DRAG_DATASET_KEY: &str = "drag";

/// The value of one enumerable property of a native object, as far as it matters for flattening.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
	String(String),
	Number(f64),
	Boolean(bool),
	/// Objects, arrays and `null`.
	Object,
	Function,
	Undefined,
}

impl PropertyValue {
	/// The JSON representation of primitive values.
	///
	/// Integral numbers become JSON integers, non-finite ones `null`.
	#[must_use]
	pub fn to_json(&self) -> Option<Value> {
		match self {
			PropertyValue::String(string) => Some(Value::String(string.clone())),
			PropertyValue::Number(number) => Some(number_to_json(*number)),
			PropertyValue::Boolean(boolean) => Some(Value::Bool(*boolean)),
			PropertyValue::Object | PropertyValue::Function | PropertyValue::Undefined => None,
		}
	}

	fn as_number(&self) -> Option<f64> {
		match self {
			PropertyValue::Number(number) => Some(*number),
			_ => None,
		}
	}
}

#[allow(clippy::cast_possible_truncation)]
fn number_to_json(number: f64) -> Value {
	if number.is_finite() && number.fract() == 0.0 && number.abs() < 9_007_199_254_740_992.0 {
		Value::from(number as i64)
	} else {
		serde_json::Number::from_f64(number).map_or(Value::Null, Value::Number)
	}
}

/// A native UI event as seen by the bridge.
pub trait NativeEvent {
	fn event_type(&self) -> String;

	/// Every enumerable property, including inherited ones, in enumeration order.
	fn properties(&self) -> Vec<(String, PropertyValue)>;

	/// The drag data store, for drag and drop events.
	fn data_transfer(&self) -> Option<Box<dyn DataTransfer + '_>>;

	fn prevent_default(&self);
}

pub trait DataTransfer {
	/// Every enumerable property, including inherited ones, in enumeration order.
	fn properties(&self) -> Vec<(String, PropertyValue)>;

	/// The data stored for `format`, or an empty string.
	fn get_data(&self, format: &str) -> String;

	fn set_data(&self, format: &str, data: &str);
}

/// What the bridge knows about the element an event was raised on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventSource {
	pub node_id: Option<NodeId>,
	/// The owning component.
	pub compo_id: Option<NodeId>,
	/// The DOM `id` attribute.
	pub id: String,
	pub class: String,
	pub dataset: BTreeMap<String, String>,
	/// The current value of form controls.
	pub value: Option<String>,
	pub content_editable: bool,
	pub inner_text: Option<String>,
}

#[derive(Serialize)]
struct SourceWire<'a> {
	#[serde(rename = "NodeID", skip_serializing_if = "Option::is_none")]
	node_id: Option<&'a NodeId>,
	#[serde(rename = "CompoID", skip_serializing_if = "Option::is_none")]
	compo_id: Option<&'a NodeId>,
	#[serde(rename = "ID")]
	id: &'a str,
	#[serde(rename = "Class")]
	class: &'a str,
	#[serde(rename = "Data")]
	data: &'a BTreeMap<String, String>,
	#[serde(rename = "Value", skip_serializing_if = "Option::is_none")]
	value: Option<&'a str>,
}

impl EventSource {
	/// The `Source` object attached to flattened payloads.
	#[must_use]
	pub fn to_json(&self) -> Value {
		let wire = SourceWire {
			node_id: self.node_id.as_ref(),
			compo_id: self.compo_id.as_ref(),
			id: &self.id,
			class: &self.class,
			data: &self.dataset,
			value: self.value.as_deref(),
		};
		// Strings and string maps only.
		serde_json::to_value(wire).unwrap_or(Value::Null)
	}
}

/// How an event is normalized, by event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
	/// `change`
	Change,
	/// `drag`, `dragstart`, `dragend`, `dragexit`
	DragSource,
	/// `dragenter`, `dragleave`, `dragover`, `drop`
	DropTarget,
	/// `contextmenu`
	ContextMenu,
	Generic,
}

impl Category {
	#[must_use]
	pub fn of(event_type: &str) -> Self {
		match event_type {
			"change" => Category::Change,
			"drag" | "dragstart" | "dragend" | "dragexit" => Category::DragSource,
			"dragenter" | "dragleave" | "dragover" | "drop" => Category::DropTarget,
			"contextmenu" => Category::ContextMenu,
			_ => Category::Generic,
		}
	}

	/// Whether events of this category update the tracked [`Pointer`].
	#[must_use]
	pub fn tracks_pointer(self) -> bool {
		matches!(self, Category::ContextMenu | Category::Generic)
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
	pub category: Category,
	/// The value to serialize into [`RemoteCall::json_value`].
	pub payload: Value,
	pub override_marker: Option<&'static str>,
	/// Whether [`NativeEvent::prevent_default`] was called.
	pub default_prevented: bool,
	pub client_x: Option<f64>,
	pub client_y: Option<f64>,
}

/// Upper-cases the first character of `name`.
#[must_use]
pub fn capitalize(name: &str) -> String {
	let mut chars = name.chars();
	match chars.next() {
		Some(first) => first.to_uppercase().chain(chars).collect(),
		None => String::new(),
	}
}

/// Keeps primitive properties, capitalizing their names.
fn flatten(properties: Vec<(String, PropertyValue)>) -> Map<String, Value> {
	properties
		.into_iter()
		.filter_map(|(name, value)| value.to_json().map(|value| (capitalize(&name), value)))
		.collect()
}

/// Builds the payload for `event`, raised on `source`.
///
/// Drag sources get their transfer seeded with the source's drag data,
/// and drop targets as well as context menus have their default action suppressed.
pub fn normalize(event: &dyn NativeEvent, source: &EventSource) -> Normalized {
	let event_type = event.event_type();
	let category = Category::of(&event_type);
	let mut normalized = Normalized {
		category,
		payload: Value::Null,
		override_marker: None,
		default_prevented: false,
		client_x: None,
		client_y: None,
	};

	match category {
		Category::Change => {
			normalized.payload = source.value.clone().map_or(Value::Null, Value::String);
		}

		Category::DragSource => {
			let drag_data = source.dataset.get(DRAG_DATASET_KEY);
			let mut payload = Map::new();
			if let Some(transfer) = event.data_transfer() {
				payload = flatten(transfer.properties());
				transfer.set_data(DRAG_FORMAT, drag_data.map_or("", String::as_str));
			} else {
				debug!(event_type = %event_type, "Drag event without data transfer.");
			}
			payload.insert("Data".to_owned(), drag_data.cloned().map_or(Value::Null, Value::String));
			payload.insert("Source".to_owned(), source.to_json());
			normalized.payload = Value::Object(payload);
		}

		Category::DropTarget => {
			event.prevent_default();
			normalized.default_prevented = true;

			let mut payload = Map::new();
			let mut data = String::new();
			if let Some(transfer) = event.data_transfer() {
				payload = flatten(transfer.properties());
				data = transfer.get_data(DRAG_FORMAT);
			} else {
				debug!(event_type = %event_type, "Drop event without data transfer.");
			}
			payload.insert("Data".to_owned(), Value::String(data));
			payload.insert("FileOverride".to_owned(), Value::String(FILE_OVERRIDE_MARKER.to_owned()));
			payload.insert("Source".to_owned(), source.to_json());
			normalized.payload = Value::Object(payload);
			normalized.override_marker = Some(FILES_OVERRIDE);
		}

		Category::ContextMenu | Category::Generic => {
			if category == Category::ContextMenu {
				event.prevent_default();
				normalized.default_prevented = true;
			}

			let properties = event.properties();
			for (name, value) in &properties {
				match name.as_str() {
					"clientX" => normalized.client_x = value.as_number(),
					"clientY" => normalized.client_y = value.as_number(),
					_ => (),
				}
			}

			let mut payload = flatten(properties);
			payload.insert("Source".to_owned(), source.to_json());
			if source.content_editable {
				payload.insert("InnerText".to_owned(), source.inner_text.clone().map_or(Value::Null, Value::String));
			}
			normalized.payload = Value::Object(payload);
		}
	}

	normalized
}

/// Last known pointer position, in client coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pointer {
	pub x: f64,
	pub y: f64,
}

/// Normalizes events and hands them to a [`RemoteCalls`] channel.
///
/// Lives on the UI thread. The channel itself may be shared.
#[derive(Debug)]
pub struct EventBridge {
	remote: Arc<RemoteCalls>,
	pointer: Cell<Pointer>,
}

impl EventBridge {
	#[must_use]
	pub fn new(remote: Arc<RemoteCalls>) -> Self {
		Self {
			remote,
			pointer: Cell::default(),
		}
	}

	#[must_use]
	pub fn remote(&self) -> &Arc<RemoteCalls> {
		&self.remote
	}

	/// Where the pointer was during the last generic or context menu event that carried coordinates.
	///
	/// Hosts use this to position context menus.
	#[must_use]
	pub fn pointer(&self) -> Pointer {
		self.pointer.get()
	}

	/// Normalizes `event` into the call for `field_or_method` on the source's owning component.
	///
	/// # Errors
	///
	/// Iff the payload can't be serialized.
	#[instrument(skip(self, event, source), fields(node_id = ?source.node_id))]
	pub fn prepare(&self, event: &dyn NativeEvent, source: &EventSource, field_or_method: &str) -> Result<RemoteCall, CallError> {
		let normalized = normalize(event, source);
		if normalized.category.tracks_pointer() {
			let mut pointer = self.pointer.get();
			if let Some(x) = normalized.client_x {
				pointer.x = x;
			}
			if let Some(y) = normalized.client_y {
				pointer.y = y;
			}
			self.pointer.set(pointer);
		}

		if source.compo_id.is_none() {
			warn!(field_or_method, "Event source has no owning component.");
		}
		let json_value = serde_json::to_string(&normalized.payload).map_err(|error| CallError::Encode(error.to_string()))?;
		if cfg!(feature = "dangerous-logging") {
			trace!(category = ?normalized.category, json_value = %json_value, "Normalized event.");
		} else {
			trace!(category = ?normalized.category, "Normalized event.");
		}
		Ok(RemoteCall {
			compo_id: source.compo_id.clone(),
			field_or_method: field_or_method.to_owned(),
			json_value,
			override_marker: normalized.override_marker.map(ToOwned::to_owned),
		})
	}

	/// Sends `event` without awaiting a response.
	///
	/// # Errors
	///
	/// Iff the call can't be encoded or the connected transport fails.
	pub fn dispatch(&self, event: &dyn NativeEvent, source: &EventSource, field_or_method: &str) -> Result<(), CallError> {
		let call = self.prepare(event, source, field_or_method)?;
		self.remote.notify(&call)
	}

	/// Sends `event` and returns the remote side's response.
	///
	/// Normalization, including default suppression, happens before this returns.
	pub fn call(&self, event: &dyn NativeEvent, source: &EventSource, field_or_method: &str) -> impl Future<Output = Result<Option<Value>, CallError>> + Send + 'static {
		let call = self.prepare(event, source, field_or_method);
		let response = call.map(|call| self.remote.call(&call));
		async move { response?.await }
	}
}
