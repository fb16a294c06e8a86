//! The browser host: a [`DisplaySurface`] over `web-sys`, and the bridge's native event traits for DOM events.
//!
//! # Event handlers
//!
//! Attributes named `on…` don't end up in the DOM. Their value names the field or method of the owning component
//! to call, and the surface instead installs an event listener that forwards to the event sink as [`WebEvent`].
//! Listener functions are shared per handler name, so there is only one JavaScript closure per surface.

use crate::{
	config::Config,
	error::{CallError, SurfaceError},
	event::{DataTransfer, EventBridge, EventSource, NativeEvent, PropertyValue},
	node::NodeId,
	rc_hash_map::RcHashMap,
	surface::DisplaySurface,
};
use core::fmt;
use hashbrown::{HashMap, HashSet};
use js_sys::{Function, Object, Reflect};
use std::{borrow::Cow, collections::BTreeMap};
use tracing::{debug, error, instrument, trace, trace_span, warn};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};

impl From<JsValue> for SurfaceError {
	fn from(value: JsValue) -> Self {
		Self(
			value
				.as_string()
				.or_else(|| value.dyn_ref::<js_sys::Error>().map(|error| String::from(error.message())))
				.unwrap_or_else(|| format!("{:?}", value)),
		)
	}
}

/// A fired DOM event bound through an `on…` attribute.
#[derive(Debug, Clone)]
pub struct WebEvent {
	pub event: web_sys::Event,
	/// The element the listener was installed on.
	pub element: web_sys::Element,
	/// The attribute value, i.e. the field or method to call.
	pub handler: String,
}

impl WebEvent {
	/// Normalizes this event and sends it through `bridge` without awaiting a response.
	///
	/// `owner` is the owning component, usually from [`Document::owner_of`](`crate::document::Document::owner_of`).
	///
	/// # Errors
	///
	/// See [`EventBridge::dispatch`].
	pub fn dispatch(&self, bridge: &EventBridge, identity_attribute: &str, owner: Option<NodeId>) -> Result<(), CallError> {
		let source = EventSource::from_element(&self.element, identity_attribute, owner);
		bridge.dispatch(&WebNativeEvent(self.event.clone()), &source, &self.handler)
	}
}

/// A [`DisplaySurface`] that renders into the child nodes of a mount point element.
///
/// # Correct Use
///
/// Event listeners throw into JavaScript once the surface is dropped, so it should live as long as the page displays its content.
pub struct WebSurface {
	document: web_sys::Document,
	mount_point: web_sys::Element,
	identity_attribute: Cow<'static, str>,
	common_handler: Closure<dyn Fn(JsValue, web_sys::Event)>,
	/// Listener functions by handler name.
	listeners: RcHashMap<String, u16, Function>,
	/// Installed listeners by (node id, event type).
	bindings: HashMap<(String, String), Binding>,
}

struct Binding {
	handler: String,
	element: web_sys::Element,
}

impl fmt::Debug for WebSurface {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("WebSurface")
			.field("mount_point", &self.mount_point)
			.field("identity_attribute", &self.identity_attribute)
			.field("listeners", &self.listeners)
			.field("bindings", &self.bindings.len())
			.finish_non_exhaustive()
	}
}

impl WebSurface {
	/// Creates a surface that displays into `mount_point`'s child nodes and forwards bound events to `sink`.
	///
	/// # Errors
	///
	/// Iff `mount_point` has no owner document.
	#[instrument(skip(sink))]
	pub fn new(mount_point: web_sys::Element, config: &Config, sink: impl Fn(WebEvent) + 'static) -> Result<Self, SurfaceError> {
		let document = mount_point.owner_document().ok_or_else(|| SurfaceError::new("mount point has no owner document"))?;
		let common_handler: Closure<dyn Fn(JsValue, web_sys::Event)> = Closure::wrap(Box::new(move |handler: JsValue, event: web_sys::Event| {
			let span = trace_span!("common_handler", handler = ?&handler, event_type = %event.type_());
			let _enter = span.enter();

			let handler = match handler.as_string() {
				Some(handler) => handler,
				None => return error!("Listener bound to a non-string handler."),
			};
			let element = match event.current_target().and_then(|target| target.dyn_into::<web_sys::Element>().ok()) {
				Some(element) => element,
				None => return error!(%handler, "Event has no current target element."),
			};
			sink(WebEvent { event, element, handler });
		}));
		Ok(Self {
			document,
			mount_point,
			identity_attribute: config.identity_attribute.clone(),
			common_handler,
			listeners: RcHashMap::new(),
			bindings: HashMap::new(),
		})
	}

	#[must_use]
	pub fn mount_point(&self) -> &web_sys::Element {
		&self.mount_point
	}

	/// Active listener functions.
	#[must_use]
	pub fn listener_count(&self) -> usize {
		self.listeners.len()
	}

	/// Installed event listeners, across all elements.
	#[must_use]
	pub fn binding_count(&self) -> usize {
		self.bindings.len()
	}

	fn element<'a>(node: &'a web_sys::Node) -> Result<&'a web_sys::Element, SurfaceError> {
		node.dyn_ref::<web_sys::Element>().ok_or_else(|| SurfaceError::new(format!("{:?} is not an element", node)))
	}

	fn binding_key(&self, element: &web_sys::Element, event_type: &str) -> Result<(String, String), SurfaceError> {
		let id = element
			.get_attribute(&self.identity_attribute)
			.ok_or_else(|| SurfaceError::new(format!("element has no {:?} attribute", &*self.identity_attribute)))?;
		Ok((id, event_type.to_owned()))
	}

	#[instrument(skip(self, element))]
	fn bind(&mut self, element: &web_sys::Element, event_type: &str, handler: &str) -> Result<(), SurfaceError> {
		let key = self.binding_key(element, event_type)?;
		let unchanged = self.bindings.get(&key).map_or(false, |binding| binding.handler == handler && binding.element == *element);
		if unchanged {
			return Ok(());
		}
		// Either another handler, or a new element re-created under the same id.
		if let Some(stale) = self.bindings.remove(&key) {
			self.detach(event_type, stale);
		}

		let common_handler = &self.common_handler;
		let listener = self
			.listeners
			.increment_or_insert_with(handler.to_owned(), |handler| {
				common_handler.as_ref().unchecked_ref::<Function>().bind1(&JsValue::UNDEFINED, &JsValue::from_str(handler)).unchecked_into::<Function>()
			})
			.map_err(|error| SurfaceError::new(format!("too many listeners for {:?}: {}", handler, error)))?;
		if let Err(error) = element.add_event_listener_with_callback(event_type, listener) {
			if let Err(count_error) = self.listeners.weak_decrement(handler) {
				error!(%handler, "Listener count out of sync: {}", count_error);
			}
			self.drain_listeners();
			return Err(error.into());
		}
		self.bindings.insert(
			key,
			Binding {
				handler: handler.to_owned(),
				element: element.clone(),
			},
		);
		self.drain_listeners();
		Ok(())
	}

	#[instrument(skip(self, element))]
	fn unbind(&mut self, element: &web_sys::Element, event_type: &str) -> Result<(), SurfaceError> {
		let key = self.binding_key(element, event_type)?;
		if let Some(binding) = self.bindings.remove(&key) {
			self.detach(event_type, binding);
			self.drain_listeners();
		}
		Ok(())
	}

	/// Drops every listener installed for node `id`, on whichever element it was installed.
	fn release_id(&mut self, id: &str) {
		let stale: Vec<_> = self.bindings.extract_if(|(bound_id, _), _| bound_id == id).collect();
		if stale.is_empty() {
			return;
		}
		debug!(id, count = stale.len(), "Releasing event listeners.");
		for ((_, event_type), binding) in stale {
			self.detach(&event_type, binding);
		}
		self.drain_listeners();
	}

	fn detach(&mut self, event_type: &str, binding: Binding) {
		let Binding { handler, element } = binding;
		match self.listeners.weak_decrement(&handler) {
			Ok(Some(listener)) => {
				if let Err(error) = element.remove_event_listener_with_callback(event_type, listener) {
					error!(%handler, "Failed to remove event listener: {:?}", error);
				}
			}
			Ok(None) => error!(%handler, "Missing listener function."),
			Err(error) => error!(%handler, "Listener count out of sync: {}", error),
		}
	}

	fn drain_listeners(&mut self) {
		let freed = self.listeners.drain_weak().count();
		if freed > 0 {
			trace!("Freed {} event listener(s).", freed);
		}
	}
}

/// `onclick` → `click`
fn event_type(key: &str) -> Option<String> {
	key.strip_prefix("on").filter(|event_type| !event_type.is_empty()).map(str::to_ascii_lowercase)
}

impl DisplaySurface for WebSurface {
	type Node = web_sys::Node;

	fn create_element(&mut self, id: &str, tag: &str, namespace: Option<&str>) -> Result<web_sys::Node, SurfaceError> {
		// Left over if the document was reset instead of deleting its nodes.
		self.release_id(id);
		let element = match namespace {
			Some(namespace) => self.document.create_element_ns(Some(namespace), tag)?,
			None => self.document.create_element(tag)?,
		};
		element.set_attribute(&self.identity_attribute, id)?;
		Ok(element.into())
	}

	fn create_text(&mut self, _id: &str) -> Result<web_sys::Node, SurfaceError> {
		Ok(self.document.create_text_node("").into())
	}

	fn set_attribute(&mut self, node: &web_sys::Node, key: &str, value: &str) -> Result<(), SurfaceError> {
		let element = Self::element(node)?;
		if let Some(event_type) = event_type(key) {
			return self.bind(element, &event_type, value);
		}
		if key == "value" {
			// The attribute only sets the initial value.
			Reflect::set(element, &JsValue::from_str("value"), &JsValue::from_str(value))?;
			return Ok(());
		}
		Ok(element.set_attribute(key, value)?)
	}

	fn remove_attribute(&mut self, node: &web_sys::Node, key: &str) -> Result<(), SurfaceError> {
		let element = Self::element(node)?;
		if let Some(event_type) = event_type(key) {
			return self.unbind(element, &event_type);
		}
		if key == "value" {
			Reflect::set(element, &JsValue::from_str("value"), &JsValue::from_str(""))?;
			return Ok(());
		}
		Ok(element.remove_attribute(key)?)
	}

	fn append_child(&mut self, parent: &web_sys::Node, child: &web_sys::Node) -> Result<(), SurfaceError> {
		parent.append_child(child)?;
		Ok(())
	}

	fn remove_child(&mut self, parent: &web_sys::Node, child: &web_sys::Node) -> Result<(), SurfaceError> {
		parent.remove_child(child)?;
		Ok(())
	}

	fn replace_child(&mut self, parent: &web_sys::Node, new_child: &web_sys::Node, old_child: &web_sys::Node) -> Result<(), SurfaceError> {
		parent.replace_child(new_child, old_child)?;
		Ok(())
	}

	fn set_text(&mut self, node: &web_sys::Node, text: &str) -> Result<(), SurfaceError> {
		node.set_node_value(Some(text));
		Ok(())
	}

	#[instrument(skip(self))]
	fn mount(&mut self, root: &web_sys::Node) -> Result<(), SurfaceError> {
		while let Some(child) = self.mount_point.first_child() {
			self.mount_point.remove_child(&child)?;
		}
		self.mount_point.append_child(root)?;
		debug!("Mounted.");
		Ok(())
	}

	fn release(&mut self, id: &str, _node: &web_sys::Node) {
		self.release_id(id);
	}
}

fn property_value(value: &JsValue) -> PropertyValue {
	if let Some(string) = value.as_string() {
		PropertyValue::String(string)
	} else if let Some(number) = value.as_f64() {
		PropertyValue::Number(number)
	} else if let Some(boolean) = value.as_bool() {
		PropertyValue::Boolean(boolean)
	} else if value.is_function() {
		PropertyValue::Function
	} else if value.is_undefined() {
		PropertyValue::Undefined
	} else {
		PropertyValue::Object
	}
}

/// Enumerable properties of `object`, own and inherited, like JavaScript's `for…in`.
///
/// Getters are invoked on `object` itself. Properties whose getter throws are skipped.
fn enumerate(object: &Object) -> Vec<(String, PropertyValue)> {
	let mut seen = HashSet::new();
	let mut properties = Vec::new();
	let mut level: JsValue = object.clone().into();
	while level.is_object() {
		let current: &Object = level.unchecked_ref();
		for key in Object::keys(current).iter() {
			let name = match key.as_string() {
				Some(name) => name,
				None => continue,
			};
			if !seen.insert(name.clone()) {
				continue;
			}
			match Reflect::get(object, &key) {
				Ok(value) => properties.push((name, property_value(&value))),
				Err(error) => trace!(%name, "Property getter threw: {:?}", error),
			}
		}
		level = Object::get_prototype_of(current).into();
	}
	properties
}

/// A DOM [`web_sys::Event`] as [`NativeEvent`].
#[derive(Debug, Clone)]
pub struct WebNativeEvent(pub web_sys::Event);

impl NativeEvent for WebNativeEvent {
	fn event_type(&self) -> String {
		self.0.type_()
	}

	fn properties(&self) -> Vec<(String, PropertyValue)> {
		enumerate(self.0.as_ref())
	}

	fn data_transfer(&self) -> Option<Box<dyn DataTransfer + '_>> {
		let transfer = self.0.dyn_ref::<web_sys::DragEvent>()?.data_transfer()?;
		Some(Box::new(WebDataTransfer(transfer)))
	}

	fn prevent_default(&self) {
		self.0.prevent_default();
	}
}

#[derive(Debug, Clone)]
pub struct WebDataTransfer(pub web_sys::DataTransfer);

impl DataTransfer for WebDataTransfer {
	fn properties(&self) -> Vec<(String, PropertyValue)> {
		enumerate(self.0.as_ref())
	}

	fn get_data(&self, format: &str) -> String {
		self.0.get_data(format).unwrap_or_else(|error| {
			warn!(format, "Failed to read transfer data: {:?}", error);
			String::new()
		})
	}

	fn set_data(&self, format: &str, data: &str) {
		if let Err(error) = self.0.set_data(format, data) {
			warn!(format, "Failed to write transfer data: {:?}", error);
		}
	}
}

impl EventSource {
	/// Reads the source metadata of `element`. `owner` is the owning component, which the DOM doesn't know about.
	#[must_use]
	pub fn from_element(element: &web_sys::Element, identity_attribute: &str, owner: Option<NodeId>) -> Self {
		let html_element = element.dyn_ref::<web_sys::HtmlElement>();

		let mut dataset = BTreeMap::new();
		if let Some(html_element) = html_element {
			let map = html_element.dataset();
			let map: &Object = map.as_ref();
			for key in Object::keys(map).iter() {
				if let (Some(name), Some(value)) = (key.as_string(), Reflect::get(map, &key).ok().and_then(|value| value.as_string())) {
					dataset.insert(name, value);
				}
			}
		}

		let content_editable = html_element.map_or(false, |html_element| html_element.content_editable() == "true");
		Self {
			node_id: element.get_attribute(identity_attribute).map(NodeId::from),
			compo_id: owner,
			id: element.id(),
			class: element.class_name(),
			dataset,
			value: Reflect::get(element, &JsValue::from_str("value")).ok().and_then(|value| value.as_string()),
			content_editable,
			inner_text: html_element.filter(|_| content_editable).map(web_sys::HtmlElement::inner_text),
		}
	}
}
