#![cfg(target_arch = "wasm32")]

use mirror_dom::{
	config::DEFAULT_IDENTITY_ATTRIBUTE,
	remote::RemoteCall,
	web::{WebEvent, WebSurface},
	Config, Document, EventBridge, RemoteCalls, TransportError,
};
use std::{
	cell::RefCell,
	rc::Rc,
	sync::{Arc, Mutex, Once},
};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::{window, HtmlElement, HtmlInputElement};

wasm_bindgen_test_configure!(run_in_browser);

static LOG_INIT: Once = Once::new();

fn init() {
	LOG_INIT.call_once(tracing_wasm::set_as_global_default);
}

fn document() -> web_sys::Document {
	window().unwrap().document().unwrap()
}

fn element<T: JsCast>(id: &str) -> T {
	document().get_element_by_id(id).unwrap().dyn_into().unwrap()
}

fn web_document() -> (Document<WebSurface>, Rc<RefCell<Vec<WebEvent>>>) {
	let body = document().body().unwrap();
	let events = Rc::new(RefCell::new(Vec::new()));
	let sink = {
		let events = Rc::clone(&events);
		move |event| events.borrow_mut().push(event)
	};
	let surface = WebSurface::new(body.into(), &Config::default(), sink).unwrap();
	(Document::new(surface), events)
}

const PAGE: &str = r#"[
	{"Action": "createCompo", "NodeID": "app", "ComponentType": "App"},
	{"Action": "mountRoot", "NodeID": "app"},
	{"Action": "newNode", "NodeID": "root", "Type": "div", "CompoID": "app"},
	{"Action": "newNode", "NodeID": "button", "Type": "button", "CompoID": "app"},
	{"Action": "setAttr", "NodeID": "button", "Key": "id", "Value": "test-button"},
	{"Action": "setAttr", "NodeID": "button", "Key": "onclick", "Value": "OnClick"},
	{"Action": "newNode", "NodeID": "input", "Type": "input", "CompoID": "app"},
	{"Action": "setAttr", "NodeID": "input", "Key": "id", "Value": "test-input"},
	{"Action": "setAttr", "NodeID": "input", "Key": "value", "Value": "hi"},
	{"Action": "appendChild", "ParentID": "root", "ChildID": "button"},
	{"Action": "appendChild", "ParentID": "root", "ChildID": "input"},
	{"Action": "appendChild", "ParentID": "app", "ChildID": "root"}
]"#;

#[wasm_bindgen_test]
fn renders_into_the_mount_point() {
	init();
	let (mut document, _) = web_document();
	document.apply_json(PAGE).unwrap();

	let button: HtmlElement = element("test-button");
	assert_eq!(button.get_attribute(DEFAULT_IDENTITY_ATTRIBUTE).as_deref(), Some("button"));
	assert_eq!(button.get_attribute("onclick"), None);

	let input: HtmlInputElement = element("test-input");
	assert_eq!(input.value(), "hi");
	assert_eq!(input.get_attribute("value"), None);

	let body = self::document().body().unwrap();
	assert_eq!(body.child_element_count(), 1);
	assert_eq!(body.first_element_child().unwrap().get_attribute(DEFAULT_IDENTITY_ATTRIBUTE).as_deref(), Some("root"));
}

#[wasm_bindgen_test]
fn click_reaches_the_runtime() {
	init();
	let (mut document, events) = web_document();
	document.apply_json(PAGE).unwrap();
	assert_eq!(document.surface().listener_count(), 1);

	let button: HtmlElement = element("test-button");
	button.click();
	assert_eq!(events.borrow().len(), 1);

	let remote = Arc::new(RemoteCalls::new());
	let sent = Arc::new(Mutex::new(Vec::new()));
	let sink = Arc::clone(&sent);
	remote.connect(Arc::new(move |message: String| -> Result<(), TransportError> {
		sink.lock().unwrap().push(message);
		Ok(())
	}));
	let bridge = EventBridge::new(remote);

	let event = events.borrow()[0].clone();
	assert_eq!(event.handler, "OnClick");
	event
		.dispatch(&bridge, DEFAULT_IDENTITY_ATTRIBUTE, document.owner_of("button").cloned())
		.unwrap();

	let call: RemoteCall = serde_json::from_str(&sent.lock().unwrap()[0]).unwrap();
	assert_eq!(call.compo_id.as_deref(), Some("app"));
	assert_eq!(call.field_or_method, "OnClick");
	let payload: serde_json::Value = serde_json::from_str(&call.json_value).unwrap();
	assert_eq!(payload["Type"], serde_json::json!("click"));
	assert_eq!(payload["Source"]["NodeID"], serde_json::json!("button"));
	assert_eq!(payload["Source"]["ID"], serde_json::json!("test-button"));

	document
		.apply_json(r#"[{"Action": "delAttr", "NodeID": "button", "Key": "onclick"}]"#)
		.unwrap();
	assert_eq!(document.surface().listener_count(), 0);
	button.click();
	assert_eq!(events.borrow().len(), 1);
}

#[wasm_bindgen_test]
fn rebinding_the_root_remounts() {
	init();
	let (mut document, _) = web_document();
	document.apply_json(PAGE).unwrap();
	document
		.apply_json(
			r#"[
				{"Action": "newNode", "NodeID": "other", "Type": "p", "CompoID": "app"},
				{"Action": "setAttr", "NodeID": "other", "Key": "id", "Value": "test-other"},
				{"Action": "replaceChild", "ParentID": "app", "ChildID": "root", "NewChildID": "other"}
			]"#,
		)
		.unwrap();

	assert_eq!(document.mounted().map(|id| id.as_str()), Some("other"));
	let other: JsValue = element::<HtmlElement>("test-other").into();
	let body = self::document().body().unwrap();
	assert_eq!(body.child_element_count(), 1);
	assert_eq!(JsValue::from(body.first_element_child().unwrap()), other);
	assert!(self::document().get_element_by_id("test-button").is_none());
}

#[wasm_bindgen_test]
fn recreated_nodes_get_fresh_listeners() {
	init();
	let (mut document, events) = web_document();
	let bound = r#"[
		{"Action": "newNode", "NodeID": "tap", "Type": "button"},
		{"Action": "setAttr", "NodeID": "tap", "Key": "id", "Value": "test-tap"},
		{"Action": "setAttr", "NodeID": "tap", "Key": "onclick", "Value": "Tap"},
		{"Action": "mountRoot", "NodeID": "tap"}
	]"#;
	document.apply_json(bound).unwrap();
	let first: HtmlElement = element("test-tap");

	document.apply_json(r#"[{"Action": "delNode", "NodeID": "tap"}]"#).unwrap();
	assert_eq!(document.surface().binding_count(), 0);
	assert_eq!(document.surface().listener_count(), 0);
	first.click();
	assert_eq!(events.borrow().len(), 0);

	document.apply_json(bound).unwrap();
	assert_eq!(document.surface().binding_count(), 1);
	assert_eq!(document.surface().listener_count(), 1);

	let second: HtmlElement = element("test-tap");
	assert_ne!(JsValue::from(first.clone()), JsValue::from(second.clone()));
	second.click();
	assert_eq!(events.borrow().len(), 1);
	assert_eq!(events.borrow()[0].handler, "Tap");
	first.click();
	assert_eq!(events.borrow().len(), 1);
}

#[wasm_bindgen_test]
fn reset_documents_release_listeners_on_reuse() {
	init();
	let (mut document, events) = web_document();
	let bound = r#"[
		{"Action": "newNode", "NodeID": "tap", "Type": "button"},
		{"Action": "setAttr", "NodeID": "tap", "Key": "id", "Value": "test-reset"},
		{"Action": "setAttr", "NodeID": "tap", "Key": "onclick", "Value": "Tap"},
		{"Action": "mountRoot", "NodeID": "tap"}
	]"#;
	document.apply_json(bound).unwrap();
	document.reset();
	document.apply_json(bound).unwrap();
	assert_eq!(document.surface().binding_count(), 1);

	element::<HtmlElement>("test-reset").click();
	assert_eq!(events.borrow().len(), 1);
}
