use futures::executor::block_on;
use mirror_dom::{
	event::{capitalize, normalize, Category, DataTransfer, EventBridge, EventSource, NativeEvent, Pointer, PropertyValue, FILES_OVERRIDE},
	remote::{RemoteCall, RemoteCalls},
	CallError, TransportError,
};
use serde_json::{json, Value};
use std::{
	cell::{Cell, RefCell},
	collections::{BTreeMap, HashMap},
	sync::{Arc, Mutex},
};
use tracing_subscriber::EnvFilter;

fn init() {
	let _ = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).with_test_writer().try_init();
}

#[derive(Default)]
struct FakeTransfer {
	properties: Vec<(String, PropertyValue)>,
	data: RefCell<HashMap<String, String>>,
}

impl DataTransfer for &FakeTransfer {
	fn properties(&self) -> Vec<(String, PropertyValue)> {
		self.properties.clone()
	}

	fn get_data(&self, format: &str) -> String {
		self.data.borrow().get(format).cloned().unwrap_or_default()
	}

	fn set_data(&self, format: &str, data: &str) {
		self.data.borrow_mut().insert(format.to_owned(), data.to_owned());
	}
}

struct FakeEvent {
	event_type: &'static str,
	properties: Vec<(String, PropertyValue)>,
	transfer: Option<FakeTransfer>,
	prevented: Cell<usize>,
}

impl FakeEvent {
	fn new(event_type: &'static str) -> Self {
		Self {
			event_type,
			properties: vec![("type".to_owned(), PropertyValue::String(event_type.to_owned()))],
			transfer: None,
			prevented: Cell::new(0),
		}
	}

	fn with(mut self, name: &str, value: PropertyValue) -> Self {
		self.properties.push((name.to_owned(), value));
		self
	}

	fn with_transfer(mut self, transfer: FakeTransfer) -> Self {
		self.transfer = Some(transfer);
		self
	}
}

impl NativeEvent for FakeEvent {
	fn event_type(&self) -> String {
		self.event_type.to_owned()
	}

	fn properties(&self) -> Vec<(String, PropertyValue)> {
		self.properties.clone()
	}

	fn data_transfer(&self) -> Option<Box<dyn DataTransfer + '_>> {
		self.transfer.as_ref().map(|transfer| Box::new(transfer) as Box<dyn DataTransfer + '_>)
	}

	fn prevent_default(&self) {
		self.prevented.set(self.prevented.get() + 1);
	}
}

fn source() -> EventSource {
	EventSource {
		node_id: Some("input-1".into()),
		compo_id: Some("form".into()),
		id: "name".to_owned(),
		class: "wide".to_owned(),
		dataset: BTreeMap::new(),
		value: Some("42".to_owned()),
		content_editable: false,
		inner_text: None,
	}
}

fn connected_bridge() -> (EventBridge, Arc<Mutex<Vec<String>>>) {
	let remote = Arc::new(RemoteCalls::new());
	let sent = Arc::new(Mutex::new(Vec::new()));
	let sink = Arc::clone(&sent);
	remote.connect(Arc::new(move |message: String| -> Result<(), TransportError> {
		sink.lock().unwrap().push(message);
		Ok(())
	}));
	(EventBridge::new(remote), sent)
}

fn last_call(sent: &Mutex<Vec<String>>) -> (RemoteCall, Value) {
	let message = sent.lock().unwrap().last().cloned().expect("Nothing was sent.");
	let call: RemoteCall = serde_json::from_str(&message).unwrap();
	let payload = serde_json::from_str(&call.json_value).unwrap();
	(call, payload)
}

#[test]
fn change_sends_only_the_value() {
	init();
	let (bridge, sent) = connected_bridge();
	bridge.dispatch(&FakeEvent::new("change"), &source(), "OnChange").unwrap();

	let (call, payload) = last_call(&sent);
	assert_eq!(call.json_value, r#""42""#);
	assert_eq!(payload, json!("42"));
	assert_eq!(call.compo_id.as_deref(), Some("form"));
	assert_eq!(call.field_or_method, "OnChange");
	assert_eq!(call.override_marker, None);
}

#[test]
fn drop_reads_transfer_and_suppresses_default_once() {
	init();
	let transfer = FakeTransfer {
		properties: vec![
			("dropEffect".to_owned(), PropertyValue::String("move".to_owned())),
			("items".to_owned(), PropertyValue::Object),
			("files".to_owned(), PropertyValue::Object),
		],
		..FakeTransfer::default()
	};
	transfer.data.borrow_mut().insert("text".to_owned(), "hello".to_owned());
	let event = FakeEvent::new("drop").with_transfer(transfer);

	let (bridge, sent) = connected_bridge();
	bridge.dispatch(&event, &source(), "OnDrop").unwrap();
	assert_eq!(event.prevented.get(), 1);

	let (call, payload) = last_call(&sent);
	assert_eq!(call.override_marker.as_deref(), Some(FILES_OVERRIDE));
	assert_eq!(payload["Data"], json!("hello"));
	assert_eq!(payload["FileOverride"], json!("xxx"));
	assert_eq!(payload["DropEffect"], json!("move"));
	assert!(payload.get("Items").is_none());
	assert!(payload.get("Files").is_none());
	assert_eq!(payload["Source"]["CompoID"], json!("form"));
}

#[test]
fn drag_start_seeds_the_transfer() {
	init();
	let mut source = source();
	source.dataset.insert("drag".to_owned(), "card-7".to_owned());
	let event = FakeEvent::new("dragstart").with_transfer(FakeTransfer::default());

	let normalized = normalize(&event, &source);
	assert_eq!(normalized.category, Category::DragSource);
	assert!(!normalized.default_prevented);
	assert_eq!(event.prevented.get(), 0);
	assert_eq!(normalized.payload["Data"], json!("card-7"));
	assert_eq!(normalized.payload["Source"]["Data"], json!({"drag": "card-7"}));
	assert_eq!(event.transfer.as_ref().unwrap().data.borrow().get("text").map(String::as_str), Some("card-7"));
}

#[test]
fn generic_events_keep_primitive_properties() {
	init();
	let event = FakeEvent::new("click")
		.with("clientX", PropertyValue::Number(10.0))
		.with("clientY", PropertyValue::Number(20.5))
		.with("detail", PropertyValue::Number(1.0))
		.with("bubbles", PropertyValue::Boolean(true))
		.with("timeStamp", PropertyValue::Number(f64::NAN))
		.with("target", PropertyValue::Object)
		.with("preventDefault", PropertyValue::Function)
		.with("relatedTarget", PropertyValue::Undefined);

	let (bridge, sent) = connected_bridge();
	bridge.dispatch(&event, &source(), "OnClick").unwrap();
	assert_eq!(event.prevented.get(), 0);

	let (_, payload) = last_call(&sent);
	assert_eq!(
		payload,
		json!({
			"Type": "click",
			"ClientX": 10,
			"ClientY": 20.5,
			"Detail": 1,
			"Bubbles": true,
			"TimeStamp": null,
			"Source": {
				"NodeID": "input-1",
				"CompoID": "form",
				"ID": "name",
				"Class": "wide",
				"Data": {},
				"Value": "42"
			}
		})
	);
	assert_eq!(bridge.pointer(), Pointer { x: 10.0, y: 20.5 });
}

#[test]
fn context_menu_is_suppressed_and_tracks_the_pointer() {
	init();
	let (bridge, _) = connected_bridge();
	let event = FakeEvent::new("contextmenu").with("clientX", PropertyValue::Number(3.0));
	bridge.dispatch(&event, &source(), "OnContextMenu").unwrap();
	assert_eq!(event.prevented.get(), 1);
	assert_eq!(bridge.pointer(), Pointer { x: 3.0, y: 0.0 });

	// Drag events don't move the tracked pointer.
	let drag = FakeEvent::new("drag").with("clientX", PropertyValue::Number(99.0));
	bridge.dispatch(&drag, &source(), "OnDrag").unwrap();
	assert_eq!(bridge.pointer().x, 3.0);
}

#[test]
fn content_editable_sources_send_inner_text() {
	init();
	let mut source = source();
	source.content_editable = true;
	source.inner_text = Some("typed".to_owned());

	let normalized = normalize(&FakeEvent::new("input"), &source);
	assert_eq!(normalized.payload["InnerText"], json!("typed"));

	let normalized = normalize(&FakeEvent::new("input"), &self::source());
	assert!(normalized.payload.get("InnerText").is_none());
}

#[test]
fn capitalization() {
	assert_eq!(capitalize("clientX"), "ClientX");
	assert_eq!(capitalize("x"), "X");
	assert_eq!(capitalize(""), "");
	assert_eq!(capitalize("élan"), "Élan");
}

#[test]
fn awaited_call_receives_its_response() {
	init();
	let (bridge, sent) = connected_bridge();
	let response = bridge.call(&FakeEvent::new("click"), &source(), "Compute");

	let message: Value = serde_json::from_str(sent.lock().unwrap().last().unwrap()).unwrap();
	let return_id = message["ReturnID"].as_str().unwrap().to_owned();
	assert_eq!(message["FieldOrMethod"], json!("Compute"));

	bridge.remote().receive(&json!({"ReturnID": return_id, "Value": {"answer": 42}}).to_string()).unwrap();
	assert_eq!(block_on(response), Ok(Some(json!({"answer": 42}))));
}

#[test]
fn dispatch_surfaces_transport_failures() {
	init();
	let remote = Arc::new(RemoteCalls::new());
	remote.connect(Arc::new(|_: String| -> Result<(), TransportError> { Err(TransportError::new("pipe closed")) }));
	let bridge = EventBridge::new(remote);

	assert_eq!(
		bridge.dispatch(&FakeEvent::new("click"), &source(), "OnClick"),
		Err(CallError::Transport("pipe closed".to_owned()))
	);
}
