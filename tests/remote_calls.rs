use futures::executor::block_on;
use mirror_dom::{
	remote::{RemoteCalls, Response},
	CallError, TransportError,
};
use serde_json::{json, Value};
use std::{
	sync::{Arc, Barrier, Mutex},
	thread,
};
use tracing_subscriber::EnvFilter;

fn init() {
	let _ = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).with_test_writer().try_init();
}

type Sent = Arc<Mutex<Vec<String>>>;

fn connect_recorder(remote: &RemoteCalls) -> Sent {
	let sent = Sent::default();
	let sink = Arc::clone(&sent);
	remote.connect(Arc::new(move |message: String| -> Result<(), TransportError> {
		sink.lock().unwrap().push(message);
		Ok(())
	}));
	sent
}

fn sent_values(sent: &Sent) -> Vec<Value> {
	sent.lock().unwrap().iter().map(|message| serde_json::from_str(message).unwrap()).collect()
}

fn return_id(message: &Value) -> String {
	message["ReturnID"].as_str().unwrap().to_owned()
}

#[test]
fn notifications_queue_until_connected() {
	init();
	let remote = RemoteCalls::new();
	for i in 0..3 {
		remote.notify(&json!({ "Seq": i })).unwrap();
	}
	assert!(!remote.is_connected());
	assert_eq!(remote.queued_len(), 3);

	let sent = connect_recorder(&remote);
	assert!(remote.is_connected());
	assert_eq!(remote.queued_len(), 0);

	remote.notify(&json!({ "Seq": 3 })).unwrap();
	let sequence: Vec<_> = sent_values(&sent).iter().map(|message| message["Seq"].as_u64().unwrap()).collect();
	assert_eq!(sequence, [0, 1, 2, 3]);
}

#[test]
fn concurrent_calls_are_flushed_in_order_exactly_once() {
	init();
	const THREADS: usize = 8;
	const PER_THREAD: usize = 50;

	let remote = Arc::new(RemoteCalls::new());
	let barrier = Arc::new(Barrier::new(THREADS));
	let handles: Vec<_> = (0..THREADS)
		.map(|index| {
			let remote = Arc::clone(&remote);
			let barrier = Arc::clone(&barrier);
			thread::spawn(move || {
				barrier.wait();
				for seq in 0..PER_THREAD {
					remote.notify(&json!({ "Thread": index, "Seq": seq })).unwrap();
				}
			})
		})
		.collect();
	for handle in handles {
		handle.join().unwrap();
	}
	assert_eq!(remote.queued_len(), THREADS * PER_THREAD);

	let sent = connect_recorder(&remote);
	let messages = sent_values(&sent);
	assert_eq!(messages.len(), THREADS * PER_THREAD);

	let mut next = vec![0; THREADS];
	for message in &messages {
		let index = usize::try_from(message["Thread"].as_u64().unwrap()).unwrap();
		let seq = usize::try_from(message["Seq"].as_u64().unwrap()).unwrap();
		assert_eq!(seq, next[index], "thread {} out of order", index);
		next[index] += 1;
	}
	assert!(next.iter().all(|&count| count == PER_THREAD));
}

#[test]
fn responses_are_routed_by_return_id() {
	init();
	let remote = RemoteCalls::new();
	let first = remote.call(&json!({ "FieldOrMethod": "A" }));
	let second = remote.call(&json!({ "FieldOrMethod": "B" }));
	assert_eq!(remote.pending_len(), 2);

	let sent = connect_recorder(&remote);
	let messages = sent_values(&sent);
	assert_eq!(messages[0]["FieldOrMethod"], json!("A"));
	assert_eq!(messages[1]["FieldOrMethod"], json!("B"));
	assert_ne!(return_id(&messages[0]), return_id(&messages[1]));

	remote.receive(&json!({ "ReturnID": return_id(&messages[1]), "Value": "b" }).to_string()).unwrap();
	remote.receive(&json!({ "ReturnID": return_id(&messages[0]) }).to_string()).unwrap();

	assert_eq!(block_on(first), Ok(None));
	assert_eq!(block_on(second), Ok(Some(json!("b"))));
	assert_eq!(remote.pending_len(), 0);
}

#[test]
fn responses_are_delivered_once() {
	init();
	let remote = RemoteCalls::new();
	let sent = connect_recorder(&remote);
	let call = remote.call(&json!({ "FieldOrMethod": "A" }));
	let id = return_id(&sent_values(&sent)[0]);

	let response = Response {
		return_id: id.clone(),
		value: Some(json!(1)),
		err: String::new(),
	};
	remote.receive_response(response.clone()).unwrap();
	assert_eq!(remote.receive_response(response), Err(CallError::UnknownCall(id)));
	assert_eq!(block_on(call), Ok(Some(json!(1))));
}

#[test]
fn errors_win_over_values() {
	init();
	let remote = RemoteCalls::new();
	let sent = connect_recorder(&remote);
	let call = remote.call(&json!({ "Method": "window.New" }));
	let id = return_id(&sent_values(&sent)[0]);

	remote.receive(&json!({ "ReturnID": id, "Output": "ignored", "Err": "no window" }).to_string()).unwrap();
	assert_eq!(block_on(call), Err(CallError::Remote("no window".to_owned())));
}

#[test]
fn disconnect_fails_awaiting_callers() {
	init();
	let remote = RemoteCalls::new();
	let queued_call = remote.call(&json!({ "FieldOrMethod": "Queued" }));
	remote.notify(&json!({ "FieldOrMethod": "Note" })).unwrap();

	remote.disconnect();
	assert_eq!(block_on(queued_call), Err(CallError::Closed));
	assert_eq!(remote.pending_len(), 0);
	assert_eq!(remote.queued_len(), 1);

	let sent = connect_recorder(&remote);
	let in_flight = remote.call(&json!({ "FieldOrMethod": "InFlight" }));
	remote.disconnect();
	assert_eq!(block_on(in_flight), Err(CallError::Closed));
	assert!(!remote.is_connected());
	assert_eq!(sent_values(&sent)[0]["FieldOrMethod"], json!("Note"));
}

#[test]
fn transport_failures_reach_the_caller() {
	init();
	let remote = RemoteCalls::new();
	let queued = remote.call(&json!({ "FieldOrMethod": "A" }));
	remote.connect(Arc::new(|_: String| -> Result<(), TransportError> { Err(TransportError::new("broken pipe")) }));

	assert_eq!(block_on(queued), Err(CallError::Transport("broken pipe".to_owned())));
	assert_eq!(remote.pending_len(), 0);

	let immediate = remote.call(&json!({ "FieldOrMethod": "B" }));
	assert_eq!(block_on(immediate), Err(CallError::Transport("broken pipe".to_owned())));
	assert_eq!(remote.pending_len(), 0);
}

#[test]
fn unknown_and_undecodable_responses() {
	init();
	let remote = RemoteCalls::new();
	assert_eq!(remote.receive(r#"{"ReturnID": "nobody"}"#), Err(CallError::UnknownCall("nobody".to_owned())));
	assert!(matches!(remote.receive("not json"), Err(CallError::Decode(_))));
}

#[test]
fn platform_calls_decode_their_output() {
	init();
	let remote = RemoteCalls::new();
	let sent = connect_recorder(&remote);

	let encoded = remote.call_platform::<_, Vec<u32>>("menu.Items", &json!({ "ID": "m" }));
	let inline = remote.call_platform::<_, Vec<u32>>("menu.Items", &json!(null));
	let empty = remote.call_platform::<_, Vec<u32>>("menu.Clear", &json!({}));

	let messages = sent_values(&sent);
	assert_eq!(messages[0]["Method"], json!("menu.Items"));
	assert_eq!(messages[0]["Input"], json!({ "ID": "m" }));
	assert!(messages[1].get("Input").is_none());

	remote.receive(&json!({ "ReturnID": return_id(&messages[0]), "Output": "[1,2]" }).to_string()).unwrap();
	remote.receive(&json!({ "ReturnID": return_id(&messages[1]), "Output": [3] }).to_string()).unwrap();
	remote.receive(&json!({ "ReturnID": return_id(&messages[2]), "Output": "" }).to_string()).unwrap();

	assert_eq!(block_on(encoded), Ok(Some(vec![1, 2])));
	assert_eq!(block_on(inline), Ok(Some(vec![3])));
	assert_eq!(block_on(empty), Ok(None));
}

/// Answers every call from within `send`, like an in-process host would.
fn connect_loopback(remote: &Arc<RemoteCalls>) {
	let weak = Arc::downgrade(remote);
	remote.connect(Arc::new(move |message: String| -> Result<(), TransportError> {
		let remote = weak.upgrade().ok_or_else(|| TransportError::new("gone"))?;
		let request: Value = serde_json::from_str(&message).map_err(|error| TransportError::new(error.to_string()))?;
		if let Some(return_id) = request["ReturnID"].as_str() {
			remote
				.receive(&json!({ "ReturnID": return_id, "Value": request["FieldOrMethod"] }).to_string())
				.map_err(|error| TransportError::new(error.to_string()))?;
		}
		Ok(())
	}));
}

#[test]
fn transports_may_answer_synchronously() {
	init();
	let remote = Arc::new(RemoteCalls::new());
	let queued = remote.call(&json!({ "FieldOrMethod": "Queued" }));
	connect_loopback(&remote);

	let immediate = remote.call(&json!({ "FieldOrMethod": "Immediate" }));
	remote.notify(&json!({ "FieldOrMethod": "Note" })).unwrap();

	assert_eq!(block_on(queued), Ok(Some(json!("Queued"))));
	assert_eq!(block_on(immediate), Ok(Some(json!("Immediate"))));
	assert_eq!(remote.pending_len(), 0);
}
