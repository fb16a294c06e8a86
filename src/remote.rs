//! Request/response correlation between the UI runtime and the application runtime.

use crate::{
	error::{CallError, TransportError},
	node::NodeId,
};
use core::{fmt, future::Future};
use futures::channel::oneshot;
use hashbrown::HashMap;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::{
	collections::VecDeque,
	sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tracing::{debug, error, instrument, trace, warn};
use uuid::Uuid;

/// A call to a component's field or method, usually raised by a UI event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCall {
	#[serde(rename = "CompoID", alias = "compo-id", default, skip_serializing_if = "Option::is_none")]
	pub compo_id: Option<NodeId>,
	#[serde(rename = "FieldOrMethod", alias = "Target")]
	pub field_or_method: String,
	/// The JSON-serialized payload.
	#[serde(rename = "JSONValue")]
	pub json_value: String,
	#[serde(rename = "Override", default, skip_serializing_if = "Option::is_none")]
	pub override_marker: Option<String>,
}

/// A call into the native host shell (window, menu and dock adapters).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformCall {
	#[serde(rename = "Method")]
	pub method: String,
	#[serde(rename = "Input", default, skip_serializing_if = "Option::is_none")]
	pub input: Option<Value>,
}

/// The answer to a call, matched by `ReturnID`.
///
/// A non-empty `Err` makes this a failure, regardless of any value sent alongside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
	#[serde(rename = "ReturnID")]
	pub return_id: String,
	#[serde(rename = "Value", alias = "Output", alias = "Input", default, skip_serializing_if = "Option::is_none")]
	pub value: Option<Value>,
	#[serde(rename = "Err", default, skip_serializing_if = "String::is_empty")]
	pub err: String,
}

#[derive(Serialize)]
struct Envelope<'a, T: ?Sized> {
	#[serde(flatten)]
	call: &'a T,
	#[serde(rename = "ReturnID")]
	return_id: &'a str,
}

/// The outgoing half of the channel to the application runtime (a webview bridge, an IPC pipe, a WebSocket…).
///
/// # Correct Use
///
/// Sends are serialized so that messages leave in order. An implementation may answer synchronously through
/// [`RemoteCalls::receive`] from within [`Transport::send`], but must not send through the same [`RemoteCalls`] there.
pub trait Transport: Send + Sync {
	/// Hands one serialized message to the channel.
	///
	/// # Errors
	///
	/// Iff the message could not be sent.
	fn send(&self, message: String) -> Result<(), TransportError>;
}

impl<F> Transport for F
where
	F: Fn(String) -> Result<(), TransportError> + Send + Sync,
{
	fn send(&self, message: String) -> Result<(), TransportError> {
		self(message)
	}
}

type Reply = Result<Option<Value>, CallError>;

struct Queued {
	return_id: Option<String>,
	message: String,
}

#[derive(Default)]
struct Inner {
	transport: Option<Arc<dyn Transport>>,
	queue: VecDeque<Queued>,
	pending: HashMap<String, oneshot::Sender<Reply>>,
}

impl Inner {
	fn fail(&mut self, return_id: Option<&str>, error: &TransportError) {
		match return_id.and_then(|return_id| self.pending.remove(return_id)) {
			Some(sender) => {
				error!(?return_id, "Failed to send queued call: {}", error);
				if sender.send(Err(CallError::Transport(error.0.clone()))).is_err() {
					debug!(?return_id, "Caller stopped waiting.");
				}
			}
			None => error!("Dropped queued notification: {}", error),
		}
	}
}

/// The correlation layer: queues messages until a transport is connected,
/// stamps awaited calls with a `ReturnID` and routes responses back to their callers exactly once.
///
/// Safe to share between the UI thread and IPC callbacks.
#[derive(Default)]
pub struct RemoteCalls {
	inner: Mutex<Inner>,
	/// Held while messages are handed to the transport, but never together with `inner` across a send.
	outbox: Mutex<()>,
}

impl fmt::Debug for RemoteCalls {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let inner = self.lock();
		f.debug_struct("RemoteCalls")
			.field("connected", &inner.transport.is_some())
			.field("queued", &inner.queue.len())
			.field("pending", &inner.pending.len())
			.finish()
	}
}

impl RemoteCalls {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	fn lock(&self) -> MutexGuard<'_, Inner> {
		self.inner.lock().unwrap_or_else(PoisonError::into_inner)
	}

	fn lock_outbox(&self) -> MutexGuard<'_, ()> {
		self.outbox.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Sends `message` through the connected transport, or queues it.
	fn submit(&self, return_id: Option<&str>, message: String) -> Result<(), CallError> {
		let _outbox = self.lock_outbox();
		let transport = {
			let mut inner = self.lock();
			if let Some(transport) = inner.transport.clone() {
				transport
			} else {
				trace!(?return_id, queued = inner.queue.len() + 1, "Not connected yet. Queueing message.");
				inner.queue.push_back(Queued {
					return_id: return_id.map(ToOwned::to_owned),
					message,
				});
				return Ok(());
			}
		};
		transport.send(message).map_err(Into::into)
	}

	/// Marks the channel as ready and flushes queued messages through `transport`, in arrival order.
	///
	/// Queued messages the transport refuses are dropped. Their callers, if any, receive [`CallError::Transport`].
	#[instrument(skip(self, transport))]
	pub fn connect(&self, transport: Arc<dyn Transport>) {
		let _outbox = self.lock_outbox();
		let queued: Vec<Queued> = {
			let mut inner = self.lock();
			if inner.transport.is_some() {
				warn!("Already connected. Replacing transport.");
			}
			inner.transport = Some(Arc::clone(&transport));
			inner.queue.drain(..).collect()
		};
		debug!(queued = queued.len(), "Connected.");

		for Queued { return_id, message } in queued {
			if let Err(error) = transport.send(message) {
				self.lock().fail(return_id.as_deref(), &error);
			}
		}
	}

	/// Drops the transport. Awaiting callers receive [`CallError::Closed`].
	///
	/// Queued notifications are kept for the next [`connect`](`RemoteCalls::connect`).
	#[instrument(skip(self))]
	pub fn disconnect(&self) {
		let mut inner = self.lock();
		inner.transport = None;
		let pending: Vec<_> = inner.pending.drain().collect();
		inner.queue.retain(|queued| queued.return_id.is_none());
		drop(inner);

		debug!(pending = pending.len(), "Disconnected.");
		for (return_id, sender) in pending {
			if sender.send(Err(CallError::Closed)).is_err() {
				trace!(%return_id, "Caller stopped waiting.");
			}
		}
	}

	#[must_use]
	pub fn is_connected(&self) -> bool {
		self.lock().transport.is_some()
	}

	/// Calls awaiting a response.
	#[must_use]
	pub fn pending_len(&self) -> usize {
		self.lock().pending.len()
	}

	/// Messages waiting for [`connect`](`RemoteCalls::connect`).
	#[must_use]
	pub fn queued_len(&self) -> usize {
		self.lock().queue.len()
	}

	/// Sends `call` without expecting a response.
	///
	/// # Errors
	///
	/// Iff `call` can't be serialized or the connected transport refuses it.
	pub fn notify<T: Serialize + ?Sized>(&self, call: &T) -> Result<(), CallError> {
		let message = serde_json::to_string(call).map_err(|error| CallError::Encode(error.to_string()))?;
		self.submit(None, message)
	}

	/// Sends `call` with a fresh `ReturnID` and resolves once the matching [`Response`] is [received](`RemoteCalls::receive`).
	///
	/// `call` must serialize as a map. The returned future doesn't borrow `self`.
	pub fn call<T: Serialize + ?Sized + 'static>(&self, call: &T) -> impl Future<Output = Reply> + Send + 'static {
		let receiver = self.begin(call);
		async move {
			match receiver?.await {
				Ok(reply) => reply,
				Err(oneshot::Canceled) => Err(CallError::Closed),
			}
		}
	}

	fn begin<T: Serialize + ?Sized>(&self, call: &T) -> Result<oneshot::Receiver<Reply>, CallError> {
		let return_id = Uuid::new_v4().to_string();
		let message = serde_json::to_string(&Envelope { call, return_id: &return_id }).map_err(|error| CallError::Encode(error.to_string()))?;

		let (sender, receiver) = oneshot::channel();
		// Registered first, as the transport may answer before `send` returns.
		self.lock().pending.insert(return_id.clone(), sender);
		if let Err(error) = self.submit(Some(&return_id), message) {
			self.lock().pending.remove(&return_id);
			return Err(error);
		}
		trace!(%return_id, "Call sent.");
		Ok(receiver)
	}

	/// Calls `method` on the native host shell and decodes its output.
	///
	/// The output may arrive inline or JSON-encoded in a string. An empty output resolves to [`None`].
	pub fn call_platform<I, O>(&self, method: &str, input: &I) -> impl Future<Output = Result<Option<O>, CallError>> + Send + 'static
	where
		I: Serialize + ?Sized + 'static,
		O: DeserializeOwned + Send + 'static,
	{
		let call = serde_json::to_value(input)
			.map(|input| PlatformCall {
				method: method.to_owned(),
				input: Some(input).filter(|input| !input.is_null()),
			})
			.map_err(|error| CallError::Encode(error.to_string()));
		let response = call.map(|call| self.call(&call));
		async move {
			let output = match response?.await? {
				None => return Ok(None),
				Some(Value::String(encoded)) if encoded.is_empty() => return Ok(None),
				Some(Value::String(encoded)) => match serde_json::from_str(&encoded) {
					Ok(output) => return Ok(Some(output)),
					Err(_) => Value::String(encoded),
				},
				Some(output) => output,
			};
			serde_json::from_value(output).map(Some).map_err(|error| CallError::Decode(error.to_string()))
		}
	}

	/// Routes a serialized [`Response`] to its caller.
	///
	/// # Errors
	///
	/// Iff `message` isn't a response or no call is waiting for it.
	pub fn receive(&self, message: &str) -> Result<(), CallError> {
		let response: Response = serde_json::from_str(message).map_err(|error| {
			error!("Undecodable response: {}", error);
			CallError::Decode(error.to_string())
		})?;
		self.receive_response(response)
	}

	/// Delivers `response` to its caller, exactly once.
	///
	/// # Errors
	///
	/// [`CallError::UnknownCall`] iff no call with the response's `ReturnID` is pending,
	/// including when it was already answered.
	#[instrument(skip(self, response), fields(return_id = %response.return_id))]
	pub fn receive_response(&self, response: Response) -> Result<(), CallError> {
		let Response { return_id, value, err } = response;
		let sender = match self.lock().pending.remove(&return_id) {
			Some(sender) => sender,
			None => {
				warn!("No pending call for this response.");
				return Err(CallError::UnknownCall(return_id));
			}
		};

		let reply = if err.is_empty() {
			Ok(value)
		} else {
			if value.is_some() {
				warn!("Response carries both a value and an error. Ignoring the value.");
			}
			Err(CallError::Remote(err))
		};
		if sender.send(reply).is_err() {
			debug!("Caller stopped waiting.");
		}
		Ok(())
	}
}
