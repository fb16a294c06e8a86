use crate::{
	change::Action,
	node::{NodeId, Shape},
};
use thiserror::Error;

/// A display surface rejected an operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("display surface error: {0}")]
pub struct SurfaceError(pub String);

impl SurfaceError {
	pub fn new(message: impl Into<String>) -> Self {
		Self(message.into())
	}
}

/// Failure of [`resolve`](`crate::resolve::resolve`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
	#[error("node {0} not found")]
	NotFound(NodeId),
	/// The placeholder chain was longer than the configured depth limit.
	#[error("component resolution exceeded {} hops starting at {}", .chain.len(), chain_start(.chain))]
	InvalidCycle { chain: Vec<NodeId> },
}

fn chain_start(chain: &[NodeId]) -> &str {
	chain.first().map_or("<empty>", |id| id.as_str())
}

/// Why a single change could not be applied or decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChangeError {
	#[error("node {0} not found")]
	NotFound(NodeId),
	#[error("node {0} already exists")]
	DuplicateId(NodeId),
	#[error("unsupported change action {0:?}")]
	UnsupportedChange(String),
	#[error("{action} change is missing required field {field}")]
	MalformedChange { action: Action, field: &'static str },
	#[error("component resolution exceeded {} hops starting at {}", .chain.len(), chain_start(.chain))]
	InvalidCycle { chain: Vec<NodeId> },
	#[error("node {id} is not a(n) {expected}")]
	WrongNodeKind { id: NodeId, expected: Shape },
	#[error("could not decode change record: {0}")]
	Decode(String),
	#[error(transparent)]
	Surface(#[from] SurfaceError),
}

impl From<ResolveError> for ChangeError {
	fn from(error: ResolveError) -> Self {
		match error {
			ResolveError::NotFound(id) => ChangeError::NotFound(id),
			ResolveError::InvalidCycle { chain } => ChangeError::InvalidCycle { chain },
		}
	}
}

/// The single error an aborted batch reports.
///
/// Changes before `index` were applied; nothing from `index` onwards was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("change #{index}{} failed: {kind}", context(.action, .node_id))]
pub struct ApplyError {
	pub index: usize,
	pub action: Option<Action>,
	pub node_id: Option<NodeId>,
	#[source]
	pub kind: ChangeError,
}

fn context(action: &Option<Action>, node_id: &Option<NodeId>) -> String {
	let mut context = String::new();
	if let Some(action) = action {
		context.push_str(&format!(" ({})", action));
	}
	if let Some(node_id) = node_id {
		context.push_str(&format!(" on {}", node_id));
	}
	context
}

/// Failure of a remote call, as seen by its awaiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
	/// The transport refused the message.
	#[error("transport failure: {0}")]
	Transport(String),
	/// The remote side answered with an error.
	#[error("remote error: {0}")]
	Remote(String),
	/// The channel closed, or the correlation was discarded, before a response arrived.
	#[error("channel closed before a response arrived")]
	Closed,
	#[error("could not encode call: {0}")]
	Encode(String),
	#[error("could not decode response: {0}")]
	Decode(String),
	#[error("no pending call for return id {0:?}")]
	UnknownCall(String),
}

impl From<TransportError> for CallError {
	fn from(error: TransportError) -> Self {
		CallError::Transport(error.0)
	}
}

/// Returned by [`Transport::send`](`crate::remote::Transport::send`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
	pub fn new(message: impl Into<String>) -> Self {
		Self(message.into())
	}
}
