//! Component root resolution.
//!
//! Component placeholders are a pure naming indirection over concrete content.
//! Every structural operation resolves its operands here first. Results are never cached,
//! since a placeholder's binding can change between any two changes.

use crate::{
	error::ResolveError,
	node::{NodeId, NodeKind},
	store::NodeStore,
};
use tracing::{error, trace, warn};

/// Follows placeholder bindings from `id` to the nearest concrete node.
///
/// Concrete nodes resolve to themselves.
/// Returns `Ok(None)` if any placeholder on the way is unbound or bound to a node that no longer exists,
/// i.e. there is nothing to attach yet.
///
/// # Errors
///
/// - [`ResolveError::NotFound`] iff `id` itself is absent.
/// - [`ResolveError::InvalidCycle`] if more than `depth_limit` placeholders are followed.
pub fn resolve<H>(store: &NodeStore<H>, id: &str, depth_limit: usize) -> Result<Option<NodeId>, ResolveError> {
	let mut node = store.find(id).ok_or_else(|| ResolveError::NotFound(id.into()))?;
	let mut chain = Vec::new();
	loop {
		let root_id = match node.kind() {
			NodeKind::Element { .. } | NodeKind::Text { .. } => {
				trace!(id, resolved = %node.id(), hops = chain.len(), "Resolved.");
				return Ok(Some(node.id().clone()));
			}
			NodeKind::Component { root_id: None, .. } => {
				trace!(id, unbound = %node.id(), "Component not mounted yet.");
				return Ok(None);
			}
			NodeKind::Component { root_id: Some(root_id), .. } => root_id,
		};

		chain.push(node.id().clone());
		if chain.len() > depth_limit {
			error!(?chain, "Component resolution depth limit reached. The placeholder chain is most likely cyclic.");
			return Err(ResolveError::InvalidCycle { chain });
		}

		node = match store.find(root_id) {
			Some(node) => node,
			None => {
				warn!(component = %node.id(), %root_id, "Component is bound to a node that no longer exists.");
				return Ok(None);
			}
		};
	}
}
