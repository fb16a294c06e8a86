use crate::error::SurfaceError;

/// The capabilities a live display (the browser DOM, a native webview, a headless tree…) must offer.
///
/// Handles are weak references in the sense that the surface never decides about node identity:
/// the [`NodeStore`](`crate::store::NodeStore`) does. Implementations receive node ids only so they can stamp them.
///
/// All methods are synchronous and must not block. They are only ever called from within
/// [`Document::apply`](`crate::document::Document::apply`).
pub trait DisplaySurface {
	/// Handle to a concrete live node.
	type Node: Clone;

	/// Creates a detached element, in `namespace` if given.
	///
	/// # Errors
	///
	/// Iff the surface cannot create the element, which aborts the current batch.
	fn create_element(&mut self, id: &str, tag: &str, namespace: Option<&str>) -> Result<Self::Node, SurfaceError>;

	/// Creates a detached, empty text node.
	///
	/// # Errors
	///
	/// Iff the surface cannot create the node, which aborts the current batch.
	fn create_text(&mut self, id: &str) -> Result<Self::Node, SurfaceError>;

	/// # Errors
	///
	/// Iff the surface rejects the attribute.
	fn set_attribute(&mut self, node: &Self::Node, key: &str, value: &str) -> Result<(), SurfaceError>;

	/// # Errors
	///
	/// Iff the surface rejects the removal.
	fn remove_attribute(&mut self, node: &Self::Node, key: &str) -> Result<(), SurfaceError>;

	/// Appends `child` as last child of `parent`, moving it if it's attached elsewhere.
	///
	/// # Errors
	///
	/// Iff the surface rejects the insertion.
	fn append_child(&mut self, parent: &Self::Node, child: &Self::Node) -> Result<(), SurfaceError>;

	/// # Errors
	///
	/// Iff `child` isn't currently a child of `parent` or the surface rejects the removal.
	fn remove_child(&mut self, parent: &Self::Node, child: &Self::Node) -> Result<(), SurfaceError>;

	/// Puts `new_child` in `old_child`'s place under `parent`.
	///
	/// # Errors
	///
	/// Iff `old_child` isn't currently a child of `parent` or the surface rejects the replacement.
	fn replace_child(&mut self, parent: &Self::Node, new_child: &Self::Node, old_child: &Self::Node) -> Result<(), SurfaceError>;

	/// Replaces a text node's content.
	///
	/// # Errors
	///
	/// Iff the surface rejects the update.
	fn set_text(&mut self, node: &Self::Node, text: &str) -> Result<(), SurfaceError>;

	/// Replaces everything currently displayed at the surface's root with `root`.
	///
	/// # Errors
	///
	/// Iff the surface rejects the mount.
	fn mount(&mut self, root: &Self::Node) -> Result<(), SurfaceError>;

	/// Called once the record of the concrete node `node` was deleted.
	///
	/// `id` may be used again by a later creation, so per-id state such as event listeners must be dropped here.
	/// The node itself stays wherever it is attached.
	fn release(&mut self, _id: &str, _node: &Self::Node) {}
}
