use std::borrow::Cow;

/// Default bound on placeholder hops during component resolution.
pub const DEFAULT_RESOLVE_DEPTH_LIMIT: usize = 1000;

/// Default reserved identity attribute.
pub const DEFAULT_IDENTITY_ATTRIBUTE: &str = "data-mirror-id";

/// Per-[`Document`](`crate::document::Document`) settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
	/// Maximum number of component placeholders followed before resolution fails with an invalid cycle.
	pub resolve_depth_limit: usize,
	/// Attribute that maps live elements back to their node id.
	///
	/// Full attribute replacements never remove it.
	pub identity_attribute: Cow<'static, str>,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			resolve_depth_limit: DEFAULT_RESOLVE_DEPTH_LIMIT,
			identity_attribute: Cow::Borrowed(DEFAULT_IDENTITY_ATTRIBUTE),
		}
	}
}

impl Config {
	#[must_use]
	pub fn with_resolve_depth_limit(mut self, resolve_depth_limit: usize) -> Self {
		self.resolve_depth_limit = resolve_depth_limit;
		self
	}

	#[must_use]
	pub fn with_identity_attribute(mut self, identity_attribute: impl Into<Cow<'static, str>>) -> Self {
		self.identity_attribute = identity_attribute.into();
		self
	}
}
