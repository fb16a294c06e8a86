use mirror_dom::{
	error::ResolveError,
	node::{Attributes, NodeKind},
	resolve::resolve,
	ChangeError, NodeId, NodeStore,
};

const LIMIT: usize = mirror_dom::config::DEFAULT_RESOLVE_DEPTH_LIMIT;

fn component() -> NodeKind<()> {
	NodeKind::Component {
		component_type: "Test".to_owned(),
		root_id: None,
		owner: None,
	}
}

fn element() -> NodeKind<()> {
	NodeKind::Element {
		tag: "div".to_owned(),
		namespace: None,
		attributes: Attributes::new(),
		owner: None,
		handle: (),
	}
}

fn id(id: &str) -> NodeId {
	id.into()
}

#[test]
fn component_indirection() {
	let mut store = NodeStore::new();
	store.create(id("a"), component()).unwrap();
	store.create(id("b"), element()).unwrap();
	assert_eq!(resolve(&store, "a", LIMIT), Ok(None));

	store.set_root("a", Some(id("b"))).unwrap();
	assert_eq!(resolve(&store, "a", LIMIT), Ok(Some(id("b"))));

	store.remove("b");
	store.create(id("b"), component()).unwrap();
	store.create(id("c"), element()).unwrap();
	store.set_root("b", Some(id("c"))).unwrap();
	assert_eq!(resolve(&store, "a", LIMIT), Ok(Some(id("c"))));
}

#[test]
fn concrete_nodes_resolve_to_themselves() {
	let mut store = NodeStore::new();
	store.create(id("x"), element()).unwrap();
	assert_eq!(resolve(&store, "x", LIMIT), Ok(Some(id("x"))));
}

#[test]
fn absent_start_is_not_found() {
	let store = NodeStore::<()>::new();
	assert_eq!(resolve(&store, "nope", LIMIT), Err(ResolveError::NotFound(id("nope"))));
}

#[test]
fn dangling_binding_resolves_to_nothing() {
	let mut store = NodeStore::new();
	store.create(id("a"), component()).unwrap();
	store.create(id("b"), element()).unwrap();
	store.set_root("a", Some(id("b"))).unwrap();
	store.remove("b");
	assert_eq!(resolve(&store, "a", LIMIT), Ok(None));
}

#[test]
fn cycles_are_bounded() {
	let mut store = NodeStore::<()>::new();
	store.create(id("a"), component()).unwrap();
	store.create(id("b"), component()).unwrap();
	store.set_root("a", Some(id("b"))).unwrap();
	store.set_root("b", Some(id("a"))).unwrap();

	match resolve(&store, "a", 10) {
		Err(ResolveError::InvalidCycle { chain }) => {
			assert_eq!(chain.len(), 11);
			assert_eq!(chain[..4], [id("a"), id("b"), id("a"), id("b")]);
		}
		other => panic!("Expected an invalid cycle but got {:?}", other),
	}
}

#[test]
fn depth_limit_counts_placeholder_hops() {
	let mut store = NodeStore::<()>::new();
	store.create(id("leaf"), element()).unwrap();
	let mut previous = id("leaf");
	for i in 0..5 {
		let current = id(&format!("p{}", i));
		store.create(current.clone(), component()).unwrap();
		store.set_root(&current, Some(previous)).unwrap();
		previous = current;
	}

	assert_eq!(resolve(&store, "p4", 5), Ok(Some(id("leaf"))));
	assert!(matches!(resolve(&store, "p4", 4), Err(ResolveError::InvalidCycle { .. })));
}

#[test]
fn store_rejects_duplicates_and_concrete_roots() {
	let mut store = NodeStore::new();
	store.create(id("a"), element()).unwrap();
	assert_eq!(store.create(id("a"), component()).unwrap_err(), ChangeError::DuplicateId(id("a")));
	assert!(matches!(store.set_root("a", None), Err(ChangeError::WrongNodeKind { .. })));
	assert!(store.remove("a").is_some());
	assert!(store.remove("a").is_none());
}
