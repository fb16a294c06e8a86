use mirror_dom::handles::HandleTable;
use std::{sync::Arc, thread};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Window(u32);

#[test]
fn lookup_by_id_and_component() {
	let table = HandleTable::new();
	assert!(table.is_empty());
	assert_eq!(table.insert("w1", Some("main".into()), Window(1)), None);
	assert_eq!(table.insert("w2", None, Window(2)), None);

	assert_eq!(table.get("w1"), Some(Window(1)));
	assert_eq!(table.get_by_component("main"), Some(Window(1)));
	assert_eq!(table.get_by_component("settings"), None);

	assert!(table.set_component("w2", Some("settings".into())));
	assert!(!table.set_component("w3", Some("settings".into())));
	assert_eq!(table.get_by_component("settings"), Some(Window(2)));
	assert_eq!(table.len(), 2);
}

#[test]
fn insert_replaces_and_remove_forgets() {
	let table = HandleTable::new();
	table.insert("w", Some("main".into()), Window(1));
	assert_eq!(table.insert("w", None, Window(2)), Some(Window(1)));
	assert_eq!(table.get_by_component("main"), None);

	assert_eq!(table.remove("w"), Some(Window(2)));
	assert_eq!(table.remove("w"), None);
	assert_eq!(table.get("w"), None);
}

#[test]
fn shared_across_threads() {
	let table = Arc::new(HandleTable::new());
	let writers: Vec<_> = (0..4_u32)
		.map(|index| {
			let table = Arc::clone(&table);
			thread::spawn(move || {
				for i in 0..25 {
					table.insert(format!("w{}-{}", index, i), None, Window(index * 100 + i));
				}
			})
		})
		.collect();
	for writer in writers {
		writer.join().unwrap();
	}

	assert_eq!(table.len(), 100);
	assert_eq!(table.get("w3-24"), Some(Window(324)));
}
