use ddstore::binary::{self, SaveOptions};
use ddstore::json::{self, ParseFlags};
use ddstore::store::{array, table, DataStore};
use ddstore::{DataNode, SymbolTable};

const DOC: &[u8] = br#"{
    "title": "sample",
    "count": 42,
    "ratio": 0.5,
    "tags": ["a", "b", "c"],
    "nested": {"x": 1, "y": 2}
}"#;

#[test]
fn save_then_load_preserves_structure() {
    let mut symbols = SymbolTable::new();
    let store = json::parse(DOC, &mut symbols, ParseFlags::default()).unwrap();
    let wire = binary::save(&store, &symbols, SaveOptions::default());

    let mut loaded_symbols = SymbolTable::new();
    let loaded = binary::load(&wire, &mut loaded_symbols).unwrap();

    let root = DataStore::expect_table(loaded.root()).unwrap();
    let title_sym = loaded_symbols.intern("title");
    match table::get(&loaded, root, title_sym).unwrap().unwrap() {
        DataNode::String(h) => assert_eq!(loaded.read_string(h).unwrap(), "sample"),
        other => panic!("expected a string, got {other:?}"),
    }

    let tags_sym = loaded_symbols.intern("tags");
    let DataNode::Array(tags) = table::get(&loaded, root, tags_sym).unwrap().unwrap() else { panic!("expected an array") };
    assert_eq!(array::iter(&loaded, tags).unwrap().len(), 3);

    binary::verify_integrity(&loaded).unwrap();
}

#[test]
fn load_rejects_truncated_buffer() {
    let mut symbols = SymbolTable::new();
    let store = json::parse(DOC, &mut symbols, ParseFlags::default()).unwrap();
    let wire = binary::save(&store, &symbols, SaveOptions::default());

    let mut loaded_symbols = SymbolTable::new();
    let err = binary::load(&wire[..wire.len() / 2], &mut loaded_symbols).unwrap_err();
    assert!(matches!(err, ddstore::LoadError::Truncated | ddstore::LoadError::CorruptContainerHeader | ddstore::LoadError::IndexOutOfRange));
}

#[test]
fn load_rejects_bad_signature() {
    let mut bytes = vec![0u8; 16];
    bytes[0] = 0xAA;
    let mut symbols = SymbolTable::new();
    let err = binary::load(&bytes, &mut symbols).unwrap_err();
    assert_eq!(err, ddstore::LoadError::SignatureMismatch);
}

#[test]
fn compacting_save_still_round_trips() {
    let mut symbols = SymbolTable::new();
    let store = json::parse(DOC, &mut symbols, ParseFlags::default()).unwrap();
    let options = SaveOptions { compact_containers: true, ..SaveOptions::default() };
    let wire = binary::save(&store, &symbols, options);

    let mut loaded_symbols = SymbolTable::new();
    let loaded = binary::load(&wire, &mut loaded_symbols).unwrap();
    assert!(binary::verify_integrity(&loaded).is_ok());
}
