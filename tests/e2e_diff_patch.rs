use ddstore::diff::{apply_diff, diff};
use ddstore::hash::deep_equals;
use ddstore::json::{self, ParseFlags};
use ddstore::store::table;
use ddstore::{DataNode, SymbolTable};

fn parse_pair(a: &[u8], b: &[u8]) -> (ddstore::DataStore, SymbolTable, DataNode, DataNode) {
    let combined = format!("[{},{}]", std::str::from_utf8(a).unwrap(), std::str::from_utf8(b).unwrap());
    let mut symbols = SymbolTable::new();
    let store = json::parse(combined.as_bytes(), &mut symbols, ParseFlags::default()).unwrap();
    let DataNode::Array(h) = store.root() else { panic!("expected an array") };
    let items = ddstore::store::array::iter(&store, h).unwrap();
    (store, symbols, items[0], items[1])
}

#[test]
fn diff_then_apply_reaches_b() {
    let (mut store, symbols, a, b) = parse_pair(br#"{"x": 1, "y": {"p": 1, "q": 2}}"#, br#"{"x": 2, "y": {"p": 1}}"#);
    let patch = diff(&mut store, &symbols, a, b);
    let patched = apply_diff(&mut store, a, patch);
    assert!(deep_equals(&store, &symbols, patched, b, false));
}

#[test]
fn diff_marks_removed_keys_with_special_erase() {
    let (mut store, symbols, a, b) = parse_pair(br#"{"a": 1, "b": 2}"#, br#"{"a": 1}"#);
    let patch = diff(&mut store, &symbols, a, b);
    let DataNode::Table(ph) = patch else { panic!("expected a table patch") };
    let b_sym = symbols.intern("b");
    assert_eq!(table::get(&store, ph, b_sym).unwrap(), Some(DataNode::SpecialErase));
}

#[test]
fn identical_documents_produce_an_empty_patch() {
    let (mut store, symbols, a, b) = parse_pair(br#"{"a": 1}"#, br#"{"a": 1}"#);
    let patch = diff(&mut store, &symbols, a, b);
    let DataNode::Table(ph) = patch else { panic!("expected a table patch") };
    assert!(table::iter(&store, ph).unwrap().is_empty());
}

#[test]
fn apply_diff_to_null_target_is_a_clone_of_the_patch() {
    let mut store = ddstore::DataStore::new();
    let symbols = SymbolTable::new();
    let patch = DataNode::Int32Small(7);
    let patched = apply_diff(&mut store, DataNode::Null, patch);
    assert!(deep_equals(&store, &symbols, patched, patch, false));
}
