use ddstore::hint;
use ddstore::json::ParseFlags;
use ddstore::store::table;
use ddstore::{DataNode, SymbolTable};

#[test]
fn printed_document_reparses_to_the_same_canonical_hash() {
    let src = br#"{
  // keep this comment
  "name": "widget",
  "count": 3,
  "tags": ["a", "b"]
}"#;
    let mut symbols = SymbolTable::new();
    let (store, tree) = hint::parse(src, &mut symbols, ParseFlags::default()).unwrap();
    let printed = hint::print(&store, &symbols, src, &tree);
    assert!(printed.contains("// keep this comment"));

    let mut reparsed_symbols = SymbolTable::new();
    let (reparsed, _) = hint::parse(printed.as_bytes(), &mut reparsed_symbols, ParseFlags::default()).unwrap();
    let original_hash = ddstore::hash::canonical_hash(&store, &symbols, store.root());
    let reparsed_hash = ddstore::hash::canonical_hash(&reparsed, &reparsed_symbols, reparsed.root());
    assert_eq!(original_hash, reparsed_hash);
}

#[test]
fn mutated_values_keep_their_matched_comment() {
    let src = br#"{
  // description
  "hp": 10
}"#;
    let mut symbols = SymbolTable::new();
    let (mut store, tree) = hint::parse(src, &mut symbols, ParseFlags::default()).unwrap();
    let root = ddstore::DataStore::expect_table(store.root()).unwrap();
    let hp_sym = symbols.intern("hp");
    table::set(&mut store, root, hp_sym, DataNode::Int32Small(99)).unwrap();

    let printed = hint::print(&store, &symbols, src, &tree);
    assert!(printed.contains("// description"));
    assert!(printed.contains("99"));
}

#[test]
fn printed_array_order_matches_source_order() {
    let src = br#"[3, 1, 2]"#;
    let mut symbols = SymbolTable::new();
    let (store, tree) = hint::parse(src, &mut symbols, ParseFlags::default()).unwrap();
    let printed = hint::print(&store, &symbols, src, &tree);
    let three = printed.find('3').unwrap();
    let one = printed.find('1').unwrap();
    let two = printed.find('2').unwrap();
    assert!(three < one && one < two);
}
