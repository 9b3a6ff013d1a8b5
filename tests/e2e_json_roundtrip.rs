use ddstore::json::{self, ParseFlags};
use ddstore::store::{array, table};
use ddstore::{DataNode, SymbolTable};

#[test]
fn parses_object_with_comments_and_trailing_comma() {
    let src = br#"{
        // a leading comment
        "name": "hello",
        "values": [1, 2, 3,],
    }"#;
    let mut symbols = SymbolTable::new();
    let store = json::parse(src, &mut symbols, ParseFlags::default()).unwrap();
    let root = ddstore::store::DataStore::expect_table(store.root()).unwrap();

    let name_sym = symbols.intern("name");
    match table::get(&store, root, name_sym).unwrap().unwrap() {
        DataNode::String(h) => assert_eq!(store.read_string(h).unwrap(), "hello"),
        other => panic!("expected a string, got {other:?}"),
    }

    let values_sym = symbols.intern("values");
    let DataNode::Array(values) = table::get(&store, root, values_sym).unwrap().unwrap() else { panic!("expected an array") };
    let items = array::iter(&store, values).unwrap();
    assert_eq!(items, vec![DataNode::Int32Small(1), DataNode::Int32Small(2), DataNode::Int32Small(3)]);
}

#[test]
fn recognises_file_path_prefixes() {
    let mut symbols = SymbolTable::new();
    let store = json::parse(br#"{"icon": "content://ui/icon.png"}"#, &mut symbols, ParseFlags::default()).unwrap();
    let root = ddstore::store::DataStore::expect_table(store.root()).unwrap();
    let icon_sym = symbols.intern("icon");
    match table::get(&store, root, icon_sym).unwrap().unwrap() {
        DataNode::FilePath(fp) => {
            assert_eq!(fp.directory.scheme(), "content");
            assert_eq!(symbols.resolve(fp.symbol).unwrap(), "ui/icon");
        }
        other => panic!("expected a FilePath, got {other:?}"),
    }
}

#[test]
fn rejects_duplicate_keys_unless_allowed() {
    let mut symbols = SymbolTable::new();
    let err = json::parse(br#"{"a": 1, "a": 2}"#, &mut symbols, ParseFlags::default()).unwrap_err();
    assert!(err.message.to_lowercase().contains("duplicate"));

    let mut symbols = SymbolTable::new();
    let flags = ParseFlags { allow_duplicate_keys: true, ..ParseFlags::default() };
    let store = json::parse(br#"{"a": 1, "a": 2}"#, &mut symbols, flags).unwrap();
    let root = ddstore::store::DataStore::expect_table(store.root()).unwrap();
    let a_sym = symbols.intern("a");
    assert_eq!(table::get(&store, root, a_sym).unwrap().unwrap(), DataNode::Int32Small(2));
}

#[test]
fn parses_nan_and_infinity_tokens() {
    let mut symbols = SymbolTable::new();
    let store = json::parse(br#"[NaN, Infinity, -Infinity]"#, &mut symbols, ParseFlags::default()).unwrap();
    let DataNode::Array(h) = store.root() else { panic!("expected an array") };
    let items = array::iter(&store, h).unwrap();
    let floats: Vec<f32> = items
        .into_iter()
        .map(|n| match n {
            DataNode::Float31(v) => v,
            DataNode::Float32(h) => store.read_float32(h).unwrap(),
            other => panic!("expected a float, got {other:?}"),
        })
        .collect();
    assert!(floats[0].is_nan());
    assert_eq!(floats[1], f32::INFINITY);
    assert_eq!(floats[2], f32::NEG_INFINITY);
}
