use std::collections::HashMap;

use ddstore::commands::{evaluate, CommandSource};
use ddstore::error::CommandError;
use ddstore::store::{array, table, DataStore};
use ddstore::{DataNode, SymbolTable};

struct FsCommandSource {
    root: std::path::PathBuf,
}

impl CommandSource for FsCommandSource {
    fn read(&mut self, relative_path: &str) -> Result<Vec<u8>, CommandError> {
        std::fs::read(self.root.join(relative_path)).map_err(|e| CommandError { command_index: 0, message: e.to_string() })
    }
}

#[test]
fn builds_a_table_across_multiple_included_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("main.cmd"), r#"[["$object","player"],["$include","stats.json"],["$append","buffs",{"name": "haste"}]]"#).unwrap();
    std::fs::write(dir.path().join("stats.json"), r#"{"hp": 10, "mp": 5}"#).unwrap();

    let mut symbols = SymbolTable::new();
    let mut source = FsCommandSource { root: dir.path().to_path_buf() };
    let store = evaluate("main.cmd", &mut symbols, &mut source).unwrap();

    let root_h = DataStore::expect_table(store.root()).unwrap();
    let player = table::get(&store, root_h, symbols.lookup("player").unwrap()).unwrap().unwrap();
    let player_h = DataStore::expect_table(player).unwrap();
    assert_eq!(table::get(&store, player_h, symbols.lookup("hp").unwrap()).unwrap(), Some(DataNode::Int32Small(10)));
    assert_eq!(table::get(&store, player_h, symbols.lookup("mp").unwrap()).unwrap(), Some(DataNode::Int32Small(5)));

    let buffs = table::get(&store, player_h, symbols.lookup("buffs").unwrap()).unwrap().unwrap();
    let buffs_h = DataStore::expect_array(buffs).unwrap();
    assert_eq!(array::iter(&store, buffs_h).unwrap().len(), 1);
}

#[test]
fn missing_include_surfaces_as_command_error() {
    let mut map = HashMap::new();
    map.insert("main.cmd".to_string(), br#"[["$include","missing.json"]]"#.to_vec());
    struct MapSource(HashMap<String, Vec<u8>>);
    impl CommandSource for MapSource {
        fn read(&mut self, relative_path: &str) -> Result<Vec<u8>, CommandError> {
            self.0.get(relative_path).cloned().ok_or_else(|| CommandError { command_index: 0, message: format!("no such file: {relative_path}") })
        }
    }
    let mut symbols = SymbolTable::new();
    let mut source = MapSource(map);
    let err = evaluate("main.cmd", &mut symbols, &mut source).unwrap_err();
    assert!(err.message.contains("missing.json"));
}
