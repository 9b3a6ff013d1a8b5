//! The `$include`/`$object`/`$append`/`$erase`/`$set` command DSL: builds a
//! [`DataStore`] by replaying a JSON command file, optionally pulling in
//! other files by relative path through [`CommandSource`].
//!
//! Every function here takes its mutable state (`store`, the active
//! mutation target, the shared interner) as plain parameters rather than
//! methods on a struct, the way [`crate::diff`] and [`crate::store::table`]
//! do — nothing here needs more than one of them borrowed at a time.

use crate::error::CommandError;
use crate::json::{self, ParseFlags};
use crate::platform::{DirectoryTag, FileTypeTag};
use crate::store::config::MIN_TABLE_CAPACITY;
use crate::store::{array, table, DataStore};
use crate::symbol::SymbolTable;
use crate::value::{DataNode, Handle};

/// Resolves a command file's relative-path arguments (`$include`) to bytes.
/// Stands in for whatever owns the actual content tree; provided by the
/// caller, not this crate.
pub trait CommandSource {
    fn read(&mut self, relative_path: &str) -> Result<Vec<u8>, CommandError>;
}

/// Evaluate the command file at `entry_path`, returning the store it builds.
pub fn evaluate(entry_path: &str, symbols: &mut SymbolTable, source: &mut dyn CommandSource) -> Result<DataStore, CommandError> {
    let mut store = DataStore::new();
    let mut ctx = Context { symbols, source, include_count: 0 };
    let mut active = DataNode::Null;
    run_file(&mut store, &mut ctx, &mut active, entry_path)?;
    Ok(store)
}

struct Context<'a> {
    symbols: &'a mut SymbolTable,
    source: &'a mut dyn CommandSource,
    include_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    FilePath { directory: DirectoryTag, file_type: FileTypeTag, name: String },
}

fn scalar_of(store: &DataStore, symbols: &SymbolTable, node: DataNode) -> Option<Scalar> {
    match node {
        DataNode::Null => Some(Scalar::Null),
        DataNode::Boolean(b) => Some(Scalar::Bool(b)),
        DataNode::Int32Small(v) => Some(Scalar::Int(v as i64)),
        DataNode::Float31(v) => Some(Scalar::Float(v as f64)),
        DataNode::Int32Big(h) => store.read_int32_big(h).ok().map(|v| Scalar::Int(v as i64)),
        DataNode::UInt32(h) => store.read_uint32(h).ok().map(|v| Scalar::UInt(v as u64)),
        DataNode::Int64(h) => store.read_int64(h).ok().map(Scalar::Int),
        DataNode::UInt64(h) => store.read_uint64(h).ok().map(Scalar::UInt),
        DataNode::Float32(h) => store.read_float32(h).ok().map(|v| Scalar::Float(v as f64)),
        DataNode::String(h) => store.read_string(h).ok().map(|s| Scalar::Str(s.to_string())),
        DataNode::FilePath(fp) => symbols.resolve(fp.symbol).map(|s| Scalar::FilePath {
            directory: fp.directory,
            file_type: fp.file_type,
            name: s.to_string(),
        }),
        _ => None,
    }
}

#[derive(Debug, Clone)]
enum PathStep {
    Key(u32),
    Index(u32),
    Search(u32, Scalar),
}

enum MutateKind {
    Append,
    Erase,
    Set,
}

fn cmd_err(index: usize, message: impl Into<String>) -> CommandError {
    CommandError { command_index: index, message: message.into() }
}

fn is_command_file(store: &DataStore, root: DataNode) -> bool {
    let DataNode::Array(h) = root else { return false };
    let Ok(first) = array::get(store, h, 0) else { return false };
    let DataNode::Array(first_h) = first else { return false };
    let Ok(verb_node) = array::get(store, first_h, 0) else { return false };
    let DataNode::String(vh) = verb_node else { return false };
    let Ok(s) = store.read_string(vh) else { return false };
    matches!(s, "$include" | "$object" | "$append" | "$erase" | "$set")
}

fn ensure_root_table(store: &mut DataStore) {
    if matches!(store.root(), DataNode::Null) {
        store.make_table();
    }
}

/// Deep-copy `node` (read through `src`) into fresh storage in `dst`. Mirrors
/// [`crate::diff::clone_into`] but across two stores; symbol indices are
/// unchanged, since every document in one evaluation shares one [`SymbolTable`].
fn copy_into(dst: &mut DataStore, src: &DataStore, node: DataNode) -> DataNode {
    dst.with_gc_suppressed(|dst| copy_inner(dst, src, node))
}

fn copy_inner(dst: &mut DataStore, src: &DataStore, node: DataNode) -> DataNode {
    match node {
        DataNode::Array(h) => {
            let items = array::iter(src, h).unwrap_or_default();
            let new_h = dst.alloc_array_container(items.len() as u32);
            for item in items {
                let c = copy_inner(dst, src, item);
                array::push(dst, new_h, c).unwrap();
            }
            DataNode::Array(new_h)
        }
        DataNode::Table(h) => {
            let pairs = table::iter(src, h).unwrap_or_default();
            let new_h = dst.alloc_table_container(MIN_TABLE_CAPACITY);
            for (symbol, value) in pairs {
                let c = copy_inner(dst, src, value);
                table::set(dst, new_h, symbol, c).unwrap();
            }
            DataNode::Table(new_h)
        }
        DataNode::String(h) => {
            let s = src.read_string(h).unwrap_or("").to_string();
            DataNode::String(dst.alloc_string(&s))
        }
        DataNode::Int32Big(h) => DataNode::Int32Big(dst.alloc_int32_big(src.read_int32_big(h).unwrap_or(0))),
        DataNode::UInt32(h) => DataNode::UInt32(dst.alloc_uint32(src.read_uint32(h).unwrap_or(0))),
        DataNode::Int64(h) => DataNode::Int64(dst.alloc_int64(src.read_int64(h).unwrap_or(0))),
        DataNode::UInt64(h) => DataNode::UInt64(dst.alloc_uint64(src.read_uint64(h).unwrap_or(0))),
        DataNode::Float32(h) => DataNode::Float32(dst.alloc_float32(src.read_float32(h).unwrap_or(0.0))),
        scalar => scalar,
    }
}

fn run_file(store: &mut DataStore, ctx: &mut Context, active: &mut DataNode, path: &str) -> Result<(), CommandError> {
    let bytes = ctx.source.read(path)?;
    let doc = json::parse(&bytes, ctx.symbols, ParseFlags::default()).map_err(|e| cmd_err(0, format!("parsing '{path}': {e}")))?;
    if is_command_file(&doc, doc.root()) {
        run_commands(store, ctx, active, &doc)
    } else {
        let copied = copy_into(store, &doc, doc.root());
        merge_into_active(store, active, copied)
    }
}

fn run_commands(store: &mut DataStore, ctx: &mut Context, active: &mut DataNode, doc: &DataStore) -> Result<(), CommandError> {
    let DataNode::Array(cmds_h) = doc.root() else {
        return Err(cmd_err(0, "command file root must be an array"));
    };
    let commands = array::iter(doc, cmds_h).map_err(|e| cmd_err(0, e.to_string()))?;
    for (index, cmd) in commands.iter().enumerate() {
        run_one(store, ctx, active, doc, *cmd, index, &commands)?;
    }
    Ok(())
}

fn command_args(doc: &DataStore, cmd: DataNode, index: usize) -> Result<Vec<DataNode>, CommandError> {
    let DataNode::Array(h) = cmd else {
        return Err(cmd_err(index, "each command must be an array"));
    };
    array::iter(doc, h).map_err(|e| cmd_err(index, e.to_string()))
}

fn command_verb(doc: &DataStore, cmd: DataNode) -> Option<String> {
    let DataNode::Array(h) = cmd else { return None };
    let DataNode::String(vh) = array::get(doc, h, 0).ok()? else { return None };
    doc.read_string(vh).ok().map(str::to_string)
}

fn expect_string_arg(doc: &DataStore, args: &[DataNode], i: usize, index: usize) -> Result<String, CommandError> {
    let Some(DataNode::String(h)) = args.get(i).copied() else {
        return Err(cmd_err(index, "expected a string argument"));
    };
    doc.read_string(h).map(str::to_string).map_err(|e| cmd_err(index, e.to_string()))
}

fn run_one(
    store: &mut DataStore,
    ctx: &mut Context,
    active: &mut DataNode,
    doc: &DataStore,
    cmd: DataNode,
    index: usize,
    commands: &[DataNode],
) -> Result<(), CommandError> {
    let args = command_args(doc, cmd, index)?;
    let Some(DataNode::String(verb_h)) = args.first().copied() else {
        return Err(cmd_err(index, "command verb must be a string"));
    };
    let verb = doc.read_string(verb_h).map_err(|e| cmd_err(index, e.to_string()))?.to_string();
    match verb.as_str() {
        "$include" => cmd_include(store, ctx, active, doc, &args, index, commands),
        "$object" => cmd_object(store, ctx, active, doc, &args, index),
        "$append" => cmd_mutate(store, ctx.symbols, doc, &args, index, MutateKind::Append, active),
        "$erase" => cmd_mutate(store, ctx.symbols, doc, &args, index, MutateKind::Erase, active),
        "$set" => cmd_mutate(store, ctx.symbols, doc, &args, index, MutateKind::Set, active),
        other => Err(cmd_err(index, format!("unknown command '{other}'"))),
    }
}

fn cmd_include(
    store: &mut DataStore,
    ctx: &mut Context,
    active: &mut DataNode,
    doc: &DataStore,
    args: &[DataNode],
    index: usize,
    commands: &[DataNode],
) -> Result<(), CommandError> {
    let path = expect_string_arg(doc, args, 1, index)?;
    let is_first = ctx.include_count == 0;
    ctx.include_count += 1;
    let next_is_object = commands.get(index + 1).and_then(|c| command_verb(doc, *c)).as_deref() == Some("$object");
    let wholesale = is_first && next_is_object;

    let bytes = ctx.source.read(&path)?;
    let included = json::parse(&bytes, ctx.symbols, ParseFlags::default()).map_err(|e| cmd_err(index, format!("parsing '{path}': {e}")))?;

    if is_command_file(&included, included.root()) {
        run_commands(store, ctx, active, &included)
    } else if wholesale {
        let copied = copy_into(store, &included, included.root());
        store.set_root(copied);
        *active = copied;
        Ok(())
    } else {
        let copied = copy_into(store, &included, included.root());
        merge_into_active(store, active, copied)
    }
}

fn merge_into_active(store: &mut DataStore, active: &mut DataNode, value: DataNode) -> Result<(), CommandError> {
    ensure_root_table(store);
    if matches!(*active, DataNode::Null) {
        *active = store.root();
    }
    match (*active, value) {
        (DataNode::Table(dst_h), DataNode::Table(src_h)) => {
            let pairs = table::iter(store, src_h).unwrap_or_default();
            store.with_gc_suppressed(|store| {
                for (symbol, v) in pairs {
                    table::set(store, dst_h, symbol, v).unwrap();
                }
            });
        }
        _ => {
            store.set_root(value);
            *active = value;
        }
    }
    Ok(())
}

fn cmd_object(
    store: &mut DataStore,
    ctx: &mut Context,
    active: &mut DataNode,
    doc: &DataStore,
    args: &[DataNode],
    index: usize,
) -> Result<(), CommandError> {
    let name = expect_string_arg(doc, args, 1, index)?;
    let parent = if args.len() > 2 { Some(expect_string_arg(doc, args, 2, index)?) } else { None };
    ensure_root_table(store);
    let DataNode::Table(root_h) = store.root() else {
        unreachable!("ensure_root_table guarantees a table root")
    };
    let symbol = ctx.symbols.intern(&name);
    let existing = table::get(store, root_h, symbol).map_err(|e| cmd_err(index, e.to_string()))?;
    let target = match existing {
        Some(node) => node,
        None => {
            let new_target = match &parent {
                Some(parent_name) => {
                    let parent_symbol = ctx.symbols.intern(parent_name);
                    match table::get(store, root_h, parent_symbol).map_err(|e| cmd_err(index, e.to_string()))? {
                        Some(parent_node) => crate::diff::clone_into(store, parent_node),
                        None => DataNode::Table(store.alloc_table_container(MIN_TABLE_CAPACITY)),
                    }
                }
                None => DataNode::Table(store.alloc_table_container(MIN_TABLE_CAPACITY)),
            };
            table::set(store, root_h, symbol, new_target).map_err(|e| cmd_err(index, e.to_string()))?;
            new_target
        }
    };
    *active = target;
    Ok(())
}

fn resolve_path_steps(doc: &DataStore, symbols: &mut SymbolTable, path_args: &[DataNode], index: usize) -> Result<Vec<PathStep>, CommandError> {
    let mut steps = Vec::with_capacity(path_args.len());
    for step_node in path_args {
        match *step_node {
            DataNode::String(h) => {
                let s = doc.read_string(h).map_err(|e| cmd_err(index, e.to_string()))?;
                steps.push(PathStep::Key(symbols.intern(s)));
            }
            DataNode::Int32Small(v) if v >= 0 => steps.push(PathStep::Index(v as u32)),
            DataNode::Array(sub_h) => {
                let sub = array::iter(doc, sub_h).map_err(|e| cmd_err(index, e.to_string()))?;
                let Some(DataNode::String(name_h)) = sub.first().copied() else {
                    return Err(cmd_err(index, "unsupported path step"));
                };
                let name = doc.read_string(name_h).map_err(|e| cmd_err(index, e.to_string()))?;
                if name != "$search" {
                    return Err(cmd_err(index, format!("unsupported path step array '{name}'")));
                }
                let DataNode::String(key_h) = sub.get(1).copied().ok_or_else(|| cmd_err(index, "$search requires a key"))? else {
                    return Err(cmd_err(index, "$search key must be a string"));
                };
                let key = doc.read_string(key_h).map_err(|e| cmd_err(index, e.to_string()))?;
                let expected_node = *sub.get(2).ok_or_else(|| cmd_err(index, "$search requires an expected value"))?;
                let expected = scalar_of(doc, symbols, expected_node).ok_or_else(|| cmd_err(index, "$search expected value must be a scalar"))?;
                steps.push(PathStep::Search(symbols.intern(key), expected));
            }
            _ => return Err(cmd_err(index, "unsupported path step type")),
        }
    }
    Ok(steps)
}

fn make_container_for(store: &mut DataStore, next: &PathStep) -> DataNode {
    match next {
        PathStep::Index(_) => DataNode::Array(store.alloc_array_container(0)),
        _ => DataNode::Table(store.alloc_table_container(MIN_TABLE_CAPACITY)),
    }
}

fn find_search_index(store: &DataStore, symbols: &SymbolTable, h: Handle, key_symbol: u32, expected: &Scalar) -> Option<u32> {
    let items = array::iter(store, h).ok()?;
    for (i, item) in items.iter().enumerate() {
        if let DataNode::Table(th) = item {
            if let Ok(Some(field)) = table::get(store, *th, key_symbol) {
                if scalar_of(store, symbols, field).as_ref() == Some(expected) {
                    return Some(i as u32);
                }
            }
        }
    }
    None
}

fn step_into_or_create(store: &mut DataStore, symbols: &SymbolTable, container: DataNode, step: &PathStep, next: &PathStep, index: usize) -> Result<DataNode, CommandError> {
    match step {
        PathStep::Key(symbol) => {
            let DataNode::Table(h) = container else {
                return Err(cmd_err(index, "path step expects a table"));
            };
            match table::get(store, h, *symbol).map_err(|e| cmd_err(index, e.to_string()))? {
                Some(node) => Ok(node),
                None => {
                    let created = make_container_for(store, next);
                    table::set(store, h, *symbol, created).map_err(|e| cmd_err(index, e.to_string()))?;
                    Ok(created)
                }
            }
        }
        PathStep::Index(idx) => {
            let DataNode::Array(h) = container else {
                return Err(cmd_err(index, "path step expects an array"));
            };
            match array::get(store, h, *idx) {
                Ok(node) if !matches!(node, DataNode::Null) => Ok(node),
                _ => {
                    let created = make_container_for(store, next);
                    array::set(store, h, *idx, created).map_err(|e| cmd_err(index, e.to_string()))?;
                    Ok(created)
                }
            }
        }
        PathStep::Search(key_symbol, expected) => {
            let DataNode::Array(h) = container else {
                return Err(cmd_err(index, "$search expects an array"));
            };
            let idx = find_search_index(store, symbols, h, *key_symbol, expected).ok_or_else(|| cmd_err(index, "$search found no matching element"))?;
            array::get(store, h, idx).map_err(|e| cmd_err(index, e.to_string()))
        }
    }
}

fn navigate_to_parent(store: &mut DataStore, symbols: &SymbolTable, active: DataNode, steps: &[PathStep], index: usize) -> Result<(DataNode, PathStep), CommandError> {
    if steps.is_empty() {
        return Err(cmd_err(index, "path must have at least one step"));
    }
    let mut current = active;
    for i in 0..steps.len() - 1 {
        current = step_into_or_create(store, symbols, current, &steps[i], &steps[i + 1], index)?;
    }
    Ok((current, steps[steps.len() - 1].clone()))
}

fn apply_append(store: &mut DataStore, parent: DataNode, final_step: &PathStep, value: DataNode, index: usize) -> Result<(), CommandError> {
    let arr = slot_as_array_or_create(store, parent, final_step, index)?;
    array::push(store, arr, value).map_err(|e| cmd_err(index, e.to_string()))
}

fn slot_as_array_or_create(store: &mut DataStore, parent: DataNode, final_step: &PathStep, index: usize) -> Result<Handle, CommandError> {
    match final_step {
        PathStep::Key(symbol) => {
            let DataNode::Table(h) = parent else {
                return Err(cmd_err(index, "$append target's parent must be a table"));
            };
            match table::get(store, h, *symbol).map_err(|e| cmd_err(index, e.to_string()))? {
                Some(DataNode::Array(a)) => Ok(a),
                None => {
                    let a = store.alloc_array_container(0);
                    table::set(store, h, *symbol, DataNode::Array(a)).map_err(|e| cmd_err(index, e.to_string()))?;
                    Ok(a)
                }
                Some(_) => Err(cmd_err(index, "$append target is not an array")),
            }
        }
        PathStep::Index(idx) => {
            let DataNode::Array(h) = parent else {
                return Err(cmd_err(index, "$append target's parent must be an array"));
            };
            match array::get(store, h, *idx) {
                Ok(DataNode::Array(a)) => Ok(a),
                _ => Err(cmd_err(index, "$append target is not an array")),
            }
        }
        PathStep::Search(..) => Err(cmd_err(index, "$search cannot be the final path step")),
    }
}

fn apply_set(store: &mut DataStore, parent: DataNode, final_step: &PathStep, value: DataNode, index: usize) -> Result<(), CommandError> {
    match final_step {
        PathStep::Key(symbol) => {
            let DataNode::Table(h) = parent else {
                return Err(cmd_err(index, "$set target's parent must be a table"));
            };
            table::set(store, h, *symbol, value).map_err(|e| cmd_err(index, e.to_string()))
        }
        PathStep::Index(idx) => {
            let DataNode::Array(h) = parent else {
                return Err(cmd_err(index, "$set target's parent must be an array"));
            };
            array::set(store, h, *idx, value).map_err(|e| cmd_err(index, e.to_string()))
        }
        PathStep::Search(..) => Err(cmd_err(index, "$search cannot be the final path step")),
    }
}

fn apply_erase(store: &mut DataStore, symbols: &SymbolTable, parent: DataNode, final_step: &PathStep, index: usize) -> Result<(), CommandError> {
    match final_step {
        PathStep::Key(symbol) => {
            let DataNode::Table(h) = parent else {
                return Err(cmd_err(index, "$erase target's parent must be a table"));
            };
            table::erase(store, h, *symbol).map_err(|e| cmd_err(index, e.to_string()))
        }
        PathStep::Index(idx) => {
            let DataNode::Array(h) = parent else {
                return Err(cmd_err(index, "$erase target's parent must be an array"));
            };
            array::erase(store, h, *idx).map_err(|e| cmd_err(index, e.to_string()))
        }
        PathStep::Search(key, expected) => {
            let DataNode::Array(h) = parent else {
                return Err(cmd_err(index, "$erase target's parent must be an array"));
            };
            let idx = find_search_index(store, symbols, h, *key, expected).ok_or_else(|| cmd_err(index, "$search found no matching element"))?;
            array::erase(store, h, idx).map_err(|e| cmd_err(index, e.to_string()))
        }
    }
}

fn cmd_mutate(store: &mut DataStore, symbols: &mut SymbolTable, doc: &DataStore, args: &[DataNode], index: usize, kind: MutateKind, active: &mut DataNode) -> Result<(), CommandError> {
    ensure_root_table(store);
    if matches!(*active, DataNode::Null) {
        *active = store.root();
    }
    match kind {
        MutateKind::Erase => {
            let path_args = &args[1..];
            if path_args.is_empty() {
                return Err(cmd_err(index, "$erase requires a path"));
            }
            let steps = resolve_path_steps(doc, symbols, path_args, index)?;
            let (parent, final_step) = navigate_to_parent(store, symbols, *active, &steps, index)?;
            apply_erase(store, symbols, parent, &final_step, index)
        }
        MutateKind::Append | MutateKind::Set => {
            if args.len() < 3 {
                return Err(cmd_err(index, "missing path or value"));
            }
            let value_doc_node = args[args.len() - 1];
            let path_args = &args[1..args.len() - 1];
            if path_args.is_empty() {
                return Err(cmd_err(index, "path must have at least one step"));
            }
            let steps = resolve_path_steps(doc, symbols, path_args, index)?;
            let (parent, final_step) = navigate_to_parent(store, symbols, *active, &steps, index)?;
            let value = copy_into(store, doc, value_doc_node);
            match kind {
                MutateKind::Append => apply_append(store, parent, &final_step, value, index),
                MutateKind::Set => apply_set(store, parent, &final_step, value, index),
                MutateKind::Erase => unreachable!(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapSource(HashMap<String, Vec<u8>>);

    impl CommandSource for MapSource {
        fn read(&mut self, relative_path: &str) -> Result<Vec<u8>, CommandError> {
            self.0
                .get(relative_path)
                .cloned()
                .ok_or_else(|| cmd_err(0, format!("no such file: {relative_path}")))
        }
    }

    fn run(entry: &str, files: &[(&str, &str)]) -> (DataStore, SymbolTable) {
        let mut map = HashMap::new();
        for (path, contents) in files {
            map.insert(path.to_string(), contents.as_bytes().to_vec());
        }
        let mut source = MapSource(map);
        let mut symbols = SymbolTable::new();
        let store = evaluate(entry, &mut symbols, &mut source).unwrap();
        (store, symbols)
    }

    #[test]
    fn object_and_set_build_nested_table() {
        let (store, symbols) = run("main.cmd", &[("main.cmd", r#"[["$object","player"],["$set","hp",10]]"#)]);
        let root_h = DataStore::expect_table(store.root()).unwrap();
        let player_sym = symbols.lookup("player").unwrap();
        let player = table::get(&store, root_h, player_sym).unwrap().unwrap();
        let player_h = DataStore::expect_table(player).unwrap();
        let hp_sym = symbols.lookup("hp").unwrap();
        assert_eq!(table::get(&store, player_h, hp_sym).unwrap(), Some(DataNode::Int32Small(10)));
    }

    #[test]
    fn append_creates_array_and_appends() {
        let (store, symbols) = run("main.cmd", &[("main.cmd", r#"[["$object","inventory"],["$append","items",1],["$append","items",2]]"#)]);
        let root_h = DataStore::expect_table(store.root()).unwrap();
        let inv = table::get(&store, root_h, symbols.lookup("inventory").unwrap()).unwrap().unwrap();
        let inv_h = DataStore::expect_table(inv).unwrap();
        let items = table::get(&store, inv_h, symbols.lookup("items").unwrap()).unwrap().unwrap();
        let items_h = DataStore::expect_array(items).unwrap();
        assert_eq!(array::iter(&store, items_h).unwrap(), vec![DataNode::Int32Small(1), DataNode::Int32Small(2)]);
    }

    #[test]
    fn erase_removes_key() {
        let (store, symbols) = run("main.cmd", &[("main.cmd", r#"[["$object","player"],["$set","hp",10],["$erase","hp"]]"#)]);
        let root_h = DataStore::expect_table(store.root()).unwrap();
        let player = table::get(&store, root_h, symbols.lookup("player").unwrap()).unwrap().unwrap();
        let player_h = DataStore::expect_table(player).unwrap();
        assert_eq!(table::get(&store, player_h, symbols.lookup("hp").unwrap()).unwrap(), None);
    }

    #[test]
    fn search_path_step_finds_matching_element() {
        let (store, symbols) = run(
            "main.cmd",
            &[(
                "main.cmd",
                r#"[["$object","items"],["$append","list",{"id":1,"name":"a"}],["$append","list",{"id":2,"name":"b"}],["$set","list",["$search","id",2],"name","c"]]"#,
            )],
        );
        let root_h = DataStore::expect_table(store.root()).unwrap();
        let items = table::get(&store, root_h, symbols.lookup("items").unwrap()).unwrap().unwrap();
        let items_h = DataStore::expect_table(items).unwrap();
        let list = table::get(&store, items_h, symbols.lookup("list").unwrap()).unwrap().unwrap();
        let list_h = DataStore::expect_array(list).unwrap();
        let second = array::get(&store, list_h, 1).unwrap();
        let second_h = DataStore::expect_table(second).unwrap();
        let name = table::get(&store, second_h, symbols.lookup("name").unwrap()).unwrap().unwrap();
        let DataNode::String(name_h) = name else { panic!("expected string") };
        assert_eq!(store.read_string(name_h).unwrap(), "c");
    }

    #[test]
    fn include_merges_plain_data_into_active_table() {
        let (store, symbols) = run(
            "main.cmd",
            &[
                ("main.cmd", r#"[["$object","config"],["$include","extra.json"]]"#),
                ("extra.json", r#"{"volume": 5}"#),
            ],
        );
        let root_h = DataStore::expect_table(store.root()).unwrap();
        let config = table::get(&store, root_h, symbols.lookup("config").unwrap()).unwrap().unwrap();
        let config_h = DataStore::expect_table(config).unwrap();
        assert_eq!(
            table::get(&store, config_h, symbols.lookup("volume").unwrap()).unwrap(),
            Some(DataNode::Int32Small(5))
        );
    }

    #[test]
    fn first_include_followed_by_object_clones_wholesale() {
        let (store, symbols) = run(
            "main.cmd",
            &[
                ("main.cmd", r#"[["$include","base.json"],["$object","player"],["$set","hp",1]]"#),
                ("base.json", r#"{"name": "base"}"#),
            ],
        );
        let root_h = DataStore::expect_table(store.root()).unwrap();
        assert_eq!(table::len(&store, root_h).unwrap(), 2);
        let DataNode::String(name_h) = table::get(&store, root_h, symbols.lookup("name").unwrap()).unwrap().unwrap() else {
            panic!("expected string");
        };
        assert_eq!(store.read_string(name_h).unwrap(), "base");
    }
}
