//! A minimal JSON-Schema subset used to validate a parsed document against
//! a schema document parsed the same way: `type`, `required`, `properties`,
//! `items`, `enum`, `minimum`/`maximum`, `pattern`. No external crate is
//! pulled in for `pattern`; it supports only a literal match or a single
//! leading/trailing `*` wildcard, which is enough for the lookup-by-path
//! matching this is meant to gate — see DESIGN.md.

use super::parser::{parse, ParseFlags};
use crate::error::{ParseError, SourcePos};
use crate::store::{array, table, DataStore};
use crate::symbol::SymbolTable;
use crate::value::DataNode;

/// A loaded schema document, ready to validate instances against.
pub struct Schema {
    store: DataStore,
    symbols: SymbolTable,
}

impl Schema {
    pub fn parse(bytes: &[u8]) -> Result<Schema, ParseError> {
        let mut symbols = SymbolTable::new();
        let store = parse(bytes, &mut symbols, ParseFlags::default())?;
        Ok(Schema { store, symbols })
    }
}

/// Validate `node` (read through `doc_store`/`doc_symbols`) against `schema`.
/// On failure, the returned [`ParseError`] names the failing rule via
/// [`ParseError::with_schema_rule`]; `doc_store`/`doc_symbols` positions
/// aren't tracked past parsing, so the error's own `pos` is a placeholder.
pub fn validate(schema: &Schema, doc_store: &DataStore, doc_symbols: &SymbolTable, node: DataNode) -> Result<(), ParseError> {
    validate_node(schema, schema.store.root(), doc_store, doc_symbols, node, "$")
}

fn placeholder_pos() -> SourcePos {
    SourcePos { line: 0, column: 0 }
}

fn fail(path: &str, message: impl Into<String>) -> ParseError {
    ParseError::new(placeholder_pos(), message.into()).with_schema_rule(path.to_string())
}

fn lookup_str<'a>(store: &'a DataStore, symbols: &'a SymbolTable, table_h: crate::value::Handle, key: &str) -> Option<&'a str> {
    let symbol = symbols.lookup(key)?;
    match table::get(store, table_h, symbol).ok()?? {
        DataNode::String(h) => store.read_string(h).ok(),
        _ => None,
    }
}

fn lookup<'a>(
    store: &DataStore,
    symbols: &SymbolTable,
    table_h: crate::value::Handle,
    key: &str,
) -> Option<DataNode> {
    let symbol = symbols.lookup(key)?;
    table::get(store, table_h, symbol).ok().flatten()
}

fn as_f64(store: &DataStore, node: DataNode) -> Option<f64> {
    match node {
        DataNode::Int32Small(v) => Some(v as f64),
        DataNode::Float31(v) => Some(v as f64),
        DataNode::Int32Big(h) => store.read_int32_big(h).ok().map(|v| v as f64),
        DataNode::UInt32(h) => store.read_uint32(h).ok().map(|v| v as f64),
        DataNode::Int64(h) => store.read_int64(h).ok().map(|v| v as f64),
        DataNode::UInt64(h) => store.read_uint64(h).ok().map(|v| v as f64),
        DataNode::Float32(h) => store.read_float32(h).ok().map(|v| v as f64),
        _ => None,
    }
}

fn is_numeric(node: &DataNode) -> bool {
    matches!(
        node,
        DataNode::Int32Small(_)
            | DataNode::Float31(_)
            | DataNode::Int32Big(_)
            | DataNode::UInt32(_)
            | DataNode::Int64(_)
            | DataNode::UInt64(_)
            | DataNode::Float32(_)
    )
}

fn is_integer(node: &DataNode) -> bool {
    matches!(
        node,
        DataNode::Int32Small(_) | DataNode::Int32Big(_) | DataNode::UInt32(_) | DataNode::Int64(_) | DataNode::UInt64(_)
    )
}

fn type_matches(expected: &str, node: &DataNode) -> bool {
    match expected {
        "object" => matches!(node, DataNode::Table(_)),
        "array" => matches!(node, DataNode::Array(_)),
        "string" => matches!(node, DataNode::String(_) | DataNode::FilePath(_)),
        "number" => is_numeric(node),
        "integer" => is_integer(node),
        "boolean" => matches!(node, DataNode::Boolean(_)),
        "null" => matches!(node, DataNode::Null),
        _ => true, // an unrecognised type name constrains nothing
    }
}

fn matches_pattern(pattern: &str, s: &str) -> bool {
    if let Some(rest) = pattern.strip_prefix('*') {
        if let Some(prefix) = rest.strip_suffix('*') {
            return s.contains(prefix);
        }
        return s.ends_with(rest);
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return s.starts_with(prefix);
    }
    s == pattern
}

fn validate_node(
    schema: &Schema,
    schema_node: DataNode,
    doc_store: &DataStore,
    doc_symbols: &SymbolTable,
    node: DataNode,
    path: &str,
) -> Result<(), ParseError> {
    let DataNode::Table(rules) = schema_node else {
        return Ok(()); // a non-object schema node (e.g. `true`) accepts anything
    };

    if let Some(expected) = lookup_str(&schema.store, &schema.symbols, rules, "type") {
        if !type_matches(expected, &node) {
            return Err(fail(path, format!("expected type '{expected}'")));
        }
    }

    if let Some(DataNode::Array(allowed)) = lookup(&schema.store, &schema.symbols, rules, "enum") {
        let mut any_match = false;
        for i in 0..array::len(&schema.store, allowed).map_err(|e| fail(path, e.to_string()))? {
            let candidate = array::get(&schema.store, allowed, i).map_err(|e| fail(path, e.to_string()))?;
            if scalar_eq(&schema.store, &schema.symbols, candidate, doc_store, doc_symbols, node) {
                any_match = true;
                break;
            }
        }
        if !any_match {
            return Err(fail(path, "value is not one of the schema's enum members"));
        }
    }

    if let Some(min) = lookup(&schema.store, &schema.symbols, rules, "minimum").and_then(|n| as_f64(&schema.store, n)) {
        if let Some(v) = as_f64(doc_store, node) {
            if v < min {
                return Err(fail(path, format!("value {v} is below the schema minimum {min}")));
            }
        }
    }
    if let Some(max) = lookup(&schema.store, &schema.symbols, rules, "maximum").and_then(|n| as_f64(&schema.store, n)) {
        if let Some(v) = as_f64(doc_store, node) {
            if v > max {
                return Err(fail(path, format!("value {v} is above the schema maximum {max}")));
            }
        }
    }

    if let (Some(pattern), DataNode::String(h)) = (lookup_str(&schema.store, &schema.symbols, rules, "pattern"), node) {
        let s = doc_store.read_string(h).map_err(|e| fail(path, e.to_string()))?;
        if !matches_pattern(pattern, s) {
            return Err(fail(path, format!("value does not match pattern '{pattern}'")));
        }
    }

    if let Some(DataNode::Array(required)) = lookup(&schema.store, &schema.symbols, rules, "required") {
        if let DataNode::Table(doc_table) = node {
            for i in 0..array::len(&schema.store, required).map_err(|e| fail(path, e.to_string()))? {
                let DataNode::String(name_h) = array::get(&schema.store, required, i).map_err(|e| fail(path, e.to_string()))? else {
                    continue;
                };
                let name = schema.store.read_string(name_h).map_err(|e| fail(path, e.to_string()))?;
                let symbol = doc_symbols.lookup(name);
                let present = symbol.is_some_and(|s| table::contains(doc_store, doc_table, s).unwrap_or(false));
                if !present {
                    return Err(fail(path, format!("missing required property '{name}'")));
                }
            }
        }
    }

    if let (Some(DataNode::Table(properties)), DataNode::Table(doc_table)) = (lookup(&schema.store, &schema.symbols, rules, "properties"), node) {
        for (schema_symbol, sub_schema) in table::iter(&schema.store, properties).map_err(|e| fail(path, e.to_string()))? {
            let Some(name) = schema.symbols.resolve(schema_symbol) else { continue };
            let Some(doc_symbol) = doc_symbols.lookup(name) else { continue };
            let Some(child) = table::get(doc_store, doc_table, doc_symbol).map_err(|e| fail(path, e.to_string()))? else {
                continue;
            };
            let child_path = format!("{path}.{name}");
            validate_node(schema, sub_schema, doc_store, doc_symbols, child, &child_path)?;
        }
    }

    if let (Some(item_schema), DataNode::Array(doc_array)) = (lookup(&schema.store, &schema.symbols, rules, "items"), node) {
        for i in 0..array::len(doc_store, doc_array).map_err(|e| fail(path, e.to_string()))? {
            let item = array::get(doc_store, doc_array, i).map_err(|e| fail(path, e.to_string()))?;
            let item_path = format!("{path}[{i}]");
            validate_node(schema, item_schema, doc_store, doc_symbols, item, &item_path)?;
        }
    }

    Ok(())
}

fn scalar_eq(
    schema_store: &DataStore,
    schema_symbols: &SymbolTable,
    a: DataNode,
    doc_store: &DataStore,
    doc_symbols: &SymbolTable,
    b: DataNode,
) -> bool {
    match (a, b) {
        (DataNode::Null, DataNode::Null) => true,
        (DataNode::Boolean(x), DataNode::Boolean(y)) => x == y,
        (DataNode::String(x), DataNode::String(y)) => schema_store.read_string(x).ok() == doc_store.read_string(y).ok(),
        (DataNode::FilePath(x), DataNode::FilePath(y)) => {
            x.directory == y.directory && x.file_type == y.file_type && schema_symbols.resolve(x.symbol) == doc_symbols.resolve(y.symbol)
        }
        _ if is_numeric(&a) && is_numeric(&b) => as_f64(schema_store, a) == as_f64(doc_store, b),
        _ => false,
    }
}
