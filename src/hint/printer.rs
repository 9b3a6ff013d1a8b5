//! Pretty printer: combines a value tree with a [`HintNode`] tree (usually
//! the one `hint::parser::parse` built alongside it, possibly since mutated)
//! to reproduce a close-to-original layout rather than a mechanical dump.

use super::node::{resolve_hash, HintNode};
use crate::store::{array, table, DataStore};
use crate::symbol::SymbolTable;
use crate::value::DataNode;

const LINE_WIDTH: usize = 40;
const INDENT: &str = "  ";

/// Print `store`'s root value, using `hint` (and `source`, the buffer it was
/// parsed from, for recovering comment text) to guide formatting.
pub fn print(store: &DataStore, symbols: &SymbolTable, source: &[u8], hint: &HintNode) -> String {
    let mut out = String::new();
    emit_value(store, symbols, source, store.root(), hint, 0, true, &mut out);
    out.push('\n');
    out
}

fn emit_value(
    store: &DataStore,
    symbols: &SymbolTable,
    source: &[u8],
    node: DataNode,
    hint: &HintNode,
    depth: usize,
    is_root: bool,
    out: &mut String,
) {
    match node {
        DataNode::Array(h) => emit_array(store, symbols, source, h, hint, depth, is_root, out),
        DataNode::Table(h) => emit_table(store, symbols, source, h, hint, depth, is_root, out),
        scalar => out.push_str(&format_scalar(store, symbols, scalar)),
    }
}

fn emit_array(
    store: &DataStore,
    symbols: &SymbolTable,
    source: &[u8],
    h: crate::value::Handle,
    hint: &HintNode,
    depth: usize,
    is_root: bool,
    out: &mut String,
) {
    let items = array::iter(store, h).unwrap_or_default();
    if items.is_empty() {
        out.push_str("[]");
        return;
    }
    let hint_children: &[HintNode] = match hint {
        HintNode::Array { children, .. } => children,
        _ => &[],
    };
    let matched = match_array_children(store, symbols, &items, hint_children);
    let (size, nested) = measure(store, symbols, DataNode::Array(h));
    let any_comment = matched.iter().any(|m| m.comment().is_some());
    let single_line = !is_root && size < LINE_WIDTH && nested <= 1 && !any_comment;

    if single_line {
        out.push('[');
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            emit_value(store, symbols, source, *item, &matched[i], depth + 1, false, out);
        }
        out.push(']');
        return;
    }

    let indent = INDENT.repeat(depth + 1);
    let close_indent = INDENT.repeat(depth);
    out.push_str("[\n");
    let numeric_only = !any_comment && items.iter().all(is_numeric);
    if numeric_only {
        let base = (depth + 1) * INDENT.len();
        let per_line = ((LINE_WIDTH.saturating_sub(base)) / 2).max(1);
        let total = items.len();
        for (row, chunk) in items.chunks(per_line).enumerate() {
            out.push_str(&indent);
            for (i, item) in chunk.iter().enumerate() {
                out.push_str(&format_scalar(store, symbols, *item));
                if row * per_line + i + 1 != total {
                    out.push_str(", ");
                }
            }
            out.push('\n');
        }
    } else {
        let total = items.len();
        for (i, item) in items.iter().enumerate() {
            emit_leading_comment(out, &indent, source, &matched[i], i == 0);
            out.push_str(&indent);
            emit_value(store, symbols, source, *item, &matched[i], depth + 1, false, out);
            if i + 1 < total {
                out.push(',');
            }
            out.push('\n');
        }
    }
    out.push_str(&close_indent);
    out.push(']');
}

fn emit_table(
    store: &DataStore,
    symbols: &SymbolTable,
    source: &[u8],
    h: crate::value::Handle,
    hint: &HintNode,
    depth: usize,
    is_root: bool,
    out: &mut String,
) {
    let entries = order_table_entries(store, symbols, h, hint);
    if entries.is_empty() {
        out.push_str("{}");
        return;
    }
    let (size, nested) = measure(store, symbols, DataNode::Table(h));
    let any_comment = entries.iter().any(|(_, _, h)| h.comment().is_some());
    let single_line = !is_root && size < LINE_WIDTH && nested <= 1 && !any_comment;

    if single_line {
        out.push('{');
        for (i, (key, value, child_hint)) in entries.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&escape_string(key));
            out.push_str(": ");
            emit_value(store, symbols, source, *value, child_hint, depth + 1, false, out);
        }
        out.push('}');
        return;
    }

    let indent = INDENT.repeat(depth + 1);
    let close_indent = INDENT.repeat(depth);
    out.push_str("{\n");
    let total = entries.len();
    for (i, (key, value, child_hint)) in entries.iter().enumerate() {
        emit_leading_comment(out, &indent, source, child_hint, i == 0);
        out.push_str(&indent);
        out.push_str(&escape_string(key));
        out.push_str(": ");
        emit_value(store, symbols, source, *value, child_hint, depth + 1, false, out);
        if i + 1 < total {
            out.push(',');
        }
        out.push('\n');
    }
    out.push_str(&close_indent);
    out.push('}');
}

/// Match each of `items` (in their current, possibly-mutated order) against a
/// hint child: same position and same identity hash is a reliable match; else
/// a hash that's unique among the parent's hint children wins regardless of
/// position; else fall back to the positional hint with its comment dropped,
/// since we can no longer be sure it still describes this element.
fn match_array_children(store: &DataStore, symbols: &SymbolTable, items: &[DataNode], hint_children: &[HintNode]) -> Vec<HintNode> {
    let mut by_hash: std::collections::HashMap<u64, Vec<usize>> = std::collections::HashMap::new();
    for (i, h) in hint_children.iter().enumerate() {
        if let Some(hash) = h.hash() {
            by_hash.entry(hash).or_default().push(i);
        }
    }
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let resolved = resolve_hash(store, symbols, *item);
            if let Some(h) = hint_children.get(i) {
                if h.hash() == Some(resolved) {
                    return h.clone();
                }
            }
            if let Some(candidates) = by_hash.get(&resolved) {
                if candidates.len() == 1 {
                    return hint_children[candidates[0]].clone();
                }
            }
            match hint_children.get(i) {
                Some(h) => without_comment(h),
                None => HintNode::None,
            }
        })
        .collect()
}

fn without_comment(node: &HintNode) -> HintNode {
    match node {
        HintNode::Array { order, hash, children, .. } => HintNode::Array { order: *order, comment: None, hash: *hash, children: children.clone() },
        HintNode::Table { order, hash, entries, .. } => HintNode::Table { order: *order, comment: None, hash: *hash, entries: entries.clone() },
        HintNode::Leaf { order, hash, .. } => HintNode::Leaf { order: *order, comment: None, hash: *hash },
        HintNode::None => HintNode::None,
    }
}

const NONE_HINT: HintNode = HintNode::None;

/// Order a table's current entries for printing: entries with a matching hint
/// (matched by key, a stable identity unlike an array index) print in their
/// recorded source order, and any new keys the hint doesn't know about are
/// appended afterward in lexicographic order.
fn order_table_entries<'a>(store: &DataStore, symbols: &SymbolTable, h: crate::value::Handle, hint: &'a HintNode) -> Vec<(String, DataNode, &'a HintNode)> {
    let by_key: std::collections::HashMap<&str, &HintNode> = match hint {
        HintNode::Table { entries, .. } => entries.iter().map(|(k, v)| (k.as_str(), v)).collect(),
        _ => Default::default(),
    };
    let pairs = table::iter(store, h).unwrap_or_default();
    let mut known = Vec::new();
    let mut unknown = Vec::new();
    for (symbol, value) in pairs {
        let Some(key) = symbols.resolve(symbol) else { continue };
        let key = key.to_string();
        match by_key.get(key.as_str()) {
            Some(child_hint) => known.push((key, value, *child_hint)),
            None => unknown.push((key, value, &NONE_HINT)),
        }
    }
    known.sort_by_key(|(_, _, h)| h.order());
    unknown.sort_by(|(a, _, _), (b, _, _)| a.cmp(b));
    known.append(&mut unknown);
    known
}

fn emit_leading_comment(out: &mut String, indent: &str, source: &[u8], hint: &HintNode, is_first: bool) {
    if let Some((start, end)) = hint.comment() {
        if !is_first {
            out.push('\n');
        }
        out.push_str(indent);
        out.push_str(std::str::from_utf8(&source[start..end]).unwrap_or(""));
        out.push('\n');
    }
}

fn is_numeric(node: &DataNode) -> bool {
    matches!(
        node,
        DataNode::Int32Small(_) | DataNode::Int32Big(_) | DataNode::UInt32(_) | DataNode::Int64(_) | DataNode::UInt64(_) | DataNode::Float31(_) | DataNode::Float32(_)
    )
}

/// `(effective width, count of direct container children)` for a value,
/// used by the single-line heuristic. Containers recurse into their own
/// total width; scalars contribute a small fixed or length-derived estimate.
fn measure(store: &DataStore, symbols: &SymbolTable, node: DataNode) -> (usize, usize) {
    match node {
        DataNode::Array(h) => {
            let items = array::iter(store, h).unwrap_or_default();
            let mut total = 2; // brackets
            let mut nested = 0;
            for item in &items {
                total += measure(store, symbols, *item).0 + 2;
                if item.is_container() {
                    nested += 1;
                }
            }
            (total, nested)
        }
        DataNode::Table(h) => {
            let pairs = table::iter(store, h).unwrap_or_default();
            let mut total = 2; // braces
            let mut nested = 0;
            for (symbol, value) in &pairs {
                let key_len = symbols.resolve(*symbol).map(str::len).unwrap_or(0);
                total += key_len + 2 + measure(store, symbols, *value).0 + 2;
                if value.is_container() {
                    nested += 1;
                }
            }
            (total, nested)
        }
        scalar => (scalar_width(store, symbols, scalar), 0),
    }
}

fn scalar_width(store: &DataStore, symbols: &SymbolTable, node: DataNode) -> usize {
    match node {
        DataNode::Null | DataNode::SpecialErase | DataNode::Boolean(_) => 2,
        DataNode::Int32Small(_) | DataNode::Int32Big(_) | DataNode::UInt32(_) | DataNode::Int64(_) | DataNode::UInt64(_) => 4,
        DataNode::Float31(_) | DataNode::Float32(_) => 4,
        DataNode::String(sh) => {
            let len = store.read_string(sh).map(str::len).unwrap_or(0);
            len / 4 + 1
        }
        DataNode::FilePath(fp) => {
            let len = symbols.resolve(fp.symbol).map(str::len).unwrap_or(0);
            len / 4 + 1
        }
        DataNode::Array(_) | DataNode::Table(_) => unreachable!("scalar_width called on a container"),
    }
}

fn format_scalar(store: &DataStore, symbols: &SymbolTable, node: DataNode) -> String {
    match node {
        DataNode::Null | DataNode::SpecialErase => "null".to_string(),
        DataNode::Boolean(b) => if b { "true" } else { "false" }.to_string(),
        DataNode::Int32Small(v) => v.to_string(),
        DataNode::Int32Big(h) => store.read_int32_big(h).unwrap_or(0).to_string(),
        DataNode::UInt32(h) => store.read_uint32(h).unwrap_or(0).to_string(),
        DataNode::Int64(h) => store.read_int64(h).unwrap_or(0).to_string(),
        DataNode::UInt64(h) => store.read_uint64(h).unwrap_or(0).to_string(),
        DataNode::Float31(v) => format_float(v),
        DataNode::Float32(h) => format_float(store.read_float32(h).unwrap_or(0.0)),
        DataNode::String(h) => escape_string(store.read_string(h).unwrap_or("")),
        DataNode::FilePath(fp) => escape_string(&file_path_url(fp, symbols)),
        DataNode::Array(_) | DataNode::Table(_) => unreachable!("format_scalar called on a container"),
    }
}

/// `NaN`/`Infinity`/`-Infinity` print unquoted, matching how the lexer reads
/// them back in; everything else prints as a plain decimal, switching to
/// exponential form outside a normal display range.
fn format_float(v: f32) -> String {
    if v.is_nan() {
        return "NaN".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() };
    }
    let mag = v.abs();
    if mag != 0.0 && !(1e-4..1e6).contains(&mag) {
        format!("{v:e}")
    } else {
        format!("{v}")
    }
}

fn file_path_url(fp: crate::value::FilePath, symbols: &SymbolTable) -> String {
    let name = symbols.resolve(fp.symbol).unwrap_or("");
    let ext = fp.file_type.extension();
    if ext.is_empty() {
        format!("{}://{}", fp.directory.scheme(), name)
    } else {
        format!("{}://{}.{}", fp.directory.scheme(), name, ext)
    }
}

fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::parser::ParseFlags;

    fn round_trip(src: &[u8]) -> String {
        let mut symbols = SymbolTable::new();
        let (store, hint) = super::super::parser::parse(src, &mut symbols, ParseFlags::default()).unwrap();
        print(&store, &symbols, src, &hint)
    }

    #[test]
    fn prints_nested_table_on_one_line_when_short() {
        let out = round_trip(br#"{"outer": {"a": 1, "b": 2}}"#);
        assert!(out.contains("{\"a\": 1, \"b\": 2}"));
    }

    #[test]
    fn root_container_is_always_multi_line() {
        let out = round_trip(br#"{"a": 1}"#);
        assert!(out.starts_with("{\n"));
        assert!(out.contains("  \"a\": 1"));
    }

    #[test]
    fn preserves_comment_on_round_trip() {
        let src = br#"{
  "a": 1,
  // keep this
  "b": 2
}"#;
        let out = round_trip(src);
        assert!(out.contains("// keep this"));
        let comment_line = out.lines().position(|l| l.contains("// keep this")).unwrap();
        let b_line = out.lines().position(|l| l.contains("\"b\"")).unwrap();
        assert!(b_line > comment_line);
    }

    #[test]
    fn new_keys_are_appended_lexicographically_after_known_order() {
        let mut symbols = SymbolTable::new();
        let (mut store, hint) = super::super::parser::parse(br#"{"b": 1, "a": 2}"#, &mut symbols, ParseFlags::default()).unwrap();
        let h = DataStore::expect_table(store.root()).unwrap();
        let z = symbols.intern("z");
        table::set(&mut store, h, z, DataNode::Int32Small(3)).unwrap();
        let out = print(&store, &symbols, br#"{"b": 1, "a": 2}"#, &hint);
        let b_pos = out.find("\"b\"").unwrap();
        let a_pos = out.find("\"a\"").unwrap();
        let z_pos = out.find("\"z\"").unwrap();
        assert!(b_pos < a_pos);
        assert!(a_pos < z_pos);
    }

    #[test]
    fn numeric_array_wraps_multiple_values_per_line() {
        let items: Vec<String> = (0..30).map(|i| i.to_string()).collect();
        let src = format!("[{}]", items.join(", "));
        let out = round_trip(src.as_bytes());
        assert!(out.lines().count() > 3, "expected wrapped numeric array, got:\n{out}");
    }
}
