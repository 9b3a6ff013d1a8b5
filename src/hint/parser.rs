//! A second JSON parser, alongside [`crate::json::parser`], that also builds
//! a [`HintNode`] tree: per-value source order, comment spans, and identity
//! hashes. Plain parsing (command files, schema documents, anything that
//! doesn't round-trip back to text) has no use for that bookkeeping, so it
//! stays in its own parser rather than being bolted onto the fast path.

use super::node::{array_hash, scalar_hash, table_hash, HintNode};
use crate::error::ParseError;
use crate::json::lexer::{Lexer, Token};
use crate::json::parser::ParseFlags;
use crate::platform::{DirectoryTag, FileTypeTag};
use crate::store::{array, table, DataStore};
use crate::symbol::SymbolTable;
use crate::value::{DataNode, INT32_SMALL_MAX, INT32_SMALL_MIN};

/// Parse `bytes` into both a [`DataStore`] and a parallel [`HintNode`] tree.
pub fn parse(bytes: &[u8], symbols: &mut SymbolTable, flags: ParseFlags) -> Result<(DataStore, HintNode), ParseError> {
    let mut store = DataStore::new();
    let (root, hint) = {
        let mut guard = store.suppress_gc();
        let mut parser = Parser::new(bytes, flags);
        let (value, hint) = parser.parse_value(guard.store(), symbols, 0)?;
        parser.expect_eof()?;
        (value, hint)
    };
    store.set_root(root);
    Ok((store, hint))
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    peeked: Option<crate::json::lexer::Spanned>,
    pending_comment: Option<(usize, usize)>,
    flags: ParseFlags,
}

impl<'a> Parser<'a> {
    fn new(bytes: &'a [u8], flags: ParseFlags) -> Parser<'a> {
        Parser { lexer: Lexer::new(bytes), peeked: None, pending_comment: None, flags }
    }

    fn peek(&mut self) -> Result<&crate::json::lexer::Spanned, ParseError> {
        if self.peeked.is_none() {
            let spanned = self.lexer.next_token()?;
            if let Some(span) = self.lexer.last_comment() {
                self.pending_comment = Some(span);
            }
            self.peeked = Some(spanned);
        }
        Ok(self.peeked.as_ref().unwrap())
    }

    fn bump(&mut self) -> Result<crate::json::lexer::Spanned, ParseError> {
        match self.peeked.take() {
            Some(t) => Ok(t),
            None => {
                let spanned = self.lexer.next_token()?;
                if let Some(span) = self.lexer.last_comment() {
                    self.pending_comment = Some(span);
                }
                Ok(spanned)
            }
        }
    }

    fn take_comment(&mut self) -> Option<(usize, usize)> {
        self.pending_comment.take()
    }

    fn expect_eof(&mut self) -> Result<(), ParseError> {
        let next = self.bump()?;
        if next.token == Token::Eof {
            Ok(())
        } else {
            Err(ParseError::new(next.pos, "trailing data after top-level value"))
        }
    }

    fn parse_value(&mut self, store: &mut DataStore, symbols: &mut SymbolTable, order: u32) -> Result<(DataNode, HintNode), ParseError> {
        self.peek()?;
        let comment = self.take_comment();
        let next = self.peek()?.clone();
        match next.token {
            Token::LBrace => self.parse_object(store, symbols, order, comment),
            Token::LBracket => self.parse_array(store, symbols, order, comment),
            Token::String(_) => {
                self.bump()?;
                let Token::String(s) = next.token else { unreachable!() };
                let value = classify_string(self.flags, store, symbols, &s);
                let hash = scalar_hash(store, symbols, value);
                Ok((value, HintNode::Leaf { order, comment, hash }))
            }
            Token::Number(v) => {
                self.bump()?;
                let value = encode_number(store, v);
                let hash = scalar_hash(store, symbols, value);
                Ok((value, HintNode::Leaf { order, comment, hash }))
            }
            Token::True => {
                self.bump()?;
                let value = DataNode::Boolean(true);
                Ok((value, HintNode::Leaf { order, comment, hash: scalar_hash(store, symbols, value) }))
            }
            Token::False => {
                self.bump()?;
                let value = DataNode::Boolean(false);
                Ok((value, HintNode::Leaf { order, comment, hash: scalar_hash(store, symbols, value) }))
            }
            Token::Null => {
                self.bump()?;
                let value = if self.flags.null_as_special_erase { DataNode::SpecialErase } else { DataNode::Null };
                Ok((value, HintNode::Leaf { order, comment, hash: scalar_hash(store, symbols, value) }))
            }
            _ => Err(ParseError::new(next.pos, "expected a value")),
        }
    }

    fn parse_array(
        &mut self,
        store: &mut DataStore,
        symbols: &mut SymbolTable,
        order: u32,
        comment: Option<(usize, usize)>,
    ) -> Result<(DataNode, HintNode), ParseError> {
        let open = self.bump()?; // consume '['
        let h = store.alloc_array_container(0);
        let mut children = Vec::new();
        let mut hashes = Vec::new();
        if self.peek()?.token == Token::RBracket {
            self.bump()?;
            let value = DataNode::Array(h);
            return Ok((value, HintNode::Array { order, comment, hash: array_hash(&hashes), children }));
        }
        let mut index = 0u32;
        loop {
            let (value, child_hint) = self.parse_value(store, symbols, index)?;
            array::push(store, h, value).map_err(|e| ParseError::new(open.pos, e.to_string()))?;
            hashes.push(child_hint.hash().unwrap_or(0));
            children.push(child_hint);
            index += 1;
            let sep = self.bump()?;
            match sep.token {
                Token::Comma => {
                    if self.peek()?.token == Token::RBracket {
                        self.bump()?;
                        break;
                    }
                }
                Token::RBracket => break,
                _ => return Err(ParseError::new(sep.pos, "expected ',' or ']'")),
            }
        }
        let value = DataNode::Array(h);
        Ok((value, HintNode::Array { order, comment, hash: array_hash(&hashes), children }))
    }

    fn parse_object(
        &mut self,
        store: &mut DataStore,
        symbols: &mut SymbolTable,
        order: u32,
        comment: Option<(usize, usize)>,
    ) -> Result<(DataNode, HintNode), ParseError> {
        let open = self.bump()?; // consume '{'
        let h = store.alloc_table_container(crate::store::config::MIN_TABLE_CAPACITY);
        let mut entries: Vec<(String, HintNode)> = Vec::new();
        if self.peek()?.token == Token::RBrace {
            self.bump()?;
            let value = DataNode::Table(h);
            return Ok((value, HintNode::Table { order, comment, hash: table_hash(vec![]), entries }));
        }
        let mut index = 0u32;
        loop {
            self.peek()?;
            let key_comment = self.take_comment();
            let key_tok = self.bump()?;
            let Token::String(key) = key_tok.token else {
                return Err(ParseError::new(key_tok.pos, "expected a string table key"));
            };
            let colon = self.bump()?;
            if colon.token != Token::Colon {
                return Err(ParseError::new(colon.pos, "expected ':' after table key"));
            }
            let symbol = symbols.intern(&key);
            if !self.flags.allow_duplicate_keys
                && table::contains(store, h, symbol).map_err(|e| ParseError::new(key_tok.pos, e.to_string()))?
            {
                return Err(ParseError::new(key_tok.pos, format!("duplicate table key '{key}'")));
            }
            let (value, mut child_hint) = self.parse_value(store, symbols, index)?;
            if key_comment.is_some() && child_hint.comment().is_none() {
                if let HintNode::Leaf { comment, .. } | HintNode::Array { comment, .. } | HintNode::Table { comment, .. } = &mut child_hint {
                    *comment = key_comment;
                }
            }
            table::set(store, h, symbol, value).map_err(|e| ParseError::new(key_tok.pos, e.to_string()))?;
            entries.push((key, child_hint));
            index += 1;
            let sep = self.bump()?;
            match sep.token {
                Token::Comma => {
                    if self.peek()?.token == Token::RBrace {
                        self.bump()?;
                        break;
                    }
                }
                Token::RBrace => break,
                _ => return Err(ParseError::new(sep.pos, "expected ',' or '}'")),
            }
        }
        let keyed: Vec<(&str, u64)> = entries.iter().map(|(k, v)| (k.as_str(), v.hash().unwrap_or(0))).collect();
        let hash = table_hash(keyed);
        let value = DataNode::Table(h);
        Ok((value, HintNode::Table { order, comment, hash, entries }))
    }
}

fn classify_string(flags: ParseFlags, store: &mut DataStore, symbols: &mut SymbolTable, s: &str) -> DataNode {
    if !flags.leave_file_path_as_string {
        if let Some((directory, rest)) = DirectoryTag::classify(s) {
            if is_valid_relative_path(rest) {
                let (file_type, stem) = FileTypeTag::classify(rest);
                let symbol = symbols.intern(stem);
                return DataNode::FilePath(crate::value::FilePath { directory, file_type, symbol });
            }
        }
    }
    DataNode::String(store.alloc_string(s))
}

fn is_valid_relative_path(s: &str) -> bool {
    if s.is_empty() || s.starts_with('/') || s.starts_with('\\') {
        return false;
    }
    s.split(['/', '\\']).all(|part| part != ".." && !part.is_empty())
}

fn encode_number(store: &mut DataStore, v: f64) -> DataNode {
    if v.is_finite() && v.fract() == 0.0 {
        if v >= INT32_SMALL_MIN as f64 && v <= INT32_SMALL_MAX as f64 {
            return DataNode::Int32Small(v as i32);
        }
        if v >= i32::MIN as f64 && v <= i32::MAX as f64 {
            return DataNode::Int32Big(store.alloc_int32_big(v as i32));
        }
        if v >= 0.0 && v <= u32::MAX as f64 {
            return DataNode::UInt32(store.alloc_uint32(v as u32));
        }
        if v >= i64::MIN as f64 && v <= i64::MAX as f64 {
            return DataNode::Int64(store.alloc_int64(v as i64));
        }
        if v >= 0.0 && v <= u64::MAX as f64 {
            return DataNode::UInt64(store.alloc_uint64(v as u64));
        }
    }
    let f = crate::value::canonicalize_float(v as f32);
    if f.to_bits() & 1 == 0 {
        DataNode::Float31(f)
    } else {
        DataNode::Float32(store.alloc_float32(f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_indices_follow_source_order() {
        let mut symbols = SymbolTable::new();
        let (_, hint) = parse(br#"{"a": 1, "b": 2}"#, &mut symbols, ParseFlags::default()).unwrap();
        let HintNode::Table { entries, .. } = hint else { panic!("expected table hint") };
        assert_eq!(entries[0].0, "a");
        assert_eq!(entries[0].1.order(), 0);
        assert_eq!(entries[1].0, "b");
        assert_eq!(entries[1].1.order(), 1);
    }

    #[test]
    fn leading_comment_attaches_to_following_value() {
        let mut symbols = SymbolTable::new();
        let src = b"[1, // keep me\n2]";
        let (_, hint) = parse(src, &mut symbols, ParseFlags::default()).unwrap();
        let HintNode::Array { children, .. } = hint else { panic!("expected array hint") };
        assert_eq!(children[0].comment(), None);
        let (start, end) = children[1].comment().expect("comment on second element");
        assert_eq!(&std::str::from_utf8(src).unwrap()[start..end], "// keep me");
    }

    #[test]
    fn array_and_table_hashes_match_resolve_hash_on_the_built_value() {
        let mut symbols = SymbolTable::new();
        let (store, hint) = parse(br#"{"a": [1, 2]}"#, &mut symbols, ParseFlags::default()).unwrap();
        let resolved = super::super::node::resolve_hash(&store, &symbols, store.root());
        assert_eq!(hint.hash(), Some(resolved));
    }
}
