//! Recursive-descent parser building a [`DataStore`] directly: each JSON
//! value is built bottom-up and attached to its parent via the ordinary
//! mutation API (see [`crate::store::array`], [`crate::store::table`]), so
//! the parser never touches the arena itself.

use super::lexer::{Lexer, Token};
use crate::error::{ParseError, SourcePos};
use crate::platform::{DirectoryTag, FileTypeTag};
use crate::store::{array, table, DataStore};
use crate::symbol::SymbolTable;
use crate::value::{canonicalize_float, DataNode, INT32_SMALL_MAX, INT32_SMALL_MIN};

/// Behaviour switches the caller selects per parse.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseFlags {
    /// Whether parse errors are also sent to the log, rather than only returned.
    pub log_errors: bool,
    /// Allow a table key to appear more than once (last write wins) instead
    /// of failing the parse.
    pub allow_duplicate_keys: bool,
    /// Map JSON `null` to [`DataNode::SpecialErase`] instead of
    /// [`DataNode::Null`] — used when parsing a diff/patch document.
    pub null_as_special_erase: bool,
    /// Disable `scheme://...` string classification, leaving every string a
    /// plain [`DataNode::String`]. Used by tools that want the literal text.
    pub leave_file_path_as_string: bool,
}

/// Parse `bytes` into a fresh store. Returns the first structural or lexical
/// error encountered; the flag set governs duplicate-key handling, the
/// `null`/`SpecialErase` mapping, and `FilePath` string classification.
pub fn parse(bytes: &[u8], symbols: &mut SymbolTable, flags: ParseFlags) -> Result<DataStore, ParseError> {
    let mut store = DataStore::new();
    let root = {
        let mut guard = store.suppress_gc();
        let mut parser = Parser::new(bytes, flags);
        let value = parser.parse_value(guard.store(), symbols)?;
        parser.expect_eof()?;
        value
    };
    store.set_root(root);
    Ok(store)
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    peeked: Option<super::lexer::Spanned>,
    flags: ParseFlags,
}

impl<'a> Parser<'a> {
    fn new(bytes: &'a [u8], flags: ParseFlags) -> Parser<'a> {
        Parser { lexer: Lexer::new(bytes), peeked: None, flags }
    }

    fn peek(&mut self) -> Result<&super::lexer::Spanned, ParseError> {
        if self.peeked.is_none() {
            self.peeked = Some(self.lexer.next_token()?);
        }
        Ok(self.peeked.as_ref().unwrap())
    }

    fn bump(&mut self) -> Result<super::lexer::Spanned, ParseError> {
        match self.peeked.take() {
            Some(t) => Ok(t),
            None => self.lexer.next_token(),
        }
    }

    fn expect_eof(&mut self) -> Result<(), ParseError> {
        let next = self.bump()?;
        if next.token == Token::Eof {
            Ok(())
        } else {
            Err(ParseError::new(next.pos, "trailing data after top-level value"))
        }
    }

    fn parse_value(&mut self, store: &mut DataStore, symbols: &mut SymbolTable) -> Result<DataNode, ParseError> {
        let next = self.peek()?.clone();
        match next.token {
            Token::LBrace => self.parse_object(store, symbols),
            Token::LBracket => self.parse_array(store, symbols),
            Token::String(_) => {
                self.bump()?;
                let Token::String(s) = next.token else { unreachable!() };
                Ok(self.classify_string(store, symbols, &s))
            }
            Token::Number(v) => {
                self.bump()?;
                Ok(encode_number(store, v))
            }
            Token::True => {
                self.bump()?;
                Ok(DataNode::Boolean(true))
            }
            Token::False => {
                self.bump()?;
                Ok(DataNode::Boolean(false))
            }
            Token::Null => {
                self.bump()?;
                Ok(if self.flags.null_as_special_erase {
                    DataNode::SpecialErase
                } else {
                    DataNode::Null
                })
            }
            _ => Err(ParseError::new(next.pos, "expected a value")),
        }
    }

    fn parse_array(&mut self, store: &mut DataStore, symbols: &mut SymbolTable) -> Result<DataNode, ParseError> {
        let open = self.bump()?; // consume '['
        let h = store.alloc_array_container(0);
        if self.peek()?.token == Token::RBracket {
            self.bump()?;
            return Ok(DataNode::Array(h));
        }
        loop {
            let value = self.parse_value(store, symbols)?;
            array::push(store, h, value).map_err(|e| ParseError::new(open.pos, e.to_string()))?;
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
        Ok(DataNode::Array(h))
    }

    fn parse_object(&mut self, store: &mut DataStore, symbols: &mut SymbolTable) -> Result<DataNode, ParseError> {
        let open = self.bump()?; // consume '{'
        let h = store.alloc_table_container(crate::store::config::MIN_TABLE_CAPACITY);
        if self.peek()?.token == Token::RBrace {
            self.bump()?;
            return Ok(DataNode::Table(h));
        }
        loop {
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
            let value = self.parse_value(store, symbols)?;
            table::set(store, h, symbol, value).map_err(|e| ParseError::new(key_tok.pos, e.to_string()))?;
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
        let _ = open;
        Ok(DataNode::Table(h))
    }

    fn classify_string(&self, store: &mut DataStore, symbols: &mut SymbolTable, s: &str) -> DataNode {
        if !self.flags.leave_file_path_as_string {
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
}

/// A relative path has no leading separator, is non-empty, and has no `..`
/// component (which would escape the content tree it is relative to).
fn is_valid_relative_path(s: &str) -> bool {
    if s.is_empty() || s.starts_with('/') || s.starts_with('\\') {
        return false;
    }
    s.split(['/', '\\']).all(|part| part != ".." && !part.is_empty())
}

/// Classify a JSON number literal into the narrowest [`DataNode`] variant
/// that represents it exactly, downcasting integer-valued floats to an
/// integer type so that e.g. `2` and `2.0` compare equal under canonical
/// hashing.
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
    let f = canonicalize_float(v as f32);
    if f.to_bits() & 1 == 0 {
        DataNode::Float31(f)
    } else {
        DataNode::Float32(store.alloc_float32(f))
    }
}
