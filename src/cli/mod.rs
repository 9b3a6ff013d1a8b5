//! Subcommand dispatch for the `ddstore` binary.

pub mod args;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::binary;
use crate::commands::{self, CommandSource};
use crate::cook::CookDatabase;
use crate::diff;
use crate::error::CommandError;
use crate::hash;
use crate::hint;
use crate::json::{self, ParseFlags};
use crate::platform::TargetPlatform;
use crate::symbol::SymbolTable;
use crate::value::DataNode;

pub use args::{Cli, Command};

/// Reads `$include` targets from the filesystem, relative to a fixed root.
struct FsCommandSource {
    root: PathBuf,
}

impl CommandSource for FsCommandSource {
    fn read(&mut self, relative_path: &str) -> Result<Vec<u8>, CommandError> {
        std::fs::read(self.root.join(relative_path)).map_err(|e| CommandError { command_index: 0, message: format!("reading {relative_path}: {e}") })
    }
}

pub fn run(cli: Cli) -> Result<()> {
    crate::cook::notify::set_display_level(cli.verbose);
    match cli.command {
        Command::Parse { input, allow_duplicate_keys } => cmd_parse(&input, allow_duplicate_keys),
        Command::Print { input } => cmd_print(&input),
        Command::Save { input, output, compact } => cmd_save(&input, &output, compact),
        Command::Load { input } => cmd_load(&input),
        Command::Verify { input } => cmd_verify(&input),
        Command::Diff { a, b } => cmd_diff(&a, &b),
        Command::Commands { root, entry } => cmd_commands(&root, &entry),
        Command::Cook { artifact, source } => cmd_cook(&artifact, &source),
    }
}

fn cmd_parse(input: &Path, allow_duplicate_keys: bool) -> Result<()> {
    let bytes = std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let mut symbols = SymbolTable::new();
    let flags = ParseFlags { log_errors: true, allow_duplicate_keys, ..ParseFlags::default() };
    let store = json::parse(&bytes, &mut symbols, flags).map_err(|e| anyhow::anyhow!("{e}"))?;
    let digest = hash::canonical_hash(&store, &symbols, store.root());
    println!("{}", hex_string(&digest));
    Ok(())
}

fn cmd_print(input: &Path) -> Result<()> {
    let bytes = std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let mut symbols = SymbolTable::new();
    let (store, tree) = hint::parse(&bytes, &mut symbols, ParseFlags::default()).map_err(|e| anyhow::anyhow!("{e}"))?;
    print!("{}", hint::print(&store, &symbols, &bytes, &tree));
    Ok(())
}

fn cmd_save(input: &Path, output: &Path, compact: bool) -> Result<()> {
    let bytes = std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let mut symbols = SymbolTable::new();
    let store = json::parse(&bytes, &mut symbols, ParseFlags::default()).map_err(|e| anyhow::anyhow!("{e}"))?;
    let options = binary::SaveOptions { compact_containers: compact, target_platform: TargetPlatform::current() };
    let wire = binary::save(&store, &symbols, options);
    std::fs::write(output, wire).with_context(|| format!("writing {}", output.display()))?;
    Ok(())
}

fn cmd_load(input: &Path) -> Result<()> {
    let bytes = std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let mut symbols = SymbolTable::new();
    let store = binary::load(&bytes, &mut symbols).map_err(|e| anyhow::anyhow!("{e}"))?;
    print!("{}", hint::print(&store, &symbols, &[], &hint::HintNode::None));
    Ok(())
}

fn cmd_verify(input: &Path) -> Result<()> {
    let bytes = std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let mut symbols = SymbolTable::new();
    let store = binary::load(&bytes, &mut symbols).map_err(|e| anyhow::anyhow!("{e}"))?;
    match binary::verify_integrity(&store) {
        Ok(()) => {
            println!("ok");
            Ok(())
        }
        Err(e) => bail!("integrity check failed: {e}"),
    }
}

fn cmd_diff(a_path: &Path, b_path: &Path) -> Result<()> {
    let a_text = std::fs::read_to_string(a_path).with_context(|| format!("reading {}", a_path.display()))?;
    let b_text = std::fs::read_to_string(b_path).with_context(|| format!("reading {}", b_path.display()))?;
    let combined = format!("[{a_text},{b_text}]");
    let mut symbols = SymbolTable::new();
    let mut store = json::parse(combined.as_bytes(), &mut symbols, ParseFlags::default()).map_err(|e| anyhow::anyhow!("{e}"))?;
    let DataNode::Array(pair) = store.root() else { bail!("internal error: combined document root is not an array") };
    let items = crate::store::array::iter(&store, pair).map_err(|_| anyhow::anyhow!("internal error: combined document shape"))?;
    let [a_node, b_node] = items.as_slice() else { bail!("internal error: combined document did not hold exactly two values") };
    let (a_node, b_node) = (*a_node, *b_node);

    let patch = diff::diff(&mut store, &symbols, a_node, b_node);
    store.set_root(patch);
    print!("{}", hint::print(&store, &symbols, &[], &hint::HintNode::None));
    Ok(())
}

fn cmd_commands(root: &Path, entry: &str) -> Result<()> {
    let mut symbols = SymbolTable::new();
    let mut source = FsCommandSource { root: root.to_path_buf() };
    let store = commands::evaluate(entry, &mut symbols, &mut source).map_err(|e| anyhow::anyhow!("{e}"))?;
    print!("{}", hint::print(&store, &symbols, &[], &hint::HintNode::None));
    Ok(())
}

fn cmd_cook(artifact: &Path, source: &Path) -> Result<()> {
    let db = CookDatabase::new();
    let up_to_date = db.check_up_to_date_one_to_one(artifact, source)?;
    println!("{}", if up_to_date { "up to date" } else { "stale" });
    Ok(())
}

fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
