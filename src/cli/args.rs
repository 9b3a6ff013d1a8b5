//! `clap`-derive argument parsing for the `ddstore` binary.
//!
//! One subcommand per top-level operation: each corresponds to a single
//! library entry point (parse, print, save, load, verify, diff, evaluate
//! a command document, or check a cook artifact against its source).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "ddstore", about = "Inspect and transform DataStore documents")]
pub struct Cli {
    /// Verbosity: 0 = silent, 1 = errors only, 2 = normal, 3 = verbose.
    #[arg(short, long, global = true, default_value_t = 2)]
    pub verbose: u32,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse a JSON/command-DSL document and print its canonical hash.
    Parse {
        input: PathBuf,
        /// Treat duplicate table keys as last-write-wins instead of an error.
        #[arg(long)]
        allow_duplicate_keys: bool,
    },
    /// Parse a JSON document and pretty-print it back out, preserving
    /// comments and element order where possible.
    Print { input: PathBuf },
    /// Parse a JSON document and write it to the binary format.
    Save {
        input: PathBuf,
        output: PathBuf,
        /// Compact containers to their exact size before writing.
        #[arg(long)]
        compact: bool,
    },
    /// Load a binary document and pretty-print it as JSON.
    Load { input: PathBuf },
    /// Run the binary loader's post-load integrity walk.
    Verify { input: PathBuf },
    /// Diff two JSON documents and print the patch as JSON.
    Diff { a: PathBuf, b: PathBuf },
    /// Evaluate a command-DSL document rooted at `entry`, relative to `root`.
    Commands { root: PathBuf, entry: String },
    /// Check whether a one-to-one cooked artifact is stale relative to its
    /// declared source.
    Cook { artifact: PathBuf, source: PathBuf },
}
