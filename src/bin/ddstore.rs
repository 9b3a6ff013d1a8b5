use clap::Parser;
use ddstore::cli::{run, Cli};

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("ddstore: {err:#}");
        std::process::exit(1);
    }
}
