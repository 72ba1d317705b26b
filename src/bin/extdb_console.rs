use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::Level;

use extdb::config::ExtensionConfig;
use extdb::extension::{DEFAULT_OUTPUT_SIZE, Extension};

#[derive(Parser, Debug)]
#[command(author, version, about = "Interactive console for the extdb middleware")]
struct Args {
    /// Configuration file; an empty configuration is used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Host output buffer size in bytes.
    #[arg(long, default_value_t = DEFAULT_OUTPUT_SIZE)]
    output_size: usize,
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_target(true)
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let config = match &args.config {
        Some(path) => ExtensionConfig::load(path).unwrap_or_else(|err| {
            eprintln!("failed to load {}: {err}", path.display());
            std::process::exit(1);
        }),
        None => ExtensionConfig::default(),
    };
    let ext = Extension::builder(Arc::new(config))
        .output_size(args.output_size)
        .build()
        .unwrap_or_else(|err| {
            eprintln!("failed to start: {err}");
            std::process::exit(1);
        });

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    for line in stdin.lock().lines() {
        let Ok(line) = line else {
            break;
        };
        let command = line.trim();
        if command.is_empty() {
            continue;
        }
        if command.eq_ignore_ascii_case("quit") {
            break;
        }
        let reply = ext.call(command);
        if writeln!(stdout, "{reply}").is_err() {
            break;
        }
    }
    ext.shutdown();
}
