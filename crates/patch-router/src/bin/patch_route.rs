//! `patch-route` — print the events an update would emit.
//!
//! Usage:
//!   patch-route '<next-state-json>' ['<schema-json>'] ['<item-id-properties-json>']
//!
//! The current state is read from stdin. Set `RUST_LOG=trace` to see the
//! router's own tracing output on stderr.

use std::io::{self, Read, Write};

use patch_router::cli::route_json;
use tracing_subscriber::EnvFilter;

fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init();

    let args: Vec<String> = std::env::args().collect();
    let next = match args.get(1) {
        Some(n) => n.clone(),
        None => {
            eprintln!("First argument must be the next state as a JSON object.");
            std::process::exit(1);
        }
    };

    let mut buf = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut buf) {
        eprintln!("{e}");
        std::process::exit(1);
    }

    match route_json(buf.trim(), &next, args.get(2).map(String::as_str), args.get(3).map(String::as_str)) {
        Ok(result) => {
            let mut stdout = io::stdout();
            if let Err(e) = stdout.write_all(result.as_bytes()).and_then(|_| stdout.write_all(b"\n")) {
                eprintln!("{e}");
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
