//! Interactive REPL demo: opens one local shell and forwards stdin lines
//! to it, printing `(output, exit_code)` for each. This is ops/demo
//! surface over the public `Session`/`Service` API, not a protocol
//! binding -- any other embedder would call the same methods.

use anyhow::{Context, Result};
use shellpipe::{Options, Service};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!("starting shellpipe REPL v{}", env!("CARGO_PKG_VERSION"));

    let service = Service::local(Options::default());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        match service.run(&line).await {
            Ok(result) => {
                print!("{}", result.output);
                println!("(exit {})", result.exit_code);
                if let Some(stderr) = result.stderr {
                    eprintln!("{stderr}");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, command = %line, "command failed");
                eprintln!("error: {e}");
            }
        }
    }

    service.close().await.context("closing session")?;
    tracing::info!("shellpipe REPL exiting");
    Ok(())
}
