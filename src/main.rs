use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use fernc::analyze_buffer;
use fernc::text::TextBuffer;

/// Fern compiler front-end
#[derive(Parser)]
#[command(name = "fernc", version, about)]
struct Cli {
    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a Fern source file, reporting diagnostics in source order
    Compile {
        /// Path to the source file
        path: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(if cli.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        })
        .format_timestamp(None)
        .format_target(false)
        .init();

    match cli.command {
        Commands::Compile { path } => {
            let source = match std::fs::read_to_string(&path) {
                Ok(source) => source,
                Err(err) => {
                    eprintln!("error: failed to read {}: {}", path.display(), err);
                    return ExitCode::FAILURE;
                }
            };
            let buffer = TextBuffer::new(&path, source);
            let (_, diags) = analyze_buffer(&buffer);

            for diagnostic in diags.iter() {
                let pos = buffer.pos(diagnostic.span().start);
                eprintln!("{}:{}: error: {}", path.display(), pos, diagnostic);
            }

            if diags.is_empty() {
                ExitCode::SUCCESS
            } else {
                eprintln!("{} error{} found", diags.len(), if diags.len() == 1 { "" } else { "s" });
                ExitCode::FAILURE
            }
        }
    }
}
