mod cli_args;
mod session;
mod source_loader;

use anyhow::Result;
use clap::Parser;

use cli_args::Cli;
use ds_api::{create_engine_from_sources, CreateEngineOptions};

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let scripts_dir = source_loader::resolve_scripts_dir(&cli.scripts_dir)?;
    let sources = source_loader::read_sources_from_dir(&scripts_dir)?;
    log::info!("Loaded {} script file(s)", sources.len());

    let (mut engine, diagnostics) = create_engine_from_sources(CreateEngineOptions {
        sources,
        current_language: cli.language.clone(),
        default_language: None,
    });

    let problem_count: usize = diagnostics.values().map(Vec::len).sum();
    if problem_count > 0 {
        eprintln!("{} parser diagnostic(s):", problem_count);
        for (source, found) in &diagnostics {
            for diagnostic in found {
                eprintln!("[{}] {}", source, diagnostic);
            }
        }
    }

    if cli.dump_nodes {
        println!("{}", serde_json::to_string_pretty(&engine.nodes_snapshot())?);
    }

    if let Some(path) = &cli.variables_file {
        session::load_variables(&mut engine, path)?;
    }

    session::run_interactive(&mut engine, &cli.entry_node)?;

    if let Some(path) = &cli.variables_file {
        session::save_variables(&engine, path)?;
    }

    Ok(())
}
