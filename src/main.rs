//! Instantiate a shader graph and write the generated shader source.
//!
//! Usage: `shadergraph <ENTRY_FILE> <ENTRY_FUNCTION> [-I DIR]... [-p NAME=VALUE]... [--config FILE] [-o FILE]`

use clap::Parser;
use shadergraph_core::{
    file_provider::SearchRules, instantiation::ParameterBinding, options::InstantiationOptions,
    InstantiationParameters, ShaderInstantiator,
};
use std::{fs, path::PathBuf, process};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "shadergraph")]
#[command(about = "Instantiate a shader graph into shader source")]
struct Args {
    /// Graph file containing the entry point
    entry_file: String,

    /// Name of the entry graph inside the file
    entry_function: String,

    /// Directory to search for graphs and shader headers, in order
    #[arg(short = 'I', long = "search-dir")]
    search_dirs: Vec<PathBuf>,

    /// Bind an instantiation parameter to a constant
    #[arg(short = 'p', long = "param", value_parser = parse_binding)]
    parameters: Vec<(String, String)>,

    /// JSON file with instantiation options
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the generated source here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn parse_binding(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got `{}`", s)),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_logging();

    let args = Args::parse();

    let options = match &args.config {
        Some(path) => match InstantiationOptions::from_json_file(path) {
            Ok(options) => options,
            Err(e) => {
                error!("Failed to read {}: {}", path.display(), e);
                process::exit(1);
            }
        },
        None => InstantiationOptions::default(),
    };

    let search_rules = if args.search_dirs.is_empty() {
        SearchRules::new().with_directory(".")
    } else {
        args.search_dirs
            .iter()
            .fold(SearchRules::new(), |rules, dir| rules.with_directory(dir))
    };

    let parameters: InstantiationParameters = args
        .parameters
        .iter()
        .map(|(name, value)| (name.clone(), ParameterBinding::constant(value)))
        .collect();

    let instantiator = ShaderInstantiator::with_options(options);
    let fragments = match instantiator.instantiate_file(
        &search_rules,
        &args.entry_file,
        &args.entry_function,
        &parameters,
    ) {
        Ok(fragments) => fragments,
        Err(e) => {
            error!("Instantiation failed: {}", e);
            process::exit(1);
        }
    };

    let source = fragments.concat();
    match &args.output {
        Some(path) => {
            if let Err(e) = fs::write(path, source) {
                error!("Failed to write {}: {}", path.display(), e);
                process::exit(1);
            }
            info!(
                "Wrote {} fragments to {}",
                fragments.len(),
                path.display()
            );
        }
        None => print!("{}", source),
    }
}
