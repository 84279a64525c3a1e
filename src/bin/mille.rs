extern crate arg_parser;
extern crate mille;
extern crate toml;

use std::path::Path;
use std::{env, fs, io, process};

use arg_parser::ArgParser;
use tracing_subscriber::EnvFilter;

use mille::Config;

fn main() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mille=info")),
        )
        .init();

    let mut parser = ArgParser::new(2)
        .add_opt("c", "config")
        .add_opt("o", "output-config");
    parser.parse(env::args());

    let config = if let Some(path) = parser.get_opt("config") {
        match Config::from_file(Path::new(&path)) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("mille: {err}");
                process::exit(1);
            }
        }
    } else {
        eprintln!("mille: no config given, use --config <path>");
        process::exit(1);
    };

    // Just output merged config and exit
    if let Some(path) = parser.get_opt("output-config") {
        let merged_toml = match toml::to_string_pretty(&config) {
            Ok(merged_toml) => merged_toml,
            Err(err) => {
                eprintln!("mille: failed to encode config: {err}");
                process::exit(1);
            }
        };
        if let Err(err) = fs::write(&path, merged_toml) {
            eprintln!("mille: {path}: failed to write: {err}");
            process::exit(1);
        }
        return;
    }

    // Everything the run needs must be present before the provider is queried.
    let settings = match config.settings() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("mille: {err}");
            process::exit(1);
        }
    };

    if let Err(err) = mille::sync(&settings) {
        eprintln!("mille: failed to sync: {err:#}");
        process::exit(1);
    }
}
