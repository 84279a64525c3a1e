/// Print every group of the configured pool with its gid and enabled members
extern crate arg_parser;
extern crate mille;

use std::path::Path;
use std::{env, io, process};

use arg_parser::ArgParser;
use tracing_subscriber::EnvFilter;

use mille::{Config, Directory, SnapshotProvider};

fn main() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mille=warn")),
        )
        .init();

    let mut parser = ArgParser::new(1).add_opt("c", "config");
    parser.parse(env::args());

    let Some(path) = parser.get_opt("config") else {
        eprintln!("mille-list-groups: no config given, use --config <path>");
        process::exit(1);
    };

    let settings = match Config::from_file(Path::new(&path)).and_then(|config| config.settings()) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("mille-list-groups: {err}");
            process::exit(1);
        }
    };

    let directory = match SnapshotProvider::from_file(&settings.snapshot, settings.page_size)
        .and_then(|provider| Directory::load(provider, settings.user_pool.as_str()))
    {
        Ok(directory) => directory,
        Err(err) => {
            eprintln!("mille-list-groups: {err}");
            process::exit(1);
        }
    };

    println!("pool {}", directory.pool());
    for (groupname, members) in directory.groups() {
        let gid = directory
            .group_owner(groupname)
            .and_then(|owner| owner.attribute(mille::directory::UID_ATTRIBUTE))
            .unwrap_or("-");
        let access = if settings.groups_with_access.contains(groupname) {
            " (access)"
        } else {
            ""
        };
        println!("{} gid={}{}", groupname, gid, access);
        for user in members {
            if user.is_group_owner() {
                continue;
            }
            println!(
                "\t{} uid={} groups={}",
                user.username,
                user.attribute(mille::directory::UID_ATTRIBUTE).unwrap_or("-"),
                directory
                    .groups_of(&user.username)
                    .map(|groups| groups.iter().cloned().collect::<Vec<_>>().join(","))
                    .unwrap_or_default()
            );
        }
    }
}
