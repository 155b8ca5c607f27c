// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: configuration file
fn config_arg() -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .value_name("PATH")
        .default_value("adaptive.toml")
        .help("Configuration file")
}

fn build_cli() -> Command {
    Command::new("adaptive")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Adaptive Imports Contributors")
        .about("Inspect flag-gated adaptive module variants")
        .subcommand_required(false)
        .subcommand(
            Command::new("flag-sets")
                .about("List the declared flag sets, most specific first")
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("matches")
                .about("Show the variants of a module")
                .arg(Arg::new("file").required(true).help("Module file"))
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("pick")
                .about("Show the variant selected for an active flag set")
                .arg(Arg::new("file").required(true).help("Module file"))
                .arg(
                    Arg::new("flags")
                        .short('f')
                        .long("flags")
                        .default_value("")
                        .help("Active flags, dot-separated (e.g. mobile.ios)"),
                )
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "zsh", "fish", "powershell", "elvish"])
                        .help("Shell type"),
                ),
        )
}

fn main() -> std::io::Result<()> {
    println!("cargo:rerun-if-changed=build.rs");

    let Some(out_dir) = env::var_os("OUT_DIR") else {
        return Ok(());
    };

    let mut page = Vec::new();
    Man::new(build_cli()).render(&mut page)?;
    fs::write(PathBuf::from(out_dir).join("adaptive.1"), page)
}
