//! Argument definitions

use clap::{value_parser, Arg, ArgAction, Command};
use std::path::PathBuf;

fn pipeline_arg() -> Arg {
    Arg::new("pipeline")
        .long("pipeline")
        .short('p')
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Pipeline definition file (.json, .yaml, .yml or .toml)")
}

fn input_arg() -> Arg {
    Arg::new("input")
        .long("input")
        .short('i')
        .value_parser(value_parser!(PathBuf))
        .help("Record file; reads stdin when omitted")
}

/// The `reshape` command tree
#[must_use]
pub fn build_cli() -> Command {
    Command::new("reshape")
        .version(crate::VERSION)
        .about("Upgrade stored records through a declared migration pipeline")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("format")
                .long("format")
                .global(true)
                .value_parser(["json", "yaml"])
                .help("Format for stdin/stdout when no file extension applies"),
        )
        .subcommand(
            Command::new("migrate")
                .about("Migrate records to the current shape")
                .arg(pipeline_arg())
                .arg(input_arg())
                .arg(
                    Arg::new("keep-markers")
                        .long("keep-markers")
                        .action(ArgAction::SetTrue)
                        .help("Keep marker keys in the output"),
                )
                .arg(
                    Arg::new("validate")
                        .long("validate")
                        .action(ArgAction::SetTrue)
                        .help("Validate migrated records against the ending schema"),
                ),
        )
        .subcommand(
            Command::new("stamp")
                .about("Stamp records with the pipeline position for storage")
                .arg(pipeline_arg())
                .arg(input_arg()),
        )
        .subcommand(
            Command::new("inspect")
                .about("Show mutators, known fields, renames and released versions")
                .arg(pipeline_arg()),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_tree_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn parses_migrate_flags() {
        let matches = build_cli()
            .try_get_matches_from([
                "reshape",
                "migrate",
                "--pipeline",
                "p.yaml",
                "--keep-markers",
                "--format",
                "yaml",
            ])
            .unwrap();
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "migrate");
        assert!(args.get_flag("keep-markers"));
        assert!(!args.get_flag("validate"));
        assert_eq!(args.get_one::<String>("format").map(String::as_str), Some("yaml"));
        assert!(args.get_one::<PathBuf>("input").is_none());
    }

    #[test]
    fn pipeline_is_required() {
        assert!(build_cli()
            .try_get_matches_from(["reshape", "inspect"])
            .is_err());
    }
}
