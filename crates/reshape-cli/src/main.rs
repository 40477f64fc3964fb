use anyhow::Result;
use clap::ArgMatches;
use reshape_cli::{
    build_cli, encode_records, inspect, load_evolver, migrate_records, read_records,
    select_codec, stamp_records, CliConfig, MigrateOptions,
};
use reshape_codec::default_codecs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() {
    let matches = build_cli().get_matches();

    let config = match load_config(&matches) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.effective_log_filter()))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&matches, &config) {
        tracing::error!(error = %e, "command failed");
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn load_config(matches: &ArgMatches) -> Result<CliConfig> {
    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::new(),
    };
    Ok(config)
}

fn run(matches: &ArgMatches, config: &CliConfig) -> Result<()> {
    let registry = default_codecs();
    let format = matches
        .get_one::<String>("format")
        .map_or(config.default_format.as_str(), String::as_str);

    match matches.subcommand() {
        Some(("migrate", args)) => {
            let evolver = load_evolver(pipeline_path(args)?)?;
            let input = args.get_one::<PathBuf>("input").map(PathBuf::as_path);
            let codec = select_codec(&registry, input, format)?;

            let options = MigrateOptions {
                strip_markers: config.strip_markers && !args.get_flag("keep-markers"),
                validate: args.get_flag("validate"),
            };
            let (records, shape) = read_records(input, codec)?;
            let count = records.len();
            let migrated = migrate_records(&evolver, records, options)?;
            tracing::info!(records = count, "migrated");
            println!("{}", encode_records(migrated, shape, codec)?);
        }
        Some(("stamp", args)) => {
            let evolver = load_evolver(pipeline_path(args)?)?;
            let input = args.get_one::<PathBuf>("input").map(PathBuf::as_path);
            let codec = select_codec(&registry, input, format)?;

            let (records, shape) = read_records(input, codec)?;
            let stamped = stamp_records(&evolver, &records);
            tracing::info!(records = stamped.len(), "stamped");
            println!("{}", encode_records(stamped, shape, codec)?);
        }
        Some(("inspect", args)) => {
            let evolver = load_evolver(pipeline_path(args)?)?;
            let codec = select_codec(&registry, None, format)?;
            let report = serde_json::to_value(inspect(&evolver))?;
            println!("{}", codec.encode(&report)?);
        }
        _ => {}
    }
    Ok(())
}

fn pipeline_path(args: &ArgMatches) -> Result<&std::path::Path> {
    args.get_one::<PathBuf>("pipeline")
        .map(PathBuf::as_path)
        .ok_or_else(|| anyhow::anyhow!("--pipeline is required"))
}
