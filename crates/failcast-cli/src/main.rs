//! `failcast` - predict whether a batch job will fail before it runs

mod commands;
mod menu;
mod render;

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use colored::Colorize;
use failcast_core::{FailcastConfig, FailcastError, Pipeline, PredictorMode};
use failcast_predict::{AnthropicClient, ReasoningClient};
use failcast_store::FileStore;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("failcast")
        .version(failcast_core::VERSION)
        .about("Predict batch job failures from configuration, history and cluster capacity")
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Directory holding the job, history and cluster exports"),
        )
        .arg(
            Arg::new("heuristic")
                .long("heuristic")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Use the local rule set instead of the reasoning service"),
        )
        .arg(
            Arg::new("output-dir")
                .long("output-dir")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Where saved predictions are written"),
        )
        .arg(
            Arg::new("timeout-secs")
                .long("timeout-secs")
                .global(true)
                .value_parser(value_parser!(u64))
                .help("Reasoning service timeout in seconds"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines on stderr"),
        )
        .subcommand(Command::new("interactive").about("Menu-driven predictions (default)"))
        .subcommand(Command::new("list").about("List known jobs"))
        .subcommand(
            Command::new("predict")
                .about("Assess one job")
                .arg(Arg::new("job").required(true).help("Job name"))
                .arg(
                    Arg::new("save")
                        .long("save")
                        .action(ArgAction::SetTrue)
                        .help("Save the assessment as JSON in the output directory"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the assessment as JSON"),
                ),
        )
        .subcommand(Command::new("batch").about("Assess every job concurrently"))
        .subcommand(Command::new("analyze").about("Analyze historical failures"))
        .subcommand(
            Command::new("cluster-from-kubectl")
                .about("Convert `kubectl top nodes --no-headers` output into cluster YAML")
                .arg(
                    Arg::new("input")
                        .required(true)
                        .help("File with kubectl output, or - for stdin"),
                )
                .arg(
                    Arg::new("cluster-name")
                        .long("cluster-name")
                        .help("Cluster name written to the YAML"),
                )
                .arg(
                    Arg::new("region")
                        .long("region")
                        .help("Region written to the YAML"),
                ),
        )
        .subcommand(
            Command::new("history-from-kubectl")
                .about("Convert `kubectl get jobs -o json` output into history JSON")
                .arg(
                    Arg::new("input")
                        .required(true)
                        .help("File with kubectl output, or - for stdin"),
                )
                .arg(
                    Arg::new("days")
                        .long("days")
                        .value_parser(value_parser!(u32))
                        .help("Keep only runs started in the last N days"),
                ),
        )
}

/// Log to stderr, filtered by `RUST_LOG` (default `info`)
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<FailcastConfig> {
    let path = matches.get_one::<PathBuf>("config");
    let mut config = FailcastConfig::load_or_default(path.map(PathBuf::as_path))?;

    if let Some(dir) = matches.get_one::<PathBuf>("data-dir") {
        config = config.with_data_dir(dir);
    }
    if matches.get_flag("heuristic") {
        config = config.with_predictor(PredictorMode::Heuristic);
    }
    if let Some(dir) = matches.get_one::<PathBuf>("output-dir") {
        config = config.with_output_dir(dir.clone());
    }
    if let Some(secs) = matches.get_one::<u64>("timeout-secs") {
        config = config.with_timeout_secs(*secs);
    }
    config.validate()?;
    Ok(config)
}

/// Store, credential and predictor, resolved once at startup
fn build_pipeline(config: &FailcastConfig) -> anyhow::Result<Pipeline> {
    let client: Option<Arc<dyn ReasoningClient>> = config.resolve_api_key()?.map(|key| {
        AnthropicClient::new(key)
            .with_endpoint(config.reasoning.endpoint.clone())
            .with_model(config.reasoning.model.clone())
            .shared()
    });

    let store = FileStore::open(config.data_paths())
        .context("loading job, history and cluster data")?;
    let pipeline = Pipeline::from_config(config, Arc::new(store), client)?;
    tracing::info!(predictor = pipeline.predictor_name(), "Ready");
    Ok(pipeline)
}

async fn run(matches: ArgMatches) -> anyhow::Result<ExitCode> {
    if let Some(("cluster-from-kubectl", args)) = matches.subcommand() {
        let input = args
            .get_one::<String>("input")
            .map_or("-", String::as_str);
        return commands::cluster_from_kubectl(
            input,
            args.get_one::<String>("cluster-name").map(String::as_str),
            args.get_one::<String>("region").map(String::as_str),
        );
    }

    if let Some(("history-from-kubectl", args)) = matches.subcommand() {
        let input = args
            .get_one::<String>("input")
            .map_or("-", String::as_str);
        return commands::history_from_kubectl(input, args.get_one::<u32>("days").copied());
    }

    let config = load_config(&matches)?;
    let pipeline = build_pipeline(&config)?;

    match matches.subcommand() {
        Some(("list", _)) => commands::list(&pipeline),
        Some(("predict", args)) => {
            let job = args
                .get_one::<String>("job")
                .context("missing job name")?;
            commands::predict(
                &pipeline,
                &config,
                job,
                args.get_flag("save"),
                args.get_flag("json"),
            )
            .await
        }
        Some(("batch", _)) => commands::batch(&pipeline).await,
        Some(("analyze", _)) => commands::analyze(&pipeline).await,
        _ => {
            menu::run(&pipeline, &config).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    match run(matches).await {
        Ok(code) => code,
        Err(err) => {
            match err.downcast_ref::<FailcastError>() {
                Some(failcast) => eprintln!("{}", render::format_error(failcast)),
                None => eprintln!("{} {err:#}", "error:".red().bold()),
            }
            ExitCode::FAILURE
        }
    }
}
