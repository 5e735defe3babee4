use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use linkcycle::{logging, AppConfig, Orchestrator, RunError};
use linkcycle_record::{render_report, CycleLogReader, Port, DEFAULT_TARGET_PORTS};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

const EXIT_INTERRUPTED: u8 = 130;

fn cli() -> Command {
    Command::new("linkcycle")
        .version(linkcycle::VERSION)
        .about("Power-cycle nodes and track switch port link state across cycles")
        .subcommand_required(true)
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .global(true)
                .default_value("info")
                .help("Log filter (overridden by RUST_LOG)"),
        )
        .subcommand(
            Command::new("run")
                .about("Run the power-cycle test")
                .arg(
                    Arg::new("config")
                        .long("config")
                        .short('c')
                        .value_parser(value_parser!(PathBuf))
                        .help("YAML configuration file (defaults apply when omitted)"),
                )
                .arg(
                    Arg::new("cycles")
                        .long("cycles")
                        .value_parser(value_parser!(u32).range(1..))
                        .help("Override the number of cycles"),
                )
                .arg(
                    Arg::new("no-progress")
                        .long("no-progress")
                        .action(ArgAction::SetTrue)
                        .help("Do not draw the boot-wait progress bar"),
                ),
        )
        .subcommand(
            Command::new("report")
                .about("Summarise port link states recorded in a cycle log")
                .arg(
                    Arg::new("log")
                        .long("log")
                        .default_value("./test.log")
                        .value_parser(value_parser!(PathBuf))
                        .help("Cycle record log"),
                )
                .arg(
                    Arg::new("port")
                        .long("port")
                        .short('p')
                        .action(ArgAction::Append)
                        .value_parser(value_parser!(Port))
                        .help("Port to report, as device/port (repeatable; default 0/24 0/25)"),
                ),
        )
        .subcommand(Command::new("defaults").about("Print the default configuration as YAML"))
}

fn main() -> Result<ExitCode> {
    let matches = cli().get_matches();
    let level = matches
        .get_one::<String>("log-level")
        .cloned()
        .unwrap_or_else(|| "info".to_string());

    match matches.subcommand() {
        Some(("run", args)) => run(args, &level),
        Some(("report", args)) => {
            logging::init(&level, None)?;
            report(args)
        }
        Some(("defaults", _)) => {
            print!("{}", AppConfig::default().to_yaml()?);
            Ok(ExitCode::SUCCESS)
        }
        _ => anyhow::bail!("missing subcommand"),
    }
}

fn run(args: &ArgMatches, level: &str) -> Result<ExitCode> {
    let mut config = match args.get_one::<PathBuf>("config") {
        Some(path) => AppConfig::load(path).with_context(|| format!("loading config from {}", path.display()))?,
        None => AppConfig::default(),
    };
    if let Some(&cycles) = args.get_one::<u32>("cycles") {
        config.cycles = cycles;
    }
    if args.get_flag("no-progress") {
        config.show_progress = false;
    }

    logging::init(level, config.run_log.as_deref()).context("initialising logging")?;
    tracing::info!(version = linkcycle::VERSION, "starting linkcycle");

    let orchestrator = Orchestrator::new(config).context("invalid configuration")?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    rt.block_on(async move {
        let cancel = CancellationToken::new();
        tokio::spawn(forward_signals(cancel.clone()));

        match orchestrator.run(&cancel).await {
            Ok(summary) => {
                println!("{summary}");
                Ok(ExitCode::SUCCESS)
            }
            Err(e @ RunError::Interrupted { .. }) => {
                tracing::warn!("{e}");
                println!("interrupted: {}", e.summary());
                Ok(ExitCode::from(EXIT_INTERRUPTED))
            }
        }
    })
}

async fn forward_signals(cancel: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to register SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, stopping after console teardown"),
        () = sigterm => tracing::info!("received SIGTERM, stopping after console teardown"),
    }
    cancel.cancel();
}

fn report(args: &ArgMatches) -> Result<ExitCode> {
    let path = args
        .get_one::<PathBuf>("log")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("./test.log"));
    let ports: Vec<Port> = match args.get_many::<Port>("port") {
        Some(ports) => ports.copied().collect(),
        None => DEFAULT_TARGET_PORTS.to_vec(),
    };

    match CycleLogReader::new(ports).parse_all(&path) {
        Ok(log) => {
            print!("{}", render_report(&log));
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if e.is_empty_input() => {
            eprintln!("{e}");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
    }
}
