use clap::{Parser, Subcommand};
use service_topology::{
    impact::{ChangeProposal, ChangeType},
    reporter::ReportFormat,
    streaming::SharedGraph,
    ws, Config, ImpactSimulator, Reporter, RiskCalculator, StreamingServer, TopologyAnalyzer,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "service-topology")]
#[command(about = "Live service dependency topology, failure blast radius and change risk")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file path (defaults to ~/.service-topology.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay the traffic log, then tail it and stream topology events over WebSocket
    Serve {
        /// Traffic log to tail (overrides the config file)
        #[arg(short, long)]
        log: Option<PathBuf>,

        /// Address to listen on (overrides the config file)
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Analyze a traffic log once and write reports
    Analyze {
        #[arg(short, long)]
        log: Option<PathBuf>,

        /// Output directory for reports
        #[arg(short, long, default_value = "./topology-output")]
        output: PathBuf,

        #[arg(long, value_enum, default_value = "all")]
        format: FormatArg,
    },
    /// Show who is affected if a service fails
    Impact {
        #[arg(short, long)]
        log: Option<PathBuf>,

        #[arg(short, long)]
        service: String,
    },
    /// Score a proposed change against the topology and change history
    Change {
        #[arg(short, long)]
        log: Option<PathBuf>,

        #[arg(short, long)]
        service: String,

        /// api_modification, schema_change, infrastructure or configuration
        #[arg(short = 't', long)]
        change_type: ChangeType,

        /// JSON array of past change outcomes
        #[arg(long)]
        history: Option<PathBuf>,

        #[arg(short, long, default_value = "")]
        description: String,

        #[arg(long, default_value = "")]
        proposer: String,
    },
    /// Show the recent incident trend for a service
    Trend {
        #[arg(short, long)]
        service: String,

        #[arg(long)]
        history: PathBuf,

        #[arg(long, default_value_t = 30)]
        days: i64,
    },
    /// Generate a default configuration file
    Config {
        /// Output path for the config file (defaults to ~/.service-topology.toml)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::ValueEnum, Clone, Copy)]
enum FormatArg {
    Json,
    Markdown,
    All,
}

impl From<FormatArg> for ReportFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Json => ReportFormat::Json,
            FormatArg::Markdown => ReportFormat::Markdown,
            FormatArg::All => ReportFormat::All,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG=service_topology=debug for per-edge updates
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("service_topology=info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { output } => generate_config(output),
        command => {
            let config = load_config(cli.config.as_ref())?;
            run(command, config).await
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

async fn run(command: Commands, mut config: Config) -> anyhow::Result<()> {
    match command {
        Commands::Serve { log, bind } => {
            if let Some(log) = log {
                config.log_path = log;
            }
            if let Some(bind) = bind {
                config.server.bind_address = bind;
            }
            serve(config).await
        }
        Commands::Analyze { log, output, format } => analyze(config, log, output, format.into()),
        Commands::Impact { log, service } => {
            let log_path = log.unwrap_or_else(|| config.log_path.clone());
            let analyzer = TopologyAnalyzer::new(config.clone())?;
            let (graph, _) = analyzer.build_graph(&log_path)?;
            let simulator = ImpactSimulator::with_critical_path_count(
                &graph,
                &config.services,
                config.analysis.critical_path_top_n,
            );
            println!("{}", serde_json::to_string_pretty(&simulator.simulate_failure(&service))?);
            Ok(())
        }
        Commands::Change {
            log,
            service,
            change_type,
            history,
            description,
            proposer,
        } => {
            let log_path = log.unwrap_or_else(|| config.log_path.clone());
            let analyzer = TopologyAnalyzer::new(config.clone())?;
            let (graph, _) = analyzer.build_graph(&log_path)?;
            let simulator = ImpactSimulator::with_critical_path_count(
                &graph,
                &config.services,
                config.analysis.critical_path_top_n,
            );

            let calculator = match history {
                Some(path) => RiskCalculator::from_config(&config.risk)
                    .with_history(RiskCalculator::load_history(&path)?),
                None => RiskCalculator::from_config(&config.risk),
            };
            let proposal = ChangeProposal {
                change_type,
                target_service: service,
                description,
                proposer,
            };
            println!("{}", serde_json::to_string_pretty(&calculator.assess(&proposal, &simulator))?);
            Ok(())
        }
        Commands::Trend { service, history, days } => {
            let calculator =
                RiskCalculator::from_config(&config.risk).with_history(RiskCalculator::load_history(&history)?);
            println!("{}", serde_json::to_string_pretty(&calculator.get_risk_trend(&service, days))?);
            Ok(())
        }
        Commands::Config { output } => generate_config(output),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let graph = SharedGraph::default();
    let server = Arc::new(StreamingServer::new(graph, &config)?);

    let replay = server.replay(&config.log_path).await?;
    println!(
        "📜 Replayed {} observations ({} skipped) from {}",
        replay.applied,
        replay.skipped,
        config.log_path.display()
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let tailer = {
        let server = Arc::clone(&server);
        let log_path = config.log_path.clone();
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { server.run_tailer(log_path, replay.offset, shutdown).await })
    };

    let http = {
        let server = Arc::clone(&server);
        let bind_address = config.server.bind_address.clone();
        tokio::spawn(async move { ws::serve(server, &bind_address, shutdown_rx).await })
    };

    println!("🚀 Streaming topology on ws://{}/ws", config.server.bind_address);
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");
    let _ = shutdown_tx.send(true);

    tailer.await?;
    http.await??;
    Ok(())
}

fn analyze(config: Config, log: Option<PathBuf>, output_path: PathBuf, format: ReportFormat) -> anyhow::Result<()> {
    println!("🚀 Starting Service Topology Analysis");
    println!("=====================================");

    let start_time = Instant::now();
    let log_path = log.unwrap_or_else(|| config.log_path.clone());
    println!("📜 Traffic log: {}", log_path.display());
    println!("📤 Output directory: {}", output_path.display());

    let analyzer = TopologyAnalyzer::new(config)?;
    let analysis = analyzer.analyze_log(&log_path)?;
    let duration = start_time.elapsed();

    analysis.print_summary();

    println!("\n📊 Generating reports...");
    let reporter = Reporter::new();
    let report = reporter.generate_report(analysis, &log_path, duration.as_millis());
    let exported_files = reporter.export_report(&report, &output_path, format)?;

    println!("\n✅ Analysis completed in {:.2}s", duration.as_secs_f64());
    println!("📁 Reports exported to:");
    for file in exported_files {
        println!("   - {}", file.display());
    }

    Ok(())
}

fn generate_config(output_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config_path = output_path.unwrap_or_else(|| {
        Config::default_config_path().unwrap_or_else(|_| PathBuf::from("service-topology.toml"))
    });

    println!("📝 Generating configuration file: {}", config_path.display());
    std::fs::write(&config_path, Config::create_documented_config())?;

    println!("✅ Configuration file created successfully!");
    println!("💡 Edit the file to customize log tailing, analysis thresholds and service tiers.");
    Ok(())
}
