use clap::Parser;
use offpack::{
    Offpack, OffpackConfig,
    cmd::{Execute, fetch::Fetch, tool::Tool},
};
use stop::fatal;
use tokio::runtime;
use tracing::{Level, level_filters::LevelFilter};
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Mirror npm packages, with their dependency trees, for offline registries.
#[derive(Clone, Debug, Parser)]
struct Args {
    #[clap(flatten)]
    cfg: OffpackConfig,
    /// Set the log filtering level.
    #[arg(name = "loglevel", long, default_value_t = Level::INFO)]
    log_level: Level,
    /// Use verbose output, equivalent to overriding log level to DEBUG.
    #[arg(short, long)]
    verbose: bool,
    /// Use noisy output, equivalent to overriding log level to TRACE.
    #[arg(short, long)]
    noisy: bool,
    #[command(subcommand)]
    cmd: SubCommand,
}

#[derive(Clone, Debug, Parser)]
enum SubCommand {
    Fetch(Fetch),
    #[command(subcommand)]
    Tool(Tool),
}

impl Execute for SubCommand {
    async fn execute(app: &Offpack, cmd: Self) -> anyhow::Result<()> {
        match cmd {
            SubCommand::Fetch(fetch) => app.execute(fetch).await,
            SubCommand::Tool(tool) => app.execute(tool).await,
        }
    }
}

fn main() {
    let Args {
        cfg,
        cmd,
        log_level,
        verbose,
        noisy,
    } = Args::parse();
    let log_level = if noisy {
        Level::TRACE
    } else if verbose {
        Level::DEBUG
    } else {
        log_level
    };
    let layer = IndicatifLayer::new();
    tracing_subscriber::registry()
        .with(LevelFilter::from_level(log_level))
        .with(fmt::layer().with_writer(layer.get_stderr_writer()))
        .with(layer)
        .init();
    let run = runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap_or_else(fatal!());
    let app = run.block_on(Offpack::new(cfg)).unwrap_or_else(fatal!());
    run.block_on(app.execute(cmd)).unwrap_or_else(fatal!());
    run.block_on(app.close());
}
