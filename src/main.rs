use clap::{Args, Parser, Subcommand};
use distributed_scraper::config::{
    DEFAULT_PROCESSING_HOST, DEFAULT_PROCESSING_PORT, DEFAULT_SCRAPING_PORT, ProcessingConfig,
    ScrapingConfig, default_worker_count,
};
use distributed_scraper::dispatcher::ProcessingServer;
use distributed_scraper::orchestrator::ProcessingClient;
use distributed_scraper::processor::default_registry;
use distributed_scraper::scraping::{ScrapeContext, router};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "distributed_scraper", version, about = "Two-tier web scraping and analysis service")]
struct Cli {
    /// Log at DEBUG instead of INFO
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the processing server (back tier)
    Processing(ProcessingArgs),
    /// Run the HTTP scraping server (front tier)
    Scraping(ScrapingArgs),
    /// Ask a running processing server to stop
    Shutdown(TargetArgs),
}

#[derive(Args)]
struct ProcessingArgs {
    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0")]
    ip: IpAddr,

    #[arg(short, long, default_value_t = DEFAULT_PROCESSING_PORT)]
    port: u16,

    /// Worker slots (defaults to the number of CPUs)
    #[arg(short = 'n', long)]
    processes: Option<usize>,
}

#[derive(Args)]
struct ScrapingArgs {
    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0")]
    ip: IpAddr,

    #[arg(short, long, default_value_t = DEFAULT_SCRAPING_PORT)]
    port: u16,

    #[arg(long, default_value = DEFAULT_PROCESSING_HOST)]
    processing_host: String,

    #[arg(long, default_value_t = DEFAULT_PROCESSING_PORT)]
    processing_port: u16,

    /// Round-trip limit for each processing sub-task, in seconds
    #[arg(long, default_value_t = 30)]
    request_timeout: u64,

    /// Connection limit for the processing server, in seconds
    #[arg(long, default_value_t = 5)]
    connect_timeout: u64,
}

#[derive(Args)]
struct TargetArgs {
    #[arg(long, default_value = DEFAULT_PROCESSING_HOST)]
    host: String,

    #[arg(long, default_value_t = DEFAULT_PROCESSING_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    match cli.command {
        Command::Processing(args) => run_processing(args).await,
        Command::Scraping(args) => run_scraping(args).await,
        Command::Shutdown(args) => {
            let client = ProcessingClient::new(args.host, args.port);
            let ack = client.request_shutdown().await?;
            tracing::info!("Processing server at {} acknowledged: {}", client.addr(), ack);
            Ok(())
        }
    }
}

async fn run_processing(args: ProcessingArgs) -> anyhow::Result<()> {
    let config = ProcessingConfig {
        bind_addr: SocketAddr::new(args.ip, args.port),
        workers: args.processes.unwrap_or_else(default_worker_count),
    };

    let server = ProcessingServer::bind(&config, default_registry()).await?;
    let shutdown = server.shutdown_handle();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received Ctrl+C, shutting down");
                shutdown.trigger();
            }
            Err(e) => tracing::error!("Could not listen for Ctrl+C: {}", e),
        }
    });

    tracing::info!("Press Ctrl+C to shutdown");
    server.run().await
}

async fn run_scraping(args: ScrapingArgs) -> anyhow::Result<()> {
    let config = ScrapingConfig {
        bind_addr: SocketAddr::new(args.ip, args.port),
        processing_host: args.processing_host,
        processing_port: args.processing_port,
        request_timeout: Duration::from_secs(args.request_timeout),
        connect_timeout: Duration::from_secs(args.connect_timeout),
        ..ScrapingConfig::default()
    };

    let context = ScrapeContext::new(&config)?;
    let sweeper = context.spawn_sweeper(config.sweep_interval);
    let app = router(context);

    tracing::info!(
        "Scraping server listening on {} (processing server {}:{})",
        config.bind_addr,
        config.processing_host,
        config.processing_port
    );
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Could not listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    sweeper.abort();
    Ok(())
}
