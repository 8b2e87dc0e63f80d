use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use mjpg_httpd::{demo, AppConfig, Server};

#[derive(Parser, Debug)]
#[command(name = "mjpg-httpd")]
#[command(about = "HTTP MJPEG streaming engine for live JPEG video sources")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = "mjpg-httpd.toml",
        help = "Path to TOML configuration file"
    )]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(
        long,
        help = "Validate configuration file and exit without starting the server"
    )]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Dry run mode - bind the listener but don't accept connections
    #[arg(
        long,
        help = "Perform dry run - bind the listener but don't start serving"
    )]
    dry_run: bool,

    /// Override log format (json, pretty, compact)
    #[arg(
        long,
        value_name = "FORMAT",
        help = "Log output format: json, pretty, or compact"
    )]
    log_format: Option<String>,

    /// Run the built-in synthetic frame producer instead of requiring an
    /// external one to publish into the frame slot
    #[arg(long, help = "Enable the built-in demo frame producer")]
    demo: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config();
        return Ok(());
    }

    init_logging(&args)?;

    info!("starting mjpg-httpd v{}", env!("CARGO_PKG_VERSION"));
    info!("configuration file: {}", args.config);

    let mut config = match AppConfig::load_from_file(&args.config) {
        Ok(config) => {
            info!("configuration loaded successfully from: {}", args.config);
            config
        }
        Err(e) => {
            error!("failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.demo {
        config.producer.demo_enabled = true;
    }

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("configuration validation successful");
                println!("configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("configuration validation failed: {}", e);
                eprintln!("configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    config.validate().map_err(|e| {
        error!("configuration validation failed: {}", e);
        e
    })?;

    let mut server = Server::new(config.clone());
    server.listen().await.map_err(|e| {
        error!("failed to bind HTTP listener: {}", e);
        e
    })?;

    if args.dry_run {
        info!("dry run mode - listener bound but not serving");
        println!("dry run completed successfully - listener bound");
        return Ok(());
    }

    let demo_cancel = CancellationToken::new();
    let demo_task = if config.producer.demo_enabled {
        info!("demo frame producer enabled at {} fps", config.producer.demo_fps);
        Some(tokio::spawn(demo::run(
            server.frame_slot(),
            config.producer.demo_fps,
            demo_cancel.clone(),
        )))
    } else {
        None
    };

    let cancel_token = server.cancel_token();
    let mut run_task = tokio::spawn(async move { server.run().await });

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let run_result = tokio::select! {
        result = &mut run_task => result.map_err(|e| anyhow::anyhow!("server task panicked: {}", e))?,
        _ = &mut shutdown => {
            info!("shutdown signal received, stopping server");
            cancel_token.cancel();
            run_task.await.map_err(|e| anyhow::anyhow!("server task panicked: {}", e))?
        }
    };

    demo_cancel.cancel();
    if let Some(task) = demo_task {
        let _ = task.await;
    }

    run_result.map_err(|e| {
        error!("server error during execution: {}", e);
        e
    })?;

    info!("mjpg-httpd exited cleanly");
    Ok(())
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mjpg_httpd={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

fn print_default_config() {
    println!("# mjpg-httpd configuration file");
    println!("# these are the built-in defaults; override in TOML or env vars");
    println!();

    let default_config = AppConfig::default();
    match toml::to_string_pretty(&default_config) {
        Ok(toml_str) => println!("{}", toml_str),
        Err(e) => eprintln!("failed to render default config: {}", e),
    }
}
