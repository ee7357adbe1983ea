use anyhow::Context;
use clap::Parser;
use pingora_core::server::configuration::Opt;
use pingora_core::server::Server;
use std::path::PathBuf;
use std::sync::Arc;
use s3imageserver::config::Config;
use s3imageserver::pipeline::Dispatcher;
use s3imageserver::proxy::ImageProxy;
use s3imageserver::s3::S3Origin;
use s3imageserver::transform::ImageTransformer;

/// s3imageserver - on-demand image resizing in front of S3, with a local disk cache
#[derive(Parser, Debug)]
#[command(name = "s3imageserver")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML or JSON)
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Daemon mode
    #[arg(short = 'd', long)]
    daemon: bool,

    /// Test configuration and exit
    #[arg(long)]
    test: bool,

    /// Upgrade workers gracefully
    #[arg(long)]
    upgrade: bool,
}

fn build_dispatcher(config: &Config) -> anyhow::Result<Dispatcher> {
    let origin = S3Origin::new()
        .map_err(anyhow::Error::msg)
        .context("Failed to create S3 origin")?;
    Ok(Dispatcher::new(
        config,
        Arc::new(origin),
        Arc::new(ImageTransformer),
        None,
    ))
}

fn main() {
    // Initialize logging subsystem
    if let Err(e) = s3imageserver::logging::init_subscriber() {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    let args = Args::parse();

    let config = Config::from_file(&args.config).unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    tracing::info!(
        config_file = %args.config.display(),
        server_address = %config.server.address,
        server_port = config.server.port,
        handlers = config.handlers.len(),
        "Configuration loaded successfully"
    );

    if args.test {
        println!("Configuration file {} is valid", args.config.display());
        return;
    }

    let dispatcher = build_dispatcher(&config).unwrap_or_else(|e| {
        eprintln!("Failed to build request pipeline: {:#}", e);
        std::process::exit(1);
    });

    for handler in &config.handlers {
        tracing::info!(
            handler = %handler.name,
            route = %format!("/{}/:file", handler.route_prefix()),
            bucket = %handler.s3.bucket,
            cache_path = %handler.cache_path.display(),
            "Registered handler"
        );
    }

    let opt = Opt {
        daemon: args.daemon,
        upgrade: args.upgrade,
        ..Default::default()
    };

    let mut server = Server::new(Some(opt)).unwrap_or_else(|e| {
        eprintln!("Failed to create server: {}", e);
        std::process::exit(1);
    });
    server.bootstrap();

    let proxy = ImageProxy::new(Arc::new(dispatcher));
    let mut proxy_service = pingora_proxy::http_proxy_service(&server.configuration, proxy);

    let listen_addr = config.server.listen_addr();
    proxy_service.add_tcp(&listen_addr);

    tracing::info!(address = %listen_addr, "Starting s3imageserver");

    server.add_service(proxy_service);

    server.run_forever();
}
