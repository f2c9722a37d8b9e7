use clap::Parser;
use mirror_cache::cache::CacheEngine;
use mirror_cache::config::Config;
use mirror_cache::constants::DEFAULT_CONFIG_LOCATION;
use mirror_cache::proxy::MirrorCacheProxy;
use pingora_core::server::configuration::Opt;
use pingora_core::server::Server;
use std::path::PathBuf;

/// mirror-cache - pull-through cache for Maven-style artifact repositories
#[derive(Parser, Debug)]
#[command(name = "mirror-cache")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the properties file; created with defaults if missing
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_LOCATION)]
    config_location: PathBuf,

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

fn main() {
    // Initialize logging subsystem
    mirror_cache::logging::init_subscriber().expect("Failed to initialize logging subsystem");

    // Parse command-line arguments
    let args = Args::parse();

    let config = Config::load_from(&args.config_location).unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::process::exit(1);
    });

    // Write the effective configuration back so absent keys show their defaults
    if let Err(e) = config.save_to(&args.config_location) {
        tracing::warn!(
            config_file = %args.config_location.display(),
            error = %e,
            "Failed to save configuration"
        );
    }

    tracing::info!(
        config_file = %args.config_location.display(),
        "Configuration loaded successfully"
    );
    config.log_summary();

    let engine = CacheEngine::from_config(&config).unwrap_or_else(|e| {
        eprintln!("Failed to initialize cache: {}", e);
        std::process::exit(1);
    });

    // Build Pingora server options
    let opt = Opt {
        daemon: args.daemon,
        test: args.test,
        upgrade: args.upgrade,
        ..Default::default()
    };

    // Create Pingora server
    let mut server = Server::new(Some(opt)).expect("Failed to create Pingora server");
    server.bootstrap();

    let proxy = MirrorCacheProxy::new(engine);

    // Create HTTP service
    let mut proxy_service = pingora_proxy::http_proxy_service(&server.configuration, proxy);

    // Add TCP listener for HTTP
    let listen_addr = config.server.listen_addr();
    proxy_service.add_tcp(&listen_addr);

    tracing::info!(address = %listen_addr, "Starting mirror-cache");

    // Register service with server
    server.add_service(proxy_service);

    // Run server forever (blocks until shutdown)
    server.run_forever();
}
