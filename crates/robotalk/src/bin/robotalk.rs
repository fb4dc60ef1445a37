//! Robotalk CLI
//!
//! Usage:
//!   robotalk robot.yaml
//!   robotalk robot.yaml --dry-run
//!   robotalk --list-types

use robotalk::{
    builtin, format_type_listing, Engine, LocalHub, RunArgs, SpecFile, TypeRegistry,
};
use tokio::sync::watch;

#[tokio::main]
async fn main() {
    let args: RunArgs = argh::from_env();

    let env = env_logger::Env::default().default_filter_or(args.log_level.as_str());
    env_logger::init_from_env(env);

    if args.version {
        println!("robotalk {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let registry = TypeRegistry::global();
    builtin::register_builtins(&registry);

    if args.list_types {
        print!("{}", format_type_listing(&registry.registered_types()));
        return;
    }

    let Some(path) = args.spec.as_deref() else {
        log::error!("No specification file given");
        std::process::exit(2);
    };

    log::info!("Loading specification: {}", path);
    let spec = match SpecFile::from_file(path) {
        Ok(spec) => spec,
        Err(e) => {
            log::error!("Failed to load specification: {}", e);
            std::process::exit(1);
        }
    };

    let mut engine = Engine::from_spec(&spec, registry.clone(), args.engine_config());
    if let Err(e) = engine.resolve() {
        log::error!("Failed to resolve '{}': {}", path, e);
        std::process::exit(1);
    }

    if args.validate {
        println!("Specification '{}' is valid", path);
        println!("  Name: {}", spec.name);
        println!("  Version: {}", spec.version);
        println!("  Components: {}", spec.component_count());
        println!("  Types: {}", spec.type_names().join(", "));
        if let Some(order) = engine.init_order() {
            println!("  Waves: {}", order.len());
        }
        return;
    }

    if args.dry_run {
        match engine.plan() {
            Ok(plan) => println!("{}", plan),
            Err(e) => {
                log::error!("Failed to generate init plan: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    let (shutdown_tx, mut shutdown_rx) = watch::channel(());
    ctrlc::set_handler(move || {
        log::info!("Received Ctrl+C, initiating shutdown...");
        let _ = shutdown_tx.send(());
    })
    .expect("Error setting Ctrl+C handler");

    let hub = LocalHub::new();
    if let Err(e) = engine.connect(&hub).await {
        log::error!("Connect failed: {}", e);
        if let Err(e) = engine.disconnect().await {
            log::error!("Disconnect failed: {}", e);
        }
        std::process::exit(1);
    }

    for endpoint in hub.published_paths() {
        log::debug!("Endpoint {}", endpoint);
    }

    let _ = shutdown_rx.changed().await;

    if let Err(e) = engine.disconnect().await {
        log::error!("Disconnect failed: {}", e);
        std::process::exit(1);
    }
    log::info!("Robotalk exiting");
}
