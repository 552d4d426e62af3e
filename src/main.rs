//! AIVerse gateway binary

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aiverse::{
    db::MongoClient, logging::UsageLogger, server, services::Providers, AppState, Args, Stores,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Initialize tracing/logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("aiverse={},info", args.log_level).into());
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  AIVerse - metered AI gateway");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {}", args.mongodb_uri);
    info!("Free usage limit: {}", args.free_usage_limit);
    info!("Provider timeout: {} ms", args.provider_timeout_ms);
    info!("AI model: {}", args.providers.ai_model);
    info!("CORS origins: {}", args.cors_origin_list().join(", "));
    info!("======================================");

    let missing = args.providers.missing_credentials();
    if !missing.is_empty() {
        warn!("Provider credentials not set: {}", missing.join(", "));
    }

    // Connect to MongoDB (optional in dev mode)
    let stores = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => {
            info!("MongoDB connected successfully");
            Stores::mongo(client).await?
        }
        Err(e) => {
            if args.dev_mode {
                warn!("MongoDB connection failed (dev mode, using in-memory stores): {}", e);
                Stores::memory()
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    let usage = UsageLogger::new(args.node_id.to_string());
    if let Some(path) = &args.usage_log_path {
        if let Err(e) = usage.init_file(path.clone()).await {
            warn!("Usage logging disabled, cannot open {}: {}", path.display(), e);
        }
    }

    let providers = Providers::from_args(&args);
    let state = Arc::new(AppState::new(args, stores, providers, usage)?);

    if let Err(e) = server::run(state).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
