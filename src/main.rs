use clap::Parser;
use medsafe::cli::{Args, build_codec, build_config, init_logging, load_session_secret, open_database};
use medsafe::jwt::TokenCodec;
use medsafe::{init_cleanup, run_server};
use std::sync::Arc;
use tracing::{error, info};

fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    // Read (and clear) the secret before any runtime threads exist.
    let Some(secret) = load_session_secret(args.secret_file.as_deref()) else {
        std::process::exit(1);
    };

    let Some(codec) = build_codec(&secret) else {
        std::process::exit(1);
    };
    drop(secret);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| {
            error!(error = %e, "Failed to start runtime");
            std::process::exit(1);
        });

    runtime.block_on(serve(args, codec));
}

async fn serve(args: Args, codec: Arc<TokenCodec>) {
    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let config = build_config(&args, db, codec);
    init_cleanup(&config.db).await;

    match listener.local_addr() {
        Ok(local_addr) => info!(address = %local_addr, "Listening"),
        Err(e) => error!(error = %e, "Failed to get local address"),
    }

    if let Err(e) = run_server(config, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
