use bartlett::cli::Args;
use bartlett::create_router_with_config;
use bartlett::sync::{GitIgnoreFilter, PathFilter, PatternFilter, SyncClient, SyncSession};
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bartlett=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if !args.runs_server() && !args.runs_client() {
        tracing::error!("--no-client with a remote server leaves nothing to do");
        return ExitCode::from(2);
    }

    // Bind before the client starts so its first cycle has somewhere to go.
    let server = if args.runs_server() {
        let addr = format!("{}:{}", args.host, args.port);
        let listener = match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!("failed to bind {}: {}", addr, e);
                return ExitCode::from(1);
            }
        };
        tracing::info!("listening on {}", addr);
        let app = create_router_with_config(args.router_config());
        Some(tokio::spawn(async move { axum::serve(listener, app).await }))
    } else {
        None
    };

    let client = if args.runs_client() {
        let directory = match args.directory.clone() {
            Some(dir) => dir,
            None => match std::env::current_dir() {
                Ok(dir) => dir,
                Err(e) => {
                    tracing::error!("cannot determine current directory: {}", e);
                    return ExitCode::from(1);
                }
            },
        };
        let filter = path_filter(&args, &directory);
        let session = SyncSession::new(directory, filter, SyncClient::new(&args.target()));
        Some(tokio::spawn(session.run(args.sync_interval())))
    } else {
        None
    };

    tokio::select! {
        result = async {
            match server {
                Some(handle) => handle.await,
                None => std::future::pending().await,
            }
        } => {
            match result {
                Ok(Ok(())) => tracing::info!("server stopped"),
                Ok(Err(e)) => {
                    tracing::error!("server failed: {}", e);
                    return ExitCode::from(1);
                }
                Err(e) => {
                    tracing::error!("server task panicked: {}", e);
                    return ExitCode::from(1);
                }
            }
        }
        result = async {
            match client {
                Some(handle) => handle.await,
                None => std::future::pending().await,
            }
        } => {
            if let Err(e) = result {
                tracing::error!("sync task panicked: {}", e);
                return ExitCode::from(1);
            }
        }
        _ = signal::ctrl_c() => {
            tracing::info!("received Ctrl+C, shutting down");
        }
    }

    ExitCode::SUCCESS
}

/// Git's ignore rules when the directory is in a work tree, the built-in
/// patterns otherwise.
fn path_filter(args: &Args, directory: &Path) -> Box<dyn PathFilter> {
    if !args.no_gitignore {
        if let Some(filter) = GitIgnoreFilter::discover(directory) {
            tracing::info!("using git ignore rules for {}", directory.display());
            return Box::new(filter);
        }
    }
    Box::new(PatternFilter::new(args.include_hidden, args.ignore.clone()))
}
