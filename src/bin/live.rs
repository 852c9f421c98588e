use bartlett::cli::{LiveArgs, LiveCommand};
use bartlett::protocol::File;
use bartlett::sync::diff::digest_file;
use bartlett::sync::{SyncClient, SyncError};
use clap::Parser;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    let args = LiveArgs::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bartlett=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let client = SyncClient::new(&args.server);
    match run(&client, args.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(client: &SyncClient, command: LiveCommand) -> Result<(), SyncError> {
    match command {
        LiveCommand::Read { key, have } => {
            let target = held_version(have.as_deref())?;
            let file = client.read(&key, &target).await?;
            if file.is_empty() {
                eprintln!("{}: not found", key);
            } else if file.digest == target.digest {
                eprintln!("{}: unchanged ({})", key, file.digest.short());
            }
            print_content(&file)?;
        }
        LiveCommand::Watch { key, have } => {
            let target = held_version(have.as_deref())?;
            let response = client.watch(&key, &target).await?;
            let state = if response.locked { "held" } else { "free" };
            eprintln!("{}: {}", key, state);
            print_content(&response.target)?;
        }
        LiveCommand::Push { key, file } => {
            let content = std::fs::read(&file).map_err(|source| SyncError::Io {
                path: file.clone(),
                source,
            })?;
            let status = client.push(&key, File::new(content)).await?;
            println!("{}", status);
        }
        LiveCommand::Unlock { key } => {
            let status = client.unlock(&key).await?;
            println!("{}", status);
        }
    }
    Ok(())
}

/// The version the caller already holds: a reference to `path`'s digest, or
/// nothing at all.
fn held_version(path: Option<&Path>) -> Result<File, SyncError> {
    match path {
        Some(path) => Ok(File::reference(digest_file(path)?)),
        None => Ok(File::default()),
    }
}

fn print_content(file: &File) -> Result<(), SyncError> {
    let Some(content) = file.content.as_deref() else {
        return Ok(());
    };
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(content)
        .and_then(|()| stdout.flush())
        .map_err(|source| SyncError::Io {
            path: "<stdout>".into(),
            source,
        })
}
