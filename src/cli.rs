use crate::poll::PollConfig;
use crate::sync::session::DEFAULT_SYNC_INTERVAL;
use crate::{RouterConfig, DEFAULT_PORT};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments for `bartlett`: a sync server, a directory client, or both.
#[derive(Parser, Debug)]
#[clap(name = "bartlett")]
#[clap(about = "Keep a directory in sync with a shared server", long_about = None)]
pub struct Args {
    /// Server to sync with (host:port or URL). Without it, a server is
    /// started locally and the client connects to it.
    #[clap(value_name = "SERVER")]
    pub server: Option<String>,

    /// Port to run the server on (no effect when connecting to a server)
    #[clap(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Host to bind the server to
    #[clap(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Don't run the client; only serve
    #[clap(long)]
    pub no_client: bool,

    /// Directory to sync (defaults to the current directory)
    #[clap(short, long, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Milliseconds between client sync cycles
    #[clap(long, value_name = "MS", default_value_t = DEFAULT_SYNC_INTERVAL.as_millis() as u64)]
    pub interval_ms: u64,

    /// How many times the server re-checks before answering sync/read
    #[clap(long, default_value = "3")]
    pub static_poll_attempts: u32,

    /// Longest wait in milliseconds between sync/read re-checks
    #[clap(long, value_name = "MS", default_value = "500")]
    pub static_poll_ms: u64,

    /// How many times the server re-checks before answering watch
    #[clap(long, default_value = "1")]
    pub live_poll_attempts: u32,

    /// Longest wait in milliseconds between watch re-checks
    #[clap(long, value_name = "MS", default_value = "0")]
    pub live_poll_ms: u64,

    /// Ignore git's ignore rules even inside a work tree
    #[clap(long)]
    pub no_gitignore: bool,

    /// Sync hidden files when git's ignore rules are not in use
    #[clap(long)]
    pub include_hidden: bool,

    /// Name pattern to skip (repeatable, glob-style `*`)
    #[clap(long = "ignore", value_name = "PATTERN")]
    pub ignore: Vec<String>,
}

impl Args {
    /// Whether this process should serve.
    pub fn runs_server(&self) -> bool {
        self.server.is_none()
    }

    /// Whether this process should sync a directory.
    pub fn runs_client(&self) -> bool {
        !self.no_client
    }

    /// Address the client connects to.
    pub fn target(&self) -> String {
        match &self.server {
            Some(server) => server.clone(),
            None => format!("localhost:{}", self.port),
        }
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            static_poll: PollConfig::new(
                self.static_poll_attempts,
                Duration::from_millis(self.static_poll_ms),
            ),
            live_poll: PollConfig::new(
                self.live_poll_attempts,
                Duration::from_millis(self.live_poll_ms),
            ),
        }
    }
}

/// CLI arguments for `bartlett-live`: the live channel from a shell.
#[derive(Parser, Debug)]
#[clap(name = "bartlett-live")]
#[clap(about = "Read, watch, push and unlock live buffers on a bartlett server", long_about = None)]
pub struct LiveArgs {
    /// Server address (host:port or URL)
    #[clap(long, default_value = "localhost:3000")]
    pub server: String,

    #[clap(subcommand)]
    pub command: LiveCommand,
}

#[derive(Subcommand, Debug)]
pub enum LiveCommand {
    /// Print the current content of KEY (live buffer first, then static)
    Read {
        key: String,
        /// Local copy; only its digest is sent, so the server can wait for a newer version
        #[clap(long, value_name = "FILE")]
        have: Option<PathBuf>,
    },
    /// Report whether KEY is held and print its buffer
    Watch {
        key: String,
        #[clap(long, value_name = "FILE")]
        have: Option<PathBuf>,
    },
    /// Upload FILE as the live buffer for KEY
    Push { key: String, file: PathBuf },
    /// Release KEY
    Unlock { key: String },
}
