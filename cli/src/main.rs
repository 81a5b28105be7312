//! ports CLI - list open network sockets
//!
//! Prints every TCP and UDP socket on the host, IPv4 and IPv6, with the
//! process that owns it.

mod commands;
mod table;

use clap::{ArgAction, Parser};
use ports_core::PortFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ports")]
#[command(author, version, about = "List open TCP/UDP ports and the processes that own them")]
struct Cli {
    /// Show TCP and TCP6 sockets
    #[arg(long, action = ArgAction::Set, num_args = 0..=1, default_value_t = true, default_missing_value = "true")]
    tcp: bool,

    /// Show UDP and UDP6 sockets
    #[arg(long, action = ArgAction::Set, num_args = 0..=1, default_value_t = true, default_missing_value = "true")]
    udp: bool,

    /// Only show listening sockets
    #[arg(long, action = ArgAction::Set, num_args = 0..=1, default_value_t = false, default_missing_value = "true")]
    listen: bool,

    /// Show the PID/Program column
    #[arg(long, action = ArgAction::Set, num_args = 0..=1, default_value_t = true, default_missing_value = "true")]
    pid: bool,
}

impl Cli {
    fn filter(&self) -> PortFilter {
        PortFilter::new()
            .with_tcp(self.tcp)
            .with_udp(self.udp)
            .with_listening_only(self.listen)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    tracing::debug!(?cli, "Parsed arguments");

    commands::list::run(cli.filter(), cli.pid)
}
