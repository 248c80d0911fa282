//! Command line interface for the `framerpc` demo server.

use std::{net::SocketAddr, time::Duration};

use clap::Parser;

/// Command line arguments for the `framerpc` binary.
#[derive(Debug, Parser)]
#[command(name = "framerpc", version, about = "Demo RPC server with echo, add and ping")]
pub struct Cli {
    /// Address to listen on.
    #[arg(short, long, default_value = "127.0.0.1:7878")]
    pub bind: SocketAddr,
    /// Frame terminator. Escapes `\r`, `\n` and `\0` are understood.
    #[arg(short, long, default_value = "\\r\\n")]
    pub terminator: String,
    /// Maximum frame payload length in bytes.
    #[arg(long, default_value_t = framerpc::config::DEFAULT_MAX_FRAME_LENGTH)]
    pub max_frame_length: usize,
    /// Requests admitted per second; unlimited when absent.
    #[arg(long)]
    pub rate: Option<f64>,
    /// Burst capacity of the rate limit.
    #[arg(long, default_value_t = 10, requires = "rate")]
    pub burst: usize,
    /// Initial accept-error back-off in milliseconds.
    #[arg(long, default_value_t = 10, value_parser = parse_millis)]
    pub backoff_ms: u64,
}

impl Cli {
    /// Terminator bytes with escapes resolved.
    #[must_use]
    pub fn terminator_bytes(&self) -> Vec<u8> { unescape(&self.terminator) }

    /// Initial back-off delay.
    #[must_use]
    pub fn backoff(&self) -> Duration { Duration::from_millis(self.backoff_ms) }
}

fn parse_millis(value: &str) -> Result<u64, String> {
    value
        .parse::<u64>()
        .map_err(|err| format!("invalid milliseconds {value:?}: {err}"))
}

fn unescape(raw: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            let mut buf = [0_u8; 4];
            out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some('r') => out.push(b'\r'),
            Some('n') => out.push(b'\n'),
            Some('0') => out.push(0),
            Some('\\') | None => out.push(b'\\'),
            Some(other) => {
                out.push(b'\\');
                let mut buf = [0_u8; 4];
                out.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out
}
