//! apnserver
//!
//! Mock push gateway. Reads notifications, logs them, and answers rule
//! violations with an error response before closing the connection.

use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use apnslink::network::{GatewayRules, MockGateway};
use apnslink::Identity;

/// apnserver
#[derive(Parser, Debug)]
#[command(name = "apnserver")]
#[command(about = "Mock gateway for the binary push notification protocol")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(default_value = "2195")]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Server certificate/key pair in one PEM file (plain TCP when absent)
    #[arg(long)]
    pem: Option<String>,

    /// Server certificate in PEM format (requires --key)
    #[arg(long, requires = "key")]
    cer: Option<String>,

    /// Server private key in PEM format (requires --cer)
    #[arg(long, requires = "cer")]
    key: Option<String>,

    /// Reject tokens of any other length with "invalid token size"
    #[arg(long)]
    token_len: Option<usize>,

    /// Hex token to reject with "invalid token" (repeatable)
    #[arg(long = "reject-token")]
    reject_tokens: Vec<String>,

    /// Worker threads serving connections
    #[arg(short, long, default_value = "4")]
    workers: usize,

    /// Drop silent clients after this many seconds (0 = never)
    #[arg(long, default_value = "30")]
    idle_secs: u64,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,apnslink=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("apnserver v{}", apnslink::VERSION);

    let mut rules = GatewayRules::default();
    if let Some(len) = args.token_len {
        rules = rules.expected_token_len(len);
    }
    for token in &args.reject_tokens {
        match hex::decode(token) {
            Ok(bytes) => rules = rules.reject_token(bytes),
            Err(e) => {
                tracing::error!("Bad token {}: {}", token, e);
                std::process::exit(1);
            }
        }
    }

    let identity = match (&args.pem, &args.cer, &args.key) {
        (Some(pem), _, _) => Some(Identity::from_pem_file(pem)),
        (None, Some(cer), Some(key)) => Some(Identity::from_pem_files(cer, key)),
        _ => None,
    }
    .transpose();

    let identity = match identity {
        Ok(identity) => identity,
        Err(e) => {
            tracing::error!("Failed to load certificate: {}", e);
            std::process::exit(1);
        }
    };

    let addr = format!("{}:{}", args.bind, args.port);
    let gateway = MockGateway::bind(&addr, rules).and_then(|gateway| {
        let gateway = gateway
            .with_workers(args.workers)
            .with_idle_timeout((args.idle_secs > 0).then(|| Duration::from_secs(args.idle_secs)));
        match &identity {
            Some(identity) => gateway.with_identity(identity),
            None => {
                tracing::info!("No certificate given, serving plain TCP");
                Ok(gateway)
            }
        }
    });

    let gateway = match gateway {
        Ok(gateway) => gateway,
        Err(e) => {
            tracing::error!("Failed to start gateway on {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = gateway.run() {
        tracing::error!("Gateway error: {}", e);
        std::process::exit(1);
    }
}
