//! apnsend
//!
//! Sends push notifications through the binary gateway and reads the
//! feedback service.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, EnvFilter};

use apnslink::payload::{validate_payload, Payload};
use apnslink::protocol::{
    read_feedback, FramedNotification, Notification, Priority, MAX_LEGACY_PAYLOAD_SIZE,
};
use apnslink::{ApnsError, Config, Identity, PushSession, Result, TransportFactory};

/// apnsend
#[derive(Parser, Debug)]
#[command(name = "apnsend")]
#[command(about = "Push notification sending utility for the binary gateway")]
#[command(version)]
struct Args {
    #[command(flatten)]
    conn: ConnArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ClapArgs, Debug)]
struct ConnArgs {
    /// Certificate/key pair stored in one PEM file
    #[arg(long, global = true)]
    pem: Option<String>,

    /// Certificate in PEM format (requires --key)
    #[arg(long, global = true, requires = "key")]
    cer: Option<String>,

    /// Private key in PEM format (requires --cer)
    #[arg(long, global = true, requires = "cer")]
    key: Option<String>,

    /// Use the sandbox environment
    #[arg(long, global = true)]
    sandbox: bool,

    /// Custom gateway host:port (testing or proxy)
    #[arg(long, global = true)]
    gateway: Option<String>,

    /// Verify the gateway's certificate
    #[arg(long, global = true)]
    verify: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send a notification to one or more devices
    Send(SendArgs),

    /// Print the devices reported by the feedback service
    Feedback,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Format {
    Simple,
    Enhanced,
    Framed,
}

#[derive(ClapArgs, Debug)]
struct SendArgs {
    /// Device tokens (hex)
    #[arg(required = true)]
    tokens: Vec<String>,

    /// Wire format
    #[arg(short, long, value_enum, default_value = "framed")]
    format: Format,

    /// Alert text
    #[arg(long)]
    alert: Option<String>,

    /// Badge number
    #[arg(long)]
    badge: Option<u32>,

    /// Sound name
    #[arg(long)]
    sound: Option<String>,

    /// Signal new content for background download
    #[arg(long)]
    content_available: bool,

    /// Raw JSON payload; overrides --alert/--badge/--sound
    #[arg(long)]
    payload: Option<String>,

    /// First notification identifier (incremented per notification)
    #[arg(long, default_value = "1")]
    identifier: u32,

    /// UNIX time after which the notification may be discarded
    #[arg(long)]
    expiry: Option<i32>,

    /// Seconds from now until the notification may be discarded
    #[arg(long)]
    ttl: Option<i32>,

    /// Priority (10 immediate, 5 power conserving); derived from the payload if unset
    #[arg(long)]
    priority: Option<u8>,

    /// Send each notification this many times
    #[arg(long, default_value = "1")]
    repeat: u32,

    /// Delay small writes with Nagle's algorithm
    #[arg(long)]
    tcp_delay: bool,

    /// How long to wait for an error response after sending (ms)
    #[arg(long, default_value = "5000")]
    wait_ms: u64,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,apnslink=debug"));

    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    let result = match &args.command {
        Commands::Send(send) => run_send(&args.conn, send),
        Commands::Feedback => run_feedback(&args.conn),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run_send(conn: &ConnArgs, args: &SendArgs) -> Result<()> {
    let mut builder = Config::builder()
        .sandbox(conn.sandbox)
        .verify_peer(conn.verify)
        .coalesce_writes(args.tcp_delay);
    if let Some(gateway) = &conn.gateway {
        builder = builder.push_addr(gateway);
    }
    let config = builder.build();

    let (payload, default_priority) = build_payload(args)?;
    let expiry = expiry(args)?;
    let tokens = args
        .tokens
        .iter()
        .map(|t| hex::decode(t).map_err(|e| ApnsError::Config(format!("bad token {}: {}", t, e))))
        .collect::<Result<Vec<_>>>()?;

    let identity = load_identity(conn)?;
    let factory = TransportFactory::new(config, identity.as_ref())?;
    let stream = factory.connect_push()?;
    tracing::info!("Connected to {}", factory.resolve(apnslink::Destination::Push));

    // Successful notifications get no answer, so silence until the
    // deadline means everything was accepted.
    let mut session = PushSession::start(stream, Duration::from_millis(args.wait_ms.max(1)))?;

    let mut identifier = args.identifier;
    for _ in 0..args.repeat {
        for token in &tokens {
            let notification = match args.format {
                Format::Simple => Notification::simple(token.clone(), payload.clone()),
                Format::Enhanced => {
                    Notification::enhanced(identifier, expiry, token.clone(), payload.clone())
                }
                Format::Framed => FramedNotification::new(token.clone(), payload.clone())
                    .with_identifier(identifier)
                    .with_expiry(expiry)
                    .with_priority(args.priority.map(Priority).unwrap_or(default_priority))
                    .into(),
            };
            tracing::debug!("Sending: {}", notification);
            session.send(&notification)?;
            identifier = identifier.wrapping_add(1);
        }
    }

    session.finish()?;
    tracing::info!(
        "Sent {} notification(s), no error reported",
        identifier.wrapping_sub(args.identifier)
    );
    Ok(())
}

fn run_feedback(conn: &ConnArgs) -> Result<()> {
    let mut builder = Config::builder().sandbox(conn.sandbox).verify_peer(conn.verify);
    if let Some(gateway) = &conn.gateway {
        builder = builder.feedback_addr(gateway);
    }

    let identity = load_identity(conn)?;
    let factory = TransportFactory::new(builder.build(), identity.as_ref())?;
    let mut stream = factory.connect_feedback()?;

    let mut count = 0usize;
    while let Some(tuple) = read_feedback(&mut stream)? {
        println!("{} {}", tuple.timestamp, hex::encode(&tuple.token));
        count += 1;
    }
    tracing::info!("Feedback service reported {} device(s)", count);
    Ok(())
}

fn load_identity(conn: &ConnArgs) -> Result<Option<Identity>> {
    match (&conn.pem, &conn.cer, &conn.key) {
        (Some(pem), _, _) => Identity::from_pem_file(pem).map(Some),
        (None, Some(cer), Some(key)) => Identity::from_pem_files(cer, key).map(Some),
        _ => {
            tracing::warn!("No certificate given, using an unauthenticated connection");
            Ok(None)
        }
    }
}

fn build_payload(args: &SendArgs) -> Result<(Vec<u8>, Priority)> {
    let max = match args.format {
        Format::Framed => u16::MAX as usize,
        _ => MAX_LEGACY_PAYLOAD_SIZE,
    };

    if let Some(raw) = &args.payload {
        validate_payload(raw.as_bytes(), max)?;
        return Ok((raw.as_bytes().to_vec(), Priority::IMMEDIATE));
    }

    let mut payload = Payload::default();
    payload.aps.alert = args.alert.clone();
    payload.aps.badge = args.badge;
    payload.aps.sound = args.sound.clone();
    if args.content_available {
        payload = payload.with_content_available();
    }
    if payload.aps == Default::default() {
        return Err(ApnsError::Config(
            "one of --payload, --alert, --badge, --sound or --content-available is required"
                .to_string(),
        ));
    }

    let bytes = payload.to_bytes()?;
    validate_payload(&bytes, max)?;
    Ok((bytes, payload.recommended_priority()))
}

/// --expiry wins over --ttl; neither means "do not store"
fn expiry(args: &SendArgs) -> Result<i32> {
    if let Some(expiry) = args.expiry {
        return Ok(expiry);
    }
    let Some(ttl) = args.ttl else {
        return Ok(0);
    };
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| ApnsError::Config(format!("system clock before UNIX epoch: {}", e)))?
        .as_secs();
    Ok((now as i64 + ttl as i64).clamp(i32::MIN as i64, i32::MAX as i64) as i32)
}
