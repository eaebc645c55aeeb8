//! devlink - Pair two devices over the local network and offload tasks
//!
//! `serve` runs the desktop side: it issues a pairing credential,
//! renders it as a QR code, and answers pairing handshakes and task
//! requests. `pair` and `send` run the peer side.

use anyhow::Result;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use clap::{Parser, Subcommand};
use devlink_core::{DeviceInfo, DeviceRole, LinkConfig, TaskKind, TaskRequest, TaskResponse};
use devlink_net::{pair_with, TaskHandler, TaskListener, TcpTransport};
use devlink_pairing::{PairingCredential, PairingSession};
use devlink_progress::{points_for, FileAdapter, ProgressStore, SkillTree};
use devlink_tasks::TaskCorrelator;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

/// devlink - delegate tasks to a linked device
#[derive(Parser, Debug)]
#[command(name = "devlink")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Issue a pairing credential and answer pairing/task requests
    Serve {
        /// Listening port (default from DEVLINK_PORT or 8765)
        #[arg(short, long)]
        port: Option<u16>,

        /// Device name shown to the peer
        #[arg(long, default_value = "Desktop")]
        name: String,
    },
    /// Present a scanned/typed pairing code to the issuing device
    Pair {
        /// The base64 pairing code
        #[arg(long)]
        code: String,

        /// Device name shown to the peer
        #[arg(long, default_value = "Phone")]
        name: String,
    },
    /// Offload one task to the peer and print its response
    Send {
        /// Peer endpoint, e.g. 192.168.1.5:8765
        #[arg(long)]
        peer: SocketAddr,

        /// Task kind: validation, computation, sync
        #[arg(long, default_value = "validation")]
        kind: String,

        /// JSON payload
        #[arg(long, default_value = "{}")]
        payload: String,
    },
    /// Print stored progress (points, unlocked modules)
    Status,
    /// Reset stored progress
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    info!("devlink v{}", env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::Serve { port, name } => serve(port, name).await,
        Command::Pair { code, name } => pair(code, name).await,
        Command::Send {
            peer,
            kind,
            payload,
        } => send(peer, kind, payload).await,
        Command::Status => status().await,
        Command::Reset => reset().await,
    }
}

async fn serve(port: Option<u16>, name: String) -> Result<()> {
    let mut config = LinkConfig::from_env();
    if let Some(port) = port {
        config.port = port;
    }

    let local_ip = get_local_ip().unwrap_or_else(|| "127.0.0.1".to_string());
    let local = DeviceInfo::new(name, DeviceRole::Desktop)
        .with_endpoint(local_ip.clone(), config.port)
        .with_capabilities(vec![
            "validation".into(),
            "computation".into(),
            "sync".into(),
        ]);

    let session = Arc::new(PairingSession::new(config.pairing_ttl));
    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    let listener = TaskListener::bind(addr, session.clone(), local.clone()).await?;

    let credential = session.issue_credential(&local);
    display_credential(&credential);

    // Reissue while unpaired, so a stale QR code never lingers
    let refresh_session = session.clone();
    let refresh_local = local.clone();
    let ttl = config.pairing_ttl;
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(ttl).await;
            if refresh_session.status().is_linked {
                info!("device paired, stopping credential refresh");
                break;
            }
            let credential = refresh_session.issue_credential(&refresh_local);
            println!();
            println!("  Pairing code refreshed.");
            display_credential(&credential);
        }
    });

    info!(
        "Listening on {}:{}. Press Ctrl+C to stop.",
        local_ip, config.port
    );

    let store = progress_store()?;
    let handler = Arc::new(WorkHandler { store });
    tokio::select! {
        result = listener.run(handler) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down..."),
    }
    Ok(())
}

async fn pair(code: String, name: String) -> Result<()> {
    let decoded = BASE64.decode(code.trim())?;
    let credential: PairingCredential = serde_json::from_slice(&decoded)?;

    let config = LinkConfig::from_env();
    let local = DeviceInfo::new(name, DeviceRole::Mobile);
    let session = PairingSession::new(config.pairing_ttl);

    let remote = pair_with(&credential, &local).await?;
    if !session.complete_pairing(&credential, remote.clone()) {
        anyhow::bail!("pairing credential expired before completion");
    }

    println!("Linked with {} ({})", remote.name, remote.id);
    if let (Some(address), Some(port)) = (&remote.address, remote.port) {
        println!("Peer endpoint: {}:{}", address, port);
    }
    Ok(())
}

async fn send(peer: SocketAddr, kind: String, payload: String) -> Result<()> {
    let kind: TaskKind = kind.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let payload: serde_json::Value = serde_json::from_str(&payload)?;

    let config = LinkConfig::from_env();
    let correlator = Arc::new(TaskCorrelator::new(config.task_timeout));
    let transport = TcpTransport::new(peer, correlator.clone());

    let request = TaskRequest::new(kind, payload);
    info!(task = %request.task_id, kind = %kind, "offloading task");

    match correlator.offload(request, &transport).await {
        Ok(response) => {
            if response.succeeded {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&response.result.unwrap_or(json!(null)))?
                );
            } else {
                warn!(
                    "task failed on peer: {}",
                    response.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
        Err(e) => {
            warn!("offload failed: {}", e);
            std::process::exit(1);
        }
    }
    Ok(())
}

async fn status() -> Result<()> {
    let store = progress_store()?;
    let tree = SkillTree::from_progress(store.load().await?);
    let progress = tree.progress();

    println!("Points:    {}", progress.points);
    println!("Unlocked:  {}", progress.unlocked_modules.join(", "));
    if !progress.available_unlocks.is_empty() {
        println!("Available: {}", progress.available_unlocks.join(", "));
    }
    match tree.points_until_next_unlock() {
        Some(n) => println!("Next unlock in {} points", n),
        None => println!("All modules unlocked"),
    }
    Ok(())
}

async fn reset() -> Result<()> {
    progress_store()?.reset().await?;
    println!("Progress reset.");
    Ok(())
}

fn progress_store() -> Result<ProgressStore> {
    Ok(ProgressStore::new(Box::new(FileAdapter::new()?)))
}

/// Answers peer task requests and awards points for completed work
struct WorkHandler {
    store: ProgressStore,
}

#[async_trait]
impl TaskHandler for WorkHandler {
    async fn handle(&self, request: TaskRequest) -> TaskResponse {
        let kind = request.kind;
        let response = execute_task(request);

        if response.succeeded {
            if let Err(e) = self.award(kind).await {
                warn!("failed to record progress: {}", e);
            }
        }
        response
    }
}

impl WorkHandler {
    async fn award(&self, kind: TaskKind) -> Result<()> {
        let mut tree = SkillTree::from_progress(self.store.load().await?);
        tree.award_points(points_for(kind));
        self.store.save(tree.progress()).await?;
        Ok(())
    }
}

fn execute_task(request: TaskRequest) -> TaskResponse {
    match request.kind {
        TaskKind::Validation => {
            TaskResponse::ok(request.task_id, json!({"valid": true, "confidence": 0.92}))
        }
        TaskKind::Computation => match compute(&request.payload) {
            Some(result) => TaskResponse::ok(request.task_id, result),
            None => TaskResponse::fail(
                request.task_id,
                "unsupported computation; expected {\"op\": \"sum\", \"values\": [..]}",
            ),
        },
        TaskKind::Sync => TaskResponse::ok(request.task_id, request.payload),
    }
}

fn compute(payload: &serde_json::Value) -> Option<serde_json::Value> {
    if payload.get("op")?.as_str()? != "sum" {
        return None;
    }
    let values = payload.get("values")?.as_array()?;
    let sum: f64 = values.iter().filter_map(|v| v.as_f64()).sum();
    Some(json!({"sum": sum}))
}

/// Encode a credential for out-of-band exchange and show it as QR + text
fn display_credential(credential: &PairingCredential) {
    let code = match serde_json::to_vec(credential) {
        Ok(json) => BASE64.encode(json),
        Err(e) => {
            warn!("failed to encode pairing credential: {}", e);
            return;
        }
    };

    display_qr_code(&code);
    println!();
    println!("  Pairing code (or scan the QR above):");
    println!("  {}", code);
    println!();
    println!(
        "  Expires at {}",
        credential.expires_at.format("%H:%M:%S UTC")
    );
    println!();
}

/// Display a QR code in the terminal
fn display_qr_code(data: &str) {
    use qrcode::QrCode;

    let code = match QrCode::new(data.as_bytes()) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to generate QR code: {}", e);
            return;
        }
    };

    let string = code
        .render::<char>()
        .quiet_zone(true)
        .module_dimensions(2, 1)
        .build();

    for line in string.lines() {
        println!("  {}", line);
    }
}

/// Get the local IP address
fn get_local_ip() -> Option<String> {
    use std::net::UdpSocket;

    // Connecting a UDP socket sends nothing but reveals the local IP
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    let addr = socket.local_addr().ok()?;
    Some(addr.ip().to_string())
}
