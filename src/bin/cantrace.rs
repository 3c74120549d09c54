//! Dump whatever RT/RPC/PS/BW frames arrive on a transport, either as
//! structured `tracing` events or as JSON lines.

use std::io::IsTerminal;
use std::time::Duration;

use canlink::context::Context;
use canlink::transport::loopback::LoopbackConfig;
use canlink::transport::FrameTransport;
use clap::Parser;

/// Trace CAN frames from a RT/RPC/PS/BW node onto stdout
#[derive(Debug, Parser)]
#[clap(version, verbatim_doc_comment)]
struct Args {
    #[clap(short, long, default_value_t = tracing::Level::INFO)]
    log_level: tracing::Level,

    /// This node's 6-bit address, used only to label the trace output
    #[clap(long, default_value_t = 0)]
    node_address: u8,

    /// Emit each frame as a JSON line instead of a tracing event
    #[clap(long)]
    json: bool,

    #[clap(subcommand)]
    transport: TransportArgs,
}

#[derive(Debug, clap::Subcommand)]
enum TransportArgs {
    /// Linux SocketCAN interface (e.g. `can0`)
    #[cfg(target_os = "linux")]
    Native { interface: String },
    /// Length-prefixed TCP loopback, for testing without CAN hardware
    Loopback {
        host: String,
        port: u16,
        /// Listen instead of connecting
        #[clap(long)]
        server: bool,
    },
}

fn trace_loop<T: FrameTransport>(mut ctx: Context<T>, json: bool) -> eyre::Result<()> {
    loop {
        match ctx.receive_raw(Duration::from_secs(1)) {
            Ok(frame) => {
                if json {
                    println!("{}", serde_json::to_string(&frame)?);
                } else {
                    tracing::info!(
                        can_id = format!("{:#010X}", frame.can_id),
                        dlc = frame.dlc(),
                        data = hex::encode_upper(frame.data()),
                        "frame"
                    );
                }
            }
            Err(canlink::error::CanError::Timeout) => continue,
            Err(e) => {
                tracing::warn!("receive error: {e}");
            }
        }
    }
}

fn main() -> eyre::Result<()> {
    let use_color = std::io::stderr().is_terminal();
    if use_color {
        color_eyre::install()?;
    }

    let args = Args::parse();
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(args.log_level.into())
        .with_env_var("CANTRACE_LOG")
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(use_color)
        .with_writer(std::io::stderr)
        .init();

    match args.transport {
        #[cfg(target_os = "linux")]
        TransportArgs::Native { interface } => {
            let ctx = Context::native(args.node_address, interface)?;
            trace_loop(ctx, args.json)
        }
        TransportArgs::Loopback { host, port, server } => {
            let ctx = Context::loopback(
                args.node_address,
                LoopbackConfig {
                    host,
                    port,
                    is_server: server,
                },
            )?;
            trace_loop(ctx, args.json)
        }
    }
}
