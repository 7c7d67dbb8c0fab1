use std::fs::File;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use nirplay::{
    BuiltinCodecFactory, CodecId, NodeNotifications, NodeType, Player, Result, SeekOrigin,
};

#[derive(Parser)]
#[command(name = "nirplay", version = "1.0.0", about = "The .nir recording replay CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show recording metadata and the node table as JSON
    Info {
        input: PathBuf,
    },
    /// Replay the recording, printing every notification
    Dump {
        input: PathBuf,
        /// Stop after this many data frames (default: play to the end)
        #[arg(short, long)]
        frames: Option<u64>,
        /// Suppress frame payload previews
        #[arg(short, long)]
        quiet: bool,
    },
    /// Seek a node to a frame and print the frames delivered on the way
    Seek {
        input: PathBuf,
        /// Node name, e.g. "depth"
        #[arg(short, long)]
        node: String,
        /// Destination frame number (1-based)
        #[arg(short, long)]
        frame: u32,
    },
}

// ── Notification sinks ───────────────────────────────────────────────────────

/// Discards everything; used when only player state is of interest.
struct SilentSink;
impl NodeNotifications for SilentSink {}

/// Prints one line per notification.
struct PrintSink {
    quiet: bool,
    data_frames: u64,
}

impl PrintSink {
    fn new(quiet: bool) -> Self {
        Self { quiet, data_frames: 0 }
    }
}

impl NodeNotifications for PrintSink {
    fn on_node_added(
        &mut self,
        name: &str,
        node_type: NodeType,
        codec: CodecId,
        frames: u32,
    ) -> Result<()> {
        println!("node-added   {name} type={} codec={codec} frames={frames}", node_type.name());
        Ok(())
    }

    fn on_node_removed(&mut self, name: &str) -> Result<()> {
        println!("node-removed {name}");
        Ok(())
    }

    fn on_node_state_ready(&mut self, name: &str) -> Result<()> {
        println!("state-ready  {name}");
        Ok(())
    }

    fn on_node_int_prop_changed(&mut self, name: &str, prop: &str, value: u64) -> Result<()> {
        println!("prop         {name}.{prop} = {value}");
        Ok(())
    }

    fn on_node_real_prop_changed(&mut self, name: &str, prop: &str, value: f64) -> Result<()> {
        println!("prop         {name}.{prop} = {value}");
        Ok(())
    }

    fn on_node_string_prop_changed(&mut self, name: &str, prop: &str, value: &str) -> Result<()> {
        println!("prop         {name}.{prop} = {value:?}");
        Ok(())
    }

    fn on_node_general_prop_changed(&mut self, name: &str, prop: &str, data: &[u8]) -> Result<()> {
        println!("prop         {name}.{prop} = <{} bytes>", data.len());
        Ok(())
    }

    fn on_node_new_data(
        &mut self,
        name: &str,
        timestamp: u64,
        frame_number: u32,
        data: &[u8],
    ) -> Result<()> {
        self.data_frames += 1;
        if self.quiet {
            println!("data         {name} frame={frame_number} ts={timestamp}");
        } else {
            let preview: Vec<String> =
                data.iter().take(8).map(|b| format!("{b:02x}")).collect();
            println!(
                "data         {name} frame={frame_number} ts={timestamp} bytes={} [{}…]",
                data.len(),
                preview.join(" ")
            );
        }
        Ok(())
    }
}

// ── Info output ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct InfoNode {
    id: u32,
    name: String,
    node_type: &'static str,
    codec: String,
    generator: bool,
    frames: u32,
    seek_table: bool,
}

#[derive(Serialize)]
struct InfoOutput {
    path: String,
    version: String,
    global_max_timestamp: u64,
    nodes: Vec<InfoNode>,
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    match Cli::parse().command {
        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input } => {
            let player =
                Player::open(File::open(&input)?, SilentSink, Box::new(BuiltinCodecFactory))?;

            let info = InfoOutput {
                path: input.display().to_string(),
                version: player.version().to_string(),
                global_max_timestamp: player.global_max_timestamp(),
                nodes: player
                    .node_summaries()
                    .into_iter()
                    .map(|n| InfoNode {
                        id: n.id,
                        name: n.name,
                        node_type: n.node_type.name(),
                        codec: n.codec.name(),
                        generator: n.is_generator,
                        frames: n.frames,
                        seek_table: n.has_seek_table,
                    })
                    .collect(),
            };
            println!("{}", serde_json::to_string_pretty(&info)?);
        }

        // ── Dump ─────────────────────────────────────────────────────────────
        Commands::Dump { input, frames, quiet } => {
            let mut player = Player::open(
                File::open(&input)?,
                PrintSink::new(quiet),
                Box::new(BuiltinCodecFactory),
            )?;
            player.set_repeat(false);

            while !player.is_eof() {
                if let Some(limit) = frames {
                    if player.notifications().data_frames >= limit {
                        break;
                    }
                }
                player.read_next()?;
            }
        }

        // ── Seek ─────────────────────────────────────────────────────────────
        Commands::Seek { input, node, frame } => {
            let mut player = Player::open(
                File::open(&input)?,
                PrintSink::new(true),
                Box::new(BuiltinCodecFactory),
            )?;
            player.set_repeat(false);

            player.seek_to_frame(&node, i64::from(frame), SeekOrigin::Set)?;
            println!(
                "seeked       {node} -> frame {} (timestamp {})",
                player.tell_frame(&node)?,
                player.tell_timestamp()
            );
        }
    }

    Ok(())
}
