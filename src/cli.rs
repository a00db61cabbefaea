use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "portmsg", about = "Port messaging core: route, spool and receive messages")]
pub struct Cli {
    /// Path to config file (default: ./config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Send a message to a chat
    Send(SendArgs),
    /// Retry a spooled message
    Retry {
        #[arg(long)]
        message_id: String,
    },
    /// Process a decrypted inbound message file
    Receive {
        /// TOML file holding the inbound message
        path: PathBuf,
    },
    /// List chats, most recent first
    Chats {
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Register or update a chat
    AddChat(AddChatArgs),
}

#[derive(Debug, Clone, Args)]
#[command(group(
    ArgGroup::new("content")
        .required(true)
        .args(["text", "link", "image", "video", "file", "voice", "contact"])
        .multiple(false)
))]
pub struct SendArgs {
    #[arg(long)]
    pub chat: String,

    #[arg(long)]
    pub text: Option<String>,
    #[arg(long)]
    pub link: Option<String>,
    #[arg(long)]
    pub image: Option<PathBuf>,
    #[arg(long)]
    pub video: Option<PathBuf>,
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// Audio recording; requires --duration-ms
    #[arg(long, requires = "duration_ms")]
    pub voice: Option<PathBuf>,
    #[arg(long)]
    pub duration_ms: Option<u64>,
    /// Share a contact bundle under this name
    #[arg(long)]
    pub contact: Option<String>,
    /// Caption for media, or the text shown with --link
    #[arg(long)]
    pub caption: Option<String>,

    #[arg(long)]
    pub reply_to: Option<String>,
    #[arg(long)]
    pub message_id: Option<String>,
    /// Deliver a group message to one member only
    #[arg(long)]
    pub recipient: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct AddChatArgs {
    #[arg(long)]
    pub chat: String,
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub group: bool,
    /// Disable notifications for this chat
    #[arg(long)]
    pub muted: bool,
    #[arg(long)]
    pub disconnected: bool,
}

impl Cli {
    pub fn command_or_default(&self) -> Command {
        self.command
            .clone()
            .unwrap_or(Command::Chats { limit: 50 })
    }
}
