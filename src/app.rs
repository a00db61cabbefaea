use std::{
    cell::Cell,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};

use crate::{
    cli::{AddChatArgs, Cli, Command, SendArgs},
    domain::{
        chat::{ChatPermissions, ChatType},
        connection::{Connection, ConnectionSummary},
        content::{
            AudioParams, ContactBundle, ContactBundleParams, LinkParams, MediaParams, MessageData,
            TextParams,
        },
        message::{random_hex_id, InboundMessage, OutgoingMessage},
    },
    infra::{
        notifier::ConsoleNotifier,
        spool::{find_spooled, SpoolDelivery},
    },
    usecases::{
        bootstrap,
        context::AppContext,
        contracts::Notifier,
        list_chats::{list_chats, ListChatsQuery},
        receive_message::{perform_receive, ReceiveOutcome, ReceivePorts},
        send_message::{record_outgoing, MessageRouter, RouteError},
    },
};

const SEND_FAILED: &str = "SEND_FAILED";
const NETWORK_ERROR_MESSAGE: &str = "Network error in sending message";

pub fn run(cli: Cli) -> Result<()> {
    let context = bootstrap::bootstrap(cli.config.as_deref())?;
    let notifier = ConsoleNotifier::stdout(context.config.notifications.enabled);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    execute(&context, cli.command_or_default(), &notifier, &mut out)
}

fn execute(
    context: &AppContext,
    command: Command,
    notifier: &dyn Notifier,
    out: &mut dyn Write,
) -> Result<()> {
    match command {
        Command::Send(args) => {
            let message = OutgoingMessage::new(args.chat.clone(), message_data(&args)?)
                .with_reply_id(args.reply_to)
                .with_message_id(args.message_id)
                .with_single_recipient(args.recipient);

            route(context, &message, |router, on_update| {
                router.send(&message, Some(on_update))
            })?;
            writeln!(out, "{}", message.message_id)?;
        }
        Command::Retry { message_id } => {
            let spooled = find_spooled(context.layout(), &message_id)?
                .ok_or_else(|| anyhow!("no spooled message with id {message_id}"))?;
            let message = spooled.message;

            route(context, &message, |router, on_update| {
                router.retry(&message, Some(on_update))
            })?;
            writeln!(out, "{} (attempt {})", message.message_id, spooled.attempts + 1)?;
        }
        Command::Receive { path } => {
            let message = read_inbound(&path)?;
            let ports = ReceivePorts {
                guard: &context.store,
                messages: &context.store,
                connections: &context.store,
                permissions: &context.store,
                notifier,
            };

            match perform_receive(&ports, &message)? {
                ReceiveOutcome::Duplicate => {
                    writeln!(out, "{} already processed", message.message_id)?
                }
                ReceiveOutcome::Processed { notified } => writeln!(
                    out,
                    "{} processed{}",
                    message.message_id,
                    if notified { ", notified" } else { "" }
                )?,
            }
        }
        Command::Chats { limit } => {
            let output = list_chats(&context.store, ListChatsQuery { limit })?;
            for chat in &output.chats {
                writeln!(out, "{}", format_chat_line(chat))?;
            }
        }
        Command::AddChat(args) => {
            let chat_id = args.chat.clone();
            let (connection, permissions) = new_connection(args);
            context.store.add_connection(connection, permissions)?;
            tracing::info!(chat_id = %chat_id, "chat registered");
        }
    }

    Ok(())
}

/// Routes through the spool paths and mirrors the outcome in the chat summary.
fn route(
    context: &AppContext,
    message: &OutgoingMessage,
    dispatch: impl FnOnce(&MessageRouter<'_>, &dyn Fn(bool)) -> Result<(), RouteError>,
) -> Result<()> {
    let direct = SpoolDelivery::new(context.layout(), ChatType::Direct);
    let group = SpoolDelivery::new(context.layout(), ChatType::Group);
    let router = MessageRouter::new(&context.store, &direct, &group);

    let delivered = Cell::new(None);
    let on_update = |success: bool| delivered.set(Some(success));
    let result = dispatch(&router, &on_update);

    if let Some(success) = delivered.get() {
        if let Err(error) = record_outgoing(&context.store, message, success) {
            tracing::warn!(
                error = %error,
                message_id = %message.message_id,
                "failed to update chat summary after send"
            );
        }
    }

    match result {
        Ok(()) => Ok(()),
        Err(RouteError::ChatLookup(error)) => {
            Err(anyhow!(error).context(format!("cannot send to chat {}", message.chat_id)))
        }
        Err(RouteError::Delivery(error)) => {
            tracing::error!(
                code = SEND_FAILED,
                error = %error,
                message_id = %message.message_id,
                "message delivery failed"
            );
            bail!(NETWORK_ERROR_MESSAGE)
        }
    }
}

fn message_data(args: &SendArgs) -> Result<MessageData> {
    let caption = args.caption.clone();

    if let Some(text) = &args.text {
        let text = text.trim();
        if text.is_empty() {
            bail!("message text is empty");
        }
        return Ok(MessageData::Text(TextParams {
            text: text.to_owned(),
        }));
    }
    if let Some(url) = &args.link {
        return Ok(MessageData::Link(LinkParams {
            text: caption.unwrap_or_default(),
            url: url.clone(),
        }));
    }
    if let Some(path) = &args.image {
        return Ok(MessageData::Image(media_params(path, caption)?));
    }
    if let Some(path) = &args.video {
        return Ok(MessageData::Video(media_params(path, caption)?));
    }
    if let Some(path) = &args.file {
        return Ok(MessageData::File(media_params(path, caption)?));
    }
    if let Some(path) = &args.voice {
        let duration_ms = args
            .duration_ms
            .context("--voice requires --duration-ms")?;
        return Ok(MessageData::AudioRecording(AudioParams {
            file_uri: file_uri(path)?,
            duration_ms,
        }));
    }
    if let Some(name) = &args.contact {
        return Ok(MessageData::ContactBundle(ContactBundleParams {
            bundle: ContactBundle {
                name: name.clone(),
                bundle_id: random_hex_id(),
            },
        }));
    }

    bail!("no message content given")
}

fn media_params(path: &Path, caption: Option<String>) -> Result<MediaParams> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", path.display()))?;

    Ok(MediaParams {
        mime_type: mime_type_for(path).to_owned(),
        file_uri: file_uri(path)?,
        file_name,
        caption,
    })
}

fn file_uri(path: &Path) -> Result<String> {
    let absolute: PathBuf = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("failed to resolve current directory")?
            .join(path)
    };

    Ok(format!("file://{}", absolute.display()))
}

fn mime_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "m4a" => "audio/mp4",
        "mp3" => "audio/mpeg",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

fn read_inbound(path: &Path) -> Result<InboundMessage> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read inbound message at {}", path.display()))?;

    toml::from_str(&raw)
        .with_context(|| format!("failed to parse inbound message at {}", path.display()))
}

fn new_connection(args: AddChatArgs) -> (Connection, ChatPermissions) {
    let connection = Connection {
        chat_id: args.chat,
        name: args.name,
        chat_type: if args.group {
            ChatType::Group
        } else {
            ChatType::Direct
        },
        disconnected: args.disconnected,
        summary: ConnectionSummary::default(),
    };
    let permissions = ChatPermissions {
        notifications: !args.muted,
        ..ChatPermissions::default()
    };

    (connection, permissions)
}

fn format_chat_line(chat: &Connection) -> String {
    let when = chat
        .summary
        .timestamp
        .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_owned());
    let unread = if chat.summary.unread_count > 0 {
        format!(" ({})", chat.summary.unread_count)
    } else {
        String::new()
    };
    let disconnected = if chat.disconnected {
        " [disconnected]"
    } else {
        ""
    };

    format!(
        "{when}  {}{unread} [{}]{disconnected}  {}",
        chat.name,
        chat.chat_type.as_str(),
        chat.summary.text
    )
}
