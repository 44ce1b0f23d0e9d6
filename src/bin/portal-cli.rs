//! Portal CLI client (test build)
//!
//! Non-interactive CLI for exercising the sync engine against a live portal
//! server: connects, dumps the contact list, optionally opens one
//! conversation, then keeps polling and printing whatever arrives.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info};
use waportal_sdk_core::portal::format;
use waportal_sdk_core::{Contact, Message, PortalListener, SyncEngine, SyncEngineConfig};

/// Portal CLI client
#[derive(Parser, Debug)]
#[command(name = "portal-cli")]
#[command(about = "Portal CLI client for exercising conversation sync", long_about = None)]
struct Args {
    /// Portal server base URL
    #[arg(short, long, default_value = "http://localhost:5000")]
    server: String,

    /// Phone account to act for
    #[arg(short, long, default_value = "default")]
    phone_id: String,

    /// Conversation to open after the initial load (wa_id)
    #[arg(short, long)]
    open: Option<String>,

    /// One message to send to the opened conversation
    #[arg(long)]
    send: Option<String>,

    /// Run time in seconds, 0 keeps running
    #[arg(short, long, default_value = "0")]
    duration: u64,

    /// Log level (default: info,waportal_sdk_core=debug)
    #[arg(long, default_value = "info,waportal_sdk_core=debug")]
    log_level: String,
}

/// Initialize logging to both stdout and a file.
fn init_logger(log_level: &str) {
    use std::fs::OpenOptions;
    use std::io;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    // RUST_LOG wins over the command line flag when set.
    let filter_layer =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
        .expect("cannot create log file debug.log");

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .with_ansi(true);

    // No ANSI color codes in the file.
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    info!("[CLI] 📝 logging to console and file: debug.log");
}

/// Listener that renders engine callbacks as log lines.
struct CliPortalListener;

#[async_trait::async_trait]
impl PortalListener for CliPortalListener {
    async fn render_contact_list(&self, contacts: Vec<Contact>) {
        info!("[CLI/Contacts] 📋 contact list ({} chats):", contacts.len());
        for contact in contacts.iter().take(10) {
            let when = contact
                .last_message_timestamp
                .map(|ts| format::format_full_timestamp(&ts))
                .unwrap_or_else(|| "-".to_string());
            info!(
                "[CLI/Contacts]   [{}] {} | unread: {} | {} | {}",
                format::initials(&contact.name),
                contact.name,
                contact.unread_count,
                when,
                format::preview(&contact.last_message, 30)
            );
        }
    }

    async fn render_messages(&self, messages: Vec<Message>, pinned_to_bottom: bool) {
        info!(
            "[CLI/Messages] 💬 conversation re-rendered, {} messages (pinned={})",
            messages.len(),
            pinned_to_bottom
        );
        for msg in messages.iter().rev().take(5).rev() {
            let marker = match msg.direction {
                waportal_sdk_core::Direction::Inbound => "←",
                waportal_sdk_core::Direction::Outbound => format::status_glyph(msg.status),
            };
            info!(
                "[CLI/Messages]   {} {} {}",
                format::format_clock_time(&msg.timestamp),
                marker,
                format::preview(&msg.body, 60)
            );
        }
    }

    async fn notify_new_inbound_message(&self, contact: Contact, preview: String) {
        info!(
            "[CLI/Notify] 📨 new message from {} ({}): {}",
            contact.name, contact.wa_id, preview
        );
    }

    async fn on_load_failed(&self, wa_id: String, error: String) {
        error!("[CLI/Messages] ❌ load failed for {}: {}", wa_id, error);
    }

    async fn on_send_failed(&self, wa_id: String, body: String, error: String) {
        error!(
            "[CLI/Messages] ❌ send to {} failed ({}), body kept: {}",
            wa_id, error, body
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logger(&args.log_level);

    info!("[CLI] 🚀 Portal CLI client");
    info!("[CLI] 🌐 server: {}", args.server);
    info!("[CLI] 📱 phone account: {}", args.phone_id);
    info!("[CLI] ⏱️  run time: {} seconds (0=run forever)", args.duration);

    let mut config = SyncEngineConfig::new(args.phone_id.clone());
    config.api_base_url = args.server.clone();

    let engine = Arc::new(
        SyncEngine::with_listener(config, Arc::new(CliPortalListener))
            .map_err(|e| anyhow::anyhow!("engine setup failed: {}", e))?,
    );

    info!("[CLI] 📡 loading contact list...");
    engine
        .refresh_contact_list()
        .await
        .map_err(|e| anyhow::anyhow!("initial contact load failed: {}", e))?;
    info!("[CLI] ✅ connected, total unread: {}", engine.total_unread_count().await);

    if let Some(wa_id) = &args.open {
        let name = engine
            .contacts()
            .await
            .iter()
            .find(|c| &c.wa_id == wa_id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| wa_id.clone());
        info!("[CLI] 💬 opening conversation {} ({})", wa_id, name);
        engine.select_conversation(wa_id, &name).await;
    }

    if let Some(body) = &args.send {
        if args.open.is_none() {
            error!("[CLI] ⚠️ --send needs --open to know the conversation");
        } else if let Err(e) = engine.send_message(body).await {
            error!("[CLI] ❌ send failed: {}", e);
        }
    }

    engine.clone().start_polling();
    info!("[CLI] 📥 polling for updates...");

    if args.duration > 0 {
        info!("[CLI] ⏰ exiting after {} seconds", args.duration);
        sleep(Duration::from_secs(args.duration)).await;
        engine.stop_polling();
        info!("[CLI] 👋 done");
    } else {
        info!("[CLI] ⏰ running, press Ctrl+C to quit");
        loop {
            sleep(Duration::from_secs(3600)).await;
        }
    }

    Ok(())
}
