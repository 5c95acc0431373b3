use anyhow::Result;
use clap::Parser;
use client_core::{directory, ClientEvent, MirageClient};
use shared::domain::ChatEvent;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

#[derive(Parser, Debug)]
struct Args {
    /// Server pool document; MIRAGE_SERVERS overrides when --servers is
    /// not given.
    #[arg(long)]
    servers: Option<std::path::PathBuf>,
    #[arg(long)]
    username: String,
    #[arg(long)]
    password: String,
    /// Register the account before logging in.
    #[arg(long)]
    register: bool,
    #[arg(long, default_value = "#general")]
    channel: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let servers_path = args.servers.unwrap_or_else(directory::servers_path);
    let servers = directory::load_servers(&servers_path)?;
    let client = MirageClient::new(servers);

    let server = client.select_server().await?;
    println!("Connected to {} ({}:{})", server.id, server.host, server.port);

    if args.register {
        client.register(&args.username, &args.password).await?;
        println!("Registration successful! You can now login.");
    }

    let channels = client.login(&args.username, &args.password).await?;
    println!("Logged in as {}; channels: {}", args.username, channels.join(", "));

    let mut events = client.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ClientEvent::Message(ChatEvent::Plain { text })
                | ClientEvent::Message(ChatEvent::System { text }) => println!("{text}"),
                ClientEvent::Message(ChatEvent::FileShare {
                    filename,
                    size_label,
                    download_path,
                }) => println!("-- file shared: {filename} ({size_label}) at {download_path}"),
                ClientEvent::RosterUpdated(users) => println!("-- users: {}", users.join(", ")),
                ClientEvent::TopicUpdated { channel, topic } => {
                    println!("-- topic for {channel}: {topic}");
                }
                ClientEvent::FileListUpdated(files) => {
                    println!("-- {} file(s) shared in this channel", files.len());
                }
                ClientEvent::SessionExpired => {
                    println!("Session expired");
                    std::process::exit(1);
                }
                ClientEvent::Error(message) => warn!("{message}"),
            }
        }
    });

    client.switch_channel(&args.channel).await?;
    client.start_polling().await;

    // Lines go out as-is; the codec decides message vs command. /quit is
    // the only input handled locally.
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim() == "/quit" {
            break;
        }
        if let Err(err) = client.send_message(&line).await {
            warn!("send failed: {err}");
        }
    }

    client.stop_polling().await;
    client.logout().await;
    Ok(())
}
