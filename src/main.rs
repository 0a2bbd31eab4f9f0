use std::error::Error;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use dotenvy::dotenv;
use tokio::sync::mpsc;

use schat_client::common::{ChatId, ClientContext, UserId};
use schat_client::config::{self, ClientConfig};
use schat_client::network::{ChatClient, HttpChatApi, NetworkConnector, TransportSession};
use schat_client::ui::components::sidebar::Placeholders;
use schat_client::ui::{AppState, ConsoleApp, PageMode};

#[derive(Parser)]
#[command(name = "schat", version, about = "Terminal client for S-Chat servers")]
struct Cli {
    /// Path to JSON config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: String,
    #[arg(long, env = "SCHAT_SERVER_URL")]
    server_url: Option<String>,
    /// Id of the signed-in user
    #[arg(long, env = "SCHAT_USER_ID")]
    user_id: Option<String>,
    /// Chat to open once the directory is loaded
    #[arg(long, value_name = "CHAT_ID")]
    chat: Option<String>,
    #[arg(long, value_enum, default_value_t = Page::Chat)]
    page: Page,
    /// Write the effective settings back to the config file
    #[arg(long)]
    save_config: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Page {
    Chat,
    Auth,
    Other,
}

impl From<Page> for PageMode {
    fn from(page: Page) -> Self {
        match page {
            Page::Chat => PageMode::Chat,
            Page::Auth => PageMode::Auth,
            Page::Other => PageMode::Other,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let mut app_config = config::load_config(&cli.config);
    if let Some(server_url) = cli.server_url {
        app_config.server_url = server_url;
    }
    if let Some(user_id) = cli.user_id {
        app_config.user_id = Some(user_id);
    }
    if cli.save_config {
        config::save_config(&cli.config, &app_config)?;
        log::info!("Saved settings to {}", cli.config);
    }

    match PageMode::from(cli.page) {
        PageMode::Chat => run_chat(app_config, cli.chat).await,
        PageMode::Auth => {
            println!("Sign in through the S-Chat web page, then start the chat view with --user-id <id>.");
            Ok(())
        }
        PageMode::Other => {
            log::info!("No front-end for this page");
            Ok(())
        }
    }
}

async fn run_chat(app_config: ClientConfig, chat: Option<String>) -> Result<(), Box<dyn Error>> {
    let Some(user_id) = app_config.user_id.as_deref() else {
        return Err("no user id configured; pass --user-id or set SCHAT_USER_ID".into());
    };
    let Ok(user_id) = user_id.parse::<UserId>();
    let context = ClientContext::new(user_id);

    let http = reqwest::Client::new();
    let session = TransportSession::new(
        app_config.session_config(),
        Arc::new(NetworkConnector::new(http.clone())),
    );
    let api = Arc::new(HttpChatApi::new(
        http,
        &app_config.server_url,
        app_config.history_per_page,
    ));

    // Console -> client
    let (cmd_tx, cmd_rx) = mpsc::channel(100);
    // Client -> console
    let (event_tx, event_rx) = mpsc::channel(100);

    let client = ChatClient::new(context.clone(), session, api, &app_config, event_tx, cmd_rx);
    let network = tokio::spawn(client.run());

    let placeholders = Placeholders {
        chat_name: app_config.chat_name_placeholder.clone(),
        preview: app_config.preview_placeholder.clone(),
    };
    let initial_chat = chat.map(|id| {
        let Ok(chat_id) = id.parse::<ChatId>();
        chat_id
    });

    ConsoleApp::new(AppState::new(context, placeholders), cmd_tx, event_rx)
        .with_initial_chat(initial_chat)
        .with_reconnect_delay(app_config.reconnect_delay())
        .run()
        .await;

    if let Err(err) = network.await {
        log::error!("Chat client terminated: {err}");
    }
    Ok(())
}
