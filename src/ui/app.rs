use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::common::{ChatId, ClientCommand, ClientEvent};
use crate::network::SessionState;

use super::components::input_bar::{self, UiAction};
use super::state::AppState;

/// Which front-end to start, picked once from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMode {
    Chat,
    Auth,
    Other,
}

/// Line-oriented front-end: prints what the client publishes and turns
/// prompt input into commands.
pub struct ConsoleApp {
    state: AppState,
    command_sender: mpsc::Sender<ClientCommand>,
    event_receiver: mpsc::Receiver<ClientEvent>,
    initial_chat: Option<ChatId>,
    reconnect_delay: Option<Duration>,
}

impl ConsoleApp {
    pub fn new(
        state: AppState,
        command_sender: mpsc::Sender<ClientCommand>,
        event_receiver: mpsc::Receiver<ClientEvent>,
    ) -> Self {
        Self {
            state,
            command_sender,
            event_receiver,
            initial_chat: None,
            reconnect_delay: None,
        }
    }

    /// Chat to open as soon as the directory arrives.
    pub fn with_initial_chat(mut self, chat_id: Option<ChatId>) -> Self {
        self.initial_chat = chat_id;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Option<Duration>) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub async fn run(mut self) {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        println!("Commands: /chats, /open <id>, /quit. Anything else is sent to the open chat.");

        loop {
            tokio::select! {
                event = self.event_receiver.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        log::warn!("Chat client stopped; closing console");
                        break;
                    }
                },
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if !self.handle_input(&line) {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        log::error!("Failed to read input: {err}");
                        break;
                    }
                },
            }
        }
    }

    fn handle_event(&mut self, event: ClientEvent) {
        let directory_loaded = matches!(event, ClientEvent::DirectoryLoaded(_));
        if let ClientEvent::SessionChanged(SessionState::Disconnected) = event {
            self.schedule_reconnect();
        }

        for line in self.state.apply(event) {
            println!("{line}");
        }

        if directory_loaded {
            if let Some(chat_id) = self.initial_chat.take() {
                self.send(ClientCommand::SelectChat(chat_id));
            }
        }
    }

    /// Returns `false` when the user asked to quit.
    fn handle_input(&mut self, line: &str) -> bool {
        match input_bar::parse(line) {
            None => {}
            Some(UiAction::ListChats) => {
                for line in self.state.sidebar() {
                    println!("{line}");
                }
            }
            Some(UiAction::Open(chat_id)) => self.send(ClientCommand::SelectChat(chat_id)),
            Some(UiAction::Send(content)) => {
                if self.state.active.is_none() {
                    println!("Open a chat first: /open <id>");
                } else {
                    self.send(ClientCommand::Typing);
                    self.send(ClientCommand::SendMessage(content));
                }
            }
            Some(UiAction::Invalid(reason)) => println!("{reason}"),
            Some(UiAction::Quit) => return false,
        }
        true
    }

    fn schedule_reconnect(&self) {
        let Some(delay) = self.reconnect_delay else {
            return;
        };
        let sender = self.command_sender.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            log::info!("Reconnecting after {delay:?}");
            if let Err(err) = sender.send(ClientCommand::Connect).await {
                log::warn!("Failed to request reconnect: {err}");
            }
        });
    }

    fn send(&self, command: ClientCommand) {
        if let Err(err) = self.command_sender.try_send(command) {
            log::warn!("Failed to send command to chat client: {err}");
        }
    }
}
