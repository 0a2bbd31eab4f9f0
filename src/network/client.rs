use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::common::types::MessagePayload;
use crate::common::{ChatId, ClientCommand, ClientContext, ClientEvent, Message, TypingSignal};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::sync::{
    ChatDirectory, HistoryApply, HistoryRequest, MessageTimeline, StaleHistoryPolicy,
    TypingCoordinator,
};

use super::api::ChatApi;
use super::protocol::{self, ErrorPayload, Outbound, TypingPayload};
use super::session::{EmitOutcome, SessionState, TransportSession};

/// Inbound work queued by session handlers for the client loop.
#[derive(Debug)]
enum Inbound {
    Connected,
    Message(MessagePayload),
    Typing(TypingPayload),
    ServerError(String),
}

type HistoryResult = (HistoryRequest, Result<Vec<Message>>);

/// Event loop tying the session, directory, timeline and typing state together.
pub struct ChatClient {
    context: ClientContext,
    session: TransportSession,
    api: Arc<dyn ChatApi>,
    directory: ChatDirectory,
    timeline: MessageTimeline,
    typing: TypingCoordinator,
    stale_history: StaleHistoryPolicy,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    history_sender: mpsc::UnboundedSender<HistoryResult>,
    history_receiver: mpsc::UnboundedReceiver<HistoryResult>,
    history_task: Option<JoinHandle<()>>,
    published_state: SessionState,
    event_sender: mpsc::Sender<ClientEvent>,
    command_receiver: mpsc::Receiver<ClientCommand>,
}

impl ChatClient {
    pub fn new(
        context: ClientContext,
        mut session: TransportSession,
        api: Arc<dyn ChatApi>,
        config: &ClientConfig,
        event_sender: mpsc::Sender<ClientEvent>,
        command_receiver: mpsc::Receiver<ClientCommand>,
    ) -> Self {
        let (inbound_sender, inbound) = mpsc::unbounded_channel();
        register_handlers(&mut session, inbound_sender);
        let (history_sender, history_receiver) = mpsc::unbounded_channel();
        let published_state = session.state();

        Self {
            context,
            session,
            api,
            directory: ChatDirectory::new(),
            timeline: MessageTimeline::new(),
            typing: TypingCoordinator::new(config.typing_quiet()),
            stale_history: config.stale_history,
            inbound,
            history_sender,
            history_receiver,
            history_task: None,
            published_state,
            event_sender,
            command_receiver,
        }
    }

    pub async fn run(mut self) {
        self.connect().await;
        if let Err(err) = self.reload_directory().await {
            self.publish(ClientEvent::Failed(err)).await;
        }

        log::info!("Chat client loop started for user {}", self.context.user_id);
        while self.step().await {}

        if let Some(task) = self.history_task.take() {
            task.abort();
        }
        self.session.disconnect().await;
        log::info!("Chat client loop stopped");
    }

    /// Handles one command, frame, typing timeout or history response.
    /// Returns `false` once the host hung up.
    pub async fn step(&mut self) -> bool {
        tokio::select! {
            command = self.command_receiver.recv() => match command {
                Some(command) => self.handle_command(command).await,
                None => return false,
            },
            frame = self.session.next_frame() => {
                if frame.is_none() {
                    log::warn!("Realtime session lost");
                }
                self.drain_inbound().await;
            }
            stop = self.typing.next_stop() => {
                self.send_typing(stop).await;
            }
            Some((request, result)) = self.history_receiver.recv() => {
                self.apply_history(request, result).await;
            }
        }
        self.publish_session_state().await;
        true
    }

    async fn handle_command(&mut self, command: ClientCommand) {
        let outcome = match command {
            ClientCommand::ReloadDirectory => self.reload_directory().await,
            ClientCommand::SelectChat(chat_id) => self.select_chat(chat_id).await,
            ClientCommand::Typing => {
                self.notify_typing().await;
                Ok(())
            }
            ClientCommand::SendMessage(content) => {
                self.send_message(&content).await;
                Ok(())
            }
            ClientCommand::Connect => {
                self.connect().await;
                Ok(())
            }
            ClientCommand::Disconnect => {
                self.session.disconnect().await;
                Ok(())
            }
        };

        if let Err(err) = outcome {
            self.publish(ClientEvent::Failed(err)).await;
        }
    }

    pub async fn connect(&mut self) -> SessionState {
        if !self.session.is_connected() {
            self.published_state = SessionState::Connecting;
            self.publish(ClientEvent::SessionChanged(SessionState::Connecting))
                .await;
        }
        // Rejoin through the connect hook before anything buffered goes out.
        self.session.open().await;
        self.drain_inbound().await;
        self.session.flush().await;
        self.publish_session_state().await;
        self.session.state()
    }

    pub async fn reload_directory(&mut self) -> Result<()> {
        let loaded = self
            .directory
            .load(self.api.as_ref(), &self.context.user_id)
            .await
            .map(|chats| chats.to_vec());
        let chats = loaded?;
        self.publish(ClientEvent::DirectoryLoaded(chats)).await;
        Ok(())
    }

    /// Activates a chat: clears the timeline, joins it and starts its
    /// history fetch in the background.
    pub async fn select_chat(&mut self, chat_id: ChatId) -> Result<()> {
        let chat = self.directory.select(&chat_id)?.clone();

        if let Some(stop) = self.typing.reset() {
            self.send_typing(stop).await;
        }
        let request = self.timeline.begin_load(chat_id);
        log::info!("Selected chat {}", request.chat_id);
        self.publish(ClientEvent::ChatSelected(chat)).await;

        self.join_current_chat().await;
        self.spawn_history(request);
        Ok(())
    }

    pub async fn notify_typing(&mut self) {
        let Some(chat_id) = self.timeline.active_chat().cloned() else {
            return;
        };
        if !self.session.is_connected() {
            return;
        }
        let signals = self
            .typing
            .notify_local_typing(&chat_id, &self.context.user_id);
        for signal in signals {
            self.send_typing(signal).await;
        }
    }

    /// Sends trimmed text to the active chat. `None` when there was nothing
    /// to send or no chat is selected.
    pub async fn send_message(&mut self, content: &str) -> Option<EmitOutcome> {
        let content = content.trim();
        if content.is_empty() {
            return None;
        }
        let Some(chat_id) = self.timeline.active_chat().cloned() else {
            log::debug!("No active chat; message not sent");
            return None;
        };

        let outbound = Outbound::SendMessage {
            chat_id,
            user_id: self.context.user_id.clone(),
            content: content.to_string(),
            kind: "text".to_string(),
        };
        let outcome = self.emit(&outbound).await;
        if outcome == EmitOutcome::Dropped {
            self.publish(ClientEvent::Failed(ClientError::SendDropped {
                event: outbound.event().to_string(),
            }))
            .await;
        }
        Some(outcome)
    }

    pub fn context(&self) -> &ClientContext {
        &self.context
    }

    pub fn session(&self) -> &TransportSession {
        &self.session
    }

    pub fn directory(&self) -> &ChatDirectory {
        &self.directory
    }

    pub fn timeline(&self) -> &MessageTimeline {
        &self.timeline
    }

    pub fn typing(&self) -> &TypingCoordinator {
        &self.typing
    }

    async fn join_current_chat(&mut self) {
        let Some(chat_id) = self.timeline.active_chat().cloned() else {
            return;
        };
        if !self.session.is_connected() {
            log::debug!("Join of chat {chat_id} deferred until connected");
            return;
        }
        let outbound = Outbound::JoinChat {
            chat_id,
            user_id: self.context.user_id.clone(),
        };
        self.emit(&outbound).await;
    }

    async fn send_typing(&mut self, signal: TypingSignal) {
        // Typing is ephemeral; never buffer it for a later connection.
        if !self.session.is_connected() {
            log::debug!("Typing signal for chat {} skipped while offline", signal.chat_id);
            return;
        }
        self.emit(&Outbound::Typing(signal)).await;
    }

    /// Emits and reports a link lost on the way.
    async fn emit(&mut self, outbound: &Outbound) -> EmitOutcome {
        let outcome = self.session.emit_outbound(outbound).await;
        self.publish_session_state().await;
        outcome
    }

    fn spawn_history(&mut self, request: HistoryRequest) {
        if let Some(previous) = self.history_task.take() {
            if self.stale_history == StaleHistoryPolicy::Abort && !previous.is_finished() {
                log::debug!("Aborting superseded history fetch");
                previous.abort();
            }
        }

        let api = Arc::clone(&self.api);
        let sender = self.history_sender.clone();
        self.history_task = Some(tokio::spawn(async move {
            let result = api.fetch_messages(&request.chat_id).await;
            let _ = sender.send((request, result));
        }));
    }

    async fn apply_history(&mut self, request: HistoryRequest, result: Result<Vec<Message>>) {
        let chat_id = request.chat_id.clone();
        match self.timeline.complete_load(request, result) {
            Ok(HistoryApply::Applied(_)) => {
                let messages = self.timeline.messages().to_vec();
                self.publish(ClientEvent::TimelineReplaced { chat_id, messages })
                    .await;
            }
            Ok(HistoryApply::Stale) => {}
            Err(err) => {
                log::warn!("History for chat {chat_id} failed: {err}");
                self.publish(ClientEvent::Failed(err)).await;
            }
        }
    }

    async fn drain_inbound(&mut self) {
        while let Ok(inbound) = self.inbound.try_recv() {
            match inbound {
                Inbound::Connected => self.join_current_chat().await,
                Inbound::Message(payload) => {
                    let Some(chat_id) = payload.chat_id.clone() else {
                        log::warn!("new_message {} without chat_id ignored", payload.id);
                        continue;
                    };
                    let message = payload.into_message(&chat_id);
                    if self.timeline.append(message.clone()) {
                        self.publish(ClientEvent::MessageAppended(message)).await;
                    }
                }
                Inbound::Typing(payload) => {
                    if self.context.is_self(&payload.user_id) {
                        continue;
                    }
                    let chat_id = payload
                        .chat_id
                        .clone()
                        .or_else(|| self.timeline.active_chat().cloned());
                    let Some(chat_id) = chat_id else {
                        continue;
                    };
                    let visible =
                        self.typing
                            .on_remote_typing(&chat_id, &payload.user_id, payload.is_typing);
                    let typists = self.typing.typists(&chat_id);
                    self.publish(ClientEvent::TypingChanged {
                        chat_id,
                        visible,
                        typists,
                    })
                    .await;
                }
                Inbound::ServerError(message) => {
                    log::error!("Server reported: {message}");
                    self.publish(ClientEvent::Failed(ClientError::TransportError { message }))
                        .await;
                }
            }
        }
    }

    async fn publish_session_state(&mut self) {
        let state = self.session.state();
        if state != self.published_state {
            if state == SessionState::Disconnected && self.typing.cancel_local().is_some() {
                log::debug!("Local typing dropped with the session");
            }
            self.published_state = state;
            self.publish(ClientEvent::SessionChanged(state)).await;
        }
    }

    /// The returned future owns its sender so the loop stays `Send`.
    fn publish(&self, event: ClientEvent) -> impl Future<Output = ()> + Send + 'static {
        let sender = self.event_sender.clone();
        async move {
            if let Err(err) = sender.send(event).await {
                log::warn!("Failed to notify host: {err}");
            }
        }
    }
}

fn register_handlers(session: &mut TransportSession, sender: mpsc::UnboundedSender<Inbound>) {
    let connected = sender.clone();
    session.on_connect(move || {
        let _ = connected.send(Inbound::Connected);
    });

    let messages = sender.clone();
    session.on(protocol::NEW_MESSAGE, move |data| {
        match serde_json::from_value::<MessagePayload>(data.clone()) {
            Ok(payload) => {
                let _ = messages.send(Inbound::Message(payload));
            }
            Err(err) => log::warn!("Malformed new_message: {err}"),
        }
    });

    let typing = sender.clone();
    session.on(protocol::USER_TYPING, move |data| {
        match serde_json::from_value::<TypingPayload>(data.clone()) {
            Ok(payload) => {
                let _ = typing.send(Inbound::Typing(payload));
            }
            Err(err) => log::warn!("Malformed user_typing: {err}"),
        }
    });

    session.on(protocol::ERROR, move |data| {
        let message = serde_json::from_value::<ErrorPayload>(data.clone())
            .map(|payload| payload.message)
            .unwrap_or_else(|_| data.to_string());
        let _ = sender.send(Inbound::ServerError(message));
    });

    session.on(protocol::JOIN_SUCCESS, |data| {
        log::info!("Joined room {}", data["room"]);
    });
    session.on(protocol::CONNECTED, |data| {
        log::debug!("Server handshake: {data}");
    });
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::super::api::fake::{FakeApi, chat, message};
    use super::super::session::{EmitPolicy, SessionConfig};
    use super::super::transport::TransportKind;
    use super::super::transport::memory::{MemoryConnector, MemoryServer};
    use super::*;
    use crate::common::UserId;

    struct Harness {
        client: ChatClient,
        api: Arc<FakeApi>,
        connector: MemoryConnector,
        events: mpsc::Receiver<ClientEvent>,
        _commands: mpsc::Sender<ClientCommand>,
    }

    impl Harness {
        fn new(stale_history: StaleHistoryPolicy) -> Self {
            Self::build(stale_history, EmitPolicy::Drop)
        }

        fn build(stale_history: StaleHistoryPolicy, emit_policy: EmitPolicy) -> Self {
            let config = ClientConfig {
                stale_history,
                ..ClientConfig::default()
            };
            let connector = MemoryConnector::new();
            let session = TransportSession::new(
                SessionConfig {
                    server_url: "http://localhost:5000".to_string(),
                    transports: vec![TransportKind::WebSocket],
                    connect_timeout: Duration::from_secs(1),
                    emit_policy,
                    emit_buffer_limit: 8,
                },
                Arc::new(connector.clone()),
            );
            let api = Arc::new(FakeApi::with_chats(vec![
                chat(1, Some("general")),
                chat(2, None),
            ]));
            let (event_sender, events) = mpsc::channel(100);
            let (commands, command_receiver) = mpsc::channel(10);
            let client = ChatClient::new(
                ClientContext::new(UserId::from(42)),
                session,
                api.clone(),
                &config,
                event_sender,
                command_receiver,
            );
            Self {
                client,
                api,
                connector,
                events,
                _commands: commands,
            }
        }

        async fn online(&mut self) -> MemoryServer {
            let server = self.connector.accept_next();
            assert_eq!(self.client.connect().await, SessionState::Connected);
            self.client.reload_directory().await.unwrap();
            server
        }

        async fn run_until_offline(&mut self) {
            while self.client.session().is_connected() {
                assert!(self.client.step().await);
            }
        }

        fn published_states(&mut self) -> Vec<SessionState> {
            self.drain_events()
                .into_iter()
                .filter_map(|event| match event {
                    ClientEvent::SessionChanged(state) => Some(state),
                    _ => None,
                })
                .collect()
        }

        fn drain_events(&mut self) -> Vec<ClientEvent> {
            let mut events = Vec::new();
            while let Ok(event) = self.events.try_recv() {
                events.push(event);
            }
            events
        }
    }

    fn timeline_ids(client: &ChatClient) -> Vec<String> {
        client
            .timeline()
            .messages()
            .iter()
            .map(|m| m.id.to_string())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn stale_history_never_overwrites_newer_selection() {
        let mut harness = Harness::new(StaleHistoryPolicy::Discard);
        let _server = harness.online().await;
        harness
            .api
            .set_history(1, Duration::from_millis(500), vec![message(1, 3, 2), message(1, 2, 1)]);
        harness
            .api
            .set_history(2, Duration::from_millis(10), vec![message(2, 1, 0)]);

        harness.client.select_chat(ChatId::from(1)).await.unwrap();
        harness.client.select_chat(ChatId::from(2)).await.unwrap();
        assert!(harness.client.timeline().is_empty());

        assert!(harness.client.step().await);
        assert_eq!(timeline_ids(&harness.client), vec!["1"]);

        assert!(harness.client.step().await);
        assert_eq!(timeline_ids(&harness.client), vec!["1"]);
        assert_eq!(
            harness.client.timeline().active_chat(),
            Some(&ChatId::from(2))
        );

        let replaced: Vec<_> = harness
            .drain_events()
            .into_iter()
            .filter_map(|event| match event {
                ClientEvent::TimelineReplaced { chat_id, .. } => Some(chat_id),
                _ => None,
            })
            .collect();
        assert_eq!(replaced, vec![ChatId::from(2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn abort_policy_cancels_superseded_fetch() {
        let mut harness = Harness::new(StaleHistoryPolicy::Abort);
        let _server = harness.online().await;
        harness
            .api
            .set_history(1, Duration::from_millis(500), vec![message(1, 3, 2)]);
        harness
            .api
            .set_history(2, Duration::from_millis(10), vec![message(2, 1, 0)]);

        harness.client.select_chat(ChatId::from(1)).await.unwrap();
        tokio::task::yield_now().await;
        harness.client.select_chat(ChatId::from(2)).await.unwrap();

        assert!(harness.client.step().await);
        assert_eq!(timeline_ids(&harness.client), vec!["1"]);

        let next = tokio::time::timeout(Duration::from_secs(5), harness.client.step()).await;
        assert!(next.is_err());
    }

    #[tokio::test]
    async fn selecting_unknown_chat_reports_not_found() {
        let mut harness = Harness::new(StaleHistoryPolicy::Discard);
        let _server = harness.online().await;

        let err = harness.client.select_chat(ChatId::from(77)).await.unwrap_err();
        assert_eq!(
            err,
            ClientError::NotFound {
                chat_id: ChatId::from(77)
            }
        );
        assert!(harness.client.timeline().active_chat().is_none());
    }

    #[tokio::test]
    async fn live_messages_only_land_in_active_chat() {
        let mut harness = Harness::new(StaleHistoryPolicy::Discard);
        let server = harness.online().await;
        harness.api.set_history(1, Duration::ZERO, vec![]);
        harness.client.select_chat(ChatId::from(1)).await.unwrap();
        assert!(harness.client.step().await);

        let live = |chat_id: i64, id: i64| {
            json!({
                "id": id,
                "chat_id": chat_id,
                "user_id": 5,
                "content": "hey",
                "type": "text",
                "timestamp": "2024-03-01T10:00:00"
            })
        };
        server.push("new_message", live(2, 10));
        server.push("new_message", live(1, 11));

        assert!(harness.client.step().await);
        assert!(harness.client.step().await);
        assert_eq!(timeline_ids(&harness.client), vec!["11"]);

        let appended = harness
            .drain_events()
            .into_iter()
            .filter(|event| matches!(event, ClientEvent::MessageAppended(_)))
            .count();
        assert_eq!(appended, 1);
    }

    #[tokio::test]
    async fn reconnect_rejoins_the_active_chat() {
        let mut harness = Harness::new(StaleHistoryPolicy::Discard);
        let first = harness.online().await;
        harness.api.set_history(1, Duration::ZERO, vec![]);
        harness.client.select_chat(ChatId::from(1)).await.unwrap();
        assert_eq!(first.sent_events(), vec!["join_chat"]);

        drop(first);
        harness.run_until_offline().await;

        let second = harness.connector.accept_next();
        harness.client.connect().await;
        let sent = second.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].event, "join_chat");
        assert_eq!(sent[0].data, json!({ "chat_id": 1, "user_id": 42 }));

        let states = harness.published_states();
        assert!(states.ends_with(&[
            SessionState::Disconnected,
            SessionState::Connecting,
            SessionState::Connected
        ]));
    }

    #[tokio::test]
    async fn sending_while_offline_is_dropped_and_reported() {
        let mut harness = Harness::new(StaleHistoryPolicy::Discard);
        let server = harness.online().await;
        harness.api.set_history(1, Duration::ZERO, vec![]);
        harness.client.select_chat(ChatId::from(1)).await.unwrap();
        harness.client.command_disconnect().await;
        harness.drain_events();

        let outcome = harness.client.send_message("  hello  ").await;

        assert_eq!(outcome, Some(EmitOutcome::Dropped));
        assert_eq!(server.sent_events(), vec!["join_chat"]);
        assert!(harness.drain_events().iter().any(|event| matches!(
            event,
            ClientEvent::Failed(ClientError::SendDropped { .. })
        )));
        assert_eq!(harness.client.send_message("   ").await, None);
    }

    #[tokio::test]
    async fn sent_message_is_trimmed() {
        let mut harness = Harness::new(StaleHistoryPolicy::Discard);
        let server = harness.online().await;
        harness.api.set_history(1, Duration::ZERO, vec![]);
        harness.client.select_chat(ChatId::from(1)).await.unwrap();

        let outcome = harness.client.send_message("  hello  ").await;

        assert_eq!(outcome, Some(EmitOutcome::Sent));
        let sent = server.sent();
        assert_eq!(
            sent[1].data,
            json!({ "chat_id": 1, "user_id": 42, "content": "hello", "type": "text" })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn local_typing_burst_emits_start_then_stop() {
        let mut harness = Harness::new(StaleHistoryPolicy::Discard);
        let server = harness.online().await;
        harness.api.set_history(1, Duration::ZERO, vec![]);
        harness.client.select_chat(ChatId::from(1)).await.unwrap();
        assert!(harness.client.step().await);

        for _ in 0..3 {
            harness.client.notify_typing().await;
            tokio::time::advance(Duration::from_millis(500)).await;
        }
        assert!(harness.client.step().await);

        let typing: Vec<_> = server
            .sent()
            .into_iter()
            .filter(|frame| frame.event == "typing")
            .map(|frame| frame.data["is_typing"].clone())
            .collect();
        assert_eq!(typing, vec![json!(true), json!(false)]);
    }

    #[tokio::test]
    async fn remote_typing_without_chat_targets_active_chat() {
        let mut harness = Harness::new(StaleHistoryPolicy::Discard);
        let server = harness.online().await;
        harness.api.set_history(1, Duration::ZERO, vec![]);
        harness.client.select_chat(ChatId::from(1)).await.unwrap();
        assert!(harness.client.step().await);
        harness.drain_events();

        server.push("user_typing", json!({ "user_id": 5, "is_typing": true }));
        assert!(harness.client.step().await);

        assert!(harness.client.typing().indicator(&ChatId::from(1)));
        let events = harness.drain_events();
        assert!(matches!(
            events.as_slice(),
            [ClientEvent::TypingChanged { visible: true, .. }]
        ));
    }

    #[tokio::test]
    async fn server_error_event_reaches_the_host() {
        let mut harness = Harness::new(StaleHistoryPolicy::Discard);
        let server = harness.online().await;
        harness.drain_events();

        server.push("error", json!({ "message": "Not a member of this chat" }));
        assert!(harness.client.step().await);

        let events = harness.drain_events();
        assert!(matches!(
            events.as_slice(),
            [ClientEvent::Failed(ClientError::TransportError { message })] if message == "Not a member of this chat"
        ));
    }

    #[tokio::test]
    async fn failed_join_publishes_disconnected() {
        let mut harness = Harness::new(StaleHistoryPolicy::Discard);
        let server = harness.online().await;
        harness.api.set_history(1, Duration::ZERO, vec![]);
        server.break_sends();

        harness.client.select_chat(ChatId::from(1)).await.unwrap();

        assert_eq!(
            harness.client.session().state(),
            SessionState::Disconnected
        );
        assert_eq!(
            harness.published_states().last(),
            Some(&SessionState::Disconnected)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn typing_after_lost_link_starts_again_on_new_link() {
        let mut harness = Harness::new(StaleHistoryPolicy::Discard);
        let first = harness.online().await;
        harness.api.set_history(1, Duration::ZERO, vec![]);
        harness.client.select_chat(ChatId::from(1)).await.unwrap();
        assert!(harness.client.step().await);

        first.break_sends();
        harness.client.notify_typing().await;

        assert!(!harness.client.typing().is_local_typing());
        assert_eq!(
            harness.published_states().last(),
            Some(&SessionState::Disconnected)
        );

        let second = harness.connector.accept_next();
        harness.client.connect().await;
        harness.client.notify_typing().await;

        let typing: Vec<_> = second
            .sent()
            .into_iter()
            .filter(|frame| frame.event == "typing")
            .map(|frame| frame.data["is_typing"].clone())
            .collect();
        assert_eq!(typing, vec![json!(true)]);
    }

    #[tokio::test]
    async fn buffered_message_goes_out_after_rejoin() {
        let mut harness = Harness::build(StaleHistoryPolicy::Discard, EmitPolicy::Buffer);
        let first = harness.online().await;
        harness.api.set_history(1, Duration::ZERO, vec![]);
        harness.client.select_chat(ChatId::from(1)).await.unwrap();
        drop(first);
        harness.run_until_offline().await;

        assert_eq!(
            harness.client.send_message("hello").await,
            Some(EmitOutcome::Queued)
        );

        let second = harness.connector.accept_next();
        assert_eq!(harness.client.connect().await, SessionState::Connected);
        assert_eq!(second.sent_events(), vec!["join_chat", "send_message"]);
        assert_eq!(harness.client.session().buffered(), 0);
    }

    impl ChatClient {
        async fn command_disconnect(&mut self) {
            self.handle_command(ClientCommand::Disconnect).await;
        }
    }
}
