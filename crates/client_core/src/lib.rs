//! Client-side real-time synchronization engine for the presence and
//! messaging layer.
//!
//! [`ChatClient`] owns one logical link to the relay and reconciles the
//! three asynchronous message sources (live channel events, REST-fetched
//! history, optimistic local echoes) into a single deduplicated,
//! insertion-ordered view. The relay, persistence store, and session
//! issuance are external collaborators: the caller hands the client an
//! already-issued identity and the client talks to the relay's websocket
//! and REST surface from there.

use std::{collections::HashMap, sync::Arc};

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use shared::{
    domain::{DirectoryEntry, PresenceEntry, UserId},
    protocol::{MessagePayload, OutboundMessage, ServerEvent},
};
use thiserror::Error;
use tokio::{
    sync::{broadcast, Mutex, Notify},
    task::JoinHandle,
};
use tracing::{info, warn};

pub mod attachment;
pub mod config;
pub mod merge;
pub mod presence;
pub mod transport;

pub use attachment::AttachmentError;
pub use config::ClientConfig;
use merge::MessageLog;
use transport::{ChannelConnector, ChannelSender, LinkState, WsConnector};

/// Fetch failures surfaced to the caller. Existing state is left intact
/// and this layer does not retry.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("could not load conversation history for {peer_id}: {source}")]
    History {
        peer_id: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("could not load user directory: {0}")]
    Directory(#[source] reqwest::Error),
}

/// Notifications pushed to the rendering layer. Payload-free where the
/// current state is available through the getter surface.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    LinkStateChanged(LinkState),
    RosterUpdated,
    MessagesUpdated,
    Error(String),
}

#[derive(Default)]
struct ClientState {
    self_id: Option<UserId>,
    self_username: Option<String>,
    directory: Vec<DirectoryEntry>,
    online: HashMap<UserId, String>,
    selected: Option<UserId>,
    selection_seq: u64,
    messages: MessageLog,
    draft: String,
    link: Option<LinkState>,
    sender: Option<Arc<dyn ChannelSender>>,
}

/// The synchronization engine. Cheaply shared behind an [`Arc`]; all
/// mutable state sits behind one mutex so channel swaps and list
/// mutations are serialized.
pub struct ChatClient {
    http: Client,
    config: ClientConfig,
    connector: Arc<dyn ChannelConnector>,
    inner: Mutex<ClientState>,
    restart: Notify,
    attachment_gate: Mutex<()>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<ClientEvent>,
}

impl ChatClient {
    pub fn new(config: ClientConfig) -> Arc<Self> {
        Self::with_connector(config, Arc::new(WsConnector))
    }

    pub fn with_connector(config: ClientConfig, connector: Arc<dyn ChannelConnector>) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            http: Client::new(),
            config,
            connector,
            inner: Mutex::new(ClientState::default()),
            restart: Notify::new(),
            attachment_gate: Mutex::new(()),
            supervisor: Mutex::new(None),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Adopts an identity issued by the (external) auth layer, loads the
    /// user directory, and starts the link supervisor. A directory fetch
    /// failure is surfaced as a [`ClientEvent::Error`] but does not keep
    /// the realtime link from coming up.
    pub async fn login(self: &Arc<Self>, self_id: UserId, username: impl Into<String>) -> Result<()> {
        {
            let mut guard = self.inner.lock().await;
            guard.self_id = Some(self_id);
            guard.self_username = Some(username.into());
            guard.selected = None;
            guard.selection_seq += 1;
            guard.messages.clear();
            guard.online.clear();
            guard.directory.clear();
            guard.draft.clear();
        }

        if let Err(err) = self.refresh_directory().await {
            warn!("directory: initial fetch failed: {err}");
            self.emit(ClientEvent::Error(err.to_string()));
        }

        self.start_supervisor().await
    }

    /// Invalidates the session with the relay, tears down the live
    /// channel and clears all local state. Local state survives if the
    /// logout request itself fails.
    pub async fn logout(&self) -> Result<()> {
        self.http
            .post(format!("{}/logout", self.config.server_url))
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .context("logout request failed")?;

        if let Some(handle) = self.supervisor.lock().await.take() {
            handle.abort();
        }
        {
            let mut guard = self.inner.lock().await;
            *guard = ClientState::default();
        }
        info!("session: logged out, link torn down");
        self.emit(ClientEvent::RosterUpdated);
        self.emit(ClientEvent::MessagesUpdated);
        Ok(())
    }

    /// Selects the conversation peer. The previous history is
    /// invalidated, the transport is reconnected even if it is currently
    /// open, and the peer's history is fetched fresh. A fetch failure
    /// leaves the (now empty) list unchanged and is surfaced both as an
    /// event and in the returned error.
    pub async fn select(&self, peer_id: UserId) -> Result<()> {
        let seq = {
            let mut guard = self.inner.lock().await;
            guard.selected = Some(peer_id.clone());
            guard.selection_seq += 1;
            guard.messages.clear();
            guard.selection_seq
        };
        self.restart.notify_one();
        self.emit(ClientEvent::MessagesUpdated);

        if let Err(err) = self.refresh_history(&peer_id, seq).await {
            self.emit(ClientEvent::Error(err.to_string()));
            return Err(err.into());
        }
        Ok(())
    }

    /// Sends a text message to the selected peer and appends an
    /// optimistic echo immediately. The relay round-trip is
    /// fire-and-forget; a closed link drops the frame with a warning
    /// (no buffering across reconnects) while the echo still renders.
    pub async fn send_text(&self, text: &str) -> Result<()> {
        let (self_id, peer_id, sender) = {
            let guard = self.inner.lock().await;
            (
                guard
                    .self_id
                    .clone()
                    .ok_or_else(|| anyhow!("not logged in"))?,
                guard
                    .selected
                    .clone()
                    .ok_or_else(|| anyhow!("no conversation selected"))?,
                guard.sender.clone(),
            )
        };

        let outbound = OutboundMessage {
            recipient_id: peer_id.clone(),
            text: Some(text.to_string()),
            file: None,
        };
        match sender {
            Some(sender) => {
                if let Err(err) = sender.send(outbound).await {
                    warn!("link: outbound send failed: {err:#}");
                }
            }
            None => warn!("link: dropping outbound message, channel not open"),
        }

        {
            let mut guard = self.inner.lock().await;
            guard.messages.append(MessagePayload {
                id: merge::provisional_id(),
                sender_id: self_id,
                recipient_id: peer_id,
                text: Some(text.to_string()),
                file: None,
            });
            guard.draft.clear();
        }
        self.emit(ClientEvent::MessagesUpdated);
        Ok(())
    }

    /// Reads a local file, encodes it for transit, and sends it (with
    /// optional text) to the selected peer. File sends skip the
    /// optimistic echo: the attachment's final form is only known after
    /// the relay/store round-trip, so a successful send refetches the
    /// history instead. Overlapping file sends are serialized.
    pub async fn send_file(
        &self,
        name: &str,
        path: &std::path::Path,
        text: Option<&str>,
    ) -> Result<()> {
        let _gate = self.attachment_gate.lock().await;

        let (peer_id, sender, seq) = {
            let guard = self.inner.lock().await;
            (
                guard
                    .selected
                    .clone()
                    .ok_or_else(|| anyhow!("no conversation selected"))?,
                guard.sender.clone(),
                guard.selection_seq,
            )
        };
        let sender = sender.ok_or_else(|| anyhow!("cannot send file: channel not open"))?;

        let file = attachment::read_and_encode(name, path).await?;
        sender
            .send(OutboundMessage {
                recipient_id: peer_id.clone(),
                text: text.map(str::to_string),
                file: Some(file),
            })
            .await
            .context("file message send failed")?;
        info!(peer_id = %peer_id, filename = name, "sent file message, resyncing history");

        if let Err(err) = self.refresh_history(&peer_id, seq).await {
            warn!("history: refresh after file send failed: {err}");
            self.emit(ClientEvent::Error(err.to_string()));
        }
        Ok(())
    }

    /// Re-fetches the full user directory from the store.
    pub async fn refresh_directory(&self) -> Result<(), FetchError> {
        let directory: Vec<DirectoryEntry> = self
            .http
            .get(format!("{}/people", self.config.server_url))
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(FetchError::Directory)?
            .json()
            .await
            .map_err(FetchError::Directory)?;

        {
            let mut guard = self.inner.lock().await;
            guard.directory = directory;
        }
        self.emit(ClientEvent::RosterUpdated);
        Ok(())
    }

    pub async fn set_draft(&self, draft: impl Into<String>) {
        self.inner.lock().await.draft = draft.into();
    }

    pub async fn draft(&self) -> String {
        self.inner.lock().await.draft.clone()
    }

    pub async fn selection(&self) -> Option<UserId> {
        self.inner.lock().await.selected.clone()
    }

    pub async fn username(&self) -> Option<String> {
        self.inner.lock().await.self_username.clone()
    }

    pub async fn link_state(&self) -> Option<LinkState> {
        self.inner.lock().await.link
    }

    /// Other online users, never including the local user.
    pub async fn online_roster(&self) -> Vec<PresenceEntry> {
        let guard = self.inner.lock().await;
        match &guard.self_id {
            Some(self_id) => presence::online_roster(&guard.online, self_id),
            None => Vec::new(),
        }
    }

    /// Directory users that are neither online nor the local user,
    /// recomputed from the current inputs on every call.
    pub async fn offline_roster(&self) -> Vec<DirectoryEntry> {
        let guard = self.inner.lock().await;
        match &guard.self_id {
            Some(self_id) => presence::derive_offline(&guard.directory, &guard.online, self_id),
            None => Vec::new(),
        }
    }

    /// Merged, deduplicated, insertion-ordered view of the selected
    /// conversation.
    pub async fn messages(&self) -> Vec<MessagePayload> {
        self.inner.lock().await.messages.snapshot()
    }

    async fn start_supervisor(self: &Arc<Self>) -> Result<()> {
        let ws_url = self.config.ws_url()?;
        let mut guard = self.supervisor.lock().await;
        if let Some(handle) = guard.take() {
            handle.abort();
        }
        {
            let mut inner = self.inner.lock().await;
            inner.sender = None;
            inner.link = Some(LinkState::Connecting);
        }
        let client = Arc::clone(self);
        *guard = Some(tokio::spawn(async move {
            client.run_link(ws_url).await;
        }));
        Ok(())
    }

    /// Reconnection supervisor: drives the link state machine
    /// Connecting -> Open -> ClosedPendingRetry -> Connecting with a
    /// fixed backoff and no attempt cap. A selection change requests a
    /// restart, which replaces the live channel immediately; the old
    /// channel halves are dropped before a new connect starts, so stale
    /// channels can never deliver events.
    async fn run_link(self: Arc<Self>, ws_url: String) {
        loop {
            self.set_link_state(LinkState::Connecting).await;
            match self.connector.connect(&ws_url).await {
                Ok((sender, mut events)) => {
                    {
                        let mut guard = self.inner.lock().await;
                        guard.sender = Some(sender);
                        guard.link = Some(LinkState::Open);
                    }
                    self.emit(ClientEvent::LinkStateChanged(LinkState::Open));
                    info!("link: channel open");

                    let mut restart_requested = false;
                    loop {
                        tokio::select! {
                            event = events.next_event() => match event {
                                Some(event) => self.handle_server_event(event).await,
                                None => {
                                    info!("link: channel closed, scheduling reconnect");
                                    break;
                                }
                            },
                            _ = self.restart.notified() => {
                                info!("link: restart requested, replacing channel");
                                restart_requested = true;
                                break;
                            }
                        }
                    }
                    if restart_requested {
                        // The old channel halves are dropped here, before
                        // the next connect; no backoff for a requested
                        // restart.
                        continue;
                    }
                }
                Err(err) => {
                    warn!("link: connect failed: {err:#}");
                }
            }

            self.set_link_state(LinkState::ClosedPendingRetry).await;
            tokio::select! {
                () = tokio::time::sleep(self.config.reconnect_delay) => {}
                _ = self.restart.notified() => {}
            }
        }
    }

    async fn set_link_state(&self, state: LinkState) {
        {
            let mut guard = self.inner.lock().await;
            guard.sender = None;
            guard.link = Some(state);
        }
        self.emit(ClientEvent::LinkStateChanged(state));
    }

    async fn handle_server_event(&self, event: ServerEvent) {
        match event {
            ServerEvent::Presence { entries } => {
                {
                    let mut guard = self.inner.lock().await;
                    guard.online = presence::rebuild_online(&entries);
                }
                self.emit(ClientEvent::RosterUpdated);
                // Users who registered after login exist only in the
                // store, so every snapshot also refreshes the directory
                // behind the offline roster.
                if let Err(err) = self.refresh_directory().await {
                    warn!("directory refresh after presence snapshot failed: {err}");
                }
            }
            ServerEvent::Message(message) => {
                let accepted = {
                    let mut guard = self.inner.lock().await;
                    // Live messages are only merged for the selected
                    // conversation; everything else is dropped here.
                    if guard.selected.as_ref() == Some(&message.sender_id) {
                        guard.messages.append(message);
                        true
                    } else {
                        false
                    }
                };
                if accepted {
                    self.emit(ClientEvent::MessagesUpdated);
                }
            }
        }
    }

    /// Replaces the message list with the peer's fetched history, unless
    /// the selection moved on while the fetch was in flight.
    async fn refresh_history(&self, peer_id: &UserId, seq: u64) -> Result<(), FetchError> {
        let history: Vec<MessagePayload> = self
            .http
            .get(format!("{}/messages/{}", self.config.server_url, peer_id.0))
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(|source| FetchError::History {
                peer_id: peer_id.0.clone(),
                source,
            })?
            .json()
            .await
            .map_err(|source| FetchError::History {
                peer_id: peer_id.0.clone(),
                source,
            })?;

        {
            let mut guard = self.inner.lock().await;
            if guard.selection_seq != seq {
                info!(peer_id = %peer_id, "history: discarding fetch result for stale selection");
                return Ok(());
            }
            guard.messages.replace(history);
        }
        self.emit(ClientEvent::MessagesUpdated);
        Ok(())
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
