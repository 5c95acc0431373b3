//! Client for the mirage polling chat service.
//!
//! The client owns all mutable state explicitly (no ambient globals): a
//! caller constructs a [`MirageClient`] from a configured server pool,
//! authenticates, and subscribes to [`ClientEvent`]s. A fixed-rate polling
//! task converts the stateless request/response API into a continuously
//! updated view of the current channel. Rendering lives entirely outside
//! this crate; subscribers receive decoded events and draw them however
//! they like.

use std::sync::Arc;

use reqwest::{multipart, Client, StatusCode};
use shared::{
    domain::{ChatEvent, FileRecord, ServerDescriptor},
    protocol::{
        ChannelListResponse, ChannelSummary, ChannelTopicResponse, CreateChannelRequest,
        CreateChannelResponse, CredentialsRequest, ErrorBody, FileListResponse, LoginResponse,
        PollResponse, UploadResponse,
    },
};
use tokio::{sync::{broadcast, Mutex}, time::Duration};
use tracing::{info, warn};

pub mod channel;
pub mod cipher;
pub mod codec;
pub mod directory;
pub mod error;
pub mod selector;

pub use channel::ChannelState;
pub use error::ClientError;

use error::Result;

/// Fixed delay between poll iterations, waited unconditionally whether the
/// previous request succeeded, failed, or returned nothing.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

const DEFAULT_CHANNEL: &str = "#general";
const DOWNLOAD_FALLBACK_NAME: &str = "downloaded-file";

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "json", "js", "css", "html"];

/// The authenticated binding of a user to one server instance. At most one
/// is live per client; it dies on logout or on a session-expired poll.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub username: String,
    pub server: ServerDescriptor,
}

/// Everything subscribers need to render; the DOM/terminal layer stays
/// outside this crate.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    Message(ChatEvent),
    RosterUpdated(Vec<String>),
    TopicUpdated { channel: String, topic: String },
    FileListUpdated(Vec<FileRecord>),
    SessionExpired,
    Error(String),
}

/// Outcome of a preview request. `Unavailable` is informational, not an
/// error: the file type simply has no inline rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preview {
    Image { bytes: Vec<u8> },
    Text { content: String },
    Unavailable,
}

struct MirageClientState {
    selected: Option<ServerDescriptor>,
    session: Option<Session>,
    channel: ChannelState,
    /// Monotonic counter tagging each polling run. A response is applied
    /// only if the generation it was issued under is still current, which
    /// discards late results from a cancelled or superseded loop.
    poll_generation: u64,
    poll_running: bool,
}

pub struct MirageClient {
    http: Client,
    pool: Vec<ServerDescriptor>,
    inner: Mutex<MirageClientState>,
    events: broadcast::Sender<ClientEvent>,
}

enum PollFailure {
    Unauthorized,
    Transport(String),
}

impl MirageClient {
    pub fn new(pool: Vec<ServerDescriptor>) -> Arc<Self> {
        let (events, _) = broadcast::channel(1024);
        Arc::new(Self {
            http: Client::new(),
            pool,
            inner: Mutex::new(MirageClientState {
                selected: None,
                session: None,
                channel: ChannelState::fresh(DEFAULT_CHANNEL),
                poll_generation: 0,
                poll_running: false,
            }),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Re-runs server selection against the configured pool and adopts the
    /// winner. Idempotent; safe to call again later to re-balance.
    pub async fn select_server(&self) -> Result<ServerDescriptor> {
        let best = selector::select_best(&self.http, &self.pool).await?;
        let mut guard = self.inner.lock().await;
        guard.selected = Some(best.clone());
        Ok(best)
    }

    async fn selected_server(&self) -> Result<ServerDescriptor> {
        if let Some(server) = self.inner.lock().await.selected.clone() {
            return Ok(server);
        }
        self.select_server().await
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<()> {
        let credentials = validated_credentials(username, password)?;
        let server = self.selected_server().await?;
        let response = self
            .http
            .post(format!("{}/register", server.base_url()))
            .json(&credentials)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ClientError::Auth(
                error_message(response, "registration failed").await,
            ));
        }
        info!(username = %credentials.username, "registered");
        Ok(())
    }

    /// Authenticates against the selected server and returns the channel
    /// list the service advertises. The session binds to the server
    /// descriptor *echoed by the service*, adopted verbatim — the service
    /// is authoritative for where the session lives, and the echo may name
    /// a different instance than the one probed.
    pub async fn login(&self, username: &str, password: &str) -> Result<Vec<String>> {
        let credentials = validated_credentials(username, password)?;
        let server = self.selected_server().await?;
        let response = self
            .http
            .post(format!("{}/login", server.base_url()))
            .json(&credentials)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ClientError::Auth(
                error_message(response, "login failed").await,
            ));
        }
        let body: LoginResponse = response
            .json()
            .await
            .map_err(|err| ClientError::Connection(format!("malformed login response: {err}")))?;

        info!(username = %body.username, server = %body.server.id, "logged in");
        let mut guard = self.inner.lock().await;
        guard.selected = Some(body.server.clone());
        guard.session = Some(Session {
            token: body.token,
            username: body.username,
            server: body.server,
        });
        guard.channel = ChannelState::fresh(DEFAULT_CHANNEL);
        guard.poll_generation += 1;
        guard.poll_running = false;
        Ok(body.channels)
    }

    /// Drops the session and cancels polling. Purely local; the service
    /// notices through its own inactivity timeout.
    pub async fn logout(&self) {
        let mut guard = self.inner.lock().await;
        guard.poll_generation += 1;
        guard.poll_running = false;
        guard.session = None;
        guard.channel = ChannelState::fresh(DEFAULT_CHANNEL);
    }

    pub async fn current_session(&self) -> Option<Session> {
        self.inner.lock().await.session.clone()
    }

    /// Obfuscation key for the logged-in user; see [`cipher`] for the
    /// (intentionally weak) contract.
    pub async fn encryption_key(&self) -> Result<String> {
        let guard = self.inner.lock().await;
        let session = guard.session.as_ref().ok_or(ClientError::NotAuthenticated)?;
        Ok(cipher::derive_key(&session.username))
    }

    pub async fn channel_snapshot(&self) -> ChannelState {
        self.inner.lock().await.channel.clone()
    }

    async fn authed(&self) -> Result<(String, String)> {
        let guard = self.inner.lock().await;
        let session = guard.session.as_ref().ok_or(ClientError::NotAuthenticated)?;
        Ok((session.server.base_url(), session.token.clone()))
    }

    /// Encodes and sends one outgoing message or command against the
    /// current channel. Empty (post-trim) input is a no-op: no payload is
    /// built and no request leaves the client.
    pub async fn send_message(&self, text: &str) -> Result<()> {
        let (base_url, token, channel) = {
            let guard = self.inner.lock().await;
            let session = guard.session.as_ref().ok_or(ClientError::NotAuthenticated)?;
            (
                session.server.base_url(),
                session.token.clone(),
                guard.channel.name.clone(),
            )
        };
        let Some(payload) = codec::encode_outgoing(text, &channel) else {
            return Ok(());
        };
        let response = self
            .http
            .post(format!("{base_url}/message"))
            .bearer_auth(&token)
            .json(&payload)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ClientError::Api(
                error_message(response, "failed to send message").await,
            ));
        }
        Ok(())
    }

    /// Replaces the current channel view with a fresh one, announces the
    /// join to the service, and fetches the new channel's topic and file
    /// list. The old channel's rendered log and roster are discarded — the
    /// client projects exactly one channel at a time. The session is
    /// untouched.
    pub async fn switch_channel(&self, name: &str) -> Result<()> {
        let name = normalize_channel(name);
        {
            let mut guard = self.inner.lock().await;
            if guard.session.is_none() {
                return Err(ClientError::NotAuthenticated);
            }
            guard.channel = ChannelState::fresh(&name);
        }

        self.send_message(&format!("/join {name}")).await?;

        match self.fetch_topic(&name).await {
            Ok(topic) => {
                let mut guard = self.inner.lock().await;
                if guard.channel.name == name {
                    guard.channel.topic = topic.clone();
                    let _ = self.events.send(ClientEvent::TopicUpdated {
                        channel: name.clone(),
                        topic,
                    });
                }
            }
            Err(err) => {
                warn!(channel = %name, "topic fetch failed: {err}");
                let _ = self
                    .events
                    .send(ClientEvent::Error(format!("topic fetch failed: {err}")));
            }
        }

        match self.list_files(&name).await {
            Ok(files) => {
                let mut guard = self.inner.lock().await;
                if guard.channel.name == name {
                    guard.channel.files = files.clone();
                    let _ = self.events.send(ClientEvent::FileListUpdated(files));
                }
            }
            Err(err) => {
                warn!(channel = %name, "file list fetch failed: {err}");
                let _ = self
                    .events
                    .send(ClientEvent::Error(format!("file list fetch failed: {err}")));
            }
        }

        Ok(())
    }

    async fn fetch_topic(&self, channel: &str) -> Result<String> {
        let (base_url, token) = self.authed().await?;
        let response = self
            .http
            .get(format!("{base_url}/channels/{}", channel_path(channel)))
            .bearer_auth(&token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ClientError::Api(
                error_message(response, "failed to fetch channel topic").await,
            ));
        }
        let body: ChannelTopicResponse = response
            .json()
            .await
            .map_err(|err| ClientError::Api(format!("malformed topic response: {err}")))?;
        Ok(body.topic)
    }

    pub async fn list_channels(&self) -> Result<Vec<ChannelSummary>> {
        let (base_url, token) = self.authed().await?;
        let response = self
            .http
            .get(format!("{base_url}/channels"))
            .bearer_auth(&token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ClientError::Api(
                error_message(response, "failed to list channels").await,
            ));
        }
        let body: ChannelListResponse = response
            .json()
            .await
            .map_err(|err| ClientError::Api(format!("malformed channel list: {err}")))?;
        Ok(body.channels)
    }

    /// Creates a channel and switches to it, mirroring the join flow.
    pub async fn create_channel(&self, name: &str, topic: &str) -> Result<String> {
        let (base_url, token) = self.authed().await?;
        let request = CreateChannelRequest {
            name: normalize_channel(name),
            topic: topic.to_string(),
        };
        let response = self
            .http
            .post(format!("{base_url}/channels/create"))
            .bearer_auth(&token)
            .json(&request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ClientError::Api(
                error_message(response, "failed to create channel").await,
            ));
        }
        let body: CreateChannelResponse = response
            .json()
            .await
            .map_err(|err| ClientError::Api(format!("malformed create response: {err}")))?;
        self.switch_channel(&body.name).await?;
        Ok(body.name)
    }

    /// Uploads a file bound to a channel and returns the server-assigned
    /// record. When the target channel is still current, the record is
    /// appended to the local file list as well.
    pub async fn upload_file(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        channel: &str,
    ) -> Result<FileRecord> {
        let (base_url, token) = self.authed().await?;
        let part = multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = multipart::Form::new()
            .part("file", part)
            .text("channel", channel.to_string());
        let response = self
            .http
            .post(format!("{base_url}/upload"))
            .bearer_auth(&token)
            .multipart(form)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ClientError::Upload(
                error_message(response, "upload failed").await,
            ));
        }
        let body: UploadResponse = response
            .json()
            .await
            .map_err(|err| ClientError::Upload(format!("malformed upload response: {err}")))?;

        {
            let mut guard = self.inner.lock().await;
            if guard.channel.name == channel {
                guard.channel.files.push(body.file.clone());
                let _ = self
                    .events
                    .send(ClientEvent::FileListUpdated(guard.channel.files.clone()));
            }
        }
        Ok(body.file)
    }

    pub async fn list_files(&self, channel: &str) -> Result<Vec<FileRecord>> {
        let (base_url, token) = self.authed().await?;
        let response = self
            .http
            .get(format!("{base_url}/files/{}", channel_path(channel)))
            .bearer_auth(&token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ClientError::Api(
                error_message(response, "failed to list files").await,
            ));
        }
        let body: FileListResponse = response
            .json()
            .await
            .map_err(|err| ClientError::Api(format!("malformed file list: {err}")))?;
        Ok(body.files)
    }

    /// Fetches a file's bytes plus the filename the server suggests via a
    /// content-disposition header, falling back to a fixed placeholder
    /// when the header is absent or unparseable.
    pub async fn download_file(&self, file_id: i64) -> Result<(Vec<u8>, String)> {
        let (base_url, token) = self.authed().await?;
        let response = self
            .http
            .get(format!("{base_url}/download/{file_id}"))
            .bearer_auth(&token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ClientError::Download(
                error_message(response, "download failed").await,
            ));
        }
        let filename = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(filename_from_content_disposition)
            .unwrap_or_else(|| DOWNLOAD_FALLBACK_NAME.to_string());
        let bytes = response.bytes().await?.to_vec();
        Ok((bytes, filename))
    }

    /// Read-only variant of download restricted to recognized image and
    /// text extensions; anything else is `Preview::Unavailable`.
    pub async fn preview_file(&self, file_id: i64, filename: &str) -> Result<Preview> {
        let extension = filename
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            let (bytes, _) = self.download_file(file_id).await?;
            Ok(Preview::Image { bytes })
        } else if TEXT_EXTENSIONS.contains(&extension.as_str()) {
            let (bytes, _) = self.download_file(file_id).await?;
            Ok(Preview::Text {
                content: String::from_utf8_lossy(&bytes).into_owned(),
            })
        } else {
            Ok(Preview::Unavailable)
        }
    }

    /// Starts the poll loop (Idle → Running). A no-op when already
    /// running. The loop is a cancellable scheduled task: each spawned run
    /// is tagged with a generation, and results from a superseded
    /// generation are discarded rather than applied.
    pub async fn start_polling(self: &Arc<Self>) {
        let generation = {
            let mut guard = self.inner.lock().await;
            if guard.poll_running {
                return;
            }
            guard.poll_generation += 1;
            guard.poll_running = true;
            guard.poll_generation
        };
        let client = Arc::clone(self);
        tokio::spawn(async move {
            client.poll_loop(generation).await;
        });
    }

    /// Cancels polling (Running → Stopped). Idempotent; bumping the
    /// generation makes any in-flight response from the old run stale.
    pub async fn stop_polling(&self) {
        let mut guard = self.inner.lock().await;
        guard.poll_generation += 1;
        guard.poll_running = false;
    }

    pub async fn is_polling(&self) -> bool {
        self.inner.lock().await.poll_running
    }

    async fn poll_loop(&self, generation: u64) {
        loop {
            let context = {
                let guard = self.inner.lock().await;
                if guard.poll_generation != generation || !guard.poll_running {
                    return;
                }
                guard
                    .session
                    .as_ref()
                    .map(|s| (s.server.base_url(), s.token.clone(), guard.channel.name.clone()))
            };
            // No token, no request: a cleared session ends the loop.
            let Some((base_url, token, channel)) = context else {
                return;
            };

            match self.poll_once(&base_url, &token).await {
                Ok(body) => self.apply_poll_result(generation, &channel, body).await,
                Err(PollFailure::Unauthorized) => {
                    self.expire_session(generation).await;
                    return;
                }
                Err(PollFailure::Transport(message)) => {
                    // Transient failures never stop polling.
                    warn!("poll request failed: {message}");
                }
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn poll_once(
        &self,
        base_url: &str,
        token: &str,
    ) -> std::result::Result<PollResponse, PollFailure> {
        let response = self
            .http
            .get(format!("{base_url}/poll"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| PollFailure::Transport(err.to_string()))?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(PollFailure::Unauthorized);
        }
        if !response.status().is_success() {
            return Err(PollFailure::Transport(format!(
                "unexpected status {}",
                response.status()
            )));
        }
        response
            .json::<PollResponse>()
            .await
            .map_err(|err| PollFailure::Transport(format!("malformed poll payload: {err}")))
    }

    /// Applies one poll response under the state lock. Responses issued
    /// under a superseded generation, or for a channel that is no longer
    /// current, are dropped wholesale: a switch must never be interleaved
    /// with results destined for the abandoned channel.
    async fn apply_poll_result(&self, generation: u64, polled_channel: &str, body: PollResponse) {
        let mut guard = self.inner.lock().await;
        if guard.poll_generation != generation || guard.channel.name != polled_channel {
            return;
        }

        let events: Vec<ChatEvent> = body
            .messages
            .iter()
            .map(|raw| codec::decode_incoming(raw))
            .collect();
        let roster = body.users.get(&guard.channel.name).cloned();

        for event in &events {
            let _ = self.events.send(ClientEvent::Message(event.clone()));
        }
        guard.channel.apply_poll(events, roster.clone());
        if let Some(roster) = roster {
            let _ = self.events.send(ClientEvent::RosterUpdated(roster));
        }
    }

    async fn expire_session(&self, generation: u64) {
        let mut guard = self.inner.lock().await;
        if guard.poll_generation != generation {
            return;
        }
        guard.session = None;
        guard.poll_running = false;
        info!("session expired; polling stopped");
        let _ = self.events.send(ClientEvent::SessionExpired);
    }
}

fn validated_credentials(username: &str, password: &str) -> Result<CredentialsRequest> {
    let username = username.trim();
    let password = password.trim();
    if username.is_empty() || password.is_empty() {
        return Err(ClientError::Validation(
            "username and password must not be empty".to_string(),
        ));
    }
    Ok(CredentialsRequest {
        username: username.to_string(),
        password: password.to_string(),
    })
}

fn normalize_channel(name: &str) -> String {
    let name = name.trim();
    if name.starts_with('#') {
        name.to_string()
    } else {
        format!("#{name}")
    }
}

/// Channel names carry a leading `#`, which a URL parser would read as the
/// start of a fragment; encode it so the path segment survives.
fn channel_path(channel: &str) -> String {
    channel.replace('#', "%23")
}

fn filename_from_content_disposition(header: &str) -> Option<String> {
    let (_, value) = header.split_once("filename=")?;
    let name: String = value.chars().filter(|c| *c != '"').collect();
    let name = name.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

async fn error_message(response: reqwest::Response, fallback: &str) -> String {
    let status = response.status();
    match response.json::<ErrorBody>().await {
        Ok(body) if !body.error.is_empty() => body.error,
        _ => format!("{fallback} (status {status})"),
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
