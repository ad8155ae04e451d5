//! Stream attach/retry state machine.
//!
//! The controller owns a [`MediaBackend`] and walks the connection methods in
//! order whenever an attach attempt fails fatally. After every method has
//! failed once in the current cycle it stops in
//! [`PlaybackState::AllMethodsFailed`] until the user retries.
//!
//! Every backend event is tagged with the generation of the attach attempt
//! that produced it. Events from superseded attempts are dropped, so a killed
//! ffmpeg process can never move the state of the session that replaced it.

use crate::error::AppError;
use crate::methods::ConnectionMethod;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlaybackState {
    #[default]
    Idle,
    Loading { method: usize },
    Playing { method: usize },
    FatalError { method: usize },
    /// The source finished on its own, e.g. a clip or a closed playlist.
    Ended { method: usize },
    AllMethodsFailed,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlaybackSession {
    pub current_url: Option<String>,
    pub title: String,
    pub method_index: usize,
    pub is_loading: bool,
    pub has_error: bool,
    pub error_message: Option<String>,
    pub current_time: f64,
    pub duration: Option<f64>,
    pub state: PlaybackState,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachKind {
    /// HLS manifest, fetched with the method's headers.
    Streaming,
    /// Anything else, opened as-is.
    Native,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AttachRequest {
    pub generation: u64,
    pub url: String,
    pub kind: AttachKind,
    pub method: ConnectionMethod,
    pub start_at: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MediaEventKind {
    ManifestParsed,
    CanPlay,
    Fatal(String),
    NativeError(String),
    NonFatal(String),
    TimeUpdate { current: f64 },
    MetadataLoaded { duration: Option<f64> },
    Ended,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MediaEvent {
    pub generation: u64,
    pub kind: MediaEventKind,
}

impl MediaEvent {
    pub fn new(generation: u64, kind: MediaEventKind) -> Self {
        Self { generation, kind }
    }
}

/// The element that actually plays media. Implementations report back
/// asynchronously with [`MediaEvent`]s carrying the request's generation.
pub trait MediaBackend {
    fn attach(&mut self, request: AttachRequest) -> Result<(), AppError>;
    /// Tear down the current instance. Must be safe to call when idle.
    fn detach(&mut self);
    /// Move the playback position. Out-of-range values are the backend's
    /// problem.
    fn seek(&mut self, position: f64);
}

pub fn is_manifest(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    let path = lower.split(['?', '#']).next().unwrap_or("");
    path.ends_with(".m3u8") || lower.contains(".m3u8?")
}

pub struct PlaybackController<B> {
    backend: B,
    methods: &'static [ConnectionMethod],
    session: PlaybackSession,
    generation: u64,
    attempts: usize,
    updates: watch::Sender<PlaybackSession>,
}

impl<B: MediaBackend> PlaybackController<B> {
    pub fn new(
        backend: B,
        methods: &'static [ConnectionMethod],
    ) -> (Self, watch::Receiver<PlaybackSession>) {
        let (updates, rx) = watch::channel(PlaybackSession::default());
        let controller = Self {
            backend,
            methods,
            session: PlaybackSession::default(),
            generation: 0,
            attempts: 0,
            updates,
        };
        (controller, rx)
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn methods(&self) -> &'static [ConnectionMethod] {
        self.methods
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Switch to a new locator. Whatever was attached before is discarded.
    pub fn load(&mut self, url: &str, title: &str) {
        info!(url, title, "loading stream");
        self.backend.detach();
        self.session = PlaybackSession {
            current_url: Some(url.to_string()),
            title: title.to_string(),
            ..PlaybackSession::default()
        };
        self.attempts = 0;
        self.begin_attempt(0);
    }

    /// Start a fresh cycle from the first method.
    pub fn retry(&mut self) {
        if self.session.current_url.is_none() {
            return;
        }
        info!("manual retry");
        self.attempts = 0;
        self.begin_attempt(0);
    }

    /// Skip to the following method and start a fresh cycle from there.
    pub fn next_method(&mut self) {
        if self.session.current_url.is_none() || self.methods.is_empty() {
            return;
        }
        let next = (self.session.method_index + 1) % self.methods.len();
        info!(method = self.methods[next].id, "manual method switch");
        self.attempts = 0;
        self.begin_attempt(next);
    }

    pub fn seek(&mut self, position: f64) {
        match self.session.state {
            PlaybackState::Loading { .. } | PlaybackState::Playing { .. } => {
                debug!(position, "seek");
                self.backend.seek(position);
            }
            PlaybackState::Ended { method } => {
                debug!(position, "seek after end, reopening");
                self.session.state = PlaybackState::Loading { method };
                self.session.is_loading = true;
                self.publish();
                self.backend.seek(position);
            }
            _ => debug!(position, "seek ignored, nothing attached"),
        }
    }

    /// Stop playback and go back to idle.
    pub fn stop(&mut self) {
        self.backend.detach();
        self.generation += 1;
        self.session = PlaybackSession::default();
        self.attempts = 0;
        self.publish();
    }

    pub fn handle_event(&mut self, event: MediaEvent) {
        if event.generation != self.generation {
            debug!(
                stale = event.generation,
                current = self.generation,
                "dropping event from superseded attach"
            );
            return;
        }

        let method = match self.session.state {
            PlaybackState::Loading { method } | PlaybackState::Playing { method } => method,
            _ => return,
        };

        match event.kind {
            MediaEventKind::ManifestParsed | MediaEventKind::CanPlay => {
                if matches!(self.session.state, PlaybackState::Loading { .. }) {
                    info!(method = self.methods[method].id, "playback started");
                }
                self.session.state = PlaybackState::Playing { method };
                self.session.is_loading = false;
                self.session.has_error = false;
                self.session.error_message = None;
                // a later drop gets a full cycle of its own
                self.attempts = 0;
                self.publish();
            }
            MediaEventKind::Fatal(msg) => {
                self.fail(AppError::StreamingClientFatal(msg).to_string());
            }
            MediaEventKind::NativeError(msg) => {
                self.fail(AppError::NativeMediaError(msg).to_string());
            }
            MediaEventKind::NonFatal(msg) => {
                debug!(%msg, "recoverable media error");
            }
            MediaEventKind::TimeUpdate { current } => {
                self.session.current_time = current;
                self.publish();
            }
            MediaEventKind::MetadataLoaded { duration } => {
                debug!(?duration, "metadata loaded");
                self.session.duration = duration;
                self.publish();
            }
            MediaEventKind::Ended => {
                info!("stream ended");
                self.session.state = PlaybackState::Ended { method };
                self.session.is_loading = false;
                self.publish();
            }
        }
    }

    fn begin_attempt(&mut self, method: usize) {
        self.backend.detach();
        self.generation += 1;

        let Some(url) = self.session.current_url.clone() else {
            return;
        };
        if self.methods.is_empty() {
            self.exhaust();
            return;
        }

        self.attempts += 1;
        self.session.method_index = method;
        self.session.state = PlaybackState::Loading { method };
        self.session.is_loading = true;
        self.session.has_error = false;
        self.session.current_time = 0.0;
        self.session.duration = None;
        self.publish();

        let kind = if is_manifest(&url) {
            AttachKind::Streaming
        } else {
            AttachKind::Native
        };
        let request = AttachRequest {
            generation: self.generation,
            url,
            kind,
            method: self.methods[method],
            start_at: 0.0,
        };
        info!(
            method = request.method.id,
            attempt = self.attempts,
            ?kind,
            "attaching"
        );

        if let Err(e) = self.backend.attach(request) {
            self.fail(e.to_string());
        }
    }

    fn fail(&mut self, message: String) {
        let method = self.session.method_index;
        warn!(method = self.methods[method].id, %message, "attach attempt failed");

        self.session.state = PlaybackState::FatalError { method };
        self.session.is_loading = false;
        self.session.has_error = true;
        self.session.error_message = Some(message);
        self.publish();

        if self.attempts >= self.methods.len() {
            self.exhaust();
        } else {
            self.begin_attempt((method + 1) % self.methods.len());
        }
    }

    fn exhaust(&mut self) {
        warn!("all connection methods failed");
        self.backend.detach();
        self.generation += 1;
        let last = self.session.error_message.take();
        self.session.state = PlaybackState::AllMethodsFailed;
        self.session.is_loading = false;
        self.session.has_error = true;
        self.session.error_message = Some(match last {
            Some(last) => format!("{} ({})", AppError::AllMethodsExhausted, last),
            None => AppError::AllMethodsExhausted.to_string(),
        });
        self.publish();
    }

    fn publish(&self) {
        self.updates.send_replace(self.session.clone());
    }
}
