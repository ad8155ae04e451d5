use crate::error::AppError;
use crate::playback::{AttachKind, AttachRequest, MediaBackend, MediaEvent, MediaEventKind};
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, Stdio};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

const CHANNELS: u16 = 2;
const SAMPLE_RATE: u32 = 44100;
// Samples (all channels) between two time updates, a quarter second.
const TIME_UPDATE_EVERY: u64 = SAMPLE_RATE as u64 * CHANNELS as u64 / 4;

struct ActiveAttach {
    request: AttachRequest,
    child: Arc<Mutex<Option<Child>>>,
    sink: Sink,
    duration: Arc<Mutex<Option<f64>>>,
}

/// Plays a locator by decoding it with ffmpeg and feeding PCM to rodio.
pub struct FfmpegBackend {
    ffmpeg: String,
    io_timeout: Duration,
    events: UnboundedSender<MediaEvent>,
    handle: OutputStreamHandle,
    active: Option<ActiveAttach>,
    volume: f32,
    paused: bool,
    _stream: OutputStream, // must keep alive or audio stops
}

impl FfmpegBackend {
    pub fn new(
        ffmpeg: &str,
        io_timeout: Duration,
        volume: f32,
        events: UnboundedSender<MediaEvent>,
    ) -> Result<Self, AppError> {
        let (stream, handle) = OutputStream::try_default().map_err(|e| {
            AppError::Backend(format!(
                "Failed to initialize audio output: {}. Check your audio drivers.",
                e
            ))
        })?;

        Ok(Self {
            ffmpeg: ffmpeg.to_string(),
            io_timeout,
            events,
            handle,
            active: None,
            volume: volume.clamp(0.0, 2.0),
            paused: false,
            _stream: stream,
        })
    }

    fn spawn(&mut self, request: AttachRequest) -> Result<(), AppError> {
        let sink = Sink::try_new(&self.handle)
            .map_err(|e| AppError::Backend(format!("Failed to create audio sink: {}", e)))?;
        sink.set_volume(self.volume);
        if self.paused {
            sink.pause();
        }

        let mut child = Command::new(&self.ffmpeg)
            .args(ffmpeg_args(&request, self.io_timeout))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                AppError::Backend(format!(
                    "Failed to spawn {}: {}. Is ffmpeg installed?",
                    self.ffmpeg, e
                ))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Backend("Failed to capture ffmpeg stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AppError::Backend("Failed to capture ffmpeg stderr".into()))?;

        let child = Arc::new(Mutex::new(Some(child)));
        let duration = Arc::new(Mutex::new(None));
        let last_error = Arc::new(Mutex::new(String::new()));
        let (tx, rx) = mpsc::sync_channel::<Vec<i16>>(10);

        {
            let events = self.events.clone();
            let duration = duration.clone();
            let last_error = last_error.clone();
            let generation = request.generation;
            thread::spawn(move || watch_stderr(stderr, generation, events, duration, last_error));
        }

        {
            let events = self.events.clone();
            let child = child.clone();
            let request = request.clone();
            thread::spawn(move || pump_pcm(stdout, tx, request, events, child, last_error));
        }

        sink.append(FfmpegSource::new(
            rx,
            CHANNELS,
            SAMPLE_RATE,
            request.start_at,
            request.generation,
            self.events.clone(),
        ));

        info!(url = %request.url, method = request.method.id, "ffmpeg started");
        self.active = Some(ActiveAttach {
            request,
            child,
            sink,
            duration,
        });
        Ok(())
    }
}

/// Output-side controls the shell needs besides attach/seek.
pub trait Transport {
    fn pause(&mut self);
    fn play(&mut self);
    fn is_paused(&self) -> bool;
    fn set_volume(&mut self, vol: f32);
    fn volume(&self) -> f32;
}

impl Transport for FfmpegBackend {
    fn pause(&mut self) {
        self.paused = true;
        if let Some(active) = &self.active {
            active.sink.pause();
        }
    }

    fn play(&mut self) {
        self.paused = false;
        if let Some(active) = &self.active {
            active.sink.play();
        }
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn set_volume(&mut self, vol: f32) {
        self.volume = vol.clamp(0.0, 2.0);
        if let Some(active) = &self.active {
            active.sink.set_volume(self.volume);
        }
    }

    fn volume(&self) -> f32 {
        self.volume
    }
}

impl MediaBackend for FfmpegBackend {
    fn attach(&mut self, request: AttachRequest) -> Result<(), AppError> {
        self.detach();
        self.spawn(request)
    }

    fn detach(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        active.sink.stop();
        kill_child(&active.child);
        debug!(generation = active.request.generation, "detached");
    }

    fn seek(&mut self, position: f64) {
        let Some(active) = self.active.take() else {
            return;
        };
        let duration = active.duration.lock().ok().and_then(|d| *d);
        let target = clamp_position(position, duration);

        active.sink.stop();
        kill_child(&active.child);

        let request = AttachRequest {
            start_at: target,
            ..active.request
        };
        let generation = request.generation;
        let restart = self.spawn(request);

        if let Some(active) = &self.active {
            if let Ok(mut d) = active.duration.lock() {
                *d = duration;
            }
        }

        match restart {
            Ok(()) => {
                let _ = self.events.send(MediaEvent::new(
                    generation,
                    MediaEventKind::TimeUpdate { current: target },
                ));
            }
            Err(e) => {
                let _ = self
                    .events
                    .send(MediaEvent::new(generation, MediaEventKind::Fatal(e.to_string())));
            }
        }
    }
}

impl Drop for FfmpegBackend {
    fn drop(&mut self) {
        self.detach();
    }
}

fn kill_child(child: &Arc<Mutex<Option<Child>>>) {
    if let Ok(mut guard) = child.lock() {
        if let Some(mut c) = guard.take() {
            let _ = c.kill();
            let _ = c.wait();
        }
    }
}

pub fn clamp_position(position: f64, duration: Option<f64>) -> f64 {
    let position = if position.is_finite() { position.max(0.0) } else { 0.0 };
    match duration {
        Some(d) if d > 0.0 => position.min(d),
        _ => position,
    }
}

pub fn ffmpeg_args(request: &AttachRequest, io_timeout: Duration) -> Vec<String> {
    let mut args: Vec<String> = vec!["-hide_banner".into(), "-nostdin".into()];

    // A server that accepts and then stalls must still end the attempt.
    args.push("-rw_timeout".into());
    args.push(io_timeout.as_micros().to_string());

    if request.kind == AttachKind::Streaming {
        args.extend(
            [
                "-reconnect",
                "1",
                "-reconnect_streamed",
                "1",
                "-reconnect_delay_max",
                "5",
            ]
            .map(String::from),
        );

        if let Some(ua) = request.method.user_agent() {
            args.push("-user_agent".into());
            args.push(ua.into());
        }

        let headers: String = request
            .method
            .extra_headers()
            .map(|(k, v)| format!("{}: {}\r\n", k, v))
            .collect();
        if !headers.is_empty() {
            args.push("-headers".into());
            args.push(headers);
        }
    }

    if request.start_at > 0.0 {
        args.push("-ss".into());
        args.push(format!("{:.3}", request.start_at));
    }

    args.push("-i".into());
    args.push(request.url.clone());

    args.extend(
        [
            "-vn",
            "-f",
            "s16le",
            "-acodec",
            "pcm_s16le",
            "-ar",
            "44100",
            "-ac",
            "2",
            "-loglevel",
            "info",
            "-",
        ]
        .map(String::from),
    );
    args
}

/// Reads "  Duration: 01:30:00.00, start: ..." as printed by ffmpeg.
pub fn parse_duration(line: &str) -> Option<Option<f64>> {
    let rest = line.trim_start().strip_prefix("Duration:")?;
    let stamp = rest.split(',').next()?.trim();
    if stamp == "N/A" {
        return Some(None);
    }

    let mut parts = stamp.split(':');
    let h: f64 = parts.next()?.parse().ok()?;
    let m: f64 = parts.next()?.parse().ok()?;
    let s: f64 = parts.next()?.parse().ok()?;
    Some(Some(h * 3600.0 + m * 60.0 + s))
}

fn looks_like_error(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    lower.contains("error") || lower.contains("failed") || lower.contains("forbidden")
}

fn watch_stderr(
    stderr: impl Read,
    generation: u64,
    events: UnboundedSender<MediaEvent>,
    duration: Arc<Mutex<Option<f64>>>,
    last_error: Arc<Mutex<String>>,
) {
    let reader = BufReader::new(stderr);
    let mut metadata_sent = false;

    for line in reader.lines() {
        let Ok(line) = line else { break };

        if !metadata_sent {
            if let Some(d) = parse_duration(&line) {
                metadata_sent = true;
                if let Ok(mut guard) = duration.lock() {
                    *guard = d;
                }
                let _ = events.send(MediaEvent::new(
                    generation,
                    MediaEventKind::MetadataLoaded { duration: d },
                ));
                continue;
            }
        }

        if looks_like_error(&line) {
            if let Ok(mut guard) = last_error.lock() {
                *guard = line.trim().to_string();
            }
            let _ = events.send(MediaEvent::new(
                generation,
                MediaEventKind::NonFatal(line.trim().to_string()),
            ));
        }
    }
}

fn pump_pcm(
    stdout: impl Read,
    tx: mpsc::SyncSender<Vec<i16>>,
    request: AttachRequest,
    events: UnboundedSender<MediaEvent>,
    child: Arc<Mutex<Option<Child>>>,
    last_error: Arc<Mutex<String>>,
) {
    let mut reader = BufReader::new(stdout);
    let mut buf = [0u8; 8192];
    let mut pending: Vec<u8> = Vec::with_capacity(buf.len() + 1);
    let mut started = false;

    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if !started {
                    started = true;
                    let kind = match request.kind {
                        AttachKind::Streaming => MediaEventKind::ManifestParsed,
                        AttachKind::Native => MediaEventKind::CanPlay,
                    };
                    let _ = events.send(MediaEvent::new(request.generation, kind));
                }

                // reads can split a sample in half
                pending.extend_from_slice(&buf[..n]);
                let whole = pending.len() & !1;
                let samples: Vec<i16> = pending[..whole]
                    .chunks_exact(2)
                    .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                pending.drain(..whole);

                if tx.send(samples).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    }

    // Taken by detach: the exit was ours and nobody is listening.
    let taken = child.lock().ok().and_then(|mut g| g.take());
    let Some(mut c) = taken else {
        return;
    };
    let status = c.wait();
    let succeeded = matches!(&status, Ok(s) if s.success());

    if succeeded && started {
        info!(generation = request.generation, "stream ended");
        let _ = events.send(MediaEvent::new(request.generation, MediaEventKind::Ended));
        return;
    }

    let detail = last_error
        .lock()
        .ok()
        .map(|e| e.clone())
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| match status {
            Ok(s) if !started && s.success() => "no audio received".to_string(),
            Ok(s) => format!("ffmpeg exited with {}", s),
            Err(e) => e.to_string(),
        });
    warn!(generation = request.generation, %detail, "ffmpeg failed");

    let kind = match request.kind {
        AttachKind::Streaming => MediaEventKind::Fatal(detail),
        AttachKind::Native => MediaEventKind::NativeError(detail),
    };
    let _ = events.send(MediaEvent::new(request.generation, kind));
}

struct FfmpegSource {
    rx: mpsc::Receiver<Vec<i16>>,
    buffer: VecDeque<i16>,
    channels: u16,
    sample_rate: u32,
    offset: f64,
    played: u64,
    generation: u64,
    events: UnboundedSender<MediaEvent>,
}

impl FfmpegSource {
    fn new(
        rx: mpsc::Receiver<Vec<i16>>,
        channels: u16,
        sample_rate: u32,
        offset: f64,
        generation: u64,
        events: UnboundedSender<MediaEvent>,
    ) -> Self {
        FfmpegSource {
            rx,
            buffer: VecDeque::with_capacity(8192),
            channels,
            sample_rate,
            offset,
            played: 0,
            generation,
            events,
        }
    }

    fn position(&self) -> f64 {
        self.offset + self.played as f64 / (self.sample_rate as f64 * self.channels as f64)
    }

    fn emit(&mut self, s: i16) -> f32 {
        self.played += 1;
        if self.played % TIME_UPDATE_EVERY == 0 {
            let _ = self.events.send(MediaEvent::new(
                self.generation,
                MediaEventKind::TimeUpdate {
                    current: FfmpegSource::position(self),
                },
            ));
        }
        s as f32 / 32768.0
    }
}

impl Iterator for FfmpegSource {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(s) = self.buffer.pop_front() {
                return Some(self.emit(s));
            }

            match self.rx.try_recv() {
                Ok(chunk) => {
                    self.buffer.extend(chunk);
                    continue;
                }
                Err(mpsc::TryRecvError::Empty) => {
                    match self.rx.recv_timeout(Duration::from_millis(100)) {
                        Ok(chunk) => {
                            self.buffer.extend(chunk);
                            continue;
                        }
                        // underrun: keep the sink alive with silence
                        Err(mpsc::RecvTimeoutError::Timeout) => return Some(0.0),
                        Err(mpsc::RecvTimeoutError::Disconnected) => return None,
                    }
                }
                Err(mpsc::TryRecvError::Disconnected) => return None,
            }
        }
    }
}

impl Source for FfmpegSource {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }
    fn channels(&self) -> u16 {
        self.channels
    }
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
    fn total_duration(&self) -> Option<Duration> {
        None // live stream
    }
}
