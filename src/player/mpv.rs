// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

//! [`Engine`] backed by an mpv process driven over its JSON IPC socket.

use super::engine::{
    Engine, EngineEvent, EngineFactory, Presentation, SeekRange, StreamProfile, Surface,
};
use crate::config::PlayerConfig;
use crate::error::{NimbusError, NimbusResult};
use anyhow::{Context, Result};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::process::{Child, Command};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::sleep;
use tracing::{debug, error, warn};

const OBS_PAUSED_FOR_CACHE: u64 = 1;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const RETRY_DELAY_MS: u64 = 500;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value>>>>>;

struct PendingRequest {
    request_id: u64,
    payload: String,
    reply: oneshot::Sender<Result<Value>>,
}

/// Launches one mpv window per surface.
#[derive(Debug, Clone)]
pub struct MpvFactory {
    command: String,
    extra_args: Vec<String>,
}

impl MpvFactory {
    pub fn new(config: &PlayerConfig) -> Self {
        Self {
            command: config.command.clone(),
            extra_args: config.extra_args.clone(),
        }
    }

    pub fn is_available(&self) -> bool {
        std::process::Command::new(&self.command)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

impl EngineFactory for MpvFactory {
    type Engine = MpvEngine;

    async fn attach(&self, surface: &Surface) -> NimbusResult<MpvEngine> {
        MpvEngine::launch(&self.command, &self.extra_args, surface)
            .await
            .map_err(|e| NimbusError::EngineInit(format!("{:#}", e)))
    }
}

/// Decrements the in-flight load counter when dropped.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct MpvEngine {
    socket_path: PathBuf,
    process: Mutex<Option<Child>>,
    writer: mpsc::Sender<PendingRequest>,
    pending: PendingMap,
    next_request_id: AtomicU64,
    raw_events: broadcast::Sender<Value>,
    events: broadcast::Sender<EngineEvent>,
    loads_in_flight: Arc<AtomicUsize>,
    profile: Mutex<Option<StreamProfile>>,
}

/// Socket path for `surface` under the user's state directory.
///
/// Falls back to a uid-scoped name in the temp directory.
fn socket_path(surface: &Surface) -> PathBuf {
    let name = format!(
        "mpv-{}-{}.sock",
        surface
            .name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect::<String>(),
        std::process::id()
    );

    let state_dir = std::env::var("XDG_STATE_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(dirs::state_dir)
        .map(|dir| dir.join("nimbus"));

    if let Some(dir) = state_dir {
        let ready = dir.exists()
            || fs::create_dir_all(&dir)
                .and_then(|_| fs::set_permissions(&dir, fs::Permissions::from_mode(0o700)))
                .map_err(|e| warn!("Failed to create state directory: {}", e))
                .is_ok();
        if ready {
            return dir.join(name);
        }
    }

    let uid = unsafe { libc::getuid() };
    std::env::temp_dir().join(format!("nimbus-{}-{}", uid, name))
}

fn file_error(event: &Value) -> String {
    event
        .get("file_error")
        .and_then(Value::as_str)
        .unwrap_or("playback error")
        .to_string()
}

fn is_error_end(event: &Value) -> bool {
    event.get("event").and_then(Value::as_str) == Some("end-file")
        && event.get("reason").and_then(Value::as_str) == Some("error")
}

/// Last seekable window from mpv's `demuxer-cache-state`.
fn parse_seek_range(cache_state: &Value) -> Option<SeekRange> {
    let range = cache_state.get("seekable-ranges")?.as_array()?.last()?;
    Some(SeekRange {
        start: range.get("start")?.as_f64()?,
        end: range.get("end")?.as_f64()?,
    })
}

/// mpv option values for a stream profile.
fn profile_properties(profile: &StreamProfile) -> Vec<(&'static str, Value)> {
    let bytes_per_sec = profile.default_bandwidth_estimate / 8;
    let back_bytes = profile.buffer_behind.as_secs() * bytes_per_sec;
    let hls_bitrate = if profile.abr_enabled {
        profile.default_bandwidth_estimate.to_string()
    } else {
        "max".to_string()
    };

    vec![
        ("cache", json!("yes")),
        ("cache-secs", json!(profile.buffering_goal.as_secs_f64())),
        (
            "demuxer-readahead-secs",
            json!(profile.buffering_goal.as_secs_f64()),
        ),
        ("cache-pause-wait", json!(profile.rebuffering_goal.as_secs_f64())),
        ("cache-pause-initial", json!(!profile.low_latency)),
        ("demuxer-max-back-bytes", json!(back_bytes)),
        ("network-timeout", json!(profile.retry.timeout.as_secs_f64())),
        ("hls-bitrate", json!(hls_bitrate)),
    ]
}

impl MpvEngine {
    async fn launch(command: &str, extra_args: &[String], surface: &Surface) -> Result<Self> {
        let socket_path = socket_path(surface);
        debug!("Launching mpv for {} at {:?}", surface.name, socket_path);

        if socket_path.exists() {
            let _ = fs::remove_file(&socket_path);
        }

        // setsid keeps terminal signals aimed at the TUI away from mpv
        let mut cmd = if cfg!(target_os = "linux") {
            let mut setsid_cmd = Command::new("setsid");
            setsid_cmd.arg(command);
            setsid_cmd
        } else {
            Command::new(command)
        };

        cmd.arg(format!("--input-ipc-server={}", socket_path.display()))
            .arg("--idle=yes")
            .arg("--force-window=yes")
            .arg("--keep-open=yes")
            .arg("--no-terminal")
            .arg("--really-quiet")
            .arg("--mute=yes")
            .arg(format!("--title=Nimbus ({})", surface.name))
            .arg("--geometry=1280x720")
            .args(extra_args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to start {}. Is mpv installed?", command))?;

        let stream = Self::wait_for_socket(&mut child, &socket_path).await?;
        let (read_half, write_half) = stream.into_split();

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (writer, writer_rx) = mpsc::channel(64);
        let (raw_events, _) = broadcast::channel(256);
        let (events, _) = broadcast::channel(64);
        let loads_in_flight = Arc::new(AtomicUsize::new(0));

        tokio::spawn(writer_task(write_half, writer_rx, Arc::clone(&pending)));
        tokio::spawn(reader_task(
            BufReader::new(read_half),
            Arc::clone(&pending),
            raw_events.clone(),
            events.clone(),
            Arc::clone(&loads_in_flight),
        ));

        let engine = Self {
            socket_path,
            process: Mutex::new(Some(child)),
            writer,
            pending,
            next_request_id: AtomicU64::new(1),
            raw_events,
            events,
            loads_in_flight,
            profile: Mutex::new(None),
        };

        engine
            .command(json!(["observe_property", OBS_PAUSED_FOR_CACHE, "paused-for-cache"]))
            .await
            .context("Failed to observe cache state")?;

        Ok(engine)
    }

    async fn wait_for_socket(child: &mut Child, socket_path: &Path) -> Result<UnixStream> {
        for attempt in 0..20 {
            sleep(Duration::from_millis(500)).await;

            match child.try_wait() {
                Ok(Some(status)) => {
                    error!("mpv exited unexpectedly with status: {:?}", status);
                    anyhow::bail!("mpv exited unexpectedly with status: {:?}", status);
                }
                Ok(None) => {}
                Err(e) => warn!("Failed to check mpv process status: {}", e),
            }

            if socket_path.exists() {
                match UnixStream::connect(socket_path).await {
                    Ok(stream) => {
                        debug!("mpv IPC socket ready after {} ms", (attempt + 1) * 500);
                        return Ok(stream);
                    }
                    Err(e) => debug!("mpv IPC socket not accepting yet: {}", e),
                }
            }
        }

        anyhow::bail!("mpv IPC socket failed to start after 10 seconds")
    }

    async fn command(&self, command: Value) -> Result<Value> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let mut payload = serde_json::to_string(&json!({
            "command": command,
            "request_id": request_id,
        }))?;
        payload.push('\n');

        let (reply, reply_rx) = oneshot::channel();
        self.writer
            .send(PendingRequest {
                request_id,
                payload,
                reply,
            })
            .await
            .map_err(|_| anyhow::anyhow!("mpv writer task gone"))?;

        await_reply(&self.pending, request_id, reply_rx, REQUEST_TIMEOUT).await
    }

    async fn set_property(&self, name: &str, value: Value) -> Result<()> {
        self.command(json!(["set_property", name, value]))
            .await
            .with_context(|| format!("Failed to set {}", name))?;
        Ok(())
    }

    async fn get_property(&self, name: &str) -> Result<Value> {
        let response = self.command(json!(["get_property", name])).await?;
        Ok(response.get("data").cloned().unwrap_or(Value::Null))
    }

    fn profile(&self) -> Option<StreamProfile> {
        self.profile
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sends `loadfile` and waits for mpv to report the outcome.
    async fn load_once(&self, url: &str, timeout: Duration) -> NimbusResult<()> {
        let mut raw = self.raw_events.subscribe();

        self.command(json!(["loadfile", url, "replace"]))
            .await
            .map_err(|e| NimbusError::StreamUnavailable(format!("{:#}", e)))?;

        let outcome = tokio::time::timeout(timeout, async {
            loop {
                match raw.recv().await {
                    Ok(event) => {
                        if event.get("event").and_then(Value::as_str) == Some("file-loaded") {
                            return Ok(());
                        }
                        if is_error_end(&event) {
                            return Err(NimbusError::StreamUnavailable(file_error(&event)));
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(NimbusError::StreamUnavailable(
                            "mpv connection closed".to_string(),
                        ));
                    }
                }
            }
        })
        .await;

        outcome.unwrap_or_else(|_| {
            Err(NimbusError::StreamUnavailable(format!(
                "no response after {}s",
                timeout.as_secs()
            )))
        })
    }

    fn player_error(e: anyhow::Error) -> NimbusError {
        NimbusError::Player(format!("{:#}", e))
    }
}

impl Engine for MpvEngine {
    async fn configure(&self, profile: &StreamProfile) -> NimbusResult<()> {
        for (name, value) in profile_properties(profile) {
            // Older mpv builds lack some of these options
            if let Err(e) = self.set_property(name, value).await {
                debug!("{:#}", e);
            }
        }
        *self.profile.lock().unwrap_or_else(PoisonError::into_inner) = Some(profile.clone());
        Ok(())
    }

    async fn load(&self, url: &str) -> NimbusResult<()> {
        let (attempts, timeout) = self
            .profile()
            .map(|p| (p.retry.max_attempts.max(1), p.retry.timeout))
            .unwrap_or((1, Duration::from_secs(8)));

        let _in_flight = InFlight::enter(&self.loads_in_flight);
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay_ms = RETRY_DELAY_MS * attempt as u64;
                debug!(
                    "Retrying stream (attempt {}/{}), waiting {}ms",
                    attempt + 1,
                    attempts,
                    delay_ms
                );
                sleep(Duration::from_millis(delay_ms)).await;
            }

            match self.load_once(url, timeout).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!("Load attempt {}/{} failed: {}", attempt + 1, attempts, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| NimbusError::StreamUnavailable("failed to load".to_string())))
    }

    async fn is_live(&self) -> bool {
        // Live streams expose no duration
        !matches!(self.get_property("duration").await, Ok(Value::Number(_)))
    }

    async fn seek_range(&self) -> Option<SeekRange> {
        let cache_state = self.get_property("demuxer-cache-state").await.ok()?;
        parse_seek_range(&cache_state)
    }

    async fn seek(&self, position: f64) -> NimbusResult<()> {
        self.command(json!(["seek", position, "absolute"]))
            .await
            .map(|_| ())
            .map_err(Self::player_error)
    }

    async fn play(&self) -> NimbusResult<()> {
        self.set_property("pause", json!(false))
            .await
            .map_err(Self::player_error)
    }

    async fn unload(&self) -> NimbusResult<()> {
        self.command(json!(["stop"]))
            .await
            .map(|_| ())
            .map_err(Self::player_error)
    }

    async fn destroy(&self) -> NimbusResult<()> {
        debug!("Shutting down mpv at {:?}", self.socket_path);
        let _ = self.command(json!(["quit"])).await;

        let child = self
            .process
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut child) = child {
            if let Err(e) = child.kill().await {
                debug!("mpv already gone: {}", e);
            }
        }

        if self.socket_path.exists() {
            let _ = fs::remove_file(&self.socket_path);
        }
        Ok(())
    }

    async fn set_presentation(&self, presentation: Presentation) -> NimbusResult<()> {
        let fullscreen = presentation == Presentation::Fullscreen;
        self.set_property("fullscreen", json!(fullscreen))
            .await
            .map_err(Self::player_error)?;
        self.set_property("mute", json!(!fullscreen))
            .await
            .map_err(Self::player_error)
    }

    fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }
}

impl Drop for MpvEngine {
    fn drop(&mut self) {
        let child = self
            .process
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut child) = child {
            debug!("Terminating mpv process on cleanup");
            let _ = child.start_kill();
        }
        if self.socket_path.exists() {
            let _ = fs::remove_file(&self.socket_path);
        }
    }
}

/// Translates an unsolicited mpv message into an engine event.
fn engine_event(raw: &Value, loads_in_flight: usize) -> Option<EngineEvent> {
    match raw.get("event").and_then(Value::as_str)? {
        "property-change" if raw.get("id").and_then(Value::as_u64) == Some(OBS_PAUSED_FOR_CACHE) => {
            Some(EngineEvent::Buffering(
                raw.get("data").and_then(Value::as_bool).unwrap_or(false),
            ))
        }
        // errors during a load are reported by the load itself
        "end-file" if is_error_end(raw) && loads_in_flight == 0 => {
            Some(EngineEvent::Error(file_error(raw)))
        }
        _ => None,
    }
}

/// Waits for the reply to `request_id`, forgetting the request if none arrives.
async fn await_reply(
    pending: &PendingMap,
    request_id: u64,
    reply_rx: oneshot::Receiver<Result<Value>>,
    timeout: Duration,
) -> Result<Value> {
    match tokio::time::timeout(timeout, reply_rx).await {
        Ok(reply) => {
            reply.map_err(|_| anyhow::anyhow!("mpv reply dropped for request {}", request_id))?
        }
        Err(_) => {
            pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&request_id);
            anyhow::bail!("mpv IPC timeout for request {}", request_id)
        }
    }
}

fn fail_pending(pending: &PendingMap, reason: &str) {
    let mut map = pending.lock().unwrap_or_else(PoisonError::into_inner);
    for (_, reply) in map.drain() {
        let _ = reply.send(Err(anyhow::anyhow!("{}", reason)));
    }
}

async fn reader_task(
    mut reader: BufReader<OwnedReadHalf>,
    pending: PendingMap,
    raw_events: broadcast::Sender<Value>,
    events: broadcast::Sender<EngineEvent>,
    loads_in_flight: Arc<AtomicUsize>,
) {
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("mpv reader: connection closed");
                fail_pending(&pending, "mpv IPC connection closed");
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let value: Value = match serde_json::from_str(trimmed) {
                    Ok(value) => value,
                    Err(e) => {
                        debug!("mpv reader: invalid json '{}': {}", trimmed, e);
                        continue;
                    }
                };

                if let Some(request_id) = value.get("request_id").and_then(Value::as_u64) {
                    let reply = pending
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .remove(&request_id);
                    if let Some(reply) = reply {
                        let result = match value.get("error").and_then(Value::as_str) {
                            Some("success") => Ok(value),
                            other => Err(anyhow::anyhow!(
                                "mpv error: {}",
                                other.unwrap_or("unknown error")
                            )),
                        };
                        let _ = reply.send(result);
                    }
                } else {
                    if let Some(event) =
                        engine_event(&value, loads_in_flight.load(Ordering::SeqCst))
                    {
                        let _ = events.send(event);
                    }
                    let _ = raw_events.send(value);
                }
            }
            Err(e) => {
                warn!("mpv reader: read error: {}", e);
                fail_pending(&pending, "mpv IPC read error");
                break;
            }
        }
    }
}

async fn writer_task(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::Receiver<PendingRequest>,
    pending: PendingMap,
) {
    while let Some(request) = rx.recv().await {
        pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(request.request_id, request.reply);

        if let Err(e) = writer.write_all(request.payload.as_bytes()).await {
            warn!("mpv writer: write error: {}", e);
            fail_pending(&pending, "mpv IPC write error");
            break;
        }
    }
}
