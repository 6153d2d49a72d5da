use crate::peer::types::MediaStream;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const PACKET_LOG_INTERVAL: u64 = 500;

/// Consumer of the inbound media stream. It never owns the stream.
pub trait PlaybackSink: Send + Sync {
    fn attach(&self, stream: Weak<MediaStream>);
    fn detach(&self);
    fn has_source(&self) -> bool;
    fn is_paused(&self) -> bool;
    /// Starts playback of the attached stream; `false` if nothing could be played
    fn play(&self) -> bool;
}

#[derive(Debug, Default)]
pub struct PlaybackStats {
    packets: AtomicU64,
    bytes: AtomicU64,
}

impl PlaybackStats {
    pub fn packets(&self) -> u64 {
        self.packets.load(Ordering::Relaxed)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}

#[derive(Default)]
struct SinkInner {
    source: Option<Weak<MediaStream>>,
    source_id: Option<String>,
    playing: bool,
    readers: HashMap<String, JoinHandle<()>>,
}

impl SinkInner {
    fn stop_readers(&mut self) {
        for (_, handle) in self.readers.drain() {
            handle.abort();
        }
    }
}

/// Sink that drains RTP from every remote track while playing
#[derive(Default)]
pub struct RtpPlaybackSink {
    inner: Mutex<SinkInner>,
    stats: Arc<PlaybackStats>,
}

impl RtpPlaybackSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> Arc<PlaybackStats> {
        self.stats.clone()
    }

    // start readers for tracks that are not read yet
    fn spawn_readers(&self, inner: &mut SinkInner, stream: &MediaStream) -> bool {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("playback requested outside of a runtime");
            return false;
        };
        for track in stream.tracks() {
            let track_id = track.id();
            if inner.readers.contains_key(&track_id) {
                continue;
            }
            let stats = self.stats.clone();
            let label = track_id.clone();
            let kind = format!("{:?}", track.kind());
            let handle = runtime.spawn(async move {
                let mut packets: u64 = 0;
                loop {
                    match track.read_rtp().await {
                        Ok((packet, _)) => {
                            packets += 1;
                            stats.packets.fetch_add(1, Ordering::Relaxed);
                            stats
                                .bytes
                                .fetch_add(packet.payload.len() as u64, Ordering::Relaxed);
                            if packets % PACKET_LOG_INTERVAL == 0 {
                                debug!(track = %label, kind = %kind, packets, "receiving media");
                            }
                        }
                        Err(err) => {
                            debug!(track = %label, error = %err, "remote track ended");
                            break;
                        }
                    }
                }
            });
            inner.readers.insert(track_id, handle);
        }
        true
    }
}

impl PlaybackSink for RtpPlaybackSink {
    fn attach(&self, stream: Weak<MediaStream>) {
        let mut inner = self.inner.lock();
        let Some(live) = stream.upgrade() else {
            return;
        };
        if inner.source_id.as_deref() != Some(live.id()) {
            inner.stop_readers();
            inner.source_id = Some(live.id().to_string());
        }
        inner.source = Some(stream);
        if inner.playing {
            self.spawn_readers(&mut inner, &live);
        }
        debug!(stream = %live.id(), "stream attached to sink");
    }

    fn detach(&self) {
        let mut inner = self.inner.lock();
        inner.stop_readers();
        inner.source = None;
        inner.source_id = None;
        inner.playing = false;
    }

    fn has_source(&self) -> bool {
        self.inner
            .lock()
            .source
            .as_ref()
            .is_some_and(|source| source.strong_count() > 0)
    }

    fn is_paused(&self) -> bool {
        !self.inner.lock().playing
    }

    fn play(&self) -> bool {
        let mut inner = self.inner.lock();
        let Some(stream) = inner.source.as_ref().and_then(Weak::upgrade) else {
            return false;
        };
        if !self.spawn_readers(&mut inner, &stream) {
            return false;
        }
        inner.playing = true;
        info!(stream = %stream.id(), tracks = inner.readers.len(), "playback started");
        true
    }
}
