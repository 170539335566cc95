//! Producer/consumer pipeline that plays a chunked audio stream as it
//! arrives.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bon::Builder;
use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::{watch, Notify};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use super::sink::{AudioTap, PlaybackSink, SinkError};
use super::status::StreamingStatus;
use crate::error::VoiceError;

/// Stream of encoded audio chunks.
pub type ChunkStream = BoxStream<'static, Result<Bytes, VoiceError>>;

/// Buffering limits and polling cadence.
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct PlaybackConfig {
    /// Most audio allowed to sit buffered ahead of the play position.
    #[builder(default = Duration::from_secs(90))]
    pub max_buffer_ahead: Duration,
    /// Audio kept behind the play position before eviction.
    #[builder(default = Duration::from_secs(10))]
    pub cleanup_margin: Duration,
    #[builder(default = Duration::from_millis(100))]
    pub poll_interval: Duration,
    /// Wait before retrying an append rejected with quota exceeded.
    #[builder(default = Duration::from_millis(500))]
    pub quota_retry_delay: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Where the audio goes.
#[derive(Clone)]
pub struct PlaybackTarget {
    pub sink: Arc<dyn PlaybackSink>,
    pub tap: Option<Arc<dyn AudioTap>>,
}

impl PlaybackTarget {
    pub fn new(sink: Arc<dyn PlaybackSink>) -> Self {
        Self { sink, tap: None }
    }

    pub fn with_tap(mut self, tap: Arc<dyn AudioTap>) -> Self {
        self.tap = Some(tap);
        self
    }
}

/// Reference points for the latency metrics.
#[derive(Debug, Clone, Copy)]
pub struct RequestTiming {
    pub started_at: Instant,
    pub request_sent: Option<Duration>,
}

impl RequestTiming {
    pub fn now() -> Self {
        Self {
            started_at: Instant::now(),
            request_sent: None,
        }
    }
}

#[derive(Default)]
struct Queues {
    pending: VecDeque<Bytes>,
    received: Vec<Bytes>,
}

/// State shared by the producer, the consumer, and the session handle.
struct Pipeline {
    target: PlaybackTarget,
    config: PlaybackConfig,
    started_at: Instant,
    queues: Mutex<Queues>,
    chunk_arrived: Notify,
    reader_done: AtomicBool,
    cancel: CancellationToken,
    status: watch::Sender<StreamingStatus>,
}

impl Pipeline {
    fn queues(&self) -> MutexGuard<'_, Queues> {
        self.queues.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Apply a status change unless the session has been stopped.
    fn update(&self, change: impl FnOnce(&mut StreamingStatus)) {
        self.status.send_if_modified(|status| {
            if self.cancel.is_cancelled() {
                return false;
            }
            change(status);
            true
        });
    }

    fn fail(&self, context: &str, error: &VoiceError) {
        tracing::error!(%error, "{context}");
        let message = format!("{context}: {error}");
        self.update(|status| {
            status.error = Some(message);
            status.is_streaming = false;
        });
        self.cancel.cancel();
    }
}

/// One synthesized utterance being played.
pub struct PlaybackSession {
    pipeline: Option<Arc<Pipeline>>,
    status: watch::Receiver<StreamingStatus>,
    // Keeps the channel alive for sessions without a pipeline.
    _status_tx: Option<watch::Sender<StreamingStatus>>,
}

impl PlaybackSession {
    /// Start playing `stream` into `target`. Must be called inside a tokio
    /// runtime.
    pub fn start(
        stream: ChunkStream,
        target: PlaybackTarget,
        config: PlaybackConfig,
        timing: RequestTiming,
    ) -> Self {
        let (status_tx, status_rx) = watch::channel(StreamingStatus::started(timing.request_sent));
        if let Some(tap) = &target.tap {
            tap.connect();
        }
        let pipeline = Arc::new(Pipeline {
            target,
            config,
            started_at: timing.started_at,
            queues: Mutex::new(Queues::default()),
            chunk_arrived: Notify::new(),
            reader_done: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            status: status_tx,
        });

        let producer = Arc::clone(&pipeline);
        tokio::spawn(async move {
            tokio::select! {
                _ = producer.cancel.cancelled() => {}
                result = read_loop(&producer, stream) => {
                    if let Err(error) = result {
                        producer.fail("Streaming read error", &error);
                    }
                }
            }
        });

        let consumer = Arc::clone(&pipeline);
        tokio::spawn(async move {
            tokio::select! {
                _ = consumer.cancel.cancelled() => {}
                result = append_loop(&consumer) => {
                    if let Err(error) = result {
                        consumer.fail("Buffer append error", &error);
                    }
                }
            }
        });

        Self {
            pipeline: Some(pipeline),
            status: status_rx,
            _status_tx: None,
        }
    }

    /// A session that never started because the request failed.
    pub fn failed(error: &VoiceError, timing: RequestTiming) -> Self {
        let status = StreamingStatus {
            is_streaming: false,
            error: Some(format!("Streaming error: {error}")),
            ..StreamingStatus::started(timing.request_sent)
        };
        let (status_tx, status_rx) = watch::channel(status);
        Self {
            pipeline: None,
            status: status_rx,
            _status_tx: Some(status_tx),
        }
    }

    /// Current status snapshot.
    pub fn status(&self) -> StreamingStatus {
        self.status.borrow().clone()
    }

    /// Receiver notified on every status change.
    pub fn subscribe(&self) -> watch::Receiver<StreamingStatus> {
        self.status.clone()
    }

    /// Wait until streaming has finished, failed, or been stopped.
    pub async fn wait(&self) -> StreamingStatus {
        let mut status = self.status.clone();
        let finished = match status.wait_for(StreamingStatus::is_finished).await {
            Ok(finished) => finished.clone(),
            Err(_) => self.status(),
        };
        finished
    }

    /// Stop playback and tear down both loops. Safe to call at any point.
    pub fn stop(&self) {
        let Some(pipeline) = &self.pipeline else {
            return;
        };
        if let Some(tap) = &pipeline.target.tap {
            tap.disconnect();
        }
        pipeline.target.sink.stop();
        pipeline.cancel.cancel();
        pipeline.chunk_arrived.notify_one();
        {
            let mut queues = pipeline.queues();
            queues.pending.clear();
            queues.received.clear();
        }
        pipeline.status.send_replace(StreamingStatus::default());
        tracing::debug!("Streaming playback stopped");
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        if let Some(pipeline) = &self.pipeline {
            pipeline.cancel.cancel();
        }
    }
}

async fn read_loop(pipeline: &Pipeline, mut stream: ChunkStream) -> Result<(), VoiceError> {
    let sink = &pipeline.target.sink;
    let mut first_chunk = true;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if chunk.is_empty() {
            continue;
        }
        pipeline.queues().received.push(chunk.clone());

        if first_chunk {
            first_chunk = false;
            let arrived = pipeline.elapsed();
            tracing::debug!(bytes = chunk.len(), elapsed_ms = arrived.as_millis() as u64, "First audio chunk");
            pipeline.update(|status| status.progress.time_to_first_chunk_arrived = Some(arrived));

            match start_playback(sink.as_ref(), &chunk).await {
                Ok(()) => {
                    let playing = pipeline.elapsed();
                    pipeline.update(|status| status.progress.time_to_first_playback = Some(playing));
                }
                Err(error) => tracing::warn!(%error, "Error appending first chunk"),
            }
            pipeline.chunk_arrived.notify_one();
            continue;
        }

        pipeline.queues().pending.push_back(chunk);
        pipeline.chunk_arrived.notify_one();
    }

    let last = pipeline.elapsed();
    let blob = {
        let queues = pipeline.queues();
        let mut blob = BytesMut::with_capacity(queues.received.iter().map(Bytes::len).sum());
        for chunk in &queues.received {
            blob.extend_from_slice(chunk);
        }
        blob.freeze()
    };
    tracing::debug!(bytes = blob.len(), elapsed_ms = last.as_millis() as u64, "Audio stream complete");
    pipeline.update(|status| {
        status.progress.time_to_last_chunk_arrived = Some(last);
        status.audio_blob = Some(blob);
    });

    pipeline.reader_done.store(true, Ordering::Release);
    pipeline.chunk_arrived.notify_one();
    Ok(())
}

async fn start_playback(sink: &dyn PlaybackSink, chunk: &[u8]) -> Result<(), SinkError> {
    sink.append(chunk).await?;
    sink.play().await
}

async fn append_loop(pipeline: &Pipeline) -> Result<(), VoiceError> {
    let sink = pipeline.target.sink.as_ref();
    let config = &pipeline.config;
    let max_ahead = config.max_buffer_ahead.as_secs_f64();
    let margin = config.cleanup_margin.as_secs_f64();

    loop {
        // Read the flag before the queue: a chunk pushed before the flag was
        // set is then guaranteed to be visible.
        let reader_done = pipeline.reader_done.load(Ordering::Acquire);
        let next = pipeline.queues().pending.pop_front();

        let Some(chunk) = next else {
            if reader_done {
                return finish(pipeline).await;
            }
            tokio::select! {
                _ = pipeline.chunk_arrived.notified() => {}
                _ = time::sleep(config.poll_interval) => {}
            }
            continue;
        };

        if let Some(mut buffered_end) = sink.buffered_end() {
            while buffered_end - sink.current_time() > max_ahead {
                time::sleep(config.poll_interval).await;
                buffered_end = sink.buffered_end().unwrap_or_default();
            }

            let removal_end = sink.current_time() - margin;
            if removal_end > 0.0 {
                if let Err(error) = sink.remove(0.0, removal_end).await {
                    tracing::warn!(%error, "Error removing played audio");
                }
            }
        }

        match sink.append(&chunk).await {
            Ok(()) => {}
            Err(SinkError::QuotaExceeded) => {
                tracing::warn!(bytes = chunk.len(), "Playback buffer full, retrying chunk");
                time::sleep(config.quota_retry_delay).await;
                pipeline.queues().pending.push_front(chunk);
            }
            Err(error) => return Err(error.into()),
        }
    }
}

async fn finish(pipeline: &Pipeline) -> Result<(), VoiceError> {
    let sink = pipeline.target.sink.as_ref();
    sink.end_of_stream().await?;
    let duration = sink.duration();
    tracing::debug!(?duration, "Streaming playback finished");
    pipeline.update(|status| {
        status.progress.total_audio_duration = duration;
        status.is_streaming = false;
    });
    Ok(())
}
