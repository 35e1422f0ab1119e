//! Frame grabber: background acquisition with latest-wins handoff
//!
//! # Worker state machine
//!
//! ```text
//!              open() fails: sleep backoff
//!             ┌──────────────┐
//!             ▼              │
//!      ┌──────────────┐──────┘   open() ok    ┌───────────┐
//!      │ Disconnected │ ─────────────────────▶ │ Connected │ ◀─┐ frame ok: publish
//!      └──────────────┘                        └───────────┘ ──┘ error, link up: retry
//!             ▲                                      │
//!             └──────────────────────────────────────┘
//!                    error and link lost: close()
//! ```
//!
//! Connection failures are logged and retried forever. Consumers never see
//! an error, only an absence of new frames.
//!
//! # Handoff
//!
//! A capacity-1 channel holds the newest published frame. Before publishing,
//! the worker evicts any frame still sitting there (latest wins, not every
//! frame is delivered). Consumers swap their own holder for the published
//! one; the displaced holder goes back to the worker over a recycle channel
//! and becomes the memory the next frame is read into. Frames are never
//! copied and a consumer never sees a partially filled frame.

use super::stream::{Frame, FrameStream};
use crate::config::AcquisitionConfig;
use crate::error::{Error, Result};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Granularity at which the backoff sleep checks the stop flag
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Link state of the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connected,
}

/// Counters maintained by the worker thread
#[derive(Debug, Default)]
struct Counters {
    frames_published: AtomicU64,
    frames_overwritten: AtomicU64,
    connects: AtomicU64,
    connect_failures: AtomicU64,
    link_losses: AtomicU64,
}

/// Point-in-time copy of the grabber counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GrabberStats {
    pub frames_published: u64,
    /// Published frames evicted before any consumer took them
    pub frames_overwritten: u64,
    pub connects: u64,
    pub connect_failures: u64,
    pub link_losses: u64,
}

impl Counters {
    fn snapshot(&self) -> GrabberStats {
        GrabberStats {
            frames_published: self.frames_published.load(Ordering::Relaxed),
            frames_overwritten: self.frames_overwritten.load(Ordering::Relaxed),
            connects: self.connects.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            link_losses: self.link_losses.load(Ordering::Relaxed),
        }
    }
}

/// Producer half of the handoff (owned by the worker)
struct Publisher {
    ready_tx: Sender<Frame>,
    /// Used only to evict an unread frame
    ready_rx: Receiver<Frame>,
    recycle_rx: Receiver<Frame>,
    counters: Arc<Counters>,
}

impl Publisher {
    /// Publish `frame`, returning a holder for the next one
    fn publish(&self, mut frame: Frame) -> Frame {
        let mut spare = None;
        loop {
            match self.ready_tx.try_send(frame) {
                Ok(()) => break,
                Err(TrySendError::Full(rejected)) => {
                    frame = rejected;
                    // A consumer may have taken it in the meantime; then the
                    // retry simply succeeds.
                    if let Ok(stale) = self.ready_rx.try_recv() {
                        self.counters
                            .frames_overwritten
                            .fetch_add(1, Ordering::Relaxed);
                        log::trace!("Frame {} overwritten before pickup", stale.sequence);
                        spare = Some(stale);
                    }
                }
                Err(TrySendError::Disconnected(rejected)) => {
                    spare = Some(rejected);
                    break;
                }
            }
        }
        self.counters
            .frames_published
            .fetch_add(1, Ordering::Relaxed);

        spare
            .or_else(|| self.recycle_rx.try_recv().ok())
            .unwrap_or_default()
    }
}

/// Consumer half of the handoff
struct FrameSlot {
    ready_rx: Receiver<Frame>,
    recycle_tx: Sender<Frame>,
}

impl FrameSlot {
    fn take_into(&self, holder: &mut Frame, fresh: Frame) {
        let displaced = std::mem::replace(holder, fresh);
        // Worker gone: nobody needs the memory back
        let _ = self.recycle_tx.send(displaced);
    }

    fn wait(&self, holder: &mut Frame, timeout: Duration) -> bool {
        match self.ready_rx.recv_timeout(timeout) {
            Ok(fresh) => {
                self.take_into(holder, fresh);
                true
            }
            Err(_) => false,
        }
    }

    fn poll(&self, holder: &mut Frame) -> bool {
        match self.ready_rx.try_recv() {
            Ok(fresh) => {
                self.take_into(holder, fresh);
                true
            }
            Err(_) => false,
        }
    }
}

fn handoff(counters: Arc<Counters>) -> (Publisher, FrameSlot) {
    let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
    let (recycle_tx, recycle_rx) = crossbeam_channel::unbounded();
    (
        Publisher {
            ready_tx,
            ready_rx: ready_rx.clone(),
            recycle_rx,
            counters,
        },
        FrameSlot {
            ready_rx,
            recycle_tx,
        },
    )
}

/// Background frame acquisition over a [`FrameStream`]
///
/// Consumer methods take `&self`, so one grabber can be shared between
/// threads behind an `Arc`.
pub struct FrameGrabber {
    shutdown: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    slot: FrameSlot,
    counters: Arc<Counters>,
}

impl FrameGrabber {
    /// Spawn the worker thread and start pulling frames from `stream`
    pub fn start<S: FrameStream>(stream: S, config: &AcquisitionConfig) -> Result<Self> {
        let counters = Arc::new(Counters::default());
        let (publisher, slot) = handoff(Arc::clone(&counters));
        let shutdown = Arc::new(AtomicBool::new(false));
        let backoff = config.reconnect_backoff();

        let worker_shutdown = Arc::clone(&shutdown);
        let worker = thread::Builder::new()
            .name("frame-grabber".to_string())
            .spawn(move || {
                Self::worker_loop(stream, publisher, worker_shutdown, backoff);
            })
            .map_err(|e| Error::Other(format!("Failed to spawn grabber thread: {}", e)))?;

        log::info!("Frame grabber started (reconnect backoff {:?})", backoff);
        Ok(Self {
            shutdown,
            worker: Some(worker),
            slot,
            counters,
        })
    }

    fn worker_loop<S: FrameStream>(
        mut stream: S,
        publisher: Publisher,
        shutdown: Arc<AtomicBool>,
        backoff: Duration,
    ) {
        let counters = Arc::clone(&publisher.counters);
        let mut state = if stream.is_connected() {
            LinkState::Connected
        } else {
            LinkState::Disconnected
        };
        let mut active = Frame::default();

        while !shutdown.load(Ordering::Relaxed) {
            match state {
                LinkState::Disconnected => match stream.open() {
                    Ok(()) => {
                        counters.connects.fetch_add(1, Ordering::Relaxed);
                        log::info!("Frame stream connected");
                        state = LinkState::Connected;
                    }
                    Err(e) => {
                        counters.connect_failures.fetch_add(1, Ordering::Relaxed);
                        log::error!("Failed to connect: {}", e);
                        sleep_unless_stopped(&shutdown, backoff);
                    }
                },
                LinkState::Connected => match stream.next_frame(&mut active) {
                    Ok(()) => {
                        let filled = std::mem::take(&mut active);
                        active = publisher.publish(filled);
                    }
                    Err(e) if stream.is_connected() => {
                        log::debug!("Frame skipped: {}", e);
                    }
                    Err(e) => {
                        counters.link_losses.fetch_add(1, Ordering::Relaxed);
                        log::warn!("Connection lost ({}), reconnecting", e);
                        stream.close();
                        state = LinkState::Disconnected;
                    }
                },
            }
        }

        stream.close();
        log::info!("Frame grabber thread exiting");
    }

    /// Wait up to `timeout` for a frame and swap it into `frame`
    ///
    /// A frame published before the call and not yet taken is returned
    /// immediately rather than discarded: callers never wait for a newer
    /// frame while an unread one exists. Only when nothing is pending does
    /// the call block. On timeout `frame` is left untouched.
    pub fn get_next_frame(&self, frame: &mut Frame, timeout: Duration) -> bool {
        self.slot.wait(frame, timeout)
    }

    /// Swap in the pending frame if there is one, without blocking
    pub fn get_current_frame(&self, frame: &mut Frame) -> bool {
        self.slot.poll(frame)
    }

    pub fn stats(&self) -> GrabberStats {
        self.counters.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Stop the worker and wait for it to exit
    ///
    /// Returns once any in-progress connect or read has finished; those are
    /// bounded by the transport timeouts.
    pub fn stop(&mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.worker.take() {
            handle.join().map_err(|_| Error::ThreadPanic)?;
            log::info!("Frame grabber stopped");
        }
        Ok(())
    }
}

impl Drop for FrameGrabber {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::error!("Frame grabber shutdown failed: {}", e);
        }
    }
}

fn sleep_unless_stopped(shutdown: &AtomicBool, duration: Duration) {
    let deadline = Instant::now() + duration;
    while !shutdown.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep((deadline - now).min(STOP_POLL_INTERVAL));
    }
}
