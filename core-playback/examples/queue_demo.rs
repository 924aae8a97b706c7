//! # Mixed Queue Walkthrough
//!
//! Drives a [`PlaybackCoordinator`] over a queue mixing local files and
//! streaming tracks, with simulated backends that finish each track after a
//! few time updates.
//!
//! Run with: `cargo run --example queue_demo --package core-playback`

use async_trait::async_trait;
use chrono::Utc;
use core_async::task::{spawn, JoinHandle};
use core_async::time::{sleep, Duration};
use core_library::{LocalResourceHandle, RemoteResourceId, ResourceHandle, Track, TrackSource};
use core_playback::{
    BackendEvent, DispatchContext, PlaybackBackend, PlaybackCoordinator, PlaybackPhase, Result,
};
use core_runtime::events::EventBus;
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use std::sync::{Arc, Mutex};

// ============================================================================
// Simulated backend
// ============================================================================

/// Plays every track for `ticks` time updates, then reports it finished.
struct SimulatedBackend {
    source: TrackSource,
    ticks: u32,
    feed: Mutex<Option<JoinHandle<()>>>,
}

impl SimulatedBackend {
    fn new(source: TrackSource, ticks: u32) -> Self {
        Self {
            source,
            ticks,
            feed: Mutex::new(None),
        }
    }

    fn replace_feed(&self, feed: Option<JoinHandle<()>>) {
        if let Ok(mut slot) = self.feed.lock() {
            if let Some(previous) = std::mem::replace(&mut *slot, feed) {
                previous.abort();
            }
        }
    }
}

#[async_trait]
impl PlaybackBackend for SimulatedBackend {
    fn source(&self) -> TrackSource {
        self.source
    }

    async fn start(&self, track: &Track, context: DispatchContext) -> Result<()> {
        println!("[{}] start {}", self.source, track.title);
        let ticks = self.ticks;
        let duration = track.duration_secs;
        let feed = spawn(async move {
            for tick in 1..=ticks {
                sleep(Duration::from_millis(100)).await;
                let position = duration * f64::from(tick) / f64::from(ticks + 1);
                if !context.emit(BackendEvent::TimeUpdate { position, duration }) {
                    return;
                }
            }
            context.emit(BackendEvent::Finished);
        });
        self.replace_feed(Some(feed));
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.replace_feed(None);
        Ok(())
    }

    async fn seek(&self, _position_secs: f64) -> Result<()> {
        Ok(())
    }
}

fn track(title: &str, resource: ResourceHandle) -> Track {
    Track::new(Some(title.to_string()), None, 30.0, resource, Utc::now())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default().with_format(LogFormat::Compact))?;

    let coordinator = PlaybackCoordinator::new(
        Arc::new(SimulatedBackend::new(TrackSource::Local, 3)),
        Arc::new(SimulatedBackend::new(TrackSource::Remote, 3)),
        EventBus::new(64),
    );

    let queue = vec![
        track(
            "Intro",
            ResourceHandle::Local(LocalResourceHandle::new("Albums/Blue/01 Intro.flac")),
        ),
        track(
            "Single",
            ResourceHandle::Remote(RemoteResourceId::new("svc:track:single")),
        ),
        track(
            "Outro",
            ResourceHandle::Local(LocalResourceHandle::new("Albums/Blue/09 Outro.flac")),
        ),
    ];

    let mut snapshots = coordinator.subscribe();
    coordinator.play_tracks(queue, 0).await;

    loop {
        snapshots.changed().await?;
        let snapshot = snapshots.borrow_and_update().clone();
        if let Some(current) = &snapshot.current_track {
            println!(
                "{:?} {} {:.1}/{:.1}s",
                snapshot.phase, current.title, snapshot.current_time, snapshot.duration
            );
        }
        if snapshot.phase == PlaybackPhase::StoppedAtEnd {
            break;
        }
    }

    println!("Queue finished");
    Ok(())
}
