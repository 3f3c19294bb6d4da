//! Background polling of the track source.
//!
//! The poller runs as its own task. Its cadence follows the last snapshot
//! (fast while something is playing, slow otherwise) and it stops entirely
//! while the screen is hidden: the visibility channel flipping to `false`
//! drops any request in flight, and flipping back to `true` forces an
//! immediate refresh.

use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use crate::track::TrackSnapshot;

pub const PLAYING_INTERVAL: Duration = Duration::from_secs(5);
pub const IDLE_INTERVAL: Duration = Duration::from_secs(30);

/// Anything that can answer "what is this user playing".
pub trait TrackSource: Send + Sync + 'static {
    fn current_track(
        &self,
        username: &str,
    ) -> impl Future<Output = Option<TrackSnapshot>> + Send;
}

pub fn poll_interval(last: Option<&TrackSnapshot>) -> Duration {
    match last {
        Some(snap) if snap.is_playing => PLAYING_INTERVAL,
        _ => IDLE_INTERVAL,
    }
}

/// Poll `source` until the receiver or the visibility sender goes away.
///
/// `initial` is the value fetched before the screen came up; the first poll
/// happens one interval after it. Every poll result is forwarded, including
/// repeats, so the display can retry a target it had to drop.
pub async fn run<S: TrackSource>(
    source: S,
    username: String,
    initial: Option<TrackSnapshot>,
    tx: mpsc::Sender<Option<TrackSnapshot>>,
    mut visible: watch::Receiver<bool>,
) {
    let mut last = initial;
    let mut refresh_now = false;

    loop {
        if !*visible.borrow_and_update() {
            tracing::debug!(user = %username, "Screen hidden, polling suspended");
            if visible.wait_for(|v| *v).await.is_err() {
                return;
            }
            tracing::debug!(user = %username, "Screen visible again, refreshing");
            refresh_now = true;
        }

        if !refresh_now {
            let delay = poll_interval(last.as_ref());
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                hidden = visible.wait_for(|v| !*v) => {
                    if hidden.is_err() {
                        return;
                    }
                    continue;
                }
            }
        }
        refresh_now = false;

        let snapshot = tokio::select! {
            snapshot = source.current_track(&username) => snapshot,
            hidden = visible.wait_for(|v| !*v) => {
                if hidden.is_err() {
                    return;
                }
                tracing::debug!(user = %username, "Poll cancelled while hidden");
                continue;
            }
        };

        last = snapshot.clone();
        if tx.send(snapshot).await.is_err() {
            return;
        }
    }
}
