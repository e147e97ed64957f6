//! On-demand insight text and podcast scripts for the open document.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use insightlens_gateway::InsightSource;
use insightlens_shared::{GenerationToken, Insight, PodcastScript};
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

/// Observable state of the insight panel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsightState {
    pub insight: Option<Insight>,
    pub podcast: Option<PodcastScript>,
    /// Whether either request is still in flight.
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Insight,
    Podcast,
}

/// Generation and in-flight flag for one kind of request.
///
/// `busy` is only written while the state channel is locked.
#[derive(Debug, Default)]
struct Lane {
    latest: AtomicU64,
    busy: AtomicBool,
}

/// Fetches insight material and publishes it while it is still relevant.
///
/// Insight and podcast requests are tracked separately: a new podcast
/// request never discards an insight still in flight, and vice versa.
pub struct InsightPanel {
    source: Arc<dyn InsightSource>,
    insight: Lane,
    podcast: Lane,
    state: watch::Sender<InsightState>,
}

impl InsightPanel {
    pub fn new(source: Arc<dyn InsightSource>) -> Self {
        let (state, _) = watch::channel(InsightState::default());
        Self {
            source,
            insight: Lane::default(),
            podcast: Lane::default(),
            state,
        }
    }

    /// Fetch the insight for the most recent selection.
    ///
    /// Returns `true` when the result was published.
    #[instrument(skip_all)]
    pub async fn request_insight(&self) -> bool {
        let token = self.begin(Kind::Insight);
        match self.source.fetch_insight().await {
            Ok(insight) => self.commit(Kind::Insight, token, |state| {
                state.insight = Some(insight);
            }),
            Err(e) => {
                warn!(error = %e, "insight request failed");
                let message = e.user_message();
                self.commit(Kind::Insight, token, |state| {
                    state.error = Some(message);
                })
            }
        }
    }

    /// Fetch the podcast script for the most recent selection.
    #[instrument(skip_all)]
    pub async fn request_podcast(&self) -> bool {
        let token = self.begin(Kind::Podcast);
        match self.source.fetch_podcast().await {
            Ok(script) => {
                debug!(turns = script.turns().len(), "podcast script received");
                self.commit(Kind::Podcast, token, |state| {
                    state.podcast = Some(script);
                })
            }
            Err(e) => {
                warn!(error = %e, "podcast request failed");
                let message = e.user_message();
                self.commit(Kind::Podcast, token, |state| {
                    state.error = Some(message);
                })
            }
        }
    }

    /// Clear the panel and ignore any request still in flight.
    pub fn reset(&self) {
        self.state.send_modify(|state| {
            for lane in [&self.insight, &self.podcast] {
                lane.latest.fetch_add(1, Ordering::SeqCst);
                lane.busy.store(false, Ordering::SeqCst);
            }
            *state = InsightState::default();
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<InsightState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> InsightState {
        self.state.borrow().clone()
    }

    fn lane(&self, kind: Kind) -> &Lane {
        match kind {
            Kind::Insight => &self.insight,
            Kind::Podcast => &self.podcast,
        }
    }

    fn begin(&self, kind: Kind) -> GenerationToken {
        let token = GenerationToken(self.lane(kind).latest.fetch_add(1, Ordering::SeqCst) + 1);
        self.apply(kind, token, true, |state| state.error = None);
        token
    }

    /// Publish a finished request's result if it is still the latest of its kind.
    fn commit(
        &self,
        kind: Kind,
        token: GenerationToken,
        update: impl FnOnce(&mut InsightState),
    ) -> bool {
        self.apply(kind, token, false, update)
    }

    fn apply(
        &self,
        kind: Kind,
        token: GenerationToken,
        busy: bool,
        update: impl FnOnce(&mut InsightState),
    ) -> bool {
        self.state.send_if_modified(|state| {
            let lane = self.lane(kind);
            if lane.latest.load(Ordering::SeqCst) != token.0 {
                debug!(%token, ?kind, "discarding stale insight response");
                return false;
            }
            lane.busy.store(busy, Ordering::SeqCst);
            update(state);
            state.loading =
                self.insight.busy.load(Ordering::SeqCst) || self.podcast.busy.load(Ordering::SeqCst);
            true
        })
    }
}

impl std::fmt::Debug for InsightPanel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InsightPanel")
            .field("state", &*self.state.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use insightlens_shared::{InsightError, Result};
    use std::time::Duration;

    struct SlowSource {
        insight_delay: Duration,
        podcast_delay: Duration,
        fail: bool,
    }

    #[async_trait]
    impl InsightSource for SlowSource {
        async fn fetch_insight(&self) -> Result<Insight> {
            tokio::time::sleep(self.insight_delay).await;
            if self.fail {
                return Err(InsightError::Http {
                    status: 400,
                    detail: Some("No recent selection found.".into()),
                });
            }
            Ok(Insight {
                text: "Both papers rely on attention.".into(),
            })
        }

        async fn fetch_podcast(&self) -> Result<PodcastScript> {
            tokio::time::sleep(self.podcast_delay).await;
            Ok(PodcastScript {
                text: "Alex: Welcome.\nBen: Thanks for having me.".into(),
            })
        }
    }

    fn panel(delay_ms: u64, fail: bool) -> Arc<InsightPanel> {
        Arc::new(InsightPanel::new(Arc::new(SlowSource {
            insight_delay: Duration::from_millis(delay_ms),
            podcast_delay: Duration::from_millis(delay_ms),
            fail,
        })))
    }

    #[tokio::test(start_paused = true)]
    async fn insight_is_published() {
        let panel = panel(10, false);
        assert!(panel.request_insight().await);

        let state = panel.snapshot();
        assert_eq!(state.insight.unwrap().text, "Both papers rely on attention.");
        assert!(!state.loading);
        assert!(state.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn podcast_is_published() {
        let panel = panel(10, false);
        assert!(panel.request_podcast().await);
        assert_eq!(panel.snapshot().podcast.unwrap().turns().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn backend_detail_becomes_the_error() {
        let panel = panel(10, true);
        assert!(panel.request_insight().await);

        let state = panel.snapshot();
        assert_eq!(state.error.as_deref(), Some("No recent selection found."));
        assert!(state.insight.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn reset_discards_in_flight_response() {
        let panel = panel(500, false);
        let request = {
            let panel = panel.clone();
            tokio::spawn(async move { panel.request_insight().await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(panel.snapshot().loading);
        panel.reset();

        assert!(!request.await.unwrap());
        assert_eq!(panel.snapshot(), InsightState::default());
    }

    #[tokio::test(start_paused = true)]
    async fn insight_and_podcast_in_flight_together() {
        let panel = Arc::new(InsightPanel::new(Arc::new(SlowSource {
            insight_delay: Duration::from_millis(500),
            podcast_delay: Duration::from_millis(800),
            fail: false,
        })));

        let insight = {
            let panel = panel.clone();
            tokio::spawn(async move { panel.request_insight().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let podcast = {
            let panel = panel.clone();
            tokio::spawn(async move { panel.request_podcast().await })
        };

        assert!(insight.await.unwrap());
        let midway = panel.snapshot();
        assert!(midway.insight.is_some());
        assert!(midway.loading, "podcast is still in flight");

        assert!(podcast.await.unwrap());
        let done = panel.snapshot();
        assert_eq!(done.insight.unwrap().text, "Both papers rely on attention.");
        assert_eq!(done.podcast.unwrap().turns().len(), 2);
        assert!(!done.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_insight_keeps_only_the_latest() {
        let panel = panel(100, false);
        let first = {
            let panel = panel.clone();
            tokio::spawn(async move { panel.request_insight().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(panel.request_insight().await);
        assert!(!first.await.unwrap());
        assert!(!panel.snapshot().loading);
    }
}
