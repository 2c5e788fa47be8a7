use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dealer_core::config::Bounds;
use dealer_core::store::Snapshot;
use dealer_core::types::VehicleRecord;

use crate::error::DecisionError;

// ─── DecisionRequest ──────────────────────────────────────────────────────

/// Everything a source may use to answer one cycle.
///
/// Network sources only read `prompt`; offline sources work from the
/// structured `snapshot` instead.
#[derive(Debug, Clone)]
pub struct DecisionRequest {
    pub prompt: String,
    pub snapshot: Snapshot,
    pub bounds: Bounds,
    pub dealer_name: String,
    pub aged_days: u32,
}

/// Listing copy for one vehicle.
#[derive(Debug, Clone)]
pub struct DescriptionRequest {
    pub prompt: String,
    pub vehicle: VehicleRecord,
    pub dealer_name: String,
}

// ─── DecisionSource ───────────────────────────────────────────────────────

/// The reasoning service. Returns the raw answer text; decoding happens in
/// the engine.
#[async_trait]
pub trait DecisionSource: Send + Sync {
    fn name(&self) -> &str;

    async fn decide(&self, request: &DecisionRequest) -> Result<String, DecisionError>;

    /// Free-text marketing description; returned as written.
    async fn describe(&self, request: &DescriptionRequest) -> Result<String, DecisionError>;
}

#[async_trait]
impl DecisionSource for Arc<dyn DecisionSource> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn decide(&self, request: &DecisionRequest) -> Result<String, DecisionError> {
        (**self).decide(request).await
    }

    async fn describe(&self, request: &DescriptionRequest) -> Result<String, DecisionError> {
        (**self).describe(request).await
    }
}

// ─── ScriptedSource ───────────────────────────────────────────────────────

/// Replays canned answers in order. Once the script runs out the last answer
/// repeats. Optionally sleeps per call and records concurrency, which the
/// scheduler tests rely on.
#[derive(Debug)]
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<String, DecisionError>>>,
    last: Mutex<Option<Result<String, DecisionError>>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(script: impl IntoIterator<Item = Result<String, DecisionError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            last: Mutex::new(None),
            delay: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Always answer with `text`.
    pub fn always(text: impl Into<String>) -> Self {
        Self::new([Ok(text.into())])
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of overlapping calls observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_answer(&self) -> Result<String, DecisionError> {
        let mut script = self.script.lock().unwrap_or_else(|p| p.into_inner());
        let mut last = self.last.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(next) = script.pop_front() {
            *last = Some(next.clone());
            return next;
        }
        last.clone().unwrap_or_else(|| {
            Err(DecisionError::UpstreamUnavailable(
                "scripted source has no answers".into(),
            ))
        })
    }

    async fn answer(&self) -> Result<String, DecisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let answer = self.next_answer();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        answer
    }
}

#[async_trait]
impl DecisionSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn decide(&self, _request: &DecisionRequest) -> Result<String, DecisionError> {
        self.answer().await
    }

    async fn describe(&self, _request: &DescriptionRequest) -> Result<String, DecisionError> {
        self.answer().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> DecisionRequest {
        DecisionRequest {
            prompt: "p".into(),
            snapshot: Snapshot::default(),
            bounds: Bounds::default(),
            dealer_name: "d".into(),
            aged_days: 60,
        }
    }

    #[tokio::test]
    async fn scripted_source_replays_then_repeats_last() {
        let source = ScriptedSource::new([
            Ok("first".to_string()),
            Err(DecisionError::UpstreamUnavailable("down".into())),
        ]);
        let req = request();
        assert_eq!(source.decide(&req).await.unwrap(), "first");
        assert!(source.decide(&req).await.is_err());
        assert!(source.decide(&req).await.is_err());
        assert_eq!(source.calls(), 3);
        assert_eq!(source.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn arc_dyn_source_delegates() {
        let source: Arc<dyn DecisionSource> = Arc::new(ScriptedSource::always("{}"));
        assert_eq!(source.name(), "scripted");
        assert_eq!(source.decide(&request()).await.unwrap(), "{}");
    }
}
