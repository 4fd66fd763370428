//! One scan attempt at a time: capture or upload, decode off the async
//! threads, normalize, then assess.
//!
//! State machine:
//!
//! ```text
//! Idle -> Capturing -> Decoding -> (not found) -> Capturing
//!                               -> (found) -> Normalizing -> Assessing -> Complete
//! any active state -> Cancelled | Failed(kind)
//! ```
use crate::config::{ConfigError, ScannerConfig};
use crate::models::DecodedPayload;
use crate::normalize::{NormalizedTarget, normalize};
use crate::risk::{RiskAssessor, RiskVerdict};
use crate::scan::error::ScanError;
use crate::scan::source::{CaptureGuard, FrameSource, decode_static};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

pub enum ScanSource {
    Camera(Box<dyn FrameSource>),
    /// Encoded image bytes (PNG, JPEG, ...)
    Upload(Vec<u8>),
}

impl std::fmt::Debug for ScanSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanSource::Camera(_) => f.write_str("Camera"),
            ScanSource::Upload(bytes) => write!(f, "Upload({} bytes)", bytes.len()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "kind", rename_all = "snake_case")]
pub enum ScanState {
    #[default]
    Idle,
    Capturing,
    Decoding,
    Normalizing,
    Assessing,
    Complete,
    Cancelled,
    /// Carries the error classification
    Failed(String),
}

impl ScanState {
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ScanState::Capturing
                | ScanState::Decoding
                | ScanState::Normalizing
                | ScanState::Assessing
        )
    }
}

/// The single terminal success value of a scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanOutcome {
    pub payload: DecodedPayload,
    pub target: NormalizedTarget,
    pub verdict: RiskVerdict,
}

#[derive(Debug, Default)]
struct Inner {
    state: ScanState,
    cancel: Option<CancellationToken>,
}

pub struct ScanOrchestrator {
    assessor: RiskAssessor,
    poll_interval: Duration,
    max_attempts: Option<u32>,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<ScanState>,
}

impl std::fmt::Debug for ScanOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanOrchestrator")
            .field("assessor", &self.assessor)
            .field("poll_interval", &self.poll_interval)
            .field("max_attempts", &self.max_attempts)
            .field("state", &self.state())
            .finish()
    }
}

impl Default for ScanOrchestrator {
    fn default() -> Self {
        Self::new(RiskAssessor::default())
    }
}

impl ScanOrchestrator {
    pub fn new(assessor: RiskAssessor) -> Self {
        let (state_tx, _) = watch::channel(ScanState::Idle);
        Self {
            assessor,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_attempts: None,
            inner: Mutex::new(Inner::default()),
            state_tx,
        }
    }

    pub fn from_config(config: &ScannerConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.build_assessor()?)
            .with_poll_interval(config.poll_interval())
            .with_max_attempts(config.max_attempts))
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Bound the number of decoded camera frames; `None` is unbounded
    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts.filter(|&n| n > 0);
        self
    }

    pub fn assessor(&self) -> &RiskAssessor {
        &self.assessor
    }

    pub fn state(&self) -> ScanState {
        self.lock().state.clone()
    }

    /// Receiver that observes every state transition
    pub fn subscribe(&self) -> watch::Receiver<ScanState> {
        self.state_tx.subscribe()
    }

    /// Cancel the running attempt, if any. It ends as `Cancelled` at its next
    /// suspension point.
    pub fn cancel(&self) -> bool {
        let inner = self.lock();
        match &inner.cancel {
            Some(token) if inner.state.is_active() => {
                token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Run one attempt to completion. A call made while another attempt is
    /// running is rejected with [`ScanError::Busy`].
    pub async fn scan(&self, source: ScanSource) -> Result<ScanOutcome, ScanError> {
        let mut attempt = self.begin(&source)?;
        let token = attempt.token.clone();

        let result = match source {
            ScanSource::Camera(source) => self.scan_camera(source, &token).await,
            ScanSource::Upload(bytes) => self.scan_upload(bytes, &token).await,
        };
        attempt.finish(&result);
        result
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn begin(&self, source: &ScanSource) -> Result<Attempt<'_>, ScanError> {
        let mut inner = self.lock();
        if inner.state.is_active() {
            tracing::debug!(state = ?inner.state, "scan rejected, attempt in flight");
            return Err(ScanError::Busy);
        }
        let token = CancellationToken::new();
        inner.cancel = Some(token.clone());
        let first = match source {
            ScanSource::Camera(_) => ScanState::Capturing,
            ScanSource::Upload(_) => ScanState::Decoding,
        };
        self.set_state(&mut inner, first);
        tracing::debug!(?source, "scan started");
        Ok(Attempt {
            orchestrator: self,
            token,
            finished: false,
        })
    }

    fn set_state(&self, inner: &mut Inner, state: ScanState) {
        if inner.state != state {
            tracing::debug!(from = ?inner.state, to = ?state, "scan state");
            inner.state = state.clone();
            self.state_tx.send_replace(state);
        }
    }

    fn transition(&self, state: ScanState) {
        let mut inner = self.lock();
        if inner.state.is_active() {
            self.set_state(&mut inner, state);
        }
    }

    async fn scan_camera(
        &self,
        source: Box<dyn FrameSource>,
        token: &CancellationToken,
    ) -> Result<ScanOutcome, ScanError> {
        let mut capture = CaptureGuard::start(source)?;
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut attempts = 0u32;

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return Err(ScanError::Cancelled),
                _ = ticker.tick() => {}
            }

            let Some(frame) = capture.latest_frame()? else {
                continue;
            };
            attempts += 1;
            self.transition(ScanState::Decoding);

            let task = tokio::task::spawn_blocking(move || crate::decode(&frame));
            let decoded = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(ScanError::Cancelled),
                joined = task => match joined {
                    Ok(result) => result.ok(),
                    Err(err) => {
                        tracing::debug!(error = %err, "decode task did not complete");
                        None
                    }
                },
            };

            match decoded {
                Some(payload) => {
                    capture.stop();
                    return self.complete(payload, token).await;
                }
                None => {
                    tracing::trace!(attempts, "no symbol in frame");
                    if self.max_attempts.is_some_and(|max| attempts >= max) {
                        return Err(ScanError::NotFound);
                    }
                    self.transition(ScanState::Capturing);
                }
            }
        }
    }

    async fn scan_upload(
        &self,
        bytes: Vec<u8>,
        token: &CancellationToken,
    ) -> Result<ScanOutcome, ScanError> {
        let task = tokio::task::spawn_blocking(move || -> Result<DecodedPayload, ScanError> {
            let frame = decode_static(&bytes)?;
            Ok(crate::decode(&frame)?)
        });
        let payload = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(ScanError::Cancelled),
            joined = task => joined.map_err(|err| ScanError::InvalidImage(err.to_string()))??,
        };
        self.complete(payload, token).await
    }

    async fn complete(
        &self,
        payload: DecodedPayload,
        token: &CancellationToken,
    ) -> Result<ScanOutcome, ScanError> {
        self.transition(ScanState::Normalizing);
        let target = normalize(&payload.text);

        self.transition(ScanState::Assessing);
        let verdict = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(ScanError::Cancelled),
            verdict = self.assessor.assess(&target) => verdict,
        };
        Ok(ScanOutcome {
            payload,
            target,
            verdict,
        })
    }
}

/// Running attempt. Records exactly one terminal state, including when the
/// scan future is dropped before finishing.
struct Attempt<'a> {
    orchestrator: &'a ScanOrchestrator,
    token: CancellationToken,
    finished: bool,
}

impl Attempt<'_> {
    fn finish(&mut self, result: &Result<ScanOutcome, ScanError>) {
        let terminal = match result {
            Ok(outcome) => {
                tracing::info!(
                    risk = %outcome.verdict.risk_level,
                    malicious = outcome.verdict.is_malicious,
                    "scan complete"
                );
                ScanState::Complete
            }
            Err(ScanError::Cancelled) => {
                tracing::info!("scan cancelled");
                ScanState::Cancelled
            }
            Err(err) => {
                tracing::warn!(kind = err.classification(), error = %err, "scan failed");
                ScanState::Failed(err.classification().to_string())
            }
        };
        self.settle(terminal);
    }

    fn settle(&mut self, terminal: ScanState) {
        if self.finished {
            return;
        }
        self.finished = true;
        let mut inner = self.orchestrator.lock();
        inner.cancel = None;
        self.orchestrator.set_state(&mut inner, terminal);
    }
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.token.cancel();
            self.settle(ScanState::Cancelled);
        }
    }
}
