use crate::error::AppError;
use axum::http::HeaderMap;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Client-requested processing budget, in milliseconds.
pub const TIMEOUT_HEADER: &str = "x-processing-timeout";

/// How long one kind of request may take, upload staging included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlinePolicy {
    pub default: Duration,
    pub min: Duration,
    pub max: Duration,
}

/// Reading names: 2 minutes by default, between 1 and 3 minutes.
pub const ANALYSIS: DeadlinePolicy = DeadlinePolicy {
    default: Duration::from_secs(120),
    min: Duration::from_secs(60),
    max: Duration::from_secs(180),
};

/// Rewriting names: 10 minutes by default, between 10 and 20 minutes.
pub const PROCESSING: DeadlinePolicy = DeadlinePolicy {
    default: Duration::from_secs(600),
    min: Duration::from_secs(600),
    max: Duration::from_secs(1200),
};

impl DeadlinePolicy {
    /// Budget for a request: the header value if it parses, the default
    /// otherwise, clamped to `[min, max]`.
    pub fn resolve(&self, headers: &HeaderMap) -> Duration {
        let requested = match headers.get(TIMEOUT_HEADER).map(|v| v.to_str()) {
            None => self.default,
            Some(Ok(raw)) => match raw.trim().parse::<u64>() {
                Ok(ms) => Duration::from_millis(ms),
                Err(_) => {
                    tracing::warn!(value = raw, "ignoring malformed {TIMEOUT_HEADER} header");
                    self.default
                }
            },
            Some(Err(_)) => {
                tracing::warn!("ignoring non-ASCII {TIMEOUT_HEADER} header");
                self.default
            }
        };
        requested.clamp(self.min, self.max)
    }
}

/// A running budget for one request. Started before the upload is staged,
/// so a slow upload and slow model work draw on the same allowance.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    budget: Duration,
    expires: Instant,
    verb: &'static str,
}

impl Deadline {
    /// Start the clock now. `verb` names the work in error messages
    /// ("failed to {verb} IFC file").
    pub fn start(budget: Duration, verb: &'static str) -> Self {
        Self {
            budget,
            expires: Instant::now() + budget,
            verb,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    fn exceeded(&self) -> AppError {
        AppError::deadline_exceeded(format!(
            "failed to {} IFC file: exceeded the maximum allowed time ({} seconds)",
            self.verb,
            self.budget.as_secs()
        ))
    }

    /// Drive async request work, such as staging the upload, until the
    /// deadline.
    pub async fn run<T, Fut>(&self, work: Fut) -> Result<T, AppError>
    where
        Fut: Future<Output = Result<T, AppError>>,
    {
        tokio::time::timeout_at(self.expires, work)
            .await
            .map_err(|_| self.exceeded())?
    }

    /// Run blocking model work on the blocking pool with whatever budget is
    /// left.
    ///
    /// On timeout the request is answered with 504 right away. The blocking
    /// task cannot be interrupted; it finishes in the background and its
    /// result is dropped.
    pub async fn run_blocking<T, F>(&self, work: F) -> Result<T, AppError>
    where
        F: FnOnce() -> ifcmeta_core::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let task = tokio::task::spawn_blocking(work);
        match tokio::time::timeout_at(self.expires, task).await {
            Err(_) => Err(self.exceeded()),
            Ok(Err(join)) => Err(AppError(anyhow::anyhow!("task join error: {join}"))),
            Ok(Ok(Err(e))) => Err(AppError(
                anyhow::Error::new(e).context(format!("failed to {} IFC file", self.verb)),
            )),
            Ok(Ok(Ok(value))) => Ok(value),
        }
    }
}
