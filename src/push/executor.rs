//! Push issuance against a push-capable transport stream.
//!
//! # Responsibilities
//! - Promise every push in ranked order before the caller continues
//! - Deliver promised bodies concurrently, off the primary response's path
//! - Report exactly one outcome per push; never retry
//!
//! # Design Decisions
//! - Promises are synchronous: HTTP/2 wants PUSH_PROMISE frames ahead of the
//!   associated response's end of stream
//! - Deliveries complete in any order; a failure never touches siblings

use futures_util::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use tokio::task::JoinHandle;

use crate::asset::AssetPath;
use crate::push::types::{PushError, PushJob, PushOutcome};

/// A transport stream that can originate server pushes.
pub trait PushStream {
    type Promised: PromisedPush;

    /// Announce a push for `job.request_path`. Must not block.
    fn promise(&self, job: &PushJob) -> Result<Self::Promised, PushError>;
}

/// A push that has been promised and still needs its response.
pub trait PromisedPush: Send + 'static {
    fn deliver(self) -> impl Future<Output = Result<(), PushError>> + Send;
}

/// Per-path outcomes of one request's pushes, in ranked order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushReport {
    pub outcomes: Vec<(AssetPath, PushOutcome)>,
}

impl PushReport {
    pub fn outcome(&self, path: &AssetPath) -> Option<&PushOutcome> {
        self.outcomes
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, outcome)| outcome)
    }

    pub fn delivered(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| *outcome == PushOutcome::Delivered)
            .count()
    }
}

/// Handle on in-flight deliveries. Dropping it does not cancel them.
#[derive(Debug)]
pub struct PushHandle {
    inner: JoinHandle<PushReport>,
}

impl PushHandle {
    /// Wait for every push to settle.
    pub async fn report(self) -> PushReport {
        match self.inner.await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(error = %e, "Push delivery task failed");
                PushReport::default()
            }
        }
    }
}

/// Issue `jobs` on `stream`, reporting each outcome to `observer`.
///
/// Must be called from within a tokio runtime.
pub fn execute<S, O>(stream: &S, jobs: Vec<PushJob>, observer: O) -> PushHandle
where
    S: PushStream,
    O: Fn(&AssetPath, &PushOutcome) + Send + Sync + 'static,
{
    let mut outcomes: Vec<Option<PushOutcome>> = vec![None; jobs.len()];
    let mut promised = Vec::with_capacity(jobs.len());

    for (rank, job) in jobs.iter().enumerate() {
        match stream.promise(job) {
            Ok(push) => promised.push((rank, push)),
            Err(err) => {
                let outcome = PushOutcome::from(err);
                tracing::debug!(path = %job.path, outcome = outcome.label(), "Push not promised");
                observer(&job.path, &outcome);
                outcomes[rank] = Some(outcome);
            }
        }
    }

    let inner = tokio::spawn(async move {
        let mut deliveries: FuturesUnordered<_> = promised
            .into_iter()
            .map(|(rank, push)| async move { (rank, push.deliver().await) })
            .collect();

        while let Some((rank, result)) = deliveries.next().await {
            let outcome = match result {
                Ok(()) => PushOutcome::Delivered,
                Err(err) => PushOutcome::from(err),
            };
            tracing::trace!(path = %jobs[rank].path, outcome = outcome.label(), "Push settled");
            observer(&jobs[rank].path, &outcome);
            outcomes[rank] = Some(outcome);
        }

        PushReport {
            outcomes: jobs
                .into_iter()
                .zip(outcomes)
                .map(|(job, outcome)| (job.path, outcome.unwrap_or(PushOutcome::Abandoned)))
                .collect(),
        }
    });

    PushHandle { inner }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct FakeStream {
        promised: Mutex<Vec<String>>,
        refuse_promise: Option<&'static str>,
    }

    struct FakePush {
        path: String,
    }

    impl PushStream for FakeStream {
        type Promised = FakePush;

        fn promise(&self, job: &PushJob) -> Result<FakePush, PushError> {
            let request_path = job.request_path.as_str();
            if self.refuse_promise == Some(request_path) {
                return Err(PushError::Closed);
            }
            self.promised
                .lock()
                .unwrap()
                .push(request_path.to_string());
            Ok(FakePush {
                path: request_path.to_string(),
            })
        }
    }

    impl PromisedPush for FakePush {
        async fn deliver(self) -> Result<(), PushError> {
            match self.path.as_str() {
                "/slow.js" => {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(())
                }
                "/missing.js" => Err(PushError::NotFound),
                "/cached.css" => Err(PushError::Refused),
                _ => Ok(()),
            }
        }
    }

    fn job(p: &str) -> PushJob {
        PushJob {
            path: AssetPath::from_canonical(p).unwrap(),
            request_path: p.to_string(),
        }
    }

    #[tokio::test]
    async fn promises_in_rank_order_and_reports_each_path() {
        let stream = FakeStream {
            promised: Mutex::new(Vec::new()),
            refuse_promise: Some("/late.js"),
        };
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let handle = execute(
            &stream,
            vec![
                job("/slow.js"),
                job("/missing.js"),
                job("/cached.css"),
                job("/late.js"),
                job("/fast.js"),
            ],
            move |path, outcome| sink.lock().unwrap().push((path.clone(), outcome.clone())),
        );

        assert_eq!(
            *stream.promised.lock().unwrap(),
            vec!["/slow.js", "/missing.js", "/cached.css", "/fast.js"]
        );

        let report = handle.report().await;
        let paths: Vec<&str> = report.outcomes.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(
            paths,
            vec!["/slow.js", "/missing.js", "/cached.css", "/late.js", "/fast.js"]
        );
        assert_eq!(report.outcomes[0].1, PushOutcome::Delivered);
        assert_eq!(report.outcomes[1].1, PushOutcome::NotFound);
        assert_eq!(report.outcomes[2].1, PushOutcome::Refused);
        assert_eq!(report.outcomes[3].1, PushOutcome::Abandoned);
        assert_eq!(report.outcomes[4].1, PushOutcome::Delivered);
        assert_eq!(report.delivered(), 2);

        // Observer saw every push exactly once; the slow one finished last.
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 5);
        assert_eq!(seen.last().unwrap().0.as_str(), "/slow.js");
    }

    #[tokio::test]
    async fn empty_job_list_settles_immediately() {
        let stream = FakeStream {
            promised: Mutex::new(Vec::new()),
            refuse_promise: None,
        };
        let report = execute(&stream, Vec::new(), |_, _| {}).report().await;
        assert!(report.outcomes.is_empty());
    }
}
