//! Job scheduler: runs ingestion then signing once per cycle, forever.
//!
//! Cycles are strictly sequential and separated by a full interval of sleep,
//! however long the previous cycle took. A failed or panicking cycle is logged
//! and the loop carries on after the usual sleep; there is no backoff.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::PipelineError;
use crate::pipeline::ingest::{IngestReport, IngestionStage};
use crate::pipeline::signing::{SigningReport, SigningStage};

/// Shortest allowed gap between cycles.
pub const MIN_CYCLE_INTERVAL: Duration = Duration::from_secs(60);

/// Clamp a configured interval to [`MIN_CYCLE_INTERVAL`].
pub fn effective_interval(configured: Duration) -> Duration {
    configured.max(MIN_CYCLE_INTERVAL)
}

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub ingest: IngestReport,
    pub signing: SigningReport,
}

pub struct JobScheduler {
    ingest: Arc<IngestionStage>,
    signing: Arc<SigningStage>,
    interval: Duration,
}

impl JobScheduler {
    pub fn new(ingest: IngestionStage, signing: SigningStage, interval: Duration) -> Self {
        let effective = effective_interval(interval);
        if effective != interval {
            info!(
                configured_secs = interval.as_secs(),
                effective_secs = effective.as_secs(),
                "Cycle interval raised to the minimum"
            );
        }
        Self {
            ingest: Arc::new(ingest),
            signing: Arc::new(signing),
            interval: effective,
        }
    }

    /// Run exactly one cycle.
    ///
    /// The cycle executes in its own task, so a panic anywhere inside it comes
    /// back as [`PipelineError::Panicked`] instead of unwinding the caller.
    pub async fn run_once(&self) -> Result<CycleReport, PipelineError> {
        let ingest = Arc::clone(&self.ingest);
        let signing = Arc::clone(&self.signing);

        let cycle = tokio::spawn(async move {
            let ingest_report = ingest.run().await;
            let signing_report = signing.run().await?;
            Ok::<_, PipelineError>(CycleReport {
                ingest: ingest_report,
                signing: signing_report,
            })
        });

        match cycle.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(PipelineError::Panicked(panic_message(e.into_panic()))),
            Err(e) => Err(PipelineError::Panicked(e.to_string())),
        }
    }

    /// Spawn the cycle loop.
    ///
    /// The first cycle starts immediately; each later one starts a full
    /// interval after the previous one finished. Returns a `JoinHandle` and a
    /// shutdown flag; the flag is checked between cycles.
    pub fn spawn(self: Arc<Self>) -> (JoinHandle<()>, Arc<AtomicBool>) {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = Arc::clone(&shutdown);

        let handle = tokio::spawn(async move {
            info!(interval_secs = self.interval.as_secs(), "Scheduler started");

            loop {
                if shutdown.load(Ordering::Relaxed) {
                    info!("Scheduler shutting down");
                    return;
                }

                match self.run_once().await {
                    Ok(report) => info!(
                        queued = report.ingest.queued,
                        skipped = report.ingest.skipped,
                        signed = report.signing.signed,
                        failed = report.signing.failed,
                        "Cycle complete"
                    ),
                    Err(e) => error!(error = %e, "Cycle failed; retrying next interval"),
                }

                tokio::time::sleep(self.interval).await;
            }
        });

        (handle, shutdown_flag)
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::time::Instant;

    use super::*;
    use crate::automation::{AttemptOutcome, FormFiller};
    use crate::channels::mailbox::{FetchedRecord, MailboxReader, MailboxRecord};
    use crate::config::SigningConfig;
    use crate::error::{AutomationError, MailboxError};
    use crate::petitions::{PetitionStatus, UserProfile};
    use crate::pipeline::field_mapper::FieldMapping;
    use crate::store::{LibSqlBackend, PetitionStore};

    struct OneEmail;

    #[async_trait]
    impl MailboxReader for OneEmail {
        fn name(&self) -> &str {
            "one"
        }

        async fn fetch_unseen(&self) -> Result<Vec<FetchedRecord>, MailboxError> {
            Ok(vec![Ok(MailboxRecord::new(
                "m1",
                "Sign the petition",
                "https://a.example.org/p",
            ))])
        }
    }

    struct PanickingMailbox;

    #[async_trait]
    impl MailboxReader for PanickingMailbox {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn fetch_unseen(&self) -> Result<Vec<FetchedRecord>, MailboxError> {
            panic!("mailbox exploded");
        }
    }

    /// Empty mailbox whose fetch takes longer than the cycle interval.
    struct SlowMailbox {
        fetches: Mutex<Vec<(Instant, Instant)>>,
    }

    #[async_trait]
    impl MailboxReader for SlowMailbox {
        fn name(&self) -> &str {
            "slow"
        }

        async fn fetch_unseen(&self) -> Result<Vec<FetchedRecord>, MailboxError> {
            let started = Instant::now();
            tokio::time::sleep(Duration::from_secs(90)).await;
            self.fetches.lock().unwrap().push((started, Instant::now()));
            Ok(Vec::new())
        }
    }

    struct AlwaysSigns;

    #[async_trait]
    impl FormFiller for AlwaysSigns {
        async fn attempt(
            &self,
            _url: &str,
            _fields: &FieldMapping,
        ) -> Result<AttemptOutcome, AutomationError> {
            Ok(AttemptOutcome::signed("Filled 1 fields and submitted"))
        }
    }

    fn scheduler(store: Arc<dyn PetitionStore>, mailbox: Arc<dyn MailboxReader>) -> JobScheduler {
        let profile = UserProfile {
            email: "ada@example.org".into(),
            ..Default::default()
        };
        let config = SigningConfig {
            automation_enabled: true,
            ..Default::default()
        };
        JobScheduler::new(
            IngestionStage::new(Arc::clone(&store), mailbox),
            SigningStage::new(store, Arc::new(AlwaysSigns), profile, config),
            Duration::from_secs(300),
        )
    }

    #[test]
    fn interval_floor() {
        assert_eq!(effective_interval(Duration::from_secs(5)), MIN_CYCLE_INTERVAL);
        assert_eq!(effective_interval(Duration::ZERO), MIN_CYCLE_INTERVAL);
        assert_eq!(
            effective_interval(Duration::from_secs(600)),
            Duration::from_secs(600)
        );
    }

    #[tokio::test]
    async fn cycle_ingests_then_signs() {
        let store: Arc<dyn PetitionStore> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let report = scheduler(Arc::clone(&store), Arc::new(OneEmail))
            .run_once()
            .await
            .unwrap();

        assert_eq!(report.ingest.queued, 1);
        assert_eq!(report.signing.signed, 1);
        let rec = store.get_processed_by_message_id("m1").await.unwrap().unwrap();
        assert_eq!(rec.status, PetitionStatus::Signed);
    }

    #[tokio::test]
    async fn panicking_cycle_is_contained() {
        let store: Arc<dyn PetitionStore> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let sched = scheduler(store, Arc::new(PanickingMailbox));

        let err = sched.run_once().await.unwrap_err();
        assert!(matches!(err, PipelineError::Panicked(ref msg) if msg.contains("mailbox exploded")));

        // The scheduler is still usable afterwards.
        assert!(sched.run_once().await.is_err());
    }

    #[tokio::test]
    async fn spawned_loop_runs_first_cycle_and_stops() {
        let store: Arc<dyn PetitionStore> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let sched = Arc::new(scheduler(Arc::clone(&store), Arc::new(OneEmail)));

        let (handle, shutdown) = sched.spawn();

        let mut signed = false;
        for _ in 0..100 {
            if let Some(rec) = store.get_processed_by_message_id("m1").await.unwrap() {
                if rec.status == PetitionStatus::Signed {
                    signed = true;
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(signed, "first cycle should run immediately");

        shutdown.store(true, Ordering::Relaxed);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn full_interval_separates_slow_cycles() {
        let store: Arc<dyn PetitionStore> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let mailbox = Arc::new(SlowMailbox {
            fetches: Mutex::new(Vec::new()),
        });
        let sched = Arc::new(JobScheduler::new(
            IngestionStage::new(Arc::clone(&store), mailbox.clone()),
            SigningStage::new(
                store,
                Arc::new(AlwaysSigns),
                UserProfile::default(),
                SigningConfig::default(),
            ),
            Duration::from_secs(60),
        ));

        let (handle, shutdown) = sched.spawn();
        tokio::time::sleep(Duration::from_secs(400)).await;
        shutdown.store(true, Ordering::Relaxed);
        handle.abort();

        let fetches = mailbox.fetches.lock().unwrap().clone();
        assert!(fetches.len() >= 2, "expected several cycles, got {}", fetches.len());
        for pair in fetches.windows(2) {
            let gap = pair[1].0 - pair[0].1;
            assert!(gap >= Duration::from_secs(60), "gap {gap:?} shorter than the interval");
        }
    }
}
