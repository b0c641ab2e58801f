// HLS segment scheduler: a fixed pool of workers draining a shared queue of
// segment indices. Failed segments go back on the queue.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

use crate::hls::HlsDownloaderError;
use crate::hls::config::{HlsConfig, ProgressErrorPolicy};
use crate::hls::decryption::SegmentDecryption;
use crate::hls::fetcher::{ByteSpan, HttpFetch, ResourceKind};
use crate::hls::processor::SegmentProcessor;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Called with `(completed, total)` after each stored segment.
pub type ProgressCallback = Arc<dyn Fn(usize, usize) -> Result<(), BoxError> + Send + Sync>;

/// Everything a worker needs to produce one segment file.
#[derive(Debug, Clone)]
pub struct SegmentJob {
    pub index: usize,
    pub url: Url,
    pub range: Option<ByteSpan>,
    pub decryption: Option<SegmentDecryption>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub completed: usize,
    pub bytes: u64,
    /// Failed attempts that were requeued.
    pub retries: u64,
}

/// State shared by all workers of one run. Only `queue` needs the lock;
/// jobs and paths are read-only.
struct RunState {
    config: Arc<HlsConfig>,
    fetcher: Arc<dyn HttpFetch>,
    processor: Arc<SegmentProcessor>,
    jobs: Vec<SegmentJob>,
    paths: Vec<PathBuf>,
    progress: Option<ProgressCallback>,
    queue: Mutex<VecDeque<usize>>,
    attempts: Vec<AtomicU32>,
    completed: AtomicUsize,
    bytes: AtomicU64,
    retries: AtomicU64,
    aborted: AtomicBool,
}

pub struct SegmentScheduler {
    config: Arc<HlsConfig>,
    fetcher: Arc<dyn HttpFetch>,
    processor: Arc<SegmentProcessor>,
}

impl SegmentScheduler {
    pub fn new(
        config: Arc<HlsConfig>,
        fetcher: Arc<dyn HttpFetch>,
        processor: Arc<SegmentProcessor>,
    ) -> Self {
        Self {
            config,
            fetcher,
            processor,
        }
    }

    /// Downloads every job into `paths[job.index]` and returns once all
    /// workers have exited.
    ///
    /// With bounded retries the first exhausted segment stops the other
    /// workers and fails the run. Without a bound the call only returns
    /// once every segment has succeeded.
    pub async fn run(
        &self,
        jobs: Vec<SegmentJob>,
        paths: Vec<PathBuf>,
        progress: Option<ProgressCallback>,
    ) -> Result<SchedulerStats, HlsDownloaderError> {
        let channels = self.config.scheduler_config.download_concurrency;
        if channels == 0 {
            return Err(HlsDownloaderError::ConfigError(
                "download concurrency must be at least 1".to_string(),
            ));
        }
        if paths.len() != jobs.len() || jobs.iter().enumerate().any(|(i, job)| job.index != i) {
            return Err(HlsDownloaderError::ConfigError(
                "segment jobs must be indexed 0..N with one path each".to_string(),
            ));
        }
        if jobs.is_empty() {
            return Ok(SchedulerStats::default());
        }

        let total = jobs.len();
        let workers = channels.min(total);
        let state = Arc::new(RunState {
            config: self.config.clone(),
            fetcher: self.fetcher.clone(),
            processor: self.processor.clone(),
            queue: Mutex::new((0..total).collect()),
            attempts: (0..total).map(|_| AtomicU32::new(0)).collect(),
            jobs,
            paths,
            progress,
            completed: AtomicUsize::new(0),
            bytes: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            aborted: AtomicBool::new(false),
        });

        info!(segments = total, workers, "Starting segment download");
        let mut set = JoinSet::new();
        for worker in 0..workers {
            set.spawn(Self::worker(worker, state.clone()));
        }

        let mut first_error = None;
        while let Some(joined) = set.join_next().await {
            let error = match joined {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(e) if e.is_cancelled() => continue,
                Err(e) => HlsDownloaderError::SegmentProcessError(format!("Worker panicked: {e}")),
            };
            if first_error.is_none() {
                state.aborted.store(true, Ordering::Release);
                set.abort_all();
                first_error = Some(error);
            }
        }
        if let Some(error) = first_error {
            return Err(error);
        }

        let stats = SchedulerStats {
            completed: state.completed.load(Ordering::Acquire),
            bytes: state.bytes.load(Ordering::Acquire),
            retries: state.retries.load(Ordering::Acquire),
        };
        info!(
            completed = stats.completed,
            bytes = stats.bytes,
            retries = stats.retries,
            "All segments downloaded"
        );
        Ok(stats)
    }

    async fn worker(worker: usize, state: Arc<RunState>) -> Result<(), HlsDownloaderError> {
        let max_retries = state.config.scheduler_config.max_segment_retries;
        let retry_delay = state.config.scheduler_config.segment_retry_delay;
        let total = state.jobs.len();

        loop {
            if state.aborted.load(Ordering::Acquire) {
                return Ok(());
            }
            // The guard is a temporary and is released before any await.
            let Some(index) = state.queue.lock().pop_front() else {
                debug!(worker, "Queue drained, worker exiting");
                return Ok(());
            };
            let job = &state.jobs[index];

            match Self::acquire(&state, job).await {
                Ok(len) => {
                    state.bytes.fetch_add(len as u64, Ordering::AcqRel);
                    let completed = state.completed.fetch_add(1, Ordering::AcqRel) + 1;
                    debug!(worker, index, bytes = len, completed, total, "Segment stored");
                    if let Some(progress) = &state.progress {
                        if let Err(e) = progress(completed, total) {
                            match state.config.output_config.progress_error_policy {
                                ProgressErrorPolicy::Ignore => {
                                    warn!(index, error = %e, "Progress callback failed");
                                }
                                ProgressErrorPolicy::Abort => {
                                    state.aborted.store(true, Ordering::Release);
                                    return Err(HlsDownloaderError::ProgressAborted(e.to_string()));
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    let attempts = state.attempts[index].fetch_add(1, Ordering::AcqRel) + 1;
                    warn!(worker, index, attempts, uri = %job.url, error = %e, "Segment failed");
                    if max_retries.is_some_and(|max| attempts > max) {
                        state.aborted.store(true, Ordering::Release);
                        return Err(HlsDownloaderError::SegmentExhausted {
                            index,
                            attempts,
                            last_error: Box::new(e),
                        });
                    }

                    if retry_delay.is_zero() {
                        tokio::task::yield_now().await;
                    } else {
                        tokio::time::sleep(retry_delay).await;
                    }
                    state.queue.lock().push_back(index);
                    state.retries.fetch_add(1, Ordering::AcqRel);
                    debug!(worker, index, "Requeued segment");
                }
            }
        }
    }

    /// Fetch, decrypt, align and store one segment. Returns the stored size.
    async fn acquire(state: &RunState, job: &SegmentJob) -> Result<usize, HlsDownloaderError> {
        let raw = state
            .fetcher
            .fetch(ResourceKind::Segment, &job.url, job.range)
            .await?;
        let data = state
            .processor
            .process(raw, job.decryption.as_ref())
            .await?;
        tokio::fs::write(&state.paths[job.index], &data).await?;
        Ok(data.len())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;
    use crate::hls::test_support::{FakeFetcher, encrypt, ts_payload};
    use crate::hls::workdir::WorkDir;

    const KEY: [u8; 16] = *b"fedcba9876543210";
    const IV: [u8; 16] = *b"0000000000000007";

    fn url(index: usize) -> String {
        format!("http://cdn/seg{index}.ts")
    }

    fn payload(index: usize) -> Vec<u8> {
        ts_payload(index as u8 + 1, 2 + index % 3)
    }

    /// Even segments are encrypted, odd ones are clear.
    fn fixture(count: usize) -> (FakeFetcher, Vec<SegmentJob>) {
        let mut fetcher = FakeFetcher::new();
        let mut jobs = Vec::new();
        for index in 0..count {
            let encrypted = index % 2 == 0;
            let body = if encrypted {
                encrypt(&payload(index), &KEY, &IV)
            } else {
                payload(index)
            };
            fetcher = fetcher.with_body(&url(index), body);
            jobs.push(SegmentJob {
                index,
                url: Url::parse(&url(index)).unwrap(),
                range: None,
                decryption: encrypted.then(|| SegmentDecryption {
                    key: Bytes::from_static(&KEY),
                    iv: IV,
                }),
            });
        }
        (fetcher, jobs)
    }

    fn scheduler(
        fetcher: Arc<FakeFetcher>,
        channels: usize,
        retries: Option<u32>,
        policy: ProgressErrorPolicy,
    ) -> SegmentScheduler {
        let mut config = HlsConfig::default();
        config.scheduler_config.download_concurrency = channels;
        config.scheduler_config.max_segment_retries = retries;
        config.scheduler_config.segment_retry_delay = Duration::from_millis(1);
        config.output_config.progress_error_policy = policy;
        let config = Arc::new(config);
        SegmentScheduler::new(
            config.clone(),
            fetcher,
            Arc::new(SegmentProcessor::new(config)),
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_channel_count_does_not_change_output() {
        let count = 12;
        let mut outputs = Vec::new();
        for channels in [1, 8] {
            let (fetcher, jobs) = fixture(count);
            let workdir = WorkDir::create(None).unwrap();
            let stats = scheduler(Arc::new(fetcher), channels, Some(0), Default::default())
                .run(jobs, workdir.segment_paths(count), None)
                .await
                .unwrap();
            assert_eq!(stats.completed, count);

            let files: Vec<Vec<u8>> = workdir
                .segment_paths(count)
                .iter()
                .map(|p| std::fs::read(p).unwrap())
                .collect();
            outputs.push(files);
        }

        assert_eq!(outputs[0], outputs[1]);
        for (index, file) in outputs[0].iter().enumerate() {
            assert_eq!(file[..], payload(index)[3..]);
        }
    }

    #[tokio::test]
    async fn test_bounded_retries_recover_from_transient_failures() {
        let (fetcher, jobs) = fixture(3);
        let fetcher = Arc::new(fetcher.failing(&url(1), 2));
        let workdir = WorkDir::create(None).unwrap();

        let stats = scheduler(fetcher.clone(), 2, Some(5), Default::default())
            .run(jobs, workdir.segment_paths(3), None)
            .await
            .unwrap();
        assert_eq!(stats.completed, 3);
        assert_eq!(stats.retries, 2);
        assert_eq!(fetcher.request_count(&url(1)), 3);
    }

    #[tokio::test]
    async fn test_exhausted_segment_fails_the_run() {
        let (fetcher, jobs) = fixture(4);
        let fetcher = Arc::new(fetcher.failing_forever(&url(2)));
        let workdir = WorkDir::create(None).unwrap();

        let result = scheduler(fetcher.clone(), 2, Some(2), Default::default())
            .run(jobs, workdir.segment_paths(4), None)
            .await;
        match result {
            Err(HlsDownloaderError::SegmentExhausted {
                index,
                attempts,
                last_error,
            }) => {
                assert_eq!(index, 2);
                assert_eq!(attempts, 3);
                assert!(matches!(*last_error, HlsDownloaderError::SegmentFetchError(_)));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(fetcher.request_count(&url(2)), 3);
    }

    #[tokio::test]
    async fn test_unbounded_retries_never_return_on_permanent_failure() {
        let (fetcher, jobs) = fixture(3);
        let fetcher = Arc::new(fetcher.failing_forever(&url(0)));
        let workdir = WorkDir::create(None).unwrap();
        let scheduler = scheduler(fetcher.clone(), 2, None, Default::default());

        let outcome = tokio::time::timeout(
            Duration::from_millis(200),
            scheduler.run(jobs, workdir.segment_paths(3), None),
        )
        .await;
        assert!(outcome.is_err(), "run returned despite a permanent failure");
        assert!(fetcher.request_count(&url(0)) > 3);
    }

    #[tokio::test]
    async fn test_progress_reports_every_segment() {
        let (fetcher, jobs) = fixture(5);
        let workdir = WorkDir::create(None).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let progress: ProgressCallback = Arc::new(move |completed: usize, total: usize| -> Result<(), BoxError> {
            recorder.lock().push((completed, total));
            Err("display closed".into())
        });

        scheduler(Arc::new(fetcher), 3, Some(0), ProgressErrorPolicy::Ignore)
            .run(jobs, workdir.segment_paths(5), Some(progress))
            .await
            .unwrap();

        let mut seen = seen.lock().clone();
        seen.sort();
        assert_eq!(seen, (1..=5).map(|c| (c, 5)).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_progress_error_aborts_when_configured() {
        let (fetcher, jobs) = fixture(6);
        let workdir = WorkDir::create(None).unwrap();
        let progress: ProgressCallback = Arc::new(|_: usize, _: usize| -> Result<(), BoxError> { Err("stop".into()) });

        let result = scheduler(Arc::new(fetcher), 1, Some(0), ProgressErrorPolicy::Abort)
            .run(jobs, workdir.segment_paths(6), Some(progress))
            .await;
        assert!(matches!(result, Err(HlsDownloaderError::ProgressAborted(msg)) if msg == "stop"));
        assert!(!workdir.segment_path(5).exists());
    }

    #[tokio::test]
    async fn test_rejects_zero_channels_and_mismatched_paths() {
        let (fetcher, jobs) = fixture(2);
        let fetcher = Arc::new(fetcher);
        let workdir = WorkDir::create(None).unwrap();

        let zero = scheduler(fetcher.clone(), 0, Some(0), Default::default())
            .run(jobs.clone(), workdir.segment_paths(2), None)
            .await;
        assert!(matches!(zero, Err(HlsDownloaderError::ConfigError(_))));

        let mismatched = scheduler(fetcher, 2, Some(0), Default::default())
            .run(jobs, workdir.segment_paths(1), None)
            .await;
        assert!(matches!(mismatched, Err(HlsDownloaderError::ConfigError(_))));
    }
}
