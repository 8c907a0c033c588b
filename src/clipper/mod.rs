use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub mod ffmpeg;

pub use ffmpeg::FfmpegTool;

use crate::highlights::{
    timestamp, ClipStatus, ExtractionOutcome, FailureReason, Highlight, HighlightId, SkipReason,
};
use crate::utils::{source_extension, source_stem};
use crate::Result;

/// Time range handed to the extraction tool, in whole seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipWindow {
    pub start_secs: u64,
    pub end_secs: u64,
}

/// Cuts one window out of a media file
#[async_trait]
pub trait ClipTool: Send + Sync {
    /// Write the window of `source` to `output`, overwriting any existing file
    async fn cut(&self, source: &Path, window: ClipWindow, output: &Path) -> Result<()>;
}

/// The two extraction attempts made per highlight, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// Stream copy with a trailing pad past the nominal end
    Padded,
    /// Stream copy with the exact bounds
    Exact,
}

impl Attempt {
    pub fn window(self, start_secs: u64, end_secs: u64, pad_secs: u64) -> ClipWindow {
        match self {
            Attempt::Padded => ClipWindow {
                start_secs,
                end_secs: end_secs.saturating_add(pad_secs),
            },
            Attempt::Exact => ClipWindow {
                start_secs,
                end_secs,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Attempt::Padded => "padded",
            Attempt::Exact => "exact",
        }
    }
}

/// Extracts highlight clips from a local source in a bounded worker pool
pub struct ClipExtractor {
    tool: Arc<dyn ClipTool>,
    max_concurrent: usize,
    trailing_pad_secs: u64,
}

/// Work for one extractable highlight
struct ClipJob {
    highlight_id: HighlightId,
    ordinal: usize,
    start_secs: u64,
    end_secs: u64,
    output: PathBuf,
}

impl ClipExtractor {
    pub fn new(tool: Arc<dyn ClipTool>, max_concurrent: usize, trailing_pad_secs: u64) -> Self {
        Self {
            tool,
            max_concurrent: max_concurrent.max(1),
            trailing_pad_secs,
        }
    }

    /// Deterministic clip path for the highlight at `ordinal`.
    ///
    /// Distinct highlights never share a path; both attempts for one
    /// highlight write to the same path.
    pub fn clip_path(source: &Path, output_dir: &Path, ordinal: usize) -> PathBuf {
        output_dir.join(format!(
            "{}_clip{}.{}",
            source_stem(source),
            ordinal,
            source_extension(source)
        ))
    }

    /// Extract every highlight that has both bounds.
    ///
    /// Returns exactly one outcome per submitted highlight, in submission
    /// order. Outcomes are collected by highlight id, so completion order of
    /// the workers never matters. A failing highlight never cancels its siblings.
    pub async fn extract(
        &self,
        source: &Path,
        highlights: &[Highlight],
        output_dir: &Path,
    ) -> Vec<ExtractionOutcome> {
        let mut outcomes: HashMap<HighlightId, ExtractionOutcome> = HashMap::new();
        let mut jobs = Vec::new();

        for (ordinal, highlight) in highlights.iter().enumerate() {
            match self.plan(source, output_dir, ordinal, highlight) {
                Ok(job) => jobs.push(job),
                Err(status) => {
                    tracing::info!(
                        highlight_id = %highlight.id,
                        ordinal,
                        "Not extracting highlight: {}",
                        describe(&status)
                    );
                    outcomes.insert(
                        highlight.id.clone(),
                        ExtractionOutcome {
                            highlight_id: highlight.id.clone(),
                            ordinal,
                            status,
                        },
                    );
                }
            }
        }

        tracing::info!(
            clips = jobs.len(),
            workers = self.max_concurrent,
            "Extracting clips from {}",
            source.display()
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut set = JoinSet::new();

        for job in jobs {
            let tool = Arc::clone(&self.tool);
            let semaphore = Arc::clone(&semaphore);
            let source = source.to_path_buf();
            let pad = self.trailing_pad_secs;

            set.spawn(async move {
                // Never closed, so a permit is always granted eventually
                let _permit = semaphore.acquire_owned().await;
                let status = run_attempts(tool.as_ref(), &source, &job, pad).await;
                ExtractionOutcome {
                    highlight_id: job.highlight_id,
                    ordinal: job.ordinal,
                    status,
                }
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(outcome) => {
                    outcomes.insert(outcome.highlight_id.clone(), outcome);
                }
                Err(e) => tracing::error!(error = %e, "Extraction task aborted"),
            }
        }

        // Emit in submission order; a task that died without reporting still gets an outcome
        highlights
            .iter()
            .enumerate()
            .map(|(ordinal, highlight)| {
                outcomes.remove(&highlight.id).unwrap_or_else(|| ExtractionOutcome {
                    highlight_id: highlight.id.clone(),
                    ordinal,
                    status: ClipStatus::Failed(FailureReason::ToolError(
                        "extraction task aborted".to_string(),
                    )),
                })
            })
            .collect()
    }

    /// Decide whether a highlight is extractable, without touching the tool
    fn plan(
        &self,
        source: &Path,
        output_dir: &Path,
        ordinal: usize,
        highlight: &Highlight,
    ) -> std::result::Result<ClipJob, ClipStatus> {
        let (start, end) = highlight
            .bounds()
            .ok_or(ClipStatus::Skipped(SkipReason::MissingBound))?;

        let invalid = |reason: String| ClipStatus::Failed(FailureReason::InvalidRange(reason));

        let start_secs = timestamp::parse_seconds(start).map_err(|e| invalid(e.to_string()))?;
        let end_secs = timestamp::parse_seconds(end).map_err(|e| invalid(e.to_string()))?;

        if end_secs <= start_secs {
            return Err(invalid(format!("end {} is not after start {}", end, start)));
        }

        Ok(ClipJob {
            highlight_id: highlight.id.clone(),
            ordinal,
            start_secs,
            end_secs,
            output: Self::clip_path(source, output_dir, ordinal),
        })
    }
}

/// Padded attempt first, exact bounds on failure; each attempt ends in a definite result
async fn run_attempts(tool: &dyn ClipTool, source: &Path, job: &ClipJob, pad: u64) -> ClipStatus {
    let padded = attempt(tool, source, job, Attempt::Padded, pad).await;

    let first_error = match padded {
        Ok(()) => return ClipStatus::Extracted(job.output.clone()),
        Err(e) => e,
    };

    tracing::warn!(
        highlight_id = %job.highlight_id,
        ordinal = job.ordinal,
        error = %first_error,
        "Padded extraction failed, retrying with exact bounds"
    );

    match attempt(tool, source, job, Attempt::Exact, pad).await {
        Ok(()) => ClipStatus::Extracted(job.output.clone()),
        Err(e) => {
            tracing::error!(
                highlight_id = %job.highlight_id,
                ordinal = job.ordinal,
                error = %e,
                "Extraction failed after both attempts"
            );
            ClipStatus::Failed(FailureReason::ToolError(format!("{:#}", e)))
        }
    }
}

async fn attempt(
    tool: &dyn ClipTool,
    source: &Path,
    job: &ClipJob,
    attempt: Attempt,
    pad: u64,
) -> Result<()> {
    let window = attempt.window(job.start_secs, job.end_secs, pad);
    tracing::debug!(
        highlight_id = %job.highlight_id,
        ordinal = job.ordinal,
        attempt = attempt.as_str(),
        start = window.start_secs,
        end = window.end_secs,
        "Cutting clip to {}",
        job.output.display()
    );
    tool.cut(source, window, &job.output).await
}

fn describe(status: &ClipStatus) -> String {
    match status {
        ClipStatus::Extracted(path) => format!("extracted to {}", path.display()),
        ClipStatus::Skipped(reason) => reason.to_string(),
        ClipStatus::Failed(reason) => reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records every call; fails attempts whose window matches `fail_when`
    struct ScriptedTool {
        calls: Mutex<Vec<(ClipWindow, PathBuf)>>,
        fail_when: Box<dyn Fn(ClipWindow) -> bool + Send + Sync>,
        delay: Box<dyn Fn(ClipWindow) -> Duration + Send + Sync>,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ScriptedTool {
        fn new(fail_when: impl Fn(ClipWindow) -> bool + Send + Sync + 'static) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_when: Box::new(fail_when),
                delay: Box::new(|_| Duration::ZERO),
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }

        fn with_delay(mut self, delay: impl Fn(ClipWindow) -> Duration + Send + Sync + 'static) -> Self {
            self.delay = Box::new(delay);
            self
        }

        fn calls(&self) -> Vec<(ClipWindow, PathBuf)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ClipTool for ScriptedTool {
        async fn cut(&self, _source: &Path, window: ClipWindow, output: &Path) -> Result<()> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.calls.lock().unwrap().push((window, output.to_path_buf()));

            tokio::time::sleep((self.delay)(window)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);

            if (self.fail_when)(window) {
                anyhow::bail!("simulated ffmpeg failure");
            }
            Ok(())
        }
    }

    fn highlight(id: &str, start: Option<&str>, end: Option<&str>) -> Highlight {
        Highlight {
            id: HighlightId::from(id),
            start_time: start.map(String::from),
            end_time: end.map(String::from),
            description: None,
        }
    }

    fn extractor(tool: Arc<ScriptedTool>, workers: usize) -> ClipExtractor {
        ClipExtractor::new(tool, workers, 10)
    }

    const SOURCE: &str = "/videos/talk.mp4";
    const OUT: &str = "/work/run";

    #[tokio::test]
    async fn test_missing_bound_is_skipped_without_tool_call() {
        let tool = Arc::new(ScriptedTool::new(|_| false));
        let highlights = vec![
            highlight("a", None, Some("00:01:00")),
            highlight("b", Some("00:00:10"), None),
        ];

        let outcomes = extractor(tool.clone(), 2)
            .extract(Path::new(SOURCE), &highlights, Path::new(OUT))
            .await;

        assert!(tool.calls().is_empty());
        assert_eq!(outcomes.len(), 2);
        for outcome in &outcomes {
            assert_eq!(outcome.status, ClipStatus::Skipped(SkipReason::MissingBound));
        }
    }

    #[tokio::test]
    async fn test_invalid_range_fails_without_tool_call() {
        let tool = Arc::new(ScriptedTool::new(|_| false));
        let highlights = vec![
            highlight("equal", Some("00:00:20"), Some("00:00:20")),
            highlight("reversed", Some("00:01:00"), Some("00:00:30")),
            highlight("garbled", Some("soon"), Some("00:00:30")),
        ];

        let outcomes = extractor(tool.clone(), 2)
            .extract(Path::new(SOURCE), &highlights, Path::new(OUT))
            .await;

        assert!(tool.calls().is_empty());
        for outcome in &outcomes {
            assert!(
                matches!(outcome.status, ClipStatus::Failed(FailureReason::InvalidRange(_))),
                "{:?}",
                outcome
            );
        }
    }

    #[tokio::test]
    async fn test_padded_attempt_succeeds_first() {
        let tool = Arc::new(ScriptedTool::new(|_| false));
        let highlights = vec![highlight("a", Some("00:00:10"), Some("00:00:20"))];

        let outcomes = extractor(tool.clone(), 1)
            .extract(Path::new(SOURCE), &highlights, Path::new(OUT))
            .await;

        let calls = tool.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, ClipWindow { start_secs: 10, end_secs: 30 });
        assert_eq!(
            outcomes[0].status,
            ClipStatus::Extracted(PathBuf::from("/work/run/talk_clip0.mp4"))
        );
    }

    #[tokio::test]
    async fn test_exact_retry_reuses_the_same_path() {
        // Only the padded window (end past 20s) fails
        let tool = Arc::new(ScriptedTool::new(|w| w.end_secs > 20));
        let highlights = vec![highlight("a", Some("00:10"), Some("00:20"))];

        let outcomes = extractor(tool.clone(), 1)
            .extract(Path::new(SOURCE), &highlights, Path::new(OUT))
            .await;

        let calls = tool.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, ClipWindow { start_secs: 10, end_secs: 30 });
        assert_eq!(calls[1].0, ClipWindow { start_secs: 10, end_secs: 20 });
        assert_eq!(calls[0].1, calls[1].1);
        assert_eq!(outcomes[0].clip_path(), Some(&calls[1].1));
    }

    #[tokio::test]
    async fn test_double_failure_does_not_abort_siblings() {
        // Highlight starting at 0s always fails; the other always succeeds
        let tool = Arc::new(ScriptedTool::new(|w| w.start_secs == 0));
        let highlights = vec![
            highlight("bad", Some("00:00:00"), Some("00:00:05")),
            highlight("good", Some("00:01:00"), Some("00:01:30")),
        ];

        let outcomes = extractor(tool.clone(), 2)
            .extract(Path::new(SOURCE), &highlights, Path::new(OUT))
            .await;

        assert_eq!(tool.calls().len(), 3);
        assert!(matches!(
            outcomes[0].status,
            ClipStatus::Failed(FailureReason::ToolError(_))
        ));
        assert_eq!(
            outcomes[1].status,
            ClipStatus::Extracted(PathBuf::from("/work/run/talk_clip1.mp4"))
        );
    }

    #[tokio::test]
    async fn test_outcomes_keyed_by_id_regardless_of_completion_order() {
        // Earlier highlights take longer, so workers finish in reverse order
        let tool = Arc::new(
            ScriptedTool::new(|_| false)
                .with_delay(|w| Duration::from_millis(100u64.saturating_sub(w.start_secs))),
        );
        let highlights: Vec<Highlight> = (0..8)
            .map(|i| {
                highlight(
                    &format!("h{i}"),
                    Some(timestamp::format(i * 10).as_str()),
                    Some(timestamp::format(i * 10 + 5).as_str()),
                )
            })
            .collect();

        let outcomes = extractor(tool.clone(), 8)
            .extract(Path::new(SOURCE), &highlights, Path::new(OUT))
            .await;

        assert_eq!(outcomes.len(), highlights.len());
        for (i, (outcome, highlight)) in outcomes.iter().zip(&highlights).enumerate() {
            assert_eq!(outcome.highlight_id, highlight.id);
            assert_eq!(outcome.ordinal, i);
            assert_eq!(
                outcome.clip_path(),
                Some(&PathBuf::from(format!("/work/run/talk_clip{i}.mp4")))
            );
        }
    }

    #[tokio::test]
    async fn test_pool_never_exceeds_worker_limit() {
        let tool = Arc::new(ScriptedTool::new(|_| false).with_delay(|_| Duration::from_millis(20)));
        let highlights: Vec<Highlight> = (0..10)
            .map(|i| {
                highlight(
                    &format!("h{i}"),
                    Some(timestamp::format(i * 60).as_str()),
                    Some(timestamp::format(i * 60 + 30).as_str()),
                )
            })
            .collect();

        let outcomes = extractor(tool.clone(), 3)
            .extract(Path::new(SOURCE), &highlights, Path::new(OUT))
            .await;

        assert_eq!(outcomes.len(), 10);
        assert!(tool.peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(tool.calls().len(), 10);
    }

    #[test]
    fn test_clip_paths_are_distinct_per_ordinal() {
        let source = Path::new("/videos/My Talk.webm");
        let first = ClipExtractor::clip_path(source, Path::new(OUT), 0);
        let second = ClipExtractor::clip_path(source, Path::new(OUT), 1);

        assert_eq!(first, PathBuf::from("/work/run/My_Talk_clip0.webm"));
        assert_ne!(first, second);
    }

    #[test]
    fn test_attempt_windows() {
        assert_eq!(
            Attempt::Padded.window(10, 20, 10),
            ClipWindow { start_secs: 10, end_secs: 30 }
        );
        assert_eq!(
            Attempt::Exact.window(10, 20, 10),
            ClipWindow { start_secs: 10, end_secs: 20 }
        );
        assert_eq!(
            Attempt::Padded.window(0, u64::MAX - 1, 10),
            ClipWindow { start_secs: 0, end_secs: u64::MAX }
        );
    }

    /// Panics instead of returning for windows starting at `panic_at`
    struct PanickingTool {
        panic_at: u64,
    }

    #[async_trait]
    impl ClipTool for PanickingTool {
        async fn cut(&self, _source: &Path, window: ClipWindow, _output: &Path) -> Result<()> {
            if window.start_secs == self.panic_at {
                panic!("ffmpeg wrapper crashed");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_panicking_task_still_yields_failed_outcome() {
        let tool = Arc::new(PanickingTool { panic_at: 60 });
        let highlights = vec![
            highlight("before", Some("00:00:00"), Some("00:00:10")),
            highlight("crash", Some("00:01:00"), Some("00:01:10")),
            highlight("after", Some("00:02:00"), Some("00:02:10")),
        ];

        let outcomes = ClipExtractor::new(tool, 3, 10)
            .extract(Path::new(SOURCE), &highlights, Path::new(OUT))
            .await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[1].highlight_id, HighlightId::from("crash"));
        assert_eq!(outcomes[1].ordinal, 1);
        assert!(matches!(
            outcomes[1].status,
            ClipStatus::Failed(FailureReason::ToolError(_))
        ));
        assert_eq!(
            outcomes[0].status,
            ClipStatus::Extracted(PathBuf::from("/work/run/talk_clip0.mp4"))
        );
        assert_eq!(
            outcomes[2].status,
            ClipStatus::Extracted(PathBuf::from("/work/run/talk_clip2.mp4"))
        );
    }

    #[tokio::test]
    async fn test_overflowing_bound_fails_as_invalid_range() {
        let tool = Arc::new(ScriptedTool::new(|_| false));
        let highlights = vec![
            highlight("huge", Some("00:00:10"), Some("9999999999999999:00:00")),
            highlight("fine", Some("00:00:10"), Some("00:00:20")),
        ];

        let outcomes = extractor(tool.clone(), 2)
            .extract(Path::new(SOURCE), &highlights, Path::new(OUT))
            .await;

        assert!(matches!(
            outcomes[0].status,
            ClipStatus::Failed(FailureReason::InvalidRange(_))
        ));
        assert!(matches!(outcomes[1].status, ClipStatus::Extracted(_)));
        assert_eq!(tool.calls().len(), 1);
    }
}
