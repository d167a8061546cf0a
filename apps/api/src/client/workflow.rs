use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::client::api::{ClientError, ImportBackend};
use crate::client::notify::{Notification, Notifier};
use crate::client::selector::{CandidateFile, FileRejection, FileSelector};
use crate::csv_import::models::{ImportResult, ValidationResult};
use crate::csv_import::template::TEMPLATE_FILE_NAME;

const PROGRESS_TICK: Duration = Duration::from_millis(300);
const PROGRESS_STEP: u8 = 10;
const PROGRESS_CAP: u8 = 90;
const PROGRESS_DONE: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Empty,
    FileSelected,
    Validating,
    Validated,
    Importing,
    Imported,
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Rejected(#[from] FileRejection),

    #[error("{action} is not available while {state:?}")]
    InvalidState {
        action: &'static str,
        state: WorkflowState,
    },

    #[error("{0} is already in progress")]
    Busy(&'static str),

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Set while a request is outstanding; cleared when the guard drops.
#[derive(Debug, Clone, Default)]
struct BusyFlag(Arc<AtomicBool>);

struct BusyGuard(Arc<AtomicBool>);

impl BusyFlag {
    fn try_acquire(&self) -> Option<BusyGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(self.0.clone()))
    }

    fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

type ImportCallback = Box<dyn FnMut(&ImportResult) + Send>;

/// Drives one file through select → validate → import, holding at most one
/// validation report and one import report.
///
/// Every transition is caller-initiated. A new selection discards earlier
/// reports; `reset` returns to the empty state.
pub struct ImportWorkflow<B, N> {
    backend: B,
    notifier: N,
    selector: FileSelector,
    file: Option<CandidateFile>,
    validation: Option<ValidationResult>,
    import_result: Option<ImportResult>,
    skip_duplicates: bool,
    validating: BusyFlag,
    importing: BusyFlag,
    progress: Arc<AtomicU8>,
    on_import_complete: Option<ImportCallback>,
}

impl<B: ImportBackend, N: Notifier> ImportWorkflow<B, N> {
    pub fn new(backend: B, notifier: N) -> Self {
        Self {
            backend,
            notifier,
            selector: FileSelector::default(),
            file: None,
            validation: None,
            import_result: None,
            skip_duplicates: false,
            validating: BusyFlag::default(),
            importing: BusyFlag::default(),
            progress: Arc::new(AtomicU8::new(0)),
            on_import_complete: None,
        }
    }

    /// Called with every successful import result, for the embedding page.
    pub fn on_import_complete(mut self, callback: impl FnMut(&ImportResult) + Send + 'static) -> Self {
        self.on_import_complete = Some(Box::new(callback));
        self
    }

    pub fn state(&self) -> WorkflowState {
        if self.importing.is_set() {
            WorkflowState::Importing
        } else if self.validating.is_set() {
            WorkflowState::Validating
        } else if self.import_result.is_some() {
            WorkflowState::Imported
        } else if self.validation.is_some() {
            WorkflowState::Validated
        } else if self.file.is_some() {
            WorkflowState::FileSelected
        } else {
            WorkflowState::Empty
        }
    }

    pub fn file(&self) -> Option<&CandidateFile> {
        self.file.as_ref()
    }

    pub fn validation(&self) -> Option<&ValidationResult> {
        self.validation.as_ref()
    }

    pub fn import_result(&self) -> Option<&ImportResult> {
        self.import_result.as_ref()
    }

    pub fn skip_duplicates(&self) -> bool {
        self.skip_duplicates
    }

    pub fn is_validating(&self) -> bool {
        self.validating.is_set()
    }

    pub fn is_importing(&self) -> bool {
        self.importing.is_set()
    }

    /// Decorative import progress in percent. It does not track server work.
    pub fn progress(&self) -> u8 {
        self.progress.load(Ordering::Relaxed)
    }

    /// Import is offered only after a validation that found at least one valid row.
    pub fn can_import(&self) -> bool {
        self.state() == WorkflowState::Validated
            && self.validation.as_ref().is_some_and(|v| v.valid_rows > 0)
    }

    /// Replaces the selected file and discards earlier reports. A rejected
    /// selection leaves the current file and reports untouched. No request is
    /// made either way.
    pub fn select_files(&mut self, files: Vec<CandidateFile>) -> Result<(), WorkflowError> {
        match self.selector.select(files) {
            Ok(file) => {
                info!("Selected {} ({} bytes)", file.name, file.size());
                self.file = Some(file);
                self.clear_results();
                Ok(())
            }
            Err(rejection) => {
                self.notifier.notify(Notification::error(
                    "File rejected",
                    Some(rejection.message.clone()),
                ));
                Err(rejection.into())
            }
        }
    }

    /// Only changes the flag sent with the next import.
    pub fn set_skip_duplicates(&mut self, skip: bool) {
        self.skip_duplicates = skip;
    }

    pub async fn validate(&mut self) -> Result<&ValidationResult, WorkflowError> {
        let state = self.state();
        if !matches!(state, WorkflowState::FileSelected | WorkflowState::Validated) {
            return Err(WorkflowError::InvalidState {
                action: "validate",
                state,
            });
        }
        let Some(file) = self.file.as_ref() else {
            return Err(WorkflowError::InvalidState {
                action: "validate",
                state,
            });
        };
        let _busy = self
            .validating
            .try_acquire()
            .ok_or(WorkflowError::Busy("validation"))?;

        match self.backend.validate(file).await {
            Ok(report) => {
                if report.success {
                    self.notifier.notify(Notification::success(
                        "Validation complete",
                        Some(format!("{} rows ready to import", report.valid_rows)),
                    ));
                } else {
                    self.notifier.notify(Notification::warning(
                        "Validation issues found",
                        Some(format!(
                            "{} of {} rows have errors",
                            report.error_rows, report.total_rows
                        )),
                    ));
                }
                Ok(&*self.validation.insert(report))
            }
            Err(e) => {
                warn!("Validation request failed: {e}");
                self.validation = None;
                self.notifier.notify(Notification::error(
                    "Validation failed",
                    e.server_message().map(str::to_string),
                ));
                Err(e.into())
            }
        }
    }

    pub async fn import(&mut self) -> Result<&ImportResult, WorkflowError> {
        if !self.can_import() {
            return Err(WorkflowError::InvalidState {
                action: "import",
                state: self.state(),
            });
        }
        let Some(file) = self.file.as_ref() else {
            return Err(WorkflowError::InvalidState {
                action: "import",
                state: self.state(),
            });
        };
        let _busy = self
            .importing
            .try_acquire()
            .ok_or(WorkflowError::Busy("import"))?;

        self.progress.store(0, Ordering::Relaxed);
        let ticker = ProgressTicker::start(self.progress.clone());
        let outcome = self.backend.import(file, self.skip_duplicates).await;
        drop(ticker);

        match outcome {
            Ok(result) => {
                self.progress.store(PROGRESS_DONE, Ordering::Relaxed);
                self.notifier.notify(Notification::success(
                    "Import complete",
                    Some(format!("{} talents imported", result.successful_rows)),
                ));
                if let Some(callback) = self.on_import_complete.as_mut() {
                    callback(&result);
                }
                Ok(&*self.import_result.insert(result))
            }
            Err(e) => {
                warn!("Import request failed: {e}");
                self.progress.store(0, Ordering::Relaxed);
                self.notifier.notify(Notification::error(
                    "Import failed",
                    e.server_message().map(str::to_string),
                ));
                Err(e.into())
            }
        }
    }

    /// Saves the blank template into `dir`. Failures are reported through the
    /// notifier and yield `None`.
    pub async fn download_template(&self, dir: &Path) -> Option<PathBuf> {
        let bytes = match self.backend.download_template().await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Template download failed: {e}");
                self.notifier.notify(Notification::error(
                    "Download failed",
                    e.server_message().map(str::to_string),
                ));
                return None;
            }
        };

        let path = dir.join(TEMPLATE_FILE_NAME);
        if let Err(e) = tokio::fs::write(&path, &bytes).await {
            warn!("Could not save template to {}: {e}", path.display());
            self.notifier
                .notify(Notification::error("Download failed", Some(e.to_string())));
            return None;
        }

        self.notifier.notify(Notification::success(
            "Template downloaded",
            Some(path.display().to_string()),
        ));
        Some(path)
    }

    /// "Import another file": back to the empty state.
    pub fn reset(&mut self) {
        self.file = None;
        self.clear_results();
    }

    fn clear_results(&mut self) {
        self.validation = None;
        self.import_result = None;
        self.progress.store(0, Ordering::Relaxed);
    }
}

/// Ticker for one import request. Dropping it, including when the import
/// future is cancelled, stops the task and resets `progress` to 0.
struct ProgressTicker {
    handle: JoinHandle<()>,
    progress: Arc<AtomicU8>,
}

impl ProgressTicker {
    fn start(progress: Arc<AtomicU8>) -> Self {
        Self {
            handle: spawn_progress_ticker(progress.clone()),
            progress,
        }
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.handle.abort();
        self.progress.store(0, Ordering::Relaxed);
    }
}

/// Bumps `progress` by a fixed step on every tick, never past the cap.
fn spawn_progress_ticker(progress: Arc<AtomicU8>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PROGRESS_TICK);
        interval.tick().await;
        loop {
            interval.tick().await;
            let _ = progress.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |p| {
                (p < PROGRESS_CAP).then(|| p.saturating_add(PROGRESS_STEP).min(PROGRESS_CAP))
            });
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use bytes::Bytes;
    use uuid::Uuid;

    use super::*;
    use crate::client::notify::{NotificationKind, NotificationLog};
    use crate::client::selector::RejectionCode;
    use crate::csv_import::models::{ImportSummary, RowResult};

    /// Scripted backend that records how often, and with which flag, it was called.
    #[derive(Default)]
    struct StubBackend {
        validation: Option<ValidationResult>,
        import: Option<ImportResult>,
        template: Option<Bytes>,
        calls: Mutex<Vec<String>>,
    }

    fn server_error(message: &str) -> ClientError {
        ClientError::Server {
            status: 500,
            message: Some(message.to_string()),
        }
    }

    impl StubBackend {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ImportBackend for Arc<StubBackend> {
        async fn download_template(&self) -> Result<Bytes, ClientError> {
            self.calls.lock().unwrap().push("template".into());
            self.template.clone().ok_or_else(|| server_error("no template"))
        }

        async fn validate(&self, _file: &CandidateFile) -> Result<ValidationResult, ClientError> {
            self.calls.lock().unwrap().push("validate".into());
            self.validation.clone().ok_or_else(|| server_error("validator down"))
        }

        async fn import(
            &self,
            _file: &CandidateFile,
            skip_duplicate_emails: bool,
        ) -> Result<ImportResult, ClientError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("import skip={skip_duplicate_emails}"));
            tokio::time::sleep(Duration::from_secs(5)).await;
            self.import.clone().ok_or_else(|| server_error("importer down"))
        }
    }

    fn report(valid_rows: usize, error_rows: usize) -> ValidationResult {
        ValidationResult {
            success: error_rows == 0,
            total_rows: valid_rows + error_rows,
            valid_rows,
            error_rows,
            errors: vec![],
            duplicate_emails: vec![],
            sample_valid_rows: vec![],
        }
    }

    fn imported(successful_rows: usize) -> ImportResult {
        ImportResult {
            total_rows: successful_rows,
            successful_rows,
            failed_rows: 0,
            request_id: Uuid::new_v4(),
            results: (0..successful_rows)
                .map(|i| RowResult {
                    row_index: i,
                    success: true,
                    error: None,
                    skipped: false,
                })
                .collect(),
            summary: ImportSummary {
                users_created: successful_rows,
                profiles_created: successful_rows,
                ..Default::default()
            },
        }
    }

    fn csv() -> CandidateFile {
        CandidateFile::new("talents.csv", "text/csv", "firstName\n")
    }

    type Workflow = ImportWorkflow<Arc<StubBackend>, Arc<NotificationLog>>;

    fn workflow(backend: StubBackend) -> (Workflow, Arc<StubBackend>, Arc<NotificationLog>) {
        let backend = Arc::new(backend);
        let log = Arc::new(NotificationLog::new());
        (ImportWorkflow::new(backend.clone(), log.clone()), backend, log)
    }

    #[tokio::test]
    async fn test_starts_empty() {
        let (wf, _, _) = workflow(StubBackend::default());
        assert_eq!(wf.state(), WorkflowState::Empty);
        assert!(!wf.can_import());
        assert_eq!(wf.progress(), 0);
    }

    #[tokio::test]
    async fn test_rejected_file_never_reaches_backend() {
        let (mut wf, backend, log) = workflow(StubBackend {
            validation: Some(report(1, 0)),
            ..Default::default()
        });
        let err = wf
            .select_files(vec![CandidateFile::new("cv.pdf", "application/pdf", "x")])
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Rejected(FileRejection { code: RejectionCode::FileInvalidType, .. })));
        assert_eq!(log.last().unwrap().title, "File rejected");
        assert_eq!(wf.state(), WorkflowState::Empty);
        assert!(matches!(
            wf.validate().await,
            Err(WorkflowError::InvalidState { .. })
        ));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_happy_path_to_imported_and_reset() {
        let completed = Arc::new(Mutex::new(Vec::new()));
        let seen = completed.clone();
        let (wf, backend, log) = workflow(StubBackend {
            validation: Some(report(3, 0)),
            import: Some(imported(3)),
            ..Default::default()
        });
        let mut wf = wf.on_import_complete(move |r| seen.lock().unwrap().push(r.successful_rows));

        wf.select_files(vec![csv()]).unwrap();
        assert_eq!(wf.state(), WorkflowState::FileSelected);

        wf.validate().await.unwrap();
        assert_eq!(wf.state(), WorkflowState::Validated);
        assert!(wf.can_import());

        wf.set_skip_duplicates(true);
        let result = wf.import().await.unwrap();
        assert_eq!(result.successful_rows, 3);
        assert_eq!(wf.state(), WorkflowState::Imported);
        assert_eq!(wf.progress(), 100);
        assert!(!wf.can_import());
        assert_eq!(*completed.lock().unwrap(), vec![3]);
        assert_eq!(backend.calls(), vec!["validate", "import skip=true"]);
        assert_eq!(
            log.titles(),
            vec!["Validation complete", "Import complete"]
        );
        assert_eq!(
            log.last().unwrap().description.as_deref(),
            Some("3 talents imported")
        );

        wf.reset();
        assert_eq!(wf.state(), WorkflowState::Empty);
        assert!(wf.file().is_none());
        assert!(wf.validation().is_none());
        assert!(wf.import_result().is_none());
        assert_eq!(wf.progress(), 0);
    }

    #[tokio::test]
    async fn test_validation_failure_returns_to_file_selected() {
        let (mut wf, _, log) = workflow(StubBackend::default());
        wf.select_files(vec![csv()]).unwrap();
        let err = wf.validate().await.unwrap_err();
        assert!(matches!(err, WorkflowError::Client(_)));
        assert_eq!(wf.state(), WorkflowState::FileSelected);
        assert!(wf.validation().is_none());
        let toast = log.last().unwrap();
        assert_eq!(toast.kind, NotificationKind::Error);
        assert_eq!(toast.title, "Validation failed");
        assert_eq!(toast.description.as_deref(), Some("validator down"));
    }

    #[tokio::test]
    async fn test_issues_found_is_a_warning_not_an_error() {
        let (mut wf, _, log) = workflow(StubBackend {
            validation: Some(report(2, 1)),
            ..Default::default()
        });
        wf.select_files(vec![csv()]).unwrap();
        wf.validate().await.unwrap();
        assert_eq!(log.last().unwrap().kind, NotificationKind::Warning);
        assert!(wf.can_import());
    }

    #[tokio::test]
    async fn test_import_not_offered_without_valid_rows() {
        let (mut wf, backend, _) = workflow(StubBackend {
            validation: Some(report(0, 4)),
            import: Some(imported(0)),
            ..Default::default()
        });
        wf.select_files(vec![csv()]).unwrap();
        wf.validate().await.unwrap();
        assert!(!wf.can_import());
        assert!(matches!(
            wf.import().await,
            Err(WorkflowError::InvalidState { action: "import", .. })
        ));
        assert_eq!(backend.calls(), vec!["validate"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_import_failure_keeps_validation() {
        let (mut wf, _, log) = workflow(StubBackend {
            validation: Some(report(2, 0)),
            ..Default::default()
        });
        wf.select_files(vec![csv()]).unwrap();
        wf.validate().await.unwrap();
        assert!(wf.import().await.is_err());
        assert_eq!(wf.state(), WorkflowState::Validated);
        assert!(wf.import_result().is_none());
        assert_eq!(wf.progress(), 0);
        assert_eq!(log.last().unwrap().title, "Import failed");
    }

    #[tokio::test]
    async fn test_rejected_selection_keeps_current_file() {
        let (mut wf, _, _) = workflow(StubBackend {
            validation: Some(report(2, 0)),
            ..Default::default()
        });
        wf.select_files(vec![csv()]).unwrap();
        wf.validate().await.unwrap();

        assert!(wf.select_files(vec![csv(), csv()]).is_err());
        assert_eq!(wf.state(), WorkflowState::Validated);
        assert_eq!(wf.file().unwrap().name, "talents.csv");
        assert!(wf.validation().is_some());
    }

    #[tokio::test]
    async fn test_toggle_makes_no_request() {
        let (mut wf, backend, _) = workflow(StubBackend::default());
        wf.set_skip_duplicates(true);
        wf.set_skip_duplicates(false);
        assert!(!wf.skip_duplicates());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_selection_clears_reports() {
        let (mut wf, _, _) = workflow(StubBackend {
            validation: Some(report(1, 0)),
            import: Some(imported(1)),
            ..Default::default()
        });
        wf.select_files(vec![csv()]).unwrap();
        wf.validate().await.unwrap();
        wf.import().await.unwrap();
        assert_eq!(wf.state(), WorkflowState::Imported);

        wf.select_files(vec![csv()]).unwrap();
        assert_eq!(wf.state(), WorkflowState::FileSelected);
        assert!(wf.validation().is_none());
        assert!(wf.import_result().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_validate_not_allowed_after_import() {
        let (mut wf, _, _) = workflow(StubBackend {
            validation: Some(report(1, 0)),
            import: Some(imported(1)),
            ..Default::default()
        });
        wf.select_files(vec![csv()]).unwrap();
        wf.validate().await.unwrap();
        wf.import().await.unwrap();
        assert!(matches!(
            wf.validate().await,
            Err(WorkflowError::InvalidState { state: WorkflowState::Imported, .. })
        ));
    }

    #[tokio::test]
    async fn test_busy_flag_blocks_reentry() {
        let flag = BusyFlag::default();
        let guard = flag.try_acquire().expect("first acquire");
        assert!(flag.is_set());
        assert!(flag.try_acquire().is_none());
        drop(guard);
        assert!(!flag.is_set());
        assert!(flag.try_acquire().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_ticker_caps_at_ninety() {
        let progress = Arc::new(AtomicU8::new(0));
        let ticker = spawn_progress_ticker(progress.clone());
        tokio::time::sleep(PROGRESS_TICK * 3 + Duration::from_millis(10)).await;
        assert_eq!(progress.load(Ordering::Relaxed), 30);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(progress.load(Ordering::Relaxed), PROGRESS_CAP);
        ticker.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_import_stops_progress() {
        let (mut wf, _, _) = workflow(StubBackend {
            validation: Some(report(2, 0)),
            import: Some(imported(2)),
            ..Default::default()
        });
        wf.select_files(vec![csv()]).unwrap();
        wf.validate().await.unwrap();

        let cancelled = tokio::time::timeout(Duration::from_millis(650), wf.import()).await;
        assert!(cancelled.is_err());
        assert_eq!(wf.state(), WorkflowState::Validated);
        assert!(!wf.is_importing());
        assert_eq!(wf.progress(), 0);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(wf.progress(), 0);
        assert!(wf.import_result().is_none());
    }

    #[tokio::test]
    async fn test_template_download_saves_file() {
        let dir = tempfile::tempdir().unwrap();
        let (wf, _, log) = workflow(StubBackend {
            template: Some(Bytes::from_static(b"firstName,lastName\n")),
            ..Default::default()
        });
        let path = wf.download_template(dir.path()).await.unwrap();
        assert!(path.ends_with(TEMPLATE_FILE_NAME));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"firstName,lastName\n");
        assert_eq!(log.last().unwrap().title, "Template downloaded");
    }

    #[tokio::test]
    async fn test_template_download_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let (wf, _, log) = workflow(StubBackend::default());
        assert!(wf.download_template(dir.path()).await.is_none());
        assert_eq!(log.last().unwrap().title, "Download failed");
    }
}
