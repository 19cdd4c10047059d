use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::api::{InvokeError, InvokeResponse};
use crate::controller::{RequestLifecycleController, RequestState, Submission};
use crate::models::ImageRecord;
use crate::storage::ImageStore;

/// What the result pane shows for the last successful generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedImage {
    pub path: PathBuf,
    pub size_bytes: usize,
    pub dimensions: Option<(u32, u32)>,
}

pub struct App {
    pub should_quit: bool,
    pub show_help: bool,
    pub show_info: bool,
    pub exit_pending: bool,
    pub region: String,
    pub controller: RequestLifecycleController,
    pub store: Option<ImageStore>,
    pub saved_image: Option<SavedImage>,
    /// Non-fatal message shown under the result, e.g. a failed save
    pub notice: Option<String>,
    pub saved_count: usize,
    /// Most recently saved record, kept in memory for the info popup
    pub latest_record: Option<ImageRecord>,

    // Latency tracking
    pub request_started: Option<Instant>,
    pub last_latency: Option<Duration>,
}

impl App {
    pub fn new(controller: RequestLifecycleController, region: String, store: Option<ImageStore>) -> Self {
        let records = store
            .as_ref()
            .and_then(|s| s.list_records().ok())
            .unwrap_or_default();
        let saved_count = records.len();
        let latest_record = records.into_iter().next();

        Self {
            should_quit: false,
            show_help: false,
            show_info: false,
            exit_pending: false,
            region,
            controller,
            store,
            saved_image: None,
            notice: None,
            saved_count,
            latest_record,
            request_started: None,
            last_latency: None,
        }
    }

    pub const fn quit(&mut self) {
        self.should_quit = true;
    }

    pub const fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub const fn toggle_info(&mut self) {
        self.show_info = !self.show_info;
    }

    pub fn push_char(&mut self, c: char) {
        self.controller.push_char(c);
    }

    pub fn pop_char(&mut self) {
        self.controller.pop_char();
        if self.controller.artifact().is_none() {
            self.saved_image = None;
        }
    }

    pub fn clear_prompt(&mut self) {
        self.controller.set_prompt("");
        self.saved_image = None;
    }

    /// Start a generation unless one is already running
    pub fn begin_generation(&mut self) -> Option<Submission> {
        let submission = self.controller.begin_submission()?;
        self.saved_image = None;
        self.notice = None;
        self.request_started = Some(Instant::now());
        Some(submission)
    }

    pub fn finish_generation(&mut self, id: u64, result: Result<InvokeResponse, InvokeError>) {
        let was_in_flight = self.controller.is_in_flight();
        let state = self.controller.settle(id, result).clone();
        if !was_in_flight || state == RequestState::InFlight {
            return;
        }

        if let Some(started) = self.request_started.take() {
            self.last_latency = Some(started.elapsed());
        }

        if state == RequestState::Succeeded {
            self.save_artifact();
        }
    }

    fn save_artifact(&mut self) {
        let (Some(store), Some(image)) = (&self.store, self.controller.artifact()) else {
            return;
        };

        match store.save(
            image,
            self.controller.submitted_prompt(),
            self.controller.model_id(),
            self.controller.params(),
        ) {
            Ok(record) => {
                self.saved_image = Some(SavedImage {
                    path: store.image_path(&record.id),
                    size_bytes: record.size_bytes,
                    dimensions: image.png_dimensions(),
                });
                self.saved_count += 1;
                self.latest_record = Some(record);
            }
            Err(e) => {
                log::warn!("Failed to save generated image: {e:#}");
                self.notice = Some(format!("Could not save image: {e}"));
            }
        }
    }
}
