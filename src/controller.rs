//! Single-flight request lifecycle for image generation.
//!
//! The controller owns the prompt, the request state and the last generated
//! image. At most one invocation is outstanding at a time: a submission made
//! while another is in flight is rejected without touching the collaborator.

use std::sync::Arc;

use crate::api::{ImageInvoker, InvokeError, InvokeRequest, InvokeResponse};
use crate::error::GenerateError;
use crate::models::{GeneratedImage, GenerationParams};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    InFlight,
    Succeeded,
    Failed(String),
}

/// An accepted submission, ready to run on any task.
pub struct Submission {
    id: u64,
    invoker: Arc<dyn ImageInvoker>,
    request: InvokeRequest,
}

impl Submission {
    pub const fn id(&self) -> u64 {
        self.id
    }

    pub async fn run(self) -> Result<InvokeResponse, InvokeError> {
        self.invoker.invoke(&self.request).await
    }
}

pub struct RequestLifecycleController {
    invoker: Arc<dyn ImageInvoker>,
    model_id: String,
    params: GenerationParams,
    prompt: String,
    /// Prompt of the latest accepted submission, unaffected by later edits
    submitted_prompt: String,
    state: RequestState,
    artifact: Option<GeneratedImage>,
    next_id: u64,
    outstanding: Option<u64>,
}

impl RequestLifecycleController {
    pub fn new(invoker: Arc<dyn ImageInvoker>, model_id: String, params: GenerationParams) -> Self {
        Self {
            invoker,
            model_id,
            params,
            prompt: String::new(),
            submitted_prompt: String::new(),
            state: RequestState::Idle,
            artifact: None,
            next_id: 0,
            outstanding: None,
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn submitted_prompt(&self) -> &str {
        &self.submitted_prompt
    }

    pub const fn state(&self) -> &RequestState {
        &self.state
    }

    pub const fn artifact(&self) -> Option<&GeneratedImage> {
        self.artifact.as_ref()
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub const fn params(&self) -> &GenerationParams {
        &self.params
    }

    pub fn backend_name(&self) -> &str {
        self.invoker.backend_name()
    }

    pub const fn is_in_flight(&self) -> bool {
        matches!(self.state, RequestState::InFlight)
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            RequestState::Failed(message) => Some(message),
            _ => None,
        }
    }

    pub fn set_prompt(&mut self, text: impl Into<String>) {
        self.prompt = text.into();
        // Never show a stale image against an empty prompt
        if self.prompt.is_empty() {
            self.artifact = None;
        }
    }

    pub fn push_char(&mut self, c: char) {
        let mut text = std::mem::take(&mut self.prompt);
        text.push(c);
        self.set_prompt(text);
    }

    pub fn pop_char(&mut self) {
        let mut text = std::mem::take(&mut self.prompt);
        text.pop();
        self.set_prompt(text);
    }

    /// Accept a new submission, or return `None` while one is in flight.
    pub fn begin_submission(&mut self) -> Option<Submission> {
        if self.is_in_flight() {
            log::debug!("Submission rejected: request {:?} still in flight", self.outstanding);
            return None;
        }

        self.artifact = None;
        self.next_id += 1;
        let id = self.next_id;

        let request = match InvokeRequest::text_to_image(&self.model_id, &self.prompt, &self.params) {
            Ok(request) => request,
            Err(e) => {
                self.state = RequestState::Failed(e.to_string());
                return None;
            }
        };

        self.state = RequestState::InFlight;
        self.outstanding = Some(id);
        self.submitted_prompt.clone_from(&self.prompt);
        log::info!(
            "Submitting request {id} to {} ({} chars)",
            self.model_id,
            self.prompt.chars().count()
        );

        Some(Submission {
            id,
            invoker: Arc::clone(&self.invoker),
            request,
        })
    }

    /// Apply the outcome of submission `id`. Outcomes for anything other than
    /// the outstanding submission are dropped.
    pub fn settle(&mut self, id: u64, result: Result<InvokeResponse, InvokeError>) -> &RequestState {
        if self.outstanding != Some(id) {
            log::warn!("Ignoring result for request {id}, outstanding is {:?}", self.outstanding);
            return &self.state;
        }
        self.outstanding = None;

        let outcome = result
            .map_err(|e| GenerateError::Service(e.message))
            .and_then(|response| response.first_image());

        match outcome {
            Ok(base64) => {
                log::info!("Request {id} succeeded ({} base64 chars)", base64.len());
                self.artifact = Some(GeneratedImage::new(base64));
                self.state = RequestState::Succeeded;
            }
            Err(e) => {
                log::warn!("Request {id} failed: {e}");
                self.state = RequestState::Failed(e.to_string());
            }
        }

        &self.state
    }

    /// Run one full lifecycle against the collaborator. A no-op while in flight.
    pub async fn submit(&mut self) -> &RequestState {
        let Some(submission) = self.begin_submission() else {
            return &self.state;
        };
        let id = submission.id();
        let result = submission.run().await;
        self.settle(id, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockImageInvoker;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::{oneshot, Mutex};
    use tokio_test::{assert_pending, assert_ready};

    fn images(body: &str) -> Result<InvokeResponse, InvokeError> {
        Ok(InvokeResponse {
            body: body.as_bytes().to_vec(),
        })
    }

    fn controller_with(invoker: impl ImageInvoker + 'static) -> RequestLifecycleController {
        RequestLifecycleController::new(
            Arc::new(invoker),
            "amazon.titan-image-generator-v1".to_string(),
            GenerationParams::default(),
        )
    }

    /// Counts calls and answers with a fixed result
    struct CountingInvoker {
        calls: AtomicUsize,
        reply: Result<InvokeResponse, InvokeError>,
    }

    impl CountingInvoker {
        fn new(reply: Result<InvokeResponse, InvokeError>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                reply,
            }
        }
    }

    #[async_trait]
    impl ImageInvoker for Arc<CountingInvoker> {
        async fn invoke(&self, _request: &InvokeRequest) -> Result<InvokeResponse, InvokeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }

    /// Holds every call open until the test sends a reply
    struct GatedInvoker {
        gate: Mutex<Option<oneshot::Receiver<Result<InvokeResponse, InvokeError>>>>,
    }

    #[async_trait]
    impl ImageInvoker for GatedInvoker {
        async fn invoke(&self, _request: &InvokeRequest) -> Result<InvokeResponse, InvokeError> {
            let rx = self.gate.lock().await.take().expect("invoked more than once");
            rx.await.unwrap_or_else(|_| Err(InvokeError::new("gate dropped")))
        }
    }

    #[test]
    fn test_new_controller_is_idle() {
        let controller = controller_with(MockImageInvoker::new());
        assert_eq!(controller.state(), &RequestState::Idle);
        assert!(controller.artifact().is_none());
        assert_eq!(controller.prompt(), "");
    }

    #[tokio::test]
    async fn test_submit_success_stores_first_image() {
        let mut mock = MockImageInvoker::new();
        mock.expect_invoke()
            .times(1)
            .returning(|_| images(r#"{"images":["QUJD"]}"#));
        let mut controller = controller_with(mock);
        controller.set_prompt("a red fox");

        let state = controller.submit().await;
        assert_eq!(state, &RequestState::Succeeded);
        assert_eq!(controller.artifact().unwrap().base64, "QUJD");
        assert_eq!(controller.artifact().unwrap().bytes().unwrap(), b"ABC");
    }

    #[tokio::test]
    async fn test_submit_sends_prompt_in_body() {
        let mut mock = MockImageInvoker::new();
        mock.expect_invoke()
            .withf(|request| {
                let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
                request.model_id == "amazon.titan-image-generator-v1"
                    && body["textToImageParams"]["text"] == "a red fox"
            })
            .times(1)
            .returning(|_| images(r#"{"images":["QUJD"]}"#));
        let mut controller = controller_with(mock);
        controller.set_prompt("a red fox");

        controller.submit().await;
    }

    #[tokio::test]
    async fn test_submit_failure_then_retry_clears_error() {
        let mut mock = MockImageInvoker::new();
        let mut seq = mockall::Sequence::new();
        mock.expect_invoke()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(InvokeError::new("timeout")));
        mock.expect_invoke()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| images(r#"{"images":["QUJD"]}"#));
        let mut controller = controller_with(mock);

        let state = controller.submit().await;
        assert_eq!(state, &RequestState::Failed("timeout".to_string()));
        assert_eq!(controller.error(), Some("timeout"));

        let submission = controller.begin_submission().unwrap();
        assert_eq!(controller.error(), None);
        assert!(controller.is_in_flight());

        let id = submission.id();
        let result = submission.run().await;
        assert_eq!(controller.settle(id, result), &RequestState::Succeeded);
    }

    #[tokio::test]
    async fn test_submit_empty_images_is_malformed() {
        let mut mock = MockImageInvoker::new();
        mock.expect_invoke()
            .times(1)
            .returning(|_| images(r#"{"images":[]}"#));
        let mut controller = controller_with(mock);

        let state = controller.submit().await.clone();
        let expected = GenerateError::MalformedResponse("no images returned".to_string());
        assert_eq!(state, RequestState::Failed(expected.to_string()));
        assert!(controller.artifact().is_none());
    }

    #[tokio::test]
    async fn test_empty_prompt_is_still_submitted() {
        let mut mock = MockImageInvoker::new();
        mock.expect_invoke()
            .times(1)
            .returning(|_| Err(InvokeError::new("text must not be empty")));
        let mut controller = controller_with(mock);

        let state = controller.submit().await;
        assert_eq!(state, &RequestState::Failed("text must not be empty".to_string()));
    }

    #[test]
    fn test_set_prompt_empty_clears_artifact() {
        let mut controller = controller_with(MockImageInvoker::new());
        controller.artifact = Some(GeneratedImage::new("QUJD".to_string()));
        controller.state = RequestState::Succeeded;

        controller.set_prompt("a red fox");
        assert!(controller.artifact().is_some());

        controller.set_prompt("");
        assert!(controller.artifact().is_none());
        assert_eq!(controller.state(), &RequestState::Succeeded);
    }

    #[test]
    fn test_any_edit_sequence_ending_empty_clears_artifact() {
        let sequences: [&[&str]; 4] = [
            &[""],
            &["a", ""],
            &["a red fox", "a red", "", "x", ""],
            &["", "", ""],
        ];

        for sequence in sequences {
            let mut controller = controller_with(MockImageInvoker::new());
            controller.artifact = Some(GeneratedImage::new("QUJD".to_string()));
            for text in sequence {
                controller.set_prompt(*text);
            }
            assert!(controller.artifact().is_none(), "sequence {sequence:?}");
        }
    }

    #[test]
    fn test_pop_char_to_empty_clears_artifact() {
        let mut controller = controller_with(MockImageInvoker::new());
        controller.push_char('a');
        controller.artifact = Some(GeneratedImage::new("QUJD".to_string()));

        controller.pop_char();
        assert_eq!(controller.prompt(), "");
        assert!(controller.artifact().is_none());
    }

    #[test]
    fn test_resubmit_while_in_flight_is_rejected() {
        let mut controller = controller_with(MockImageInvoker::new());

        let first = controller.begin_submission();
        assert!(first.is_some());
        assert!(controller.is_in_flight());

        for _ in 0..5 {
            assert!(controller.begin_submission().is_none());
        }
        assert!(controller.is_in_flight());
    }

    #[tokio::test]
    async fn test_rapid_submissions_invoke_once() {
        let invoker = Arc::new(CountingInvoker::new(images(r#"{"images":["QUJD"]}"#)));
        let mut controller = controller_with(Arc::clone(&invoker));

        let accepted: Vec<Submission> = (0..10).filter_map(|_| controller.begin_submission()).collect();
        assert_eq!(accepted.len(), 1);

        for submission in accepted {
            let id = submission.id();
            let result = submission.run().await;
            controller.settle(id, result);
        }

        assert_eq!(invoker.calls.load(Ordering::SeqCst), 1);
        assert_eq!(controller.state(), &RequestState::Succeeded);
    }

    #[tokio::test]
    async fn test_stale_settle_is_ignored() {
        let mut mock = MockImageInvoker::new();
        mock.expect_invoke()
            .times(1)
            .returning(|_| images(r#"{"images":["QUJD"]}"#));
        let mut controller = controller_with(mock);

        let submission = controller.begin_submission().unwrap();
        let id = submission.id();

        let state = controller.settle(id + 1, Err(InvokeError::new("stray")));
        assert_eq!(state, &RequestState::InFlight);

        let result = submission.run().await;
        assert_eq!(controller.settle(id, result), &RequestState::Succeeded);

        // Settling the same id twice does nothing
        let state = controller.settle(id, Err(InvokeError::new("late")));
        assert_eq!(state, &RequestState::Succeeded);
    }

    #[tokio::test]
    async fn test_submitted_prompt_survives_edits_in_flight() {
        let mut mock = MockImageInvoker::new();
        mock.expect_invoke()
            .times(1)
            .returning(|_| images(r#"{"images":["QUJD"]}"#));
        let mut controller = controller_with(mock);
        controller.set_prompt("a red fox");

        let submission = controller.begin_submission().unwrap();
        controller.set_prompt("a red cat");
        let id = submission.id();
        let result = submission.run().await;
        controller.settle(id, result);

        assert_eq!(controller.submitted_prompt(), "a red fox");
        assert_eq!(controller.prompt(), "a red cat");
    }

    #[tokio::test]
    async fn test_new_submission_clears_previous_artifact() {
        let mut mock = MockImageInvoker::new();
        mock.expect_invoke()
            .times(1)
            .returning(|_| images(r#"{"images":["QUJD"]}"#));
        let mut controller = controller_with(mock);
        controller.set_prompt("a red fox");
        controller.submit().await;
        assert!(controller.artifact().is_some());

        let _submission = controller.begin_submission().unwrap();
        assert!(controller.artifact().is_none());
    }

    #[tokio::test]
    async fn test_in_flight_until_collaborator_resolves() {
        let (tx, rx) = oneshot::channel();
        let invoker = GatedInvoker {
            gate: Mutex::new(Some(rx)),
        };
        let mut controller = controller_with(invoker);
        controller.set_prompt("a red fox");

        let submission = controller.begin_submission().unwrap();
        let id = submission.id();
        assert_eq!(controller.state(), &RequestState::InFlight);

        let mut running = tokio_test::task::spawn(submission.run());
        assert_pending!(running.poll());

        // Editing the prompt does not disturb the outstanding request
        controller.set_prompt("");
        assert!(controller.is_in_flight());
        assert!(controller.begin_submission().is_none());

        tx.send(images(r#"{"images":["QUJD"]}"#)).unwrap();
        assert!(running.is_woken());
        let result = assert_ready!(running.poll());

        assert_eq!(controller.settle(id, result), &RequestState::Succeeded);
        assert_eq!(controller.artifact().unwrap().base64, "QUJD");
    }

    #[tokio::test]
    async fn test_delayed_response_scenario() {
        let (tx, rx) = oneshot::channel();
        let mut controller = controller_with(GatedInvoker {
            gate: Mutex::new(Some(rx)),
        });
        controller.set_prompt("a red fox");

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx.send(images(r#"{"images":["QUJD"]}"#));
        });

        let submission = controller.begin_submission().unwrap();
        assert!(controller.is_in_flight());
        let id = submission.id();
        let handle = tokio::spawn(submission.run());
        let result = handle.await.unwrap();

        assert_eq!(controller.settle(id, result), &RequestState::Succeeded);
        assert_eq!(controller.artifact().unwrap().bytes().unwrap(), b"ABC");
    }
}
