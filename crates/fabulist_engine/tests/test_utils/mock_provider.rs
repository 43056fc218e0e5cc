//! Scripted generation provider for testing.

use async_trait::async_trait;
use fabulist_error::{FabulistResult, ProviderError, ProviderErrorKind};
use fabulist_interface::{GenerationProvider, GenerationRequest};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A single scripted answer.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Text output
    Text(String),
    /// Image locations
    Images(Vec<String>),
    /// The call fails
    Error(ProviderErrorKind),
    /// Wait, then answer
    Delayed(Duration, Box<MockResponse>),
}

/// Mock provider answering from two queues, one per call kind.
///
/// An exhausted text queue fails the call; an exhausted image queue answers
/// with the default images, if set.
#[derive(Debug, Default)]
pub struct MockProvider {
    text: Mutex<VecDeque<MockResponse>>,
    images: Mutex<VecDeque<MockResponse>>,
    default_images: Option<Vec<String>>,
    text_calls: AtomicUsize,
    image_calls: AtomicUsize,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a text answer.
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.text
            .lock()
            .unwrap()
            .push_back(MockResponse::Text(text.into()));
        self
    }

    /// Queue a text answer that arrives after `delay`.
    pub fn with_delayed_text(self, delay: Duration, text: impl Into<String>) -> Self {
        self.text.lock().unwrap().push_back(MockResponse::Delayed(
            delay,
            Box::new(MockResponse::Text(text.into())),
        ));
        self
    }

    /// Queue a failing text call.
    pub fn with_text_error(self, error: ProviderErrorKind) -> Self {
        self.text
            .lock()
            .unwrap()
            .push_back(MockResponse::Error(error));
        self
    }

    /// Queue an image answer.
    pub fn with_images(self, urls: &[&str]) -> Self {
        self.images.lock().unwrap().push_back(MockResponse::Images(
            urls.iter().map(|url| url.to_string()).collect(),
        ));
        self
    }

    /// Queue a failing image call.
    pub fn with_image_error(self, error: ProviderErrorKind) -> Self {
        self.images
            .lock()
            .unwrap()
            .push_back(MockResponse::Error(error));
        self
    }

    /// Answer image calls with `urls` once the queue runs dry.
    pub fn with_default_images(mut self, urls: &[&str]) -> Self {
        self.default_images = Some(urls.iter().map(|url| url.to_string()).collect());
        self
    }

    pub fn text_calls(&self) -> usize {
        self.text_calls.load(Ordering::SeqCst)
    }

    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }

    /// Every request received, in arrival order.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn exhausted(kind: &str) -> ProviderError {
        ProviderError::new(ProviderErrorKind::Request(format!(
            "mock {} queue exhausted",
            kind
        )))
    }
}

async fn resolve(response: MockResponse) -> MockResponse {
    let mut response = response;
    while let MockResponse::Delayed(delay, inner) = response {
        tokio::time::sleep(delay).await;
        response = *inner;
    }
    response
}

#[async_trait]
impl GenerationProvider for MockProvider {
    async fn generate_text(&self, request: &GenerationRequest) -> FabulistResult<String> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let next = self.text.lock().unwrap().pop_front();
        let Some(next) = next else {
            return Err(Self::exhausted("text").into());
        };
        match resolve(next).await {
            MockResponse::Text(text) => Ok(text),
            MockResponse::Error(kind) => Err(ProviderError::new(kind).into()),
            other => Err(ProviderError::new(ProviderErrorKind::Malformed(format!(
                "expected text, scripted {:?}",
                other
            )))
            .into()),
        }
    }

    async fn generate_images(&self, request: &GenerationRequest) -> FabulistResult<Vec<String>> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let next = self.images.lock().unwrap().pop_front();
        let next = match (next, &self.default_images) {
            (Some(next), _) => next,
            (None, Some(urls)) => MockResponse::Images(urls.clone()),
            (None, None) => return Err(Self::exhausted("image").into()),
        };
        match resolve(next).await {
            MockResponse::Images(urls) => Ok(urls),
            MockResponse::Error(kind) => Err(ProviderError::new(kind).into()),
            other => Err(ProviderError::new(ProviderErrorKind::Malformed(format!(
                "expected images, scripted {:?}",
                other
            )))
            .into()),
        }
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}
