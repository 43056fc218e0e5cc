//! The generation provider seam.

use async_trait::async_trait;
use fabulist_error::FabulistResult;
use serde::{Deserialize, Serialize};

/// A provider-ready prompt.
///
/// # Examples
///
/// ```
/// use fabulist_interface::GenerationRequest;
///
/// let request = GenerationRequest::builder()
///     .positive("A lighthouse at dusk")
///     .negative(Some("blurry".to_string()))
///     .build()
///     .unwrap();
///
/// assert_eq!(request.positive(), "A lighthouse at dusk");
/// assert_eq!(request.reference_image(), &None);
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Serialize,
    Deserialize,
    derive_builder::Builder,
    derive_getters::Getters,
)]
#[builder(setter(into))]
pub struct GenerationRequest {
    /// What to generate
    positive: String,
    /// What to avoid
    #[builder(default)]
    negative: Option<String>,
    /// Image to condition image generation on
    #[builder(default)]
    reference_image: Option<String>,
    /// Model override
    #[builder(default)]
    model: Option<String>,
}

impl GenerationRequest {
    /// Start building a request.
    pub fn builder() -> GenerationRequestBuilder {
        GenerationRequestBuilder::default()
    }

    /// A text prompt with no negative prompt.
    pub fn text(positive: impl Into<String>) -> Self {
        Self {
            positive: positive.into(),
            negative: None,
            reference_image: None,
            model: None,
        }
    }

    /// Builder method to set the negative prompt.
    pub fn with_negative(mut self, negative: Option<String>) -> Self {
        self.negative = negative;
        self
    }

    /// Builder method to set the reference image.
    pub fn with_reference_image(mut self, reference_image: Option<String>) -> Self {
        self.reference_image = reference_image;
        self
    }
}

/// External generative-AI service.
///
/// Any error is a total failure of the call. Implementations do not retry;
/// callers decide whether to start a new attempt.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Generate text for a prompt.
    async fn generate_text(&self, request: &GenerationRequest) -> FabulistResult<String>;

    /// Generate images for a prompt, returning their locations.
    ///
    /// `request.reference_image()` is forwarded when the provider supports it.
    async fn generate_images(&self, request: &GenerationRequest) -> FabulistResult<Vec<String>>;

    /// Provider name (e.g., "openai", "stability").
    fn provider_name(&self) -> &'static str;

    /// Model identifier.
    fn model_name(&self) -> &str;
}
