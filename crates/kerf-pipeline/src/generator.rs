//! Long-lived pipeline runner for background contexts.
//!
//! A [`Generator`] answers [`GenerateRequest`]s with [`GenerateResponse`]s
//! and never fails outright: every [`PipelineError`](crate::PipelineError) becomes an error
//! outcome carrying the originating request id. It keeps the morphology
//! engine (and with it the seed-keyed noise generator) alive between
//! runs.

use crate::diagnostics::WebClock;
use crate::morphology::MorphologyEngine;
use crate::protocol::{GenerateRequest, GenerateResponse};
use crate::types::{Dimensions, LineSegment, PipelineConfig, Polygon};

/// Downstream markup templater fed the final pieces and the
/// pass-through connectors.
pub trait MarkupRenderer {
    /// Render markup for one finished run.
    ///
    /// # Errors
    ///
    /// Returns a display message when the markup cannot be produced.
    fn render(
        &self,
        pieces: &[Polygon],
        connectors: &[LineSegment],
        canvas: Dimensions,
    ) -> Result<String, String>;
}

/// Pipeline instance answering generation requests.
pub struct Generator {
    config: PipelineConfig,
    morphology: MorphologyEngine,
    renderer: Option<Box<dyn MarkupRenderer + Send>>,
}

impl Generator {
    /// Generator without a markup renderer.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        let morphology = MorphologyEngine::new(config.noise_frequency);
        Self {
            config,
            morphology,
            renderer: None,
        }
    }

    /// Attach a renderer whose markup accompanies every successful
    /// response.
    #[must_use]
    pub fn with_renderer(mut self, renderer: impl MarkupRenderer + Send + 'static) -> Self {
        self.renderer = Some(Box::new(renderer));
        self
    }

    /// Pipeline settings in use.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline for `request`.
    pub fn generate(&mut self, request: &GenerateRequest) -> GenerateResponse {
        let (staged, diagnostics) =
            match crate::run(request, &self.config, &mut self.morphology, &WebClock) {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(id = request.id, error = %e, "generation failed");
                    return GenerateResponse::error(request.id, e.to_string());
                }
            };

        tracing::debug!(
            id = request.id,
            pieces = staged.pieces.len(),
            elapsed_ms = diagnostics.total_duration.as_secs_f64() * 1000.0,
            "generated pieces"
        );

        let markup = self.renderer.as_ref().and_then(|renderer| {
            renderer
                .render(&staged.pieces, &request.connectors, staged.dimensions)
                .inspect_err(|e| tracing::warn!(id = request.id, error = %e, "markup failed"))
                .ok()
        });

        GenerateResponse::pieces(request.id, staged.pieces, markup)
    }
}

impl std::fmt::Debug for Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generator")
            .field("config", &self.config)
            .field("renderer", &self.renderer.is_some())
            .finish_non_exhaustive()
    }
}
