//! Messages exchanged with the background generator.
//!
//! Every message crossing the worker boundary is wrapped in an envelope
//! tagged with a protocol `version`, so a consumer can reject payloads it
//! does not understand instead of guessing from which optional fields
//! happen to be present. A response carries either piece polygons or an
//! error, never both.

use serde::{Deserialize, Serialize};

use crate::types::{LineSegment, MaskPolygon, PipelineError, Polygon, ShapeConfig};

/// One piece-generation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// Monotonically increasing request number assigned by the submitter.
    pub id: u64,
    /// Silhouette all pieces are clipped to.
    #[serde(default)]
    pub mask: MaskPolygon,
    /// Piece centerlines.
    #[serde(default)]
    pub spines: Vec<LineSegment>,
    /// Links between pieces, passed through to the markup renderer.
    #[serde(default)]
    pub connectors: Vec<LineSegment>,
    /// Piece styling.
    #[serde(default)]
    pub config: ShapeConfig,
    /// Spine sampling interval overriding the pipeline default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spacing: Option<f64>,
}

impl GenerateRequest {
    /// Request with an empty scene and default styling.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self {
            id,
            mask: MaskPolygon::default(),
            spines: Vec::new(),
            connectors: Vec::new(),
            config: ShapeConfig::default(),
            spacing: None,
        }
    }
}

/// Result of one job, keyed by the originating request id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// Id of the request this answers.
    pub id: u64,
    /// Pieces or failure.
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// What a finished job produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Outcome {
    /// The pipeline ran to completion.
    Pieces {
        /// Final piece outlines.
        piece_polygons: Vec<Polygon>,
        /// Markup rendered from the pieces and connectors, when a
        /// renderer is attached and succeeded.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        renderable_markup: Option<String>,
    },
    /// The pipeline failed; the message is for display only.
    Error {
        /// Human-readable failure description.
        error: String,
    },
}

impl GenerateResponse {
    /// Successful response.
    #[must_use]
    pub const fn pieces(id: u64, piece_polygons: Vec<Polygon>, markup: Option<String>) -> Self {
        Self {
            id,
            outcome: Outcome::Pieces {
                piece_polygons,
                renderable_markup: markup,
            },
        }
    }

    /// Failed response.
    #[must_use]
    pub fn error(id: u64, error: impl Into<String>) -> Self {
        Self {
            id,
            outcome: Outcome::Error {
                error: error.into(),
            },
        }
    }

    /// Piece outlines, if the job succeeded.
    #[must_use]
    pub fn piece_polygons(&self) -> Option<&[Polygon]> {
        match &self.outcome {
            Outcome::Pieces { piece_polygons, .. } => Some(piece_polygons),
            Outcome::Error { .. } => None,
        }
    }

    /// Whether the job failed.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::Error { .. })
    }
}

/// Versioned wrapper for requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "version")]
pub enum RequestEnvelope {
    /// Protocol version 1.
    #[serde(rename = "1")]
    V1(GenerateRequest),
}

/// Versioned wrapper for responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "version")]
pub enum ResponseEnvelope {
    /// Protocol version 1.
    #[serde(rename = "1")]
    V1(GenerateResponse),
}

/// Serialize a request for the worker boundary.
///
/// # Errors
///
/// Returns [`PipelineError::Protocol`] if serialization fails.
pub fn encode_request(request: &GenerateRequest) -> Result<String, PipelineError> {
    serde_json::to_string(&RequestEnvelope::V1(request.clone()))
        .map_err(|e| PipelineError::Protocol(e.to_string()))
}

/// Parse a request received across the worker boundary.
///
/// # Errors
///
/// Returns [`PipelineError::Protocol`] for malformed JSON or an
/// unknown protocol version.
pub fn decode_request(json: &str) -> Result<GenerateRequest, PipelineError> {
    let RequestEnvelope::V1(request) =
        serde_json::from_str(json).map_err(|e| PipelineError::Protocol(e.to_string()))?;
    Ok(request)
}

/// Serialize a response for the worker boundary.
///
/// # Errors
///
/// Returns [`PipelineError::Protocol`] if serialization fails.
pub fn encode_response(response: &GenerateResponse) -> Result<String, PipelineError> {
    serde_json::to_string(&ResponseEnvelope::V1(response.clone()))
        .map_err(|e| PipelineError::Protocol(e.to_string()))
}

/// Parse a response received across the worker boundary.
///
/// # Errors
///
/// Returns [`PipelineError::Protocol`] for malformed JSON or an
/// unknown protocol version.
pub fn decode_response(json: &str) -> Result<GenerateResponse, PipelineError> {
    let ResponseEnvelope::V1(response) =
        serde_json::from_str(json).map_err(|e| PipelineError::Protocol(e.to_string()))?;
    Ok(response)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Point;

    #[test]
    fn request_wire_format() {
        let json = r#"{
            "version": "1",
            "id": 7,
            "mask": [{"x": 0, "y": 0}, {"x": 10, "y": 0}, {"x": 10, "y": 10}],
            "spines": [{"id": 3, "start": {"x": 1, "y": 1}, "end": {"x": 8, "y": 8}}],
            "connectors": [{"id": 4, "start": {"x": 1, "y": 1}, "end": {"x": 2, "y": 2},
                            "label": "pin", "mode": "hinge"}],
            "config": {"gap": 2, "round": 1, "noiseAmplitude": 0.5, "noiseSeed": 42},
            "spacing": 5
        }"#;
        let request = decode_request(json).unwrap();
        assert_eq!(request.id, 7);
        assert_eq!(request.mask.points().len(), 3);
        assert_eq!(request.spines[0].end, Point::new(8.0, 8.0));
        assert_eq!(request.connectors[0].label.as_deref(), Some("pin"));
        assert_eq!(request.config.noise_seed, 42);
        assert_eq!(request.spacing, Some(5.0));
    }

    #[test]
    fn missing_scene_fields_default() {
        let request = decode_request(r#"{"version": "1", "id": 1}"#).unwrap();
        assert_eq!(request, GenerateRequest::new(1));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let err = decode_request(r#"{"version": "2", "id": 1}"#).unwrap_err();
        assert!(matches!(err, PipelineError::Protocol(_)));
    }

    #[test]
    fn unversioned_message_is_rejected() {
        assert!(decode_request(r#"{"id": 1}"#).is_err());
    }

    #[test]
    fn success_response_wire_format() {
        let response = GenerateResponse::pieces(
            9,
            vec![Polygon::new(
                0,
                vec![
                    Point::new(0.0, 0.0),
                    Point::new(1.0, 0.0),
                    Point::new(0.0, 1.0),
                ],
            )],
            None,
        );
        let value: serde_json::Value =
            serde_json::from_str(&encode_response(&response).unwrap()).unwrap();
        assert_eq!(value["version"], "1");
        assert_eq!(value["id"], 9);
        assert_eq!(value["status"], "pieces");
        assert_eq!(value["piecePolygons"][0]["points"][1]["x"], 1.0);
        assert!(value.get("renderableMarkup").is_none());
        assert!(value.get("error").is_none());
    }

    #[test]
    fn error_response_round_trips() {
        let response = GenerateResponse::error(4, "boom");
        let json = encode_response(&response).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["error"], "boom");
        assert!(value.get("piecePolygons").is_none());

        let back = decode_response(&json).unwrap();
        assert!(back.is_error());
        assert_eq!(back.piece_polygons(), None);
        assert_eq!(back, response);
    }

    #[test]
    fn request_encodes_with_version() {
        let json = encode_request(&GenerateRequest::new(3)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["version"], "1");
        assert!(value.get("spacing").is_none());
        assert_eq!(decode_request(&json).unwrap().id, 3);
    }
}
