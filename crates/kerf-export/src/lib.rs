//! kerf-export: Pure format serializers (sans-IO)
//!
//! Converts piece outlines and connectors into output formats.
//! Currently supports SVG.

pub mod svg;

pub use svg::{SvgMetadata, SvgRenderer, build_path_data, to_svg};

/// Errors that can occur while serializing pieces.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExportError {
    /// A piece or connector has a NaN or infinite coordinate.
    #[error("{kind} {id} has a non-finite coordinate")]
    NonFiniteCoordinate {
        /// What kind of geometry failed (`piece` or `connector`).
        kind: &'static str,
        /// Id of the offending geometry.
        id: u64,
    },
}
