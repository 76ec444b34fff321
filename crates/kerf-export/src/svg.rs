//! SVG export serializer.
//!
//! Converts piece outlines and connectors into an SVG string using the
//! [`svg`] crate for document construction, XML escaping, and path data
//! formatting.
//!
//! Each piece becomes a closed `<path>` (`M`, `L`, `z`) in the cut layer.
//! Each connector becomes a `<line>` in the connector layer, carrying its
//! label as a `<title>` so viewers show it on hover.
//!
//! Optional [`SvgMetadata`] embeds `<title>` and `<desc>` elements for
//! accessibility and to help file managers identify exported files.
//!
//! This is a pure function with no I/O -- it returns a `String`.

use svg::Document;
use svg::node::Text;
use svg::node::element::path::Data;
use svg::node::element::{Description, Group, Line, Path, Title};
use svg::node::Value;

use kerf_pipeline::{Dimensions, LineSegment, MarkupRenderer, Polygon};

use crate::ExportError;

/// Stroke width of cut outlines, in canvas units.
const CUT_STROKE_WIDTH: f64 = 0.5;
/// Stroke width of connector lines, in canvas units.
const CONNECTOR_STROKE_WIDTH: f64 = 1.5;

/// Metadata to embed in the SVG document.
///
/// Both fields are optional. When present, a `<title>` and/or `<desc>`
/// element is emitted immediately after the opening `<svg>` tag.
///
/// Text values are XML-escaped automatically by the `svg` crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, emitted as `<title>`.
    pub title: Option<&'a str>,

    /// Document description, emitted as `<desc>`.
    ///
    /// Typically the shape parameters so exported files are
    /// distinguishable.
    pub description: Option<&'a str>,
}

/// Build an SVG path `d` attribute string for a closed piece outline.
///
/// Uses `M` for the first point, `L` for the rest and `z` to close.
/// Returns an empty string for outlines with fewer than 3 points.
///
/// # Examples
///
/// ```
/// use kerf_pipeline::{Point, Polygon};
/// use kerf_export::build_path_data;
///
/// let piece = Polygon::new(0, vec![
///     Point::new(10.0, 20.0),
///     Point::new(30.0, 20.0),
///     Point::new(30.0, 40.0),
/// ]);
/// assert_eq!(build_path_data(&piece), "M10,20 L30,20 L30,40 z");
/// ```
#[must_use]
pub fn build_path_data(piece: &Polygon) -> String {
    let Some((first, rest)) = piece.points.split_first() else {
        return String::new();
    };
    if rest.len() < 2 {
        return String::new();
    }

    let mut data = Data::new().move_to((first.x, first.y));
    for p in rest {
        data = data.line_to((p.x, p.y));
    }
    String::from(Value::from(data.close()))
}

/// Serialize pieces and connectors to an SVG document.
///
/// The `viewBox` matches the canvas, so coordinates are emitted as-is.
/// Pieces with fewer than 3 points are skipped.
///
/// # Errors
///
/// Returns [`ExportError::NonFiniteCoordinate`] if any piece or
/// connector has a NaN or infinite coordinate.
pub fn to_svg(
    pieces: &[Polygon],
    connectors: &[LineSegment],
    dimensions: Dimensions,
    metadata: &SvgMetadata<'_>,
) -> Result<String, ExportError> {
    let Dimensions { width, height } = dimensions;
    let mut doc = Document::new()
        .set("width", width)
        .set("height", height)
        .set("viewBox", (0, 0, width, height));

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }

    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }

    let mut cut = Group::new()
        .set("id", "pieces")
        .set("fill", "none")
        .set("stroke", "black")
        .set("stroke-width", CUT_STROKE_WIDTH);
    for piece in pieces {
        if !piece.points.iter().all(|p| p.is_finite()) {
            return Err(ExportError::NonFiniteCoordinate {
                kind: "piece",
                id: piece.id,
            });
        }
        let d = build_path_data(piece);
        if d.is_empty() {
            continue;
        }
        cut = cut.add(Path::new().set("id", format!("piece-{}", piece.id)).set("d", d));
    }
    doc = doc.add(cut);

    if !connectors.is_empty() {
        let mut links = Group::new()
            .set("id", "connectors")
            .set("stroke", "red")
            .set("stroke-width", CONNECTOR_STROKE_WIDTH)
            .set("stroke-linecap", "round");
        for connector in connectors {
            links = links.add(connector_line(connector)?);
        }
        doc = doc.add(links);
    }

    // The svg crate omits the XML declaration, so we prepend it.
    Ok(format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n"
    ))
}

fn connector_line(connector: &LineSegment) -> Result<Line, ExportError> {
    if !connector.start.is_finite() || !connector.end.is_finite() {
        return Err(ExportError::NonFiniteCoordinate {
            kind: "connector",
            id: connector.id.0,
        });
    }
    let mut line = Line::new()
        .set("x1", connector.start.x)
        .set("y1", connector.start.y)
        .set("x2", connector.end.x)
        .set("y2", connector.end.y);
    if let Some(label) = &connector.label {
        line = line.add(Title::new(label.as_str()));
    }
    Ok(line)
}

/// [`MarkupRenderer`] producing SVG via [`to_svg`].
#[derive(Debug, Clone, Default)]
pub struct SvgRenderer {
    title: Option<String>,
}

impl SvgRenderer {
    /// Renderer without a document title.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Renderer embedding `title` in every document.
    #[must_use]
    pub fn with_title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
        }
    }
}

impl MarkupRenderer for SvgRenderer {
    fn render(
        &self,
        pieces: &[Polygon],
        connectors: &[LineSegment],
        canvas: Dimensions,
    ) -> Result<String, String> {
        let metadata = SvgMetadata {
            title: self.title.as_deref(),
            description: None,
        };
        to_svg(pieces, connectors, canvas, &metadata).map_err(|e| e.to_string())
    }
}
