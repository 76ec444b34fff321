//! Integration test: run a small scene through the full pipeline and export to SVG.

#![allow(clippy::unwrap_used)]

use kerf_export::{SvgMetadata, SvgRenderer, to_svg};
use kerf_pipeline::{
    Dimensions, GenerateRequest, Generator, LineSegment, MaskPolygon, Outcome, PipelineConfig,
    Point, process,
};

fn scene() -> GenerateRequest {
    let mut connector = LineSegment::new(10, Point::new(60.0, 80.0), Point::new(140.0, 80.0));
    connector.label = Some("hinge".to_owned());
    GenerateRequest {
        mask: MaskPolygon::new(vec![
            Point::new(20.0, 20.0),
            Point::new(180.0, 20.0),
            Point::new(180.0, 140.0),
            Point::new(20.0, 140.0),
        ]),
        spines: vec![
            LineSegment::new(1, Point::new(60.0, 40.0), Point::new(60.0, 120.0)),
            LineSegment::new(2, Point::new(140.0, 40.0), Point::new(140.0, 120.0)),
        ],
        connectors: vec![connector],
        ..GenerateRequest::new(1)
    }
}

fn config() -> PipelineConfig {
    PipelineConfig {
        canvas: Dimensions {
            width: 200,
            height: 160,
        },
        ..PipelineConfig::default()
    }
}

#[test]
fn pipeline_pieces_export_to_svg() {
    let request = scene();
    let config = config();
    let pieces = process(&request, &config).unwrap();
    assert_eq!(pieces.len(), 2);

    let meta = SvgMetadata {
        title: Some("two pieces"),
        description: None,
    };
    let svg = to_svg(&pieces, &request.connectors, config.canvas, &meta).unwrap();

    assert!(svg.contains("<svg"));
    assert_eq!(svg.matches("<path").count(), 2);
    assert_eq!(svg.matches("<line").count(), 1);
    assert!(svg.contains("<title>hinge</title>"));
    assert!(svg.contains("</svg>"));
}

#[test]
fn generator_attaches_svg_markup() {
    let mut generator = Generator::new(config()).with_renderer(SvgRenderer::new());
    let response = generator.generate(&scene());
    let Outcome::Pieces {
        piece_polygons,
        renderable_markup,
    } = response.outcome
    else {
        unreachable!("pipeline failed on a valid scene");
    };
    let markup = renderable_markup.unwrap();
    assert_eq!(markup.matches("<path").count(), piece_polygons.len());
    assert!(markup.contains(r#"viewBox="0 0 200 160""#));
}
