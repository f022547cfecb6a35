//! Raster annotator built on tiny-skia and imageproc.
//!
//! Draw order: region polygons, trace polylines, boxes, caption tabs, then
//! text. Boxes are captioned `#<track id> <label>` and each region is
//! labelled with its name at its vertex centroid. Text is rendered with a
//! bundled DejaVu Sans face.
//!
//! After drawing, every pixel with a non-zero colour channel is made fully
//! opaque. On a transparent canvas this produces a mask that clients can
//! composite over their own frame.

use ab_glyph::{Font, FontRef, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use tiny_skia::{
    ColorU8, IntSize, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform,
};

use super::{AnnotationError, AnnotationInput, Annotator};
use crate::geometry::Point;

const FONT_DATA: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

/// Colour palette indexed by class id (boxes, captions) or region index.
const PALETTE: [(u8, u8, u8); 10] = [
    (163, 81, 251),
    (255, 64, 64),
    (255, 161, 160),
    (255, 118, 51),
    (255, 182, 51),
    (209, 212, 53),
    (76, 251, 18),
    (148, 207, 26),
    (64, 222, 138),
    (27, 150, 64),
];

/// Offset so region colours differ from the first class colours.
const REGION_COLOR_OFFSET: usize = 7;

const TEXT_SCALE: f32 = 14.0;
const TEXT_PADDING: f32 = 3.0;
const TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

fn color(index: usize) -> (u8, u8, u8) {
    PALETTE[index % PALETTE.len()]
}

fn paint(rgb: (u8, u8, u8)) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(rgb.0, rgb.1, rgb.2, 255);
    paint.anti_alias = true;
    paint
}

fn polyline(points: &[Point], close: bool) -> Option<tiny_skia::Path> {
    let (first, rest) = points.split_first()?;
    let mut pb = PathBuilder::new();
    pb.move_to(first.x as f32, first.y as f32);
    for p in rest {
        pb.line_to(p.x as f32, p.y as f32);
    }
    if close {
        pb.close();
    }
    pb.finish()
}

fn centroid(points: &[Point]) -> Point {
    let n = points.len().max(1) as f64;
    let (x, y) = points
        .iter()
        .fold((0.0, 0.0), |(x, y), p| (x + p.x, y + p.y));
    Point::new(x / n, y / n)
}

/// A text run placed on a filled tab, drawn once the vector pass is done.
struct TextLabel {
    text: String,
    x: i32,
    y: i32,
}

/// Size of the tab holding `text`, padding included.
///
/// Height is the full line (ascent to descent) so descenders stay inside.
fn tab_size(font: &FontRef<'_>, text: &str) -> (f32, f32) {
    let scale = PxScale::from(TEXT_SCALE);
    let (width, _) = text_size(scale, font, text);
    let scaled = font.as_scaled(scale);
    let line_height = scaled.ascent() - scaled.descent();
    (
        width as f32 + 2.0 * TEXT_PADDING,
        line_height.ceil() + 2.0 * TEXT_PADDING,
    )
}

/// Fills a `size` tab at `(x, y)`, clamped to the canvas origin.
fn fill_tab(
    pixmap: &mut Pixmap,
    text: String,
    x: f32,
    y: f32,
    size: (f32, f32),
    rgb: (u8, u8, u8),
) -> TextLabel {
    let (x, y) = (x.max(0.0), y.max(0.0));
    if let Some(tab) = Rect::from_xywh(x, y, size.0, size.1) {
        pixmap.fill_rect(tab, &paint(rgb), Transform::identity(), None);
    }
    TextLabel {
        text,
        x: (x + TEXT_PADDING) as i32,
        y: (y + TEXT_PADDING) as i32,
    }
}

/// Default [`Annotator`] drawing onto an RGBA raster.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaskRenderer;

impl MaskRenderer {
    pub fn new() -> Self {
        Self
    }

    fn to_pixmap(scene: &RgbaImage) -> Result<Pixmap, AnnotationError> {
        let (width, height) = scene.dimensions();
        let size = IntSize::from_wh(width, height)
            .ok_or_else(|| AnnotationError::Render("canvas has zero size".to_string()))?;
        let mut pixmap = Pixmap::new(size.width(), size.height())
            .ok_or_else(|| AnnotationError::Render("failed to allocate canvas".to_string()))?;
        for (dst, src) in pixmap.pixels_mut().iter_mut().zip(scene.pixels()) {
            let [r, g, b, a] = src.0;
            *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
        }
        Ok(pixmap)
    }

    fn to_image(pixmap: &Pixmap) -> Result<RgbaImage, AnnotationError> {
        let mut data = Vec::with_capacity(pixmap.data().len());
        for pixel in pixmap.pixels() {
            let c = pixel.demultiply();
            data.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        RgbaImage::from_raw(pixmap.width(), pixmap.height(), data)
            .ok_or_else(|| AnnotationError::Render("pixel buffer size mismatch".to_string()))
    }

    fn make_opaque(image: &mut RgbaImage) {
        for pixel in image.pixels_mut() {
            let [r, g, b, _] = pixel.0;
            if r != 0 || g != 0 || b != 0 {
                pixel.0[3] = 255;
            }
        }
    }
}

impl Annotator for MaskRenderer {
    fn annotate(
        &self,
        scene: RgbaImage,
        input: &AnnotationInput<'_>,
    ) -> Result<RgbaImage, AnnotationError> {
        let font = FontRef::try_from_slice(FONT_DATA)
            .map_err(|e| AnnotationError::Render(format!("caption font: {}", e)))?;
        let mut pixmap = Self::to_pixmap(&scene)?;
        let style = input.style;
        let mut text = Vec::with_capacity(input.boxes.len() + input.regions.len());

        for (i, (name, polygon)) in input.regions.iter().enumerate() {
            let region_color = color(i + REGION_COLOR_OFFSET);
            if let Some(path) = polyline(polygon.points(), true) {
                let stroke = Stroke {
                    width: style.polygon_thickness,
                    ..Default::default()
                };
                pixmap.stroke_path(
                    &path,
                    &paint(region_color),
                    &stroke,
                    Transform::identity(),
                    None,
                );
            }
            let center = centroid(polygon.points());
            let size = tab_size(&font, name);
            text.push(fill_tab(
                &mut pixmap,
                name.to_string(),
                center.x as f32 - size.0 / 2.0,
                center.y as f32 - size.1 / 2.0,
                size,
                region_color,
            ));
        }

        for (track_id, points) in &input.traces {
            if points.len() < 2 {
                continue;
            }
            let class_id = input
                .boxes
                .iter()
                .find(|b| b.track_id == *track_id)
                .map(|b| b.detection.class_id as usize)
                .unwrap_or(0);
            if let Some(path) = polyline(points, false) {
                let stroke = Stroke {
                    width: style.trace_thickness,
                    ..Default::default()
                };
                pixmap.stroke_path(
                    &path,
                    &paint(color(class_id)),
                    &stroke,
                    Transform::identity(),
                    None,
                );
            }
        }

        for tracked in input.boxes {
            let bbox = tracked.detection.bbox;
            let class_color = color(tracked.detection.class_id as usize);
            let Some(rect) = Rect::from_xywh(
                bbox.x as f32,
                bbox.y as f32,
                bbox.width as f32,
                bbox.height as f32,
            ) else {
                continue;
            };
            let stroke = Stroke {
                width: style.box_thickness,
                ..Default::default()
            };
            let path = PathBuilder::from_rect(rect);
            pixmap.stroke_path(
                &path,
                &paint(class_color),
                &stroke,
                Transform::identity(),
                None,
            );

            // Tab sits on top of the box edge.
            let caption = input.caption(tracked);
            let size = tab_size(&font, &caption);
            text.push(fill_tab(
                &mut pixmap,
                caption,
                bbox.x as f32,
                bbox.y as f32 - size.1,
                size,
                class_color,
            ));
        }

        let mut image = Self::to_image(&pixmap)?;
        for label in &text {
            draw_text_mut(
                &mut image,
                TEXT_COLOR,
                label.x,
                label.y,
                PxScale::from(TEXT_SCALE),
                &font,
                &label.text,
            );
        }
        Self::make_opaque(&mut image);
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::AnnotationConfig;
    use crate::engine::{Detection, TrackedBox};
    use crate::geometry::{CanonicalBox, Polygon};
    use std::collections::HashMap;

    fn input<'a>(
        boxes: &'a [TrackedBox],
        regions: Vec<(&'a str, &'a Polygon)>,
        labels: &'a HashMap<u32, String>,
    ) -> AnnotationInput<'a> {
        AnnotationInput {
            boxes,
            traces: Vec::new(),
            regions,
            labels,
            style: AnnotationConfig::default(),
        }
    }

    fn person(class_id: u32) -> [TrackedBox; 1] {
        [TrackedBox {
            detection: Detection::new(CanonicalBox::new(20.0, 40.0, 60.0, 40.0), 0.9, class_id),
            track_id: 1,
        }]
    }

    fn square() -> Polygon {
        Polygon::new(&[[10.0, 10.0], [90.0, 10.0], [90.0, 90.0], [10.0, 90.0]]).unwrap()
    }

    /// Pixels light enough in every channel to come from white text.
    fn text_pixels(image: &RgbaImage) -> usize {
        image
            .pixels()
            .filter(|p| p[0] > 160 && p[1] > 160 && p[2] > 160)
            .count()
    }

    #[test]
    fn test_empty_input_leaves_canvas_transparent() {
        let labels = HashMap::new();
        let out = MaskRenderer::new()
            .annotate(RgbaImage::new(64, 64), &input(&[], Vec::new(), &labels))
            .unwrap();
        assert!(out.pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }

    #[test]
    fn test_box_outline_is_opaque() {
        let labels = HashMap::new();
        let boxes = person(1);
        let out = MaskRenderer::new()
            .annotate(RgbaImage::new(128, 128), &input(&boxes, Vec::new(), &labels))
            .unwrap();

        // Left edge of the box is drawn, the interior is not.
        assert_eq!(out.get_pixel(20, 60)[3], 255);
        assert_eq!(out.get_pixel(50, 60), &Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_caption_text_is_rendered_above_box() {
        let labels = HashMap::from([(1, "person".to_string())]);
        let boxes = person(1);
        let out = MaskRenderer::new()
            .annotate(RgbaImage::new(128, 128), &input(&boxes, Vec::new(), &labels))
            .unwrap();

        // Class 1 is red; only glyphs are light in green and blue.
        assert!(text_pixels(&out) > 0);
        let above_box = (0..40)
            .flat_map(|y| (20..128).map(move |x| (x, y)))
            .filter(|&(x, y)| {
                let p = out.get_pixel(x, y);
                p[1] > 160 && p[2] > 160
            })
            .count();
        assert_eq!(above_box, text_pixels(&out));
    }

    #[test]
    fn test_caption_uses_label_map() {
        let boxes = person(1);
        let render = |labels: &HashMap<u32, String>| {
            MaskRenderer::new()
                .annotate(RgbaImage::new(128, 128), &input(&boxes, Vec::new(), labels))
                .unwrap()
        };
        let person = render(&HashMap::from([(1, "person".to_string())]));
        let car = render(&HashMap::from([(1, "car".to_string())]));
        assert_ne!(person, car);
    }

    #[test]
    fn test_region_outline_and_name_are_drawn() {
        let labels = HashMap::new();
        let square = square();
        let out = MaskRenderer::new()
            .annotate(
                RgbaImage::new(128, 128),
                &input(&[], vec![("door", &square)], &labels),
            )
            .unwrap();

        assert_eq!(out.get_pixel(50, 10)[3], 255);
        assert_eq!(out.get_pixel(15, 85), &Rgba([0, 0, 0, 0]));
        // Name tab is centred on the polygon.
        assert_eq!(out.get_pixel(50, 50)[3], 255);
        assert!(text_pixels(&out) > 0);
    }

    #[test]
    fn test_region_name_changes_image() {
        let labels = HashMap::new();
        let square = square();
        let render = |name: &'static str| {
            MaskRenderer::new()
                .annotate(
                    RgbaImage::new(128, 128),
                    &input(&[], vec![(name, &square)], &labels),
                )
                .unwrap()
        };
        assert_ne!(render("door"), render("exit"));
    }

    #[test]
    fn test_opaque_scene_is_preserved() {
        let labels = HashMap::new();
        let scene = RgbaImage::from_pixel(64, 64, Rgba([5, 6, 7, 255]));
        let out = MaskRenderer::new()
            .annotate(scene, &input(&[], Vec::new(), &labels))
            .unwrap();
        assert!(out.pixels().all(|p| p.0 == [5, 6, 7, 255]));
    }

    #[test]
    fn test_zero_size_canvas_is_render_error() {
        let labels = HashMap::new();
        let err = MaskRenderer::new()
            .annotate(RgbaImage::new(0, 0), &input(&[], Vec::new(), &labels))
            .unwrap_err();
        assert!(matches!(err, AnnotationError::Render(_)));
    }
}
