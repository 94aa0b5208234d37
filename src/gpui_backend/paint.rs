use gpui::{
    App, BorderStyle, Bounds, ContentMask, Corners, Edges, PathBuilder, Pixels, TextRun, Window, font, point, px,
    quad,
};

use crate::geom::{Affine, ScreenPoint, ScreenRect};
use crate::render::{Color, FillStyle, LineStyle, RenderCommand, RenderList, TextStyle};

/// Replay a render list into the window.
///
/// Transforms are applied to coordinates before painting; text is placed
/// at its transformed anchor but painted upright.
pub(crate) fn paint_render_list(list: &RenderList, window: &mut Window, cx: &mut App) {
    let mut clip_stack: Vec<ContentMask<Pixels>> = Vec::new();
    let mut transforms: Vec<Affine> = Vec::new();
    for command in list.commands() {
        let affine = transforms.last().copied().unwrap_or(Affine::IDENTITY);
        match command {
            RenderCommand::ClipRect(rect) => {
                clip_stack.push(ContentMask {
                    bounds: to_bounds(transform_rect(&affine, *rect)),
                });
            }
            RenderCommand::ClipEnd => {
                clip_stack.pop();
            }
            RenderCommand::PushTransform(next) => {
                transforms.push(affine.concat(next));
            }
            RenderCommand::PopTransform => {
                transforms.pop();
            }
            RenderCommand::LineSegments { segments, style } => {
                let points: Vec<_> = segments
                    .iter()
                    .map(|s| (affine.apply(s.start), affine.apply(s.end)))
                    .collect();
                with_clip(window, &clip_stack, |window| {
                    paint_lines(window, &points, *style);
                });
            }
            RenderCommand::Polyline { points, style } => {
                let points: Vec<_> = points
                    .windows(2)
                    .map(|pair| (affine.apply(pair[0]), affine.apply(pair[1])))
                    .collect();
                with_clip(window, &clip_stack, |window| {
                    paint_lines(window, &points, *style);
                });
            }
            RenderCommand::Polygon { points, style } => {
                let points: Vec<_> = points.iter().map(|p| affine.apply(*p)).collect();
                with_clip(window, &clip_stack, |window| {
                    paint_polygon(window, &points, *style);
                });
            }
            RenderCommand::Rect { rect, style } => {
                with_clip(window, &clip_stack, |window| {
                    if is_axis_aligned(&affine) {
                        paint_rect(window, transform_rect(&affine, *rect), *style);
                    } else {
                        paint_polygon(window, &rect_corners(*rect).map(|p| affine.apply(p)), *style);
                    }
                });
            }
            RenderCommand::Text { position, text, style } => {
                let anchor = text_anchor(&affine, *position);
                with_clip(window, &clip_stack, |window| {
                    paint_text(window, cx, anchor, text, style);
                });
            }
        }
    }
}

fn paint_lines(window: &mut Window, segments: &[(ScreenPoint, ScreenPoint)], style: LineStyle) {
    if segments.is_empty() {
        return;
    }
    let width = style.width.max(0.5);
    let mut builder = PathBuilder::stroke(px(width));
    for (start, end) in segments {
        builder.move_to(to_point(*start));
        builder.line_to(to_point(*end));
    }
    if let Ok(path) = builder.build() {
        window.paint_path(path, to_rgba(style.color));
    }
}

fn paint_polygon(window: &mut Window, points: &[ScreenPoint], style: FillStyle) {
    let [first, rest @ ..] = points else {
        return;
    };
    if style.fill.a > 0.0 {
        let mut builder = PathBuilder::fill();
        builder.move_to(to_point(*first));
        for p in rest {
            builder.line_to(to_point(*p));
        }
        builder.close();
        if let Ok(path) = builder.build() {
            window.paint_path(path, to_rgba(style.fill));
        }
    }
    if style.stroke_width > 0.0 && style.stroke.a > 0.0 {
        let outline: Vec<_> = points
            .iter()
            .zip(points.iter().cycle().skip(1))
            .map(|(a, b)| (*a, *b))
            .collect();
        paint_lines(window, &outline, LineStyle { color: style.stroke, width: style.stroke_width });
    }
}

fn paint_rect(window: &mut Window, rect: ScreenRect, style: FillStyle) {
    window.paint_quad(quad(
        to_bounds(rect),
        Corners::all(px(0.0)),
        to_rgba(style.fill),
        Edges::all(px(style.stroke_width)),
        to_rgba(style.stroke),
        BorderStyle::default(),
    ));
}

fn paint_text(window: &mut Window, cx: &mut App, position: ScreenPoint, text: &str, style: &TextStyle) {
    if text.is_empty() {
        return;
    }
    let run = TextRun {
        len: text.len(),
        font: font(".SystemUIFont"),
        color: to_hsla(style.color),
        background_color: None,
        underline: None,
        strikethrough: None,
    };
    let shaped = window
        .text_system()
        .shape_line(text.to_string().into(), px(style.size), &[run], None);
    let line_height = shaped.ascent + shaped.descent;
    let _ = shaped.paint(to_point(position), line_height, window, cx);
}

/// Top-left corner at which to paint upright text whose caption frame
/// was transformed by `affine`.
///
/// Captions are laid out with their top-left at `position`; under a
/// reflection or rotation that corner may end up anywhere on the box, so
/// the anchor is taken as the minimum of the transformed unit square.
fn text_anchor(affine: &Affine, position: ScreenPoint) -> ScreenPoint {
    let origin = affine.apply(position);
    if is_axis_aligned(affine) && affine.m00 > 0.0 && affine.m11 > 0.0 {
        return origin;
    }
    let dx = affine.apply(ScreenPoint::new(position.x + 1.0, position.y));
    let dy = affine.apply(ScreenPoint::new(position.x, position.y + 1.0));
    ScreenPoint::new(origin.x.min(dx.x).min(dy.x), origin.y.min(dx.y).min(dy.y))
}

fn is_axis_aligned(affine: &Affine) -> bool {
    affine.m01 == 0.0 && affine.m10 == 0.0
}

fn rect_corners(rect: ScreenRect) -> [ScreenPoint; 4] {
    [
        rect.min,
        ScreenPoint::new(rect.max.x, rect.min.y),
        rect.max,
        ScreenPoint::new(rect.min.x, rect.max.y),
    ]
}

/// Bounding box of a transformed rectangle.
pub(crate) fn transform_rect(affine: &Affine, rect: ScreenRect) -> ScreenRect {
    let corners = rect_corners(rect).map(|p| affine.apply(p));
    let (mut min, mut max) = (corners[0], corners[0]);
    for p in &corners[1..] {
        min = ScreenPoint::new(min.x.min(p.x), min.y.min(p.y));
        max = ScreenPoint::new(max.x.max(p.x), max.y.max(p.y));
    }
    ScreenRect::new(min, max)
}

fn to_rgba(color: Color) -> gpui::Rgba {
    gpui::Rgba {
        r: color.r,
        g: color.g,
        b: color.b,
        a: color.a,
    }
}

pub(crate) fn to_hsla(color: Color) -> gpui::Hsla {
    gpui::Hsla::from(to_rgba(color))
}

fn to_point(p: ScreenPoint) -> gpui::Point<Pixels> {
    point(px(p.x as f32), px(p.y as f32))
}

fn to_bounds(rect: ScreenRect) -> Bounds<Pixels> {
    Bounds::from_corners(to_point(rect.min), to_point(rect.max))
}

fn with_clip(window: &mut Window, stack: &[ContentMask<Pixels>], f: impl FnOnce(&mut Window)) {
    if let Some(mask) = stack.last() {
        window.with_content_mask(Some(mask.clone()), f);
    } else {
        f(window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transformed_rect_is_bounding_box() {
        let rect = ScreenRect::from_origin_size(0.0, 0.0, 10.0, 4.0);
        let turned = transform_rect(&Affine::rotate(std::f64::consts::FRAC_PI_2), rect);
        assert!((turned.min.x + 4.0).abs() < 1e-9 && turned.max.x.abs() < 1e-9);
        assert!(turned.min.y.abs() < 1e-9 && (turned.max.y - 10.0).abs() < 1e-9);
    }

    #[test]
    fn upright_anchor_under_reflection() {
        let plain = Affine::translate(5.0, 7.0);
        assert_eq!(text_anchor(&plain, ScreenPoint::new(1.0, 1.0)), ScreenPoint::new(6.0, 8.0));
        // x up, y left: the vertical axis frame
        let flipped = Affine::new(0.0, -1.0, -1.0, 0.0, 100.0, 200.0);
        let anchor = text_anchor(&flipped, ScreenPoint::new(0.0, 0.0));
        assert_eq!(anchor, ScreenPoint::new(99.0, 199.0));
    }
}
