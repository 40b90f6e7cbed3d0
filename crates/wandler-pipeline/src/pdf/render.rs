// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page rasteriser: draws one PDF page onto a white canvas straight from the
// parsed `lopdf` structure.
//
// Painted: image XObjects and inline images (including stencil masks), form
// XObjects, and filled or stroked paths in device colours. Clipping and
// transparency groups are not applied. Content that cannot be drawn (visible
// text, shadings, pattern colours, unsupported image encodings) fails the
// page instead of leaving a blank area.

use std::collections::HashSet;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageFormat, Rgba, RgbaImage};
use imageproc::geometric_transformations::{Interpolation, warp_into_with};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, instrument};
use wandler_core::{ConvertError, Result};

use crate::raster::PixelSurface;

/// US Letter, used when a page tree carries no MediaBox at all.
const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];
const MAX_TREE_DEPTH: usize = 32;
const MAX_FORM_DEPTH: usize = 12;
const CURVE_STEPS: usize = 16;
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// How pages are rasterised.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    /// Pixels per PDF point.
    pub scale: f32,
    /// Largest canvas edge in pixels. Pages that would exceed it at `scale`
    /// are rendered at a reduced scale instead.
    pub max_edge: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            scale: 2.0,
            max_edge: 4096,
        }
    }
}

/// Affine transform `[a b c d e f]` as used by the `cm` operator.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f64; 6]);

impl Matrix {
    const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn from_operands(operands: &[Object]) -> Option<Self> {
        numbers::<6>(operands).map(Matrix)
    }

    /// `self × other`: apply `self` first, then `other`.
    fn then(&self, other: &Matrix) -> Matrix {
        let [a, b, c, d, e, f] = self.0;
        let [ca, cb, cc, cd, ce, cf] = other.0;
        Matrix([
            a * ca + b * cc,
            a * cb + b * cd,
            c * ca + d * cc,
            c * cb + d * cd,
            e * ca + f * cc + ce,
            e * cb + f * cd + cf,
        ])
    }

    fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + c * y + e, b * x + d * y + f)
    }

    /// Average linear scale, for line widths.
    fn expansion(&self) -> f64 {
        let [a, b, c, d, _, _] = self.0;
        (a * d - b * c).abs().sqrt()
    }
}

/// The parts of the PDF graphics state the painter honours.
#[derive(Debug, Clone, Copy)]
struct GraphicsState {
    ctm: Matrix,
    fill: Rgba<u8>,
    stroke: Rgba<u8>,
    line_width: f64,
    text_mode: i64,
}

impl GraphicsState {
    fn new(ctm: Matrix) -> Self {
        Self {
            ctm,
            fill: BLACK,
            stroke: BLACK,
            line_width: 1.0,
            text_mode: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FillRule {
    NonZero,
    EvenOdd,
}

/// Path under construction, in canvas pixels.
#[derive(Debug, Default)]
struct Path {
    subpaths: Vec<Subpath>,
}

#[derive(Debug)]
struct Subpath {
    points: Vec<(f64, f64)>,
    closed: bool,
}

impl Path {
    fn current(&self) -> Option<(f64, f64)> {
        let last = self.subpaths.last()?;
        if last.closed {
            last.points.first().copied()
        } else {
            last.points.last().copied()
        }
    }

    fn move_to(&mut self, point: (f64, f64)) {
        self.subpaths.push(Subpath {
            points: vec![point],
            closed: false,
        });
    }

    fn line_to(&mut self, point: (f64, f64)) {
        match self.subpaths.last_mut() {
            Some(last) if !last.closed => last.points.push(point),
            // After `h` a new subpath starts where the closed one began.
            _ => {
                let start = self.current().unwrap_or(point);
                self.move_to(start);
                if let Some(last) = self.subpaths.last_mut() {
                    last.points.push(point);
                }
            }
        }
    }

    fn curve_to(&mut self, p1: (f64, f64), p2: (f64, f64), p3: (f64, f64)) {
        let Some(p0) = self.current() else {
            self.move_to(p3);
            return;
        };
        for step in 1..=CURVE_STEPS {
            let t = step as f64 / CURVE_STEPS as f64;
            let u = 1.0 - t;
            let (w0, w1, w2, w3) = (u * u * u, 3.0 * u * u * t, 3.0 * u * t * t, t * t * t);
            self.line_to((
                w0 * p0.0 + w1 * p1.0 + w2 * p2.0 + w3 * p3.0,
                w0 * p0.1 + w1 * p1.1 + w2 * p2.1 + w3 * p3.1,
            ));
        }
    }

    fn close(&mut self) {
        if let Some(last) = self.subpaths.last_mut() {
            last.closed = true;
        }
    }

    fn polygon(&mut self, corners: [(f64, f64); 4]) {
        self.subpaths.push(Subpath {
            points: corners.to_vec(),
            closed: true,
        });
    }

    fn clear(&mut self) {
        self.subpaths.clear();
    }
}

/// Render `page_id` into an opaque RGB surface.
#[instrument(skip(doc, options))]
pub(crate) fn render_page(
    doc: &Document,
    page_id: ObjectId,
    page_index: usize,
    options: &RenderOptions,
) -> Result<PixelSurface> {
    let fail = |reason: String| ConvertError::PageRender { page_index, reason };

    let page = doc
        .get_dictionary(page_id)
        .map_err(|err| fail(format!("page object unreadable: {err}")))?;

    let media_box = media_box(doc, page);
    let [x0, y0, x1, y1] = media_box;
    let (page_width, page_height) = (x1 - x0, y1 - y0);
    if !(page_width > 0.0 && page_height > 0.0) {
        return Err(fail(format!("empty page box {media_box:?}")));
    }

    let mut scale = f64::from(options.scale);
    if !(scale > 0.0 && scale.is_finite()) {
        return Err(fail(format!("render scale {scale} is not positive")));
    }
    let limit = f64::from(options.max_edge.max(1));
    let longest = page_width.max(page_height);
    if longest * scale > limit {
        let reduced = limit / longest;
        debug!(requested = scale, reduced, "Page exceeds render edge, reducing scale");
        scale = reduced;
    }
    let width = (page_width * scale).ceil().clamp(1.0, limit) as u32;
    let height = (page_height * scale).ceil().clamp(1.0, limit) as u32;

    let content = doc
        .get_page_content(page_id)
        .map_err(|err| fail(format!("content stream unreadable: {err}")))?;
    let content =
        Content::decode(&content).map_err(|err| fail(format!("content stream malformed: {err}")))?;

    let resources = inherited(doc, page, b"Resources")
        .and_then(|object| object.as_dict().ok())
        .cloned()
        .unwrap_or_default();

    let mut painter = Painter {
        doc,
        page_index,
        scale,
        origin: (x0, y1),
        canvas: RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255])),
        visited: HashSet::new(),
        painted: 0,
    };
    painter.run(
        &content.operations,
        &resources,
        GraphicsState::new(Matrix::IDENTITY),
        0,
    )?;
    debug!(painted = painter.painted, width, height, "Page painted");

    let rotation = inherited(doc, page, b"Rotate")
        .and_then(number)
        .map(|degrees| (degrees as i64).rem_euclid(360))
        .unwrap_or(0);
    let canvas = match rotation {
        90 => imageops::rotate90(&painter.canvas),
        180 => imageops::rotate180(&painter.canvas),
        270 => imageops::rotate270(&painter.canvas),
        _ => painter.canvas,
    };

    Ok(PixelSurface::from_dynamic(DynamicImage::ImageRgb8(
        DynamicImage::ImageRgba8(canvas).to_rgb8(),
    )))
}

struct Painter<'a> {
    doc: &'a Document,
    page_index: usize,
    /// Effective pixels per point.
    scale: f64,
    /// Top-left corner of the MediaBox in user space.
    origin: (f64, f64),
    canvas: RgbaImage,
    /// Form XObjects currently being painted, to break reference cycles.
    visited: HashSet<ObjectId>,
    painted: usize,
}

impl Painter<'_> {
    fn fail(&self, reason: impl Into<String>) -> ConvertError {
        ConvertError::PageRender {
            page_index: self.page_index,
            reason: reason.into(),
        }
    }

    /// User space point to canvas pixels, y pointing down.
    fn device(&self, ctm: &Matrix, x: f64, y: f64) -> (f64, f64) {
        let (ux, uy) = ctm.apply(x, y);
        let (x0, y1) = self.origin;
        (self.scale * (ux - x0), self.scale * (y1 - uy))
    }

    fn run(
        &mut self,
        operations: &[Operation],
        resources: &Dictionary,
        mut state: GraphicsState,
        depth: usize,
    ) -> Result<()> {
        let mut saved = Vec::new();
        let mut path = Path::default();

        for operation in operations {
            let operands = operation.operands.as_slice();
            match operation.operator.as_str() {
                "q" => saved.push(state),
                "Q" => {
                    if let Some(previous) = saved.pop() {
                        state = previous;
                    }
                }
                "cm" => match Matrix::from_operands(operands) {
                    Some(matrix) => state.ctm = matrix.then(&state.ctm),
                    None => debug!(operands = ?operands, "Ignoring malformed cm"),
                },
                "w" => {
                    if let Some(width) = operands.first().and_then(number) {
                        state.line_width = width;
                    }
                }
                "g" | "rg" | "k" | "sc" | "scn" => state.fill = self.colour(operation)?,
                "G" | "RG" | "K" | "SC" | "SCN" => state.stroke = self.colour(operation)?,
                "cs" => state.fill = BLACK,
                "CS" => state.stroke = BLACK,

                "m" => {
                    if let Some([x, y]) = numbers::<2>(operands) {
                        path.move_to(self.device(&state.ctm, x, y));
                    }
                }
                "l" => {
                    if let Some([x, y]) = numbers::<2>(operands) {
                        path.line_to(self.device(&state.ctm, x, y));
                    }
                }
                "c" => {
                    if let Some([x1, y1, x2, y2, x3, y3]) = numbers::<6>(operands) {
                        path.curve_to(
                            self.device(&state.ctm, x1, y1),
                            self.device(&state.ctm, x2, y2),
                            self.device(&state.ctm, x3, y3),
                        );
                    }
                }
                "v" => {
                    let control = numbers::<4>(operands);
                    if let (Some([x2, y2, x3, y3]), Some(current)) = (control, path.current()) {
                        path.curve_to(
                            current,
                            self.device(&state.ctm, x2, y2),
                            self.device(&state.ctm, x3, y3),
                        );
                    }
                }
                "y" => {
                    if let Some([x1, y1, x3, y3]) = numbers::<4>(operands) {
                        let end = self.device(&state.ctm, x3, y3);
                        path.curve_to(self.device(&state.ctm, x1, y1), end, end);
                    }
                }
                "h" => path.close(),
                "re" => {
                    if let Some([x, y, w, h]) = numbers::<4>(operands) {
                        path.polygon([
                            self.device(&state.ctm, x, y),
                            self.device(&state.ctm, x + w, y),
                            self.device(&state.ctm, x + w, y + h),
                            self.device(&state.ctm, x, y + h),
                        ]);
                    }
                }

                "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" => {
                    let operator = operation.operator.as_str();
                    if operator.starts_with('b') {
                        path.close();
                    }
                    let rule = if operator.ends_with('*') {
                        FillRule::EvenOdd
                    } else {
                        FillRule::NonZero
                    };
                    self.fill_path(&path, state.fill, rule);
                    if matches!(operator, "B" | "B*" | "b" | "b*") {
                        self.stroke_path(&path, &state);
                    }
                    path.clear();
                }
                "S" | "s" => {
                    if operation.operator == "s" {
                        path.close();
                    }
                    self.stroke_path(&path, &state);
                    path.clear();
                }
                // Clipping is not applied; `W n` just ends the path.
                "n" => path.clear(),

                "Tr" => {
                    if let Some(mode) = operands.first().and_then(number) {
                        state.text_mode = mode as i64;
                    }
                }
                // Modes 3 and 7 draw nothing, as in an OCR text layer.
                "Tj" | "TJ" | "'" | "\"" if !matches!(state.text_mode, 3 | 7) => {
                    return Err(self.fail("page contains text, which cannot be rasterised"));
                }
                "sh" => {
                    return Err(self.fail("page contains a shading, which cannot be rasterised"));
                }

                "Do" => {
                    if let Some(Object::Name(name)) = operands.first() {
                        self.paint_xobject(name, resources, &state, depth)?;
                    }
                }
                "BI" => match operands.first() {
                    Some(Object::Stream(stream)) => {
                        let expanded = expand_inline_image(stream);
                        self.paint_image("inline image", &expanded, &state)?;
                    }
                    _ => return Err(self.fail("inline image is malformed")),
                },
                _ => {}
            }
        }
        Ok(())
    }

    fn colour(&self, operation: &Operation) -> Result<Rgba<u8>> {
        let values: Option<Vec<f64>> = operation.operands.iter().map(number).collect();
        let Some(values) = values else {
            return Err(self.fail("page uses a pattern colour, which cannot be rasterised"));
        };
        device_colour(&values).ok_or_else(|| {
            self.fail(format!(
                "unsupported colour operands for {}: {values:?}",
                operation.operator
            ))
        })
    }

    fn fill_path(&mut self, path: &Path, colour: Rgba<u8>, rule: FillRule) {
        let polygons: Vec<&[(f64, f64)]> = path
            .subpaths
            .iter()
            .map(|subpath| subpath.points.as_slice())
            .filter(|points| points.len() >= 3)
            .collect();
        if fill_polygons(&mut self.canvas, &polygons, colour, rule) {
            self.painted += 1;
        }
    }

    fn stroke_path(&mut self, path: &Path, state: &GraphicsState) {
        // Zero-width lines are drawn one pixel wide.
        let width = (state.line_width * state.ctm.expansion() * self.scale).max(1.0);
        let half = width / 2.0;

        let mut any = false;
        for subpath in &path.subpaths {
            let points = &subpath.points;
            let closing = subpath
                .closed
                .then(|| points.last().zip(points.first()))
                .flatten();
            let segments = points
                .windows(2)
                .map(|pair| (pair[0], pair[1]))
                .chain(closing.map(|(last, first)| (*last, *first)));

            for ((ax, ay), (bx, by)) in segments {
                let (dx, dy) = (bx - ax, by - ay);
                let length = dx.hypot(dy);
                if length < f64::EPSILON {
                    continue;
                }
                let (nx, ny) = (-dy / length * half, dx / length * half);
                let quad = [
                    (ax + nx, ay + ny),
                    (bx + nx, by + ny),
                    (bx - nx, by - ny),
                    (ax - nx, ay - ny),
                ];
                any |= fill_polygons(
                    &mut self.canvas,
                    &[quad.as_slice()],
                    state.stroke,
                    FillRule::NonZero,
                );
            }
        }
        if any {
            self.painted += 1;
        }
    }

    fn paint_xobject(
        &mut self,
        name: &[u8],
        resources: &Dictionary,
        state: &GraphicsState,
        depth: usize,
    ) -> Result<()> {
        let doc = self.doc;
        let label = String::from_utf8_lossy(name).into_owned();

        let Some(Object::Reference(id)) = resources
            .get(b"XObject")
            .ok()
            .and_then(|object| resolve(doc, object))
            .and_then(|object| object.as_dict().ok())
            .and_then(|xobjects| xobjects.get(name).ok())
        else {
            return Err(self.fail(format!("XObject {label} is missing from the page resources")));
        };
        let id = *id;

        let stream = doc
            .get_object(id)
            .and_then(Object::as_stream)
            .map_err(|err| self.fail(format!("XObject {label} unreadable: {err}")))?;

        match name_of(&stream.dict, b"Subtype") {
            Some(b"Image") => self.paint_image(&label, stream, state),
            Some(b"Form") => {
                if depth >= MAX_FORM_DEPTH || !self.visited.insert(id) {
                    return Err(self.fail(format!("form XObject {label} nests too deeply")));
                }
                let result = self.paint_form(stream, resources, state, depth);
                self.visited.remove(&id);
                result
            }
            other => {
                let subtype = other.map(String::from_utf8_lossy);
                debug!(xobject = %label, subtype = ?subtype, "Skipping XObject");
                Ok(())
            }
        }
    }

    fn paint_form(
        &mut self,
        stream: &Stream,
        parent_resources: &Dictionary,
        state: &GraphicsState,
        depth: usize,
    ) -> Result<()> {
        let doc = self.doc;
        let matrix = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|object| resolve(doc, object))
            .and_then(|object| object.as_array().ok())
            .and_then(|values| Matrix::from_operands(values))
            .unwrap_or(Matrix::IDENTITY);

        let bytes = stream_bytes(stream)
            .map_err(|err| self.fail(format!("form XObject unreadable: {err}")))?;
        let content = Content::decode(&bytes)
            .map_err(|err| self.fail(format!("form XObject malformed: {err}")))?;

        let own_resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|object| resolve(doc, object))
            .and_then(|object| object.as_dict().ok())
            .cloned();
        let resources = own_resources.unwrap_or_else(|| parent_resources.clone());

        let mut inner = *state;
        inner.ctm = matrix.then(&state.ctm);
        self.run(&content.operations, &resources, inner, depth + 1)
    }

    /// Draw an image into the unit square of the current transform. Only the
    /// canvas area the image covers is warped.
    fn paint_image(&mut self, label: &str, stream: &Stream, state: &GraphicsState) -> Result<()> {
        let image = self.decode_image(label, stream, state.fill)?;
        let (iw, ih) = (f64::from(image.width()), f64::from(image.height()));

        let origin = self.device(&state.ctm, 0.0, 0.0);
        let right = self.device(&state.ctm, 1.0, 0.0);
        let up = self.device(&state.ctm, 0.0, 1.0);
        let far = self.device(&state.ctm, 1.0, 1.0);
        let (ex, ey) = (right.0 - origin.0, right.1 - origin.1);
        let (fx, fy) = (up.0 - origin.0, up.1 - origin.1);
        let det = ex * fy - ey * fx;
        if !(det.abs() > 1e-9) {
            debug!(image = label, ctm = ?state.ctm, "Degenerate image transform");
            return Ok(());
        }

        let corners = [origin, right, up, far];
        let xs = corners.map(|corner| corner.0);
        let ys = corners.map(|corner| corner.1);
        let left = xs.into_iter().fold(f64::INFINITY, f64::min).floor().max(0.0);
        let top = ys.into_iter().fold(f64::INFINITY, f64::min).floor().max(0.0);
        let right_edge = xs
            .into_iter()
            .fold(f64::NEG_INFINITY, f64::max)
            .ceil()
            .min(f64::from(self.canvas.width()));
        let bottom = ys
            .into_iter()
            .fold(f64::NEG_INFINITY, f64::max)
            .ceil()
            .min(f64::from(self.canvas.height()));
        if !(right_edge > left && bottom > top) {
            debug!(image = label, "Image lies outside the page");
            return Ok(());
        }
        let (bx, by) = (left as u32, top as u32);
        let mut layer = RgbaImage::new((right_edge - left) as u32, (bottom - top) as u32);

        // Edge-replicated border so bilinear sampling reaches the outer
        // pixel centres.
        let (w, h) = image.dimensions();
        let padded = RgbaImage::from_fn(w + 2, h + 2, |x, y| {
            *image.get_pixel(x.saturating_sub(1).min(w - 1), y.saturating_sub(1).min(h - 1))
        });
        drop(image);

        // Layer pixel centre → unit square (s, t) → padded image coordinates.
        let mapping = move |x: f32, y: f32| {
            let px = f64::from(x) + f64::from(bx) + 0.5 - origin.0;
            let py = f64::from(y) + f64::from(by) + 0.5 - origin.1;
            let s = (px * fy - py * fx) / det;
            let t = (ex * py - ey * px) / det;
            if !((0.0..1.0).contains(&s) && (0.0..1.0).contains(&t)) {
                return (-2.0, -2.0);
            }
            ((s * iw + 0.5) as f32, ((1.0 - t) * ih + 0.5) as f32)
        };
        warp_into_with(
            &padded,
            mapping,
            Interpolation::Bilinear,
            Rgba([0, 0, 0, 0]),
            &mut layer,
        );
        imageops::overlay(&mut self.canvas, &layer, i64::from(bx), i64::from(by));
        self.painted += 1;
        Ok(())
    }

    /// Decode an image XObject to RGBA. Stencil masks take `fill` where
    /// they paint.
    fn decode_image(&self, label: &str, stream: &Stream, fill: Rgba<u8>) -> Result<RgbaImage> {
        let doc = self.doc;
        let dict = &stream.dict;

        let width = integer(doc, dict, b"Width").filter(|w| *w > 0);
        let height = integer(doc, dict, b"Height").filter(|h| *h > 0);
        let (Some(width), Some(height)) = (width, height) else {
            return Err(self.fail(format!("image {label} has no size")));
        };
        let filters = filter_names(dict);
        let inverted = decode_inverted(doc, dict);

        if dict.get(b"ImageMask").and_then(Object::as_bool).unwrap_or(false) {
            if !filters.iter().all(|name| is_generic_filter(name)) {
                return Err(self.fail(format!("stencil mask {label} uses an unsupported filter")));
            }
            let samples = stream_bytes(stream)
                .map_err(|err| self.fail(format!("image {label}: {err}")))?;
            let bits = unpack_samples(&samples, width, height, 1, 1)
                .ok_or_else(|| self.fail(format!("image {label} has truncated samples")))?;
            // Sample 0 paints unless /Decode is [1 0].
            let pixels = bits
                .into_iter()
                .flat_map(|bit| {
                    let paints = (bit == 0) != inverted.first().copied().unwrap_or(false);
                    let mut pixel = fill.0;
                    pixel[3] = if paints { 255 } else { 0 };
                    pixel
                })
                .collect();
            return RgbaImage::from_raw(width, height, pixels)
                .ok_or_else(|| self.fail(format!("image {label} has truncated samples")));
        }

        let mut image = match filters.last().map(Vec::as_slice) {
            Some(b"DCTDecode") if filters.len() == 1 => {
                image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
                    .map_err(|err| self.fail(format!("image {label}: {err}")))?
                    .to_rgba8()
            }
            _ if filters.iter().all(|name| is_generic_filter(name)) => {
                let Some(components) = components(doc, dict) else {
                    let reason = format!("image {label} uses an unsupported colour space");
                    return Err(self.fail(reason));
                };
                let bits = integer(doc, dict, b"BitsPerComponent").unwrap_or(8);
                if !matches!(bits, 1 | 2 | 4 | 8) {
                    return Err(self.fail(format!("image {label} has {bits}-bit samples")));
                }
                let samples = stream_bytes(stream)
                    .map_err(|err| self.fail(format!("image {label}: {err}")))?;
                let mut samples = unpack_samples(&samples, width, height, components, bits)
                    .ok_or_else(|| self.fail(format!("image {label} has truncated samples")))?;
                apply_decode(&mut samples, components, &inverted);
                raw_to_rgba(&samples, width, height, components)
                    .ok_or_else(|| self.fail(format!("image {label} has truncated samples")))?
            }
            _ => {
                let names: Vec<_> = filters
                    .iter()
                    .map(|name| String::from_utf8_lossy(name))
                    .collect();
                return Err(self.fail(format!(
                    "image {label} uses unsupported filter {}",
                    names.join(" ")
                )));
            }
        };

        if let Some(mask) = self.soft_mask(dict) {
            apply_alpha(&mut image, &mask);
        }
        Ok(image)
    }

    /// Decoded /SMask, if present and readable.
    fn soft_mask(&self, dict: &Dictionary) -> Option<GrayImage> {
        let doc = self.doc;
        let stream = dict
            .get(b"SMask")
            .ok()
            .and_then(|object| resolve(doc, object))
            .and_then(|object| object.as_stream().ok())?;

        let width = integer(doc, &stream.dict, b"Width")?;
        let height = integer(doc, &stream.dict, b"Height")?;
        let filters = filter_names(&stream.dict);
        let mask = match filters.last().map(Vec::as_slice) {
            Some(b"DCTDecode") => {
                image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
                    .ok()?
                    .to_luma8()
            }
            _ if filters.iter().all(|name| is_generic_filter(name)) => {
                let samples = stream_bytes(stream).ok()?;
                let bits = integer(doc, &stream.dict, b"BitsPerComponent").unwrap_or(8);
                let samples = unpack_samples(&samples, width, height, 1, bits)?;
                GrayImage::from_raw(width, height, samples)?
            }
            _ => return None,
        };
        Some(mask)
    }
}

/// Fill polygons (canvas pixels) by sampling pixel centres. Returns whether
/// any pixel was set.
fn fill_polygons(
    canvas: &mut RgbaImage,
    polygons: &[&[(f64, f64)]],
    colour: Rgba<u8>,
    rule: FillRule,
) -> bool {
    let mut edges = Vec::new();
    for points in polygons.iter().filter(|points| points.len() >= 3) {
        for (index, start) in points.iter().enumerate() {
            let end = points[(index + 1) % points.len()];
            let finite = [start.0, start.1, end.0, end.1].iter().all(|v| v.is_finite());
            if finite && start.1 != end.1 {
                edges.push((*start, end));
            }
        }
    }
    if edges.is_empty() {
        return false;
    }

    let (width, height) = (canvas.width() as i64, canvas.height() as i64);
    let low = edges.iter().map(|(a, b)| a.1.min(b.1)).fold(f64::INFINITY, f64::min);
    let high = edges.iter().map(|(a, b)| a.1.max(b.1)).fold(f64::NEG_INFINITY, f64::max);
    let first_row = (low.floor() as i64).max(0);
    let last_row = (high.ceil() as i64).min(height - 1);

    let mut painted = false;
    let mut crossings: Vec<(f64, i32)> = Vec::new();
    for row in first_row..=last_row {
        let y = row as f64 + 0.5;
        crossings.clear();
        for ((x0, y0), (x1, y1)) in &edges {
            let (x0, y0, x1, y1) = (*x0, *y0, *x1, *y1);
            let downward = y0 <= y && y < y1;
            let upward = y1 <= y && y < y0;
            if downward || upward {
                let x = x0 + (y - y0) * (x1 - x0) / (y1 - y0);
                crossings.push((x, if downward { 1 } else { -1 }));
            }
        }
        crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut winding = 0;
        for pair in crossings.windows(2) {
            winding += pair[0].1;
            let inside = match rule {
                FillRule::NonZero => winding != 0,
                FillRule::EvenOdd => winding % 2 != 0,
            };
            if !inside {
                continue;
            }
            let from = ((pair[0].0 - 0.5).ceil() as i64).max(0);
            let to = ((pair[1].0 - 0.5).ceil() as i64).min(width);
            for x in from..to {
                canvas.put_pixel(x as u32, row as u32, colour);
                painted = true;
            }
        }
    }
    painted
}

/// Device Gray, RGB or CMYK components in [0, 1] to an opaque pixel.
fn device_colour(values: &[f64]) -> Option<Rgba<u8>> {
    let channel = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    let rgb = match *values {
        [g] => [channel(g); 3],
        [r, g, b] => [channel(r), channel(g), channel(b)],
        [c, m, y, k] => {
            let ink = |v: f64| (1.0 - v.clamp(0.0, 1.0)) * (1.0 - k.clamp(0.0, 1.0));
            [channel(ink(c)), channel(ink(m)), channel(ink(y))]
        }
        _ => return None,
    };
    Some(Rgba([rgb[0], rgb[1], rgb[2], 255]))
}

fn apply_alpha(image: &mut RgbaImage, mask: &GrayImage) {
    let resized;
    let mask = if mask.dimensions() == image.dimensions() {
        mask
    } else {
        resized = imageops::resize(mask, image.width(), image.height(), FilterType::Triangle);
        &resized
    };
    for (pixel, alpha) in image.pixels_mut().zip(mask.pixels()) {
        pixel[3] = ((u32::from(pixel[3]) * u32::from(alpha[0]) + 127) / 255) as u8;
    }
}

/// Expand packed 1/2/4/8-bit samples (rows padded to whole bytes) to one
/// byte per sample scaled to 0..=255.
fn unpack_samples(
    data: &[u8],
    width: u32,
    height: u32,
    components: usize,
    bits: u32,
) -> Option<Vec<u8>> {
    if !matches!(bits, 1 | 2 | 4 | 8) {
        return None;
    }
    let per_row = (width as usize).checked_mul(components)?;
    let row_bytes = per_row.checked_mul(bits as usize)?.div_ceil(8);
    if row_bytes == 0 {
        return None;
    }
    let data = data.get(..row_bytes.checked_mul(height as usize)?)?;
    if bits == 8 {
        return Some(data.to_vec());
    }

    let bits = bits as usize;
    let max = (1u32 << bits) - 1;
    let mut out = Vec::with_capacity(per_row * height as usize);
    for row in data.chunks_exact(row_bytes) {
        for sample in 0..per_row {
            let offset = sample * bits;
            let shift = 8 - bits - offset % 8;
            let value = (u32::from(row[offset / 8]) >> shift) & max;
            out.push((value * 255 / max) as u8);
        }
    }
    Some(out)
}

/// Which components a /Decode array flips (`[1 0]` pairs).
fn decode_inverted(doc: &Document, dict: &Dictionary) -> Vec<bool> {
    let Some(values) = dict
        .get(b"Decode")
        .ok()
        .and_then(|object| resolve(doc, object))
        .and_then(|object| object.as_array().ok())
    else {
        return Vec::new();
    };
    values
        .chunks_exact(2)
        .map(|pair| match (number(&pair[0]), number(&pair[1])) {
            (Some(low), Some(high)) => low > high,
            _ => false,
        })
        .collect()
}

fn apply_decode(samples: &mut [u8], components: usize, inverted: &[bool]) {
    if !inverted.iter().any(|flip| *flip) {
        return;
    }
    for (index, sample) in samples.iter_mut().enumerate() {
        if inverted.get(index % components).copied().unwrap_or(false) {
            *sample = 255 - *sample;
        }
    }
}

fn raw_to_rgba(samples: &[u8], width: u32, height: u32, components: usize) -> Option<RgbaImage> {
    let pixels = (width as usize).checked_mul(height as usize)?;
    let samples = samples.get(..pixels.checked_mul(components)?)?;

    let mut rgba = Vec::with_capacity(pixels * 4);
    for chunk in samples.chunks_exact(components) {
        let rgb = match *chunk {
            [g] => [g, g, g],
            [r, g, b] => [r, g, b],
            [c, m, y, k] => {
                let inv = |v: u8| ((255 - u32::from(v)) * (255 - u32::from(k)) / 255) as u8;
                [inv(c), inv(m), inv(y)]
            }
            _ => return None,
        };
        rgba.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
    }
    RgbaImage::from_raw(width, height, rgba)
}

/// Number of colour components, for the colour spaces drawn directly.
fn components(doc: &Document, dict: &Dictionary) -> Option<usize> {
    let space = dict.get(b"ColorSpace").ok().and_then(|object| resolve(doc, object))?;
    match space {
        Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"CalGray" => Some(1),
            b"DeviceRGB" | b"CalRGB" => Some(3),
            b"DeviceCMYK" => Some(4),
            _ => None,
        },
        Object::Array(items) => match items.first() {
            Some(Object::Name(family)) if family.as_slice() == b"ICCBased" => {
                let profile = items
                    .get(1)
                    .and_then(|object| resolve(doc, object))
                    .and_then(|object| object.as_stream().ok())?;
                match integer(doc, &profile.dict, b"N")? {
                    n @ (1 | 3 | 4) => Some(n as usize),
                    _ => None,
                }
            }
            Some(Object::Name(family)) if family.as_slice() == b"CalRGB" => Some(3),
            Some(Object::Name(family)) if family.as_slice() == b"CalGray" => Some(1),
            _ => None,
        },
        _ => None,
    }
}

/// Inline image dictionaries use abbreviated keys and names; map them to the
/// XObject spelling.
fn expand_inline_image(stream: &Stream) -> Stream {
    let key = |abbr: &[u8]| -> &'static [u8] {
        match abbr {
            b"W" => b"Width",
            b"H" => b"Height",
            b"BPC" => b"BitsPerComponent",
            b"CS" => b"ColorSpace",
            b"IM" => b"ImageMask",
            b"F" => b"Filter",
            b"D" => b"Decode",
            b"DP" => b"DecodeParms",
            _ => b"",
        }
    };
    let value = |object: &Object| -> Object {
        let expand = |name: &[u8]| -> Vec<u8> {
            match name {
                b"G" => b"DeviceGray".to_vec(),
                b"RGB" => b"DeviceRGB".to_vec(),
                b"CMYK" => b"DeviceCMYK".to_vec(),
                b"Fl" => b"FlateDecode".to_vec(),
                b"LZW" => b"LZWDecode".to_vec(),
                b"A85" => b"ASCII85Decode".to_vec(),
                b"DCT" => b"DCTDecode".to_vec(),
                other => other.to_vec(),
            }
        };
        match object {
            Object::Name(name) => Object::Name(expand(name)),
            Object::Array(items) => Object::Array(
                items
                    .iter()
                    .map(|item| match item {
                        Object::Name(name) => Object::Name(expand(name)),
                        other => other.clone(),
                    })
                    .collect(),
            ),
            other => other.clone(),
        }
    };

    let mut dict = Dictionary::new();
    for (name, object) in stream.dict.iter() {
        let full = key(name);
        let name = if full.is_empty() { name.clone() } else { full.to_vec() };
        dict.set(name, value(object));
    }
    Stream::new(dict, stream.content.clone())
}

/// Walk the page and its ancestors for an inheritable attribute.
fn inherited<'a>(doc: &'a Document, page: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    let mut current = page;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = current.get(key) {
            return resolve(doc, value);
        }
        current = current
            .get(b"Parent")
            .ok()
            .and_then(|parent| resolve(doc, parent))
            .and_then(|parent| parent.as_dict().ok())?;
    }
    None
}

/// MediaBox normalised so that x0 < x1 and y0 < y1.
fn media_box(doc: &Document, page: &Dictionary) -> [f64; 4] {
    let parsed = inherited(doc, page, b"MediaBox")
        .and_then(|object| object.as_array().ok())
        .filter(|values| values.len() == 4)
        .and_then(|values| {
            let mut out = [0.0; 4];
            for (slot, value) in out.iter_mut().zip(values) {
                *slot = number(resolve(doc, value)?)?;
            }
            Some(out)
        });
    let [ax, ay, bx, by] = parsed.unwrap_or(DEFAULT_MEDIA_BOX);
    [ax.min(bx), ay.min(by), ax.max(bx), ay.max(by)]
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(value) => Some(*value as f64),
        Object::Real(value) => Some(f64::from(*value)),
        _ => None,
    }
}

/// Exactly `N` numeric operands.
fn numbers<const N: usize>(operands: &[Object]) -> Option<[f64; N]> {
    if operands.len() != N {
        return None;
    }
    let mut out = [0.0; N];
    for (slot, operand) in out.iter_mut().zip(operands) {
        *slot = number(operand)?;
    }
    Some(out)
}

fn integer(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<u32> {
    match dict.get(key).ok().and_then(|object| resolve(doc, object))? {
        Object::Integer(value) => u32::try_from(*value).ok(),
        _ => None,
    }
}

fn name_of<'a>(dict: &'a Dictionary, key: &[u8]) -> Option<&'a [u8]> {
    match dict.get(key).ok()? {
        Object::Name(name) => Some(name.as_slice()),
        _ => None,
    }
}

/// Stream filters in decoding order.
fn filter_names(dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(names)) => names
            .iter()
            .filter_map(|name| name.as_name().ok().map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

/// Filters `lopdf` can undo on its own.
fn is_generic_filter(name: &[u8]) -> bool {
    matches!(name, b"FlateDecode" | b"LZWDecode" | b"ASCII85Decode")
}

/// Stream payload with its filters undone; unfiltered streams are returned
/// as stored.
fn stream_bytes(stream: &Stream) -> lopdf::Result<Vec<u8>> {
    if stream.dict.has(b"Filter") {
        stream.decompressed_content()
    } else {
        Ok(stream.content.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn page_with(
        doc: &mut Document,
        media_box: [i64; 4],
        ops: Vec<Operation>,
        xobjects: Dictionary,
    ) -> ObjectId {
        let pages_id = doc.new_object_id();
        let content = Content { operations: ops }.encode().unwrap();
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => media_box.iter().map(|v| Object::Integer(*v)).collect::<Vec<_>>(),
            "Resources" => dictionary! { "XObject" => xobjects },
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);
        page_id
    }

    fn raw_rgb_image(doc: &mut Document, width: i64, height: i64, rgb: [u8; 3]) -> ObjectId {
        let samples = rgb.repeat((width * height) as usize);
        doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            samples,
        ))
    }

    fn op(operator: &str, operands: &[i64]) -> Operation {
        Operation::new(operator, operands.iter().map(|v| Object::Integer(*v)).collect())
    }

    fn draw(name: &str, w: i64, h: i64, x: i64, y: i64) -> Vec<Operation> {
        vec![
            op("q", &[]),
            op("cm", &[w, 0, 0, h, x, y]),
            Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]),
            op("Q", &[]),
        ]
    }

    fn pixel(surface: &PixelSurface, x: u32, y: u32) -> [u8; 3] {
        surface.as_dynamic().to_rgb8().get_pixel(x, y).0
    }

    fn at_unit_scale() -> RenderOptions {
        RenderOptions {
            scale: 1.0,
            max_edge: 1000,
        }
    }

    #[test]
    fn matrix_concatenation_applies_left_first() {
        let scale = Matrix([2.0, 0.0, 0.0, 2.0, 0.0, 0.0]);
        let translate = Matrix([1.0, 0.0, 0.0, 1.0, 10.0, 5.0]);
        // Scale, then translate.
        assert_eq!(scale.then(&translate).0, [2.0, 0.0, 0.0, 2.0, 10.0, 5.0]);
        // Translate, then scale.
        assert_eq!(translate.then(&scale).0, [2.0, 0.0, 0.0, 2.0, 20.0, 10.0]);
    }

    #[test]
    fn blank_page_is_white_at_scale() {
        let mut doc = Document::with_version("1.5");
        let page_id = page_with(&mut doc, [0, 0, 50, 20], vec![], Dictionary::new());

        let surface = render_page(&doc, page_id, 0, &RenderOptions::default()).unwrap();
        assert_eq!((surface.width(), surface.height()), (100, 40));
        assert!(!surface.has_alpha());
        assert_eq!(pixel(&surface, 50, 20), [255, 255, 255]);
    }

    #[test]
    fn image_lands_in_the_right_place() {
        let mut doc = Document::with_version("1.5");
        let image_id = raw_rgb_image(&mut doc, 4, 4, [200, 0, 0]);
        // Lower-left quarter of a 100x100 page.
        let page_id = page_with(
            &mut doc,
            [0, 0, 100, 100],
            draw("Im0", 50, 50, 0, 0),
            dictionary! { "Im0" => image_id },
        );

        let surface = render_page(&doc, page_id, 0, &at_unit_scale()).unwrap();

        assert_eq!(pixel(&surface, 25, 75), [200, 0, 0]);
        // Image edges are covered right up to the boundary.
        assert_eq!(pixel(&surface, 49, 50), [200, 0, 0]);
        assert_eq!(pixel(&surface, 75, 25), [255, 255, 255]);
        assert_eq!(pixel(&surface, 75, 75), [255, 255, 255]);
    }

    #[test]
    fn oversized_page_renders_at_reduced_scale() {
        let mut doc = Document::with_version("1.5");
        let page_id = page_with(&mut doc, [0, 0, 500, 250], vec![], Dictionary::new());
        let options = RenderOptions {
            scale: 2.0,
            max_edge: 400,
        };
        let surface = render_page(&doc, page_id, 0, &options).unwrap();
        assert_eq!((surface.width(), surface.height()), (400, 200));
    }

    #[test]
    fn empty_page_box_fails_with_its_index() {
        let mut doc = Document::with_version("1.5");
        let page_id = page_with(&mut doc, [0, 0, 0, 10], vec![], Dictionary::new());
        let err = render_page(&doc, page_id, 3, &RenderOptions::default()).unwrap_err();
        assert!(matches!(err, ConvertError::PageRender { page_index: 3, .. }));
    }

    #[test]
    fn truncated_samples_fail() {
        let mut doc = Document::with_version("1.5");
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Subtype" => "Image",
                "Width" => 10,
                "Height" => 10,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            vec![0; 12],
        ));
        let page_id = page_with(
            &mut doc,
            [0, 0, 10, 10],
            draw("Im0", 10, 10, 0, 0),
            dictionary! { "Im0" => image_id },
        );
        assert!(matches!(
            render_page(&doc, page_id, 0, &RenderOptions::default()),
            Err(ConvertError::PageRender { .. })
        ));
    }

    #[test]
    fn unsupported_image_filter_fails_the_page() {
        let mut doc = Document::with_version("1.5");
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Subtype" => "Image",
                "Width" => 2,
                "Height" => 2,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "JPXDecode",
            },
            vec![1, 2, 3],
        ));
        let page_id = page_with(
            &mut doc,
            [0, 0, 10, 10],
            draw("Im0", 10, 10, 0, 0),
            dictionary! { "Im0" => image_id },
        );
        let err = render_page(&doc, page_id, 1, &RenderOptions::default()).unwrap_err();
        let ConvertError::PageRender { page_index, reason } = err else {
            panic!("expected a page error");
        };
        assert_eq!(page_index, 1);
        assert!(reason.contains("JPXDecode"), "{reason}");
    }

    #[test]
    fn missing_xobject_fails_the_page() {
        let mut doc = Document::with_version("1.5");
        let ops = draw("Gone", 10, 10, 0, 0);
        let page_id = page_with(&mut doc, [0, 0, 10, 10], ops, Dictionary::new());
        assert!(matches!(
            render_page(&doc, page_id, 0, &RenderOptions::default()),
            Err(ConvertError::PageRender { .. })
        ));
    }

    #[test]
    fn visible_text_fails_the_page() {
        let mut doc = Document::with_version("1.5");
        let ops = vec![
            op("BT", &[]),
            Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(48)]),
            op("Td", &[20, 80]),
            Operation::new("Tj", vec![Object::string_literal("HELLO WORLD")]),
            op("ET", &[]),
            op("re", &[10, 10, 100, 40]),
            op("f", &[]),
        ];
        let page_id = page_with(&mut doc, [0, 0, 400, 200], ops, Dictionary::new());

        let err = render_page(&doc, page_id, 0, &RenderOptions::default()).unwrap_err();
        let ConvertError::PageRender { reason, .. } = err else {
            panic!("expected a page error");
        };
        assert!(reason.contains("text"), "{reason}");
    }

    #[test]
    fn invisible_text_layer_is_allowed() {
        let mut doc = Document::with_version("1.5");
        let ops = vec![
            op("BT", &[]),
            op("Tr", &[3]),
            Operation::new("Tj", vec![Object::string_literal("scanned words")]),
            op("ET", &[]),
        ];
        let page_id = page_with(&mut doc, [0, 0, 20, 20], ops, Dictionary::new());
        let surface = render_page(&doc, page_id, 0, &at_unit_scale()).unwrap();
        assert_eq!(pixel(&surface, 10, 10), [255, 255, 255]);
    }

    #[test]
    fn shading_fails_the_page() {
        let mut doc = Document::with_version("1.5");
        let ops = vec![Operation::new("sh", vec![Object::Name(b"Sh0".to_vec())])];
        let page_id = page_with(&mut doc, [0, 0, 20, 20], ops, Dictionary::new());
        assert!(render_page(&doc, page_id, 0, &at_unit_scale()).is_err());
    }

    #[test]
    fn filled_rectangle_is_painted() {
        let mut doc = Document::with_version("1.5");
        let ops = vec![
            op("rg", &[0, 0, 1]),
            op("re", &[10, 10, 30, 20]),
            op("f", &[]),
        ];
        let page_id = page_with(&mut doc, [0, 0, 100, 100], ops, Dictionary::new());
        let surface = render_page(&doc, page_id, 0, &at_unit_scale()).unwrap();

        // User y 10..30 is canvas rows 70..90.
        assert_eq!(pixel(&surface, 25, 80), [0, 0, 255]);
        assert_eq!(pixel(&surface, 5, 5), [255, 255, 255]);
        assert_eq!(pixel(&surface, 50, 80), [255, 255, 255]);
    }

    #[test]
    fn fill_rules_differ_for_nested_rectangles() {
        let nested = |fill: &str| {
            vec![
                op("re", &[10, 10, 80, 80]),
                op("re", &[30, 30, 40, 40]),
                op(fill, &[]),
            ]
        };

        let mut doc = Document::with_version("1.5");
        let page_id = page_with(&mut doc, [0, 0, 100, 100], nested("f*"), Dictionary::new());
        let even_odd = render_page(&doc, page_id, 0, &at_unit_scale()).unwrap();
        assert_eq!(pixel(&even_odd, 50, 50), [255, 255, 255]);
        assert_eq!(pixel(&even_odd, 20, 50), [0, 0, 0]);

        let mut doc = Document::with_version("1.5");
        let page_id = page_with(&mut doc, [0, 0, 100, 100], nested("f"), Dictionary::new());
        let non_zero = render_page(&doc, page_id, 0, &at_unit_scale()).unwrap();
        assert_eq!(pixel(&non_zero, 50, 50), [0, 0, 0]);
    }

    #[test]
    fn stroked_line_is_painted() {
        let mut doc = Document::with_version("1.5");
        let ops = vec![
            op("RG", &[1, 0, 0]),
            op("w", &[4]),
            op("m", &[0, 50]),
            op("l", &[100, 50]),
            op("S", &[]),
        ];
        let page_id = page_with(&mut doc, [0, 0, 100, 100], ops, Dictionary::new());
        let surface = render_page(&doc, page_id, 0, &at_unit_scale()).unwrap();
        assert_eq!(pixel(&surface, 50, 50), [255, 0, 0]);
        assert_eq!(pixel(&surface, 50, 40), [255, 255, 255]);
    }

    #[test]
    fn stencil_mask_paints_in_fill_colour() {
        let mut doc = Document::with_version("1.5");
        // Left sample 0 (paints), right sample 1 (transparent).
        let mask_id = doc.add_object(Stream::new(
            dictionary! {
                "Subtype" => "Image",
                "Width" => 2,
                "Height" => 1,
                "ImageMask" => true,
            },
            vec![0b0100_0000],
        ));
        let mut ops = vec![op("rg", &[0, 1, 0])];
        ops.extend(draw("Mk", 100, 100, 0, 0));
        let page_id = page_with(&mut doc, [0, 0, 100, 100], ops, dictionary! { "Mk" => mask_id });

        let surface = render_page(&doc, page_id, 0, &at_unit_scale()).unwrap();
        let [r, g, b] = pixel(&surface, 10, 50);
        assert!(r < 15 && g > 240 && b < 15, "{:?}", [r, g, b]);
        assert_eq!(pixel(&surface, 90, 50), [255, 255, 255]);
    }

    #[test]
    fn rotate_swaps_canvas_edges() {
        let mut doc = Document::with_version("1.5");
        let page_id = page_with(&mut doc, [0, 0, 30, 10], vec![], Dictionary::new());
        if let Ok(Object::Dictionary(page)) = doc.get_object_mut(page_id) {
            page.set("Rotate", 90);
        }
        let options = RenderOptions {
            scale: 1.0,
            max_edge: 100,
        };
        let surface = render_page(&doc, page_id, 0, &options).unwrap();
        assert_eq!((surface.width(), surface.height()), (10, 30));
    }

    #[test]
    fn cmyk_and_gray_samples_convert() {
        let cmyk = raw_to_rgba(&[0, 0, 0, 0, 0, 0, 0, 255], 2, 1, 4).unwrap();
        assert_eq!(cmyk.get_pixel(0, 0).0, [255, 255, 255, 255]);
        assert_eq!(cmyk.get_pixel(1, 0).0, [0, 0, 0, 255]);

        let gray = raw_to_rgba(&[7], 1, 1, 1).unwrap();
        assert_eq!(gray.get_pixel(0, 0).0, [7, 7, 7, 255]);

        assert!(raw_to_rgba(&[1, 2], 1, 1, 3).is_none());
    }

    #[test]
    fn low_bit_depths_unpack_per_row() {
        assert_eq!(unpack_samples(&[0b1010_0000], 3, 1, 1, 1), Some(vec![255, 0, 255]));
        assert_eq!(unpack_samples(&[0b1101_0000], 2, 1, 1, 2), Some(vec![255, 85]));
        // Each row starts on a fresh byte.
        assert_eq!(
            unpack_samples(&[0b1000_0000, 0b0100_0000], 2, 2, 1, 1),
            Some(vec![255, 0, 0, 255])
        );
        assert_eq!(unpack_samples(&[0xff], 3, 2, 1, 1), None);
    }

    #[test]
    fn device_colours() {
        assert_eq!(device_colour(&[0.5]), Some(Rgba([128, 128, 128, 255])));
        assert_eq!(device_colour(&[0.0, 0.0, 0.0, 1.0]), Some(BLACK));
        assert_eq!(device_colour(&[1.0, 0.0]), None);
    }
}
