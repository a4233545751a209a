//! 几何提取：把原始 DXF 实体归一化为“有序点列 + 路径长度”，
//! 并汇总包围盒、总切割长度与实体数量。

use std::f64::consts::TAU;

use cutquote_core::document::{Arc, Circle, Document, Entity, Line, Polyline, Spline};
use cutquote_core::geometry::{Bounds2D, Point2};
use glam::DVec2;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::ExtractError;

/// 整圆近似所用的固定段数。
pub const CIRCLE_SEGMENTS: usize = 64;
/// 圆弧与 bulge 弧段的最少段数。
pub const MIN_ARC_SEGMENTS: usize = 16;

const BULGE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ShapeKind {
    Line,
    Circle {
        center: Point2,
        radius: f64,
    },
    /// 角度为弧度，`end_angle = start_angle + sweep`，逆时针。
    #[serde(rename_all = "camelCase")]
    Arc {
        center: Point2,
        radius: f64,
        start_angle: f64,
        end_angle: f64,
    },
    Polyline {
        closed: bool,
    },
    Spline,
}

/// 归一化后的图元，供计价与渲染使用。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Shape {
    #[serde(flatten)]
    pub kind: ShapeKind,
    pub points: Vec<Point2>,
    pub length: f64,
    pub layer: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

/// 汇总指标。没有任何点时所有字段为 0，不会出现无穷或 NaN。
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub width: f64,
    pub height: f64,
    pub total_length: f64,
    /// 默认为包围盒面积，可用 [`Metrics::with_area`] 覆盖。
    pub area: f64,
    pub bounds: MetricBounds,
    pub entity_count: usize,
}

impl Metrics {
    pub fn from_bounds(bounds: &Bounds2D, total_length: f64, entity_count: usize) -> Self {
        if bounds.is_empty() {
            return Self {
                total_length,
                entity_count,
                ..Self::default()
            };
        }
        let width = bounds.width();
        let height = bounds.height();
        Self {
            width,
            height,
            total_length,
            area: width * height,
            bounds: MetricBounds {
                min_x: bounds.min().x(),
                min_y: bounds.min().y(),
                max_x: bounds.max().x(),
                max_y: bounds.max().y(),
            },
            entity_count,
        }
    }

    /// 使用外部提供的面积（如按轮廓计算的真实面积）替换包围盒面积。
    pub fn with_area(mut self, area: f64) -> Self {
        self.area = area;
        self
    }

    #[inline]
    pub fn bounding_box_area(&self) -> f64 {
        self.width * self.height
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extraction {
    pub entities: Vec<Shape>,
    pub metrics: Metrics,
}

/// 提取文档中的全部几何。缺少实体表视为解析失败；
/// 单个实体无法归一化时静默跳过。
pub fn extract(document: &Document) -> Result<Extraction, ExtractError> {
    let table = document
        .entity_table()
        .ok_or(ExtractError::MissingEntityTable)?;
    let scale = document.units().millimeters_per_unit();

    let entities: Vec<Shape> = table
        .iter()
        .filter_map(|(id, entity)| {
            let shape = normalize_entity(entity, scale);
            if shape.is_none() {
                debug!(id = id.get(), kind = entity.kind_name(), "实体无法归一化，已跳过");
            }
            shape
        })
        .collect();
    let metrics = aggregate(&entities);
    if !(metrics.width.is_finite() && metrics.height.is_finite() && metrics.area.is_finite()) {
        warn!(
            width = metrics.width,
            height = metrics.height,
            area = metrics.area,
            "包围盒尺寸溢出，无法据此计价"
        );
    }

    info!(
        entity_count = metrics.entity_count,
        skipped = table.len() - entities.len(),
        total_length = metrics.total_length,
        width = metrics.width,
        height = metrics.height,
        "几何提取完成"
    );
    Ok(Extraction { entities, metrics })
}

/// 单遍累计长度与包围盒。
pub fn aggregate(shapes: &[Shape]) -> Metrics {
    let mut bounds = Bounds2D::empty();
    let mut total_length = 0.0;
    for shape in shapes {
        total_length += shape.length;
        for point in &shape.points {
            bounds.include_point(*point);
        }
    }
    Metrics::from_bounds(&bounds, total_length, shapes.len())
}

/// 归一化单个实体，`scale` 为图纸单位到毫米的比例。
/// 返回 `None` 表示实体损坏或不足以构成两个点。
pub fn normalize_entity(entity: &Entity, scale: f64) -> Option<Shape> {
    let shape = match entity {
        Entity::Line(line) => normalize_line(line, scale),
        Entity::Circle(circle) => normalize_circle(circle, scale),
        Entity::Arc(arc) => normalize_arc(arc, scale),
        Entity::Polyline(polyline) => normalize_polyline(polyline, scale),
        Entity::Spline(spline) => normalize_spline(spline, scale),
    }?;
    let valid = shape.points.len() >= 2
        && shape.length.is_finite()
        && shape.length >= 0.0
        && shape.points.iter().all(|p| p.is_finite());
    valid.then_some(shape)
}

fn normalize_line(line: &Line, scale: f64) -> Option<Shape> {
    let start = line.start.scale(scale);
    let end = line.end.scale(scale);
    Some(Shape {
        kind: ShapeKind::Line,
        length: start.distance_to(end),
        points: vec![start, end],
        layer: line.layer.clone(),
    })
}

fn normalize_circle(circle: &Circle, scale: f64) -> Option<Shape> {
    let center = circle.center.scale(scale);
    let radius = valid_radius(circle.radius * scale)?;
    let points = (0..=CIRCLE_SEGMENTS)
        .map(|i| point_on_circle(center, radius, TAU * i as f64 / CIRCLE_SEGMENTS as f64))
        .collect();
    Some(Shape {
        kind: ShapeKind::Circle { center, radius },
        points,
        length: TAU * radius,
        layer: circle.layer.clone(),
    })
}

fn normalize_arc(arc: &Arc, scale: f64) -> Option<Shape> {
    let center = arc.center.scale(scale);
    let radius = valid_radius(arc.radius * scale)?;
    if !arc.start_angle.is_finite() || !arc.end_angle.is_finite() {
        return None;
    }
    // 在角度制下归约到一圈以内，整数角度可精确取模
    let start_degrees = arc.start_angle.rem_euclid(360.0);
    let mut sweep_degrees = arc.end_angle.rem_euclid(360.0) - start_degrees;
    if sweep_degrees < 0.0 {
        sweep_degrees += 360.0;
    }
    // 起止角重合的圆弧没有可切割的路径
    if sweep_degrees <= 0.0 {
        return None;
    }
    let start_angle = start_degrees.to_radians();
    let sweep = sweep_degrees.to_radians();
    Some(Shape {
        kind: ShapeKind::Arc {
            center,
            radius,
            start_angle,
            end_angle: start_angle + sweep,
        },
        points: sample_arc(center.as_vec2(), radius, start_angle, sweep),
        length: radius * sweep,
        layer: arc.layer.clone(),
    })
}

fn normalize_polyline(polyline: &Polyline, scale: f64) -> Option<Shape> {
    let vertices = &polyline.vertices;
    if vertices.len() < 2 {
        return None;
    }

    let first = vertices[0].position.scale(scale);
    let mut points = vec![first];
    let mut length = 0.0;
    let mut previous = first;
    for pair in vertices.windows(2) {
        let next = pair[1].position.scale(scale);
        length += append_segment(&mut points, previous, next, pair[0].bulge);
        previous = next;
    }
    if polyline.is_closed {
        let last_bulge = vertices[vertices.len() - 1].bulge;
        length += append_segment(&mut points, previous, first, last_bulge);
    }

    Some(Shape {
        kind: ShapeKind::Polyline {
            closed: polyline.is_closed,
        },
        points,
        length,
        layer: polyline.layer.clone(),
    })
}

/// 控制多边形近似：不做 B 样条求值，按控制点连线；闭合样条补上首尾段。
fn normalize_spline(spline: &Spline, scale: f64) -> Option<Shape> {
    if spline.control_points.len() < 2 {
        return None;
    }
    let mut points: Vec<Point2> = spline
        .control_points
        .iter()
        .map(|p| p.scale(scale))
        .collect();
    if spline.is_closed && points.first() != points.last() {
        points.push(points[0]);
    }
    let length = points
        .windows(2)
        .map(|pair| pair[0].distance_to(pair[1]))
        .sum();
    Some(Shape {
        kind: ShapeKind::Spline,
        points,
        length,
        layer: spline.layer.clone(),
    })
}

/// 追加 `from -> to` 段的采样点（不含起点），返回该段长度。
fn append_segment(points: &mut Vec<Point2>, from: Point2, to: Point2, bulge: f64) -> f64 {
    match BulgeArc::from_chord(from.as_vec2(), to.as_vec2(), bulge) {
        Some(arc) => {
            let mut samples = sample_arc(arc.center, arc.radius, arc.start_angle, arc.sweep);
            // 末点用原顶点替换，避免三角函数误差破坏闭合
            samples.pop();
            points.extend(samples.into_iter().skip(1));
            points.push(to);
            arc.length()
        }
        None => {
            points.push(to);
            from.distance_to(to)
        }
    }
}

/// 由弦与 bulge 还原的圆弧。`sweep` 带符号，正值为逆时针。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BulgeArc {
    pub center: DVec2,
    pub radius: f64,
    pub start_angle: f64,
    pub sweep: f64,
}

impl BulgeArc {
    /// bulge = tan(θ/4)。圆心位于弦中点沿左法向偏移 (c/2)·cot(θ/2) 处，
    /// θ 为负时偏移方向随之反转。弦退化或 bulge 近零时返回 `None`（按直线段处理）。
    pub fn from_chord(start: DVec2, end: DVec2, bulge: f64) -> Option<Self> {
        if !bulge.is_finite() || bulge.abs() <= BULGE_EPSILON {
            return None;
        }
        let chord = end - start;
        let chord_len = chord.length();
        if chord_len <= f64::EPSILON {
            return None;
        }
        let sweep = 4.0 * bulge.atan();
        let half = sweep / 2.0;
        let offset = (chord_len / 2.0) / half.tan();
        let center = (start + end) * 0.5 + chord.perp() / chord_len * offset;
        let radius = chord_len / (2.0 * half.sin().abs());
        let radial = start - center;
        Some(Self {
            center,
            radius,
            start_angle: radial.y.atan2(radial.x),
            sweep,
        })
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.radius * self.sweep.abs()
    }
}

fn valid_radius(radius: f64) -> Option<f64> {
    (radius.is_finite() && radius > 0.0).then_some(radius)
}

/// 段数随扫掠角增长，整圆对应 [`CIRCLE_SEGMENTS`]。
fn arc_segments(sweep: f64) -> usize {
    let scaled = (sweep.abs() / TAU * CIRCLE_SEGMENTS as f64).ceil();
    if scaled.is_finite() {
        (scaled as usize).clamp(MIN_ARC_SEGMENTS, CIRCLE_SEGMENTS)
    } else {
        CIRCLE_SEGMENTS
    }
}

fn sample_arc(center: DVec2, radius: f64, start_angle: f64, sweep: f64) -> Vec<Point2> {
    let segments = arc_segments(sweep);
    let center = Point2::from_vec(center);
    (0..=segments)
        .map(|i| point_on_circle(center, radius, start_angle + sweep * i as f64 / segments as f64))
        .collect()
}

#[inline]
fn point_on_circle(center: Point2, radius: f64, angle: f64) -> Point2 {
    Point2::from_vec(center.as_vec2() + DVec2::new(angle.cos(), angle.sin()) * radius)
}
