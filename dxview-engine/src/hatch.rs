use dxview_core::document::{Hatch, HatchEdge, HatchLoop, HatchPatternLine};
use dxview_core::geometry::{Bounds2D, Point2, Vector2};
use serde::Serialize;
use tracing::warn;

use crate::geometry::{
    append_points, apply_line_pattern_limited, arc_points, bulge_points, ellipse_points,
    points_close, spline_points,
};
use crate::style::LinePattern;

const PARALLEL_EPSILON: f64 = 1e-12;
const SPACING_EPSILON: f64 = 1e-9;

/// 图案填充输出的上限。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HatchLimits {
    pub max_segments: usize,
    pub max_lines_per_pattern: usize,
}

impl Default for HatchLimits {
    fn default() -> Self {
        Self {
            max_segments: 20_000,
            max_lines_per_pattern: 2_000,
        }
    }
}

fn edge_points(edge: &HatchEdge) -> Vec<Point2> {
    match edge {
        HatchEdge::Line { start, end } => vec![*start, *end],
        HatchEdge::PolylineSegment { start, end, bulge } => bulge_points(*start, *end, *bulge),
        HatchEdge::Arc {
            center,
            radius,
            start_angle,
            end_angle,
            is_counter_clockwise,
        } => {
            // 顺时针边界存的是镜像角度
            if *is_counter_clockwise {
                arc_points(*center, *radius, *start_angle, *end_angle, true)
            } else {
                arc_points(*center, *radius, -start_angle, -end_angle, false)
            }
        }
        HatchEdge::Ellipse {
            center,
            major_axis,
            minor_ratio,
            start_angle,
            end_angle,
            is_counter_clockwise,
        } => {
            if *is_counter_clockwise {
                ellipse_points(*center, *major_axis, *minor_ratio, *start_angle, *end_angle, true)
            } else {
                ellipse_points(
                    *center,
                    *major_axis,
                    *minor_ratio,
                    -start_angle,
                    -end_angle,
                    false,
                )
            }
        }
        HatchEdge::Spline {
            degree,
            knot_values,
            weights,
            control_points,
            fit_points,
        } => spline_points(*degree, knot_values, weights, control_points, fit_points),
    }
}

/// 把边界环展平为闭合多边形（首尾相同），点数不足时返回 `None`。
pub fn loop_polygon(boundary: &HatchLoop) -> Option<Vec<Point2>> {
    let mut points = Vec::new();
    for edge in &boundary.edges {
        append_points(&mut points, edge_points(edge));
    }
    let first = *points.first()?;
    if let Some(last) = points.last() {
        if !points_close(*last, first) {
            points.push(first);
        }
    }
    (points.len() >= 3).then_some(points)
}

/// 多边形的边，按顺序返回端点对。
pub fn polygon_segments(polygon: &[Point2]) -> Vec<(Point2, Point2)> {
    polygon
        .windows(2)
        .map(|pair| (pair[0], pair[1]))
        .chain(closing_edge(polygon))
        .collect()
}

fn closing_edge(polygon: &[Point2]) -> Option<(Point2, Point2)> {
    let first = *polygon.first()?;
    let last = *polygon.last()?;
    (polygon.len() > 2 && !points_close(first, last)).then_some((last, first))
}

/// 射线法的边界取舍规则：一条边只有在一个端点严格高于测试点、另一个端点不高于测试点时才计入穿越。
///
/// 顶点恰好与测试点同高时只算作较低端点，因此水平边永远不计入。
pub fn half_open_crossing(a: Point2, b: Point2, point: Point2) -> bool {
    if (a.y() > point.y()) == (b.y() > point.y()) {
        return false;
    }
    let x = (b.x() - a.x()) * (point.y() - a.y()) / (b.y() - a.y()) + a.x();
    point.x() < x
}

/// 奇偶规则的点在多边形内判断，多边形可以首尾闭合也可以不闭合。
pub fn point_in_polygon(point: Point2, polygon: &[Point2]) -> bool {
    polygon_segments(polygon)
        .into_iter()
        .filter(|(a, b)| half_open_crossing(*a, *b, point))
        .count()
        % 2
        == 1
}

/// 多个环组成的区域：被奇数个环包含的点在区域内。
pub fn point_in_region(point: Point2, polygons: &[Vec<Point2>]) -> bool {
    polygons
        .iter()
        .filter(|polygon| point_in_polygon(point, polygon))
        .count()
        % 2
        == 1
}

/// 线段裁剪到单个多边形内。
pub fn clip_segment_to_polygon(
    start: Point2,
    end: Point2,
    polygon: &[Point2],
) -> Vec<(Point2, Point2)> {
    clip_segment_to_region(start, end, &[polygon.to_vec()])
}

/// 线段裁剪到多环区域内，按线段参数排序穿越点，逐段取中点判断内外。
pub fn clip_segment_to_region(
    start: Point2,
    end: Point2,
    polygons: &[Vec<Point2>],
) -> Vec<(Point2, Point2)> {
    let direction = start.vector_to(end);
    if direction.length_squared() <= PARALLEL_EPSILON {
        return Vec::new();
    }

    let mut params = vec![0.0, 1.0];
    for polygon in polygons {
        for (a, b) in polygon_segments(polygon) {
            if let Some(t) = crossing_parameter(start, direction, a, b) {
                params.push(t);
            }
        }
    }
    params.sort_by(f64::total_cmp);
    params.dedup_by(|a, b| (*a - *b).abs() <= PARALLEL_EPSILON);

    let mut pieces: Vec<(f64, f64)> = Vec::new();
    for pair in params.windows(2) {
        let (t0, t1) = (pair[0], pair[1]);
        let middle = start.lerp(end, (t0 + t1) / 2.0);
        if !point_in_region(middle, polygons) {
            continue;
        }
        match pieces.last_mut() {
            Some(last) if (last.1 - t0).abs() <= PARALLEL_EPSILON => last.1 = t1,
            _ => pieces.push((t0, t1)),
        }
    }
    pieces
        .into_iter()
        .map(|(t0, t1)| (start.lerp(end, t0), start.lerp(end, t1)))
        .collect()
}

fn crossing_parameter(origin: Point2, direction: Vector2, a: Point2, b: Point2) -> Option<f64> {
    let edge = a.vector_to(b);
    let denominator = direction.cross(edge);
    if denominator.abs() <= PARALLEL_EPSILON {
        return None;
    }
    let to_edge = origin.vector_to(a);
    let t = to_edge.cross(edge) / denominator;
    let u = to_edge.cross(direction) / denominator;
    ((0.0..=1.0).contains(&u) && t > 0.0 && t < 1.0).then_some(t)
}

/// 图案填充结果。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatternFill {
    pub segments: Vec<(Point2, Point2)>,
    pub truncated: bool,
}

/// 每条输出线段允许消耗的图案推进步数；落在边界外的虚线也计入。
const PATTERN_WORK_FACTOR: usize = 4;

/// 按图案线族在边界范围内铺设平行线并裁剪到边界。
///
/// 输出线段数与生成过程中推进的图案元素数都受 `limits` 约束，超出时结果标记为截断。
pub fn pattern_segments(
    pattern_lines: &[HatchPatternLine],
    polygons: &[Vec<Point2>],
    limits: HatchLimits,
) -> PatternFill {
    let mut fill = PatternFill::default();
    let bounds = Bounds2D::from_points(polygons.iter().flatten());
    if bounds.is_empty() {
        return fill;
    }
    let mut work = limits.max_segments.saturating_mul(PATTERN_WORK_FACTOR);
    for line in pattern_lines {
        if fill.segments.len() >= limits.max_segments || work == 0 {
            fill.truncated = true;
            break;
        }
        lay_pattern_line(line, polygons, &bounds, limits, &mut work, &mut fill);
    }
    if fill.truncated {
        warn!(
            segments = fill.segments.len(),
            "填充图案超过上限，已截断"
        );
    }
    fill
}

fn lay_pattern_line(
    line: &HatchPatternLine,
    polygons: &[Vec<Point2>],
    bounds: &Bounds2D,
    limits: HatchLimits,
    work: &mut usize,
    fill: &mut PatternFill,
) {
    let along = Vector2::from_angle(line.angle);
    let normal = along.perp();
    let mut offset = line.offset;
    let mut spacing = offset.dot(normal);
    if spacing.abs() < SPACING_EPSILON {
        return;
    }
    if spacing < 0.0 {
        offset = Vector2::from(-offset.as_vec2());
        spacing = -spacing;
    }

    let base = line.base_point;
    let corners = bounds.corners();
    let (low, high) = projected_range(&corners, base, normal);
    // 行号保持浮点，极小间距配合极大范围时整数会溢出
    let first = (low / spacing).ceil();
    let last = (high / spacing).floor();
    if !first.is_finite() || !last.is_finite() || last < first {
        return;
    }
    let span = last - first + 1.0;
    let count = if span > limits.max_lines_per_pattern as f64 {
        fill.truncated = true;
        limits.max_lines_per_pattern
    } else {
        span as usize
    };

    let dashes = dash_pattern(&line.dashes);
    for step in 0..count {
        if *work == 0 {
            fill.truncated = true;
            return;
        }
        let k = first + step as f64;
        let origin = base.translate(Vector2::from(offset.as_vec2() * k));
        let (t_min, t_max) = projected_range(&corners, origin, along);
        let pieces = match &dashes {
            Some(pattern) => {
                // 虚线周期与本线原点对齐
                let t_start = (t_min / pattern.total_length).floor() * pattern.total_length;
                let start = origin.translate(Vector2::from(along.as_vec2() * t_start));
                let end = origin.translate(Vector2::from(along.as_vec2() * t_max));
                let (dashed, steps) = apply_line_pattern_limited(&[start, end], pattern, *work);
                *work = work.saturating_sub(steps);
                if dashed.truncated {
                    fill.truncated = true;
                    *work = 0;
                }
                dashed
                    .segments
                    .into_iter()
                    .flat_map(|(a, b)| clip_segment_to_region(a, b, polygons))
                    .collect()
            }
            None => {
                *work -= 1;
                let start = origin.translate(Vector2::from(along.as_vec2() * t_min));
                let end = origin.translate(Vector2::from(along.as_vec2() * t_max));
                clip_segment_to_region(start, end, polygons)
            }
        };
        for piece in pieces {
            if fill.segments.len() >= limits.max_segments {
                fill.truncated = true;
                return;
            }
            fill.segments.push(piece);
        }
    }
}

fn projected_range(points: &[Point2], origin: Point2, axis: Vector2) -> (f64, f64) {
    points
        .iter()
        .map(|point| origin.vector_to(*point).dot(axis))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(low, high), value| {
            (low.min(value), high.max(value))
        })
}

fn dash_pattern(dashes: &[f64]) -> Option<LinePattern> {
    if !dashes.iter().any(|value| *value < 0.0) {
        return None;
    }
    let total_length: f64 = dashes.iter().map(|value| value.abs()).sum();
    (total_length > SPACING_EPSILON).then(|| LinePattern {
        elements: dashes.to_vec(),
        total_length,
    })
}

/// 一个填充实体的推导结果：边界多边形与（非实体填充时的）图案线段。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HatchGeometry {
    pub polygons: Vec<Vec<Point2>>,
    pub pattern: PatternFill,
}

pub fn hatch_geometry(hatch: &Hatch, limits: HatchLimits) -> HatchGeometry {
    let polygons: Vec<Vec<Point2>> = hatch.loops.iter().filter_map(loop_polygon).collect();
    let pattern = if hatch.is_solid || polygons.is_empty() {
        PatternFill::default()
    } else {
        pattern_segments(&hatch.pattern_lines, &polygons, limits)
    };
    HatchGeometry { polygons, pattern }
}
