use std::f64::consts::TAU;

use dxview_core::geometry::{Point2, Vector2};
use glam::DVec2;
use serde::Serialize;
use tracing::warn;

use crate::errors::EngineError;
use crate::style::LinePattern;

/// 凸度绝对值低于该值时视为直线段。
pub const BULGE_EPSILON: f64 = 1e-9;
/// 两直线求交时行列式的判零阈值。
pub const INTERSECTION_EPSILON: f64 = 1e-10;
/// 角度落在扫掠边界上的容差。
pub const ANGLE_EPSILON: f64 = 1e-9;

const MIN_BULGE_SEGMENTS: usize = 8;
const MIN_ARC_SEGMENTS: usize = 16;
const MIN_ELLIPSE_SEGMENTS: usize = 32;
const SEGMENTS_PER_TURN: f64 = 64.0;
const SPLINE_SAMPLES_PER_POINT: usize = 10;
const MIN_SPLINE_SAMPLES: usize = 50;
const LENGTH_EPSILON: f64 = 1e-12;

/// 将角度归一化到 `[0, 2π)`。
pub fn normalize_angle(angle: f64) -> f64 {
    let result = angle.rem_euclid(TAU);
    if result >= TAU { 0.0 } else { result }
}

/// 判断 `angle` 是否位于从 `start` 逆时针扫到 `end` 的圆弧内（两端包含）。
pub fn is_angle_in_sweep(start: f64, end: f64, angle: f64) -> bool {
    let start = normalize_angle(start);
    let end = normalize_angle(end);
    let angle = normalize_angle(angle);
    if start <= end {
        angle >= start - ANGLE_EPSILON && angle <= end + ANGLE_EPSILON
    } else {
        // 扫掠跨过 0 弧度
        angle >= start - ANGLE_EPSILON || angle <= end + ANGLE_EPSILON
    }
}

/// 把起止角整理成可直接插值的区间：逆时针时 `end > start`，顺时针时 `start > end`。
pub fn canonical_angle_range(start: f64, end: f64, ccw: bool) -> (f64, f64) {
    let start = normalize_angle(start);
    let end = normalize_angle(end);
    if ccw {
        if (end - start).abs() < ANGLE_EPSILON {
            (start, start + TAU)
        } else if end < start {
            (start, end + TAU)
        } else {
            (start, end)
        }
    } else if (start - end).abs() < ANGLE_EPSILON {
        (start + TAU, start)
    } else if start < end {
        (start + TAU, end)
    } else {
        (start, end)
    }
}

/// 求两条无限直线 `p1p2` 与 `p3p4` 的交点，平行或重合时返回 `None`。
pub fn line_intersection(p1: Point2, p2: Point2, p3: Point2, p4: Point2) -> Option<Point2> {
    let d1 = p1.vector_to(p2);
    let d2 = p3.vector_to(p4);
    let det = d1.cross(d2);
    if det.abs() < INTERSECTION_EPSILON {
        return None;
    }
    let t = p1.vector_to(p3).cross(d2) / det;
    Some(p1.translate(Vector2::from(d1.as_vec2() * t)))
}

#[inline]
pub fn point_on_circle(center: Point2, radius: f64, angle: f64) -> Point2 {
    center.translate(Vector2::new(radius * angle.cos(), radius * angle.sin()))
}

#[inline]
pub fn points_close(a: Point2, b: Point2) -> bool {
    (a.x() - b.x()).abs() < 1e-6 && (a.y() - b.y()).abs() < 1e-6
}

fn segment_count(span: f64, min_segments: usize) -> usize {
    ((span.abs() / (TAU / SEGMENTS_PER_TURN)).ceil() as usize).max(min_segments)
}

/// 整圆采样，首尾闭合。
pub fn circle_points(center: Point2, radius: f64) -> Vec<Point2> {
    arc_points(center, radius, 0.0, TAU, true)
}

/// 圆弧采样，半径非正时返回空序列。
pub fn arc_points(
    center: Point2,
    radius: f64,
    start_angle: f64,
    end_angle: f64,
    ccw: bool,
) -> Vec<Point2> {
    if radius <= f64::EPSILON {
        return Vec::new();
    }
    let (start, end) = canonical_angle_range(start_angle, end_angle, ccw);
    sweep_points(center, radius, start, end - start, MIN_ARC_SEGMENTS)
}

fn sweep_points(
    center: Point2,
    radius: f64,
    start: f64,
    span: f64,
    min_segments: usize,
) -> Vec<Point2> {
    let segments = segment_count(span, min_segments);
    (0..=segments)
        .map(|i| point_on_circle(center, radius, start + span * (i as f64 / segments as f64)))
        .collect()
}

/// 由两个顶点和凸度重建圆弧。
///
/// 凸度 `b = tan(θ/4)`，正值逆时针。退化情形（凸度过小或弦长为零）只返回两个端点。
pub fn bulge_points(start: Point2, end: Point2, bulge: f64) -> Vec<Point2> {
    let chord = start.vector_to(end);
    let chord_len = chord.length();
    if bulge.abs() < BULGE_EPSILON || chord_len <= f64::EPSILON {
        return vec![start, end];
    }
    let theta = 4.0 * bulge.atan();
    let half = theta / 2.0;
    let radius = chord_len / (2.0 * half.sin().abs());
    let Some(left) = chord.perp().normalize() else {
        return vec![start, end];
    };
    // 圆心到弦中点的有向距离，负值表示圆心在弦右侧
    let offset = chord_len / (2.0 * half.tan());
    let center = start
        .midpoint(end)
        .translate(Vector2::from(left.as_vec2() * offset));
    let start_angle = center.vector_to(start).angle();

    let segments = segment_count(theta, MIN_BULGE_SEGMENTS);
    let mut points: Vec<Point2> = (0..segments)
        .map(|i| point_on_circle(center, radius, start_angle + theta * (i as f64 / segments as f64)))
        .collect();
    points.push(end);
    points
}

/// 多段线顶点序列展开为折线，闭合时补上最后一段。
pub fn polyline_points(vertices: &[(Point2, f64)], closed: bool) -> Vec<Point2> {
    let mut points = Vec::new();
    if vertices.is_empty() {
        return points;
    }
    if vertices.len() == 1 {
        points.push(vertices[0].0);
        return points;
    }
    let count = if closed { vertices.len() } else { vertices.len() - 1 };
    for index in 0..count {
        let (start, bulge) = vertices[index];
        let (end, _) = vertices[(index + 1) % vertices.len()];
        append_points(&mut points, bulge_points(start, end, bulge));
    }
    points
}

/// 椭圆（或椭圆弧）采样，参数角以主轴为零点。
pub fn ellipse_points(
    center: Point2,
    major_axis: Vector2,
    ratio: f64,
    start_parameter: f64,
    end_parameter: f64,
    ccw: bool,
) -> Vec<Point2> {
    let major = major_axis.as_vec2();
    let major_length = major.length();
    if major_length <= f64::EPSILON {
        return Vec::new();
    }
    let minor = DVec2::new(-major.y, major.x) * ratio.abs();

    let (start, end) = canonical_angle_range(start_parameter, end_parameter, ccw);
    let span = end - start;
    let segments = segment_count(span, MIN_ELLIPSE_SEGMENTS);
    (0..=segments)
        .map(|i| {
            let angle = start + span * (i as f64 / segments as f64);
            Point2::from_vec(center.as_vec2() + major * angle.cos() + minor * angle.sin())
        })
        .collect()
}

/// 拼接一段边的采样点，去掉与上一段重合的连接点。
pub fn append_points(points: &mut Vec<Point2>, edge_points: Vec<Point2>) {
    let mut iter = edge_points.into_iter().peekable();
    if let (Some(last), Some(first)) = (points.last(), iter.peek()) {
        if points_close(*last, *first) {
            iter.next();
        }
    }
    points.extend(iter);
}

fn spline_sample_count(point_count: usize) -> usize {
    (point_count * SPLINE_SAMPLES_PER_POINT).max(MIN_SPLINE_SAMPLES)
}

/// 有理 B 样条（NURBS）采样，使用 de Boor 算法在有效节点区间上求值。
pub fn nurbs_points(
    degree: usize,
    knots: &[f64],
    control_points: &[Point2],
    weights: &[f64],
) -> Result<Vec<Point2>, EngineError> {
    let count = control_points.len();
    if degree == 0 || count <= degree {
        return Err(EngineError::geometry(
            "SPLINE",
            format!("degree {degree} needs more than {count} control points"),
        ));
    }
    if knots.len() != count + degree + 1 {
        return Err(EngineError::geometry(
            "SPLINE",
            format!("expected {} knots, found {}", count + degree + 1, knots.len()),
        ));
    }
    if !weights.is_empty() && weights.len() != count {
        return Err(EngineError::geometry(
            "SPLINE",
            format!("expected {count} weights, found {}", weights.len()),
        ));
    }

    let t_start = knots[degree];
    let t_end = knots[count];
    if !(t_end > t_start) {
        return Err(EngineError::geometry("SPLINE", "empty knot span"));
    }

    let samples = spline_sample_count(count);
    let mut points = Vec::with_capacity(samples + 1);
    for i in 0..=samples {
        let t = t_start + (t_end - t_start) * (i as f64 / samples as f64);
        points.push(de_boor(degree, knots, control_points, weights, t)?);
    }
    Ok(points)
}

fn knot_span(degree: usize, knots: &[f64], count: usize, t: f64) -> usize {
    if t >= knots[count] {
        // 末端参数落在最后一个非退化区间
        let mut span = count - 1;
        while span > degree && knots[span] >= knots[span + 1] {
            span -= 1;
        }
        return span;
    }
    let mut span = degree;
    while span + 1 < count && knots[span + 1] <= t {
        span += 1;
    }
    span
}

fn de_boor(
    degree: usize,
    knots: &[f64],
    control_points: &[Point2],
    weights: &[f64],
    t: f64,
) -> Result<Point2, EngineError> {
    let span = knot_span(degree, knots, control_points.len(), t);
    // 齐次坐标 (w·x, w·y, w)
    let mut d: Vec<(DVec2, f64)> = (0..=degree)
        .map(|j| {
            let index = j + span - degree;
            let weight = weights.get(index).copied().unwrap_or(1.0);
            (control_points[index].as_vec2() * weight, weight)
        })
        .collect();

    for r in 1..=degree {
        for j in (r..=degree).rev() {
            let i = j + span - degree;
            let denominator = knots[i + degree + 1 - r] - knots[i];
            let alpha = if denominator.abs() < f64::EPSILON {
                0.0
            } else {
                (t - knots[i]) / denominator
            };
            let (prev_point, prev_weight) = d[j - 1];
            let (point, weight) = d[j];
            d[j] = (
                prev_point * (1.0 - alpha) + point * alpha,
                prev_weight * (1.0 - alpha) + weight * alpha,
            );
        }
    }

    let (point, weight) = d[degree];
    if weight.abs() < f64::EPSILON || !weight.is_finite() {
        return Err(EngineError::geometry(
            "SPLINE",
            format!("degenerate weight at t={t}"),
        ));
    }
    let result = Point2::from_vec(point / weight);
    if result.is_finite() {
        Ok(result)
    } else {
        Err(EngineError::geometry("SPLINE", format!("non-finite point at t={t}")))
    }
}

/// 向心参数化的 Catmull-Rom 插值（非闭合）。
pub fn catmull_rom_points(points: &[Point2]) -> Vec<Point2> {
    if points.len() < 2 {
        return points.to_vec();
    }
    let samples = spline_sample_count(points.len());
    (0..=samples)
        .map(|i| catmull_rom_at(points, i as f64 / samples as f64))
        .collect()
}

fn catmull_rom_at(points: &[Point2], t: f64) -> Point2 {
    let last = points.len() - 1;
    let position = last as f64 * t;
    let mut index = position.floor() as usize;
    let mut weight = position - index as f64;
    if index >= last {
        index = last - 1;
        weight = 1.0;
    }

    let p1 = points[index].as_vec2();
    let p2 = points[index + 1].as_vec2();
    // 端点外侧用镜像点补齐
    let p0 = if index > 0 {
        points[index - 1].as_vec2()
    } else {
        p1 * 2.0 - p2
    };
    let p3 = if index + 2 <= last {
        points[index + 2].as_vec2()
    } else {
        p2 * 2.0 - p1
    };

    let mut dt0 = p0.distance_squared(p1).powf(0.25);
    let mut dt1 = p1.distance_squared(p2).powf(0.25);
    let mut dt2 = p2.distance_squared(p3).powf(0.25);
    if dt1 < 1e-4 {
        dt1 = 1.0;
    }
    if dt0 < 1e-4 {
        dt0 = dt1;
    }
    if dt2 < 1e-4 {
        dt2 = dt1;
    }

    let t1 = ((p1 - p0) / dt0 - (p2 - p0) / (dt0 + dt1) + (p2 - p1) / dt1) * dt1;
    let t2 = ((p2 - p1) / dt1 - (p3 - p1) / (dt1 + dt2) + (p3 - p2) / dt2) * dt1;

    let c2 = p1 * -3.0 + p2 * 3.0 - t1 * 2.0 - t2;
    let c3 = p1 * 2.0 - p2 * 2.0 + t1 + t2;
    let w2 = weight * weight;
    Point2::from_vec(p1 + t1 * weight + c2 * w2 + c3 * w2 * weight)
}

/// 样条采样：NURBS 数据完整时按 NURBS 求值，否则（或求值失败时）依次用拟合点、控制点做插值。
pub fn spline_points(
    degree: i32,
    knots: &[f64],
    weights: &[f64],
    control_points: &[Point2],
    fit_points: &[Point2],
) -> Vec<Point2> {
    let degree = usize::try_from(degree).unwrap_or(0);
    let has_nurbs = degree >= 1
        && control_points.len() > degree
        && knots.len() == control_points.len() + degree + 1;
    if has_nurbs {
        match nurbs_points(degree, knots, control_points, weights) {
            Ok(points) => return points,
            Err(err) => warn!(%err, "NURBS 求值失败，改用插值曲线"),
        }
    }
    let through = if fit_points.len() >= 2 || control_points.is_empty() {
        fit_points
    } else {
        control_points
    };
    catmull_rom_points(through)
}

/// 线型切分结果：实线段端点对与点位置。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashedPath {
    pub segments: Vec<(Point2, Point2)>,
    pub dots: Vec<Point2>,
    /// 图案元素步数超过上限，结果不完整。
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

/// 单条折线套用线型时最多推进的图案元素数。
pub const MAX_PATTERN_STEPS: usize = 200_000;

/// 沿折线累积长度套用循环线型，输出实线段与点。
///
/// 图案在折线拐角处连续推进：未结束的实线段在拐点断开后从拐点继续。
pub fn apply_line_pattern(points: &[Point2], pattern: &LinePattern) -> DashedPath {
    apply_line_pattern_limited(points, pattern, MAX_PATTERN_STEPS).0
}

/// 与 [`apply_line_pattern`] 相同，但最多推进 `max_steps` 个图案元素，并返回实际消耗的步数。
///
/// 按折线总长预估步数超过上限时直接返回空的截断结果，不做任何切分。
pub fn apply_line_pattern_limited(
    points: &[Point2],
    pattern: &LinePattern,
    max_steps: usize,
) -> (DashedPath, usize) {
    let mut path = DashedPath::default();
    if points.len() < 2 {
        return (path, 0);
    }
    let elements = &pattern.elements;
    if elements.is_empty() || pattern.total_length < LENGTH_EPSILON {
        path.segments = points
            .windows(2)
            .filter(|pair| pair[0].distance_to(pair[1]) > LENGTH_EPSILON)
            .map(|pair| (pair[0], pair[1]))
            .collect();
        let steps = path.segments.len();
        return (path, steps);
    }

    let total: f64 = points.windows(2).map(|pair| pair[0].distance_to(pair[1])).sum();
    let estimated = (total / pattern.total_length).ceil() * elements.len() as f64;
    if !estimated.is_finite() || estimated > max_steps as f64 {
        path.truncated = true;
        return (path, 0);
    }

    let mut steps = 0;
    let mut index = 0;
    let mut dash_start = None;
    let mut remaining = begin_element(
        elements,
        &mut index,
        points[0],
        &mut dash_start,
        &mut path,
        &mut steps,
    );

    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let length = a.distance_to(b);
        if length <= LENGTH_EPSILON {
            continue;
        }
        let mut position = 0.0;
        while length - position > LENGTH_EPSILON {
            let step = remaining.min(length - position);
            position += step;
            remaining -= step;
            if remaining <= LENGTH_EPSILON {
                let at = a.lerp(b, position / length);
                if let Some(start) = dash_start.take() {
                    path.segments.push((start, at));
                }
                if steps > max_steps {
                    path.truncated = true;
                    return (path, steps);
                }
                index = (index + 1) % elements.len();
                remaining =
                    begin_element(elements, &mut index, at, &mut dash_start, &mut path, &mut steps);
            }
        }
        if let Some(start) = dash_start {
            if !points_close(start, b) {
                path.segments.push((start, b));
            }
            dash_start = Some(b);
        }
    }
    (path, steps)
}

/// 进入第 `index` 个图案元素：零长度元素直接落点并跳过，返回新元素的长度。
fn begin_element(
    elements: &[f64],
    index: &mut usize,
    at: Point2,
    dash_start: &mut Option<Point2>,
    path: &mut DashedPath,
    steps: &mut usize,
) -> f64 {
    // total_length > 0 保证至少有一个非零元素
    while elements[*index] == 0.0 {
        path.dots.push(at);
        *steps += 1;
        *index = (*index + 1) % elements.len();
    }
    *steps += 1;
    let element = elements[*index];
    if element > 0.0 {
        *dash_start = Some(at);
    }
    element.abs()
}
