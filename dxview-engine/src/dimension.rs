use std::f64::consts::PI;

use dxview_core::document::{Dimension, DimensionKind};
use dxview_core::geometry::{Point2, Vector2};
use serde::Serialize;

use crate::geometry::{
    arc_points, is_angle_in_sweep, line_intersection, normalize_angle, point_on_circle,
};

/// 文字中占位符，替换为实测值。
const MEASUREMENT_PLACEHOLDER: &str = "<>";
const RADIUS_PREFIX: &str = "R";
const DIAMETER_PREFIX: &str = "Ø";
const DEGREE_SUFFIX: &str = "°";

/// 保留至多 4 位小数并去掉末尾的 0，四舍五入为 0 时输出 `"0"`。
pub fn format_number(value: f64) -> String {
    let rounded = (value * 10_000.0).round() / 10_000.0;
    if rounded == 0.0 || !rounded.is_finite() {
        return "0".to_string();
    }
    let text = format!("{rounded:.4}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn is_angular(kind: DimensionKind) -> bool {
    matches!(kind, DimensionKind::Angular | DimensionKind::Angular3Point)
}

/// 参与测量的两个点：径向标注取定义点与径向点，其余取 13/14。
fn measured_pair(dimension: &Dimension) -> Option<(Point2, Point2)> {
    if dimension.kind.is_radial() {
        dimension
            .radial_point
            .map(|point| (dimension.definition_point, point))
    } else {
        dimension.first_point.zip(dimension.second_point)
    }
}

/// 实测值：优先使用组码 42 的存储值，其次按两测量点的距离计算。
///
/// 角度标注返回角度制数值。
pub fn dimension_value(dimension: &Dimension) -> Option<f64> {
    if is_angular(dimension.kind) {
        if let Some(measurement) = dimension.measurement {
            return Some(measurement.to_degrees());
        }
        return angular_arc(dimension).map(|arc| arc.sweep.to_degrees());
    }
    if let Some(measurement) = dimension.measurement {
        return Some(measurement);
    }
    let (first, second) = measured_pair(dimension)?;
    Some(first.distance_to(second))
}

fn formatted_value(dimension: &Dimension, value: f64) -> String {
    let number = format_number(value);
    match dimension.kind {
        DimensionKind::Radius => format!("{RADIUS_PREFIX}{number}"),
        DimensionKind::Diameter => format!("{DIAMETER_PREFIX}{number}"),
        kind if is_angular(kind) => format!("{number}{DEGREE_SUFFIX}"),
        _ => number,
    }
}

/// 计算标注的显示文字。
///
/// 显式文字原样输出，其中的 `<>` 替换为格式化后的实测值；没有显式文字时直接使用实测值。
/// 既没有存储值也缺少测量点时返回 `None`。
pub fn dimension_text(dimension: &Dimension) -> Option<String> {
    let explicit = dimension
        .text
        .as_deref()
        .filter(|text| !text.trim().is_empty());
    match explicit {
        Some(text) if !text.contains(MEASUREMENT_PLACEHOLDER) => Some(text.to_string()),
        Some(text) => {
            let value = dimension_value(dimension)?;
            Some(text.replace(MEASUREMENT_PLACEHOLDER, &formatted_value(dimension, value)))
        }
        None => {
            let value = dimension_value(dimension)?;
            Some(formatted_value(dimension, value))
        }
    }
}

/// 由标注锚点推导出的几何：若干折线与一段文字。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionGeometry {
    pub lines: Vec<Vec<Point2>>,
    pub text: String,
    pub text_position: Point2,
    pub text_rotation: f64,
    pub is_radial: bool,
}

/// 按标注类型生成尺寸线、延伸线与文字位置，测量点不足时返回 `None`。
pub fn dimension_geometry(dimension: &Dimension) -> Option<DimensionGeometry> {
    let text = dimension_text(dimension)?;
    let (lines, anchor, rotation) = match dimension.kind {
        DimensionKind::Linear | DimensionKind::Aligned => linear_lines(dimension)?,
        DimensionKind::Radius | DimensionKind::Diameter => radial_lines(dimension)?,
        DimensionKind::Angular | DimensionKind::Angular3Point => angular_lines(dimension)?,
        DimensionKind::Ordinate | DimensionKind::Unknown(_) => {
            let (first, second) = dimension.first_point.zip(dimension.second_point)?;
            (vec![vec![first, second]], second, 0.0)
        }
    };
    Some(DimensionGeometry {
        lines,
        text,
        text_position: dimension.text_midpoint.unwrap_or(anchor),
        text_rotation: rotation,
        is_radial: dimension.kind.is_radial(),
    })
}

type DerivedLines = (Vec<Vec<Point2>>, Point2, f64);

fn linear_lines(dimension: &Dimension) -> Option<DerivedLines> {
    let (first, second) = dimension.first_point.zip(dimension.second_point)?;
    let direction = match dimension.kind {
        DimensionKind::Aligned => first.vector_to(second).normalize()?,
        _ => Vector2::from_angle(dimension.rotation),
    };
    // 两测量点投影到过定义点、方向为 direction 的尺寸线上
    let through = dimension.definition_point;
    let project = |point: Point2| {
        let along = through.vector_to(point).dot(direction);
        through.translate(Vector2::from(direction.as_vec2() * along))
    };
    let start = project(first);
    let end = project(second);
    let lines = vec![vec![first, start], vec![second, end], vec![start, end]];
    Some((lines, start.midpoint(end), direction.angle()))
}

fn radial_lines(dimension: &Dimension) -> Option<DerivedLines> {
    let point = dimension.radial_point?;
    let anchor = dimension.definition_point;
    Some((vec![vec![anchor, point]], anchor.midpoint(point), 0.0))
}

struct AngularArc {
    center: Point2,
    radius: f64,
    start: f64,
    sweep: f64,
}

/// 角度标注的圆弧：两直线交点为圆心，弧线点（16）决定取哪一对方向。
fn angular_arc(dimension: &Dimension) -> Option<AngularArc> {
    let (center, first, second) = match dimension.kind {
        DimensionKind::Angular3Point => {
            let center = dimension.radial_point?;
            let (first, second) = dimension.first_point.zip(dimension.second_point)?;
            (center, first, second)
        }
        _ => {
            let (a1, a2) = dimension.first_point.zip(dimension.second_point)?;
            let b1 = dimension.definition_point;
            let b2 = dimension.radial_point?;
            let center = line_intersection(a1, a2, b1, b2)?;
            let far = |p: Point2, q: Point2| {
                if center.distance_to(p) >= center.distance_to(q) { p } else { q }
            };
            (center, far(a1, a2), far(b1, b2))
        }
    };
    let arc_point = dimension.arc_point.unwrap_or(dimension.definition_point);
    let radius = center.distance_to(arc_point);
    let first_angle = center.vector_to(first).angle();
    let second_angle = center.vector_to(second).angle();
    let target = center.vector_to(arc_point).angle();

    // 在四种方向组合中选包含弧线点的最小扫掠
    let candidates = [
        (first_angle, second_angle),
        (second_angle, first_angle),
        (first_angle + PI, second_angle + PI),
        (second_angle + PI, first_angle + PI),
    ];
    let (start, sweep) = candidates
        .iter()
        .filter(|(start, end)| is_angle_in_sweep(*start, *end, target))
        .map(|(start, end)| {
            let start = normalize_angle(*start);
            (start, normalize_angle(*end - start))
        })
        .filter(|(_, sweep)| *sweep > 0.0)
        .min_by(|a, b| a.1.total_cmp(&b.1))?;
    Some(AngularArc {
        center,
        radius,
        start,
        sweep,
    })
}

fn angular_lines(dimension: &Dimension) -> Option<DerivedLines> {
    let arc = angular_arc(dimension)?;
    if arc.radius <= f64::EPSILON {
        return None;
    }
    let points = arc_points(arc.center, arc.radius, arc.start, arc.start + arc.sweep, true);
    let middle = arc.start + arc.sweep / 2.0;
    let anchor = point_on_circle(arc.center, arc.radius, middle);
    Some((vec![points], anchor, 0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(first: Point2, second: Point2, definition: Point2) -> Dimension {
        Dimension {
            first_point: Some(first),
            second_point: Some(second),
            definition_point: definition,
            ..Dimension::default()
        }
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(10.0), "10");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(2.125), "2.125");
        assert_eq!(format_number(3.14159), "3.1416");
        assert_eq!(format_number(0.00001), "0");
        assert_eq!(format_number(-0.00001), "0");
        assert_eq!(format_number(-2.25), "-2.25");
    }

    #[test]
    fn distance_is_used_without_text_or_measurement() {
        let dimension = linear(
            Point2::new(0.0, 0.0),
            Point2::new(3.0, 4.0),
            Point2::new(0.0, 5.0),
        );
        assert_eq!(dimension_text(&dimension).as_deref(), Some("5"));
    }

    #[test]
    fn stored_measurement_wins_over_distance() {
        let mut dimension = linear(
            Point2::new(0.0, 0.0),
            Point2::new(3.0, 4.0),
            Point2::new(0.0, 5.0),
        );
        dimension.measurement = Some(12.3456789);
        assert_eq!(dimension_text(&dimension).as_deref(), Some("12.3457"));
    }

    #[test]
    fn placeholder_is_substituted() {
        let mut dimension = linear(
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 5.0),
        );
        dimension.text = Some("<> mm".to_string());
        assert_eq!(dimension_text(&dimension).as_deref(), Some("10 mm"));
        dimension.text = Some("固定文字".to_string());
        assert_eq!(dimension_text(&dimension).as_deref(), Some("固定文字"));
    }

    #[test]
    fn radial_dimensions_are_prefixed() {
        let dimension = Dimension {
            kind: DimensionKind::Radius,
            definition_point: Point2::new(0.0, 0.0),
            radial_point: Some(Point2::new(3.5, 0.0)),
            ..Dimension::default()
        };
        let geometry = dimension_geometry(&dimension).expect("半径标注可推导");
        assert!(geometry.is_radial);
        assert_eq!(geometry.text, "R3.5");
        assert_eq!(geometry.lines.len(), 1);

        let diameter = Dimension {
            kind: DimensionKind::Diameter,
            ..dimension
        };
        assert_eq!(dimension_text(&diameter).as_deref(), Some("Ø3.5"));
    }

    #[test]
    fn missing_points_fail_gracefully() {
        let dimension = Dimension::default();
        assert!(dimension_text(&dimension).is_none());
        assert!(dimension_geometry(&dimension).is_none());

        let radius = Dimension {
            kind: DimensionKind::Radius,
            ..Dimension::default()
        };
        assert!(dimension_geometry(&radius).is_none());
    }

    #[test]
    fn horizontal_linear_geometry_projects_onto_dimension_line() {
        let dimension = linear(
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 2.0),
            Point2::new(10.0, 5.0),
        );
        let geometry = dimension_geometry(&dimension).expect("线性标注可推导");
        assert_eq!(geometry.lines.len(), 3);
        let dimension_line = &geometry.lines[2];
        assert!((dimension_line[0].x() - 0.0).abs() < 1e-9);
        assert!((dimension_line[0].y() - 5.0).abs() < 1e-9);
        assert!((dimension_line[1].x() - 10.0).abs() < 1e-9);
        assert!((geometry.text_position.x() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn angular_dimension_between_two_lines() {
        let dimension = Dimension {
            kind: DimensionKind::Angular,
            first_point: Some(Point2::new(0.0, 0.0)),
            second_point: Some(Point2::new(10.0, 0.0)),
            definition_point: Point2::new(0.0, 0.0),
            radial_point: Some(Point2::new(0.0, 10.0)),
            arc_point: Some(Point2::new(3.0, 3.0)),
            ..Dimension::default()
        };
        assert_eq!(dimension_text(&dimension).as_deref(), Some("90°"));
        let geometry = dimension_geometry(&dimension).expect("角度标注可推导");
        let arc = &geometry.lines[0];
        let radius = 18.0_f64.sqrt();
        for point in arc {
            assert!((point.distance_to(Point2::new(0.0, 0.0)) - radius).abs() < 1e-9);
        }
    }

    #[test]
    fn parallel_angular_lines_yield_nothing() {
        let dimension = Dimension {
            kind: DimensionKind::Angular,
            first_point: Some(Point2::new(0.0, 0.0)),
            second_point: Some(Point2::new(10.0, 0.0)),
            definition_point: Point2::new(0.0, 1.0),
            radial_point: Some(Point2::new(10.0, 1.0)),
            ..Dimension::default()
        };
        assert!(dimension_geometry(&dimension).is_none());
    }
}
