use dxview_core::{
    document::{EntityKind, Hatch, HatchEdge, HatchLoop, HatchPatternLine},
    geometry::{Point2, Vector2},
};

use crate::DxfError;
use crate::entities::{EntityFields, GroupHandler, point2};
use crate::scanner::{Group, Scanner};

/// HATCH 的组码含义随所处阶段变化：同一个 10 在边界里是顶点，在种子段里是种子点。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Preamble,
    Boundary,
    Pattern,
    Seeds,
}

#[derive(Debug)]
struct PartialLoop {
    flags: i32,
    is_polyline: bool,
    has_bulge: bool,
    is_closed: bool,
    poly_vertices: Vec<(Point2, f64)>,
    edges: Vec<HatchEdge>,
    boundary_handles: Vec<String>,
}

impl PartialLoop {
    fn new(flags: i32) -> Self {
        Self {
            flags,
            is_polyline: flags & 0x02 != 0,
            has_bulge: false,
            is_closed: true,
            poly_vertices: Vec::new(),
            edges: Vec::new(),
            boundary_handles: Vec::new(),
        }
    }

    fn finish(mut self) -> HatchLoop {
        if self.is_polyline {
            let count = self.poly_vertices.len();
            let segment_count = if self.is_closed { count } else { count.saturating_sub(1) };
            for index in 0..segment_count {
                let (start, bulge) = self.poly_vertices[index];
                let (end, _) = self.poly_vertices[(index + 1) % count];
                self.edges.push(HatchEdge::PolylineSegment {
                    start,
                    end,
                    bulge: if self.has_bulge { bulge } else { 0.0 },
                });
            }
        }
        HatchLoop {
            flags: self.flags,
            is_polyline: self.is_polyline,
            is_closed: self.is_closed,
            edges: self.edges,
            boundary_handles: self.boundary_handles,
        }
    }
}

#[derive(Debug)]
enum EdgeBuilder {
    Line {
        start: Option<Point2>,
        end: Option<Point2>,
    },
    Arc {
        center: Option<Point2>,
        radius: f64,
        start_angle: f64,
        end_angle: f64,
        is_counter_clockwise: bool,
    },
    Ellipse {
        center: Option<Point2>,
        major_axis: Option<Vector2>,
        minor_ratio: f64,
        start_angle: f64,
        end_angle: f64,
        is_counter_clockwise: bool,
    },
    Spline {
        degree: i32,
        knot_values: Vec<f64>,
        weights: Vec<f64>,
        control_points: Vec<Point2>,
        fit_points: Vec<Point2>,
        fit_count_seen: bool,
    },
}

impl EdgeBuilder {
    fn new(edge_type: i64) -> Result<Self, DxfError> {
        match edge_type {
            1 => Ok(Self::Line {
                start: None,
                end: None,
            }),
            2 => Ok(Self::Arc {
                center: None,
                radius: 0.0,
                start_angle: 0.0,
                end_angle: std::f64::consts::TAU,
                is_counter_clockwise: true,
            }),
            3 => Ok(Self::Ellipse {
                center: None,
                major_axis: None,
                minor_ratio: 1.0,
                start_angle: 0.0,
                end_angle: std::f64::consts::TAU,
                is_counter_clockwise: true,
            }),
            4 => Ok(Self::Spline {
                degree: 3,
                knot_values: Vec::new(),
                weights: Vec::new(),
                control_points: Vec::new(),
                fit_points: Vec::new(),
                fit_count_seen: false,
            }),
            other => Err(DxfError::invalid(format!("HATCH 不支持的边界类型 {other}"))),
        }
    }

    fn finish(self) -> Result<HatchEdge, DxfError> {
        match self {
            EdgeBuilder::Line { start, end } => Ok(HatchEdge::Line {
                start: start.ok_or_else(|| DxfError::invalid("HATCH 直线边缺少起点"))?,
                end: end.ok_or_else(|| DxfError::invalid("HATCH 直线边缺少终点"))?,
            }),
            EdgeBuilder::Arc {
                center,
                radius,
                start_angle,
                end_angle,
                is_counter_clockwise,
            } => Ok(HatchEdge::Arc {
                center: center.ok_or_else(|| DxfError::invalid("HATCH 圆弧边缺少圆心"))?,
                radius,
                start_angle,
                end_angle,
                is_counter_clockwise,
            }),
            EdgeBuilder::Ellipse {
                center,
                major_axis,
                minor_ratio,
                start_angle,
                end_angle,
                is_counter_clockwise,
            } => Ok(HatchEdge::Ellipse {
                center: center.ok_or_else(|| DxfError::invalid("HATCH 椭圆边缺少圆心"))?,
                major_axis: major_axis
                    .ok_or_else(|| DxfError::invalid("HATCH 椭圆边缺少主轴向量"))?,
                minor_ratio,
                start_angle,
                end_angle,
                is_counter_clockwise,
            }),
            EdgeBuilder::Spline {
                degree,
                knot_values,
                weights,
                control_points,
                fit_points,
                ..
            } => {
                if control_points.len() < 2 && fit_points.len() < 2 {
                    return Err(DxfError::invalid("HATCH 样条边至少需要两个控制点或拟合点"));
                }
                Ok(HatchEdge::Spline {
                    degree,
                    knot_values,
                    weights,
                    control_points,
                    fit_points,
                })
            }
        }
    }
}

#[derive(Default)]
pub(crate) struct HatchFields {
    hatch: Hatch,
    phase: Phase,
    current_loop: Option<PartialLoop>,
    edge: Option<EdgeBuilder>,
    pattern_line: Option<HatchPatternLine>,
}

impl HatchFields {
    fn close_edge(&mut self) -> Result<(), DxfError> {
        if let Some(edge) = self.edge.take() {
            let edge = edge.finish()?;
            if let Some(current) = self.current_loop.as_mut() {
                current.edges.push(edge);
            }
        }
        Ok(())
    }

    fn close_loop(&mut self) -> Result<(), DxfError> {
        self.close_edge()?;
        if let Some(current) = self.current_loop.take() {
            self.hatch.loops.push(current.finish());
        }
        Ok(())
    }

    fn close_pattern_line(&mut self) {
        if let Some(line) = self.pattern_line.take() {
            self.hatch.pattern_lines.push(line);
        }
    }

    fn enter(&mut self, phase: Phase) -> Result<(), DxfError> {
        if self.phase == Phase::Boundary && phase != Phase::Boundary {
            self.close_loop()?;
        }
        if self.phase == Phase::Pattern && phase != Phase::Pattern {
            self.close_pattern_line();
        }
        self.phase = phase;
        Ok(())
    }

    fn apply_preamble(&mut self, group: &Group, scanner: &mut Scanner) -> Result<bool, DxfError> {
        match group.code {
            2 => self.hatch.pattern_name = group.text().to_string(),
            70 => self.hatch.is_solid = group.int() & 1 != 0,
            // 高程点与拉伸方向
            10 | 210 => {
                scanner.read_point_after(group)?;
            }
            91 => self.enter(Phase::Boundary)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn apply_boundary(&mut self, group: &Group, scanner: &mut Scanner) -> Result<bool, DxfError> {
        if group.code == 92 {
            self.close_loop()?;
            self.current_loop = Some(PartialLoop::new(group.int() as i32));
            return Ok(true);
        }
        if matches!(group.code, 75 | 76) {
            self.enter(Phase::Pattern)?;
            return self.apply_pattern(group, scanner);
        }
        let Some(current) = self.current_loop.as_mut() else {
            return Ok(false);
        };

        if current.is_polyline {
            match group.code {
                72 => current.has_bulge = group.flag(),
                73 => current.is_closed = group.flag(),
                93 => {}
                10 => {
                    let point = point2(scanner, group)?;
                    current.poly_vertices.push((point, 0.0));
                }
                42 => {
                    if let Some(last) = current.poly_vertices.last_mut() {
                        last.1 = group.real();
                    }
                }
                97 => {}
                330 => current.boundary_handles.push(group.text().to_string()),
                _ => return Ok(false),
            }
            return Ok(true);
        }

        match group.code {
            93 => {}
            72 => {
                self.close_edge()?;
                self.edge = Some(EdgeBuilder::new(group.int())?);
            }
            97 => {
                // 样条边自带的拟合点数量与环路末尾的边界对象数量共用组码 97
                match self.edge.as_mut() {
                    Some(EdgeBuilder::Spline { fit_count_seen, .. }) if !*fit_count_seen => {
                        *fit_count_seen = true;
                    }
                    _ => self.close_edge()?,
                }
            }
            330 => {
                self.close_edge()?;
                if let Some(current) = self.current_loop.as_mut() {
                    current.boundary_handles.push(group.text().to_string());
                }
            }
            _ => return self.apply_edge(group, scanner),
        }
        Ok(true)
    }

    fn apply_edge(&mut self, group: &Group, scanner: &mut Scanner) -> Result<bool, DxfError> {
        let Some(edge) = self.edge.as_mut() else {
            return Ok(false);
        };
        match (edge, group.code) {
            (EdgeBuilder::Line { start, .. }, 10) => *start = Some(point2(scanner, group)?),
            (EdgeBuilder::Line { end, .. }, 11) => *end = Some(point2(scanner, group)?),
            (EdgeBuilder::Arc { center, .. }, 10) => *center = Some(point2(scanner, group)?),
            (EdgeBuilder::Arc { radius, .. }, 40) => *radius = group.real(),
            (EdgeBuilder::Arc { start_angle, .. }, 50) => *start_angle = group.radians(),
            (EdgeBuilder::Arc { end_angle, .. }, 51) => *end_angle = group.radians(),
            (
                EdgeBuilder::Arc {
                    is_counter_clockwise,
                    ..
                },
                73,
            ) => *is_counter_clockwise = group.flag(),
            (EdgeBuilder::Ellipse { center, .. }, 10) => *center = Some(point2(scanner, group)?),
            (EdgeBuilder::Ellipse { major_axis, .. }, 11) => {
                let end = point2(scanner, group)?;
                *major_axis = Some(Vector2::new(end.x(), end.y()));
            }
            (EdgeBuilder::Ellipse { minor_ratio, .. }, 40) => *minor_ratio = group.real(),
            (EdgeBuilder::Ellipse { start_angle, .. }, 50) => *start_angle = group.radians(),
            (EdgeBuilder::Ellipse { end_angle, .. }, 51) => *end_angle = group.radians(),
            (
                EdgeBuilder::Ellipse {
                    is_counter_clockwise,
                    ..
                },
                73,
            ) => *is_counter_clockwise = group.flag(),
            (EdgeBuilder::Spline { degree, .. }, 94) => *degree = group.int() as i32,
            (EdgeBuilder::Spline { knot_values, .. }, 40) => knot_values.push(group.real()),
            (EdgeBuilder::Spline { weights, .. }, 42) => weights.push(group.real()),
            (EdgeBuilder::Spline { control_points, .. }, 10) => {
                control_points.push(point2(scanner, group)?)
            }
            (EdgeBuilder::Spline { fit_points, .. }, 11) => {
                fit_points.push(point2(scanner, group)?)
            }
            (EdgeBuilder::Spline { .. }, 12 | 13) => {
                scanner.read_point_after(group)?;
            }
            (EdgeBuilder::Spline { .. }, 73 | 74 | 95 | 96) => {}
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn apply_pattern(&mut self, group: &Group, scanner: &mut Scanner) -> Result<bool, DxfError> {
        match group.code {
            75 | 76 | 77 | 78 => {}
            52 => self.hatch.pattern_angle = group.radians(),
            41 => self.hatch.pattern_scale = group.real(),
            53 => {
                self.close_pattern_line();
                self.pattern_line = Some(HatchPatternLine {
                    angle: group.radians(),
                    base_point: Point2::default(),
                    offset: Vector2::default(),
                    dashes: Vec::new(),
                });
            }
            43 | 44 | 45 | 46 | 49 | 79 => {
                let Some(line) = self.pattern_line.as_mut() else {
                    return Ok(true);
                };
                let value = group.real();
                match group.code {
                    43 => line.base_point.0.x = value,
                    44 => line.base_point.0.y = value,
                    45 => line.offset.0.x = value,
                    46 => line.offset.0.y = value,
                    49 => line.dashes.push(value),
                    _ => {}
                }
            }
            47 => {}
            98 => self.enter(Phase::Seeds)?,
            10 => {
                // 部分文件省略 98，直接写种子点
                self.enter(Phase::Seeds)?;
                scanner.read_point_after(group)?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn apply_seeds(&mut self, group: &Group, scanner: &mut Scanner) -> Result<bool, DxfError> {
        match group.code {
            10 => {
                scanner.read_point_after(group)?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl GroupHandler for HatchFields {
    fn apply(&mut self, group: &Group, scanner: &mut Scanner) -> Result<bool, DxfError> {
        match self.phase {
            Phase::Preamble => self.apply_preamble(group, scanner),
            Phase::Boundary => self.apply_boundary(group, scanner),
            Phase::Pattern => self.apply_pattern(group, scanner),
            Phase::Seeds => self.apply_seeds(group, scanner),
        }
    }
}

impl EntityFields for HatchFields {
    fn finish(mut self) -> Result<EntityKind, DxfError> {
        self.enter(Phase::Seeds)?;
        if self.hatch.loops.is_empty() {
            return Err(DxfError::invalid("HATCH 缺少边界定义"));
        }
        if self.hatch.pattern_name.eq_ignore_ascii_case("SOLID") {
            self.hatch.is_solid = true;
        }
        Ok(EntityKind::Hatch(self.hatch))
    }
}
