use std::f64::consts::TAU;

use dxview_core::{
    document::{
        Arc, Attribute, AttributeDefinition, Circle, DEFAULT_LAYER, Dimension, DimensionKind,
        Ellipse, Entity, EntityCommon, EntityKind, Face, Insert, Leader, Line, MLeader, MText,
        PointEntity, Polyline, PolylineVertex, Solid, Spline, Text,
    },
    geometry::{Point2, Point3, Vector2},
};
use tracing::debug;

use crate::DxfError;
use crate::hatch::HatchFields;
use crate::scanner::{Group, Scanner};

/// 按组码消费实体字段。返回 `false` 表示该组交由公共属性处理。
pub(crate) trait GroupHandler {
    fn apply(&mut self, group: &Group, scanner: &mut Scanner) -> Result<bool, DxfError>;
}

/// 读完全部字段后生成具体的实体变体。
pub(crate) trait EntityFields: GroupHandler + Sized {
    fn finish(self) -> Result<EntityKind, DxfError>;
}

pub(crate) fn parse_entity(scanner: &mut Scanner, type_name: &str) -> Result<Entity, DxfError> {
    let line = scanner.last_read().map(|group| group.line).unwrap_or_default();
    parse_entity_body(scanner, type_name).map_err(|source| DxfError::Entity {
        kind: type_name.to_string(),
        line,
        source: Box::new(source),
    })
}

fn parse_entity_body(scanner: &mut Scanner, type_name: &str) -> Result<Entity, DxfError> {
    let mut common = EntityCommon::default();
    let kind = match type_name {
        "LINE" => read_entity(scanner, &mut common, LineFields::default())?,
        "CIRCLE" => read_entity(scanner, &mut common, CircleFields::default())?,
        "ARC" => read_entity(scanner, &mut common, ArcFields::default())?,
        "ELLIPSE" => read_entity(scanner, &mut common, EllipseFields::default())?,
        "LWPOLYLINE" => read_entity(scanner, &mut common, LwPolylineFields::default())?,
        "POLYLINE" => parse_polyline(scanner, &mut common)?,
        "SPLINE" => read_entity(scanner, &mut common, SplineFields::default())?,
        "TEXT" => read_entity(scanner, &mut common, TextFields::default())?,
        "MTEXT" => read_entity(scanner, &mut common, MTextFields::default())?,
        "DIMENSION" => read_entity(scanner, &mut common, DimensionFields::default())?,
        "INSERT" => parse_insert(scanner, &mut common)?,
        "SOLID" => read_entity(scanner, &mut common, SolidFields::default())?,
        "TRACE" => read_entity(
            scanner,
            &mut common,
            SolidFields {
                is_trace: true,
                ..SolidFields::default()
            },
        )?,
        "3DFACE" => read_entity(scanner, &mut common, FaceFields::default())?,
        "POINT" => read_entity(scanner, &mut common, PointFields::default())?,
        "HATCH" => read_entity(scanner, &mut common, HatchFields::default())?,
        "LEADER" => read_entity(scanner, &mut common, LeaderFields::default())?,
        "MULTILEADER" | "MLEADER" => read_entity(scanner, &mut common, MLeaderFields::default())?,
        "ATTDEF" => read_entity(scanner, &mut common, AttdefFields::default())?,
        other => {
            debug!(entity = other, "保留未识别的实体类型");
            read_entity(
                scanner,
                &mut common,
                UnknownFields {
                    type_name: other.to_string(),
                },
            )?
        }
    };
    Ok(Entity::new(common, kind))
}

fn read_entity<F: EntityFields>(
    scanner: &mut Scanner,
    common: &mut EntityCommon,
    mut fields: F,
) -> Result<EntityKind, DxfError> {
    read_fields(scanner, common, &mut fields)?;
    fields.finish()
}

/// 公共实体循环：逐组分派，直到下一个组码 0。
pub(crate) fn read_fields<H: GroupHandler>(
    scanner: &mut Scanner,
    common: &mut EntityCommon,
    handler: &mut H,
) -> Result<(), DxfError> {
    while scanner.peek_code().is_some_and(|code| code != 0) {
        let group = scanner.next()?;
        if group.code == 101 {
            // 内嵌对象（如 MTEXT 的 Embedded Object）原样跳过
            scanner.skip_record()?;
            break;
        }
        if !handler.apply(&group, scanner)? {
            apply_common(common, &group);
        }
    }
    Ok(())
}

fn apply_common(common: &mut EntityCommon, group: &Group) {
    match group.code {
        8 => {
            let layer = group.text();
            common.layer = if layer.is_empty() {
                DEFAULT_LAYER.to_string()
            } else {
                layer.to_string()
            };
        }
        62 => common.color_index = Some(group.short()),
        420 => {
            if common.true_color.is_none() {
                common.true_color = Some((group.int() & 0x00FF_FFFF) as u32);
            }
        }
        6 => common.linetype = Some(group.text().to_string()),
        48 => common.linetype_scale = Some(group.real()),
        60 => common.is_visible = group.int() == 0,
        5 => common.handle = Some(group.text().to_string()),
        330 => {
            if common.owner_handle.is_none() {
                common.owner_handle = Some(group.text().to_string());
            }
        }
        1000 => common.extended_data.push(group.text().to_string()),
        _ => {}
    }
}

#[inline]
pub(crate) fn point2(scanner: &mut Scanner, group: &Group) -> Result<Point2, DxfError> {
    Ok(scanner.read_point_after(group)?.xy())
}

#[inline]
fn vector2(scanner: &mut Scanner, group: &Group) -> Result<Vector2, DxfError> {
    let point = scanner.read_point_after(group)?;
    Ok(Vector2::new(point.x(), point.y()))
}

fn optional_text(group: &Group) -> Option<String> {
    let text = group.text();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

struct UnknownFields {
    type_name: String,
}

impl GroupHandler for UnknownFields {
    fn apply(&mut self, _group: &Group, _scanner: &mut Scanner) -> Result<bool, DxfError> {
        Ok(false)
    }
}

impl EntityFields for UnknownFields {
    fn finish(self) -> Result<EntityKind, DxfError> {
        Ok(EntityKind::Unknown {
            type_name: self.type_name,
        })
    }
}

/// 只消费公共属性的记录（SEQEND 等）。
struct SkippedRecord;

impl GroupHandler for SkippedRecord {
    fn apply(&mut self, _group: &Group, _scanner: &mut Scanner) -> Result<bool, DxfError> {
        Ok(false)
    }
}

#[derive(Default)]
struct LineFields {
    start: Option<Point2>,
    end: Option<Point2>,
}

impl GroupHandler for LineFields {
    fn apply(&mut self, group: &Group, scanner: &mut Scanner) -> Result<bool, DxfError> {
        match group.code {
            10 => self.start = Some(point2(scanner, group)?),
            11 => self.end = Some(point2(scanner, group)?),
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl EntityFields for LineFields {
    fn finish(self) -> Result<EntityKind, DxfError> {
        let start = self
            .start
            .ok_or_else(|| DxfError::invalid("LINE 缺少起点（组码 10）"))?;
        let end = self
            .end
            .ok_or_else(|| DxfError::invalid("LINE 缺少终点（组码 11）"))?;
        Ok(EntityKind::Line(Line { start, end }))
    }
}

#[derive(Default)]
struct CircleFields {
    center: Option<Point2>,
    radius: Option<f64>,
}

impl GroupHandler for CircleFields {
    fn apply(&mut self, group: &Group, scanner: &mut Scanner) -> Result<bool, DxfError> {
        match group.code {
            10 => self.center = Some(point2(scanner, group)?),
            40 => self.radius = Some(group.real()),
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl EntityFields for CircleFields {
    fn finish(self) -> Result<EntityKind, DxfError> {
        let center = self
            .center
            .ok_or_else(|| DxfError::invalid("CIRCLE 缺少圆心（组码 10）"))?;
        let radius = self
            .radius
            .ok_or_else(|| DxfError::invalid("CIRCLE 缺少半径（组码 40）"))?;
        Ok(EntityKind::Circle(Circle { center, radius }))
    }
}

#[derive(Default)]
struct ArcFields {
    center: Option<Point2>,
    radius: Option<f64>,
    start_angle: Option<f64>,
    end_angle: Option<f64>,
}

impl GroupHandler for ArcFields {
    fn apply(&mut self, group: &Group, scanner: &mut Scanner) -> Result<bool, DxfError> {
        match group.code {
            10 => self.center = Some(point2(scanner, group)?),
            40 => self.radius = Some(group.real()),
            50 => self.start_angle = Some(group.radians()),
            51 => self.end_angle = Some(group.radians()),
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl EntityFields for ArcFields {
    fn finish(self) -> Result<EntityKind, DxfError> {
        let center = self
            .center
            .ok_or_else(|| DxfError::invalid("ARC 缺少圆心（组码 10）"))?;
        let radius = self
            .radius
            .ok_or_else(|| DxfError::invalid("ARC 缺少半径（组码 40）"))?;
        Ok(EntityKind::Arc(Arc {
            center,
            radius,
            start_angle: self.start_angle.unwrap_or(0.0),
            end_angle: self.end_angle.unwrap_or(TAU),
        }))
    }
}

#[derive(Default)]
struct EllipseFields {
    center: Option<Point2>,
    major_axis: Option<Vector2>,
    ratio: Option<f64>,
    start_parameter: Option<f64>,
    end_parameter: Option<f64>,
}

impl GroupHandler for EllipseFields {
    fn apply(&mut self, group: &Group, scanner: &mut Scanner) -> Result<bool, DxfError> {
        match group.code {
            10 => self.center = Some(point2(scanner, group)?),
            11 => self.major_axis = Some(vector2(scanner, group)?),
            40 => self.ratio = Some(group.real()),
            41 => self.start_parameter = Some(group.real()),
            42 => self.end_parameter = Some(group.real()),
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl EntityFields for EllipseFields {
    fn finish(self) -> Result<EntityKind, DxfError> {
        let center = self
            .center
            .ok_or_else(|| DxfError::invalid("ELLIPSE 缺少圆心（组码 10）"))?;
        let major_axis = self
            .major_axis
            .ok_or_else(|| DxfError::invalid("ELLIPSE 缺少主轴向量（组码 11）"))?;
        if major_axis.length() <= f64::EPSILON {
            return Err(DxfError::invalid("ELLIPSE 主轴向量长度为 0"));
        }
        Ok(EntityKind::Ellipse(Ellipse {
            center,
            major_axis,
            ratio: self.ratio.unwrap_or(1.0),
            start_parameter: self.start_parameter.unwrap_or(0.0),
            end_parameter: self.end_parameter.unwrap_or(TAU),
        }))
    }
}

#[derive(Default)]
struct LwPolylineFields {
    vertices: Vec<PolylineVertex>,
    flags: i64,
}

impl GroupHandler for LwPolylineFields {
    fn apply(&mut self, group: &Group, scanner: &mut Scanner) -> Result<bool, DxfError> {
        match group.code {
            10 => self
                .vertices
                .push(PolylineVertex::new(point2(scanner, group)?)),
            42 => {
                let last = self.vertices.last_mut().ok_or_else(|| {
                    DxfError::invalid(format!("第 {} 行的 bulge（组码 42）缺少对应顶点", group.line))
                })?;
                last.bulge = group.real();
            }
            70 => self.flags = group.int(),
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl EntityFields for LwPolylineFields {
    fn finish(self) -> Result<EntityKind, DxfError> {
        if self.vertices.is_empty() {
            return Err(DxfError::invalid("LWPOLYLINE 未解析到任何顶点"));
        }
        Ok(EntityKind::Polyline(Polyline {
            vertices: self.vertices,
            is_closed: self.flags & 1 != 0,
            is_lightweight: true,
        }))
    }
}

#[derive(Default)]
struct PolylineHeader {
    flags: i64,
}

impl GroupHandler for PolylineHeader {
    fn apply(&mut self, group: &Group, scanner: &mut Scanner) -> Result<bool, DxfError> {
        match group.code {
            70 => self.flags = group.int(),
            // 旧式 POLYLINE 的“虚拟点”只携带高程
            10 => {
                scanner.read_point_after(group)?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

#[derive(Default)]
struct VertexFields {
    position: Option<Point2>,
    bulge: f64,
    flags: i64,
}

impl GroupHandler for VertexFields {
    fn apply(&mut self, group: &Group, scanner: &mut Scanner) -> Result<bool, DxfError> {
        match group.code {
            10 => self.position = Some(point2(scanner, group)?),
            42 => self.bulge = group.real(),
            70 => self.flags = group.int(),
            _ => return Ok(false),
        }
        Ok(true)
    }
}

const POLYLINE_CLOSED: i64 = 1;
const POLYLINE_3D_MESH: i64 = 16;
const POLYLINE_POLYFACE: i64 = 64;
const VERTEX_SPLINE_FRAME: i64 = 16;

/// 旧式 POLYLINE：头记录之后跟随 VERTEX 序列与 SEQEND。
fn parse_polyline(scanner: &mut Scanner, common: &mut EntityCommon) -> Result<EntityKind, DxfError> {
    let mut header = PolylineHeader::default();
    read_fields(scanner, common, &mut header)?;

    let mut vertices = Vec::new();
    loop {
        let Ok(next) = scanner.peek() else {
            break;
        };
        if next.is_marker("VERTEX") {
            scanner.next()?;
            let mut vertex = VertexFields::default();
            read_fields(scanner, &mut EntityCommon::default(), &mut vertex)?;
            if vertex.flags & VERTEX_SPLINE_FRAME != 0 {
                continue;
            }
            if let Some(position) = vertex.position {
                vertices.push(PolylineVertex::with_bulge(position, vertex.bulge));
            }
        } else if next.is_marker("SEQEND") {
            scanner.next()?;
            read_fields(scanner, &mut EntityCommon::default(), &mut SkippedRecord)?;
            break;
        } else {
            debug!("POLYLINE 缺少 SEQEND");
            break;
        }
    }

    if header.flags & (POLYLINE_3D_MESH | POLYLINE_POLYFACE) != 0 {
        return Ok(EntityKind::Unknown {
            type_name: "POLYLINE".to_string(),
        });
    }
    Ok(EntityKind::Polyline(Polyline {
        vertices,
        is_closed: header.flags & POLYLINE_CLOSED != 0,
        is_lightweight: false,
    }))
}

#[derive(Default)]
struct SplineFields {
    spline: Spline,
}

impl GroupHandler for SplineFields {
    fn apply(&mut self, group: &Group, scanner: &mut Scanner) -> Result<bool, DxfError> {
        let spline = &mut self.spline;
        match group.code {
            70 => {
                let flags = group.int();
                spline.is_closed = flags & 1 != 0;
                spline.is_periodic = flags & 2 != 0;
                spline.is_rational = flags & 4 != 0;
            }
            71 => spline.degree = group.int() as i32,
            40 => spline.knot_values.push(group.real()),
            41 => spline.weights.push(group.real()),
            10 => spline.control_points.push(point2(scanner, group)?),
            11 => spline.fit_points.push(point2(scanner, group)?),
            12 | 13 => {
                scanner.read_point_after(group)?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl EntityFields for SplineFields {
    fn finish(self) -> Result<EntityKind, DxfError> {
        if self.spline.control_points.is_empty() && self.spline.fit_points.is_empty() {
            return Err(DxfError::invalid("SPLINE 既没有控制点也没有拟合点"));
        }
        Ok(EntityKind::Spline(self.spline))
    }
}

#[derive(Default)]
struct TextFields {
    text: Text,
}

impl GroupHandler for TextFields {
    fn apply(&mut self, group: &Group, scanner: &mut Scanner) -> Result<bool, DxfError> {
        let text = &mut self.text;
        match group.code {
            1 => text.content = group.text().to_string(),
            7 => text.style = optional_text(group),
            10 => text.insert = point2(scanner, group)?,
            11 => text.alignment_point = Some(point2(scanner, group)?),
            40 => text.height = group.real(),
            41 => text.width_factor = group.real(),
            50 => text.rotation = group.radians(),
            72 => text.horizontal_align = group.short(),
            73 => text.vertical_align = group.short(),
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl EntityFields for TextFields {
    fn finish(self) -> Result<EntityKind, DxfError> {
        Ok(EntityKind::Text(self.text))
    }
}

#[derive(Default)]
struct MTextFields {
    mtext: MText,
    fragments: Vec<String>,
    direction: Option<Vector2>,
    rotation: Option<f64>,
}

impl GroupHandler for MTextFields {
    fn apply(&mut self, group: &Group, scanner: &mut Scanner) -> Result<bool, DxfError> {
        let mtext = &mut self.mtext;
        match group.code {
            1 | 3 => self.fragments.push(group.text().to_string()),
            7 => mtext.style = optional_text(group),
            10 => mtext.insert = point2(scanner, group)?,
            11 => self.direction = Some(vector2(scanner, group)?),
            40 => mtext.height = group.real(),
            41 => {
                let width = group.real();
                mtext.reference_width = (width.abs() > f64::EPSILON).then_some(width);
            }
            44 => mtext.line_spacing = Some(group.real()),
            50 => self.rotation = Some(group.radians()),
            71 => mtext.attachment_point = group.short(),
            72 => mtext.drawing_direction = group.short(),
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl EntityFields for MTextFields {
    fn finish(self) -> Result<EntityKind, DxfError> {
        let mut mtext = self.mtext;
        mtext.content = self.fragments.concat();
        mtext.direction = match (self.direction, self.rotation) {
            (Some(direction), _) if direction.length() > f64::EPSILON => direction,
            (_, Some(rotation)) => Vector2::from_angle(rotation),
            _ => Vector2::new(1.0, 0.0),
        };
        Ok(EntityKind::MText(mtext))
    }
}

#[derive(Default)]
struct DimensionFields {
    dimension: Dimension,
}

impl GroupHandler for DimensionFields {
    fn apply(&mut self, group: &Group, scanner: &mut Scanner) -> Result<bool, DxfError> {
        let dimension = &mut self.dimension;
        match group.code {
            1 => dimension.text = optional_text(group),
            2 => dimension.block_name = optional_text(group),
            3 => dimension.style = optional_text(group),
            10 => dimension.definition_point = point2(scanner, group)?,
            11 => dimension.text_midpoint = Some(point2(scanner, group)?),
            13 => dimension.first_point = Some(point2(scanner, group)?),
            14 => dimension.second_point = Some(point2(scanner, group)?),
            15 => dimension.radial_point = Some(point2(scanner, group)?),
            16 => dimension.arc_point = Some(point2(scanner, group)?),
            42 => dimension.measurement = Some(group.real()),
            50 => dimension.rotation = group.radians(),
            70 => dimension.kind = DimensionKind::from_flags(group.short()),
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl EntityFields for DimensionFields {
    fn finish(self) -> Result<EntityKind, DxfError> {
        Ok(EntityKind::Dimension(self.dimension))
    }
}

#[derive(Default)]
struct InsertFields {
    insert: Insert,
    attributes_follow: bool,
}

impl GroupHandler for InsertFields {
    fn apply(&mut self, group: &Group, scanner: &mut Scanner) -> Result<bool, DxfError> {
        let insert = &mut self.insert;
        match group.code {
            2 => insert.block_name = group.text().to_string(),
            10 => insert.insert = point2(scanner, group)?,
            41 => insert.scale.0.x = group.real(),
            42 => insert.scale.0.y = group.real(),
            // Z 向比例（43）对二维输出没有影响，读入后丢弃
            43 => {}
            44 => insert.column_spacing = group.real(),
            45 => insert.row_spacing = group.real(),
            50 => insert.rotation = group.radians(),
            66 => self.attributes_follow = group.flag(),
            70 => insert.column_count = group.int().max(1) as u32,
            71 => insert.row_count = group.int().max(1) as u32,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

/// INSERT 及其后续的 ATTRIB…SEQEND 序列。
fn parse_insert(scanner: &mut Scanner, common: &mut EntityCommon) -> Result<EntityKind, DxfError> {
    let mut fields = InsertFields::default();
    read_fields(scanner, common, &mut fields)?;
    if fields.insert.block_name.is_empty() {
        return Err(DxfError::invalid("INSERT 缺少块名（组码 2）"));
    }

    while scanner.peek().is_ok_and(|group| group.is_marker("ATTRIB")) {
        scanner.next()?;
        let mut attribute = AttributeFields::default();
        read_fields(scanner, &mut attribute.attribute.common, &mut attribute.state)?;
        fields.insert.attributes.push(attribute.finish());
    }
    let has_sequence = fields.attributes_follow || !fields.insert.attributes.is_empty();
    if has_sequence && scanner.peek().is_ok_and(|group| group.is_marker("SEQEND")) {
        scanner.next()?;
        read_fields(scanner, &mut EntityCommon::default(), &mut SkippedRecord)?;
    }
    Ok(EntityKind::Insert(fields.insert))
}

#[derive(Default)]
struct AttributeState {
    tag: String,
    text: String,
    insert: Point2,
    alignment_point: Option<Point2>,
    height: Option<f64>,
    rotation: f64,
    horizontal_align: i16,
    vertical_align: i16,
    flags: i64,
}

impl GroupHandler for AttributeState {
    fn apply(&mut self, group: &Group, scanner: &mut Scanner) -> Result<bool, DxfError> {
        match group.code {
            1 => self.text = group.text().to_string(),
            2 => self.tag = group.text().to_string(),
            10 => self.insert = point2(scanner, group)?,
            11 => self.alignment_point = Some(point2(scanner, group)?),
            40 => self.height = Some(group.real()),
            50 => self.rotation = group.radians(),
            70 => self.flags = group.int(),
            72 => self.horizontal_align = group.short(),
            74 => self.vertical_align = group.short(),
            _ => return Ok(false),
        }
        Ok(true)
    }
}

#[derive(Default)]
struct AttributeFields {
    attribute: Attribute,
    state: AttributeState,
}

impl AttributeFields {
    fn finish(self) -> Attribute {
        let state = self.state;
        Attribute {
            common: self.attribute.common,
            tag: state.tag,
            text: state.text,
            insert: state.insert,
            alignment_point: state.alignment_point,
            height: state.height.unwrap_or(1.0),
            rotation: state.rotation,
            horizontal_align: state.horizontal_align,
            vertical_align: state.vertical_align,
            is_invisible: state.flags & 1 != 0,
        }
    }
}

#[derive(Default)]
struct AttdefFields {
    attdef: AttributeDefinition,
}

impl GroupHandler for AttdefFields {
    fn apply(&mut self, group: &Group, scanner: &mut Scanner) -> Result<bool, DxfError> {
        let attdef = &mut self.attdef;
        match group.code {
            1 => attdef.default_text = group.text().to_string(),
            2 => attdef.tag = group.text().to_string(),
            3 => attdef.prompt = optional_text(group),
            7 => attdef.style = optional_text(group),
            10 => attdef.insert = point2(scanner, group)?,
            11 => attdef.alignment_point = Some(point2(scanner, group)?),
            40 => attdef.height = group.real(),
            50 => attdef.rotation = group.radians(),
            70 => {
                let flags = group.int();
                attdef.is_invisible = flags & 1 != 0;
                attdef.is_constant = flags & 2 != 0;
            }
            72 => attdef.horizontal_align = group.short(),
            74 => attdef.vertical_align = group.short(),
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl EntityFields for AttdefFields {
    fn finish(self) -> Result<EntityKind, DxfError> {
        Ok(EntityKind::Attdef(self.attdef))
    }
}

#[derive(Default)]
struct SolidFields {
    corners: [Option<Point2>; 4],
    is_trace: bool,
}

impl GroupHandler for SolidFields {
    fn apply(&mut self, group: &Group, scanner: &mut Scanner) -> Result<bool, DxfError> {
        match group.code {
            10..=13 => {
                let index = (group.code - 10) as usize;
                self.corners[index] = Some(point2(scanner, group)?);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl EntityFields for SolidFields {
    fn finish(self) -> Result<EntityKind, DxfError> {
        let [first, second, third, fourth] = self.corners;
        let (Some(first), Some(second), Some(third)) = (first, second, third) else {
            return Err(DxfError::invalid("SOLID 至少需要三个角点（组码 10/11/12）"));
        };
        // 第四点缺省时与第三点重合，退化为三角形
        let fourth = fourth.unwrap_or(third);
        Ok(EntityKind::Solid(Solid {
            corners: [first, second, third, fourth],
            is_trace: self.is_trace,
        }))
    }
}

#[derive(Default)]
struct FaceFields {
    vertices: [Option<Point3>; 4],
    edge_flags: i64,
}

impl GroupHandler for FaceFields {
    fn apply(&mut self, group: &Group, scanner: &mut Scanner) -> Result<bool, DxfError> {
        match group.code {
            10..=13 => {
                let index = (group.code - 10) as usize;
                self.vertices[index] = Some(scanner.read_point_after(group)?);
            }
            70 => self.edge_flags = group.int(),
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl EntityFields for FaceFields {
    fn finish(self) -> Result<EntityKind, DxfError> {
        let [first, second, third, fourth] = self.vertices;
        let (Some(first), Some(second), Some(third)) = (first, second, third) else {
            return Err(DxfError::invalid("3DFACE 至少需要三个顶点（组码 10/11/12）"));
        };
        let fourth = fourth.unwrap_or(third);
        let mut invisible_edges = [false; 4];
        for (bit, edge) in invisible_edges.iter_mut().enumerate() {
            *edge = self.edge_flags & (1 << bit) != 0;
        }
        Ok(EntityKind::Face(Face {
            vertices: [first, second, third, fourth],
            invisible_edges,
        }))
    }
}

#[derive(Default)]
struct PointFields {
    position: Option<Point2>,
}

impl GroupHandler for PointFields {
    fn apply(&mut self, group: &Group, scanner: &mut Scanner) -> Result<bool, DxfError> {
        match group.code {
            10 => self.position = Some(point2(scanner, group)?),
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl EntityFields for PointFields {
    fn finish(self) -> Result<EntityKind, DxfError> {
        let position = self
            .position
            .ok_or_else(|| DxfError::invalid("POINT 缺少位置（组码 10）"))?;
        Ok(EntityKind::Point(PointEntity { position }))
    }
}

#[derive(Default)]
struct LeaderFields {
    leader: Leader,
}

impl GroupHandler for LeaderFields {
    fn apply(&mut self, group: &Group, scanner: &mut Scanner) -> Result<bool, DxfError> {
        let leader = &mut self.leader;
        match group.code {
            3 => leader.style_name = optional_text(group),
            10 => leader.vertices.push(point2(scanner, group)?),
            71 => leader.has_arrowhead = group.flag(),
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl EntityFields for LeaderFields {
    fn finish(self) -> Result<EntityKind, DxfError> {
        if self.leader.vertices.len() < 2 {
            return Err(DxfError::invalid("LEADER 至少需要两个顶点（组码 10）"));
        }
        Ok(EntityKind::Leader(self.leader))
    }
}

/// MULTILEADER 的上下文数据以 `{ … }` 标记嵌套。
#[derive(Default)]
struct MLeaderFields {
    mleader: MLeader,
    text_fragments: Vec<String>,
    in_context: bool,
    in_leader: bool,
    in_leader_line: bool,
    landing: Option<Point2>,
    current_line: Vec<Point2>,
}

impl MLeaderFields {
    fn close_leader_line(&mut self) {
        let mut vertices = std::mem::take(&mut self.current_line);
        if let Some(landing) = self.landing {
            vertices.push(landing);
        }
        if vertices.len() >= 2 {
            self.mleader.leader_lines.push(vertices);
        }
        self.in_leader_line = false;
    }
}

impl GroupHandler for MLeaderFields {
    fn apply(&mut self, group: &Group, scanner: &mut Scanner) -> Result<bool, DxfError> {
        match group.code {
            300 if group.text() == "CONTEXT_DATA{" => self.in_context = true,
            301 if group.text() == "}" => self.in_context = false,
            302 if group.text() == "LEADER{" => {
                self.in_leader = true;
                self.landing = None;
            }
            303 if group.text() == "}" => self.in_leader = false,
            304 if group.text() == "LEADER_LINE{" => {
                self.in_leader_line = true;
                self.current_line.clear();
            }
            304 if !self.in_leader => self.text_fragments.push(group.text().to_string()),
            305 if group.text() == "}" => self.close_leader_line(),
            10 if self.in_leader_line => self.current_line.push(point2(scanner, group)?),
            10 if self.in_leader => self.landing = Some(point2(scanner, group)?),
            10 | 11 | 110 | 111 | 112 => {
                scanner.read_point_after(group)?;
            }
            12 if self.in_context && !self.in_leader => {
                self.mleader.text_location = Some(point2(scanner, group)?);
            }
            41 if self.in_context && !self.in_leader => {
                self.mleader.text_height = Some(group.real());
            }
            3 => self.mleader.style_name = optional_text(group),
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl EntityFields for MLeaderFields {
    fn finish(mut self) -> Result<EntityKind, DxfError> {
        if self.in_leader_line {
            self.close_leader_line();
        }
        let text = self.text_fragments.concat();
        self.mleader.text = (!text.is_empty()).then_some(text);
        Ok(EntityKind::MLeader(self.mleader))
    }
}
