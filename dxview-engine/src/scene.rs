//! 渲染构建：把解析后的文档转换为与界面无关的绘制图元。

use std::collections::{BTreeMap, HashMap};

use dxview_core::document::{
    Attribute, AttributeDefinition, BlockDefinition, DEFAULT_LAYER, Document, Entity,
    EntityCommon, EntityKind, Insert, MText, Text,
};
use dxview_core::geometry::Point2;
use glam::{DAffine2, DVec2};
use serde::Serialize;
use tracing::{debug, warn};

use crate::dimension::dimension_geometry;
use crate::errors::EngineError;
use crate::geometry::{
    DashedPath, apply_line_pattern, arc_points, circle_points, ellipse_points, polyline_points,
    spline_points,
};
use crate::hatch::{HatchLimits, hatch_geometry};
use crate::palette::Rgb;
use crate::style::{LinePattern, effective_linetype_name, resolve_color, resolve_linetype};
use crate::text::{
    HorizontalAlign, TextRun, VerticalAlign, decode_special_characters, format_rich_text,
    mtext_alignment, text_alignment,
};

/// 报告中保留的失败信息条数。
pub const MAX_REPORTED_MESSAGES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    pub max_block_depth: usize,
    /// 单个顶层实体展开的块实例总数上限，阵列与嵌套实例都计入。
    pub max_block_instances: usize,
    pub hatch_limits: HatchLimits,
    /// 与文件头 `$LTSCALE` 相乘的额外线型比例。
    pub linetype_scale: f64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            max_block_depth: 10,
            max_block_instances: 10_000,
            hatch_limits: HatchLimits::default(),
            linetype_scale: 1.0,
        }
    }
}

/// 文字图元。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextItem {
    pub runs: Vec<TextRun>,
    pub position: Point2,
    pub height: f64,
    pub rotation: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_width: Option<f64>,
    pub horizontal: HorizontalAlign,
    pub vertical: VerticalAlign,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Primitive {
    Polyline { points: Vec<Point2> },
    /// 套用线型后的实线段与点。
    Dashed(DashedPath),
    Points { points: Vec<Point2> },
    /// 按奇偶规则填充的多边形组。
    Fill { polygons: Vec<Vec<Point2>> },
    Segments { segments: Vec<(Point2, Point2)> },
    Text(TextItem),
}

impl Primitive {
    /// 与序列化标签一致的图元类别名。
    pub fn label(&self) -> &'static str {
        match self {
            Primitive::Polyline { .. } => "polyline",
            Primitive::Dashed(_) => "dashed",
            Primitive::Points { .. } => "points",
            Primitive::Fill { .. } => "fill",
            Primitive::Segments { .. } => "segments",
            Primitive::Text(_) => "text",
        }
    }
}

/// 交给外部渲染器的一条绘制记录，带图层标签供显隐切换。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrawItem {
    pub layer: String,
    pub entity_type: String,
    pub color: Rgb,
    pub primitive: Primitive,
}

/// 渲染诊断：失败实体数、失败信息样本与不支持的实体类型计数。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderReport {
    pub total_entities: usize,
    pub failed_entities: usize,
    pub messages: Vec<String>,
    pub unsupported: BTreeMap<String, usize>,
    pub truncated_hatches: usize,
}

impl RenderReport {
    #[inline]
    pub fn succeeded(&self) -> usize {
        self.total_entities - self.failed_entities
    }

    fn record_failure(&mut self, message: String) {
        if self.messages.len() < MAX_REPORTED_MESSAGES {
            self.messages.push(message);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderOutput {
    pub items: Vec<DrawItem>,
    pub report: RenderReport,
}

/// 块参照展开时向下传递的上下文。
#[derive(Debug, Clone)]
struct InsertContext {
    transform: DAffine2,
    color: Option<Rgb>,
    linetype: Option<String>,
    layer: Option<String>,
    depth: usize,
}

impl InsertContext {
    fn root() -> Self {
        Self {
            transform: DAffine2::IDENTITY,
            color: None,
            linetype: None,
            layer: None,
            depth: 0,
        }
    }

    fn point(&self, point: Point2) -> Point2 {
        Point2::from_vec(self.transform.transform_point2(point.as_vec2()))
    }

    fn points(&self, points: &[Point2]) -> Vec<Point2> {
        points.iter().map(|point| self.point(*point)).collect()
    }

    fn rotation(&self, angle: f64) -> f64 {
        let direction = self.transform.transform_vector2(DVec2::from_angle(angle));
        direction.y.atan2(direction.x)
    }

    fn average_scale(&self) -> f64 {
        let matrix = self.transform.matrix2;
        ((matrix.x_axis.length() + matrix.y_axis.length()) * 0.5).max(1e-6)
    }

    /// 块内 0 层实体随块参照所在图层显示。
    fn layer_tag(&self, common: &EntityCommon) -> String {
        match &self.layer {
            Some(layer) if common.layer == DEFAULT_LAYER => layer.clone(),
            _ => common.layer.clone(),
        }
    }
}

type LinetypeKey = (Option<String>, String, Option<String>, u64);

/// 单次渲染调用内的可变状态，随调用创建和销毁。
struct Renderer<'a> {
    document: &'a Document,
    options: &'a RenderOptions,
    global_scale: f64,
    linetype_cache: HashMap<LinetypeKey, Option<LinePattern>>,
    items: Vec<DrawItem>,
    pending: Vec<EngineError>,
    instances: usize,
    report: RenderReport,
}

/// 解析实体的颜色、线型与图层标签后得到的样式。
struct EntityStyle {
    layer: String,
    entity_type: String,
    color: Rgb,
    pattern: Option<LinePattern>,
}

/// 渲染整个文档。单个实体的失败会被记录在报告里，不影响其余实体。
pub fn render_document(document: &Document, options: &RenderOptions) -> RenderOutput {
    let mut renderer = Renderer {
        document,
        options,
        global_scale: document.linetype_scale() * options.linetype_scale,
        linetype_cache: HashMap::new(),
        items: Vec::new(),
        pending: Vec::new(),
        instances: 0,
        report: RenderReport::default(),
    };
    renderer.render_all();
    debug!(
        total = renderer.report.total_entities,
        failed = renderer.report.failed_entities,
        items = renderer.items.len(),
        "文档渲染完成"
    );
    RenderOutput {
        items: renderer.items,
        report: renderer.report,
    }
}

impl<'a> Renderer<'a> {
    fn render_all(&mut self) {
        let root = InsertContext::root();
        let document = self.document;
        for entity in document.entities() {
            self.report.total_entities += 1;
            self.pending.clear();
            self.instances = 0;
            if let Err(err) = self.render_entity(entity, &root) {
                self.note_error(err);
            }
            if self.pending.is_empty() {
                continue;
            }
            self.report.failed_entities += 1;
            let handle = entity.common.handle.as_deref().unwrap_or("-");
            for err in std::mem::take(&mut self.pending) {
                self.report
                    .record_failure(format!("{} [{}]: {}", entity.type_name(), handle, err));
            }
        }
    }

    fn note_error(&mut self, err: EngineError) {
        match err {
            EngineError::UnsupportedEntity { kind } => {
                *self.report.unsupported.entry(kind).or_default() += 1;
            }
            other => self.pending.push(other),
        }
    }

    fn style(&mut self, entity: &Entity, ctx: &InsertContext) -> EntityStyle {
        let common = &entity.common;
        let layers = self.document.layers();
        let key = (
            common.linetype.clone(),
            common.layer.clone(),
            ctx.linetype.clone(),
            (common.linetype_scale.unwrap_or(1.0) * self.global_scale).to_bits(),
        );
        let pattern = match self.linetype_cache.get(&key) {
            Some(pattern) => pattern.clone(),
            None => {
                let pattern = resolve_linetype(
                    common,
                    layers,
                    self.document.linetypes(),
                    self.global_scale,
                    ctx.linetype.as_deref(),
                );
                self.linetype_cache.insert(key, pattern.clone());
                pattern
            }
        };
        EntityStyle {
            layer: ctx.layer_tag(common),
            entity_type: entity.type_name().to_string(),
            color: resolve_color(common, layers, ctx.color),
            pattern,
        }
    }

    fn push(&mut self, style: &EntityStyle, primitive: Primitive) {
        self.items.push(DrawItem {
            layer: style.layer.clone(),
            entity_type: style.entity_type.clone(),
            color: style.color,
            primitive,
        });
    }

    /// 输出一条折线，按线型在局部坐标下切分后再变换到世界坐标。
    fn stroke(&mut self, style: &EntityStyle, ctx: &InsertContext, points: &[Point2]) {
        if points.len() < 2 {
            return;
        }
        let dashed = style
            .pattern
            .as_ref()
            .map(|pattern| apply_line_pattern(points, pattern));
        let primitive = match dashed {
            Some(dashed) if !dashed.truncated => Primitive::Dashed(DashedPath {
                segments: dashed
                    .segments
                    .iter()
                    .map(|(start, end)| (ctx.point(*start), ctx.point(*end)))
                    .collect(),
                dots: ctx.points(&dashed.dots),
                truncated: false,
            }),
            // 图案过密时按实线输出
            _ => Primitive::Polyline {
                points: ctx.points(points),
            },
        };
        self.push(style, primitive);
    }

    fn render_entity(&mut self, entity: &Entity, ctx: &InsertContext) -> Result<(), EngineError> {
        if !entity.common.is_visible {
            return Ok(());
        }
        let style = self.style(entity, ctx);
        match &entity.kind {
            EntityKind::Line(line) => self.stroke(&style, ctx, &[line.start, line.end]),
            EntityKind::Circle(circle) => {
                self.stroke(&style, ctx, &circle_points(circle.center, circle.radius))
            }
            EntityKind::Arc(arc) => {
                let points = arc_points(arc.center, arc.radius, arc.start_angle, arc.end_angle, true);
                self.stroke(&style, ctx, &points);
            }
            EntityKind::Ellipse(ellipse) => {
                let points = ellipse_points(
                    ellipse.center,
                    ellipse.major_axis,
                    ellipse.ratio,
                    ellipse.start_parameter,
                    ellipse.end_parameter,
                    true,
                );
                if points.is_empty() {
                    return Err(EngineError::geometry("ELLIPSE", "major axis has zero length"));
                }
                self.stroke(&style, ctx, &points);
            }
            EntityKind::Polyline(polyline) => {
                let vertices: Vec<(Point2, f64)> = polyline
                    .vertices
                    .iter()
                    .map(|vertex| (vertex.position, vertex.bulge))
                    .collect();
                self.stroke(&style, ctx, &polyline_points(&vertices, polyline.is_closed));
            }
            EntityKind::Spline(spline) => {
                let mut points = spline_points(
                    spline.degree,
                    &spline.knot_values,
                    &spline.weights,
                    &spline.control_points,
                    &spline.fit_points,
                );
                if points.len() < 2 {
                    return Err(EngineError::geometry("SPLINE", "not enough points to sample"));
                }
                if spline.is_closed {
                    if let Some(first) = points.first().copied() {
                        points.push(first);
                    }
                }
                self.stroke(&style, ctx, &points);
            }
            EntityKind::Text(text) => {
                let item = self.text_item(text, ctx);
                self.push(&style, Primitive::Text(item));
            }
            EntityKind::MText(mtext) => {
                let item = self.mtext_item(mtext, ctx);
                self.push(&style, Primitive::Text(item));
            }
            EntityKind::Dimension(dimension) => {
                let document = self.document;
                let block = dimension
                    .block_name
                    .as_deref()
                    .and_then(|name| document.block(name));
                if let Some(block) = block {
                    let child = self.child_context(entity, ctx, ctx.transform, &block.name)?;
                    self.reserve_instances(&block.name, 1)?;
                    self.render_block(block, &child);
                    return Ok(());
                }
                let geometry = dimension_geometry(dimension).ok_or_else(|| {
                    EngineError::geometry("DIMENSION", "missing measurement points")
                })?;
                for line in &geometry.lines {
                    self.stroke(&style, ctx, line);
                }
                let item = TextItem {
                    runs: vec![plain_run(geometry.text)],
                    position: ctx.point(geometry.text_position),
                    height: ctx.average_scale(),
                    rotation: ctx.rotation(geometry.text_rotation),
                    reference_width: None,
                    horizontal: HorizontalAlign::Center,
                    vertical: VerticalAlign::Middle,
                };
                self.push(&style, Primitive::Text(item));
            }
            EntityKind::Insert(insert) => self.render_insert(entity, insert, ctx)?,
            EntityKind::Solid(solid) => {
                // DXF 角点顺序为 1-2-4-3
                let [a, b, c, d] = solid.corners;
                let polygon = ctx.points(&[a, b, d, c]);
                self.push(&style, Primitive::Fill {
                    polygons: vec![polygon],
                });
            }
            EntityKind::Face(face) => {
                let corners = face.vertices.map(|vertex| ctx.point(vertex.xy()));
                let segments: Vec<(Point2, Point2)> = (0..4)
                    .filter(|edge| !face.invisible_edges[*edge])
                    .map(|edge| (corners[edge], corners[(edge + 1) % 4]))
                    .filter(|(start, end)| start.distance_to(*end) > f64::EPSILON)
                    .collect();
                if !segments.is_empty() {
                    self.push(&style, Primitive::Segments { segments });
                }
            }
            EntityKind::Point(point) => {
                self.push(&style, Primitive::Points {
                    points: vec![ctx.point(point.position)],
                });
            }
            EntityKind::Hatch(hatch) => {
                let geometry = hatch_geometry(hatch, self.options.hatch_limits);
                if geometry.polygons.is_empty() {
                    return Err(EngineError::geometry("HATCH", "no closed boundary loop"));
                }
                if geometry.pattern.truncated {
                    self.report.truncated_hatches += 1;
                }
                if hatch.is_solid {
                    let polygons = geometry
                        .polygons
                        .iter()
                        .map(|polygon| ctx.points(polygon))
                        .collect();
                    self.push(&style, Primitive::Fill { polygons });
                } else {
                    let segments = geometry
                        .pattern
                        .segments
                        .iter()
                        .map(|(start, end)| (ctx.point(*start), ctx.point(*end)))
                        .collect();
                    self.push(&style, Primitive::Segments { segments });
                }
            }
            EntityKind::Leader(leader) => self.stroke(&style, ctx, &leader.vertices),
            EntityKind::MLeader(mleader) => {
                for line in &mleader.leader_lines {
                    self.stroke(&style, ctx, line);
                }
                if let (Some(text), Some(location)) = (&mleader.text, mleader.text_location) {
                    let height = mleader.text_height.unwrap_or(1.0);
                    let item = TextItem {
                        runs: format_rich_text(text, height),
                        position: ctx.point(location),
                        height: height * ctx.average_scale(),
                        rotation: ctx.rotation(0.0),
                        reference_width: None,
                        horizontal: HorizontalAlign::Left,
                        vertical: VerticalAlign::Top,
                    };
                    self.push(&style, Primitive::Text(item));
                }
            }
            EntityKind::Attdef(attdef) => {
                // 块内的属性定义只是模板，由 INSERT 的 ATTRIB 代替显示
                if ctx.depth == 0 && !attdef.is_invisible {
                    let item = attdef_item(attdef, ctx);
                    self.push(&style, Primitive::Text(item));
                }
            }
            EntityKind::Unknown { type_name } => {
                return Err(EngineError::UnsupportedEntity {
                    kind: type_name.clone(),
                });
            }
        }
        Ok(())
    }

    fn child_context(
        &self,
        entity: &Entity,
        ctx: &InsertContext,
        transform: DAffine2,
        block: &str,
    ) -> Result<InsertContext, EngineError> {
        let limit = self.options.max_block_depth;
        if ctx.depth >= limit {
            warn!(block, limit, "块参照嵌套过深，停止展开");
            return Err(EngineError::RecursionLimitExceeded {
                block: block.to_string(),
                limit,
            });
        }
        let layers = self.document.layers();
        Ok(InsertContext {
            transform,
            color: Some(resolve_color(&entity.common, layers, ctx.color)),
            linetype: effective_linetype_name(&entity.common, layers, ctx.linetype.as_deref())
                .map(str::to_string),
            layer: Some(ctx.layer_tag(&entity.common)),
            depth: ctx.depth + 1,
        })
    }

    fn render_insert(
        &mut self,
        entity: &Entity,
        insert: &Insert,
        ctx: &InsertContext,
    ) -> Result<(), EngineError> {
        let document = self.document;
        let block = document.block(&insert.block_name).ok_or_else(|| {
            warn!(block = %insert.block_name, "块定义缺失，无法绘制");
            EngineError::MissingBlock {
                name: insert.block_name.clone(),
            }
        })?;

        let requested =
            u64::from(insert.column_count.max(1)) * u64::from(insert.row_count.max(1));
        self.reserve_instances(&block.name, requested)?;

        let mut attribute_ctx = None;
        for column in 0..insert.column_count.max(1) {
            for row in 0..insert.row_count.max(1) {
                let transform =
                    ctx.transform * block_transform(insert, block.base_point, column, row);
                let child = self.child_context(entity, ctx, transform, &block.name)?;
                self.render_block(block, &child);
                if attribute_ctx.is_none() {
                    attribute_ctx = Some(child);
                }
            }
        }

        // ATTRIB 坐标已在块参照所在坐标系内，只继承颜色与线型
        if let Some(child) = attribute_ctx {
            let attribute_ctx = InsertContext {
                transform: ctx.transform,
                depth: ctx.depth,
                ..child
            };
            for attribute in &insert.attributes {
                self.render_attribute(attribute, &attribute_ctx);
            }
        }
        Ok(())
    }

    /// 在当前顶层实体的实例预算中预留 `requested` 个块实例，超出时不做任何展开。
    fn reserve_instances(&mut self, block: &str, requested: u64) -> Result<(), EngineError> {
        let limit = self.options.max_block_instances;
        let total = (self.instances as u64).saturating_add(requested);
        if total > limit as u64 {
            warn!(block, requested, limit, "块实例数超过上限，停止展开");
            return Err(EngineError::InstanceLimitExceeded {
                block: block.to_string(),
                requested,
                limit,
            });
        }
        self.instances = total as usize;
        Ok(())
    }

    fn render_block(&mut self, block: &BlockDefinition, ctx: &InsertContext) {
        for child in &block.entities {
            if let Err(err) = self.render_entity(child, ctx) {
                self.note_error(err);
            }
        }
    }

    fn render_attribute(&mut self, attribute: &Attribute, ctx: &InsertContext) {
        if attribute.is_invisible || !attribute.common.is_visible {
            return;
        }
        let layers = self.document.layers();
        let style = EntityStyle {
            layer: ctx.layer_tag(&attribute.common),
            entity_type: "ATTRIB".to_string(),
            color: resolve_color(&attribute.common, layers, ctx.color),
            pattern: None,
        };
        let (horizontal, vertical) =
            text_alignment(attribute.horizontal_align, attribute.vertical_align);
        let anchor = aligned_anchor(
            attribute.insert,
            attribute.alignment_point,
            attribute.horizontal_align,
            attribute.vertical_align,
        );
        let item = TextItem {
            runs: vec![plain_run(decode_special_characters(&attribute.text))],
            position: ctx.point(anchor),
            height: attribute.height * ctx.average_scale(),
            rotation: ctx.rotation(attribute.rotation),
            reference_width: None,
            horizontal,
            vertical,
        };
        self.push(&style, Primitive::Text(item));
    }

    fn text_item(&self, text: &Text, ctx: &InsertContext) -> TextItem {
        let (horizontal, vertical) = text_alignment(text.horizontal_align, text.vertical_align);
        let anchor = aligned_anchor(
            text.insert,
            text.alignment_point,
            text.horizontal_align,
            text.vertical_align,
        );
        TextItem {
            runs: vec![plain_run(decode_special_characters(&text.content))],
            position: ctx.point(anchor),
            height: text.height * ctx.average_scale(),
            rotation: ctx.rotation(text.rotation),
            reference_width: None,
            horizontal,
            vertical,
        }
    }

    fn mtext_item(&self, mtext: &MText, ctx: &InsertContext) -> TextItem {
        let (horizontal, vertical) = mtext_alignment(mtext.attachment_point);
        let scale = ctx.average_scale();
        TextItem {
            runs: format_rich_text(&mtext.content, mtext.height),
            position: ctx.point(mtext.insert),
            height: mtext.height * scale,
            rotation: ctx.rotation(mtext.direction.angle()),
            reference_width: mtext.reference_width.map(|width| width * scale),
            horizontal,
            vertical,
        }
    }
}

/// 非左对齐/基线的单行文字以第二对齐点（组码 11）定位。
fn aligned_anchor(
    insert: Point2,
    alignment_point: Option<Point2>,
    horizontal: i16,
    vertical: i16,
) -> Point2 {
    match alignment_point {
        Some(point) if horizontal != 0 || vertical != 0 => point,
        _ => insert,
    }
}

fn attdef_item(attdef: &AttributeDefinition, ctx: &InsertContext) -> TextItem {
    let (horizontal, vertical) = text_alignment(attdef.horizontal_align, attdef.vertical_align);
    let content = if attdef.default_text.is_empty() {
        &attdef.tag
    } else {
        &attdef.default_text
    };
    TextItem {
        runs: vec![plain_run(decode_special_characters(content))],
        position: ctx.point(aligned_anchor(
            attdef.insert,
            attdef.alignment_point,
            attdef.horizontal_align,
            attdef.vertical_align,
        )),
        height: attdef.height * ctx.average_scale(),
        rotation: ctx.rotation(attdef.rotation),
        reference_width: None,
        horizontal,
        vertical,
    }
}

fn plain_run(text: String) -> TextRun {
    TextRun {
        text,
        ..TextRun::default()
    }
}

/// 块参照的局部变换：平移到插入点、旋转、阵列偏移、缩放，最后扣除块基点。
pub fn block_transform(insert: &Insert, base_point: Point2, column: u32, row: u32) -> DAffine2 {
    let offset = DVec2::new(
        column as f64 * insert.column_spacing,
        row as f64 * insert.row_spacing,
    );
    DAffine2::from_translation(insert.insert.as_vec2())
        * DAffine2::from_angle(insert.rotation)
        * DAffine2::from_translation(offset)
        * DAffine2::from_scale(insert.scale.as_vec2())
        * DAffine2::from_translation(-base_point.as_vec2())
}
