pub mod geometry {
    use glam::{DVec2, DVec3};
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示，保持双精度。
    #[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn vector_to(self, other: Point2) -> Vector2 {
            Vector2(other.0 - self.0)
        }

        #[inline]
        pub fn distance_to(self, other: Point2) -> f64 {
            self.0.distance(other.0)
        }

        /// 线性插值，`t = 0` 返回自身，`t = 1` 返回 `other`。
        #[inline]
        pub fn lerp(self, other: Point2, t: f64) -> Point2 {
            Self(self.0.lerp(other.0, t))
        }

        #[inline]
        pub fn midpoint(self, other: Point2) -> Point2 {
            self.lerp(other, 0.5)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn is_finite(self) -> bool {
            self.0.is_finite()
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量。
    #[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_points(start: Point2, end: Point2) -> Self {
            Self(end.0 - start.0)
        }

        /// 由角度（弧度）构造单位向量。
        #[inline]
        pub fn from_angle(angle: f64) -> Self {
            Self(DVec2::new(angle.cos(), angle.sin()))
        }

        #[inline]
        pub fn length(self) -> f64 {
            self.0.length()
        }

        #[inline]
        pub fn length_squared(self) -> f64 {
            self.0.length_squared()
        }

        #[inline]
        pub fn normalize(self) -> Option<Self> {
            let len = self.0.length();
            if len <= f64::EPSILON {
                None
            } else {
                Some(Self(self.0 / len))
            }
        }

        /// 逆时针旋转 90° 的垂直向量。
        #[inline]
        pub fn perp(self) -> Self {
            Self(self.0.perp())
        }

        #[inline]
        pub fn dot(self, other: Vector2) -> f64 {
            self.0.dot(other.0)
        }

        /// 二维叉积（z 分量）。
        #[inline]
        pub fn cross(self, other: Vector2) -> f64 {
            self.0.perp_dot(other.0)
        }

        #[inline]
        pub fn angle(self) -> f64 {
            self.0.y.atan2(self.0.x)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 三维点，用于 3DFACE 与头部变量中的坐标。
    #[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
    pub struct Point3(pub DVec3);

    impl Point3 {
        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn z(self) -> f64 {
            self.0.z
        }

        /// 投影到 XY 平面。
        #[inline]
        pub fn xy(self) -> Point2 {
            Point2::new(self.0.x, self.0.y)
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }
    }

    impl From<DVec3> for Point3 {
        fn from(value: DVec3) -> Self {
            Self(value)
        }
    }

    /// 轴对齐边界框，用于估算文档/实体范围。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        #[inline]
        pub fn new(min: Point2, max: Point2) -> Self {
            Self { min, max }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point2>) -> Self {
            let mut bounds = Self::empty();
            for point in points {
                bounds.include_point(*point);
            }
            bounds
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        #[inline]
        pub fn width(&self) -> f64 {
            self.max.x() - self.min.x()
        }

        #[inline]
        pub fn height(&self) -> f64 {
            self.max.y() - self.min.y()
        }

        /// 四个角点，逆时针顺序，从最小角开始。
        pub fn corners(&self) -> [Point2; 4] {
            [
                self.min,
                Point2::new(self.max.x(), self.min.y()),
                self.max,
                Point2::new(self.min.x(), self.max.y()),
            ]
        }

        pub fn include_point(&mut self, point: Point2) {
            if !point.is_finite() {
                return;
            }
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            let min_vec = self.min.as_vec2().min(point.as_vec2());
            let max_vec = self.max.as_vec2().max(point.as_vec2());
            self.min = Point2::from_vec(min_vec);
            self.max = Point2::from_vec(max_vec);
        }

        pub fn include_bounds(&mut self, other: &Bounds2D) {
            if other.is_empty() {
                return;
            }
            self.include_point(other.min);
            self.include_point(other.max);
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            debug_assert!(!self.is_empty());
            let center = (self.min.as_vec2() + self.max.as_vec2()) * 0.5;
            Point2::from_vec(center)
        }
    }
}

pub mod document {
    use std::collections::HashMap;
    use std::collections::hash_map::Values;

    use serde::{Deserialize, Serialize};

    use crate::geometry::{Bounds2D, Point2, Point3, Vector2};

    /// 未指定图层时实体归属的默认图层。
    pub const DEFAULT_LAYER: &str = "0";

    /// 头部变量值，类型由组码范围决定。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "type", content = "value", rename_all = "snake_case")]
    pub enum HeaderValue {
        Text(String),
        Real(f64),
        Integer(i64),
        Bool(bool),
        Point(Point3),
    }

    impl HeaderValue {
        pub fn as_str(&self) -> Option<&str> {
            match self {
                HeaderValue::Text(text) => Some(text),
                _ => None,
            }
        }

        /// 数值型变量统一转为 `f64`。
        pub fn as_f64(&self) -> Option<f64> {
            match self {
                HeaderValue::Real(value) => Some(*value),
                HeaderValue::Integer(value) => Some(*value as f64),
                _ => None,
            }
        }

        pub fn as_point(&self) -> Option<Point3> {
            match self {
                HeaderValue::Point(point) => Some(*point),
                _ => None,
            }
        }
    }

    /// 所有实体共享的属性：图层、颜色、线型、可见性与句柄。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct EntityCommon {
        pub layer: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub color_index: Option<i16>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub true_color: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub linetype: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub linetype_scale: Option<f64>,
        pub is_visible: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub handle: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub owner_handle: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub extended_data: Vec<String>,
    }

    impl Default for EntityCommon {
        fn default() -> Self {
            Self {
                layer: DEFAULT_LAYER.to_string(),
                color_index: None,
                true_color: None,
                linetype: None,
                linetype_scale: None,
                is_visible: true,
                handle: None,
                owner_handle: None,
                extended_data: Vec::new(),
            }
        }
    }

    impl EntityCommon {
        #[inline]
        pub fn on_layer(layer: impl Into<String>) -> Self {
            Self {
                layer: layer.into(),
                ..Self::default()
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Entity {
        pub common: EntityCommon,
        pub kind: EntityKind,
    }

    impl Entity {
        #[inline]
        pub fn new(common: EntityCommon, kind: EntityKind) -> Self {
            Self { common, kind }
        }

        #[inline]
        pub fn layer_name(&self) -> &str {
            &self.common.layer
        }

        #[inline]
        pub fn type_name(&self) -> &str {
            self.kind.type_name()
        }

        /// 计算实体的 2D 轴对齐范围，文本与块参照退化为插入点。
        pub fn bounds(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            match &self.kind {
                EntityKind::Line(line) => {
                    bounds.include_point(line.start);
                    bounds.include_point(line.end);
                }
                EntityKind::Circle(circle) => {
                    include_circle(&mut bounds, circle.center, circle.radius);
                }
                EntityKind::Arc(arc) => {
                    include_circle(&mut bounds, arc.center, arc.radius);
                }
                EntityKind::Ellipse(ellipse) => {
                    let reach = ellipse.major_axis.length();
                    include_circle(&mut bounds, ellipse.center, reach);
                }
                EntityKind::Polyline(polyline) => {
                    for vertex in &polyline.vertices {
                        bounds.include_point(vertex.position);
                    }
                }
                EntityKind::Spline(spline) => {
                    for point in spline.control_points.iter().chain(&spline.fit_points) {
                        bounds.include_point(*point);
                    }
                }
                EntityKind::Text(text) => bounds.include_point(text.insert),
                EntityKind::MText(mtext) => bounds.include_point(mtext.insert),
                EntityKind::Dimension(dimension) => {
                    bounds.include_point(dimension.definition_point);
                    for point in [
                        dimension.text_midpoint,
                        dimension.first_point,
                        dimension.second_point,
                        dimension.radial_point,
                        dimension.arc_point,
                    ]
                    .into_iter()
                    .flatten()
                    {
                        bounds.include_point(point);
                    }
                }
                EntityKind::Insert(insert) => bounds.include_point(insert.insert),
                EntityKind::Solid(solid) => {
                    for corner in &solid.corners {
                        bounds.include_point(*corner);
                    }
                }
                EntityKind::Face(face) => {
                    for vertex in &face.vertices {
                        bounds.include_point(vertex.xy());
                    }
                }
                EntityKind::Point(point) => bounds.include_point(point.position),
                EntityKind::Hatch(hatch) => {
                    for boundary in &hatch.loops {
                        for edge in &boundary.edges {
                            include_hatch_edge(&mut bounds, edge);
                        }
                    }
                }
                EntityKind::Leader(leader) => {
                    for vertex in &leader.vertices {
                        bounds.include_point(*vertex);
                    }
                }
                EntityKind::MLeader(mleader) => {
                    for line in &mleader.leader_lines {
                        for vertex in line {
                            bounds.include_point(*vertex);
                        }
                    }
                    if let Some(location) = mleader.text_location {
                        bounds.include_point(location);
                    }
                }
                EntityKind::Attdef(attdef) => bounds.include_point(attdef.insert),
                EntityKind::Unknown { .. } => {}
            }
            if bounds.is_empty() { None } else { Some(bounds) }
        }
    }

    fn include_circle(bounds: &mut Bounds2D, center: Point2, radius: f64) {
        let radius = radius.abs();
        bounds.include_point(Point2::new(center.x() - radius, center.y() - radius));
        bounds.include_point(Point2::new(center.x() + radius, center.y() + radius));
    }

    fn include_hatch_edge(bounds: &mut Bounds2D, edge: &HatchEdge) {
        match edge {
            HatchEdge::Line { start, end } | HatchEdge::PolylineSegment { start, end, .. } => {
                bounds.include_point(*start);
                bounds.include_point(*end);
            }
            HatchEdge::Arc { center, radius, .. } => include_circle(bounds, *center, *radius),
            HatchEdge::Ellipse {
                center, major_axis, ..
            } => include_circle(bounds, *center, major_axis.length()),
            HatchEdge::Spline {
                control_points,
                fit_points,
                ..
            } => {
                for point in control_points.iter().chain(fit_points) {
                    bounds.include_point(*point);
                }
            }
        }
    }

    /// 实体类型的封闭枚举。新增类型时渲染分发处会在编译期报出缺失分支。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "kind", rename_all = "snake_case")]
    pub enum EntityKind {
        Line(Line),
        Circle(Circle),
        Arc(Arc),
        Ellipse(Ellipse),
        Polyline(Polyline),
        Spline(Spline),
        Text(Text),
        MText(MText),
        Dimension(Dimension),
        Insert(Insert),
        Solid(Solid),
        Face(Face),
        Point(PointEntity),
        Hatch(Hatch),
        Leader(Leader),
        MLeader(MLeader),
        Attdef(AttributeDefinition),
        /// 未识别的实体类型，保留原始类型名以维持实体计数。
        Unknown { type_name: String },
    }

    impl EntityKind {
        /// DXF 中对应的类型名。
        pub fn type_name(&self) -> &str {
            match self {
                EntityKind::Line(_) => "LINE",
                EntityKind::Circle(_) => "CIRCLE",
                EntityKind::Arc(_) => "ARC",
                EntityKind::Ellipse(_) => "ELLIPSE",
                EntityKind::Polyline(polyline) => {
                    if polyline.is_lightweight {
                        "LWPOLYLINE"
                    } else {
                        "POLYLINE"
                    }
                }
                EntityKind::Spline(_) => "SPLINE",
                EntityKind::Text(_) => "TEXT",
                EntityKind::MText(_) => "MTEXT",
                EntityKind::Dimension(_) => "DIMENSION",
                EntityKind::Insert(_) => "INSERT",
                EntityKind::Solid(solid) if solid.is_trace => "TRACE",
                EntityKind::Solid(_) => "SOLID",
                EntityKind::Face(_) => "3DFACE",
                EntityKind::Point(_) => "POINT",
                EntityKind::Hatch(_) => "HATCH",
                EntityKind::Leader(_) => "LEADER",
                EntityKind::MLeader(_) => "MULTILEADER",
                EntityKind::Attdef(_) => "ATTDEF",
                EntityKind::Unknown { type_name } => type_name,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
    pub struct Line {
        pub start: Point2,
        pub end: Point2,
    }

    #[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
    pub struct Circle {
        pub center: Point2,
        pub radius: f64,
    }

    /// 圆弧实体，角度以弧度形式储存，遵循数学正方向。
    #[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
    pub struct Arc {
        pub center: Point2,
        pub radius: f64,
        pub start_angle: f64,
        pub end_angle: f64,
    }

    /// 椭圆实体，记录主轴向量与参数范围（单位为弧度）。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Ellipse {
        pub center: Point2,
        pub major_axis: Vector2,
        pub ratio: f64,
        pub start_parameter: f64,
        pub end_parameter: f64,
    }

    impl Default for Ellipse {
        fn default() -> Self {
            Self {
                center: Point2::default(),
                major_axis: Vector2::new(1.0, 0.0),
                ratio: 1.0,
                start_parameter: 0.0,
                end_parameter: std::f64::consts::TAU,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct PolylineVertex {
        pub position: Point2,
        pub bulge: f64,
    }

    impl PolylineVertex {
        #[inline]
        pub fn new(position: Point2) -> Self {
            Self {
                position,
                bulge: 0.0,
            }
        }

        #[inline]
        pub fn with_bulge(position: Point2, bulge: f64) -> Self {
            Self { position, bulge }
        }
    }

    #[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
    pub struct Polyline {
        pub vertices: Vec<PolylineVertex>,
        pub is_closed: bool,
        /// `true` 表示来源于 LWPOLYLINE，`false` 表示旧式 POLYLINE/VERTEX 序列。
        pub is_lightweight: bool,
    }

    #[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
    pub struct Spline {
        pub degree: i32,
        pub is_closed: bool,
        pub is_periodic: bool,
        pub is_rational: bool,
        pub knot_values: Vec<f64>,
        pub weights: Vec<f64>,
        pub control_points: Vec<Point2>,
        pub fit_points: Vec<Point2>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Text {
        pub insert: Point2,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub alignment_point: Option<Point2>,
        pub content: String,
        pub height: f64,
        pub rotation: f64,
        pub width_factor: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub style: Option<String>,
        pub horizontal_align: i16,
        pub vertical_align: i16,
    }

    impl Default for Text {
        fn default() -> Self {
            Self {
                insert: Point2::default(),
                alignment_point: None,
                content: String::new(),
                height: 1.0,
                rotation: 0.0,
                width_factor: 1.0,
                style: None,
                horizontal_align: 0,
                vertical_align: 0,
            }
        }
    }

    /// 多行文字。`content` 保留原始内联格式码，由渲染层解析。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct MText {
        pub insert: Point2,
        pub content: String,
        pub height: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub reference_width: Option<f64>,
        pub direction: Vector2,
        pub attachment_point: i16,
        pub drawing_direction: i16,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub style: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub line_spacing: Option<f64>,
    }

    impl Default for MText {
        fn default() -> Self {
            Self {
                insert: Point2::default(),
                content: String::new(),
                height: 1.0,
                reference_width: None,
                direction: Vector2::new(1.0, 0.0),
                attachment_point: 0,
                drawing_direction: 1,
                style: None,
                line_spacing: None,
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum DimensionKind {
        Linear,
        Aligned,
        Angular,
        Diameter,
        Radius,
        Angular3Point,
        Ordinate,
        Unknown(i16),
    }

    impl DimensionKind {
        /// 由组码 70 的低 4 位推导标注类型。
        pub fn from_flags(flags: i16) -> Self {
            match flags & 0x0F {
                0 => DimensionKind::Linear,
                1 => DimensionKind::Aligned,
                2 => DimensionKind::Angular,
                3 => DimensionKind::Diameter,
                4 => DimensionKind::Radius,
                5 => DimensionKind::Angular3Point,
                6 => DimensionKind::Ordinate,
                other => DimensionKind::Unknown(other),
            }
        }

        #[inline]
        pub fn is_radial(self) -> bool {
            matches!(self, DimensionKind::Radius | DimensionKind::Diameter)
        }
    }

    /// 标注实体。点位遵循 DXF 组码约定：10 定义点、11 文字中点、13/14 测量点、15 径向点、16 弧线点。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Dimension {
        /// 序列化时改名，避免与 `EntityKind` 的 `kind` 标签冲突。
        #[serde(rename = "dimension_kind")]
        pub kind: DimensionKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub block_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub style: Option<String>,
        pub definition_point: Point2,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub text_midpoint: Option<Point2>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub first_point: Option<Point2>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub second_point: Option<Point2>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub radial_point: Option<Point2>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub arc_point: Option<Point2>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub measurement: Option<f64>,
        pub rotation: f64,
    }

    impl Default for Dimension {
        fn default() -> Self {
            Self {
                kind: DimensionKind::Linear,
                block_name: None,
                style: None,
                definition_point: Point2::default(),
                text_midpoint: None,
                first_point: None,
                second_point: None,
                radial_point: None,
                arc_point: None,
                text: None,
                measurement: None,
                rotation: 0.0,
            }
        }
    }

    /// 块参照附带的属性值。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Attribute {
        pub common: EntityCommon,
        pub tag: String,
        pub text: String,
        pub insert: Point2,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub alignment_point: Option<Point2>,
        pub height: f64,
        pub rotation: f64,
        pub horizontal_align: i16,
        pub vertical_align: i16,
        pub is_invisible: bool,
    }

    impl Default for Attribute {
        fn default() -> Self {
            Self {
                common: EntityCommon::default(),
                tag: String::new(),
                text: String::new(),
                insert: Point2::default(),
                alignment_point: None,
                height: 1.0,
                rotation: 0.0,
                horizontal_align: 0,
                vertical_align: 0,
                is_invisible: false,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Insert {
        pub block_name: String,
        pub insert: Point2,
        pub scale: Vector2,
        pub rotation: f64,
        pub column_count: u32,
        pub row_count: u32,
        pub column_spacing: f64,
        pub row_spacing: f64,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub attributes: Vec<Attribute>,
    }

    impl Default for Insert {
        fn default() -> Self {
            Self {
                block_name: String::new(),
                insert: Point2::default(),
                scale: Vector2::new(1.0, 1.0),
                rotation: 0.0,
                column_count: 1,
                row_count: 1,
                column_spacing: 0.0,
                row_spacing: 0.0,
                attributes: Vec::new(),
            }
        }
    }

    /// SOLID/TRACE 四边形，角点按 DXF 顺序（1、2、3、4）存放。
    #[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
    pub struct Solid {
        pub corners: [Point2; 4],
        /// 来源为 TRACE 记录。
        #[serde(default)]
        pub is_trace: bool,
    }

    #[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
    pub struct Face {
        pub vertices: [Point3; 4],
        pub invisible_edges: [bool; 4],
    }

    #[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
    pub struct PointEntity {
        pub position: Point2,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub enum HatchEdge {
        Line {
            start: Point2,
            end: Point2,
        },
        PolylineSegment {
            start: Point2,
            end: Point2,
            bulge: f64,
        },
        /// 角度为弧度；顺时针边界按 DXF 约定存储镜像角度。
        Arc {
            center: Point2,
            radius: f64,
            start_angle: f64,
            end_angle: f64,
            is_counter_clockwise: bool,
        },
        Ellipse {
            center: Point2,
            major_axis: Vector2,
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
        },
    }

    #[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
    pub struct HatchLoop {
        pub flags: i32,
        pub is_polyline: bool,
        pub is_closed: bool,
        pub edges: Vec<HatchEdge>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub boundary_handles: Vec<String>,
    }

    /// 填充图案中的一族平行线。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct HatchPatternLine {
        pub angle: f64,
        pub base_point: Point2,
        pub offset: Vector2,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub dashes: Vec<f64>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Hatch {
        pub pattern_name: String,
        pub is_solid: bool,
        pub pattern_angle: f64,
        pub pattern_scale: f64,
        pub loops: Vec<HatchLoop>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub pattern_lines: Vec<HatchPatternLine>,
    }

    impl Default for Hatch {
        fn default() -> Self {
            Self {
                pattern_name: "SOLID".to_string(),
                is_solid: false,
                pattern_angle: 0.0,
                pattern_scale: 1.0,
                loops: Vec::new(),
                pattern_lines: Vec::new(),
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
    pub struct Leader {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub style_name: Option<String>,
        pub vertices: Vec<Point2>,
        pub has_arrowhead: bool,
    }

    #[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
    pub struct MLeader {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub style_name: Option<String>,
        pub leader_lines: Vec<Vec<Point2>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub text_location: Option<Point2>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub text_height: Option<f64>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct AttributeDefinition {
        pub tag: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub prompt: Option<String>,
        pub default_text: String,
        pub insert: Point2,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub alignment_point: Option<Point2>,
        pub height: f64,
        pub rotation: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub style: Option<String>,
        pub horizontal_align: i16,
        pub vertical_align: i16,
        pub is_invisible: bool,
        pub is_constant: bool,
    }

    impl Default for AttributeDefinition {
        fn default() -> Self {
            Self {
                tag: String::new(),
                prompt: None,
                default_text: String::new(),
                insert: Point2::default(),
                alignment_point: None,
                height: 1.0,
                rotation: 0.0,
                style: None,
                horizontal_align: 0,
                vertical_align: 0,
                is_invisible: false,
                is_constant: false,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Layer {
        pub name: String,
        pub color_index: i16,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub true_color: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub linetype: Option<String>,
        pub is_frozen: bool,
        pub is_visible: bool,
    }

    impl Layer {
        #[inline]
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                color_index: 7,
                true_color: None,
                linetype: None,
                is_frozen: false,
                is_visible: true,
            }
        }

        /// 图层既未关闭也未冻结。
        #[inline]
        pub fn is_displayed(&self) -> bool {
            self.is_visible && !self.is_frozen
        }
    }

    /// 图层表，按名称精确查找。
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct LayerTable {
        layers: HashMap<String, Layer>,
    }

    impl LayerTable {
        pub fn new() -> Self {
            Self::default()
        }

        /// 插入图层；同名图层以后读到的定义为准。
        pub fn insert(&mut self, layer: Layer) {
            self.layers.insert(layer.name.clone(), layer);
        }

        #[inline]
        pub fn get(&self, name: &str) -> Option<&Layer> {
            self.layers.get(name)
        }

        #[inline]
        pub fn len(&self) -> usize {
            self.layers.len()
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.layers.is_empty()
        }

        pub fn iter(&self) -> Values<'_, String, Layer> {
            self.layers.values()
        }

        /// 按名称排序后的图层列表，便于稳定输出。
        pub fn sorted(&self) -> Vec<&Layer> {
            let mut layers: Vec<&Layer> = self.layers.values().collect();
            layers.sort_by(|a, b| a.name.cmp(&b.name));
            layers
        }
    }

    /// 线型定义：正数为实线段，负数为间隙，零为点。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Linetype {
        pub name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub description: Option<String>,
        pub pattern: Vec<f64>,
        pub total_length: f64,
    }

    impl Linetype {
        pub fn new(name: impl Into<String>, pattern: Vec<f64>) -> Self {
            let total_length = pattern.iter().map(|value| value.abs()).sum();
            Self {
                name: name.into(),
                description: None,
                pattern,
                total_length,
            }
        }

        /// 至少包含一个间隙时才构成虚线图案。
        #[inline]
        pub fn has_gaps(&self) -> bool {
            self.pattern.iter().any(|value| *value < 0.0)
        }
    }

    /// 线型表，名称查找不区分大小写。
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct LinetypeTable {
        linetypes: HashMap<String, Linetype>,
    }

    impl LinetypeTable {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&mut self, linetype: Linetype) {
            self.linetypes
                .insert(linetype.name.to_uppercase(), linetype);
        }

        #[inline]
        pub fn get(&self, name: &str) -> Option<&Linetype> {
            self.linetypes.get(&name.to_uppercase())
        }

        #[inline]
        pub fn len(&self) -> usize {
            self.linetypes.len()
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.linetypes.is_empty()
        }

        pub fn iter(&self) -> Values<'_, String, Linetype> {
            self.linetypes.values()
        }
    }

    /// 块定义，实体坐标位于块局部坐标系。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct BlockDefinition {
        pub name: String,
        pub base_point: Point2,
        pub entities: Vec<Entity>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub handle: Option<String>,
        pub layer: String,
    }

    impl BlockDefinition {
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                base_point: Point2::default(),
                entities: Vec::new(),
                handle: None,
                layer: DEFAULT_LAYER.to_string(),
            }
        }

        /// 匿名块（模型空间、图纸空间、标注块等）以 `*` 开头。
        #[inline]
        pub fn is_anonymous(&self) -> bool {
            self.name.starts_with('*')
        }
    }

    /// 一次解析得到的完整文档，解析完成后只读。
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct Document {
        header: HashMap<String, HeaderValue>,
        layers: LayerTable,
        linetypes: LinetypeTable,
        blocks: HashMap<String, BlockDefinition>,
        entities: Vec<Entity>,
    }

    impl Document {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_header_value(&mut self, name: impl Into<String>, value: HeaderValue) {
            self.header.insert(name.into(), value);
        }

        #[inline]
        pub fn header_value(&self, name: &str) -> Option<&HeaderValue> {
            self.header.get(name)
        }

        #[inline]
        pub fn header(&self) -> &HashMap<String, HeaderValue> {
            &self.header
        }

        /// `$ACADVER` 记录的文件版本号。
        pub fn version(&self) -> Option<&str> {
            self.header_value("$ACADVER").and_then(HeaderValue::as_str)
        }

        /// `$LTSCALE` 全局线型比例，缺省为 1。
        pub fn linetype_scale(&self) -> f64 {
            self.header_value("$LTSCALE")
                .and_then(HeaderValue::as_f64)
                .filter(|scale| scale.is_finite() && *scale > 0.0)
                .unwrap_or(1.0)
        }

        pub fn add_layer(&mut self, layer: Layer) {
            self.layers.insert(layer);
        }

        #[inline]
        pub fn layers(&self) -> &LayerTable {
            &self.layers
        }

        pub fn add_linetype(&mut self, linetype: Linetype) {
            self.linetypes.insert(linetype);
        }

        #[inline]
        pub fn linetypes(&self) -> &LinetypeTable {
            &self.linetypes
        }

        pub fn add_block(&mut self, block: BlockDefinition) {
            self.blocks.insert(block.name.clone(), block);
        }

        #[inline]
        pub fn block(&self, name: &str) -> Option<&BlockDefinition> {
            self.blocks.get(name)
        }

        pub fn blocks(&self) -> impl Iterator<Item = &BlockDefinition> {
            self.blocks.values()
        }

        #[inline]
        pub fn block_count(&self) -> usize {
            self.blocks.len()
        }

        pub fn add_entity(&mut self, entity: Entity) {
            self.entities.push(entity);
        }

        #[inline]
        pub fn entities(&self) -> &[Entity] {
            &self.entities
        }

        /// 顶层实体的整体范围。
        pub fn bounds(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            for entity in &self.entities {
                if let Some(entity_bounds) = entity.bounds() {
                    bounds.include_bounds(&entity_bounds);
                }
            }
            if bounds.is_empty() { None } else { Some(bounds) }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn document_stores_tables_and_entities() {
            let mut doc = Document::new();
            doc.set_header_value("$ACADVER", HeaderValue::Text("AC1027".to_string()));
            doc.add_layer(Layer::new("WALLS"));
            doc.add_linetype(Linetype::new("Dashed", vec![0.5, -0.25]));
            doc.add_entity(Entity::new(
                EntityCommon::on_layer("WALLS"),
                EntityKind::Line(Line {
                    start: Point2::new(0.0, 0.0),
                    end: Point2::new(10.0, 5.0),
                }),
            ));
            doc.add_entity(Entity::new(
                EntityCommon::default(),
                EntityKind::Circle(Circle {
                    center: Point2::new(20.0, 0.0),
                    radius: 2.0,
                }),
            ));

            assert_eq!(doc.version(), Some("AC1027"));
            assert_eq!(doc.entities().len(), 2);
            assert_eq!(doc.entities()[1].layer_name(), DEFAULT_LAYER);
            assert!(doc.layers().get("WALLS").is_some());
            assert!(doc.linetypes().get("DASHED").is_some());
            assert!(doc.linetypes().get("dashed").is_some());

            let bounds = doc.bounds().expect("document bounds should exist");
            assert!((bounds.min().x() - 0.0).abs() < 1e-9);
            assert!((bounds.min().y() + 2.0).abs() < 1e-9);
            assert!((bounds.max().x() - 22.0).abs() < 1e-9);
            assert!((bounds.max().y() - 5.0).abs() < 1e-9);
        }

        #[test]
        fn linetype_total_length_sums_absolute_values() {
            let linetype = Linetype::new("CENTER", vec![1.25, -0.25, 0.25, -0.25]);
            assert!((linetype.total_length - 2.0).abs() < 1e-12);
            assert!(linetype.has_gaps());
            assert!(!Linetype::new("SOLIDISH", vec![1.0]).has_gaps());
        }

        #[test]
        fn linetype_scale_defaults_to_one() {
            let mut doc = Document::new();
            assert_eq!(doc.linetype_scale(), 1.0);
            doc.set_header_value("$LTSCALE", HeaderValue::Real(2.5));
            assert_eq!(doc.linetype_scale(), 2.5);
            doc.set_header_value("$LTSCALE", HeaderValue::Real(0.0));
            assert_eq!(doc.linetype_scale(), 1.0);
        }

        #[test]
        fn unknown_entity_keeps_type_name() {
            let entity = Entity::new(
                EntityCommon::default(),
                EntityKind::Unknown {
                    type_name: "VIEWPORT".to_string(),
                },
            );
            assert_eq!(entity.type_name(), "VIEWPORT");
            assert!(entity.bounds().is_none());
        }

        #[test]
        fn dimension_entity_round_trips_through_json() {
            let entity = Entity::new(
                EntityCommon::on_layer("DIMS"),
                EntityKind::Dimension(Dimension {
                    kind: DimensionKind::Radius,
                    block_name: Some("*D3".to_string()),
                    definition_point: Point2::new(1.0, 2.0),
                    radial_point: Some(Point2::new(4.0, 2.0)),
                    measurement: Some(3.0),
                    ..Dimension::default()
                }),
            );
            let json = serde_json::to_string(&entity).expect("序列化失败");
            assert_eq!(json.matches("\"kind\"").count(), 1);
            let restored: Entity = serde_json::from_str(&json).expect("反序列化失败");
            assert_eq!(restored, entity);
        }

        #[test]
        fn trace_keeps_its_type_name() {
            let trace = EntityKind::Solid(Solid {
                is_trace: true,
                ..Solid::default()
            });
            assert_eq!(trace.type_name(), "TRACE");
            assert_eq!(EntityKind::Solid(Solid::default()).type_name(), "SOLID");
        }

        #[test]
        fn dimension_kind_uses_low_bits() {
            assert_eq!(DimensionKind::from_flags(32), DimensionKind::Linear);
            assert_eq!(DimensionKind::from_flags(33), DimensionKind::Aligned);
            assert_eq!(DimensionKind::from_flags(36), DimensionKind::Radius);
            assert!(DimensionKind::from_flags(3).is_radial());
        }

        #[test]
        fn anonymous_block_detection() {
            assert!(BlockDefinition::new("*Model_Space").is_anonymous());
            assert!(!BlockDefinition::new("DOOR").is_anonymous());
        }
    }
}
