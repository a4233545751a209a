pub mod catalog;
pub mod units;

pub mod geometry {
    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示，坐标单位统一为毫米。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
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
        pub fn distance_to(self, other: Point2) -> f64 {
            self.0.distance(other.0)
        }

        #[inline]
        pub fn scale(self, factor: f64) -> Self {
            Self(self.0 * factor)
        }

        #[inline]
        pub fn is_finite(self) -> bool {
            self.0.is_finite()
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 轴对齐边界框，按点流式扩展。
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

        pub fn include_point(&mut self, point: Point2) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            self.min = Point2::from_vec(self.min.as_vec2().min(point.as_vec2()));
            self.max = Point2::from_vec(self.max.as_vec2().max(point.as_vec2()));
        }

        /// 空范围返回 0，避免向外暴露无穷值。
        #[inline]
        pub fn width(&self) -> f64 {
            if self.is_empty() {
                0.0
            } else {
                self.max.x() - self.min.x()
            }
        }

        #[inline]
        pub fn height(&self) -> f64 {
            if self.is_empty() {
                0.0
            } else {
                self.max.y() - self.min.y()
            }
        }
    }

    impl Default for Bounds2D {
        fn default() -> Self {
            Self::empty()
        }
    }
}

pub mod document {
    use serde::{Deserialize, Serialize};

    use crate::geometry::Point2;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EntityId(u64);

    impl EntityId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    /// 图纸单位，对应 HEADER 段的 `$INSUNITS`。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub enum DrawingUnits {
        #[default]
        Unitless,
        Inches,
        Feet,
        Millimeters,
        Centimeters,
        Meters,
    }

    impl DrawingUnits {
        /// 未列出的编码（英里、微英寸等）按无单位处理。
        pub fn from_insunits(code: i32) -> Self {
            match code {
                1 => Self::Inches,
                2 => Self::Feet,
                4 => Self::Millimeters,
                5 => Self::Centimeters,
                6 => Self::Meters,
                _ => Self::Unitless,
            }
        }

        /// 换算到毫米的比例，无单位图纸视为已是毫米。
        pub fn millimeters_per_unit(self) -> f64 {
            match self {
                Self::Unitless | Self::Millimeters => 1.0,
                Self::Inches => 25.4,
                Self::Feet => 304.8,
                Self::Centimeters => 10.0,
                Self::Meters => 1000.0,
            }
        }
    }

    /// DXF 中读取的原始实体记录，尚未做任何几何归一化。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub enum Entity {
        Line(Line),
        Circle(Circle),
        Arc(Arc),
        Polyline(Polyline),
        Spline(Spline),
    }

    impl Entity {
        #[inline]
        pub fn layer_name(&self) -> &str {
            match self {
                Entity::Line(line) => &line.layer,
                Entity::Circle(circle) => &circle.layer,
                Entity::Arc(arc) => &arc.layer,
                Entity::Polyline(polyline) => &polyline.layer,
                Entity::Spline(spline) => &spline.layer,
            }
        }

        pub fn kind_name(&self) -> &'static str {
            match self {
                Entity::Line(_) => "LINE",
                Entity::Circle(_) => "CIRCLE",
                Entity::Arc(_) => "ARC",
                Entity::Polyline(_) => "POLYLINE",
                Entity::Spline(_) => "SPLINE",
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Line {
        pub start: Point2,
        pub end: Point2,
        pub layer: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Circle {
        pub center: Point2,
        pub radius: f64,
        pub layer: String,
    }

    /// 圆弧实体，角度保留 DXF 原始的角度制，逆时针为正。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Arc {
        pub center: Point2,
        pub radius: f64,
        pub start_angle: f64,
        pub end_angle: f64,
        pub layer: String,
    }

    /// LWPOLYLINE 与二维 POLYLINE 共用的表示。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Polyline {
        pub vertices: Vec<PolylineVertex>,
        pub is_closed: bool,
        pub layer: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct PolylineVertex {
        pub position: Point2,
        /// 到下一个顶点的凸度，0 表示直线段。
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

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Spline {
        pub degree: Option<i32>,
        pub is_closed: bool,
        pub control_points: Vec<Point2>,
        pub layer: String,
    }

    /// 解析后的图纸。`entities` 为 `None` 表示源文件没有 ENTITIES 段，
    /// 与“有实体表但为空”区分开。
    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    pub struct Document {
        entities: Option<Vec<(EntityId, Entity)>>,
        next_entity_id: u64,
        units: DrawingUnits,
        skipped_entities: usize,
    }

    impl Document {
        pub fn new() -> Self {
            Self::default()
        }

        /// 创建带有空实体表的文档。
        pub fn with_entity_table() -> Self {
            let mut doc = Self::default();
            doc.ensure_entity_table();
            doc
        }

        pub fn ensure_entity_table(&mut self) {
            self.entities.get_or_insert_with(Vec::new);
        }

        #[inline]
        pub fn has_entity_table(&self) -> bool {
            self.entities.is_some()
        }

        #[inline]
        pub fn entity_table(&self) -> Option<&[(EntityId, Entity)]> {
            self.entities.as_deref()
        }

        pub fn entities(&self) -> impl Iterator<Item = (&EntityId, &Entity)> {
            self.entities
                .iter()
                .flatten()
                .map(|(id, entity)| (id, entity))
        }

        #[inline]
        pub fn units(&self) -> DrawingUnits {
            self.units
        }

        pub fn set_units(&mut self, units: DrawingUnits) {
            self.units = units;
        }

        /// 记录一个被跳过的实体（类型不支持或字段损坏）。
        pub fn record_skipped(&mut self) {
            self.skipped_entities += 1;
        }

        #[inline]
        pub fn skipped_entities(&self) -> usize {
            self.skipped_entities
        }

        pub fn add_entity(&mut self, entity: Entity) -> EntityId {
            let id = self.next_id();
            self.entities.get_or_insert_with(Vec::new).push((id, entity));
            id
        }

        pub fn add_line(&mut self, start: Point2, end: Point2, layer: impl Into<String>) -> EntityId {
            self.add_entity(Entity::Line(Line {
                start,
                end,
                layer: layer.into(),
            }))
        }

        pub fn add_circle(
            &mut self,
            center: Point2,
            radius: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            self.add_entity(Entity::Circle(Circle {
                center,
                radius,
                layer: layer.into(),
            }))
        }

        /// 角度参数为角度制。
        pub fn add_arc(
            &mut self,
            center: Point2,
            radius: f64,
            start_angle: f64,
            end_angle: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            self.add_entity(Entity::Arc(Arc {
                center,
                radius,
                start_angle,
                end_angle,
                layer: layer.into(),
            }))
        }

        pub fn add_polyline(
            &mut self,
            points: impl IntoIterator<Item = Point2>,
            is_closed: bool,
            layer: impl Into<String>,
        ) -> EntityId {
            let vertices = points.into_iter().map(PolylineVertex::new).collect();
            self.add_polyline_with_vertices(vertices, is_closed, layer)
        }

        pub fn add_polyline_with_vertices(
            &mut self,
            vertices: Vec<PolylineVertex>,
            is_closed: bool,
            layer: impl Into<String>,
        ) -> EntityId {
            self.add_entity(Entity::Polyline(Polyline {
                vertices,
                is_closed,
                layer: layer.into(),
            }))
        }

        pub fn add_spline(
            &mut self,
            control_points: Vec<Point2>,
            layer: impl Into<String>,
        ) -> EntityId {
            self.add_entity(Entity::Spline(Spline {
                degree: None,
                is_closed: false,
                control_points,
                layer: layer.into(),
            }))
        }

        fn next_id(&mut self) -> EntityId {
            let id = EntityId::new(self.next_entity_id);
            self.next_entity_id += 1;
            id
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::geometry::{Bounds2D, Point2};

        #[test]
        fn new_document_has_no_entity_table() {
            let doc = Document::new();
            assert!(!doc.has_entity_table());
            assert!(doc.entity_table().is_none());
            assert_eq!(doc.entities().count(), 0);
        }

        #[test]
        fn adding_entities_creates_table_and_assigns_ids() {
            let mut doc = Document::new();
            let line = doc.add_line(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), "0");
            let circle = doc.add_circle(Point2::new(5.0, 5.0), 2.0, "CUT");
            let arc = doc.add_arc(Point2::new(0.0, 0.0), 1.0, 0.0, 90.0, "CUT");

            assert!(doc.has_entity_table());
            assert_eq!(line.get(), 0);
            assert_eq!(circle.get(), 1);
            assert_eq!(arc.get(), 2);
            assert_eq!(doc.entities().count(), 3);

            let layers: Vec<_> = doc.entities().map(|(_, e)| e.layer_name()).collect();
            assert_eq!(layers, vec!["0", "CUT", "CUT"]);
        }

        #[test]
        fn insunits_codes_map_to_millimeter_scale() {
            assert_eq!(DrawingUnits::from_insunits(1), DrawingUnits::Inches);
            assert_eq!(DrawingUnits::from_insunits(4), DrawingUnits::Millimeters);
            assert_eq!(DrawingUnits::from_insunits(99), DrawingUnits::Unitless);
            assert!((DrawingUnits::Inches.millimeters_per_unit() - 25.4).abs() < 1e-12);
            assert!((DrawingUnits::Meters.millimeters_per_unit() - 1000.0).abs() < 1e-12);
            assert!((DrawingUnits::Unitless.millimeters_per_unit() - 1.0).abs() < 1e-12);
        }

        #[test]
        fn bounds_track_points_and_report_zero_extent_when_empty() {
            let empty = Bounds2D::empty();
            assert!(empty.is_empty());
            assert_eq!(empty.width(), 0.0);
            assert_eq!(empty.height(), 0.0);

            let mut bounds = Bounds2D::empty();
            bounds.include_point(Point2::new(1.0, -2.0));
            bounds.include_point(Point2::new(-3.0, 4.0));
            assert_eq!(bounds.min(), Point2::new(-3.0, -2.0));
            assert_eq!(bounds.max(), Point2::new(1.0, 4.0));
            assert!((bounds.width() - 4.0).abs() < 1e-12);
            assert!((bounds.height() - 6.0).abs() < 1e-12);
        }
    }
}
