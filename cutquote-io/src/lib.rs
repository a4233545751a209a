use std::convert::TryFrom;
use std::fs;
use std::path::Path;

use cutquote_core::{
    document::{Arc, Circle, Document, DrawingUnits, Entity, Line, Polyline, PolylineVertex, Spline},
    geometry::Point2,
};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid document structure: {0}")]
    InvalidDocument(String),
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Document, IoError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DxfFacade;

impl DxfFacade {
    pub fn new() -> Self {
        Self
    }

    /// 解析内存中的 DXF 文本，上传层通常直接调用此入口。
    pub fn parse_str(&self, source: &str) -> Result<Document, IoError> {
        DxfParser::new(source).parse().map_err(|err| match err {
            DxfError::Syntax { message } | DxfError::Entity { message } => {
                IoError::InvalidDocument(message)
            }
            DxfError::Unsupported { feature } => IoError::InvalidDocument(feature),
        })
    }
}

impl DocumentLoader for DxfFacade {
    fn load(&self, path: &Path) -> Result<Document, IoError> {
        let data = fs::read_to_string(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse_str(&data)
    }
}

/// VERTEX 组码 70：曲线拟合生成的样条框架控制点。
const VERTEX_SPLINE_FRAME: i16 = 0x10;

/// 解析过程中的错误分级：`Syntax` 终止整个文件，
/// `Entity` 与 `Unsupported` 只影响当前实体。
#[derive(Debug)]
enum DxfError {
    Syntax { message: String },
    Entity { message: String },
    Unsupported { feature: String },
}

impl DxfError {
    fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax {
            message: message.into(),
        }
    }

    fn entity(message: impl Into<String>) -> Self {
        Self::Entity {
            message: message.into(),
        }
    }

    fn unsupported(feature: impl Into<String>) -> Self {
        Self::Unsupported {
            feature: feature.into(),
        }
    }
}

struct DxfParser<'a> {
    reader: DxfReader<'a>,
}

impl<'a> DxfParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            reader: DxfReader::new(source),
        }
    }

    fn parse(mut self) -> Result<Document, DxfError> {
        let mut document = Document::new();
        while let Some((code, value)) = self.reader.next_pair()? {
            if code == 999 {
                continue;
            }
            if code != 0 {
                return Err(DxfError::syntax(format!(
                    "意外的组码 {code}（期望 0 表示 SECTION/EOF）"
                )));
            }
            match value.trim() {
                "SECTION" => {
                    let (name_code, name) = self
                        .reader
                        .next_pair()?
                        .ok_or_else(|| DxfError::syntax("SECTION 缺少名称（组码 2）"))?;
                    if name_code != 2 {
                        return Err(DxfError::syntax(format!(
                            "SECTION 名称使用了组码 {name_code}（期望 2）"
                        )));
                    }
                    match name.trim() {
                        "HEADER" => self.parse_header(&mut document)?,
                        "ENTITIES" => self.parse_entities(&mut document)?,
                        _ => self.skip_section()?,
                    }
                }
                "EOF" => break,
                unexpected => {
                    return Err(DxfError::syntax(format!(
                        "意外的标记 {unexpected}，期望 SECTION 或 EOF"
                    )));
                }
            }
        }

        info!(
            has_entity_table = document.has_entity_table(),
            entity_count = document.entities().count(),
            skipped = document.skipped_entities(),
            units = ?document.units(),
            "DXF 解析完成"
        );
        Ok(document)
    }

    fn skip_section(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) if value.trim() == "ENDSEC" => break,
                Some(_) => continue,
                None => {
                    return Err(DxfError::syntax("SECTION 未找到 ENDSEC 终止标记"));
                }
            }
        }
        Ok(())
    }

    fn parse_header(&mut self, document: &mut Document) -> Result<(), DxfError> {
        let mut current_variable: Option<String> = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) if value.trim() == "ENDSEC" => break,
                Some((9, name)) => current_variable = Some(name.trim().to_string()),
                Some((70, value)) if current_variable.as_deref() == Some("$INSUNITS") => {
                    match parse_i32(&value, "$INSUNITS") {
                        Ok(code) => document.set_units(DrawingUnits::from_insunits(code)),
                        // 单位无法识别时按无单位处理，不影响几何读取
                        Err(err) => warn!(error = ?err, "忽略无法解析的 $INSUNITS"),
                    }
                }
                Some(_) => {}
                None => return Err(DxfError::syntax("HEADER 段未找到 ENDSEC 终止标记")),
            }
        }
        Ok(())
    }

    fn parse_entities(&mut self, document: &mut Document) -> Result<(), DxfError> {
        document.ensure_entity_table();
        loop {
            let (code, value) = match self.reader.next_pair()? {
                Some(pair) => pair,
                None => return Err(DxfError::syntax("ENTITIES 段提前结束")),
            };
            if code != 0 {
                return Err(DxfError::syntax(format!(
                    "ENTITIES 段遇到组码 {code}（期望 0 表示实体起始）"
                )));
            }

            let kind = value.trim().to_string();
            let parsed = match kind.as_str() {
                "ENDSEC" => break,
                // 游离的顶点或序列结束标记（通常来自被跳过的 POLYLINE）
                "VERTEX" | "SEQEND" => {
                    self.skip_entity_body()?;
                    continue;
                }
                "POLYLINE" => self.parse_polyline(),
                other => self.parse_entity(other),
            };

            match parsed {
                Ok(entity) => {
                    document.add_entity(entity);
                }
                Err(DxfError::Unsupported { feature }) => {
                    debug!(kind = %kind, feature = %feature, "跳过不支持的实体");
                    self.skip_entity_body()?;
                    document.record_skipped();
                }
                Err(DxfError::Entity { message }) => {
                    warn!(
                        kind = %kind,
                        line = self.reader.line_number(),
                        reason = %message,
                        "实体数据损坏，已跳过"
                    );
                    self.skip_entity_body()?;
                    document.record_skipped();
                }
                Err(err @ DxfError::Syntax { .. }) => return Err(err),
            }
        }
        Ok(())
    }

    fn parse_entity(&mut self, kind: &str) -> Result<Entity, DxfError> {
        match kind {
            "LINE" => self.parse_line(),
            "CIRCLE" => self.parse_circle(),
            "ARC" => self.parse_arc(),
            "LWPOLYLINE" => self.parse_lwpolyline(),
            "SPLINE" => self.parse_spline(),
            other => Err(DxfError::unsupported(format!("暂不支持的实体类型 {other}"))),
        }
    }

    fn parse_line(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut start_x = None;
        let mut start_y = None;
        let mut end_x = None;
        let mut end_y = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    10 => assign_coord(&mut start_x, &value, "LINE 起点 X（组码 10）")?,
                    20 => assign_coord(&mut start_y, &value, "LINE 起点 Y（组码 20）")?,
                    11 => assign_coord(&mut end_x, &value, "LINE 终点 X（组码 11）")?,
                    21 => assign_coord(&mut end_y, &value, "LINE 终点 Y（组码 21）")?,
                    30 | 31 => {} // 忽略 Z 坐标
                    _ => {}
                },
                None => return Err(DxfError::syntax("LINE 未正确结束")),
            }
        }

        let layer = layer.unwrap_or_else(|| "0".to_string());
        let sx = start_x.ok_or_else(|| DxfError::entity("LINE 缺少起点 X（组码 10）"))?;
        let sy = start_y.ok_or_else(|| DxfError::entity("LINE 缺少起点 Y（组码 20）"))?;
        let ex = end_x.ok_or_else(|| DxfError::entity("LINE 缺少终点 X（组码 11）"))?;
        let ey = end_y.ok_or_else(|| DxfError::entity("LINE 缺少终点 Y（组码 21）"))?;

        Ok(Entity::Line(Line {
            start: Point2::new(sx, sy),
            end: Point2::new(ex, ey),
            layer,
        }))
    }

    fn parse_circle(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut center_x = None;
        let mut center_y = None;
        let mut radius = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    10 => assign_coord(&mut center_x, &value, "CIRCLE 圆心 X（组码 10）")?,
                    20 => assign_coord(&mut center_y, &value, "CIRCLE 圆心 Y（组码 20）")?,
                    40 => assign_coord(&mut radius, &value, "CIRCLE 半径（组码 40）")?,
                    _ => {}
                },
                None => return Err(DxfError::syntax("CIRCLE 未正确结束")),
            }
        }

        let layer = layer.unwrap_or_else(|| "0".to_string());
        let cx = center_x.ok_or_else(|| DxfError::entity("CIRCLE 缺少圆心 X（组码 10）"))?;
        let cy = center_y.ok_or_else(|| DxfError::entity("CIRCLE 缺少圆心 Y（组码 20）"))?;
        let radius = radius.ok_or_else(|| DxfError::entity("CIRCLE 缺少半径（组码 40）"))?;

        Ok(Entity::Circle(Circle {
            center: Point2::new(cx, cy),
            radius,
            layer,
        }))
    }

    fn parse_arc(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut center_x = None;
        let mut center_y = None;
        let mut radius = None;
        let mut start_angle = None;
        let mut end_angle = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    10 => assign_coord(&mut center_x, &value, "ARC 圆心 X（组码 10）")?,
                    20 => assign_coord(&mut center_y, &value, "ARC 圆心 Y（组码 20）")?,
                    40 => assign_coord(&mut radius, &value, "ARC 半径（组码 40）")?,
                    50 => assign_coord(&mut start_angle, &value, "ARC 起始角（组码 50）")?,
                    51 => assign_coord(&mut end_angle, &value, "ARC 终止角（组码 51）")?,
                    _ => {}
                },
                None => return Err(DxfError::syntax("ARC 未正确结束")),
            }
        }

        let layer = layer.unwrap_or_else(|| "0".to_string());
        let cx = center_x.ok_or_else(|| DxfError::entity("ARC 缺少圆心 X（组码 10）"))?;
        let cy = center_y.ok_or_else(|| DxfError::entity("ARC 缺少圆心 Y（组码 20）"))?;
        let radius = radius.ok_or_else(|| DxfError::entity("ARC 缺少半径（组码 40）"))?;
        let start_angle =
            start_angle.ok_or_else(|| DxfError::entity("ARC 缺少起始角（组码 50）"))?;
        let end_angle = end_angle.ok_or_else(|| DxfError::entity("ARC 缺少终止角（组码 51）"))?;

        Ok(Entity::Arc(Arc {
            center: Point2::new(cx, cy),
            radius,
            start_angle,
            end_angle,
            layer,
        }))
    }

    fn parse_lwpolyline(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut is_closed = false;
        let mut vertices: Vec<PolylineVertex> = Vec::new();
        let mut pending_x: Option<f64> = None;
        let mut pending_y: Option<f64> = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    70 => {
                        let flag = parse_i32(&value, "LWPOLYLINE 标志")?;
                        is_closed = flag & 0x01 == 0x01;
                    }
                    10 => {
                        let x = parse_f64(&value, "LWPOLYLINE 顶点 X")?;
                        if let Some(y) = pending_y.take() {
                            vertices.push(PolylineVertex::new(Point2::new(x, y)));
                        } else if pending_x.replace(x).is_some() {
                            return Err(DxfError::entity("LWPOLYLINE 顶点缺少对应的 Y（组码 20）"));
                        }
                    }
                    20 => {
                        let y = parse_f64(&value, "LWPOLYLINE 顶点 Y")?;
                        if let Some(x) = pending_x.take() {
                            vertices.push(PolylineVertex::new(Point2::new(x, y)));
                        } else if pending_y.replace(y).is_some() {
                            return Err(DxfError::entity("LWPOLYLINE 顶点缺少对应的 X（组码 10）"));
                        }
                    }
                    42 => {
                        let bulge = parse_f64(&value, "LWPOLYLINE 顶点 bulge")?;
                        let vertex = vertices.last_mut().ok_or_else(|| {
                            DxfError::entity("LWPOLYLINE 在定义首个顶点前遇到 bulge（组码 42）")
                        })?;
                        vertex.bulge = bulge;
                    }
                    _ => {}
                },
                None => return Err(DxfError::syntax("LWPOLYLINE 未正确结束")),
            }
        }

        if pending_x.is_some() || pending_y.is_some() {
            return Err(DxfError::entity(
                "LWPOLYLINE 顶点坐标成对出现（组码 10/20），检测到不完整的顶点",
            ));
        }

        if vertices.is_empty() {
            return Err(DxfError::entity("LWPOLYLINE 未解析到任何顶点"));
        }

        let layer = layer.unwrap_or_else(|| "0".to_string());
        Ok(Entity::Polyline(Polyline {
            vertices,
            is_closed,
            layer,
        }))
    }

    /// 旧式 POLYLINE：头部之后跟随若干 VERTEX，以 SEQEND 结束。
    fn parse_polyline(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut flags: i16 = 0;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    70 => flags = parse_i16(&value, "POLYLINE 标志（组码 70）")?,
                    _ => {}
                },
                None => return Err(DxfError::syntax("POLYLINE 未正确结束")),
            }
        }

        if flags & (0x10 | 0x40) != 0 {
            return Err(DxfError::unsupported("POLYLINE Mesh/Polyface 暂不参与切割计算"));
        }

        let mut vertices: Vec<PolylineVertex> = Vec::new();
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => match value.trim() {
                    "VERTEX" => {
                        if let Some(vertex) = self.parse_vertex()? {
                            vertices.push(vertex);
                        }
                    }
                    "SEQEND" => {
                        self.skip_entity_body()?;
                        break;
                    }
                    _ => {
                        // 缺少 SEQEND，交还给实体循环处理
                        self.reader.put_back((0, value));
                        break;
                    }
                },
                Some(_) => {}
                None => return Err(DxfError::syntax("POLYLINE 顶点序列未正确结束")),
            }
        }

        if vertices.is_empty() {
            return Err(DxfError::entity("POLYLINE 未解析到任何顶点"));
        }

        Ok(Entity::Polyline(Polyline {
            vertices,
            is_closed: flags & 0x01 != 0,
            layer: layer.unwrap_or_else(|| "0".to_string()),
        }))
    }

    /// 样条框架控制点（标志 16）不在切割路径上，返回 `None`。
    fn parse_vertex(&mut self) -> Result<Option<PolylineVertex>, DxfError> {
        let mut x = None;
        let mut y = None;
        let mut bulge = 0.0;
        let mut flags: i16 = 0;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    10 => assign_coord(&mut x, &value, "VERTEX X（组码 10）")?,
                    20 => assign_coord(&mut y, &value, "VERTEX Y（组码 20）")?,
                    42 => bulge = parse_f64(&value, "VERTEX bulge（组码 42）")?,
                    70 => flags = parse_i16(&value, "VERTEX 标志（组码 70）")?,
                    _ => {}
                },
                None => return Err(DxfError::syntax("VERTEX 未正确结束")),
            }
        }
        if flags & VERTEX_SPLINE_FRAME != 0 {
            return Ok(None);
        }
        let x = x.ok_or_else(|| DxfError::entity("VERTEX 缺少 X（组码 10）"))?;
        let y = y.ok_or_else(|| DxfError::entity("VERTEX 缺少 Y（组码 20）"))?;
        Ok(Some(PolylineVertex::with_bulge(Point2::new(x, y), bulge)))
    }

    fn parse_spline(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut flags: i16 = 0;
        let mut degree: Option<i32> = None;
        let mut control_points: Vec<Point2> = Vec::new();
        let mut pending_control_x: Option<f64> = None;

        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    70 => flags = parse_i16(&value, "SPLINE 类型标志（组码 70）")?,
                    71 => degree = Some(parse_i32(&value, "SPLINE 阶数（组码 71）")?),
                    10 => {
                        if pending_control_x
                            .replace(parse_f64(&value, "SPLINE 控制点 X（组码 10）")?)
                            .is_some()
                        {
                            return Err(DxfError::entity(
                                "SPLINE 控制点 X（组码 10）在未提供 Y 之前重复出现",
                            ));
                        }
                    }
                    20 => {
                        let y = parse_f64(&value, "SPLINE 控制点 Y（组码 20）")?;
                        let x = pending_control_x.take().ok_or_else(|| {
                            DxfError::entity("SPLINE 控制点 Y（组码 20）缺少对应的 X")
                        })?;
                        control_points.push(Point2::new(x, y));
                    }
                    // 拟合点、节点、权重只在真正的 B 样条求值中需要，这里按控制多边形近似
                    _ => {}
                },
                None => return Err(DxfError::syntax("SPLINE 未正确结束")),
            }
        }

        if let Some(x) = pending_control_x {
            return Err(DxfError::entity(format!(
                "SPLINE 控制点 X={x} 缺少对应的 Y（组码 20）"
            )));
        }

        Ok(Entity::Spline(Spline {
            degree,
            is_closed: flags & 0x01 != 0,
            control_points,
            layer: layer.unwrap_or_else(|| "0".to_string()),
        }))
    }

    fn skip_entity_body(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some(_) => continue,
                None => break,
            }
        }
        Ok(())
    }
}

struct DxfReader<'a> {
    lines: std::str::Lines<'a>,
    buffer: Option<(i32, String)>,
    line_number: usize,
}

impl<'a> DxfReader<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            lines: source.trim_start_matches('\u{feff}').lines(),
            buffer: None,
            line_number: 0,
        }
    }

    fn line_number(&self) -> usize {
        self.line_number
    }

    fn next_pair(&mut self) -> Result<Option<(i32, String)>, DxfError> {
        if let Some(pair) = self.buffer.take() {
            return Ok(Some(pair));
        }

        let code_line = loop {
            match self.lines.next() {
                Some(line) => {
                    self.line_number += 1;
                    // 文件末尾常见的空行不视为组码
                    if !line.trim().is_empty() {
                        break line;
                    }
                }
                None => return Ok(None),
            }
        };

        let value_line = match self.lines.next() {
            Some(line) => {
                self.line_number += 1;
                line
            }
            None => {
                return Err(DxfError::syntax(format!(
                    "文件在第 {} 行结束，缺少与组码对应的值行",
                    self.line_number
                )));
            }
        };

        let code = code_line.trim().parse::<i32>().map_err(|_| {
            DxfError::syntax(format!(
                "第 {} 行的组码 \"{}\" 无法解析为整数",
                self.line_number - 1,
                code_line.trim()
            ))
        })?;
        let value = value_line.trim_end_matches('\r').to_string();
        Ok(Some((code, value)))
    }

    fn put_back(&mut self, pair: (i32, String)) {
        debug_assert!(self.buffer.is_none(), "内部错误：尝试多次回退 DXF pair");
        self.buffer = Some(pair);
    }
}

fn assign_coord(slot: &mut Option<f64>, raw: &str, context: &str) -> Result<(), DxfError> {
    if slot.is_some() {
        return Err(DxfError::entity(format!("{context} 出现重复值")));
    }
    *slot = Some(parse_f64(raw, context)?);
    Ok(())
}

fn parse_f64(raw: &str, context: &str) -> Result<f64, DxfError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| DxfError::entity(format!("{context} 解析失败（值：\"{raw}\"）")))
}

fn parse_i32(raw: &str, context: &str) -> Result<i32, DxfError> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| DxfError::entity(format!("{context} 解析失败（值：\"{raw}\"）")))
}

fn parse_i16(raw: &str, context: &str) -> Result<i16, DxfError> {
    let value = parse_i32(raw, context)?;
    i16::try_from(value)
        .map_err(|_| DxfError::entity(format!("{context} 超出 i16 范围（值：{value}）")))
}
