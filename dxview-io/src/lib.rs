use std::fs;
use std::path::{Path, PathBuf};

use dxview_core::document::{
    BlockDefinition, DEFAULT_LAYER, Document, Entity, HeaderValue, Layer, Linetype,
};
use thiserror::Error;
use tracing::{debug, warn};

mod entities;
mod hatch;
pub mod scanner;

pub use scanner::{Group, GroupValue, Scanner};

#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Parse(#[from] DxfError),
}

/// DXF 解析错误。扫描器误用与文档结构错误会中止解析。
#[derive(Debug, Error)]
pub enum DxfError {
    #[error("DXF 文档为空，未读取到任何组码")]
    EmptyDocument,
    #[error("输入在第 {line} 行之前提前结束，未遇到 EOF 标记")]
    UnexpectedEndOfInput { line: usize },
    #[error("已经读取过 EOF 标记，不能继续读取")]
    AlreadyAtEnd,
    #[error("第 {line} 行坐标格式错误：期望组码 {expected}，实际为 {actual}")]
    MalformedPoint {
        expected: i32,
        actual: i32,
        line: usize,
    },
    #[error("第 {line} 行的组码 \"{raw}\" 无法解析为整数")]
    InvalidGroupCode { raw: String, line: usize },
    #[error("第 {line} 行组码 {code} 的值 \"{raw}\" 无法解析为{expected}")]
    InvalidValue {
        code: i32,
        raw: String,
        expected: &'static str,
        line: usize,
    },
    #[error("{kind}（第 {line} 行）解析失败：{source}")]
    Entity {
        kind: String,
        line: usize,
        #[source]
        source: Box<DxfError>,
    },
    #[error("{message}")]
    Invalid { message: String },
}

impl DxfError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// 剥离实体包装，返回最内层的错误。
    pub fn root_cause(&self) -> &DxfError {
        match self {
            DxfError::Entity { source, .. } => source.root_cause(),
            other => other,
        }
    }
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
}

impl DocumentLoader for DxfFacade {
    fn load(&self, path: &Path) -> Result<Document, IoError> {
        let bytes = fs::read(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        // 老版本 DXF 常用本地代码页编码，非 UTF-8 字节按替换字符处理
        let data = String::from_utf8_lossy(&bytes);
        debug!(path = %path.display(), bytes = bytes.len(), "读取 DXF 文件");
        Ok(parse_document(&data)?)
    }
}

/// 解析一份完整的 DXF 文本。
pub fn parse_document(source: &str) -> Result<Document, DxfError> {
    DxfParser::new(source)?.parse()
}

struct DxfParser {
    scanner: Scanner,
}

impl DxfParser {
    fn new(source: &str) -> Result<Self, DxfError> {
        Ok(Self {
            scanner: Scanner::new(source)?,
        })
    }

    fn parse(mut self) -> Result<Document, DxfError> {
        if self.scanner.is_empty() {
            return Err(DxfError::EmptyDocument);
        }

        let mut document = Document::new();
        // 缺少 EOF 的文件在组读完时正常结束
        while self.scanner.has_next() {
            let group = self.scanner.next()?;
            if group.code != 0 {
                debug!(code = group.code, line = group.line, "跳过段外的组");
                continue;
            }
            match group.text() {
                "SECTION" => {
                    let name = self.scanner.next()?;
                    if name.code != 2 {
                        return Err(DxfError::invalid(format!(
                            "第 {} 行 SECTION 名称使用了组码 {}（期望 2）",
                            name.line, name.code
                        )));
                    }
                    debug!(section = name.text(), line = name.line, "进入段");
                    match name.text() {
                        "HEADER" => self.parse_header(&mut document)?,
                        "TABLES" => self.parse_tables(&mut document)?,
                        "BLOCKS" => self.parse_blocks(&mut document)?,
                        "ENTITIES" => self.parse_entities(&mut document)?,
                        other => {
                            warn!(section = other, "跳过未处理的段");
                            self.skip_section()?;
                        }
                    }
                }
                "EOF" => break,
                other => {
                    warn!(marker = other, line = group.line, "段外出现意外的标记，已忽略");
                    self.scanner.skip_record()?;
                }
            }
        }
        Ok(document)
    }

    /// 读到 `(0, ENDSEC)` 返回 `true`；读到 EOF 时回退一组并返回 `false`，交由主循环结束。
    fn at_section_end(&mut self, group: &Group) -> bool {
        if group.is_marker("EOF") {
            warn!(line = group.line, "段未以 ENDSEC 结束");
            self.scanner.rewind(1);
            return true;
        }
        group.is_marker("ENDSEC")
    }

    fn skip_section(&mut self) -> Result<(), DxfError> {
        loop {
            let group = self.scanner.next()?;
            if self.at_section_end(&group) {
                return Ok(());
            }
        }
    }

    fn parse_header(&mut self, document: &mut Document) -> Result<(), DxfError> {
        loop {
            let group = self.scanner.next()?;
            if group.code == 0 {
                if self.at_section_end(&group) {
                    return Ok(());
                }
                continue;
            }
            if group.code != 9 {
                continue;
            }

            let name = group.text().to_string();
            let Some(code) = self.scanner.peek_code() else {
                continue;
            };
            if code == 0 || code == 9 {
                continue;
            }
            let value = if (10..=39).contains(&code) {
                HeaderValue::Point(self.scanner.read_point(code)?)
            } else {
                let value_group = self.scanner.next()?;
                match value_group.value {
                    GroupValue::Str(text) => HeaderValue::Text(text),
                    GroupValue::Real(value) => HeaderValue::Real(value),
                    GroupValue::Int(value) => HeaderValue::Integer(value),
                    GroupValue::Bool(value) => HeaderValue::Bool(value),
                }
            };
            // 同一变量后续的多余组（如 $DIMBLK 的附加值）忽略
            while let Some(extra) = self.scanner.peek_code() {
                if extra == 0 || extra == 9 {
                    break;
                }
                self.scanner.next()?;
            }
            document.set_header_value(name, value);
        }
    }

    fn parse_tables(&mut self, document: &mut Document) -> Result<(), DxfError> {
        loop {
            let group = self.scanner.next()?;
            if group.code != 0 {
                continue;
            }
            if self.at_section_end(&group) {
                return Ok(());
            }
            match group.text() {
                "TABLE" | "ENDTAB" => self.scanner.skip_record()?,
                "LAYER" => {
                    let layer = self.parse_layer_entry()?;
                    debug!(layer = %layer.name, "读取图层");
                    document.add_layer(layer);
                }
                "LTYPE" => {
                    let linetype = self.parse_linetype_entry()?;
                    debug!(linetype = %linetype.name, "读取线型");
                    document.add_linetype(linetype);
                }
                _ => self.scanner.skip_record()?,
            }
        }
    }

    fn parse_layer_entry(&mut self) -> Result<Layer, DxfError> {
        let mut layer = Layer::new(DEFAULT_LAYER);
        while self.scanner.peek_code().is_some_and(|code| code != 0) {
            let group = self.scanner.next()?;
            match group.code {
                2 => layer.name = group.text().to_string(),
                62 => {
                    let color = group.short();
                    // 负颜色号表示图层关闭
                    layer.is_visible = color >= 0;
                    layer.color_index = color.checked_abs().unwrap_or(i16::MAX);
                }
                420 => layer.true_color = Some((group.int() & 0x00FF_FFFF) as u32),
                6 => layer.linetype = Some(group.text().to_string()),
                70 => layer.is_frozen = group.int() & 1 != 0,
                _ => {}
            }
        }
        Ok(layer)
    }

    fn parse_linetype_entry(&mut self) -> Result<Linetype, DxfError> {
        let mut name = String::new();
        let mut description = None;
        let mut pattern = Vec::new();
        let mut total_length = None;
        while self.scanner.peek_code().is_some_and(|code| code != 0) {
            let group = self.scanner.next()?;
            match group.code {
                2 => name = group.text().to_string(),
                3 => {
                    let text = group.text();
                    if !text.is_empty() {
                        description = Some(text.to_string());
                    }
                }
                40 => total_length = Some(group.real()),
                49 => pattern.push(group.real()),
                _ => {}
            }
        }
        let mut linetype = Linetype::new(name, pattern);
        linetype.description = description;
        if let Some(total) = total_length.filter(|total| *total > 0.0) {
            linetype.total_length = total;
        }
        Ok(linetype)
    }

    fn parse_blocks(&mut self, document: &mut Document) -> Result<(), DxfError> {
        loop {
            let group = self.scanner.next()?;
            if group.code != 0 {
                continue;
            }
            if self.at_section_end(&group) {
                return Ok(());
            }
            if group.text() == "BLOCK" {
                let block = self.parse_block_definition(group.line)?;
                if block.name.is_empty() {
                    warn!(line = group.line, "忽略缺少名称的块定义");
                } else {
                    debug!(block = %block.name, entities = block.entities.len(), "读取块定义");
                    document.add_block(block);
                }
            } else {
                self.scanner.skip_record()?;
            }
        }
    }

    fn parse_block_definition(&mut self, line: usize) -> Result<BlockDefinition, DxfError> {
        let mut block = BlockDefinition::new(String::new());
        while self.scanner.peek_code().is_some_and(|code| code != 0) {
            let group = self.scanner.next()?;
            match group.code {
                2 => block.name = group.text().to_string(),
                3 if block.name.is_empty() => block.name = group.text().to_string(),
                5 => block.handle = Some(group.text().to_string()),
                8 => block.layer = group.text().to_string(),
                10 => block.base_point = self.scanner.read_point_after(&group)?.xy(),
                _ => {}
            }
        }
        block.entities = self.parse_entity_list(&["ENDBLK"]).map_err(|source| {
            DxfError::Entity {
                kind: format!("BLOCK {}", block.name),
                line,
                source: Box::new(source),
            }
        })?;
        Ok(block)
    }

    fn parse_entities(&mut self, document: &mut Document) -> Result<(), DxfError> {
        for entity in self.parse_entity_list(&["ENDSEC"])? {
            document.add_entity(entity);
        }
        Ok(())
    }

    /// 块与实体段共用的实体循环，读到任一终止标记（含其自身字段）后返回。
    fn parse_entity_list(&mut self, terminators: &[&str]) -> Result<Vec<Entity>, DxfError> {
        let mut entities = Vec::new();
        loop {
            let group = self.scanner.next()?;
            if group.code != 0 {
                debug!(code = group.code, line = group.line, "实体之间出现多余的组");
                continue;
            }
            let type_name = group.text();
            if terminators.contains(&type_name) {
                self.scanner.skip_record()?;
                return Ok(entities);
            }
            match type_name {
                "EOF" => {
                    warn!(line = group.line, "实体列表未正常结束");
                    self.scanner.rewind(1);
                    return Ok(entities);
                }
                "ENDSEC" | "ENDBLK" => {
                    self.scanner.rewind(1);
                    return Ok(entities);
                }
                "SEQEND" => self.scanner.skip_record()?,
                _ => match entities::parse_entity(&mut self.scanner, type_name) {
                    Ok(entity) => entities.push(entity),
                    // 字段语义错误只丢弃该实体，扫描器与坐标错误仍然中止解析
                    Err(err) if matches!(err.root_cause(), DxfError::Invalid { .. }) => {
                        warn!(error = %err, "跳过无法解析的实体");
                        self.scanner.skip_record()?;
                    }
                    Err(err) => return Err(err),
                },
            }
        }
    }
}
