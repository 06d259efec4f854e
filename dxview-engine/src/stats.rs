//! 文档统计摘要。

use std::collections::BTreeMap;

use dxview_core::document::Document;
use serde::Serialize;

/// 只读统计。文件名与大小由调用方提供，不从 DXF 内容推导。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentStatistics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    pub total_entities: usize,
    pub entities_by_type: BTreeMap<String, usize>,
    pub layer_count: usize,
    pub block_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

pub fn document_statistics(
    document: &Document,
    file_name: Option<&str>,
    file_size: Option<u64>,
) -> DocumentStatistics {
    let mut entities_by_type = BTreeMap::new();
    for entity in document.entities() {
        *entities_by_type
            .entry(entity.type_name().to_string())
            .or_insert(0) += 1;
    }
    DocumentStatistics {
        file_name: file_name.map(str::to_string),
        file_size,
        total_entities: document.entities().len(),
        entities_by_type,
        layer_count: document.layers().len(),
        block_count: document.block_count(),
        version: document.version().map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use dxview_core::document::{
        BlockDefinition, Circle, Entity, EntityCommon, EntityKind, HeaderValue, Layer, Line,
    };
    use dxview_core::geometry::Point2;

    use super::*;

    #[test]
    fn counts_entities_by_type() {
        let mut document = Document::new();
        document.set_header_value("$ACADVER", HeaderValue::Text("AC1027".to_string()));
        document.add_layer(Layer::new("0"));
        document.add_layer(Layer::new("WALLS"));
        document.add_block(BlockDefinition::new("DOOR"));
        for _ in 0..2 {
            document.add_entity(Entity::new(
                EntityCommon::default(),
                EntityKind::Line(Line {
                    start: Point2::new(0.0, 0.0),
                    end: Point2::new(1.0, 1.0),
                }),
            ));
        }
        document.add_entity(Entity::new(
            EntityCommon::default(),
            EntityKind::Circle(Circle {
                center: Point2::new(0.0, 0.0),
                radius: 2.0,
            }),
        ));

        let stats = document_statistics(&document, Some("plan.dxf"), Some(2048));
        assert_eq!(stats.total_entities, 3);
        assert_eq!(stats.entities_by_type.get("LINE"), Some(&2));
        assert_eq!(stats.entities_by_type.get("CIRCLE"), Some(&1));
        assert_eq!(stats.layer_count, 2);
        assert_eq!(stats.block_count, 1);
        assert_eq!(stats.version.as_deref(), Some("AC1027"));
        assert_eq!(stats.file_name.as_deref(), Some("plan.dxf"));
    }

    #[test]
    fn empty_document_has_no_version() {
        let stats = document_statistics(&Document::new(), None, None);
        assert_eq!(stats, DocumentStatistics::default());
    }
}
