//! 命令行输出：统计、渲染报告与可选的图层表。

use std::collections::BTreeMap;
use std::fmt::Write;

use dxview_core::document::LayerTable;
use dxview_engine::palette::Rgb;
use dxview_engine::scene::{RenderOutput, RenderReport};
use dxview_engine::stats::DocumentStatistics;
use dxview_engine::style::layer_color;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct LayerSummary {
    pub name: String,
    pub color: Rgb,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linetype: Option<String>,
    pub is_visible: bool,
    pub is_frozen: bool,
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub statistics: DocumentStatistics,
    pub draw_items: usize,
    pub primitives: BTreeMap<&'static str, usize>,
    pub report: RenderReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layers: Option<Vec<LayerSummary>>,
}

impl Summary {
    pub fn new(
        statistics: DocumentStatistics,
        output: &RenderOutput,
        layers: Option<&LayerTable>,
    ) -> Self {
        let mut primitives = BTreeMap::new();
        for item in &output.items {
            *primitives.entry(item.primitive.label()).or_insert(0) += 1;
        }
        let layers = layers.map(|table| {
            table
                .sorted()
                .into_iter()
                .map(|layer| LayerSummary {
                    name: layer.name.clone(),
                    color: layer_color(Some(layer)),
                    linetype: layer.linetype.clone(),
                    is_visible: layer.is_visible,
                    is_frozen: layer.is_frozen,
                })
                .collect()
        });
        Self {
            statistics,
            draw_items: output.items.len(),
            primitives,
            report: output.report.clone(),
            layers,
        }
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        // 写入 String 不会失败
        let _ = self.write_text(&mut out);
        out
    }

    fn write_text(&self, out: &mut String) -> std::fmt::Result {
        let stats = &self.statistics;
        let name = stats.file_name.as_deref().unwrap_or("-");
        match stats.file_size {
            Some(size) => writeln!(out, "文件: {name} ({size} 字节)")?,
            None => writeln!(out, "文件: {name}")?,
        }
        writeln!(out, "版本: {}", stats.version.as_deref().unwrap_or("未知"))?;
        writeln!(out, "实体总数: {}", stats.total_entities)?;
        for (kind, count) in &stats.entities_by_type {
            writeln!(out, "  {kind}: {count}")?;
        }
        writeln!(out, "图层数: {}", stats.layer_count)?;
        writeln!(out, "块定义数: {}", stats.block_count)?;

        let report = &self.report;
        writeln!(
            out,
            "渲染: 失败 {} / {} 个实体，生成 {} 个图元",
            report.failed_entities, report.total_entities, self.draw_items
        )?;
        for (kind, count) in &self.primitives {
            writeln!(out, "  {kind}: {count}")?;
        }
        if report.truncated_hatches > 0 {
            writeln!(out, "填充图案被截断: {}", report.truncated_hatches)?;
        }
        if !report.unsupported.is_empty() {
            let kinds: Vec<String> = report
                .unsupported
                .iter()
                .map(|(kind, count)| format!("{kind} x{count}"))
                .collect();
            writeln!(out, "未支持的实体: {}", kinds.join(", "))?;
        }
        if !report.messages.is_empty() {
            writeln!(out, "失败示例:")?;
            for message in &report.messages {
                writeln!(out, "  - {message}")?;
            }
        }

        if let Some(layers) = &self.layers {
            writeln!(out, "图层表:")?;
            for layer in layers {
                let mut flags = String::new();
                if !layer.is_visible {
                    flags.push_str(" [关闭]");
                }
                if layer.is_frozen {
                    flags.push_str(" [冻结]");
                }
                writeln!(
                    out,
                    "  - {} 颜色 {} 线型 {}{}",
                    layer.name,
                    layer.color,
                    layer.linetype.as_deref().unwrap_or("CONTINUOUS"),
                    flags
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use dxview_core::document::{Document, Entity, EntityCommon, EntityKind, Layer, Line};
    use dxview_core::geometry::Point2;
    use dxview_engine::scene::{RenderOptions, render_document};
    use dxview_engine::stats::document_statistics;

    use super::*;

    fn sample_document() -> Document {
        let mut document = Document::new();
        let mut layer = Layer::new("WALLS");
        layer.color_index = 1;
        layer.is_frozen = true;
        document.add_layer(layer);
        document.add_entity(Entity::new(
            EntityCommon::on_layer("WALLS"),
            EntityKind::Line(Line {
                start: Point2::new(0.0, 0.0),
                end: Point2::new(3.0, 4.0),
            }),
        ));
        document.add_entity(Entity::new(
            EntityCommon::default(),
            EntityKind::Unknown {
                type_name: "IMAGE".to_string(),
            },
        ));
        document
    }

    #[test]
    fn text_summary_lists_counts_and_report() {
        let document = sample_document();
        let output = render_document(&document, &RenderOptions::default());
        let stats = document_statistics(&document, Some("plan.dxf"), Some(128));
        let text = Summary::new(stats, &output, Some(document.layers())).to_text();

        assert!(text.contains("文件: plan.dxf (128 字节)"));
        assert!(text.contains("实体总数: 2"));
        assert!(text.contains("  LINE: 1"));
        assert!(text.contains("渲染: 失败 0 / 2 个实体，生成 1 个图元"));
        assert!(text.contains("未支持的实体: IMAGE x1"));
        assert!(text.contains("WALLS 颜色 #ff0000 线型 CONTINUOUS [冻结]"));
    }

    #[test]
    fn json_summary_omits_layers_unless_requested() {
        let document = sample_document();
        let output = render_document(&document, &RenderOptions::default());
        let stats = document_statistics(&document, None, None);
        let json = serde_json::to_value(Summary::new(stats, &output, None)).expect("序列化");
        assert!(json.get("layers").is_none());
        assert_eq!(json["report"]["unsupported"]["IMAGE"], 1);
        assert_eq!(json["primitives"]["polyline"], 1);
    }
}
