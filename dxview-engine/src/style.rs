use dxview_core::document::{EntityCommon, Layer, LayerTable, Linetype, LinetypeTable};
use serde::Serialize;

use crate::palette::{DEFAULT_COLOR, Rgb, aci_color};

/// ByBlock 颜色号。
pub const COLOR_BY_BLOCK: i16 = 0;
/// ByLayer 颜色号。
pub const COLOR_BY_LAYER: i16 = 256;

const LINETYPE_BY_BLOCK: &str = "BYBLOCK";
const LINETYPE_BY_LAYER: &str = "BYLAYER";
const LINETYPE_CONTINUOUS: &str = "CONTINUOUS";

/// 计算实体的显示颜色。
///
/// 优先级：显式真彩色（仅当颜色号为 1..=255）> ByBlock 继承色 > 调色板颜色 > 图层颜色。
/// 颜色号为 ByBlock/ByLayer 时附带的真彩色不参与计算。
pub fn resolve_color(common: &EntityCommon, layers: &LayerTable, inherited: Option<Rgb>) -> Rgb {
    match common.color_index {
        Some(index @ 1..=255) => match common.true_color {
            Some(true_color) => Rgb::new(true_color),
            None => aci_color(index).unwrap_or(DEFAULT_COLOR),
        },
        Some(COLOR_BY_BLOCK) => inherited.unwrap_or(DEFAULT_COLOR),
        _ => layer_color(layers.get(&common.layer)),
    }
}

/// 图层颜色：非零真彩色优先，其次 1..=255 的调色板颜色。
pub fn layer_color(layer: Option<&Layer>) -> Rgb {
    let Some(layer) = layer else {
        return DEFAULT_COLOR;
    };
    if let Some(true_color) = layer.true_color.filter(|value| *value != 0) {
        return Rgb::new(true_color);
    }
    aci_color(layer.color_index).unwrap_or(DEFAULT_COLOR)
}

/// 已缩放的线型图案：正数为实线段，负数为间隙，零为点。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinePattern {
    pub elements: Vec<f64>,
    pub total_length: f64,
}

impl LinePattern {
    pub fn scaled(linetype: &Linetype, scale: f64) -> Self {
        let elements: Vec<f64> = linetype
            .pattern
            .iter()
            .map(|value| if *value == 0.0 { 0.0 } else { value * scale })
            .collect();
        let total_length = elements.iter().map(|value| value.abs()).sum();
        Self {
            elements,
            total_length,
        }
    }
}

/// 在线型表中查找的结果。
enum Lookup {
    /// 找到定义；`None` 表示实线（CONTINUOUS 或没有间隙的图案）。
    Found(Option<LinePattern>),
    Missing,
}

fn lookup(name: &str, linetypes: &LinetypeTable, scale: f64) -> Lookup {
    if name.eq_ignore_ascii_case(LINETYPE_CONTINUOUS) {
        return Lookup::Found(None);
    }
    match linetypes.get(name) {
        Some(linetype) if linetype.has_gaps() => {
            Lookup::Found(Some(LinePattern::scaled(linetype, scale)))
        }
        Some(_) => Lookup::Found(None),
        None => Lookup::Missing,
    }
}

/// 实体自身线型名解析后的候选名称：BYBLOCK 取继承值，BYLAYER 交给图层。
fn own_linetype_name<'a>(common: &'a EntityCommon, inherited: Option<&'a str>) -> Option<&'a str> {
    match common.linetype.as_deref() {
        Some(name) if name.eq_ignore_ascii_case(LINETYPE_BY_BLOCK) => inherited,
        Some(name) if name.eq_ignore_ascii_case(LINETYPE_BY_LAYER) => None,
        other => other,
    }
}

/// 实际生效的线型名，用于向块内实体传递 ByBlock 线型。
pub fn effective_linetype_name<'a>(
    common: &'a EntityCommon,
    layers: &'a LayerTable,
    inherited: Option<&'a str>,
) -> Option<&'a str> {
    own_linetype_name(common, inherited).or_else(|| {
        layers
            .get(&common.layer)
            .and_then(|layer| layer.linetype.as_deref())
    })
}

/// 线型整体缩放：实体比例（缺省 1）乘以全局比例。
pub fn linetype_scale(common: &EntityCommon, global_scale: f64) -> f64 {
    let scale = common.linetype_scale.unwrap_or(1.0) * global_scale;
    // 非正或非有限的比例无法沿曲线推进图案
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    }
}

/// 计算实体的线型图案，返回 `None` 表示实线。
pub fn resolve_linetype(
    common: &EntityCommon,
    layers: &LayerTable,
    linetypes: &LinetypeTable,
    global_scale: f64,
    inherited: Option<&str>,
) -> Option<LinePattern> {
    let scale = linetype_scale(common, global_scale);
    if let Some(name) = own_linetype_name(common, inherited) {
        if let Lookup::Found(pattern) = lookup(name, linetypes, scale) {
            return pattern;
        }
    }
    let layer_name = layers.get(&common.layer)?.linetype.as_deref()?;
    match lookup(layer_name, linetypes, scale) {
        Lookup::Found(pattern) => pattern,
        Lookup::Missing => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::palette_entry;

    fn layers() -> LayerTable {
        let mut table = LayerTable::new();
        let mut walls = Layer::new("WALLS");
        walls.color_index = 1;
        walls.linetype = Some("DASHED".to_string());
        table.insert(walls);

        let mut white = Layer::new("WHITE");
        white.color_index = 7;
        table.insert(white);

        let mut custom = Layer::new("CUSTOM");
        custom.color_index = 3;
        custom.true_color = Some(0x123456);
        table.insert(custom);

        let mut zero_true = Layer::new("ZERO");
        zero_true.color_index = 5;
        zero_true.true_color = Some(0);
        table.insert(zero_true);
        table
    }

    fn linetypes() -> LinetypeTable {
        let mut table = LinetypeTable::new();
        table.insert(Linetype::new("Dashed", vec![0.5, -0.25]));
        table.insert(Linetype::new("DOT", vec![0.0, -0.2]));
        table.insert(Linetype::new("NOGAPS", vec![1.0, 0.0]));
        table.insert(Linetype::new("CENTER", vec![1.25, -0.25, 0.25, -0.25]));
        table
    }

    fn entity(layer: &str, color: Option<i16>) -> EntityCommon {
        let mut common = EntityCommon::on_layer(layer);
        common.color_index = color;
        common
    }

    #[test]
    fn by_block_uses_inherited_color() {
        let common = entity("WALLS", Some(0));
        let block_color = Rgb(0xABCDEF);
        assert_eq!(resolve_color(&common, &layers(), Some(block_color)), block_color);
        assert_eq!(resolve_color(&common, &layers(), None), DEFAULT_COLOR);
    }

    #[test]
    fn explicit_index_and_true_color() {
        let mut common = entity("WALLS", Some(5));
        assert_eq!(resolve_color(&common, &layers(), None), Rgb(0x0000FF));
        common.true_color = Some(0x112233);
        assert_eq!(resolve_color(&common, &layers(), None), Rgb(0x112233));
        common.color_index = Some(7);
        common.true_color = None;
        assert_eq!(resolve_color(&common, &layers(), None), Rgb::BLACK);
    }

    #[test]
    fn by_layer_and_absent_fall_back_to_layer() {
        let layers = layers();
        assert_eq!(
            resolve_color(&entity("WALLS", Some(256)), &layers, None),
            palette_entry(1).expect("调色板 1")
        );
        assert_eq!(
            resolve_color(&entity("WALLS", None), &layers, None),
            Rgb(0xFF0000)
        );
        assert_eq!(resolve_color(&entity("WHITE", None), &layers, None), Rgb::BLACK);
        assert_eq!(resolve_color(&entity("CUSTOM", None), &layers, None), Rgb(0x123456));
        assert_eq!(resolve_color(&entity("ZERO", None), &layers, None), Rgb(0x0000FF));
        assert_eq!(resolve_color(&entity("MISSING", None), &layers, None), DEFAULT_COLOR);
        // 越界颜色号按 ByLayer 处理
        assert_eq!(
            resolve_color(&entity("WALLS", Some(300)), &layers, None),
            Rgb(0xFF0000)
        );
    }

    #[test]
    fn true_color_ignored_for_by_layer() {
        let mut common = entity("WALLS", Some(256));
        common.true_color = Some(0x00FF00);
        assert_eq!(resolve_color(&common, &layers(), None), Rgb(0xFF0000));
    }

    #[test]
    fn linetype_from_layer_and_case_insensitive_lookup() {
        let common = entity("WALLS", None);
        let pattern = resolve_linetype(&common, &layers(), &linetypes(), 1.0, None)
            .expect("应继承图层的 DASHED");
        assert_eq!(pattern.elements, vec![0.5, -0.25]);
        assert!((pattern.total_length - 0.75).abs() < 1e-12);
    }

    #[test]
    fn continuous_and_gapless_patterns_are_solid() {
        let mut common = entity("WALLS", None);
        common.linetype = Some("Continuous".to_string());
        assert!(resolve_linetype(&common, &layers(), &linetypes(), 1.0, None).is_none());

        common.linetype = Some("NOGAPS".to_string());
        assert!(resolve_linetype(&common, &layers(), &linetypes(), 1.0, None).is_none());
    }

    #[test]
    fn by_block_linetype_uses_inherited_name() {
        let mut common = entity("0", None);
        common.linetype = Some("ByBlock".to_string());
        let pattern = resolve_linetype(&common, &layers(), &linetypes(), 1.0, Some("center"))
            .expect("应使用块的 CENTER 线型");
        assert_eq!(pattern.elements.len(), 4);

        assert!(resolve_linetype(&common, &layers(), &linetypes(), 1.0, None).is_none());
    }

    #[test]
    fn by_block_without_inherited_falls_to_layer() {
        let mut common = entity("WALLS", None);
        common.linetype = Some("BYBLOCK".to_string());
        assert!(resolve_linetype(&common, &layers(), &linetypes(), 1.0, None).is_some());
    }

    #[test]
    fn unknown_name_falls_back_to_layer() {
        let mut common = entity("WALLS", None);
        common.linetype = Some("PHANTOM_MISSING".to_string());
        let pattern = resolve_linetype(&common, &layers(), &linetypes(), 1.0, None)
            .expect("应回退到图层线型");
        assert_eq!(pattern.elements, vec![0.5, -0.25]);
    }

    #[test]
    fn scaling_multiplies_entity_and_global_scale() {
        let mut common = entity("0", None);
        common.linetype = Some("DOT".to_string());
        common.linetype_scale = Some(2.0);
        let pattern = resolve_linetype(&common, &layers(), &linetypes(), 3.0, None)
            .expect("DOT 含间隙");
        assert_eq!(pattern.elements[0], 0.0);
        assert!(pattern.elements[0].is_sign_positive());
        assert!((pattern.elements[1] + 1.2).abs() < 1e-12);
        assert!((pattern.total_length - 1.2).abs() < 1e-12);
    }

    #[test]
    fn effective_name_passes_block_linetype_down() {
        let layers = layers();
        let mut common = entity("WALLS", None);
        assert_eq!(effective_linetype_name(&common, &layers, None), Some("DASHED"));
        common.linetype = Some("BYBLOCK".to_string());
        assert_eq!(
            effective_linetype_name(&common, &layers, Some("CENTER")),
            Some("CENTER")
        );
    }
}
