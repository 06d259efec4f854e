//! 多行文字（MTEXT）内联格式码解析与文字对齐表。

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;

use crate::palette::{Rgb, aci_color};

// 转义字符的占位符，取自私用区，避免被后续规则误判
const ESCAPED_BACKSLASH: char = '\u{E000}';
const ESCAPED_OPEN_BRACE: char = '\u{E001}';
const ESCAPED_CLOSE_BRACE: char = '\u{E002}';

const PARAGRAPH_BREAK: &str = "\\P";

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("内置正则表达式必须合法")
}

static UNICODE_ESCAPE: Lazy<Regex> = Lazy::new(|| regex(r"\\[Uu]\+([0-9A-Fa-f]{4})"));
static PERCENT_CHAR_CODE: Lazy<Regex> = Lazy::new(|| regex(r"%%(\d{3})"));
static PERCENT_SYMBOL: Lazy<Regex> = Lazy::new(|| regex(r"%%([dDpPcCuUoO%])"));
static STACKED: Lazy<Regex> = Lazy::new(|| regex(r"\\S([^;]*?)([\^/#])([^;]*);"));
static FONT: Lazy<Regex> = Lazy::new(|| regex(r"\\[Ff]([^|;\\]*)((?:\|[^;\\]*)*);"));
static COLOR_INDEX: Lazy<Regex> = Lazy::new(|| regex(r"\\C(\d+);"));
static TRUE_COLOR: Lazy<Regex> = Lazy::new(|| regex(r"\\c(\d+);"));
static HEIGHT: Lazy<Regex> = Lazy::new(|| regex(r"\\H(\d*\.?\d+)([xX]?);"));
static LAYOUT: Lazy<Regex> = Lazy::new(|| regex(r"\\(?:p[^;]*|[AQTW][^;\\]*);"));
static TOGGLE: Lazy<Regex> = Lazy::new(|| regex(r"\\[LlOoKk]"));
static SPACE_MARKER: Lazy<Regex> = Lazy::new(|| regex(r"\\[~N]"));

/// 堆叠文字（分数、上下标）。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackedText {
    pub top: String,
    pub bottom: String,
    /// `/` 水平分数，`#` 斜分数，`^` 上下标。
    pub separator: char,
}

/// 一段带样式的文字，对应解析后的一行。
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TextRun {
    pub text: String,
    /// `None` 表示沿用实体颜色。
    pub color: Option<Rgb>,
    pub height: Option<f64>,
    pub bold: bool,
    pub italic: bool,
    pub font: Option<String>,
    pub stacked: Option<StackedText>,
}

#[derive(Debug, Clone, Default)]
struct FontStyle {
    font: Option<String>,
    bold: bool,
    italic: bool,
}

/// 跨行保留的格式状态。
#[derive(Debug, Clone, Default)]
struct CarryState {
    color: Option<Rgb>,
    height: Option<f64>,
    style: FontStyle,
}

fn protect_escapes(content: &str) -> String {
    content
        .replace("\\\\", &ESCAPED_BACKSLASH.to_string())
        .replace("\\{", &ESCAPED_OPEN_BRACE.to_string())
        .replace("\\}", &ESCAPED_CLOSE_BRACE.to_string())
}

fn restore_escapes(text: &str) -> String {
    text.chars()
        .map(|ch| match ch {
            ESCAPED_BACKSLASH => '\\',
            ESCAPED_OPEN_BRACE => '{',
            ESCAPED_CLOSE_BRACE => '}',
            other => other,
        })
        .collect()
}

fn code_point(raw: &str, radix: u32) -> Option<char> {
    u32::from_str_radix(raw, radix).ok().and_then(char::from_u32)
}

/// 展开 `\U+XXXX` 与 `%%` 特殊字符码，单行文字也使用。
pub fn decode_special_characters(text: &str) -> String {
    let text = UNICODE_ESCAPE.replace_all(text, |caps: &Captures| {
        code_point(&caps[1], 16).map(String::from).unwrap_or_default()
    });
    let text = PERCENT_CHAR_CODE.replace_all(&text, |caps: &Captures| {
        code_point(&caps[1], 10).map(String::from).unwrap_or_default()
    });
    PERCENT_SYMBOL
        .replace_all(&text, |caps: &Captures| match &caps[1] {
            "d" | "D" => "°".to_string(),
            "p" | "P" => "±".to_string(),
            "c" | "C" => "Ø".to_string(),
            "%" => "%".to_string(),
            // 上划线/下划线开关
            _ => String::new(),
        })
        .into_owned()
}

fn parse_font(caps: &Captures) -> FontStyle {
    let name = caps[1].trim();
    let mut style = FontStyle {
        font: (!name.is_empty()).then(|| name.to_string()),
        ..FontStyle::default()
    };
    for option in caps[2].split('|') {
        let mut chars = option.chars();
        match chars.next() {
            Some('b') => style.bold = chars.as_str() == "1",
            Some('i') => style.italic = chars.as_str() == "1",
            _ => {}
        }
    }
    style
}

fn format_line(line: &str, state: &mut CarryState, base_height: f64) -> Option<TextRun> {
    let mut stacked = None;
    let line = STACKED.replace_all(line, |caps: &Captures| {
        let fraction = StackedText {
            top: caps[1].to_string(),
            bottom: caps[3].to_string(),
            separator: caps[2].chars().next().unwrap_or('/'),
        };
        if stacked.is_none() {
            stacked = Some(fraction);
            String::new()
        } else {
            format!("{}{}{}", fraction.top, fraction.separator, fraction.bottom)
        }
    });

    let mut line_style = None;
    let line = FONT.replace_all(&line, |caps: &Captures| {
        let style = parse_font(caps);
        if line_style.is_none() {
            line_style = Some(style.clone());
        }
        state.style = style;
        String::new()
    });

    let line = COLOR_INDEX.replace_all(&line, |caps: &Captures| {
        match caps[1].parse::<i16>() {
            Ok(0 | 256) => state.color = None,
            Ok(index) => {
                if let Some(color) = aci_color(index) {
                    state.color = Some(color);
                }
            }
            Err(_) => {}
        }
        String::new()
    });
    let line = TRUE_COLOR.replace_all(&line, |caps: &Captures| {
        if let Ok(value) = caps[1].parse::<u32>() {
            state.color = Some(Rgb::new(value));
        }
        String::new()
    });

    let line = HEIGHT.replace_all(&line, |caps: &Captures| {
        if let Ok(value) = caps[1].parse::<f64>() {
            state.height = Some(if caps[2].is_empty() {
                value
            } else {
                state.height.unwrap_or(base_height) * value
            });
        }
        String::new()
    });

    let line = LAYOUT.replace_all(&line, "");
    let line = TOGGLE.replace_all(&line, "");
    let line = SPACE_MARKER.replace_all(&line, " ");
    let text: String = line.chars().filter(|ch| *ch != '{' && *ch != '}').collect();
    let text = restore_escapes(&text);

    if text.trim().is_empty() && stacked.is_none() {
        return None;
    }
    let style = line_style.unwrap_or_else(|| state.style.clone());
    Some(TextRun {
        text,
        color: state.color,
        height: state.height,
        bold: style.bold,
        italic: style.italic,
        font: style.font,
        stacked,
    })
}

/// 把 MTEXT 原始内容解析为按行排列的样式片段。
///
/// 颜色与字高在行间延续；字体类指令对当前行按首次出现的值显示，同时更新后续行的状态。
/// `base_height` 为实体字高，用于计算 `\H..x;` 形式的相对字高。
pub fn format_rich_text(content: &str, base_height: f64) -> Vec<TextRun> {
    let protected = protect_escapes(content);
    let decoded = decode_special_characters(&protected);
    let mut state = CarryState::default();
    decoded
        .split(PARAGRAPH_BREAK)
        .filter_map(|line| format_line(line, &mut state, base_height))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HorizontalAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerticalAlign {
    Top,
    Middle,
    Bottom,
}

/// MTEXT 附着点（组码 71）：1..=9 依次为上左、上中、上右、中左……下右，缺省为上左。
pub fn mtext_alignment(attachment_point: i16) -> (HorizontalAlign, VerticalAlign) {
    let vertical = match attachment_point {
        4..=6 => VerticalAlign::Middle,
        7..=9 => VerticalAlign::Bottom,
        _ => VerticalAlign::Top,
    };
    let horizontal = match attachment_point {
        2 | 5 | 8 => HorizontalAlign::Center,
        3 | 6 | 9 => HorizontalAlign::Right,
        _ => HorizontalAlign::Left,
    };
    (horizontal, vertical)
}

/// TEXT 的水平（组码 72）与垂直（组码 73）对齐，缺省为左对齐、基线。
pub fn text_alignment(horizontal: i16, vertical: i16) -> (HorizontalAlign, VerticalAlign) {
    let horizontal = match horizontal {
        1 | 4 => HorizontalAlign::Center,
        2 => HorizontalAlign::Right,
        _ => HorizontalAlign::Left,
    };
    let vertical = match vertical {
        2 => VerticalAlign::Middle,
        3 => VerticalAlign::Top,
        _ => VerticalAlign::Bottom,
    };
    (horizontal, vertical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::palette_entry;

    #[test]
    fn color_directives_carry_across_lines() {
        let runs = format_rich_text("\\C1;Red\\P\\C0;Default", 2.5);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].text, "Red");
        assert_eq!(runs[0].color, palette_entry(1));
        assert_eq!(runs[1].text, "Default");
        assert_eq!(runs[1].color, None);

        let runs = format_rich_text("\\C3;Green\\PStill green", 1.0);
        assert_eq!(runs[1].color, palette_entry(3));
    }

    #[test]
    fn white_color_directive_renders_black() {
        let runs = format_rich_text("\\C7;Ink", 1.0);
        assert_eq!(runs[0].color, Some(Rgb::BLACK));
    }

    #[test]
    fn escaped_characters_survive() {
        let runs = format_rich_text("a\\\\b \\{x\\}", 1.0);
        assert_eq!(runs[0].text, "a\\b {x}");
    }

    #[test]
    fn escaped_backslash_does_not_break_paragraph() {
        let runs = format_rich_text("C:\\\\Program", 1.0);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].text, "C:\\Program");
    }

    #[test]
    fn special_characters_are_expanded() {
        assert_eq!(decode_special_characters("45%%d"), "45°");
        assert_eq!(decode_special_characters("%%p0.1 %%c20"), "±0.1 Ø20");
        assert_eq!(decode_special_characters("%%uunder%%u"), "under");
        assert_eq!(decode_special_characters("%%037"), "%");
        assert_eq!(decode_special_characters("\\U+4E2D"), "中");
    }

    #[test]
    fn height_directives_are_absolute_or_relative() {
        let runs = format_rich_text("\\H5;Big\\P\\H0.5x;Half", 2.0);
        assert_eq!(runs[0].height, Some(5.0));
        assert_eq!(runs[1].height, Some(2.5));

        let runs = format_rich_text("\\H2x;Double", 3.0);
        assert_eq!(runs[0].height, Some(6.0));
    }

    #[test]
    fn font_directive_sets_style() {
        let runs = format_rich_text("{\\fArial|b1|i1|c0|p34;Bold}\\PNext", 1.0);
        assert_eq!(runs[0].text, "Bold");
        assert_eq!(runs[0].font.as_deref(), Some("Arial"));
        assert!(runs[0].bold && runs[0].italic);
        // 字体状态延续到后续行
        assert!(runs[1].bold);
    }

    #[test]
    fn first_font_in_line_is_displayed() {
        let runs = format_rich_text("\\fA|b1;one\\fB|b0;two\\Pthree", 1.0);
        assert_eq!(runs[0].text, "onetwo");
        assert_eq!(runs[0].font.as_deref(), Some("A"));
        assert!(runs[0].bold);
        assert_eq!(runs[1].font.as_deref(), Some("B"));
        assert!(!runs[1].bold);
    }

    #[test]
    fn layout_and_toggles_are_stripped() {
        let runs = format_rich_text(
            "\\pxi-3,l3;\\A1;\\W0.8;\\T1.1;\\Q15;\\Lunder\\l \\Oover\\o \\Kstrike\\k",
            1.0,
        );
        assert_eq!(runs[0].text, "under over strike");
    }

    #[test]
    fn stacked_fractions_are_captured() {
        let runs = format_rich_text("\\S1/2;", 1.0);
        assert_eq!(runs.len(), 1);
        let stacked = runs[0].stacked.as_ref().expect("分数");
        assert_eq!((stacked.top.as_str(), stacked.bottom.as_str()), ("1", "2"));
        assert_eq!(stacked.separator, '/');

        let runs = format_rich_text("x\\S2^;", 1.0);
        assert_eq!(runs[0].text, "x");
        let stacked = runs[0].stacked.as_ref().expect("上标");
        assert_eq!(stacked.top, "2");
        assert_eq!(stacked.bottom, "");
    }

    #[test]
    fn diagonal_fraction_keeps_hash_separator() {
        let runs = format_rich_text("\\S3#4;", 1.0);
        let stacked = runs[0].stacked.as_ref().expect("斜分数");
        assert_eq!((stacked.top.as_str(), stacked.bottom.as_str()), ("3", "4"));
        assert_eq!(stacked.separator, '#');

        // 同一行第二个分数以分隔符原样并入正文
        let runs = format_rich_text("\\S1/2;a\\S3#4;", 1.0);
        assert_eq!(runs[0].text, "a3#4");
    }

    #[test]
    fn spaces_and_empty_lines() {
        let runs = format_rich_text("a\\~b\\Nc\\P\\P{}\\Pend", 1.0);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].text, "a b c");
        assert_eq!(runs[1].text, "end");
    }

    #[test]
    fn alignment_tables() {
        assert_eq!(
            mtext_alignment(0),
            (HorizontalAlign::Left, VerticalAlign::Top)
        );
        assert_eq!(
            mtext_alignment(5),
            (HorizontalAlign::Center, VerticalAlign::Middle)
        );
        assert_eq!(
            mtext_alignment(9),
            (HorizontalAlign::Right, VerticalAlign::Bottom)
        );
        assert_eq!(
            text_alignment(0, 0),
            (HorizontalAlign::Left, VerticalAlign::Bottom)
        );
        assert_eq!(
            text_alignment(2, 3),
            (HorizontalAlign::Right, VerticalAlign::Top)
        );
        assert_eq!(
            text_alignment(1, 2),
            (HorizontalAlign::Center, VerticalAlign::Middle)
        );
    }
}
