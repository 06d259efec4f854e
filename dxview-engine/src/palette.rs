use std::fmt;

use serde::{Serialize, Serializer};

/// 24 位 RGB 颜色，按 `0xRRGGBB` 存放。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rgb(pub u32);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0x000000);
    pub const WHITE: Rgb = Rgb(0xFFFFFF);

    #[inline]
    pub fn new(value: u32) -> Self {
        Self(value & 0x00FF_FFFF)
    }

    #[inline]
    pub fn from_components(red: u8, green: u8, blue: u8) -> Self {
        Self((u32::from(red) << 16) | (u32::from(green) << 8) | u32::from(blue))
    }

    #[inline]
    pub fn red(self) -> u8 {
        ((self.0 >> 16) & 0xFF) as u8
    }

    #[inline]
    pub fn green(self) -> u8 {
        ((self.0 >> 8) & 0xFF) as u8
    }

    #[inline]
    pub fn blue(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    /// `#rrggbb` 形式的十六进制表示。
    pub fn hex(self) -> String {
        format!("#{:06x}", self.0)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.0)
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// 无法从实体、块或图层得到颜色时使用的固定颜色。
pub const DEFAULT_COLOR: Rgb = Rgb::BLACK;

/// ACI 调色板。0 号为 ByBlock 占位，不参与实际着色。
const ACI_PALETTE: [u32; 256] = [
    0x000000, 0xFF0000, 0xFFFF00, 0x00FF00, 0x00FFFF, 0x0000FF, 0xFF00FF, 0xFFFFFF,
    0x808080, 0xC0C0C0, 0xFF0000, 0xFFAAAA, 0xBD0000, 0xBD7E7E, 0x810000, 0x815656,
    0x680000, 0x684545, 0x4F0000, 0x4F3434, 0xFF3F00, 0xFFBFAA, 0xBD2F00, 0xBD8D7E,
    0x812000, 0x816056, 0x681A00, 0x684E45, 0x4F1300, 0x4F3B34, 0xFF7F00, 0xFFD4AA,
    0xBD5E00, 0xBD9D7E, 0x814000, 0x816B56, 0x683400, 0x685645, 0x4F2700, 0x4F4134,
    0xFFBF00, 0xFFE9AA, 0xBD8D00, 0xBDAD7E, 0x816000, 0x817656, 0x684E00, 0x685F45,
    0x4F3B00, 0x4F4834, 0xFFFF00, 0xFFFFAA, 0xBDBD00, 0xBDBD7E, 0x818100, 0x818156,
    0x686800, 0x686845, 0x4F4F00, 0x4F4F34, 0xBFFF00, 0xE9FFAA, 0x8DBD00, 0xADBD7E,
    0x608100, 0x768156, 0x4E6800, 0x5F6845, 0x3B4F00, 0x484F34, 0x7FFF00, 0xD4FFAA,
    0x5EBD00, 0x9DBD7E, 0x408100, 0x6B8156, 0x346800, 0x566845, 0x274F00, 0x414F34,
    0x3FFF00, 0xBFFFAA, 0x2FBD00, 0x8DBD7E, 0x208100, 0x608156, 0x1A6800, 0x4E6845,
    0x134F00, 0x3B4F34, 0x00FF00, 0xAAFFAA, 0x00BD00, 0x7EBD7E, 0x008100, 0x568156,
    0x006800, 0x456845, 0x004F00, 0x344F34, 0x00FF3F, 0xAAFFBF, 0x00BD2F, 0x7EBD8D,
    0x008120, 0x568160, 0x00681A, 0x45684E, 0x004F13, 0x344F3B, 0x00FF7F, 0xAAFFD4,
    0x00BD5E, 0x7EBD9D, 0x008140, 0x56816B, 0x006834, 0x456856, 0x004F27, 0x344F41,
    0x00FFBF, 0xAAFFE9, 0x00BD8D, 0x7EBDAD, 0x008160, 0x568176, 0x00684E, 0x45685F,
    0x004F3B, 0x344F48, 0x00FFFF, 0xAAFFFF, 0x00BDBD, 0x7EBDBD, 0x008181, 0x568181,
    0x006868, 0x456868, 0x004F4F, 0x344F4F, 0x00BFFF, 0xAAE9FF, 0x008DBD, 0x7EADBD,
    0x006081, 0x567681, 0x004E68, 0x455F68, 0x003B4F, 0x34484F, 0x007FFF, 0xAAD4FF,
    0x005EBD, 0x7E9DBD, 0x004081, 0x566B81, 0x003468, 0x455668, 0x00274F, 0x34414F,
    0x003FFF, 0xAABFFF, 0x002FBD, 0x7E8DBD, 0x002081, 0x566081, 0x001A68, 0x454E68,
    0x00134F, 0x343B4F, 0x0000FF, 0xAAAAFF, 0x0000BD, 0x7E7EBD, 0x000081, 0x565681,
    0x000068, 0x454568, 0x00004F, 0x34344F, 0x3F00FF, 0xBFAAFF, 0x2F00BD, 0x8D7EBD,
    0x200081, 0x605681, 0x1A0068, 0x4E4568, 0x13004F, 0x3B344F, 0x7F00FF, 0xD4AAFF,
    0x5E00BD, 0x9D7EBD, 0x400081, 0x6B5681, 0x340068, 0x564568, 0x27004F, 0x41344F,
    0xBF00FF, 0xE9AAFF, 0x8D00BD, 0xAD7EBD, 0x600081, 0x765681, 0x4E0068, 0x5F4568,
    0x3B004F, 0x48344F, 0xFF00FF, 0xFFAAFF, 0xBD00BD, 0xBD7EBD, 0x810081, 0x815681,
    0x680068, 0x684568, 0x4F004F, 0x4F344F, 0xFF00BF, 0xFFAAE9, 0xBD008D, 0xBD7EAD,
    0x810060, 0x815676, 0x68004E, 0x68455F, 0x4F003B, 0x4F3448, 0xFF007F, 0xFFAAD4,
    0xBD005E, 0xBD7E9D, 0x810040, 0x81566B, 0x680034, 0x684556, 0x4F0027, 0x4F3441,
    0xFF003F, 0xFFAABF, 0xBD002F, 0xBD7E8D, 0x810020, 0x815660, 0x68001A, 0x68454E,
    0x4F0013, 0x4F343B, 0x333333, 0x505050, 0x696969, 0x828282, 0xBEBEBE, 0xFFFFFF,
];

/// 调色板中的原始颜色，不做白色替换。索引越界返回 `None`。
pub fn palette_entry(index: i16) -> Option<Rgb> {
    usize::try_from(index)
        .ok()
        .and_then(|index| ACI_PALETTE.get(index))
        .map(|value| Rgb(*value))
}

/// 可显示的 ACI 颜色：仅接受 1..=255，7 与 255 在浅色画布上渲染为黑色。
pub fn aci_color(index: i16) -> Option<Rgb> {
    match index {
        7 | 255 => Some(Rgb::BLACK),
        1..=254 => palette_entry(index),
        _ => None,
    }
}
