use dxview_core::geometry::Point3;

use crate::DxfError;

/// 组码对应的值，类型完全由组码范围决定。
#[derive(Debug, Clone, PartialEq)]
pub enum GroupValue {
    Str(String),
    Real(f64),
    Int(i64),
    Bool(bool),
}

/// 一个 (组码, 值) 对，`line` 为组码所在的行号（从 1 开始）。
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub code: i32,
    pub value: GroupValue,
    pub line: usize,
}

impl Group {
    /// 字符串值；数值类组码返回空串。
    pub fn text(&self) -> &str {
        match &self.value {
            GroupValue::Str(text) => text,
            _ => "",
        }
    }

    pub fn real(&self) -> f64 {
        match &self.value {
            GroupValue::Real(value) => *value,
            GroupValue::Int(value) => *value as f64,
            GroupValue::Bool(value) => f64::from(u8::from(*value)),
            GroupValue::Str(text) => text.parse().unwrap_or(0.0),
        }
    }

    pub fn int(&self) -> i64 {
        match &self.value {
            GroupValue::Int(value) => *value,
            GroupValue::Real(value) => *value as i64,
            GroupValue::Bool(value) => i64::from(*value),
            GroupValue::Str(text) => text.parse().unwrap_or(0),
        }
    }

    /// 截断到 `i16`，用于颜色号、标志位等小整数字段。
    pub fn short(&self) -> i16 {
        self.int().clamp(i16::MIN as i64, i16::MAX as i64) as i16
    }

    pub fn flag(&self) -> bool {
        match &self.value {
            GroupValue::Bool(value) => *value,
            _ => self.int() != 0,
        }
    }

    /// 是否为 `(0, name)` 结构标记。
    #[inline]
    pub fn is_marker(&self, name: &str) -> bool {
        self.code == 0 && self.text() == name
    }

    /// 角度字段（度）转为弧度。
    #[inline]
    pub fn radians(&self) -> f64 {
        self.real().to_radians()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Str,
    Real,
    Int,
    Bool,
}

fn value_kind(code: i32) -> ValueKind {
    match code {
        10..=59 | 110..=149 | 210..=239 | 460..=469 | 1010..=1059 => ValueKind::Real,
        60..=99 | 160..=179 | 260..=289 | 370..=389 | 420..=429 | 1060..=1071 => ValueKind::Int,
        290..=299 => ValueKind::Bool,
        _ => ValueKind::Str,
    }
}

fn coerce(code: i32, raw: &str, line: usize) -> Result<GroupValue, DxfError> {
    let invalid = |expected: &'static str| DxfError::InvalidValue {
        code,
        raw: raw.to_string(),
        expected,
        line,
    };
    match value_kind(code) {
        ValueKind::Str => Ok(GroupValue::Str(raw.to_string())),
        ValueKind::Real => raw
            .parse::<f64>()
            .map(GroupValue::Real)
            .map_err(|_| invalid("浮点数")),
        ValueKind::Int => match raw.parse::<i64>() {
            Ok(value) => Ok(GroupValue::Int(value)),
            // 部分导出器会把整数写成 "1.0"
            Err(_) => raw
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .map(|value| GroupValue::Int(value.trunc() as i64))
                .ok_or_else(|| invalid("整数")),
        },
        ValueKind::Bool => Ok(GroupValue::Bool(raw == "1")),
    }
}

fn split_lines(source: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let bytes = source.as_bytes();
    let mut start = 0;
    let mut index = 0;
    while index < bytes.len() {
        match bytes[index] {
            b'\n' => {
                lines.push(&source[start..index]);
                start = index + 1;
            }
            b'\r' => {
                lines.push(&source[start..index]);
                if bytes.get(index + 1) == Some(&b'\n') {
                    index += 1;
                }
                start = index + 1;
            }
            _ => {}
        }
        index += 1;
    }
    if start < bytes.len() {
        lines.push(&source[start..]);
    }
    lines
}

/// 组码扫描器：一次性把源文本切分为组，之后以游标随机访问，可任意回退。
#[derive(Debug, Clone)]
pub struct Scanner {
    groups: Vec<Group>,
    cursor: usize,
    eof_consumed: bool,
    last: Option<usize>,
}

impl Scanner {
    pub fn new(source: &str) -> Result<Self, DxfError> {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        let mut lines = split_lines(source);
        while lines.last().is_some_and(|line| line.trim().is_empty()) {
            lines.pop();
        }

        let mut groups = Vec::with_capacity(lines.len() / 2);
        for (pair_index, pair) in lines.chunks(2).enumerate() {
            let line = pair_index * 2 + 1;
            let [code_line, value_line] = pair else {
                // 末尾只剩组码行、缺少值行，忽略这半组
                break;
            };
            let raw_code = code_line.trim();
            let code = raw_code
                .parse::<i32>()
                .map_err(|_| DxfError::InvalidGroupCode {
                    raw: raw_code.to_string(),
                    line,
                })?;
            let value = coerce(code, value_line.trim(), line + 1)?;
            groups.push(Group { code, value, line });
        }

        Ok(Self {
            groups,
            cursor: 0,
            eof_consumed: false,
            last: None,
        })
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// 游标位置（下一次 `next` 将读取的组下标）。
    #[inline]
    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn next(&mut self) -> Result<Group, DxfError> {
        let group = self.peek()?.clone();
        self.last = Some(self.cursor);
        self.cursor += 1;
        if group.is_marker("EOF") {
            self.eof_consumed = true;
        }
        Ok(group)
    }

    pub fn peek(&self) -> Result<&Group, DxfError> {
        if self.eof_consumed {
            return Err(DxfError::AlreadyAtEnd);
        }
        self.groups
            .get(self.cursor)
            .ok_or_else(|| DxfError::UnexpectedEndOfInput {
                line: self.groups.last().map(|group| group.line + 1).unwrap_or(0),
            })
    }

    /// 下一组的组码；无法读取时返回 `None`。
    #[inline]
    pub fn peek_code(&self) -> Option<i32> {
        self.peek().ok().map(|group| group.code)
    }

    /// 回退 `n` 组，同时清除“已读到 EOF”状态。
    pub fn rewind(&mut self, n: usize) {
        self.cursor = self.cursor.saturating_sub(n);
        self.eof_consumed = false;
        self.last = self.cursor.checked_sub(1);
    }

    #[inline]
    pub fn has_next(&self) -> bool {
        !self.eof_consumed && self.cursor < self.groups.len()
    }

    /// 是否已经读过 `(0, EOF)` 终止组。
    #[inline]
    pub fn is_eof(&self) -> bool {
        self.eof_consumed
    }

    /// 最近一次 `next` 成功返回的组。
    pub fn last_read(&self) -> Option<&Group> {
        self.last.and_then(|index| self.groups.get(index))
    }

    /// 读取以 `base` 为 X 组码的坐标，Y 必须紧随其后（`base + 10`），Z（`base + 20`）可选。
    pub fn read_point(&mut self, base: i32) -> Result<Point3, DxfError> {
        let x = self.next()?;
        if x.code != base {
            return Err(DxfError::MalformedPoint {
                expected: base,
                actual: x.code,
                line: x.line,
            });
        }
        self.read_point_after(&x)
    }

    /// X 组已被调用方读出时，继续读取 Y/Z。
    pub fn read_point_after(&mut self, x: &Group) -> Result<Point3, DxfError> {
        let y = self.next()?;
        if y.code != x.code + 10 {
            return Err(DxfError::MalformedPoint {
                expected: x.code + 10,
                actual: y.code,
                line: y.line,
            });
        }
        let z = if self.peek_code() == Some(x.code + 20) {
            self.next()?.real()
        } else {
            0.0
        };
        Ok(Point3::new(x.real(), y.real(), z))
    }

    /// 跳过当前记录的剩余组，停在下一个组码 0 之前。
    pub fn skip_record(&mut self) -> Result<(), DxfError> {
        while self.has_next() && self.peek_code() != Some(0) {
            self.next()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerces_values_by_code_range() {
        let scanner = Scanner::new("  0\nSECTION\n 10\n 1.5 \n 70\n 6\n290\n1\n291\n true\n1000\nxdata\n")
            .expect("扫描失败");
        let groups = &scanner.groups;
        assert_eq!(groups.len(), 6);
        assert_eq!(groups[0].value, GroupValue::Str("SECTION".to_string()));
        assert_eq!(groups[1].value, GroupValue::Real(1.5));
        assert_eq!(groups[2].value, GroupValue::Int(6));
        assert_eq!(groups[3].value, GroupValue::Bool(true));
        assert_eq!(groups[4].value, GroupValue::Bool(false));
        assert_eq!(groups[5].value, GroupValue::Str("xdata".to_string()));
    }

    #[test]
    fn accepts_mixed_line_endings() {
        let mut scanner = Scanner::new("0\r\nSECTION\r2\nHEADER\r\n0\nENDSEC").expect("扫描失败");
        assert!(scanner.next().expect("第一组").is_marker("SECTION"));
        let name = scanner.next().expect("第二组");
        assert_eq!(name.code, 2);
        assert_eq!(name.text(), "HEADER");
        assert!(scanner.next().expect("第三组").is_marker("ENDSEC"));
        assert!(!scanner.has_next());
    }

    #[test]
    fn integer_written_as_float_is_truncated() {
        let scanner = Scanner::new("70\n3.0\n").expect("扫描失败");
        assert_eq!(scanner.groups[0].value, GroupValue::Int(3));
    }

    #[test]
    fn invalid_code_reports_line() {
        let err = Scanner::new("0\nSECTION\nabc\nHEADER\n").expect_err("应当失败");
        match err {
            DxfError::InvalidGroupCode { raw, line } => {
                assert_eq!(raw, "abc");
                assert_eq!(line, 3);
            }
            other => panic!("意外的错误：{other:?}"),
        }
    }

    #[test]
    fn invalid_real_value_fails() {
        let err = Scanner::new("10\nnot-a-number\n").expect_err("应当失败");
        assert!(matches!(err, DxfError::InvalidValue { code: 10, .. }));
    }

    #[test]
    fn dangling_code_line_is_ignored() {
        let scanner = Scanner::new("0\nEOF\n999").expect("扫描失败");
        assert_eq!(scanner.len(), 1);
    }

    #[test]
    fn next_after_eof_fails_until_rewind() {
        let mut scanner = Scanner::new("0\nEOF\n").expect("扫描失败");
        assert!(scanner.next().expect("EOF").is_marker("EOF"));
        assert!(scanner.is_eof());
        assert!(matches!(scanner.next(), Err(DxfError::AlreadyAtEnd)));
        assert!(matches!(scanner.peek(), Err(DxfError::AlreadyAtEnd)));

        scanner.rewind(1);
        assert!(!scanner.is_eof());
        assert!(scanner.next().expect("EOF").is_marker("EOF"));
    }

    #[test]
    fn running_out_of_groups_is_unexpected_end() {
        let mut scanner = Scanner::new("0\nSECTION\n").expect("扫描失败");
        scanner.next().expect("SECTION");
        assert!(!scanner.has_next());
        assert!(matches!(
            scanner.next(),
            Err(DxfError::UnexpectedEndOfInput { .. })
        ));
    }

    #[test]
    fn peek_does_not_advance_and_last_read_tracks_next() {
        let mut scanner = Scanner::new("0\nLINE\n8\nWALLS\n").expect("扫描失败");
        assert!(scanner.last_read().is_none());
        assert_eq!(scanner.peek().expect("peek").code, 0);
        assert_eq!(scanner.position(), 0);
        scanner.next().expect("LINE");
        assert!(scanner.last_read().expect("last").is_marker("LINE"));
        scanner.next().expect("layer");
        assert_eq!(scanner.last_read().expect("last").text(), "WALLS");
        scanner.rewind(1);
        assert!(scanner.last_read().expect("last").is_marker("LINE"));
    }

    #[test]
    fn read_point_requires_following_y() {
        let mut scanner = Scanner::new("10\n1\n20\n2\n30\n3\n10\n4\n30\n5\n").expect("扫描失败");
        let point = scanner.read_point(10).expect("第一点");
        assert_eq!((point.x(), point.y(), point.z()), (1.0, 2.0, 3.0));

        let err = scanner.read_point(10).expect_err("缺少 Y");
        match err {
            DxfError::MalformedPoint {
                expected, actual, ..
            } => {
                assert_eq!(expected, 20);
                assert_eq!(actual, 30);
            }
            other => panic!("意外的错误：{other:?}"),
        }
    }
}
