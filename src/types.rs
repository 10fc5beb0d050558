//! Types Module
//!
//! クレート全体で使用する共通データ型を定義するモジュール。

use crate::error::OfficeFillError;

/// Excelの最大行数（1,048,576行）
const MAX_ROWS: u32 = 1_048_576;

/// Excelの最大列数（XFD = 16,384列）
const MAX_COLS: u32 = 16_384;

/// セル座標（0始まり）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct CellCoord {
    pub row: u32,
    pub col: u32,
}

impl CellCoord {
    /// 新しい座標を生成
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// A1形式の文字列から座標を生成（例: "B10" -> (9, 1)）
    ///
    /// `$`による絶対参照（例: "$B$10"）も受け付けます。
    ///
    /// # 戻り値
    ///
    /// * `Ok(CellCoord)` - 解析に成功した場合
    /// * `Err(OfficeFillError::InvalidCoordinate)` - 形式が不正、またはシートの範囲外の場合
    pub fn from_a1_notation(text: &str) -> Result<Self, OfficeFillError> {
        let invalid = || OfficeFillError::InvalidCoordinate(text.to_string());
        let cleaned: String = text.trim().chars().filter(|c| *c != '$').collect();

        let split = cleaned
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(invalid)?;
        let (letters, digits) = cleaned.split_at(split);

        if letters.is_empty()
            || letters.len() > 3
            || !letters.chars().all(|c| c.is_ascii_alphabetic())
        {
            return Err(invalid());
        }
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let mut col: u32 = 0;
        for ch in letters.chars() {
            col = col * 26 + (ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
        }
        let row: u32 = digits.parse().map_err(|_| invalid())?;

        if row == 0 || row > MAX_ROWS || col > MAX_COLS {
            return Err(invalid());
        }

        Ok(Self::new(row - 1, col - 1))
    }

    /// A1形式の文字列に変換（例: (0, 0) -> "A1"）
    #[allow(clippy::wrong_self_convention)]
    pub fn to_a1_notation(&self) -> String {
        let col_str = Self::col_index_to_letter(self.col);
        format!("{}{}", col_str, self.row + 1)
    }

    /// 列インデックスを文字列に変換（0 -> "A", 25 -> "Z", 26 -> "AA"）
    fn col_index_to_letter(mut col: u32) -> String {
        let mut result = String::new();
        loop {
            let remainder = col % 26;
            result.insert(0, (b'A' + remainder as u8) as char);
            if col < 26 {
                break;
            }
            col = col / 26 - 1;
        }
        result
    }
}

/// セル範囲
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CellRange {
    pub start: CellCoord,
    pub end: CellCoord,
}

impl CellRange {
    /// 新しい範囲を生成
    pub fn new(start: CellCoord, end: CellCoord) -> Self {
        Self { start, end }
    }

    /// "A1:C3"形式の範囲参照を解析
    ///
    /// 単一セル（"A1"）は1×1の範囲として扱います。開始と終了が逆順に
    /// 書かれていても正規化します。
    pub fn from_a1_range(text: &str) -> Result<Self, OfficeFillError> {
        let (first, second) = match text.split_once(':') {
            Some((a, b)) => (a, b),
            None => (text, text),
        };
        let a = CellCoord::from_a1_notation(first)?;
        let b = CellCoord::from_a1_notation(second)?;

        Ok(Self::new(
            CellCoord::new(a.row.min(b.row), a.col.min(b.col)),
            CellCoord::new(a.row.max(b.row), a.col.max(b.col)),
        ))
    }

    /// 指定された座標が範囲内にあるかを判定
    pub fn contains(&self, coord: CellCoord) -> bool {
        coord.row >= self.start.row
            && coord.row <= self.end.row
            && coord.col >= self.start.col
            && coord.col <= self.end.col
    }

    /// 範囲のサイズ（行数 × 列数）を計算
    #[allow(dead_code)]
    pub fn size(&self) -> (u32, u32) {
        let rows = self.end.row - self.start.row + 1;
        let cols = self.end.col - self.start.col + 1;
        (rows, cols)
    }
}

/// セル結合範囲の情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MergedRegion {
    /// 結合範囲
    pub range: CellRange,

    /// 親セル（左上セル）の座標
    pub parent: CellCoord,
}

impl MergedRegion {
    /// 新しい結合範囲を生成
    pub fn new(range: CellRange) -> Self {
        Self {
            parent: range.start,
            range,
        }
    }

    /// 指定された座標が結合範囲内にあるかを判定
    ///
    /// 行・列の数値境界で比較します。範囲参照の文字列表現に対する
    /// 部分一致（"A1"が"A10:A12"に一致してしまう等）は行いません。
    pub fn contains(&self, coord: CellCoord) -> bool {
        self.range.contains(coord)
    }
}
