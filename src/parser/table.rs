//! Table Module
//!
//! 入力表（スプレッドシートまたはCSV）を見出し行とデータ行に読み込むモジュール。
//! スプレッドシートはcalamineで先頭シートを、CSVはcsvクレートで読み込みます。

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{NaiveDate, NaiveDateTime};

use crate::api::{TableFormat, TableSource};
use crate::error::OfficeFillError;
use crate::record::render_value;
use crate::security::SecurityConfig;

/// 入力表のセル値
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CellValue {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    Error,
}

impl From<&Data> for CellValue {
    fn from(cell: &Data) -> Self {
        match cell {
            Data::Int(i) => CellValue::Int(*i),
            Data::Float(f) => CellValue::Float(*f),
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::DateTime(dt) => dt
                .as_datetime()
                .map(CellValue::DateTime)
                .unwrap_or_else(|| CellValue::Float(dt.as_f64())),
            Data::DateTimeIso(s) => parse_iso_datetime(s)
                .map(CellValue::DateTime)
                .unwrap_or_else(|| CellValue::Text(s.clone())),
            Data::DurationIso(s) => CellValue::Text(s.clone()),
            Data::Error(_) => CellValue::Error,
            Data::Empty => CellValue::Empty,
        }
    }
}

fn parse_iso_datetime(text: &str) -> Option<NaiveDateTime> {
    let raw = text.trim_end_matches('Z');
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// 読み込んだ入力表
///
/// 1行目を見出し行とし、2行目以降をデータ行とします。
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DataTable {
    headers: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl DataTable {
    /// 入力表を読み込む
    ///
    /// # 戻り値
    ///
    /// * `Ok(DataTable)` - 読み込みに成功した場合
    /// * `Err(OfficeFillError::Parse)` - スプレッドシートとして読み込めない場合
    /// * `Err(OfficeFillError::Csv)` - CSVとして読み込めない場合
    /// * `Err(OfficeFillError::SecurityViolation)` - 入力サイズの上限を超える場合
    pub fn read(source: &TableSource) -> Result<Self, OfficeFillError> {
        let security_config = SecurityConfig::default();
        if source.bytes.len() as u64 > security_config.max_input_file_size {
            return Err(OfficeFillError::SecurityViolation(format!(
                "Input file size exceeds maximum: {} bytes (max: {} bytes)",
                source.bytes.len(),
                security_config.max_input_file_size
            )));
        }

        match source.format() {
            TableFormat::Spreadsheet => Self::read_spreadsheet(&source.bytes),
            TableFormat::Csv => Self::read_csv(&source.bytes),
        }
    }

    fn read_spreadsheet(bytes: &[u8]) -> Result<Self, OfficeFillError> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;

        let range = match workbook.worksheet_range_at(0) {
            Some(range) => range?,
            None => {
                return Err(OfficeFillError::Config(
                    "Spreadsheet contains no worksheets".to_string(),
                ))
            }
        };

        let mut rows = range.rows();
        let headers = rows
            .next()
            .map(|header| {
                header
                    .iter()
                    .map(|cell| render_value(&CellValue::from(cell)).trim().to_string())
                    .collect()
            })
            .unwrap_or_default();

        let rows = rows
            .map(|row| row.iter().map(CellValue::from).collect())
            .collect();

        Ok(Self { headers, rows })
    }

    fn read_csv(bytes: &[u8]) -> Result<Self, OfficeFillError> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);

        let headers = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            rows.push(
                record
                    .iter()
                    .map(|field| {
                        if field.is_empty() {
                            CellValue::Empty
                        } else {
                            CellValue::Text(field.to_string())
                        }
                    })
                    .collect(),
            );
        }

        Ok(Self { headers, rows })
    }

    /// 見出し（前後の空白除去済み）
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// データ行
    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }
}
