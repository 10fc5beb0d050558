//! Record Module
//!
//! 入力表の1行を、帳票に書き込むフィールドの集合（`Record`）に正規化するモジュール。
//!
//! 正規化は失敗しません。列が存在しない、または値が空の場合は空文字列になります。

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::parser::table::CellValue;
use crate::security::sanitize_file_component;

/// レコードのフィールド
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[non_exhaustive]
pub enum Field {
    /// 顧客名（CLIENTE）
    Client,
    /// 機器名（NOMBRE DEL EQUIPO）
    Equipment,
    /// 参照番号（REFERENCIA）
    Reference,
    /// シリアル番号（SERIE）
    Serial,
    /// 設置日（FECHA INSTALACION(WORD)）
    InstallationDate,
    /// 顧客の税番号（NIT CLIENTE）
    TaxId,
    /// 保守の種類（TIPO MMTO）
    MaintenanceType,
    /// 保守頻度（FRECUENCIA）
    Frequency,
    /// 住所（DIRECCION）
    Address,
    /// 型式（MODELO）
    Model,
    /// 設置場所（UBICACIÓN DEL EQUIPO (ÁREA)）
    Location,
    /// 日（DD）
    Day,
    /// 月（MM）
    Month,
    /// 年（AA）
    Year,
    /// 機関（ENTIDAD）
    Entity,
    /// 都市（CIUDAD）
    City,
    /// 電話番号（TELEFONO CLIENTE）
    Phone,
}

impl Field {
    /// すべてのフィールド
    pub const ALL: [Field; 17] = [
        Field::Client,
        Field::Equipment,
        Field::Reference,
        Field::Serial,
        Field::InstallationDate,
        Field::TaxId,
        Field::MaintenanceType,
        Field::Frequency,
        Field::Address,
        Field::Model,
        Field::Location,
        Field::Day,
        Field::Month,
        Field::Year,
        Field::Entity,
        Field::City,
        Field::Phone,
    ];

    /// 既定の列名（優先順）
    pub fn default_columns(self) -> &'static [&'static str] {
        match self {
            Field::Client => &["CLIENTE"],
            Field::Equipment => &["NOMBRE DEL EQUIPO"],
            Field::Reference => &["REFERENCIA"],
            Field::Serial => &["SERIE"],
            Field::InstallationDate => &["FECHA INSTALACION(WORD)"],
            Field::TaxId => &["NIT CLIENTE"],
            Field::MaintenanceType => &["TIPO MMTO", "TIPO DE MANTENIMIENTO"],
            Field::Frequency => &["FRECUENCIA"],
            Field::Address => &["DIRECCION"],
            Field::Model => &["MODELO"],
            Field::Location => &["UBICACIÓN DEL EQUIPO (ÁREA)"],
            Field::Day => &["DD"],
            Field::Month => &["MM"],
            Field::Year => &["AA"],
            Field::Entity => &["ENTIDAD"],
            Field::City => &["CIUDAD"],
            Field::Phone => &["TELEFONO CLIENTE"],
        }
    }

    fn slot(self) -> usize {
        Field::ALL
            .iter()
            .position(|field| *field == self)
            .unwrap_or_default()
    }
}

/// フィールドと入力表の列名の対応
///
/// 1つのフィールドに複数の列名を指定でき、入力表に最初に存在した列が使われます。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    columns: HashMap<Field, Vec<String>>,
}

impl Default for FieldSpec {
    fn default() -> Self {
        let columns = Field::ALL
            .iter()
            .map(|field| {
                let names = field
                    .default_columns()
                    .iter()
                    .map(|name| name.to_string())
                    .collect();
                (*field, names)
            })
            .collect();
        Self { columns }
    }
}

impl FieldSpec {
    /// 既定の列名で生成
    pub fn new() -> Self {
        Self::default()
    }

    /// フィールドの列名を置き換える
    ///
    /// # 使用例
    ///
    /// ```rust
    /// use officefill::{Field, FieldSpec};
    ///
    /// let spec = FieldSpec::new().with_columns(Field::Phone, ["TELEFONO", "TELEFONO CLIENTE"]);
    /// assert_eq!(spec.columns(Field::Phone), ["TELEFONO", "TELEFONO CLIENTE"]);
    /// ```
    pub fn with_columns<I, S>(mut self, field: Field, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns
            .insert(field, names.into_iter().map(Into::into).collect());
        self
    }

    /// フィールドの列名（優先順）
    pub fn columns(&self, field: Field) -> &[String] {
        self.columns.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 列名が1つも指定されていないフィールド
    pub(crate) fn unmapped_fields(&self) -> Vec<Field> {
        Field::ALL
            .iter()
            .copied()
            .filter(|field| self.columns(*field).iter().all(|n| n.trim().is_empty()))
            .collect()
    }
}

/// レコードの識別子
///
/// 顧客名と機器名を前後の空白除去・空白の`_`置換で正規化したもので、
/// 出力ファイル名とアーカイブ名に使用します。帳票内のテキストには使用しません。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Identity {
    client: String,
    equipment: String,
    name: String,
}

impl Identity {
    /// 正規化前の顧客名・機器名と行インデックスから生成
    ///
    /// 両方が空の場合、識別名は`fila_{index}`になります。
    pub fn new(client: &str, equipment: &str, index: usize) -> Self {
        let client = name_part(client);
        let equipment = name_part(equipment);
        let name = if client.is_empty() && equipment.is_empty() {
            format!("fila_{}", index)
        } else {
            format!("{}_{}", client, equipment)
        };
        Self {
            client,
            equipment,
            name,
        }
    }

    /// 正規化された顧客名
    pub fn client(&self) -> &str {
        &self.client
    }

    /// 正規化された機器名
    pub fn equipment(&self) -> &str {
        &self.equipment
    }

    /// 識別名（作業フォルダ名・アーカイブ名）
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

fn name_part(raw: &str) -> String {
    sanitize_file_component(&raw.trim().replace(' ', "_"))
}

/// 入力表の1行を正規化したレコード
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    index: usize,
    values: Vec<String>,
    identity: Identity,
}

impl Record {
    /// 入力表のデータ行インデックス（0始まり）
    pub fn index(&self) -> usize {
        self.index
    }

    /// フィールドの値（存在しない場合は空文字列）
    pub fn get(&self, field: Field) -> &str {
        self.values
            .get(field.slot())
            .map(String::as_str)
            .unwrap_or("")
    }

    /// 顧客名（正規化前）
    pub fn client(&self) -> &str {
        self.get(Field::Client)
    }

    /// 機器名（正規化前）
    pub fn equipment(&self) -> &str {
        self.get(Field::Equipment)
    }

    /// レコードの識別子
    pub fn identity(&self) -> &Identity {
        &self.identity
    }
}

/// 列名から列インデックスを引く索引
///
/// 見出しは前後の空白を除去してから照合します。同名の列が複数ある場合は最初の列を使います。
#[derive(Debug, Clone)]
pub(crate) struct HeaderIndex {
    positions: HashMap<String, usize>,
}

impl HeaderIndex {
    pub fn new(headers: &[String]) -> Self {
        let mut positions = HashMap::new();
        for (idx, header) in headers.iter().enumerate() {
            positions.entry(header.trim().to_string()).or_insert(idx);
        }
        Self { positions }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name.trim()).copied()
    }

    /// フィールドに対応する列（指定された列名のうち最初に存在するもの）
    fn column_for(&self, spec: &FieldSpec, field: Field) -> Option<usize> {
        spec.columns(field)
            .iter()
            .find_map(|name| self.position(name))
    }

    /// 入力表に存在しないフィールド
    pub fn missing_fields(&self, spec: &FieldSpec) -> Vec<Field> {
        Field::ALL
            .iter()
            .copied()
            .filter(|field| self.column_for(spec, *field).is_none())
            .collect()
    }
}

/// 1行を正規化してレコードを生成
///
/// 列が存在しない、または値が空・エラーの場合は空文字列になります。
pub(crate) fn normalize(
    index: usize,
    row: &[CellValue],
    headers: &HeaderIndex,
    spec: &FieldSpec,
) -> Record {
    let values: Vec<String> = Field::ALL
        .iter()
        .map(|field| {
            headers
                .column_for(spec, *field)
                .and_then(|col| row.get(col))
                .map(render_value)
                .unwrap_or_default()
        })
        .collect();

    let identity = Identity::new(
        &values[Field::Client.slot()],
        &values[Field::Equipment.slot()],
        index,
    );

    Record {
        index,
        values,
        identity,
    }
}

/// セル値の文字列表現
///
/// 整数値の浮動小数点数は小数部なし（`15.0` -> `15`）、真偽値は`True`/`False`、
/// 日時は`%Y-%m-%d %H:%M:%S`で表します。空セル・エラー・NaNは空文字列です。
pub(crate) fn render_value(value: &CellValue) -> String {
    match value {
        CellValue::Empty | CellValue::Error => String::new(),
        CellValue::Text(s) => s.clone(),
        CellValue::Int(i) => i.to_string(),
        CellValue::Float(f) => render_float(*f),
        CellValue::Bool(true) => "True".to_string(),
        CellValue::Bool(false) => "False".to_string(),
        CellValue::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}

fn render_float(value: f64) -> String {
    if value.is_nan() {
        return String::new();
    }
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    value.to_string()
}
