//! Forms Module
//!
//! レコード1件分の値をテンプレートに書き込み、帳票を生成するモジュール。
//!
//! テンプレートは呼び出しごとにバイト列から新しく展開されるため、
//! 生成結果は他のレコードの処理に影響されません。
//! 個々のセル・表への書き込みの失敗は警告として記録し、残りの書き込みと保存は続行します。

use tracing::{debug, warn};

use crate::api::FormKind;
use crate::error::OfficeFillError;
use crate::ooxml::document::Document;
use crate::ooxml::worksheet::{write_respecting_merges, Workbook};
use crate::ooxml::xml::is_forbidden_xml_char;
use crate::record::{Field, Record};
use crate::types::CellCoord;

/// 本文中で顧客名に置換されるプレースホルダー
pub(crate) const CLIENT_PLACEHOLDER: &str = "(Nombre cliente)";

/// FR-EI-02の先頭の表への書き込み（行, 列, フィールド）
const NARRATIVE_TABLE_CELLS: &[(usize, usize, Field)] = &[
    (0, 1, Field::Equipment),
    (1, 1, Field::Reference),
    (2, 1, Field::Serial),
    (3, 1, Field::InstallationDate),
];

/// FR-EI-04 機器履歴書のセル
const LIFE_RECORD_CELLS: &[(&str, Field)] = &[
    ("D9", Field::Equipment),
    ("V24", Field::Day),
    ("X24", Field::Month),
    ("Y24", Field::Year),
    ("D22", Field::Entity),
    ("AE22", Field::City),
    ("AE24", Field::Phone),
    ("AD7", Field::Serial),
];

/// FR-EI-03 予防保守プロトコルのセル
const PROTOCOL_CELLS: &[(&str, Field)] = &[("A12", Field::Equipment)];

/// FR-EI-05 保守スケジュールのセル（結合範囲を考慮して書き込む）
const SCHEDULE_CELLS: &[(&str, Field)] = &[
    ("B10", Field::Equipment),
    ("E10", Field::Serial),
    ("F10", Field::MaintenanceType),
    ("D5", Field::TaxId),
    ("R6", Field::InstallationDate),
    ("G10", Field::Frequency),
    ("F5", Field::Address),
    ("R5", Field::City),
    ("D10", Field::Model),
    ("D6", Field::Location),
    ("D4", Field::Client),
    ("R4", Field::Phone),
];

/// 生成された帳票
#[derive(Debug, Clone)]
pub(crate) struct GeneratedDocument {
    pub kind: FormKind,
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// 保存はできたが書き込めなかった箇所
    pub warnings: Vec<String>,
}

/// テンプレートにレコードの値を書き込んで帳票を生成
///
/// # 戻り値
///
/// * `Ok(GeneratedDocument)` - 保存に成功した場合（個々の書き込み失敗は`warnings`に記録）
/// * `Err(OfficeFillError::Template)` - テンプレートを開けない、または保存できない場合
pub(crate) fn instantiate(
    kind: FormKind,
    template: &[u8],
    record: &Record,
) -> Result<GeneratedDocument, OfficeFillError> {
    let mut warnings = Vec::new();

    let bytes = match kind {
        FormKind::Narrative => fill_narrative(template, record, &mut warnings),
        FormKind::LifeRecord => {
            fill_workbook(template, record, LIFE_RECORD_CELLS, false, kind, &mut warnings)
        }
        FormKind::MaintenanceProtocol => {
            fill_workbook(template, record, PROTOCOL_CELLS, false, kind, &mut warnings)
        }
        FormKind::Schedule => {
            fill_workbook(template, record, SCHEDULE_CELLS, true, kind, &mut warnings)
        }
    }
    .map_err(|e| match e {
        OfficeFillError::Template { .. } => e,
        other => OfficeFillError::template(kind.form_id(), other.to_string()),
    })?;

    let file_name = kind.file_name(record.identity());
    debug!(
        form = kind.form_id(),
        file = %file_name,
        warnings = warnings.len(),
        "instantiated form"
    );

    Ok(GeneratedDocument {
        kind,
        file_name,
        bytes,
        warnings,
    })
}

fn fill_narrative(
    template: &[u8],
    record: &Record,
    warnings: &mut Vec<String>,
) -> Result<Vec<u8>, OfficeFillError> {
    let form = FormKind::Narrative.form_id();
    let mut document = Document::open(template)?;

    if document.replace_in_paragraphs(CLIENT_PLACEHOLDER, record.client()) > 0 {
        note_dropped_chars(form, "body text", record.client(), record, warnings);
    }

    match document.first_table_mut() {
        Some(mut table) => {
            for (row, col, field) in NARRATIVE_TABLE_CELLS {
                let value = record.get(*field);
                match table.set_cell_text(*row, *col, value) {
                    Ok(()) => {
                        let location = format!("table cell ({}, {})", row, col);
                        note_dropped_chars(form, &location, value, record, warnings);
                    }
                    Err(e) => {
                        warn!(form, row = record.index(), error = %e, "table cell write failed");
                        warnings.push(format!("{}: could not fill table: {}", form, e));
                    }
                }
            }
        }
        None => {
            warn!(form, row = record.index(), "document has no table");
            warnings.push(format!("{}: could not fill table: document has no table", form));
        }
    }

    document.save()
}

fn fill_workbook(
    template: &[u8],
    record: &Record,
    cells: &[(&str, Field)],
    merge_aware: bool,
    kind: FormKind,
    warnings: &mut Vec<String>,
) -> Result<Vec<u8>, OfficeFillError> {
    let form = kind.form_id();
    let mut workbook = Workbook::open(template)?;
    let sheet = workbook.active_sheet_mut();

    for (cell, field) in cells {
        let value = record.get(*field);
        let result = CellCoord::from_a1_notation(cell).and_then(|coord| {
            if merge_aware {
                write_respecting_merges(sheet, coord, value).map(|_| ())
            } else {
                sheet.set_cell(coord, value)
            }
        });

        match result {
            Ok(()) => note_dropped_chars(form, cell, value, record, warnings),
            Err(e) => {
                warn!(form, cell = *cell, row = record.index(), error = %e, "cell write failed");
                warnings.push(format!("{}: could not write {}: {}", form, cell, e));
            }
        }
    }

    workbook.save()
}

/// XMLに書き込めない制御文字が値から取り除かれた場合に警告を記録
fn note_dropped_chars(
    form: &str,
    location: &str,
    value: &str,
    record: &Record,
    warnings: &mut Vec<String>,
) {
    if value.chars().any(is_forbidden_xml_char) {
        warn!(form, location, row = record.index(), "dropped control characters");
        warnings.push(format!("{}: removed control characters from {}", form, location));
    }
}
