//! Worksheet Module
//!
//! XLSXテンプレートのアクティブシートを開き、セル値を書き込んで保存するモジュール。
//!
//! 書き込みは`xl/worksheets/sheetN.xml`の該当`<c>`要素だけを書き換え、
//! スタイル・結合セル・印刷設定などテンプレートの他の部分はそのまま保持します。

use tracing::trace;

use crate::error::OfficeFillError;
use crate::ooxml::xml::{XmlDocument, XmlElement, XmlNode};
use crate::parser::package::{rels_path_for, resolve_target, OpcPackage};
use crate::types::{CellCoord, CellRange, MergedRegion};

const OFFICE_DOCUMENT_REL: &str = "/officeDocument";
const DEFAULT_WORKBOOK_PART: &str = "xl/workbook.xml";

/// 展開済みのワークブック
///
/// アクティブシート（`workbookView`の`activeTab`、未指定の場合は先頭シート）のみを
/// 書き換え対象として保持します。
#[derive(Debug)]
pub(crate) struct Workbook {
    package: OpcPackage,
    sheet_part: String,
    sheet: Worksheet,
}

impl Workbook {
    /// テンプレートのバイト列からワークブックを開く
    ///
    /// 呼び出しごとに新しいコピーを展開するため、同じテンプレートから
    /// 複数のワークブックを独立に生成できます。
    pub fn open(bytes: &[u8]) -> Result<Self, OfficeFillError> {
        let package = OpcPackage::from_bytes(bytes)?;
        let sheet_part = active_sheet_part(&package)?;

        let sheet_bytes = package.part(&sheet_part).ok_or_else(|| {
            OfficeFillError::Xml(format!("Worksheet part '{}' not found", sheet_part))
        })?;
        let sheet = Worksheet::parse(sheet_bytes)?;

        Ok(Self {
            package,
            sheet_part,
            sheet,
        })
    }

    /// アクティブシートへの可変参照
    pub fn active_sheet_mut(&mut self) -> &mut Worksheet {
        &mut self.sheet
    }

    /// アクティブシートへの参照
    #[allow(dead_code)]
    pub fn active_sheet(&self) -> &Worksheet {
        &self.sheet
    }

    /// 書き換え後のワークブックをXLSXバイト列として書き出す
    pub fn save(mut self) -> Result<Vec<u8>, OfficeFillError> {
        let sheet_bytes = self.sheet.to_bytes()?;
        self.package.set_part(&self.sheet_part, sheet_bytes);
        self.package.write_to_bytes()
    }
}

/// ワークシート（`<worksheet>`パーツ）
#[derive(Debug)]
pub(crate) struct Worksheet {
    doc: XmlDocument,
    merged_regions: Vec<MergedRegion>,
}

impl Worksheet {
    /// ワークシートXMLを解析
    pub fn parse(bytes: &[u8]) -> Result<Self, OfficeFillError> {
        let doc = XmlDocument::parse(bytes)?;

        let merged_regions = doc
            .root
            .child("mergeCells")
            .map(|merge_cells| {
                merge_cells
                    .child_elements("mergeCell")
                    .filter_map(|cell| cell.attr("ref"))
                    .filter_map(|reference| match CellRange::from_a1_range(&reference) {
                        Ok(range) => Some(MergedRegion::new(range)),
                        Err(_) => {
                            trace!(reference = %reference, "skipping unreadable merge reference");
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            doc,
            merged_regions,
        })
    }

    /// シートの結合セル範囲（文書内の記述順）
    pub fn merged_regions(&self) -> &[MergedRegion] {
        &self.merged_regions
    }

    /// セルに文字列を直接書き込む（結合範囲は考慮しない）
    ///
    /// 既存の`<c>`要素はスタイル（`s`属性）を保ったまま値だけを置き換えます。
    /// 数式・キャッシュ値は削除され、値はインライン文字列として格納されます。
    /// 空文字列の場合はセルの値を消去します（スタイルは保持）。
    /// 行・セル要素が存在しない場合は、行番号・列番号順を保って挿入します。
    pub fn set_cell(&mut self, coord: CellCoord, value: &str) -> Result<(), OfficeFillError> {
        let prefix = self.doc.root.prefix();
        let sheet_data = self
            .doc
            .root
            .child_mut("sheetData")
            .ok_or_else(|| OfficeFillError::Xml("Worksheet has no <sheetData>".to_string()))?;

        let row_number = coord.row + 1;
        let row_idx = match locate(sheet_data, "row", row_number, row_number_of)? {
            Ok(idx) => idx,
            Err(idx) => {
                let mut row = XmlElement::new(&format!("{}row", prefix));
                row.set_attr("r", &row_number.to_string());
                sheet_data.children.insert(idx, XmlNode::Element(row));
                idx
            }
        };

        let row = match &mut sheet_data.children[row_idx] {
            XmlNode::Element(row) => row,
            _ => return Err(OfficeFillError::Xml("Row lookup failed".to_string())),
        };
        // 列範囲のヒントは書き込み後に不正確になり得るため削除
        row.remove_attr("spans");

        let reference = coord.to_a1_notation();
        let col_number = coord.col + 1;
        let cell_idx = match locate(row, "c", col_number, col_number_of)? {
            Ok(idx) => idx,
            Err(idx) => {
                let mut cell = XmlElement::new(&format!("{}c", prefix));
                cell.set_attr("r", &reference);
                row.children.insert(idx, XmlNode::Element(cell));
                idx
            }
        };

        let cell = match &mut row.children[cell_idx] {
            XmlNode::Element(cell) => cell,
            _ => return Err(OfficeFillError::Xml("Cell lookup failed".to_string())),
        };
        write_inline_string(cell, &prefix, &reference, value);

        self.extend_dimension(coord);
        Ok(())
    }

    /// セルの値を文字列で取得
    ///
    /// インライン文字列はそのテキストを、それ以外は`<v>`の内容を返します
    /// （共有文字列はインデックスのまま）。セルが存在しない、または値がない場合は`None`。
    #[allow(dead_code)]
    pub fn cell_value(&self, coord: CellCoord) -> Option<String> {
        let sheet_data = self.doc.root.child("sheetData")?;
        let mut last_row = 0;
        for row in sheet_data.child_elements("row") {
            let row_number = row_number_of(row, last_row).ok()?;
            last_row = row_number;
            if row_number != coord.row + 1 {
                continue;
            }
            let mut last_col = 0;
            for cell in row.child_elements("c") {
                let col_number = col_number_of(cell, last_col).ok()?;
                last_col = col_number;
                if col_number != coord.col + 1 {
                    continue;
                }
                if let Some(is) = cell.child("is") {
                    return Some(is.text());
                }
                return cell.child("v").map(|v| v.text());
            }
        }
        None
    }

    /// ワークシートXMLをバイト列に書き出す
    pub fn to_bytes(&self) -> Result<Vec<u8>, OfficeFillError> {
        self.doc.to_bytes()
    }

    /// `<dimension ref>`を書き込んだセルを含むように広げる
    fn extend_dimension(&mut self, coord: CellCoord) {
        let Some(dimension) = self.doc.root.child_mut("dimension") else {
            return;
        };
        let Some(reference) = dimension.attr("ref") else {
            return;
        };
        let Ok(range) = CellRange::from_a1_range(&reference) else {
            return;
        };
        if range.contains(coord) {
            return;
        }

        let start = CellCoord::new(range.start.row.min(coord.row), range.start.col.min(coord.col));
        let end = CellCoord::new(range.end.row.max(coord.row), range.end.col.max(coord.col));
        dimension.set_attr(
            "ref",
            &format!("{}:{}", start.to_a1_notation(), end.to_a1_notation()),
        );
    }
}

/// 結合範囲を考慮してセルに書き込む
///
/// `coord`がいずれかの結合範囲（行・列の数値境界で判定）に含まれる場合は、
/// その範囲の左上セルへ書き込みます。含まれない場合は`coord`へ直接書き込みます。
/// 同じ結合範囲内の異なる座標への書き込みは、すべて同じ左上セルへの書き込みになります。
///
/// # 戻り値
///
/// 実際に書き込んだセル座標
pub(crate) fn write_respecting_merges(
    sheet: &mut Worksheet,
    coord: CellCoord,
    value: &str,
) -> Result<CellCoord, OfficeFillError> {
    let target = sheet
        .merged_regions()
        .iter()
        .find(|region| region.contains(coord))
        .map(|region| region.parent)
        .unwrap_or(coord);

    if target != coord {
        trace!(
            requested = %coord.to_a1_notation(),
            written = %target.to_a1_notation(),
            "redirecting write to merged region top-left"
        );
    }

    sheet.set_cell(target, value)?;
    Ok(target)
}

fn write_inline_string(cell: &mut XmlElement, prefix: &str, reference: &str, value: &str) {
    cell.set_attr("r", reference);
    cell.remove_attr("t");
    cell.remove_attr("vm");
    cell.remove_attr("cm");
    cell.children.clear();

    if value.is_empty() {
        return;
    }

    cell.set_attr("t", "inlineStr");
    let mut text = XmlElement::new(&format!("{}t", prefix));
    if value.starts_with(char::is_whitespace) || value.ends_with(char::is_whitespace) {
        text.set_attr("xml:space", "preserve");
    }
    text.set_text(value);

    let mut inline = XmlElement::new(&format!("{}is", prefix));
    inline.push(text);
    cell.push(inline);
}

/// 子要素の中から番号が一致する要素を探す
///
/// 見つかった場合は`Ok(Ok(index))`、見つからない場合は番号順を保つ挿入位置を
/// `Ok(Err(index))`で返します。番号属性が省略された要素は直前の要素の次の番号とみなします。
fn locate(
    parent: &XmlElement,
    local: &str,
    target: u32,
    number_of: fn(&XmlElement, u32) -> Result<u32, OfficeFillError>,
) -> Result<Result<usize, usize>, OfficeFillError> {
    let mut last = 0;
    let mut insert_at = None;

    for (idx, node) in parent.children.iter().enumerate() {
        let XmlNode::Element(element) = node else {
            continue;
        };
        if !element.is(local) {
            continue;
        }
        let number = number_of(element, last)?;
        last = number;

        if number == target {
            return Ok(Ok(idx));
        }
        if number > target {
            return Ok(Err(idx));
        }
        insert_at = Some(idx + 1);
    }

    // 対象要素がない場合は、他の子要素（extLst等）より前に入るよう先頭側へ
    let fallback = parent
        .children
        .iter()
        .rposition(|node| matches!(node, XmlNode::Element(e) if e.is(local)))
        .map(|idx| idx + 1)
        .unwrap_or_else(|| {
            parent
                .children
                .iter()
                .position(|node| matches!(node, XmlNode::Element(_)))
                .unwrap_or(parent.children.len())
        });

    Ok(Err(insert_at.unwrap_or(fallback)))
}

fn row_number_of(row: &XmlElement, previous: u32) -> Result<u32, OfficeFillError> {
    match row.attr("r") {
        Some(r) => Ok(r.trim().parse()?),
        None => Ok(previous + 1),
    }
}

fn col_number_of(cell: &XmlElement, previous: u32) -> Result<u32, OfficeFillError> {
    match cell.attr("r") {
        Some(r) => Ok(CellCoord::from_a1_notation(&r)?.col + 1),
        None => Ok(previous + 1),
    }
}

/// アクティブシートのパーツ名を解決
fn active_sheet_part(package: &OpcPackage) -> Result<String, OfficeFillError> {
    let workbook_part = workbook_part(package)?;
    let workbook_bytes = package.part(&workbook_part).ok_or_else(|| {
        OfficeFillError::Xml(format!("Workbook part '{}' not found", workbook_part))
    })?;
    let workbook = XmlDocument::parse(workbook_bytes)?;

    let active_tab: usize = workbook
        .root
        .child("bookViews")
        .and_then(|views| views.child("workbookView"))
        .and_then(|view| view.attr("activeTab"))
        .and_then(|tab| tab.trim().parse().ok())
        .unwrap_or(0);

    let sheets: Vec<&XmlElement> = workbook
        .root
        .child("sheets")
        .map(|sheets| sheets.child_elements("sheet").collect())
        .unwrap_or_default();

    // activeTabが範囲外の場合は先頭シートを使う
    let sheet = sheets
        .get(active_tab)
        .or_else(|| sheets.first())
        .ok_or_else(|| OfficeFillError::Xml("Workbook has no sheets".to_string()))?;

    let rel_id = sheet
        .attr_local("id")
        .ok_or_else(|| OfficeFillError::Xml("Sheet entry has no r:id".to_string()))?;

    let rels_part = rels_path_for(&workbook_part);
    let target = relationship_target(package, &rels_part, |rel| {
        rel.attr("Id").as_deref() == Some(rel_id.as_str())
    })?
    .ok_or_else(|| OfficeFillError::Xml(format!("Relationship '{}' not found", rel_id)))?;

    Ok(resolve_target(&workbook_part, &target))
}

/// パッケージのメイン文書（`xl/workbook.xml`）のパーツ名を解決
fn workbook_part(package: &OpcPackage) -> Result<String, OfficeFillError> {
    let target = relationship_target(package, "_rels/.rels", |rel| {
        rel.attr("Type")
            .map(|t| t.ends_with(OFFICE_DOCUMENT_REL))
            .unwrap_or(false)
    })?;

    Ok(target
        .map(|t| resolve_target("", &t))
        .unwrap_or_else(|| DEFAULT_WORKBOOK_PART.to_string()))
}

/// 関係パーツから条件に一致する最初の関係のターゲットを取得
pub(crate) fn relationship_target(
    package: &OpcPackage,
    rels_part: &str,
    predicate: impl Fn(&XmlElement) -> bool,
) -> Result<Option<String>, OfficeFillError> {
    let Some(bytes) = package.part(rels_part) else {
        return Ok(None);
    };
    let rels = XmlDocument::parse(bytes)?;
    let target = rels
        .root
        .child_elements("Relationship")
        .find(|rel| predicate(rel))
        .and_then(|rel| rel.attr("Target"));
    Ok(target)
}
