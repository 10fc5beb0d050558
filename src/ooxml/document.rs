//! Document Module
//!
//! DOCXテンプレートの本文（`word/document.xml`）を扱うモジュール。
//! 本文の段落テキストの置換と、先頭の表のセルへの書き込みを提供します。

use tracing::trace;

use crate::error::OfficeFillError;
use crate::ooxml::worksheet::relationship_target;
use crate::ooxml::xml::{XmlDocument, XmlElement, XmlNode};
use crate::parser::package::{resolve_target, OpcPackage};

const OFFICE_DOCUMENT_REL: &str = "/officeDocument";
const DEFAULT_DOCUMENT_PART: &str = "word/document.xml";

/// 展開済みのDOCX文書
#[derive(Debug)]
pub(crate) struct Document {
    package: OpcPackage,
    part: String,
    doc: XmlDocument,
}

impl Document {
    /// テンプレートのバイト列から文書を開く
    pub fn open(bytes: &[u8]) -> Result<Self, OfficeFillError> {
        let package = OpcPackage::from_bytes(bytes)?;

        let part = relationship_target(&package, "_rels/.rels", |rel| {
            rel.attr("Type")
                .map(|t| t.ends_with(OFFICE_DOCUMENT_REL))
                .unwrap_or(false)
        })?
        .map(|target| resolve_target("", &target))
        .unwrap_or_else(|| DEFAULT_DOCUMENT_PART.to_string());

        let xml = package
            .part(&part)
            .ok_or_else(|| OfficeFillError::Xml(format!("Document part '{}' not found", part)))?;
        let doc = XmlDocument::parse(xml)?;

        if doc.root.child("body").is_none() {
            return Err(OfficeFillError::Xml("Document has no <w:body>".to_string()));
        }

        Ok(Self { package, part, doc })
    }

    /// `placeholder`を含む本文段落のテキストを置換
    ///
    /// 段落内のすべての出現箇所を`replacement`に置き換えます。
    /// 複数のランに分割された文字列も段落単位で照合します。
    /// プレースホルダーを含まない段落は変更しません。
    ///
    /// # 戻り値
    ///
    /// 書き換えた段落の数
    pub fn replace_in_paragraphs(&mut self, placeholder: &str, replacement: &str) -> usize {
        let Some(body) = self.doc.root.child_mut("body") else {
            return 0;
        };

        let mut rewritten = 0;
        for paragraph in body.elements_mut().filter(|e| e.is("p")) {
            let text = paragraph_text(paragraph);
            if !text.contains(placeholder) {
                continue;
            }
            set_paragraph_text(paragraph, &text.replace(placeholder, replacement));
            rewritten += 1;
        }

        trace!(placeholder, rewritten, "replaced placeholder in paragraphs");
        rewritten
    }

    /// 本文直下の最初の表
    pub fn first_table_mut(&mut self) -> Option<Table<'_>> {
        self.doc
            .root
            .child_mut("body")?
            .child_mut("tbl")
            .map(|element| Table { element })
    }

    /// 書き換え後の文書をDOCXバイト列として書き出す
    pub fn save(mut self) -> Result<Vec<u8>, OfficeFillError> {
        let xml = self.doc.to_bytes()?;
        self.package.set_part(&self.part, xml);
        self.package.write_to_bytes()
    }
}

/// 文書内の表（`<w:tbl>`）
///
/// セルは表示上のグリッド座標（0始まり）で指定します。
/// `gridSpan`で横結合されたセルは複数の列を占め、
/// `vMerge`の継続セルは結合の起点セルとして解決されます。
pub(crate) struct Table<'a> {
    element: &'a mut XmlElement,
}

impl Table<'_> {
    /// 指定したグリッド座標のセルのテキストを設定
    ///
    /// # 戻り値
    ///
    /// * `Ok(())` - 書き込みに成功した場合
    /// * `Err(OfficeFillError::Xml)` - 座標に対応するセルが存在しない場合
    pub fn set_cell_text(
        &mut self,
        row: usize,
        col: usize,
        text: &str,
    ) -> Result<(), OfficeFillError> {
        let (tr_idx, tc_idx) = self.locate(row, col).ok_or_else(|| {
            OfficeFillError::Xml(format!("Table has no cell at row {}, column {}", row, col))
        })?;

        let cell = match &mut self.element.children[tr_idx] {
            XmlNode::Element(tr) => match &mut tr.children[tc_idx] {
                XmlNode::Element(tc) => tc,
                _ => return Err(OfficeFillError::Xml("Table cell lookup failed".to_string())),
            },
            _ => return Err(OfficeFillError::Xml("Table row lookup failed".to_string())),
        };

        set_cell_text(cell, text);
        Ok(())
    }

    /// 指定したグリッド座標のセルのテキストを取得
    #[allow(dead_code)]
    pub fn cell_text(&self, row: usize, col: usize) -> Option<String> {
        let (tr_idx, tc_idx) = self.locate(row, col)?;
        match &self.element.children[tr_idx] {
            XmlNode::Element(tr) => match &tr.children[tc_idx] {
                XmlNode::Element(tc) => Some(
                    tc.child_elements("p")
                        .map(paragraph_text)
                        .collect::<Vec<_>>()
                        .join("\n"),
                ),
                _ => None,
            },
            _ => None,
        }
    }

    /// グリッド座標を(行要素の子インデックス, セル要素の子インデックス)に解決
    fn locate(&self, row: usize, col: usize) -> Option<(usize, usize)> {
        let grid = self.grid();
        grid.get(row)?.get(col).copied().flatten()
    }

    /// 表示上のグリッドを構築
    fn grid(&self) -> Vec<Vec<Option<(usize, usize)>>> {
        let mut grid: Vec<Vec<Option<(usize, usize)>>> = Vec::new();

        for (tr_idx, node) in self.element.children.iter().enumerate() {
            let XmlNode::Element(tr) = node else {
                continue;
            };
            if !tr.is("tr") {
                continue;
            }

            let grid_before = tr
                .child("trPr")
                .and_then(|pr| pr.child("gridBefore"))
                .and_then(|gb| gb.attr_local("val"))
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(0);

            let mut cells: Vec<Option<(usize, usize)>> = vec![None; grid_before];
            for (tc_idx, node) in tr.children.iter().enumerate() {
                let XmlNode::Element(tc) = node else {
                    continue;
                };
                if !tc.is("tc") {
                    continue;
                }

                let props = tc.child("tcPr");
                let span = props
                    .and_then(|pr| pr.child("gridSpan"))
                    .and_then(|gs| gs.attr_local("val"))
                    .and_then(|v| v.parse::<usize>().ok())
                    .unwrap_or(1)
                    .max(1);
                let continues_merge = props
                    .and_then(|pr| pr.child("vMerge"))
                    .map(|vm| vm.attr_local("val").as_deref() != Some("restart"))
                    .unwrap_or(false);

                let start_col = cells.len();
                let position = if continues_merge {
                    grid.last()
                        .and_then(|above| above.get(start_col).copied().flatten())
                        .or(Some((tr_idx, tc_idx)))
                } else {
                    Some((tr_idx, tc_idx))
                };
                cells.extend(std::iter::repeat(position).take(span));
            }
            grid.push(cells);
        }

        grid
    }
}

/// 段落のテキストを取得（`w:tab`はタブ、`w:br`/`w:cr`は改行として扱う）
fn paragraph_text(paragraph: &XmlElement) -> String {
    let mut text = String::new();
    for child in paragraph.children.iter() {
        let XmlNode::Element(element) = child else {
            continue;
        };
        if element.is("r") {
            push_run_text(element, &mut text);
        } else if element.is("hyperlink") {
            for run in element.child_elements("r") {
                push_run_text(run, &mut text);
            }
        }
    }
    text
}

fn push_run_text(run: &XmlElement, out: &mut String) {
    for child in run.children.iter() {
        let XmlNode::Element(element) = child else {
            continue;
        };
        if element.is("t") {
            out.push_str(&element.text());
        } else if element.is("tab") {
            out.push('\t');
        } else if element.is("br") || element.is("cr") {
            out.push('\n');
        }
    }
}

/// 段落のテキストを置き換える
///
/// 段落プロパティ（`w:pPr`）と最初のランのプロパティ（`w:rPr`）を保持し、
/// テキストを単一のランとして書き込みます。
fn set_paragraph_text(paragraph: &mut XmlElement, text: &str) {
    let prefix = paragraph.prefix();
    let paragraph_props = paragraph.child("pPr").cloned();
    let run_props = first_run_props(paragraph);

    paragraph.children.clear();
    if let Some(props) = paragraph_props {
        paragraph.push(props);
    }

    let mut run = XmlElement::new(&format!("{}r", prefix));
    if let Some(props) = run_props {
        run.push(props);
    }

    let mut segment = String::new();
    for ch in text.chars() {
        match ch {
            '\t' | '\n' => {
                flush_text(&mut run, &prefix, &mut segment);
                let name = if ch == '\t' { "tab" } else { "br" };
                run.push(XmlElement::new(&format!("{}{}", prefix, name)));
            }
            _ => segment.push(ch),
        }
    }
    flush_text(&mut run, &prefix, &mut segment);

    paragraph.push(run);
}

fn flush_text(run: &mut XmlElement, prefix: &str, segment: &mut String) {
    if segment.is_empty() {
        return;
    }
    let mut t = XmlElement::new(&format!("{}t", prefix));
    t.set_attr("xml:space", "preserve");
    t.set_text(segment);
    run.push(t);
    segment.clear();
}

fn first_run_props(paragraph: &XmlElement) -> Option<XmlElement> {
    paragraph
        .children
        .iter()
        .filter_map(|node| match node {
            XmlNode::Element(e) if e.is("r") => Some(e),
            XmlNode::Element(e) if e.is("hyperlink") => e.child("r"),
            _ => None,
        })
        .find_map(|run| run.child("rPr").cloned())
}

/// セルのテキストを置き換える
///
/// セルプロパティ（`w:tcPr`）を保持し、最初の段落の書式でテキストを書き込みます。
/// 2つ目以降の段落やネストした表は削除されます。
fn set_cell_text(cell: &mut XmlElement, text: &str) {
    let prefix = cell.prefix();
    let cell_props = cell.child("tcPr").cloned();
    let mut paragraph = cell
        .child("p")
        .cloned()
        .unwrap_or_else(|| XmlElement::new(&format!("{}p", prefix)));

    set_paragraph_text(&mut paragraph, text);

    cell.children.clear();
    if let Some(props) = cell_props {
        cell.push(props);
    }
    cell.push(paragraph);
}

#[cfg(test)]
mod tests {
    use super::*;

    const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

    fn body(inner: &str) -> XmlDocument {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="{}"><w:body>{}</w:body></w:document>"#,
            W_NS, inner
        );
        XmlDocument::parse(xml.as_bytes()).unwrap()
    }

    fn paragraphs(doc: &XmlDocument) -> Vec<String> {
        doc.root
            .child("body")
            .unwrap()
            .child_elements("p")
            .map(paragraph_text)
            .collect()
    }

    #[test]
    fn test_paragraph_text_joins_runs() {
        let doc = body(
            r#"<w:p><w:r><w:t>Señores (Nombre</w:t></w:r><w:r><w:t xml:space="preserve"> cliente)</w:t><w:tab/><w:t>fin</w:t></w:r></w:p>"#,
        );
        assert_eq!(paragraphs(&doc), vec!["Señores (Nombre cliente)\tfin".to_string()]);
    }

    #[test]
    fn test_set_paragraph_text_keeps_formatting() {
        let mut doc = body(
            r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:rPr><w:b/></w:rPr><w:t>old</w:t></w:r><w:r><w:t>text</w:t></w:r></w:p>"#,
        );
        let paragraph = doc.root.child_mut("body").unwrap().child_mut("p").unwrap();
        set_paragraph_text(paragraph, "new\ttext");

        let xml = String::from_utf8(doc.to_bytes().unwrap()).unwrap();
        assert!(xml.contains(
            r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">new</w:t><w:tab/><w:t xml:space="preserve">text</w:t></w:r></w:p>"#
        ));
    }

    #[test]
    fn test_table_grid_with_spans_and_vertical_merge() {
        let mut doc = body(concat!(
            r#"<w:tbl>"#,
            r#"<w:tr><w:tc><w:tcPr><w:gridSpan w:val="2"/></w:tcPr><w:p/></w:tc><w:tc><w:p/></w:tc></w:tr>"#,
            r#"<w:tr><w:tc><w:p/></w:tc><w:tc><w:tcPr><w:vMerge w:val="restart"/></w:tcPr><w:p/></w:tc><w:tc><w:p/></w:tc></w:tr>"#,
            r#"<w:tr><w:tc><w:p/></w:tc><w:tc><w:tcPr><w:vMerge/></w:tcPr><w:p/></w:tc><w:tc><w:p/></w:tc></w:tr>"#,
            r#"</w:tbl>"#
        ));
        let body = doc.root.child_mut("body").unwrap();
        let mut table = Table {
            element: body.child_mut("tbl").unwrap(),
        };

        // 横結合: (0,0)と(0,1)は同じセル
        table.set_cell_text(0, 1, "spanned").unwrap();
        assert_eq!(table.cell_text(0, 0).as_deref(), Some("spanned"));
        assert_eq!(table.cell_text(0, 2).as_deref(), Some(""));

        // 縦結合の継続セルは起点セルに解決される
        table.set_cell_text(2, 1, "merged").unwrap();
        assert_eq!(table.cell_text(1, 1).as_deref(), Some("merged"));

        assert!(table.set_cell_text(5, 1, "x").is_err());
        assert!(table.set_cell_text(0, 3, "x").is_err());
    }

    #[test]
    fn test_set_cell_text_keeps_cell_properties() {
        let mut doc = body(
            r#"<w:tbl><w:tr><w:tc><w:tcPr><w:tcW w:w="2000"/></w:tcPr><w:p><w:r><w:rPr><w:i/></w:rPr><w:t>a</w:t></w:r></w:p><w:p><w:r><w:t>b</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#,
        );
        let body = doc.root.child_mut("body").unwrap();
        let mut table = Table {
            element: body.child_mut("tbl").unwrap(),
        };
        table.set_cell_text(0, 0, "Scanner 1").unwrap();

        let xml = String::from_utf8(doc.to_bytes().unwrap()).unwrap();
        assert!(xml.contains(
            r#"<w:tc><w:tcPr><w:tcW w:w="2000"/></w:tcPr><w:p><w:r><w:rPr><w:i/></w:rPr><w:t xml:space="preserve">Scanner 1</w:t></w:r></w:p></w:tc>"#
        ));
    }
}
