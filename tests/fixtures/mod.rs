//! テスト用のテンプレート・入力表・アーカイブ読み取りヘルパー
//!
//! XLSXテンプレートはrust_xlsxwriterで、DOCXテンプレートは最小構成のパッケージを
//! zipクレートで直接組み立てます。

#![allow(dead_code)]

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use officefill::{FormKind, GenerationInput, TableSource};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use std::io::{Cursor, Read, Write};
use zip::write::{FileOptions, ZipWriter};
use zip::{CompressionMethod, ZipArchive};

pub const HEADER: &str = "CLIENTE,NOMBRE DEL EQUIPO,REFERENCIA,SERIE,FECHA INSTALACION(WORD),NIT CLIENTE,TIPO MMTO,FRECUENCIA,DIRECCION,MODELO,UBICACIÓN DEL EQUIPO (ÁREA),DD,MM,AA,ENTIDAD,CIUDAD,TELEFONO CLIENTE";

pub const ACME_ROW: &str = "Acme Corp,Scanner 1,REF-9,SN-001,2024-03-15,900123456-7,Preventivo,Mensual,Calle 1 # 2-3,X200,Laboratorio,15,03,2024,Clinica Central,Bogotá,6015551234";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

pub const UNTOUCHED_PARAGRAPH: &str =
    "<w:p><w:r><w:t>ENTREGA DE EQUIPO A CONFORMIDAD</w:t></w:r></w:p>";

/// 行ラベルと空の値セルからなる4行2列の表
fn narrative_table() -> String {
    let mut xml = String::from("<w:tbl><w:tblPr><w:tblW w:w=\"0\" w:type=\"auto\"/></w:tblPr>");
    for label in ["EQUIPO", "REFERENCIA", "SERIE", "FECHA"] {
        xml.push_str(&format!(
            "<w:tr><w:tc><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:tc><w:tc><w:tcPr><w:tcW w:w=\"4000\" w:type=\"dxa\"/></w:tcPr><w:p/></w:tc></w:tr>",
            label
        ));
    }
    xml.push_str("</w:tbl>");
    xml
}

fn document_xml(with_table: bool) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            "\n",
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#,
            "{}",
            r#"<w:p><w:pPr><w:jc w:val="both"/></w:pPr><w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">Señores (Nombre </w:t></w:r><w:r><w:t>cliente)</w:t></w:r></w:p>"#,
            r#"<w:p><w:r><w:t>(Nombre cliente) recibe a conformidad; firma: (Nombre cliente)</w:t></w:r></w:p>"#,
            "{}",
            r#"<w:sectPr><w:pgSz w:w="12240" w:h="15840"/></w:sectPr></w:body></w:document>"#
        ),
        UNTOUCHED_PARAGRAPH,
        if with_table { narrative_table() } else { String::new() }
    )
}

/// ZIPパッケージを組み立てる
pub fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, bytes) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(bytes).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// FR-EI-02テンプレート（段落プレースホルダーと4行の表）
pub fn narrative_template() -> Vec<u8> {
    narrative_docx(true)
}

/// 表を含まないFR-EI-02テンプレート
pub fn narrative_template_without_table() -> Vec<u8> {
    narrative_docx(false)
}

fn narrative_docx(with_table: bool) -> Vec<u8> {
    let document = document_xml(with_table);
    build_zip(&[
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("_rels/.rels", ROOT_RELS.as_bytes()),
        ("word/document.xml", document.as_bytes()),
    ])
}

/// FR-EI-04テンプレート（ラベル付きの書式セル）
pub fn life_record_template() -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    let bold = Format::new().set_bold();

    worksheet.write_string_with_format(0, 0, "HOJA DE VIDA DEL EQUIPO", &bold)?;
    worksheet.write_string(8, 0, "EQUIPO:")?;
    worksheet.write_string(6, 26, "SERIE:")?;
    worksheet.write_string(21, 0, "ENTIDAD:")?;
    // 既存値の上書きを確認するため、書き込み先に仮の値を入れておく
    worksheet.write_string(8, 3, "placeholder")?;
    worksheet.write_number(23, 21, 1.0)?;

    Ok(workbook.save_to_buffer()?)
}

/// FR-EI-03テンプレート
pub fn protocol_template() -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.write_string(0, 0, "PROTOCOLO DE MANTENIMIENTO PREVENTIVO")?;
    worksheet.write_string(10, 0, "EQUIPO")?;
    Ok(workbook.save_to_buffer()?)
}

/// FR-EI-05テンプレート（書き込み先を含む結合セル）
///
/// 顧客名（D4）は`C4:H4`、電話番号（R4）は`Q4:T4`、型式（D10）は`D9:D10`に含まれ、
/// いずれも左上セルが書き込み先と異なります。
pub fn schedule_template() -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    let format = Format::new();

    worksheet.write_string(0, 0, "CRONOGRAMA DE MANTENIMIENTO")?;
    worksheet.merge_range(3, 2, 3, 7, "", &format)?; // C4:H4
    worksheet.merge_range(3, 16, 3, 19, "", &format)?; // Q4:T4
    worksheet.merge_range(4, 3, 4, 4, "", &format)?; // D5:E5
    worksheet.merge_range(4, 5, 4, 13, "", &format)?; // F5:N5
    worksheet.merge_range(4, 17, 4, 19, "", &format)?; // R5:T5
    worksheet.merge_range(5, 3, 5, 13, "", &format)?; // D6:N6
    worksheet.merge_range(5, 17, 5, 19, "", &format)?; // R6:T6
    worksheet.merge_range(8, 3, 9, 3, "", &format)?; // D9:D10
    worksheet.merge_range(9, 1, 9, 2, "", &format)?; // B10:C10
    worksheet.merge_range(9, 4, 10, 4, "", &format)?; // E10:E11
    worksheet.merge_range(9, 5, 10, 5, "", &format)?; // F10:F11
    worksheet.merge_range(9, 6, 9, 7, "", &format)?; // G10:H10

    Ok(workbook.save_to_buffer()?)
}

/// CSV形式の入力表
pub fn csv_table(rows: &[&str]) -> TableSource {
    let mut text = String::from(HEADER);
    for row in rows {
        text.push('\n');
        text.push_str(row);
    }
    text.push('\n');
    TableSource::new("PLANTILLA_DATOS.csv", text.into_bytes())
}

/// 4つの標準テンプレートを設定した入力
pub fn input_with(table: TableSource) -> GenerationInput {
    GenerationInput::new()
        .with_table(table)
        .with_template(FormKind::Narrative, narrative_template())
        .with_template(FormKind::LifeRecord, life_record_template().unwrap())
        .with_template(FormKind::MaintenanceProtocol, protocol_template().unwrap())
        .with_template(FormKind::Schedule, schedule_template().unwrap())
}

/// ZIP内のエントリ名（格納順）
pub fn zip_names(bytes: &[u8]) -> Vec<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

/// ZIP内のエントリの内容
pub fn zip_entry(bytes: &[u8], name: &str) -> Vec<u8> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut content = Vec::new();
    file.read_to_end(&mut content).unwrap();
    content
}

/// 集約アーカイブから、レコードのアーカイブ内の帳票を取り出す
pub fn form_bytes(
    aggregate: &[u8],
    record_archive: &str,
    kind: FormKind,
    client: &str,
    equipment: &str,
) -> Vec<u8> {
    let record = zip_entry(aggregate, record_archive);
    let name = format!(
        "{} {}-{}-{}.{}",
        kind.form_id(),
        kind.title(),
        client,
        equipment,
        kind.extension()
    );
    zip_entry(&record, &name)
}

/// DOCXの本文XML
pub fn document_text(docx: &[u8]) -> String {
    String::from_utf8(zip_entry(docx, "word/document.xml")).unwrap()
}

/// XLSXのアクティブシートのセル値をcalamineで読み取る（空セルは空文字列）
pub fn cell(xlsx: &[u8], a1: &str) -> String {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(xlsx)).unwrap();
    let range = workbook.worksheet_range_at(0).unwrap().unwrap();
    match range.get_value(a1_to_position(a1)) {
        None | Some(Data::Empty) => String::new(),
        Some(Data::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// "AE24" -> (23, 30)
pub fn a1_to_position(a1: &str) -> (u32, u32) {
    let split = a1.find(|c: char| c.is_ascii_digit()).unwrap();
    let (letters, digits) = a1.split_at(split);
    let col = letters
        .chars()
        .fold(0u32, |acc, c| acc * 26 + (c as u32 - 'A' as u32 + 1));
    (digits.parse::<u32>().unwrap() - 1, col - 1)
}
