//! Security Tests
//!
//! テンプレート（ZIPコンテナ）と入力表に対するセキュリティ対策を検証します。
//! ZIP bomb攻撃、パストラバーサル攻撃、ファイルサイズ制限など。
//! テンプレートの違反は行単位の失敗、入力表の違反は致命的エラーとして扱われます。

mod fixtures;

use fixtures::*;
use officefill::{FormKind, GeneratorBuilder, OfficeFillError, RowStatus, TableSource};
use std::io::{Cursor, Write};
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

/// 改ざんしたFR-EI-04テンプレートで1行を処理し、その行のメッセージを返す
fn failed_row_message(template: Vec<u8>) -> String {
    let generator = GeneratorBuilder::new().build().unwrap();
    let input = input_with(csv_table(&[ACME_ROW])).with_template(FormKind::LifeRecord, template);

    let report = generator.generate(&input).unwrap();
    assert_eq!(report.rows.len(), 1);
    assert_eq!(report.rows[0].status, RowStatus::Failed);
    assert!(report.entries.is_empty());
    report.rows[0].messages.join("\n")
}

/// 正常なテンプレートに1エントリを追加する
fn template_with_extra_entry(name: &str) -> Vec<u8> {
    build_zip(&[
        ("[Content_Types].xml", "<Types/>".as_bytes()),
        (name, "malicious".as_bytes()),
    ])
}

/// ZIP bomb攻撃のテスト: 大量のファイルを含むテンプレート
#[test]
fn test_zip_bomb_too_many_files() {
    // 10,001個のファイルを含むZIPアーカイブを作成（上限: 10,000）
    let mut zip_data = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut zip_data));
        let options = FileOptions::default().compression_method(CompressionMethod::Stored);

        for i in 0..10_001 {
            let file_name = format!("xl/file{}.xml", i);
            zip.start_file(file_name, options).unwrap();
            zip.write_all(b"test").unwrap();
        }

        zip.finish().unwrap();
    }

    let message = failed_row_message(zip_data);
    assert!(message.contains("FR-EI-04"), "{}", message);
    assert!(message.contains("too many files"), "{}", message);
}

/// ZIP bomb攻撃のテスト: 展開後のサイズが大きすぎるテンプレート
#[test]
#[ignore] // 大きなファイルを作成するため、通常のテストではスキップ
fn test_zip_bomb_large_decompressed_size() {
    // 100MBのファイルを6個（合計600MB、上限: 512MB）
    let mut zip_data = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut zip_data));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        let chunk = vec![0u8; 104_857_600];
        for i in 0..6 {
            zip.start_file(format!("xl/media/blob{}.bin", i), options)
                .unwrap();
            zip.write_all(&chunk).unwrap();
        }

        zip.finish().unwrap();
    }

    let message = failed_row_message(zip_data);
    assert!(message.contains("decompressed size"), "{}", message);
}

/// ZIP bomb攻撃のテスト: 単一ファイルが大きすぎるテンプレート
#[test]
#[ignore] // 大きなファイルを作成するため、通常のテストではスキップ
fn test_zip_bomb_single_file_too_large() {
    let mut zip_data = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut zip_data));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        // 100MB + 1バイト
        zip.start_file("xl/worksheets/sheet1.xml", options).unwrap();
        zip.write_all(&vec![b' '; 104_857_601]).unwrap();

        zip.finish().unwrap();
    }

    let message = failed_row_message(zip_data);
    assert!(message.contains("exceeds maximum size"), "{}", message);
}

/// パストラバーサル攻撃のテスト: `..`を含むパス
#[test]
fn test_path_traversal_dotdot() {
    let message = failed_row_message(template_with_extra_entry("../../../etc/passwd"));
    assert!(message.contains("Invalid ZIP path"), "{}", message);
}

/// パストラバーサル攻撃のテスト: 絶対パス
#[test]
fn test_path_traversal_absolute_path() {
    let message = failed_row_message(template_with_extra_entry("/etc/passwd"));
    assert!(message.contains("Invalid ZIP path"), "{}", message);
}

/// パストラバーサル攻撃のテスト: Windowsの絶対パス
#[test]
fn test_path_traversal_windows_absolute_path() {
    let message = failed_row_message(template_with_extra_entry("C:\\Windows\\system32\\x.xml"));
    assert!(message.contains("Invalid ZIP path"), "{}", message);
}

/// 不正なテンプレートは他の行・他の帳票に影響しない
#[test]
fn test_violation_is_contained_to_its_row() {
    let generator = GeneratorBuilder::new().build().unwrap();
    let input = input_with(csv_table(&[ACME_ROW]))
        .with_template(FormKind::Schedule, template_with_extra_entry("../escape.xml"));

    let report = generator.generate(&input).unwrap();
    assert_eq!(report.rows[0].status, RowStatus::Failed);
    assert!(report.rows[0].messages[0].contains("FR-EI-05"));
    // 集約アーカイブ自体は有効な（空の）ZIP
    assert!(zip_names(&report.archive).is_empty());
}

/// ファイルサイズ制限のテスト: 入力表が大きすぎる場合は致命的エラー
#[test]
#[ignore] // 大きなファイルを作成するため、通常のテストではスキップ
fn test_input_table_size_limit() {
    // 256MB + 1バイト
    let mut csv = HEADER.as_bytes().to_vec();
    csv.resize(268_435_457, b' ');

    let generator = GeneratorBuilder::new().build().unwrap();
    let result = generator.generate(&input_with(TableSource::new("huge.csv", csv)));

    match result {
        Err(OfficeFillError::SecurityViolation(msg)) => {
            assert!(msg.contains("Input file size"));
        }
        other => panic!("Expected SecurityViolation error, got {:?}", other.map(|r| r.rows)),
    }
}

/// 正常なテンプレートの処理がセキュリティエラーにならないことを確認
#[test]
fn test_valid_template_processing() {
    let generator = GeneratorBuilder::new().build().unwrap();
    let report = generator.generate(&input_with(csv_table(&[ACME_ROW]))).unwrap();

    assert_eq!(report.rows[0].status, RowStatus::Success);
    for message in report.messages() {
        assert!(!message.1.contains("Security violation"));
    }
}
