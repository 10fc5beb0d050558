//! OPC Package Module
//!
//! DOCX/XLSXファイル（ZIPアーカイブ）をパーツ単位でメモリに展開し、
//! 書き換え後に再びZIPとして書き出すモジュール。
//! 展開時には`SecurityConfig`の制限をすべて適用します。

use std::io::{Cursor, Read, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::OfficeFillError;
use crate::security::{validate_zip_path, SecurityConfig};

/// パッケージ内の1パーツ
#[derive(Debug, Clone)]
struct Part {
    name: String,
    bytes: Vec<u8>,
}

/// メモリ上に展開されたOPCパッケージ
///
/// パーツの並び順は元のZIPアーカイブの順序を保持します。
/// テンプレートは行ごとに`from_bytes`で新しく展開されるため、
/// あるレコードへの書き換えが他のレコードへ波及することはありません。
#[derive(Debug, Clone)]
pub(crate) struct OpcPackage {
    parts: Vec<Part>,
}

impl OpcPackage {
    /// ZIPバイト列からパッケージを展開
    ///
    /// # 戻り値
    ///
    /// * `Ok(OpcPackage)` - 展開に成功した場合
    /// * `Err(OfficeFillError::Zip)` - ZIPとして読み込めない場合
    /// * `Err(OfficeFillError::SecurityViolation)` - サイズ・ファイル数・パスの制限に違反した場合
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, OfficeFillError> {
        let security_config = SecurityConfig::default();

        if bytes.len() as u64 > security_config.max_input_file_size {
            return Err(OfficeFillError::SecurityViolation(format!(
                "Input file size exceeds maximum: {} bytes (max: {} bytes)",
                bytes.len(),
                security_config.max_input_file_size
            )));
        }

        let mut archive = ZipArchive::new(Cursor::new(bytes))?;

        // セキュリティチェック: ファイル数の上限
        if archive.len() > security_config.max_file_count {
            return Err(OfficeFillError::SecurityViolation(format!(
                "ZIP archive contains too many files: {} (max: {})",
                archive.len(),
                security_config.max_file_count
            )));
        }

        let mut parts = Vec::with_capacity(archive.len());
        let mut total_decompressed_size = 0u64;

        for i in 0..archive.len() {
            let file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }

            let name = file.name().to_string();
            validate_zip_path(&name).map_err(|e| {
                OfficeFillError::SecurityViolation(format!("Invalid ZIP path: {}", e))
            })?;

            // 宣言サイズを信用せず、上限+1バイトまでしか読み込まない
            let mut content = Vec::new();
            file.take(security_config.max_file_size + 1)
                .read_to_end(&mut content)?;
            let file_size = content.len() as u64;

            if file_size > security_config.max_file_size {
                return Err(OfficeFillError::SecurityViolation(format!(
                    "File '{}' exceeds maximum size: {} bytes (max: {} bytes)",
                    name, file_size, security_config.max_file_size
                )));
            }

            total_decompressed_size = total_decompressed_size
                .checked_add(file_size)
                .ok_or_else(|| {
                    OfficeFillError::SecurityViolation(
                        "Total decompressed size calculation overflow".to_string(),
                    )
                })?;

            if total_decompressed_size > security_config.max_decompressed_size {
                return Err(OfficeFillError::SecurityViolation(format!(
                    "Total decompressed size exceeds maximum: {} bytes (max: {} bytes)",
                    total_decompressed_size, security_config.max_decompressed_size
                )));
            }

            parts.push(Part {
                name,
                bytes: content,
            });
        }

        Ok(Self { parts })
    }

    /// パーツのバイト列を取得
    ///
    /// 先頭の`/`の有無は区別しません。
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        let name = name.strip_prefix('/').unwrap_or(name);
        self.parts
            .iter()
            .find(|part| part.name.strip_prefix('/').unwrap_or(&part.name) == name)
            .map(|part| part.bytes.as_slice())
    }

    /// パーツを置き換える（存在しない場合は末尾に追加）
    pub fn set_part(&mut self, name: &str, bytes: Vec<u8>) {
        let normalized = name.strip_prefix('/').unwrap_or(name);
        match self
            .parts
            .iter_mut()
            .find(|part| part.name.strip_prefix('/').unwrap_or(&part.name) == normalized)
        {
            Some(part) => part.bytes = bytes,
            None => self.parts.push(Part {
                name: normalized.to_string(),
                bytes,
            }),
        }
    }

    /// パッケージをZIPバイト列として書き出す
    pub fn write_to_bytes(&self) -> Result<Vec<u8>, OfficeFillError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        for part in &self.parts {
            zip.start_file(part.name.as_str(), options)?;
            zip.write_all(&part.bytes)?;
        }

        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }
}

/// 関係（`.rels`）パーツのパスを求める
///
/// 例: `xl/workbook.xml` -> `xl/_rels/workbook.xml.rels`
pub(crate) fn rels_path_for(part_name: &str) -> String {
    match part_name.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part_name),
    }
}

/// 関係のターゲットをパッケージ内の絶対パス（先頭`/`なし）に解決
///
/// 例: (`xl/workbook.xml`, `worksheets/sheet1.xml`) -> `xl/worksheets/sheet1.xml`
pub(crate) fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };

    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}
