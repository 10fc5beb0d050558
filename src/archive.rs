//! Archive Module
//!
//! 生成した帳票をレコードごとのZIPアーカイブにまとめ、
//! 最後にすべてのアーカイブを1つの集約アーカイブにまとめるモジュール。

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::OfficeFillError;
use crate::forms::GeneratedDocument;
use crate::record::Identity;

/// レコードごとのアーカイブを作業ディレクトリに作成する
///
/// 帳票はいったん`{root}/{識別名}/`に書き出され、`{root}/{識別名}.zip`に
/// まとめられた後、フォルダごと削除されます。
#[derive(Debug)]
pub(crate) struct RecordPackager {
    root: PathBuf,
}

impl RecordPackager {
    /// 作業ディレクトリを作成して生成
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, OfficeFillError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// レコードの帳票をアーカイブにまとめる
    ///
    /// 同じ識別名のアーカイブが既にある場合は上書きします。
    ///
    /// # 戻り値
    ///
    /// 作成したアーカイブのパス
    pub fn pack(
        &self,
        identity: &Identity,
        documents: &[GeneratedDocument],
    ) -> Result<PathBuf, OfficeFillError> {
        let folder = self.root.join(identity.name());
        let archive_path = self.root.join(format!("{}.zip", identity.name()));

        let result = write_documents(&folder, documents)
            .and_then(|_| zip_directory(&folder, &archive_path));

        // 失敗した場合も作業フォルダは残さない
        if folder.exists() {
            fs::remove_dir_all(&folder)?;
        }
        result?;

        debug!(
            identity = %identity,
            archive = %archive_path.display(),
            documents = documents.len(),
            "packed record archive"
        );
        Ok(archive_path)
    }
}

fn write_documents(folder: &Path, documents: &[GeneratedDocument]) -> Result<(), OfficeFillError> {
    fs::create_dir_all(folder)?;
    for document in documents {
        fs::write(folder.join(&document.file_name), &document.bytes)?;
        debug!(
            form = document.kind.form_id(),
            file = %document.file_name,
            bytes = document.bytes.len(),
            "wrote document"
        );
    }
    Ok(())
}

/// フォルダ直下のファイルをファイル名順にZIPへ書き込む
fn zip_directory(folder: &Path, archive_path: &Path) -> Result<(), OfficeFillError> {
    let mut files = BTreeMap::new();
    for entry in fs::read_dir(folder)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.insert(entry.file_name().to_string_lossy().into_owned(), entry.path());
        }
    }

    let mut zip = ZipWriter::new(File::create(archive_path)?);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, path) in &files {
        zip.start_file(name.as_str(), options)?;
        zip.write_all(&fs::read(path)?)?;
    }
    zip.finish()?;
    Ok(())
}

/// レコードごとのアーカイブを集約アーカイブにまとめる
///
/// 同じファイル名のアーカイブ（識別名の重複）は1つのエントリになります。
/// エントリはファイル名順に並びます。
///
/// # 戻り値
///
/// * `Ok((bytes, entries))` - 集約アーカイブの内容と、含まれるエントリ名
pub(crate) fn pack_aggregate(
    archives: &[PathBuf],
) -> Result<(Vec<u8>, Vec<String>), OfficeFillError> {
    let mut entries = BTreeMap::new();
    for path in archives {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                OfficeFillError::Config(format!(
                    "Archive path has no file name: {}",
                    path.display()
                ))
            })?;
        entries.entry(name).or_insert_with(|| path.clone());
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, path) in &entries {
        zip.start_file(name.as_str(), options)?;
        zip.write_all(&fs::read(path)?)?;
    }
    let bytes = zip.finish()?.into_inner();

    Ok((bytes, entries.into_keys().collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::FormKind;
    use std::io::Read;
    use zip::ZipArchive;

    fn document(name: &str, content: &[u8]) -> GeneratedDocument {
        GeneratedDocument {
            kind: FormKind::LifeRecord,
            file_name: name.to_string(),
            bytes: content.to_vec(),
            warnings: Vec::new(),
        }
    }

    fn entry_names(bytes: &[u8]) -> Vec<String> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn test_pack_record_removes_folder() {
        let dir = tempfile::tempdir().unwrap();
        let packager = RecordPackager::new(dir.path().join("OUT")).unwrap();
        let identity = Identity::new("Acme Corp", "Scanner 1", 0);

        let path = packager
            .pack(&identity, &[document("b.xlsx", b"two"), document("a.xlsx", b"one")])
            .unwrap();

        assert_eq!(path.file_name().unwrap(), "Acme_Corp_Scanner_1.zip");
        assert!(path.exists());
        assert!(!dir.path().join("OUT").join("Acme_Corp_Scanner_1").exists());

        let bytes = fs::read(&path).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);
        let mut first = archive.by_index(0).unwrap();
        assert_eq!(first.name(), "a.xlsx");
        let mut content = String::new();
        first.read_to_string(&mut content).unwrap();
        assert_eq!(content, "one");
    }

    #[test]
    fn test_pack_record_overwrites_duplicate_identity() {
        let dir = tempfile::tempdir().unwrap();
        let packager = RecordPackager::new(dir.path()).unwrap();
        let identity = Identity::new("Acme", "X", 0);

        packager.pack(&identity, &[document("old.xlsx", b"1")]).unwrap();
        let path = packager.pack(&identity, &[document("new.xlsx", b"2")]).unwrap();

        assert_eq!(entry_names(&fs::read(path).unwrap()), vec!["new.xlsx"]);
    }

    #[test]
    fn test_aggregate_deduplicates_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let packager = RecordPackager::new(dir.path()).unwrap();

        let b = packager
            .pack(&Identity::new("B", "1", 0), &[document("x.xlsx", b"x")])
            .unwrap();
        let a = packager
            .pack(&Identity::new("A", "1", 1), &[document("y.xlsx", b"y")])
            .unwrap();

        let (bytes, entries) = pack_aggregate(&[b.clone(), a, b]).unwrap();
        assert_eq!(entries, vec!["A_1.zip", "B_1.zip"]);
        assert_eq!(entry_names(&bytes), vec!["A_1.zip", "B_1.zip"]);
    }

    #[test]
    fn test_aggregate_of_nothing_is_empty_zip() {
        let (bytes, entries) = pack_aggregate(&[]).unwrap();
        assert!(entries.is_empty());
        assert_eq!(ZipArchive::new(Cursor::new(bytes)).unwrap().len(), 0);
    }
}
