//! Pipeline Module
//!
//! 入力の検証から集約アーカイブの作成までを順に実行するモジュール。
//!
//! 処理は`Idle → Validating → Loading → PerRecordProcessing → Aggregating → Done`の順に進みます。
//! 行単位の処理で発生したエラーは行の境界で捕捉され、その行を`Failed`として記録した上で
//! 次の行の処理を続けます。

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::api::{FormKind, GenerationInput, GenerationReport, RowReport, RowStatus, TablePreview};
use crate::archive::{pack_aggregate, RecordPackager};
use crate::builder::GenerationConfig;
use crate::error::OfficeFillError;
use crate::forms::{instantiate, GeneratedDocument};
use crate::parser::table::DataTable;
use crate::record::{normalize, HeaderIndex, Record};

/// パイプラインの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Idle,
    Validating,
    Loading,
    PerRecordProcessing,
    Aggregating,
    Done,
}

/// 1回の生成処理
pub(crate) struct Pipeline<'a> {
    config: &'a GenerationConfig,
    stage: Stage,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a GenerationConfig) -> Self {
        Self {
            config,
            stage: Stage::Idle,
        }
    }

    /// 現在の状態
    #[allow(dead_code)]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn enter(&mut self, stage: Stage) {
        debug!(from = ?self.stage, to = ?stage, "pipeline stage");
        self.stage = stage;
    }

    /// 生成処理を実行
    ///
    /// # 戻り値
    ///
    /// * `Ok(GenerationReport)` - 行単位の処理が始まった場合は、行の失敗があっても常に`Ok`
    /// * `Err(OfficeFillError::MissingInput)` - 入力表またはテンプレートが不足している場合
    /// * `Err(OfficeFillError)` - 入力表の読み込み・作業ディレクトリの作成・集約に失敗した場合
    pub fn run(&mut self, input: &GenerationInput) -> Result<GenerationReport, OfficeFillError> {
        self.enter(Stage::Validating);
        let missing = input.missing_inputs();
        if !missing.is_empty() {
            return Err(OfficeFillError::MissingInput(missing));
        }
        let (table_source, templates) = match (input.table(), collect_templates(input)) {
            (Some(table), Some(templates)) => (table, templates),
            _ => return Err(OfficeFillError::MissingInput(input.missing_inputs())),
        };

        self.enter(Stage::Loading);
        let table = DataTable::read(table_source)?;
        let headers = HeaderIndex::new(table.headers());
        let missing_fields = headers.missing_fields(&self.config.field_spec);
        if !missing_fields.is_empty() {
            warn!(fields = ?missing_fields, "columns not found in table; fields will be empty");
        }
        info!(
            table = %table_source.name,
            rows = table.rows().len(),
            "loaded input table"
        );

        let work_dir = match &self.config.work_dir {
            Some(dir) => tempfile::Builder::new().prefix("officefill-").tempdir_in(dir)?,
            None => tempfile::Builder::new().prefix("officefill-").tempdir()?,
        };
        let packager = RecordPackager::new(work_dir.path().join(&self.config.archive_base))?;

        self.enter(Stage::PerRecordProcessing);
        let mut archives: Vec<PathBuf> = Vec::new();
        let mut rows = Vec::new();
        for (index, row) in table.rows().iter().enumerate() {
            let record = normalize(index, row, &headers, &self.config.field_spec);
            let identity = record.identity().name().to_string();

            match process_record(&record, &templates, &packager) {
                Ok((archive, warnings)) => {
                    let status = if warnings.is_empty() {
                        RowStatus::Success
                    } else {
                        RowStatus::Partial
                    };
                    debug!(row = index, identity = %identity, ?status, "row processed");
                    archives.push(archive);
                    rows.push(RowReport {
                        index,
                        identity,
                        status,
                        messages: warnings,
                    });
                }
                Err(e) => {
                    warn!(row = index, identity = %identity, error = %e, "row failed");
                    rows.push(RowReport {
                        index,
                        identity,
                        status: RowStatus::Failed,
                        messages: vec![e.to_string()],
                    });
                }
            }
        }

        self.enter(Stage::Aggregating);
        let (archive, entries) = pack_aggregate(&archives)?;

        self.enter(Stage::Done);
        let report = GenerationReport {
            archive_name: self.config.archive_file_name(),
            archive,
            entries,
            rows,
        };
        info!(
            archive = %report.archive_name,
            entries = report.entries.len(),
            succeeded = report.count(RowStatus::Success),
            partial = report.count(RowStatus::Partial),
            failed = report.count(RowStatus::Failed),
            "generation finished"
        );

        Ok(report)
    }
}

fn collect_templates(input: &GenerationInput) -> Option<Vec<(FormKind, &[u8])>> {
    FormKind::ALL
        .iter()
        .map(|kind| input.template(*kind).map(|bytes| (*kind, bytes)))
        .collect()
}

/// 1レコード分の帳票を生成してアーカイブにまとめる
fn process_record(
    record: &Record,
    templates: &[(FormKind, &[u8])],
    packager: &RecordPackager,
) -> Result<(PathBuf, Vec<String>), OfficeFillError> {
    let documents = templates
        .iter()
        .map(|(kind, template)| instantiate(*kind, template, record))
        .collect::<Result<Vec<GeneratedDocument>, _>>()?;

    let warnings = documents
        .iter()
        .flat_map(|document| document.warnings.iter().cloned())
        .collect();

    let archive = packager.pack(record.identity(), &documents)?;
    Ok((archive, warnings))
}

/// 入力表の先頭行を正規化して返す
pub(crate) fn preview(
    config: &GenerationConfig,
    input: &crate::api::TableSource,
    limit: usize,
) -> Result<TablePreview, OfficeFillError> {
    let table = DataTable::read(input)?;
    let headers = HeaderIndex::new(table.headers());

    let records = table
        .rows()
        .iter()
        .enumerate()
        .take(limit)
        .map(|(index, row)| normalize(index, row, &headers, &config.field_spec))
        .collect();

    Ok(TablePreview {
        headers: table.headers().to_vec(),
        total_rows: table.rows().len(),
        missing_fields: headers.missing_fields(&config.field_spec),
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::TableSource;

    #[test]
    fn test_missing_inputs_fail_in_validation() {
        let config = GenerationConfig::default();
        let mut pipeline = Pipeline::new(&config);
        let input = GenerationInput::new()
            .with_table(TableSource::new("datos.csv", b"CLIENTE\nAcme\n".to_vec()));

        match pipeline.run(&input) {
            Err(OfficeFillError::MissingInput(names)) => assert_eq!(names.len(), 4),
            other => panic!("Expected MissingInput, got {:?}", other),
        }
        assert_eq!(pipeline.stage(), Stage::Validating);
    }

    #[test]
    fn test_unreadable_table_is_fatal() {
        let config = GenerationConfig::default();
        let mut pipeline = Pipeline::new(&config);
        let mut input =
            GenerationInput::new().with_table(TableSource::new("datos.xlsx", b"junk".to_vec()));
        for kind in FormKind::ALL {
            input = input.with_template(kind, b"PK".to_vec());
        }

        assert!(pipeline.run(&input).is_err());
        assert_eq!(pipeline.stage(), Stage::Loading);
    }

    #[test]
    fn test_broken_templates_fail_rows_but_run_completes() {
        let config = GenerationConfig::default();
        let mut pipeline = Pipeline::new(&config);
        let mut input = GenerationInput::new().with_table(TableSource::new(
            "datos.csv",
            b"CLIENTE,NOMBRE DEL EQUIPO\nAcme,Scanner\n,\nBeta,Lens\n".to_vec(),
        ));
        for kind in FormKind::ALL {
            input = input.with_template(kind, b"not a zip".to_vec());
        }

        let report = pipeline.run(&input).unwrap();
        assert_eq!(pipeline.stage(), Stage::Done);
        // 空行も1件のレコードとして処理される
        assert_eq!(report.rows.len(), 3);
        assert_eq!(report.rows[1].index, 1);
        assert_eq!(report.rows[1].identity, "fila_1");
        assert!(report.rows.iter().all(|r| r.status == RowStatus::Failed));
        assert!(report.entries.is_empty());
        assert_eq!(report.archive_name, "DOCUMENTACION_CLIENTES.zip");
    }

    #[test]
    fn test_preview_keeps_blank_rows_and_limits() {
        let config = GenerationConfig::default();
        let source = TableSource::new(
            "datos.csv",
            b"CLIENTE,SERIE\nA,1\n,\nB,2\nC,3\n".to_vec(),
        );

        let preview = preview(&config, &source, 2).unwrap();
        assert_eq!(preview.total_rows, 4);
        assert_eq!(preview.records.len(), 2);
        assert_eq!(preview.records[0].client(), "A");
        assert_eq!(preview.records[1].client(), "");
        assert_eq!(preview.records[1].identity().name(), "fila_1");
        assert!(!preview.missing_fields.is_empty());
    }
}
