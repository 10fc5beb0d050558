//! Builder Module
//!
//! Fluent Builder APIを提供し、`Generator`インスタンスを段階的に構築する。

use std::path::PathBuf;

use crate::api::{GenerationInput, GenerationReport, TablePreview, TableSource};
use crate::error::OfficeFillError;
use crate::pipeline::{self, Pipeline};
use crate::record::FieldSpec;

/// 集約アーカイブの既定の名前（拡張子なし）
pub const DEFAULT_ARCHIVE_NAME: &str = "DOCUMENTACION_CLIENTES";

/// 生成処理の設定を保持する内部構造体
#[derive(Debug, Clone)]
pub(crate) struct GenerationConfig {
    /// 集約アーカイブの名前（拡張子なし）
    pub archive_base: String,

    /// 作業ディレクトリを作成する場所（Noneの場合はシステムの一時ディレクトリ）
    pub work_dir: Option<PathBuf>,

    /// フィールドと列名の対応
    pub field_spec: FieldSpec,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            archive_base: DEFAULT_ARCHIVE_NAME.to_string(),
            work_dir: None,
            field_spec: FieldSpec::default(),
        }
    }
}

impl GenerationConfig {
    /// 集約アーカイブのファイル名
    pub fn archive_file_name(&self) -> String {
        format!("{}.zip", self.archive_base)
    }
}

/// Fluent Builder APIを提供する構造体
///
/// `Generator`インスタンスを段階的に構築するためのビルダーです。
/// すべての設定項目にデフォルト値が設定されており、必要な設定のみをオーバーライドできます。
///
/// # 使用例
///
/// ```rust,no_run
/// use officefill::GeneratorBuilder;
///
/// # fn main() -> Result<(), officefill::OfficeFillError> {
/// let generator = GeneratorBuilder::new()
///     .with_archive_name("CLIENTES_2024")
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct GeneratorBuilder {
    /// 内部設定（構築中）
    config: GenerationConfig,
}

impl Default for GeneratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GeneratorBuilder {
    /// デフォルト設定を持つビルダーインスタンスを生成する
    ///
    /// # デフォルト設定
    ///
    /// - 集約アーカイブ名: `DOCUMENTACION_CLIENTES`
    /// - 作業ディレクトリ: システムの一時ディレクトリ
    /// - 列名: 標準の列名（`CLIENTE`、`NOMBRE DEL EQUIPO`など）
    pub fn new() -> Self {
        Self {
            config: GenerationConfig::default(),
        }
    }

    /// 集約アーカイブの名前を指定する
    ///
    /// 末尾の`.zip`は省略できます（指定した場合は取り除かれます）。
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use officefill::GeneratorBuilder;
    ///
    /// let builder = GeneratorBuilder::new().with_archive_name("CLIENTES_2024.zip");
    /// ```
    pub fn with_archive_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        let trimmed = name.trim();
        self.config.archive_base = trimmed
            .strip_suffix(".zip")
            .unwrap_or(trimmed)
            .to_string();
        self
    }

    /// 作業ディレクトリを作成する場所を指定する
    ///
    /// 生成中の帳票とレコードごとのアーカイブは、この場所に作成される
    /// 一時ディレクトリに書き出され、処理の終了時に削除されます。
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = Some(dir.into());
        self
    }

    /// フィールドと入力表の列名の対応を指定する
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use officefill::{Field, FieldSpec, GeneratorBuilder};
    ///
    /// let builder = GeneratorBuilder::new()
    ///     .with_field_spec(FieldSpec::new().with_columns(Field::Phone, ["TELEFONO"]));
    /// ```
    pub fn with_field_spec(mut self, spec: FieldSpec) -> Self {
        self.config.field_spec = spec;
        self
    }

    /// 設定を検証し、`Generator`インスタンスを生成する
    ///
    /// # 戻り値
    ///
    /// * `Ok(Generator)`: 設定が有効な場合
    /// * `Err(OfficeFillError::Config)`: 設定が無効な場合
    ///
    /// # 発生し得るエラー
    ///
    /// * `OfficeFillError::Config(String)`: 設定の検証に失敗した場合
    ///   * アーカイブ名が空、またはパス区切り文字を含む
    ///   * 作業ディレクトリが存在しない、またはディレクトリではない
    ///   * 列名が1つも指定されていないフィールドがある
    pub fn build(self) -> Result<Generator, OfficeFillError> {
        // 1. アーカイブ名の検証
        let name = &self.config.archive_base;
        if name.is_empty() {
            return Err(OfficeFillError::Config(
                "Archive name must not be empty".to_string(),
            ));
        }
        if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
            return Err(OfficeFillError::Config(format!(
                "Archive name must be a plain file name: '{}'",
                name
            )));
        }

        // 2. 作業ディレクトリの検証
        if let Some(dir) = &self.config.work_dir {
            if !dir.is_dir() {
                return Err(OfficeFillError::Config(format!(
                    "Work directory does not exist or is not a directory: {}",
                    dir.display()
                )));
            }
        }

        // 3. 列名の検証
        let unmapped = self.config.field_spec.unmapped_fields();
        if !unmapped.is_empty() {
            return Err(OfficeFillError::Config(format!(
                "Fields without column names: {:?}",
                unmapped
            )));
        }

        Ok(Generator::new(self.config))
    }
}

/// 帳票生成処理のファサード
///
/// 入力表の各行について4種類の帳票を生成し、集約アーカイブを作成する
/// メインエントリーポイントです。
///
/// # 使用例
///
/// ```rust,no_run
/// use officefill::{FormKind, GenerationInput, GeneratorBuilder, TableSource};
///
/// # fn main() -> Result<(), officefill::OfficeFillError> {
/// let generator = GeneratorBuilder::new().build()?;
/// let input = GenerationInput::new()
///     .with_table(TableSource::from_path("PLANTILLA_DATOS.xlsx")?)
///     .with_template(FormKind::Narrative, std::fs::read("FR-EI-02.docx")?)
///     .with_template(FormKind::LifeRecord, std::fs::read("FR-EI-04.xlsx")?)
///     .with_template(FormKind::MaintenanceProtocol, std::fs::read("FR-EI-03.xlsx")?)
///     .with_template(FormKind::Schedule, std::fs::read("FR-EI-05.xlsx")?);
///
/// let report = generator.generate(&input)?;
/// std::fs::write(&report.archive_name, &report.archive)?;
/// for (row, message) in report.messages() {
///     eprintln!("row {}: {}", row, message);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Generator {
    /// 生成設定
    config: GenerationConfig,
}

impl Generator {
    pub(crate) fn new(config: GenerationConfig) -> Self {
        Self { config }
    }

    /// 帳票を生成して集約アーカイブを作成
    ///
    /// # 戻り値
    ///
    /// * `Ok(GenerationReport)` - 集約アーカイブと行ごとのレポート。
    ///   行単位の失敗はレポートに記録され、処理全体は失敗しません
    /// * `Err(OfficeFillError::MissingInput)` - 入力表またはテンプレートが不足している場合
    /// * `Err(OfficeFillError)` - 入力表を読み込めない場合など、行の処理を始められない場合
    pub fn generate(&self, input: &GenerationInput) -> Result<GenerationReport, OfficeFillError> {
        Pipeline::new(&self.config).run(input)
    }

    /// 入力表の先頭`limit`件のレコードを正規化して返す
    pub fn preview(
        &self,
        table: &TableSource,
        limit: usize,
    ) -> Result<TablePreview, OfficeFillError> {
        pipeline::preview(&self.config, table, limit)
    }

    /// 集約アーカイブのファイル名
    pub fn archive_file_name(&self) -> String {
        self.config.archive_file_name()
    }
}
