//! Public API Types
//!
//! 公開APIで使用する入力・出力の型を定義するモジュール。

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::OfficeFillError;
use crate::record::{Field, Identity, Record};

/// 生成する帳票の種類
///
/// 各レコードにつき、4種類すべての帳票が1つずつ生成されます。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[non_exhaustive]
pub enum FormKind {
    /// FR-EI-02 機器引き渡し・保証条件（Word）
    ///
    /// 本文中の`(Nombre cliente)`を顧客名に置換し、先頭の表に機器情報を書き込みます。
    Narrative,

    /// FR-EI-04 機器履歴書（Excel）
    LifeRecord,

    /// FR-EI-03 予防保守プロトコル（Excel）
    MaintenanceProtocol,

    /// FR-EI-05 保守スケジュール（Excel）
    ///
    /// 結合セルを考慮して書き込みます。
    Schedule,
}

impl FormKind {
    /// すべての帳票（レコードごとの生成順）
    pub const ALL: [FormKind; 4] = [
        FormKind::Narrative,
        FormKind::LifeRecord,
        FormKind::MaintenanceProtocol,
        FormKind::Schedule,
    ];

    /// 帳票番号（例: `FR-EI-05`）
    pub fn form_id(self) -> &'static str {
        match self {
            FormKind::Narrative => "FR-EI-02",
            FormKind::LifeRecord => "FR-EI-04",
            FormKind::MaintenanceProtocol => "FR-EI-03",
            FormKind::Schedule => "FR-EI-05",
        }
    }

    /// 帳票名
    pub fn title(self) -> &'static str {
        match self {
            FormKind::Narrative => "ENTREGA DE EQUIPO A CONFORMIDAD Y CONDICIONES DE GARANTÍA",
            FormKind::LifeRecord => "HOJA DE VIDA DEL EQUIPO",
            FormKind::MaintenanceProtocol => "PROTOCOLO DE MANTENIMIENTO PREVENTIVO",
            FormKind::Schedule => "CRONOGRAMA DE MANTENIMIENTO",
        }
    }

    /// ファイル拡張子（ドットなし）
    pub fn extension(self) -> &'static str {
        match self {
            FormKind::Narrative => "docx",
            _ => "xlsx",
        }
    }

    /// レコードの識別子から出力ファイル名を生成
    ///
    /// 形式: `{帳票番号} {帳票名}-{顧客}-{機器}.{拡張子}`
    ///
    /// # 使用例
    ///
    /// ```rust
    /// use officefill::{FormKind, Identity};
    ///
    /// let identity = Identity::new("Acme Corp", "Scanner 1", 0);
    /// assert_eq!(
    ///     FormKind::Schedule.file_name(&identity),
    ///     "FR-EI-05 CRONOGRAMA DE MANTENIMIENTO-Acme_Corp-Scanner_1.xlsx"
    /// );
    /// ```
    pub fn file_name(self, identity: &Identity) -> String {
        format!(
            "{} {}-{}-{}.{}",
            self.form_id(),
            self.title(),
            identity.client(),
            identity.equipment(),
            self.extension()
        )
    }

    /// 入力不足のエラーメッセージで使用する名前
    pub(crate) fn input_name(self) -> String {
        format!("{} template", self.form_id())
    }
}

/// 入力表の形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TableFormat {
    /// スプレッドシート（XLSX/XLS/XLSB/ODS、calamineで読み込み）
    Spreadsheet,

    /// 区切りテキスト（CSV）
    Csv,
}

impl TableFormat {
    /// ファイル名の拡張子から形式を判定
    ///
    /// `.csv`（大文字小文字を区別しない）で終わる場合は`Csv`、それ以外は`Spreadsheet`。
    pub fn from_file_name(name: &str) -> Self {
        if name.to_lowercase().ends_with(".csv") {
            TableFormat::Csv
        } else {
            TableFormat::Spreadsheet
        }
    }
}

/// 入力表（ファイル名とバイト列）
#[derive(Debug, Clone)]
pub struct TableSource {
    /// ファイル名（形式の判定に使用）
    pub name: String,
    /// ファイルの内容
    pub bytes: Vec<u8>,
}

impl TableSource {
    /// ファイル名とバイト列から生成
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// ファイルから読み込む
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, OfficeFillError> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { name, bytes })
    }

    /// 入力表の形式
    pub fn format(&self) -> TableFormat {
        TableFormat::from_file_name(&self.name)
    }
}

/// 生成処理への入力（入力表と4つのテンプレート）
///
/// テンプレートは実行中に一度だけ受け取り、レコードごとに新しく展開されます。
#[derive(Debug, Clone, Default)]
pub struct GenerationInput {
    table: Option<TableSource>,
    templates: [Option<Vec<u8>>; 4],
}

impl GenerationInput {
    /// 空の入力を生成
    pub fn new() -> Self {
        Self::default()
    }

    /// 入力表を設定
    pub fn with_table(mut self, table: TableSource) -> Self {
        self.table = Some(table);
        self
    }

    /// 帳票のテンプレートを設定
    pub fn with_template(mut self, kind: FormKind, bytes: Vec<u8>) -> Self {
        self.templates[Self::slot(kind)] = Some(bytes);
        self
    }

    /// 入力表
    pub fn table(&self) -> Option<&TableSource> {
        self.table.as_ref()
    }

    /// 帳票のテンプレート
    pub fn template(&self, kind: FormKind) -> Option<&[u8]> {
        self.templates[Self::slot(kind)].as_deref()
    }

    /// 不足している（未設定または空の）入力の名前
    pub(crate) fn missing_inputs(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.table.as_ref().map_or(true, |t| t.bytes.is_empty()) {
            missing.push("data table".to_string());
        }
        for kind in FormKind::ALL {
            if self.template(kind).map_or(true, |bytes| bytes.is_empty()) {
                missing.push(kind.input_name());
            }
        }
        missing
    }

    fn slot(kind: FormKind) -> usize {
        match kind {
            FormKind::Narrative => 0,
            FormKind::LifeRecord => 1,
            FormKind::MaintenanceProtocol => 2,
            FormKind::Schedule => 3,
        }
    }
}

/// 行ごとの処理結果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    /// すべての帳票を警告なしで生成
    Success,

    /// 帳票は保存されたが、一部のセル・表への書き込みに失敗
    Partial,

    /// 行の処理に失敗（アーカイブは生成されない）
    Failed,
}

/// 1行分の処理レポート
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowReport {
    /// 入力表のデータ行インデックス（0始まり、ヘッダー行を除く）
    pub index: usize,
    /// レコードの識別名（例: `Acme_Corp_Scanner_1`）
    pub identity: String,
    /// 処理結果
    pub status: RowStatus,
    /// 警告・エラーメッセージ
    pub messages: Vec<String>,
}

/// 生成処理全体のレポート
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    /// 集約アーカイブのファイル名（例: `DOCUMENTACION_CLIENTES.zip`）
    pub archive_name: String,
    /// 集約アーカイブの内容
    #[serde(skip)]
    pub archive: Vec<u8>,
    /// 集約アーカイブに含まれるレコードごとのアーカイブ名
    pub entries: Vec<String>,
    /// 行ごとのレポート（入力表の順）
    pub rows: Vec<RowReport>,
}

impl GenerationReport {
    /// 指定した状態の行数
    pub fn count(&self, status: RowStatus) -> usize {
        self.rows.iter().filter(|row| row.status == status).count()
    }

    /// (行インデックス, メッセージ)の一覧
    pub fn messages(&self) -> impl Iterator<Item = (usize, &str)> {
        self.rows
            .iter()
            .flat_map(|row| row.messages.iter().map(move |m| (row.index, m.as_str())))
    }
}

/// 入力表のプレビュー
#[derive(Debug, Clone)]
pub struct TablePreview {
    /// 見出し（前後の空白除去済み）
    pub headers: Vec<String>,
    /// データ行の総数（空行を含む）
    pub total_rows: usize,
    /// 入力表に列が見つからなかったフィールド
    pub missing_fields: Vec<Field>,
    /// 先頭の正規化済みレコード（空行を除く）
    pub records: Vec<Record>,
}
