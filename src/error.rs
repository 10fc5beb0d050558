//! Error Types Module
//!
//! クレート全体で使用する構造化エラー型を定義するモジュール。
//! `thiserror`を使用して、エラーの自動変換とメッセージフォーマットを実現する。

use thiserror::Error;

/// officefillクレート全体で使用するエラー型
///
/// 入力表の読み込み、テンプレート（DOCX/XLSX）の展開・書き換え、
/// ZIPアーカイブの生成中に発生するすべてのエラーを統一的に扱います。
///
/// # エラーの分類
///
/// パイプライン上では、エラーは発生箇所によって次の3段階に扱いが分かれます。
///
/// - 致命的（Fatal）: `MissingInput`や入力表の`Parse`/`Csv`など。行処理の開始前に
///   `Err`として呼び出し元へ返されます。
/// - 行単位（Row-Fatal）: 1行の処理中に発生したすべてのエラー。その行の出力を破棄し、
///   行番号付きのメッセージとしてレポートに記録された後、次の行へ進みます。
/// - フィールド単位（Field-Local）: 1セル・1テーブルへの書き込み失敗。警告として
///   記録され、文書自体は保存されます。
///
/// # 使用例
///
/// ```rust,no_run
/// use officefill::OfficeFillError;
/// use std::fs::File;
///
/// fn open_template(path: &str) -> Result<(), OfficeFillError> {
///     let _file = File::open(path)?; // Ioエラーが自動的に変換される
///     Ok(())
/// }
/// ```
#[derive(Error, Debug)]
pub enum OfficeFillError {
    /// I/O操作中に発生したエラー
    ///
    /// 作業ディレクトリへの書き込み失敗、アーカイブの読み込み失敗など。
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 入力表（スプレッドシート）の解析中に発生したエラー
    ///
    /// `#[from]`属性により、`calamine::Error`から自動的に変換されます。
    #[error("Failed to parse spreadsheet: {0}")]
    Parse(#[from] calamine::Error),

    /// 入力表（CSV）の解析中に発生したエラー
    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    /// UTF-8文字列の変換エラー
    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// ZIPアーカイブの読み書きエラー
    ///
    /// テンプレート（DOCX/XLSXはいずれもZIPコンテナ）の展開や、
    /// 出力アーカイブの生成中に発生したエラーです。
    #[error("ZIP archive error: {0}")]
    Zip(String),

    /// XMLパーツの解析・書き出しエラー
    #[error("XML error: {0}")]
    Xml(String),

    /// 数値の解析エラー
    #[error("Number parse error: {0}")]
    ParseInt(#[from] std::num::ParseIntError),

    /// 設定の検証に失敗したエラー
    ///
    /// `GeneratorBuilder::build()`時に設定を検証し、無効な設定が検出された場合に
    /// 発生します。例えば、アーカイブ名が空の場合やパス区切り文字を含む場合です。
    ///
    /// # 例
    ///
    /// ```rust,no_run
    /// use officefill::{GeneratorBuilder, OfficeFillError};
    ///
    /// let result = GeneratorBuilder::new().with_archive_name("").build();
    ///
    /// match result {
    ///     Err(OfficeFillError::Config(msg)) => {
    ///         println!("設定エラー: {}", msg);
    ///     }
    ///     _ => {}
    /// }
    /// ```
    #[error("Configuration error: {0}")]
    Config(String),

    /// 必須入力（入力表・テンプレート）が不足しているエラー
    ///
    /// 不足している入力の名前がすべて含まれます。
    #[error("Missing required input(s): {}", .0.join(", "))]
    MissingInput(Vec<String>),

    /// A1記法として解釈できないセル座標
    #[error("Invalid cell coordinate: '{0}'")]
    InvalidCoordinate(String),

    /// テンプレートの構造が想定と異なるエラー
    ///
    /// アクティブシートが見つからない、表が存在しないなど。
    #[error("Template error in {form}: {message}")]
    Template {
        /// 帳票の識別子（例: "FR-EI-05"）
        form: String,
        /// エラーの詳細メッセージ
        message: String,
    },

    /// セキュリティ制限に違反したエラー
    ///
    /// ZIP bomb攻撃、パストラバーサル攻撃、ファイルサイズ制限などの
    /// セキュリティ制限に違反した場合に発生します。
    #[error("Security violation: {0}")]
    SecurityViolation(String),
}

impl From<zip::result::ZipError> for OfficeFillError {
    fn from(err: zip::result::ZipError) -> Self {
        OfficeFillError::Zip(err.to_string())
    }
}

impl From<quick_xml::Error> for OfficeFillError {
    fn from(err: quick_xml::Error) -> Self {
        OfficeFillError::Xml(err.to_string())
    }
}

impl OfficeFillError {
    /// 帳票に紐づくテンプレートエラーを生成するヘルパー
    pub(crate) fn template(form: &str, message: impl Into<String>) -> Self {
        OfficeFillError::Template {
            form: form.to_string(),
            message: message.into(),
        }
    }
}
