//! Security Module
//!
//! セキュリティ対策を実装するモジュール。
//! テンプレート（DOCX/XLSX）はZIPコンテナとして受け取るため、
//! ZIP bomb攻撃、パストラバーサル攻撃などへの対策を提供します。

/// セキュリティ設定
///
/// テンプレートパッケージ展開時のセキュリティ制限を定義します。
#[derive(Debug, Clone)]
pub(crate) struct SecurityConfig {
    /// 展開後の最大サイズ（バイト）
    /// デフォルト: 512MB (536_870_912 bytes)
    pub max_decompressed_size: u64,
    /// ZIPアーカイブ内の最大ファイル数
    /// デフォルト: 10000
    pub max_file_count: usize,
    /// 単一ファイルの最大サイズ（バイト）
    /// デフォルト: 100MB (104_857_600 bytes)
    pub max_file_size: u64,
    /// 入力ファイルの最大サイズ（バイト）
    /// デフォルト: 256MB (268_435_456 bytes)
    pub max_input_file_size: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_decompressed_size: 536_870_912, // 512MB
            max_file_count: 10_000,
            max_file_size: 104_857_600,       // 100MB
            max_input_file_size: 268_435_456, // 256MB
        }
    }
}

/// ファイルパスの検証
///
/// パストラバーサル攻撃を防ぐため、ZIPエントリのパスを検証します。
///
/// # 戻り値
///
/// * `Ok(())` - パスが安全な場合
/// * `Err(String)` - パスが危険な場合（`..`や絶対パスを含む）
pub(crate) fn validate_zip_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("Empty path is not allowed".to_string());
    }

    // `/`で始まるパスと、ドライブ文字付きのパス（`D:\`、`e:/`など）
    if path.starts_with('/') || has_drive_prefix(path) {
        return Err(format!("Absolute path is not allowed: {}", path));
    }

    // `..`セグメントを拒否（ディレクトリトラバーサル攻撃）
    if path.split('/').any(|segment| segment == "..") {
        return Err(format!("Path traversal detected: {}", path));
    }

    if path.contains('\\') {
        return Err(format!("Backslash in path is not allowed: {}", path));
    }

    Ok(())
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// 出力ファイル名の一部として安全な文字列に変換
///
/// レコード由来の値（顧客名・機器名）がファイル名に埋め込まれるため、
/// パス区切り文字を`_`に置き換えて作業ディレクトリ外への書き込みを防ぎます。
/// Windowsのファイル名に使えない文字（`<>:"|?*`）と制御文字も`_`になります。
pub(crate) fn sanitize_file_component(text: &str) -> String {
    text.chars()
        .map(|c| if is_reserved_in_file_name(c) { '_' } else { c })
        .collect()
}

fn is_reserved_in_file_name(c: char) -> bool {
    matches!(c, '/' | '\\' | '<' | '>' | ':' | '"' | '|' | '?' | '*') || c.is_control()
}
