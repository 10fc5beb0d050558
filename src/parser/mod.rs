//! Parser Module
//!
//! 入力ファイルの読み込みを担当するモジュール群。
//! 入力表はcalamine/csvで、テンプレートパッケージはzipで展開します。

pub(crate) mod package;
pub(crate) mod table;
