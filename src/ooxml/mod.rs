//! OOXML Module
//!
//! テンプレート（DOCX/XLSX）のXMLパーツを直接書き換えるためのモジュール群。

pub(crate) mod document;
pub(crate) mod worksheet;
pub(crate) mod xml;
