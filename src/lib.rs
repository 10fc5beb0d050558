//! officefill - Fill client/equipment document templates from a data table
//!
//! This crate reads a table of client and equipment records (XLSX/XLS/ODS or CSV) and,
//! for each row, fills a fixed set of document templates: one Word template (FR-EI-02)
//! and three Excel templates (FR-EI-04, FR-EI-03, FR-EI-05). The filled documents of
//! each row are zipped into a per-record archive, and all per-record archives are
//! bundled into one aggregate archive.
//!
//! Templates are edited in place at the XML level, so styles, merged cells, images and
//! print settings of the templates are kept as they are.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use officefill::{FormKind, GenerationInput, GeneratorBuilder, TableSource};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Create a generator with default settings
//!     let generator = GeneratorBuilder::new().build()?;
//!
//!     // The data table plus the four templates
//!     let input = GenerationInput::new()
//!         .with_table(TableSource::from_path("PLANTILLA_DATOS.xlsx")?)
//!         .with_template(FormKind::Narrative, std::fs::read("FR-EI-02.docx")?)
//!         .with_template(FormKind::LifeRecord, std::fs::read("FR-EI-04.xlsx")?)
//!         .with_template(FormKind::MaintenanceProtocol, std::fs::read("FR-EI-03.xlsx")?)
//!         .with_template(FormKind::Schedule, std::fs::read("FR-EI-05.xlsx")?);
//!
//!     // Generate every record and write the aggregate archive
//!     let report = generator.generate(&input)?;
//!     std::fs::write(&report.archive_name, &report.archive)?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Custom Configuration
//!
//! ```rust,no_run
//! use officefill::{Field, FieldSpec, GeneratorBuilder};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let generator = GeneratorBuilder::new()
//!         .with_archive_name("CLIENTES_2024")  // writes CLIENTES_2024.zip
//!         .with_work_dir("/var/tmp")  // scratch space for per-record archives
//!         .with_field_spec(FieldSpec::new().with_columns(Field::Phone, ["TELEFONO"]))
//!         .build()?;
//!     # let _ = generator;
//!     Ok(())
//! }
//! ```
//!
//! # Row Results
//!
//! Once rows are being processed, a run always completes. Each row is reported as
//! `Success`, `Partial` (saved, but some cells or the Word table could not be filled)
//! or `Failed` (no archive for that row):
//!
//! ```rust,no_run
//! use officefill::{GenerationInput, GeneratorBuilder, RowStatus};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let generator = GeneratorBuilder::new().build()?;
//! # let input = GenerationInput::new();
//! let report = generator.generate(&input)?;
//! for row in report.rows.iter().filter(|r| r.status == RowStatus::Failed) {
//!     eprintln!("row {} ({}) failed: {:?}", row.index, row.identity, row.messages);
//! }
//! # Ok(())
//! # }
//! ```

mod api;
mod archive;
mod builder;
mod error;
mod forms;
mod ooxml;
mod parser;
mod pipeline;
mod record;
mod security;
mod types;

// 公開API
pub use api::{
    FormKind, GenerationInput, GenerationReport, RowReport, RowStatus, TableFormat,
    TablePreview, TableSource,
};
pub use builder::{Generator, GeneratorBuilder, DEFAULT_ARCHIVE_NAME};
pub use error::OfficeFillError;
pub use record::{Field, FieldSpec, Identity, Record};
