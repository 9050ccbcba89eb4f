//! Transformation module.
//!
//! - Payload: mapped rows plus settings, ready to post
//! - Results: navigation of the nested score result
//! - Export: flat result rows to CSV text
//! - Pipeline: upload to scored session, with progress logging

pub mod export;
pub mod payload;
pub mod pipeline;
pub mod results;

pub use export::{
    export_csv, export_table, flatten_for_export, render_cell, rows_table, serialize_delimited, write_export, ExportKind,
};
pub use payload::{build_request, grouping_options, map_record};
pub use pipeline::{
    dispatch, finish, prepare_bytes, prepare_file, prepare_parsed, prepare_path, prepare_remote, prepare_upload, score_session,
    CsvInfo, ScoreOutcome, UploadSource,
};
pub use results::ScoreSelection;
