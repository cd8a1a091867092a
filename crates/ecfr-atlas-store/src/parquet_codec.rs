// SPDX-License-Identifier: Apache-2.0

//! Typed parquet row groups for the four archive schemas.
//!
//! Each writer encodes a complete record batch into memory and returns the
//! closed file bytes; the caller commits them as one object, which is what
//! makes archive writes whole-object.

use std::sync::Arc;

use arrow_array::{
    Array, BooleanArray, Float64Array, Int64Array, RecordBatch, StringArray, UInt32Array,
    UInt64Array,
};
use arrow_schema::{DataType, Field, Schema};
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;

use ecfr_atlas_core::{EtlError, EtlErrorCode, Result};
use ecfr_atlas_model::{AgencyLsa, Section, SectionDiff, Summary, SummaryKind};

fn encode_err(e: impl std::fmt::Display) -> EtlError {
    EtlError::new(EtlErrorCode::Persistence, format!("parquet encode: {e}"))
}

fn decode_err(e: impl std::fmt::Display) -> EtlError {
    EtlError::new(EtlErrorCode::InvalidData, format!("parquet decode: {e}"))
}

fn write_batch(batch: RecordBatch) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut out, batch.schema(), None).map_err(encode_err)?;
    writer.write(&batch).map_err(encode_err)?;
    writer.close().map_err(encode_err)?;
    Ok(out)
}

fn read_batches(bytes: Vec<u8>) -> Result<Vec<RecordBatch>> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(bytes))
        .map_err(decode_err)?
        .build()
        .map_err(decode_err)?;
    reader
        .into_iter()
        .map(|b| b.map_err(decode_err))
        .collect()
}

fn str_col<'a>(batch: &'a RecordBatch, idx: usize, name: &str) -> Result<&'a StringArray> {
    batch
        .column(idx)
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| decode_err(format!("column {name} is not utf8")))
}

fn u32_col<'a>(batch: &'a RecordBatch, idx: usize, name: &str) -> Result<&'a UInt32Array> {
    batch
        .column(idx)
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| decode_err(format!("column {name} is not u32")))
}

fn u64_col<'a>(batch: &'a RecordBatch, idx: usize, name: &str) -> Result<&'a UInt64Array> {
    batch
        .column(idx)
        .as_any()
        .downcast_ref::<UInt64Array>()
        .ok_or_else(|| decode_err(format!("column {name} is not u64")))
}

fn captured_at(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| decode_err(format!("captured_at: {e}")))
}

// ── sections ────────────────────────────────────────────────────────────

fn sections_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("title", DataType::Utf8, false),
        Field::new("chapter", DataType::Utf8, false),
        Field::new("text", DataType::Utf8, false),
        Field::new("rev_date", DataType::Utf8, true),
        Field::new("checksum", DataType::Utf8, false),
        Field::new("word_count", DataType::UInt32, false),
        Field::new("def_count", DataType::UInt32, false),
        Field::new("xref_count", DataType::UInt32, false),
        Field::new("modal_count", DataType::UInt32, false),
        Field::new("rscs_raw", DataType::UInt32, false),
        Field::new("rscs_per_1k", DataType::Float64, false),
        Field::new("snapshot_date", DataType::Utf8, false),
    ]))
}

pub fn encode_sections(rows: &[Section]) -> Result<Vec<u8>> {
    let rev_dates: Vec<Option<String>> = rows
        .iter()
        .map(|r| r.rev_date.map(|d| d.to_string()))
        .collect();
    let batch = RecordBatch::try_new(
        sections_schema(),
        vec![
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.id.as_str()))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.title.as_str()))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.chapter.as_str()))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.text.as_str()))),
            Arc::new(rev_dates.into_iter().collect::<StringArray>()),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.checksum.as_str()))),
            Arc::new(UInt32Array::from_iter_values(rows.iter().map(|r| r.word_count))),
            Arc::new(UInt32Array::from_iter_values(rows.iter().map(|r| r.def_count))),
            Arc::new(UInt32Array::from_iter_values(rows.iter().map(|r| r.xref_count))),
            Arc::new(UInt32Array::from_iter_values(rows.iter().map(|r| r.modal_count))),
            Arc::new(UInt32Array::from_iter_values(rows.iter().map(|r| r.rscs_raw))),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.rscs_per_1k))),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.snapshot_date.as_str()),
            )),
        ],
    )
    .map_err(encode_err)?;
    write_batch(batch)
}

pub fn decode_sections(bytes: Vec<u8>) -> Result<Vec<Section>> {
    let mut rows = Vec::new();
    for batch in read_batches(bytes)? {
        let id = str_col(&batch, 0, "id")?;
        let title = str_col(&batch, 1, "title")?;
        let chapter = str_col(&batch, 2, "chapter")?;
        let text = str_col(&batch, 3, "text")?;
        let rev_date = str_col(&batch, 4, "rev_date")?;
        let checksum = str_col(&batch, 5, "checksum")?;
        let word_count = u32_col(&batch, 6, "word_count")?;
        let def_count = u32_col(&batch, 7, "def_count")?;
        let xref_count = u32_col(&batch, 8, "xref_count")?;
        let modal_count = u32_col(&batch, 9, "modal_count")?;
        let rscs_raw = u32_col(&batch, 10, "rscs_raw")?;
        let rscs_per_1k = batch
            .column(11)
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| decode_err("column rscs_per_1k is not f64"))?;
        let snapshot_date = str_col(&batch, 12, "snapshot_date")?;

        for i in 0..batch.num_rows() {
            let rev = if rev_date.is_null(i) {
                None
            } else {
                Some(
                    NaiveDate::parse_from_str(rev_date.value(i), "%Y-%m-%d")
                        .map_err(|e| decode_err(format!("rev_date: {e}")))?,
                )
            };
            rows.push(Section {
                id: id.value(i).to_string(),
                title: title.value(i).to_string(),
                chapter: chapter.value(i).to_string(),
                text: text.value(i).to_string(),
                rev_date: rev,
                checksum: checksum.value(i).to_string(),
                word_count: word_count.value(i),
                def_count: def_count.value(i),
                xref_count: xref_count.value(i),
                modal_count: modal_count.value(i),
                rscs_raw: rscs_raw.value(i),
                rscs_per_1k: rscs_per_1k.value(i),
                snapshot_date: snapshot_date.value(i).to_string(),
            });
        }
    }
    Ok(rows)
}

// ── diffs ───────────────────────────────────────────────────────────────

fn diffs_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("section_id", DataType::Utf8, false),
        Field::new("delta_word_count", DataType::Int64, false),
        Field::new("changed", DataType::Boolean, false),
    ]))
}

pub fn encode_diffs(rows: &[SectionDiff]) -> Result<Vec<u8>> {
    let batch = RecordBatch::try_new(
        diffs_schema(),
        vec![
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.section_id.as_str()),
            )),
            Arc::new(Int64Array::from_iter_values(
                rows.iter().map(|r| r.delta_word_count),
            )),
            Arc::new(BooleanArray::from(
                rows.iter().map(|r| r.changed).collect::<Vec<_>>(),
            )),
        ],
    )
    .map_err(encode_err)?;
    write_batch(batch)
}

pub fn decode_diffs(bytes: Vec<u8>) -> Result<Vec<SectionDiff>> {
    let mut rows = Vec::new();
    for batch in read_batches(bytes)? {
        let section_id = str_col(&batch, 0, "section_id")?;
        let delta = batch
            .column(1)
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(|| decode_err("column delta_word_count is not i64"))?;
        let changed = batch
            .column(2)
            .as_any()
            .downcast_ref::<BooleanArray>()
            .ok_or_else(|| decode_err("column changed is not bool"))?;
        for i in 0..batch.num_rows() {
            rows.push(SectionDiff {
                section_id: section_id.value(i).to_string(),
                delta_word_count: delta.value(i),
                changed: changed.value(i),
            });
        }
    }
    Ok(rows)
}

// ── agency LSA ──────────────────────────────────────────────────────────

fn agency_lsa_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("agency_id", DataType::Utf8, false),
        Field::new("agency_name", DataType::Utf8, false),
        Field::new("proposed_rules", DataType::UInt64, false),
        Field::new("final_rules", DataType::UInt64, false),
        Field::new("notices", DataType::UInt64, false),
        Field::new("total_documents", DataType::UInt64, false),
        Field::new("snapshot_date", DataType::Utf8, false),
        Field::new("captured_at", DataType::Utf8, false),
        Field::new("source_hint", DataType::Utf8, false),
    ]))
}

pub fn encode_agency_lsa(rows: &[AgencyLsa]) -> Result<Vec<u8>> {
    let captured: Vec<String> = rows.iter().map(|r| r.captured_at.to_rfc3339()).collect();
    let batch = RecordBatch::try_new(
        agency_lsa_schema(),
        vec![
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.agency_id.as_str()))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.agency_name.as_str()))),
            Arc::new(UInt64Array::from_iter_values(rows.iter().map(|r| r.proposed_rules))),
            Arc::new(UInt64Array::from_iter_values(rows.iter().map(|r| r.final_rules))),
            Arc::new(UInt64Array::from_iter_values(rows.iter().map(|r| r.notices))),
            Arc::new(UInt64Array::from_iter_values(rows.iter().map(|r| r.total_documents))),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.snapshot_date.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(captured.iter().map(String::as_str))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.source_hint.as_str()))),
        ],
    )
    .map_err(encode_err)?;
    write_batch(batch)
}

pub fn decode_agency_lsa(bytes: Vec<u8>) -> Result<Vec<AgencyLsa>> {
    let mut rows = Vec::new();
    for batch in read_batches(bytes)? {
        let agency_id = str_col(&batch, 0, "agency_id")?;
        let agency_name = str_col(&batch, 1, "agency_name")?;
        let proposed = u64_col(&batch, 2, "proposed_rules")?;
        let finals = u64_col(&batch, 3, "final_rules")?;
        let notices = u64_col(&batch, 4, "notices")?;
        let total = u64_col(&batch, 5, "total_documents")?;
        let snapshot_date = str_col(&batch, 6, "snapshot_date")?;
        let captured = str_col(&batch, 7, "captured_at")?;
        let source_hint = str_col(&batch, 8, "source_hint")?;
        for i in 0..batch.num_rows() {
            rows.push(AgencyLsa {
                agency_id: agency_id.value(i).to_string(),
                agency_name: agency_name.value(i).to_string(),
                proposed_rules: proposed.value(i),
                final_rules: finals.value(i),
                notices: notices.value(i),
                total_documents: total.value(i),
                snapshot_date: snapshot_date.value(i).to_string(),
                captured_at: captured_at(captured.value(i))?,
                source_hint: source_hint.value(i).to_string(),
            });
        }
    }
    Ok(rows)
}

// ── summaries ───────────────────────────────────────────────────────────

fn summaries_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("kind", DataType::Utf8, false),
        Field::new("key", DataType::Utf8, false),
        Field::new("text", DataType::Utf8, false),
        Field::new("model", DataType::Utf8, false),
        Field::new("created_at", DataType::Utf8, false),
    ]))
}

pub fn encode_summaries(rows: &[Summary]) -> Result<Vec<u8>> {
    let created: Vec<String> = rows.iter().map(|r| r.created_at.to_rfc3339()).collect();
    let batch = RecordBatch::try_new(
        summaries_schema(),
        vec![
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.kind.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.key.as_str()))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.text.as_str()))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.model.as_str()))),
            Arc::new(StringArray::from_iter_values(created.iter().map(String::as_str))),
        ],
    )
    .map_err(encode_err)?;
    write_batch(batch)
}

pub fn decode_summaries(bytes: Vec<u8>) -> Result<Vec<Summary>> {
    let mut rows = Vec::new();
    for batch in read_batches(bytes)? {
        let kind = str_col(&batch, 0, "kind")?;
        let key = str_col(&batch, 1, "key")?;
        let text = str_col(&batch, 2, "text")?;
        let model = str_col(&batch, 3, "model")?;
        let created = str_col(&batch, 4, "created_at")?;
        for i in 0..batch.num_rows() {
            rows.push(Summary {
                kind: SummaryKind::parse(kind.value(i))?,
                key: key.value(i).to_string(),
                text: text.value(i).to_string(),
                model: model.value(i).to_string(),
                created_at: captured_at(created.value(i))?,
            });
        }
    }
    Ok(rows)
}
