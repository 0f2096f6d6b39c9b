//! Zip archives and file import.
//!
//! An archive holds one document per resource and signal, under
//! `structuredlogs/`, `traces/` and `metrics/`. Import is best-effort: an
//! unreadable, empty or unrecognized file is logged and skipped so the rest
//! of a multi-file import still lands.

use crate::core::error::Result;
use crate::export::document::{logs_to_proto, metrics_to_proto, spans_to_proto};
use crate::export::{export_logs, export_metrics, export_traces, TelemetryDocument};
use crate::repository::{AddContext, TelemetryRepository};
use crate::resource::ResourceKind;
use std::collections::HashSet;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const LOGS_FOLDER: &str = "structuredlogs";
pub const TRACES_FOLDER: &str = "traces";
pub const METRICS_FOLDER: &str = "metrics";

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Outcome of an import
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// JSON documents that parsed and were ingested
    pub files_imported: usize,
    /// Files or archive entries that were ignored
    pub files_skipped: usize,
    /// Per-item ingestion counters across every document
    pub ctx: AddContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Json,
    Zip,
}

/// Picks the format from the extension, or from the content when there is
/// no extension.
fn detect_format(name: &str, bytes: &[u8]) -> Option<FileFormat> {
    let extension = Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase());
    match extension.as_deref() {
        Some("json") => Some(FileFormat::Json),
        Some("zip") => Some(FileFormat::Zip),
        Some(_) => None,
        None if bytes.starts_with(ZIP_MAGIC) => Some(FileFormat::Zip),
        None => match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'{') => Some(FileFormat::Json),
            _ => None,
        },
    }
}

/// File name for a resource inside the archive
fn sanitize_file_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "unknown".to_string()
    } else {
        sanitized
    }
}

/// `base` if unused, else `base-2`, `base-3` and so on
fn unique_file_name(used: &mut HashSet<String>, base: String) -> String {
    if used.insert(base.clone()) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}", base, n);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

fn write_document<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    path: &str,
    document: &TelemetryDocument,
) -> Result<()> {
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(path, options)?;
    serde_json::to_writer_pretty(&mut *zip, document)?;
    Ok(())
}

/// Writes every concrete resource's telemetry as a zip archive
pub fn export_archive<W: Write + Seek>(repo: &TelemetryRepository, writer: W) -> Result<()> {
    let mut zip = ZipWriter::new(writer);
    let mut written = 0;
    let mut used_names = HashSet::new();

    for view in repo.get_resources() {
        if view.kind == ResourceKind::Grouping {
            continue;
        }
        let base = unique_file_name(&mut used_names, sanitize_file_name(&view.display_name));
        let file_name = format!("{}.json", base);
        let documents = [
            (LOGS_FOLDER, export_logs(repo, &view.key)),
            (TRACES_FOLDER, export_traces(repo, &view.key)),
            (METRICS_FOLDER, export_metrics(repo, &view.key)),
        ];
        for (folder, document) in documents {
            if document.is_empty() {
                continue;
            }
            write_document(&mut zip, &format!("{}/{}", folder, file_name), &document)?;
            written += 1;
        }
    }

    zip.finish()?;
    tracing::info!(files = written, "Exported telemetry archive");
    Ok(())
}

/// Imports a JSON document or zip archive from disk.
///
/// Only failing to read the file is an error; bad content is skipped.
pub fn import_file(repo: &TelemetryRepository, path: &Path) -> Result<ImportSummary> {
    let bytes = std::fs::read(path)?;
    Ok(import_bytes(repo, &path.to_string_lossy(), &bytes))
}

/// Imports a JSON document or zip archive held in memory
pub fn import_bytes(repo: &TelemetryRepository, name: &str, bytes: &[u8]) -> ImportSummary {
    let mut summary = ImportSummary::default();
    match detect_format(name, bytes) {
        Some(FileFormat::Json) => import_json(repo, name, bytes, &mut summary),
        Some(FileFormat::Zip) => import_zip(repo, name, bytes, &mut summary),
        None => {
            tracing::warn!(file = name, "Skipping file with unrecognized format");
            summary.files_skipped += 1;
        },
    }
    summary
}

fn import_json(
    repo: &TelemetryRepository,
    name: &str,
    bytes: &[u8],
    summary: &mut ImportSummary,
) {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        tracing::warn!(file = name, "Skipping empty file");
        summary.files_skipped += 1;
        return;
    }
    match serde_json::from_slice::<TelemetryDocument>(bytes) {
        Ok(document) => {
            import_document(repo, document, &mut summary.ctx);
            summary.files_imported += 1;
        },
        Err(e) => {
            tracing::warn!(file = name, error = %e, "Skipping malformed JSON");
            summary.files_skipped += 1;
        },
    }
}

fn import_zip(
    repo: &TelemetryRepository,
    name: &str,
    bytes: &[u8],
    summary: &mut ImportSummary,
) {
    let mut archive = match ZipArchive::new(Cursor::new(bytes)) {
        Ok(archive) => archive,
        Err(e) => {
            tracing::warn!(file = name, error = %e, "Skipping unreadable archive");
            summary.files_skipped += 1;
            return;
        },
    };

    for index in 0..archive.len() {
        let mut entry = match archive.by_index(index) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(file = name, index, error = %e, "Skipping unreadable entry");
                summary.files_skipped += 1;
                continue;
            },
        };
        if entry.is_dir() {
            continue;
        }

        let entry_name = entry.name().to_string();
        let is_json = Path::new(&entry_name)
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
        if !is_json {
            tracing::debug!(file = name, entry = %entry_name, "Skipping non-JSON entry");
            summary.files_skipped += 1;
            continue;
        }

        let mut contents = Vec::new();
        if let Err(e) = entry.read_to_end(&mut contents) {
            tracing::warn!(
                file = name,
                entry = %entry_name,
                error = %e,
                "Skipping unreadable entry"
            );
            summary.files_skipped += 1;
            continue;
        }
        import_json(repo, &entry_name, &contents, summary);
    }
}

/// Ingests a parsed document. Spans go first so that log records can link
/// to spans from the same import.
pub fn import_document(
    repo: &TelemetryRepository,
    document: TelemetryDocument,
    ctx: &mut AddContext,
) {
    let resource_spans = spans_to_proto(document.resource_spans, ctx);
    repo.add_traces(ctx, &resource_spans);

    let resource_logs = logs_to_proto(document.resource_logs, ctx);
    repo.add_logs(ctx, &resource_logs);

    let resource_metrics = metrics_to_proto(document.resource_metrics);
    repo.add_metrics(ctx, &resource_metrics);
}
