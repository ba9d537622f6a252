//! Bulk import/export workflow
//!
//! Flattens the keluarga/anggota hierarchy into one row per member and back.
//! Import groups rows by `noKK`; each group is committed as its own batch so
//! one failing family never blocks the others.

use async_trait::async_trait;
use chrono::{Local, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use warga_common::events::{EventBus, WargaEvent};
use warga_common::models::{anggota_collection, Anggota, Keluarga, KELUARGA_COLLECTION};
use warga_common::store::{DocumentStore, WriteBatch};
use warga_common::validation::{flat_row, validate_flat_row, FamilyFields, FieldError, FLAT_COLUMNS};
use warga_common::{Result, ValidationErrors};

use super::families::FamilyService;
use crate::sheet::SheetCodec;

/// Base name of the export file; the date and extension are appended
pub const EXPORT_FILE_STEM: &str = "data-warga";

/// Base name of the empty template file
pub const TEMPLATE_FILE_STEM: &str = "template-data-warga";

/// Encoded spreadsheet plus its suggested file name
#[derive(Debug, Clone)]
pub struct SheetFile {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Hands a produced file to the user
#[async_trait]
pub trait FileSink: Send + Sync {
    /// Deliver the file; returns where it ended up
    async fn deliver(&self, file: &SheetFile) -> Result<PathBuf>;
}

/// Writes delivered files into a directory
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl FileSink for DirectorySink {
    async fn deliver(&self, file: &SheetFile) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(&file.filename);
        tokio::fs::write(&path, &file.bytes).await?;
        info!(path = %path.display(), bytes = file.bytes.len(), "File delivered");
        Ok(path)
    }
}

/// Row that failed validation (row numbers count the header as row 1)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    pub row: usize,
    pub errors: Vec<FieldError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedGroup {
    pub no_kk: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedGroup {
    pub no_kk: String,
    pub error: String,
}

/// Outcome of one import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub families_created: usize,
    pub families_reused: usize,
    pub members_created: usize,
    pub skipped_rows: Vec<SkippedRow>,
    /// Rows whose `nik` was already present in the target family
    pub duplicate_rows: Vec<usize>,
    pub skipped_groups: Vec<SkippedGroup>,
    pub failed_groups: Vec<FailedGroup>,
}

struct ParsedRow {
    row: usize,
    family: FamilyFields,
    anggota: Anggota,
}

/// Export, import and template download
#[derive(Clone)]
pub struct TransferService {
    families: FamilyService,
    codec: Arc<dyn SheetCodec>,
    event_bus: EventBus,
}

impl TransferService {
    pub fn new(families: FamilyService, codec: Arc<dyn SheetCodec>, event_bus: EventBus) -> Self {
        Self {
            families,
            codec,
            event_bus,
        }
    }

    fn store(&self) -> &Arc<dyn DocumentStore> {
        self.families.store()
    }

    /// Every member of every family as one flat row
    ///
    /// Families without members contribute no rows.
    pub async fn export_all(&self) -> Result<SheetFile> {
        let families = self.families.snapshot().await?;
        let rows: Vec<Vec<String>> = families
            .iter()
            .flat_map(|family| {
                family.anggota.iter().map(|member| {
                    flat_row(&family.keluarga.no_kk, &family.keluarga.alamat, &member.anggota)
                })
            })
            .collect();

        let bytes = self.codec.encode(&FLAT_COLUMNS, &rows)?;
        info!(families = families.len(), rows = rows.len(), "Export prepared");

        Ok(SheetFile {
            filename: export_filename(Local::now().date_naive(), self.codec.extension()),
            content_type: self.codec.content_type(),
            bytes,
        })
    }

    /// Export and hand the file to `sink`
    pub async fn export_to(&self, sink: &dyn FileSink) -> Result<PathBuf> {
        let file = self.export_all().await?;
        sink.deliver(&file).await
    }

    /// Header-only spreadsheet for filling in before import
    pub fn download_template(&self) -> Result<SheetFile> {
        Ok(SheetFile {
            filename: format!("{}.{}", TEMPLATE_FILE_STEM, self.codec.extension()),
            content_type: self.codec.content_type(),
            bytes: self.codec.encode(&FLAT_COLUMNS, &[])?,
        })
    }

    /// Import a spreadsheet
    ///
    /// Fails only when the file itself cannot be read; everything else is
    /// reported per row or per family in the returned [`ImportReport`].
    pub async fn import_from(&self, bytes: &[u8]) -> Result<ImportReport> {
        let rows = self.codec.decode(bytes)?;
        let mut report = ImportReport::default();

        let mut groups: Vec<(String, Vec<ParsedRow>)> = Vec::new();
        let mut group_index: HashMap<String, usize> = HashMap::new();

        for (index, raw) in rows.iter().enumerate() {
            let row = index + 2;
            if raw.values().all(|cell| cell.is_empty()) {
                continue;
            }
            match validate_flat_row(raw) {
                Ok((family, anggota)) => {
                    let slot = *group_index.entry(family.no_kk.clone()).or_insert_with(|| {
                        groups.push((family.no_kk.clone(), Vec::new()));
                        groups.len() - 1
                    });
                    groups[slot].1.push(ParsedRow {
                        row,
                        family,
                        anggota,
                    });
                }
                Err(errors) => {
                    warn!(row, errors = %errors, "Skipping invalid import row");
                    report.skipped_rows.push(SkippedRow {
                        row,
                        errors: errors.errors,
                    });
                }
            }
        }

        for (no_kk, group) in groups {
            self.import_group(&no_kk, group, &mut report).await;
        }

        info!(
            families_created = report.families_created,
            families_reused = report.families_reused,
            members_created = report.members_created,
            rows_skipped = report.skipped_rows.len(),
            duplicates = report.duplicate_rows.len(),
            groups_failed = report.failed_groups.len(),
            "Import completed"
        );
        self.event_bus.emit_lossy(WargaEvent::ImportCompleted {
            families_created: report.families_created,
            members_created: report.members_created,
            rows_skipped: report.skipped_rows.len() + report.duplicate_rows.len(),
            groups_failed: report.failed_groups.len(),
            timestamp: Utc::now(),
        });

        Ok(report)
    }

    async fn import_group(&self, no_kk: &str, group: Vec<ParsedRow>, report: &mut ImportReport) {
        let heads: Vec<&ParsedRow> = group.iter().filter(|r| r.anggota.is_head()).collect();
        let head = match heads.as_slice() {
            [head] => *head,
            [] => {
                warn!(no_kk = %no_kk, rows = group.len(), "Skipping family without a head row");
                report.skipped_groups.push(SkippedGroup {
                    no_kk: no_kk.to_string(),
                    reason: "Tidak ada baris dengan status Kepala Keluarga.".to_string(),
                });
                return;
            }
            _ => {
                warn!(no_kk = %no_kk, heads = heads.len(), "Skipping family with several head rows");
                report.skipped_groups.push(SkippedGroup {
                    no_kk: no_kk.to_string(),
                    reason: format!("Terdapat {} baris Kepala Keluarga.", heads.len()),
                });
                return;
            }
        };

        match self.commit_group(no_kk, head, &group, report).await {
            Ok(()) => {}
            Err(e) => {
                warn!(no_kk = %no_kk, error = %e, "Import batch failed");
                report.failed_groups.push(FailedGroup {
                    no_kk: no_kk.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    /// Build and commit one family's batch; counters change only on success
    async fn commit_group(
        &self,
        no_kk: &str,
        head: &ParsedRow,
        group: &[ParsedRow],
        report: &mut ImportReport,
    ) -> Result<()> {
        let store = self.store();
        let existing = store
            .query_eq(KELUARGA_COLLECTION, "noKK", no_kk)
            .await?
            .into_iter()
            .next();

        let mut batch = WriteBatch::new();
        let mut known_niks = HashSet::new();
        let mut family_has_head = false;

        let family_id = match &existing {
            Some(doc) => {
                for member in store.list(&anggota_collection(&doc.id)).await? {
                    let anggota: Anggota = member.decode()?;
                    family_has_head |= anggota.is_head();
                    known_niks.insert(anggota.nik);
                }
                doc.id.clone()
            }
            None => {
                let id = store.new_id();
                let keluarga = Keluarga {
                    no_kk: no_kk.to_string(),
                    alamat: head.family.alamat.clone(),
                    kepala_keluarga: head.anggota.nama.clone(),
                };
                batch.set(KELUARGA_COLLECTION, &id, serde_json::to_value(&keluarga)?);
                family_has_head = true;
                id
            }
        };

        let members = anggota_collection(&family_id);
        let mut duplicates = Vec::new();
        let mut rejected = Vec::new();
        let mut created = 0;

        // Head first, so a later row reusing its nik cannot displace it
        let ordered = std::iter::once(head).chain(group.iter().filter(|r| !std::ptr::eq(*r, head)));
        for parsed in ordered {
            if !known_niks.insert(parsed.anggota.nik.clone()) {
                duplicates.push(parsed.row);
                continue;
            }

            if parsed.anggota.is_head() && existing.is_some() {
                if family_has_head {
                    warn!(
                        no_kk = %no_kk,
                        row = parsed.row,
                        "Family already has a head, skipping incoming head row"
                    );
                    rejected.push(SkippedRow {
                        row: parsed.row,
                        errors: ValidationErrors::single(
                            "statusHubungan",
                            "Keluarga ini sudah memiliki kepala keluarga.",
                        )
                        .errors,
                    });
                    continue;
                }
                let mut fields = serde_json::Map::new();
                fields.insert(
                    "kepalaKeluarga".to_string(),
                    serde_json::Value::String(parsed.anggota.nama.clone()),
                );
                batch.update(KELUARGA_COLLECTION, &family_id, fields);
                family_has_head = true;
            }

            batch.set(&members, &store.new_id(), serde_json::to_value(&parsed.anggota)?);
            created += 1;
        }

        if !batch.is_empty() {
            store.commit(batch).await?;
        }

        if existing.is_some() {
            report.families_reused += 1;
        } else {
            report.families_created += 1;
        }
        report.members_created += created;
        report.duplicate_rows.extend(duplicates);
        report.skipped_rows.extend(rejected);

        info!(family_id = %family_id, no_kk = %no_kk, members = created, "Family imported");
        Ok(())
    }
}

/// `data-warga-YYYY-MM-DD.<ext>`
pub fn export_filename(date: NaiveDate, extension: &str) -> String {
    format!("{}-{}.{}", EXPORT_FILE_STEM, date.format("%Y-%m-%d"), extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_filename_embeds_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(export_filename(date, "csv"), "data-warga-2024-03-09.csv");
    }

    #[tokio::test]
    async fn test_directory_sink_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path().join("out"));
        let file = SheetFile {
            filename: "template-data-warga.csv".to_string(),
            content_type: "text/csv",
            bytes: b"noKK\n".to_vec(),
        };

        let path = sink.deliver(&file).await.unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"noKK\n");
    }
}
