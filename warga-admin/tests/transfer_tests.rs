//! Bulk import/export workflow tests

mod helpers;

use std::collections::BTreeSet;

use helpers::*;
use warga_admin::sheet::{CsvCodec, SheetCodec};
use warga_common::events::WargaEvent;
use warga_common::validation::FLAT_COLUMNS;
use warga_common::Error;

const OTHER_KK: &str = "3203010101019999";

fn sorted_rows(bytes: &[u8]) -> BTreeSet<Vec<String>> {
    CsvCodec
        .decode(bytes)
        .unwrap()
        .into_iter()
        .map(|row| {
            FLAT_COLUMNS
                .iter()
                .map(|c| row.get(*c).cloned().unwrap_or_default())
                .collect()
        })
        .collect()
}

#[tokio::test]
async fn test_export_then_import_round_trips_every_row() {
    let source = test_state().await;
    let first = source
        .families
        .create_family(&family_form(NO_KK, "Blok A, RT 01"), &head_form("Budi", "3203010101010002"))
        .await
        .unwrap();
    source
        .families
        .create_member(&first.family_id, &member_form("Ani", "3203010101010003", "Istri"))
        .await
        .unwrap();
    source
        .families
        .create_family(&family_form(OTHER_KK, "Blok C"), &head_form("Dedi", "3203010101019998"))
        .await
        .unwrap();

    let exported = source.transfer.export_all().await.unwrap();
    assert!(exported.filename.starts_with("data-warga-"));
    assert!(exported.filename.ends_with(".csv"));

    let target = test_state().await;
    let report = target.transfer.import_from(&exported.bytes).await.unwrap();
    assert_eq!(report.families_created, 2);
    assert_eq!(report.members_created, 3);

    let reexported = target.transfer.export_all().await.unwrap();
    assert_eq!(sorted_rows(&exported.bytes), sorted_rows(&reexported.bytes));
}

#[tokio::test]
async fn test_import_groups_rows_under_one_family() {
    let state = test_state().await;
    let file = csv_file(&[
        csv_row("1234567890123456", "Siti", "1234567890120001", "Istri"),
        csv_row("1234567890123456", "Budi", "1234567890120002", "Kepala Keluarga"),
        csv_row("1234567890123456", "Rina", "1234567890120003", "Anak"),
    ]);

    let report = state.transfer.import_from(&file).await.unwrap();
    assert_eq!(report.families_created, 1);
    assert_eq!(report.members_created, 3);

    let families = state.families.snapshot().await.unwrap();
    assert_eq!(families.len(), 1);
    assert_eq!(families[0].keluarga.no_kk, "1234567890123456");
    assert_eq!(families[0].keluarga.kepala_keluarga, "Budi");
    assert_eq!(families[0].anggota.len(), 3);
    assert_eq!(families[0].heads().count(), 1);
}

#[tokio::test]
async fn test_group_without_head_is_skipped() {
    let state = test_state().await;
    let file = csv_file(&[
        csv_row(NO_KK, "Siti", "1234567890120001", "Istri"),
        csv_row(NO_KK, "Rina", "1234567890120003", "Anak"),
    ]);

    let report = state.transfer.import_from(&file).await.unwrap();
    assert_eq!(report.families_created, 0);
    assert_eq!(report.members_created, 0);
    assert_eq!(report.skipped_groups.len(), 1);
    assert_eq!(report.skipped_groups[0].no_kk, NO_KK);
    assert!(state.families.snapshot().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_group_with_two_heads_is_skipped() {
    let state = test_state().await;
    let file = csv_file(&[
        csv_row(NO_KK, "Budi", "1234567890120001", "Kepala Keluarga"),
        csv_row(NO_KK, "Joko", "1234567890120002", "Kepala Keluarga"),
    ]);

    let report = state.transfer.import_from(&file).await.unwrap();
    assert_eq!(report.skipped_groups.len(), 1);
    assert!(state.families.snapshot().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_rows_are_skipped_not_fatal() {
    let state = test_state().await;
    let file = csv_file(&[
        csv_row(NO_KK, "Budi", "1234567890120001", "Kepala Keluarga"),
        csv_row(NO_KK, "Rina", "12345", "Anak"),
        csv_row(NO_KK, "Tono", "1234567890120004", "Cucu"),
    ]);

    let report = state.transfer.import_from(&file).await.unwrap();
    assert_eq!(report.members_created, 1);
    assert_eq!(report.skipped_rows.len(), 2);
    assert_eq!(report.skipped_rows[0].row, 3);
    assert_eq!(report.skipped_rows[0].errors[0].field, "nik");
    assert_eq!(report.skipped_rows[1].row, 4);
    assert_eq!(report.skipped_rows[1].errors[0].field, "statusHubungan");
}

#[tokio::test]
async fn test_reimport_deduplicates_by_nik() {
    let state = test_state().await;
    let file = csv_file(&[
        csv_row(NO_KK, "Budi", "1234567890120001", "Kepala Keluarga"),
        csv_row(NO_KK, "Siti", "1234567890120002", "Istri"),
    ]);

    state.transfer.import_from(&file).await.unwrap();
    let report = state.transfer.import_from(&file).await.unwrap();

    assert_eq!(report.families_created, 0);
    assert_eq!(report.families_reused, 1);
    assert_eq!(report.members_created, 0);
    assert_eq!(report.duplicate_rows, vec![2, 3]);

    let families = state.families.snapshot().await.unwrap();
    assert_eq!(families.len(), 1);
    assert_eq!(families[0].anggota.len(), 2);
}

#[tokio::test]
async fn test_import_appends_to_existing_family() {
    let state = test_state().await;
    let created = state
        .families
        .create_family(&family_form(NO_KK, "Blok A"), &head_form("Budi", "3203010101010002"))
        .await
        .unwrap();

    let file = csv_file(&[
        csv_row(NO_KK, "Joko", "1234567890120009", "Kepala Keluarga"),
        csv_row(NO_KK, "Rina", "1234567890120003", "Anak"),
    ]);
    let report = state.transfer.import_from(&file).await.unwrap();

    assert_eq!(report.families_reused, 1);
    assert_eq!(report.members_created, 1);
    assert_eq!(report.skipped_rows.len(), 1);
    assert_eq!(report.skipped_rows[0].row, 2);

    let family = state.families.get_family(&created.family_id).await.unwrap();
    assert_eq!(family.keluarga.kepala_keluarga, "Budi");
    assert_eq!(family.heads().count(), 1);
    assert_eq!(family.anggota.len(), 2);
}

#[tokio::test]
async fn test_import_emits_completion_event() {
    let state = test_state().await;
    let mut events = state.event_bus.subscribe();
    let file = csv_file(&[csv_row(NO_KK, "Budi", "1234567890120001", "Kepala Keluarga")]);

    state.transfer.import_from(&file).await.unwrap();

    loop {
        match events.recv().await.unwrap() {
            WargaEvent::ImportCompleted {
                families_created,
                members_created,
                ..
            } => {
                assert_eq!(families_created, 1);
                assert_eq!(members_created, 1);
                break;
            }
            _ => continue,
        }
    }
}

#[tokio::test]
async fn test_template_has_only_the_header() {
    let state = test_state().await;
    let template = state.transfer.download_template().unwrap();

    assert_eq!(template.filename, "template-data-warga.csv");
    let text = String::from_utf8(template.bytes).unwrap();
    assert_eq!(text.trim_end(), FLAT_COLUMNS.join(","));
}

#[tokio::test]
async fn test_empty_store_exports_header_only() {
    let state = test_state().await;
    let exported = state.transfer.export_all().await.unwrap();
    assert!(CsvCodec.decode(&exported.bytes).unwrap().is_empty());
}

#[tokio::test]
async fn test_unreadable_file_is_decode_error() {
    let state = test_state().await;
    assert!(matches!(
        state.transfer.import_from(b"").await,
        Err(Error::Decode(_))
    ));
}
