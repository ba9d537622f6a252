//! Test Helper Utilities
//!
//! Shared fixtures for warga-admin integration tests

#![allow(dead_code)]

use std::time::Duration;

use warga_admin::workflow::FamilyFeed;
use warga_admin::AppState;
use warga_common::db::init_memory_database;
use warga_common::events::EventBus;
use warga_common::models::FamilyRecord;
use warga_common::validation::{FamilyForm, MemberForm, FLAT_COLUMNS};

pub const NO_KK: &str = "3203010101010001";
pub const FEDERATED_DOMAIN: &str = "rw05.id";

/// Fresh in-memory application state
pub async fn test_state() -> AppState {
    let pool = init_memory_database()
        .await
        .expect("in-memory database");
    AppState::new(pool, EventBus::new(1000), vec![FEDERATED_DOMAIN.to_string()])
}

pub fn family_form(no_kk: &str, alamat: &str) -> FamilyForm {
    FamilyForm {
        no_kk: no_kk.to_string(),
        alamat: alamat.to_string(),
    }
}

pub fn member_form(nama: &str, nik: &str, status_hubungan: &str) -> MemberForm {
    MemberForm {
        nama: nama.to_string(),
        nik: nik.to_string(),
        jenis_kelamin: "Laki-laki".to_string(),
        tempat_lahir: "Bandung".to_string(),
        tanggal_lahir: "1980-05-17".to_string(),
        agama: "Islam".to_string(),
        pendidikan: "S1".to_string(),
        jenis_pekerjaan: "Karyawan Swasta".to_string(),
        status_perkawinan: "Kawin".to_string(),
        status_hubungan: status_hubungan.to_string(),
        kewarganegaraan: "WNI".to_string(),
        nama_ayah: "Slamet".to_string(),
        nama_ibu: "Sumini".to_string(),
    }
}

pub fn head_form(nama: &str, nik: &str) -> MemberForm {
    member_form(nama, nik, "Kepala Keluarga")
}

/// One interchange row in column order
pub fn csv_row(no_kk: &str, nama: &str, nik: &str, status_hubungan: &str) -> String {
    [
        no_kk,
        "Jl. Melati No. 5",
        nama,
        nik,
        "Perempuan",
        "Garut",
        "1985-08-01",
        "Islam",
        "SLTA",
        "Mengurus Rumah Tangga",
        "Kawin",
        status_hubungan,
        "WNI",
        "Ayah",
        "Ibu",
    ]
    .join(",")
}

/// Header line plus the given rows
pub fn csv_file(rows: &[String]) -> Vec<u8> {
    let mut text = FLAT_COLUMNS.join(",");
    for row in rows {
        text.push('\n');
        text.push_str(row);
    }
    text.push('\n');
    text.into_bytes()
}

/// Pull from the feed until `done` holds, failing after five seconds
pub async fn wait_for<F>(feed: &mut FamilyFeed, mut done: F) -> Vec<FamilyRecord>
where
    F: FnMut(&[FamilyRecord]) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let families = feed
                .next()
                .await
                .expect("feed ended")
                .expect("feed error");
            if done(&families) {
                return families;
            }
        }
    })
    .await
    .expect("feed did not reach the expected state")
}
