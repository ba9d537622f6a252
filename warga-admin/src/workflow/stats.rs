//! Dashboard statistics

use serde::Serialize;
use warga_common::models::{FamilyRecord, JenisKelamin};

/// Resident counts shown on the dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WargaStats {
    pub total_kk: usize,
    pub total_warga: usize,
    pub laki_laki: usize,
    pub perempuan: usize,
}

impl WargaStats {
    pub fn compute(families: &[FamilyRecord]) -> Self {
        families.iter().flat_map(|f| f.anggota.iter()).fold(
            WargaStats {
                total_kk: families.len(),
                ..Default::default()
            },
            |mut stats, member| {
                stats.total_warga += 1;
                match member.anggota.jenis_kelamin {
                    JenisKelamin::LakiLaki => stats.laki_laki += 1,
                    JenisKelamin::Perempuan => stats.perempuan += 1,
                }
                stats
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warga_common::models::{
        Anggota, Keluarga, MemberRecord, StatusHubungan, StatusPerkawinan,
    };

    fn member(id: &str, jenis_kelamin: JenisKelamin) -> MemberRecord {
        MemberRecord {
            id: id.to_string(),
            anggota: Anggota {
                nama: id.to_string(),
                nik: "3203010101010001".to_string(),
                jenis_kelamin,
                tempat_lahir: "Bandung".to_string(),
                tanggal_lahir: "1990-01-01".to_string(),
                agama: "Islam".to_string(),
                pendidikan: "SLTA".to_string(),
                jenis_pekerjaan: "Pelajar".to_string(),
                status_perkawinan: StatusPerkawinan::BelumKawin,
                status_hubungan: StatusHubungan::Anak,
                kewarganegaraan: "WNI".to_string(),
                nama_ayah: "Ayah".to_string(),
                nama_ibu: "Ibu".to_string(),
            },
        }
    }

    #[test]
    fn test_counts_families_members_and_gender() {
        let keluarga = Keluarga {
            no_kk: "3203010101010001".to_string(),
            alamat: "Blok A".to_string(),
            kepala_keluarga: "a".to_string(),
        };
        let families = vec![
            FamilyRecord {
                id: "k1".to_string(),
                keluarga: keluarga.clone(),
                anggota: vec![
                    member("a", JenisKelamin::LakiLaki),
                    member("b", JenisKelamin::Perempuan),
                    member("c", JenisKelamin::Perempuan),
                ],
            },
            FamilyRecord {
                id: "k2".to_string(),
                keluarga,
                anggota: vec![],
            },
        ];

        assert_eq!(
            WargaStats::compute(&families),
            WargaStats {
                total_kk: 2,
                total_warga: 3,
                laki_laki: 1,
                perempuan: 2,
            }
        );
    }

    #[test]
    fn test_empty_snapshot() {
        assert_eq!(WargaStats::compute(&[]), WargaStats::default());
    }
}
