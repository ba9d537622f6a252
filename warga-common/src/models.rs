//! Family (keluarga) and member (anggota) models
//!
//! Field names on the wire and in the store are the Indonesian camelCase
//! names used throughout the RW office (`noKK`, `kepalaKeluarga`, ...).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Top-level family collection
pub const KELUARGA_COLLECTION: &str = "keluarga";

/// Member subcollection name under each family document
pub const ANGGOTA_SUBCOLLECTION: &str = "anggota";

/// Collection path of the members of one family: `keluarga/{id}/anggota`
pub fn anggota_collection(family_id: &str) -> String {
    format!("{}/{}/{}", KELUARGA_COLLECTION, family_id, ANGGOTA_SUBCOLLECTION)
}

/// Family summary document (`keluarga/{familyId}`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keluarga {
    #[serde(rename = "noKK")]
    pub no_kk: String,
    pub alamat: String,
    /// Mirror of the head member's `nama`
    #[serde(rename = "kepalaKeluarga")]
    pub kepala_keluarga: String,
}

/// Member document (`keluarga/{familyId}/anggota/{memberId}`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anggota {
    pub nama: String,
    pub nik: String,
    pub jenis_kelamin: JenisKelamin,
    pub tempat_lahir: String,
    pub tanggal_lahir: String,
    pub agama: String,
    pub pendidikan: String,
    pub jenis_pekerjaan: String,
    pub status_perkawinan: StatusPerkawinan,
    pub status_hubungan: StatusHubungan,
    pub kewarganegaraan: String,
    pub nama_ayah: String,
    pub nama_ibu: String,
}

impl Anggota {
    pub fn is_head(&self) -> bool {
        self.status_hubungan == StatusHubungan::KepalaKeluarga
    }
}

/// Member with its store identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub id: String,
    #[serde(flatten)]
    pub anggota: Anggota,
}

/// Family with its store identifier and current member list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyRecord {
    pub id: String,
    #[serde(flatten)]
    pub keluarga: Keluarga,
    pub anggota: Vec<MemberRecord>,
}

impl FamilyRecord {
    /// Members marked as head of household (exactly one when consistent)
    pub fn heads(&self) -> impl Iterator<Item = &MemberRecord> {
        self.anggota.iter().filter(|m| m.anggota.is_head())
    }
}

/// Error returned when a label does not belong to an enum domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLabel(pub String);

impl fmt::Display for UnknownLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown value '{}'", self.0)
    }
}

impl std::error::Error for UnknownLabel {}

macro_rules! label_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $label:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownLabel;

            /// Case-insensitive, whitespace-trimmed label match
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| UnknownLabel(wanted.to_string()))
            }
        }
    };
}

label_enum! {
    /// Sex as recorded on the family card
    JenisKelamin {
        LakiLaki => "Laki-laki",
        Perempuan => "Perempuan",
    }
}

label_enum! {
    /// Marital status
    StatusPerkawinan {
        BelumKawin => "Belum Kawin",
        Kawin => "Kawin",
        CeraiHidup => "Cerai Hidup",
        CeraiMati => "Cerai Mati",
    }
}

label_enum! {
    /// Relationship to the head of household
    StatusHubungan {
        KepalaKeluarga => "Kepala Keluarga",
        Istri => "Istri",
        Anak => "Anak",
        FamiliLain => "Famili Lain",
    }
}
