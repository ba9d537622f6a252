//! Field-level validation schemas
//!
//! Every form is a loosely typed bag of strings (what a browser form or a
//! spreadsheet row delivers). `validate()` either returns the normalized,
//! strongly typed value or the full list of field errors. No side effects.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::models::{Anggota, JenisKelamin, StatusHubungan, StatusPerkawinan};

/// Length of `noKK` and `nik`
pub const REGISTRY_NUMBER_LEN: usize = 16;

/// Minimum password length accepted by the auth provider
pub const MIN_PASSWORD_LEN: usize = 6;

/// Minimum display name length on registration
pub const MIN_DISPLAY_NAME_LEN: usize = 3;

/// Spreadsheet interchange columns, in export order
pub const FLAT_COLUMNS: [&str; 15] = [
    "noKK",
    "alamat",
    "nama",
    "nik",
    "jenisKelamin",
    "tempatLahir",
    "tanggalLahir",
    "agama",
    "pendidikan",
    "jenisPekerjaan",
    "statusPerkawinan",
    "statusHubungan",
    "kewarganegaraan",
    "namaAyah",
    "namaIbu",
];

/// One violated constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// All constraint violations of one candidate record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn extend(&mut self, other: ValidationErrors) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    pub fn fields(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.field.as_str()).collect()
    }

    fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Accumulates errors while reading fields
struct Checker {
    errors: ValidationErrors,
}

impl Checker {
    fn new() -> Self {
        Self {
            errors: ValidationErrors::new(),
        }
    }

    fn required(&mut self, field: &str, label: &str, value: &str) -> String {
        let value = value.trim();
        if value.is_empty() {
            self.errors.push(field, format!("{} tidak boleh kosong.", label));
        }
        value.to_string()
    }

    fn registry_number(&mut self, field: &str, label: &str, value: &str) -> String {
        let value = value.trim();
        if value.is_empty() {
            self.errors.push(field, format!("{} tidak boleh kosong.", label));
        } else if value.len() != REGISTRY_NUMBER_LEN || !value.chars().all(|c| c.is_ascii_digit()) {
            self.errors.push(
                field,
                format!("{} harus terdiri dari {} digit angka.", label, REGISTRY_NUMBER_LEN),
            );
        }
        value.to_string()
    }

    fn one_of<T: FromStr>(&mut self, field: &str, label: &str, value: &str) -> Option<T> {
        match value.parse::<T>() {
            Ok(v) => Some(v),
            Err(_) => {
                self.errors.push(field, format!("Pilih {} yang valid.", label));
                None
            }
        }
    }

    fn min_chars(&mut self, field: &str, label: &str, value: &str, min: usize) {
        if value.chars().count() < min {
            self.errors.push(field, format!("{} minimal {} karakter.", label, min));
        }
    }

    fn email(&mut self, field: &str, value: &str) -> String {
        let value = value.trim();
        if !is_well_formed_email(value) {
            self.errors.push(field, "Format email tidak valid.");
        }
        value.to_string()
    }
}

/// Structural email check: one `@`, non-empty local part, dotted domain
pub fn is_well_formed_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !value.chars().any(char::is_whitespace)
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

// ============================================================================
// Family schema
// ============================================================================

/// Family-only form fields (identifier and address)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FamilyForm {
    #[serde(rename = "noKK")]
    pub no_kk: String,
    pub alamat: String,
}

/// Validated family fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyFields {
    pub no_kk: String,
    pub alamat: String,
}

impl FamilyForm {
    pub fn validate(&self) -> Result<FamilyFields, ValidationErrors> {
        let mut check = Checker::new();
        let no_kk = check.registry_number("noKK", "No. KK", &self.no_kk);
        let alamat = check.required("alamat", "Alamat", &self.alamat);
        check.errors.into_result(FamilyFields { no_kk, alamat })
    }
}

// ============================================================================
// Member schema
// ============================================================================

/// Member form fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MemberForm {
    pub nama: String,
    pub nik: String,
    pub jenis_kelamin: String,
    pub tempat_lahir: String,
    pub tanggal_lahir: String,
    pub agama: String,
    pub pendidikan: String,
    pub jenis_pekerjaan: String,
    pub status_perkawinan: String,
    pub status_hubungan: String,
    pub kewarganegaraan: String,
    pub nama_ayah: String,
    pub nama_ibu: String,
}

impl MemberForm {
    pub fn validate(&self) -> Result<Anggota, ValidationErrors> {
        let mut check = Checker::new();

        let nama = check.required("nama", "Nama", &self.nama);
        let nik = check.registry_number("nik", "NIK", &self.nik);
        let jenis_kelamin =
            check.one_of::<JenisKelamin>("jenisKelamin", "jenis kelamin", &self.jenis_kelamin);
        let tempat_lahir = check.required("tempatLahir", "Tempat lahir", &self.tempat_lahir);
        let tanggal_lahir = check.required("tanggalLahir", "Tanggal lahir", &self.tanggal_lahir);
        let agama = check.required("agama", "Agama", &self.agama);
        let pendidikan = check.required("pendidikan", "Pendidikan", &self.pendidikan);
        let jenis_pekerjaan =
            check.required("jenisPekerjaan", "Jenis pekerjaan", &self.jenis_pekerjaan);
        let status_perkawinan = check.one_of::<StatusPerkawinan>(
            "statusPerkawinan",
            "status perkawinan",
            &self.status_perkawinan,
        );
        let status_hubungan = check.one_of::<StatusHubungan>(
            "statusHubungan",
            "status hubungan",
            &self.status_hubungan,
        );
        let kewarganegaraan =
            check.required("kewarganegaraan", "Kewarganegaraan", &self.kewarganegaraan);
        let nama_ayah = check.required("namaAyah", "Nama ayah", &self.nama_ayah);
        let nama_ibu = check.required("namaIbu", "Nama ibu", &self.nama_ibu);

        match (jenis_kelamin, status_perkawinan, status_hubungan) {
            (Some(jenis_kelamin), Some(status_perkawinan), Some(status_hubungan))
                if check.errors.is_empty() =>
            {
                Ok(Anggota {
                    nama,
                    nik,
                    jenis_kelamin,
                    tempat_lahir,
                    tanggal_lahir,
                    agama,
                    pendidikan,
                    jenis_pekerjaan,
                    status_perkawinan,
                    status_hubungan,
                    kewarganegaraan,
                    nama_ayah,
                    nama_ibu,
                })
            }
            _ => Err(check.errors),
        }
    }

    /// Read member columns from a flat spreadsheet row (missing keys are empty)
    pub fn from_row(row: &HashMap<String, String>) -> Self {
        let get = |key: &str| row.get(key).cloned().unwrap_or_default();
        Self {
            nama: get("nama"),
            nik: get("nik"),
            jenis_kelamin: get("jenisKelamin"),
            tempat_lahir: get("tempatLahir"),
            tanggal_lahir: get("tanggalLahir"),
            agama: get("agama"),
            pendidikan: get("pendidikan"),
            jenis_pekerjaan: get("jenisPekerjaan"),
            status_perkawinan: get("statusPerkawinan"),
            status_hubungan: get("statusHubungan"),
            kewarganegaraan: get("kewarganegaraan"),
            nama_ayah: get("namaAyah"),
            nama_ibu: get("namaIbu"),
        }
    }
}

impl From<&Anggota> for MemberForm {
    fn from(anggota: &Anggota) -> Self {
        Self {
            nama: anggota.nama.clone(),
            nik: anggota.nik.clone(),
            jenis_kelamin: anggota.jenis_kelamin.to_string(),
            tempat_lahir: anggota.tempat_lahir.clone(),
            tanggal_lahir: anggota.tanggal_lahir.clone(),
            agama: anggota.agama.clone(),
            pendidikan: anggota.pendidikan.clone(),
            jenis_pekerjaan: anggota.jenis_pekerjaan.clone(),
            status_perkawinan: anggota.status_perkawinan.to_string(),
            status_hubungan: anggota.status_hubungan.to_string(),
            kewarganegaraan: anggota.kewarganegaraan.clone(),
            nama_ayah: anggota.nama_ayah.clone(),
            nama_ibu: anggota.nama_ibu.clone(),
        }
    }
}

// ============================================================================
// Composed schemas
// ============================================================================

/// Create/edit-family form: family fields plus the head member's fields
///
/// Errors from both halves are reported together.
pub fn validate_family_with_head(
    family: &FamilyForm,
    head: &MemberForm,
) -> Result<(FamilyFields, Anggota), ValidationErrors> {
    match (family.validate(), head.validate()) {
        (Ok(family), Ok(head)) => Ok((family, head)),
        (family, head) => {
            let mut errors = ValidationErrors::new();
            if let Err(e) = family {
                errors.extend(e);
            }
            if let Err(e) = head {
                errors.extend(e);
            }
            Err(errors)
        }
    }
}

/// Flat spreadsheet row: `noKK`, `alamat` plus all member columns
pub fn validate_flat_row(
    row: &HashMap<String, String>,
) -> Result<(FamilyFields, Anggota), ValidationErrors> {
    let family = FamilyForm {
        no_kk: row.get("noKK").cloned().unwrap_or_default(),
        alamat: row.get("alamat").cloned().unwrap_or_default(),
    };
    validate_family_with_head(&family, &MemberForm::from_row(row))
}

/// Flatten a family/member pair into an interchange row, in column order
pub fn flat_row(no_kk: &str, alamat: &str, anggota: &Anggota) -> Vec<String> {
    vec![
        no_kk.to_string(),
        alamat.to_string(),
        anggota.nama.clone(),
        anggota.nik.clone(),
        anggota.jenis_kelamin.to_string(),
        anggota.tempat_lahir.clone(),
        anggota.tanggal_lahir.clone(),
        anggota.agama.clone(),
        anggota.pendidikan.clone(),
        anggota.jenis_pekerjaan.clone(),
        anggota.status_perkawinan.to_string(),
        anggota.status_hubungan.to_string(),
        anggota.kewarganegaraan.clone(),
        anggota.nama_ayah.clone(),
        anggota.nama_ibu.clone(),
    ]
}

// ============================================================================
// Authentication forms
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<LoginForm, ValidationErrors> {
        let mut check = Checker::new();
        let email = check.email("email", &self.email);
        if self.password.is_empty() {
            check.errors.push("password", "Password tidak boleh kosong.");
        }
        check.errors.into_result(LoginForm {
            email,
            password: self.password.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegisterForm {
    pub display_name: String,
    pub email: String,
    pub password: String,
}

impl RegisterForm {
    pub fn validate(&self) -> Result<RegisterForm, ValidationErrors> {
        let mut check = Checker::new();
        let display_name = self.display_name.trim().to_string();
        check.min_chars("displayName", "Nama", &display_name, MIN_DISPLAY_NAME_LEN);
        let email = check.email("email", &self.email);
        check.min_chars("password", "Password", &self.password, MIN_PASSWORD_LEN);
        check.errors.into_result(RegisterForm {
            display_name,
            email,
            password: self.password.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProfileForm {
    pub display_name: String,
}

impl ProfileForm {
    pub fn validate(&self) -> Result<ProfileForm, ValidationErrors> {
        let mut check = Checker::new();
        let display_name = self.display_name.trim().to_string();
        check.min_chars("displayName", "Nama", &display_name, MIN_DISPLAY_NAME_LEN);
        check.errors.into_result(ProfileForm { display_name })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PasswordChangeForm {
    pub old_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

impl PasswordChangeForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut check = Checker::new();
        if self.old_password.is_empty() {
            check.errors.push("oldPassword", "Password lama tidak boleh kosong.");
        }
        if self.new_password != self.confirm_password {
            check.errors.push(
                "confirmPassword",
                "Password baru dan konfirmasi password tidak cocok.",
            );
        }
        if self.new_password.chars().count() < MIN_PASSWORD_LEN {
            check.errors.push(
                "newPassword",
                format!("Password baru minimal harus {} karakter.", MIN_PASSWORD_LEN),
            );
        }
        check.errors.into_result(())
    }
}
