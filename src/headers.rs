//! # Header normalization
//!
//! Spreadsheet headers arrive with arbitrary case, accents, punctuation and
//! spacing. They are folded to a canonical token and looked up in a fixed
//! Spanish synonym table to find the record field a column carries.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Canonical record field a spreadsheet column can map to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HeaderField {
    FullName,
    Email,
    MobilePhone,
    JobTitle,
    OfficePhone,
}

impl HeaderField {
    /// Fields a header row must carry to be accepted
    pub const REQUIRED: [HeaderField; 3] =
        [HeaderField::FullName, HeaderField::Email, HeaderField::JobTitle];

    pub fn as_str(self) -> &'static str {
        match self {
            HeaderField::FullName => "full_name",
            HeaderField::Email => "email",
            HeaderField::MobilePhone => "mobile_phone",
            HeaderField::JobTitle => "job_title",
            HeaderField::OfficePhone => "office_phone",
        }
    }
}

impl fmt::Display for HeaderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const SYNONYMS: &[(&str, HeaderField)] = &[
    ("Nombre", HeaderField::FullName),
    ("Correo Electrónico", HeaderField::Email),
    ("Correo Electronico", HeaderField::Email),
    ("Correo", HeaderField::Email),
    ("Celular", HeaderField::MobilePhone),
    ("Puesto", HeaderField::JobTitle),
    ("Teléfono Oficina", HeaderField::OfficePhone),
    ("Telefono Oficina", HeaderField::OfficePhone),
    ("Teléfono Ofi", HeaderField::OfficePhone),
    ("Telefono Ofi", HeaderField::OfficePhone),
];

static SYNONYM_TABLE: LazyLock<HashMap<String, HeaderField>> = LazyLock::new(|| {
    SYNONYMS
        .iter()
        .map(|(phrase, field)| (normalize(phrase), *field))
        .collect()
});

/// Fold header text to its canonical token.
///
/// Lower-cases, decomposes to NFD, drops combining marks and keeps only
/// `[a-z0-9]`. The result is stable under repeated application.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

/// Normalize an optional cell; anything that is not text folds to `""`.
pub fn normalize_cell(text: Option<&str>) -> String {
    text.map(normalize).unwrap_or_default()
}

/// Map a canonical token to its field, if the token is a known synonym.
pub fn lookup(token: &str) -> Option<HeaderField> {
    SYNONYM_TABLE.get(token).copied()
}
