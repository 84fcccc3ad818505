//! Header validation and canonical-field mapping
//!
//! Spreadsheet columns arrive with arbitrary spelling. Each raw header is
//! matched to a canonical field in three stages: exact synonym lookup on the
//! whitespace-normalised header, lookup on the "compacted" header (spaces and
//! `/ _ . -` removed), and finally a Jaro-Winkler fuzzy pass for headers that
//! are still unmatched, restricted to fields nobody has claimed yet.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

/// Minimum Jaro-Winkler similarity for a fuzzy header match
pub const FUZZY_THRESHOLD: f64 = 0.93;
/// Compacted headers shorter than this are never fuzzy-matched
pub const FUZZY_MIN_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
}

/// Canonical upload columns, in reporting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum CanonicalField {
    #[serde(rename = "FY")]
    Fy,
    #[serde(rename = "Month")]
    Month,
    #[serde(rename = "DBM")]
    Dbm,
    #[serde(rename = "Team Leader")]
    TeamLeader,
    #[serde(rename = "BDE")]
    Bde,
    #[serde(rename = "Target")]
    Target,
    #[serde(rename = "Admissions")]
    Admissions,
    #[serde(rename = "Points")]
    Points,
    #[serde(rename = "Closed Admissions")]
    ClosedAdmissions,
    #[serde(rename = "Cancellation/backout")]
    Cancellation,
    #[serde(rename = "Incomplete Form")]
    IncompleteForm,
    #[serde(rename = "Closed Point")]
    ClosedPoint,
    #[serde(rename = "Target %")]
    TargetPct,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 13] = [
        CanonicalField::Fy,
        CanonicalField::Month,
        CanonicalField::Dbm,
        CanonicalField::TeamLeader,
        CanonicalField::Bde,
        CanonicalField::Target,
        CanonicalField::Admissions,
        CanonicalField::Points,
        CanonicalField::ClosedAdmissions,
        CanonicalField::Cancellation,
        CanonicalField::IncompleteForm,
        CanonicalField::ClosedPoint,
        CanonicalField::TargetPct,
    ];

    pub fn label(self) -> &'static str {
        match self {
            CanonicalField::Fy => "FY",
            CanonicalField::Month => "Month",
            CanonicalField::Dbm => "DBM",
            CanonicalField::TeamLeader => "Team Leader",
            CanonicalField::Bde => "BDE",
            CanonicalField::Target => "Target",
            CanonicalField::Admissions => "Admissions",
            CanonicalField::Points => "Points",
            CanonicalField::ClosedAdmissions => "Closed Admissions",
            CanonicalField::Cancellation => "Cancellation/backout",
            CanonicalField::IncompleteForm => "Incomplete Form",
            CanonicalField::ClosedPoint => "Closed Point",
            CanonicalField::TargetPct => "Target %",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            CanonicalField::Fy
            | CanonicalField::Month
            | CanonicalField::Dbm
            | CanonicalField::TeamLeader
            | CanonicalField::Bde => FieldKind::Text,
            _ => FieldKind::Number,
        }
    }

    pub fn required(self) -> bool {
        true
    }

    /// Labels of every required field, in canonical order
    pub fn required_labels() -> Vec<String> {
        Self::ALL
            .iter()
            .filter(|f| f.required())
            .map(|f| f.label().to_string())
            .collect()
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Known spellings, already lower-cased with single spaces
const SYNONYMS: &[(&str, CanonicalField)] = &[
    ("fy", CanonicalField::Fy),
    ("financialyear", CanonicalField::Fy),
    ("fiscalyear", CanonicalField::Fy),
    ("year", CanonicalField::Fy),
    ("fiscal year", CanonicalField::Fy),
    ("month", CanonicalField::Month),
    ("dbm", CanonicalField::Dbm),
    ("deputybranchmanager", CanonicalField::Dbm),
    ("deputybranchmgr", CanonicalField::Dbm),
    ("deputy branch manager", CanonicalField::Dbm),
    ("teamleader", CanonicalField::TeamLeader),
    ("team lead", CanonicalField::TeamLeader),
    ("team leader", CanonicalField::TeamLeader),
    ("team_leader", CanonicalField::TeamLeader),
    ("team-leader", CanonicalField::TeamLeader),
    ("tl", CanonicalField::TeamLeader),
    ("teamlead", CanonicalField::TeamLeader),
    ("leader", CanonicalField::TeamLeader),
    ("bde", CanonicalField::Bde),
    ("businessdevelopmentexecutive", CanonicalField::Bde),
    ("bde_name", CanonicalField::Bde),
    ("bde name", CanonicalField::Bde),
    ("bde-name", CanonicalField::Bde),
    ("executive", CanonicalField::Bde),
    ("target", CanonicalField::Target),
    ("admissions", CanonicalField::Admissions),
    ("admission", CanonicalField::Admissions),
    ("points", CanonicalField::Points),
    ("closedadmissions", CanonicalField::ClosedAdmissions),
    ("closed_admissions", CanonicalField::ClosedAdmissions),
    ("closed admissions", CanonicalField::ClosedAdmissions),
    ("closed-admissions", CanonicalField::ClosedAdmissions),
    ("closedadmission", CanonicalField::ClosedAdmissions),
    ("closed_admission", CanonicalField::ClosedAdmissions),
    ("closed admission", CanonicalField::ClosedAdmissions),
    ("closed-admission", CanonicalField::ClosedAdmissions),
    ("cancellation", CanonicalField::Cancellation),
    ("cancellationbackout", CanonicalField::Cancellation),
    ("cancellation/backout", CanonicalField::Cancellation),
    ("cancellation_backout", CanonicalField::Cancellation),
    ("cancellation-backout", CanonicalField::Cancellation),
    ("cancelation", CanonicalField::Cancellation),
    ("backout", CanonicalField::Cancellation),
    ("cancellations", CanonicalField::Cancellation),
    ("incompleteform", CanonicalField::IncompleteForm),
    ("incomplete_form", CanonicalField::IncompleteForm),
    ("incomplete form", CanonicalField::IncompleteForm),
    ("incomplete-form", CanonicalField::IncompleteForm),
    ("incomplete forms", CanonicalField::IncompleteForm),
    ("incomplete_forms", CanonicalField::IncompleteForm),
    ("incomplete-forms", CanonicalField::IncompleteForm),
    ("incomplete", CanonicalField::IncompleteForm),
    ("closedpoints", CanonicalField::ClosedPoint),
    ("closed_points", CanonicalField::ClosedPoint),
    ("closed points", CanonicalField::ClosedPoint),
    ("closed-points", CanonicalField::ClosedPoint),
    ("closedpoint", CanonicalField::ClosedPoint),
    ("closed_point", CanonicalField::ClosedPoint),
    ("closed point", CanonicalField::ClosedPoint),
    ("closed-point", CanonicalField::ClosedPoint),
    ("target%", CanonicalField::TargetPct),
    ("targetpct", CanonicalField::TargetPct),
    ("target_pct", CanonicalField::TargetPct),
    ("target_percent", CanonicalField::TargetPct),
    ("target percent", CanonicalField::TargetPct),
    ("target-pct", CanonicalField::TargetPct),
    ("target %", CanonicalField::TargetPct),
    ("targetpercentage", CanonicalField::TargetPct),
];

/// How a header was matched
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchKind {
    Exact,
    Compact,
    Fuzzy(f64),
}

/// A canonical field bound to a column of the file
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnBinding {
    pub column: usize,
    pub raw_header: String,
    pub matched_by: MatchKind,
}

/// Outcome of header validation
#[derive(Debug, Clone, Default)]
pub struct HeaderValidation {
    pub mapping: BTreeMap<CanonicalField, ColumnBinding>,
    pub errors: Vec<String>,
    pub missing: Vec<CanonicalField>,
    pub unmapped: Vec<String>,
}

impl HeaderValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn column(&self, field: CanonicalField) -> Option<usize> {
        self.mapping.get(&field).map(|b| b.column)
    }

    /// Canonical label -> raw header, as reported to the uploader
    pub fn header_mapping(&self) -> BTreeMap<String, String> {
        self.mapping
            .iter()
            .map(|(field, binding)| (field.label().to_string(), binding.raw_header.clone()))
            .collect()
    }

    pub fn missing_labels(&self) -> Vec<String> {
        self.missing.iter().map(|f| f.label().to_string()).collect()
    }
}

/// Trim, collapse internal whitespace and lower-case
fn clean(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Drop spaces and the separators `/ _ . -`
fn compact(cleaned: &str) -> String {
    cleaned
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '/' | '_' | '.' | '-'))
        .collect()
}

fn exact_match(cleaned: &str) -> Option<CanonicalField> {
    SYNONYMS
        .iter()
        .find(|(synonym, _)| *synonym == cleaned)
        .map(|(_, field)| *field)
}

fn compact_match(compacted: &str) -> Option<CanonicalField> {
    SYNONYMS
        .iter()
        .find(|(synonym, _)| compact(synonym) == compacted)
        .map(|(_, field)| *field)
}

fn fuzzy_match(
    compacted: &str,
    candidates: &[CanonicalField],
) -> Option<(CanonicalField, f64)> {
    if compacted.chars().count() < FUZZY_MIN_LEN {
        return None;
    }

    let mut best: Option<(CanonicalField, f64)> = None;
    for (synonym, field) in SYNONYMS {
        if !candidates.contains(field) {
            continue;
        }
        let score = strsim::jaro_winkler(compacted, &compact(synonym));
        if score >= FUZZY_THRESHOLD && best.map_or(true, |(_, s)| score > s) {
            best = Some((*field, score));
        }
    }
    best
}

fn bind(
    result: &mut HeaderValidation,
    field: CanonicalField,
    column: usize,
    raw: &str,
    matched_by: MatchKind,
) {
    if result.mapping.contains_key(&field) {
        warn!(header = raw, field = %field, "Duplicate header");
        result.errors.push(format!(
            "Duplicate header detected: \"{raw}\" maps to \"{field}\" (already found)"
        ));
    } else {
        debug!(header = raw, field = %field, ?matched_by, "Header mapped");
        result.mapping.insert(
            field,
            ColumnBinding {
                column,
                raw_header: raw.to_string(),
                matched_by,
            },
        );
    }
}

/// Map raw headers to canonical fields and check that every required field
/// is present
pub fn validate_headers<S: AsRef<str>>(raw_headers: &[S]) -> HeaderValidation {
    let mut result = HeaderValidation::default();
    let mut pending: Vec<(usize, &str, String)> = Vec::new();

    for (column, raw) in raw_headers.iter().enumerate() {
        let raw = raw.as_ref();
        let cleaned = clean(raw);
        if cleaned.is_empty() {
            debug!(column, "Skipping blank header");
            continue;
        }

        if let Some(field) = exact_match(&cleaned) {
            bind(&mut result, field, column, raw, MatchKind::Exact);
            continue;
        }

        let compacted = compact(&cleaned);
        if let Some(field) = compact_match(&compacted) {
            bind(&mut result, field, column, raw, MatchKind::Compact);
            continue;
        }

        pending.push((column, raw, compacted));
    }

    for (column, raw, compacted) in pending {
        let candidates: Vec<CanonicalField> = CanonicalField::ALL
            .iter()
            .copied()
            .filter(|f| !result.mapping.contains_key(f))
            .collect();

        match fuzzy_match(&compacted, &candidates) {
            Some((field, score)) => {
                info!(header = raw, field = %field, score, "Header fuzzy-matched");
                bind(&mut result, field, column, raw, MatchKind::Fuzzy(score));
            }
            None => {
                warn!(header = raw, normalized = %compacted, "Unknown header ignored");
                result.unmapped.push(raw.to_string());
            }
        }
    }

    result.missing = CanonicalField::ALL
        .iter()
        .copied()
        .filter(|f| f.required() && !result.mapping.contains_key(f))
        .collect();

    if !result.missing.is_empty() {
        let labels = result.missing_labels().join(", ");
        result
            .errors
            .push(format!("Missing required headers: {labels}"));
    }

    result
}
