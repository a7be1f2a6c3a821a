//! Dataset schema registry
//!
//! Defines the canonical input column set per mission, the target column,
//! the fixed disposition label enumeration, and the focus-feature subset
//! surfaced by explainability reports. Pure data; no fitting behavior.

use crate::error::{Result, TransitError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Final label class for a transit candidate.
///
/// The variant order here is the canonical label enumeration: confusion
/// matrices, probability vectors, and target encodings all follow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Confirmed,
    Candidate,
    FalsePositive,
}

impl Disposition {
    /// All classes in canonical enumeration order
    pub const ALL: [Disposition; 3] = [
        Disposition::Confirmed,
        Disposition::Candidate,
        Disposition::FalsePositive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Confirmed => "confirmed",
            Disposition::Candidate => "candidate",
            Disposition::FalsePositive => "false_positive",
        }
    }

    /// Position in the canonical enumeration; also the target encoding
    pub fn index(&self) -> usize {
        match self {
            Disposition::Confirmed => 0,
            Disposition::Candidate => 1,
            Disposition::FalsePositive => 2,
        }
    }

    pub fn from_index(idx: usize) -> Option<Disposition> {
        Self::ALL.get(idx).copied()
    }

    /// Standardize a raw disposition string from any supported mission
    /// catalog. Kepler/K2 spell labels out (`CONFIRMED`, `FALSE POSITIVE`),
    /// TESS/TOI abbreviates (`CP`, `PC`, `FP`). Unrecognized values map to
    /// `None` and are treated as unlabeled.
    pub fn parse(raw: &str) -> Option<Disposition> {
        match raw.trim().to_uppercase().as_str() {
            "CONFIRMED" | "CP" | "KP" => Some(Disposition::Confirmed),
            "CANDIDATE" | "PC" => Some(Disposition::Candidate),
            "FALSE POSITIVE" | "FALSE_POSITIVE" | "FP" => Some(Disposition::FalsePositive),
            _ => None,
        }
    }
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schema for one dataset family.
///
/// Configured once per mission and immutable thereafter. The focus features
/// are the fixed subset an external report must highlight; they must be a
/// subset of the feature columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Expected feature columns, in canonical order
    feature_columns: Vec<String>,
    /// Target column holding the raw disposition label
    target_column: String,
    /// Fixed ordered subset of feature columns surfaced by explainability
    focus_features: Vec<String>,
    /// Identifier/provenance columns; stripped before modeling, used only
    /// to tag prediction results
    identifier_columns: Vec<String>,
    /// Mission-specific column name -> canonical column name
    column_aliases: HashMap<String, String>,
}

/// The six canonical transit observables every mission report highlights
const FOCUS_FEATURES: [&str; 6] = [
    "koi_model_snr",
    "koi_depth",
    "koi_prad",
    "koi_teq",
    "koi_duration",
    "koi_period",
];

const CANONICAL_FEATURES: [&str; 10] = [
    "koi_model_snr",
    "koi_depth",
    "koi_prad",
    "koi_teq",
    "koi_duration",
    "koi_period",
    "koi_steff",
    "koi_srad",
    "koi_slogg",
    "koi_impact",
];

const IDENTIFIER_COLUMNS: [&str; 7] = [
    "id", "kepid", "rowid", "index", "kepoi_name", "kepler_name", "toi",
];

impl Schema {
    /// Build a schema, validating that every focus feature is a declared
    /// feature column.
    pub fn new(
        feature_columns: Vec<String>,
        target_column: impl Into<String>,
        focus_features: Vec<String>,
    ) -> Result<Self> {
        for focus in &focus_features {
            if !feature_columns.contains(focus) {
                return Err(TransitError::MissingFocusFeature(focus.clone()));
            }
        }
        Ok(Self {
            feature_columns,
            target_column: target_column.into(),
            focus_features,
            identifier_columns: IDENTIFIER_COLUMNS.iter().map(|s| s.to_string()).collect(),
            column_aliases: HashMap::new(),
        })
    }

    /// Kepler Objects of Interest catalog
    pub fn kepler() -> Self {
        Self::canonical("koi_disposition")
    }

    /// K2 planets-and-candidates catalog; same columns, different target name
    pub fn k2() -> Self {
        Self::canonical("disposition")
    }

    /// TESS Objects of Interest catalog; maps `pl_*`/`st_*` names onto the
    /// canonical columns
    pub fn toi() -> Self {
        let mut schema = Self::canonical("tfopwg_disp");
        schema.column_aliases = [
            ("pl_trandep", "koi_depth"),
            ("pl_trandurh", "koi_duration"),
            ("pl_trandur", "koi_duration"),
            ("pl_orbper", "koi_period"),
            ("pl_rade", "koi_prad"),
            ("pl_eqt", "koi_teq"),
            ("st_teff", "koi_steff"),
            ("st_rad", "koi_srad"),
            ("st_logg", "koi_slogg"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        schema
    }

    fn canonical(target: &str) -> Self {
        Self {
            feature_columns: CANONICAL_FEATURES.iter().map(|s| s.to_string()).collect(),
            target_column: target.to_string(),
            focus_features: FOCUS_FEATURES.iter().map(|s| s.to_string()).collect(),
            identifier_columns: IDENTIFIER_COLUMNS.iter().map(|s| s.to_string()).collect(),
            column_aliases: HashMap::new(),
        }
    }

    /// Look up a preset by mission name
    pub fn for_mission(mission: &str) -> Result<Self> {
        match mission.to_lowercase().as_str() {
            "kepler" => Ok(Self::kepler()),
            "k2" => Ok(Self::k2()),
            "toi" | "tess" => Ok(Self::toi()),
            other => Err(TransitError::DataError(format!(
                "unknown mission '{other}' (expected kepler, k2, or toi)"
            ))),
        }
    }

    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    pub fn focus_features(&self) -> &[String] {
        &self.focus_features
    }

    pub fn identifier_columns(&self) -> &[String] {
        &self.identifier_columns
    }

    /// All classes in the fixed enumeration order
    pub fn labels(&self) -> &'static [Disposition; 3] {
        &Disposition::ALL
    }

    /// Resolve a raw (possibly mission-specific) column name to its
    /// canonical name.
    pub fn canonical_column<'a>(&'a self, raw: &'a str) -> &'a str {
        self.column_aliases.get(raw).map(String::as_str).unwrap_or(raw)
    }

    /// Whether the column carries identity/provenance rather than features
    pub fn is_identifier(&self, column: &str) -> bool {
        self.identifier_columns.iter().any(|c| c == column)
    }
}
