use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The fixed metadata columns surrounding keyfields/resultfields in the main
/// table, in the order they appear in the schema (see DATA MODEL, §3).
pub const METADATA_COLUMNS_BEFORE_RESULTS: &[&str] =
    &["creation_date", "status", "start_date", "name", "machine"];
pub const METADATA_COLUMNS_AFTER_RESULTS: &[&str] = &["end_date", "error"];

/// A single input-dimension column. The ordered union of all keyfields forms
/// the semantic primary key of an experiment row; the table's actual primary
/// key is a synthetic autoincrement `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyfield {
    pub name: String,
    /// SQL type as written into `CREATE TABLE`; defaults to a bounded
    /// variable-length string when omitted from the config document.
    pub sql_type: String,
    pub domain: ValueDomain,
}

/// The value domain declared for a keyfield: either an explicit list of
/// values or a closed integer interval with an optional step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueDomain {
    Explicit(Vec<KeyValue>),
    Interval {
        start: i64,
        stop: i64,
        #[serde(default = "default_step")]
        step: i64,
    },
}

fn default_step() -> i64 {
    1
}

impl ValueDomain {
    /// Materializes the domain into its concrete ordered list of values.
    /// Interval bounds are half-open, matching an integer range: `stop` is
    /// excluded.
    pub fn values(&self) -> Vec<KeyValue> {
        match self {
            ValueDomain::Explicit(values) => values.clone(),
            ValueDomain::Interval { start, stop, step } => {
                let mut out = Vec::new();
                if *step == 0 {
                    return out;
                }
                let mut v = *start;
                if *step > 0 {
                    while v < *stop {
                        out.push(KeyValue::Integer(v));
                        v += step;
                    }
                } else {
                    while v > *stop {
                        out.push(KeyValue::Integer(v));
                        v += step;
                    }
                }
                out
            }
        }
    }
}

/// The canonical representation of a keyfield's runtime value. Used both to
/// pass values into the user routine and to compare existing vs. new
/// combinations during dedup (§4.2): strings serialize their value, integers
/// and booleans their literal form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyValue {
    Integer(i64),
    Boolean(bool),
    Text(String),
}

impl KeyValue {
    /// The representation used both on insert and when comparing against an
    /// existing row's stored value, so dedup never depends on how a value
    /// happened to be typed at the call site.
    pub fn canonical_string(&self) -> String {
        match self {
            KeyValue::Integer(v) => v.to_string(),
            KeyValue::Boolean(v) => v.to_string(),
            KeyValue::Text(v) => v.clone(),
        }
    }
}

impl std::fmt::Display for KeyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical_string())
    }
}

/// An output column written by the experiment routine, optionally paired
/// with a sibling `<name>_timestamp` column written atomically alongside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resultfield {
    pub name: String,
    pub sql_type: String,
}

impl Resultfield {
    pub fn timestamp_column(&self) -> String {
        format!("{}_timestamp", self.name)
    }
}

/// A child table for append-only per-experiment log lines. Stored keyed by
/// its suffix (the table is physically named `<main>__<suffix>`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Logtable {
    pub suffix: String,
    pub columns: IndexMap<String, String>,
}

impl Logtable {
    pub fn table_name(&self, main_table: &str) -> String {
        format!("{main_table}__{}", self.suffix)
    }
}

/// The full, validated description of one experiment table: name, ordered
/// keyfields, resultfields, logtables, and the timestamp-on-result flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub table_name: String,
    pub keyfields: Vec<Keyfield>,
    pub resultfields: Vec<Resultfield>,
    pub logtables: Vec<Logtable>,
    pub result_timestamps: bool,
}

impl TableSchema {
    pub fn keyfield_names(&self) -> Vec<&str> {
        self.keyfields.iter().map(|k| k.name.as_str()).collect()
    }

    /// The full non-metadata column set a correctly structured main table
    /// must have: keyfields ∪ resultfields ∪ (resultfield timestamps, if
    /// enabled). Used to validate an existing table (§4.2 ensure schema).
    pub fn declared_columns(&self) -> Vec<String> {
        let mut cols: Vec<String> = self.keyfields.iter().map(|k| k.name.clone()).collect();
        for r in &self.resultfields {
            cols.push(r.name.clone());
            if self.result_timestamps {
                cols.push(r.timestamp_column());
            }
        }
        cols
    }

    pub fn logtable_by_suffix(&self, suffix: &str) -> Option<&Logtable> {
        self.logtables.iter().find(|l| l.suffix == suffix)
    }

    pub fn resultfield_by_name(&self, name: &str) -> Option<&Resultfield> {
        self.resultfields.iter().find(|r| r.name == name)
    }
}
