//! Declarative configuration document (§4.1, §6, §10.3).
//!
//! Deserializes the YAML document with `serde_yaml` and validates it into a
//! [`ExperimenterConfig`]: a typed schema plus execution policy. Mirrors the
//! original system's `OmegaConf`-backed loader (`config.py`), but resolves
//! value domains and logtable nesting at load time instead of lazily.

use std::collections::HashMap;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::schema::{KeyValue, Keyfield, Logtable, Resultfield, TableSchema, ValueDomain};

/// Which SQL backend a document targets (§4.5, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provider {
    EmbeddedSingleFile,
    Networked,
}

impl Provider {
    fn parse(raw: &str) -> Option<Provider> {
        match raw {
            "embedded-single-file" | "sqlite" => Some(Provider::EmbeddedSingleFile),
            "networked" | "postgres" | "postgresql" => Some(Provider::Networked),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawDocument {
    #[serde(rename = "Database")]
    database: RawDatabase,
    #[serde(default = "default_n_jobs")]
    n_jobs: u32,
    #[serde(rename = "Custom", default)]
    custom: HashMap<String, serde_yaml::Value>,
    #[serde(rename = "CodeCarbon", default)]
    codecarbon: Option<HashMap<String, serde_yaml::Value>>,
}

fn default_n_jobs() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
struct RawDatabase {
    provider: String,
    database: String,
    table: RawTable,
}

#[derive(Debug, Clone, Deserialize)]
struct RawTable {
    name: String,
    keyfields: IndexMap<String, RawKeyfield>,
    #[serde(default)]
    resultfields: IndexMap<String, RawResultfield>,
    #[serde(default)]
    result_timestamps: bool,
    #[serde(default)]
    logtables: IndexMap<String, IndexMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawResultfield {
    TypeOnly(String),
    Detailed { r#type: String },
}

impl RawResultfield {
    fn sql_type(&self) -> String {
        match self {
            RawResultfield::TypeOnly(t) => t.clone(),
            RawResultfield::Detailed { r#type } => r#type.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawKeyfield {
    #[serde(default)]
    r#type: Option<String>,
    values: RawValues,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawValues {
    List(Vec<RawScalar>),
    Interval {
        start: i64,
        stop: i64,
        #[serde(default)]
        step: Option<i64>,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawScalar {
    Integer(i64),
    Boolean(bool),
    Text(String),
}

impl From<RawScalar> for KeyValue {
    fn from(raw: RawScalar) -> Self {
        match raw {
            RawScalar::Integer(v) => KeyValue::Integer(v),
            RawScalar::Boolean(v) => KeyValue::Boolean(v),
            RawScalar::Text(v) => KeyValue::Text(v),
        }
    }
}

/// Default SQL type for a keyfield or resultfield whose config omits one:
/// a bounded variable-length string (§3, §4.1).
pub const DEFAULT_SQL_TYPE: &str = "VARCHAR(255)";

/// The validated, strongly typed product of loading a declarative document:
/// the table schema plus the execution policy surrounding it.
#[derive(Debug, Clone)]
pub struct ExperimenterConfig {
    pub provider: Provider,
    pub database_name: String,
    pub schema: TableSchema,
    pub n_jobs: u32,
    pub custom: HashMap<String, serde_yaml::Value>,
    pub codecarbon_enabled: bool,
}

impl ExperimenterConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DomainError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| DomainError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, DomainError> {
        let raw: RawDocument = serde_yaml::from_str(text)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawDocument) -> Result<Self, DomainError> {
        let provider = Provider::parse(&raw.database.provider)
            .ok_or_else(|| DomainError::UnsupportedProvider(raw.database.provider.clone()))?;

        let table_name = raw.database.table.name.clone();

        let mut keyfields = Vec::with_capacity(raw.database.table.keyfields.len());
        for (name, raw_kf) in &raw.database.table.keyfields {
            let domain = match &raw_kf.values {
                RawValues::List(values) => {
                    if values.is_empty() {
                        return Err(DomainError::InvalidKeyfield {
                            name: name.clone(),
                            reason: "value list must not be empty".into(),
                        });
                    }
                    ValueDomain::Explicit(values.iter().cloned().map(KeyValue::from).collect())
                }
                RawValues::Interval { start, stop, step } => ValueDomain::Interval {
                    start: *start,
                    stop: *stop,
                    step: step.unwrap_or(1),
                },
            };
            keyfields.push(Keyfield {
                name: name.clone(),
                sql_type: raw_kf
                    .r#type
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SQL_TYPE.to_string()),
                domain,
            });
        }

        let resultfields: Vec<Resultfield> = raw
            .database
            .table
            .resultfields
            .iter()
            .map(|(name, raw_rf)| Resultfield {
                name: name.clone(),
                sql_type: raw_rf.sql_type(),
            })
            .collect();

        let mut logtables = Vec::with_capacity(raw.database.table.logtables.len());
        for (suffix, columns) in &raw.database.table.logtables {
            if columns.is_empty() {
                return Err(DomainError::InvalidLogtable(
                    suffix.clone(),
                    "must declare at least one column".into(),
                ));
            }
            // §4.1: logtable names must nest under the main table name. The
            // config document keys logtables by suffix, so nesting is a
            // structural property of how the physical name is composed
            // (`<table>__<suffix>`) rather than something to re-validate
            // against a flat name here; we still reject a suffix that is
            // empty or equal to the table name itself, which would collide.
            if suffix.is_empty() || suffix == &table_name {
                return Err(DomainError::LogtableNotNested {
                    logtable: suffix.clone(),
                    table: table_name.clone(),
                });
            }
            logtables.push(Logtable {
                suffix: suffix.clone(),
                columns: columns.clone(),
            });
        }

        let schema = TableSchema {
            table_name,
            keyfields,
            resultfields,
            logtables,
            result_timestamps: raw.database.table.result_timestamps,
        };

        Ok(ExperimenterConfig {
            provider,
            database_name: raw.database.database,
            schema,
            n_jobs: raw.n_jobs,
            custom: raw.custom,
            codecarbon_enabled: raw.codecarbon.is_some(),
        })
    }
}
