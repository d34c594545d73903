use crate::error::ContractError;
use audita_types::{canonical_pretty, content_hash, ContentHash};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Identifies a contract. Serialized as its short code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ContractKind {
    #[serde(rename = "bmc")]
    Budget,
    #[serde(rename = "idc")]
    Idempotency,
    #[serde(rename = "refc")]
    Refusal,
    #[serde(rename = "toc")]
    Ordering,
    #[serde(rename = "tc")]
    Traceability,
    #[serde(rename = "ffc")]
    Fallback,
    #[serde(rename = "mcc")]
    Compliance,
    #[serde(rename = "cdc")]
    Concurrency,
    #[serde(rename = "rcc")]
    Risk,
    #[serde(rename = "sc")]
    Snapshot,
    #[serde(rename = "rec")]
    Retriever,
    #[serde(rename = "rc")]
    Routing,
    #[serde(rename = "asc")]
    Alignment,
    #[serde(rename = "cic")]
    Context,
}

impl ContractKind {
    pub const ALL: [ContractKind; 14] = [
        Self::Budget,
        Self::Idempotency,
        Self::Refusal,
        Self::Ordering,
        Self::Traceability,
        Self::Fallback,
        Self::Compliance,
        Self::Concurrency,
        Self::Risk,
        Self::Snapshot,
        Self::Retriever,
        Self::Routing,
        Self::Alignment,
        Self::Context,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Self::Budget => "bmc",
            Self::Idempotency => "idc",
            Self::Refusal => "refc",
            Self::Ordering => "toc",
            Self::Traceability => "tc",
            Self::Fallback => "ffc",
            Self::Compliance => "mcc",
            Self::Concurrency => "cdc",
            Self::Risk => "rcc",
            Self::Snapshot => "sc",
            Self::Retriever => "rec",
            Self::Routing => "rc",
            Self::Alignment => "asc",
            Self::Context => "cic",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Budget => "Budget & Monotonicity",
            Self::Idempotency => "Idempotency & Dedup",
            Self::Refusal => "Refusal",
            Self::Ordering => "Total Ordering",
            Self::Traceability => "Traceability",
            Self::Fallback => "Failure & Fallback",
            Self::Compliance => "Monotone Compliance",
            Self::Concurrency => "Concurrency Determinism",
            Self::Risk => "Risk Certificate",
            Self::Snapshot => "Snapshot",
            Self::Retriever => "Retriever",
            Self::Routing => "Routing",
            Self::Alignment => "Alignment Stability",
            Self::Context => "Context Immutability",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.to_ascii_lowercase();
        Self::ALL.into_iter().find(|k| k.code() == code)
    }

    /// Fixed certificate filename: `<code>_certificate.json`.
    pub fn certificate_filename(&self) -> String {
        format!("{}_certificate.json", self.code())
    }
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code().to_ascii_uppercase())
    }
}

/// The clause that failed when a certificate does not pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub clause: String,
    pub detail: String,
}

/// Audit record emitted by a contract verifier.
///
/// Sealed on construction: `certificate_hash` covers every other field, so any
/// later edit is caught by [`verify_integrity`](Self::verify_integrity).
/// Contract-specific fields are flattened into the top-level JSON object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContractCertificate {
    pub contract: ContractKind,
    pub pass: bool,
    pub inputs_digest: ContentHash,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violation: Option<Violation>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
    pub certificate_hash: ContentHash,
}

const RESERVED_KEYS: [&str; 5] = [
    "contract",
    "pass",
    "inputs_digest",
    "violation",
    "certificate_hash",
];

#[derive(Serialize)]
struct SealedFields<'a> {
    contract: ContractKind,
    pass: bool,
    inputs_digest: &'a ContentHash,
    violation: &'a Option<Violation>,
    fields: &'a BTreeMap<String, Value>,
}

impl ContractCertificate {
    fn compute_hash(
        contract: ContractKind,
        pass: bool,
        inputs_digest: &ContentHash,
        violation: &Option<Violation>,
        fields: &BTreeMap<String, Value>,
    ) -> ContentHash {
        content_hash(&SealedFields {
            contract,
            pass,
            inputs_digest,
            violation,
            fields,
        })
        .expect("certificate fields serializable")
    }

    /// Recompute the seal and compare.
    pub fn verify_integrity(&self) -> bool {
        Self::compute_hash(
            self.contract,
            self.pass,
            &self.inputs_digest,
            &self.violation,
            &self.fields,
        ) == self.certificate_hash
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Convert a failing certificate into a `Violation` error.
    pub fn ensure_pass(self) -> Result<Self, ContractError> {
        if self.pass {
            return Ok(self);
        }
        let (clause, detail) = match &self.violation {
            Some(v) => (v.clause.clone(), v.detail.clone()),
            None => ("unspecified".to_string(), "certificate did not pass".to_string()),
        };
        Err(ContractError::Violation {
            contract: self.contract,
            clause,
            detail,
        })
    }

    /// Pretty JSON with sorted keys; byte-identical for identical certificates.
    pub fn to_json(&self) -> Result<String, ContractError> {
        Ok(canonical_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ContractError> {
        serde_json::from_str(json).map_err(|e| ContractError::Serialization(e.to_string()))
    }

    /// Write `<code>_certificate.json` into `dir`.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, ContractError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.contract.certificate_filename());
        let mut json = self.to_json()?;
        json.push('\n');
        std::fs::write(&path, json)?;
        tracing::info!(
            contract = %self.contract,
            pass = self.pass,
            path = %path.display(),
            "Certificate written"
        );
        Ok(path)
    }

    pub fn read_from(path: &Path) -> Result<Self, ContractError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

/// Assembles and seals a [`ContractCertificate`]. The first recorded
/// violation wins.
pub struct CertificateBuilder {
    contract: ContractKind,
    inputs_digest: ContentHash,
    violation: Option<Violation>,
    fields: BTreeMap<String, Value>,
}

impl CertificateBuilder {
    pub fn new(contract: ContractKind, inputs_digest: ContentHash) -> Self {
        Self {
            contract,
            inputs_digest,
            violation: None,
            fields: BTreeMap::new(),
        }
    }

    /// Attach a contract-specific field. Reserved keys are ignored.
    pub fn field<T: Serialize + ?Sized>(mut self, key: &str, value: &T) -> Self {
        if RESERVED_KEYS.contains(&key) {
            tracing::warn!(key, "Ignoring reserved certificate field");
            return self;
        }
        let value = serde_json::to_value(value).expect("serializable");
        self.fields.insert(key.to_string(), value);
        self
    }

    /// Record a violation unless `holds`.
    pub fn check(self, holds: bool, clause: &str, detail: impl FnOnce() -> String) -> Self {
        if holds {
            self
        } else {
            self.violation(clause, detail())
        }
    }

    pub fn violation(mut self, clause: &str, detail: impl Into<String>) -> Self {
        if self.violation.is_none() {
            self.violation = Some(Violation {
                clause: clause.to_string(),
                detail: detail.into(),
            });
        }
        self
    }

    pub fn seal(self) -> ContractCertificate {
        let pass = self.violation.is_none();
        let certificate_hash = ContractCertificate::compute_hash(
            self.contract,
            pass,
            &self.inputs_digest,
            &self.violation,
            &self.fields,
        );
        if let Some(v) = &self.violation {
            tracing::warn!(
                contract = %self.contract,
                clause = %v.clause,
                detail = %v.detail,
                "Contract check failed"
            );
        }
        ContractCertificate {
            contract: self.contract,
            pass,
            inputs_digest: self.inputs_digest,
            violation: self.violation,
            fields: self.fields,
            certificate_hash,
        }
    }
}

/// Digest of a contract's inputs.
pub fn inputs_digest<T: Serialize + ?Sized>(inputs: &T) -> Result<ContentHash, ContractError> {
    Ok(content_hash(inputs)?)
}
