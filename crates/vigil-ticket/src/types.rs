use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Trust tier of the agent holding a ticket. Ordered `Bronze < Silver < Gold < Platinum`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl AuditLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bronze => "bronze",
            Self::Silver => "silver",
            Self::Gold => "gold",
            Self::Platinum => "platinum",
        }
    }
}

impl fmt::Display for AuditLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bronze" => Ok(Self::Bronze),
            "silver" => Ok(Self::Silver),
            "gold" => Ok(Self::Gold),
            "platinum" => Ok(Self::Platinum),
            other => Err(format!(
                "unknown audit level '{other}' (expected bronze, silver, gold or platinum)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketConstraints {
    pub max_op_value: f64,
    pub allowed_servers: BTreeSet<String>,
    pub kill_switch_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_ops_per_hour: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_restrictions: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_payment_proof: Option<bool>,
}

impl TicketConstraints {
    pub fn new(max_op_value: f64) -> Self {
        Self {
            max_op_value,
            allowed_servers: BTreeSet::new(),
            kill_switch_active: false,
            max_ops_per_hour: None,
            geo_restrictions: None,
            requires_payment_proof: None,
        }
    }

    pub fn allow_server(mut self, server: impl Into<String>) -> Self {
        self.allowed_servers.insert(server.into());
        self
    }

    pub fn with_kill_switch(mut self, active: bool) -> Self {
        self.kill_switch_active = active;
        self
    }

    pub fn with_max_ops_per_hour(mut self, n: f64) -> Self {
        self.max_ops_per_hour = Some(n);
        self
    }

    pub fn with_geo_restrictions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.geo_restrictions = Some(regions.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_payment_proof(mut self, required: bool) -> Self {
        self.requires_payment_proof = Some(required);
        self
    }

    pub fn payment_proof_required(&self) -> bool {
        self.requires_payment_proof.unwrap_or(false)
    }

    /// Structural checks shared by issuance and validation.
    pub(crate) fn check(&self) -> Result<(), String> {
        if !self.max_op_value.is_finite() || self.max_op_value <= 0.0 {
            return Err(format!(
                "maxOpValue must be a positive number, got {}",
                self.max_op_value
            ));
        }
        if let Some(n) = self.max_ops_per_hour {
            if !n.is_finite() || n <= 0.0 {
                return Err(format!("maxOpsPerHour must be a positive number, got {n}"));
            }
        }
        Ok(())
    }
}

/// Payload of a signed ticket. Keys are camelCase on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityTicket {
    pub issuer: String,
    pub subject: String,
    pub issued_at: i64,
    pub expires_at: i64,
    pub audit_level: AuditLevel,
    pub constraints: TicketConstraints,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TicketOptions {
    pub subject: String,
    pub audit_level: AuditLevel,
    pub constraints: TicketConstraints,
    /// Seconds; negative mints an already-expired ticket. Defaults to the issuer's TTL.
    pub validity_secs: Option<i64>,
    pub metadata: BTreeMap<String, Value>,
}

impl TicketOptions {
    pub fn new(
        subject: impl Into<String>,
        audit_level: AuditLevel,
        constraints: TicketConstraints,
    ) -> Self {
        Self {
            subject: subject.into(),
            audit_level,
            constraints,
            validity_secs: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_validity(mut self, secs: i64) -> Self {
        self.validity_secs = Some(secs);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentContext {
    pub protocol: String,
    #[serde(default)]
    pub tx_hash: Option<String>,
}

impl PaymentContext {
    pub fn new(protocol: impl Into<String>, tx_hash: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            tx_hash: Some(tx_hash.into()),
        }
    }
}

/// A proposed operation checked against a ticket's constraints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionRequest {
    pub value: f64,
    pub target_server: Option<String>,
    pub payment: Option<PaymentContext>,
}

impl TransactionRequest {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }

    pub fn to_server(mut self, server: impl Into<String>) -> Self {
        self.target_server = Some(server.into());
        self
    }

    pub fn with_payment(mut self, payment: PaymentContext) -> Self {
        self.payment = Some(payment);
        self
    }
}
