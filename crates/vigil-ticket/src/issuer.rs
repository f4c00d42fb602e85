//! Ticket issuance and validation.
//!
//! Validation order is fixed and short-circuits: signature, payload shape,
//! expiry, kill switch. Transaction checks run only on a ticket that passed
//! all four.

use crate::config::{is_hmac, IssuerConfig, KeyMaterial};
use crate::error::{IssueError, KeyError, TicketError};
use crate::types::{CapabilityTicket, TicketOptions, TransactionRequest};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::{
    decode as jwt_decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use std::collections::HashSet;

pub struct TicketIssuer {
    config: IssuerConfig,
    encoding: Option<EncodingKey>,
    decoding: Option<DecodingKey>,
}

impl std::fmt::Debug for TicketIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketIssuer")
            .field("config", &self.config)
            .field("can_sign", &self.encoding.is_some())
            .field("can_verify", &self.decoding.is_some())
            .finish()
    }
}

fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

impl TicketIssuer {
    pub fn new(config: IssuerConfig) -> Result<Self, KeyError> {
        let alg = config.algorithm;
        let (encoding, decoding) = match (&config.key, is_hmac(alg)) {
            (KeyMaterial::Secret(secret), true) => (
                Some(EncodingKey::from_secret(secret)),
                Some(DecodingKey::from_secret(secret)),
            ),
            (_, true) => return Err(KeyError::MissingSecret(alg)),
            (KeyMaterial::Pem { private, public }, false) => {
                let encoding = private
                    .as_deref()
                    .map(|pem| encoding_key_from_pem(alg, pem))
                    .transpose()?;
                let decoding = public
                    .as_deref()
                    .map(|pem| decoding_key_from_pem(alg, pem))
                    .transpose()?;
                (encoding, decoding)
            }
            (_, false) => return Err(KeyError::MissingPem(alg)),
        };
        Ok(Self {
            config,
            encoding,
            decoding,
        })
    }

    pub fn config(&self) -> &IssuerConfig {
        &self.config
    }

    pub fn generate(&self, options: &TicketOptions) -> Result<String, IssueError> {
        self.generate_at(options, now_secs())
    }

    pub fn generate_at(&self, options: &TicketOptions, now: i64) -> Result<String, IssueError> {
        if options.subject.trim().is_empty() {
            return Err(IssueError::InvalidOptions("subject must not be empty".into()));
        }
        options
            .constraints
            .check()
            .map_err(IssueError::InvalidOptions)?;

        let key = self
            .encoding
            .as_ref()
            .ok_or(IssueError::MissingSigningKey(self.config.algorithm))?;

        let mut constraints = options.constraints.clone();
        constraints.requires_payment_proof.get_or_insert(true);

        let validity = options
            .validity_secs
            .unwrap_or(self.config.default_validity_secs);
        let ticket = CapabilityTicket {
            issuer: self.config.issuer.clone(),
            subject: options.subject.clone(),
            issued_at: now,
            expires_at: now.saturating_add(validity),
            audit_level: options.audit_level,
            constraints,
            metadata: options.metadata.clone(),
        };

        let token = encode(&Header::new(self.config.algorithm), &ticket, key)?;
        tracing::info!(
            event = "ticket_issued",
            subject = %ticket.subject,
            audit_level = %ticket.audit_level,
            expires_at = ticket.expires_at,
            "capability ticket issued"
        );
        Ok(token)
    }

    pub fn validate(&self, token: &str) -> Result<CapabilityTicket, TicketError> {
        self.validate_at(token, now_secs())
    }

    /// Same result as [`validate`](Self::validate); for async call sites.
    pub async fn validate_async(&self, token: &str) -> Result<CapabilityTicket, TicketError> {
        self.validate(token)
    }

    pub fn validate_at(&self, token: &str, now: i64) -> Result<CapabilityTicket, TicketError> {
        let result = self.check_ticket(token, now);
        if let Err(e) = &result {
            tracing::warn!(
                event = "ticket_rejected",
                reason = "W_TICKET_INVALID",
                code = e.code().as_str(),
                "{e}"
            );
        }
        result
    }

    fn check_ticket(&self, token: &str, now: i64) -> Result<CapabilityTicket, TicketError> {
        // 1. Signature
        let key = self
            .decoding
            .as_ref()
            .ok_or_else(|| TicketError::InvalidSignature("no verification key configured".into()))?;
        let claims = jwt_decode::<serde_json::Value>(token, key, &self.validation())
            .map_err(|e| TicketError::InvalidSignature(e.to_string()))?
            .claims;

        // 2. Shape
        let ticket: CapabilityTicket = serde_json::from_value(claims)
            .map_err(|e| TicketError::InvalidFormat(e.to_string()))?;
        if ticket.subject.trim().is_empty() {
            return Err(TicketError::InvalidFormat("subject is empty".into()));
        }
        ticket
            .constraints
            .check()
            .map_err(TicketError::InvalidFormat)?;

        // 3. Expiry
        if now > ticket.expires_at {
            return Err(TicketError::Expired {
                expires_at: ticket.expires_at,
                now,
            });
        }

        // 4. Kill switch
        if ticket.constraints.kill_switch_active {
            return Err(TicketError::KillSwitch);
        }

        Ok(ticket)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(self.config.algorithm);
        // Expiry lives in the ticket payload, not in registered claims.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();
        validation
    }

    pub fn validate_transaction(
        &self,
        token: &str,
        tx: &TransactionRequest,
    ) -> Result<CapabilityTicket, TicketError> {
        self.validate_transaction_at(token, tx, now_secs())
    }

    pub fn validate_transaction_at(
        &self,
        token: &str,
        tx: &TransactionRequest,
        now: i64,
    ) -> Result<CapabilityTicket, TicketError> {
        let ticket = self.validate_at(token, now)?;
        if let Err(msg) = self.check_transaction(&ticket, tx) {
            tracing::warn!(
                event = "ticket_constraint_violation",
                reason = "W_TICKET_CONSTRAINT",
                subject = %ticket.subject,
                "{msg}"
            );
            return Err(TicketError::ConstraintViolation(msg));
        }
        Ok(ticket)
    }

    fn check_transaction(
        &self,
        ticket: &CapabilityTicket,
        tx: &TransactionRequest,
    ) -> Result<(), String> {
        let c = &ticket.constraints;

        if tx.value.is_nan() || tx.value > c.max_op_value {
            return Err(format!(
                "Transaction value {} exceeds maximum allowed {}",
                tx.value, c.max_op_value
            ));
        }

        if let Some(server) = &tx.target_server {
            if !c.allowed_servers.contains(server) {
                let allowed: Vec<&str> = c.allowed_servers.iter().map(String::as_str).collect();
                return Err(format!(
                    "Server '{}' not in allowed servers: [{}]",
                    server,
                    allowed.join(", ")
                ));
            }
        }

        if c.payment_proof_required() {
            let required = self.config.required_payment_protocol.as_str();
            let protocol = tx.payment.as_ref().map(|p| p.protocol.as_str());
            if protocol != Some(required) {
                return Err(format!(
                    "Payment proof required: expected protocol '{}', got '{}'",
                    required,
                    protocol.unwrap_or("none")
                ));
            }
            let has_hash = tx
                .payment
                .as_ref()
                .and_then(|p| p.tx_hash.as_deref())
                .is_some_and(|h| !h.trim().is_empty());
            if !has_hash {
                return Err("Payment proof required: missing transaction hash".to_string());
            }
        }

        Ok(())
    }
}

fn encoding_key_from_pem(alg: Algorithm, pem: &[u8]) -> Result<EncodingKey, KeyError> {
    let key = match alg {
        Algorithm::ES256 | Algorithm::ES384 => EncodingKey::from_ec_pem(pem)?,
        Algorithm::EdDSA => EncodingKey::from_ed_pem(pem)?,
        _ => EncodingKey::from_rsa_pem(pem)?,
    };
    Ok(key)
}

fn decoding_key_from_pem(alg: Algorithm, pem: &[u8]) -> Result<DecodingKey, KeyError> {
    let key = match alg {
        Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(pem)?,
        Algorithm::EdDSA => DecodingKey::from_ed_pem(pem)?,
        _ => DecodingKey::from_rsa_pem(pem)?,
    };
    Ok(key)
}

/// Parse a ticket's payload without checking its signature. For debugging only.
pub fn decode(token: &str) -> Option<CapabilityTicket> {
    let mut parts = token.trim().split('.');
    let (_header, payload, _sig) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    serde_json::from_slice(&bytes).ok()
}
