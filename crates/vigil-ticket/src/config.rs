use jsonwebtoken::Algorithm;
use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub const DEFAULT_ISSUER: &str = "vigil";
pub const DEFAULT_VALIDITY_SECS: i64 = 300;
pub const DEFAULT_PAYMENT_PROTOCOL: &str = "x402";

pub const ENV_ISSUER: &str = "VIGIL_TICKET_ISSUER";
pub const ENV_ALG: &str = "VIGIL_TICKET_ALG";
pub const ENV_SECRET: &str = "VIGIL_TICKET_SECRET";
pub const ENV_PRIVATE_KEY_PATH: &str = "VIGIL_TICKET_PRIVATE_KEY_PATH";
pub const ENV_PUBLIC_KEY_PATH: &str = "VIGIL_TICKET_PUBLIC_KEY_PATH";
pub const ENV_TTL_SECS: &str = "VIGIL_TICKET_TTL_SECS";
pub const ENV_PAYMENT_PROTOCOL: &str = "VIGIL_PAYMENT_PROTOCOL";

/// Signing and verification key material. Never printed.
#[derive(Clone, Default)]
pub enum KeyMaterial {
    #[default]
    None,
    /// Shared secret for HS256/384/512.
    Secret(Vec<u8>),
    /// PEM-encoded keys for RSA, EC and EdDSA. Either half may be absent.
    Pem {
        private: Option<Vec<u8>>,
        public: Option<Vec<u8>>,
    },
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Secret(_) => f.write_str("Secret([REDACTED])"),
            Self::Pem { private, public } => f
                .debug_struct("Pem")
                .field("private", &private.as_ref().map(|_| "[REDACTED]"))
                .field("public", &public.is_some())
                .finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IssuerConfig {
    pub issuer: String,
    pub algorithm: Algorithm,
    pub key: KeyMaterial,
    pub default_validity_secs: i64,
    pub required_payment_protocol: String,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_string(),
            algorithm: Algorithm::HS256,
            key: KeyMaterial::None,
            default_validity_secs: DEFAULT_VALIDITY_SECS,
            required_payment_protocol: DEFAULT_PAYMENT_PROTOCOL.to_string(),
        }
    }
}

impl IssuerConfig {
    pub fn hs256(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            key: KeyMaterial::Secret(secret.into()),
            ..Self::default()
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads the `VIGIL_TICKET_*` settings through `lookup`. Invalid values are
    /// logged and the default kept.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(v) = lookup(ENV_ISSUER).filter(|v| !v.trim().is_empty()) {
            cfg.issuer = v.trim().to_string();
        }

        if let Some(v) = lookup(ENV_ALG) {
            match Algorithm::from_str(v.trim()) {
                Ok(alg) => cfg.algorithm = alg,
                Err(_) => warn_ignored(ENV_ALG, &v, "unknown JWS algorithm"),
            }
        }

        if let Some(v) = lookup(ENV_TTL_SECS) {
            match v.trim().parse::<i64>() {
                Ok(secs) => cfg.default_validity_secs = secs,
                Err(_) => warn_ignored(ENV_TTL_SECS, &v, "expected an integer number of seconds"),
            }
        }

        if let Some(v) = lookup(ENV_PAYMENT_PROTOCOL).filter(|v| !v.trim().is_empty()) {
            cfg.required_payment_protocol = v.trim().to_string();
        }

        if is_hmac(cfg.algorithm) {
            if let Some(secret) = lookup(ENV_SECRET).filter(|s| !s.is_empty()) {
                cfg.key = KeyMaterial::Secret(secret.into_bytes());
            }
        } else {
            let private =
                lookup(ENV_PRIVATE_KEY_PATH).and_then(|p| read_key_file(ENV_PRIVATE_KEY_PATH, &p));
            let public =
                lookup(ENV_PUBLIC_KEY_PATH).and_then(|p| read_key_file(ENV_PUBLIC_KEY_PATH, &p));
            if private.is_some() || public.is_some() {
                cfg.key = KeyMaterial::Pem { private, public };
            }
        }

        cfg
    }
}

pub(crate) fn is_hmac(alg: Algorithm) -> bool {
    matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

fn read_key_file(key: &str, path: &str) -> Option<Vec<u8>> {
    match std::fs::read(Path::new(path)) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            tracing::warn!(
                event = "config_invalid",
                reason = "W_TICKET_KEY_FILE",
                key,
                path,
                error = %e,
                "could not read key file; ignoring"
            );
            None
        }
    }
}

fn warn_ignored(key: &str, value: &str, why: &str) {
    tracing::warn!(
        event = "config_invalid",
        reason = "W_CONFIG_IGNORED",
        key,
        value,
        "{why}; using default"
    );
}
