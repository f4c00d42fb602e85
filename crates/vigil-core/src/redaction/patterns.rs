//! Built-in redaction table: PII, cloud credentials and wallet key material.
//!
//! Table order matters only when two rules match the same span; the earlier
//! entry wins.

use bip39::Language;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

/// Phrase lengths tried at each position, longest first.
const MNEMONIC_LENGTHS: [usize; 2] = [24, 12];

pub(crate) enum Matcher {
    Regex(Regex),
    /// Whitespace-separated runs of BIP39 English words, cut into 24- or 12-word phrases.
    Mnemonic,
}

pub(crate) struct BuiltinRule {
    pub kind: &'static str,
    pub matcher: Matcher,
    pub replacement: &'static str,
}

impl BuiltinRule {
    /// Non-empty match spans as byte ranges, in input order.
    pub(crate) fn spans(&self, input: &str) -> Vec<(usize, usize)> {
        match &self.matcher {
            Matcher::Regex(re) => re
                .find_iter(input)
                .filter(|m| !m.is_empty())
                .map(|m| (m.start(), m.end()))
                .collect(),
            Matcher::Mnemonic => mnemonic_spans(input),
        }
    }

    #[cfg(test)]
    pub(crate) fn is_match(&self, input: &str) -> bool {
        !self.spans(input).is_empty()
    }
}

fn rule(kind: &'static str, pattern: &str, replacement: &'static str) -> BuiltinRule {
    BuiltinRule {
        kind,
        // Patterns are compile-time constants covered by the tests below.
        matcher: Matcher::Regex(Regex::new(pattern).unwrap()),
        replacement,
    }
}

fn mnemonic_spans(input: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut run: Vec<(usize, usize)> = Vec::new();

    for word in MNEMONIC_WORD.find_iter(input) {
        let adjacent = run.last().is_some_and(|&(_, end)| {
            let gap = &input[end..word.start()];
            !gap.is_empty() && gap.chars().all(char::is_whitespace)
        });
        let known = BIP39_ENGLISH.contains(word.as_str());
        if !adjacent || !known {
            take_phrases(&run, &mut spans);
            run.clear();
        }
        if known {
            run.push((word.start(), word.end()));
        }
    }
    take_phrases(&run, &mut spans);
    spans
}

fn take_phrases(run: &[(usize, usize)], out: &mut Vec<(usize, usize)>) {
    let mut i = 0;
    while let Some(&len) = MNEMONIC_LENGTHS.iter().find(|&&n| run.len() - i >= n) {
        out.push((run[i].0, run[i + len - 1].1));
        i += len;
    }
}

lazy_static! {
    static ref MNEMONIC_WORD: Regex = Regex::new(r"\b[a-z]{3,8}\b").unwrap();
    static ref BIP39_ENGLISH: HashSet<&'static str> =
        Language::English.word_list().iter().copied().collect();
}

lazy_static! {
    pub(crate) static ref BUILTIN_RULES: Vec<BuiltinRule> = vec![
        rule(
            "pem_private_key",
            r"-----BEGIN (?:[A-Z]+ )?PRIVATE KEY-----(?:[\s\S]*?-----END (?:[A-Z]+ )?PRIVATE KEY-----)?",
            "[PRIVATE_KEY]",
        ),
        rule(
            "email",
            r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
            "[EMAIL]",
        ),
        rule(
            "aws_access_key",
            r"\b(?:AKIA|ASIA)[0-9A-Z]{16}\b",
            "[AWS_ACCESS_KEY]",
        ),
        rule(
            "aws_secret_key",
            r#"(?i)aws_?secret_?access_?key\s*[:=]\s*["']?[A-Za-z0-9/+=]{40}["']?"#,
            "[AWS_SECRET_KEY]",
        ),
        rule(
            "github_token",
            r"\b(?:gh[pousr]_[A-Za-z0-9]{36,}|github_pat_[A-Za-z0-9_]{22,})",
            "[GITHUB_TOKEN]",
        ),
        rule("google_api_key", r"\bAIza[0-9A-Za-z_-]{35}", "[GOOGLE_API_KEY]"),
        rule("slack_token", r"\bxox[abposr]-[A-Za-z0-9-]{10,}", "[SLACK_TOKEN]"),
        rule("api_key", r"\b(?:sk|pk|rk)[-_][A-Za-z0-9_-]{20,}", "[API_KEY]"),
        rule(
            "bearer_token",
            r"\b[Bb]earer\s+[A-Za-z0-9\-._~+/]{16,}=*",
            "Bearer [REDACTED]",
        ),
        rule(
            "keystore_ciphertext",
            r#""ciphertext"\s*:\s*"[A-Za-z0-9+/=]{32,}""#,
            r#""ciphertext":"[REDACTED]""#,
        ),
        rule(
            "private_key",
            r"\b(?:0x)?[a-fA-F0-9]{64}\b",
            "[PRIVATE_KEY]",
        ),
        rule(
            "btc_private_key",
            r"\b(?:[5KL][1-9A-HJ-NP-Za-km-z]{50,51}|xprv[1-9A-HJ-NP-Za-km-z]{107,108})\b",
            "[BTC_PRIVATE_KEY]",
        ),
        rule(
            "solana_private_key",
            r"\b[1-9A-HJ-NP-Za-km-z]{87,88}\b",
            "[SOLANA_PRIVATE_KEY]",
        ),
        BuiltinRule {
            kind: "mnemonic",
            matcher: Matcher::Mnemonic,
            replacement: "[MNEMONIC]",
        },
        rule(
            "derivation_path",
            r"\bm(?:/\d+['hH]?){3,6}",
            "[DERIVATION_PATH]",
        ),
        rule("ssn", r"\b\d{3}-\d{2}-\d{4}\b", "[SSN]"),
        rule(
            "credit_card",
            r"\b(?:\d{4}[- ]?){3}\d{4}\b|\b3[47]\d{2}[- ]?\d{6}[- ]?\d{5}\b",
            "[CREDIT_CARD]",
        ),
        rule(
            "phone",
            r"(?:\+?1[-.\s]?)?\(?\b[2-9]\d{2}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b",
            "[PHONE]",
        ),
        rule(
            "ipv4",
            r"\b(?:(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\.){3}(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\b",
            "[IP_ADDRESS]",
        ),
        rule(
            "street_address",
            r"\b\d{1,5}\s+(?:[A-Z][a-z]+\s+){1,3}(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Lane|Ln|Drive|Dr|Court|Ct|Way|Place|Pl)\b\.?",
            "[ADDRESS]",
        ),
    ];
}
