//! Path-driven PII masking for JSON payloads.
//!
//! Rules name a dotted field path and a [`MaskingType`]. The engine works on
//! a deep copy of the payload, so the caller's value is never touched, and
//! a rule that does not match anything is silently skipped.

use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::env::MASKING_HMAC_KEY_ENV;

type HmacSha256 = Hmac<Sha256>;

const MASK_CHAR: char = 'X';

/// Redaction applied to a matched string value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskingType {
    /// Mobile phone number.
    Msisdn,
    /// Fixed broadband number.
    Fbb,
    CreditCard,
    IdCard,
    BankAccount,
    FirstName,
    LastName,
    Email,
    Full,
    /// Keyed HMAC, hex encoded.
    Hash,
}

/// A field path plus the redaction to apply to it.
///
/// Paths are dot-separated. A single `*` segment means "every element of
/// the array at this position", e.g. `items.*.cardNo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskingRule {
    pub path: String,
    pub kind: MaskingType,
}

impl MaskingRule {
    pub fn new(path: impl Into<String>, kind: MaskingType) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Secret for [`MaskingType::Hash`]. Read-only once constructed.
#[derive(Clone, Default)]
pub struct MaskingKey(Option<Arc<[u8]>>);

impl MaskingKey {
    pub fn new(key: impl AsRef<[u8]>) -> Self {
        Self(Some(Arc::from(key.as_ref())))
    }

    /// A key that makes hash masking yield an empty string.
    pub fn none() -> Self {
        Self(None)
    }

    pub fn from_env() -> Self {
        match std::env::var(MASKING_HMAC_KEY_ENV) {
            Ok(key) if !key.is_empty() => Self::new(key),
            _ => Self::none(),
        }
    }

    fn bytes(&self) -> Option<&[u8]> {
        self.0.as_deref()
    }
}

impl fmt::Debug for MaskingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => f.write_str("MaskingKey([REDACTED])"),
            None => f.write_str("MaskingKey(None)"),
        }
    }
}

/// Applies [`MaskingRule`]s to JSON trees and masks single values.
#[derive(Debug, Clone, Default)]
pub struct Masker {
    key: MaskingKey,
}

impl Masker {
    pub fn new(key: MaskingKey) -> Self {
        Self { key }
    }

    /// Mask `payload` according to `rules`.
    ///
    /// With no rules the input is returned borrowed and untouched. Otherwise
    /// a deep copy is rewritten; a top-level array has every rule applied
    /// to each of its elements.
    pub fn mask<'a>(&self, payload: &'a Value, rules: &[MaskingRule]) -> Cow<'a, Value> {
        if rules.is_empty() {
            return Cow::Borrowed(payload);
        }

        let mut clone = payload.clone();
        match &mut clone {
            Value::Array(items) => {
                for item in items.iter_mut() {
                    self.apply_rules(item, rules);
                }
            }
            other => self.apply_rules(other, rules),
        }
        Cow::Owned(clone)
    }

    fn apply_rules(&self, target: &mut Value, rules: &[MaskingRule]) {
        for rule in rules {
            let segments: Vec<&str> = rule.path.split('.').collect();
            self.apply_path(target, &segments, rule.kind);
        }
    }

    fn apply_path(&self, target: &mut Value, segments: &[&str], kind: MaskingType) {
        let Some(star) = segments.iter().position(|s| *s == "*") else {
            self.mask_leaf(target, segments, kind);
            return;
        };

        let (root, rest) = (&segments[..star], &segments[star + 1..]);
        let Some(Value::Array(items)) = lookup_mut(target, root) else {
            return;
        };
        for item in items.iter_mut() {
            if rest.is_empty() {
                if let Value::String(s) = item {
                    *s = self.mask_value(s, kind);
                }
            } else {
                self.mask_leaf(item, rest, kind);
            }
        }
    }

    fn mask_leaf(&self, target: &mut Value, segments: &[&str], kind: MaskingType) {
        let Some((last, parents)) = segments.split_last() else {
            return;
        };
        let Some(Value::Object(parent)) = lookup_mut(target, parents) else {
            return;
        };
        if let Some(Value::String(s)) = parent.get_mut(*last) {
            *s = self.mask_value(s, kind);
        }
    }

    /// Mask one scalar value.
    pub fn mask_value(&self, value: &str, kind: MaskingType) -> String {
        match kind {
            MaskingType::Msisdn => keep_ends(value, 7, 3, 4),
            MaskingType::Fbb => keep_ends(value, 6, 2, 4),
            MaskingType::CreditCard => keep_ends(value, 11, 6, 4),
            MaskingType::BankAccount => keep_ends(value, 8, 4, 3),
            MaskingType::IdCard => keep_ends(value, 4, 0, 4),
            MaskingType::Email => censor_email(value),
            MaskingType::FirstName | MaskingType::LastName => keep_ends(value, 3, 3, 0),
            MaskingType::Full => mask_run(value.chars().count()),
            MaskingType::Hash => self.hmac(value),
        }
    }

    fn hmac(&self, value: &str) -> String {
        let Some(key) = self.key.bytes() else {
            return String::new();
        };
        match HmacSha256::new_from_slice(key) {
            Ok(mut mac) => {
                mac.update(value.as_bytes());
                hex::encode(mac.finalize().into_bytes())
            }
            Err(_) => String::new(),
        }
    }
}

/// Walk object keys; `None` when a segment is missing or not an object.
fn lookup_mut<'v>(mut current: &'v mut Value, segments: &[&str]) -> Option<&'v mut Value> {
    for segment in segments {
        current = current.as_object_mut()?.get_mut(*segment)?;
    }
    Some(current)
}

fn mask_run(len: usize) -> String {
    std::iter::repeat(MASK_CHAR).take(len).collect()
}

/// Keep `head` leading and `tail` trailing chars, mask the middle.
/// Values shorter than `min_len` are returned unchanged.
fn keep_ends(value: &str, min_len: usize, head: usize, tail: usize) -> String {
    let chars: Vec<char> = value.chars().collect();
    let len = chars.len();
    if len < min_len {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len());
    out.extend(&chars[..head]);
    out.push_str(&mask_run(len - head - tail));
    out.extend(&chars[len - tail..]);
    out
}

fn censor_email(value: &str) -> String {
    if value.chars().count() < 3 {
        return value.to_string();
    }
    value
        .chars()
        .enumerate()
        .map(|(i, c)| {
            if i >= 3 && c.is_ascii_alphanumeric() {
                MASK_CHAR
            } else {
                c
            }
        })
        .collect()
}
