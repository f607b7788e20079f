//! XML entity resolution.
//!
//! The five predefined entities live in an immutable table built once per
//! process. Numeric character references are memoized in a mutex-guarded
//! cache keyed by entity name, since real documents repeat the same handful
//! of references thousands of times.

use std::collections::HashMap;
use std::sync::Mutex;

use once_cell::sync::Lazy;

/// Outcome of resolving the text between `&` and `;`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Resolution {
    Resolved(char),
    /// A syntactically valid name the table does not know.
    UnknownName,
    /// A numeric reference that does not denote a Unicode scalar value.
    Malformed,
}

static PREDEFINED: Lazy<HashMap<&'static str, char>> = Lazy::new(|| {
    HashMap::from([
        ("amp", '&'),
        ("lt", '<'),
        ("gt", '>'),
        ("apos", '\''),
        ("quot", '"'),
    ])
});

static NUMERIC_CACHE: Lazy<Mutex<HashMap<String, char>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

pub(crate) fn resolve(name: &str) -> Resolution {
    if name.is_empty() {
        return Resolution::Malformed;
    }
    if let Some(&c) = PREDEFINED.get(name) {
        return Resolution::Resolved(c);
    }
    let Some(digits) = name.strip_prefix('#') else {
        return Resolution::UnknownName;
    };
    let mut cache = match NUMERIC_CACHE.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if let Some(&c) = cache.get(name) {
        return Resolution::Resolved(c);
    }
    let code = match digits.strip_prefix('x').or_else(|| digits.strip_prefix('X')) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => digits.parse::<u32>().ok(),
    };
    match code.and_then(char::from_u32) {
        Some(c) => {
            cache.insert(name.to_string(), c);
            Resolution::Resolved(c)
        }
        None => Resolution::Malformed,
    }
}
