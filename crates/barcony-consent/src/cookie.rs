//! Cookie jar backend used as the fallback medium.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::backend::{StorageBackend, StorageError};

/// Characters left unescaped, matching `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const EXPIRES_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Largest cookie (name, value and attributes) a browser accepts.
pub const MAX_COOKIE_BYTES: usize = 4096;

#[derive(Debug, Clone)]
struct StoredCookie {
    value: String,
    expires: Option<DateTime<Utc>>,
    path: String,
    same_site: Option<String>,
    secure: bool,
}

/// A site-wide cookie jar with `document.cookie` semantics.
///
/// Writes go through a `Set-Cookie`-style string so expiry, path, SameSite
/// and Secure attributes are honoured exactly as a browser would.
#[derive(Debug)]
pub struct CookieStorage {
    jar: RwLock<HashMap<String, StoredCookie>>,
    disabled: AtomicBool,
    secure_transport: bool,
    lifetime_days: i64,
}

impl CookieStorage {
    /// Create a jar writing cookies that live for `lifetime_days`.
    pub fn new(lifetime_days: i64, secure_transport: bool) -> Self {
        Self {
            jar: RwLock::new(HashMap::new()),
            disabled: AtomicBool::new(false),
            secure_transport,
            lifetime_days,
        }
    }

    /// Enable or disable cookie storage.
    pub fn set_enabled(&self, enabled: bool) {
        self.disabled.store(!enabled, Ordering::SeqCst);
    }

    /// Build the cookie string for `key=value` expiring in `days`.
    pub fn cookie_string(&self, key: &str, value: &str, days: i64) -> String {
        let expires = Utc::now() + Duration::days(days);
        let secure = if self.secure_transport { ";Secure" } else { "" };
        format!(
            "{}={};expires={};path=/;SameSite=Lax{}",
            key,
            utf8_percent_encode(value, COMPONENT),
            expires.format(EXPIRES_FORMAT),
            secure
        )
    }

    /// Apply a cookie string to the jar, as assigning `document.cookie` does.
    pub fn apply(&self, cookie: &str) -> Result<(), StorageError> {
        if self.disabled.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(self.name()));
        }

        if cookie.len() > MAX_COOKIE_BYTES {
            return Err(StorageError::QuotaExceeded {
                needed: cookie.len(),
                capacity: MAX_COOKIE_BYTES,
            });
        }

        let mut parts = cookie.split(';');
        let pair = parts.next().unwrap_or_default();
        let Some((name, value)) = pair.split_once('=') else {
            return Err(StorageError::Backend(format!("Invalid cookie: {}", pair)));
        };

        let mut stored = StoredCookie {
            value: value.trim().to_string(),
            expires: None,
            path: "/".to_string(),
            same_site: None,
            secure: false,
        };

        for attr in parts {
            let attr = attr.trim();
            let (attr_name, attr_value) = attr.split_once('=').unwrap_or((attr, ""));
            match attr_name.to_ascii_lowercase().as_str() {
                "expires" => {
                    let parsed = NaiveDateTime::parse_from_str(attr_value, EXPIRES_FORMAT)
                        .map_err(|e| StorageError::Backend(format!("Invalid expiry: {}", e)))?;
                    stored.expires = Some(parsed.and_utc());
                }
                "path" => stored.path = attr_value.to_string(),
                "samesite" => stored.same_site = Some(attr_value.to_string()),
                "secure" => stored.secure = true,
                _ => {}
            }
        }

        if stored.secure && !self.secure_transport {
            return Err(StorageError::Backend(
                "Secure cookie rejected on insecure transport".to_string(),
            ));
        }

        let mut jar = self
            .jar
            .write()
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let name = name.trim().to_string();
        match stored.expires {
            Some(expires) if expires <= Utc::now() => {
                jar.remove(&name);
            }
            _ => {
                jar.insert(name, stored);
            }
        }

        Ok(())
    }

    /// Current cookies as `document.cookie` returns them.
    pub fn document_cookie(&self) -> String {
        let now = Utc::now();
        let Ok(jar) = self.jar.read() else {
            return String::new();
        };

        let mut pairs: Vec<String> = jar
            .iter()
            .filter(|(_, c)| c.expires.map_or(true, |e| e > now))
            .map(|(name, c)| format!("{}={}", name, c.value))
            .collect();
        pairs.sort();
        pairs.join("; ")
    }

    /// Attributes of a stored cookie: (path, SameSite, Secure).
    pub fn attributes(&self, key: &str) -> Option<(String, Option<String>, bool)> {
        let jar = self.jar.read().ok()?;
        jar.get(key)
            .map(|c| (c.path.clone(), c.same_site.clone(), c.secure))
    }

    /// Expiry of a stored cookie.
    pub fn expires(&self, key: &str) -> Option<DateTime<Utc>> {
        let jar = self.jar.read().ok()?;
        jar.get(key).and_then(|c| c.expires)
    }
}

impl StorageBackend for CookieStorage {
    fn name(&self) -> &'static str {
        "cookie"
    }

    fn test(&self) -> bool {
        !self.disabled.load(Ordering::SeqCst)
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if self.disabled.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(self.name()));
        }

        let prefix = format!("{}=", key);
        for cookie in self.document_cookie().split(';') {
            let cookie = cookie.trim();
            if let Some(raw) = cookie.strip_prefix(&prefix) {
                let decoded = percent_decode_str(raw)
                    .decode_utf8()
                    .map_err(|e| StorageError::Backend(e.to_string()))?;
                return Ok(Some(decoded.into_owned()));
            }
        }

        Ok(None)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.apply(&self.cookie_string(key, value, self.lifetime_days))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.apply(&self.cookie_string(key, "", -1))
    }
}
