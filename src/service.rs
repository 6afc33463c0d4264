//! Well-known service exchange profiles.
//!
//! A profile describes how to talk to a service: which port it listens on,
//! what to send, which greeting prefix to expect, how to say goodbye, and
//! whether the connection is wrapped in TLS.
//!
//! The built-in table is a compile-time constant. Profiles loaded from the
//! configuration file live in a [`ServiceCatalog`] and shadow built-in
//! entries of the same name.

use std::collections::HashMap;

/// Default exchange for a service. Empty strings and port 0 mean "no default".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeProfile {
    pub port: u16,
    pub send: String,
    pub expect: String,
    pub quit: String,
    pub tls: bool,
}

/// Static table row.
struct BuiltinService {
    name: &'static str,
    port: u16,
    expect: &'static str,
    quit: &'static str,
    tls: bool,
}

const BUILTIN_SERVICES: &[BuiltinService] = &[
    BuiltinService { name: "FTP", port: 21, expect: "220", quit: "QUIT", tls: false },
    BuiltinService { name: "POP", port: 110, expect: "+OK", quit: "QUIT", tls: false },
    BuiltinService { name: "SPOP", port: 995, expect: "+OK", quit: "QUIT", tls: true },
    BuiltinService { name: "IMAP", port: 143, expect: "* OK", quit: "a1 LOGOUT", tls: false },
    BuiltinService { name: "SIMAP", port: 993, expect: "* OK", quit: "a1 LOGOUT", tls: true },
    BuiltinService { name: "SMTP", port: 25, expect: "220", quit: "QUIT", tls: false },
    BuiltinService { name: "SSMTP", port: 465, expect: "220", quit: "QUIT", tls: true },
];

impl From<&BuiltinService> for ExchangeProfile {
    fn from(svc: &BuiltinService) -> Self {
        Self {
            port: svc.port,
            send: String::new(),
            expect: svc.expect.to_string(),
            quit: svc.quit.to_string(),
            tls: svc.tls,
        }
    }
}

/// Normalize a service name for lookup and reporting.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_ascii_uppercase()
}

/// Look up a built-in profile. Unknown or empty names yield the zero profile.
pub fn lookup(name: &str) -> ExchangeProfile {
    let name = normalize_name(name);
    BUILTIN_SERVICES
        .iter()
        .find(|svc| svc.name == name)
        .map(ExchangeProfile::from)
        .unwrap_or_default()
}

/// Names of all built-in services, in table order.
pub fn builtin_names() -> impl Iterator<Item = &'static str> {
    BUILTIN_SERVICES.iter().map(|svc| svc.name)
}

/// Built-in profiles plus any defined in the configuration file.
#[derive(Debug, Clone, Default)]
pub struct ServiceCatalog {
    custom: HashMap<String, ExchangeProfile>,
}

impl ServiceCatalog {
    /// Create a catalog with only the built-in profiles.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom profile. Replaces any earlier entry with the same name.
    pub fn insert(&mut self, name: &str, profile: ExchangeProfile) {
        self.custom.insert(normalize_name(name), profile);
    }

    /// Resolve a service name, preferring custom entries over built-in ones.
    pub fn lookup(&self, name: &str) -> ExchangeProfile {
        match self.custom.get(&normalize_name(name)) {
            Some(profile) => profile.clone(),
            None => lookup(name),
        }
    }

    /// Whether `name` resolves to anything other than the zero profile.
    pub fn is_known(&self, name: &str) -> bool {
        let name = normalize_name(name);
        self.custom.contains_key(&name) || builtin_names().any(|known| known == name)
    }
}
