//! Merging user-supplied exchange fields with service defaults.
//!
//! Every field is optional so that "not given" and "given as empty" stay
//! distinct: `--expect ""` disables prefix validation even when the
//! selected service has a default greeting.

use bytes::Bytes;

use crate::escape;
use crate::service::ExchangeProfile;

/// Line terminator appended to plain-text quit commands.
pub const LINE_TERMINATOR: &str = "\r\n";

/// Exchange fields as entered by the user (CLI layered over config file).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exchange {
    pub port: Option<u16>,
    pub send: Option<String>,
    pub expect: Option<String>,
    pub quit: Option<String>,
    pub tls: Option<bool>,
}

/// Exchange ready for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedExchange {
    /// `None` when neither the user nor the service supplied a port.
    pub port: Option<u16>,
    pub send: Bytes,
    pub expect: String,
    pub quit: Bytes,
    pub tls: bool,
}

impl Exchange {
    /// Layer `other` underneath `self`: only fields unset here are taken from it.
    pub fn or(self, other: Exchange) -> Exchange {
        Exchange {
            port: self.port.or(other.port),
            send: self.send.or(other.send),
            expect: self.expect.or(other.expect),
            quit: self.quit.or(other.quit),
            tls: self.tls.or(other.tls),
        }
    }

    /// Fill unset fields from a service profile. User values always win.
    pub fn merge(&mut self, profile: &ExchangeProfile) {
        if self.port.is_none() && profile.port != 0 {
            self.port = Some(profile.port);
        }
        fill_text(&mut self.send, &profile.send);
        fill_text(&mut self.expect, &profile.expect);
        fill_text(&mut self.quit, &profile.quit);
        if self.tls.is_none() && profile.tls {
            self.tls = Some(true);
        }
    }

    /// Produce wire payloads.
    ///
    /// With `escape` on, send and quit go through the escape decoder and are
    /// otherwise left alone. With it off, a non-empty quit command gets a
    /// CRLF terminator unless it already ends with one.
    pub fn resolve(self, escape: bool) -> ResolvedExchange {
        let mut send = self.send.unwrap_or_default();
        let mut quit = self.quit.unwrap_or_default();

        if escape {
            send = escape::decode(&send);
            quit = escape::decode(&quit);
        } else if !quit.is_empty() && !quit.ends_with(LINE_TERMINATOR) {
            quit.push_str(LINE_TERMINATOR);
        }

        ResolvedExchange {
            port: self.port,
            send: Bytes::from(send),
            expect: self.expect.unwrap_or_default(),
            quit: Bytes::from(quit),
            tls: self.tls.unwrap_or(false),
        }
    }
}

fn fill_text(field: &mut Option<String>, default: &str) {
    if field.is_none() && !default.is_empty() {
        *field = Some(default.to_string());
    }
}
