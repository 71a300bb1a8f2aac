//! Connection URL parsing
//!
//! Supports `postgres://[user[:password]@][host][:port][/database][?params]`.
//!
//! Every part is optional; whatever the URL leaves out is resolved from the
//! environment later. Recognised query parameters:
//! * `cursor_name`: server-side cursor name (enables streaming)
//! * `fetch_size`: rows per `FETCH`
//!
//! Other parameters are ignored.

use super::config::SessionConfigBuilder;
use crate::{Error, Result};

/// Extract a query parameter value from a query string
fn parse_query_param(query_string: &str, param: &str) -> Option<String> {
    if query_string.is_empty() {
        return None;
    }

    let query = query_string.trim_start_matches('?');

    for pair in query.split('&') {
        if let Some((key, value)) = pair.split_once('=') {
            if key == param {
                return Some(percent_decode(value));
            }
        }
    }
    None
}

/// Decode `%XX` escapes; malformed escapes are kept verbatim
fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Parse a connection URL into a config builder
pub(crate) fn parse(s: &str) -> Result<SessionConfigBuilder> {
    let rest = s
        .strip_prefix("postgres://")
        .or_else(|| s.strip_prefix("postgresql://"))
        .ok_or_else(|| Error::Config("connection string must start with postgres://".into()))?;

    let mut builder = SessionConfigBuilder::default();

    // Split off query string before parsing the authority
    let (rest, query_string) = match rest.find('?') {
        Some(q_pos) => rest.split_at(q_pos),
        None => (rest, ""),
    };

    // Format: [user[:password]@]host[:port][/database]
    let (auth, rest) = match rest.rfind('@') {
        Some(pos) => (Some(&rest[..pos]), &rest[pos + 1..]),
        None => (None, rest),
    };

    if let Some(auth) = auth {
        match auth.split_once(':') {
            Some((user, password)) => {
                builder = builder.user(percent_decode(user)).password(percent_decode(password));
            }
            None if !auth.is_empty() => builder = builder.user(percent_decode(auth)),
            None => {}
        }
    }

    let (host_port, database) = match rest.split_once('/') {
        Some((hp, db)) => (hp, Some(db)),
        None => (rest, None),
    };

    if let Some(db) = database.filter(|db| !db.is_empty()) {
        builder = builder.dbname(percent_decode(db));
    }

    let (host, port) = match host_port.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| Error::Config(format!("invalid port '{}'", port)))?;
            (host, Some(port))
        }
        None => (host_port, None),
    };

    if !host.is_empty() {
        builder = builder.host(host);
    }
    if let Some(port) = port {
        builder = builder.port(port);
    }

    if let Some(name) = parse_query_param(query_string, "cursor_name") {
        builder = builder.cursor_name(name);
    }
    if let Some(size) = parse_query_param(query_string, "fetch_size") {
        let size = size
            .parse::<usize>()
            .map_err(|_| Error::Config(format!("invalid fetch_size '{}'", size)))?;
        builder = builder.fetch_size(size);
    }

    Ok(builder)
}
