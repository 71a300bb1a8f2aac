//! Scripted in-process backend
//!
//! [`MemoryBackend`] stands in for a Postgres server in tests and benchmarks.
//! It understands the statements the session itself issues (`BEGIN`,
//! `COMMIT`, `ROLLBACK`, `DECLARE ... CURSOR FOR`, `FETCH FORWARD`, `CLOSE`)
//! and serves result sets registered up front for everything else. Unknown
//! statements succeed with no rows and are recorded as writes.
//!
//! ```
//! use pg_session::driver::MemoryBackend;
//!
//! let backend = MemoryBackend::new();
//! backend.register_series("SELECT n FROM numbers", "n", 3);
//! backend.refuse_connections(2);
//! let driver = backend.driver();
//! # let _ = driver;
//! ```

use super::{Driver, DriverConnection, DriverError, DriverErrorKind};
use crate::client::Credentials;
use crate::row::Row;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct ResultSet {
    columns: Arc<[String]>,
    rows: Vec<Vec<Option<String>>>,
}

impl ResultSet {
    fn to_rows(&self) -> VecDeque<Row> {
        self.rows
            .iter()
            .map(|values| Row::new(Arc::clone(&self.columns), values.clone()))
            .collect()
    }
}

#[derive(Debug, Default)]
struct ConnectionRecord {
    closed: bool,
    in_transaction: bool,
    aborted: bool,
    pending_writes: Vec<String>,
    cursors: HashMap<String, VecDeque<Row>>,
}

impl ConnectionRecord {
    fn end_transaction(&mut self) {
        self.in_transaction = false;
        self.aborted = false;
        self.pending_writes.clear();
        self.cursors.clear();
    }
}

#[derive(Debug, Default)]
struct BackendState {
    results: HashMap<String, ResultSet>,
    failing: HashMap<String, String>,
    refuse_remaining: u32,
    refuse_always: bool,
    reject_reason: Option<String>,
    connect_attempts: u32,
    connections: Vec<ConnectionRecord>,
    statements: Vec<String>,
    committed: Vec<String>,
    max_rows_per_response: usize,
}

/// Shared state of the scripted server
///
/// Cloning yields another handle to the same server.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<BackendState>>,
}

fn normalize(sql: &str) -> &str {
    sql.trim().trim_end_matches(';').trim_end()
}

fn starts_with_keyword(sql: &str, keyword: &str) -> bool {
    sql.get(..keyword.len())
        .map_or(false, |head| head.eq_ignore_ascii_case(keyword))
        && sql[keyword.len()..]
            .chars()
            .next()
            .map_or(true, char::is_whitespace)
}

/// Split a possibly quoted identifier off the front of `input`
fn take_identifier(input: &str) -> Option<(String, &str)> {
    let input = input.trim_start();
    if let Some(rest) = input.strip_prefix('"') {
        let mut name = String::new();
        let mut chars = rest.char_indices();
        while let Some((idx, c)) = chars.next() {
            if c == '"' {
                if rest[idx + 1..].starts_with('"') {
                    name.push('"');
                    chars.next();
                } else {
                    return Some((name, &rest[idx + 1..]));
                }
            } else {
                name.push(c);
            }
        }
        None
    } else {
        let end = input
            .find(|c: char| c.is_whitespace())
            .unwrap_or(input.len());
        if end == 0 {
            return None;
        }
        Some((input[..end].to_lowercase(), &input[end..]))
    }
}

fn find_keyword(haystack: &str, keyword: &str) -> Option<usize> {
    let lower = haystack.to_ascii_lowercase();
    let needle = format!(" {} ", keyword);
    lower.find(&needle).map(|pos| pos + needle.len())
}

fn fatal(message: impl Into<String>) -> DriverError {
    DriverError::new(DriverErrorKind::Fatal, message)
}

impl MemoryBackend {
    /// Create an empty backend that accepts every connection
    pub fn new() -> Self {
        Self::default()
    }

    /// Driver connecting to this backend
    pub fn driver(&self) -> MemoryDriver {
        MemoryDriver {
            backend: self.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register the result set returned for `sql`
    pub fn register(&self, sql: &str, columns: &[&str], rows: Vec<Vec<Option<String>>>) {
        let columns: Arc<[String]> = columns
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .into();
        self.lock()
            .results
            .insert(normalize(sql).to_string(), ResultSet { columns, rows });
    }

    /// Register a single-column result `1..=count` for `sql`
    pub fn register_series(&self, sql: &str, column: &str, count: usize) {
        let rows = (1..=count).map(|n| vec![Some(n.to_string())]).collect();
        self.register(sql, &[column], rows);
    }

    /// Make `sql` fail with `message` whenever it runs
    pub fn fail_statement(&self, sql: &str, message: &str) {
        self.lock()
            .failing
            .insert(normalize(sql).to_string(), message.to_string());
    }

    /// Refuse the next `count` connection attempts (transient failure)
    pub fn refuse_connections(&self, count: u32) {
        self.lock().refuse_remaining = count;
    }

    /// Refuse every connection attempt from now on (transient failure)
    pub fn refuse_all_connections(&self) {
        self.lock().refuse_always = true;
    }

    /// Accept connection attempts again
    pub fn accept_connections(&self) {
        let mut state = self.lock();
        state.refuse_always = false;
        state.refuse_remaining = 0;
        state.reject_reason = None;
    }

    /// Reject every connection attempt with a fatal error (e.g. bad password)
    pub fn reject_connections(&self, reason: &str) {
        self.lock().reject_reason = Some(reason.to_string());
    }

    /// Terminate every open connection server-side
    ///
    /// Clients see their handles as closed, the way a dropped TCP link or an
    /// idle timeout looks to a real driver.
    pub fn kill_connections(&self) {
        for conn in self.lock().connections.iter_mut() {
            conn.closed = true;
            conn.end_transaction();
        }
    }

    /// Number of connection attempts made so far
    pub fn connect_attempts(&self) -> u32 {
        self.lock().connect_attempts
    }

    /// Number of connections ever opened
    pub fn connections_opened(&self) -> usize {
        self.lock().connections.len()
    }

    /// Number of connections currently open
    pub fn open_connections(&self) -> usize {
        self.lock().connections.iter().filter(|c| !c.closed).count()
    }

    /// Whether any open connection is inside a transaction
    pub fn in_transaction(&self) -> bool {
        self.lock()
            .connections
            .iter()
            .any(|c| !c.closed && c.in_transaction)
    }

    /// Number of server-side cursors currently declared
    pub fn open_cursors(&self) -> usize {
        self.lock()
            .connections
            .iter()
            .filter(|c| !c.closed)
            .map(|c| c.cursors.len())
            .sum()
    }

    /// Every statement received, in order
    pub fn statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }

    /// Number of statements received
    pub fn statement_count(&self) -> usize {
        self.lock().statements.len()
    }

    /// Writes made durable (committed or run outside a transaction)
    pub fn committed(&self) -> Vec<String> {
        self.lock().committed.clone()
    }

    /// Largest number of rows returned by a single statement
    pub fn max_rows_per_response(&self) -> usize {
        self.lock().max_rows_per_response
    }

    fn connect(&self) -> std::result::Result<usize, DriverError> {
        let mut state = self.lock();
        state.connect_attempts += 1;
        if let Some(reason) = &state.reject_reason {
            return Err(fatal(reason.clone()));
        }
        if state.refuse_always {
            return Err(DriverError::new(
                DriverErrorKind::Transient,
                "connection refused",
            ));
        }
        if state.refuse_remaining > 0 {
            state.refuse_remaining -= 1;
            return Err(DriverError::new(
                DriverErrorKind::Transient,
                "connection refused",
            ));
        }
        state.connections.push(ConnectionRecord::default());
        Ok(state.connections.len() - 1)
    }

    fn is_closed(&self, id: usize) -> bool {
        self.lock().connections.get(id).map_or(true, |c| c.closed)
    }

    fn close(&self, id: usize) {
        if let Some(conn) = self.lock().connections.get_mut(id) {
            conn.closed = true;
            conn.end_transaction();
        }
    }

    fn run(&self, id: usize, sql: &str) -> std::result::Result<Vec<Row>, DriverError> {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.statements.push(sql.to_string());

        let conn = state
            .connections
            .get_mut(id)
            .filter(|c| !c.closed)
            .ok_or_else(|| DriverError::new(DriverErrorKind::Transient, "connection closed"))?;

        let sql = normalize(sql);
        let ends_transaction =
            starts_with_keyword(sql, "ROLLBACK") || starts_with_keyword(sql, "COMMIT");
        if conn.aborted && !ends_transaction {
            return Err(fatal(
                "current transaction is aborted, commands ignored until end of transaction block",
            ));
        }

        let result = Self::dispatch(conn, &state.results, &state.failing, &mut state.committed, sql);
        match &result {
            Ok(rows) => {
                state.max_rows_per_response = state.max_rows_per_response.max(rows.len());
            }
            Err(_) => {
                if conn.in_transaction {
                    conn.aborted = true;
                }
            }
        }
        result
    }

    fn dispatch(
        conn: &mut ConnectionRecord,
        results: &HashMap<String, ResultSet>,
        failing: &HashMap<String, String>,
        committed: &mut Vec<String>,
        sql: &str,
    ) -> std::result::Result<Vec<Row>, DriverError> {
        if starts_with_keyword(sql, "BEGIN") {
            conn.in_transaction = true;
            return Ok(Vec::new());
        }
        if starts_with_keyword(sql, "COMMIT") {
            if !conn.aborted {
                committed.append(&mut conn.pending_writes);
            }
            conn.end_transaction();
            return Ok(Vec::new());
        }
        if starts_with_keyword(sql, "ROLLBACK") {
            conn.end_transaction();
            return Ok(Vec::new());
        }
        if starts_with_keyword(sql, "DECLARE") {
            let (name, rest) = take_identifier(&sql["DECLARE".len()..])
                .ok_or_else(|| fatal("syntax error in DECLARE"))?;
            let query_start =
                find_keyword(rest, "for").ok_or_else(|| fatal("syntax error in DECLARE"))?;
            let query = normalize(&rest[query_start..]);
            if !conn.in_transaction {
                return Err(fatal(
                    "DECLARE CURSOR can only be used in transaction blocks",
                ));
            }
            if conn.cursors.contains_key(&name) {
                return Err(fatal(format!("cursor \"{}\" already exists", name)));
            }
            if let Some(message) = failing.get(query) {
                return Err(fatal(message.clone()));
            }
            let rows = results
                .get(query)
                .map(ResultSet::to_rows)
                .ok_or_else(|| fatal(format!("cannot open {} as a cursor", query)))?;
            conn.cursors.insert(name, rows);
            return Ok(Vec::new());
        }
        if starts_with_keyword(sql, "FETCH") {
            let mut words = sql.split_whitespace().skip(1);
            let direction = words.next().unwrap_or_default();
            if !direction.eq_ignore_ascii_case("FORWARD") {
                return Err(fatal("only FETCH FORWARD <n> is supported"));
            }
            let count: usize = words
                .next()
                .and_then(|n| n.parse().ok())
                .ok_or_else(|| fatal("syntax error in FETCH"))?;
            let from = find_keyword(sql, "from").ok_or_else(|| fatal("syntax error in FETCH"))?;
            let (name, _) =
                take_identifier(&sql[from..]).ok_or_else(|| fatal("syntax error in FETCH"))?;
            let cursor = conn
                .cursors
                .get_mut(&name)
                .ok_or_else(|| fatal(format!("cursor \"{}\" does not exist", name)))?;
            let take = count.min(cursor.len());
            return Ok(cursor.drain(..take).collect());
        }
        if starts_with_keyword(sql, "CLOSE") {
            let (name, _) = take_identifier(&sql["CLOSE".len()..])
                .ok_or_else(|| fatal("syntax error in CLOSE"))?;
            return match conn.cursors.remove(&name) {
                Some(_) => Ok(Vec::new()),
                None => Err(fatal(format!("cursor \"{}\" does not exist", name))),
            };
        }

        if let Some(message) = failing.get(sql) {
            return Err(fatal(message.clone()));
        }
        if let Some(result) = results.get(sql) {
            return Ok(result.to_rows().into());
        }
        if conn.in_transaction {
            conn.pending_writes.push(sql.to_string());
        } else {
            committed.push(sql.to_string());
        }
        Ok(Vec::new())
    }
}

/// Driver handing out connections to a [`MemoryBackend`]
#[derive(Debug, Clone)]
pub struct MemoryDriver {
    backend: MemoryBackend,
}

impl MemoryDriver {
    /// Backend this driver connects to
    pub fn backend(&self) -> &MemoryBackend {
        &self.backend
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    type Connection = MemoryConnection;

    async fn connect(
        &self,
        _credentials: &Credentials,
    ) -> std::result::Result<MemoryConnection, DriverError> {
        let id = self.backend.connect()?;
        Ok(MemoryConnection {
            id,
            backend: self.backend.clone(),
        })
    }
}

/// Connection to a [`MemoryBackend`]
#[derive(Debug)]
pub struct MemoryConnection {
    id: usize,
    backend: MemoryBackend,
}

#[async_trait]
impl DriverConnection for MemoryConnection {
    async fn query(&mut self, sql: &str) -> std::result::Result<Vec<Row>, DriverError> {
        self.backend.run(self.id, sql)
    }

    async fn execute(&mut self, sql: &str) -> std::result::Result<(), DriverError> {
        self.backend.run(self.id, sql).map(|_| ())
    }

    fn is_closed(&self) -> bool {
        self.backend.is_closed(self.id)
    }

    async fn close(self) -> std::result::Result<(), DriverError> {
        self.backend.close(self.id);
        Ok(())
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.backend.close(self.id);
    }
}
