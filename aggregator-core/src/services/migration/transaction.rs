//! Transactional runner for migration steps

use std::cell::Cell;

use duckdb::{Connection, Params, Row, Statement};
use sqlparser::dialect::DuckDbDialect;
use sqlparser::tokenizer::{Token, Tokenizer};

use crate::domain::result::{Error, Result};

/// Statements that would end or nest the runner's transaction
const TRANSACTION_CONTROL: &[&str] = &["BEGIN", "START", "COMMIT", "END", "ROLLBACK", "ABORT", "SAVEPOINT", "RELEASE"];

/// Refuse SQL containing a transaction control statement.
///
/// Checked on tokens, so keywords inside string literals, quoted identifiers
/// and comments don't count. SQL the tokenizer rejects is left to DuckDB.
fn reject_transaction_control(sql: &str) -> Result<()> {
    let dialect = DuckDbDialect {};
    let Ok(tokens) = Tokenizer::new(&dialect, sql).tokenize() else {
        return Ok(());
    };

    let mut statement_start = true;
    for token in tokens {
        match token {
            Token::Whitespace(_) => {}
            Token::SemiColon => statement_start = true,
            Token::Word(word) if statement_start => {
                let keyword = word.value.to_ascii_uppercase();
                if word.quote_style.is_none() && TRANSACTION_CONTROL.contains(&keyword.as_str()) {
                    return Err(Error::TransactionControl(keyword));
                }
                statement_start = false;
            }
            _ => statement_start = false,
        }
    }
    Ok(())
}

/// Identifier of the transaction the connection is currently in
fn current_transaction_id(conn: &Connection) -> Result<Option<u64>> {
    Ok(conn.query_row("SELECT current_transaction_id()", [], |row| row.get(0))?)
}

/// An open transaction on a borrowed connection.
///
/// Dropping it while still open rolls it back, which also covers a panic
/// unwinding through the unit of work. Only [`with_transaction`] commits.
///
/// SQL passed through it may not contain transaction control statements, and
/// every call first checks the connection is still inside the transaction
/// begun here. Work never leaks into autocommit mode.
pub struct Transaction<'conn> {
    conn: &'conn Connection,
    open: Cell<bool>,
    id: Option<u64>,
}

impl<'conn> Transaction<'conn> {
    fn begin(conn: &'conn Connection) -> Result<Self> {
        conn.execute_batch("BEGIN TRANSACTION")?;
        let mut tx = Self {
            conn,
            open: Cell::new(true),
            id: None,
        };
        tx.id = current_transaction_id(conn)?;
        Ok(tx)
    }

    /// Underlying connection, refused once the transaction has ended
    fn connection(&self) -> Result<&'conn Connection> {
        if !self.open.get() {
            return Err(Error::TransactionDone);
        }
        if current_transaction_id(self.conn)? != self.id {
            tracing::warn!("transaction was ended outside of the runner");
            return Err(Error::TransactionDone);
        }
        Ok(self.conn)
    }

    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<usize> {
        reject_transaction_control(sql)?;
        Ok(self.connection()?.execute(sql, params)?)
    }

    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        reject_transaction_control(sql)?;
        Ok(self.connection()?.execute_batch(sql)?)
    }

    pub fn query_row<T, P, F>(&self, sql: &str, params: P, f: F) -> Result<T>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> duckdb::Result<T>,
    {
        reject_transaction_control(sql)?;
        Ok(self.connection()?.query_row(sql, params, f)?)
    }

    pub fn prepare(&self, sql: &str) -> Result<Statement<'conn>> {
        reject_transaction_control(sql)?;
        Ok(self.connection()?.prepare(sql)?)
    }

    pub fn is_open(&self) -> bool {
        self.open.get()
    }

    /// End the transaction early, discarding its work.
    ///
    /// Anything issued afterwards, the runner's commit included, fails with
    /// [`Error::TransactionDone`].
    pub fn rollback(&self) -> Result<()> {
        self.connection()?.execute_batch("ROLLBACK")?;
        self.open.set(false);
        Ok(())
    }

    fn commit(self) -> Result<()> {
        self.connection()?.execute_batch("COMMIT")?;
        self.open.set(false);
        Ok(())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.open.get() {
            return;
        }
        if std::thread::panicking() {
            tracing::warn!("rolling back transaction of a panicking unit of work");
        }
        if let Err(e) = self.conn.execute_batch("ROLLBACK") {
            tracing::warn!("transaction rollback failed: {}", e);
        }
    }
}

/// Run `f` inside a fresh transaction.
///
/// Commits when `f` returns `Ok`. When it returns `Err` the transaction is
/// rolled back and the error is returned unchanged. When it panics the
/// transaction is rolled back during unwinding and the panic carries on to
/// the caller.
pub fn with_transaction<T, F>(conn: &Connection, f: F) -> Result<T>
where
    F: FnOnce(&Transaction<'_>) -> Result<T>,
{
    let tx = Transaction::begin(conn)?;
    let value = f(&tx)?;
    tx.commit()?;
    Ok(value)
}
