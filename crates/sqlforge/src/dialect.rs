//! SQL dialect profiles.
//!
//! A [`DialectProfile`] is pure data describing one database variant's
//! lexical conventions: identifier quoting, parameter prefix, pagination
//! shape, boolean and timestamp literals, string concatenation, UPSERT
//! flavor and the strategy for retrieving a generated insert id.
//!
//! Profiles are immutable values, safe to share across threads.

use crate::error::{EngineError, EngineResult};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Supported database dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialectKind {
    MySql,
    PostgreSql,
    SqlServer,
    Sqlite,
    Oracle,
}

/// How string concatenation is spelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcatStyle {
    /// `a || b`
    DoublePipe,
    /// `a + b`
    Plus,
    /// `CONCAT(a, b)`
    ConcatFn,
}

/// How result pagination is spelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationStyle {
    /// `LIMIT n [OFFSET m]`
    LimitOffset,
    /// `OFFSET m ROWS FETCH NEXT n ROWS ONLY`
    OffsetFetch,
    /// `ROWNUM <= n` (WHERE-context fragment)
    Rownum,
}

/// How UPSERT is spelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertStyle {
    OnDuplicateKey,
    OnConflict,
    Merge,
    InsertOrReplace,
}

/// How a generated insert id is retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertIdStrategy {
    /// MySQL `LAST_INSERT_ID()`
    LastInsertId,
    /// PostgreSQL `LASTVAL()`
    LastVal,
    /// SQL Server `OUTPUT INSERTED.*`
    OutputInserted,
    /// SQLite `last_insert_rowid()`
    LastInsertRowid,
    /// Oracle `RETURNING ... INTO`
    ReturningInto,
}

/// An immutable dialect description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialectProfile {
    pub kind: DialectKind,
    pub ident_open: &'static str,
    pub ident_close: &'static str,
    pub param_prefix: char,
    pub bool_true_literal: &'static str,
    pub bool_false_literal: &'static str,
    pub now_expr: &'static str,
    pub concat_style: ConcatStyle,
    pub pagination_style: PaginationStyle,
    pub upsert_style: UpsertStyle,
    pub insert_id_strategy: InsertIdStrategy,
}

impl DialectProfile {
    pub const fn mysql() -> Self {
        Self {
            kind: DialectKind::MySql,
            ident_open: "`",
            ident_close: "`",
            param_prefix: '@',
            bool_true_literal: "1",
            bool_false_literal: "0",
            now_expr: "NOW()",
            concat_style: ConcatStyle::ConcatFn,
            pagination_style: PaginationStyle::LimitOffset,
            upsert_style: UpsertStyle::OnDuplicateKey,
            insert_id_strategy: InsertIdStrategy::LastInsertId,
        }
    }

    pub const fn postgres() -> Self {
        Self {
            kind: DialectKind::PostgreSql,
            ident_open: "\"",
            ident_close: "\"",
            param_prefix: '$',
            bool_true_literal: "TRUE",
            bool_false_literal: "FALSE",
            now_expr: "CURRENT_TIMESTAMP",
            concat_style: ConcatStyle::DoublePipe,
            pagination_style: PaginationStyle::LimitOffset,
            upsert_style: UpsertStyle::OnConflict,
            insert_id_strategy: InsertIdStrategy::LastVal,
        }
    }

    pub const fn sql_server() -> Self {
        Self {
            kind: DialectKind::SqlServer,
            ident_open: "[",
            ident_close: "]",
            param_prefix: '@',
            bool_true_literal: "1",
            bool_false_literal: "0",
            now_expr: "GETDATE()",
            concat_style: ConcatStyle::Plus,
            pagination_style: PaginationStyle::OffsetFetch,
            upsert_style: UpsertStyle::Merge,
            insert_id_strategy: InsertIdStrategy::OutputInserted,
        }
    }

    pub const fn sqlite() -> Self {
        Self {
            kind: DialectKind::Sqlite,
            ident_open: "[",
            ident_close: "]",
            param_prefix: '@',
            bool_true_literal: "1",
            bool_false_literal: "0",
            now_expr: "datetime('now')",
            concat_style: ConcatStyle::DoublePipe,
            pagination_style: PaginationStyle::LimitOffset,
            upsert_style: UpsertStyle::InsertOrReplace,
            insert_id_strategy: InsertIdStrategy::LastInsertRowid,
        }
    }

    pub const fn oracle() -> Self {
        Self {
            kind: DialectKind::Oracle,
            ident_open: "\"",
            ident_close: "\"",
            param_prefix: ':',
            bool_true_literal: "1",
            bool_false_literal: "0",
            now_expr: "SYSDATE",
            concat_style: ConcatStyle::DoublePipe,
            pagination_style: PaginationStyle::Rownum,
            upsert_style: UpsertStyle::Merge,
            insert_id_strategy: InsertIdStrategy::ReturningInto,
        }
    }

    /// The canonical profile for a dialect kind.
    pub const fn for_kind(kind: DialectKind) -> Self {
        match kind {
            DialectKind::MySql => Self::mysql(),
            DialectKind::PostgreSql => Self::postgres(),
            DialectKind::SqlServer => Self::sql_server(),
            DialectKind::Sqlite => Self::sqlite(),
            DialectKind::Oracle => Self::oracle(),
        }
    }

    /// Wrap an identifier in the dialect's quote characters.
    ///
    /// Returns `""` for empty input. No content escaping is performed:
    /// identifiers containing the closing quote character are rejected with
    /// [`EngineError::UnsafeIdentifier`], so callers must never pass
    /// untrusted identifiers.
    pub fn wrap_column(&self, ident: &str) -> EngineResult<String> {
        if ident.is_empty() {
            return Ok(String::new());
        }
        if ident.contains(self.ident_close) {
            return Err(EngineError::UnsafeIdentifier {
                ident: ident.to_string(),
            });
        }
        let mut out = String::with_capacity(ident.len() + self.ident_open.len() + self.ident_close.len());
        out.push_str(self.ident_open);
        out.push_str(ident);
        out.push_str(self.ident_close);
        Ok(out)
    }

    /// The parameter token for a named parameter, e.g. `@id`, `$id`, `:id`.
    pub fn param_token(&self, name: &str) -> String {
        let mut out = String::with_capacity(name.len() + 1);
        out.push(self.param_prefix);
        out.push_str(name);
        out
    }

    /// Render a pagination fragment around pre-rendered limit/offset tokens.
    ///
    /// `OffsetFetch` without an ORDER BY is valid SQL and still emitted; the
    /// caller is responsible for surfacing the advisory warning.
    pub fn render_pagination(
        &self,
        limit_token: &str,
        offset_token: Option<&str>,
        _has_order_by: bool,
    ) -> String {
        match self.pagination_style {
            PaginationStyle::LimitOffset => match offset_token {
                Some(offset) => format!("LIMIT {limit_token} OFFSET {offset}"),
                None => format!("LIMIT {limit_token}"),
            },
            PaginationStyle::OffsetFetch => {
                let offset = offset_token.unwrap_or("0");
                format!("OFFSET {offset} ROWS FETCH NEXT {limit_token} ROWS ONLY")
            }
            PaginationStyle::Rownum => format!("ROWNUM <= {limit_token}"),
        }
    }

    /// Render an offset-only fragment.
    pub fn render_offset(&self, offset_token: &str) -> String {
        match self.pagination_style {
            PaginationStyle::LimitOffset => format!("OFFSET {offset_token}"),
            PaginationStyle::OffsetFetch | PaginationStyle::Rownum => {
                format!("OFFSET {offset_token} ROWS")
            }
        }
    }

    /// String concatenation over pre-rendered parts.
    pub fn concat(&self, parts: &[&str]) -> String {
        match self.concat_style {
            ConcatStyle::DoublePipe => parts.join(" || "),
            ConcatStyle::Plus => parts.join(" + "),
            ConcatStyle::ConcatFn => format!("CONCAT({})", parts.join(", ")),
        }
    }

    /// The dialect's current-timestamp expression.
    pub fn current_timestamp(&self) -> &'static str {
        self.now_expr
    }

    pub fn bool_literal(&self, value: bool) -> &'static str {
        if value {
            self.bool_true_literal
        } else {
            self.bool_false_literal
        }
    }

    /// A datetime literal in the dialect's preferred spelling.
    pub fn format_datetime(&self, value: &NaiveDateTime) -> String {
        let iso = value.format("%Y-%m-%d %H:%M:%S");
        match self.kind {
            DialectKind::Oracle => {
                format!("TO_DATE('{iso}', 'YYYY-MM-DD HH24:MI:SS')")
            }
            _ => format!("'{iso}'"),
        }
    }

    /// The clause head opening an UPSERT in this dialect.
    pub fn upsert_clause_head(&self) -> &'static str {
        match self.upsert_style {
            UpsertStyle::OnDuplicateKey => "ON DUPLICATE KEY UPDATE",
            UpsertStyle::OnConflict => "ON CONFLICT",
            UpsertStyle::Merge => "MERGE",
            UpsertStyle::InsertOrReplace => "INSERT OR REPLACE",
        }
    }

    /// The expression retrieving the last generated insert id.
    pub fn insert_id_expr(&self) -> &'static str {
        match self.insert_id_strategy {
            InsertIdStrategy::LastInsertId => "LAST_INSERT_ID()",
            InsertIdStrategy::LastVal => "LASTVAL()",
            InsertIdStrategy::OutputInserted => "OUTPUT INSERTED",
            InsertIdStrategy::LastInsertRowid => "last_insert_rowid()",
            InsertIdStrategy::ReturningInto => "RETURNING ... INTO",
        }
    }
}
