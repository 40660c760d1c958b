//! JSON document collections.
//!
//! A collection is a table `(id TEXT PRIMARY KEY, doc TEXT)`: the whole record
//! is stored as JSON in `doc` and keyed by its string `id` field. Secondary
//! indexes are `SQLite` expression indexes over `json_extract(doc, '$.<field>')`,
//! and index lookups use the very same expression so the planner can use them.
//!
//! All operations take any [`ConnectionTrait`], so they run equally on a
//! plain connection or inside a [`sea_orm::DatabaseTransaction`].

use sea_orm::{ConnectionTrait, DbErr, QueryResult, Statement, Value};
use serde_json::Value as Json;

use crate::{DbError, Result, is_unique_violation};

/// A stored record. Always a JSON object with a string `id`.
pub type Document = Json;

/// Field every document is keyed by.
pub const KEY_FIELD: &str = "id";

/// Secondary index over one top-level document field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: &'static str,
    pub field: &'static str,
    pub unique: bool,
}

impl IndexSpec {
    #[must_use]
    pub const fn new(name: &'static str, field: &'static str) -> Self {
        Self {
            name,
            field,
            unique: false,
        }
    }

    #[must_use]
    pub const fn unique(name: &'static str, field: &'static str) -> Self {
        Self {
            name,
            field,
            unique: true,
        }
    }

    fn expr(&self) -> String {
        format!("json_extract(\"doc\", '$.{}')", self.field)
    }
}

/// A named collection and its indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: &'static str,
    pub indexes: &'static [IndexSpec],
}

fn stmt(conn: &impl ConnectionTrait, sql: &str, values: Vec<Value>) -> Statement {
    Statement::from_sql_and_values(conn.get_database_backend(), sql, values)
}

impl CollectionSpec {
    #[must_use]
    pub const fn new(name: &'static str, indexes: &'static [IndexSpec]) -> Self {
        Self { name, indexes }
    }

    fn index_name(&self, index: &IndexSpec) -> String {
        format!("{}__{}", self.name, index.name)
    }

    fn find_index(&self, name: &str) -> Result<&IndexSpec> {
        self.indexes
            .iter()
            .find(|i| i.name == name)
            .ok_or_else(|| DbError::UnknownIndex {
                collection: self.name.to_owned(),
                index: name.to_owned(),
            })
    }

    fn key_of<'d>(&self, doc: &'d Document) -> Result<&'d str> {
        if !doc.is_object() {
            return Err(self.invalid("document is not a JSON object"));
        }
        doc.get(KEY_FIELD)
            .and_then(Json::as_str)
            .ok_or_else(|| self.invalid("missing string `id` field"))
    }

    fn invalid(&self, reason: &str) -> DbError {
        DbError::InvalidDocument {
            collection: self.name.to_owned(),
            reason: reason.to_owned(),
        }
    }

    fn write_err(&self, key: &str, err: DbErr) -> DbError {
        if is_unique_violation(&err) {
            DbError::DuplicateKey {
                collection: self.name.to_owned(),
                key: key.to_owned(),
            }
        } else {
            DbError::Sea(err)
        }
    }

    fn decode(&self, row: &QueryResult) -> Result<Document> {
        let raw: String = row.try_get("", "doc")?;
        serde_json::from_str(&raw).map_err(|e| self.invalid(&e.to_string()))
    }

    /// Create the table and all indexes. Existing objects are left untouched.
    ///
    /// # Errors
    /// Returns the underlying `DbErr` if a DDL statement fails.
    pub async fn create(&self, conn: &impl ConnectionTrait) -> std::result::Result<(), DbErr> {
        conn.execute_unprepared(&format!(
            r#"CREATE TABLE IF NOT EXISTS "{}" ("id" TEXT NOT NULL PRIMARY KEY, "doc" TEXT NOT NULL)"#,
            self.name
        ))
        .await?;

        for index in self.indexes {
            let unique = if index.unique { "UNIQUE " } else { "" };
            conn.execute_unprepared(&format!(
                r#"CREATE {unique}INDEX IF NOT EXISTS "{}" ON "{}" ({})"#,
                self.index_name(index),
                self.name,
                index.expr()
            ))
            .await?;
        }
        Ok(())
    }

    /// Drop the table (and with it its indexes). A missing table is a no-op.
    ///
    /// # Errors
    /// Returns the underlying `DbErr` if the statement fails.
    pub async fn drop_table(&self, conn: &impl ConnectionTrait) -> std::result::Result<(), DbErr> {
        conn.execute_unprepared(&format!(r#"DROP TABLE IF EXISTS "{}""#, self.name))
            .await?;
        Ok(())
    }

    /// Whether the table exists in this database.
    ///
    /// # Errors
    /// Returns an error if the catalog query fails.
    pub async fn exists(&self, conn: &impl ConnectionTrait) -> Result<bool> {
        let row = conn
            .query_one(stmt(
                conn,
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
                vec![self.name.into()],
            ))
            .await?;
        Ok(row
            .and_then(|r| r.try_get_by_index::<i64>(0).ok())
            .is_some_and(|c| c > 0))
    }

    /// # Errors
    /// Returns an error on query failure or an undecodable stored document.
    pub async fn get(&self, conn: &impl ConnectionTrait, key: &str) -> Result<Option<Document>> {
        let row = conn
            .query_one(stmt(
                conn,
                &format!(r#"SELECT "doc" FROM "{}" WHERE "id" = ?"#, self.name),
                vec![key.into()],
            ))
            .await?;
        row.map(|r| self.decode(&r)).transpose()
    }

    /// All documents, ordered by key.
    ///
    /// # Errors
    /// Returns an error on query failure or an undecodable stored document.
    pub async fn get_all(&self, conn: &impl ConnectionTrait) -> Result<Vec<Document>> {
        let rows = conn
            .query_all(stmt(
                conn,
                &format!(r#"SELECT "doc" FROM "{}" ORDER BY "id""#, self.name),
                vec![],
            ))
            .await?;
        rows.iter().map(|r| self.decode(r)).collect()
    }

    /// Documents whose indexed field equals `key`, ordered by document key.
    ///
    /// Booleans are stored by `SQLite` JSON functions as `0`/`1`, so passing a
    /// `bool` matches JSON `true`/`false`.
    ///
    /// # Errors
    /// Returns [`DbError::UnknownIndex`] for an index not declared on this
    /// collection, or an error on query failure.
    pub async fn get_all_by_index(
        &self,
        conn: &impl ConnectionTrait,
        index: &str,
        key: impl Into<Value>,
    ) -> Result<Vec<Document>> {
        let index = self.find_index(index)?;
        let rows = conn
            .query_all(stmt(
                conn,
                &format!(
                    r#"SELECT "doc" FROM "{}" WHERE {} = ? ORDER BY "id""#,
                    self.name,
                    index.expr()
                ),
                vec![key.into()],
            ))
            .await?;
        rows.iter().map(|r| self.decode(r)).collect()
    }

    /// # Errors
    /// Returns an error on query failure.
    pub async fn count(&self, conn: &impl ConnectionTrait) -> Result<u64> {
        let row = conn
            .query_one(stmt(
                conn,
                &format!(r#"SELECT COUNT(*) FROM "{}""#, self.name),
                vec![],
            ))
            .await?;
        let n = row
            .map(|r| r.try_get_by_index::<i64>(0))
            .transpose()?
            .unwrap_or_default();
        Ok(u64::try_from(n).unwrap_or_default())
    }

    /// Insert a new document.
    ///
    /// # Errors
    /// Returns [`DbError::DuplicateKey`] if the key (or a unique indexed
    /// value) already exists, [`DbError::InvalidDocument`] if the document
    /// has no string `id`.
    pub async fn add(&self, conn: &impl ConnectionTrait, doc: &Document) -> Result<()> {
        let key = self.key_of(doc)?;
        conn.execute(stmt(
            conn,
            &format!(r#"INSERT INTO "{}" ("id", "doc") VALUES (?, ?)"#, self.name),
            vec![key.into(), serde_json::to_string(doc)?.into()],
        ))
        .await
        .map_err(|e| self.write_err(key, e))?;
        Ok(())
    }

    /// Insert or replace a document by key.
    ///
    /// # Errors
    /// Returns [`DbError::DuplicateKey`] if a unique indexed value collides
    /// with another document, [`DbError::InvalidDocument`] if the document
    /// has no string `id`.
    pub async fn put(&self, conn: &impl ConnectionTrait, doc: &Document) -> Result<()> {
        let key = self.key_of(doc)?;
        conn.execute(stmt(
            conn,
            &format!(
                r#"INSERT INTO "{}" ("id", "doc") VALUES (?, ?)
                   ON CONFLICT("id") DO UPDATE SET "doc" = excluded."doc""#,
                self.name
            ),
            vec![key.into(), serde_json::to_string(doc)?.into()],
        ))
        .await
        .map_err(|e| self.write_err(key, e))?;
        Ok(())
    }

    /// Delete by key. Returns whether a document was removed.
    ///
    /// # Errors
    /// Returns an error on statement failure.
    pub async fn delete(&self, conn: &impl ConnectionTrait, key: &str) -> Result<bool> {
        let res = conn
            .execute(stmt(
                conn,
                &format!(r#"DELETE FROM "{}" WHERE "id" = ?"#, self.name),
                vec![key.into()],
            ))
            .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Remove every document. Returns the number removed.
    ///
    /// # Errors
    /// Returns an error on statement failure.
    pub async fn clear(&self, conn: &impl ConnectionTrait) -> Result<u64> {
        let res = conn
            .execute(stmt(
                conn,
                &format!(r#"DELETE FROM "{}""#, self.name),
                vec![],
            ))
            .await?;
        Ok(res.rows_affected())
    }
}
