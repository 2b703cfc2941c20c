//! PostgreSQL document store.
//!
//! Every collection lives in the single `documents` table, keyed by
//! `(collection, doc_id)` with the document itself in a JSONB column.
//! [`Filter`]s are compiled to JSONB containment (`@>`) predicates.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use super::{
    document_id, DocumentStore, Filter, Projection, StoreError, StoreResult, Update, UpdateOutcome,
};

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect to the database. Call [`PostgresStore::migrate`] before first use.
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        tracing::info!(max_connections, "Connected to PostgreSQL document store");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;

        tracing::info!("Document store migrations completed");
        Ok(())
    }
}

impl std::fmt::Debug for PostgresStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresStore")
            .field("pool_size", &self.pool.size())
            .finish()
    }
}

/// SQL fragment plus its JSONB parameters, numbered after `first_param`.
#[derive(Debug, Default)]
struct SqlClause {
    sql: String,
    binds: Vec<Value>,
}

impl SqlClause {
    fn compile(filter: &Filter, first_param: usize) -> Self {
        let mut clause = SqlClause::default();
        let sql = clause.push(filter, first_param);
        clause.sql = sql;
        clause
    }

    fn push(&mut self, filter: &Filter, first_param: usize) -> String {
        match filter {
            Filter::All => "TRUE".to_string(),
            Filter::Eq(path, value) => self.push_eq(path, value, first_param),
            Filter::Ne(path, value) => format!("NOT {}", self.push_eq(path, value, first_param)),
            Filter::In(path, values) => {
                let parts: Vec<String> = values
                    .iter()
                    .map(|v| self.push_eq(path, v, first_param))
                    .collect();
                join_or_default(parts, " OR ", "FALSE")
            }
            Filter::And(clauses) => {
                let parts = clauses.iter().map(|c| self.push(c, first_param)).collect();
                join_or_default(parts, " AND ", "TRUE")
            }
            Filter::Or(clauses) => {
                let parts = clauses.iter().map(|c| self.push(c, first_param)).collect();
                join_or_default(parts, " OR ", "FALSE")
            }
        }
    }

    fn push_eq(&mut self, path: &str, value: &Value, first_param: usize) -> String {
        let parts: Vec<String> = containment_variants(path, value)
            .into_iter()
            .map(|variant| {
                self.binds.push(variant);
                format!("body @> ${}::jsonb", first_param + self.binds.len() - 1)
            })
            .collect();
        join_or_default(parts, " OR ", "FALSE")
    }
}

fn join_or_default(parts: Vec<String>, sep: &str, empty: &str) -> String {
    if parts.is_empty() {
        empty.to_string()
    } else {
        format!("({})", parts.join(sep))
    }
}

/// JSONB documents whose containment expresses `path == value`.
///
/// Any level of the path may hold an array of objects, and the leaf may be
/// an array containing the value, so every combination is generated.
fn containment_variants(path: &str, value: &Value) -> Vec<Value> {
    let segments: Vec<&str> = path.split('.').collect();
    let Some((root, nested)) = segments.split_first() else {
        return Vec::new();
    };

    let mut options = if value.is_array() {
        vec![value.clone()]
    } else {
        vec![value.clone(), json!([value])]
    };

    for segment in nested.iter().rev() {
        options = options
            .into_iter()
            .flat_map(|inner| {
                let mut obj = Map::new();
                obj.insert(segment.to_string(), inner);
                let obj = Value::Object(obj);
                [json!([obj.clone()]), obj]
            })
            .collect();
    }

    options
        .into_iter()
        .map(|inner| {
            let mut doc = Map::new();
            doc.insert(root.to_string(), inner);
            Value::Object(doc)
        })
        .collect()
}

fn insert_error(err: sqlx::Error, collection: &str, id: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateId {
            collection: collection.to_string(),
            id: id.to_string(),
        },
        _ => err.into(),
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn insert_one(&self, collection: &str, doc: Value) -> StoreResult<()> {
        let id = document_id(&doc)?.to_string();
        sqlx::query("INSERT INTO documents (collection, doc_id, body) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(&id)
            .bind(&doc)
            .execute(&self.pool)
            .await
            .map_err(|e| insert_error(e, collection, &id))?;

        tracing::debug!(collection, doc_id = %id, "Document inserted");
        Ok(())
    }

    async fn insert_many(&self, collection: &str, docs: Vec<Value>) -> StoreResult<u64> {
        let mut tx = self.pool.begin().await?;
        for doc in &docs {
            let id = document_id(doc)?;
            sqlx::query("INSERT INTO documents (collection, doc_id, body) VALUES ($1, $2, $3)")
                .bind(collection)
                .bind(id)
                .bind(doc)
                .execute(&mut *tx)
                .await
                .map_err(|e| insert_error(e, collection, id))?;
        }
        tx.commit().await?;

        tracing::debug!(collection, count = docs.len(), "Documents inserted");
        Ok(docs.len() as u64)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<UpdateOutcome> {
        let clause = SqlClause::compile(filter, 2);
        let sql = format!(
            "SELECT id, body FROM documents WHERE collection = $1 AND {} ORDER BY id LIMIT 1 FOR UPDATE",
            clause.sql
        );

        let mut tx = self.pool.begin().await?;
        let mut query = sqlx::query_as::<_, (i64, Value)>(&sql).bind(collection);
        for bind in &clause.binds {
            query = query.bind(bind);
        }
        let Some((row_id, mut body)) = query.fetch_optional(&mut *tx).await? else {
            return Ok(UpdateOutcome::default());
        };

        if !update.apply(&mut body) {
            return Ok(UpdateOutcome { matched: 1, modified: 0 });
        }

        let doc_id = document_id(&body)?.to_string();
        sqlx::query(
            "UPDATE documents SET doc_id = $1, body = $2, updated_at = NOW() WHERE id = $3",
        )
        .bind(&doc_id)
        .bind(&body)
        .bind(row_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| insert_error(e, collection, &doc_id))?;
        tx.commit().await?;

        tracing::debug!(collection, doc_id = %doc_id, "Document updated");
        Ok(UpdateOutcome { matched: 1, modified: 1 })
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        let clause = SqlClause::compile(filter, 2);
        let sql = format!("DELETE FROM documents WHERE collection = $1 AND {}", clause.sql);

        let mut query = sqlx::query(&sql).bind(collection);
        for bind in &clause.binds {
            query = query.bind(bind);
        }
        let deleted = query.execute(&self.pool).await?.rows_affected();

        tracing::debug!(collection, deleted, "Documents deleted");
        Ok(deleted)
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        projection: &Projection,
    ) -> StoreResult<Vec<Value>> {
        let clause = SqlClause::compile(filter, 2);
        let sql = format!(
            "SELECT body FROM documents WHERE collection = $1 AND {} ORDER BY id",
            clause.sql
        );

        let mut query = sqlx::query_scalar::<_, Value>(&sql).bind(collection);
        for bind in &clause.binds {
            query = query.bind(bind);
        }
        let docs = query.fetch_all(&self.pool).await?;

        Ok(docs.into_iter().map(|doc| projection.apply(doc)).collect())
    }

    async fn count(
        &self,
        collection: &str,
        filter: &Filter,
        limit: Option<u64>,
    ) -> StoreResult<u64> {
        let clause = SqlClause::compile(filter, 2);
        let limit_sql = limit.map(|l| format!(" LIMIT {l}")).unwrap_or_default();
        let sql = format!(
            "SELECT COUNT(*) FROM (SELECT 1 FROM documents WHERE collection = $1 AND {}{}) AS matching",
            clause.sql, limit_sql
        );

        let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(collection);
        for bind in &clause.binds {
            query = query.bind(bind);
        }
        let count = query.fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn check_health(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
