//! Postgres-backed endpoint permission registry.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | RegistryError | Scenario |
//! |------------|----------------------|---------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Live natural key or id already present |
//! | Database (check violation) | `23514` | `Validation` | Row rejected by a column check |
//! | Database (other) | Any other | `Store` | Other database errors |
//! | PoolClosed / Io / other | N/A | `Store` | Connection failures |
//!
//! ## Sync bridge
//!
//! `EndpointPermissionStore` is synchronous. The trait impl drives the async
//! methods with `block_in_place`, so it must be called from a multi-threaded
//! tokio runtime.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Row};
use tracing::{instrument, warn};
use uuid::Uuid;

use warden_auth::{Permission, Role};
use warden_core::AggregateRoot;
use warden_registry::{
    AccessRule, EndpointKey, EndpointPermission, EndpointPermissionId, EndpointPermissionRecord, HttpMethod, SyncPlan,
};

use super::query::{EndpointFilter, EndpointPermissionQuery, EndpointQueryResult, LISTING_ORDER_SQL, Pagination};
use super::{EndpointPermissionStore, RegistryError};

const SCHEMA_SQL: &str = include_str!("../../migrations/0001_endpoint_permissions.sql");

const SELECT_COLUMNS: &str = r#"
    SELECT id, service_name, http_path, http_method, description, is_public,
           required_permissions, required_roles, version, created_at, updated_at, deleted_at
    FROM endpoint_permissions
"#;

/// Postgres registry store.
///
/// Uniqueness of live natural keys is enforced by a partial unique index, so
/// two concurrent creators of the same route cannot both succeed.
#[derive(Debug, Clone)]
pub struct PostgresEndpointPermissionStore {
    pool: Arc<PgPool>,
}

impl PostgresEndpointPermissionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Create the table and indexes if they do not exist.
    pub async fn ensure_schema(&self) -> Result<(), RegistryError> {
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    #[instrument(skip(self, endpoint), fields(key = %endpoint.key()), err)]
    pub async fn insert(&self, endpoint: EndpointPermission) -> Result<EndpointPermission, RegistryError> {
        let mut conn = self.acquire().await?;
        insert_row(&mut conn, &endpoint).await?;
        Ok(endpoint)
    }

    #[instrument(skip(self, endpoint), fields(id = %endpoint.id_typed(), version = endpoint.version()), err)]
    pub async fn save(&self, endpoint: EndpointPermission) -> Result<EndpointPermission, RegistryError> {
        let mut conn = self.acquire().await?;
        update_row(&mut conn, &endpoint).await
    }

    #[instrument(skip(self), fields(id = %id), err)]
    pub async fn mark_deleted(
        &self,
        id: EndpointPermissionId,
        now: DateTime<Utc>,
    ) -> Result<EndpointPermission, RegistryError> {
        let mut conn = self.acquire().await?;
        let current = fetch_row(&mut conn, id).await?.ok_or(RegistryError::NotFound)?;
        let deleted = current.soft_delete(now)?;
        update_row(&mut conn, &deleted).await
    }

    pub async fn fetch(&self, id: EndpointPermissionId) -> Result<Option<EndpointPermission>, RegistryError> {
        let mut conn = self.acquire().await?;
        fetch_row(&mut conn, id).await
    }

    pub async fn fetch_by_key(
        &self,
        service_name: &str,
        http_path: &str,
        http_method: HttpMethod,
    ) -> Result<Option<EndpointPermission>, RegistryError> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE service_name = $1 AND http_path = $2 AND http_method = $3 AND deleted_at IS NULL"
        );
        let row = sqlx::query(&sql)
            .bind(service_name)
            .bind(http_path)
            .bind(http_method.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_by_key", e))?;
        row.as_ref().map(decode_row).transpose()
    }

    pub async fn fetch_service(&self, service_name: &str) -> Result<Vec<EndpointPermission>, RegistryError> {
        let sql = format!("{SELECT_COLUMNS} WHERE service_name = $1 AND deleted_at IS NULL ORDER BY {LISTING_ORDER_SQL}");
        let rows = sqlx::query(&sql)
            .bind(service_name)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_service", e))?;
        rows.iter().map(decode_row).collect()
    }

    /// Apply a sync plan inside one transaction.
    #[instrument(
        skip(self, plan),
        fields(service = %plan.service_name, creates = plan.creates.len(), updates = plan.updates.len()),
        err
    )]
    pub async fn apply_plan(&self, plan: &SyncPlan) -> Result<(), RegistryError> {
        if !plan.has_writes() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_sync", e))?;

        for endpoint in &plan.creates {
            insert_row(&mut tx, endpoint).await?;
        }
        for endpoint in &plan.updates {
            update_row(&mut tx, endpoint).await?;
        }

        tx.commit().await.map_err(|e| map_sqlx_error("commit_sync", e))?;
        Ok(())
    }

    async fn acquire(&self) -> Result<sqlx::pool::PoolConnection<sqlx::Postgres>, RegistryError> {
        self.pool.acquire().await.map_err(|e| map_sqlx_error("acquire", e))
    }

    fn block_on<F: Future>(&self, fut: F) -> Result<F::Output, RegistryError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| {
            RegistryError::Store("PostgresEndpointPermissionStore requires a tokio runtime".to_string())
        })?;
        Ok(tokio::task::block_in_place(|| handle.block_on(fut)))
    }
}

async fn insert_row(conn: &mut PgConnection, endpoint: &EndpointPermission) -> Result<(), RegistryError> {
    sqlx::query(
        r#"
        INSERT INTO endpoint_permissions (
            id, service_name, http_path, http_method, description, is_public,
            required_permissions, required_roles, version, created_at, updated_at, deleted_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(endpoint.id_typed().as_uuid())
    .bind(endpoint.service_name())
    .bind(endpoint.http_path())
    .bind(endpoint.http_method().as_str())
    .bind(endpoint.description())
    .bind(endpoint.is_public())
    .bind(Json(endpoint.required_permissions()))
    .bind(Json(endpoint.required_roles()))
    .bind(to_db_version(endpoint.version())?)
    .bind(endpoint.created_at())
    .bind(endpoint.updated_at())
    .bind(endpoint.deleted_at())
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("insert", e))?;
    Ok(())
}

/// Write `endpoint` if the row is live and still at `endpoint.version()`.
async fn update_row(conn: &mut PgConnection, endpoint: &EndpointPermission) -> Result<EndpointPermission, RegistryError> {
    let id = endpoint.id_typed();
    let expected = to_db_version(endpoint.version())?;

    let updated = sqlx::query(
        r#"
        UPDATE endpoint_permissions
        SET service_name = $2,
            http_path = $3,
            http_method = $4,
            description = $5,
            is_public = $6,
            required_permissions = $7,
            required_roles = $8,
            version = version + 1,
            updated_at = $9,
            deleted_at = $10
        WHERE id = $1 AND version = $11 AND deleted_at IS NULL
        "#,
    )
    .bind(id.as_uuid())
    .bind(endpoint.service_name())
    .bind(endpoint.http_path())
    .bind(endpoint.http_method().as_str())
    .bind(endpoint.description())
    .bind(endpoint.is_public())
    .bind(Json(endpoint.required_permissions()))
    .bind(Json(endpoint.required_roles()))
    .bind(endpoint.updated_at())
    .bind(endpoint.deleted_at())
    .bind(expected)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("update", e))?;

    if updated.rows_affected() == 1 {
        return Ok(endpoint.next_version());
    }

    match fetch_row(conn, id).await? {
        None => Err(RegistryError::NotFound),
        Some(stored) if stored.is_deleted() => {
            Err(RegistryError::Validation(format!("endpoint permission {id} is deleted")))
        }
        Some(stored) => {
            warn!(%id, expected = endpoint.version(), actual = stored.version(), "stale endpoint permission update");
            Err(RegistryError::Conflict(format!(
                "optimistic concurrency check failed (expected: {}, actual: {})",
                endpoint.version(),
                stored.version()
            )))
        }
    }
}

async fn fetch_row(conn: &mut PgConnection, id: EndpointPermissionId) -> Result<Option<EndpointPermission>, RegistryError> {
    let sql = format!("{SELECT_COLUMNS} WHERE id = $1");
    let row = sqlx::query(&sql)
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("fetch", e))?;
    row.as_ref().map(decode_row).transpose()
}

fn decode_row(row: &PgRow) -> Result<EndpointPermission, RegistryError> {
    let decode = |e: sqlx::Error| RegistryError::Store(format!("failed to decode endpoint permission row: {e}"));

    let id: Uuid = row.try_get("id").map_err(decode)?;
    let service_name: String = row.try_get("service_name").map_err(decode)?;
    let http_path: String = row.try_get("http_path").map_err(decode)?;
    let http_method: String = row.try_get("http_method").map_err(decode)?;
    let description: String = row.try_get("description").map_err(decode)?;
    let is_public: bool = row.try_get("is_public").map_err(decode)?;
    let Json(required_permissions): Json<BTreeSet<Permission>> =
        row.try_get("required_permissions").map_err(decode)?;
    let Json(required_roles): Json<BTreeSet<Role>> = row.try_get("required_roles").map_err(decode)?;
    let version: i64 = row.try_get("version").map_err(decode)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(decode)?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(decode)?;
    let deleted_at: Option<DateTime<Utc>> = row.try_get("deleted_at").map_err(decode)?;

    let http_method: HttpMethod = http_method
        .parse()
        .map_err(|e| RegistryError::Store(format!("stored row {id} has {e}")))?;
    let key = EndpointKey::new(service_name, http_path, http_method)
        .map_err(|e| RegistryError::Store(format!("stored row {id} has an invalid key: {e}")))?;
    let version = u64::try_from(version)
        .map_err(|_| RegistryError::Store(format!("stored row {id} has negative version {version}")))?;

    Ok(EndpointPermission::from_record(EndpointPermissionRecord {
        id: EndpointPermissionId::from_uuid(id),
        key,
        rule: AccessRule {
            description,
            is_public,
            required_permissions,
            required_roles,
        },
        version,
        created_at,
        updated_at,
        deleted_at,
    }))
}

fn to_db_version(version: u64) -> Result<i64, RegistryError> {
    i64::try_from(version).map_err(|_| RegistryError::Validation(format!("version {version} out of range")))
}

/// Map SQLx errors to `RegistryError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> RegistryError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => RegistryError::Conflict(msg),
                Some("23514") => RegistryError::Validation(msg),
                _ => RegistryError::Store(msg),
            }
        }
        sqlx::Error::PoolClosed => RegistryError::Store(format!("connection pool closed in {operation}")),
        _ => RegistryError::Store(format!("sqlx error in {operation}: {err}")),
    }
}

impl EndpointPermissionStore for PostgresEndpointPermissionStore {
    fn create(&self, endpoint: EndpointPermission) -> Result<EndpointPermission, RegistryError> {
        self.block_on(self.insert(endpoint))?
    }

    fn update(&self, endpoint: EndpointPermission) -> Result<EndpointPermission, RegistryError> {
        self.block_on(self.save(endpoint))?
    }

    fn soft_delete(&self, id: EndpointPermissionId, now: DateTime<Utc>) -> Result<EndpointPermission, RegistryError> {
        self.block_on(self.mark_deleted(id, now))?
    }

    fn get(&self, id: EndpointPermissionId) -> Result<Option<EndpointPermission>, RegistryError> {
        self.block_on(self.fetch(id))?
    }

    fn find_by_key(
        &self,
        service_name: &str,
        http_path: &str,
        http_method: HttpMethod,
    ) -> Result<Option<EndpointPermission>, RegistryError> {
        self.block_on(self.fetch_by_key(service_name, http_path, http_method))?
    }

    fn list_by_service(&self, service_name: &str) -> Result<Vec<EndpointPermission>, RegistryError> {
        self.block_on(self.fetch_service(service_name))?
    }

    fn apply_sync(&self, plan: &SyncPlan) -> Result<(), RegistryError> {
        self.block_on(self.apply_plan(plan))?
    }
}

#[async_trait::async_trait]
impl EndpointPermissionQuery for PostgresEndpointPermissionStore {
    async fn search(
        &self,
        filter: EndpointFilter,
        pagination: Pagination,
    ) -> Result<EndpointQueryResult, RegistryError> {
        const WHERE: &str = r#"
            WHERE ($1::text IS NULL OR service_name = $1)
              AND ($2::text IS NULL OR http_method = $2)
              AND ($3::bool IS NULL OR is_public = $3)
              AND ($4::text IS NULL OR left(http_path, length($4)) = $4)
              AND ($5 OR deleted_at IS NULL)
        "#;

        let method = filter.http_method.map(HttpMethod::as_str);

        let count_sql = format!("SELECT COUNT(*) AS total FROM endpoint_permissions {WHERE}");
        let count_row = sqlx::query(&count_sql)
            .bind(filter.service_name.as_deref())
            .bind(method)
            .bind(filter.is_public)
            .bind(filter.path_prefix.as_deref())
            .bind(filter.include_deleted)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_endpoints", e))?;
        let total: i64 = count_row
            .try_get("total")
            .map_err(|e| RegistryError::Store(format!("failed to read count: {e}")))?;

        let page_sql = format!(
            "{SELECT_COLUMNS} {WHERE} ORDER BY {LISTING_ORDER_SQL} LIMIT $6 OFFSET $7"
        );
        let rows = sqlx::query(&page_sql)
            .bind(filter.service_name.as_deref())
            .bind(method)
            .bind(filter.is_public)
            .bind(filter.path_prefix.as_deref())
            .bind(filter.include_deleted)
            .bind(i64::from(pagination.limit))
            .bind(i64::from(pagination.offset))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("search_endpoints", e))?;

        let items = rows.iter().map(decode_row).collect::<Result<Vec<_>, _>>()?;
        let total = u64::try_from(total).unwrap_or(0);
        let has_more = u64::from(pagination.offset) + (items.len() as u64) < total;

        Ok(EndpointQueryResult {
            items,
            total,
            pagination,
            has_more,
        })
    }
}
