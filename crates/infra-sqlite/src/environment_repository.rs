// SQLite EnvironmentRepository Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use envprov_core::domain::{Environment, EnvironmentId, EnvironmentPatch};
use envprov_core::error::{AppError, Result};
use envprov_core::port::{EnvironmentFilter, EnvironmentRepository, Pagination};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

pub struct SqliteEnvironmentRepository {
    pool: SqlitePool,
}

impl SqliteEnvironmentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Escape LIKE wildcards so search terms match literally
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &EnvironmentFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(owner_id) = &filter.owner_id {
        qb.push(" AND owner_id = ").push_bind(owner_id.clone());
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(term) = &filter.search {
        let pattern = like_pattern(term);
        qb.push(" AND (slug LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR hostname LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR owner_id LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}

#[async_trait]
impl EnvironmentRepository for SqliteEnvironmentRepository {
    async fn insert(&self, env: &Environment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO environments (
                id, slug, hostname, owner_id, plan, status,
                provider_instance_id, ipv4, error_message,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&env.id)
        .bind(&env.slug)
        .bind(&env.hostname)
        .bind(&env.owner_id)
        .bind(&env.plan)
        .bind(env.status.as_str())
        .bind(&env.provider_instance_id)
        .bind(&env.ipv4)
        .bind(&env.error_message)
        .bind(env.created_at)
        .bind(env.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: &EnvironmentId) -> Result<Option<Environment>> {
        sqlx::query_as::<_, EnvironmentRow>("SELECT * FROM environments WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .map(EnvironmentRow::into_environment)
            .transpose()
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Environment>> {
        sqlx::query_as::<_, EnvironmentRow>("SELECT * FROM environments WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .map(EnvironmentRow::into_environment)
            .transpose()
    }

    async fn update(&self, id: &EnvironmentId, patch: &EnvironmentPatch) -> Result<()> {
        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE environments SET updated_at = ");
        qb.push_bind(patch.updated_at);
        if let Some(status) = patch.status {
            qb.push(", status = ").push_bind(status.as_str());
        }
        if let Some(instance_id) = &patch.provider_instance_id {
            qb.push(", provider_instance_id = ")
                .push_bind(instance_id.clone());
        }
        if let Some(ipv4) = &patch.ipv4 {
            qb.push(", ipv4 = ").push_bind(ipv4.clone());
        }
        if let Some(message) = &patch.error_message {
            qb.push(", error_message = ").push_bind(message.clone());
        }
        qb.push(" WHERE id = ").push_bind(id.clone());

        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Environment {}", id)));
        }
        Ok(())
    }

    async fn delete(&self, id: &EnvironmentId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM environments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, filter: &EnvironmentFilter) -> Result<i64> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM environments");
        push_filter(&mut qb, filter);
        qb.build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    async fn list(
        &self,
        filter: &EnvironmentFilter,
        pagination: Pagination,
    ) -> Result<Vec<Environment>> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM environments");
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC, id ASC LIMIT ")
            .push_bind(pagination.take)
            .push(" OFFSET ")
            .push_bind(pagination.skip);

        qb.build_query_as::<EnvironmentRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .into_iter()
            .map(EnvironmentRow::into_environment)
            .collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EnvironmentRow {
    id: String,
    slug: String,
    hostname: String,
    owner_id: String,
    plan: String,
    status: String,
    provider_instance_id: Option<String>,
    ipv4: Option<String>,
    error_message: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl EnvironmentRow {
    fn into_environment(self) -> Result<Environment> {
        Ok(Environment {
            status: self.status.parse()?,
            id: self.id,
            slug: self.slug,
            hostname: self.hostname,
            owner_id: self.owner_id,
            plan: self.plan,
            provider_instance_id: self.provider_instance_id,
            ipv4: self.ipv4,
            error_message: self.error_message,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
