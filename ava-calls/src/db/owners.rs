//! Tenants, owner accounts and assistant configurations

use ava_common::db::{AssistantConfig, Tenant, User};
use ava_common::time::{from_storage, now, to_storage};
use ava_common::{Error, Result, TenantId};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

const USER_COLUMNS: &str = "id, email, name, twilio_phone_number, vapi_api_key";
const CONFIG_COLUMNS: &str =
    "id, user_id, organization_name, vapi_assistant_id, summary_email, fallback_email";

fn user_from_row(row: &SqliteRow) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        twilio_phone_number: row.try_get("twilio_phone_number")?,
        vapi_api_key: row.try_get("vapi_api_key")?,
    })
}

fn config_from_row(row: &SqliteRow) -> Result<AssistantConfig> {
    Ok(AssistantConfig {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        organization_name: row.try_get("organization_name")?,
        vapi_assistant_id: row.try_get("vapi_assistant_id")?,
        summary_email: row.try_get("summary_email")?,
        fallback_email: row.try_get("fallback_email")?,
    })
}

/// Create the tenant anchor if it does not exist yet, then return it
pub async fn ensure_tenant(pool: &SqlitePool, tenant_id: &TenantId, name: &str) -> Result<Tenant> {
    sqlx::query("INSERT OR IGNORE INTO tenants (id, name, created_at) VALUES (?, ?, ?)")
        .bind(tenant_id.as_str())
        .bind(name)
        .bind(to_storage(&now()))
        .execute(pool)
        .await?;

    get_tenant(pool, tenant_id)
        .await?
        .ok_or_else(|| Error::Internal(format!("tenant {tenant_id} vanished after insert")))
}

pub async fn get_tenant(pool: &SqlitePool, tenant_id: &TenantId) -> Result<Option<Tenant>> {
    let row = sqlx::query("SELECT id, name, created_at FROM tenants WHERE id = ?")
        .bind(tenant_id.as_str())
        .fetch_optional(pool)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let created_raw: String = row.try_get("created_at")?;
    let id: String = row.try_get("id")?;
    Ok(Some(Tenant {
        id: TenantId::new(id),
        name: row.try_get("name")?,
        created_at: from_storage(&created_raw).unwrap_or_else(now),
    }))
}

/// Store a new owner account
pub async fn create_user(pool: &SqlitePool, user: &User) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO users (id, email, name, twilio_phone_number, vapi_api_key, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.id)
    .bind(&user.email)
    .bind(&user.name)
    .bind(&user.twilio_phone_number)
    .bind(&user.vapi_api_key)
    .bind(to_storage(&now()))
    .execute(pool)
    .await?;

    Ok(())
}

/// Exact user id lookup
pub async fn get_user(pool: &SqlitePool, user_id: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
    let row = sqlx::query(&sql).bind(user_id).fetch_optional(pool).await?;

    row.as_ref().map(user_from_row).transpose()
}

/// Find the user whose id normalizes to `tenant_id`.
///
/// Stored user ids are matched both verbatim and in normalized form.
pub async fn find_user_for_tenant(pool: &SqlitePool, tenant_id: &TenantId) -> Result<Option<User>> {
    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users \
         WHERE id = ?1 OR (?2 IS NOT NULL AND lower(id) = ?2) LIMIT 1"
    );
    // Case folding only applies to UUID-shaped ids
    let uuid_form = tenant_id.as_uuid().map(|_| tenant_id.as_str());
    let row = sqlx::query(&sql)
        .bind(tenant_id.as_str())
        .bind(uuid_form)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(user_from_row).transpose()
}

pub async fn find_user_by_twilio_number(pool: &SqlitePool, number: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE twilio_phone_number = ? LIMIT 1");
    let row = sqlx::query(&sql).bind(number).fetch_optional(pool).await?;

    row.as_ref().map(user_from_row).transpose()
}

/// Oldest account in storage
pub async fn first_user(pool: &SqlitePool) -> Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, id ASC LIMIT 1");
    let row = sqlx::query(&sql).fetch_optional(pool).await?;

    row.as_ref().map(user_from_row).transpose()
}

/// Store a new assistant configuration
pub async fn create_assistant_config(pool: &SqlitePool, config: &AssistantConfig) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO assistant_configs
            (id, user_id, organization_name, vapi_assistant_id, summary_email, fallback_email, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&config.id)
    .bind(&config.user_id)
    .bind(&config.organization_name)
    .bind(&config.vapi_assistant_id)
    .bind(&config.summary_email)
    .bind(&config.fallback_email)
    .bind(to_storage(&now()))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn find_config_by_assistant_id(
    pool: &SqlitePool,
    assistant_id: &str,
) -> Result<Option<AssistantConfig>> {
    let sql = format!(
        "SELECT {CONFIG_COLUMNS} FROM assistant_configs WHERE vapi_assistant_id = ? \
         ORDER BY created_at ASC LIMIT 1"
    );
    let row = sqlx::query(&sql).bind(assistant_id).fetch_optional(pool).await?;

    row.as_ref().map(config_from_row).transpose()
}

pub async fn find_config_for_user(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Option<AssistantConfig>> {
    let sql = format!(
        "SELECT {CONFIG_COLUMNS} FROM assistant_configs WHERE user_id = ? \
         ORDER BY created_at ASC LIMIT 1"
    );
    let row = sqlx::query(&sql).bind(user_id).fetch_optional(pool).await?;

    row.as_ref().map(config_from_row).transpose()
}
