//! Tenant resolution for webhook events
//!
//! Strategies are tried in order; the first one that identifies an owner
//! wins. An event no strategy can attribute is rejected rather than stored
//! under a guessed tenant.

use crate::db::{
    find_config_by_assistant_id, find_config_for_user, find_user_by_twilio_number,
    find_user_for_tenant, first_user, get_call_by_id, get_user,
};
use ava_common::db::{AssistantConfig, User};
use ava_common::{Error, Result, TenantId};
use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

/// Ownership hints carried by an inbound event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventSignals {
    pub call_id: Option<String>,
    /// Explicit owner ids from the call metadata, in lookup order
    pub owner_ids: Vec<String>,
    pub assistant_id: Option<String>,
    /// Number the caller dialed
    pub destination_number: Option<String>,
}

/// Owner found for an event
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub user: User,
    pub config: Option<AssistantConfig>,
    /// Name of the strategy that matched
    pub strategy: &'static str,
}

impl Resolution {
    fn new(user: User, config: Option<AssistantConfig>, strategy: &'static str) -> Self {
        Self {
            user,
            config,
            strategy,
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.user.tenant_id()
    }
}

#[async_trait]
pub trait TenantStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn resolve(&self, pool: &SqlitePool, signals: &EventSignals) -> Result<Option<Resolution>>;
}

/// A call id already stored keeps its owner
pub struct KnownCall;

#[async_trait]
impl TenantStrategy for KnownCall {
    fn name(&self) -> &'static str {
        "known_call"
    }

    async fn resolve(&self, pool: &SqlitePool, signals: &EventSignals) -> Result<Option<Resolution>> {
        let Some(call_id) = signals.call_id.as_deref() else {
            return Ok(None);
        };
        let Some(call) = get_call_by_id(pool, call_id).await? else {
            return Ok(None);
        };

        let user = find_user_for_tenant(pool, &call.tenant_id).await?;
        if user.is_none() {
            debug!(call_id, tenant_id = %call.tenant_id, "Stored call owner has no user account");
        }
        Ok(user.map(|u| Resolution::new(u, None, self.name())))
    }
}

/// `user_id` / `tenant_id` style keys in the call metadata
pub struct ExplicitOwnerId;

#[async_trait]
impl TenantStrategy for ExplicitOwnerId {
    fn name(&self) -> &'static str {
        "explicit_owner_id"
    }

    async fn resolve(&self, pool: &SqlitePool, signals: &EventSignals) -> Result<Option<Resolution>> {
        for owner_id in &signals.owner_ids {
            let tenant_id = TenantId::new(owner_id);
            if let Some(user) = find_user_for_tenant(pool, &tenant_id).await? {
                return Ok(Some(Resolution::new(user, None, self.name())));
            }
            debug!(owner_id = %owner_id, "Metadata owner id matches no user");
        }
        Ok(None)
    }
}

/// Assistant id registered in an assistant configuration
pub struct AssistantConfigMatch;

#[async_trait]
impl TenantStrategy for AssistantConfigMatch {
    fn name(&self) -> &'static str {
        "assistant_config"
    }

    async fn resolve(&self, pool: &SqlitePool, signals: &EventSignals) -> Result<Option<Resolution>> {
        let Some(assistant_id) = signals.assistant_id.as_deref() else {
            return Ok(None);
        };
        let Some(config) = find_config_by_assistant_id(pool, assistant_id).await? else {
            return Ok(None);
        };

        let user = get_user(pool, &config.user_id).await?;
        if user.is_none() {
            warn!(
                assistant_id,
                user_id = %config.user_id,
                "Assistant configuration points at a missing user"
            );
        }
        Ok(user.map(|u| Resolution::new(u, Some(config), self.name())))
    }
}

/// Dialed number registered as a user's carrier number
pub struct DestinationNumber;

#[async_trait]
impl TenantStrategy for DestinationNumber {
    fn name(&self) -> &'static str {
        "destination_number"
    }

    async fn resolve(&self, pool: &SqlitePool, signals: &EventSignals) -> Result<Option<Resolution>> {
        let Some(number) = signals.destination_number.as_deref() else {
            return Ok(None);
        };
        let user = find_user_by_twilio_number(pool, number).await?;
        Ok(user.map(|u| Resolution::new(u, None, self.name())))
    }
}

/// Attribute to the oldest account. Single-tenant deployments only.
pub struct SingleTenantFallback;

#[async_trait]
impl TenantStrategy for SingleTenantFallback {
    fn name(&self) -> &'static str {
        "single_tenant_fallback"
    }

    async fn resolve(&self, pool: &SqlitePool, signals: &EventSignals) -> Result<Option<Resolution>> {
        let user = first_user(pool).await?;
        if let Some(user) = &user {
            warn!(
                call_id = ?signals.call_id,
                user_id = %user.id,
                "No ownership signal matched, attributing event to the first user"
            );
        }
        Ok(user.map(|u| Resolution::new(u, None, self.name())))
    }
}

/// Ordered strategy chain
pub struct TenantResolver {
    strategies: Vec<Box<dyn TenantStrategy>>,
}

impl TenantResolver {
    /// Standard chain; the first-user fallback is only appended in single-tenant mode
    pub fn standard(single_tenant_mode: bool) -> Self {
        let mut strategies: Vec<Box<dyn TenantStrategy>> = vec![
            Box::new(KnownCall),
            Box::new(ExplicitOwnerId),
            Box::new(AssistantConfigMatch),
            Box::new(DestinationNumber),
        ];
        if single_tenant_mode {
            strategies.push(Box::new(SingleTenantFallback));
        }
        Self::with_strategies(strategies)
    }

    pub fn with_strategies(strategies: Vec<Box<dyn TenantStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Find the owner of an event, with its assistant configuration when one exists
    pub async fn resolve(&self, pool: &SqlitePool, signals: &EventSignals) -> Result<Resolution> {
        for strategy in &self.strategies {
            let Some(mut resolution) = strategy.resolve(pool, signals).await? else {
                continue;
            };

            if resolution.config.is_none() {
                resolution.config = find_config_for_user(pool, &resolution.user.id).await?;
            }

            info!(
                call_id = ?signals.call_id,
                user_id = %resolution.user.id,
                strategy = resolution.strategy,
                "Resolved event owner"
            );
            return Ok(resolution);
        }

        Err(Error::TenantUnresolved(format!(
            "no owner found for call {}",
            signals.call_id.as_deref().unwrap_or("<unknown>")
        )))
    }
}
