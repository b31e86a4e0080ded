//! Server dependencies (using traits for testability)
//!
//! This module provides the central dependency container used by the HTTP
//! layer and the seeding CLI. Storage sits behind the `Base*` traits so tests
//! can swap in the in-memory doubles from `test_dependencies`.

use sqlx::PgPool;
use std::sync::Arc;

use crate::common::auth::{AuthorizationGateway, HasAuthContext, PolicyResolver};
use crate::config::Config;
use crate::domains::audit::PostgresAuditLog;
use crate::domains::auth::JwtService;
use crate::domains::roles::PostgresRoleStore;
use crate::kernel::{BaseAuditLog, BaseRoleStore, SystemClock};

// =============================================================================
// ServerDeps
// =============================================================================

#[derive(Clone)]
pub struct ServerDeps {
    pub gateway: Arc<AuthorizationGateway>,
    /// JWT service for bearer token verification
    pub jwt_service: Arc<JwtService>,
}

impl ServerDeps {
    pub fn new(gateway: Arc<AuthorizationGateway>, jwt_service: Arc<JwtService>) -> Self {
        Self {
            gateway,
            jwt_service,
        }
    }

    /// Wire the Postgres-backed stores and the system clock.
    pub fn postgres(pool: PgPool, config: &Config) -> Self {
        let timeout = config.storage_timeout();
        let audit: Arc<dyn BaseAuditLog> = Arc::new(PostgresAuditLog::new(pool.clone(), timeout));
        let roles: Arc<dyn BaseRoleStore> = Arc::new(PostgresRoleStore::new(pool, timeout));

        let gateway = AuthorizationGateway::new(
            roles,
            audit,
            Arc::new(SystemClock),
            PolicyResolver::new(config.full_admin_level),
            timeout,
        );
        let jwt_service = JwtService::new(&config.jwt_secret, config.jwt_issuer.clone());

        Self::new(Arc::new(gateway), Arc::new(jwt_service))
    }
}

/// Implement HasAuthContext for ServerDeps to enable authorization checks
impl HasAuthContext for ServerDeps {
    fn gateway(&self) -> &AuthorizationGateway {
        &self.gateway
    }
}
