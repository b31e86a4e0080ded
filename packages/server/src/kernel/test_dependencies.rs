// TestDependencies - in-memory implementations for testing
//
// Provides storage doubles that can be injected into the AuthorizationGateway
// without a database. The role store serializes writers behind one async
// mutex and rolls back a grant/revoke when its audit write fails.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Mutex;

use super::{BaseAuditLog, BaseClock, BaseRoleStore, ServerDeps};
use crate::common::auth::{AuthorizationGateway, PolicyResolver, DEFAULT_FULL_ADMIN_LEVEL};
use crate::common::pagination::{Page, ValidatedPage};
use crate::common::{AuditRecordId, GrantId, SubjectId};
use crate::domains::audit::{AuditError, AuditFilter, AuditRecord, NewAuditEntry};
use crate::domains::auth::JwtService;
use crate::domains::roles::{NewRoleGrant, RevokeOutcome, RoleError, RoleGrant};

pub const TEST_JWT_SECRET: &str = "test_secret_key";
pub const TEST_JWT_ISSUER: &str = "admin-core-test";

// =============================================================================
// Fixed Clock
// =============================================================================

/// Manually driven clock.
pub struct FixedClock {
    now: StdMutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: StdMutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: ChronoDuration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl BaseClock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// =============================================================================
// In-Memory Audit Log
// =============================================================================

pub struct InMemoryAuditLog {
    // Insertion sequence breaks ties between records with equal timestamps.
    records: Mutex<Vec<(u64, AuditRecord)>>,
    clock: Arc<dyn BaseClock>,
}

impl InMemoryAuditLog {
    pub fn new(clock: Arc<dyn BaseClock>) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            clock,
        }
    }

    /// All records in insertion order.
    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .await
            .iter()
            .map(|(_, record)| record.clone())
            .collect()
    }

    /// Records with the given action, in insertion order.
    pub async fn records_for_action(&self, action: &str) -> Vec<AuditRecord> {
        self.records()
            .await
            .into_iter()
            .filter(|record| record.action == action)
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }
}

#[async_trait]
impl BaseAuditLog for InMemoryAuditLog {
    async fn record(&self, entry: NewAuditEntry) -> Result<AuditRecord, AuditError> {
        entry.validate()?;

        let mut records = self.records.lock().await;
        let seq = records.len() as u64;
        let record = entry.into_record(self.clock.now());
        records.push((seq, record.clone()));
        Ok(record)
    }

    async fn find(&self, id: AuditRecordId) -> Result<Option<AuditRecord>, AuditError> {
        let records = self.records.lock().await;
        Ok(records.iter().find(|(_, r)| r.id == id).map(|(_, r)| r.clone()))
    }

    async fn query(
        &self,
        filter: &AuditFilter,
        page: &ValidatedPage,
    ) -> Result<Page<AuditRecord>, AuditError> {
        let records = self.records.lock().await;

        let mut matching: Vec<&(u64, AuditRecord)> =
            records.iter().filter(|(_, r)| filter.matches(r)).collect();
        matching.sort_by(|(a_seq, a), (b_seq, b)| {
            b.created_at.cmp(&a.created_at).then(b_seq.cmp(a_seq))
        });

        let start = match page.before {
            None => 0,
            Some(cursor) => match matching.iter().position(|(_, r)| r.id.into_uuid() == cursor) {
                Some(index) => index + 1,
                // Cursor no longer in the filtered set: nothing older to show.
                None => matching.len(),
            },
        };

        let rows: Vec<AuditRecord> = matching
            .into_iter()
            .skip(start)
            .take(page.fetch_limit() as usize)
            .map(|(_, r)| r.clone())
            .collect();

        Ok(Page::from_rows(rows, page, |r| r.id.into_uuid()))
    }
}

/// Audit log whose storage is always down.
#[derive(Debug, Default)]
pub struct FailingAuditLog;

#[async_trait]
impl BaseAuditLog for FailingAuditLog {
    async fn record(&self, entry: NewAuditEntry) -> Result<AuditRecord, AuditError> {
        entry.validate()?;
        Err(AuditError::Persistence(sqlx::Error::PoolTimedOut))
    }

    async fn find(&self, _id: AuditRecordId) -> Result<Option<AuditRecord>, AuditError> {
        Err(AuditError::Persistence(sqlx::Error::PoolTimedOut))
    }

    async fn query(
        &self,
        _filter: &AuditFilter,
        _page: &ValidatedPage,
    ) -> Result<Page<AuditRecord>, AuditError> {
        Err(AuditError::Persistence(sqlx::Error::PoolTimedOut))
    }
}

/// Audit log that stalls before delegating, for exercising timeouts.
pub struct SlowAuditLog {
    inner: Arc<dyn BaseAuditLog>,
    delay: Duration,
}

impl SlowAuditLog {
    pub fn new(inner: Arc<dyn BaseAuditLog>, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl BaseAuditLog for SlowAuditLog {
    async fn record(&self, entry: NewAuditEntry) -> Result<AuditRecord, AuditError> {
        tokio::time::sleep(self.delay).await;
        self.inner.record(entry).await
    }

    async fn find(&self, id: AuditRecordId) -> Result<Option<AuditRecord>, AuditError> {
        tokio::time::sleep(self.delay).await;
        self.inner.find(id).await
    }

    async fn query(
        &self,
        filter: &AuditFilter,
        page: &ValidatedPage,
    ) -> Result<Page<AuditRecord>, AuditError> {
        tokio::time::sleep(self.delay).await;
        self.inner.query(filter, page).await
    }
}

/// Audit log that persists immediately but acknowledges late, like a commit
/// whose response is lost to a timeout.
pub struct LateAckAuditLog {
    inner: Arc<dyn BaseAuditLog>,
    delay: Duration,
}

impl LateAckAuditLog {
    pub fn new(inner: Arc<dyn BaseAuditLog>, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl BaseAuditLog for LateAckAuditLog {
    async fn record(&self, entry: NewAuditEntry) -> Result<AuditRecord, AuditError> {
        let record = self.inner.record(entry).await?;
        tokio::time::sleep(self.delay).await;
        Ok(record)
    }

    async fn find(&self, id: AuditRecordId) -> Result<Option<AuditRecord>, AuditError> {
        self.inner.find(id).await
    }

    async fn query(
        &self,
        filter: &AuditFilter,
        page: &ValidatedPage,
    ) -> Result<Page<AuditRecord>, AuditError> {
        self.inner.query(filter, page).await
    }
}

// =============================================================================
// In-Memory Role Store
// =============================================================================

pub struct InMemoryRoleStore {
    grants: Mutex<Vec<RoleGrant>>,
    audit: Arc<dyn BaseAuditLog>,
    clock: Arc<dyn BaseClock>,
}

impl InMemoryRoleStore {
    pub fn new(audit: Arc<dyn BaseAuditLog>, clock: Arc<dyn BaseClock>) -> Self {
        Self {
            grants: Mutex::new(Vec::new()),
            audit,
            clock,
        }
    }

    /// Insert a grant as-is, without validation or an audit record.
    pub async fn seed(&self, grant: RoleGrant) -> RoleGrant {
        self.grants.lock().await.push(grant.clone());
        grant
    }

    /// Seed an active grant starting at the current clock instant.
    pub async fn seed_new(&self, grant: NewRoleGrant) -> RoleGrant {
        let grant = grant.into_grant(GrantId::new(), self.clock.now());
        self.seed(grant).await
    }

    pub async fn all(&self) -> Vec<RoleGrant> {
        self.grants.lock().await.clone()
    }
}

#[async_trait]
impl BaseRoleStore for InMemoryRoleStore {
    async fn grant(
        &self,
        grant: NewRoleGrant,
        origin: Option<String>,
    ) -> Result<RoleGrant, RoleError> {
        let now = self.clock.now();
        grant.validate(now)?;

        let mut grants = self.grants.lock().await;
        let created = grant.into_grant(GrantId::new(), now);

        // Audit first; the grant becomes visible only if it succeeded.
        self.audit.record(created.grant_audit_entry(origin)).await?;
        grants.push(created.clone());
        Ok(created)
    }

    async fn revoke(
        &self,
        grant_id: GrantId,
        revoked_by: &SubjectId,
        origin: Option<String>,
    ) -> Result<RevokeOutcome, RoleError> {
        let mut grants = self.grants.lock().await;
        let index = grants
            .iter()
            .position(|g| g.id == grant_id)
            .ok_or(RoleError::NotFound(grant_id))?;

        let current = &grants[index];
        let (updated, outcome) = if current.is_active {
            let mut updated = current.clone();
            updated.is_active = false;
            updated.revoked_at = Some(self.clock.now());
            updated.revoked_by = Some(revoked_by.clone());
            (updated, RevokeOutcome::Revoked)
        } else {
            (current.clone(), RevokeOutcome::AlreadyRevoked)
        };

        self.audit
            .record(updated.revoke_audit_entry(revoked_by, outcome, origin))
            .await?;
        grants[index] = updated;
        Ok(outcome)
    }

    async fn list_effective(
        &self,
        subject_id: &SubjectId,
        at: DateTime<Utc>,
    ) -> Result<Vec<RoleGrant>, RoleError> {
        Ok(self
            .grants
            .lock()
            .await
            .iter()
            .filter(|g| &g.subject_id == subject_id && g.is_effective_at(at))
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, grant_id: GrantId) -> Result<Option<RoleGrant>, RoleError> {
        Ok(self
            .grants
            .lock()
            .await
            .iter()
            .find(|g| g.id == grant_id)
            .cloned())
    }

    async fn list_for_subject(&self, subject_id: &SubjectId) -> Result<Vec<RoleGrant>, RoleError> {
        let mut history: Vec<RoleGrant> = self
            .grants
            .lock()
            .await
            .iter()
            .filter(|g| &g.subject_id == subject_id)
            .cloned()
            .collect();
        history.reverse();
        Ok(history)
    }
}

/// Role store whose reads and writes always fail.
#[derive(Debug, Default)]
pub struct FailingRoleStore;

#[async_trait]
impl BaseRoleStore for FailingRoleStore {
    async fn grant(
        &self,
        _grant: NewRoleGrant,
        _origin: Option<String>,
    ) -> Result<RoleGrant, RoleError> {
        Err(RoleError::Persistence(sqlx::Error::PoolTimedOut))
    }

    async fn revoke(
        &self,
        _grant_id: GrantId,
        _revoked_by: &SubjectId,
        _origin: Option<String>,
    ) -> Result<RevokeOutcome, RoleError> {
        Err(RoleError::Persistence(sqlx::Error::PoolTimedOut))
    }

    async fn list_effective(
        &self,
        _subject_id: &SubjectId,
        _at: DateTime<Utc>,
    ) -> Result<Vec<RoleGrant>, RoleError> {
        Err(RoleError::Persistence(sqlx::Error::PoolTimedOut))
    }

    async fn find_by_id(&self, _grant_id: GrantId) -> Result<Option<RoleGrant>, RoleError> {
        Err(RoleError::Persistence(sqlx::Error::PoolTimedOut))
    }

    async fn list_for_subject(&self, _subject_id: &SubjectId) -> Result<Vec<RoleGrant>, RoleError> {
        Err(RoleError::Persistence(sqlx::Error::PoolTimedOut))
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

/// In-memory wiring for the gateway.
///
/// Swap the audit log or role store before seeding grants: `with_audit`
/// builds a fresh role store on top of the new log.
pub struct TestDependencies {
    pub clock: Arc<FixedClock>,
    /// Always the recording log, even when `audit` is replaced.
    pub audit_log: Arc<InMemoryAuditLog>,
    pub audit: Arc<dyn BaseAuditLog>,
    pub role_store: Arc<InMemoryRoleStore>,
    pub roles: Arc<dyn BaseRoleStore>,
    pub full_admin_level: i32,
    pub audit_timeout: Duration,
}

impl TestDependencies {
    pub fn new() -> Self {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let audit_log = Arc::new(InMemoryAuditLog::new(clock.clone()));
        let role_store = Arc::new(InMemoryRoleStore::new(audit_log.clone(), clock.clone()));

        Self {
            clock,
            audit: audit_log.clone(),
            audit_log,
            roles: role_store.clone(),
            role_store,
            full_admin_level: DEFAULT_FULL_ADMIN_LEVEL,
            audit_timeout: Duration::from_millis(250),
        }
    }

    /// Replace the audit log used by both the gateway and the role store.
    pub fn with_audit(mut self, audit: Arc<dyn BaseAuditLog>) -> Self {
        self.role_store = Arc::new(InMemoryRoleStore::new(audit.clone(), self.clock.clone()));
        self.roles = self.role_store.clone();
        self.audit = audit;
        self
    }

    /// Replace the role store seen by the gateway.
    pub fn with_roles(mut self, roles: Arc<dyn BaseRoleStore>) -> Self {
        self.roles = roles;
        self
    }

    pub fn with_full_admin_level(mut self, level: i32) -> Self {
        self.full_admin_level = level;
        self
    }

    pub fn with_audit_timeout(mut self, timeout: Duration) -> Self {
        self.audit_timeout = timeout;
        self
    }

    /// Seed an active grant for `subject_id` at the current clock instant.
    pub async fn seed_grant(&self, grant: NewRoleGrant) -> RoleGrant {
        self.role_store.seed_new(grant).await
    }

    pub fn gateway(&self) -> AuthorizationGateway {
        AuthorizationGateway::new(
            self.roles.clone(),
            self.audit.clone(),
            self.clock.clone(),
            PolicyResolver::new(self.full_admin_level),
            self.audit_timeout,
        )
    }

    pub fn jwt_service(&self) -> JwtService {
        JwtService::new(TEST_JWT_SECRET, TEST_JWT_ISSUER.to_string())
    }

    /// Convert into ServerDeps for HTTP-level tests
    pub fn into_server_deps(&self) -> ServerDeps {
        ServerDeps::new(Arc::new(self.gateway()), Arc::new(self.jwt_service()))
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::audit::ResourceRef;

    fn entry(action: &str) -> NewAuditEntry {
        NewAuditEntry::builder()
            .actor_id("a")
            .action(action)
            .resource(ResourceRef::new("notice", "n1"))
            .build()
    }

    #[tokio::test]
    async fn test_query_pages_newest_first_with_equal_timestamps() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let log = InMemoryAuditLog::new(clock.clone());
        for action in ["first", "second", "third"] {
            log.record(entry(action)).await.unwrap();
        }

        let page = ValidatedPage { limit: 2, before: None };
        let first = log.query(&AuditFilter::default(), &page).await.unwrap();
        let actions: Vec<_> = first.items.iter().map(|r| r.action.as_str()).collect();
        assert_eq!(actions, vec!["third", "second"]);

        let cursor = crate::common::pagination::Cursor::decode(first.next_cursor.as_deref().unwrap())
            .unwrap()
            .into_uuid();
        let next = ValidatedPage { limit: 2, before: Some(cursor) };
        let second = log.query(&AuditFilter::default(), &next).await.unwrap();
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0].action, "first");
        assert!(second.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_grant_is_rolled_back_when_audit_fails() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let store = InMemoryRoleStore::new(Arc::new(FailingAuditLog), clock);

        let result = store
            .grant(NewRoleGrant::builder().subject_id("d").level(1).build(), None)
            .await;

        assert!(matches!(result, Err(RoleError::Audit(_))));
        assert!(store.all().await.is_empty());
    }

    #[tokio::test]
    async fn test_fixed_clock_advances() {
        let start = Utc::now();
        let clock = FixedClock::new(start);
        clock.advance(ChronoDuration::hours(2));
        assert_eq!(clock.now(), start + ChronoDuration::hours(2));
    }
}
