//! Postgres-backed role store and audit log tests.
//!
//! Run against a shared testcontainers Postgres; every test uses its own
//! subjects so they can share the database.

mod common;

use crate::common::{capability_grant, level_grant, unique_subject, TestHarness};
use chrono::{Duration as ChronoDuration, Utc};
use server_core::common::auth::{AuditContext, Capability, Decision, Requirement};
use server_core::common::pagination::{PageRequest, ValidatedPage};
use server_core::common::{AuditRecordId, GrantId, SubjectId};
use server_core::domains::audit::{
    AuditError, AuditFilter, NewAuditEntry, PostgresAuditLog, ResourceRef,
};
use server_core::domains::roles::{
    NewRoleGrant, RevokeOutcome, RoleError, RoleGrantRequest, GRANT_ROLE_ACTION,
    REVOKE_ROLE_ACTION, SUBJECT_RESOURCE,
};
use server_core::kernel::{BaseAuditLog, BaseRoleStore};
use test_context::test_context;

#[test_context(TestHarness)]
#[tokio::test]
async fn grant_persists_row_and_audit_record(ctx: &TestHarness) {
    let store = ctx.role_store();
    let subject = unique_subject("d");

    let grant = store
        .grant(
            capability_grant(&subject, 3, &[Capability::ContentWrite]),
            Some("10.1.1.1".to_string()),
        )
        .await
        .unwrap();

    let found = store.find_by_id(grant.id).await.unwrap().unwrap();
    assert_eq!(found, grant);
    assert!(found.is_active);
    assert!(found.granted_by.is_none());

    let page = ctx
        .audit_log()
        .query(
            &AuditFilter::for_resource(SUBJECT_RESOURCE, subject.as_str()),
            &ValidatedPage::default(),
        )
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
    let record = &page.items[0];
    assert_eq!(record.action, GRANT_ROLE_ACTION);
    assert_eq!(record.actor_id, SubjectId::system());
    assert_eq!(record.origin.as_deref(), Some("10.1.1.1"));
    assert_eq!(record.details["level"], 3);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn list_effective_respects_expiry_and_revocation(ctx: &TestHarness) {
    let store = ctx.role_store();
    let subject = unique_subject("temp");
    let now = Utc::now();

    let temporary = store
        .grant(
            NewRoleGrant::builder()
                .subject_id(subject.clone())
                .level(2)
                .expires_at(now + ChronoDuration::hours(1))
                .build(),
            None,
        )
        .await
        .unwrap();
    let permanent = store.grant(level_grant(&subject, 1), None).await.unwrap();

    let current = store.list_effective(&subject, Utc::now()).await.unwrap();
    assert_eq!(current.len(), 2);

    let later = store
        .list_effective(&subject, now + ChronoDuration::hours(2))
        .await
        .unwrap();
    assert_eq!(later.len(), 1);
    assert_eq!(later[0].id, permanent.id);

    store
        .revoke(permanent.id, &SubjectId::system(), None)
        .await
        .unwrap();
    let after_revoke = store.list_effective(&subject, Utc::now()).await.unwrap();
    assert_eq!(after_revoke.len(), 1);
    assert_eq!(after_revoke[0].id, temporary.id);

    // History keeps the tombstone.
    let history = store.list_for_subject(&subject).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().any(|g| g.id == permanent.id && !g.is_active));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn revoke_is_idempotent_and_audited_per_call(ctx: &TestHarness) {
    let store = ctx.role_store();
    let subject = unique_subject("target");
    let revoker = unique_subject("revoker");
    let grant = store.grant(level_grant(&subject, 2), None).await.unwrap();

    let first = store.revoke(grant.id, &revoker, None).await.unwrap();
    let second = store.revoke(grant.id, &revoker, None).await.unwrap();
    assert_eq!(first, RevokeOutcome::Revoked);
    assert_eq!(second, RevokeOutcome::AlreadyRevoked);

    let stored = store.find_by_id(grant.id).await.unwrap().unwrap();
    assert!(!stored.is_active);
    assert_eq!(stored.revoked_by, Some(revoker.clone()));
    assert!(stored.revoked_at.is_some());

    let page = ctx
        .audit_log()
        .query(&AuditFilter::for_actor(revoker), &ValidatedPage::default())
        .await
        .unwrap();
    assert_eq!(page.items.len(), 2);
    assert!(page.items.iter().all(|r| r.action == REVOKE_ROLE_ACTION));
    // Newest first
    assert_eq!(page.items[0].details["outcome"], "already_revoked");
    assert_eq!(page.items[1].details["outcome"], "revoked");
}

#[test_context(TestHarness)]
#[tokio::test]
async fn revoke_unknown_grant_is_not_found(ctx: &TestHarness) {
    let result = ctx
        .role_store()
        .revoke(GrantId::new(), &SubjectId::system(), None)
        .await;

    assert!(matches!(result, Err(RoleError::NotFound(_))));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn invalid_grants_are_rejected_before_storage(ctx: &TestHarness) {
    let store = ctx.role_store();
    let subject = unique_subject("bad");

    let negative = store.grant(level_grant(&subject, -2), None).await;
    assert!(matches!(negative, Err(RoleError::InvalidLevel(-2))));

    let past = store
        .grant(
            NewRoleGrant::builder()
                .subject_id(subject.clone())
                .level(1)
                .expires_at(Utc::now() - ChronoDuration::minutes(5))
                .build(),
            None,
        )
        .await;
    assert!(matches!(past, Err(RoleError::InvalidWindow(_))));

    assert!(store.list_for_subject(&subject).await.unwrap().is_empty());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn audit_records_cannot_be_updated_or_deleted(ctx: &TestHarness) {
    let actor = unique_subject("actor");
    let record = ctx
        .audit_log()
        .record(
            NewAuditEntry::builder()
                .actor_id(actor)
                .action("delete")
                .resource(ResourceRef::new("notice", "n1"))
                .build(),
        )
        .await
        .unwrap();

    let update = sqlx::query("UPDATE audit_records SET action = 'noop' WHERE id = $1")
        .bind(record.id)
        .execute(&ctx.db_pool)
        .await;
    assert!(update.is_err());

    let delete = sqlx::query("DELETE FROM audit_records WHERE id = $1")
        .bind(record.id)
        .execute(&ctx.db_pool)
        .await;
    assert!(delete.is_err());

    let action: String = sqlx::query_scalar("SELECT action FROM audit_records WHERE id = $1")
        .bind(record.id)
        .fetch_one(&ctx.db_pool)
        .await
        .unwrap();
    assert_eq!(action, "delete");
}

#[test_context(TestHarness)]
#[tokio::test]
async fn role_grants_cannot_be_deleted(ctx: &TestHarness) {
    let subject = unique_subject("keep");
    let grant = ctx
        .role_store()
        .grant(level_grant(&subject, 1), None)
        .await
        .unwrap();

    let delete = sqlx::query("DELETE FROM role_grants WHERE id = $1")
        .bind(grant.id)
        .execute(&ctx.db_pool)
        .await;

    assert!(delete.is_err());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn invalid_audit_entries_are_rejected(ctx: &TestHarness) {
    let result = ctx
        .audit_log()
        .record(
            NewAuditEntry::builder()
                .actor_id("someone")
                .action("")
                .resource(ResourceRef::new("notice", "n1"))
                .build(),
        )
        .await;

    assert!(result.is_err());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn audit_query_pages_newest_first(ctx: &TestHarness) {
    let log = ctx.audit_log();
    let actor = unique_subject("pager");
    for id in ["a", "b", "c"] {
        log.record(
            NewAuditEntry::builder()
                .actor_id(actor.clone())
                .action("update")
                .resource(ResourceRef::new("fee", id))
                .build(),
        )
        .await
        .unwrap();
    }
    let filter = AuditFilter::for_actor(actor);

    let first = log
        .query(&filter, &PageRequest::first(2).validate().unwrap())
        .await
        .unwrap();
    let ids: Vec<_> = first.items.iter().map(|r| r.resource_id.clone().unwrap()).collect();
    assert_eq!(ids, vec!["c", "b"]);

    let next = PageRequest {
        limit: Some(2),
        before: first.next_cursor.clone(),
    }
    .validate()
    .unwrap();
    let second = log.query(&filter, &next).await.unwrap();
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.items[0].resource_id.as_deref(), Some("a"));
    assert!(second.next_cursor.is_none());

    // A cursor for an id that does not exist yields nothing.
    let unknown = ValidatedPage {
        limit: 2,
        before: Some(uuid::Uuid::now_v7()),
    };
    assert!(log.query(&filter, &unknown).await.unwrap().items.is_empty());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn audit_query_is_bounded_by_storage_timeout(ctx: &TestHarness) {
    let log = PostgresAuditLog::new(ctx.db_pool.clone(), std::time::Duration::ZERO);

    let result = log
        .query(&AuditFilter::default(), &ValidatedPage::default())
        .await;

    assert!(matches!(result, Err(AuditError::Timeout(_))));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn audit_records_are_found_by_preassigned_id(ctx: &TestHarness) {
    let log = ctx.audit_log();
    let entry = NewAuditEntry::builder()
        .actor_id(unique_subject("finder"))
        .action("publish")
        .resource(ResourceRef::new("notice", "n4"))
        .build();
    let id = entry.id;

    assert!(log.find(id).await.unwrap().is_none());
    let record = log.record(entry).await.unwrap();
    assert_eq!(record.id, id);
    assert_eq!(log.find(id).await.unwrap(), Some(record));
    assert!(log.find(AuditRecordId::new()).await.unwrap().is_none());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn audit_query_filters_by_time_range(ctx: &TestHarness) {
    let log = ctx.audit_log();
    let actor = unique_subject("timed");
    let record = log
        .record(
            NewAuditEntry::builder()
                .actor_id(actor.clone())
                .action("publish")
                .resource(ResourceRef::new("notice", "n9"))
                .build(),
        )
        .await
        .unwrap();

    let mut filter = AuditFilter::for_actor(actor);
    filter.time_range = Some(server_core::domains::audit::TimeRange {
        from: Some(record.created_at),
        to: Some(record.created_at + ChronoDuration::seconds(1)),
    });
    assert_eq!(
        log.query(&filter, &ValidatedPage::default()).await.unwrap().items.len(),
        1
    );

    filter.time_range = Some(server_core::domains::audit::TimeRange {
        from: None,
        to: Some(record.created_at),
    });
    assert!(log
        .query(&filter, &ValidatedPage::default())
        .await
        .unwrap()
        .items
        .is_empty());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn unknown_stored_capabilities_are_dropped(ctx: &TestHarness) {
    let store = ctx.role_store();
    let subject = unique_subject("legacy");
    let grant = store
        .grant(capability_grant(&subject, 1, &[Capability::AuditRead]), None)
        .await
        .unwrap();

    sqlx::query(
        r#"UPDATE role_grants SET permissions = '["audit:read", "legacy:is_admin"]'::jsonb WHERE id = $1"#,
    )
    .bind(grant.id)
    .execute(&ctx.db_pool)
    .await
    .unwrap();

    let found = store.find_by_id(grant.id).await.unwrap().unwrap();
    assert_eq!(found.permissions.len(), 1);
    assert!(found.permissions.contains(&Capability::AuditRead));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn gateway_over_postgres_audits_permits(ctx: &TestHarness) {
    let gateway = ctx.gateway();
    let store = ctx.role_store();
    let c = unique_subject("c");
    let d = unique_subject("d");
    store.grant(level_grant(&c, 5), None).await.unwrap();

    gateway
        .grant_role(&c, RoleGrantRequest::new(d.clone(), 3), None)
        .await
        .unwrap();
    assert!(gateway.check(&d, &Requirement::level(3)).await.unwrap().is_permit());

    let decision = gateway
        .check_and_log(
            &d,
            &Requirement::level(3),
            "update",
            ResourceRef::new("hostel", "h1"),
            AuditContext::from_origin(Some("198.51.100.2".to_string())),
        )
        .await
        .unwrap();
    assert_eq!(decision, Decision::Permit);

    let page = ctx
        .audit_log()
        .query(&AuditFilter::for_actor(d), &ValidatedPage::default())
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].resource_type, "hostel");

    let denied = gateway
        .grant_role(&c, RoleGrantRequest::new(unique_subject("x"), 5), None)
        .await;
    assert!(matches!(denied, Err(RoleError::InvalidGrantor { .. })));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn concurrent_changes_to_one_subject_all_commit(ctx: &TestHarness) {
    let store = ctx.role_store();
    let subject = unique_subject("busy");

    let mut handles = Vec::new();
    for level in 0..5 {
        let store = store.clone();
        let subject = subject.clone();
        handles.push(tokio::spawn(async move {
            store.grant(level_grant(&subject, level), None).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let history = store.list_for_subject(&subject).await.unwrap();
    assert_eq!(history.len(), 5);

    let grant_records = ctx
        .audit_log()
        .query(
            &AuditFilter::for_resource(SUBJECT_RESOURCE, subject.as_str()),
            &ValidatedPage::default(),
        )
        .await
        .unwrap();
    assert_eq!(grant_records.items.len(), 5);
}
