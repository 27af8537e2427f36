//! Mapper guarantees: idempotent stores, key ordering, query counts,
//! identity map behaviour, and error reporting.

use std::sync::Arc;

use ntest::timeout;
use serde_json::json;

use docmap_orm::{
    EntityCollection, EntityMap, LazyCollectionProxy, MapperError, RelationField, Session,
};
use docmap_store::{Database, DocumentId, DocumentStore, StoreConfig};

use super::helpers::TestContext;

/// Stores a user with the given number of new roles and returns the
/// user id and the role ids in order.
fn user_with_roles(ctx: &TestContext, count: usize) -> (DocumentId, Vec<DocumentId>) {
    let mut user = ctx.make("User");
    for _ in 0..count {
        user.related_mut("roles").unwrap().push(ctx.make("Role"));
    }
    ctx.session.store(&mut user).unwrap();
    let ids = user.related_mut("roles").unwrap().ids();
    (user.id().cloned().unwrap(), ids)
}

#[timeout(1000)]
#[test]
fn test_store_is_idempotent() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let mut user = ctx.make("User");
    user.related_mut("roles")?.push(ctx.make("Role"));
    ctx.session.store(&mut user)?;

    ctx.db.reset_stats();
    ctx.session.store(&mut user)?;
    assert_eq!(ctx.writes(), 0);

    let mut loaded = ctx.mapper("User").find(user.id().unwrap())?;
    loaded.related_mut("roles")?;
    ctx.db.reset_stats();
    ctx.session.store(&mut loaded)?;
    ctx.session.store(&mut loaded)?;
    assert_eq!(ctx.writes(), 0);
    Ok(())
}

#[timeout(1000)]
#[test]
fn test_round_trip_preserves_order_and_duplicates() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let mut a = ctx.factory.create("Role", Default::default())?;
    let mut b = ctx.factory.create("Role", Default::default())?;
    a.set("name", "A");
    b.set("name", "B");

    let mut user = ctx.make("User");
    user.set_related(
        "roles",
        EntityCollection::from(vec![b.clone(), a.clone(), b.clone()]),
    );
    ctx.session.store(&mut user)?;

    let expected = vec![
        b.id().cloned().unwrap(),
        a.id().cloned().unwrap(),
        b.id().cloned().unwrap(),
    ];
    ctx.see_in_database(
        "users",
        json!({"role_ids": [expected[0].as_str(), expected[1].as_str(), expected[2].as_str()]}),
    );

    ctx.session.clear_cache();
    let mut loaded = ctx.mapper("User").find(user.id().unwrap())?;
    assert_eq!(loaded.related_mut("roles")?.ids(), expected);

    let eager = ctx
        .mapper("User")
        .with("roles")
        .where_("_id", "=", user.id().unwrap())
        .first()?
        .expect("user is stored");
    let eager_ids = eager.relation("roles").and_then(|r| r.as_loaded()).map(|c| c.ids());
    assert_eq!(eager_ids, Some(expected));
    Ok(())
}

#[timeout(1000)]
#[test]
fn test_proxy_resolution_issues_one_query() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let (user_id, _) = user_with_roles(&ctx, 3);

    let mut loaded = ctx.mapper("User").find(&user_id)?;
    ctx.db.reset_stats();
    let roles = loaded.relation_mut("roles").expect("relation is hydrated");
    assert_eq!(roles.len()?, 3);
    assert_eq!(ctx.reads(), 1);

    assert_eq!(roles.len()?, 3);
    assert!(roles.first_mut()?.is_some());
    assert_eq!(ctx.reads(), 1);
    Ok(())
}

#[timeout(1000)]
#[test]
fn test_empty_relation_resolves_without_query() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let (user_id, _) = user_with_roles(&ctx, 0);

    let mut loaded = ctx.mapper("User").find(&user_id)?;
    ctx.db.reset_stats();
    assert_eq!(loaded.related_mut("roles")?.len(), 0);
    assert_eq!(ctx.reads(), 0);
    Ok(())
}

#[timeout(1000)]
#[test]
fn test_eager_load_uses_one_query_per_relation() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    for count in [1, 2, 3] {
        user_with_roles(&ctx, count);
    }

    ctx.db.reset_stats();
    let users = ctx.mapper("User").with("roles").get()?;
    assert_eq!(users.len(), 3);
    assert_eq!(ctx.reads(), 2);

    let total: usize = users
        .iter()
        .filter_map(|u| u.relation("roles").and_then(RelationField::as_loaded))
        .map(EntityCollection::len)
        .sum();
    assert_eq!(total, 6);
    Ok(())
}

#[timeout(1000)]
#[test]
fn test_dangling_keys_are_skipped() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let role = ctx.factory.create("Role", Default::default())?;
    let role_id = role.id().unwrap().as_str().to_string();
    let user_id = ctx.db.insert(
        "users",
        json!({"email": "x@example.com", "role_ids": ["missing", role_id]})
            .as_object()
            .cloned()
            .unwrap(),
    )?;

    let mut loaded = ctx.mapper("User").find(&user_id)?;
    let ids = loaded.related_mut("roles")?.ids();
    assert_eq!(ids, vec![DocumentId::from(role_id.as_str())]);
    Ok(())
}

#[timeout(1000)]
#[test]
fn test_identity_map_and_clear_cache() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let (user_id, _) = user_with_roles(&ctx, 1);
    let users = ctx.mapper("User");

    ctx.db.reset_stats();
    users.find(&user_id)?;
    users.find(&user_id)?;
    assert_eq!(ctx.reads(), 0);

    ctx.session.clear_cache();
    assert_eq!(ctx.session.cached_count(), 0);
    users.find(&user_id)?;
    assert_eq!(ctx.reads(), 1);
    Ok(())
}

#[timeout(1000)]
#[test]
fn test_find_reflects_latest_store() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let (user_id, _) = user_with_roles(&ctx, 0);
    let users = ctx.mapper("User");

    let mut first = users.find(&user_id)?;
    first.set("email", "new@example.com");
    ctx.session.store(&mut first)?;

    let second = users.find(&user_id)?;
    assert_eq!(second.get("email"), Some(&json!("new@example.com")));
    assert!(!second.is_dirty());
    Ok(())
}

#[timeout(1000)]
#[test]
fn test_find_missing_entity() {
    let ctx = TestContext::new();
    let err = ctx
        .mapper("User")
        .find(&DocumentId::from("does-not-exist"))
        .unwrap_err();
    assert_eq!(
        err,
        MapperError::NotFound {
            entity_type: "User".to_string(),
            id: "does-not-exist".to_string(),
        }
    );
}

#[timeout(1000)]
#[test]
fn test_invalid_relation_state() {
    let ctx = TestContext::new();
    let mut user = ctx.make("User");
    user.set("roles", json!(["not", "entities"]));
    let err = ctx.session.store(&mut user).unwrap_err();
    assert!(matches!(
        err,
        MapperError::InvalidRelationState { ref relation, .. } if relation == "roles"
    ));
    assert_eq!(ctx.db.document_count("users"), 0);
}

#[timeout(1000)]
#[test]
fn test_resolved_relation_is_not_replaced_by_proxy() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let (user_id, _) = user_with_roles(&ctx, 1);

    let mut stale = ctx.mapper("User").find(&user_id)?;
    let proxy: LazyCollectionProxy = match stale.relation("roles") {
        Some(RelationField::Lazy(proxy)) => proxy.clone(),
        other => panic!("expected a proxy, got {:?}", other),
    };

    let mut loaded = ctx.mapper("User").find(&user_id)?;
    loaded.related_mut("roles")?.push(ctx.make("Role"));
    let err = loaded
        .set_relation("roles", RelationField::Lazy(proxy))
        .unwrap_err();
    assert!(matches!(err, MapperError::InvalidRelationState { .. }));
    assert_eq!(loaded.related_mut("roles")?.len(), 2);

    assert!(stale.related_mut("roles").is_ok());
    Ok(())
}

#[timeout(1000)]
#[test]
fn test_store_unavailable() {
    let ctx = TestContext::new();
    let (user_id, _) = user_with_roles(&ctx, 1);
    ctx.session.clear_cache();

    ctx.db.disconnect();
    let err = ctx.mapper("User").find(&user_id).unwrap_err();
    assert!(matches!(err, MapperError::StoreUnavailable(_)));

    let mut user = ctx.make("User");
    let err = ctx.session.store(&mut user).unwrap_err();
    assert!(matches!(err, MapperError::StoreUnavailable(_)));
}

#[timeout(1000)]
#[test]
fn test_proxy_resolution_propagates_store_failure() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let (user_id, _) = user_with_roles(&ctx, 2);
    let mut loaded = ctx.mapper("User").find(&user_id)?;

    ctx.db.disconnect();
    let roles = loaded.relation_mut("roles").expect("relation is hydrated");
    assert!(matches!(roles.len(), Err(MapperError::StoreUnavailable(_))));
    assert!(!roles.is_resolved());

    ctx.db.reconnect();
    assert_eq!(roles.len()?, 2);
    Ok(())
}

#[timeout(1000)]
#[test]
fn test_proxy_after_session_closed() -> anyhow::Result<()> {
    let db = Arc::new(Database::new(StoreConfig::for_database("closed_session_test")));
    let build = || {
        Session::builder(db.clone())
            .register(EntityMap::new("User", "users").belongs_to_many("roles", "Role", "role_ids"))
            .register(EntityMap::new("Role", "roles"))
            .build()
    };

    let mut loaded = {
        let session = build()?;
        let mut user = session.make("User")?;
        user.related_mut("roles")?.push(session.make("Role")?);
        session.store(&mut user)?;
        let found = session.mapper("User")?.find(user.id().unwrap())?;
        found
    };

    let roles = loaded.relation_mut("roles").expect("relation is hydrated");
    assert_eq!(roles.len().unwrap_err(), MapperError::SessionClosed);
    Ok(())
}

#[timeout(1000)]
#[test]
fn test_misconfigured_maps_fail_at_build() {
    let db: Arc<dyn DocumentStore> =
        Arc::new(Database::new(StoreConfig::for_database("misconfigured_test")));

    let err = Session::builder(db.clone())
        .strict_mode(true)
        .register(EntityMap::new("User", "users").belongs_to_many("roles", "Role", "role_ids"))
        .build()
        .unwrap_err();
    assert!(matches!(err, MapperError::Misconfigured { .. }));

    let err = Session::builder(db)
        .register(EntityMap::new("User", "users").belongs_to_many("roles", "Role", ""))
        .build()
        .unwrap_err();
    assert!(matches!(err, MapperError::Misconfigured { .. }));
}

#[timeout(1000)]
#[test]
fn test_strict_mode_rejects_unmapped_types() {
    let ctx = TestContext::new();
    assert_eq!(
        ctx.session.mapper("Permission").unwrap_err(),
        MapperError::UnmappedEntity("Permission".to_string())
    );
    assert!(ctx.session.make("Permission").is_err());
}

#[timeout(1000)]
#[test]
fn test_lenient_mode_uses_default_collection() -> anyhow::Result<()> {
    let db = Arc::new(Database::new(StoreConfig::for_database("lenient_test")));
    let session = Session::builder(db.clone()).build()?;

    let mut tag = session.make("Tag")?;
    tag.set("label", "rust");
    session.store(&mut tag)?;

    assert_eq!(db.document_count("tags"), 1);
    Ok(())
}
