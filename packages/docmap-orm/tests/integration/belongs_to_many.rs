//! Belongs-to-many relations stored as foreign-key arrays.

use ntest::timeout;
use serde_json::json;

use docmap_orm::{EntityCollection, RelationField};

use super::helpers::{attributes, TestContext};

#[timeout(1000)]
#[test]
fn test_store_with_no_related_entities() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let mut user = ctx.make("User");
    ctx.session.store(&mut user)?;

    ctx.see_in_database(
        "users",
        json!({"email": user.get("email").unwrap(), "role_ids": []}),
    );
    Ok(())
}

#[timeout(1000)]
#[test]
fn test_store_with_related_entities() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let mut user = ctx.make("User");
    let roles = user.related_mut("roles")?;
    roles.push(ctx.make("Role"));
    roles.push(ctx.make("Role"));
    ctx.session.store(&mut user)?;

    let ids = user.related_mut("roles")?.ids();
    assert_eq!(ids.len(), 2);
    ctx.see_in_database(
        "users",
        json!({
            "email": user.get("email").unwrap(),
            "role_ids": [ids[0].as_str(), ids[1].as_str()],
        }),
    );
    for id in &ids {
        ctx.see_in_database("roles", json!({"_id": id.as_str()}));
    }
    Ok(())
}

#[timeout(1000)]
#[test]
fn test_eager_load_returns_collection() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let mut user = ctx.make("User");
    user.related_mut("roles")?
        .push(ctx.make("Role"));
    user.related_mut("roles")?
        .push(ctx.make("Role"));
    ctx.session.store(&mut user)?;

    let loaded = ctx
        .mapper("User")
        .with("roles")
        .where_("_id", "=", user.id().unwrap())
        .first()?
        .expect("user is stored");

    match loaded.relation("roles") {
        Some(RelationField::Loaded(roles)) => assert_eq!(roles.len(), 2),
        other => panic!("expected a loaded collection, got {:?}", other),
    }
    Ok(())
}

#[timeout(1000)]
#[test]
fn test_lazy_load_returns_proxy() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let mut user = ctx.make("User");
    user.related_mut("roles")?
        .push(ctx.make("Role"));
    user.related_mut("roles")?
        .push(ctx.make("Role"));
    ctx.session.store(&mut user)?;

    let mut loaded = ctx.mapper("User").find(user.id().unwrap())?;
    let roles = loaded.relation_mut("roles").expect("relation is hydrated");
    assert!(roles.is_lazy());
    assert!(!roles.is_resolved());
    assert_eq!(roles.len()?, 2);
    assert!(roles.is_resolved());
    Ok(())
}

#[timeout(1000)]
#[test]
fn test_dirty_related_entity_is_updated() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let mut user = ctx.make("User");
    user.related_mut("roles")?
        .push(ctx.make("Role"));
    ctx.session.store(&mut user)?;

    let mut loaded = ctx.mapper("User").find(user.id().unwrap())?;
    let role = loaded
        .related_mut("roles")?
        .first_mut()
        .expect("one role");
    role.set("name", "New Role");
    let role_id = role.id().cloned().unwrap();
    ctx.session.store(&mut loaded)?;

    ctx.see_in_database("roles", json!({"_id": role_id.as_str(), "name": "New Role"}));
    Ok(())
}

#[timeout(1000)]
#[test]
fn test_null_relation_stores_empty_array() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let mut user = ctx.make("User");
    user.related_mut("roles")?
        .push(ctx.make("Role"));
    ctx.session.store(&mut user)?;

    let mut loaded = ctx.mapper("User").find(user.id().unwrap())?;
    loaded.clear_relation("roles");
    ctx.session.store(&mut loaded)?;

    ctx.see_in_database(
        "users",
        json!({"_id": user.id().unwrap().as_str(), "role_ids": []}),
    );
    Ok(())
}

#[timeout(1000)]
#[test]
fn test_untouched_proxy_keeps_foreign_keys() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let mut user = ctx.make("User");
    user.related_mut("roles")?
        .push(ctx.make("Role"));
    user.related_mut("roles")?
        .push(ctx.make("Role"));
    ctx.session.store(&mut user)?;
    let ids = user.related_mut("roles")?.ids();

    let mut loaded = ctx.mapper("User").find(user.id().unwrap())?;
    loaded.set("email", "changed@example.com");
    ctx.session.store(&mut loaded)?;

    assert!(!loaded.relation("roles").unwrap().is_resolved());
    ctx.see_in_database(
        "users",
        json!({
            "email": "changed@example.com",
            "role_ids": [ids[0].as_str(), ids[1].as_str()],
        }),
    );
    Ok(())
}

#[timeout(1000)]
#[test]
fn test_new_attribute_on_related_entities() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let mut user = ctx.make("User");
    user.related_mut("roles")?
        .push(ctx.make("Role"));
    ctx.session.store(&mut user)?;

    user.related_mut("roles")?
        .map(|role| role.set("some_attribute", 1234));
    ctx.session.store(&mut user)?;

    let role_id = user.related_mut("roles")?.ids()[0].clone();
    ctx.see_in_database(
        "roles",
        json!({"_id": role_id.as_str(), "some_attribute": 1234}),
    );
    assert_eq!(ctx.db.document_count("roles"), 1);
    Ok(())
}

#[timeout(1000)]
#[test]
fn test_existing_attribute_on_related_entities() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let mut user = ctx.make("User");
    let role = ctx
        .factory
        .make("Role", attributes(&[("some_attribute", json!(1234))]))?;
    user.related_mut("roles")?.push(role);
    ctx.session.store(&mut user)?;
    ctx.see_in_database("roles", json!({"some_attribute": 1234}));

    user.related_mut("roles")?
        .map(|role| role.set("some_attribute", 3456));
    ctx.session.store(&mut user)?;

    ctx.see_in_database("roles", json!({"some_attribute": 3456}));
    ctx.dont_see_in_database("roles", json!({"some_attribute": 1234}));
    Ok(())
}

#[timeout(1000)]
#[test]
fn test_related_entity_references_owner_identity() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let mut user = ctx.make("User");
    user.related_mut("roles")?
        .push(ctx.make("Role"));
    user.related_mut("roles")?
        .push(ctx.make("Role"));
    ctx.session.store(&mut user)?;

    let user_id = user.id().cloned().unwrap();
    user.related_mut("roles")?
        .map(|role| role.set("creator_id", user_id.as_str()));
    ctx.session.store(&mut user)?;

    for role_id in user.related_mut("roles")?.ids() {
        ctx.see_in_database(
            "roles",
            json!({"_id": role_id.as_str(), "creator_id": user_id.as_str()}),
        );
    }
    assert_eq!(ctx.db.document_count("roles"), 2);
    Ok(())
}

#[timeout(1000)]
#[test]
fn test_assigning_a_new_collection_replaces_members() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let mut user = ctx.make("User");
    user.related_mut("roles")?
        .push(ctx.make("Role"));
    ctx.session.store(&mut user)?;

    let mut loaded = ctx.mapper("User").find(user.id().unwrap())?;
    let replacement: EntityCollection = vec![ctx.make("Role"), ctx.make("Role")].into();
    loaded.set_related("roles", replacement);
    ctx.session.store(&mut loaded)?;

    let ids = loaded.related_mut("roles")?.ids();
    ctx.see_in_database(
        "users",
        json!({"role_ids": [ids[0].as_str(), ids[1].as_str()]}),
    );
    assert_eq!(ctx.db.document_count("roles"), 3);
    Ok(())
}
