//! Property tests for foreign-key arrays across store and reload.

use proptest::prelude::*;

use docmap_orm::{Attributes, Entity, EntityCollection};
use docmap_store::{DocumentId, DocumentStore};

use super::helpers::TestContext;

/// Roles stored up front; a pick equal to this builds a new role instead.
const ROLE_POOL: usize = 3;

/// An attribute edit on a user: set to a number, or remove when `None`.
fn edit_strategy() -> impl Strategy<Value = (&'static str, Option<i64>)> {
    (
        prop::sample::select(vec!["email", "name", "nickname", "level"]),
        prop::option::of(any::<i64>()),
    )
}

/// Property: the stored key array lists member identities in collection
/// order, duplicates included, and a reload yields the same identities.
#[test]
fn prop_stored_keys_follow_collection_order() {
    proptest!(ProptestConfig::with_cases(64), |(
        picks in prop::collection::vec(0..=ROLE_POOL, 0..8)
    )| {
        let ctx = TestContext::new();
        let pool: Vec<Entity> = (0..ROLE_POOL)
            .map(|_| ctx.factory.create("Role", Attributes::new()).unwrap())
            .collect();
        let members: Vec<Entity> = picks
            .iter()
            .map(|&pick| pool.get(pick).cloned().unwrap_or_else(|| ctx.make("Role")))
            .collect();

        let mut user = ctx.make("User");
        user.set_related("roles", EntityCollection::from(members));
        ctx.session.store(&mut user).unwrap();

        let ids = user.related_mut("roles").unwrap().ids();
        prop_assert_eq!(ids.len(), picks.len());
        for (id, &pick) in ids.iter().zip(&picks) {
            if let Some(role) = pool.get(pick) {
                prop_assert_eq!(Some(id), role.id());
            }
        }
        let created = picks.iter().filter(|&&pick| pick == ROLE_POOL).count();
        prop_assert_eq!(ctx.db.document_count("roles"), ROLE_POOL + created);

        let stored = ctx
            .db
            .find_by_id("users", user.id().unwrap())
            .unwrap()
            .unwrap();
        prop_assert_eq!(stored.get("role_ids"), Some(&DocumentId::list_to_value(&ids)));

        ctx.session.clear_cache();
        let mut loaded = ctx.mapper("User").find(user.id().unwrap()).unwrap();
        prop_assert_eq!(loaded.related_mut("roles").unwrap().ids(), ids);
    });
}

/// Property: editing attributes of a reloaded owner leaves an untouched
/// proxy's stored keys as they were, and storing again writes nothing.
#[test]
fn prop_untouched_proxy_keeps_stored_keys() {
    proptest!(ProptestConfig::with_cases(64), |(
        count in 0..5usize,
        edits in prop::collection::vec(edit_strategy(), 0..6)
    )| {
        let ctx = TestContext::new();
        let mut user = ctx.make("User");
        for _ in 0..count {
            user.related_mut("roles").unwrap().push(ctx.make("Role"));
        }
        ctx.session.store(&mut user).unwrap();
        let user_id = user.id().cloned().unwrap();
        let before = ctx.db.find_by_id("users", &user_id).unwrap().unwrap();

        let mut loaded = ctx.mapper("User").find(&user_id).unwrap();
        for (key, value) in &edits {
            match value {
                Some(number) => loaded.set(*key, *number),
                None => {
                    loaded.remove(key);
                }
            }
        }
        ctx.session.store(&mut loaded).unwrap();

        prop_assert!(!loaded.relation("roles").unwrap().is_resolved());
        let after = ctx.db.find_by_id("users", &user_id).unwrap().unwrap();
        prop_assert_eq!(after.get("role_ids"), before.get("role_ids"));
        for (key, value) in loaded.attributes() {
            prop_assert_eq!(after.get(key), Some(value));
        }
        for (key, _) in &edits {
            if loaded.get(key).is_none() {
                prop_assert!(after.get(*key).is_none());
            }
        }

        ctx.db.reset_stats();
        ctx.session.store(&mut loaded).unwrap();
        prop_assert_eq!(ctx.writes(), 0);
    });
}
