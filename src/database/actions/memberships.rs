use crate::{
    error::Error,
    jwt::SessionData,
    schema::{Id, Relation},
    store::Store,
};

fn missing_target(relation: Relation) -> Error {
    match relation.targets_user() {
        true => Error::not_found("User does not exist"),
        false => Error::not_found("Recipe does not exist"),
    }
}

fn already_present(relation: Relation) -> Error {
    Error::conflict(match relation {
        Relation::Favorite => "Recipe is already in favorites",
        Relation::ShoppingCart => "Recipe is already in the shopping cart",
        Relation::Subscription => "Already subscribed to this author",
    })
}

fn not_present(relation: Relation) -> Error {
    Error::conflict(match relation {
        Relation::Favorite => "Recipe is not in favorites",
        Relation::ShoppingCart => "Recipe is not in the shopping cart",
        Relation::Subscription => "Not subscribed to this author",
    })
}

async fn ensure_target(relation: Relation, target: Id, store: &dyn Store) -> Result<(), Error> {
    let exists = match relation.targets_user() {
        true => store.get_user(target).await?.is_some(),
        false => store.get_recipe(target).await?.is_some(),
    };
    match exists {
        true => Ok(()),
        false => Err(missing_target(relation)),
    }
}

/// Adds the (caller, target) pair.
///
/// Checked in order: the target exists, a user does not subscribe to
/// themselves, the pair is not present yet.
pub async fn add_pair(
    relation: Relation,
    session: &SessionData,
    target: Id,
    store: &dyn Store,
) -> Result<(), Error> {
    ensure_target(relation, target, store).await?;
    if relation.targets_user() && session.user_id == target {
        return Err(Error::validation(
            "non_field_errors",
            "You cannot subscribe to yourself",
        ));
    }

    if !store.insert_pair(relation, session.user_id, target).await? {
        return Err(already_present(relation));
    }
    log::debug!(
        "> Added {relation:?} pair ({}, {target})",
        session.user_id
    );

    Ok(())
}

/// Removes the (caller, target) pair; a missing pair is a conflict.
pub async fn remove_pair(
    relation: Relation,
    session: &SessionData,
    target: Id,
    store: &dyn Store,
) -> Result<(), Error> {
    ensure_target(relation, target, store).await?;

    if !store.delete_pair(relation, session.user_id, target).await? {
        return Err(not_present(relation));
    }
    log::debug!(
        "> Removed {relation:?} pair ({}, {target})",
        session.user_id
    );

    Ok(())
}

/// False for anonymous viewers.
pub async fn has_membership(
    relation: Relation,
    viewer: Option<&SessionData>,
    target: Id,
    store: &dyn Store,
) -> Result<bool, Error> {
    match viewer {
        Some(session) => store.has_pair(relation, session.user_id, target).await,
        None => Ok(false),
    }
}

pub async fn is_favorited(
    viewer: Option<&SessionData>,
    recipe_id: Id,
    store: &dyn Store,
) -> Result<bool, Error> {
    has_membership(Relation::Favorite, viewer, recipe_id, store).await
}

pub async fn is_in_shopping_cart(
    viewer: Option<&SessionData>,
    recipe_id: Id,
    store: &dyn Store,
) -> Result<bool, Error> {
    has_membership(Relation::ShoppingCart, viewer, recipe_id, store).await
}

pub async fn is_subscribed(
    viewer: Option<&SessionData>,
    author_id: Id,
    store: &dyn Store,
) -> Result<bool, Error> {
    has_membership(Relation::Subscription, viewer, author_id, store).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        actions::{recipes::tests::seed_recipe, users::tests::register},
        memory::MemoryStore,
    };

    #[tokio::test]
    async fn test_toggle_protocol() {
        let store = MemoryStore::new();
        let alice = register("alice", &store).await;
        let recipe_id = seed_recipe(&alice, "Soup", &store).await;

        for relation in [Relation::Favorite, Relation::ShoppingCart] {
            add_pair(relation, &alice, recipe_id, &store).await.unwrap();
            assert!(has_membership(relation, Some(&alice), recipe_id, &store)
                .await
                .unwrap());
            assert!(matches!(
                add_pair(relation, &alice, recipe_id, &store).await,
                Err(Error::Conflict(_))
            ));

            remove_pair(relation, &alice, recipe_id, &store)
                .await
                .unwrap();
            assert!(matches!(
                remove_pair(relation, &alice, recipe_id, &store).await,
                Err(Error::Conflict(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_missing_target_is_checked_first() {
        let store = MemoryStore::new();
        let alice = register("alice", &store).await;

        assert!(matches!(
            add_pair(Relation::Favorite, &alice, 999, &store).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            remove_pair(Relation::Subscription, &alice, 999, &store).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_self_subscription_is_invalid() {
        let store = MemoryStore::new();
        let alice = register("alice", &store).await;

        assert!(matches!(
            add_pair(Relation::Subscription, &alice, alice.user_id, &store).await,
            Err(Error::Validation { .. })
        ));
        assert!(!is_subscribed(Some(&alice), alice.user_id, &store)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_anonymous_flags_are_false() {
        let store = MemoryStore::new();
        let alice = register("alice", &store).await;
        let recipe_id = seed_recipe(&alice, "Soup", &store).await;
        add_pair(Relation::Favorite, &alice, recipe_id, &store)
            .await
            .unwrap();

        assert!(is_favorited(Some(&alice), recipe_id, &store).await.unwrap());
        assert!(!is_favorited(None, recipe_id, &store).await.unwrap());
        assert!(!is_in_shopping_cart(Some(&alice), recipe_id, &store)
            .await
            .unwrap());
    }
}
