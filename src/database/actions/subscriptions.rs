use serde::Serialize;

use crate::{
    actions::{
        memberships::{add_pair, remove_pair},
        recipes::RecipeSummary,
        users::{get_user_by_id, user_profile, UserProfile},
    },
    error::Error,
    images::ImageStore,
    jwt::SessionData,
    pagination::{PageContext, PageRequest},
    schema::{Id, Relation, User},
    store::Store,
};

/// A followed author with a preview of their recipes.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionView {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub recipes: Vec<RecipeSummary>,
    pub recipes_count: i64,
}

/// `recipes_limit` must not be negative; absent means every recipe.
pub fn parse_recipes_limit(value: Option<i64>) -> Result<Option<i64>, Error> {
    match value {
        Some(limit) if limit < 0 => Err(Error::validation(
            "recipes_limit",
            "Ensure this value is greater than or equal to 0",
        )),
        limit => Ok(limit),
    }
}

async fn subscription_view(
    author: User,
    viewer: &SessionData,
    recipes_limit: Option<i64>,
    images: &ImageStore,
    store: &dyn Store,
) -> Result<SubscriptionView, Error> {
    let recipes = store
        .author_recipes(author.id, recipes_limit)
        .await?
        .iter()
        .map(|recipe| RecipeSummary::new(recipe, images))
        .collect();
    let recipes_count = store.count_author_recipes(author.id).await?;

    Ok(SubscriptionView {
        profile: user_profile(author, Some(viewer), store).await?,
        recipes,
        recipes_count,
    })
}

pub async fn subscribe(
    session: &SessionData,
    author_id: Id,
    recipes_limit: Option<i64>,
    images: &ImageStore,
    store: &dyn Store,
) -> Result<SubscriptionView, Error> {
    add_pair(Relation::Subscription, session, author_id, store).await?;
    let author = get_user_by_id(author_id, store).await?;

    subscription_view(author, session, recipes_limit, images, store).await
}

pub async fn unsubscribe(session: &SessionData, author_id: Id, store: &dyn Store) -> Result<(), Error> {
    remove_pair(Relation::Subscription, session, author_id, store).await
}

/// Followed authors in the order they were followed.
pub async fn list_subscriptions(
    session: &SessionData,
    recipes_limit: Option<i64>,
    request: PageRequest,
    path: &str,
    images: &ImageStore,
    store: &dyn Store,
) -> Result<PageContext<SubscriptionView>, Error> {
    let (author_ids, count) = store
        .pair_targets(
            Relation::Subscription,
            session.user_id,
            request.offset(),
            request.limit,
        )
        .await?;

    let mut views = Vec::with_capacity(author_ids.len());
    for author_id in author_ids {
        let Some(author) = store.get_user(author_id).await? else {
            continue;
        };
        views.push(subscription_view(author, session, recipes_limit, images, store).await?);
    }

    PageContext::from_rows(views, count, request, path)
}
