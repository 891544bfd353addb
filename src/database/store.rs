use async_trait::async_trait;

use super::{
    error::Error,
    schema::{
        CartLine, Id, Ingredient, NewIngredient, NewRecipe, NewTag, NewUser, Recipe,
        RecipeChanges, RecipeFilter, RecipeIngredient, Relation, Tag, User,
    },
};

/// Persistence seam for every operation of the service.
///
/// Implementations own the consistency rules of the schema: pair and
/// (name, author) uniqueness, cascades on delete, and atomic recipe writes.
#[async_trait]
pub trait Store: Send + Sync {
    // Accounts

    /// Fails with `Error::Conflict` when the email or username is taken.
    async fn create_user(&self, user: NewUser) -> Result<User, Error>;
    async fn get_user(&self, id: Id) -> Result<Option<User>, Error>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, Error>;
    async fn list_users(&self, offset: i64, limit: i64) -> Result<(Vec<User>, i64), Error>;
    async fn set_password(&self, id: Id, password: &str) -> Result<(), Error>;
    /// Removes the user together with their recipes, memberships and
    /// subscriptions in both directions.
    async fn delete_user(&self, id: Id) -> Result<bool, Error>;

    // Catalog

    async fn create_tag(&self, tag: NewTag) -> Result<Tag, Error>;
    async fn list_tags(&self) -> Result<Vec<Tag>, Error>;
    async fn get_tag(&self, id: Id) -> Result<Option<Tag>, Error>;
    /// Returns the ids from `ids` that have no tag row.
    async fn missing_tags(&self, ids: &[Id]) -> Result<Vec<Id>, Error>;

    async fn insert_ingredients(&self, ingredients: Vec<NewIngredient>) -> Result<u64, Error>;
    /// Case-insensitive name prefix search, ordered by id.
    async fn list_ingredients(&self, name: Option<&str>) -> Result<Vec<Ingredient>, Error>;
    async fn get_ingredient(&self, id: Id) -> Result<Option<Ingredient>, Error>;
    /// Returns the ids from `ids` that have no ingredient row.
    async fn missing_ingredients(&self, ids: &[Id]) -> Result<Vec<Id>, Error>;

    // Recipes

    /// Inserts the recipe, its tag set and its ingredient lines atomically.
    async fn insert_recipe(&self, recipe: NewRecipe) -> Result<Id, Error>;
    /// Applies `changes` atomically; supplied tags and lines replace the
    /// stored sets wholesale.
    async fn update_recipe(&self, id: Id, changes: RecipeChanges) -> Result<(), Error>;
    async fn delete_recipe(&self, id: Id) -> Result<bool, Error>;
    async fn get_recipe(&self, id: Id) -> Result<Option<Recipe>, Error>;
    async fn recipe_tags(&self, id: Id) -> Result<Vec<Tag>, Error>;
    async fn recipe_ingredients(&self, id: Id) -> Result<Vec<RecipeIngredient>, Error>;
    /// Most recent first, together with the unpaged total.
    async fn fetch_recipes(
        &self,
        filter: &RecipeFilter,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Recipe>, i64), Error>;
    /// Most recent first, at most `limit` rows when given.
    async fn author_recipes(&self, author_id: Id, limit: Option<i64>)
        -> Result<Vec<Recipe>, Error>;
    async fn count_author_recipes(&self, author_id: Id) -> Result<i64, Error>;

    // Memberships

    /// Returns false when the pair already exists.
    async fn insert_pair(&self, relation: Relation, owner: Id, target: Id) -> Result<bool, Error>;
    /// Returns false when there was no such pair.
    async fn delete_pair(&self, relation: Relation, owner: Id, target: Id) -> Result<bool, Error>;
    async fn has_pair(&self, relation: Relation, owner: Id, target: Id) -> Result<bool, Error>;
    /// Targets of `owner` in insertion order, together with the unpaged total.
    async fn pair_targets(
        &self,
        relation: Relation,
        owner: Id,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Id>, i64), Error>;
    /// Every ingredient line of every recipe in the user's shopping cart.
    async fn cart_lines(&self, user_id: Id) -> Result<Vec<CartLine>, Error>;
}
