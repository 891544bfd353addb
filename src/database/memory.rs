use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{
    error::Error,
    schema::{
        CartLine, Id, Ingredient, IngredientLine, NewIngredient, NewRecipe, NewTag, NewUser,
        Recipe, RecipeChanges, RecipeFilter, RecipeIngredient, Relation, Tag, User,
    },
    store::Store,
};

#[derive(Debug, Clone)]
struct LineRow {
    id: Id,
    recipe_id: Id,
    ingredient_id: Id,
    amount: i32,
}

#[derive(Debug, Clone)]
struct PairRow {
    id: Id,
    owner: Id,
    target: Id,
}

#[derive(Default)]
struct Tables {
    sequence: Id,
    users: BTreeMap<Id, User>,
    tags: BTreeMap<Id, Tag>,
    ingredients: BTreeMap<Id, Ingredient>,
    recipes: BTreeMap<Id, Recipe>,
    recipe_tags: BTreeSet<(Id, Id)>,
    recipe_ingredients: Vec<LineRow>,
    pairs: HashMap<Relation, Vec<PairRow>>,
}

impl Tables {
    fn next_id(&mut self) -> Id {
        self.sequence += 1;
        self.sequence
    }

    fn pairs(&self, relation: Relation) -> &[PairRow] {
        self.pairs.get(&relation).map(Vec::as_slice).unwrap_or(&[])
    }

    fn name_taken(&self, author_id: Id, name: &str, except: Option<Id>) -> bool {
        self.recipes
            .values()
            .any(|r| r.author_id == author_id && r.name == name && Some(r.id) != except)
    }

    fn insert_lines(&mut self, recipe_id: Id, lines: &[IngredientLine]) -> Result<(), Error> {
        for line in lines {
            if !self.ingredients.contains_key(&line.id) {
                return Err(Error::not_found("Referenced entity does not exist"));
            }
            if line.amount < 1 {
                return Err(Error::validation("amount", "Constraint violated (amount)"));
            }
        }
        let mut seen = BTreeSet::new();
        if !lines.iter().all(|line| seen.insert(line.id)) {
            return Err(Error::conflict(
                "Duplicate entry (unique_recipe_ingredient)",
            ));
        }

        for line in lines {
            let id = self.next_id();
            self.recipe_ingredients.push(LineRow {
                id,
                recipe_id,
                ingredient_id: line.id,
                amount: line.amount,
            });
        }
        Ok(())
    }

    fn insert_tags(&mut self, recipe_id: Id, tags: &[Id]) -> Result<(), Error> {
        if tags.iter().any(|id| !self.tags.contains_key(id)) {
            return Err(Error::not_found("Referenced entity does not exist"));
        }
        for tag_id in tags {
            self.recipe_tags.insert((recipe_id, *tag_id));
        }
        Ok(())
    }

    fn remove_recipe(&mut self, id: Id) -> bool {
        if self.recipes.remove(&id).is_none() {
            return false;
        }
        self.recipe_tags.retain(|(recipe_id, _)| *recipe_id != id);
        self.recipe_ingredients.retain(|line| line.recipe_id != id);
        for relation in [Relation::Favorite, Relation::ShoppingCart] {
            if let Some(rows) = self.pairs.get_mut(&relation) {
                rows.retain(|row| row.target != id);
            }
        }
        true
    }
}

/// Store kept entirely in process memory.
///
/// Mirrors the constraints of the SQL schema so the business layer behaves
/// identically on top of it.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn page<T: Clone>(rows: &[T], offset: i64, limit: i64) -> Vec<T> {
    rows.iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .cloned()
        .collect()
}

fn most_recent_first(mut recipes: Vec<Recipe>) -> Vec<Recipe> {
    recipes.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
    recipes
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User, Error> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(Error::conflict("Duplicate entry (users_email_key)"));
        }
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(Error::conflict("Duplicate entry (users_username_key)"));
        }

        let id = tables.next_id();
        let row = User {
            id,
            email: user.email,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            password: user.password,
        };
        tables.users.insert(id, row.clone());
        Ok(row)
    }

    async fn get_user(&self, id: Id) -> Result<Option<User>, Error> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self, offset: i64, limit: i64) -> Result<(Vec<User>, i64), Error> {
        let tables = self.tables.read().await;
        let users: Vec<User> = tables.users.values().cloned().collect();
        Ok((page(&users, offset, limit), users.len() as i64))
    }

    async fn set_password(&self, id: Id, password: &str) -> Result<(), Error> {
        let mut tables = self.tables.write().await;
        if let Some(user) = tables.users.get_mut(&id) {
            user.password = password.to_string();
        }
        Ok(())
    }

    async fn delete_user(&self, id: Id) -> Result<bool, Error> {
        let mut tables = self.tables.write().await;
        if tables.users.remove(&id).is_none() {
            return Ok(false);
        }

        let authored: Vec<Id> = tables
            .recipes
            .values()
            .filter(|r| r.author_id == id)
            .map(|r| r.id)
            .collect();
        for recipe_id in authored {
            tables.remove_recipe(recipe_id);
        }

        for (relation, rows) in tables.pairs.iter_mut() {
            rows.retain(|row| row.owner != id && !(relation.targets_user() && row.target == id));
        }
        Ok(true)
    }

    async fn create_tag(&self, tag: NewTag) -> Result<Tag, Error> {
        let mut tables = self.tables.write().await;
        if tables
            .tags
            .values()
            .any(|t| t.name == tag.name || t.color == tag.color || t.slug == tag.slug)
        {
            return Err(Error::conflict("Duplicate entry (tags)"));
        }

        let id = tables.next_id();
        let row = Tag {
            id,
            name: tag.name,
            color: tag.color,
            slug: tag.slug,
        };
        tables.tags.insert(id, row.clone());
        Ok(row)
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, Error> {
        Ok(self.tables.read().await.tags.values().cloned().collect())
    }

    async fn get_tag(&self, id: Id) -> Result<Option<Tag>, Error> {
        Ok(self.tables.read().await.tags.get(&id).cloned())
    }

    async fn missing_tags(&self, ids: &[Id]) -> Result<Vec<Id>, Error> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter(|id| !tables.tags.contains_key(id))
            .copied()
            .collect())
    }

    async fn insert_ingredients(&self, ingredients: Vec<NewIngredient>) -> Result<u64, Error> {
        let mut tables = self.tables.write().await;
        let count = ingredients.len() as u64;
        for ingredient in ingredients {
            let id = tables.next_id();
            tables.ingredients.insert(
                id,
                Ingredient {
                    id,
                    name: ingredient.name,
                    measurement_unit: ingredient.measurement_unit,
                },
            );
        }
        Ok(count)
    }

    async fn list_ingredients(&self, name: Option<&str>) -> Result<Vec<Ingredient>, Error> {
        let tables = self.tables.read().await;
        let prefix = name.map(str::to_lowercase);
        Ok(tables
            .ingredients
            .values()
            .filter(|i| match &prefix {
                Some(prefix) => i.name.to_lowercase().starts_with(prefix.as_str()),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn get_ingredient(&self, id: Id) -> Result<Option<Ingredient>, Error> {
        Ok(self.tables.read().await.ingredients.get(&id).cloned())
    }

    async fn missing_ingredients(&self, ids: &[Id]) -> Result<Vec<Id>, Error> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter(|id| !tables.ingredients.contains_key(id))
            .copied()
            .collect())
    }

    async fn insert_recipe(&self, recipe: NewRecipe) -> Result<Id, Error> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&recipe.author_id) {
            return Err(Error::not_found("Referenced entity does not exist"));
        }
        if recipe.cooking_time < 1 {
            return Err(Error::validation(
                "cooking_time",
                "Constraint violated (cooking_time)",
            ));
        }
        if tables.name_taken(recipe.author_id, &recipe.name, None) {
            return Err(Error::conflict("Duplicate entry (unique_recipes)"));
        }

        // All checks run against a scratch copy so a failure leaves nothing behind.
        let mut scratch = Tables {
            sequence: tables.sequence,
            ingredients: tables.ingredients.clone(),
            tags: tables.tags.clone(),
            ..Default::default()
        };
        let id = scratch.next_id();
        scratch.insert_tags(id, &recipe.tags)?;
        scratch.insert_lines(id, &recipe.ingredients)?;

        tables.sequence = scratch.sequence;
        tables.recipes.insert(
            id,
            Recipe {
                id,
                author_id: recipe.author_id,
                name: recipe.name,
                text: recipe.text,
                cooking_time: recipe.cooking_time,
                image: recipe.image,
                pub_date: Utc::now(),
            },
        );
        tables.recipe_tags.extend(scratch.recipe_tags);
        tables.recipe_ingredients.extend(scratch.recipe_ingredients);
        Ok(id)
    }

    async fn update_recipe(&self, id: Id, changes: RecipeChanges) -> Result<(), Error> {
        let mut tables = self.tables.write().await;
        let Some(current) = tables.recipes.get(&id).cloned() else {
            return Err(Error::not_found("Recipe does not exist"));
        };
        if let Some(cooking_time) = changes.cooking_time {
            if cooking_time < 1 {
                return Err(Error::validation(
                    "cooking_time",
                    "Constraint violated (cooking_time)",
                ));
            }
        }
        if let Some(name) = &changes.name {
            if tables.name_taken(current.author_id, name, Some(id)) {
                return Err(Error::conflict("Duplicate entry (unique_recipes)"));
            }
        }

        let mut scratch = Tables {
            sequence: tables.sequence,
            ingredients: tables.ingredients.clone(),
            tags: tables.tags.clone(),
            ..Default::default()
        };
        if let Some(tags) = &changes.tags {
            scratch.insert_tags(id, tags)?;
        }
        if let Some(lines) = &changes.ingredients {
            scratch.insert_lines(id, lines)?;
        }

        tables.sequence = scratch.sequence;
        if changes.tags.is_some() {
            tables.recipe_tags.retain(|(recipe_id, _)| *recipe_id != id);
            tables.recipe_tags.extend(scratch.recipe_tags);
        }
        if changes.ingredients.is_some() {
            tables.recipe_ingredients.retain(|line| line.recipe_id != id);
            tables.recipe_ingredients.extend(scratch.recipe_ingredients);
        }

        let mut updated = current;
        if let Some(name) = changes.name {
            updated.name = name;
        }
        if let Some(text) = changes.text {
            updated.text = text;
        }
        if let Some(cooking_time) = changes.cooking_time {
            updated.cooking_time = cooking_time;
        }
        if let Some(image) = changes.image {
            updated.image = image;
        }
        tables.recipes.insert(id, updated);
        Ok(())
    }

    async fn delete_recipe(&self, id: Id) -> Result<bool, Error> {
        Ok(self.tables.write().await.remove_recipe(id))
    }

    async fn get_recipe(&self, id: Id) -> Result<Option<Recipe>, Error> {
        Ok(self.tables.read().await.recipes.get(&id).cloned())
    }

    async fn recipe_tags(&self, id: Id) -> Result<Vec<Tag>, Error> {
        let tables = self.tables.read().await;
        Ok(tables
            .recipe_tags
            .iter()
            .filter(|(recipe_id, _)| *recipe_id == id)
            .filter_map(|(_, tag_id)| tables.tags.get(tag_id).cloned())
            .collect())
    }

    async fn recipe_ingredients(&self, id: Id) -> Result<Vec<RecipeIngredient>, Error> {
        let tables = self.tables.read().await;
        Ok(tables
            .recipe_ingredients
            .iter()
            .filter(|line| line.recipe_id == id)
            .filter_map(|line| {
                tables
                    .ingredients
                    .get(&line.ingredient_id)
                    .map(|ingredient| RecipeIngredient {
                        id: ingredient.id,
                        name: ingredient.name.to_owned(),
                        measurement_unit: ingredient.measurement_unit.to_owned(),
                        amount: line.amount,
                    })
            })
            .collect())
    }

    async fn fetch_recipes(
        &self,
        filter: &RecipeFilter,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Recipe>, i64), Error> {
        let tables = self.tables.read().await;
        let has_pair = |relation: Relation, owner: Id, recipe_id: Id| {
            tables
                .pairs(relation)
                .iter()
                .any(|row| row.owner == owner && row.target == recipe_id)
        };

        let matching: Vec<Recipe> = tables
            .recipes
            .values()
            .filter(|r| {
                filter.tags.is_empty()
                    || tables
                        .recipe_tags
                        .iter()
                        .filter(|(recipe_id, _)| *recipe_id == r.id)
                        .filter_map(|(_, tag_id)| tables.tags.get(tag_id))
                        .any(|tag| filter.tags.contains(&tag.slug))
            })
            .filter(|r| filter.author.map_or(true, |author| r.author_id == author))
            .filter(|r| {
                filter
                    .favorited_by
                    .map_or(true, |user| has_pair(Relation::Favorite, user, r.id))
            })
            .filter(|r| {
                filter
                    .in_cart_of
                    .map_or(true, |user| has_pair(Relation::ShoppingCart, user, r.id))
            })
            .cloned()
            .collect();

        let matching = most_recent_first(matching);
        Ok((page(&matching, offset, limit), matching.len() as i64))
    }

    async fn author_recipes(
        &self,
        author_id: Id,
        limit: Option<i64>,
    ) -> Result<Vec<Recipe>, Error> {
        let tables = self.tables.read().await;
        let recipes = most_recent_first(
            tables
                .recipes
                .values()
                .filter(|r| r.author_id == author_id)
                .cloned()
                .collect(),
        );
        Ok(match limit {
            Some(limit) => page(&recipes, 0, limit),
            None => recipes,
        })
    }

    async fn count_author_recipes(&self, author_id: Id) -> Result<i64, Error> {
        let tables = self.tables.read().await;
        Ok(tables
            .recipes
            .values()
            .filter(|r| r.author_id == author_id)
            .count() as i64)
    }

    async fn insert_pair(&self, relation: Relation, owner: Id, target: Id) -> Result<bool, Error> {
        let mut tables = self.tables.write().await;
        let target_exists = match relation.targets_user() {
            true => tables.users.contains_key(&target),
            false => tables.recipes.contains_key(&target),
        };
        if !tables.users.contains_key(&owner) || !target_exists {
            return Err(Error::not_found("Referenced entity does not exist"));
        }
        if relation.targets_user() && owner == target {
            return Err(Error::validation(
                "non_field_errors",
                "Constraint violated (no_self_subscription)",
            ));
        }
        if tables
            .pairs(relation)
            .iter()
            .any(|row| row.owner == owner && row.target == target)
        {
            return Ok(false);
        }

        let id = tables.next_id();
        tables
            .pairs
            .entry(relation)
            .or_default()
            .push(PairRow { id, owner, target });
        Ok(true)
    }

    async fn delete_pair(&self, relation: Relation, owner: Id, target: Id) -> Result<bool, Error> {
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.pairs.get_mut(&relation) else {
            return Ok(false);
        };
        let before = rows.len();
        rows.retain(|row| !(row.owner == owner && row.target == target));
        Ok(rows.len() < before)
    }

    async fn has_pair(&self, relation: Relation, owner: Id, target: Id) -> Result<bool, Error> {
        let tables = self.tables.read().await;
        Ok(tables
            .pairs(relation)
            .iter()
            .any(|row| row.owner == owner && row.target == target))
    }

    async fn pair_targets(
        &self,
        relation: Relation,
        owner: Id,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Id>, i64), Error> {
        let tables = self.tables.read().await;
        let mut rows: Vec<&PairRow> = tables
            .pairs(relation)
            .iter()
            .filter(|row| row.owner == owner)
            .collect();
        rows.sort_by_key(|row| row.id);
        let targets: Vec<Id> = rows.into_iter().map(|row| row.target).collect();
        Ok((page(&targets, offset, limit), targets.len() as i64))
    }

    async fn cart_lines(&self, user_id: Id) -> Result<Vec<CartLine>, Error> {
        let tables = self.tables.read().await;
        let mut lines = vec![];
        for pair in tables
            .pairs(Relation::ShoppingCart)
            .iter()
            .filter(|row| row.owner == user_id)
        {
            for line in tables
                .recipe_ingredients
                .iter()
                .filter(|line| line.recipe_id == pair.target)
            {
                if let Some(ingredient) = tables.ingredients.get(&line.ingredient_id) {
                    lines.push(CartLine {
                        name: ingredient.name.to_owned(),
                        measurement_unit: ingredient.measurement_unit.to_owned(),
                        amount: line.amount,
                    });
                }
            }
        }
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> (MemoryStore, User, Tag, Vec<Id>) {
        let store = MemoryStore::new();
        let user = store
            .create_user(NewUser {
                email: "cook@example.com".to_string(),
                username: "cook".to_string(),
                first_name: "Ada".to_string(),
                last_name: "Cook".to_string(),
                password: "hash".to_string(),
            })
            .await
            .unwrap();
        let tag = store
            .create_tag(NewTag {
                name: "Lunch".to_string(),
                color: "#00ff00".to_string(),
                slug: "lunch".to_string(),
            })
            .await
            .unwrap();
        store
            .insert_ingredients(vec![
                NewIngredient {
                    name: "salt".to_string(),
                    measurement_unit: "g".to_string(),
                },
                NewIngredient {
                    name: "water".to_string(),
                    measurement_unit: "ml".to_string(),
                },
            ])
            .await
            .unwrap();
        let ingredients = store
            .list_ingredients(None)
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        (store, user, tag, ingredients)
    }

    fn soup(author_id: Id, tag: Id, ingredients: &[Id]) -> NewRecipe {
        NewRecipe {
            author_id,
            name: "Soup".to_string(),
            text: "Boil".to_string(),
            cooking_time: 10,
            image: "recipes/soup.png".to_string(),
            tags: vec![tag],
            ingredients: ingredients
                .iter()
                .map(|id| IngredientLine { id: *id, amount: 1 })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_failed_insert_leaves_no_rows() {
        let (store, user, tag, ingredients) = seeded().await;
        let mut recipe = soup(user.id, tag.id, &ingredients);
        recipe.ingredients.push(IngredientLine { id: 999, amount: 1 });

        assert!(store.insert_recipe(recipe).await.is_err());
        let (recipes, total) = store
            .fetch_recipes(&RecipeFilter::default(), 0, 10)
            .await
            .unwrap();
        assert!(recipes.is_empty());
        assert_eq!(total, 0);
        assert!(store.tables.read().await.recipe_ingredients.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_name_per_author_conflicts() {
        let (store, user, tag, ingredients) = seeded().await;
        store
            .insert_recipe(soup(user.id, tag.id, &ingredients))
            .await
            .unwrap();

        let result = store.insert_recipe(soup(user.id, tag.id, &ingredients)).await;
        assert!(matches!(result, Err(Error::Conflict(_))));
    }

    #[tokio::test]
    async fn test_delete_user_cascades() {
        let (store, user, tag, ingredients) = seeded().await;
        let id = store
            .insert_recipe(soup(user.id, tag.id, &ingredients))
            .await
            .unwrap();
        assert!(store
            .insert_pair(Relation::ShoppingCart, user.id, id)
            .await
            .unwrap());

        assert!(store.delete_user(user.id).await.unwrap());
        assert!(store.get_recipe(id).await.unwrap().is_none());
        assert!(store.cart_lines(user.id).await.unwrap().is_empty());
        assert!(store.tables.read().await.recipe_ingredients.is_empty());
    }

    #[tokio::test]
    async fn test_tag_filter_matches_any_slug() {
        let (store, user, tag, ingredients) = seeded().await;
        let other = store
            .create_tag(NewTag {
                name: "Dinner".to_string(),
                color: "#0000ff".to_string(),
                slug: "dinner".to_string(),
            })
            .await
            .unwrap();
        store
            .insert_recipe(soup(user.id, tag.id, &ingredients))
            .await
            .unwrap();
        let mut stew = soup(user.id, other.id, &ingredients);
        stew.name = "Stew".to_string();
        store.insert_recipe(stew).await.unwrap();

        let filter = RecipeFilter {
            tags: vec!["lunch".to_string(), "dinner".to_string()],
            ..Default::default()
        };
        let (recipes, total) = store.fetch_recipes(&filter, 0, 10).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(recipes[0].name, "Stew");

        let filter = RecipeFilter {
            tags: vec!["dinner".to_string()],
            ..Default::default()
        };
        let (recipes, _) = store.fetch_recipes(&filter, 0, 10).await.unwrap();
        assert_eq!(recipes.len(), 1);
        assert_eq!(recipes[0].name, "Stew");
    }
}
