use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{
    actions::{
        memberships::{add_pair, is_favorited, is_in_shopping_cart},
        users::{user_profile, UserProfile},
    },
    constants::RECIPE_NAME_MAX_LENGTH,
    error::Error,
    form::Form,
    images::ImageStore,
    jwt::SessionData,
    pagination::{PageContext, PageRequest},
    permissions::ActionType,
    schema::{
        Id, IngredientLine, NewRecipe, Recipe, RecipeChanges, RecipeFilter, RecipeIngredient,
        Relation, Tag, User,
    },
    store::Store,
};

/// Body of recipe create and update requests; every field is optional so
/// that updates can be partial.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct RecipeForm {
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
    /// Base64 data URI.
    pub image: Option<String>,
    pub tags: Option<Vec<Id>>,
    pub ingredients: Option<Vec<IngredientLine>>,
}

/// A recipe together with everything its view is built from.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RecipeAggregate {
    pub recipe: Recipe,
    pub author: User,
    pub tags: Vec<Tag>,
    pub ingredients: Vec<RecipeIngredient>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RecipeView {
    pub id: Id,
    pub tags: Vec<Tag>,
    pub author: UserProfile,
    pub ingredients: Vec<RecipeIngredient>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RecipeSummary {
    pub id: Id,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

impl RecipeSummary {
    pub fn new(recipe: &Recipe, images: &ImageStore) -> Self {
        Self {
            id: recipe.id,
            name: recipe.name.to_owned(),
            image: images.url(&recipe.image),
            cooking_time: recipe.cooking_time,
        }
    }
}

/// Query parameters of the recipe listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeQuery {
    pub tags: Vec<String>,
    pub author: Option<Id>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

impl RecipeQuery {
    pub fn from_form(form: &Form) -> Result<Self, Error> {
        Ok(Self {
            tags: form.get_all("tags"),
            author: form.get_number("author")?,
            is_favorited: form.get_flag("is_favorited")?,
            is_in_shopping_cart: form.get_flag("is_in_shopping_cart")?,
        })
    }

    /// Membership filters only apply to signed in viewers.
    pub fn filter(&self, viewer: Option<&SessionData>) -> RecipeFilter {
        let viewer_id = viewer.map(|session| session.user_id);

        RecipeFilter {
            tags: self.tags.to_owned(),
            author: self.author,
            favorited_by: viewer_id.filter(|_| self.is_favorited),
            in_cart_of: viewer_id.filter(|_| self.is_in_shopping_cart),
        }
    }
}

// Validation

fn required<T>(value: Option<T>, field: &str) -> Result<T, Error> {
    value.ok_or_else(|| Error::validation(field, "This field is required"))
}

fn validate_name(name: String) -> Result<String, Error> {
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(Error::validation("name", "This field may not be blank"));
    }
    if name.chars().count() > RECIPE_NAME_MAX_LENGTH {
        return Err(Error::validation(
            "name",
            format!("Ensure this field has no more than {RECIPE_NAME_MAX_LENGTH} characters"),
        ));
    }
    Ok(name)
}

fn validate_text(text: String) -> Result<String, Error> {
    match text.trim().is_empty() {
        true => Err(Error::validation("text", "This field may not be blank")),
        false => Ok(text),
    }
}

fn validate_cooking_time(cooking_time: i32) -> Result<i32, Error> {
    match cooking_time < 1 {
        true => Err(Error::validation(
            "cooking_time",
            "Cooking time must be at least 1 minute",
        )),
        false => Ok(cooking_time),
    }
}

async fn validate_tags(tags: Vec<Id>, store: &dyn Store) -> Result<Vec<Id>, Error> {
    if tags.is_empty() {
        return Err(Error::validation("tags", "At least one tag is required"));
    }
    let mut seen = HashSet::new();
    if !tags.iter().all(|id| seen.insert(*id)) {
        return Err(Error::validation("tags", "Tags must not repeat"));
    }

    let missing = store.missing_tags(&tags).await?;
    if !missing.is_empty() {
        return Err(Error::validation(
            "tags",
            format!("Tags do not exist: {missing:?}"),
        ));
    }
    Ok(tags)
}

async fn validate_ingredients(
    lines: Vec<IngredientLine>,
    store: &dyn Store,
) -> Result<Vec<IngredientLine>, Error> {
    if lines.is_empty() {
        return Err(Error::validation(
            "ingredients",
            "At least one ingredient is required",
        ));
    }
    if let Some(line) = lines.iter().find(|line| line.amount < 1) {
        return Err(Error::validation(
            "ingredients",
            format!("Amount of ingredient {} must be at least 1", line.id),
        ));
    }
    let mut seen = HashSet::new();
    if let Some(line) = lines.iter().find(|line| !seen.insert(line.id)) {
        return Err(Error::validation(
            "ingredients",
            format!("Ingredient {} is listed more than once", line.id),
        ));
    }

    let ids: Vec<Id> = lines.iter().map(|line| line.id).collect();
    let missing = store.missing_ingredients(&ids).await?;
    if !missing.is_empty() {
        return Err(Error::validation(
            "ingredients",
            format!("Ingredients do not exist: {missing:?}"),
        ));
    }
    Ok(lines)
}

fn duplicate_name(e: Error) -> Error {
    match e {
        Error::Conflict(_) => Error::conflict("You already have a recipe with this name"),
        e => e,
    }
}

// Writes

/// Validates the whole form, stores the image and writes the recipe with
/// its tags and lines in one transaction.
pub async fn create_recipe(
    session: &SessionData,
    form: RecipeForm,
    images: &ImageStore,
    store: &dyn Store,
) -> Result<Id, Error> {
    let name = validate_name(required(form.name, "name")?)?;
    let text = validate_text(required(form.text, "text")?)?;
    let cooking_time = validate_cooking_time(required(form.cooking_time, "cooking_time")?)?;
    let tags = validate_tags(required(form.tags, "tags")?, store).await?;
    let ingredients = validate_ingredients(required(form.ingredients, "ingredients")?, store).await?;
    let image = images.save(&required(form.image, "image")?).await?;

    let recipe = NewRecipe {
        author_id: session.user_id,
        name,
        text,
        cooking_time,
        image: image.to_owned(),
        tags,
        ingredients,
    };

    match store.insert_recipe(recipe).await {
        Ok(id) => {
            log::info!("> User {} created recipe {id}", session.user_id);
            Ok(id)
        }
        Err(e) => {
            images.remove(&image).await;
            Err(duplicate_name(e))
        }
    }
}

pub async fn get_recipe(id: Id, store: &dyn Store) -> Result<Recipe, Error> {
    store
        .get_recipe(id)
        .await?
        .ok_or_else(|| Error::not_found("Recipe does not exist"))
}

/// Only the author may update; that is checked before the payload is.
/// Supplied tags and ingredient lines replace the stored ones.
pub async fn update_recipe(
    session: &SessionData,
    id: Id,
    form: RecipeForm,
    images: &ImageStore,
    store: &dyn Store,
) -> Result<(), Error> {
    let recipe = get_recipe(id, store).await?;
    session.authorize(ActionType::UpdateRecipe, &recipe)?;

    let name = form.name.map(validate_name).transpose()?;
    let text = form.text.map(validate_text).transpose()?;
    let cooking_time = form.cooking_time.map(validate_cooking_time).transpose()?;
    let tags = match form.tags {
        Some(tags) => Some(validate_tags(tags, store).await?),
        None => None,
    };
    let ingredients = match form.ingredients {
        Some(lines) => Some(validate_ingredients(lines, store).await?),
        None => None,
    };
    let image = match form.image {
        Some(data) => Some(images.save(&data).await?),
        None => None,
    };

    let changes = RecipeChanges {
        name,
        text,
        cooking_time,
        image,
        tags,
        ingredients,
    };
    let new_image = changes.image.to_owned();

    match store.update_recipe(id, changes).await {
        Ok(_) => {
            if new_image.is_some() {
                images.remove(&recipe.image).await;
            }
            log::info!("> User {} updated recipe {id}", session.user_id);
            Ok(())
        }
        Err(e) => {
            if let Some(image) = new_image {
                images.remove(&image).await;
            }
            Err(duplicate_name(e))
        }
    }
}

/// Only the author may delete. Lines and memberships go with the recipe.
pub async fn delete_recipe(
    session: &SessionData,
    id: Id,
    images: &ImageStore,
    store: &dyn Store,
) -> Result<(), Error> {
    let recipe = get_recipe(id, store).await?;
    session.authorize(ActionType::DeleteRecipe, &recipe)?;

    if !store.delete_recipe(id).await? {
        return Err(Error::not_found("Recipe does not exist"));
    }
    images.remove(&recipe.image).await;
    log::info!("> User {} deleted recipe {id}", session.user_id);

    Ok(())
}

/// Adds the recipe to the caller's favorites or shopping cart.
pub async fn add_recipe_to(
    relation: Relation,
    session: &SessionData,
    recipe_id: Id,
    images: &ImageStore,
    store: &dyn Store,
) -> Result<RecipeSummary, Error> {
    add_pair(relation, session, recipe_id, store).await?;
    let recipe = get_recipe(recipe_id, store).await?;

    Ok(RecipeSummary::new(&recipe, images))
}

// Reads

pub async fn get_recipe_aggregate(
    id: Id,
    store: &dyn Store,
) -> Result<Option<RecipeAggregate>, Error> {
    let Some(recipe) = store.get_recipe(id).await? else {
        return Ok(None);
    };
    let author = store
        .get_user(recipe.author_id)
        .await?
        .ok_or_else(|| Error::internal(format!("Recipe {id} has no author")))?;
    let tags = store.recipe_tags(id).await?;
    let ingredients = store.recipe_ingredients(id).await?;

    Ok(Some(RecipeAggregate {
        recipe,
        author,
        tags,
        ingredients,
    }))
}

pub async fn recipe_view(
    aggregate: RecipeAggregate,
    viewer: Option<&SessionData>,
    images: &ImageStore,
    store: &dyn Store,
) -> Result<RecipeView, Error> {
    let RecipeAggregate {
        recipe,
        author,
        tags,
        ingredients,
    } = aggregate;

    Ok(RecipeView {
        id: recipe.id,
        tags,
        author: user_profile(author, viewer, store).await?,
        ingredients,
        is_favorited: is_favorited(viewer, recipe.id, store).await?,
        is_in_shopping_cart: is_in_shopping_cart(viewer, recipe.id, store).await?,
        name: recipe.name,
        image: images.url(&recipe.image),
        text: recipe.text,
        cooking_time: recipe.cooking_time,
    })
}

pub async fn list_recipes(
    query: &RecipeQuery,
    viewer: Option<&SessionData>,
    request: PageRequest,
    path: &str,
    images: &ImageStore,
    store: &dyn Store,
) -> Result<PageContext<RecipeView>, Error> {
    let filter = query.filter(viewer);
    let (recipes, count) = store
        .fetch_recipes(&filter, request.offset(), request.limit)
        .await?;

    let mut views = Vec::with_capacity(recipes.len());
    for recipe in recipes {
        // Deleted between the two reads
        let Some(aggregate) = get_recipe_aggregate(recipe.id, store).await? else {
            continue;
        };
        views.push(recipe_view(aggregate, viewer, images, store).await?);
    }

    PageContext::from_rows(views, count, request, path)
}
