use crate::{
    error::Error,
    records::parse_ingredients,
    schema::{Id, Ingredient},
    store::Store,
};

/// Every ingredient, or those whose name starts with `name` ignoring case.
pub async fn list_ingredients(name: Option<&str>, store: &dyn Store) -> Result<Vec<Ingredient>, Error> {
    let name = name.map(str::trim).filter(|name| !name.is_empty());
    store.list_ingredients(name).await
}

pub async fn get_ingredient(id: Id, store: &dyn Store) -> Result<Ingredient, Error> {
    store
        .get_ingredient(id)
        .await?
        .ok_or_else(|| Error::not_found("Ingredient does not exist"))
}

/// Loads `name,measurement_unit` lines. Returns how many were inserted.
pub async fn import_ingredients(text: &str, store: &dyn Store) -> Result<u64, Error> {
    let ingredients = parse_ingredients(text)?;
    let count = store.insert_ingredients(ingredients).await?;
    log::info!("> Imported {count} ingredients");

    Ok(count)
}
