use std::sync::Arc;

use warp::{filters::BoxedFilter, http::StatusCode, reply::Response, Filter, Rejection};

use super::reply::{attachment, json_body, json_reply, no_content, reject};
use crate::{
    actions::{
        memberships::remove_pair,
        recipes::{self, RecipeForm, RecipeQuery},
        shopping_list::export_shopping_list,
    },
    error::Error,
    form::{Form, FormData},
    jwt::SessionData,
    middleware::{with_context, with_possible_session, with_session},
    schema::{Id, Relation},
    state::Context,
};

const RECIPES_PATH: &str = "/api/recipes/";

pub fn routes(context: Arc<Context>) -> BoxedFilter<(Response,)> {
    let list = warp::path!("api" / "recipes")
        .and(warp::get())
        .and(warp::query::<FormData>())
        .and(with_possible_session(context.clone()))
        .and(with_context(context.clone()))
        .and_then(list_recipes);

    let create = warp::path!("api" / "recipes")
        .and(warp::post())
        .and(with_session(context.clone()))
        .and(json_body::<RecipeForm>())
        .and(with_context(context.clone()))
        .and_then(create_recipe);

    let download = warp::path!("api" / "recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(with_session(context.clone()))
        .and(with_context(context.clone()))
        .and_then(download_shopping_cart);

    let get = warp::path!("api" / "recipes" / Id)
        .and(warp::get())
        .and(with_possible_session(context.clone()))
        .and(with_context(context.clone()))
        .and_then(get_recipe);

    let update = warp::path!("api" / "recipes" / Id)
        .and(warp::patch())
        .and(with_session(context.clone()))
        .and(json_body::<RecipeForm>())
        .and(with_context(context.clone()))
        .and_then(update_recipe);

    let delete = warp::path!("api" / "recipes" / Id)
        .and(warp::delete())
        .and(with_session(context.clone()))
        .and(with_context(context.clone()))
        .and_then(delete_recipe);

    let favorite = membership_routes("favorite", Relation::Favorite, context.clone());
    let shopping_cart = membership_routes("shopping_cart", Relation::ShoppingCart, context);

    list.or(create)
        .unify()
        .or(download)
        .unify()
        .or(get)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
        .or(favorite)
        .unify()
        .or(shopping_cart)
        .unify()
        .boxed()
}

/// `POST` and `DELETE` on `/api/recipes/{id}/<segment>/`.
fn membership_routes(
    segment: &'static str,
    relation: Relation,
    context: Arc<Context>,
) -> BoxedFilter<(Response,)> {
    let path = warp::path("api")
        .and(warp::path("recipes"))
        .and(warp::path::param::<Id>())
        .and(warp::path(segment))
        .and(warp::path::end());

    let add = path
        .clone()
        .and(warp::post())
        .and(warp::any().map(move || relation))
        .and(with_session(context.clone()))
        .and(with_context(context.clone()))
        .and_then(add_to_collection);

    let remove = path
        .and(warp::delete())
        .and(warp::any().map(move || relation))
        .and(with_session(context.clone()))
        .and(with_context(context))
        .and_then(remove_from_collection);

    add.or(remove).unify().boxed()
}

async fn render(
    id: Id,
    session: Option<&SessionData>,
    context: &Context,
) -> Result<Response, Error> {
    let aggregate = context
        .recipe_aggregate(id)
        .await?
        .ok_or_else(|| Error::not_found("Recipe does not exist"))?;
    let view = recipes::recipe_view(aggregate, session, &context.images, context.store()).await?;

    Ok(json_reply(&view, StatusCode::OK))
}

async fn list_recipes(
    form: FormData,
    session: Option<SessionData>,
    context: Arc<Context>,
) -> Result<Response, Rejection> {
    let form = Form::from_data(form);
    let query = RecipeQuery::from_form(&form).map_err(reject)?;
    let page = form.page().map_err(reject)?;

    let recipes = recipes::list_recipes(
        &query,
        session.as_ref(),
        page,
        RECIPES_PATH,
        &context.images,
        context.store(),
    )
    .await
    .map_err(reject)?;

    Ok(json_reply(&recipes, StatusCode::OK))
}

async fn get_recipe(
    id: Id,
    session: Option<SessionData>,
    context: Arc<Context>,
) -> Result<Response, Rejection> {
    render(id, session.as_ref(), &context).await.map_err(reject)
}

async fn create_recipe(
    session: SessionData,
    form: RecipeForm,
    context: Arc<Context>,
) -> Result<Response, Rejection> {
    let id = recipes::create_recipe(&session, form, &context.images, context.store())
        .await
        .map_err(reject)?;

    let mut response = render(id, Some(&session), &context)
        .await
        .map_err(reject)?;
    *response.status_mut() = StatusCode::CREATED;
    Ok(response)
}

async fn update_recipe(
    id: Id,
    session: SessionData,
    form: RecipeForm,
    context: Arc<Context>,
) -> Result<Response, Rejection> {
    recipes::update_recipe(&session, id, form, &context.images, context.store())
        .await
        .map_err(reject)?;
    context.invalidate_recipes().await;

    render(id, Some(&session), &context).await.map_err(reject)
}

async fn delete_recipe(
    id: Id,
    session: SessionData,
    context: Arc<Context>,
) -> Result<Response, Rejection> {
    recipes::delete_recipe(&session, id, &context.images, context.store())
        .await
        .map_err(reject)?;
    context.invalidate_recipes().await;

    Ok(no_content())
}

async fn add_to_collection(
    id: Id,
    relation: Relation,
    session: SessionData,
    context: Arc<Context>,
) -> Result<Response, Rejection> {
    let summary = recipes::add_recipe_to(relation, &session, id, &context.images, context.store())
        .await
        .map_err(reject)?;

    Ok(json_reply(&summary, StatusCode::CREATED))
}

async fn remove_from_collection(
    id: Id,
    relation: Relation,
    session: SessionData,
    context: Arc<Context>,
) -> Result<Response, Rejection> {
    remove_pair(relation, &session, id, context.store())
        .await
        .map_err(reject)?;

    Ok(no_content())
}

async fn download_shopping_cart(
    session: SessionData,
    context: Arc<Context>,
) -> Result<Response, Rejection> {
    let document = export_shopping_list(&session, context.store())
        .await
        .map_err(reject)?;

    Ok(attachment(&document.file_name, document.content))
}
