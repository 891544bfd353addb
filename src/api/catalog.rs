use std::sync::Arc;

use warp::{filters::BoxedFilter, http::StatusCode, reply::Response, Filter, Rejection};

use super::reply::{json_reply, reject};
use crate::{
    actions::{ingredients, tags},
    form::{Form, FormData},
    middleware::with_context,
    schema::Id,
    state::Context,
};

pub fn routes(context: Arc<Context>) -> BoxedFilter<(Response,)> {
    let list_tags = warp::path!("api" / "tags")
        .and(warp::get())
        .and(with_context(context.clone()))
        .and_then(list_tags);

    let tag = warp::path!("api" / "tags" / Id)
        .and(warp::get())
        .and(with_context(context.clone()))
        .and_then(get_tag);

    let list_ingredients = warp::path!("api" / "ingredients")
        .and(warp::get())
        .and(warp::query::<FormData>())
        .and(with_context(context.clone()))
        .and_then(list_ingredients);

    let ingredient = warp::path!("api" / "ingredients" / Id)
        .and(warp::get())
        .and(with_context(context))
        .and_then(get_ingredient);

    list_tags
        .or(tag)
        .unify()
        .or(list_ingredients)
        .unify()
        .or(ingredient)
        .unify()
        .boxed()
}

async fn list_tags(context: Arc<Context>) -> Result<Response, Rejection> {
    let tags = tags::list_tags(context.store()).await.map_err(reject)?;
    Ok(json_reply(&tags, StatusCode::OK))
}

async fn get_tag(id: Id, context: Arc<Context>) -> Result<Response, Rejection> {
    let tag = tags::get_tag(id, context.store()).await.map_err(reject)?;
    Ok(json_reply(&tag, StatusCode::OK))
}

async fn list_ingredients(form: FormData, context: Arc<Context>) -> Result<Response, Rejection> {
    let form = Form::from_data(form);
    let ingredients = ingredients::list_ingredients(form.get_str("name"), context.store())
        .await
        .map_err(reject)?;

    Ok(json_reply(&ingredients, StatusCode::OK))
}

async fn get_ingredient(id: Id, context: Arc<Context>) -> Result<Response, Rejection> {
    let ingredient = ingredients::get_ingredient(id, context.store())
        .await
        .map_err(reject)?;

    Ok(json_reply(&ingredient, StatusCode::OK))
}
