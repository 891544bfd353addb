use std::sync::Arc;

use serde_json::json;
use warp::{filters::BoxedFilter, http::StatusCode, reply::Response, Filter, Rejection};

use super::reply::{json_body, json_reply, no_content, reject};
use crate::{
    actions::{
        subscriptions::{self, parse_recipes_limit},
        users::{self, DeleteAccountForm, LoginForm, PasswordForm, RegisterForm},
    },
    form::{Form, FormData},
    jwt::SessionData,
    middleware::{with_context, with_possible_session, with_session},
    schema::Id,
    state::Context,
};

const USERS_PATH: &str = "/api/users/";
const SUBSCRIPTIONS_PATH: &str = "/api/users/subscriptions/";

pub fn routes(context: Arc<Context>) -> BoxedFilter<(Response,)> {
    let list = warp::path!("api" / "users")
        .and(warp::get())
        .and(warp::query::<FormData>())
        .and(with_possible_session(context.clone()))
        .and(with_context(context.clone()))
        .and_then(list_users);

    let register = warp::path!("api" / "users")
        .and(warp::post())
        .and(json_body::<RegisterForm>())
        .and(with_context(context.clone()))
        .and_then(register_user);

    let me = warp::path!("api" / "users" / "me")
        .and(warp::get())
        .and(with_session(context.clone()))
        .and(with_context(context.clone()))
        .and_then(current_user);

    let delete_me = warp::path!("api" / "users" / "me")
        .and(warp::delete())
        .and(with_session(context.clone()))
        .and(json_body::<DeleteAccountForm>())
        .and(with_context(context.clone()))
        .and_then(delete_account);

    let set_password = warp::path!("api" / "users" / "set_password")
        .and(warp::post())
        .and(with_session(context.clone()))
        .and(json_body::<PasswordForm>())
        .and(with_context(context.clone()))
        .and_then(set_password);

    let subscriptions = warp::path!("api" / "users" / "subscriptions")
        .and(warp::get())
        .and(warp::query::<FormData>())
        .and(with_session(context.clone()))
        .and(with_context(context.clone()))
        .and_then(list_subscriptions);

    let subscribe = warp::path!("api" / "users" / Id / "subscribe")
        .and(warp::post())
        .and(warp::query::<FormData>())
        .and(with_session(context.clone()))
        .and(with_context(context.clone()))
        .and_then(subscribe);

    let unsubscribe = warp::path!("api" / "users" / Id / "subscribe")
        .and(warp::delete())
        .and(with_session(context.clone()))
        .and(with_context(context.clone()))
        .and_then(unsubscribe);

    let user = warp::path!("api" / "users" / Id)
        .and(warp::get())
        .and(with_possible_session(context.clone()))
        .and(with_context(context.clone()))
        .and_then(get_user);

    let login = warp::path!("api" / "auth" / "token" / "login")
        .and(warp::post())
        .and(json_body::<LoginForm>())
        .and(with_context(context))
        .and_then(login);

    list.or(register)
        .unify()
        .or(me)
        .unify()
        .or(delete_me)
        .unify()
        .or(set_password)
        .unify()
        .or(subscriptions)
        .unify()
        .or(subscribe)
        .unify()
        .or(unsubscribe)
        .unify()
        .or(user)
        .unify()
        .or(login)
        .unify()
        .boxed()
}

async fn list_users(
    form: FormData,
    session: Option<SessionData>,
    context: Arc<Context>,
) -> Result<Response, Rejection> {
    let page = Form::from_data(form).page().map_err(reject)?;
    let users = users::list_profiles(session.as_ref(), page, USERS_PATH, context.store())
        .await
        .map_err(reject)?;

    Ok(json_reply(&users, StatusCode::OK))
}

async fn register_user(form: RegisterForm, context: Arc<Context>) -> Result<Response, Rejection> {
    let user = users::register_user(form, context.store())
        .await
        .map_err(reject)?;

    Ok(json_reply(&user, StatusCode::CREATED))
}

async fn login(form: LoginForm, context: Arc<Context>) -> Result<Response, Rejection> {
    let token = users::login_user(&form.email, &form.password, &context.keys, context.store())
        .await
        .map_err(reject)?;

    Ok(json_reply(&json!({ "auth_token": token }), StatusCode::OK))
}

async fn current_user(session: SessionData, context: Arc<Context>) -> Result<Response, Rejection> {
    let user = users::current_user(&session, context.store())
        .await
        .map_err(reject)?;
    let profile = users::user_profile(user, Some(&session), context.store())
        .await
        .map_err(reject)?;

    Ok(json_reply(&profile, StatusCode::OK))
}

async fn get_user(
    id: Id,
    session: Option<SessionData>,
    context: Arc<Context>,
) -> Result<Response, Rejection> {
    let user = users::get_user_by_id(id, context.store())
        .await
        .map_err(reject)?;
    let profile = users::user_profile(user, session.as_ref(), context.store())
        .await
        .map_err(reject)?;

    Ok(json_reply(&profile, StatusCode::OK))
}

async fn set_password(
    session: SessionData,
    form: PasswordForm,
    context: Arc<Context>,
) -> Result<Response, Rejection> {
    users::set_password(&session, form, context.store())
        .await
        .map_err(reject)?;

    Ok(no_content())
}

async fn delete_account(
    session: SessionData,
    form: DeleteAccountForm,
    context: Arc<Context>,
) -> Result<Response, Rejection> {
    users::delete_account(&session, form, &context.images, context.store())
        .await
        .map_err(reject)?;
    context.invalidate_recipes().await;

    Ok(no_content())
}

async fn list_subscriptions(
    form: FormData,
    session: SessionData,
    context: Arc<Context>,
) -> Result<Response, Rejection> {
    let form = Form::from_data(form);
    let page = form.page().map_err(reject)?;
    let recipes_limit = form
        .get_number("recipes_limit")
        .and_then(parse_recipes_limit)
        .map_err(reject)?;

    let subscriptions = subscriptions::list_subscriptions(
        &session,
        recipes_limit,
        page,
        SUBSCRIPTIONS_PATH,
        &context.images,
        context.store(),
    )
    .await
    .map_err(reject)?;

    Ok(json_reply(&subscriptions, StatusCode::OK))
}

async fn subscribe(
    author_id: Id,
    form: FormData,
    session: SessionData,
    context: Arc<Context>,
) -> Result<Response, Rejection> {
    let recipes_limit = Form::from_data(form)
        .get_number("recipes_limit")
        .and_then(parse_recipes_limit)
        .map_err(reject)?;

    let subscription = subscriptions::subscribe(
        &session,
        author_id,
        recipes_limit,
        &context.images,
        context.store(),
    )
    .await
    .map_err(reject)?;

    Ok(json_reply(&subscription, StatusCode::CREATED))
}

async fn unsubscribe(
    author_id: Id,
    session: SessionData,
    context: Arc<Context>,
) -> Result<Response, Rejection> {
    subscriptions::unsubscribe(&session, author_id, context.store())
        .await
        .map_err(reject)?;

    Ok(no_content())
}
