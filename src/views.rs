use actix_web::{
    http::{
        header::{self, ContentType},
        StatusCode,
    },
    web, HttpRequest, HttpResponse, Resource,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::db::Store;
use crate::error::{AppError, StoreError};
use crate::forms::{self, FormData, FormErrors, DATE_FORMAT};
use crate::models::Section;
use crate::query;
use crate::render::{self, EXTRA_PRODUCT_FORMS};
use crate::tracking::{self, summarize_day};

const FOOD_LIST: &str = "/food/";

type FormBody = web::Form<Vec<(String, String)>>;

fn html(status: StatusCode, body: String) -> HttpResponse {
    HttpResponse::build(status)
        .content_type(ContentType::html())
        .body(body)
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .finish()
}

fn track_path(date: NaiveDate) -> String {
    format!("/track/{}/", date.format(DATE_FORMAT))
}

fn edit_path(recipe_id: i32) -> String {
    format!("/food/{recipe_id}/edit/")
}

fn wants_json(req: &HttpRequest) -> bool {
    req.headers()
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"))
}

pub(crate) async fn home() -> HttpResponse {
    html(StatusCode::OK, render::home())
}

/// Responds with the table of foods and recipes.
pub(crate) async fn food_list(store: web::Data<Store>) -> Result<HttpResponse, AppError> {
    let catalog = store.run(query::load_catalog).await?;
    Ok(html(StatusCode::OK, render::food_list(&catalog)))
}

pub(crate) async fn add_food_form() -> HttpResponse {
    html(
        StatusCode::OK,
        render::food_form(
            "Add food",
            "/food/add/",
            &FormData::default(),
            &FormErrors::default(),
        ),
    )
}

/// Creates the food along with its alias recipe, so it can be picked
/// wherever a recipe is expected.
pub(crate) async fn add_food(
    store: web::Data<Store>,
    form: FormBody,
) -> Result<HttpResponse, AppError> {
    let data = FormData::new(form.into_inner());
    let rerender = |errors: &FormErrors| {
        html(
            StatusCode::OK,
            render::food_form("Add food", "/food/add/", &data, errors),
        )
    };

    let input = match forms::parse_food(&data) {
        Ok(input) => input,
        Err(errors) => return Ok(rerender(&errors)),
    };
    match store.run(move |conn| query::create_food(conn, &input)).await {
        Ok(_) => Ok(redirect(FOOD_LIST)),
        Err(StoreError::Validation(errors)) => Ok(rerender(&errors)),
        Err(err) => Err(err.into()),
    }
}

pub(crate) async fn add_recipe_form(store: web::Data<Store>) -> Result<HttpResponse, AppError> {
    let catalog = store.run(query::load_catalog).await?;
    Ok(html(
        StatusCode::OK,
        render::recipe_form(
            "Add recipe",
            "/recipe/add/",
            &FormData::default(),
            &FormErrors::default(),
            &catalog,
            None,
            EXTRA_PRODUCT_FORMS,
        ),
    ))
}

/// The recipe form and every product row must validate before anything is
/// written; otherwise the form comes back with a 400.
pub(crate) async fn add_recipe(
    store: web::Data<Store>,
    form: FormBody,
) -> Result<HttpResponse, AppError> {
    let data = FormData::new(form.into_inner());
    let errors = match forms::parse_recipe_submission(&data) {
        Ok((recipe, products)) => {
            match store
                .run(move |conn| query::create_recipe(conn, &recipe, &products))
                .await
            {
                Ok(_) => return Ok(redirect(FOOD_LIST)),
                Err(StoreError::Validation(errors)) => errors,
                Err(err) => return Err(err.into()),
            }
        }
        Err(errors) => errors,
    };

    log::warn!("rejected recipe submission: {errors:?}");
    let catalog = store.run(query::load_catalog).await?;
    Ok(html(
        StatusCode::BAD_REQUEST,
        render::recipe_form("Add recipe", "/recipe/add/", &data, &errors, &catalog, None, 0),
    ))
}

/// Food aliases are edited as the food they stand for; any other recipe gets
/// the recipe form with its inline products.
pub(crate) async fn edit_entry_form(
    store: web::Data<Store>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let recipe_id = path.into_inner();
    let catalog = store.run(query::load_catalog).await?;
    let recipe = catalog
        .recipe(recipe_id)
        .ok_or_else(|| AppError::from(StoreError::not_found("recipe", recipe_id)))?;

    if let Some(food) = catalog.alias_food(recipe_id) {
        return Ok(html(
            StatusCode::OK,
            render::food_form(
                &format!("Edit {}", food.name),
                &edit_path(recipe_id),
                &forms::food_initial(food),
                &FormErrors::default(),
            ),
        ));
    }

    let data = forms::recipe_initial(recipe, catalog.products(recipe_id));
    Ok(html(
        StatusCode::OK,
        render::recipe_form(
            &format!("Edit {}", recipe.name),
            &edit_path(recipe_id),
            &data,
            &FormErrors::default(),
            &catalog,
            Some(recipe_id),
            EXTRA_PRODUCT_FORMS,
        ),
    ))
}

pub(crate) async fn edit_entry(
    store: web::Data<Store>,
    path: web::Path<i32>,
    form: FormBody,
) -> Result<HttpResponse, AppError> {
    let recipe_id = path.into_inner();
    let data = FormData::new(form.into_inner());
    let catalog = store.run(query::load_catalog).await?;
    let recipe = catalog
        .recipe(recipe_id)
        .ok_or_else(|| AppError::from(StoreError::not_found("recipe", recipe_id)))?;
    let title = format!("Edit {}", recipe.name);
    let action = edit_path(recipe_id);

    if let Some(food) = catalog.alias_food(recipe_id) {
        let food_id = food.id;
        let rerender =
            |errors: &FormErrors| html(StatusCode::OK, render::food_form(&title, &action, &data, errors));
        let input = match forms::parse_food(&data) {
            Ok(input) => input,
            Err(errors) => return Ok(rerender(&errors)),
        };
        return match store
            .run(move |conn| query::update_alias_food(conn, recipe_id, food_id, &input))
            .await
        {
            Ok(_) => Ok(redirect(FOOD_LIST)),
            Err(StoreError::Validation(errors)) => Ok(rerender(&errors)),
            Err(err) => Err(err.into()),
        };
    }

    let errors = match forms::parse_recipe_submission(&data) {
        Ok((input, products)) => {
            match store
                .run(move |conn| query::update_recipe(conn, recipe_id, &input, &products))
                .await
            {
                Ok(_) => return Ok(redirect(FOOD_LIST)),
                Err(StoreError::Validation(errors)) => errors,
                Err(err) => return Err(err.into()),
            }
        }
        Err(errors) => errors,
    };

    log::warn!("rejected edit of recipe {recipe_id}: {errors:?}");
    Ok(html(
        StatusCode::BAD_REQUEST,
        render::recipe_form(&title, &action, &data, &errors, &catalog, Some(recipe_id), 0),
    ))
}

pub(crate) async fn delete_entry(
    store: web::Data<Store>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let recipe_id = path.into_inner();
    store
        .run(move |conn| query::delete_entry(conn, recipe_id))
        .await?;
    Ok(redirect(FOOD_LIST))
}

/// Sends the bare track URL to today's page.
pub(crate) async fn track_today() -> HttpResponse {
    redirect(&track_path(tracking::today(Utc::now())))
}

/// One day broken down by section, as HTML or, on request, JSON.
pub(crate) async fn track(
    req: HttpRequest,
    store: web::Data<Store>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let date = parse_date(&path)?;

    let summary = store
        .run(move |conn| {
            let catalog = query::load_catalog(conn)?;
            let records = query::find_records_on(conn, date)?;
            Ok(summarize_day(date, &records, &catalog)?)
        })
        .await?;

    if wants_json(&req) {
        return Ok(HttpResponse::Ok().json(&summary));
    }
    Ok(html(StatusCode::OK, render::track(&summary)))
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecordQuery {
    date: Option<String>,
}

fn parse_date(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|_| AppError::BadRequest(format!("{raw} is not a valid date")))
}

fn section_from_path(section: i32) -> Result<Section, AppError> {
    Section::try_from(section).map_err(|index| AppError::NotFound(format!("section {index} does not exist")))
}

pub(crate) async fn add_record_form(
    store: web::Data<Store>,
    path: web::Path<i32>,
    params: web::Query<RecordQuery>,
) -> Result<HttpResponse, AppError> {
    let section = section_from_path(path.into_inner())?;
    let date = match params.date.as_deref() {
        Some(raw) => parse_date(raw)?,
        None => tracking::today(Utc::now()),
    };
    let catalog = store.run(query::load_catalog).await?;

    let mut data = FormData::default();
    data.set("date_added", date.format(DATE_FORMAT).to_string());
    Ok(html(
        StatusCode::OK,
        render::record_form(section, &data, &FormErrors::default(), &catalog),
    ))
}

pub(crate) async fn add_record(
    store: web::Data<Store>,
    path: web::Path<i32>,
    form: FormBody,
) -> Result<HttpResponse, AppError> {
    let section = section_from_path(path.into_inner())?;
    let data = FormData::new(form.into_inner());

    let errors = match forms::parse_record(&data) {
        Ok(input) => {
            match store
                .run(move |conn| query::create_record(conn, &input, section))
                .await
            {
                Ok(created) => return Ok(redirect(&track_path(created.date_added))),
                Err(StoreError::Validation(errors)) => errors,
                Err(err) => return Err(err.into()),
            }
        }
        Err(errors) => errors,
    };

    let catalog = store.run(query::load_catalog).await?;
    Ok(html(
        StatusCode::OK,
        render::record_form(section, &data, &errors, &catalog),
    ))
}

pub(crate) async fn delete_record(
    store: web::Data<Store>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let record_id = path.into_inner();
    let removed = store
        .run(move |conn| query::delete_record(conn, record_id))
        .await?;
    Ok(redirect(&track_path(removed.date_added)))
}

pub(crate) async fn unsupported_method(req: HttpRequest) -> Result<HttpResponse, AppError> {
    log::error!("undefined HTTP request method {} on {}", req.method(), req.path());
    Err(AppError::MethodNotAllowed(req.method().clone()))
}

/// A resource that answers any method without a route with an error.
fn endpoint(path: &str) -> Resource {
    web::resource(path).default_service(web::to(unsupported_method))
}

pub(crate) fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(endpoint("/").route(web::get().to(home)))
        .service(endpoint("/food/").route(web::get().to(food_list)))
        .service(
            endpoint("/food/add/")
                .route(web::get().to(add_food_form))
                .route(web::post().to(add_food)),
        )
        .service(
            endpoint("/recipe/add/")
                .route(web::get().to(add_recipe_form))
                .route(web::post().to(add_recipe)),
        )
        .service(
            endpoint("/food/{id}/edit/")
                .route(web::get().to(edit_entry_form))
                .route(web::post().to(edit_entry)),
        )
        .service(endpoint("/food/{id}/delete/").route(web::post().to(delete_entry)))
        .service(endpoint("/track/").route(web::get().to(track_today)))
        .service(endpoint("/track/{date}/").route(web::get().to(track)))
        .service(
            endpoint("/record/add/{section}/")
                .route(web::get().to(add_record_form))
                .route(web::post().to(add_record)),
        )
        .service(endpoint("/record/{id}/delete/").route(web::post().to(delete_record)));
}
