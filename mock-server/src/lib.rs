use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
};

use axum::{
    extract::{Path, Query, RawQuery, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post},
    Form, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Client {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Category {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Pet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    pub name: String,
    #[serde(rename = "photoUrls", default)]
    pub photo_urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Tag>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Order {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "petId", skip_serializing_if = "Option::is_none")]
    pub pet_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i32>,
    #[serde(rename = "shipDate", skip_serializing_if = "Option::is_none")]
    pub ship_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub complete: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct User {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(rename = "firstName", skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(rename = "lastName", skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(rename = "userStatus", default)]
    pub user_status: Option<i32>,
}

#[derive(Deserialize)]
pub struct PetForm {
    pub name: Option<String>,
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct Login {
    pub username: String,
    pub password: String,
}

pub const PET_STATUSES: [&str; 3] = ["available", "pending", "sold"];

#[derive(Clone, Default)]
pub struct Store {
    pets: Arc<RwLock<HashMap<i64, Pet>>>,
    orders: Arc<RwLock<HashMap<i64, Order>>>,
    users: Arc<RwLock<HashMap<String, User>>>,
    next_id: Arc<AtomicI64>,
}

impl Store {
    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

pub fn app() -> Router {
    Router::new()
        .route("/another-fake/dummy", patch(special_tags))
        .route("/pet", post(add_pet).put(update_pet))
        .route("/pet/findByStatus", get(find_pets_by_status))
        .route(
            "/pet/{pet_id}",
            get(get_pet).post(update_pet_with_form).delete(delete_pet),
        )
        .route("/store/order", post(place_order))
        .route("/store/order/{order_id}", get(get_order).delete(delete_order))
        .route("/user", post(create_user))
        .route("/user/login", get(login_user))
        .route("/user/{username}", get(get_user))
        .with_state(Store::default())
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn valid_status(status: &Option<String>) -> bool {
    status
        .as_deref()
        .is_none_or(|s| PET_STATUSES.contains(&s))
}

async fn special_tags(headers: HeaderMap, Json(body): Json<Client>) -> Result<Json<Client>, StatusCode> {
    headers
        .get("uuid_test")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok())
        .ok_or(StatusCode::BAD_REQUEST)?;
    Ok(Json(body))
}

async fn add_pet(State(store): State<Store>, Json(mut pet): Json<Pet>) -> Result<Json<Pet>, StatusCode> {
    if !valid_status(&pet.status) {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    let id = match pet.id {
        Some(id) => id,
        None => store.allocate_id(),
    };
    pet.id = Some(id);
    store.pets.write().await.insert(id, pet.clone());
    Ok(Json(pet))
}

async fn update_pet(State(store): State<Store>, Json(pet): Json<Pet>) -> Result<Json<Pet>, StatusCode> {
    let id = pet.id.ok_or(StatusCode::BAD_REQUEST)?;
    if !valid_status(&pet.status) {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    let mut pets = store.pets.write().await;
    let slot = pets.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    *slot = pet.clone();
    Ok(Json(pet))
}

/// Accepts repeated keys (`status=a&status=b`) and comma-joined values.
async fn find_pets_by_status(
    State(store): State<Store>,
    RawQuery(query): RawQuery,
) -> Result<Json<Vec<Pet>>, StatusCode> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query.as_deref().unwrap_or(""))
        .map_err(|_| StatusCode::BAD_REQUEST)?;
    let wanted: Vec<String> = pairs
        .into_iter()
        .filter(|(name, _)| name == "status")
        .flat_map(|(_, value)| value.split(',').map(str::to_string).collect::<Vec<_>>())
        .collect();
    if wanted.is_empty() || wanted.iter().any(|s| !PET_STATUSES.contains(&s.as_str())) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let pets = store.pets.read().await;
    let mut found: Vec<Pet> = pets
        .values()
        .filter(|pet| pet.status.as_ref().is_some_and(|s| wanted.contains(s)))
        .cloned()
        .collect();
    found.sort_by_key(|pet| pet.id);
    Ok(Json(found))
}

async fn get_pet(State(store): State<Store>, Path(pet_id): Path<i64>) -> Result<Json<Pet>, StatusCode> {
    let pets = store.pets.read().await;
    pets.get(&pet_id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn update_pet_with_form(
    State(store): State<Store>,
    Path(pet_id): Path<i64>,
    Form(form): Form<PetForm>,
) -> StatusCode {
    if !valid_status(&form.status) {
        return StatusCode::UNPROCESSABLE_ENTITY;
    }
    let mut pets = store.pets.write().await;
    let Some(pet) = pets.get_mut(&pet_id) else {
        return StatusCode::NOT_FOUND;
    };
    if let Some(name) = form.name {
        pet.name = name;
    }
    if form.status.is_some() {
        pet.status = form.status;
    }
    StatusCode::OK
}

async fn delete_pet(State(store): State<Store>, Path(pet_id): Path<i64>) -> StatusCode {
    match store.pets.write().await.remove(&pet_id) {
        Some(_) => StatusCode::OK,
        None => StatusCode::NOT_FOUND,
    }
}

async fn place_order(State(store): State<Store>, Json(mut order): Json<Order>) -> Json<Order> {
    let id = match order.id {
        Some(id) => id,
        None => store.allocate_id(),
    };
    order.id = Some(id);
    store.orders.write().await.insert(id, order.clone());
    Json(order)
}

async fn get_order(State(store): State<Store>, Path(order_id): Path<i64>) -> Result<Json<Order>, StatusCode> {
    let orders = store.orders.read().await;
    orders.get(&order_id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn delete_order(State(store): State<Store>, Path(order_id): Path<i64>) -> StatusCode {
    match store.orders.write().await.remove(&order_id) {
        Some(_) => StatusCode::OK,
        None => StatusCode::NOT_FOUND,
    }
}

async fn create_user(State(store): State<Store>, Json(user): Json<User>) -> StatusCode {
    let Some(username) = user.username.clone().filter(|u| !u.is_empty()) else {
        return StatusCode::BAD_REQUEST;
    };
    store.users.write().await.insert(username, user);
    StatusCode::OK
}

async fn get_user(State(store): State<Store>, Path(username): Path<String>) -> Result<Json<User>, StatusCode> {
    let users = store.users.read().await;
    users.get(&username).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn login_user(Query(login): Query<Login>) -> impl IntoResponse {
    if login.username.is_empty() || login.password.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "invalid username/password supplied"));
    }
    let expires = Utc::now() + chrono::Duration::hours(1);
    Ok((
        [
            ("content-type", "text/plain".to_string()),
            ("x-rate-limit", "5000".to_string()),
            ("x-expires-after", expires.to_rfc3339()),
        ],
        format!("logged in user session:{}", Uuid::new_v4()),
    ))
}
