//! In-memory users API
//!
//! This example demonstrates:
//! - Binding and validating request bodies
//! - Partial updates driven by the keys the client actually sent
//! - List queries: paging, sorting, id filters, counts, embeds and projection
//! - Obfuscated identifiers checked with the `encrypted` rule
//!
//! Run with: cargo run --example users_api
//!
//! Test with:
//!   curl -X POST http://localhost:8088/users \
//!     -H "Content-Type: application/json" \
//!     -d '{"name":"Alice","email":"alice@example.com"}'
//!
//!   curl 'http://localhost:8088/users?sort=-name&per_page=5&count=true&field=id,name'
//!   curl 'http://localhost:8088/users?embed=roles'
//!
//!   curl -X PUT http://localhost:8088/users/65536 \
//!     -H "Content-Type: application/json" \
//!     -d '{"active":false}'

use std::sync::Arc;

use apiflow::prelude::*;
use apiflow::validation::{rules, swap_halves};
use axum::extract::FromRef;
use tokio::sync::RwLock;
use validator::Validate;

#[derive(Debug, Clone)]
struct UserRow {
    id: i64,
    name: String,
    email: String,
    active: bool,
    roles: Vec<String>,
}

#[derive(Debug, Serialize)]
struct UserView {
    id_e: String,
    name: String,
    email: String,
    active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    roles: Option<Vec<String>>,
}

field_registry!(UserView {
    IdE => id_e,
    Name => name,
    Email => email,
    Active => active,
    Roles => roles,
});

impl UserView {
    fn from_row(row: &UserRow, with_roles: bool) -> Self {
        Self {
            id_e: swap_halves(row.id).to_string(),
            name: row.name.clone(),
            email: row.email.clone(),
            active: row.active,
            roles: with_roles.then(|| row.roles.clone()),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
struct CreateUser {
    #[validate(length(min = 2, max = 64))]
    name: String,
    #[validate(email)]
    email: String,
    #[serde(default)]
    roles: Vec<String>,
}

field_set!(CreateUser { Name, Email, Roles });

#[derive(Debug, Deserialize, Validate)]
struct UpdateUser {
    #[validate(length(min = 2, max = 64))]
    name: Option<String>,
    #[validate(email)]
    email: Option<String>,
    #[serde(default)]
    active: bool,
}

field_set!(UpdateUser { Name, Email, Active });

#[derive(Clone)]
struct AppState {
    pipeline: Pipeline,
    users: Arc<RwLock<Vec<UserRow>>>,
}

impl FromRef<AppState> for Pipeline {
    fn from_ref(state: &AppState) -> Self {
        state.pipeline.clone()
    }
}

fn decode_id(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().map(swap_halves).filter(|id| *id >= 1)
}

async fn list_users(State(state): State<AppState>, ctx: RequestContext) -> Response {
    let mut handler = Handler::prepare(&ctx);
    let query = handler.query_params().cloned().unwrap_or_default();
    let with_roles = handler.is_embed("roles");

    let users = state.users.read().await;
    let ids: Vec<i64> = query.ids.iter().filter_map(|raw| decode_id(raw)).collect();

    let mut matched: Vec<&UserRow> = users
        .iter()
        .filter(|row| ids.is_empty() || ids.contains(&row.id))
        .collect();

    if let Some(sort) = &query.sort {
        matched.sort_by(|a, b| match sort.field.as_str() {
            "name" => a.name.cmp(&b.name),
            "email" => a.email.cmp(&b.email),
            _ => a.id.cmp(&b.id),
        });
        if sort.order == SortOrder::Desc {
            matched.reverse();
        }
    }

    if query.count {
        handler.set_total(i64::try_from(matched.len()).unwrap_or(i64::MAX));
    }

    let offset = usize::try_from(query.offset).unwrap_or(usize::MAX);
    let page = matched
        .into_iter()
        .skip(offset)
        .take(query.limit as usize)
        .map(|row| UserView::from_row(row, with_roles));

    handler.set_handler_result(Payload::list(page));
    handler.serve(Ok::<(), Error>(()))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ctx: RequestContext,
) -> Response {
    let mut handler = Handler::prepare(&ctx);
    let with_roles = handler.is_embed("roles");

    let users = state.users.read().await;
    let found = decode_id(&id).and_then(|id| users.iter().find(|row| row.id == id));

    match found {
        Some(row) => {
            handler.set_handler_result(Payload::record(UserView::from_row(row, with_roles)));
            handler.serve(Ok::<(), Error>(()))
        }
        None => handler.serve(Err(Error::NotFound("record not found".to_string()))),
    }
}

async fn create_user(State(state): State<AppState>, ctx: RequestContext) -> Response {
    let (mut handler, request) = Handler::prepare_with::<CreateUser>(&ctx);
    let request = match request {
        Ok(request) => request,
        Err(e) => return handler.serve(Err(e)),
    };

    let mut users = state.users.write().await;
    if users.iter().any(|row| row.email == request.email) {
        handler.set_error_validate("email", "unique");
        return handler.serve(Ok::<(), Error>(()));
    }

    let row = UserRow {
        id: users.iter().map(|row| row.id).max().unwrap_or(0) + 1,
        name: request.name,
        email: request.email,
        active: true,
        roles: request.roles,
    };
    tracing::info!(id = row.id, "Created user");

    handler.set_created(Payload::record(UserView::from_row(&row, true)));
    users.push(row);

    handler.serve(Ok::<(), Error>(()))
}

async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ctx: RequestContext,
) -> Response {
    let (mut handler, request) = Handler::prepare_with::<UpdateUser>(&ctx);
    let request = match request {
        Ok(request) => request,
        Err(e) => return handler.serve(Err(e)),
    };

    if let Err(e) = handler.valid("id", &id, "required,encrypted") {
        return handler.serve(Err(e));
    }

    let mut users = state.users.write().await;
    let Some(row) = decode_id(&id).and_then(|id| users.iter_mut().find(|row| row.id == id)) else {
        return handler.serve(Err(Error::NotFound("record not found".to_string())));
    };

    // Only touch what the client sent
    if handler.has_input("name") {
        if let Some(name) = request.name {
            row.name = name;
        }
    }
    if handler.has_input("email") {
        if let Some(email) = request.email {
            row.email = email;
        }
    }
    if handler.has_input("active") {
        row.active = request.active;
    }

    handler.set_handler_result(Payload::record(UserView::from_row(row, false)));
    handler.serve(Ok::<(), Error>(()))
}

fn seed() -> Vec<UserRow> {
    vec![
        UserRow {
            id: 1,
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            active: true,
            roles: vec!["admin".to_string()],
        },
        UserRow {
            id: 2,
            name: "Bob".to_string(),
            email: "bob@example.com".to_string(),
            active: true,
            roles: vec!["editor".to_string()],
        },
    ]
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load_for_service("users_api")?;
    init_tracing(&config)?;

    let validator = Validator::new().with_rule("encrypted", rules::encrypted);
    let state = AppState {
        pipeline: Pipeline::from_config(&config, validator),
        users: Arc::new(RwLock::new(seed())),
    };

    let app = Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}", get(get_user).put(update_user))
        .with_state(state);

    Server::new(config).serve(app).await?;

    shutdown_tracing();
    Ok(())
}
