use apiflow::prelude::*;
use apiflow::validation::rules;
use axum::body::Body;
use axum::http::Request;
use serde_json::{json, Value};
use tower::ServiceExt;
use validator::Validate;

#[derive(Debug, Serialize)]
struct Article {
    id_e: String,
    title: String,
    slug: String,
    created_at: String,
}

field_registry!(Article {
    IdE => id_e,
    Title => title,
    Slug => slug,
    CreatedAt => created_at,
});

#[derive(Debug, Deserialize, Validate)]
struct CreateArticle {
    #[validate(length(min = 3))]
    title: String,
    #[validate(length(min = 1))]
    slug: String,
}

field_set!(CreateArticle { Title, Slug });

#[derive(Debug, Deserialize, Validate)]
struct PatchArticle {
    title: Option<String>,
    #[serde(default)]
    published: bool,
}

field_set!(PatchArticle { Title, Published });

fn article(n: u32) -> Article {
    Article {
        id_e: (n << 16).to_string(),
        title: format!("Article {n}"),
        slug: format!("article-{n}"),
        created_at: "2024-05-01T00:00:00Z".to_string(),
    }
}

async fn list_articles(ctx: RequestContext) -> Response {
    let mut handler = Handler::prepare(&ctx);
    let query = handler.query_params().cloned().unwrap_or_default();

    if query.count {
        handler.set_total(3);
    }
    handler.set_handler_result(Payload::list((1..=3).map(article)));
    handler.serve(Ok::<(), Error>(()))
}

async fn echo_query(ctx: RequestContext) -> Response {
    let mut handler = Handler::prepare(&ctx);
    let query = handler.query_params().cloned().unwrap_or_default();
    handler.set_handler_result(Payload::raw(
        serde_json::to_value(&query).unwrap_or(Value::Null),
    ));
    handler.serve(Ok::<(), Error>(()))
}

async fn create_article(ctx: RequestContext) -> Response {
    let (mut handler, request) = Handler::prepare_with::<CreateArticle>(&ctx);
    let request = match request {
        Ok(request) => request,
        Err(e) => return handler.serve(Err(e)),
    };

    handler.set_created(Payload::record(Article {
        id_e: (4u32 << 16).to_string(),
        title: request.title,
        slug: request.slug,
        created_at: "2024-05-02T00:00:00Z".to_string(),
    }));
    handler.serve(Ok::<(), Error>(()))
}

async fn patch_article(Path(id): Path<String>, ctx: RequestContext) -> Response {
    let (mut handler, request) = Handler::prepare_with::<PatchArticle>(&ctx);
    if let Err(e) = request {
        return handler.serve(Err(e));
    }

    if let Err(e) = handler.valid("id", &id, "encrypted") {
        return handler.serve(Err(e));
    }

    let sent = handler.input_keys().to_vec();
    handler.set_handler_result(Payload::raw(json!({ "updated": sent })));
    handler.serve(Ok::<(), Error>(()))
}

async fn failing(ctx: RequestContext) -> Response {
    let mut handler = Handler::prepare(&ctx);
    handler.set_handler_result(Payload::record(article(1)));
    handler.serve(Err(Error::BadRequest("article is locked".to_string())))
}

fn app_with(pipeline: Pipeline) -> Router {
    let routes = Router::new()
        .route("/articles", get(list_articles).post(create_article))
        .route("/articles/{id}", patch(patch_article))
        .route("/query", get(echo_query))
        .route("/locked", get(failing))
        .with_state(pipeline);

    Server::new(Config::default()).router(routes)
}

fn app() -> Router {
    app_with(Pipeline::new(
        Validator::new().with_rule("encrypted", rules::encrypted),
    ))
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn read_json(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_list_success_envelope() {
    let response = app().oneshot(get_request("/articles")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["status"], "success");
    assert!(body.get("message").is_none());
    assert!(body.get("total").is_none());
    assert_eq!(body["data"].as_array().unwrap().len(), 3);
    assert_eq!(body["data"][0]["created_at"], "2024-05-01T00:00:00Z");
}

#[tokio::test]
async fn test_list_projection_with_unknown_field() {
    let response = app()
        .oneshot(get_request("/articles?field=id,title,nonexistent&count=true"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["total"], 3);
    assert_eq!(
        body["data"],
        json!([
            {"id_e": "65536", "title": "Article 1"},
            {"id_e": "131072", "title": "Article 2"},
            {"id_e": "196608", "title": "Article 3"}
        ])
    );
}

#[tokio::test]
async fn test_query_defaults_on_get() {
    let body = read_json(app().oneshot(get_request("/query")).await.unwrap()).await;
    assert_eq!(body["data"]["limit"], 10);
    assert_eq!(body["data"]["offset"], 0);
    assert_eq!(body["data"]["count"], false);
    for absent in ["sort", "fields", "embed", "ids"] {
        assert!(body["data"].get(absent).is_none(), "{absent} should be omitted");
    }
}

#[tokio::test]
async fn test_query_paging_and_sort() {
    let body = read_json(
        app()
            .oneshot(get_request("/query?page=2&per_page=5&sort=-created_at&embed=author"))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(body["data"]["offset"], 5);
    assert_eq!(body["data"]["limit"], 5);
    assert_eq!(body["data"]["sort"]["field"], "created_at");
    assert_eq!(body["data"]["sort"]["order"], "desc");
    assert_eq!(body["data"]["embed"], json!(["author"]));
}

#[tokio::test]
async fn test_create_returns_created() {
    let response = app()
        .oneshot(json_request(
            "POST",
            "/articles",
            json!({"title": "Hello world", "slug": "hello-world"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = read_json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["slug"], "hello-world");
}

#[tokio::test]
async fn test_create_with_two_validation_failures() {
    let response = app()
        .oneshot(json_request("POST", "/articles", json!({"title": "Hi", "slug": ""})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = read_json(response).await;
    assert_eq!(
        body,
        json!({
            "status": "fail",
            "message": "Validation Failed",
            "errors": [
                {"field": "slug", "message": "length"},
                {"field": "title", "message": "length"}
            ]
        })
    );
}

#[tokio::test]
async fn test_create_with_malformed_body() {
    let request = Request::builder()
        .method("POST")
        .uri("/articles")
        .header("content-type", "application/json")
        .body(Body::from("{\"title\":"))
        .unwrap();

    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = read_json(response).await;
    assert_eq!(body["status"], "fail");
    assert!(body.get("data").is_none());
    assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
}

#[tokio::test]
async fn test_patch_reports_sent_keys() {
    let response = app()
        .oneshot(json_request(
            "PATCH",
            "/articles/65536",
            json!({"published": false, "tags": ["x"]}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["data"], json!({"updated": ["published"]}));
}

#[tokio::test]
async fn test_patch_rejects_plain_id() {
    let response = app()
        .oneshot(json_request("PATCH", "/articles/abc", json!({"title": "New"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        read_json(response).await["errors"],
        json!([{"field": "id", "message": "encrypted"}])
    );
}

#[tokio::test]
async fn test_business_error_clears_data() {
    let response = app().oneshot(get_request("/locked")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        read_json(response).await,
        json!({"status": "fail", "message": "article is locked"})
    );
}

#[tokio::test]
async fn test_xml_envelope() {
    let app = app_with(Pipeline::default().with_format(ResponseFormat::Xml));
    let response = app
        .oneshot(get_request("/articles?field=title&per_page=1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/xml");

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let xml = String::from_utf8(body.to_vec()).unwrap();
    assert!(xml.starts_with("<response>"));
    assert!(xml.contains("<title>Article 1</title>"));
    assert!(!xml.contains("<slug>"));
}
