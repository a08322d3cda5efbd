use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use till_api::startup::build_router;
use till_api::AppState;
use till_core::{Money, NewPaymentMethod, NewProduct};
use till_db::{Database, DbConfig};

const CASHIER: &str = "cashier-1";

struct TestApp {
    router: Router,
    cash_id: String,
    card_id: String,
    cap_id: String,
}

async fn spawn_app() -> TestApp {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();

    let cash = db
        .payment_methods()
        .insert(&NewPaymentMethod {
            name: "Efectivo".to_string(),
            code: "CASH".to_string(),
            description: None,
        })
        .await
        .unwrap();
    let card = db
        .payment_methods()
        .insert(&NewPaymentMethod {
            name: "Tarjeta de Crédito".to_string(),
            code: "CREDIT".to_string(),
            description: None,
        })
        .await
        .unwrap();
    let cap = db
        .products()
        .insert(&NewProduct {
            name: "Cap".to_string(),
            sale_price: Money::from_cents(5_000),
            quantity: 10,
            ..Default::default()
        })
        .await
        .unwrap();

    TestApp {
        router: build_router(AppState::new(db)),
        cash_id: cash.id,
        card_id: card.id,
        cap_id: cap.id,
    }
}

impl TestApp {
    async fn send(&self, method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("X-User-ID", user);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn sale_body(&self, quantity: i64, payments: &[(&str, i64)]) -> Value {
        json!({
            "items": [{ "productId": self.cap_id, "quantity": quantity }],
            "paymentDetails": payments
                .iter()
                .map(|(method, amount)| json!({ "paymentMethod": method, "amount": amount }))
                .collect::<Vec<_>>(),
        })
    }
}

#[tokio::test]
async fn health_check_works() {
    let app = spawn_app().await;
    let (status, body) = app.send("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn payment_methods_lists_active() {
    let app = spawn_app().await;
    let (status, body) = app.send("GET", "/payment-methods", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["paymentMethods"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn create_sale_requires_cashier() {
    let app = spawn_app().await;
    let body = app.sale_body(1, &[(app.cash_id.as_str(), 5_000)]);
    let (status, body) = app.send("POST", "/sales", None, Some(body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn full_drawer_flow() {
    let app = spawn_app().await;

    let (status, body) = app
        .send("POST", "/pos-sessions/open", Some(CASHIER), Some(json!({ "initialCash": 10_000 })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let session_id = body["session"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["session"]["status"], "open");

    let (status, body) = app
        .send("POST", "/pos-sessions/open", Some(CASHIER), Some(json!({ "initialCash": 0 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "OPEN_SESSION_EXISTS");

    let sale = app.sale_body(1, &[(app.cash_id.as_str(), 6_000)]);
    let (status, body) = app.send("POST", "/sales", Some(CASHIER), Some(sale)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["addedToSession"], true);
    assert_eq!(body["sale"]["totalAmount"], 5_000);
    assert_eq!(body["sale"]["changeAmount"], 1_000);
    let sale_id = body["sale"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .send("GET", &format!("/pos-sessions/user/{CASHIER}/open"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hasOpenSession"], true);
    assert_eq!(body["session"]["expectedCash"], 15_000);

    let (status, body) = app
        .send("GET", &format!("/pos-sessions/{session_id}"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sales"][0]["id"], sale_id.as_str());

    let (status, body) = app
        .send(
            "POST",
            "/pos-sessions/close",
            Some("cashier-2"),
            Some(json!({ "sessionId": session_id, "actualCash": 14_000 })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "NOT_OWNER");

    let (status, body) = app
        .send(
            "POST",
            "/pos-sessions/close",
            Some(CASHIER),
            Some(json!({ "sessionId": session_id, "actualCash": 14_000, "notes": "short" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session"]["status"], "closed");
    assert_eq!(body["session"]["expectedCash"], 15_000);
    assert_eq!(body["session"]["cashDifference"], -1_000);
    assert_eq!(body["session"]["notes"], "short");

    let (status, body) = app
        .send(
            "POST",
            "/pos-sessions/close",
            Some(CASHIER),
            Some(json!({ "sessionId": session_id, "actualCash": 14_000 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "ALREADY_CLOSED");

    let (status, body) = app
        .send("GET", &format!("/pos-sessions/user/{CASHIER}/open"), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["hasOpenSession"], false);

    let (status, body) = app
        .send("GET", "/pos-sessions?status=closed&page=1&limit=5", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["pagination"]["limit"], 5);

    let (status, body) = app.send("GET", "/pos-sessions?search=SHORT", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["sessions"][0]["notes"], "short");

    let (_, body) = app.send("GET", "/pos-sessions?search=jammed", None, None).await;
    assert_eq!(body["pagination"]["total"], 0);
}

#[tokio::test]
async fn sale_errors_map_to_status_codes() {
    let app = spawn_app().await;

    let (status, body) = app
        .send("POST", "/sales", Some(CASHIER), Some(json!({ "items": [], "paymentDetails": [] })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_ITEMS");

    let missing = json!({
        "items": [{ "productId": "nope", "quantity": 1 }],
        "paymentDetails": [{ "paymentMethod": app.cash_id, "amount": 100 }],
    });
    let (status, body) = app.send("POST", "/sales", Some(CASHIER), Some(missing)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["msg"], "Product not found: nope");

    let short = app.sale_body(1, &[(app.card_id.as_str(), 4_000)]);
    let (status, body) = app.send("POST", "/sales", Some(CASHIER), Some(short)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INSUFFICIENT_PAYMENT");

    let huge = app.sale_body(1, &[(app.cash_id.as_str(), i64::MAX), (app.card_id.as_str(), i64::MAX)]);
    let (status, body) = app.send("POST", "/sales", Some(CASHIER), Some(huge)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_PAYMENT_AMOUNT");

    let too_many = app.sale_body(11, &[(app.cash_id.as_str(), 55_000)]);
    let (status, body) = app.send("POST", "/sales", Some(CASHIER), Some(too_many)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INSUFFICIENT_STOCK");

    let (status, body) = app.send("GET", "/sales/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "SALE_NOT_FOUND");

    let request = Request::builder()
        .method("POST")
        .uri("/sales")
        .header("X-User-ID", CASHIER)
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_and_list_sales() {
    let app = spawn_app().await;

    let sale = app.sale_body(2, &[(app.cash_id.as_str(), 10_000)]);
    let (_, body) = app.send("POST", "/sales", Some(CASHIER), Some(sale)).await;
    let sale_id = body["sale"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["addedToSession"], false);

    let edit = app.sale_body(3, &[(app.cash_id.as_str(), 10_000), (app.card_id.as_str(), 5_000)]);
    let (status, body) = app
        .send("PUT", &format!("/sales/{sale_id}"), Some(CASHIER), Some(edit))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sale"]["totalAmount"], 15_000);
    assert_eq!(body["sale"]["paymentDetails"].as_array().unwrap().len(), 2);

    let (status, body) = app
        .send("GET", &format!("/sales?cashierId={CASHIER}"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["sales"][0]["items"][0]["quantity"], 3);
}

#[tokio::test]
async fn session_notes_and_validation() {
    let app = spawn_app().await;

    let (status, body) = app
        .send("POST", "/pos-sessions/open", Some(CASHIER), Some(json!({ "initialCash": -5 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INITIAL_CASH");

    let (status, body) = app
        .send("POST", "/pos-sessions/open", Some(CASHIER), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (_, body) = app
        .send("POST", "/pos-sessions/open", Some(CASHIER), Some(json!({ "initialCash": 0 })))
        .await;
    let session_id = body["session"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(
            "PUT",
            &format!("/pos-sessions/{session_id}"),
            Some(CASHIER),
            Some(json!({ "notes": "drawer jammed" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session"]["notes"], "drawer jammed");

    let (status, _) = app.send("GET", "/pos-sessions/missing", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn discounts_accept_percent_value() {
    let app = spawn_app().await;

    let sale = json!({
        "items": [{
            "productId": app.cap_id,
            "quantity": 2,
            "discounts": [{ "type": "percentage", "value": 10, "reason": "10% discount" }],
        }],
        "paymentDetails": [{ "paymentMethod": app.cash_id, "amount": 9_000 }],
    });
    let (status, body) = app.send("POST", "/sales", Some(CASHIER), Some(sale)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["sale"]["totalAmount"], 9_000);
    assert_eq!(body["sale"]["items"][0]["discounts"][0]["bps"], 1_000);

    let over = json!({
        "items": [{
            "productId": app.cap_id,
            "quantity": 1,
            "discounts": [{ "type": "percentage", "value": 150 }],
        }],
        "paymentDetails": [{ "paymentMethod": app.cash_id, "amount": 5_000 }],
    });
    let (status, body) = app.send("POST", "/sales", Some(CASHIER), Some(over)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_REQUEST");
}
