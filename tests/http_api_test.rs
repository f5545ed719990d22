mod common;

use common::{TestServer, token};
use loanlink::domain::ports::PaymentStore;
use loanlink::domain::user::Role;
use loanlink::error::GatewayError;
use reqwest::StatusCode;
use rust_decimal_macros::dec;
use serde_json::{Value, json};

const MANAGER: &str = "manager@example.com";
const ADMIN: &str = "admin@example.com";
const BORROWER: &str = "borrower@example.com";

async fn publish_loan(server: &TestServer, title: &str) -> Value {
    let response = server
        .client
        .post(server.url("/loans"))
        .bearer_auth(token(MANAGER))
        .json(&json!({
            "title": title,
            "description": "Fixed rate",
            "category": "housing",
            "interestRate": 4.5,
            "maxLimit": 250000,
            "showOnHome": true
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json().await.unwrap()
}

async fn apply(server: &TestServer, loan_id: &str) -> Value {
    let response = server
        .client
        .post(server.url("/applications"))
        .bearer_auth(token(BORROWER))
        .json(&json!({ "loanId": loan_id, "amount": 1200 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json().await.unwrap()
}

async fn checkout(server: &TestServer, application_id: &str, amount: Value) -> String {
    let response = server
        .client
        .post(server.url("/create-checkout-session"))
        .bearer_auth(token(BORROWER))
        .json(&json!({
            "amount": amount,
            "loanTitle": "Home Loan",
            "customerEmail": BORROWER,
            "loanId": application_id
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    let url = body["url"].as_str().unwrap().to_string();
    url.rsplit('/').next().unwrap().to_string()
}

async fn settle_callback(server: &TestServer, session_id: &str) -> reqwest::Response {
    server
        .client
        .patch(server.url(&format!("/payment-success?session_id={session_id}")))
        .bearer_auth(token(BORROWER))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_root_is_public() {
    let server = TestServer::spawn().await;
    let body = server
        .client
        .get(server.url("/"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "Server is running");
    server.stop().await;
}

#[tokio::test]
async fn test_checkout_and_settlement_flow() {
    let server = TestServer::spawn().await;
    server.seed_user(MANAGER, Role::Manager).await;

    let loan = publish_loan(&server, "Home Loan").await;
    assert_eq!(loan["createdBy"], json!(MANAGER));

    let application = apply(&server, loan["_id"].as_str().unwrap()).await;
    assert_eq!(application["status"], json!("pending"));
    assert_eq!(application["paymentStatus"], json!("unpaid"));
    let application_id = application["_id"].as_str().unwrap().to_string();

    let session_id = checkout(&server, &application_id, json!(19.999)).await;
    let requests = server.gateway.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].line_item.unit_amount_minor_units, 1999);
    assert_eq!(requests[0].metadata["loanId"], application_id);
    assert_eq!(requests[0].customer_email, BORROWER);

    // Returning before paying changes nothing.
    let body: Value = settle_callback(&server, &session_id).await.json().await.unwrap();
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["paymentStatus"], json!("unpaid"));

    assert!(server.gateway.settle(&session_id, "pi_flow").await);
    let response = settle_callback(&server, &session_id).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["modifiedApplication"]["matchedCount"], json!(1));
    assert_eq!(body["modifiedApplication"]["modifiedCount"], json!(1));
    assert_eq!(body["transactionId"], json!("pi_flow"));

    let repeat: Value = settle_callback(&server, &session_id).await.json().await.unwrap();
    assert_eq!(repeat["transactionId"], json!("pi_flow"));
    assert!(repeat.get("success").is_none());

    let record = server
        .stores
        .payments
        .find_by_transaction("pi_flow")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.amount, dec!(19.99));
    assert_eq!(record.application_id.as_deref(), Some(application_id.as_str()));

    let info: Value = server
        .client
        .get(server.url("/payment-info?transactionId=pi_flow"))
        .bearer_auth(token(BORROWER))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(info["loanTitle"], json!("Home Loan"));

    let mine: Value = server
        .client
        .get(server.url("/applications/mine"))
        .bearer_auth(token(BORROWER))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mine[0]["paymentStatus"], json!("paid"));
    assert_eq!(mine[0]["transactionId"], json!("pi_flow"));

    let payments: Value = server
        .client
        .get(server.url("/payments/mine"))
        .bearer_auth(token(BORROWER))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(payments.as_array().unwrap().len(), 1);

    server.stop().await;
}

#[tokio::test]
async fn test_concurrent_callbacks_record_once() {
    let server = TestServer::spawn().await;
    server.seed_user(MANAGER, Role::Manager).await;
    let loan = publish_loan(&server, "Car Loan").await;
    let application = apply(&server, loan["_id"].as_str().unwrap()).await;
    let session_id = checkout(&server, application["_id"].as_str().unwrap(), json!(50)).await;
    server.gateway.settle(&session_id, "pi_race").await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let client = server.client.clone();
        let url = server.url(&format!("/payment-success?session_id={session_id}"));
        handles.push(tokio::spawn(async move {
            let response = client
                .patch(url)
                .bearer_auth(token(BORROWER))
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            response.json::<Value>().await.unwrap()
        }));
    }

    let mut recorded = 0;
    for handle in handles {
        let body = handle.await.unwrap();
        assert_eq!(body["transactionId"], json!("pi_race"));
        if body["success"] == json!(true) {
            recorded += 1;
        }
    }
    assert_eq!(recorded, 1);
    assert_eq!(
        server.stores.payments.list_by_email(BORROWER).await.unwrap().len(),
        1
    );

    server.stop().await;
}

#[tokio::test]
async fn test_settlement_errors_carry_kind() {
    let server = TestServer::spawn().await;

    let response = settle_callback(&server, "cs_missing").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], json!("SessionNotFound"));

    server
        .gateway
        .set_outage(Some(GatewayError::Unavailable("connection refused".into())))
        .await;
    let response = settle_callback(&server, "cs_missing").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], json!("GatewayUnavailable"));

    let response = server
        .client
        .patch(server.url("/payment-success"))
        .bearer_auth(token(BORROWER))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let info = server
        .client
        .get(server.url("/payment-info?transactionId=pi_unknown"))
        .bearer_auth(token(BORROWER))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(info, "null");

    server.stop().await;
}

#[tokio::test]
async fn test_checkout_rejects_foreign_email_and_bad_amounts() {
    let server = TestServer::spawn().await;

    let response = server
        .client
        .post(server.url("/create-checkout-session"))
        .bearer_auth(token(BORROWER))
        .json(&json!({
            "amount": 10,
            "loanTitle": "Home Loan",
            "customerEmail": "someone.else@example.com",
            "loanId": "app_1"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = server
        .client
        .post(server.url("/create-checkout-session"))
        .bearer_auth(token(BORROWER))
        .json(&json!({ "amount": -5, "loanTitle": "Home Loan", "loanId": "app_1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(server.gateway.requests().await.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_authentication_and_role_gates() {
    let server = TestServer::spawn().await;
    server.seed_user(ADMIN, Role::Admin).await;

    let response = server
        .client
        .get(server.url("/applications/mine"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], json!("Unauthorized"));

    let response = server
        .client
        .get(server.url("/applications/mine"))
        .bearer_auth("not-a-token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let role: Value = server
        .client
        .get(server.url("/users/role"))
        .bearer_auth(token(BORROWER))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(role["role"], json!("user"));

    let response = server
        .client
        .post(server.url("/loans"))
        .bearer_auth(token(BORROWER))
        .json(&json!({ "title": "Sneaky", "interestRate": 1, "maxLimit": 10 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = server
        .client
        .get(server.url("/users"))
        .bearer_auth(token(BORROWER))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Admin promotes the borrower, who may then publish.
    let response = server
        .client
        .post(server.url("/users"))
        .bearer_auth(token(BORROWER))
        .json(&json!({ "name": "Bo" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = server
        .client
        .patch(server.url(&format!("/users/{BORROWER}/role")))
        .bearer_auth(token(ADMIN))
        .json(&json!({ "role": "manager" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = server
        .client
        .post(server.url("/loans"))
        .bearer_auth(token(BORROWER))
        .json(&json!({ "title": "Now Allowed", "interestRate": 1, "maxLimit": 10 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let users: Value = server
        .client
        .get(server.url("/users"))
        .bearer_auth(token(ADMIN))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(users.as_array().unwrap().len(), 2);

    server.stop().await;
}

#[tokio::test]
async fn test_application_decisions() {
    let server = TestServer::spawn().await;
    server.seed_user(MANAGER, Role::Manager).await;
    let loan = publish_loan(&server, "Student Loan").await;
    let loan_id = loan["_id"].as_str().unwrap();

    let first = apply(&server, loan_id).await;
    let second = apply(&server, loan_id).await;
    let first_id = first["_id"].as_str().unwrap();
    let second_id = second["_id"].as_str().unwrap();

    let response = server
        .client
        .patch(server.url(&format!("/applications/{first_id}/status")))
        .bearer_auth(token(MANAGER))
        .json(&json!({ "status": "approved" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = server
        .client
        .patch(server.url(&format!("/applications/{first_id}/status")))
        .bearer_auth(token(MANAGER))
        .json(&json!({ "status": "rejected" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], json!("InvalidTransition"));

    let response = server
        .client
        .patch(server.url(&format!("/applications/{second_id}/cancel")))
        .bearer_auth(token(MANAGER))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = server
        .client
        .patch(server.url(&format!("/applications/{second_id}/cancel")))
        .bearer_auth(token(BORROWER))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let approved: Value = server
        .client
        .get(server.url("/applications?status=approved"))
        .bearer_auth(token(MANAGER))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(approved.as_array().unwrap().len(), 1);
    assert_eq!(approved[0]["_id"], json!(first_id));

    let response = server
        .client
        .get(server.url("/applications"))
        .bearer_auth(token(BORROWER))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    server.stop().await;
}

#[tokio::test]
async fn test_public_loan_listing() {
    let server = TestServer::spawn().await;
    server.seed_user(MANAGER, Role::Manager).await;
    let loan = publish_loan(&server, "Business Loan").await;

    let all: Value = server
        .client
        .get(server.url("/loans"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all.as_array().unwrap().len(), 1);

    let home: Value = server
        .client
        .get(server.url("/loans/home"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(home[0]["title"], json!("Business Loan"));

    let id = loan["_id"].as_str().unwrap();
    let response = server
        .client
        .get(server.url(&format!("/loans/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = server
        .client
        .get(server.url("/loans/does-not-exist"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    server.stop().await;
}
