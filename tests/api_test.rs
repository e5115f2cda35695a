mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use barbell::{
    api::create_app,
    domain::{MemberRole, PaymentStatus},
};
use common::*;
use serde_json::Value;
use tower::ServiceExt;

const BOUNDARY: &str = "barbell-test-boundary";

fn app(t: &TestContext) -> Router {
    create_app(t.ctx.clone(), Arc::new(t.settings.clone()))
}

async fn session_cookie(t: &TestContext, member_id: uuid::Uuid) -> anyhow::Result<String> {
    let (_session, token) = t.ctx.auth_service.create_session(member_id).await?;
    Ok(format!("session={}", token))
}

async fn json_body(response: axum::response::Response) -> anyhow::Result<Value> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn multipart_text(name: &str, value: &str) -> String {
    format!(
        "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
        BOUNDARY, name, value
    )
}

#[tokio::test]
async fn health_check_is_public() -> anyhow::Result<()> {
    let t = setup().await?;

    let response = app(&t)
        .oneshot(Request::builder().uri("/health").body(Body::empty())?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await?["status"], "healthy");
    Ok(())
}

#[tokio::test]
async fn protected_routes_require_session_and_role() -> anyhow::Result<()> {
    let t = setup().await?;
    let member = create_member(&t.pool, "member@example.com", MemberRole::Member).await?;
    let cookie = session_cookie(&t, member.id).await?;

    let anonymous = app(&t)
        .oneshot(Request::builder().uri("/api/v1/payments/my").body(Body::empty())?)
        .await?;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(anonymous).await?;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Unauthorized");

    let mine = app(&t)
        .oneshot(
            Request::builder()
                .uri("/api/v1/payments/my")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(mine.status(), StatusCode::OK);
    let body = json_body(mine).await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"], serde_json::json!([]));

    let details = app(&t)
        .oneshot(
            Request::builder()
                .uri("/api/v1/bank-transfers/account-details")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(details.status(), StatusCode::OK);
    let body = json_body(details).await?;
    assert_eq!(body["data"]["account_name"], t.settings.bank.account_name.as_str());

    let admin_only = app(&t)
        .oneshot(
            Request::builder()
                .uri("/api/v1/reports/overview")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(admin_only.status(), StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn login_sets_session_cookie() -> anyhow::Result<()> {
    let t = setup().await?;
    create_member(&t.pool, "member@example.com", MemberRole::Member).await?;

    let response = app(&t)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"email":"member@example.com","password":"password123"}"#,
                ))?,
        )
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(cookie.starts_with("session="));
    assert!(cookie.contains("HttpOnly"));

    let body = json_body(response).await?;
    assert_eq!(body["data"]["email"], "member@example.com");
    assert!(body["data"].get("password_hash").is_none());

    let wrong = app(&t)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"email":"member@example.com","password":"nope"}"#))?,
        )
        .await?;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn bank_transfer_upload_without_file_is_rejected() -> anyhow::Result<()> {
    let t = setup().await?;
    let member = create_member(&t.pool, "member@example.com", MemberRole::Member).await?;
    let membership = create_pending_membership(&t.pool, member.id, 750000).await?;
    let cookie = session_cookie(&t, member.id).await?;

    let body = format!(
        "{}{}--{}--\r\n",
        multipart_text("membership_id", &membership.id.to_string()),
        multipart_text("amount_cents", "750000"),
        BOUNDARY
    );

    let response = app(&t)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/bank-transfers")
                .header(header::COOKIE, &cookie)
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .body(Body::from(body))?,
        )
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await?;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "No file uploaded");

    let (transfers,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bank_transfers")
        .fetch_one(&t.pool)
        .await?;
    let (payments,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM payments")
        .fetch_one(&t.pool)
        .await?;
    assert_eq!((transfers, payments), (0, 0));

    Ok(())
}

#[tokio::test]
async fn bank_transfer_upload_with_receipt_is_created() -> anyhow::Result<()> {
    let t = setup().await?;
    let member = create_member(&t.pool, "member@example.com", MemberRole::Member).await?;
    let membership = create_pending_membership(&t.pool, member.id, 750000).await?;
    let cookie = session_cookie(&t, member.id).await?;

    let mut body = format!(
        "{}{}--{}\r\nContent-Disposition: form-data; name=\"receipt\"; filename=\"slip.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n",
        multipart_text("membership_id", &membership.id.to_string()),
        multipart_text("amount_cents", "750000"),
        BOUNDARY
    )
    .into_bytes();
    body.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    let response = app(&t)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/bank-transfers")
                .header(header::COOKIE, &cookie)
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .body(Body::from(body))?,
        )
        .await?;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "Pending");
    let receipt_url = body["data"]["receipt_url"].as_str().unwrap_or_default().to_string();
    assert!(receipt_url.starts_with("uploads/receipts/") && receipt_url.ends_with(".jpg"));

    // The stored receipt is served back under /uploads
    let served = app(&t)
        .oneshot(
            Request::builder()
                .uri(format!("/{}", receipt_url))
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(served.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn dev_completion_is_hidden_outside_development() -> anyhow::Result<()> {
    let t = setup_in("production").await?;
    let member = create_member(&t.pool, "member@example.com", MemberRole::Member).await?;
    let payment = completed_payment(&t.pool, member.id, 5000).await?;
    let cookie = session_cookie(&t, member.id).await?;

    let response = app(&t)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/payments/dev/complete")
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(format!(
                    r#"{{"transaction_id":"{}"}}"#,
                    payment.transaction_id
                )))?,
        )
        .await?;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn dev_completion_settles_in_development() -> anyhow::Result<()> {
    let t = setup().await?;
    let member = create_member(&t.pool, "member@example.com", MemberRole::Member).await?;
    let membership = create_pending_membership(&t.pool, member.id, 750000).await?;
    let cookie = session_cookie(&t, member.id).await?;

    let checkout = app(&t)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/payments/checkout")
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::json!({
                        "amount_cents": 750000,
                        "payment_type": "Membership",
                        "related_id": membership.id,
                        "customer": customer(),
                    })
                    .to_string(),
                ))?,
        )
        .await?;
    assert_eq!(checkout.status(), StatusCode::CREATED);
    let checkout = json_body(checkout).await?;
    let transaction_id = checkout["data"]["payment"]["transaction_id"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    assert!(checkout["data"]["checkout"]["html"]
        .as_str()
        .unwrap_or_default()
        .contains(&transaction_id));

    let response = app(&t)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/payments/dev/complete")
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(format!(
                    r#"{{"transaction_id":"{}","outcome":"Completed"}}"#,
                    transaction_id
                )))?,
        )
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(body["data"]["outcome"], "Settled");
    assert_eq!(body["data"]["membership_activated"], true);

    Ok(())
}

#[tokio::test]
async fn payhere_notify_accepts_form_posts() -> anyhow::Result<()> {
    let t = setup().await?;
    let member = create_member(&t.pool, "member@example.com", MemberRole::Member).await?;
    let payment = completed_payment(&t.pool, member.id, 5000).await?;
    // Put it back to pending so the callback has something to do
    sqlx::query("UPDATE payments SET status = 'Pending', paid_at = NULL WHERE id = ?")
        .bind(payment.id.to_string())
        .execute(&t.pool)
        .await?;

    let n = signed_notification(&payment, 2);
    let form = format!(
        "merchant_id={}&order_id={}&payment_id=320025071278&payhere_amount={}&payhere_currency={}&status_code={}&md5sig={}",
        n.merchant_id, n.order_id, n.payhere_amount, n.payhere_currency, n.status_code, n.md5sig
    );

    let response = app(&t)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/payments/payhere/notify")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form))?,
        )
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["outcome"], "Settled");
    assert_eq!(
        find_payment(&t.pool, payment.id).await?.status,
        PaymentStatus::Completed
    );

    let tampered = app(&t)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/payments/payhere/notify")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(format!(
                    "merchant_id={}&order_id={}&payhere_amount={}&payhere_currency={}&status_code=2&md5sig=00000000000000000000000000000000",
                    n.merchant_id, n.order_id, n.payhere_amount, n.payhere_currency
                )))?,
        )
        .await?;
    assert_eq!(tampered.status(), StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn admin_can_read_reports_and_review() -> anyhow::Result<()> {
    let t = setup().await?;
    let member = create_member(&t.pool, "member@example.com", MemberRole::Member).await?;
    let admin = create_member(&t.pool, "admin@example.com", MemberRole::Admin).await?;
    let payment = completed_payment(&t.pool, member.id, 1000).await?;
    let request = t
        .ctx
        .refund_service
        .submit(
            member.id,
            barbell::domain::CreateRefundRequest {
                payment_id: payment.id,
                requested_cents: 250,
                notes: None,
            },
        )
        .await?;
    let cookie = session_cookie(&t, admin.id).await?;

    let approve = app(&t)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/v1/refund-requests/{}/approve", request.id))
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"admin_notes":"ok"}"#))?,
        )
        .await?;
    assert_eq!(approve.status(), StatusCode::OK);
    assert_eq!(json_body(approve).await?["data"]["status"], "Approved");

    let overview = app(&t)
        .oneshot(
            Request::builder()
                .uri("/api/v1/reports/overview")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(overview.status(), StatusCode::OK);
    let body = json_body(overview).await?;
    assert_eq!(body["data"]["completed_gross_cents"], 1000);
    assert_eq!(body["data"]["refunded_cents"], 250);
    assert_eq!(body["data"]["net_cents"], 750);

    let listing = app(&t)
        .oneshot(
            Request::builder()
                .uri("/api/v1/payments?status=Completed")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(listing.status(), StatusCode::OK);
    assert_eq!(json_body(listing).await?["data"].as_array().map(Vec::len), Some(1));

    Ok(())
}
