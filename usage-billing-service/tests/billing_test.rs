mod common;

use axum::http::StatusCode;
use common::{dec, TestApp};
use rust_decimal::Decimal;
use serde_json::json;
use usage_billing_service::models::PlanTier;

#[tokio::test]
async fn empty_month_bills_base_price_plus_tax() {
    let app = TestApp::spawn().await;
    let brand = app.seed_brand(PlanTier::Starter, "FR").await;

    let (status, body) = app.get("/billing/current", Some(brand)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["plan"], "starter");
    assert_eq!(dec(&body["subtotal"]), Decimal::from(2900));
    assert_eq!(dec(&body["tax"]), Decimal::from(580));
    assert_eq!(dec(&body["total"]), Decimal::from(3480));
    assert_eq!(body["breakdown"].as_array().unwrap().len(), 7);

    app.shutdown().await;
}

#[tokio::test]
async fn us_brands_pay_no_tax() {
    let app = TestApp::spawn().await;
    let brand = app.seed_brand(PlanTier::Business, "US").await;

    let (_, body) = app.get("/billing/current", Some(brand)).await;
    assert_eq!(dec(&body["tax"]), Decimal::ZERO);
    assert_eq!(dec(&body["total"]), Decimal::from(29_900));

    app.shutdown().await;
}

#[tokio::test]
async fn overage_is_billed() {
    let app = TestApp::spawn().await;
    let brand = app.seed_brand(PlanTier::Starter, "FR").await;

    app.post(
        "/usage/consume",
        Some(brand),
        json!({ "metric": "renders_2d", "amount": 120 }),
    )
    .await;

    let (_, body) = app.get("/billing/current", Some(brand)).await;
    assert_eq!(dec(&body["overage_costs"]["renders_2d"]), Decimal::from(400));
    assert_eq!(dec(&body["total_overage_cost"]), Decimal::from(400));
    assert_eq!(dec(&body["subtotal"]), Decimal::from(3300));
    assert_eq!(dec(&body["total"]), Decimal::from(3960));

    app.shutdown().await;
}

#[tokio::test]
async fn estimate_prices_the_next_action() {
    let app = TestApp::spawn().await;
    let brand = app.seed_brand(PlanTier::Starter, "FR").await;

    app.post(
        "/usage/consume",
        Some(brand),
        json!({ "metric": "renders_2d", "amount": 95 }),
    )
    .await;

    let (status, body) = app
        .get("/billing/estimate?metric=renders_2d&quantity=10", Some(brand))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["will_exceed"], true);
    assert_eq!(dec(&body["current_usage"]), Decimal::from(95));
    assert_eq!(dec(&body["overage_amount"]), Decimal::from(5));
    assert_eq!(dec(&body["estimated_cost"]), Decimal::from(100));
    assert_eq!(dec(&body["total_after"]), Decimal::from(3580));

    let (status, _) = app
        .get("/billing/estimate?metric=renders_2d&quantity=-1", Some(brand))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    app.shutdown().await;
}

#[tokio::test]
async fn projection_extrapolates_the_last_week() {
    let app = TestApp::spawn().await;
    let brand = app.seed_brand(PlanTier::Starter, "FR").await;

    app.post(
        "/usage/consume",
        Some(brand),
        json!({ "metric": "renders_2d", "amount": 120 }),
    )
    .await;

    let (status, body) = app.get("/billing/projection?days=7", Some(brand)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["days"], 7);
    assert_eq!(dec(&body["projected_usage"]["renders_2d"]), Decimal::from(120));
    assert_eq!(dec(&body["projected_overage"]), Decimal::from(400));
    assert_eq!(dec(&body["projected_monthly"]), Decimal::from(3300));
    assert_eq!(
        body["recommendations"][0],
        "renders_2d will reach 120% of quota. Consider upgrading."
    );

    let (status, body) = app.get("/billing/projection", Some(brand)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["days"], 30);

    let (status, _) = app.get("/billing/projection?days=0", Some(brand)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    app.shutdown().await;
}

#[tokio::test]
async fn comparison_ranks_plans_by_total() {
    let app = TestApp::spawn().await;
    let brand = app.seed_brand(PlanTier::Starter, "FR").await;

    app.post(
        "/usage/consume",
        Some(brand),
        json!({ "metric": "renders_2d", "amount": 600 }),
    )
    .await;

    let (status, body) = app.get("/billing/compare", Some(brand)).await;
    assert_eq!(status, StatusCode::OK);
    let plans = body.as_array().unwrap();
    assert_eq!(plans.len(), 4);

    assert_eq!(plans[0]["plan"], "professional");
    assert_eq!(dec(&plans[0]["total"]), Decimal::from(11_400));
    assert_eq!(plans[0]["recommendation"], "Best value for your usage");

    assert_eq!(plans[1]["plan"], "starter");
    assert_eq!(dec(&plans[1]["savings"]), Decimal::from(1500));
    assert_eq!(plans[1]["recommendation"], "Acceptable alternative");

    assert_eq!(plans[3]["plan"], "enterprise");
    assert_eq!(plans[3]["recommendation"], "Significantly more expensive");

    app.shutdown().await;
}

#[tokio::test]
async fn tax_rate_lookup() {
    let app = TestApp::spawn().await;

    let (status, body) = app.get("/billing/tax-rate/de", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["country"], "DE");
    assert_eq!(dec(&body["tax_rate"]), Decimal::new(19, 2));

    let (_, body) = app.get("/billing/tax-rate/JP", None).await;
    assert_eq!(dec(&body["tax_rate"]), Decimal::new(20, 2));

    app.shutdown().await;
}
