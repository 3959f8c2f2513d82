mod common;

use axum::http::{Method, StatusCode};
use chrono::{Datelike, Duration, SecondsFormat, Utc};
use common::{dec, TestApp};
use rust_decimal::Decimal;
use serde_json::json;
use usage_billing_service::models::PlanTier;

fn range_query() -> String {
    let now = Utc::now();
    format!(
        "start={}&end={}",
        (now - Duration::hours(1)).to_rfc3339_opts(SecondsFormat::Secs, true),
        (now + Duration::hours(1)).to_rfc3339_opts(SecondsFormat::Secs, true),
    )
}

async fn seed_usage(app: &TestApp, brand: uuid::Uuid) {
    for body in [
        json!({ "metric": "renders_2d", "value": 3, "metadata": { "design": "a,b" } }),
        json!({ "metric": "renders_2d", "value": 5 }),
        json!({ "metric": "storage_gb", "value": "1.5" }),
    ] {
        let (status, _) = app.post("/usage", Some(brand), body).await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }
    app.wait_for_records(3).await;
}

#[tokio::test]
async fn monthly_report_for_the_current_month() {
    let app = TestApp::spawn().await;
    let brand = app.seed_brand(PlanTier::Starter, "FR").await;
    seed_usage(&app, brand).await;

    let (status, body) = app.get("/reports/monthly", Some(brand)).await;
    assert_eq!(status, StatusCode::OK);

    let today = Utc::now();
    assert_eq!(body["period"]["year"], today.year());
    assert_eq!(body["period"]["month"], today.month());
    assert_eq!(dec(&body["metric_totals"]["renders_2d"]), Decimal::from(8));
    assert_eq!(dec(&body["metric_totals"]["storage_gb"]), Decimal::new(15, 1));
    assert_eq!(body["daily_breakdown"].as_object().unwrap().len(), 1);
    assert_eq!(body["stats"]["total_records"], 3);
    assert_eq!(body["stats"]["days_active"], 1);
    assert_eq!(body["stats"]["metrics_used"], 2);
    assert_eq!(dec(&body["bill"]["total"]), Decimal::from(3480));

    let (status, body) = app
        .get("/reports/monthly?year=2021&month=2", Some(brand))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["total_records"], 0);
    assert_eq!(dec(&body["stats"]["average_daily"]), Decimal::ZERO);

    let (status, _) = app.get("/reports/monthly?month=13", Some(brand)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    app.shutdown().await;
}

#[tokio::test]
async fn csv_export_is_an_attachment() {
    let app = TestApp::spawn().await;
    let brand = app.seed_brand(PlanTier::Starter, "FR").await;
    seed_usage(&app, brand).await;

    let uri = format!("/reports/export?{}", range_query());
    let (status, bytes) = app.send(Method::GET, &uri, Some(brand), None).await;
    assert_eq!(status, StatusCode::OK);

    let csv = String::from_utf8(bytes).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "Date,Time,Metric,Value,Unit,Metadata");
    assert_eq!(lines.len(), 4);
    assert!(csv.contains(",storage_gb,1.5,GB,{}"));
    assert!(csv.contains(r#","{""design"":""a,b""}""#));

    let now = Utc::now();
    let backwards = format!(
        "/reports/export?start={}&end={}",
        now.to_rfc3339_opts(SecondsFormat::Secs, true),
        (now - Duration::days(1)).to_rfc3339_opts(SecondsFormat::Secs, true),
    );
    let (status, _) = app.get(&backwards, Some(brand)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.shutdown().await;
}

#[tokio::test]
async fn metric_detail_summarises_one_metric() {
    let app = TestApp::spawn().await;
    let brand = app.seed_brand(PlanTier::Starter, "FR").await;
    seed_usage(&app, brand).await;

    let uri = format!("/reports/metrics/renders_2d?{}", range_query());
    let (status, body) = app.get(&uri, Some(brand)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metric"], "renders_2d");
    assert_eq!(body["stats"]["count"], 2);
    assert_eq!(dec(&body["stats"]["total"]), Decimal::from(8));
    assert_eq!(dec(&body["stats"]["average"]), Decimal::from(4));
    assert_eq!(dec(&body["stats"]["max"]), Decimal::from(5));
    assert_eq!(dec(&body["stats"]["min"]), Decimal::from(3));
    assert_eq!(body["raw_records"].as_array().unwrap().len(), 2);

    let uri = format!("/reports/metrics/holograms?{}", range_query());
    let (status, _) = app.get(&uri, Some(brand)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.shutdown().await;
}

#[tokio::test]
async fn executive_summary_for_an_idle_brand() {
    let app = TestApp::spawn().await;
    let brand = app.seed_brand(PlanTier::Professional, "FR").await;

    let (status, body) = app.get("/reports/summary", Some(brand)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["brand"]["plan"], "professional");
    assert_eq!(body["projections"]["days"], 30);
    assert!(body["top_metrics"].as_array().unwrap().is_empty());
    assert_eq!(
        body["insights"],
        json!(["You haven't used any resources this month. Start creating!"])
    );

    app.shutdown().await;
}

#[tokio::test]
async fn executive_summary_flags_high_activity() {
    let app = TestApp::spawn().await;
    let brand = app.seed_brand(PlanTier::Business, "FR").await;

    for (metric, amount) in [("api_calls", 1500), ("renders_2d", 40)] {
        let (status, _) = app
            .post(
                "/usage/consume",
                Some(brand),
                json!({ "metric": metric, "amount": amount }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = app.get("/reports/summary", Some(brand)).await;
    assert_eq!(status, StatusCode::OK);

    let top = body["top_metrics"].as_array().unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0]["metric"], "api_calls");
    assert_eq!(dec(&body["current_period"]["usage"]["renders_2d"]), Decimal::from(40));
    assert!(body["insights"]
        .as_array()
        .unwrap()
        .iter()
        .any(|i| i == "High activity detected! Your platform is thriving."));

    app.shutdown().await;
}

#[tokio::test]
async fn monthly_report_covers_the_final_millisecond() {
    use chrono::TimeZone;
    use usage_billing_service::models::{Metric, UsageRecord};
    use usage_billing_service::services::UsageStore;

    let app = TestApp::spawn().await;
    let brand = app.seed_brand(PlanTier::Starter, "FR").await;

    let next_month = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
    for (value, timestamp) in [
        (2, next_month - Duration::microseconds(500)),
        (7, next_month),
    ] {
        let record = UsageRecord {
            timestamp,
            ..UsageRecord::new(brand, Metric::Renders2d, Decimal::from(value), None)
        };
        app.store.insert_usage(&record).await.unwrap();
    }

    let (status, body) = app
        .get("/reports/monthly?year=2025&month=1", Some(brand))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dec(&body["metric_totals"]["renders_2d"]), Decimal::from(2));
    assert_eq!(body["stats"]["total_records"], 1);

    let (_, body) = app
        .get("/reports/monthly?year=2025&month=2", Some(brand))
        .await;
    assert_eq!(dec(&body["metric_totals"]["renders_2d"]), Decimal::from(7));

    app.shutdown().await;
}
