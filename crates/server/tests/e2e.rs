use std::net::SocketAddr;
use std::sync::Arc;

use reqwest::StatusCode as HttpStatusCode;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use uuid::Uuid;

use server::startup;
use service::storage::{DocumentStore, LocalDocumentStore};

struct TestApp {
    base_url: String,
}

async fn start_with(store: Arc<dyn DocumentStore>) -> anyhow::Result<TestApp> {
    let app = startup::build_app(store);
    let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await?;
    let addr: SocketAddr = listener.local_addr()?;
    let base_url = format!("http://{}:{}", addr.ip(), addr.port());

    tokio::spawn(async move {
        if let Err(e) = startup::serve(listener, app, std::future::pending()).await { eprintln!("server error: {}", e); }
    });

    Ok(TestApp { base_url })
}

async fn start_server() -> anyhow::Result<TestApp> {
    start_with(Arc::new(LocalDocumentStore::in_memory())).await
}

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

async fn metrics(c: &reqwest::Client, app: &TestApp) -> anyhow::Result<Value> {
    let res = c.get(format!("{}/get-metrics", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    Ok(res.json::<Value>().await?)
}

#[tokio::test]
async fn e2e_root_liveness() -> anyhow::Result<()> {
    let app = start_server().await?;
    let res = client().get(format!("{}/", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    assert_eq!(res.text().await?, "API Successfully Connected 🚀");
    Ok(())
}

#[tokio::test]
async fn e2e_public_health() -> anyhow::Result<()> {
    let app = start_server().await?;
    let res = client().get(format!("{}/health", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn e2e_add_then_list() -> anyhow::Result<()> {
    let app = start_server().await?;
    let c = client();

    let res = c.post(format!("{}/add-metric", app.base_url))
        .json(&json!({"name": "cpu", "values": {"pct": 42}}))
        .send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    assert_eq!(res.json::<Value>().await?, json!({"message": "Metric successfully saved"}));

    let all = metrics(&c, &app).await?;
    let cpu = all["cpu"].as_object().expect("cpu entry");
    assert_eq!(cpu.len(), 2);
    assert_eq!(cpu["pct"], json!(42));
    let date = cpu["date"].as_str().expect("date string");
    assert!(chrono::DateTime::parse_from_rfc3339(date).is_ok());
    assert!(date.ends_with('Z'));
    Ok(())
}

#[tokio::test]
async fn e2e_update_keeps_original_date() -> anyhow::Result<()> {
    let app = start_server().await?;
    let c = client();

    c.post(format!("{}/add-metric", app.base_url))
        .json(&json!({"name": "cpu", "values": {"pct": 42, "host": "web-1"}}))
        .send().await?;
    let before = metrics(&c, &app).await?["cpu"]["date"].clone();

    let res = c.put(format!("{}/update-metric/cpu", app.base_url))
        .json(&json!({"values": {"pct": 55}}))
        .send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    assert_eq!(res.json::<Value>().await?, json!({"message": "Metric successfully updated"}));

    let all = metrics(&c, &app).await?;
    assert_eq!(all["cpu"]["pct"], json!(55));
    assert_eq!(all["cpu"]["host"], json!("web-1"));
    assert_eq!(all["cpu"]["date"], before);
    Ok(())
}

#[tokio::test]
async fn e2e_delete_twice_yields_404() -> anyhow::Result<()> {
    let app = start_server().await?;
    let c = client();

    c.post(format!("{}/add-metric", app.base_url))
        .json(&json!({"name": "cpu", "values": {"pct": 42}}))
        .send().await?;

    let res = c.delete(format!("{}/delete-metric/cpu", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    assert_eq!(res.json::<Value>().await?, json!({"message": "Metric successfully deleted"}));

    let res = c.delete(format!("{}/delete-metric/cpu", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::NOT_FOUND);
    assert_eq!(res.json::<Value>().await?, json!({"error": "Metric not found"}));

    let res = c.put(format!("{}/update-metric/cpu", app.base_url))
        .json(&json!({"values": {"pct": 1}}))
        .send().await?;
    assert_eq!(res.status(), HttpStatusCode::NOT_FOUND);
    assert_eq!(metrics(&c, &app).await?, json!({}));
    Ok(())
}

#[tokio::test]
async fn e2e_add_with_empty_body_is_400() -> anyhow::Result<()> {
    let app = start_server().await?;
    let res = client().post(format!("{}/add-metric", app.base_url))
        .json(&json!({}))
        .send().await?;
    assert_eq!(res.status(), HttpStatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?, json!({"error": "Missing data"}));
    Ok(())
}

#[tokio::test]
async fn e2e_replace_drops_old_fields() -> anyhow::Result<()> {
    let app = start_server().await?;
    let c = client();
    for values in [json!({"pct": 42, "host": "a"}), json!({"pct": 43})] {
        let res = c.post(format!("{}/add-metric", app.base_url))
            .json(&json!({"name": "cpu", "values": values}))
            .send().await?;
        assert_eq!(res.status(), HttpStatusCode::OK);
    }
    let all = metrics(&c, &app).await?;
    assert_eq!(all["cpu"]["pct"], json!(43));
    assert!(all["cpu"].get("host").is_none());
    Ok(())
}

#[tokio::test]
async fn e2e_names_with_spaces_round_trip_through_the_path() -> anyhow::Result<()> {
    let app = start_server().await?;
    let c = client();
    c.post(format!("{}/add-metric", app.base_url))
        .json(&json!({"name": "load avg", "values": {"one": 0.5}}))
        .send().await?;
    let res = c.delete(format!("{}/delete-metric/load%20avg", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn e2e_file_backend_persists_across_restarts() -> anyhow::Result<()> {
    let path = std::env::temp_dir().join(format!("e2e_metrics_{}.json", Uuid::new_v4()));
    let c = client();

    let app = start_with(Arc::new(LocalDocumentStore::open(&path).await?)).await?;
    c.post(format!("{}/add-metric", app.base_url))
        .json(&json!({"name": "mem", "values": {"used": 1024}}))
        .send().await?;

    let restarted = start_with(Arc::new(LocalDocumentStore::open(&path).await?)).await?;
    let all = metrics(&c, &restarted).await?;
    assert_eq!(all["mem"]["used"], json!(1024));

    let _ = tokio::fs::remove_file(&path).await;
    Ok(())
}
