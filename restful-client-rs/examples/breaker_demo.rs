//! Circuit Breaker Demo
//!
//! This example shows how repeated failures take a service down and how
//! callers fall back while it is down. Responses come from a
//! `StubTransport`, so no network is needed.
//!
//! To run this example:
//! ```
//! RUST_LOG=debug cargo run --example breaker_demo
//! ```

use std::sync::Arc;
use std::time::Duration;

use restful_client::{
    error::Result, HealthOptions, MemoryReporter, Recover, RequestOptions, RestfulClient, ServiceConfig,
    StubTransport, TransportOutcome,
};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    println!("Circuit Breaker Demo");
    println!("====================\n");

    let stub = Arc::new(StubTransport::new());
    let reporter = Arc::new(MemoryReporter::new());

    let posts = ServiceConfig::new("http://localhost:8383/api/v1")
        .timeout(Duration::from_secs(1))
        .max_retries(2)
        .health(HealthOptions {
            max_errors: 3,
            ..HealthOptions::default()
        });

    let client = RestfulClient::builder()
        .service_config("posts", posts)
        .transport(stub.clone())
        .reporter(reporter.clone())
        .build()?;

    let url = client.endpoint_url("posts", "posts")?;

    // Step 1: a healthy call
    stub.stub_json(url.clone(), 200, &json!([{"id": 1, "title": "hello"}]));
    let result = client.get("posts", "posts", RequestOptions::new()).await?;
    println!("Healthy call returned: {:?}\n", result);

    // Step 2: the service starts timing out; each call retries twice
    stub.clear(&url);
    stub.stub(url.clone(), TransportOutcome::timed_out(Duration::from_secs(1)));

    for attempt in 1..=3 {
        let result = client
            .get("posts", "posts", RequestOptions::new())
            .await
            .or_recover(|message| Some(json!({ "fallback": message })));
        println!("Failing call {}: {:?}", attempt, result?);
    }

    println!("\nDispatched {} requests so far", stub.dispatch_count());

    // Step 3: the service is down, calls are refused without dispatch
    let result = client
        .get("posts", "posts", RequestOptions::new())
        .await
        .or_recover(|message| Some(json!({ "fallback": message })))?;
    println!("Call while down: {:?}", result);
    println!("Dispatched {} requests so far\n", stub.dispatch_count());

    println!("Reports:");
    for event in reporter.events() {
        println!("  [{}] {}", event.kind, event.description);
    }

    println!("\nMetrics:");
    let mut metrics: Vec<_> = client.metrics().as_map().into_iter().collect();
    metrics.sort();
    for (name, value) in metrics {
        println!("  {}: {}", name, value);
    }

    Ok(())
}
