use std::{sync::Arc, time::Duration};

use postbridge::{
    init_logging, transport::memory, ChannelClient, ChannelService, Settings, StackError,
};
use serde_json::{json, Value};
use tracing::{info, warn};

/// Демонстрационный хост: сервис с назначениями `add` и `ticks` и один
/// клиент в том же процессе. Настройки берутся из `POSTBRIDGE__*`.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load()?;
    init_logging(&settings.logging)?;

    let (endpoint, connector) = memory::channel();
    let service = Arc::new(
        ChannelService::builder()
            .config(settings.service.clone())
            .bind(endpoint),
    );

    service.listen("add", |body: Value| -> Result<Value, StackError> {
        let a = body["a"].as_i64().ok_or("field `a` must be an integer")?;
        let b = body["b"].as_i64().ok_or("field `b` must be an integer")?;
        Ok(json!(a + b))
    });
    service.observe_with("ticks", || -> Result<(), StackError> {
        info!("New ticks subscriber");
        Ok(())
    });

    let runner = tokio::spawn({
        let service = service.clone();
        async move { service.run().await }
    });

    let client = ChannelClient::connect(&connector, settings.client.clone());
    let sum = client.request("add", json!({"a": 2, "b": 3})).await?;
    info!(%sum, "add(2, 3)");

    if let Err(e) = client.request("add", json!({"a": 2})).await {
        warn!(error = %e, "Expected rejection");
    }

    let mut ticks = client.subscribe("ticks").await?;
    for n in 0..3 {
        service.broadcast("ticks", json!({ "n": n }));
    }
    for _ in 0..3 {
        if let Some(event) = ticks.recv().await {
            info!(request_id = %event.request_id, body = %event.body, "Tick");
        }
    }
    client.unsubscribe("ticks").await?;

    service.finish();
    tokio::time::timeout(Duration::from_secs(1), runner).await??;
    Ok(())
}
