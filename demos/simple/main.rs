use std::sync::Arc;

use configcat_openfeature::{ConfigCatProvider, EvaluationContext, LocalClient, ProviderEvent};

const CONFIG: &str = r#"{
  "settings": {
    "isPOCFeatureEnabled": {
      "type": "boolean",
      "value": false,
      "variationId": "v-poc-off",
      "targetingRules": [
        {
          "conditions": [
            { "attribute": "Email", "operator": "MATCHES", "value": "@example\\.com$" }
          ],
          "value": true,
          "variationId": "v-poc-on"
        }
      ]
    }
  }
}"#;

#[tokio::main(flavor = "current_thread")]
async fn main() -> configcat_openfeature::Result<()> {
    // Configure env_logger to see provider logs.
    env_logger::Builder::from_env(env_logger::Env::new().default_filter_or("configcat")).init();

    let client = LocalClient::from_json(CONFIG)?;
    let provider = ConfigCatProvider::new(Arc::new(client));
    let mut events = provider.observe();

    let context = EvaluationContext::with_targeting_key("#SOME-USER-ID#")
        .with_attribute("Email", "configcat@example.com");
    provider.initialize(Some(&context)).await;

    if events.try_recv() == Some(ProviderEvent::Ready) {
        println!("provider is ready");
    }

    let evaluation = provider.get_boolean_evaluation("isPOCFeatureEnabled", false, None);
    println!(
        "{}",
        serde_json::to_string_pretty(&evaluation).unwrap_or_else(|err| err.to_string())
    );

    Ok(())
}
