use std::sync::Arc;

use adsweep_core::config::Config;
use adsweep_openai::OpenAiClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    adsweep_core::logging::init("adsweep")?;

    let cfg = Arc::new(Config::load()?);

    let completion = Arc::new(OpenAiClient::new(
        cfg.openai_api_key.clone(),
        cfg.openai_url.clone(),
        cfg.openai_model.clone(),
    ));

    if let Err(e) = adsweep_telegram::router::run_polling(cfg, completion).await {
        tracing::error!(error = %e, "telegram bot failed");
        return Err(e);
    }

    Ok(())
}
