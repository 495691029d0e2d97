use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use imessage_agent::bot::Orchestrator;
use imessage_agent::config::BotConfig;
use imessage_agent::imessage::{ChatDbSource, OsascriptSink};
use imessage_agent::llm::{CompletionProvider, LlmClient, PlanningProvider};
use imessage_agent::plan::ResponseGate;
use imessage_agent::responder::Responder;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,imessage_agent=debug")),
        )
        .init();

    let config = BotConfig::load();
    config.validate()?;

    tracing::info!(
        "starting agent '{}' watching chat '{}' (model: {})",
        config.bot_name,
        config.chat_name,
        config.llm_model
    );

    let llm = Arc::new(LlmClient::new(
        config.llm_api_url.clone(),
        config.llm_api_key.clone(),
        config.llm_model.clone(),
        config.planner_model.clone(),
    ));

    let responder = Responder::new(
        llm.clone() as Arc<dyn CompletionProvider>,
        llm as Arc<dyn PlanningProvider>,
        ResponseGate::new(config.ack_suppress_probability),
        config.contacts.clone(),
        config.bot_name.clone(),
        config.context_window,
    );

    let source = ChatDbSource::new(
        config.chat_db_path.clone(),
        config.chat_name.clone(),
        config.bot_name.clone(),
    );
    let sink = OsascriptSink::new(config.chat_name.clone());

    let orchestrator = Orchestrator::new(config, source, sink, responder);

    tokio::select! {
        result = orchestrator.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            Ok(())
        }
    }
}
