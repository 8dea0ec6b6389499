use anyhow::Result;
use browser_pilot::{run_session, AgentConfig, BrowserConfig, ChatClient, ChromiumPage};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Fail before launching Chromium if the key is missing.
    let model = ChatClient::from_env()?;
    let task = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Go to Pinterest and find some interesting images".to_string());

    let page = ChromiumPage::launch(BrowserConfig::default()).await?;
    let report = run_session(page, model, AgentConfig::default(), &task).await?;

    println!("run {} finished after {} actions", report.run_id, report.rounds);
    if let Some(answer) = report.final_message {
        println!("{}", answer);
    }
    Ok(())
}
