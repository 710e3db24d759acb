use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::Page;

use super::error::{SessionError, SessionResult};
use super::session::SessionConfig;

/// Softens the automation fingerprint: hides `navigator.webdriver`, pins a
/// realistic user agent, and aligns `navigator.language` with the configured
/// locale. This is basic masking only, not a bot-defense arms race.
pub(super) async fn apply(page: &Page, config: &SessionConfig) -> SessionResult<()> {
    page.enable_stealth_mode_with_agent(&config.user_agent)
        .await?;

    let params = SetUserAgentOverrideParams::builder()
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(SessionError::Configuration)?;
    page.set_user_agent(params).await?;

    inject(
        page,
        "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });",
    )
    .await?;

    if let Some(lang) = &config.lang {
        let script = format!(
            "Object.defineProperty(navigator, 'language', {{ get: () => '{lang}' }});\n\
             Object.defineProperty(navigator, 'languages', {{ get: () => ['{lang}', 'en-US'] }});"
        );
        inject(page, &script).await?;
    }
    Ok(())
}

async fn inject(page: &Page, source: &str) -> SessionResult<()> {
    page.evaluate_on_new_document(
        AddScriptToEvaluateOnNewDocumentParams::builder()
            .source(source)
            .build()
            .map_err(SessionError::Configuration)?,
    )
    .await?;
    Ok(())
}
