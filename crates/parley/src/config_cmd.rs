// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `parley config show`.

use parley_config::model::ParleyConfig;
use parley_core::ParleyError;

const REDACTED: &str = "********";

/// Print the effective configuration as TOML with secrets masked.
pub fn show(config: &ParleyConfig) -> Result<(), ParleyError> {
    println!("{}", render_redacted(config)?);
    Ok(())
}

fn render_redacted(config: &ParleyConfig) -> Result<String, ParleyError> {
    let mut config = config.clone();
    for secret in [
        &mut config.openai.api_key,
        &mut config.vapi.api_key,
        &mut config.gateway.bearer_token,
        &mut config.gateway.webhook_secret,
    ] {
        if secret.is_some() {
            *secret = Some(REDACTED.to_string());
        }
    }
    toml::to_string_pretty(&config)
        .map_err(|e| ParleyError::Internal(format!("failed to render config: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_masked() {
        let mut config = ParleyConfig::default();
        config.openai.api_key = Some("sk-live-123".into());
        config.gateway.webhook_secret = Some("hook-secret".into());

        let rendered = render_redacted(&config).unwrap();
        assert!(!rendered.contains("sk-live-123"));
        assert!(!rendered.contains("hook-secret"));
        assert!(rendered.contains(REDACTED));
    }

    #[test]
    fn unset_secrets_stay_unset() {
        let rendered = render_redacted(&ParleyConfig::default()).unwrap();
        assert!(!rendered.contains(REDACTED));
    }
}
