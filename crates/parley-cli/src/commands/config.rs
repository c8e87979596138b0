//! Configuration management commands.

use parley_core::Config;

use crate::{AppContext, ConfigAction};

pub fn handle(action: ConfigAction, ctx: &AppContext) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            println!("# Sources (lowest to highest precedence):");
            println!("#   {}", Config::config_dir().join("config.toml").display());
            println!("#   .parley/config.toml");
            println!("#   .parley/config.local.toml");
            println!("#   PARLEY_* environment variables");
            println!();
            print!("{}", redact(ctx.config.clone()).to_toml()?);
        }
    }
    Ok(())
}

/// Mask API keys before printing.
fn redact(mut config: Config) -> Config {
    if let Some(ref mut openai) = config.providers.openai {
        if openai.api_key.is_some() {
            openai.api_key = Some("********".to_string());
        }
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::config::ProviderConfig;

    #[test]
    fn test_redact_masks_api_key() {
        let mut config = Config::default();
        config.providers.openai = Some(ProviderConfig {
            api_key: Some("sk-secret".to_string()),
            ..Default::default()
        });
        let rendered = redact(config).to_toml().unwrap();
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("********"));
    }
}
