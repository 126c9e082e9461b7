use anyhow::Result;
use clap::{Args, Subcommand, ValueEnum};

#[derive(Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Print the effective configuration with secrets masked")]
    Show(ShowArgs),
}

#[derive(Args)]
pub struct ShowArgs {
    #[arg(long, value_enum, default_value_t = Format::Toml)]
    pub format: Format,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Format {
    Toml,
    Yaml,
    Json,
}

const MASK: &str = "***";

pub fn run(cmd: ConfigCommand, config: ::config::Config) -> Result<()> {
    match cmd {
        ConfigCommand::Show(args) => {
            println!("{}", render(&masked(config), args.format)?);
            Ok(())
        }
    }
}

pub fn masked(mut config: ::config::Config) -> ::config::Config {
    let mask = |value: &mut Option<String>| {
        if value.is_some() {
            *value = Some(MASK.to_string());
        }
    };
    mask(&mut config.llm.api_key);
    mask(&mut config.collaborators.calendar_token);
    mask(&mut config.storage.postgres_url);
    mask(&mut config.queue.redis_url);
    config
}

pub fn render(config: &::config::Config, format: Format) -> Result<String> {
    Ok(match format {
        Format::Toml => toml::to_string_pretty(config)?,
        Format::Yaml => serde_yaml::to_string(config)?,
        Format::Json => serde_json::to_string_pretty(config)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secrets_are_masked() {
        let mut config = ::config::Config::default();
        config.llm.api_key = Some("sk-secret".to_string());
        config.queue.redis_url = Some("redis://user:pw@host".to_string());

        let shown = masked(config);
        assert_eq!(shown.llm.api_key.as_deref(), Some(MASK));
        assert_eq!(shown.queue.redis_url.as_deref(), Some(MASK));
        assert_eq!(shown.collaborators.calendar_token, None);
    }

    #[test]
    fn test_every_format_renders() {
        let config = ::config::Config::default();
        for format in [Format::Toml, Format::Yaml, Format::Json] {
            let rendered = render(&config, format).unwrap();
            assert!(rendered.contains("queue"));
        }
    }
}
