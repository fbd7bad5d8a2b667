use std::sync::Arc;
use anyhow::{Context, Result};
use sqlx::mysql::MySqlPoolOptions;
use archon::config::ServerConfig;
use archon::servers::character::CharacterState;
use archon::servers::character::db::MySqlStore;
use archon::servers::character::params::ParameterCache;

/// Config path from the command line; `None` when help was asked for.
fn parse_args(args: &[String]) -> Result<Option<String>> {
    let mut conf_file = "conf/server.yaml".to_string();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "--h" | "--?" | "/?" => return Ok(None),
            "--conf" => {
                if i + 1 < args.len() {
                    i += 1;
                    conf_file = args[i].clone();
                } else {
                    return Err(anyhow::anyhow!("--conf requires a FILE argument"));
                }
            }
            _ => {}
        }
        i += 1;
    }
    Ok(Some(conf_file))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_ansi(std::io::IsTerminal::is_terminal(&std::io::stderr()))
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let Some(conf_file) = parse_args(&args)? else {
        println!("Usage: character_server [--conf FILE]");
        return Ok(());
    };

    let config = ServerConfig::from_file(&conf_file)
        .with_context(|| format!("Cannot load config: {}", conf_file))?;

    let params = ParameterCache::load(&config.param_dir, &config.param_files)
        .with_context(|| format!("Cannot load parameter files from {}", config.param_dir))?;
    let default_key_config = config.default_key_config()?;

    let pool = MySqlPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url())
        .await
        .with_context(|| format!("Cannot connect to DB: {}", config.sql_ip))?;

    if config.run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Cannot apply migrations")?;
        tracing::info!("[char] [migrations] applied");
    }

    tracing::info!("[char] [started] Character Server Started");

    let bind = format!("{}:{}", config.character_ip, config.character_port);
    let state = Arc::new(CharacterState::new(
        MySqlStore::new(pool),
        config,
        Arc::new(params),
        default_key_config,
    ));

    CharacterState::run(state, &bind).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_conf_without_value_is_error() {
        let err = parse_args(&args(&["character_server", "--conf"])).unwrap_err();
        assert_eq!(err.to_string(), "--conf requires a FILE argument");
    }

    #[test]
    fn test_conf_path_and_default() {
        assert_eq!(
            parse_args(&args(&["character_server", "--conf", "x.yaml"])).unwrap(),
            Some("x.yaml".to_string())
        );
        assert_eq!(
            parse_args(&args(&["character_server"])).unwrap(),
            Some("conf/server.yaml".to_string())
        );
        assert_eq!(parse_args(&args(&["character_server", "--help"])).unwrap(), None);
    }
}
