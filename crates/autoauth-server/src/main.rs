use std::env;
use std::process::ExitCode;

use autoauth_server::ServerBuilder;
use autoauth_server::config::loader::{DEFAULT_CONFIG_PATH, load_config};

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is normal outside development.
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => eprintln!("Warning: ignoring .env: {e}"),
    }

    let (path, origin) = config_path(env::args().skip(1), env::var("AUTOAUTH_CONFIG").ok());
    let cfg = match load_config(Some(&path)) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::from(2);
        }
    };
    let filter = autoauth_server::init_tracing(&cfg.logging);
    tracing::info!(
        path = %path,
        origin,
        filter = %filter,
        backend = ?cfg.storage.backend,
        clients = cfg.clients.len(),
        "Configuration loaded"
    );

    let server = match ServerBuilder::new().with_config(cfg).build().await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Startup failed");
            return ExitCode::from(2);
        }
    };

    match server.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Server stopped with an error");
            ExitCode::FAILURE
        }
    }
}

/// `--config <path>` beats `AUTOAUTH_CONFIG`, which beats `autoauth.toml`.
fn config_path(
    mut args: impl Iterator<Item = String>,
    from_env: Option<String>,
) -> (String, &'static str) {
    while let Some(arg) = args.next() {
        if let Some(path) = arg.strip_prefix("--config=") {
            return (path.to_string(), "argument");
        }
        if arg == "--config" {
            if let Some(path) = args.next() {
                return (path, "argument");
            }
        }
    }
    match from_env.filter(|p| !p.is_empty()) {
        Some(path) => (path, "environment"),
        None => (DEFAULT_CONFIG_PATH.to_string(), "default"),
    }
}

#[cfg(test)]
mod tests {
    use super::config_path;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn argument_wins_over_environment() {
        let (path, origin) = config_path(args(&["--config", "a.toml"]), Some("b.toml".into()));
        assert_eq!((path.as_str(), origin), ("a.toml", "argument"));

        let (path, _) = config_path(args(&["--config=c.toml"]), None);
        assert_eq!(path, "c.toml");
    }

    #[test]
    fn falls_back_to_environment_then_default() {
        let (path, origin) = config_path(args(&[]), Some("b.toml".into()));
        assert_eq!((path.as_str(), origin), ("b.toml", "environment"));

        let (path, origin) = config_path(args(&["--config"]), Some(String::new()));
        assert_eq!((path.as_str(), origin), ("autoauth.toml", "default"));
    }
}
