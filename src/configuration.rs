use std::{env, fs, io::ErrorKind, ops::Deref, sync::Arc, time::Duration};

use url::Url;

use crate::{
    error::Error,
    provider::{IndexerClient, StateQueryClient, HTTP},
};

pub const DEFAULT_REALM_PATH: &str = "gno.land/r/gnolend";

#[derive(Debug)]
pub struct AppState<T>(Arc<T>);

impl<T> AppState<T> {
    pub fn new(state: T) -> AppState<T> {
        AppState(Arc::new(state))
    }
}

impl<T> Clone for AppState<T> {
    fn clone(&self) -> AppState<T> {
        AppState(Arc::clone(&self.0))
    }
}

impl<T> Deref for AppState<T> {
    type Target = Arc<T>;

    fn deref(&self) -> &Arc<T> {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct State {
    pub config: Config,
    pub state_query: StateQueryClient,
    pub indexer: IndexerClient,
}

impl State {
    pub fn new(config: Config) -> Result<State, Error> {
        let http = Arc::new(HTTP::new(config.clone())?);

        let state_query =
            StateQueryClient::new(http.clone(), config.realm_path.to_owned());
        let indexer = IndexerClient::new(http);

        Ok(Self {
            config,
            state_query,
            indexer,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub rpc_host: String,
    pub indexer_host: String,
    pub realm_path: String,
    pub timeout: u64,
    pub server_host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

impl Config {
    pub fn get_rpc_url(&self) -> String {
        self.rpc_host.to_owned()
    }

    pub fn get_graphql_url(&self) -> String {
        format!("{}/graphql/query", self.indexer_host.trim_end_matches('/'))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

fn parse_host(key: &str) -> Result<String, Error> {
    let value = env::var(key)?;
    let url = Url::parse(&value)?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::ConfigurationError(format!(
            "{} must be an http(s) url, received {}",
            key, value
        )));
    }

    Ok(value.trim_end_matches('/').to_owned())
}

pub fn get_configuration() -> Result<Config, Error> {
    let rpc_host = parse_host("RPC_HOST")?;
    let indexer_host = parse_host("INDEXER_HOST")?;
    let realm_path = env::var("REALM_PATH")
        .unwrap_or_else(|_| String::from(DEFAULT_REALM_PATH));
    let timeout = env::var("TIMEOUT")?.parse()?;

    let server_host = env::var("SERVER_HOST")?;
    let port: u16 = env::var("PORT")?.parse()?;
    let allowed_origins = env::var("ALLOWED_ORIGINS")?
        .split(',')
        .map(|item| item.trim().to_owned())
        .filter(|item| !item.is_empty())
        .collect::<Vec<String>>();

    let config = Config {
        rpc_host,
        indexer_host,
        realm_path,
        timeout,
        server_host,
        port,
        allowed_origins,
    };

    Ok(config)
}

/// Loads `.env` from the crate directory when present. Variables already
/// set in the process environment win over the file.
pub fn set_configuration() -> Result<(), Error> {
    let config_file: &str = ".env";

    let directory = env!("CARGO_MANIFEST_DIR");
    let path = format!("{}/{}", directory, config_file);

    let config_string = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::Io(e)),
    };

    for (key, value) in parse_config_string(&config_string) {
        if env::var_os(key).is_none() {
            env::set_var(key, value);
        }
    }

    Ok(())
}

fn parse_config_string(config: &str) -> Vec<(&str, &str)> {
    config
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim()))
        .collect()
}
