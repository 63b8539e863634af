use std::env;
use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;

use futures::future::join_all;
use serde_json::{json, Value};
use tracing::{debug, info};

use sessiontron::client::ApiRequest;
use sessiontron::config::{load_config, print_schema};
use sessiontron::startup::build_session;
use sessiontron::utils::logger::init_logging;

const DEFAULT_CONFIG: &str = "./config.yaml";

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();

    let result = match args.first().map(String::as_str) {
        Some("schema") => print_schema().map_err(Into::into),
        _ => run(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("sessiontron: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// `sessiontron [config.yaml] <paths...>`: log in and GET each path.
async fn run(mut args: Vec<String>) -> Result<(), Box<dyn Error>> {
    let explicit = args
        .first()
        .is_some_and(|a| a.ends_with(".yaml") || a.ends_with(".yml"));
    let config_path = if explicit {
        args.remove(0)
    } else {
        env::var("SESSIONTRON_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG.to_string())
    };

    let config = load_config(&config_path)?;
    init_logging(&config.logging)?;
    debug!("Loaded configuration from '{}'", config_path);

    let context = build_session(Arc::new(config)).await?;

    if let (Ok(username), Ok(password)) = (
        env::var("SESSIONTRON_USERNAME"),
        env::var("SESSIONTRON_PASSWORD"),
    ) {
        let credentials = json!({ "username": username, "password": password });
        context.session.login(&credentials).await?;
    } else if context.session.is_authenticated().await {
        info!("Reusing stored session");
    } else {
        info!("No credentials supplied; requests go out unauthenticated");
    }

    let interceptor = &context.interceptor;
    let responses = join_all(
        args.iter()
            .map(|path| interceptor.send_json::<Value>(ApiRequest::get(path.as_str()))),
    )
    .await;

    let mut failed = false;
    for (path, response) in args.iter().zip(responses) {
        match response {
            Ok(body) => println!("{}", serde_json::to_string_pretty(&body)?),
            Err(e) => {
                failed = true;
                eprintln!("{}: {}", path, serde_json::to_string(&e)?);
            }
        }
    }

    debug!("Metrics:\n{}", context.metrics.render());
    if failed {
        return Err("one or more requests failed".into());
    }
    Ok(())
}
