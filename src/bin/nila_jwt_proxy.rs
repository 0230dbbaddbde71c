use nila_jwt::config::ProxyAppConfig;
use nila_jwt::proxy::NilaJwtGate;
use nila_jwt::validator::TokenVerifier;
use pingora_core::server::Server;
use pingora_core::{Error, ErrorType, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "demos/proxy_config.yaml";

fn internal_error(context: String) -> Box<Error> {
    let mut err = Error::new(ErrorType::InternalError);
    err.set_context(context);
    err
}

fn main() -> Result<()> {
    // --- Load Configuration from YAML (early, for the log level) ---
    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let app_config = ProxyAppConfig::from_yaml_file(&config_path).map_err(|e| {
        let mut err = Error::new(ErrorType::ReadError);
        err.set_context(format!("Failed to load config file {:?}: {}", config_path, e));
        err
    })?;

    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(app_config.log_level()))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // The key source may need a JWKS fetch, so build the verifier on a runtime
    // of our own before Pingora starts its workers.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| internal_error(format!("Failed to create Tokio runtime: {:?}", e)))?;

    let verifier = runtime.block_on(async {
        let config = app_config
            .verifier
            .to_config()
            .map_err(|e| internal_error(format!("Verifier config error: {}", e)))?;
        TokenVerifier::from_config(&config).await.map_err(|e| {
            tracing::error!("Refusing to start without usable key material: {}", e);
            internal_error(format!("Verifier setup error: {}", e))
        })
    })?;

    let gate = NilaJwtGate::new(
        Arc::new(verifier),
        app_config.upstream.clone(),
        app_config.inspection_routes,
    );

    // --- Configure Pingora Server ---
    let mut my_server = Server::new(None)?;
    my_server.bootstrap();

    let mut proxy_service = pingora_proxy::http_proxy_service(&my_server.configuration, gate);
    proxy_service.add_tcp(&app_config.listen_addr);

    tracing::info!("nila-jwt proxy listening on {}", app_config.listen_addr);
    tracing::info!("Forwarding authenticated requests to {}", app_config.upstream.addr);
    if app_config.inspection_routes {
        tracing::info!("Token inspection routes enabled under /parse_jwt/");
    }

    my_server.add_service(proxy_service);
    my_server.run_forever();
}
