/*
 * Responsibility
 * - Config読み込み → 依存生成 (catalog / auth / directory) → Router 組み立て
 * - Middleware の適用 (認証 / CORS / request-id・trace・limit・timeout)
 * - axum::serve() で起動
 */
use std::{panic, process, sync::Arc};

use anyhow::Result;
use axum::Router;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, DirectoryConfig};
use crate::services::auth::{CustomValidator, build_request_authenticator};
use crate::services::cache::{CacheClient, MokaClient, ValkeyClient};
use crate::services::catalog::{Catalog, StaticCatalog};
use crate::services::directory::{GroupAuthorizer, LdapDirectoryClient};
use crate::state::AppState;
use crate::{api, middleware};

const DN_CACHE_PREFIX: &str = "mcp-auth:dn";
const GROUP_CACHE_PREFIX: &str = "mcp-auth:group";

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,mcp_auth_gateway=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // stderr can be hidden depending on how the process is launched
        tracing::error!(?info, "panic");

        // Development: crash the whole process so we notice immediately.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting MCP auth gateway in {:?} mode on {}",
        config.app_env,
        config.addr
    );
    tracing::debug!(auth = ?config.auth, "auth configuration");

    // No custom validator in the stock binary; embedders pass one to `build_state`.
    let state = build_state(&config, None).await?;
    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Build process-level services and inject them into the shared application state.
pub async fn build_state(
    config: &Config,
    custom: Option<Arc<dyn CustomValidator>>,
) -> Result<AppState> {
    let catalog: Arc<dyn Catalog> = match &config.catalog_path {
        Some(path) => {
            let catalog = StaticCatalog::load(path).await?;
            tracing::info!(path = %path.display(), "catalog loaded");
            Arc::new(catalog)
        }
        None => Arc::new(StaticCatalog::default()),
    };

    let auth = build_request_authenticator(&config.auth, catalog, custom);
    auth.log_config_once();

    let directory = match &config.directory {
        Some(directory) => Some(build_directory(directory).await?),
        None => None,
    };

    Ok(AppState::new(auth, directory))
}

async fn build_directory(config: &DirectoryConfig) -> Result<GroupAuthorizer> {
    let (dn_cache, group_cache): (Arc<dyn CacheClient>, Arc<dyn CacheClient>) =
        match &config.cache_url {
            Some(url) => {
                let dn = ValkeyClient::new(url, DN_CACHE_PREFIX).await?;
                let group = dn.with_prefix(GROUP_CACHE_PREFIX);
                (Arc::new(dn), Arc::new(group))
            }
            None => (
                Arc::new(MokaClient::default()),
                Arc::new(MokaClient::default()),
            ),
        };

    let backend = dn_cache.backend_name();
    let client = Arc::new(LdapDirectoryClient::new(config.timeout));
    let authorizer = GroupAuthorizer::new(config, client, dn_cache, group_cache)?;

    tracing::info!(
        domains = ?authorizer.domain_names().collect::<Vec<_>>(),
        cache = backend,
        "directory authorization enabled"
    );
    Ok(authorizer)
}

pub fn build_router(state: AppState, config: &Config) -> Router {
    let router = Router::new()
        .nest("/api/v1", api::v1::routes(state.clone()))
        .with_state(state);

    let router = middleware::cors::apply(router, config);
    middleware::http::apply(router)
}
