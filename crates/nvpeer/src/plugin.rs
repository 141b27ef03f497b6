//! Entry point for a plugin process launched by the host.

use crate::config::PeerConfig;
use crate::error::Error;
use crate::logging;
use crate::peer::Peer;
use crate::registry::PeerRegistry;
use crate::transport::StreamTransport;
use crate::transport::Transport;

/// Runs a plugin over stdio until the host hangs up.
///
/// Reads [`PeerConfig`] from the process, installs logging, lets `setup`
/// register handlers, then serves.
///
/// ```no_run
/// use nvpeer::handler::Handler;
/// use nvpeer::registry::FunctionOptions;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     nvpeer::plugin::plugin_main(|registry| {
///         let hello = Handler::sync(|_, _| async { Ok::<_, nvpeer::handler::HandlerError>("hello") });
///         registry.register_function("Hello", FunctionOptions::default(), hello)?;
///         Ok(())
///     })
///     .await
/// }
/// ```
pub async fn plugin_main<F, E>(setup: F) -> Result<(), E>
where
    F: FnOnce(&mut PeerRegistry) -> Result<(), E>,
    E: From<Error> + From<std::io::Error>,
{
    plugin_main_with(PeerConfig::from_env(), setup).await
}

/// Like [`plugin_main`], with a configuration the caller already assembled,
/// e.g. from its own command line.
pub async fn plugin_main_with<F, E>(config: PeerConfig, setup: F) -> Result<(), E>
where
    F: FnOnce(&mut PeerRegistry) -> Result<(), E>,
    E: From<Error> + From<std::io::Error>,
{
    logging::init(&config)?;
    tracing::info!(pid = std::process::id(), path = %config.plugin_path, "plugin start");

    let outcome = run_plugin(&config, Box::new(StreamTransport::stdio()), setup).await;

    match &outcome {
        Ok(()) => tracing::info!("plugin exit"),
        Err(_) => tracing::error!("plugin exit with error"),
    }
    outcome
}

/// Registers handlers with `setup` and serves them over `transport`.
pub async fn run_plugin<F, E>(config: &PeerConfig, transport: Box<dyn Transport>, setup: F) -> Result<(), E>
where
    F: FnOnce(&mut PeerRegistry) -> Result<(), E>,
    E: From<Error>,
{
    let mut registry = PeerRegistry::new(config.plugin_path.clone());
    setup(&mut registry)?;
    tracing::debug!(specs = registry.specs().len(), "handlers registered");

    let peer = Peer::new(transport, registry);
    peer.serve().await.map_err(E::from)
}
