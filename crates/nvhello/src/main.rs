//! # nvhello
//!
//! A small plugin for an nvpeer host. The host launches it with the plugin path
//! as the first argument and talks to it over stdio.
//!
//! `nvhello --emit-script hello` prints the host script declaring its handlers,
//! which is what the host sources before starting the process.

use std::path::PathBuf;

use clap::Parser;

use nvpeer::Peer;
use nvpeer::Value;
use nvpeer::config::LOG_FILE_ENV;
use nvpeer::config::LOG_FILTER_ENV;
use nvpeer::config::PeerConfig;
use nvpeer::handler::Handler;
use nvpeer::handler::HandlerError;
use nvpeer::handler::arg;
use nvpeer::plugin::plugin_main_with;
use nvpeer::registry::CommandOptions;
use nvpeer::registry::FunctionOptions;
use nvpeer::registry::PeerRegistry;
use nvpeer::script::ScriptDialect;
use nvpeer::script::compile;

#[derive(Debug, Parser)]
#[command(about = "Example plugin for an nvpeer host", version)]
struct Cli {
    /// Path the host loaded the plugin from; prefixes every service method.
    #[arg(default_value = "")]
    plugin_path: String,

    /// Print the host script under this name and exit.
    #[arg(long, value_name = "NAME")]
    emit_script: Option<String>,

    /// Append logs to this file instead of stderr.
    #[arg(long, env = LOG_FILE_ENV)]
    log_file: Option<PathBuf>,

    /// Tracing filter directive, e.g. `debug` or `nvpeer=trace`.
    #[arg(long, env = LOG_FILTER_ENV)]
    log_filter: Option<String>,
}

impl Cli {
    fn config(&self) -> PeerConfig {
        PeerConfig {
            plugin_path: self.plugin_path.clone(),
            log_file: self.log_file.clone().filter(|p| !p.as_os_str().is_empty()),
            log_filter: self.log_filter.clone().filter(|f| !f.is_empty()),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// `Hello('John', 'Doe')` returns `"Hello, John Doe"`.
async fn hello_function(_peer: Peer, args: Vec<Value>) -> Result<String, HandlerError> {
    let names: Vec<String> = arg(&args, 0)?;
    Ok(format!("Hello, {}", names.join(" ")))
}

/// Plain `hello` request: `rpcrequest(chan, 'hello', 'world')`.
async fn hello_request(_peer: Peer, args: Vec<Value>) -> Result<String, HandlerError> {
    let name: String = arg(&args, 0)?;
    Ok(format!("Hello, {}", name))
}

/// `:HelloBuffer` echoes the current buffer's name and length.
async fn describe_buffer(peer: Peer, _args: Vec<Value>) -> Result<(), HandlerError> {
    let buffer = peer.current_buffer().await?;

    let mut pipeline = peer.pipeline();
    let name = pipeline.buffer_name(buffer);
    let lines = pipeline.buffer_line_count(buffer);
    pipeline.wait().await?;

    let name = name.value().unwrap_or_default();
    let name = if name.is_empty() { "[No Name]".to_string() } else { name };
    let message = format!("{}: {} lines", name, lines.value().unwrap_or_default());
    tracing::debug!(%buffer, %message, "describe buffer");
    peer.command(&format!("echo {}", quote(&message))).await?;
    Ok(())
}

/// Single-quoted host string literal.
fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn register(registry: &mut PeerRegistry) -> anyhow::Result<()> {
    registry.register_function("Hello", FunctionOptions::default(), Handler::sync(hello_function))?;
    registry.register_command("HelloBuffer", CommandOptions::default(), Handler::notify(describe_buffer))?;
    registry.register_handler("hello", Handler::sync(hello_request))?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.config();

    if let Some(name) = &cli.emit_script {
        let mut registry = PeerRegistry::new(config.plugin_path.clone());
        register(&mut registry)?;
        print!("{}", compile(name, registry.specs(), &ScriptDialect::neovim()));
        return Ok(());
    }

    plugin_main_with(config, register).await
}
