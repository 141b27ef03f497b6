//! # Handler Registry
//!
//! The declarative side of a plugin. During startup the plugin registers its
//! functions, commands and autocmds here; each registration opens a handler slot
//! under a service method name and appends a [`HandlerSpec`] to the manifest.
//!
//! ## Invariants
//!
//! - **Deterministic Names**: the service method of a spec is
//!   `{plugin_path}:{kind}:{name}`, with `:{pattern}` appended for autocmds.
//! - **Unique Methods**: registering a service method twice is an error.
//! - **One-Shot Manifest**: [`PeerRegistry::take_manifest`] hands out the specs
//!   exactly once per registry; later calls get an empty list.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Mutex;

use nvwire::Value;

use crate::handler::Handler;

/// The service method the host calls to fetch the manifest.
pub const SPECS_METHOD: &str = "specs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    DuplicateMethod(String),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateMethod(m) => write!(f, "Service method already registered: {}", m),
        }
    }
}

impl std::error::Error for RegistryError {}

pub type Result<T> = std::result::Result<T, RegistryError>;

/// What a spec declares in the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecKind {
    Function,
    Command,
    Autocmd,
}

impl SpecKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Command => "command",
            Self::Autocmd => "autocmd",
        }
    }
}

/// One declared host-side entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerSpec {
    pub kind: SpecKind,
    pub name: String,
    pub sync: bool,
    /// Boolean options are present with an empty value.
    pub opts: BTreeMap<String, String>,
    pub service_method: String,
}

impl HandlerSpec {
    /// The wire form the host expects from the `specs` method.
    pub fn to_value(&self) -> Value {
        Value::map([
            ("type", Value::from(self.kind.as_str())),
            ("name", Value::from(self.name.as_str())),
            ("sync", Value::from(self.sync)),
            (
                "opts",
                Value::map(self.opts.iter().map(|(k, v)| (k.as_str(), v.as_str()))),
            ),
        ])
    }
}

#[derive(Debug, Clone, Default)]
pub struct FunctionOptions {
    /// Evaluated in the host; the result is passed as an extra argument.
    pub eval: Option<String>,
}

/// See `:help :command` in the host for what each option means.
#[derive(Debug, Clone, Default)]
pub struct CommandOptions {
    pub nargs: Option<String>,
    /// `"."`, `"%"` or a default count. Takes precedence over `count`.
    pub range: Option<String>,
    pub count: Option<String>,
    pub addr: Option<String>,
    pub bang: bool,
    pub register: bool,
    pub eval: Option<String>,
    pub bar: bool,
    pub complete: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AutocmdOptions {
    pub pattern: Option<String>,
    pub nested: bool,
    pub eval: Option<String>,
    /// Defaults to a group named after the script and the spec's position.
    pub group: Option<String>,
}

/// Handlers and manifest of one plugin.
///
/// Built mutably during startup, then shared read-only with the `Peer`.
pub struct PeerRegistry {
    plugin_path: String,
    specs: Vec<HandlerSpec>,
    handlers: HashMap<String, Handler>,
    delivered: Mutex<bool>,
}

impl PeerRegistry {
    pub fn new(plugin_path: impl Into<String>) -> Self {
        Self {
            plugin_path: plugin_path.into(),
            specs: Vec::new(),
            handlers: HashMap::new(),
            delivered: Mutex::new(false),
        }
    }

    pub fn plugin_path(&self) -> &str {
        &self.plugin_path
    }

    /// Registers a host function `name`.
    pub fn register_function(
        &mut self,
        name: impl Into<String>,
        options: FunctionOptions,
        handler: Handler,
    ) -> Result<()> {
        let name = name.into();
        let mut opts = BTreeMap::new();
        put(&mut opts, "eval", options.eval);
        self.add_spec(SpecKind::Function, name, None, opts, handler)
    }

    /// Registers a host command `name`.
    pub fn register_command(
        &mut self,
        name: impl Into<String>,
        options: CommandOptions,
        handler: Handler,
    ) -> Result<()> {
        let name = name.into();
        let mut opts = BTreeMap::new();
        put(&mut opts, "nargs", options.nargs);
        match options.range.filter(|r| !r.is_empty()) {
            // the host spells "current line" as a bare -range
            Some(range) if range == "." => flag(&mut opts, "range", true),
            Some(range) => put(&mut opts, "range", Some(range)),
            None => put(&mut opts, "count", options.count),
        }
        flag(&mut opts, "bang", options.bang);
        flag(&mut opts, "register", options.register);
        put(&mut opts, "eval", options.eval);
        put(&mut opts, "addr", options.addr);
        flag(&mut opts, "bar", options.bar);
        put(&mut opts, "complete", options.complete);
        self.add_spec(SpecKind::Command, name, None, opts, handler)
    }

    /// Registers an autocmd for `event`.
    pub fn register_autocmd(
        &mut self,
        event: impl Into<String>,
        options: AutocmdOptions,
        handler: Handler,
    ) -> Result<()> {
        let event = event.into();
        let pattern = options.pattern.clone().unwrap_or_default();
        let mut opts = BTreeMap::new();
        put(&mut opts, "pattern", options.pattern);
        flag(&mut opts, "nested", options.nested);
        put(&mut opts, "eval", options.eval);
        put(&mut opts, "group", options.group);
        self.add_spec(SpecKind::Autocmd, event, Some(pattern), opts, handler)
    }

    /// Registers a handler under a literal service method, with no spec.
    pub fn register_handler(&mut self, method: impl Into<String>, handler: Handler) -> Result<()> {
        self.add_handler(method.into(), handler)
    }

    fn add_spec(
        &mut self,
        kind: SpecKind,
        name: String,
        pattern: Option<String>,
        opts: BTreeMap<String, String>,
        handler: Handler,
    ) -> Result<()> {
        let mut service_method = format!("{}:{}:{}", self.plugin_path, kind.as_str(), name);
        if let Some(pattern) = pattern {
            service_method.push(':');
            service_method.push_str(&pattern);
        }
        let sync = handler.is_sync();
        self.add_handler(service_method.clone(), handler)?;
        tracing::debug!(method = %service_method, sync, "registered spec");
        self.specs.push(HandlerSpec { kind, name, sync, opts, service_method });
        Ok(())
    }

    fn add_handler(&mut self, method: String, handler: Handler) -> Result<()> {
        if method == SPECS_METHOD || self.handlers.contains_key(&method) {
            return Err(RegistryError::DuplicateMethod(method));
        }
        self.handlers.insert(method, handler);
        Ok(())
    }

    /// All specs in registration order.
    pub fn specs(&self) -> &[HandlerSpec] {
        &self.specs
    }

    pub fn handler(&self, method: &str) -> Option<&Handler> {
        self.handlers.get(method)
    }

    /// Returns the manifest on the first call and an empty list afterwards.
    pub fn take_manifest(&self) -> Vec<HandlerSpec> {
        let mut delivered = match self.delivered.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *delivered {
            return Vec::new();
        }
        *delivered = true;
        self.specs.clone()
    }
}

/// Empty strings count as unset.
fn put(opts: &mut BTreeMap<String, String>, key: &str, value: Option<String>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        opts.insert(key.to_string(), value);
    }
}

fn flag(opts: &mut BTreeMap<String, String>, key: &str, set: bool) {
    if set {
        opts.insert(key.to_string(), String::new());
    }
}
