//! # Host Script Compiler
//!
//! Renders a manifest as host script text. The host sources the script once; it
//! defines the plugin's functions, commands and autocmds as thin stubs that call
//! back into the peer under each spec's service method.
//!
//! ## Invariants
//!
//! - **Stable Output**: specs are sorted by service method before rendering, so
//!   the same manifest always produces byte-identical text.
//! - **Load Guard**: sourcing the script twice defines everything once.

use std::fmt::Write;

use crate::registry::HandlerSpec;
use crate::registry::SpecKind;

/// Names of the host primitives the generated stubs call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptDialect {
    /// Call that waits for the peer's reply.
    pub request: String,
    /// Call that does not wait.
    pub notify: String,
    /// Expression that evaluates to the peer's channel.
    pub channel: String,
}

impl ScriptDialect {
    pub fn neovim() -> Self {
        Self::new("rpcrequest", "rpcnotify", "s:channel()")
    }

    pub fn new(request: impl Into<String>, notify: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            request: request.into(),
            notify: notify.into(),
            channel: channel.into(),
        }
    }

    fn primitive(&self, sync: bool) -> &str {
        if sync { &self.request } else { &self.notify }
    }
}

impl Default for ScriptDialect {
    fn default() -> Self {
        Self::neovim()
    }
}

/// Command options rendered as flags, in this order.
const COMMAND_FLAGS: [&str; 7] = ["nargs", "complete", "range", "count", "bang", "bar", "register"];

/// Renders `specs` as the script for plugin `name`.
pub fn compile(name: &str, specs: &[HandlerSpec], dialect: &ScriptDialect) -> String {
    let mut sorted: Vec<&HandlerSpec> = specs.iter().collect();
    sorted.sort_by(|a, b| a.service_method.cmp(&b.service_method));

    let mut out = String::new();
    let _ = write!(
        out,
        "if exists(\"g:loaded_{name}\")\n  finish\nendif\nlet g:loaded_{name} = 1\n"
    );

    for (i, spec) in sorted.into_iter().enumerate() {
        let mut args = vec![dialect.channel.clone(), format!("\"{}\"", spec.service_method)];
        let call = dialect.primitive(spec.sync);

        // writing to a String cannot fail
        let _ = match spec.kind {
            SpecKind::Autocmd => {
                let group = spec.opts.get("group").cloned().unwrap_or_else(|| format!("{}_{}", name, i));
                let pattern = spec.opts.get("pattern").map_or("*", String::as_str);
                let nested = if spec.opts.contains_key("nested") { " nested" } else { "" };
                push_eval(&mut args, spec);
                writeln!(
                    out,
                    "autocmd! {} {} {}{} call {}({})",
                    group,
                    spec.name,
                    pattern,
                    nested,
                    call,
                    args.join(", ")
                )
            }
            SpecKind::Command => {
                if spec.opts.contains_key("nargs") {
                    args.push("[<f-args>]".into());
                }
                match spec.opts.get("range") {
                    Some(r) if r.is_empty() || r == "%" => args.push("[<line1>, <line2>]".into()),
                    Some(r) if r.starts_with(|c: char| c.is_ascii_digit()) => args.push("<count>".into()),
                    Some(_) => {}
                    None if spec.opts.contains_key("count") => args.push("<count>".into()),
                    None => {}
                }
                if spec.opts.contains_key("bang") {
                    args.push("<q-bang> == \"!\"".into());
                }
                if spec.opts.contains_key("register") {
                    args.push("<q-reg>".into());
                }
                push_eval(&mut args, spec);
                writeln!(
                    out,
                    "command!{} {} call {}({})",
                    command_flags(spec),
                    spec.name,
                    call,
                    args.join(", ")
                )
            }
            SpecKind::Function => {
                args.push("a:000".into());
                push_eval(&mut args, spec);
                write!(
                    out,
                    "function! {} (...)\n  return {}({})\nendfunction\n",
                    spec.name,
                    call,
                    args.join(", ")
                )
            }
        };
    }

    out
}

fn push_eval(args: &mut Vec<String>, spec: &HandlerSpec) {
    if let Some(expr) = spec.opts.get("eval") {
        args.push(format!("eval(\"{}\")", expr.replace('"', "\\\"")));
    }
}

fn command_flags(spec: &HandlerSpec) -> String {
    let mut flags = String::new();
    for key in COMMAND_FLAGS {
        if let Some(value) = spec.opts.get(key) {
            flags.push_str(" -");
            flags.push_str(key);
            if !value.is_empty() {
                flags.push('=');
                flags.push_str(value);
            }
        }
    }
    flags
}
