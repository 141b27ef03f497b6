//! Manifest building and one-shot delivery.

use std::thread;

use nvpeer::Peer;
use nvpeer::Value;
use nvpeer::handler::Handler;
use nvpeer::handler::HandlerError;
use nvpeer::registry::AutocmdOptions;
use nvpeer::registry::CommandOptions;
use nvpeer::registry::FunctionOptions;
use nvpeer::registry::PeerRegistry;
use nvpeer::registry::RegistryError;
use nvpeer::registry::SpecKind;

fn noop() -> Handler {
    Handler::notify(|_peer: Peer, _args: Vec<Value>| async { Ok::<_, HandlerError>(()) })
}

fn answer() -> Handler {
    Handler::sync(|_peer: Peer, _args: Vec<Value>| async { Ok::<_, HandlerError>(1i64) })
}

fn opts(spec_opts: &std::collections::BTreeMap<String, String>) -> Vec<(&str, &str)> {
    spec_opts.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
}

#[test]
fn test_service_method_names() {
    let mut registry = PeerRegistry::new("/path/to/plugin");
    registry.register_function("Foo", FunctionOptions::default(), answer()).unwrap();
    registry.register_command("Bar", CommandOptions::default(), noop()).unwrap();
    registry
        .register_autocmd(
            "BufRead",
            AutocmdOptions { pattern: Some("*.md".into()), ..Default::default() },
            noop(),
        )
        .unwrap();
    registry.register_autocmd("VimLeave", AutocmdOptions::default(), noop()).unwrap();

    let methods: Vec<&str> = registry.specs().iter().map(|s| s.service_method.as_str()).collect();
    assert_eq!(
        methods,
        vec![
            "/path/to/plugin:function:Foo",
            "/path/to/plugin:command:Bar",
            "/path/to/plugin:autocmd:BufRead:*.md",
            "/path/to/plugin:autocmd:VimLeave:",
        ]
    );
    for method in methods {
        assert!(registry.handler(method).is_some(), "no handler for {}", method);
    }
}

#[test]
fn test_sync_flag_follows_handler() {
    let mut registry = PeerRegistry::new("");
    registry.register_function("S", FunctionOptions::default(), answer()).unwrap();
    registry.register_function("A", FunctionOptions::default(), noop()).unwrap();

    let specs = registry.specs();
    assert_eq!(specs[0].kind, SpecKind::Function);
    assert!(specs[0].sync);
    assert!(!specs[1].sync);
}

#[test]
fn test_command_option_mapping() {
    let mut registry = PeerRegistry::new("");
    registry
        .register_command(
            "All",
            CommandOptions {
                nargs: Some("*".into()),
                range: Some(".".into()),
                count: Some("2".into()),
                addr: Some("buffers".into()),
                bang: true,
                register: true,
                eval: Some("getcwd()".into()),
                bar: true,
                complete: Some("file".into()),
            },
            noop(),
        )
        .unwrap();
    registry
        .register_command(
            "Counted",
            CommandOptions { count: Some("4".into()), ..Default::default() },
            noop(),
        )
        .unwrap();
    registry.register_command("Plain", CommandOptions::default(), noop()).unwrap();

    let specs = registry.specs();
    assert_eq!(
        opts(&specs[0].opts),
        vec![
            ("addr", "buffers"),
            ("bang", ""),
            ("bar", ""),
            ("complete", "file"),
            ("eval", "getcwd()"),
            ("nargs", "*"),
            ("range", ""),
            ("register", ""),
        ]
    );
    assert_eq!(opts(&specs[1].opts), vec![("count", "4")]);
    assert!(specs[2].opts.is_empty());
}

#[test]
fn test_autocmd_option_mapping() {
    let mut registry = PeerRegistry::new("");
    registry
        .register_autocmd(
            "BufWritePost",
            AutocmdOptions {
                pattern: Some("*.rs".into()),
                nested: true,
                eval: Some("expand('<afile>')".into()),
                group: Some("fmt".into()),
            },
            noop(),
        )
        .unwrap();

    let spec = &registry.specs()[0];
    assert_eq!(spec.kind, SpecKind::Autocmd);
    assert_eq!(spec.name, "BufWritePost");
    assert_eq!(
        opts(&spec.opts),
        vec![
            ("eval", "expand('<afile>')"),
            ("group", "fmt"),
            ("nested", ""),
            ("pattern", "*.rs"),
        ]
    );
}

#[test]
fn test_duplicates_are_rejected() {
    let mut registry = PeerRegistry::new("/p");
    registry.register_function("Foo", FunctionOptions::default(), answer()).unwrap();

    let err = registry
        .register_function("Foo", FunctionOptions::default(), noop())
        .unwrap_err();
    assert_eq!(err, RegistryError::DuplicateMethod("/p:function:Foo".into()));
    assert_eq!(registry.specs().len(), 1);

    registry.register_handler("hello", answer()).unwrap();
    assert!(registry.register_handler("hello", answer()).is_err());
    assert!(registry.register_handler("specs", answer()).is_err());

    // same event, different pattern: distinct methods
    registry
        .register_autocmd("BufRead", AutocmdOptions { pattern: Some("*.a".into()), ..Default::default() }, noop())
        .unwrap();
    registry
        .register_autocmd("BufRead", AutocmdOptions { pattern: Some("*.b".into()), ..Default::default() }, noop())
        .unwrap();
}

#[test]
fn test_plain_handlers_have_no_spec() {
    let mut registry = PeerRegistry::new("/p");
    registry.register_handler("hello", answer()).unwrap();
    assert!(registry.specs().is_empty());
    assert!(registry.handler("hello").is_some_and(|h| h.is_sync()));
}

#[test]
fn test_manifest_is_delivered_once() {
    let mut registry = PeerRegistry::new("/p");
    registry.register_function("A", FunctionOptions::default(), answer()).unwrap();
    registry.register_function("B", FunctionOptions::default(), noop()).unwrap();

    let first = registry.take_manifest();
    assert_eq!(first.len(), 2);
    assert_eq!(first, registry.specs());
    assert!(registry.take_manifest().is_empty());
    assert!(registry.take_manifest().is_empty());
}

#[test]
fn test_manifest_concurrent_queries() {
    let mut registry = PeerRegistry::new("/p");
    for i in 0..8 {
        registry
            .register_function(format!("F{}", i), FunctionOptions::default(), answer())
            .unwrap();
    }

    let results: Vec<usize> = thread::scope(|s| {
        let handles: Vec<_> = (0..16)
            .map(|_| s.spawn(|| registry.take_manifest().len()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|&&n| n == 8).count(), 1);
    assert_eq!(results.iter().filter(|&&n| n == 0).count(), 15);
}

#[test]
fn test_spec_wire_form() {
    let mut registry = PeerRegistry::new("/p");
    registry
        .register_command(
            "Fmt",
            CommandOptions { bang: true, ..Default::default() },
            answer(),
        )
        .unwrap();

    let value = registry.specs()[0].to_value();
    assert_eq!(
        value,
        Value::map([
            ("type", Value::from("command")),
            ("name", Value::from("Fmt")),
            ("sync", Value::from(true)),
            ("opts", Value::map([("bang", "")])),
        ])
    );
}
