//! End-to-end tests: compile, load, boot and render.

mod common;

use async_trait::async_trait;
use common::{MAIN, USER, compile, load, register_manager, smoke_app, template};
use stencil_core::{Locator, Value};
use stencil_runtime::{
    Application, ApplicationOptions, BootError, BytecodeLoader, HelperArgs, Implementation,
    Initializer, LoadError, Program, Registry, RegistryError, RenderError, Renderer,
    ResolutionError, Resolver, ResolverMap, StringBuilder, TreeBuilder,
};

#[tokio::test]
async fn test_boot_renders_main() {
    let mut app = smoke_app(&[("Main", MAIN), ("User", USER)]);
    app.register_initializer(register_manager("smoke")).unwrap();
    app.boot().await.unwrap();
    insta::assert_snapshot!(app.output().as_str(), @r#"<div class="user">Chad</div>"#);
}

#[tokio::test]
async fn test_registered_if_helper_wins_over_builtin() {
    let mut app = smoke_app(&[
        ("Main", MAIN),
        ("User", r#"<div class="user">{{@name}} {{if true "yes"}}</div>"#),
    ]);
    app.register_initializer(register_manager("smoke")).unwrap();
    app.register_initializer(|registry: &mut Registry| {
        registry.register(
            "helper:/smoke/ui/if",
            Implementation::helper(|_: &HelperArgs| Value::from("STUB")),
        )
    })
    .unwrap();
    app.boot().await.unwrap();
    insta::assert_snapshot!(app.into_output().into_string(), @r#"<div class="user">Chad STUB</div>"#);
}

/// Fails unless an earlier initializer registered `key`.
struct RequiresKey {
    key: &'static str,
}

#[async_trait]
impl Initializer for RequiresKey {
    async fn initialize(&self, registry: &mut Registry) -> Result<(), BootError> {
        tokio::task::yield_now().await;
        if registry.has(self.key) {
            Ok(())
        } else {
            Err(BootError::initializer(format!("{} is not registered", self.key)))
        }
    }
}

#[tokio::test]
async fn test_initializers_run_in_registration_order() {
    let mut app = smoke_app(&[("Main", MAIN), ("User", USER)]);
    app.register_initializer(register_manager("smoke")).unwrap();
    app.register_initializer(RequiresKey {
        key: "component-manager:/smoke/component-managers/main",
    })
    .unwrap();
    app.boot().await.unwrap();

    let mut app = smoke_app(&[("Main", MAIN), ("User", USER)]);
    app.register_initializer(RequiresKey {
        key: "component-manager:/smoke/component-managers/main",
    })
    .unwrap();
    app.register_initializer(register_manager("smoke")).unwrap();
    let err = app.boot().await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Initializer failed: component-manager:/smoke/component-managers/main is not registered"
    );
    assert_eq!(app.output().as_str(), "");
}

#[tokio::test]
async fn test_boot_is_single_use() {
    let mut app = smoke_app(&[("Main", MAIN), ("User", USER)]);
    app.register_initializer(register_manager("smoke")).unwrap();
    app.boot().await.unwrap();
    assert!(app.is_booted());

    assert!(matches!(app.boot().await, Err(BootError::AlreadyBooted)));
    assert!(matches!(
        app.register_initializer(register_manager("smoke")),
        Err(BootError::AlreadyBooted)
    ));
    assert_eq!(app.output().as_str(), r#"<div class="user">Chad</div>"#);
}

#[tokio::test]
async fn test_failed_boot_cannot_be_retried() {
    let mut app = smoke_app(&[("Main", MAIN), ("User", USER)]);
    let err = app.boot().await.unwrap_err();
    match err {
        BootError::Render(RenderError::Resolution(ResolutionError::Missing { key })) => {
            assert_eq!(key, "component-manager:/smoke/component-managers/main");
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(matches!(app.boot().await, Err(BootError::AlreadyBooted)));
    assert_eq!(app.output().as_str(), "");
}

#[tokio::test]
async fn test_registry_errors_abort_boot() {
    let mut app = smoke_app(&[("Main", MAIN), ("User", USER)]);
    app.register_initializer(|registry: &mut Registry| {
        registry.register("not-a-key", Value::Null.into())
    })
    .unwrap();
    let err = app.boot().await.unwrap_err();
    assert!(matches!(
        err,
        BootError::Registry(RegistryError::MalformedKey(ref key)) if key == "not-a-key"
    ));
}

#[tokio::test]
async fn test_root_component_provides_this() {
    let mut app = smoke_app(&[("Main", "<h1>{{this.title}}</h1>")]);
    app.register_initializer(register_manager("smoke")).unwrap();
    app.register_initializer(|registry: &mut Registry| {
        registry.register(
            "component:/smoke/ui/Main",
            Implementation::component(|_: &stencil_core::NamedArgs| {
                Value::map([("title", "Hello")])
            }),
        )
    })
    .unwrap();
    app.boot().await.unwrap();
    assert_eq!(app.output().as_str(), "<h1>Hello</h1>");
}

struct Banner;

impl Renderer for Banner {
    fn render(
        &self,
        _program: &Program,
        entry: &Locator,
        _this: Value,
        _resolver: &Resolver<'_>,
        builder: &mut dyn TreeBuilder,
    ) -> Result<(), RenderError> {
        builder.append_comment(&entry.to_string());
        Ok(())
    }
}

#[tokio::test]
async fn test_registered_renderer_replaces_default() {
    let mut app = smoke_app(&[("Main", "<p>default</p>")]);
    app.register_initializer(|registry: &mut Registry| {
        registry.register("renderer:/smoke/main/main", Implementation::renderer(Banner))
    })
    .unwrap();
    app.boot().await.unwrap();
    assert_eq!(
        app.output().as_str(),
        "<!--./src/ui/components/Main/template.hbs#default-->"
    );
}

#[tokio::test]
async fn test_root_name_override() {
    let mut app = Application::new(ApplicationOptions {
        root_name: Some("custom".into()),
        resolver_map: ResolverMap::module_unification("smoke"),
        ..ApplicationOptions::new(
            load(&[("Main", MAIN), ("User", USER)]),
            template("Main"),
            StringBuilder::new(),
        )
    });
    assert_eq!(app.root_name(), "custom");
    app.register_initializer(register_manager("custom")).unwrap();
    app.boot().await.unwrap();
    assert_eq!(app.output().as_str(), r#"<div class="user">Chad</div>"#);
    assert!(app
        .registry()
        .has("component-manager:/custom/component-managers/main"));
}

#[tokio::test]
async fn test_unresolvable_manager_collection_falls_back() {
    let mut map = ResolverMap::module_unification("smoke");
    map.collections["component-managers"].unresolvable = true;
    let mut app = Application::new(ApplicationOptions {
        resolver_map: map,
        ..ApplicationOptions::new(
            load(&[("Main", MAIN), ("User", USER)]),
            template("Main"),
            StringBuilder::new(),
        )
    });
    app.boot().await.unwrap();
    assert_eq!(app.output().as_str(), r#"<div class="user">Chad</div>"#);
}

#[test]
fn test_compilation_is_deterministic() {
    let sources = [
        ("Main", r#"<User @name="Chad" />{{#each this.items as |i|}}<Card>{{i}}</Card>{{/each}}"#),
        ("User", USER),
        ("Card", "<section ...attributes>{{yield}}</section>"),
    ];
    let (first, first_data) = compile(&sources);
    let (second, second_data) = compile(&sources);
    assert_eq!(first.heap.as_bytes(), second.heap.as_bytes());
    assert_eq!(first_data.to_json().unwrap(), second_data.to_json().unwrap());
}

#[test]
fn test_loader_rejects_tampered_segments() {
    let (bundle, data) = compile(&[("Main", MAIN), ("User", USER)]);

    let mut shifted = data.clone();
    let handle = shifted.table[1].metadata.handle.as_mut().unwrap();
    handle.offset = bundle.heap.len() as u32;
    let err = BytecodeLoader
        .load(bundle.heap.clone(), &shifted, &[template("Main")])
        .unwrap_err();
    assert!(matches!(err, LoadError::OffsetOutOfRange { .. }));

    let mut overlapping = data.clone();
    overlapping.table[1].metadata.handle = overlapping.table[0].metadata.handle;
    let err = BytecodeLoader
        .load(bundle.heap.clone(), &overlapping, &[template("Main")])
        .unwrap_err();
    assert!(matches!(err, LoadError::OverlappingRanges { .. }));

    let err = BytecodeLoader
        .load(bundle.heap.clone(), &data, &[template("Main"), template("User")])
        .unwrap_err();
    assert!(matches!(err, LoadError::EntryCountMismatch { .. }));

    let err = BytecodeLoader
        .load(bundle.heap, &data, &[template("User")])
        .unwrap_err();
    assert!(matches!(err, LoadError::UnknownEntryPoint(_)));
}
