//! Rendering tests against bundles produced by the real compiler

use stencil_bundle::{BundleCompiler, ModuleUnificationDelegate, generate_data_segment};
use stencil_core::{Locator, NamedArgs, Value};

use crate::{
    BasicComponentManager, BytecodeLoader, Document, DomBuilder, HelperArgs, Implementation,
    Program, Registry, RenderError, Renderer, Resolver, ResolverMap, ResolutionError,
    StringBuilder, SyncRenderer, serialize_children,
};

/// Compiles `(component, source)` pairs; the first one is the entry point.
fn load(sources: &[(&str, &str)]) -> (Program, Locator) {
    let delegate = ModuleUnificationDelegate::new(sources[0].0);
    let main = delegate.template_locator(sources[0].0);
    let templates: Vec<_> = sources
        .iter()
        .map(|(name, source)| (delegate.template_locator(name), *source))
        .collect();
    let mut compiler = BundleCompiler::new(delegate);
    for (locator, source) in templates {
        compiler.add(locator, source);
    }
    let bundle = compiler.compile().unwrap();
    let data = generate_data_segment(&bundle.table);
    let program = BytecodeLoader
        .load(bundle.heap, &data, &[main.clone()])
        .unwrap();
    (program, main)
}

fn registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .register(
            "component-manager:/smoke/component-managers/main",
            Implementation::manager(BasicComponentManager),
        )
        .unwrap();
    registry
}

fn render_with(
    renderer: SyncRenderer,
    sources: &[(&str, &str)],
    registry: &Registry,
    this: Value,
) -> (Result<(), RenderError>, String) {
    let (program, main) = load(sources);
    let map = ResolverMap::module_unification("smoke");
    let resolver = Resolver::new(&map, registry);
    let mut builder = StringBuilder::new();
    let result = renderer.render(&program, &main, this, &resolver, &mut builder);
    (result, builder.into_string())
}

fn render_this(sources: &[(&str, &str)], this: Value) -> String {
    let (result, html) = render_with(SyncRenderer::default(), sources, &registry(), this);
    result.unwrap();
    html
}

fn render(sources: &[(&str, &str)]) -> String {
    render_this(sources, Value::Null)
}

const MAIN: &str = r#"<User @name="Chad" />"#;
const USER: &str = r#"<div class="user">{{@name}}</div>"#;

#[test]
fn test_renders_nested_component() {
    insta::assert_snapshot!(render(&[("Main", MAIN), ("User", USER)]), @r#"<div class="user">Chad</div>"#);
}

#[test]
fn test_registered_helper_overrides_builtin() {
    let mut registry = registry();
    registry
        .register(
            "helper:/smoke/ui/if",
            Implementation::helper(|_: &HelperArgs| Value::from("STUB")),
        )
        .unwrap();
    let sources = [
        ("Main", MAIN),
        ("User", r#"<div class="user">{{@name}} {{if true "yes"}}</div>"#),
    ];
    let (result, html) = render_with(SyncRenderer::default(), &sources, &registry, Value::Null);
    result.unwrap();
    insta::assert_snapshot!(html, @r#"<div class="user">Chad STUB</div>"#);

    insta::assert_snapshot!(render(&sources), @r#"<div class="user">Chad yes</div>"#);
}

#[test]
fn test_each_binds_item_and_index() {
    let sources = [(
        "Main",
        "<ul>{{#each this.items as |item i|}}<li>{{i}}:{{item.name}}</li>{{else}}<li>none</li>{{/each}}</ul>",
    )];
    let items = serde_json::json!({ "items": [{ "name": "a" }, { "name": "b" }] });
    insta::assert_snapshot!(render_this(&sources, items.into()), @"<ul><li>0:a</li><li>1:b</li></ul>");

    let empty = serde_json::json!({ "items": [] });
    insta::assert_snapshot!(render_this(&sources, empty.into()), @"<ul><li>none</li></ul>");
}

#[test]
fn test_yield_renders_caller_block_in_caller_scope() {
    let html = render_this(
        &[
            ("Main", r#"{{#each this.names as |n|}}<Card @title="Hi" as |t|>{{t}}, {{n}}</Card>{{/each}}"#),
            ("Card", "<section>{{yield @title}}</section>"),
        ],
        serde_json::json!({ "names": ["Ann", "Bob"] }).into(),
    );
    insta::assert_snapshot!(html, @"<section>Hi, Ann</section><section>Hi, Bob</section>");
}

#[test]
fn test_yield_without_block_renders_nothing() {
    let html = render(&[("Main", "<Card />"), ("Card", "<p>{{yield}}</p>")]);
    assert_eq!(html, "<p></p>");
}

#[test]
fn test_attribute_rules_and_splattributes() {
    let html = render(&[
        (
            "Main",
            r#"<Button class="primary" disabled={{true}} title={{this.missing}} hidden={{false}} />"#,
        ),
        ("Button", r#"<button class="btn" type="button" ...attributes>go</button>"#),
    ]);
    insta::assert_snapshot!(html, @r#"<button class="primary" type="button" disabled="">go</button>"#);
}

#[test]
fn test_interpolated_attribute() {
    let html = render_this(
        &[("Main", r#"<div class="user {{this.kind}}" data-n={{this.n}}></div>"#)],
        Value::map([("kind", Value::from("admin")), ("n", Value::from(3))]),
    );
    assert_eq!(html, r#"<div class="user admin" data-n="3"></div>"#);
}

#[test]
fn test_component_state_from_registry() {
    let mut registry = registry();
    registry
        .register(
            "component:/smoke/ui/User",
            Implementation::component(|args: &NamedArgs| {
                let name = args.get("name").cloned().unwrap_or_default();
                Value::map([("greeting", format!("Hello {}", name))])
            }),
        )
        .unwrap();
    let (result, html) = render_with(
        SyncRenderer::default(),
        &[("Main", MAIN), ("User", "<p>{{this.greeting}}</p>")],
        &registry,
        Value::Null,
    );
    result.unwrap();
    assert_eq!(html, "<p>Hello Chad</p>");
}

#[test]
fn test_missing_manager_fails_without_output() {
    let (result, html) = render_with(
        SyncRenderer::default(),
        &[("Main", "<p>before</p><User @name=\"x\" />"), ("User", USER)],
        &Registry::new(),
        Value::Null,
    );
    match result {
        Err(RenderError::Resolution(ResolutionError::Missing { key })) => {
            assert_eq!(key, "component-manager:/smoke/component-managers/main");
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(html, "");
}

#[test]
fn test_recursion_limit() {
    let (result, html) = render_with(
        SyncRenderer::default().with_recursion_limit(8),
        &[("Main", "<Loop />"), ("Loop", "<i></i><Loop />")],
        &registry(),
        Value::Null,
    );
    assert!(matches!(result, Err(RenderError::RecursionLimit(8))));
    assert_eq!(html, "");
}

#[test]
fn test_absent_helper_renders_nothing() {
    let html = render_this(
        &[("Main", "a{{format-date this.when}}b")],
        Value::map([("when", "today")]),
    );
    assert_eq!(html, "ab");
}

#[test]
fn test_trusted_and_escaped_output() {
    let html = render_this(
        &[("Main", "{{{this.html}}}|{{this.html}}")],
        Value::map([("html", "<b>x</b>")]),
    );
    assert_eq!(html, "<b>x</b>|&lt;b&gt;x&lt;/b&gt;");
}

#[test]
fn test_let_and_unless() {
    assert_eq!(
        render(&[("Main", r#"{{#let "a" (concat "b" "c") as |x y|}}{{y}}{{x}}{{/let}}"#)]),
        "bca"
    );
    assert_eq!(
        render_this(
            &[("Main", "{{#unless this.ok}}no{{else}}yes{{/unless}}")],
            Value::map([("ok", true)])
        ),
        "yes"
    );
}

#[test]
fn test_builtin_helpers_in_templates() {
    let html = render_this(
        &[(
            "Main",
            r#"{{if (eq this.n 1) "one" "many"}} {{not this.n}} {{or this.missing "dflt"}} {{concat "x" this.n}}"#,
        )],
        Value::map([("n", 1)]),
    );
    assert_eq!(html, "one false dflt x1");
}

#[test]
fn test_renders_into_dom() {
    let (program, main) = load(&[("Main", MAIN), ("User", USER)]);
    let map = ResolverMap::module_unification("smoke");
    let registry = registry();
    let resolver = Resolver::new(&map, &registry);
    let mut builder = DomBuilder::new(Document::new());
    SyncRenderer::default()
        .render(&program, &main, Value::Null, &resolver, &mut builder)
        .unwrap();
    let document = builder.into_document();
    assert_eq!(
        serialize_children(&document.body),
        r#"<div class="user">Chad</div>"#
    );
}

#[test]
fn test_void_elements_match_the_parser() {
    let source = r#"<object><param name="a">x<br></object>"#;
    assert_eq!(
        render(&[("Main", source)]),
        r#"<object><param name="a">x<br></object>"#
    );

    let (program, main) = load(&[("Main", source)]);
    let map = ResolverMap::module_unification("smoke");
    let registry = registry();
    let resolver = Resolver::new(&map, &registry);
    let mut builder = DomBuilder::new(Document::new());
    SyncRenderer::default()
        .render(&program, &main, Value::Null, &resolver, &mut builder)
        .unwrap();
    assert_eq!(
        serialize_children(&builder.into_document().body),
        r#"<object><param name="a">x<br></object>"#
    );
}

#[test]
fn test_unknown_entry() {
    let (program, _) = load(&[("Main", "x")]);
    let map = ResolverMap::module_unification("smoke");
    let registry = Registry::new();
    let resolver = Resolver::new(&map, &registry);
    let other = Locator::default_export("./src/ui/components/Other/template.hbs");
    let err = SyncRenderer::default()
        .render(&program, &other, Value::Null, &resolver, &mut StringBuilder::new())
        .unwrap_err();
    assert!(matches!(err, RenderError::UnknownEntry(_)));
}
