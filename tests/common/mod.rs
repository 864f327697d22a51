//! Common test utilities for pipeline tests.

#![allow(dead_code)]

use std::path::Path;

use stencil_bundle::{BundleCompiler, CompiledBundle, ModuleUnificationDelegate, generate_data_segment};
use stencil_core::{DataSegment, Locator};
use stencil_runtime::{
    Application, ApplicationOptions, BasicComponentManager, BytecodeLoader, Implementation,
    Program, Registry, RegistryError, ResolverMap, StringBuilder,
};

pub const MAIN: &str = r#"<User @name="Chad" />"#;
pub const USER: &str = r#"<div class="user">{{@name}}</div>"#;

pub fn template(name: &str) -> Locator {
    ModuleUnificationDelegate::new("Main").template_locator(name)
}

/// Compiles `(component, source)` pairs with `Main` as the entry point.
pub fn compile(sources: &[(&str, &str)]) -> (CompiledBundle, DataSegment) {
    let mut compiler = BundleCompiler::new(ModuleUnificationDelegate::new("Main"));
    for (name, source) in sources {
        compiler.add(template(name), *source);
    }
    let bundle = compiler.compile().expect("bundle should compile");
    let data = generate_data_segment(&bundle.table);
    (bundle, data)
}

pub fn load(sources: &[(&str, &str)]) -> Program {
    let (bundle, data) = compile(sources);
    BytecodeLoader
        .load(bundle.heap, &data, &[template("Main")])
        .expect("program should load")
}

/// An application over the `smoke` resolver map, not yet booted.
pub fn smoke_app(sources: &[(&str, &str)]) -> Application<StringBuilder> {
    Application::new(ApplicationOptions {
        resolver_map: ResolverMap::module_unification("smoke"),
        ..ApplicationOptions::new(load(sources), template("Main"), StringBuilder::new())
    })
}

/// Initializer registering the basic component manager under `root`.
pub fn register_manager(
    root: &str,
) -> impl Fn(&mut Registry) -> Result<(), RegistryError> + Send + Sync + use<> {
    let key = format!("component-manager:/{}/component-managers/main", root);
    move |registry: &mut Registry| {
        registry.register(key.as_str(), Implementation::manager(BasicComponentManager))
    }
}

pub fn write_component(root: &Path, name: &str, source: &str) {
    let dir = root.join("src/ui/components").join(name);
    std::fs::create_dir_all(&dir).expect("create component dir");
    std::fs::write(dir.join("template.hbs"), source).expect("write template");
}
