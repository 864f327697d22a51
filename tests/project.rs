//! On-disk projects, dist directories and server-side rendering.

mod common;

use common::{MAIN, USER, template, write_component};
use stencil::{Error, Project, RenderOptions, read_dist, render_dist, write_dist};
use stencil_bundle::generate_data_segment;
use stencil_core::Value;
use stencil_runtime::BytecodeLoader;
use tempfile::TempDir;

fn project(sources: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (name, source) in sources {
        write_component(dir.path(), name, source);
    }
    dir
}

#[test]
fn test_load_finds_templates_sorted() {
    let dir = project(&[("User", USER), ("Main", MAIN), ("Card", "<section></section>")]);
    std::fs::write(dir.path().join("src/ui/components/User/notes.txt"), "ignored").unwrap();

    let project = Project::load(dir.path(), "Main").unwrap();
    let names: Vec<_> = project.templates().iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Card", "Main", "User"]);
    assert_eq!(project.templates()[1].locator, template("Main"));
    assert_eq!(project.templates()[1].source, MAIN);
}

#[test]
fn test_load_errors() {
    let empty = TempDir::new().unwrap();
    std::fs::create_dir_all(empty.path().join("src/ui/components")).unwrap();
    assert!(matches!(
        Project::load(empty.path(), "Main"),
        Err(Error::NoTemplates(_))
    ));

    let dir = project(&[("User", USER)]);
    assert!(matches!(
        Project::load(dir.path(), "Main"),
        Err(Error::MissingMain(ref name)) if name == "Main"
    ));
}

#[test]
fn test_compile_errors_point_at_project_files() {
    let dir = project(&[("Main", "<div>"), ("User", USER)]);
    let project = Project::load(dir.path(), "Main").unwrap();
    let err = project.compile().unwrap_err();
    let errors = err.compile_errors().unwrap();
    assert_eq!(errors.len(), 1);
    let source = project.template(&errors[0].locator).unwrap();
    assert_eq!(source.name, "Main");
    assert!(source.path.ends_with("src/ui/components/Main/template.hbs"));
}

#[test]
fn test_dist_round_trip() {
    let dir = project(&[("Main", MAIN), ("User", USER)]);
    let project = Project::load(dir.path(), "Main").unwrap();
    let bundle = project.compile().unwrap();
    let data = generate_data_segment(&bundle.table);

    for module in [false, true] {
        let out = TempDir::new().unwrap();
        write_dist(out.path(), &bundle.heap, &data, module).unwrap();
        let file = if module { "data.js" } else { "data.json" };
        assert!(out.path().join(file).exists());

        let (heap, read) = read_dist(out.path()).unwrap();
        assert_eq!(heap, bundle.heap);
        assert_eq!(read, data);
        assert!(BytecodeLoader.load(heap, &read, &[template("Main")]).is_ok());
    }
}

#[tokio::test]
async fn test_render_dist() {
    let dir = project(&[("Main", MAIN), ("User", USER)]);
    let project = Project::load(dir.path(), "Main").unwrap();
    let bundle = project.compile().unwrap();
    let out = TempDir::new().unwrap();
    write_dist(out.path(), &bundle.heap, &generate_data_segment(&bundle.table), false).unwrap();

    let html = render_dist(out.path(), RenderOptions::new(template("Main")))
        .await
        .unwrap();
    insta::assert_snapshot!(html, @r#"<div class="user">Chad</div>"#);
}

#[tokio::test]
async fn test_render_dist_with_state() {
    let dir = project(&[(
        "Main",
        "<ul>{{#each this.people as |p|}}<li>{{p.name}}</li>{{/each}}</ul>",
    )]);
    let project = Project::load(dir.path(), "Main").unwrap();
    let bundle = project.compile().unwrap();
    let out = TempDir::new().unwrap();
    write_dist(out.path(), &bundle.heap, &generate_data_segment(&bundle.table), true).unwrap();

    let mut options = RenderOptions::new(template("Main"));
    options.state = Some(Value::from(serde_json::json!({
        "people": [{ "name": "Ann" }, { "name": "Bob" }]
    })));
    let html = render_dist(out.path(), options).await.unwrap();
    insta::assert_snapshot!(html, @"<ul><li>Ann</li><li>Bob</li></ul>");
}

#[tokio::test]
async fn test_render_dist_reports_missing_files() {
    let out = TempDir::new().unwrap();
    let err = render_dist(out.path(), RenderOptions::new(template("Main")))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
}
