//! Artifact reuse, staleness and corruption handling.

use anyhow::Result;
use prism::templating::Engine;
use prism::test_utils::TestSite;
use serde_json::json;

use crate::common::touch_forward;

#[test]
fn test_artifact_is_reused_until_source_changes() -> Result<()> {
    let site = TestSite::new();
    let source = site.write_template("page.html", "v1 {{ n }}");

    let engine = site.engine();
    assert_eq!(engine.render("page", &json!({"n": 1}))?, "v1 1");
    assert_eq!(engine.render("page", &json!({"n": 2}))?, "v1 2");
    assert_eq!(engine.compile_count(), 1);
    assert_eq!(site.artifact_count(), 1);

    std::fs::write(&source, "v2 {{ n }}")?;
    touch_forward(&source, 60);
    assert_eq!(engine.render("page", &json!({"n": 3}))?, "v2 3");
    assert_eq!(engine.compile_count(), 2);
    assert_eq!(site.artifact_count(), 1);
    Ok(())
}

#[test]
fn test_artifacts_survive_engine_restarts() -> Result<()> {
    let site = TestSite::new().with_template("page.html", "cached");

    let first = site.engine();
    first.render("page", &json!({}))?;
    assert_eq!(first.compile_count(), 1);

    let second = site.engine();
    assert_eq!(second.render("page", &json!({}))?, "cached");
    assert_eq!(second.compile_count(), 0);
    Ok(())
}

#[test]
fn test_artifact_path_is_deterministic() -> Result<()> {
    let site = TestSite::new().with_template("pages/home.html", "home");

    let path = site.engine().artifact_path("pages.home")?;
    assert_eq!(path, site.engine().artifact_path("pages.home")?);
    assert!(path.starts_with(site.cache_dir()));
    assert!(path.to_string_lossy().ends_with(".prism.json"));

    site.engine().render("pages.home", &json!({}))?;
    assert!(path.exists());
    Ok(())
}

#[test]
fn test_corrupt_artifact_is_recompiled() -> Result<()> {
    let site = TestSite::new().with_template("page.html", "ok");
    let engine = site.engine();
    engine.render("page", &json!({}))?;

    let artifact = engine.artifact_path("page")?;
    std::fs::write(&artifact, "{ not a program")?;
    touch_forward(&artifact, 60);

    let fresh = site.engine();
    assert_eq!(fresh.render("page", &json!({}))?, "ok");
    assert_eq!(fresh.compile_count(), 1);
    Ok(())
}

#[test]
fn test_disabled_cache_always_compiles() -> Result<()> {
    let site = TestSite::new().with_template("page.html", "x");
    let engine = Engine::new(site.config().with_cache(false));

    engine.render("page", &json!({}))?;
    engine.render("page", &json!({}))?;
    assert_eq!(engine.compile_count(), 2);
    assert_eq!(site.artifact_count(), 0);
    Ok(())
}

#[test]
fn test_string_templates_are_keyed_by_content() -> Result<()> {
    let site = TestSite::new();
    let engine = site.engine();

    engine.render_string("{{ a }}", &json!({"a": 1}))?;
    engine.render_string("{{ a }}", &json!({"a": 2}))?;
    engine.render_string("{{ b }}", &json!({"b": 3}))?;
    assert_eq!(engine.compile_count(), 2);
    assert_eq!(site.artifact_count(), 2);
    Ok(())
}

#[test]
fn test_clear_cache() -> Result<()> {
    let site = TestSite::new().with_template("a.html", "a").with_template("b.html", "b");
    let engine = site.engine();
    engine.render("a", &json!({}))?;
    engine.render("b", &json!({}))?;

    assert_eq!(engine.clear_cache()?, 2);
    assert_eq!(site.artifact_count(), 0);

    engine.render("a", &json!({}))?;
    assert_eq!(engine.compile_count(), 3);
    Ok(())
}

#[test]
fn test_concurrent_renders_share_one_engine() -> Result<()> {
    let site = TestSite::new()
        .with_template("layout.html", "<@yield('body')>")
        .with_template("page.html", "@extends('layout')\n@section('body'){{ n }}@endsection");
    let engine = site.engine();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let engine = &engine;
                scope.spawn(move || engine.render("page", &json!({"n": n})))
            })
            .collect();
        for (n, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap().unwrap(), format!("<{n}>"));
        }
    });
    Ok(())
}
