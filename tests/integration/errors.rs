//! Failure reporting: resolution, compile and runtime errors.

use prism::templating::{Engine, ErrorKind, TemplateError};
use prism::test_utils::TestSite;
use serde_json::json;

#[test]
fn test_missing_template_lists_searched_paths() {
    let site = TestSite::new();
    let err = site.engine().render("pages.missing", &json!({})).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Resolution);
    let TemplateError::NotFound {
        name,
        searched,
    } = &err
    else {
        panic!("expected NotFound, got {err:?}");
    };
    assert_eq!(name, "pages.missing");
    assert_eq!(
        searched,
        &vec![
            site.templates_dir().join("pages/missing.prism.html"),
            site.templates_dir().join("pages/missing.html"),
        ]
    );
}

#[test]
fn test_invalid_names_are_rejected() {
    let site = TestSite::new();
    for name in ["", "pages..home", "../secret"] {
        let err = site.engine().render(name, &json!({})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resolution, "{name}: {err}");
    }
}

#[test]
fn test_unknown_filter_names_the_filter() {
    let site = TestSite::new().with_template("page.html", "line one\n{{ title | shout }}");
    let err = site.engine().render("page", &json!({})).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Compile);
    let TemplateError::Compile {
        template,
        message,
        location,
        fragment,
    } = &err
    else {
        panic!("expected Compile, got {err:?}");
    };
    assert_eq!(template, "page");
    assert!(message.contains("unknown filter 'shout'"), "{message}");
    assert_eq!(location.line, 2);
    assert_eq!(fragment.as_deref(), Some("{{ title | shout }}"));
}

#[test]
fn test_unknown_directive_names_the_directive() {
    let site = TestSite::new().with_template("page.html", "@widget('x')");
    let err = site.engine().render("page", &json!({})).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Compile);
    assert!(err.to_string().contains("unknown directive 'widget'"), "{err}");
}

#[test]
fn test_unbalanced_blocks_fail_to_compile() {
    let site = TestSite::new()
        .with_template("open.html", "{% foreach items as item %}{{ item }}")
        .with_template("close.html", "@endauth")
        .with_template("nested.html", "@section('a') @section('b') @endsection @endsection");

    let engine = site.engine();
    for name in ["open", "close", "nested"] {
        let err = engine.render(name, &json!({})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Compile, "{name}: {err}");
    }
    assert_eq!(engine.compile_count(), 0);
    assert_eq!(site.artifact_count(), 0);
}

#[test]
fn test_runtime_errors_abort_the_render() {
    let site = TestSite::new().with_template("page.html", "before\n{{ items | join:',' }}\nafter");
    let err = site.engine().render("page", &json!({"items": "not a list"})).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Runtime);
    assert!(matches!(err, TemplateError::Runtime { line: Some(2), .. }), "{err:?}");
}

#[test]
fn test_strict_mode_reports_undefined_variables() {
    let site = TestSite::new().with_template("page.html", "{{ user.name }}");

    let lenient = site.engine();
    assert_eq!(lenient.render("page", &json!({})).unwrap(), "");

    let strict = Engine::new(site.config().with_strict(true));
    let err = strict.render("page", &json!({})).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Runtime);
}

#[test]
fn test_debug_mode_renders_runtime_errors_inline() {
    let site = TestSite::new()
        .with_template("page.html", "{{ 10 / zero }}")
        .with_template("broken.html", "{% if x %}");
    let engine = Engine::new(site.config().with_debug(true));

    let html = engine.render("page", &json!({"zero": 0})).unwrap();
    assert!(html.starts_with("<div class=\"prism-error\">"), "{html}");
    assert!(html.contains("<code>page</code>"), "{html}");
    assert!(html.contains("division by zero"), "{html}");

    assert_eq!(engine.render("broken", &json!({})).unwrap_err().kind(), ErrorKind::Compile);
    assert_eq!(engine.render("absent", &json!({})).unwrap_err().kind(), ErrorKind::Resolution);
}

#[test]
fn test_yielding_an_open_section_fails() {
    let site = TestSite::new().with_template("page.html", "@section('a') @yield('a') @endsection");
    let err = site.engine().render("page", &json!({})).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Runtime);
    assert!(err.to_string().contains("still open"), "{err}");
}
