//! Rendering named templates from disk.

use anyhow::Result;
use prism::test_utils::{TestSite, init_test_logging};
use serde_json::json;

#[test]
fn test_escaped_interpolation() -> Result<()> {
    init_test_logging(None);
    let site = TestSite::new().with_template("greet.html", "Hello, {{ name }}!");

    let out = site.engine().render("greet", &json!({"name": "<b>Al</b>"}))?;
    assert_eq!(out, "Hello, &lt;b&gt;Al&lt;/b&gt;!");
    Ok(())
}

#[test]
fn test_raw_interpolation_and_safe_filters() -> Result<()> {
    let site = TestSite::new()
        .with_template("raw.html", "{{{ html }}}|{{ html }}|{{ html | safe }}|{{ text | nl2br }}");

    let out = site.engine().render("raw", &json!({"html": "<script>", "text": "a\n<b>"}))?;
    assert_eq!(out, "<script>|&lt;script&gt;|<script>|a<br>\n&lt;b&gt;");
    Ok(())
}

#[test]
fn test_comments_and_raw_blocks() -> Result<()> {
    let site = TestSite::new()
        .with_template("comment.html", "{# just a note #}{{-- and {{ another }} --}}")
        .with_template("verbatim.html", "{% raw %}{{ name }} @if(x){% endraw %}|@verbatim{{ y }}@endverbatim");

    let engine = site.engine();
    assert_eq!(engine.render("comment", &json!({}))?, "");
    assert_eq!(engine.render("verbatim", &json!({"name": "ignored"}))?, "{{ name }} @if(x)|{{ y }}");
    Ok(())
}

#[test]
fn test_dotted_names_and_extension_order() -> Result<()> {
    let site = TestSite::new()
        .with_template("pages/home.prism.html", "prism")
        .with_template("pages/home.html", "html")
        .with_template("pages/about.html", "about");

    let engine = site.engine();
    assert_eq!(engine.render("pages.home", &json!({}))?, "prism");
    assert_eq!(engine.render("pages.about", &json!({}))?, "about");
    assert!(engine.template_exists("pages.about"));
    assert!(!engine.template_exists("pages.contact"));
    Ok(())
}

#[test]
fn test_control_flow() -> Result<()> {
    let site = TestSite::new().with_template(
        "list.html",
        "@if(ok)Y @else N @endif\n@forelse(users as user){{ loop.index }}.{{ user.name | upper }}{% if !loop.last %}, {% endif %}{% empty %}nobody{% endforelse %}",
    );

    let engine = site.engine();
    let out = engine.render("list", &json!({"ok": false, "users": [{"name": "al"}, {"name": "bo"}]}))?;
    assert_eq!(out, " N \n1.AL, 2.BO");

    let out = engine.render("list", &json!({"ok": true, "users": []}))?;
    assert_eq!(out, "Y \nnobody");
    Ok(())
}

#[test]
fn test_filter_pipelines() -> Result<()> {
    let site = TestSite::new().with_template(
        "filters.html",
        "{{ title | trim | title }}|{{ tags | sort | join:', ' }}|{{ price | number_format:2 }}|{{ missing | default:'n/a' }}|{{ 'Hello World' | slug }}",
    );

    let out = site.engine().render(
        "filters",
        &json!({"title": "  the prism book ", "tags": ["b", "c", "a"], "price": 1234.5}),
    )?;
    assert_eq!(out, "The Prism Book|a, b, c|1,234.50|n/a|hello-world");
    Ok(())
}

#[test]
fn test_builtin_formatting_directives() -> Result<()> {
    let site = TestSite::new().with_template("fmt.html", "@upper(name) @money(total) @number(count) @json(tags)");

    let out = site.engine().render("fmt", &json!({"name": "al", "total": 5, "count": 12345, "tags": ["x"]}))?;
    assert_eq!(out, "AL 5.00 12,345 [\"x\"]");
    Ok(())
}

#[test]
fn test_includes_do_not_leak_overrides() -> Result<()> {
    let site = TestSite::new()
        .with_template("page.html", "@include('partials.card', {title: 'Card'})|{{ title }}@includeIf('partials.missing')")
        .with_template("partials/card.html", "[{{ title }} by {{ author }}]");

    let out = site.engine().render("page", &json!({"title": "Page", "author": "Al"}))?;
    assert_eq!(out, "[Card by Al]|Page");
    Ok(())
}

#[test]
fn test_components_with_named_slots() -> Result<()> {
    let site = TestSite::new()
        .with_template(
            "page.html",
            "@component('components.alert', {level: 'warn'})\n@slot('title')Heads up @endslot\nCheck <this>\n@endcomponent",
        )
        .with_template("components/alert.html", "<div class=\"alert-{{ level }}\"><h4>{{{ title }}}</h4>{{{ slot | trim }}}</div>");

    let out = site.engine().render("page", &json!({}))?;
    assert_eq!(out, "<div class=\"alert-warn\"><h4>Heads up </h4>Check <this></div>");
    Ok(())
}

#[test]
fn test_component_aliases() -> Result<()> {
    let site = TestSite::new()
        .with_template("page.html", "@component('badge', {text: 'new'})@endcomponent")
        .with_template("ui/badge.html", "<span>{{ text }}</span>");

    let mut engine = site.engine();
    engine.register_component("badge", "ui.badge");
    assert_eq!(engine.render("page", &json!({}))?, "<span>new</span>");
    Ok(())
}

#[test]
fn test_globals_are_shadowed_by_call_data() -> Result<()> {
    let site = TestSite::new().with_template("g.html", "{{ app }}/{{ user }}");

    let mut engine = site.engine();
    engine.add_global("app", json!("Prism"));
    engine.add_global("user", json!("guest"));

    assert_eq!(engine.render("g", &json!({"user": "al"}))?, "Prism/al");
    assert_eq!(engine.render("g", &json!({}))?, "Prism/guest");
    Ok(())
}

#[test]
fn test_render_string() -> Result<()> {
    let site = TestSite::new().with_template("partials/name.html", "<{{ name }}>");
    let engine = site.engine();

    let out = engine.render_string("Hi @include('partials.name')", &json!({"name": "Al"}))?;
    assert_eq!(out, "Hi <Al>");
    Ok(())
}
