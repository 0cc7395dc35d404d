//! Custom directives, filters, functions and host services.

use anyhow::Result;
use prism::templating::Host;
use prism::test_utils::TestSite;
use serde_json::{Value, json};

struct SignedIn {
    env: &'static str,
}

impl Host for SignedIn {
    fn asset_url(&self, path: &str) -> String {
        format!("https://cdn.test/{path}?v=3")
    }

    fn environment(&self) -> Option<String> {
        Some(self.env.to_string())
    }

    fn is_authenticated(&self, guard: Option<&str>) -> bool {
        guard != Some("admin")
    }
}

#[test]
fn test_host_directives_degrade_without_host() -> Result<()> {
    let site = TestSite::new().with_template(
        "page.html",
        "@auth in @endauth|@guest out @endguest|@production prod @endproduction|@css('app.css')",
    );

    let out = site.engine().render("page", &json!({}))?;
    assert_eq!(out, "| out ||<link rel=\"stylesheet\" href=\"/app.css\">");
    Ok(())
}

#[test]
fn test_host_directives_use_installed_host() -> Result<()> {
    let site = TestSite::new().with_template(
        "page.html",
        "@auth in @endauth|@auth('admin') admin @endauth|@production prod @endproduction|@env('staging') stage @endenv|@asset('a.js')",
    );

    let mut engine = site.engine();
    engine.set_host(SignedIn {
        env: "production",
    });
    let out = engine.render("page", &json!({}))?;
    assert_eq!(out, " in || prod ||https://cdn.test/a.js?v=3");
    Ok(())
}

#[test]
fn test_overriding_builtin_directive() -> Result<()> {
    let site = TestSite::new().with_template("page.html", "@auth members @endauth");

    let mut engine = site.engine();
    engine.register_block_directive(
        "auth",
        |_| Ok("{% if user %}".to_string()),
        |_| Ok("{% endif %}".to_string()),
    );
    assert_eq!(engine.render("page", &json!({"user": "al"}))?, " members ");
    assert_eq!(engine.render("page", &json!({}))?, "");
    Ok(())
}

#[test]
fn test_custom_block_directive_with_arguments() -> Result<()> {
    let site = TestSite::new().with_template("page.html", "@card('Title', level)body @endcard");

    let mut engine = site.engine();
    engine.register_block_directive(
        "card",
        |args| Ok(format!("{{% set card = [{args}] %}}<section data-level=\"{{{{ card[1] }}}}\"><h2>{{{{ card[0] }}}}</h2>")),
        |_| Ok("</section>".to_string()),
    );

    let out = engine.render("page", &json!({"level": 2}))?;
    assert_eq!(out, "<section data-level=\"2\"><h2>Title</h2>body </section>");
    Ok(())
}

#[test]
fn test_directives_can_expand_to_directives() -> Result<()> {
    let site = TestSite::new().with_template("page.html", "@price(amount)");

    let mut engine = site.engine();
    engine.register_directive("price", |args| Ok(format!("$@money({args})")));
    assert_eq!(engine.render("page", &json!({"amount": 1999.5}))?, "$1,999.50");
    Ok(())
}

#[test]
fn test_custom_filters_and_functions() -> Result<()> {
    let site = TestSite::new().with_template(
        "page.html",
        "{{ name | initials }}|{{ bio | markdown }}|{{ plural(count, 'item') }}",
    );

    let mut engine = site.engine();
    engine.register_filter("initials", |value, _| {
        let text = value.as_str().unwrap_or_default();
        Ok(Value::String(text.split_whitespace().filter_map(|w| w.chars().next()).collect()))
    });
    engine.register_safe_filter("markdown", |value, _| {
        Ok(Value::String(format!("<em>{}</em>", value.as_str().unwrap_or_default())))
    });
    engine.register_function("plural", |_, args| {
        let count = args.first().and_then(Value::as_i64).ok_or("plural() expects a count")?;
        let word = args.get(1).and_then(Value::as_str).ok_or("plural() expects a word")?;
        Ok(Value::String(if count == 1 { format!("1 {word}") } else { format!("{count} {word}s") }))
    });

    let out = engine.render("page", &json!({"name": "Ada Lovelace", "bio": "math", "count": 3}))?;
    assert_eq!(out, "AL|<em>math</em>|3 items");
    Ok(())
}

#[test]
fn test_filters_resolve_at_render_time() -> Result<()> {
    let site = TestSite::new().with_template("page.html", "{{ 'x' | upper }}");

    let mut engine = site.engine();
    assert_eq!(engine.render("page", &json!({}))?, "X");

    engine.register_filter("upper", |_, _| Ok(json!("custom")));
    assert_eq!(engine.render("page", &json!({}))?, "custom");
    Ok(())
}

#[test]
fn test_safe_flag_resolves_at_render_time() -> Result<()> {
    let site = TestSite::new().with_template("page.html", "{{ html | raw }}");
    let data = json!({"html": "<b>"});

    let mut engine = site.engine();
    assert_eq!(engine.render("page", &data)?, "<b>");

    engine.register_filter("raw", |value, _| Ok(value.clone()));
    assert_eq!(engine.render("page", &data)?, "&lt;b&gt;");
    assert_eq!(engine.compile_count(), 1);
    Ok(())
}
