//! Layout inheritance across templates on disk.

use anyhow::Result;
use prism::test_utils::TestSite;
use serde_json::json;

fn blog() -> TestSite {
    TestSite::new()
        .with_template(
            "layouts/base.html",
            "<title>@yield('title', 'Site')</title>\n<nav>@section('nav')home @show</nav>\n<main>@yield('content')</main>\n@stack('scripts')",
        )
        .with_template(
            "layouts/blog.html",
            "@extends('layouts.base')\n@section('nav')@parent blog @endsection\n@push('scripts')<script src=\"blog.js\"></script>\n@endpush",
        )
        .with_template(
            "posts/show.html",
            "@extends('layouts.blog')\n@section('title'){{ post.title }}@endsection\n@section('content')<h1>{{ post.title }}</h1>{{ post.body }}@endsection\n@push('scripts')<script src=\"post.js\"></script>\n@endpush",
        )
}

#[test]
fn test_child_fills_layout_sections() -> Result<()> {
    let site = TestSite::new()
        .with_template("layout.html", "[@yield('content')]")
        .with_template("page.html", "@extends('layout')\n@section('content')hello {{ name }}@endsection");

    let engine = site.engine();
    assert_eq!(engine.render("page", &json!({"name": "Al"}))?, "[hello Al]");

    // Same as rendering the layout with the yield replaced.
    site.write_template("inlined.html", "[hello {{ name }}]");
    assert_eq!(engine.render("inlined", &json!({"name": "Al"}))?, "[hello Al]");
    Ok(())
}

#[test]
fn test_missing_section_uses_default() -> Result<()> {
    let site = TestSite::new()
        .with_template("layout.html", "@yield('title', 'Untitled')|@yield('sidebar')|")
        .with_template("page.html", "@extends('layout')");

    assert_eq!(site.engine().render("page", &json!({}))?, "Untitled||");
    Ok(())
}

#[test]
fn test_three_level_inheritance() -> Result<()> {
    let site = blog();
    let out = site.engine().render("posts.show", &json!({"post": {"title": "Hi <there>", "body": "text"}}))?;

    assert_eq!(
        out,
        "<title>Hi &lt;there&gt;</title>\n<nav>home  blog </nav>\n<main><h1>Hi &lt;there&gt;</h1>text</main>\n<script src=\"post.js\"></script>\n<script src=\"blog.js\"></script>\n"
    );
    Ok(())
}

#[test]
fn test_parent_prepends_layout_content() -> Result<()> {
    let site = TestSite::new()
        .with_template("layout.html", "@section('sidebar')links @show")
        .with_template("page.html", "@extends('layout')\n@section('sidebar')@parent extra @endsection");

    assert_eq!(site.engine().render("page", &json!({}))?, "links  extra ");
    Ok(())
}

#[test]
fn test_overwrite_and_append_closers() -> Result<()> {
    let site = TestSite::new().with_template(
        "sections.html",
        "@section('a')one @endsection\n@section('a')two @append\n@section('b')one @endsection\n@section('b')two @overwrite\n@yield('a')|@yield('b')",
    );

    assert_eq!(site.engine().render("sections", &json!({}))?, "\n\n\n\none two |two ");
    Ok(())
}

#[test]
fn test_inline_section_value_is_escaped() -> Result<()> {
    let site = TestSite::new()
        .with_template("layout.html", "<title>@yield('title')</title>")
        .with_template("page.html", "@extends('layout')\n@section('title', name ~ ' & co')");

    assert_eq!(site.engine().render("page", &json!({"name": "Al"}))?, "<title>Al &amp; co</title>");
    Ok(())
}

#[test]
fn test_layout_inline_default_yields_to_child() -> Result<()> {
    let site = TestSite::new()
        .with_template("layout.html", "@section('title', 'Default')<t>@yield('title')</t>")
        .with_template("page.html", "@extends('layout')\n@section('title')Child @endsection");

    let engine = site.engine();
    assert_eq!(engine.render("page", &json!({}))?, "<t>Child </t>");
    assert_eq!(engine.render("layout", &json!({}))?, "<t>Default</t>");
    Ok(())
}

#[test]
fn test_sections_reset_between_renders() -> Result<()> {
    let site = blog();
    let engine = site.engine();
    let data = json!({"post": {"title": "t", "body": "b"}});

    let first = engine.render("posts.show", &data)?;
    let second = engine.render("posts.show", &data)?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn test_included_layout_is_isolated() -> Result<()> {
    let site = TestSite::new()
        .with_template("frame.html", "<frame>@yield('content')</frame>")
        .with_template("widget.html", "@extends('frame')\n@section('content')widget @endsection")
        .with_template("layout.html", "@yield('content')")
        .with_template("page.html", "@extends('layout')\n@section('content')@include('widget') page @endsection");

    assert_eq!(site.engine().render("page", &json!({}))?, "<frame>widget </frame> page ");
    Ok(())
}

#[test]
fn test_self_extending_layout_fails() {
    let site = TestSite::new().with_template("loop.html", "@extends('loop')");
    let err = site.engine().render("loop", &json!({})).unwrap_err();
    assert!(err.to_string().contains("exceeds the maximum"), "{err}");
}
