//! The `prism` binary.

use predicates::prelude::*;

use crate::common::CliSite;

fn site() -> CliSite {
    CliSite::new()
        .with_template("layouts/app.html", "<h1>{{ app_name }}</h1>@yield('body')")
        .with_template("pages/home.html", "@extends('layouts.app')\n@section('body')Hi {{ user }}@endsection")
}

#[test]
fn test_render_named_template_with_data() {
    let site = site();
    site.write("data.json", r#"{"user": "<Al>"}"#);

    site.command()
        .args(["render", "pages.home", "--data", "data.json"])
        .assert()
        .success()
        .stdout("<h1>Prism</h1>Hi &lt;Al&gt;");

    assert!(site.root().join("cache").is_dir());
}

#[test]
fn test_render_string_with_yaml_data() {
    let site = site();
    site.write("data.yaml", "items:\n  - a\n  - b\n");

    site.command()
        .args(["render", "--string", "{{ items | join:'+' }} by {{ app_name }}", "-d", "data.yaml"])
        .assert()
        .success()
        .stdout("a+b by Prism");
}

#[test]
fn test_render_rejects_non_object_data() {
    let site = site();
    site.write("data.json", "[1, 2, 3]");

    site.command()
        .args(["render", "pages.home", "--data", "data.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid render data"))
        .stderr(predicate::str::contains("expected an object, found array"));
}

#[test]
fn test_missing_template_suggests_naming_scheme() {
    site()
        .command()
        .args(["render", "pages.nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Template 'pages.nope' not found"))
        .stderr(predicate::str::contains("pages/nope.html"))
        .stderr(predicate::str::contains("dots as directory separators"));
}

#[test]
fn test_compile_error_reports_location() {
    let site = site().with_template("bad.html", "ok\n{{ x | nope }}");

    site.command()
        .args(["render", "bad"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown filter 'nope'"))
        .stderr(predicate::str::contains("line 2"));
}

#[test]
fn test_compile_prints_deterministic_program() {
    let site = site();
    let file = site.root().join("templates/pages/home.html");

    let first = site.command().arg("compile").arg(&file).assert().success().get_output().stdout.clone();
    let second = site.command().arg("compile").arg(&file).assert().success().get_output().stdout.clone();
    assert_eq!(first, second);

    let text = String::from_utf8(first).unwrap();
    let program: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(program["template"], "home");
    assert_eq!(program["extends"], "layouts.app");
}

#[test]
fn test_cache_path_and_clear() {
    let site = site();
    site.command().args(["render", "pages.home"]).assert().success();

    let output = site.command().args(["cache", "path", "pages.home"]).assert().success().get_output().stdout.clone();
    let artifact = site.root().join(String::from_utf8(output).unwrap().trim());
    assert!(artifact.exists(), "{}", artifact.display());

    site.command()
        .args(["cache", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 2 artifact(s)"));
    assert!(!artifact.exists());
}

#[test]
fn test_env_disables_cache() {
    let site = site();
    site.command().env("PRISM_NO_CACHE", "1").args(["render", "pages.home"]).assert().success();
    assert!(!site.root().join("cache").exists());
}

#[test]
fn test_explicit_missing_config() {
    site()
        .command()
        .args(["--config", "elsewhere/prism.toml", "render", "pages.home"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration file not found"));
}

#[test]
fn test_invalid_config_is_reported() {
    let site = site();
    site.write("prism.toml", "[engine]\npaths = []\n");

    site.command()
        .args(["render", "pages.home"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}
