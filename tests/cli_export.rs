//! `cueplan export` end to end.

mod common;

use common::*;

fn json_values(stdout: &str) -> Vec<serde_json::Value> {
    serde_json::Deserializer::from_str(stdout)
        .into_iter::<serde_json::Value>()
        .collect::<Result<_, _>>()
        .expect("stdout is a JSON stream")
}

#[test]
fn yaml_documents_are_exported_separately() {
    let env = TestEnv::with_files(&[("services.yaml", TWO_DOCUMENTS_YAML)]);

    let result = env.run(&["export", "services.yaml"]);

    assert_success!(result);
    insta::assert_snapshot!(result.stdout, @r#"
    {
        "name": "web",
        "port": 80
    }
    {
        "replicas": 3
    }
    "#);
}

#[test]
fn several_data_files_merge_into_one_value() {
    let env = TestEnv::with_files(&[("a.json", r#"{"a": 1}"#), ("b.yaml", "b: 2\n")]);

    let result = env.run(&["export", "a.json", "b.yaml"]);

    assert_success!(result);
    assert_eq!(json_values(&result.stdout), vec![serde_json::json!({"a": 1, "b": 2})]);
}

#[test]
fn merge_false_streams_each_file() {
    let env = TestEnv::with_files(&[("a.json", r#"{"a": 1}"#), ("b.yaml", "b: 2\n")]);

    let result = env.run(&["export", "--merge=false", "a.json", "b.yaml"]);

    assert_success!(result);
    assert_eq!(
        json_values(&result.stdout),
        vec![serde_json::json!({"a": 1}), serde_json::json!({"b": 2})]
    );
}

#[test]
fn data_is_validated_against_the_configuration() {
    let env = TestEnv::with_files(&[("schema.cue", PORT_SCHEMA), ("service.json", GOOD_SERVICE_JSON)]);

    let result = env.run(&["export", "schema.cue", "service.json"]);

    assert_success!(result);
    assert_eq!(
        json_values(&result.stdout),
        vec![serde_json::json!({"name": "web", "port": 8080})]
    );
}

#[test]
fn schema_violation_fails_without_creating_the_outfile() {
    let env = TestEnv::with_files(&[("schema.cue", PORT_SCHEMA), ("service.json", BAD_SERVICE_JSON)]);

    let result = env.run(&["export", "schema.cue", "service.json", "-o", "out.json"]);

    assert_failure!(result);
    assert!(result.stderr.starts_with("error: "), "stderr: {}", result.stderr);
    assert!(result.stderr.contains("port"), "stderr: {}", result.stderr);
    assert_not_written!(env, "out.json");
}

#[test]
fn schema_expression_checks_every_document() {
    let env = TestEnv::with_files(&[
        ("schema.cue", "#Port: {port: int & >0}\n"),
        ("ports.yaml", "port: 80\n---\nport: 0\n"),
    ]);

    let result = env.run(&["export", "-d", "#Port", "schema.cue", "ports.yaml"]);

    assert_failure!(result);
    assert_output_contains!(result, "port");
}

#[test]
fn schema_expression_needs_a_schema() {
    let env = TestEnv::with_files(&[("ports.yaml", "port: 80\n")]);

    let result = env.run(&["export", "-d", "#Port", "ports.yaml"]);

    assert_failure!(result);
    assert_output_contains!(result, "schema flag specified without a schema");
}

#[test]
fn expression_selects_a_value() {
    let env = TestEnv::with_files(&[("x.cue", "a: {b: \"hello\"}\n")]);

    let result = env.run(&["export", "-e", "a.b", "x.cue"]);

    assert_success!(result);
    assert_eq!(result.stdout, "\"hello\"\n");
}

#[test]
fn output_encoding_follows_out_flag() {
    let env = TestEnv::with_files(&[("a.json", r#"{"a": 1}"#)]);

    let result = env.run(&["export", "--out", "yaml", "a.json"]);

    assert_success!(result);
    assert_eq!(result.stdout, "a: 1\n");
}

#[test]
fn outfile_is_written_and_not_overwritten_without_force() {
    let env = TestEnv::with_files(&[("a.json", r#"{"a": 1}"#)]);

    let first = env.run(&["export", "a.json", "-o", "out.yaml"]);
    assert_success!(first);
    assert_eq!(env.read_project_file("out.yaml"), "a: 1\n");

    env.write_project_file("a.json", r#"{"a": 2}"#);
    let second = env.run(&["export", "a.json", "-o", "out.yaml"]);
    assert_failure!(second);
    assert_output_contains!(second, "already exists");
    assert_eq!(env.read_project_file("out.yaml"), "a: 1\n");

    let forced = env.run(&["export", "a.json", "-o", "out.yaml", "--force"]);
    assert_success!(forced);
    assert_eq!(env.read_project_file("out.yaml"), "a: 2\n");
}

#[test]
fn list_placement_collects_objects() {
    let env = TestEnv::with_files(&[("a.json", r#"{"n": 1}"#), ("b.json", r#"{"n": 2}"#)]);

    let result = env.run(&["export", "--list", "-l", "\"items\"", "a.json", "b.json"]);

    assert_success!(result);
    assert_eq!(
        json_values(&result.stdout),
        vec![serde_json::json!({"items": [{"n": 1}, {"n": 2}]})]
    );
}

#[test]
fn ignore_reports_every_failing_value() {
    let env = TestEnv::with_files(&[
        ("schema.cue", "#P: {port: int}\n"),
        ("ports.yaml", "port: a\n---\nport: 1\n---\nport: b\n"),
    ]);

    let result = env.run(&["export", "-i", "-d", "#P", "schema.cue", "ports.yaml"]);

    assert_failure!(result);
    let errors = result.stderr.lines().filter(|l| l.starts_with("error: ")).count();
    assert_eq!(errors, 2, "stderr: {}", result.stderr);
    assert!(result.stdout.contains("\"port\": 1"), "stdout: {}", result.stdout);
    assert!(!result.stdout.contains("\"a\""), "stdout: {}", result.stdout);
}

#[test]
fn ignore_still_emits_valid_sibling_instances() {
    let env = TestEnv::with_files(&[
        ("p/a.cue", "v: 1\n"),
        ("q/a.cue", "w: \"b\"\nw: 3\n"),
        ("r/a.cue", "x: 2\n"),
    ]);

    let result = env.run(&["export", "-i", "./p", "./q", "./r"]);

    assert_failure!(result);
    assert_output_contains!(result, "conflicting values");
    assert!(result.stdout.contains("\"v\": 1"), "stdout: {}", result.stdout);
    assert!(result.stdout.contains("\"x\": 2"), "stdout: {}", result.stdout);
    assert!(!result.stdout.contains("\"w\""), "stdout: {}", result.stdout);
}

#[test]
fn failing_values_write_nothing_without_ignore_or_to_a_file() {
    let env = TestEnv::with_files(&[("p/a.cue", "v: 1\n"), ("q/a.cue", "w: \"b\"\nw: 3\n")]);

    let strict = env.run(&["export", "./p", "./q"]);
    assert_failure!(strict);
    assert_eq!(strict.stdout, "");

    let to_file = env.run(&["export", "-i", "-o", "out.json", "./p", "./q"]);
    assert_failure!(to_file);
    assert_not_written!(env, "out.json");
}

#[test]
fn indent_comes_from_the_project_defaults() {
    let env = TestEnv::with_files(&[
        ("a.json", r#"{"a": 1}"#),
        ("cueplan.toml", "[output]\nindent = 2\n"),
    ]);

    let result = env.run(&["export", "a.json"]);

    assert_success!(result);
    assert_eq!(result.stdout, "{\n  \"a\": 1\n}\n");
}

#[test]
fn environment_overrides_the_defaults_file() {
    let env = TestEnv::with_files(&[
        ("a.json", r#"{"a": 1}"#),
        ("cueplan.toml", "[output]\nindent = 2\n"),
    ]);

    let result = env.run_with_env(&["export", "a.json"], &[("CUEPLAN_INDENT", "0")]);

    assert_success!(result);
    assert_eq!(result.stdout, "{\n\"a\": 1\n}\n");
}

#[test]
fn unknown_defaults_keys_are_warned_about() {
    let env = TestEnv::with_files(&[
        ("a.json", r#"{"a": 1}"#),
        ("cueplan.toml", "[output]\nindnet = 2\n"),
    ]);

    let result = env.run(&["export", "a.json"]);

    assert_success!(result);
    assert!(result.stderr.contains("warning: unknown configuration key"), "{}", result.stderr);
    assert!(result.stderr.contains("indent"), "{}", result.stderr);
}

#[test]
fn missing_input_is_an_error() {
    let env = TestEnv::new();

    let result = env.run(&["export", "nope.json"]);

    assert_failure!(result);
    assert_output_contains!(result, "nope.json");
}
