use std::sync::Arc;
use std::time::Duration;

use contractpit::env::EnvMap;
use contractpit::executor::{ExecutorOptions, HttpExecutor};
use contractpit::generator::SequentialGenerator;
use contractpit::matcher::AssertionFailure;
use contractpit::report::{ErrorCause, Outcome, RunReport};
use contractpit::runner::{RunOptions, Runner};
use contractpit::scenario::{parse_suite, Suite};
use httpmock::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use url::Url;

fn runner(base_url: &str, timeout: Duration) -> Runner {
    let executor = HttpExecutor::new(ExecutorOptions {
        base_url: Some(Url::parse(base_url).unwrap()),
        timeout,
        default_headers: vec![("accept".to_string(), "application/json".to_string())],
    })
    .unwrap();
    let mut environment = EnvMap::new();
    environment.insert("PASSWORD".to_string(), "Secret123!".to_string());
    Runner::new(executor)
        .with_generator(Arc::new(SequentialGenerator::new()))
        .with_environment(environment)
}

fn suite(raw: &str) -> Vec<Suite> {
    vec![parse_suite(raw).unwrap()]
}

fn outcome(report: &RunReport, group: &str, id: &str) -> Outcome {
    report.group(group).unwrap().result(id).unwrap().outcome
}

const AUTH_SUITE: &str = r#"{
  "name": "movies",
  "groups": [{
    "name": "auth",
    "fixtures": {
      "email": {"generate": "email"},
      "name": {"generate": "fullName"}
    },
    "scenarios": [
      {
        "id": "register",
        "method": "POST",
        "url": "users",
        "body": {"name": "{{name}}", "email": "{{email}}", "password": "{{PASSWORD}}"},
        "expect": {"status": 201, "assertions": [{"path": "email", "equals": "{{email}}"}]},
        "capture": [{"path": "id", "as": "userId"}]
      },
      {
        "id": "login",
        "method": "POST",
        "url": "auth/login",
        "body": {"email": "{{email}}", "password": "{{PASSWORD}}"},
        "expect": {"status": 200, "assertions": [{"path": "accessToken", "type": "string"}]},
        "capture": [{"path": "accessToken", "as": "token"}]
      },
      {
        "id": "profile",
        "method": "GET",
        "url": "users/{{userId}}",
        "bearer": "{{token}}",
        "expect": {"status": 200, "assertions": [
          {"path": "id", "equals": "{{userId}}"},
          {"path": "role", "equals": "user"}
        ]}
      },
      {
        "id": "wrong-password",
        "method": "POST",
        "url": "auth/login",
        "body": {"email": "{{email}}", "password": "nope"},
        "expect": {
          "status": 401,
          "body": {"statusCode": 401, "message": "Invalid credentials", "error": "Unauthorized"}
        }
      }
    ]
  }]
}"#;

#[tokio::test]
async fn register_login_and_fetch_profile_chain_captures() {
    let server = MockServer::start_async().await;
    let register = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/users").json_body(json!({
                "name": "Full Name 2",
                "email": "user1@example.test",
                "password": "Secret123!"
            }));
            then.status(201)
                .json_body(json!({"id": 42, "email": "user1@example.test", "role": "user"}));
        })
        .await;
    let login = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/auth/login")
                .json_body(json!({"email": "user1@example.test", "password": "Secret123!"}));
            then.status(200).json_body(json!({"accessToken": "tok-42"}));
        })
        .await;
    let profile = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/users/42")
                .header("authorization", "Bearer tok-42")
                .header("accept", "application/json");
            then.status(200).json_body(json!({"id": 42, "role": "user"}));
        })
        .await;
    let wrong = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/auth/login")
                .json_body(json!({"email": "user1@example.test", "password": "nope"}));
            then.status(401).json_body(json!({
                "error": "Unauthorized",
                "message": "Invalid credentials",
                "statusCode": 401
            }));
        })
        .await;

    let report = runner(&server.url("/api"), Duration::from_secs(5))
        .run(&suite(AUTH_SUITE))
        .await;

    for id in ["register", "login", "profile", "wrong-password"] {
        assert_eq!(outcome(&report, "auth", id), Outcome::Pass, "{id}: {report:#?}");
    }
    assert!(report.success());
    register.assert_async().await;
    login.assert_async().await;
    profile.assert_async().await;
    wrong.assert_async().await;
}

#[tokio::test]
async fn register_captures_user_id_for_later_scenarios() {
    let server = MockServer::start_async().await;
    let register = server
        .mock_async(|when, then| {
            when.method(POST).path("/users").json_body(json!({
                "name": "Ana",
                "email": "ana@x.com",
                "password": "secret1"
            }));
            then.status(201)
                .json_body(json!({"id": "u-17", "name": "Ana", "email": "ana@x.com"}));
        })
        .await;
    let fetch = server
        .mock_async(|when, then| {
            when.method(GET).path("/users/u-17");
            then.status(200).json_body(json!({"id": "u-17"}));
        })
        .await;

    let report = runner(&server.base_url(), Duration::from_secs(5))
        .run(&suite(
            r#"{"name": "users", "groups": [{"name": "register", "scenarios": [
                {"id": "register", "method": "POST", "url": "users",
                 "body": {"name": "Ana", "email": "ana@x.com", "password": "secret1"},
                 "expect": {"status": 201, "assertions": [{"path": "email", "equals": "ana@x.com"}]},
                 "capture": [{"path": "id", "as": "userId"}]},
                {"id": "fetch", "method": "GET", "url": "users/{{userId}}",
                 "expect": {"status": 200, "assertions": [{"path": "id", "equals": "{{userId}}"}]}}
            ]}]}"#,
        ))
        .await;

    assert_eq!(outcome(&report, "register", "register"), Outcome::Pass, "{report:#?}");
    assert_eq!(outcome(&report, "register", "fetch"), Outcome::Pass, "{report:#?}");
    register.assert_async().await;
    fetch.assert_async().await;
}

#[tokio::test]
async fn server_error_without_expected_status_fails() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/users");
            then.status(500).body("boom");
        })
        .await;
    let after = server
        .mock_async(|when, then| {
            when.method(GET).path("/users/me");
            then.status(200);
        })
        .await;

    let report = runner(&server.base_url(), Duration::from_secs(5))
        .run(&suite(
            r#"{"name": "s", "groups": [{"name": "g", "scenarios": [
                {"id": "list", "method": "GET", "url": "users"},
                {"id": "me", "method": "GET", "url": "users/me", "dependsOn": ["list"]}
            ]}]}"#,
        ))
        .await;

    let list = report.group("g").unwrap().result("list").unwrap();
    assert_eq!(list.outcome, Outcome::Fail);
    assert_eq!(list.status, Some(500));
    assert_eq!(
        list.failed_assertions,
        vec![AssertionFailure::Unsuccessful { actual: 500 }]
    );
    assert_eq!(outcome(&report, "g", "me"), Outcome::Error);
    assert_eq!(after.hits_async().await, 0);
}

#[tokio::test]
async fn failed_capture_source_short_circuits_dependents() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/users");
            then.status(201).json_body(json!({"id": 42, "email": "user1@example.test"}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/auth/login");
            then.status(500).json_body(json!({"message": "boom"}));
        })
        .await;
    let profile = server
        .mock_async(|when, then| {
            when.method(GET).path("/users/42");
            then.status(200);
        })
        .await;

    let report = runner(&server.base_url(), Duration::from_secs(5))
        .run(&suite(AUTH_SUITE))
        .await;

    assert_eq!(outcome(&report, "auth", "register"), Outcome::Pass);
    assert_eq!(outcome(&report, "auth", "login"), Outcome::Fail);
    let result = report.group("auth").unwrap().result("profile").unwrap();
    assert_eq!(result.outcome, Outcome::Error);
    assert_eq!(
        result.error,
        Some(ErrorCause::Propagated {
            upstream: "login".to_string(),
            reason: "failed".to_string(),
        })
    );
    // Siblings without the dependency keep running.
    assert_eq!(outcome(&report, "auth", "wrong-password"), Outcome::Fail);
    assert_eq!(profile.hits_async().await, 0);
    assert_eq!(report.summary.failed, 2);
    assert_eq!(report.summary.errored, 1);
}

#[tokio::test]
async fn captures_do_not_leak_between_groups() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/users");
            then.status(201).json_body(json!({"id": 7}));
        })
        .await;
    let fetch = server
        .mock_async(|when, then| {
            when.method(GET).path("/users/7");
            then.status(200).json_body(json!({"id": 7}));
        })
        .await;

    let suites = suite(
        r#"{
  "name": "isolation",
  "groups": [
    {
      "name": "first",
      "scenarios": [
        {"id": "create", "method": "POST", "url": "users", "expect": {"status": 201}, "capture": [{"path": "id", "as": "userId"}]},
        {"id": "fetch", "method": "GET", "url": "users/{{userId}}", "expect": {"status": 200}}
      ]
    },
    {
      "name": "second",
      "scenarios": [
        {"id": "fetch", "method": "GET", "url": "users/{{userId}}", "expect": {"status": 200}}
      ]
    }
  ]
}"#,
    );
    let report = runner(&server.base_url(), Duration::from_secs(5))
        .with_options(RunOptions {
            jobs: 2,
            ..RunOptions::default()
        })
        .run(&suites)
        .await;

    assert_eq!(outcome(&report, "first", "fetch"), Outcome::Pass);
    let second = report.group("second").unwrap().result("fetch").unwrap();
    assert_eq!(
        second.error,
        Some(ErrorCause::UnresolvedVariable {
            field: "url".to_string(),
            variable: "userId".to_string(),
        })
    );
    assert_eq!(fetch.hits_async().await, 1);
}

#[tokio::test]
async fn unresolved_variable_never_reaches_the_network() {
    let server = MockServer::start_async().await;
    let any = server
        .mock_async(|when, then| {
            when.any_request();
            then.status(200);
        })
        .await;

    let report = runner(&server.base_url(), Duration::from_secs(5))
        .run(&suite(
            r#"{"name": "s", "groups": [{"name": "g", "scenarios": [
                {"id": "get-user", "method": "GET", "url": "users/{{userId}}", "expect": {"status": 200}}
            ]}]}"#,
        ))
        .await;

    assert_eq!(outcome(&report, "g", "get-user"), Outcome::Error);
    assert_eq!(any.hits_async().await, 0);
}

#[tokio::test]
async fn search_capture_with_where_picks_the_created_movie() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/movies");
            then.status(200).json_body(json!([
                {"id": 1, "title": "Other"},
                {"id": 9, "title": "Song Title 1", "genre": "Rock"}
            ]));
        })
        .await;
    let update = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/movies/9")
                .json_body(json!({"id": 9, "title": "Song Title 1", "genre": "Jazz"}));
            then.status(200).json_body(json!({"id": 9, "genre": "Jazz", "score": 4.5}));
        })
        .await;

    let report = runner(&server.base_url(), Duration::from_secs(5))
        .run(&suite(
            r#"{"name": "movies", "groups": [{
                "name": "catalog",
                "fixtures": {"title": {"generate": "songTitle"}},
                "scenarios": [
                  {"id": "search", "method": "GET", "url": "movies?search={{title}}",
                   "expect": {"status": 200, "assertions": [{"path": "$", "type": "array"}]},
                   "capture": [{"path": "$", "as": "movie", "where": {"title": "{{title}}"}}]},
                  {"id": "update", "method": "PUT", "url": "movies/{{movie.id}}",
                   "body": {"id": "{{movie.id}}", "title": "{{movie.title}}", "genre": "Jazz"},
                   "expect": {"status": 200, "assertions": [
                     {"path": "genre", "equals": "Jazz"},
                     {"path": "score", "range": [0, 5]}
                   ]}}
                ]
            }]}"#,
        ))
        .await;

    assert_eq!(outcome(&report, "catalog", "search"), Outcome::Pass, "{report:#?}");
    assert_eq!(outcome(&report, "catalog", "update"), Outcome::Pass, "{report:#?}");
    update.assert_async().await;
}

#[tokio::test]
async fn connection_failure_errors_and_propagates() {
    // Nothing listens on the discard port.
    let report = runner("http://127.0.0.1:9", Duration::from_secs(2))
        .run(&suite(AUTH_SUITE))
        .await;

    let register = report.group("auth").unwrap().result("register").unwrap();
    assert_eq!(register.outcome, Outcome::Error);
    assert!(matches!(
        register.error,
        Some(ErrorCause::Transport { timeout: false, .. })
    ));
    assert_eq!(
        report.group("auth").unwrap().result("profile").unwrap().error,
        Some(ErrorCause::Propagated {
            upstream: "login".to_string(),
            reason: "errored".to_string(),
        })
    );
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/slow");
            then.status(200).delay(Duration::from_millis(500));
        })
        .await;

    let report = runner(&server.base_url(), Duration::from_millis(100))
        .run(&suite(
            r#"{"name": "s", "groups": [{"name": "g", "scenarios": [
                {"id": "slow", "method": "GET", "url": "slow", "expect": {"status": 200}},
                {"id": "after", "method": "GET", "url": "slow", "dependsOn": ["slow"]}
            ]}]}"#,
        ))
        .await;

    let slow = report.group("g").unwrap().result("slow").unwrap();
    assert!(matches!(
        slow.error,
        Some(ErrorCause::Transport { timeout: true, .. })
    ));
    assert_eq!(outcome(&report, "g", "after"), Outcome::Error);
}
