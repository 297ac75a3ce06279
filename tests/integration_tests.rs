//! Integration tests against a mock GitHub API.

use arrow_array::{Int64Array, RecordBatch};
use arrow_schema::{DataType, Field, Schema};
use parquet::arrow::ArrowWriter;
use repo_utils::prelude::*;
use serde_json::json;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::runtime::Runtime;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Mock server plus the runtime it is driven from. The blocking client is
/// only ever used from the test thread, outside the runtime.
struct Harness {
    server: MockServer,
    rt: Runtime,
}

impl Harness {
    fn start() -> Self {
        let rt = Runtime::new().unwrap();
        let server = rt.block_on(MockServer::start());
        Self { server, rt }
    }

    fn mount(&self, mock: Mock) {
        self.rt.block_on(mock.mount(&self.server));
    }

    fn uri(&self) -> String {
        self.server.uri()
    }

    fn client(&self) -> GitHubClient {
        GitHubClient::new("test-token")
            .unwrap()
            .with_base_url(self.uri())
            .with_retry(RetryPolicy {
                max_retries: 2,
                backoff: Duration::from_millis(1),
            })
    }

    fn received(&self) -> Vec<Request> {
        self.rt
            .block_on(self.server.received_requests())
            .unwrap_or_default()
    }
}

fn parquet_bytes(rows: i64) -> Vec<u8> {
    let schema = Arc::new(Schema::new(vec![Field::new("value", DataType::Int64, false)]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![Arc::new(Int64Array::from_iter_values(0..rows))],
    )
    .unwrap();
    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
    buf
}

/// Serves `bytes=-N` suffix ranges with 206, like a real file host.
/// `extra` widens every range by that many leading bytes.
struct RangeResponder {
    body: Vec<u8>,
    extra: usize,
}

impl RangeResponder {
    fn new(body: Vec<u8>) -> Self {
        Self { body, extra: 0 }
    }
}

impl Respond for RangeResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let suffix = request
            .headers
            .get("range")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("bytes=-"))
            .and_then(|n| n.parse::<usize>().ok());

        match suffix {
            Some(n) => {
                let start = self.body.len().saturating_sub(n + self.extra);
                ResponseTemplate::new(206).set_body_bytes(self.body[start..].to_vec())
            }
            None => ResponseTemplate::new(200).set_body_bytes(self.body.clone()),
        }
    }
}

fn file_entry(uri: &str, dir: &str, name: &str) -> serde_json::Value {
    json!({
        "type": "file",
        "name": name,
        "path": format!("{}/{}", dir, name),
        "download_url": format!("{}/raw/{}/{}", uri, dir, name),
    })
}

fn dir_entry(dir: &str, name: &str) -> serde_json::Value {
    json!({
        "type": "dir",
        "name": name,
        "path": format!("{}/{}", dir, name),
        "download_url": null,
    })
}

fn csv_body(data_rows: usize) -> String {
    let mut body = String::from("origin_date,location,value\n");
    for i in 0..data_rows {
        body.push_str(&format!("2023-01-07,US,{}\n", i));
    }
    body
}

#[test]
fn test_missing_directory_is_empty() {
    let h = Harness::start();
    h.mount(
        Mock::given(method("GET"))
            .and(path("/repos/o/hub/contents/target-data"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})),
            ),
    );

    let files = h.client().list_files("o", "hub", "target-data").unwrap();
    assert!(files.is_empty());
}

#[test]
fn test_listing_follows_pages_and_subdirectories() {
    let h = Harness::start();
    let uri = h.uri();

    h.mount(
        Mock::given(method("GET"))
            .and(path("/repos/o/hub/contents/model-output"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(
                        "link",
                        format!(
                            r#"<{}/repos/o/hub/contents/model-output?page=2>; rel="next""#,
                            uri
                        )
                        .as_str(),
                    )
                    .set_body_json(json!([
                        file_entry(&uri, "model-output", "README.md"),
                        dir_entry("model-output", "team-model"),
                    ])),
            ),
    );
    h.mount(
        Mock::given(method("GET"))
            .and(path("/repos/o/hub/contents/model-output"))
            .and(query_param("page", "2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([file_entry(&uri, "model-output", "extra.csv")])),
            )
            .with_priority(1),
    );
    h.mount(
        Mock::given(method("GET"))
            .and(path("/repos/o/hub/contents/model-output/team-model"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                file_entry(&uri, "model-output/team-model", "2023-01-07-team-model.csv"),
                file_entry(&uri, "model-output/team-model", "2023-01-14-team-model.parquet"),
                file_entry(&uri, "model-output/team-model", "metadata.yml"),
            ]))),
    );

    let files = h.client().list_files("o", "hub", "model-output").unwrap();
    assert_eq!(
        files,
        vec![
            format!("{}/raw/model-output/team-model/2023-01-07-team-model.csv", uri),
            format!("{}/raw/model-output/team-model/2023-01-14-team-model.parquet", uri),
            format!("{}/raw/model-output/extra.csv", uri),
        ]
    );

    let limited = h
        .client()
        .list_files_limited("o", "hub", "model-output", 1)
        .unwrap();
    assert_eq!(limited.len(), 1);
}

#[test]
fn test_listing_server_error_is_fatal() {
    let h = Harness::start();
    h.mount(
        Mock::given(method("GET"))
            .and(path("/repos/o/hub/contents/model-output"))
            .respond_with(ResponseTemplate::new(500)),
    );

    let err = h.client().list_files("o", "hub", "model-output").unwrap_err();
    assert_eq!(err.status().map(|s| s.as_u16()), Some(500));
    // first attempt plus two retries
    assert_eq!(h.received().len(), 3);
}

#[test]
fn test_transient_errors_are_retried() {
    let h = Harness::start();
    h.mount(
        Mock::given(method("GET"))
            .and(path("/repos/o/hub/contents/model-output"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .with_priority(1),
    );
    h.mount(
        Mock::given(method("GET"))
            .and(path("/repos/o/hub/contents/model-output"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([]))),
    );

    let files = h.client().list_files("o", "hub", "model-output").unwrap();
    assert!(files.is_empty());
    assert_eq!(h.received().len(), 2);
}

#[test]
fn test_csv_and_parquet_counts_differ_by_header() {
    let h = Harness::start();
    let uri = h.uri();
    h.mount(
        Mock::given(method("GET"))
            .and(path("/raw/data.csv"))
            .respond_with(ResponseTemplate::new(200).set_body_string(csv_body(25))),
    );
    h.mount(
        Mock::given(method("GET"))
            .and(path("/raw/data.parquet"))
            .respond_with(RangeResponder::new(parquet_bytes(25))),
    );

    let client = h.client();
    let counter = RowCounter::new(&client);
    let csv = counter.count(&format!("{}/raw/data.csv", uri));
    let parquet = counter.count(&format!("{}/raw/data.parquet", uri));

    assert_eq!(csv.file_name, "data.csv");
    assert_eq!(csv.row_count, 26);
    assert_eq!(parquet.file_name, "data.parquet");
    assert_eq!(parquet.row_count, 25);
    assert_eq!(csv.row_count - parquet.row_count, 1);
}

#[test]
fn test_parquet_count_uses_only_the_footer() {
    let h = Harness::start();
    let uri = h.uri();
    let body = parquet_bytes(1000);
    let file_len = body.len();
    h.mount(
        Mock::given(method("GET"))
            .and(path("/raw/big.parquet"))
            .respond_with(RangeResponder::new(body)),
    );

    let client = h.client();
    let count = RowCounter::new(&client).count(&format!("{}/raw/big.parquet", uri));
    assert_eq!(count.row_count, 1000);

    let requests = h.received();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.headers.get("range").is_some()));
    let second_range = requests[1].headers.get("range").unwrap().to_str().unwrap();
    assert_ne!(second_range, format!("bytes=-{}", file_len));
}

#[test]
fn test_parquet_count_when_range_is_ignored() {
    let h = Harness::start();
    let uri = h.uri();
    h.mount(
        Mock::given(method("GET"))
            .and(path("/raw/plain.parquet"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(parquet_bytes(7))),
    );

    let client = h.client();
    let count = RowCounter::new(&client).count(&format!("{}/raw/plain.parquet", uri));
    assert_eq!(count.row_count, 7);
}

#[test]
fn test_parquet_count_with_wider_range_response() {
    let h = Harness::start();
    let uri = h.uri();
    h.mount(
        Mock::given(method("GET"))
            .and(path("/raw/padded.parquet"))
            .respond_with(RangeResponder {
                body: parquet_bytes(12),
                extra: 16,
            }),
    );

    let client = h.client();
    let count = RowCounter::new(&client).count(&format!("{}/raw/padded.parquet", uri));
    assert_eq!(count.row_count, 12);
}

#[test]
fn test_downloads_are_not_bound_by_api_timeout() {
    let h = Harness::start();
    let uri = h.uri();
    h.mount(
        Mock::given(method("GET"))
            .and(path("/raw/slow.csv"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(csv_body(3))
                    .set_delay(Duration::from_millis(500)),
            ),
    );
    h.mount(
        Mock::given(method("GET"))
            .and(path("/repos/o/hub/contents/model-output"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(Duration::from_millis(500)),
            ),
    );

    let client = h.client().with_timeout(Duration::from_millis(100));
    let count = RowCounter::new(&client).count(&format!("{}/raw/slow.csv", uri));
    assert_eq!(count.row_count, 4);

    let err = client.list_files("o", "hub", "model-output").unwrap_err();
    assert!(matches!(err, RepoUtilsError::Http(ref e) if e.is_timeout()), "{}", err);
}

#[test]
fn test_count_failure_is_zero() {
    let h = Harness::start();
    let uri = h.uri();
    h.mount(
        Mock::given(method("GET"))
            .and(path("/raw/broken.parquet"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not parquet at all")),
    );

    let client = h.client();
    let counter = RowCounter::new(&client);
    assert_eq!(counter.count(&format!("{}/raw/missing.csv", uri)).row_count, 0);
    assert_eq!(counter.count(&format!("{}/raw/broken.parquet", uri)).row_count, 0);
}

fn mount_hub(h: &Harness, owner: &str, name: &str) {
    let uri = h.uri();
    let base = format!("/repos/{}/{}/contents", owner, name);

    h.mount(
        Mock::given(method("GET"))
            .and(path(format!("{}/model-output", base)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                dir_entry("model-output", "team-model"),
            ]))),
    );
    h.mount(
        Mock::given(method("GET"))
            .and(path(format!("{}/model-output/team-model", base)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                file_entry(&uri, "model-output/team-model", "2023-01-07-team-model.csv"),
                file_entry(&uri, "model-output/team-model", "2023-01-14-team-model.parquet"),
            ]))),
    );
    h.mount(
        Mock::given(method("GET"))
            .and(path(format!("{}/target-data", base)))
            .respond_with(ResponseTemplate::new(404)),
    );
    h.mount(
        Mock::given(method("GET"))
            .and(path("/raw/model-output/team-model/2023-01-07-team-model.csv"))
            .respond_with(ResponseTemplate::new(200).set_body_string(csv_body(9))),
    );
    h.mount(
        Mock::given(method("GET"))
            .and(path("/raw/model-output/team-model/2023-01-14-team-model.parquet"))
            .respond_with(RangeResponder::new(parquet_bytes(40))),
    );
}

#[test]
fn test_hub_stats_end_to_end() {
    let h = Harness::start();
    mount_hub(&h, "o", "hub");
    let out = TempDir::new().unwrap();

    let client = h.client();
    let options = HubStatsOptions {
        output_dir: out.path().to_path_buf(),
        workers: 4,
        ..Default::default()
    };
    let stats = HubStats::new(&client, options).unwrap();
    let hubs = vec![HubRepo::parse("o/hub").unwrap()];

    let run = stats.run(&hubs).unwrap();
    assert!(run.is_success());
    assert_eq!(run.persisted, vec![out.path().join("hub.parquet")]);

    let reports = run.reports.unwrap();
    assert_eq!(reports.detail.len(), 2);
    assert!(reports.detail.iter().all(|r| {
        r.model_id.as_deref() == Some("team-model") && r.dir == HubDirectory::ModelOutput
    }));
    assert_eq!(
        reports.summary,
        vec![SummaryRow {
            repo: "o/hub".into(),
            dir: HubDirectory::ModelOutput,
            row_count: 50,
        }]
    );
    let detail_total: i64 = reports.detail.iter().map(|r| r.row_count).sum();
    assert_eq!(detail_total, reports.summary[0].row_count);

    let first = fs::read(out.path().join("hub.parquet")).unwrap();
    stats.run(&hubs).unwrap();
    assert_eq!(fs::read(out.path().join("hub.parquet")).unwrap(), first);

    let summary_csv = fs::read_to_string(out.path().join("hub_stats_summary.csv")).unwrap();
    assert_eq!(summary_csv, "repo,dir,row_count\no/hub,model-output,50\n");
}

#[test]
fn test_failed_hub_does_not_stop_others() {
    let h = Harness::start();
    mount_hub(&h, "o", "good-hub");
    h.mount(
        Mock::given(method("GET"))
            .and(path("/repos/o/bad-hub/contents/model-output"))
            .respond_with(
                ResponseTemplate::new(403).set_body_json(json!({"message": "Forbidden"})),
            ),
    );
    let out = TempDir::new().unwrap();

    let client = h.client();
    let options = HubStatsOptions {
        output_dir: out.path().to_path_buf(),
        workers: 2,
        ..Default::default()
    };
    let hubs = vec![
        HubRepo::parse("o/bad-hub").unwrap(),
        HubRepo::parse("o/good-hub").unwrap(),
    ];
    let run = HubStats::new(&client, options).unwrap().run(&hubs).unwrap();

    assert!(!run.is_success());
    assert_eq!(run.failed.len(), 1);
    assert_eq!(run.failed[0].0.name, "bad-hub");
    assert!(!out.path().join("bad-hub.parquet").exists());
    assert_eq!(run.reports.unwrap().summary.len(), 1);
}

fn org_repos() -> serde_json::Value {
    json!([
        {"id": 1, "name": "duck-hub", "archived": false, "visibility": "public"},
        {"id": 2, "name": "old-thing", "archived": true, "visibility": "public"},
        {"id": 3, "name": "keep-me", "archived": false, "visibility": "private"},
    ])
}

#[test]
fn test_archive_only_listed_active_repos() {
    let h = Harness::start();
    h.mount(
        Mock::given(method("GET"))
            .and(path("/orgs/org/repos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(org_repos())),
    );
    h.mount(
        Mock::given(method("PATCH"))
            .and(path("/repos/org/duck-hub"))
            .and(body_json(json!({"archived": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"id": 1, "name": "duck-hub", "archived": true}),
            ))
            .expect(1),
    );

    let allow_list = vec!["duck-hub".to_string(), "old-thing".to_string()];
    let summary = archive_repos(&h.client(), "org", &allow_list, false).unwrap();

    assert_eq!(summary.results.len(), 1);
    assert_eq!(summary.results[0].name, "duck-hub");
    assert_eq!(summary.updated(), 1);
}

#[test]
fn test_archive_dry_run_sends_no_patch() {
    let h = Harness::start();
    h.mount(
        Mock::given(method("GET"))
            .and(path("/orgs/org/repos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(org_repos())),
    );

    let allow_list = vec!["duck-hub".to_string()];
    let summary = archive_repos(&h.client(), "org", &allow_list, true).unwrap();

    assert_eq!(summary.results[0].status, RepoStatus::WouldUpdate);
    assert!(h.received().iter().all(|r| r.method.as_str() == "GET"));
}

#[test]
fn test_apply_rulesets_treats_422_as_existing() {
    let h = Harness::start();
    h.mount(
        Mock::given(method("GET"))
            .and(path("/orgs/org/repos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(org_repos())),
    );
    h.mount(
        Mock::given(method("POST"))
            .and(path("/repos/org/duck-hub/rulesets"))
            .respond_with(ResponseTemplate::new(201).set_body_json(
                json!({"id": 99, "name": "default branch protections"}),
            )),
    );
    h.mount(
        Mock::given(method("POST"))
            .and(path("/repos/org/keep-me/rulesets"))
            .respond_with(ResponseTemplate::new(422).set_body_json(
                json!({"message": "Validation Failed"}),
            )),
    );

    let ruleset = Ruleset::from_json("rulesets/default_branch_protections.json").unwrap();
    let allow_list = vec!["duck-hub".to_string(), "keep-me".to_string()];
    let summary = apply_rulesets(&h.client(), "org", &ruleset, &allow_list, false).unwrap();

    assert_eq!(summary.updated(), 1);
    assert_eq!(summary.failed(), 0);
    assert!(matches!(
        summary.results[1].status,
        RepoStatus::AlreadyApplied(_)
    ));
}

#[test]
fn test_org_listing_follows_link_header() {
    let h = Harness::start();
    let uri = h.uri();
    h.mount(
        Mock::given(method("GET"))
            .and(path("/orgs/org/repos"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(
                        "link",
                        format!(r#"<{}/orgs/org/repos?page=2>; rel="next""#, uri).as_str(),
                    )
                    .set_body_json(json!([{"id": 1, "name": "a"}])),
            ),
    );
    h.mount(
        Mock::given(method("GET"))
            .and(path("/orgs/org/repos"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 2, "name": "b"}])))
            .with_priority(1),
    );

    let repos = list_repos(&h.client(), "org").unwrap();
    let names: Vec<&str> = repos.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
}
