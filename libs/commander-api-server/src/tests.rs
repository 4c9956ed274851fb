use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use chrono::{TimeZone, Utc};
use client_registry::RegistryError;
use command_dispatch::{CommandRequest, DispatchError};
use chrono::NaiveDateTime;
use commander_api::{AckStage, BoxFuture, ClientError, ComponentKey, ComponentMetadata, SortOrder, TimeRange, TopicCategory};
use component_catalog::{CatalogError, MetadataMap, TopicDataMap, TopicNamesMap};
use efd_reports::{BumpTestLink, BumpTestReport, BumpTestRequest, ReportError};
use query_fanout::{FanoutError, FanoutResult, QueryMode, Resample, SourceTree};
use serde_json::{Value, json};
use tower::ServiceExt;

use super::*;

// ═══════════════════════════════════════════════════════════════
//  Fakes
// ═══════════════════════════════════════════════════════════════

#[derive(Default)]
struct FakeCommands {
    last: Mutex<Option<CommandRequest>>,
}

impl CommandService for FakeCommands {
    fn dispatch<'a>(&'a self, request: &'a CommandRequest) -> BoxFuture<'a, Result<String, DispatchError>> {
        Box::pin(async move {
            *self.last.lock().unwrap() = Some(request.clone());
            let target = request.target.clone();
            let operation = request.operation.clone();
            match request.operation.as_str() {
                "cmd_start" | "slew_to_target" => Ok("Done".to_string()),
                "cmd_slow" => Err(DispatchError::AckTimeout {
                    target,
                    operation,
                    last: AckStage::InProgress,
                    timeout: Duration::from_secs(5),
                }),
                "cmd_silent" => Err(DispatchError::AckTimeout {
                    target,
                    operation,
                    last: AckStage::NoAck,
                    timeout: Duration::from_secs(5),
                }),
                "cmd_unreachable" => Err(DispatchError::ChannelUnavailable(RegistryError::Timeout {
                    key: target.to_string(),
                    timeout: Duration::from_secs(5),
                })),
                "cmd_fail" => Err(DispatchError::Upstream {
                    target,
                    operation,
                    source: ClientError::rejected("CMD_FAILED: fault"),
                }),
                _ => Err(DispatchError::InvalidOperation { target, operation }),
            }
        })
    }
}

#[derive(Default)]
struct FakeQueries {
    last: Mutex<Option<(String, SourceTree, QueryMode)>>,
    directory_down: bool,
}

impl QueryService for FakeQueries {
    fn run<'a>(
        &'a self,
        instance: &'a str,
        tree: &'a SourceTree,
        mode: &'a QueryMode,
    ) -> BoxFuture<'a, Result<FanoutResult, FanoutError>> {
        Box::pin(async move {
            *self.last.lock().unwrap() = Some((instance.to_string(), tree.clone(), mode.clone()));
            if instance != "summit_efd" {
                return Err(FanoutError::Unavailable(RegistryError::Connect {
                    key: instance.to_string(),
                    source: ClientError::connect("no route to host"),
                }));
            }
            Ok(FanoutResult::Series(Default::default()))
        })
    }

    fn list_instances(&self) -> BoxFuture<'_, Result<Vec<String>, ClientError>> {
        Box::pin(async move {
            if self.directory_down {
                Err(ClientError::connect("directory unreachable"))
            } else {
                Ok(vec!["summit_efd".to_string(), "usdf_efd".to_string()])
            }
        })
    }
}

#[derive(Default)]
struct FakeCatalog {
    last: Mutex<Option<Vec<TopicCategory>>>,
    directory_down: bool,
}

impl FakeCatalog {
    fn check(&self) -> Result<(), CatalogError> {
        if self.directory_down {
            return Err(CatalogError::Discovery(ClientError::connect("middleware unreachable")));
        }
        Ok(())
    }
}

impl CatalogService for FakeCatalog {
    fn metadata(&self) -> BoxFuture<'_, Result<MetadataMap, CatalogError>> {
        Box::pin(async move {
            self.check()?;
            let meta = ComponentMetadata { sal_version: "7.1.0".into(), xml_version: "12.0.0".into() };
            Ok(MetadataMap::from([("ATDome".to_string(), meta)]))
        })
    }

    fn topic_names<'a>(&'a self, categories: &'a [TopicCategory]) -> BoxFuture<'a, Result<TopicNamesMap, CatalogError>> {
        Box::pin(async move {
            self.check()?;
            *self.last.lock().unwrap() = Some(categories.to_vec());
            let names: BTreeMap<String, Vec<String>> =
                categories.iter().map(|c| (c.names_key(), vec!["position".to_string()])).collect();
            Ok(TopicNamesMap::from([("ATDome".to_string(), names)]))
        })
    }

    fn topic_data<'a>(&'a self, categories: &'a [TopicCategory]) -> BoxFuture<'a, Result<TopicDataMap, CatalogError>> {
        Box::pin(async move {
            self.check()?;
            *self.last.lock().unwrap() = Some(categories.to_vec());
            Ok(TopicDataMap::new())
        })
    }
}

#[derive(Default)]
struct FakeReports {
    last: Mutex<Option<BumpTestRequest>>,
}

impl ReportService for FakeReports {
    fn m1m3_bump_tests<'a>(&'a self, request: &'a BumpTestRequest) -> BoxFuture<'a, Result<BumpTestReport, ReportError>> {
        Box::pin(async move {
            *self.last.lock().unwrap() = Some(request.clone());
            match (request.instance.as_str(), request.actuator_id) {
                (_, 999) => Err(ReportError::UnknownActuator(999)),
                ("base_efd", _) => Err(ReportError::Unavailable(RegistryError::Connect {
                    key: request.instance.clone(),
                    source: ClientError::connect("no route to host"),
                })),
                _ => Ok(BumpTestReport {
                    primary: vec![BumpTestLink {
                        start: "2023-06-01T12:00:00.000".into(),
                        end: "2023-06-01T12:01:00.000".into(),
                        url: "https://summit-lsp.lsst.codes/chronograf".into(),
                    }],
                    secondary: Vec::new(),
                }),
            }
        })
    }
}

struct Harness {
    commands: Arc<FakeCommands>,
    queries: Arc<FakeQueries>,
    catalog: Arc<FakeCatalog>,
    reports: Arc<FakeReports>,
}

impl Harness {
    fn new() -> Self {
        Self::with_queries(FakeQueries::default())
    }

    fn with_queries(queries: FakeQueries) -> Self {
        Self {
            commands: Arc::new(FakeCommands::default()),
            queries: Arc::new(queries),
            catalog: Arc::new(FakeCatalog::default()),
            reports: Arc::new(FakeReports::default()),
        }
    }

    fn with_catalog(catalog: FakeCatalog) -> Self {
        Self { catalog: Arc::new(catalog), ..Self::new() }
    }

    async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let state = AppState {
            commands: self.commands.clone(),
            queries: self.queries.clone(),
            catalog: self.catalog.clone(),
            reports: self.reports.clone(),
            log_cap: 100,
        };
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();
        let response = app(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(body)).await
    }

    fn last_command(&self) -> CommandRequest {
        self.commands.last.lock().unwrap().clone().unwrap()
    }

    fn last_query(&self) -> (String, SourceTree, QueryMode) {
        self.queries.last.lock().unwrap().clone().unwrap()
    }
}

fn cmd_body(cmd: &str) -> Value {
    json!({"csc": "ATDome", "salindex": 1, "cmd": cmd, "params": {"azimuth": 90}})
}

// ═══════════════════════════════════════════════════════════════
//  /cmd, /tcs
// ═══════════════════════════════════════════════════════════════

#[tokio::test]
async fn command_result_is_returned_as_ack() {
    let h = Harness::new();
    let (status, body) = h.post("/cmd", cmd_body("cmd_start")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ack": "Done"}));

    let req = h.last_command();
    assert_eq!(req.target, ComponentKey::new("ATDome", 1));
    assert_eq!(req.params["azimuth"], 90);
    assert_eq!(req.identity, DEFAULT_IDENTITY);
}

#[tokio::test]
async fn camel_case_fields_and_trailing_slash_are_accepted() {
    let h = Harness::new();
    let body = json!({
        "type": "ATDome", "index": "2", "operation": "cmd_start",
        "parameters": {}, "identity": "user@host"
    });
    let (status, _) = h.post("/cmd/", body).await;
    assert_eq!(status, StatusCode::OK);

    let req = h.last_command();
    assert_eq!(req.target, ComponentKey::new("ATDome", 2));
    assert_eq!(req.identity, "user@host");
}

#[tokio::test]
async fn missing_command_field_is_a_bad_request() {
    let h = Harness::new();
    let (status, body) = h.post("/cmd", json!({"csc": "ATDome", "cmd": "cmd_start", "params": {}})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ack"], "Some of the required parameters is not present: salindex");
    assert!(h.commands.last.lock().unwrap().is_none());
}

#[tokio::test]
async fn non_json_body_is_a_bad_request() {
    let h = Harness::new();
    let (status, body) = h.call(Method::POST, "/cmd", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["ack"].as_str().unwrap().starts_with("invalid JSON body"));
}

#[tokio::test]
async fn unknown_operation_is_a_bad_request() {
    let (status, body) = Harness::new().post("/cmd", cmd_body("doesNotExist")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["ack"].as_str().unwrap().starts_with("Invalid command"));
}

#[tokio::test]
async fn ack_timeouts_map_to_gateway_timeout_with_stage() {
    let h = Harness::new();
    let (status, body) = h.post("/cmd", cmd_body("cmd_slow")).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["ack"], "Command time out. Last ack received CMD_INPROGRESS.");

    let (status, body) = h.post("/cmd", cmd_body("cmd_silent")).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["ack"], "Command time out. No ack received from component.");
}

#[tokio::test]
async fn unavailable_channel_and_upstream_failure_statuses() {
    let h = Harness::new();
    let (status, _) = h.post("/cmd", cmd_body("cmd_unreachable")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = h.post("/cmd", cmd_body("cmd_fail")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["ack"].as_str().unwrap().contains("CMD_FAILED"));
}

#[tokio::test]
async fn tcs_commands_target_control_system_channels() {
    let h = Harness::new();
    let (status, body) = h
        .post("/tcs/aux", json!({"command_name": "slew_to_target", "params": {"ra": 1.0}}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ack": "Done"}));
    assert_eq!(h.last_command().target, ComponentKey::new("ATCS", 0));

    h.post("/tcs/main", json!({"command_name": "slew_to_target"})).await;
    let req = h.last_command();
    assert_eq!(req.target, ComponentKey::new("MTCS", 0));
    assert!(req.params.is_empty());
}

// ═══════════════════════════════════════════════════════════════
//  /efd
// ═══════════════════════════════════════════════════════════════

fn cscs() -> Value {
    json!({"ATDome": {"0": {"topic1": ["field1"]}}})
}

#[tokio::test]
async fn timeseries_builds_centered_window() {
    let h = Harness::new();
    let (status, body) = h
        .post(
            "/efd/timeseries",
            json!({
                "efd_instance": "summit_efd",
                "start_date": "2020-03-16T12:00:00",
                "time_window": 10,
                "cscs": cscs(),
                "resample": "1min"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));

    let (instance, tree, mode) = h.last_query();
    assert_eq!(instance, "summit_efd");
    assert_eq!(tree.expand()[0].source_id, "ATDome-0-topic1");
    let QueryMode::Window { range, resample } = mode else {
        panic!("expected window mode");
    };
    assert_eq!(range.start, Utc.with_ymd_and_hms(2020, 3, 16, 11, 55, 0).unwrap());
    assert_eq!(range.end, Utc.with_ymd_and_hms(2020, 3, 16, 12, 5, 0).unwrap());
    assert_eq!(resample, "1min".parse::<Resample>().unwrap());
}

#[tokio::test]
async fn missing_efd_parameter_is_named() {
    let (status, body) = Harness::new()
        .post("/efd/timeseries", json!({"efd_instance": "summit_efd", "cscs": cscs()}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ack"], "Some of the required parameters is not present: start_date");
}

#[tokio::test]
async fn unreachable_instance_reports_connection_failure() {
    let (status, body) = Harness::new()
        .post("/efd/top_timeseries", json!({"efd_instance": "base_efd", "cscs": cscs()}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ack"], EFD_UNAVAILABLE);
}

#[tokio::test]
async fn top_timeseries_defaults_to_one_sample() {
    let h = Harness::new();
    let (status, _) = h.post("/efd/top_timeseries", json!({"efd_instance": "summit_efd", "cscs": cscs()})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.last_query().2, QueryMode::TopN { num: 1, time_cut: None });

    h.post(
        "/efd/top_timeseries",
        json!({"efd_instance": "summit_efd", "cscs": cscs(), "num": "5", "time_cut": "2020-03-16 12:00:00"}),
    )
    .await;
    assert_eq!(
        h.last_query().2,
        QueryMode::TopN {
            num: 5,
            time_cut: Some(Utc.with_ymd_and_hms(2020, 3, 16, 12, 0, 0).unwrap())
        }
    );
}

#[tokio::test]
async fn log_messages_convert_tai_and_use_configured_cap() {
    let h = Harness::new();
    let (status, _) = h
        .post(
            "/efd/logmessages",
            json!({
                "efd_instance": "summit_efd",
                "start_date": "2020-03-16T12:00:37",
                "end_date": "2020-03-16T13:00:37",
                "cscs": cscs(),
                "scale": "tai",
                "order": "asc"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let expected = TimeRange::new(
        Utc.with_ymd_and_hms(2020, 3, 16, 12, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2020, 3, 16, 13, 0, 0).unwrap(),
    )
    .unwrap();
    assert_eq!(
        h.last_query().2,
        QueryMode::Logs { range: expected, cap: 100, order: SortOrder::Asc }
    );
}

#[tokio::test]
async fn inverted_log_range_is_rejected() {
    let (status, _) = Harness::new()
        .post(
            "/efd/logmessages",
            json!({
                "efd_instance": "summit_efd",
                "start_date": "2020-03-16T13:00:00",
                "end_date": "2020-03-16T12:00:00",
                "cscs": cscs()
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bad_source_tree_index_is_a_validation_error() {
    let (status, body) = Harness::new()
        .post(
            "/efd/top_timeseries",
            json!({"efd_instance": "summit_efd", "cscs": {"ATDome": {"zero": {"t": ["f"]}}}}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["ack"].as_str().unwrap().starts_with("invalid cscs"));
}

#[tokio::test]
async fn window_beyond_representable_dates_is_rejected() {
    let h = Harness::new();
    for window in [json!(1_000_000_000_000i64), json!(i64::MAX), json!("-9223372036854775808")] {
        let (status, body) = h
            .post(
                "/efd/timeseries",
                json!({
                    "efd_instance": "summit_efd",
                    "start_date": "2020-03-16T12:00:00",
                    "time_window": window,
                    "cscs": cscs()
                }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "time_window {window}");
        assert!(body["ack"].as_str().unwrap().contains("out of range"));
    }
    assert!(h.queries.last.lock().unwrap().is_none());
}

#[tokio::test]
async fn earliest_tai_date_is_rejected() {
    let earliest = NaiveDateTime::MIN.format("%Y-%m-%dT%H:%M:%S").to_string();
    let (status, body) = Harness::new()
        .post(
            "/efd/logmessages",
            json!({
                "efd_instance": "summit_efd",
                "start_date": earliest,
                "end_date": "2020-03-16T12:00:00",
                "cscs": cscs(),
                "scale": "tai"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["ack"].as_str().unwrap().contains("out of range in tai scale"));
}

#[tokio::test]
async fn oversized_num_is_rejected() {
    let h = Harness::new();
    for num in [json!("18446744073709551615"), json!(i64::MAX), json!(MAX_TOP_N + 1), json!(-1)] {
        let (status, body) = h
            .post("/efd/top_timeseries", json!({"efd_instance": "summit_efd", "cscs": cscs(), "num": num}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "num {num}");
        assert!(body["ack"].is_string());
    }
    assert!(h.queries.last.lock().unwrap().is_none());

    let (status, _) = h
        .post("/efd/top_timeseries", json!({"efd_instance": "summit_efd", "cscs": cscs(), "num": MAX_TOP_N}))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn padded_index_keys_are_echoed_in_source_ids() {
    let h = Harness::new();
    h.post(
        "/efd/top_timeseries",
        json!({"efd_instance": "summit_efd", "cscs": {"ATDome": {"01": {"position": ["az"]}}}}),
    )
    .await;
    let tasks = h.last_query().1.expand();
    assert_eq!(tasks[0].source_id, "ATDome-01-position");
    assert_eq!(tasks[0].topic.index, 1);
}

#[tokio::test]
async fn efd_clients_lists_instances_or_fails_with_400() {
    let (status, body) = Harness::new().call(Method::GET, "/efd/efd_clients/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"instances": ["summit_efd", "usdf_efd"]}));

    let down = Harness::with_queries(FakeQueries { directory_down: true, ..FakeQueries::default() });
    let (status, body) = down.call(Method::GET, "/efd/efd_clients", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["ack"].as_str().unwrap().contains("directory unreachable"));
}

#[tokio::test]
async fn heartbeat_reports_current_timestamp() {
    let before = Utc::now().timestamp() as f64;
    let (status, body) = Harness::new().call(Method::GET, "/heartbeat", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["timestamp"].as_f64().unwrap() >= before);
}

// ═══════════════════════════════════════════════════════════════
//  /salinfo
// ═══════════════════════════════════════════════════════════════

#[tokio::test]
async fn salinfo_metadata_lists_component_versions() {
    let (status, body) = Harness::new().call(Method::GET, "/salinfo/metadata", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ATDome": {"sal_version": "7.1.0", "xml_version": "12.0.0"}}));
}

#[tokio::test]
async fn salinfo_categories_are_parsed_from_query() {
    let h = Harness::new();
    let (status, body) = h
        .call(Method::GET, "/salinfo/topic-names?categories=event-telemetry", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"ATDome": {"telemetry_names": ["position"], "event_names": ["position"]}})
    );
    assert_eq!(
        h.catalog.last.lock().unwrap().clone().unwrap(),
        [TopicCategory::Telemetry, TopicCategory::Event]
    );

    let (status, _) = h.call(Method::GET, "/salinfo/topic-data/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.catalog.last.lock().unwrap().clone().unwrap(), TopicCategory::ALL);
}

#[tokio::test]
async fn salinfo_discovery_failure_is_a_bad_request() {
    let h = Harness::with_catalog(FakeCatalog { directory_down: true, ..FakeCatalog::default() });
    let (status, body) = h.call(Method::GET, "/salinfo/metadata", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["ack"].as_str().unwrap().contains("middleware unreachable"));
}

// ═══════════════════════════════════════════════════════════════
//  /reports
// ═══════════════════════════════════════════════════════════════

fn bump_body(instance: &str, actuator_id: Value) -> Value {
    json!({
        "efd_instance": instance,
        "start_date": "2023-06-01T12:00:00",
        "end_date": "2023-06-01T12:30:00",
        "actuator_id": actuator_id
    })
}

#[tokio::test]
async fn bump_tests_report_is_returned() {
    let h = Harness::new();
    let (status, body) = h.post("/reports/m1m3-bump-tests", bump_body("summit_efd", json!("101"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["primary"][0]["start"], "2023-06-01T12:00:00.000");
    assert_eq!(body["secondary"], json!([]));

    let req = h.reports.last.lock().unwrap().clone().unwrap();
    assert_eq!(req.actuator_id, 101);
    assert_eq!(req.range.start, Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap());
    assert_eq!(req.range.end, Utc.with_ymd_and_hms(2023, 6, 1, 12, 30, 0).unwrap());
}

#[tokio::test]
async fn bump_tests_request_errors() {
    let h = Harness::new();

    let (status, body) = h
        .post("/reports/m1m3-bump-tests", json!({"efd_instance": "summit_efd", "start_date": "2023-06-01"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ack"], "Some of the required parameters is not present: end_date");

    let (status, _) = h.post("/reports/m1m3-bump-tests", bump_body("summit_efd", json!(-5))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = h.post("/reports/m1m3-bump-tests", bump_body("summit_efd", json!(999))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ack"], "unknown force actuator 999");

    let (status, body) = h.post("/reports/m1m3-bump-tests", bump_body("base_efd", json!(101))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ack"], EFD_UNAVAILABLE);
}
