use lbstress_client::{ApiClient, ApiRequest, HttpClient, IdentityClient, USER_AGENT};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_post_sends_standard_headers_and_body() {
  let server = MockServer::start().await;

  Mock::given(method("POST"))
    .and(path("/v2.0/lbaas/loadbalancers"))
    .and(header("content-type", "application/json"))
    .and(header("user-agent", USER_AGENT))
    .and(header("x-auth-token", "tok-1"))
    .and(body_json(json!({"loadbalancer": {"name": "lb-0"}})))
    .respond_with(
      ResponseTemplate::new(201).set_body_json(json!({"loadbalancer": {"id": "lb-uuid"}})),
    )
    .expect(1)
    .mount(&server)
    .await;

  let client = HttpClient::new(&server.uri()).unwrap();
  let request = ApiRequest::post(
    "v2.0/lbaas/loadbalancers",
    json!({"loadbalancer": {"name": "lb-0"}}),
  )
  .with_token("tok-1");

  let response = ApiClient::request(&client, &request).await.unwrap();

  assert_eq!(response.status, 201);
  assert_eq!(response.json().unwrap()["loadbalancer"]["id"], "lb-uuid");
}

#[tokio::test]
async fn test_error_status_is_returned_not_raised() {
  let server = MockServer::start().await;

  Mock::given(method("GET"))
    .and(path("/v2.0/lbaas/loadbalancers/abc"))
    .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
    .mount(&server)
    .await;

  let client = HttpClient::new(&server.uri()).unwrap();
  let response = ApiClient::request(&client, &ApiRequest::get("v2.0/lbaas/loadbalancers/abc"))
    .await
    .unwrap();

  assert_eq!(response.status, 503);
  assert_eq!(response.body, "busy");
  assert!(!response.is_success());
}

#[tokio::test]
async fn test_query_parameters_are_sent() {
  let server = MockServer::start().await;

  Mock::given(method("GET"))
    .and(path("/v2.0/lbaas/pools"))
    .and(query_param("name", "pool-0"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({"pools": []})))
    .expect(1)
    .mount(&server)
    .await;

  let client = HttpClient::new(&server.uri()).unwrap();
  let request = ApiRequest::get("v2.0/lbaas/pools").with_query("name", "pool-0");

  let response = ApiClient::request(&client, &request).await.unwrap();
  assert!(response.is_success());
}

#[tokio::test]
async fn test_identity_response_headers_are_lowercased() {
  let server = MockServer::start().await;

  Mock::given(method("POST"))
    .and(path("/v3/auth/tokens"))
    .respond_with(ResponseTemplate::new(201).insert_header("X-Subject-Token", "subject-token"))
    .mount(&server)
    .await;

  let client = HttpClient::new(&server.uri()).unwrap();
  let response = IdentityClient::request(&client, &ApiRequest::post("v3/auth/tokens", json!({})))
    .await
    .unwrap();

  assert_eq!(
    response.headers.get("x-subject-token").map(String::as_str),
    Some("subject-token")
  );
  assert_eq!(response.header("X-Subject-Token"), Some("subject-token"));
}
