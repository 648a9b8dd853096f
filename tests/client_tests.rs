// SiteClient tests: cache consistency over real HTTP
// Author: kelexine (https://github.com/kelexine)

use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use sitegate::auth::SessionContext;
use sitegate::cache::{EntryState, PushEvent, QueryKey, Resource};
use sitegate::client::SiteClient;
use sitegate::config::AppConfig;
use sitegate::gateway::ProxyGateway;
use sitegate::server::create_router;

const PLANS_ENVELOPE: &str = r#"{"success":true,"data":[{"id":"pp_1","status":"pending"}],"error":null}"#;

fn signed_in(server: &ServerGuard) -> SiteClient {
    SiteClient::new(&server.url(), SessionContext::with_token("tok")).unwrap()
}

#[tokio::test]
async fn test_concurrent_reads_share_one_request() {
    let mut server = Server::new_async().await;
    let gateway = server
        .mock("GET", "/api/purchased-plans")
        .match_header("cookie", "accessToken=tok")
        .with_status(200)
        .with_body(PLANS_ENVELOPE)
        .expect(1)
        .create_async()
        .await;

    let client = signed_in(&server);
    let (a, b, c) = tokio::join!(
        client.purchased_plans(),
        client.purchased_plans(),
        client.purchased_plans()
    );

    let expected = Some(json!([{"id": "pp_1", "status": "pending"}]));
    assert_eq!(a.unwrap(), expected);
    assert_eq!(b.unwrap(), expected);
    assert_eq!(c.unwrap(), expected);
    assert_eq!(client.cache().stats().deduplicated, 2);
    gateway.assert_async().await;
}

#[tokio::test]
async fn test_activation_invalidates_plans_and_subscription() {
    let mut server = Server::new_async().await;
    let plans = server
        .mock("GET", "/api/purchased-plans")
        .with_status(200)
        .with_body(PLANS_ENVELOPE)
        .expect(2)
        .create_async()
        .await;
    let subscription = server
        .mock("GET", "/api/subscriptions/active")
        .with_status(200)
        .with_body(r#"{"success":true,"data":{"plan":"pro"},"error":null}"#)
        .expect(2)
        .create_async()
        .await;
    let notifications = server
        .mock("GET", "/api/notifications")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"success":true,"data":[],"error":null}"#)
        .expect(1)
        .create_async()
        .await;
    let activate = server
        .mock("POST", "/api/purchased-plans/pp_1/activate")
        .with_status(200)
        .with_body(r#"{"success":true,"data":{"activated":true},"error":null}"#)
        .expect(1)
        .create_async()
        .await;

    let client = signed_in(&server);
    client.purchased_plans().await.unwrap();
    client.active_subscription().await.unwrap();
    client.notifications(1, 10).await.unwrap();

    // Still fresh: served from the cache
    client.purchased_plans().await.unwrap();

    let result = client.activate_plan("pp_1").await.unwrap();
    assert_eq!(result, json!({"activated": true}));
    assert_eq!(
        client
            .cache()
            .state_of(&QueryKey::new(Resource::PurchasedPlans)),
        EntryState::Stale
    );

    client.purchased_plans().await.unwrap();
    client.active_subscription().await.unwrap();
    // Not in the activation's invalidation set
    client.notifications(1, 10).await.unwrap();

    plans.assert_async().await;
    subscription.assert_async().await;
    notifications.assert_async().await;
    activate.assert_async().await;
}

#[tokio::test]
async fn test_failed_mutation_leaves_cache_alone() {
    let mut server = Server::new_async().await;
    let plans = server
        .mock("GET", "/api/purchased-plans")
        .with_status(200)
        .with_body(PLANS_ENVELOPE)
        .expect(1)
        .create_async()
        .await;
    server
        .mock("POST", "/api/purchased-plans/pp_9/activate")
        .with_status(404)
        .with_body(r#"{"success":false,"data":null,"error":{"message":"Purchased plan not found","statusCode":404}}"#)
        .create_async()
        .await;

    let client = signed_in(&server);
    client.purchased_plans().await.unwrap();

    let err = client.activate_plan("pp_9").await.unwrap_err();
    assert_eq!(err.status_code(), 404);
    assert_eq!(err.to_string(), "Purchased plan not found");

    client.purchased_plans().await.unwrap();
    plans.assert_async().await;
}

#[tokio::test]
async fn test_anonymous_reads_of_private_data_are_skipped() {
    let mut server = Server::new_async().await;
    let gateway = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let client = SiteClient::new(&server.url(), SessionContext::anonymous()).unwrap();
    assert_eq!(client.purchased_plans().await.unwrap(), None);
    assert_eq!(client.notifications(1, 10).await.unwrap(), None);
    assert!(client.cache().is_empty());
    gateway.assert_async().await;
}

#[tokio::test]
async fn test_errors_are_not_cached() {
    let mut server = Server::new_async().await;
    let gateway = server
        .mock("GET", "/api/subscriptions/active")
        .with_status(401)
        .with_body(r#"{"success":false,"data":null,"error":{"message":"Session expired","statusCode":401}}"#)
        .expect(2)
        .create_async()
        .await;

    let client = signed_in(&server);
    for _ in 0..2 {
        let err = client.active_subscription().await.unwrap_err();
        assert_eq!(err.status_code(), 401);
    }
    gateway.assert_async().await;
}

#[tokio::test]
async fn test_push_notification_marks_notifications_stale() {
    let mut server = Server::new_async().await;
    let gateway = server
        .mock("GET", "/api/notifications")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("page".into(), "1".into()),
            Matcher::UrlEncoded("limit".into(), "20".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"success":true,"data":[{"id":"n1"}],"error":null}"#)
        .expect(2)
        .create_async()
        .await;

    let client = signed_in(&server);
    client.notifications(1, 20).await.unwrap();
    assert_eq!(client.handle_push(&PushEvent::NotificationReceived), 1);
    client.notifications(1, 20).await.unwrap();
    gateway.assert_async().await;
}

#[tokio::test]
async fn test_end_to_end_through_gateway() {
    let mut backend = Server::new_async().await;
    let backend_plans = backend
        .mock("GET", "/purchased-plans")
        .match_header("authorization", "Bearer e2e-token")
        .with_status(200)
        .with_body(r#"[{"id":"pp_7"}]"#)
        .expect(1)
        .create_async()
        .await;

    let mut config = AppConfig::default();
    config.backend.base_url = backend.url();
    let gateway = ProxyGateway::from_config(&config.backend).unwrap();
    let app = create_router(config.clone(), gateway).unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = SiteClient::from_config(
        &config,
        &format!("http://{}", addr),
        SessionContext::with_token("e2e-token"),
    )
    .unwrap();
    let first = client.purchased_plans().await.unwrap();
    let second = client.purchased_plans().await.unwrap();

    assert_eq!(first, Some(json!([{"id": "pp_7"}])));
    assert_eq!(first, second);
    backend_plans.assert_async().await;
}
