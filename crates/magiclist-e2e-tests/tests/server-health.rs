use magiclist_e2e_tests::{launch_env, prepare_env};
use tracing_test::traced_test;

#[tokio::test]
#[traced_test]
async fn test_health() {
    let (args, _config_guard) = prepare_env("server-health").unwrap();
    let (client, base_url) = launch_env(args).await.unwrap();

    let response = client.get(base_url.join("health").unwrap()).send().await.unwrap();
    assert!(response.status().is_success());
    assert_eq!(response.text().await.unwrap(), "OK");

    let response = client
        .get(base_url.join("api/band/count").unwrap())
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let count: i64 = response.json().await.unwrap();
    assert_eq!(count, 0);
}
