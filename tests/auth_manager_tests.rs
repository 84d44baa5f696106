//! Integration test for the Auth Manager's cache load/reuse path: a fresh,
//! non-stale cached state on disk must be served back without any network
//! access (no bootstrap scrape, no cookie extraction).

use std::collections::HashMap;

use dynamite::auth::vault::BrowserKind;
use dynamite::config::Config;

#[derive(serde::Serialize)]
struct CachedAuthFixture {
    cookies: HashMap<String, String>,
    xsrf_token: String,
    cached_at: i64,
}

#[tokio::test]
async fn fresh_cached_state_is_served_without_network_access() {
    let cache_dir = tempfile::tempdir().unwrap();
    let config = Config::new(Some(cache_dir.path().to_path_buf()), BrowserKind::Chrome, None);

    let mut cookies = HashMap::new();
    cookies.insert("SID".to_string(), "cached-sid".to_string());
    let fixture = CachedAuthFixture {
        cookies,
        xsrf_token: "cached-token".to_string(),
        cached_at: chrono::Utc::now().timestamp(),
    };
    std::fs::create_dir_all(&cache_dir).unwrap();
    std::fs::write(
        config.cached_auth_path(),
        serde_json::to_vec(&fixture).unwrap(),
    )
    .unwrap();

    let manager = dynamite::auth::AuthManager::new(config).unwrap();
    let state = manager.authenticate(false).await.unwrap();

    assert_eq!(state.xsrf_token, "cached-token");
    assert_eq!(state.cookies.get("SID").unwrap(), "cached-sid");
    assert!(!state.is_stale());
}
