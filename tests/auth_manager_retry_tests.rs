//! Integration test for the Auth Manager's NotLoggedIn retry path (spec
//! §7): a bootstrap response carrying the sign-in sentinel on the first
//! attempt must trigger a cookie re-extraction and exactly one retry,
//! which then succeeds.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::routing::get;
use axum::Router;

fn write_cookies_db(path: &std::path::Path, rows: &[(&str, &str)]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let conn = rusqlite::Connection::open(path).unwrap();
    conn.execute(
        "CREATE TABLE cookies (
            name TEXT, host_key TEXT, path TEXT, expires_utc INTEGER,
            is_secure INTEGER, is_httponly INTEGER, encrypted_value BLOB, value TEXT
        )",
        [],
    )
    .unwrap();
    for (name, value) in rows {
        conn.execute(
            "INSERT INTO cookies (name, host_key, path, expires_utc, is_secure, is_httponly, encrypted_value, value)
             VALUES (?1, '.google.com', '/', 0, 1, 1, x'', ?2)",
            rusqlite::params![name, value],
        )
        .unwrap();
    }
}

async fn start_bootstrap_server(counter: Arc<AtomicUsize>) -> std::net::SocketAddr {
    let app = Router::new().route(
        "/mole/world",
        get(move || {
            let counter = counter.clone();
            async move {
                let attempt = counter.fetch_add(1, Ordering::SeqCst);
                if attempt == 0 {
                    r#"<html><script>window.WIZ_global_data = {"qwAQke":"AccountsSignInUi"};</script></html>"#
                } else {
                    r#"<html><script>window.WIZ_global_data = {"SMqcke":"retried-token"};</script></html>"#
                }
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
#[cfg(target_os = "linux")]
async fn not_logged_in_triggers_one_cookie_reextract_and_retry() {
    let home = tempfile::tempdir().unwrap();
    std::env::set_var("HOME", home.path());

    let profile_dir = home.path().join(".config/google-chrome/Default");
    write_cookies_db(
        &profile_dir.join("Cookies"),
        &[("SID", "sid-v"), ("HSID", "hsid-v"), ("SSID", "ssid-v"), ("OSID", "osid-v")],
    );

    let request_count = Arc::new(AtomicUsize::new(0));
    let addr = start_bootstrap_server(request_count.clone()).await;

    let cache_dir = tempfile::tempdir().unwrap();
    let mut config = dynamite::config::Config::new(
        Some(cache_dir.path().to_path_buf()),
        dynamite::auth::vault::BrowserKind::Chrome,
        None,
    );
    config.bootstrap_url = format!("http://{addr}/mole/world");

    let manager = dynamite::auth::AuthManager::new(config).unwrap();
    let state = manager.authenticate(true).await.unwrap();

    assert_eq!(state.xsrf_token, "retried-token");
    assert_eq!(request_count.load(Ordering::SeqCst), 2, "expected exactly one retry after NotLoggedIn");
}
