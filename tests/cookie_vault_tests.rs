//! Integration tests for cookie extraction against a fabricated on-disk
//! Chromium profile (no real browser installation required).

use dynamite::auth::vault::BrowserKind;
use dynamite::auth::CookieVault;

fn write_cookies_db(path: &std::path::Path, rows: &[(&str, &str, &str, &str, bool, bool)]) {
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
    for (name, host_key, path_value, value, secure, http_only) in rows {
        conn.execute(
            "INSERT INTO cookies (name, host_key, path, expires_utc, is_secure, is_httponly, encrypted_value, value)
             VALUES (?1, ?2, ?3, 0, ?4, ?5, x'', ?6)",
            rusqlite::params![name, host_key, path_value, *secure as i64, *http_only as i64, value],
        )
        .unwrap();
    }
}

#[test]
#[cfg(target_os = "linux")]
fn extracts_plaintext_cookies_from_a_fabricated_profile() {
    let home = tempfile::tempdir().unwrap();
    std::env::set_var("HOME", home.path());

    let browser = BrowserKind::Chrome;
    let profile_dir = home.path().join(".config/google-chrome/Default");
    write_cookies_db(
        &profile_dir.join("Cookies"),
        &[
            ("SID", ".google.com", "/", "sid-value", true, true),
            ("SID", "mail.google.com", "/", "wrong-sid-value", true, true),
            ("OSID", "chat.google.com", "/", "osid-value", true, true),
        ],
    );

    let vault = CookieVault::new();
    let cookies = vault.extract(browser, "Default", &["SID", "OSID"]).unwrap();

    assert_eq!(cookies.get("SID").unwrap().value, "sid-value");
    assert_eq!(cookies.get("OSID").unwrap().value, "osid-value");
}

#[test]
#[cfg(target_os = "linux")]
fn missing_required_cookie_is_an_error() {
    let home = tempfile::tempdir().unwrap();
    std::env::set_var("HOME", home.path());

    let profile_dir = home.path().join(".config/google-chrome/Default");
    write_cookies_db(&profile_dir.join("Cookies"), &[("SID", ".google.com", "/", "v", true, true)]);

    let vault = CookieVault::new();
    let err = vault
        .extract(BrowserKind::Chrome, "Default", &["SID", "HSID"])
        .unwrap_err();
    assert!(matches!(err, dynamite::DynamiteError::MissingRequiredCookie(_)));
}
