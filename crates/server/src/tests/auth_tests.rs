use super::*;

#[tokio::test]
async fn created_session_resolves_to_user() {
    let sessions = SessionStore::new(30);
    let sid = sessions.create(Username::new("alice")).await;

    assert_eq!(sessions.resolve(&sid).await, Some(Username::new("alice")));
    assert_eq!(sessions.resolve("unknown").await, None);
}

#[tokio::test]
async fn invalidated_session_no_longer_resolves() {
    let sessions = SessionStore::new(30);
    let sid = sessions.create(Username::new("alice")).await;

    assert!(sessions.invalidate(&sid).await);
    assert!(!sessions.invalidate(&sid).await);
    assert_eq!(sessions.resolve(&sid).await, None);
    assert_eq!(sessions.len().await, 0);
}

#[tokio::test]
async fn idle_sessions_expire_and_active_ones_are_refreshed() {
    let sessions = SessionStore::with_idle_timeout(TimeDelta::minutes(10));
    let start = Utc::now();
    let sid = sessions.create_at(Username::new("alice"), start).await;

    let later = start + TimeDelta::minutes(8);
    assert!(sessions.resolve_at(&sid, later).await.is_some());

    let still_active = later + TimeDelta::minutes(8);
    assert!(sessions.resolve_at(&sid, still_active).await.is_some());

    let expired = still_active + TimeDelta::minutes(11);
    assert_eq!(sessions.resolve_at(&sid, expired).await, None);
    assert_eq!(sessions.len().await, 0);
}

#[test]
fn parses_named_cookie_among_others() {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::COOKIE,
        HeaderValue::from_static("theme=dark; PERSONNEL_SESSION=abc123; lang=ko"),
    );

    assert_eq!(
        parse_cookie(&headers, "PERSONNEL_SESSION").as_deref(),
        Some("abc123")
    );
    assert_eq!(parse_cookie(&headers, "missing"), None);
}

#[test]
fn cookie_headers_carry_session_attributes() {
    let set = session_cookie("PERSONNEL_SESSION", "abc").expect("header");
    assert_eq!(
        set.to_str().expect("ascii"),
        "PERSONNEL_SESSION=abc; HttpOnly; SameSite=Lax; Path=/"
    );
    let cleared = clear_session_cookie("PERSONNEL_SESSION").expect("header");
    assert!(cleared.to_str().expect("ascii").contains("Max-Age=0"));
}

#[tokio::test]
async fn authenticate_checks_storage_credentials() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.create_user("alice", "pw").await.expect("user");

    let user = authenticate(&storage, " alice ", "pw").await.expect("login");
    assert_eq!(user.as_str(), "alice");

    assert!(matches!(
        authenticate(&storage, "alice", "nope").await,
        Err(LoginError::InvalidCredentials)
    ));
    assert!(matches!(
        authenticate(&storage, "", "pw").await,
        Err(LoginError::InvalidCredentials)
    ));
}

#[tokio::test]
async fn request_context_is_anonymous_without_valid_cookie() {
    let sessions = SessionStore::new(30);
    let headers = HeaderMap::new();
    let ctx = request_context(&sessions, "PERSONNEL_SESSION", &headers).await;
    assert!(!ctx.is_authenticated());

    let sid = sessions.create(Username::new("bob")).await;
    let mut headers = HeaderMap::new();
    headers.insert(
        header::COOKIE,
        HeaderValue::from_str(&format!("PERSONNEL_SESSION={sid}")).expect("header"),
    );
    let ctx = request_context(&sessions, "PERSONNEL_SESSION", &headers).await;
    assert_eq!(ctx.current_username(), "bob");
}

#[tokio::test]
async fn creating_a_session_sweeps_abandoned_ones() {
    let sessions = SessionStore::with_idle_timeout(TimeDelta::minutes(1));
    let day_ago = Utc::now() - TimeDelta::days(1);
    for i in 0..1000 {
        sessions
            .create_at(Username::new(format!("stale-{i}")), day_ago)
            .await;
    }

    let live = sessions.create(Username::new("alice")).await;
    assert_eq!(sessions.len().await, 1);
    assert_eq!(sessions.resolve(&live).await, Some(Username::new("alice")));
}

#[tokio::test]
async fn purge_removes_only_idle_sessions() {
    let sessions = SessionStore::with_idle_timeout(TimeDelta::minutes(10));
    let start = Utc::now();
    sessions.create_at(Username::new("old"), start).await;
    let fresh = sessions
        .create_at(Username::new("fresh"), start + TimeDelta::minutes(9))
        .await;

    let removed = sessions
        .purge_expired_at(start + TimeDelta::minutes(12))
        .await;
    assert_eq!(removed, 1);
    assert_eq!(sessions.len().await, 1);
    assert_eq!(
        sessions
            .resolve_at(&fresh, start + TimeDelta::minutes(12))
            .await,
        Some(Username::new("fresh"))
    );
}
