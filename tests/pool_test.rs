//! 连接池集成测试
//!
//! 使用 `common` 中的进程内 DDP 服务器。

mod common;

use chrono::{TimeDelta, Utc};
use common::{FakeServer, URL};
use livepool::{
    ConfigUpdate, ConnectOptions, ConnectionPool, FileRecordStore, LoginRequest, PoolConfig, PoolErrorKind,
    PoolOptions, StatusKind, TransportOptions,
};
use livepool_core::{NewRecord, RecordFilter, RecordPatch, RecordStore, canonical_session_key};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn pool(server: &FakeServer, update: ConfigUpdate) -> ConnectionPool {
    common::init_tracing();
    ConnectionPool::builder()
        .connector(server.connector())
        .options(PoolOptions::new().update(update.url(URL)))
        .build()
}

fn password_login() -> LoginRequest {
    LoginRequest::new()
        .with("user", json!({"email": "test@test.com"}))
        .with("password", json!("test"))
}

async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

#[tokio::test]
async fn test_new_connection() {
    let server = FakeServer::new();
    let pool = pool(&server, ConfigUpdate::new());

    let connection = pool.connect(ConnectOptions::new()).await.unwrap().unwrap();
    assert!(connection.status().connected);
    assert_eq!(pool.connection_count(), 1);
    assert_eq!(pool.store().count().unwrap(), 1);

    let record = pool.store().get(connection.record_id().unwrap()).unwrap().unwrap();
    assert_eq!(record.url, URL);
    assert_eq!(record.session_key, None);
    assert_eq!(record.resume, None);

    pool.stop().unwrap();
}

#[tokio::test]
async fn test_handshake_advertises_proxy_capability() {
    let server = FakeServer::new();
    let pool = pool(&server, ConfigUpdate::new());

    pool.connect(ConnectOptions::new()).await.unwrap().unwrap();
    let handshakes = server.handshakes();
    assert_eq!(handshakes.len(), 1);
    assert!(handshakes[0].iter().any(|s| s == "ddpproxy"));

    pool.connect(ConnectOptions::new().auto_publish(true)).await.unwrap().unwrap();
    let handshakes = server.handshakes();
    assert_eq!(handshakes.len(), 2);
    assert!(!handshakes[1].iter().any(|s| s == "ddpproxy"));
    assert_eq!(handshakes[1], vec!["1", "pre2", "pre1"]);

    pool.stop().unwrap();
}

#[tokio::test]
async fn test_subscribe_and_call_on_connection() {
    let server = FakeServer::new();
    let pool = pool(&server, ConfigUpdate::new());
    let connection = pool.connect(ConnectOptions::new()).await.unwrap().unwrap();

    connection.subscribe("fruits", vec![]).await.unwrap();
    let fruits = connection.collection("fruits").unwrap();
    assert_eq!(fruits.len(), 1);
    let (_, doc) = fruits.find_one().unwrap();
    assert_eq!(doc.get("name"), Some(&json!("apple")));

    connection.call("removeFruits", vec![]).await.unwrap();
    assert_eq!(fruits.len(), 0);
    connection.call("addFruit", vec![json!("apple")]).await.unwrap();
    assert_eq!(fruits.len(), 1);

    pool.stop().unwrap();
}

#[tokio::test]
async fn test_resume_string_session_key() {
    let server = FakeServer::new();
    let pool = pool(&server, ConfigUpdate::new());

    let apple = pool
        .connect(ConnectOptions::new().session_key("apple"))
        .await
        .unwrap()
        .unwrap();
    apple.subscribe("fruits", vec![]).await.unwrap();
    assert!(apple.collection("fruits").is_some());

    let anonymous = pool.connect(ConnectOptions::new()).await.unwrap().unwrap();
    assert!(anonymous.collection("fruits").is_none());

    let banana = pool
        .connect(ConnectOptions::new().session_key("banana"))
        .await
        .unwrap()
        .unwrap();
    assert!(banana.collection("fruits").is_none());

    let resumed = pool
        .connect(ConnectOptions::new().session_key("apple"))
        .await
        .unwrap()
        .unwrap();
    assert!(resumed.ptr_eq(&apple));
    assert_eq!(resumed.collection("fruits").unwrap().len(), 1);
    assert_eq!(pool.connection_count(), 3);

    pool.stop().unwrap();
}

#[tokio::test]
async fn test_resume_object_session_key_ignores_key_order() {
    let server = FakeServer::new();
    let pool = pool(&server, ConfigUpdate::new());

    let first = pool
        .connect(ConnectOptions::new().session_key(json!({"user": "u1", "tab": 3})))
        .await
        .unwrap()
        .unwrap();
    let record = pool.store().get(first.record_id().unwrap()).unwrap().unwrap();
    assert_eq!(record.session_key.as_deref(), Some(r#"{"tab":3,"user":"u1"}"#));

    let other = pool
        .connect(ConnectOptions::new().session_key(json!({"user": "u2", "tab": 3})))
        .await
        .unwrap()
        .unwrap();
    assert!(!other.ptr_eq(&first));

    let again = pool
        .connect(ConnectOptions::new().session_key(json!({"tab": 3, "user": "u1"})))
        .await
        .unwrap()
        .unwrap();
    assert!(again.ptr_eq(&first));

    pool.stop().unwrap();
}

#[tokio::test]
async fn test_login_with_password() {
    let server = FakeServer::new();
    let pool = pool(&server, ConfigUpdate::new());

    let connection = pool
        .connect(ConnectOptions::new().login(password_login()))
        .await
        .unwrap()
        .unwrap();
    let status = connection.login_status().unwrap();
    let token = status.result().unwrap().token.clone();
    assert!(!token.is_empty());

    let record = pool.store().get(connection.record_id().unwrap()).unwrap().unwrap();
    assert_eq!(record.resume.as_deref(), Some(token.as_str()));
    assert_eq!(server.login_calls(), 1);

    pool.stop().unwrap();
}

#[tokio::test]
async fn test_resume_login_returns_same_handle_without_relogin() {
    let server = FakeServer::new();
    let pool = pool(&server, ConfigUpdate::new());

    let first = pool
        .connect(ConnectOptions::new().session_key("apple").login(password_login()))
        .await
        .unwrap()
        .unwrap();
    let token = first.login_status().unwrap().result().unwrap().token.clone();

    let second = pool
        .connect(ConnectOptions::new().session_key("apple").login(LoginRequest::resume(&token)))
        .await
        .unwrap()
        .unwrap();
    assert!(second.ptr_eq(&first));
    assert_eq!(server.login_calls(), 1);

    // 同一凭证换一个会话键不能恢复，只会新建连接
    let third = pool
        .connect(ConnectOptions::new().session_key("banana").login(LoginRequest::resume(&token)))
        .await
        .unwrap()
        .unwrap();
    assert!(!third.ptr_eq(&first));
    assert_eq!(server.login_calls(), 2);
    assert_eq!(pool.connection_count(), 2);

    pool.stop().unwrap();
}

#[tokio::test]
async fn test_session_key_alone_does_not_resume_login() {
    let server = FakeServer::new();
    let pool = pool(&server, ConfigUpdate::new());

    let first = pool
        .connect(ConnectOptions::new().session_key("apple").login(password_login()))
        .await
        .unwrap()
        .unwrap();

    let guess = pool
        .connect(ConnectOptions::new().session_key("apple").login(LoginRequest::resume("guess")))
        .await
        .unwrap()
        .unwrap();
    assert!(!guess.ptr_eq(&first));
    assert!(guess.login_status().unwrap().error().is_some());
    assert!(guess.is_closed());
    assert_eq!(pool.connection_count(), 1);

    pool.stop().unwrap();
}

#[tokio::test]
async fn test_login_with_invalid_credentials() {
    let server = FakeServer::new();
    let pool = pool(&server, ConfigUpdate::new());

    let connection = pool
        .connect(ConnectOptions::new().login(LoginRequest::new().with("user", json!("invalid@test.com"))))
        .await
        .unwrap()
        .unwrap();

    let error = connection.login_status().unwrap().error().map(str::to_string).unwrap();
    assert!(error.contains("User not found"), "{}", error);
    assert!(connection.is_closed());
    assert_eq!(connection.status().kind, StatusKind::Offline);
    assert_eq!(pool.connection_count(), 0);
    assert_eq!(pool.store().count().unwrap(), 0);
    assert!(eventually(|| server.live_sessions() == 0).await);
}

#[tokio::test]
async fn test_failed_login_leaves_nothing_to_resume() {
    let server = FakeServer::new();
    let pool = pool(&server, ConfigUpdate::new());

    let failed = pool
        .connect(
            ConnectOptions::new()
                .session_key("apple")
                .login(LoginRequest::new().with("user", json!("invalid@test.com"))),
        )
        .await
        .unwrap()
        .unwrap();
    assert!(failed.login_status().unwrap().error().is_some());
    assert!(failed.is_closed());
    assert_eq!(pool.store().count().unwrap(), 0);

    let fresh = pool
        .connect(ConnectOptions::new().session_key("apple"))
        .await
        .unwrap()
        .unwrap();
    assert!(!fresh.ptr_eq(&failed));
    assert!(!fresh.is_closed());
    assert!(fresh.login_status().is_none());
    assert_eq!(pool.connection_count(), 1);
    assert_eq!(pool.store().count().unwrap(), 1);

    pool.stop().unwrap();
}

#[tokio::test]
async fn test_non_string_resume_does_not_match_anonymous_session() {
    let server = FakeServer::new();
    let pool = pool(&server, ConfigUpdate::new());

    let anonymous = pool
        .connect(ConnectOptions::new().session_key("apple"))
        .await
        .unwrap()
        .unwrap();

    let other = pool
        .connect(
            ConnectOptions::new()
                .session_key("apple")
                .login(LoginRequest::new().with("resume", json!(123))),
        )
        .await
        .unwrap()
        .unwrap();
    assert!(!other.ptr_eq(&anonymous));
    assert_eq!(server.login_calls(), 1);
    assert!(other.login_status().is_some());
    assert!(!anonymous.is_closed());

    pool.stop().unwrap();
}

#[tokio::test]
async fn test_login_without_token_fails() {
    let server = FakeServer::new();
    let pool = pool(&server, ConfigUpdate::new());

    let connection = pool
        .connect(ConnectOptions::new().login(LoginRequest::new().with("no_token", json!(true))))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(connection.login_status().unwrap().error(), Some("No token was generated"));
    assert_eq!(pool.connection_count(), 0);
    assert_eq!(pool.store().count().unwrap(), 0);
}

#[tokio::test]
async fn test_configure_merges_over_current_values() {
    let server = FakeServer::new();
    let pool = pool(&server, ConfigUpdate::new().session_expire(60));
    let before = pool.config();

    let transport = TransportOptions {
        quiet_errors: true,
        ..Default::default()
    };
    let returned = pool.configure(
        PoolOptions::new()
            .update(ConfigUpdate::new().transport(transport.clone()))
            .is_valid_session(|_| false),
    );
    assert!(returned.config().transport.quiet_errors);

    let after = pool.config();
    assert_eq!(after.transport, transport);
    assert_eq!(after.session_expire, 60);
    assert_eq!(
        PoolConfig {
            transport: before.transport.clone(),
            ..after
        },
        before
    );

    let rejected = pool.connect(ConnectOptions::new().session_key("apple")).await.unwrap();
    assert!(rejected.is_none());
    assert_eq!(pool.connection_count(), 0);

    pool.stop().unwrap();
}

#[tokio::test]
async fn test_invalid_url() {
    let server = FakeServer::new();
    let pool = pool(&server, ConfigUpdate::new());

    for url in ["ftp://localhost/", "not a url", "  "] {
        let err = pool.connect(ConnectOptions::new().url(url)).await.unwrap_err();
        assert_eq!(err.kind(), PoolErrorKind::InvalidUrl, "{}", url);
    }
    assert!(server.handshakes().is_empty());
    assert_eq!(pool.connection_count(), 0);

    // 配置的默认地址为空
    pool.configure(PoolOptions::new().update(ConfigUpdate::new().url("")));
    let err = pool.connect(ConnectOptions::new()).await.unwrap_err();
    assert_eq!(err.kind(), PoolErrorKind::InvalidUrl);
    let err = pool.connect(ConnectOptions::new().url("")).await.unwrap_err();
    assert_eq!(err.kind(), PoolErrorKind::InvalidUrl);
}

#[tokio::test]
async fn test_empty_url_falls_back_to_config() {
    let server = FakeServer::new();
    let pool = pool(&server, ConfigUpdate::new());

    let connection = pool.connect(ConnectOptions::new().url("")).await.unwrap().unwrap();
    assert_eq!(connection.url(), URL);
    let record = pool.store().get(connection.record_id().unwrap()).unwrap().unwrap();
    assert_eq!(record.url, URL);

    pool.stop().unwrap();
}

#[tokio::test]
async fn test_connection_timeout() {
    let server = FakeServer::new();
    let pool = pool(&server, ConfigUpdate::new().connection_timeout(1));

    let started = Instant::now();
    let err = pool.connect(ConnectOptions::new().url("http://1")).await.unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(err.kind(), PoolErrorKind::ConnectionTimeout);
    assert!(elapsed >= Duration::from_millis(900), "{:?}", elapsed);
    assert!(elapsed < Duration::from_millis(1900), "{:?}", elapsed);
    assert_eq!(pool.connection_count(), 0);
    assert_eq!(pool.store().count().unwrap(), 0);

    pool.stop().unwrap();
}

#[tokio::test]
async fn test_connection_failure_without_retry_is_timeout() {
    let server = FakeServer::new();
    let transport = TransportOptions {
        retry: false,
        ..Default::default()
    };
    let pool = pool(&server, ConfigUpdate::new().connection_timeout(1).transport(transport));

    let started = Instant::now();
    let err = pool
        .connect(ConnectOptions::new().url("http://unreachable-host/"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), PoolErrorKind::ConnectionTimeout);
    assert!(started.elapsed() < Duration::from_millis(1900));
    assert_eq!(pool.connection_count(), 0);
    assert_eq!(pool.store().count().unwrap(), 0);

    pool.stop().unwrap();
}

#[tokio::test]
async fn test_close_removes_connection() {
    let server = FakeServer::new();
    let pool = pool(&server, ConfigUpdate::new());
    assert_eq!(pool.connection_count(), 0);

    let connection = pool.connect(ConnectOptions::new()).await.unwrap().unwrap();
    assert_eq!(pool.connection_count(), 1);
    assert_eq!(pool.store().count().unwrap(), 1);

    connection.close();
    assert_eq!(pool.connection_count(), 0);
    assert_eq!(pool.store().count().unwrap(), 0);
    assert!(eventually(|| server.live_sessions() == 0).await);

    pool.stop().unwrap();
}

#[tokio::test]
async fn test_connection_expire_zero() {
    let server = FakeServer::new();
    let pool = pool(&server, ConfigUpdate::new().connection_expire(0));

    pool.connect(ConnectOptions::new()).await.unwrap().unwrap();
    let record = pool.store().find_one(&RecordFilter::all()).unwrap().unwrap();
    assert!(record.expire_at <= Utc::now());

    pool.stop().unwrap();
}

#[tokio::test]
async fn test_session_expire_zero() {
    let server = FakeServer::new();
    let pool = pool(&server, ConfigUpdate::new().session_expire(0));

    pool.connect(ConnectOptions::new().session_key("apple")).await.unwrap().unwrap();
    let filter = RecordFilter::all().session_key(Some("apple".to_string()));
    let record = pool.store().find_one(&filter).unwrap().unwrap();
    assert!(record.expire_at <= Utc::now());

    pool.stop().unwrap();
}

#[tokio::test]
async fn test_session_expire_on_resume() {
    let server = FakeServer::new();
    let pool = pool(&server, ConfigUpdate::new().session_expire_on_resume(1234));

    pool.connect(ConnectOptions::new().session_key("apple")).await.unwrap().unwrap();
    pool.connect(ConnectOptions::new().session_key("apple")).await.unwrap().unwrap();

    let filter = RecordFilter::all().session_key(Some("apple".to_string()));
    let record = pool.store().find_one(&filter).unwrap().unwrap();
    let remaining = record.expire_at - Utc::now();
    assert!((remaining - TimeDelta::seconds(1234)).abs() < TimeDelta::milliseconds(500));

    pool.stop().unwrap();
}

#[tokio::test]
async fn test_is_valid_session() {
    let server = FakeServer::new();
    let pool = pool(&server, ConfigUpdate::new());
    pool.configure(PoolOptions::new().is_valid_session(|key| key.get("name") == Some(&json!("apple"))));

    let rejected = pool.connect(ConnectOptions::new().session_key("1234")).await.unwrap();
    assert!(rejected.is_none());
    assert!(server.handshakes().is_empty());

    let first = pool
        .connect(ConnectOptions::new().session_key(json!({"name": "apple"})))
        .await
        .unwrap()
        .unwrap();
    let second = pool
        .connect(ConnectOptions::new().session_key(json!({"name": "apple"})))
        .await
        .unwrap()
        .unwrap();
    assert!(first.ptr_eq(&second));

    pool.stop().unwrap();
}

#[tokio::test]
async fn test_expiring_connections_with_expire_interval() {
    let server = FakeServer::new();
    let pool = pool(&server, ConfigUpdate::new().expire_interval(1.0));

    let connection = pool.connect(ConnectOptions::new()).await.unwrap().unwrap();
    let id = connection.record_id().unwrap();
    pool.store().update(id, RecordPatch::expire_at(Utc::now())).unwrap();
    assert_eq!(pool.store().count().unwrap(), 1);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(pool.store().count().unwrap(), 0);
    assert_eq!(pool.connection_count(), 0);
    assert!(connection.is_closed());
    assert!(eventually(|| server.live_sessions() == 0).await);

    pool.stop().unwrap();
}

#[tokio::test]
async fn test_stop_expire() {
    let server = FakeServer::new();
    let pool = pool(&server, ConfigUpdate::new().expire_interval(1.0));
    pool.stop_expire();

    let connection = pool.connect(ConnectOptions::new()).await.unwrap().unwrap();
    let id = connection.record_id().unwrap();
    pool.store()
        .update(id, RecordPatch::expire_at(Utc::now() - TimeDelta::days(1)))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(pool.store().count().unwrap(), 1);
    assert!(!connection.is_closed());

    // 手动清理
    assert_eq!(pool.remove_expired_connections().unwrap(), 1);
    assert_eq!(pool.store().count().unwrap(), 0);

    pool.stop().unwrap();
}

#[tokio::test]
async fn test_stop_empties_pool() {
    let server = FakeServer::new();
    let pool = pool(&server, ConfigUpdate::new().expire_interval(1.0));

    let plain = pool.connect(ConnectOptions::new()).await.unwrap().unwrap();
    let session = pool
        .connect(ConnectOptions::new().session_key("apple").login(password_login()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pool.store().count().unwrap(), 2);

    pool.stop().unwrap();
    assert_eq!(pool.store().count().unwrap(), 0);
    assert_eq!(pool.connection_count(), 0);
    assert!(plain.is_closed());
    assert!(session.is_closed());
    assert!(pool.expire_period().is_none());
    assert!(eventually(|| server.live_sessions() == 0).await);

    // 重复停止
    pool.stop().unwrap();
}

#[tokio::test]
async fn test_orphan_record_in_file_store() {
    let server = FakeServer::new();
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn RecordStore> = Arc::new(FileRecordStore::open(dir.path().join("records.json")).unwrap());

    // 上一个进程留下的记录，没有对应的连接
    let orphan = store
        .insert(NewRecord {
            url: URL.to_string(),
            session_key: Some(canonical_session_key(&json!("apple"))),
            resume: None,
            expire_at: Utc::now() + TimeDelta::hours(1),
        })
        .unwrap();

    common::init_tracing();
    let pool = ConnectionPool::builder()
        .connector(server.connector())
        .store(store.clone())
        .options(PoolOptions::new().update(ConfigUpdate::new().url(URL)))
        .build();

    let connection = pool
        .connect(ConnectOptions::new().session_key("apple"))
        .await
        .unwrap()
        .unwrap();
    assert_ne!(connection.record_id(), Some(orphan));
    assert!(store.get(orphan).unwrap().is_none());
    assert_eq!(store.count().unwrap(), 1);

    // 重新打开文件能看到持久化的记录
    let reopened = FileRecordStore::open(dir.path().join("records.json")).unwrap();
    assert_eq!(reopened.count().unwrap(), 1);

    pool.stop().unwrap();
    assert_eq!(store.count().unwrap(), 0);
}

#[tokio::test]
async fn test_pool_from_toml_config() {
    let server = FakeServer::new();
    let config = PoolConfig::from_toml(
        r#"
        url = "http://localhost:3000/"
        connection_timeout = 5
        session_expire = 30
        expire_interval = 0.5
        "#,
    )
    .unwrap();

    let pool = ConnectionPool::builder()
        .connector(server.connector())
        .config(config)
        .build();
    assert_eq!(pool.expire_period(), Some(Duration::from_millis(500)));

    let connection = pool
        .connect(ConnectOptions::new().session_key("apple"))
        .await
        .unwrap()
        .unwrap();
    let record = pool.store().get(connection.record_id().unwrap()).unwrap().unwrap();
    let remaining = record.expire_at - Utc::now();
    assert!(remaining <= TimeDelta::seconds(30) && remaining > TimeDelta::seconds(28));

    pool.stop().unwrap();
}
