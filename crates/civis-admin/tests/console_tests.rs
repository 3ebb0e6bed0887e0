//! Integration tests for the AdminConsole against a mock admin API.
//!
//! These tests drive login, reads, writes and 401 handling end to end
//! through the real HTTP client.

use civis_admin::models::{DashboardFilter, ReportFilter, ReportStatus, ReportStatusChange, UserFilter, UserUpdate};
use civis_admin::{mutations, AdminConsole};
use civis_core::session::MemorySessionStorage;
use civis_core::{ClientConfig, SessionState};
use httpmock::MockServer;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

fn console_for(server: &MockServer) -> AdminConsole {
    civis_core::logging::init_logging(true);
    AdminConsole::builder(ClientConfig::new(server.base_url()))
        .storage(Arc::new(MemorySessionStorage::new()))
        .gc_interval(None)
        .build()
        .expect("console should build")
}

async fn mock_login(server: &MockServer) -> httpmock::Mock<'_> {
    server
        .mock_async(|when, then| {
            when.method("POST")
                .path("/api/admin/auth/login")
                .json_body(json!({ "emailOrCpf": "a@b.com", "password": "secret1" }));
            then.status(200).json_body(json!({
                "token": "tok123",
                "admin": {
                    "userId": "u1",
                    "name": "A",
                    "allowedCities": ["x"],
                    "isSuperAdmin": false,
                    "isMayor": true,
                    "secretaria": { "id": "s1", "name": "Saúde" }
                }
            }));
        })
        .await
}

#[tokio::test]
async fn test_login_then_own_phone_update_refreshes_session() {
    let server = MockServer::start_async().await;
    let login = mock_login(&server).await;
    let update = server
        .mock_async(|when, then| {
            when.method("PUT")
                .path("/api/admin/users/u1")
                .header("authorization", "Bearer tok123")
                .json_body(json!({ "phone": "+55 11 98888-7777" }));
            then.status(200).json_body(json!({
                "id": "u1",
                "name": "A",
                "phone": "+55 11 98888-7777"
            }));
        })
        .await;
    let list = server
        .mock_async(|when, then| {
            when.method("GET").path("/api/admin/users");
            then.status(200).json_body(json!([{ "id": "u1", "name": "A" }]));
        })
        .await;

    let console = console_for(&server);
    let admin = console.login("a@b.com", "secret1", true).await.unwrap();
    login.assert_async().await;
    assert_eq!(admin.name, "A");

    let state = console.session_state();
    assert!(state.is_authenticated());
    assert_eq!(state.admin().unwrap().name, "A");
    assert!(console.can_access_city("x"));

    let mut users = console.users(UserFilter::default());
    users.settled().await;

    let input = mutations::UpdateUser {
        id: "u1".into(),
        changes: UserUpdate::phone("+55 11 98888-7777"),
    };
    let updated = console.execute(&mutations::update_user(console.api()), input).await.unwrap();
    update.assert_async().await;
    assert_eq!(updated.phone.as_deref(), Some("+55 11 98888-7777"));

    let admin = console.session().admin().unwrap();
    assert_eq!(admin.phone.as_deref(), Some("+55 11 98888-7777"));
    assert_eq!(admin.user_id, "u1");
    assert_eq!(admin.allowed_cities, vec!["x".to_string()]);
    assert!(admin.is_mayor);
    assert_eq!(admin.secretaria.as_ref().map(|s| s.id.as_str()), Some("s1"));
    assert!(console.can_access_city("x"));

    // The subscribed user list was refetched before execute returned.
    list.assert_hits_async(2).await;
}

#[tokio::test]
async fn test_unauthorized_read_ends_session_and_clears_data() {
    let server = MockServer::start_async().await;
    mock_login(&server).await;
    server
        .mock_async(|when, then| {
            when.method("GET").path("/api/admin/cities/x/secretarias");
            then.status(200)
                .json_body(json!([{ "id": "s1", "name": "Saúde", "cityId": "x" }]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method("GET").path("/api/admin/users");
            then.status(401).json_body(json!({ "message": "jwt expired" }));
        })
        .await;

    let console = console_for(&server);
    console.login("a@b.com", "secret1", false).await.unwrap();

    let mut secretarias = console.secretarias("x");
    let state = secretarias.settled().await;
    assert_eq!(state.data.unwrap().len(), 1);

    let mut users = console.users(UserFilter::default());
    let state = users.settled().await;

    assert!(state.data.is_none());
    assert_eq!(console.client().token(), None);
    assert_eq!(console.session_state(), SessionState::Anonymous);
    assert!(secretarias.state().data.is_none());
    assert!(console.cache().is_empty());
}

#[tokio::test]
async fn test_rejected_credentials_keep_session_anonymous() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("POST").path("/api/admin/auth/login");
            then.status(401).json_body(json!({ "message": "Credenciais inválidas" }));
        })
        .await;

    let console = console_for(&server);
    let err = console.login("a@b.com", "wrong", true).await.unwrap_err();

    assert!(err.is_unauthorized());
    assert_eq!(err.user_message(), "Credenciais inválidas");
    assert!(!console.session_state().is_authenticated());
}

#[tokio::test]
async fn test_report_status_change_refreshes_lists_and_dashboard() {
    let server = MockServer::start_async().await;
    mock_login(&server).await;
    let pending = server
        .mock_async(|when, then| {
            when.method("GET")
                .path("/api/admin/cities/x/reports")
                .query_param("status", "pendente");
            then.status(200).json_body(json!({
                "data": [{ "id": "r1", "title": "Buraco", "status": "pendente" }],
                "total": 1,
                "page": 1,
                "limit": 20
            }));
        })
        .await;
    let overview = server
        .mock_async(|when, then| {
            when.method("GET")
                .path("/api/dashboard/overview")
                .query_param("cityId", "x");
            then.status(200).json_body(json!({ "totalReports": 1, "pending": 1 }));
        })
        .await;
    let change = server
        .mock_async(|when, then| {
            when.method("PUT")
                .path("/api/admin/reports/r1/status")
                .json_body(json!({ "status": "resolvido" }));
            then.status(200)
                .json_body(json!({ "id": "r1", "title": "Buraco", "status": "resolvido", "cityId": "x" }));
        })
        .await;

    let console = console_for(&server);
    console.login("a@b.com", "secret1", false).await.unwrap();

    let mut reports = console.reports("x", ReportFilter::default().status(ReportStatus::Pendente));
    let mut dashboard = console.dashboard_overview(DashboardFilter::city("x"));
    reports.settled().await;
    dashboard.settled().await;

    let input = ReportStatusChange {
        report_id: "r1".into(),
        city_id: "x".into(),
        status: ReportStatus::Resolvido,
        note: None,
    };
    let (report, outcome) = console
        .dispatcher()
        .execute_with_outcome(&mutations::update_report_status(console.api()), input)
        .await
        .unwrap();

    change.assert_async().await;
    assert_eq!(report.status, ReportStatus::Resolvido);
    assert_eq!(outcome.invalidated, 2);
    pending.assert_hits_async(2).await;
    overview.assert_hits_async(2).await;
}

#[tokio::test]
async fn test_failed_write_reports_server_message_and_invalidates_nothing() {
    let server = MockServer::start_async().await;
    mock_login(&server).await;
    let list = server
        .mock_async(|when, then| {
            when.method("GET").path("/api/admin/users");
            then.status(200).json_body(json!([]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method("PUT").path("/api/admin/users/u2");
            then.status(422).json_body(json!({ "message": "E-mail já utilizado" }));
        })
        .await;

    let console = console_for(&server);
    console.login("a@b.com", "secret1", false).await.unwrap();
    let mut users = console.users(UserFilter::default());
    users.settled().await;

    let input = mutations::UpdateUser {
        id: "u2".into(),
        changes: UserUpdate {
            email: Some("dup@b.com".into()),
            ..UserUpdate::default()
        },
    };
    let err = console
        .execute(&mutations::update_user(console.api()), input)
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(422));
    assert_eq!(err.user_message(), "E-mail já utilizado");
    assert!(console.session_state().is_authenticated());
    list.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_remembered_session_survives_restart() {
    let server = MockServer::start_async().await;
    mock_login(&server).await;
    let dir = TempDir::new().unwrap();
    let config = ClientConfig::new(server.base_url()).with_session_dir(dir.path());

    {
        let console = AdminConsole::builder(config.clone()).gc_interval(None).build().unwrap();
        console.login("a@b.com", "secret1", true).await.unwrap();
    }

    let console = AdminConsole::builder(config).gc_interval(None).build().unwrap();
    let state = console.session_state();
    assert!(state.is_authenticated());
    assert_eq!(state.admin().unwrap().user_id, "u1");
    assert_eq!(console.client().token().as_deref(), Some("tok123"));
}

#[tokio::test]
async fn test_session_only_login_does_not_survive_restart() {
    let server = MockServer::start_async().await;
    mock_login(&server).await;
    let dir = TempDir::new().unwrap();
    let config = ClientConfig::new(server.base_url()).with_session_dir(dir.path());

    {
        let console = AdminConsole::builder(config.clone()).gc_interval(None).build().unwrap();
        console.login("a@b.com", "secret1", false).await.unwrap();
        assert!(console.session_state().is_authenticated());
    }

    let console = AdminConsole::builder(config).gc_interval(None).build().unwrap();
    assert_eq!(console.session_state(), SessionState::Anonymous);
}

#[tokio::test]
async fn test_logout_is_idempotent_and_clears_cache() {
    let server = MockServer::start_async().await;
    mock_login(&server).await;
    server
        .mock_async(|when, then| {
            when.method("GET").path("/api/admin/observations");
            then.status(200).json_body(json!([{ "id": "o1", "content": "Verificar" }]));
        })
        .await;

    let console = console_for(&server);
    console.login("a@b.com", "secret1", false).await.unwrap();
    let mut observations = console.observations(Default::default());
    observations.settled().await;
    assert!(!console.cache().is_empty());

    assert!(console.logout());
    assert!(!console.logout());
    assert!(console.cache().is_empty());
    assert_eq!(console.client().token(), None);
}
