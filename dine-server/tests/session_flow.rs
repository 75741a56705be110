//! 端到端流程测试：开台 → 验证 → 连接 → 事件扇出 → 结束
//!
//! 通过 HTTP 路由和连接管理器在进程内走完整个顾客旅程，
//! 不起真实端口，WebSocket 侧直接挂 mpsc 接收端。

use axum::Router;
use axum::body::Body;
use dine_server::auth::JwtConfig;
use dine_server::core::{Config, ServerState};
use dine_server::realtime::{ClientKind, OutboundMessage};
use dine_server::sessions::SessionConfig;
use http::{Request, StatusCode, header};
use serde_json::{Value, json};
use shared::StaffRole;
use tokio::sync::mpsc;
use tower::util::ServiceExt;

fn test_config() -> Config {
    Config {
        http_port: 0,
        environment: "test".to_string(),
        jwt: JwtConfig {
            secret: "integration-test-secret-key-0123456789".to_string(),
            staff_expiration_minutes: 60,
            issuer: "dine-server".to_string(),
            audience: "dine-clients".to_string(),
        },
        session: SessionConfig {
            ttl_hours: 2,
            max_verification_attempts: 3,
        },
        sweep_interval_secs: 60,
        table_count: 5,
        log_dir: None,
    }
}

fn setup() -> (ServerState, Router) {
    let state = ServerState::initialize(&test_config());
    let app = dine_server::api::router(state.clone());
    (state, app)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn connect_staff(
    state: &ServerState,
    user_id: &str,
    role: StaffRole,
) -> mpsc::UnboundedReceiver<OutboundMessage> {
    let (tx, rx) = mpsc::unbounded_channel();
    let conn_id = state.connections.register(tx);
    let token = state.jwt_service.issue_staff_token(user_id, role).unwrap();
    state
        .connections
        .authenticate(conn_id, &token, ClientKind::Staff)
        .unwrap();
    rx
}

fn drain(rx: &mut mpsc::UnboundedReceiver<OutboundMessage>) -> Vec<OutboundMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

#[tokio::test]
async fn test_full_session_journey() {
    let (state, app) = setup();
    let staff_token = state
        .jwt_service
        .issue_staff_token("emp-1", StaffRole::Admin)
        .unwrap();

    // 前台和后厨先上线
    let mut receptionist_rx = connect_staff(&state, "emp-2", StaffRole::Receptionist);
    let mut kitchen_rx = connect_staff(&state, "emp-3", StaffRole::Kitchen);

    // 开台
    let (status, body) = send(
        &app,
        "POST",
        "/api/sessions",
        Some(&staff_token),
        Some(json!({ "tableId": "TBL00001", "deviceId": "tablet-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let session_id = body["session"]["sessionId"].as_str().unwrap().to_string();
    let code = body["securityCode"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 6);
    // 会话快照本身绝不携带安全码
    assert!(body["session"].get("securityCode").is_none());

    // 前台收到带码的开台通知，后厨不知道码
    let receptionist_msgs = drain(&mut receptionist_rx);
    let started = receptionist_msgs
        .iter()
        .find(|m| m.event == "receptionist:session-started")
        .expect("receptionist missed session start");
    assert_eq!(started.data["securityCode"], code.as_str());
    for msg in drain(&mut kitchen_rx) {
        assert!(msg.data.get("securityCode").is_none(), "code leaked to kitchen");
    }

    // 错误码：401 + 剩余次数提示
    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/sessions/{}/verify", session_id),
        None,
        Some(json!({ "code": "000000" })),
    )
    .await;
    // 万一随机到 000000 本身，这里会直接成功；概率 1e-6，忽略
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["message"].as_str().unwrap().contains("attempts remaining"));

    // 正确码：拿到顾客令牌
    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/sessions/{}/verify", session_id),
        None,
        Some(json!({ "code": code })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session"]["isVerified"], true);
    let customer_token = body["token"].as_str().unwrap().to_string();

    // 顾客设备上线，自动进入会话房间
    let (tx, mut customer_rx) = mpsc::unbounded_channel();
    let conn_id = state.connections.register(tx);
    state
        .connections
        .authenticate(conn_id, &customer_token, ClientKind::Customer)
        .unwrap();

    // 只读校验：可用
    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/sessions/{}/validate", session_id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);

    // 订单服务扇出下单事件
    let (status, body) = send(
        &app,
        "POST",
        "/api/events/emit",
        Some(&staff_token),
        Some(json!({
            "type": "ORDER_CREATED",
            "sessionId": session_id,
            "order": {
                "orderId": "o-1",
                "tableId": "TBL00001",
                "items": [{ "itemId": "i-1", "name": "Noodles", "quantity": 2 }],
                "total": 2400
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // 后厨 + 顾客各一条 (仪表盘无人订阅)
    assert_eq!(body["delivered"], 2);

    let customer_msgs = drain(&mut customer_rx);
    assert!(customer_msgs.iter().any(|m| m.event == "order:placed"));
    let kitchen_msgs = drain(&mut kitchen_rx);
    let new_order = kitchen_msgs
        .iter()
        .find(|m| m.event == "kitchen:new-order")
        .expect("kitchen missed the order");
    assert_eq!(new_order.data["order"]["items"][0]["quantity"], 2);

    // 结束会话
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/sessions/{}/end", session_id),
        Some(&staff_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let receptionist_msgs = drain(&mut receptionist_rx);
    assert!(
        receptionist_msgs
            .iter()
            .any(|m| m.event == "receptionist:session-ended")
    );

    // 结束后不再可用
    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/sessions/{}/validate", session_id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);
}

#[tokio::test]
async fn test_staff_routes_reject_missing_and_customer_tokens() {
    let (state, app) = setup();

    // 无令牌
    let (status, _) = send(
        &app,
        "POST",
        "/api/sessions",
        None,
        Some(json!({ "tableId": "TBL00001", "deviceId": "tablet-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // 顾客令牌访问员工接口
    let staff_token = state
        .jwt_service
        .issue_staff_token("emp-1", StaffRole::Waiter)
        .unwrap();
    let (_, body) = send(
        &app,
        "POST",
        "/api/sessions",
        Some(&staff_token),
        Some(json!({ "tableId": "TBL00002", "deviceId": "tablet-2" })),
    )
    .await;
    let session_id = body["session"]["sessionId"].as_str().unwrap();
    let code = body["securityCode"].as_str().unwrap();
    let (_, body) = send(
        &app,
        "POST",
        &format!("/api/sessions/{}/verify", session_id),
        None,
        Some(json!({ "code": code })),
    )
    .await;
    let customer_token = body["token"].as_str().unwrap();

    let (status, _) = send(&app, "POST", "/api/sessions/cleanup", Some(customer_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_transfer_flow_updates_tables_and_rooms() {
    let (state, app) = setup();
    let staff_token = state
        .jwt_service
        .issue_staff_token("emp-1", StaffRole::Admin)
        .unwrap();

    let (_, body) = send(
        &app,
        "POST",
        "/api/sessions",
        Some(&staff_token),
        Some(json!({ "tableId": "TBL00001", "deviceId": "tablet-1" })),
    )
    .await;
    let session_id = body["session"]["sessionId"].as_str().unwrap().to_string();

    let mut staff_rx = connect_staff(&state, "emp-4", StaffRole::Waiter);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/sessions/{}/transfer", session_id),
        Some(&staff_token),
        Some(json!({ "newTableId": "TBL00002", "reason": "customer request" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tableId"], "TBL00002");

    // 员工房间收到两条桌台状态变更
    let table_updates: Vec<_> = drain(&mut staff_rx)
        .into_iter()
        .filter(|m| m.event == "staff:table-status")
        .collect();
    assert_eq!(table_updates.len(), 2);

    // 占用目标桌台的二次转台被拒
    let (_, body) = send(
        &app,
        "POST",
        "/api/sessions",
        Some(&staff_token),
        Some(json!({ "tableId": "TBL00003", "deviceId": "tablet-2" })),
    )
    .await;
    let other_id = body["session"]["sessionId"].as_str().unwrap().to_string();
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/sessions/{}/transfer", other_id),
        Some(&staff_token),
        Some(json!({ "newTableId": "TBL00002", "reason": "double booking" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_health_reports_counters() {
    let (state, app) = setup();
    let _rx = connect_staff(&state, "emp-1", StaffRole::Kitchen);

    let (status, body) = send(&app, "GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["activeSessions"], 0);
    assert_eq!(body["connections"], 1);
}
