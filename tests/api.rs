use std::{sync::Arc, time::Duration};

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use rand::rngs::mock::StepRng;
use serde_json::{json, Value};
use tower::ServiceExt;

use spinbet::{
    repositories::MemoryLedger,
    services::{
        http::{router, Sessions},
        mailer::MemoryMailer,
        notifier::Notifier,
        shared_rng, spawn_services, ServiceContext, UserLocks,
    },
};

const ADMIN: &str = "admin@spinbet.test";

struct TestApp {
    router: Router,
    mailer: Arc<MemoryMailer>,
}

struct Reply {
    status: StatusCode,
    cookie: Option<String>,
    body: Value,
}

fn app() -> TestApp {
    let mailer = Arc::new(MemoryMailer::new());
    let context = ServiceContext {
        ledger: Arc::new(MemoryLedger::new()),
        locks: UserLocks::new(),
        mailer: mailer.clone(),
        notifier: Notifier::new(),
        admin_address: ADMIN.to_string(),
        // Every spin wins.
        rng: shared_rng(StepRng::new(0, 0)),
    };
    let sessions = Sessions::new("test-secret", Duration::from_secs(3600));

    TestApp {
        router: router(spawn_services(context, sessions)),
        mailer,
    }
}

impl TestApp {
    async fn call(&self, method: Method, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Reply {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> Reply {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(str::to_string);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        Reply {
            status,
            cookie,
            body,
        }
    }

    async fn register(&self, username: &str, referral_code: Option<&str>) -> Reply {
        let mut body = json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": "secret1",
            "confirmPassword": "secret1",
        });
        if let Some(code) = referral_code {
            body["referralCode"] = json!(code);
        }
        self.call(Method::POST, "/api/register", None, Some(body)).await
    }

    async fn session(&self, username: &str) -> String {
        let reply = self.register(username, None).await;
        assert_eq!(reply.status, StatusCode::CREATED);
        reply.cookie.unwrap()
    }

    async fn verify(&self, cookie: &str, code: &str) -> Reply {
        self.call(
            Method::POST,
            "/api/deposits/verify",
            Some(cookie),
            Some(json!({ "withdrawalCode": code })),
        )
        .await
    }

    fn last_deposit_code(&self) -> String {
        self.mailer
            .outbox()
            .into_iter()
            .rev()
            .find(|email| email.to == ADMIN && email.subject.starts_with("Deposit Request"))
            .and_then(|email| email.subject.rsplit(' ').next().map(str::to_string))
            .unwrap()
    }
}

#[tokio::test]
async fn registration_logs_in_and_hides_the_password() {
    let app = app();

    let reply = app.register("ada", None).await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["balance"], 2000.0);
    assert!(reply.body.get("password").is_none());
    let cookie = reply.cookie.unwrap();

    let me = app.call(Method::GET, "/api/user", Some(&cookie), None).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["username"], "ada");

    let anonymous = app.call(Method::GET, "/api/user", None, None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    assert_eq!(anonymous.body["message"], "Unauthorized");

    let duplicate = app.register("ADA", None).await;
    assert_eq!(duplicate.status, StatusCode::BAD_REQUEST);
    assert_eq!(duplicate.body["message"], "Username already exists");

    let transactions = app
        .call(Method::GET, "/api/transactions", Some(&cookie), None)
        .await;
    assert_eq!(transactions.body[0]["type"], "signup_bonus");
    assert_eq!(transactions.body[0]["amount"], 2000.0);
    assert_eq!(transactions.body[0]["status"], "completed");
}

#[tokio::test]
async fn registration_input_is_validated() {
    let app = app();

    let reply = app
        .call(
            Method::POST,
            "/api/register",
            None,
            Some(json!({
                "username": "ada",
                "email": "ada@example.com",
                "password": "secret1",
                "confirmPassword": "secret2",
            })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["message"], "Passwords do not match");

    let reply = app
        .call(Method::POST, "/api/register", None, Some(json!({ "username": "ada" })))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_and_logout() {
    let app = app();
    app.session("ada").await;

    let wrong = app
        .call(
            Method::POST,
            "/api/login",
            None,
            Some(json!({ "username": "ada", "password": "nope!!" })),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.body["message"], "Invalid username or password");

    let login = app
        .call(
            Method::POST,
            "/api/login",
            None,
            Some(json!({ "username": "Ada", "password": "secret1" })),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
    let cookie = login.cookie.unwrap();

    let logout = app.call(Method::POST, "/api/logout", Some(&cookie), None).await;
    assert_eq!(logout.status, StatusCode::OK);
    assert!(logout.cookie.unwrap().ends_with('='));

    let me = app.call(Method::GET, "/api/user", Some(&cookie), None).await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn referral_bonus_goes_to_the_referrer() {
    let app = app();
    let ada = app.register("ada", None).await;
    let ada_cookie = ada.cookie.unwrap();
    let code = ada.body["referralCode"].as_str().unwrap().to_string();

    let grace = app.register("grace", Some(&code)).await;
    assert_eq!(grace.status, StatusCode::CREATED);
    assert_eq!(grace.body["referredBy"], ada.body["id"]);
    assert_eq!(grace.body["balance"], 2000.0);

    let me = app.call(Method::GET, "/api/user", Some(&ada_cookie), None).await;
    assert_eq!(me.body["balance"], 3500.0);

    let transactions = app
        .call(Method::GET, "/api/transactions", Some(&ada_cookie), None)
        .await;
    assert_eq!(transactions.body[0]["type"], "referral_bonus");
    assert_eq!(transactions.body[0]["amount"], 1500.0);
}

#[tokio::test]
async fn first_game_wins_and_feeds_the_leaderboard() {
    let app = app();
    let cookie = app.session("ada").await;

    let reply = app
        .call(
            Method::POST,
            "/api/games",
            Some(&cookie),
            Some(json!({ "selectedNumber": 5, "betAmount": 1000 })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["isWin"], true);
    assert_eq!(reply.body["resultNumber"], 5);
    assert_eq!(reply.body["winAmount"], 1800.0);
    assert_eq!(reply.body["newBalance"], 2800.0);

    let history = app
        .call(Method::GET, "/api/games/history", Some(&cookie), None)
        .await;
    assert_eq!(history.body.as_array().unwrap().len(), 1);

    let leaderboard = app.call(Method::GET, "/api/leaderboard", None, None).await;
    assert_eq!(leaderboard.status, StatusCode::OK);
    assert_eq!(leaderboard.body[0]["username"], "ada");
    assert_eq!(leaderboard.body[0]["totalWinnings"], 1800.0);
    assert_eq!(leaderboard.body[0]["gamesPlayed"], 1);
}

#[tokio::test]
async fn bets_are_validated_and_covered_by_balance() {
    let app = app();
    let cookie = app.session("ada").await;

    for body in [
        json!({ "selectedNumber": 9, "betAmount": 100 }),
        json!({ "selectedNumber": 1, "betAmount": 100 }),
        json!({ "selectedNumber": 5, "betAmount": 0 }),
        json!({ "selectedNumber": 5, "betAmount": 5000 }),
    ] {
        let reply = app
            .call(Method::POST, "/api/games", Some(&cookie), Some(body))
            .await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    }

    let malformed = Request::builder()
        .method(Method::POST)
        .uri("/api/games")
        .header(header::COOKIE, &cookie)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    assert_eq!(app.send(malformed).await.status, StatusCode::BAD_REQUEST);

    let anonymous = app
        .call(
            Method::POST,
            "/api/games",
            None,
            Some(json!({ "selectedNumber": 5, "betAmount": 100 })),
        )
        .await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn deposit_is_credited_once_its_code_is_verified() {
    let app = app();
    let ada = app.session("ada").await;
    let grace = app.session("grace").await;

    let too_small = app
        .call(Method::POST, "/api/deposits", Some(&ada), Some(json!({ "amount": 999 })))
        .await;
    assert_eq!(too_small.status, StatusCode::BAD_REQUEST);

    let created = app
        .call(Method::POST, "/api/deposits", Some(&ada), Some(json!({ "amount": 20000 })))
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["status"], "pending");
    assert!(created.body.get("withdrawalCode").is_none());
    let code = app.last_deposit_code();

    assert_eq!(app.verify(&ada, "").await.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.verify(&ada, "ZZZZZZZZ").await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.verify(&grace, &code).await.status, StatusCode::FORBIDDEN);

    let verified = app.verify(&ada, &code).await;
    assert_eq!(verified.status, StatusCode::OK);
    assert_eq!(verified.body["message"], "Deposit verified successfully");
    assert_eq!(verified.body["newBalance"], 22000.0);

    let again = app.verify(&ada, &code).await;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);
    assert_eq!(again.body["message"], "Deposit has already been processed");

    let deposits = app.call(Method::GET, "/api/deposits", Some(&ada), None).await;
    assert_eq!(deposits.body[0]["status"], "completed");
    assert!(deposits.body[0].get("withdrawalCode").is_none());

    let transactions = app
        .call(Method::GET, "/api/transactions", Some(&ada), None)
        .await;
    assert_eq!(transactions.body[0]["type"], "deposit");
    assert_eq!(transactions.body[0]["status"], "completed");
}

#[tokio::test]
async fn withdrawal_debits_immediately_and_stays_off_the_public_feed() {
    let app = app();
    let cookie = app.session("ada").await;
    let request = |amount: u32| {
        json!({
            "amount": amount,
            "bankName": "First Bank",
            "accountNumber": "0123456789",
            "accountName": "Ada Obi",
        })
    };

    let created = app
        .call(Method::POST, "/api/withdrawals", Some(&cookie), Some(request(1500)))
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["status"], "pending");
    assert_eq!(created.body["newBalance"], 500.0);

    let short = app
        .call(Method::POST, "/api/withdrawals", Some(&cookie), Some(request(1000)))
        .await;
    assert_eq!(short.status, StatusCode::BAD_REQUEST);
    assert_eq!(short.body["message"], "Insufficient balance");

    let mut missing_bank = request(1000);
    missing_bank["bankName"] = json!("");
    let reply = app
        .call(Method::POST, "/api/withdrawals", Some(&cookie), Some(missing_bank))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let mine = app
        .call(Method::GET, "/api/withdrawals", Some(&cookie), None)
        .await;
    assert_eq!(mine.body.as_array().unwrap().len(), 1);
    assert_eq!(mine.body[0]["bankName"], "First Bank");

    let feed = app
        .call(Method::GET, "/api/withdrawals/recent", None, None)
        .await;
    assert_eq!(feed.status, StatusCode::OK);
    assert_eq!(feed.body, json!([]));

    let admin_mail = app.mailer.outbox().pop().unwrap();
    assert_eq!(admin_mail.subject, "Withdrawal Request");
}

#[tokio::test]
async fn settings_and_password_changes() {
    let app = app();
    let cookie = app.session("ada").await;

    let updated = app
        .call(
            Method::PATCH,
            "/api/users/settings",
            Some(&cookie),
            Some(json!({ "fullName": "Ada Obi", "hiddenBalance": true })),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["fullName"], "Ada Obi");
    assert_eq!(updated.body["hiddenBalance"], true);
    assert_eq!(updated.body["email"], "ada@example.com");

    let wrong = app
        .call(
            Method::PATCH,
            "/api/users/password",
            Some(&cookie),
            Some(json!({ "currentPassword": "nope!!", "newPassword": "better1" })),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::BAD_REQUEST);
    assert_eq!(wrong.body["message"], "Current password is incorrect");

    let short = app
        .call(
            Method::PATCH,
            "/api/users/password",
            Some(&cookie),
            Some(json!({ "currentPassword": "secret1", "newPassword": "abc" })),
        )
        .await;
    assert_eq!(short.status, StatusCode::BAD_REQUEST);

    let changed = app
        .call(
            Method::PATCH,
            "/api/users/password",
            Some(&cookie),
            Some(json!({ "currentPassword": "secret1", "newPassword": "better1" })),
        )
        .await;
    assert_eq!(changed.status, StatusCode::OK);
    assert_eq!(changed.body["message"], "Password updated successfully");

    let login = app
        .call(
            Method::POST,
            "/api/login",
            None,
            Some(json!({ "username": "ada", "password": "better1" })),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
}

#[tokio::test]
async fn health_check() {
    let app = app();
    let reply = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
}
