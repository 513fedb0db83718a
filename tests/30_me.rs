mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn bearer_token_identifies_the_caller() -> Result<()> {
    let server = common::spawn().await?;
    let client = reqwest::Client::new();
    let login = server.login(&client, "user@example.com", "device-1").await?;

    let res = client
        .get(format!("{}/me", server.base_url))
        .bearer_auth(login["accessToken"].as_str().unwrap())
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["authSource"], "bearer");
    assert_eq!(body["tokenType"], "access");
    assert_eq!(body["deviceId"], "device-1");
    assert!(body["scopes"].as_array().unwrap().contains(&json!("chat")));
    assert!(Uuid::parse_str(body["id"].as_str().unwrap()).is_ok());

    Ok(())
}

#[tokio::test]
async fn garbage_or_absent_credentials_are_unauthorized() -> Result<()> {
    let server = common::spawn().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/me", server.base_url))
        .bearer_auth("not-a-token")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["code"], "unauthorized");

    let res = client.get(format!("{}/me", server.base_url)).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn session_cookie_is_the_fallback_credential() -> Result<()> {
    let server = common::spawn().await?;
    let client = reqwest::Client::new();
    let user_id = Uuid::new_v4();
    let session = server.tokens.issue_session_token(user_id, "user@example.com")?;

    let res = client
        .get(format!("{}/me", server.base_url))
        .header("Cookie", format!("session={}", session))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["id"], user_id.to_string());
    assert_eq!(body["authSource"], "cookie");
    assert_eq!(body["tokenType"], "unknown");
    assert!(body.get("deviceId").is_none());

    Ok(())
}

#[tokio::test]
async fn web_token_exchanges_a_session_for_a_pair_and_revokes_the_device() -> Result<()> {
    let server = common::spawn().await?;
    let client = reqwest::Client::new();

    // Device already holds a refresh lineage from a previous login
    let login = server.login(&client, "user@example.com", "web-client-1").await?;
    let prior_refresh = login["refreshToken"].as_str().unwrap().to_string();

    // Recover the user id the resolver assigned, then fabricate the
    // first-party session the web app would hold for that user
    let me = client
        .get(format!("{}/me", server.base_url))
        .bearer_auth(login["accessToken"].as_str().unwrap())
        .send()
        .await?
        .json::<serde_json::Value>()
        .await?;
    let user_id = Uuid::parse_str(me["id"].as_str().unwrap())?;
    let session = server.tokens.issue_session_token(user_id, "user@example.com")?;

    let res = client
        .post(format!("{}/auth/web-token", server.base_url))
        .header("Cookie", format!("session={}", session))
        .json(&json!({ "deviceId": "web-client-1" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let pair = res.json::<serde_json::Value>().await?;
    assert_eq!(pair["deviceId"], "web-client-1");
    assert!(!pair["accessToken"].as_str().unwrap().is_empty());

    // The prior lineage was revoked before issuance
    let replay = client
        .post(format!("{}/auth/refresh", server.base_url))
        .json(&json!({ "refreshToken": prior_refresh, "deviceId": "web-client-1" }))
        .send()
        .await?;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);

    // The fresh pair works
    let rotate = client
        .post(format!("{}/auth/refresh", server.base_url))
        .json(&json!({
            "refreshToken": pair["refreshToken"].as_str().unwrap(),
            "deviceId": "web-client-1"
        }))
        .send()
        .await?;
    assert_eq!(rotate.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn web_token_requires_a_session() -> Result<()> {
    let server = common::spawn().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/auth/web-token", server.base_url))
        .json(&json!({ "deviceId": "web-client-1" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn web_token_requires_a_device_id() -> Result<()> {
    let server = common::spawn().await?;
    let client = reqwest::Client::new();
    let session = server
        .tokens
        .issue_session_token(Uuid::new_v4(), "user@example.com")?;

    let res = client
        .post(format!("{}/auth/web-token", server.base_url))
        .header("Cookie", format!("session={}", session))
        .json(&json!({}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["code"], "invalid_request");

    Ok(())
}
