mod server;

use seodesk::config::RecaptchaSettings;
use seodesk::db::Database;
use seodesk::db::subscribers::count_subscribers;
use seodesk::newsletter::{SubscribeError, SubscribeRequest, subscribe};
use seodesk::recaptcha::{RecaptchaVerifier, Verification};
use server::start_recaptcha_server;

fn verifier(verify_url: &str, secret: &str) -> RecaptchaVerifier {
    RecaptchaVerifier::new(&RecaptchaSettings {
        verify_url: verify_url.to_string(),
        min_score: 0.5,
        secret: Some(secret.to_string()),
    })
    .unwrap()
}

#[tokio::test]
async fn test_scores_against_threshold() {
    let url = start_recaptcha_server().await;
    let verifier = verifier(&url, "test-secret");

    assert_eq!(
        verifier.verify("human", Some("10.0.0.1")).await.unwrap(),
        Verification::Passed
    );
    assert_eq!(verifier.verify("bot", None).await.unwrap(), Verification::Failed);
    // v2 tokens carry no score
    assert_eq!(verifier.verify("v2", None).await.unwrap(), Verification::Passed);
    assert_eq!(
        verifier.verify("forged", None).await.unwrap(),
        Verification::Failed
    );
}

#[tokio::test]
async fn test_wrong_secret_fails_and_outage_errors() {
    let url = start_recaptcha_server().await;

    let wrong = verifier(&url, "nope");
    assert_eq!(wrong.verify("human", None).await.unwrap(), Verification::Failed);

    let right = verifier(&url, "test-secret");
    assert!(right.verify("outage", None).await.is_err());
}

#[tokio::test]
async fn test_newsletter_subscription_checks_captcha() {
    let url = start_recaptcha_server().await;
    let verifier = verifier(&url, "test-secret");
    let db = Database::open_in_memory().unwrap();

    let request = |token: &str| SubscribeRequest {
        email: "reader@example.com".to_string(),
        recaptcha_token: token.to_string(),
    };

    assert!(matches!(
        subscribe(&db, &verifier, &request("bot"), None).await,
        Err(SubscribeError::CaptchaRejected)
    ));
    assert!(matches!(
        subscribe(&db, &verifier, &request("outage"), None).await,
        Err(SubscribeError::CaptchaUnavailable(_))
    ));
    assert_eq!(db.with_conn(count_subscribers).unwrap(), 0);

    subscribe(&db, &verifier, &request("human"), None)
        .await
        .unwrap();
    assert_eq!(db.with_conn(count_subscribers).unwrap(), 1);
}
