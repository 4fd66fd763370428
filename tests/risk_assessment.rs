//! Normalize-then-assess behaviour, including the reputation hooks.

use qr_sentinel::config::ScannerConfig;
use qr_sentinel::normalize::normalize;
use qr_sentinel::risk::{
    HttpReputationClient, LookupError, NO_ISSUES_REASON, ReputationLookup, RiskAssessor,
    RiskLevel, RiskVerdict, RuleSet, UrlListReputation,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

fn assert_invariants(verdict: &RiskVerdict) {
    assert!(!verdict.reasons.is_empty());
    if verdict.is_malicious {
        assert!(verdict.risk_level >= RiskLevel::Medium);
    }
}

/// Serve one HTTP request with `body` after `delay`; the request body is
/// sent back through the returned channel
async fn one_shot_server(
    body: &'static str,
    delay: Duration,
) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request);
            if let Some(split) = text.find("\r\n\r\n") {
                let length = text[..split]
                    .lines()
                    .find_map(|l| {
                        let lower = l.to_ascii_lowercase();
                        lower
                            .strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap())
                    })
                    .unwrap_or(0);
                if request.len() >= split + 4 + length {
                    let _ = tx.send(text[split + 4..].to_string());
                    break;
                }
            }
        }

        tokio::time::sleep(delay).await;
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let _ = socket.write_all(response.as_bytes()).await;
    });

    (format!("http://{addr}/api/analyze-qr"), rx)
}

#[test]
fn test_lexical_table() {
    let assessor = RiskAssessor::default();
    let cases = [
        ("https://example.com", RiskLevel::Low, false),
        ("example.com", RiskLevel::Low, false),
        ("http://example.com", RiskLevel::Medium, false),
        ("https://unknown-site.example", RiskLevel::Medium, false),
        ("https://example.com/malware.apk", RiskLevel::Medium, false),
        ("https://malicious.example", RiskLevel::High, true),
        ("http://secure-phishing.example/login", RiskLevel::High, true),
        ("javascript:alert(document.cookie)", RiskLevel::High, true),
        ("' UNION SELECT password FROM users --", RiskLevel::High, true),
        ("WIFI:S:home;T:WPA;P:secret;;", RiskLevel::Low, false),
    ];
    for (text, level, malicious) in cases {
        let verdict = assessor.assess_lexical(&normalize(text));
        assert_eq!(verdict.risk_level, level, "{text}");
        assert_eq!(verdict.is_malicious, malicious, "{text}");
        assert_invariants(&verdict);
    }
}

#[test]
fn test_clean_verdict_has_single_reason() {
    let verdict = RiskAssessor::default().assess_lexical(&normalize("https://example.org/docs"));
    assert_eq!(verdict.reasons, vec![NO_ISSUES_REASON]);
}

#[test]
fn test_custom_tokens() {
    let assessor = RiskAssessor::new(RuleSet::new(
        vec!["casino".into()],
        vec!["wallet-drain".into()],
    ));
    let verdict = assessor.assess_lexical(&normalize("https://wallet-drain.example"));
    assert_eq!(verdict.risk_level, RiskLevel::High);
    assert!(verdict.is_malicious);

    // The default tokens are replaced, not extended
    let verdict = assessor.assess_lexical(&normalize("https://malicious.example"));
    assert_eq!(verdict.risk_level, RiskLevel::Low);
}

#[tokio::test]
async fn test_url_lists_from_config() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("legit_urls.txt"),
        "https://bank.example\nhttps://malicious-but-trusted.example\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("confirmed_malicious_urls.txt"),
        "https://free-gift.example/claim\n",
    )
    .unwrap();
    let config_path = dir.path().join("scanner.toml");
    std::fs::write(
        &config_path,
        "url_lists = [\"legit_urls.txt\", \"confirmed_malicious_urls.txt\"]\n",
    )
    .unwrap();

    let config = ScannerConfig::from_file(&config_path).unwrap();
    let assessor = config.build_assessor().unwrap();

    let listed = assessor.assess(&normalize("https://free-gift.example/claim")).await;
    assert_eq!(listed.risk_level, RiskLevel::High);
    assert!(listed.is_malicious);
    assert_eq!(
        listed.reasons,
        vec!["URL found in known-malicious list 'confirmed_malicious_urls.txt'"]
    );

    let trusted = assessor.assess(&normalize("https://bank.example")).await;
    assert_eq!(trusted.risk_level, RiskLevel::Low);
    assert_eq!(trusted.reasons, vec!["URL found in trusted list"]);

    // A trusted listing never lowers a lexical finding
    let trusted_but_flagged = assessor
        .assess(&normalize("https://malicious-but-trusted.example"))
        .await;
    assert_eq!(trusted_but_flagged.risk_level, RiskLevel::High);
    assert!(trusted_but_flagged.is_malicious);
    assert_invariants(&trusted_but_flagged);
}

#[tokio::test]
async fn test_http_lookup_escalates() {
    let (endpoint, request) = one_shot_server(
        r#"{"riskLevel":"high","isMalicious":true,"reasons":["Reported by feed"]}"#,
        Duration::ZERO,
    )
    .await;
    let client = HttpReputationClient::new(endpoint, Duration::from_secs(5)).unwrap();
    let assessor = RiskAssessor::default().with_lookup(Arc::new(client));

    let verdict = assessor.assess(&normalize("https://example.com/x")).await;
    assert_eq!(verdict.risk_level, RiskLevel::High);
    assert!(verdict.is_malicious);
    assert_eq!(verdict.reasons, vec!["Reported by feed"]);

    let body: serde_json::Value = serde_json::from_str(&request.await.unwrap()).unwrap();
    assert_eq!(body["url"], "https://example.com/x");
}

#[tokio::test]
async fn test_http_lookup_cannot_deescalate() {
    let (endpoint, _request) = one_shot_server(
        r#"{"riskLevel":"low","isMalicious":false,"reasons":[]}"#,
        Duration::ZERO,
    )
    .await;
    let client = HttpReputationClient::new(endpoint, Duration::from_secs(5)).unwrap();
    let assessor = RiskAssessor::default().with_lookup(Arc::new(client));

    let verdict = assessor.assess(&normalize("http://example.com")).await;
    assert_eq!(verdict.risk_level, RiskLevel::Medium);
    assert_invariants(&verdict);
}

#[tokio::test]
async fn test_slow_endpoint_degrades_within_bound() {
    let (endpoint, _request) = one_shot_server(
        r#"{"riskLevel":"high","isMalicious":true,"reasons":["too late"]}"#,
        Duration::from_secs(10),
    )
    .await;
    let client = HttpReputationClient::new(endpoint, Duration::from_secs(30)).unwrap();
    let assessor = RiskAssessor::default()
        .with_lookup(Arc::new(client))
        .with_lookup_timeout(Duration::from_millis(200));

    let started = std::time::Instant::now();
    let verdict = assessor.assess(&normalize("https://example.com")).await;
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(verdict.risk_level, RiskLevel::Low);
    assert_eq!(verdict.reasons, vec![NO_ISSUES_REASON]);
}

#[tokio::test]
async fn test_unreachable_endpoint_fails_lookup() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client =
        HttpReputationClient::new(format!("http://{addr}/"), Duration::from_secs(2)).unwrap();
    let err = client
        .lookup(&normalize("https://example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, LookupError::Failed(_)));

    let assessor = RiskAssessor::default().with_lookup(Arc::new(client));
    let verdict = assessor.assess(&normalize("https://example.com")).await;
    assert_eq!(verdict.risk_level, RiskLevel::Low);
}

#[tokio::test]
async fn test_list_lookup_direct() {
    let lists =
        UrlListReputation::new().with_list("high_risk_urls.txt", false, ["https://x.example"]);
    assert!(lists.lookup(&normalize("https://y.example")).await.unwrap().is_none());
}
