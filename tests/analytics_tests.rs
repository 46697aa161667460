//! Per-link and platform statistics against a live API server.

mod common;

use common::TestServer;
use linkboard::Error;

#[tokio::test]
async fn click_count_matches_recorded_events() {
    let server = TestServer::start().await;
    let mut client = server.signed_in("a@x.com").await;
    let link = client
        .links
        .create(&client.session, "https://example.com/long")
        .await
        .unwrap();

    for agent in ["agent-1", "agent-2", "agent-3"] {
        server.follow(&link.short_code, agent).await;
    }
    server.wait_for_clicks(link.id, 3).await;

    let stats = client
        .analytics
        .get_stats(&client.session, &link.short_code)
        .await
        .unwrap();

    assert_eq!(stats.link.id, link.id);
    assert_eq!(stats.link.click_count, 3);
    assert_eq!(stats.recent_clicks.len(), 3);
    assert!(stats
        .recent_clicks
        .iter()
        .all(|c| c.ip_address.as_deref() == Some("203.0.113.7")));
    assert!(stats
        .recent_clicks
        .windows(2)
        .all(|w| w[0].clicked_at >= w[1].clicked_at));
}

#[tokio::test]
async fn recent_clicks_are_capped() {
    let server = TestServer::start().await;
    let mut client = server.signed_in("a@x.com").await;
    let link = client
        .links
        .create(&client.session, "https://example.com/long")
        .await
        .unwrap();

    for i in 0..12 {
        server.follow(&link.short_code, &format!("agent-{i}")).await;
    }
    server.wait_for_clicks(link.id, 12).await;

    let stats = client
        .analytics
        .get_stats(&client.session, &link.short_code)
        .await
        .unwrap();

    assert_eq!(stats.link.click_count, 12);
    assert_eq!(stats.recent_clicks.len(), 10);
}

#[tokio::test]
async fn stats_are_for_the_owner_and_admins() {
    let server = TestServer::start().await;
    let mut alice = server.signed_in("a@x.com").await;
    let bob = server.signed_in("b@x.com").await;
    let admin = server.admin().await;
    let link = alice
        .links
        .create(&alice.session, "https://example.com/alice")
        .await
        .unwrap();

    assert!(matches!(
        bob.analytics.get_stats(&bob.session, &link.short_code).await,
        Err(Error::Permission(_))
    ));
    let seen_by_admin = admin
        .analytics
        .get_stats(&admin.session, &link.short_code)
        .await
        .unwrap();
    assert_eq!(seen_by_admin.link.id, link.id);
}

#[tokio::test]
async fn stats_for_missing_or_blank_codes() {
    let server = TestServer::start().await;
    let client = server.signed_in("a@x.com").await;

    assert!(matches!(
        client.analytics.get_stats(&client.session, "nosuchcode").await,
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        client.analytics.get_stats(&client.session, "   ").await,
        Err(Error::Validation(_))
    ));
}

#[tokio::test]
async fn platform_stats_require_an_admin() {
    let server = TestServer::start().await;
    let user = server.signed_in("a@x.com").await;

    assert!(matches!(
        user.analytics.get_platform_stats(&user.session).await,
        Err(Error::Permission(_))
    ));
    assert!(user.session.state().is_authenticated());
}

#[tokio::test]
async fn platform_stats_totals_and_ranking() {
    let server = TestServer::start().await;
    let admin = server.admin().await;
    let mut user = server.signed_in("a@x.com").await;
    let mut anonymous = server.anonymous_client().await;

    let quiet = user
        .links
        .create(&user.session, "https://example.com/quiet")
        .await
        .unwrap();
    let busy = user
        .links
        .create(&user.session, "https://example.com/busy")
        .await
        .unwrap();
    let tied = anonymous
        .links
        .create(&anonymous.session, "https://example.com/tied")
        .await
        .unwrap();

    for _ in 0..3 {
        server.follow(&busy.short_code, "ua").await;
    }
    server.follow(&quiet.short_code, "ua").await;
    server.follow(&tied.short_code, "ua").await;
    server.wait_for_clicks(busy.id, 3).await;
    server.wait_for_clicks(quiet.id, 1).await;
    server.wait_for_clicks(tied.id, 1).await;

    let stats = admin
        .analytics
        .get_platform_stats(&admin.session)
        .await
        .unwrap();

    assert_eq!(stats.total_urls, 3);
    assert_eq!(stats.total_clicks, 5);
    assert_eq!(stats.total_users, 2);
    assert_eq!(stats.urls_today, 3);
    assert_eq!(stats.clicks_today, 5);

    let ranked: Vec<_> = stats
        .top_urls
        .iter()
        .map(|t| (t.short_code.as_str(), t.click_count))
        .collect();
    // Equal counts go to the link created first.
    assert_eq!(
        ranked,
        vec![
            (busy.short_code.as_str(), 3),
            (quiet.short_code.as_str(), 1),
            (tied.short_code.as_str(), 1),
        ]
    );
}

#[tokio::test]
async fn platform_stats_on_an_empty_platform() {
    let server = TestServer::start().await;
    let admin = server.admin().await;

    let stats = admin
        .analytics
        .get_platform_stats(&admin.session)
        .await
        .unwrap();

    assert_eq!(stats.total_urls, 0);
    assert_eq!(stats.total_clicks, 0);
    assert_eq!(stats.total_users, 1);
    assert!(stats.top_urls.is_empty());
}
