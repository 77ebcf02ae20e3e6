//! Unit tests for the operating rule repository.

use std::sync::Arc;

use citadel::models::agent::AgentRole;
use citadel::models::rule::{Rule, RuleFilter, RulePatch, RuleScope, RuleTier};
use citadel::persistence::{db, Repositories};
use citadel::AppError;

async fn repos() -> Repositories {
    let db = db::connect_memory().await.expect("db");
    Repositories::new(&Arc::new(db))
}

async fn insert(repos: &Repositories, text: &str, scope: RuleScope) -> Rule {
    repos
        .rules
        .insert(&Rule::new(text, "because", scope, RuleTier::Standard).with_check(text))
        .await
        .expect("insert")
}

#[tokio::test]
async fn role_sees_global_and_own_scope_oldest_first() {
    let repos = repos().await;
    insert(&repos, "g1", RuleScope::Global).await;
    insert(&repos, "s1", RuleScope::Social).await;
    insert(&repos, "t1", RuleScope::Trading).await;
    insert(&repos, "g2", RuleScope::Global).await;

    let social: Vec<String> = repos
        .rules
        .list_for_role(AgentRole::Social)
        .await
        .expect("list")
        .into_iter()
        .map(|rule| rule.text)
        .collect();
    assert_eq!(social, vec!["g1", "s1", "g2"]);

    let generalist = repos
        .rules
        .list_for_role(AgentRole::Generalist)
        .await
        .expect("list");
    assert_eq!(generalist.len(), 2);
    assert!(generalist.iter().all(|rule| rule.scope == RuleScope::Global));
}

#[tokio::test]
async fn inactive_rules_are_hidden_from_scope_listing() {
    let repos = repos().await;
    let rule = insert(&repos, "g1", RuleScope::Global).await;
    repos
        .rules
        .update(
            &rule.id,
            &RulePatch {
                active: Some(false),
                ..RulePatch::default()
            },
        )
        .await
        .expect("deactivate");

    assert!(repos.rules.list_for_scope(None).await.expect("list").is_empty());
    let inactive = repos
        .rules
        .list(RuleFilter {
            active: Some(false),
            ..RuleFilter::default()
        })
        .await
        .expect("list");
    assert_eq!(inactive.len(), 1);
}

#[tokio::test]
async fn update_patches_only_given_fields() {
    let repos = repos().await;
    let rule = insert(&repos, "no hype", RuleScope::Social).await;

    let updated = repos
        .rules
        .update(
            &rule.id,
            &RulePatch {
                tier: Some(RuleTier::Critical),
                check_pattern: Some("(100x|guaranteed)".into()),
                ..RulePatch::default()
            },
        )
        .await
        .expect("update");

    assert_eq!(updated.text, "no hype");
    assert_eq!(updated.scope, RuleScope::Social);
    assert_eq!(updated.tier, RuleTier::Critical);
    assert_eq!(updated.check_pattern.as_deref(), Some("(100x|guaranteed)"));
    assert!(updated.updated_at >= rule.updated_at);

    let stored = repos.rules.get(&rule.id).await.expect("get").expect("rule");
    assert_eq!(stored.tier, RuleTier::Critical);
    assert_eq!(stored.check_pattern, updated.check_pattern);
}

#[tokio::test]
async fn filter_by_scope_and_tier() {
    let repos = repos().await;
    insert(&repos, "g1", RuleScope::Global).await;
    insert(&repos, "s1", RuleScope::Social).await;
    repos
        .rules
        .insert(&Rule::new("s2", "", RuleScope::Social, RuleTier::Critical))
        .await
        .expect("insert");

    let social = repos
        .rules
        .list(RuleFilter {
            scope: Some(RuleScope::Social),
            ..RuleFilter::default()
        })
        .await
        .expect("list");
    assert_eq!(social.len(), 2);
    assert_eq!(social[0].text, "s2", "newest first");

    let critical = repos
        .rules
        .list(RuleFilter {
            scope: Some(RuleScope::Social),
            tier: Some(RuleTier::Critical),
            active: Some(true),
        })
        .await
        .expect("list");
    assert_eq!(critical.len(), 1);
}

#[tokio::test]
async fn missing_rule_update_and_remove() {
    let repos = repos().await;
    let err = repos
        .rules
        .update("missing", &RulePatch::default())
        .await
        .expect_err("missing");
    assert!(matches!(err, AppError::NotFound(_)));

    let rule = insert(&repos, "g1", RuleScope::Global).await;
    assert!(repos.rules.remove(&rule.id).await.expect("remove"));
    assert!(!repos.rules.remove(&rule.id).await.expect("remove again"));
}
