// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Limit resolution and enforcement.

use std::sync::Arc;

use chrono::{NaiveTime, SecondsFormat, Utc};
use palaver_core::types::{Organization, Plan, ResourceKind};
use palaver_core::{PalaverError, StorageAdapter};
use tracing::{debug, warn};

/// Limits after organization overrides are applied over the plan.
///
/// `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EffectiveLimits {
    pub max_agents: Option<i64>,
    pub max_sessions: Option<i64>,
    pub max_contacts: Option<i64>,
    pub daily_message_limit: Option<i64>,
}

impl EffectiveLimits {
    /// Organization override, else plan value.
    pub fn resolve(org: &Organization, plan: Option<&Plan>) -> Self {
        Self {
            max_agents: org.max_agents.or(plan.map(|p| p.max_agents)),
            max_sessions: org.max_sessions.or(plan.map(|p| p.max_sessions)),
            max_contacts: org.max_contacts.or(plan.map(|p| p.max_contacts)),
            daily_message_limit: org
                .daily_message_limit
                .or(plan.and_then(|p| p.daily_message_limit)),
        }
    }

    pub fn for_resource(&self, kind: ResourceKind) -> Option<i64> {
        match kind {
            ResourceKind::Agents => self.max_agents,
            ResourceKind::Sessions => self.max_sessions,
            ResourceKind::Contacts => self.max_contacts,
        }
    }
}

/// Compares live counts against effective limits.
pub struct UsageLimiter {
    storage: Arc<dyn StorageAdapter>,
    default_daily_message_limit: i64,
}

impl UsageLimiter {
    pub fn new(storage: Arc<dyn StorageAdapter>, default_daily_message_limit: i64) -> Self {
        Self {
            storage,
            default_daily_message_limit,
        }
    }

    /// Resolves the organization's limits. Unknown organizations are `NotFound`.
    pub async fn effective_limits(
        &self,
        organization_id: &str,
    ) -> Result<EffectiveLimits, PalaverError> {
        let org = self
            .storage
            .get_organization(organization_id)
            .await?
            .ok_or_else(|| PalaverError::not_found("organization", organization_id))?;
        let plan = match &org.plan_id {
            Some(plan_id) => {
                let plan = self.storage.get_plan(plan_id).await?;
                if plan.is_none() {
                    warn!(organization_id, plan_id = %plan_id, "organization references a missing plan");
                }
                plan
            }
            None => None,
        };
        Ok(EffectiveLimits::resolve(&org, plan.as_ref()))
    }

    /// Fails with [`PalaverError::LimitExceeded`] when creating one more
    /// `kind` would exceed the organization's limit.
    pub async fn check_limit(
        &self,
        organization_id: &str,
        kind: ResourceKind,
    ) -> Result<(), PalaverError> {
        let Some(limit) = self.effective_limits(organization_id).await?.for_resource(kind) else {
            return Ok(());
        };
        let current = match kind {
            ResourceKind::Agents => self.storage.count_agents(organization_id).await?,
            ResourceKind::Sessions => self.storage.count_sessions(organization_id).await?,
            ResourceKind::Contacts => self.storage.count_contacts(organization_id).await?,
        };
        if current >= limit {
            debug!(organization_id, resource = %kind, current, limit, "limit reached");
            return Err(PalaverError::LimitExceeded {
                resource: kind,
                limit,
                current,
            });
        }
        Ok(())
    }

    /// Daily playground quota, falling back to the configured default.
    pub async fn daily_message_limit(&self, organization_id: &str) -> Result<i64, PalaverError> {
        Ok(self
            .effective_limits(organization_id)
            .await?
            .daily_message_limit
            .unwrap_or(self.default_daily_message_limit))
    }

    /// Whether today's user messages (UTC) are at or over the daily quota.
    pub async fn is_over_daily_quota(&self, organization_id: &str) -> Result<bool, PalaverError> {
        let limit = self.daily_message_limit(organization_id).await?;
        let used = self
            .storage
            .count_user_messages_since(organization_id, &start_of_today())
            .await?;
        Ok(used >= limit)
    }
}

/// Midnight UTC today, formatted like stored timestamps.
fn start_of_today() -> String {
    Utc::now()
        .date_naive()
        .and_time(NaiveTime::MIN)
        .and_utc()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use palaver_config::model::StorageConfig;
    use palaver_core::types::{Agent, Message, MessageRole, Session, SessionKind, SessionStatus};
    use palaver_storage::{SqliteStorage, now_timestamp};

    async fn storage() -> (Arc<dyn StorageAdapter>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage = SqliteStorage::new(StorageConfig {
            database_path: dir.path().join("usage.db").to_string_lossy().into_owned(),
            wal_mode: true,
        });
        storage.initialize().await.unwrap();
        storage
            .create_plan(&Plan {
                id: "starter".into(),
                name: "Starter".into(),
                max_agents: 1,
                max_sessions: 2,
                max_contacts: 100,
                daily_message_limit: Some(3),
            })
            .await
            .unwrap();
        (Arc::new(storage), dir)
    }

    fn org(id: &str, plan_id: Option<&str>) -> Organization {
        Organization {
            id: id.into(),
            name: id.into(),
            plan_id: plan_id.map(Into::into),
            max_agents: None,
            max_sessions: None,
            max_contacts: None,
            daily_message_limit: None,
            created_at: now_timestamp(),
        }
    }

    fn agent(id: &str, org: &str) -> Agent {
        Agent {
            id: id.into(),
            organization_id: org.into(),
            name: "Front desk".into(),
            prompt: "Be helpful.".into(),
            active: true,
            created_at: now_timestamp(),
        }
    }

    #[test]
    fn override_beats_plan() {
        let plan = Plan {
            id: "p".into(),
            name: "p".into(),
            max_agents: 1,
            max_sessions: 1,
            max_contacts: 10,
            daily_message_limit: None,
        };
        let mut o = org("o", Some("p"));
        o.max_agents = Some(5);
        let limits = EffectiveLimits::resolve(&o, Some(&plan));
        assert_eq!(limits.max_agents, Some(5));
        assert_eq!(limits.max_sessions, Some(1));
        assert_eq!(limits.daily_message_limit, None);
    }

    #[test]
    fn no_plan_and_no_override_is_unlimited() {
        assert_eq!(
            EffectiveLimits::resolve(&org("o", None), None),
            EffectiveLimits::default()
        );
    }

    #[test]
    fn start_of_today_is_midnight() {
        assert!(start_of_today().ends_with("T00:00:00.000Z"));
    }

    #[tokio::test]
    async fn agent_limit_rejects_at_boundary() {
        let (storage, _dir) = storage().await;
        storage.create_organization(&org("acme", Some("starter"))).await.unwrap();
        let limiter = UsageLimiter::new(Arc::clone(&storage), 50);

        limiter.check_limit("acme", ResourceKind::Agents).await.unwrap();
        storage.create_agent(&agent("a1", "acme")).await.unwrap();

        let err = limiter
            .check_limit("acme", ResourceKind::Agents)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PalaverError::LimitExceeded {
                resource: ResourceKind::Agents,
                limit: 1,
                current: 1
            }
        ));
    }

    #[tokio::test]
    async fn unknown_organization_is_not_found() {
        let (storage, _dir) = storage().await;
        let limiter = UsageLimiter::new(storage, 50);
        let err = limiter
            .check_limit("ghost", ResourceKind::Contacts)
            .await
            .unwrap_err();
        assert!(matches!(err, PalaverError::NotFound { entity: "organization", .. }));
    }

    #[tokio::test]
    async fn daily_quota_counts_only_user_messages() {
        let (storage, _dir) = storage().await;
        storage.create_organization(&org("acme", Some("starter"))).await.unwrap();
        storage.create_agent(&agent("a1", "acme")).await.unwrap();
        storage
            .create_session(&Session {
                id: "s1".into(),
                agent_id: "a1".into(),
                kind: SessionKind::Playground,
                status: SessionStatus::Connected,
                qr_code: None,
                created_at: now_timestamp(),
                updated_at: now_timestamp(),
            })
            .await
            .unwrap();
        let contact = storage
            .find_or_create_contact("acme", "5511999990000", "Ana")
            .await
            .unwrap();
        let limiter = UsageLimiter::new(Arc::clone(&storage), 50);
        assert_eq!(limiter.daily_message_limit("acme").await.unwrap(), 3);

        for (i, role) in [
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::User,
            MessageRole::Assistant,
        ]
        .into_iter()
        .enumerate()
        {
            storage
                .insert_message(&Message {
                    id: format!("m{i}"),
                    session_id: "s1".into(),
                    contact_id: contact.id.clone(),
                    role,
                    content: "hi".into(),
                    created_at: now_timestamp(),
                })
                .await
                .unwrap();
        }
        assert!(!limiter.is_over_daily_quota("acme").await.unwrap());

        storage
            .insert_message(&Message {
                id: "m9".into(),
                session_id: "s1".into(),
                contact_id: contact.id.clone(),
                role: MessageRole::User,
                content: "again".into(),
                created_at: now_timestamp(),
            })
            .await
            .unwrap();
        assert!(limiter.is_over_daily_quota("acme").await.unwrap());
    }

    #[tokio::test]
    async fn configured_default_applies_without_plan_quota() {
        let (storage, _dir) = storage().await;
        storage.create_organization(&org("solo", None)).await.unwrap();
        let limiter = UsageLimiter::new(storage, 7);
        assert_eq!(limiter.daily_message_limit("solo").await.unwrap(), 7);
        limiter.check_limit("solo", ResourceKind::Sessions).await.unwrap();
    }
}
