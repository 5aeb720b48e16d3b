//! Role resolver
//!
//! Computes the set of roles a request's raw credentials prove, each check
//! independent and additive. Nothing here fails outward: an invalid token
//! yields no subject, and a store error or missing row resolves to
//! "capability not granted", degrading toward the `External` baseline.

use crate::access_control::credentials::RawCredentials;
use crate::access_control::role::{ResolvedIdentity, RoleLevel};
use crate::auth::TokenCodec;
use crate::error::StoreResult;
use crate::util::SecretString;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, trace};

/// Read-only ownership lookups the resolver depends on
///
/// Implementations must support concurrent reads from multiple in-flight
/// requests. Absence (`Ok(false)` / `Ok(None)`) is an answer, not an error;
/// the `Err` channel is for store failures, which the resolver absorbs.
#[async_trait]
pub trait PersistenceReader: Send + Sync {
    async fn is_group_member(&self, subject_id: i64, group_id: &str) -> StoreResult<bool>;

    async fn is_group_creator(&self, subject_id: i64, group_id: &str) -> StoreResult<bool>;

    async fn is_edit_creator(&self, subject_id: i64, edit_id: i64) -> StoreResult<bool>;

    /// The group that owns an edit, for endpoints that identify a group only
    /// implicitly through the edit.
    async fn group_id_for_edit(&self, edit_id: i64) -> StoreResult<Option<String>>;
}

/// Resolves raw credentials into a [`ResolvedIdentity`]
pub struct RoleResolver {
    admin_secret: SecretString,
    codec: Arc<TokenCodec>,
    store: Arc<dyn PersistenceReader>,
}

impl RoleResolver {
    pub fn new(
        admin_secret: SecretString,
        codec: Arc<TokenCodec>,
        store: Arc<dyn PersistenceReader>,
    ) -> Self {
        Self {
            admin_secret,
            codec,
            store,
        }
    }

    /// Resolve the roles `raw` proves.
    ///
    /// A caller can legitimately satisfy several roles at once; the identity
    /// keeps them all and `effective_role` picks the most privileged.
    pub async fn resolve(&self, raw: &RawCredentials) -> ResolvedIdentity {
        let mut identity = ResolvedIdentity::external();

        // Admin secret. An empty configured secret can never match, so a
        // missing deployment secret fails closed.
        if let Some(presented) = &raw.admin_secret
            && !self.admin_secret.is_empty()
            && presented == self.admin_secret.expose_secret()
        {
            identity.grant(RoleLevel::Admin);
        }

        // Subject id from the bearer token. Decode failures prove nothing;
        // the error text is kept for the decision log only.
        if let Some(token) = &raw.bearer_token {
            match self.codec.verify(token) {
                Ok(subject_id) => identity.subject_id = Some(subject_id),
                Err(e) => {
                    trace!(error = %e, "bearer token rejected");
                    identity.token_error = Some(e.to_string());
                }
            }
        }

        let Some(subject_id) = identity.subject_id else {
            return identity;
        };

        // Group context: explicit, or derived from the edit when absent.
        let group_id = match (&raw.group_id, raw.edit_id) {
            (Some(group_id), _) => Some(group_id.clone()),
            (None, Some(edit_id)) => self.absorb_group(
                self.store.group_id_for_edit(edit_id).await,
                "group_id_for_edit",
            ),
            (None, None) => None,
        };

        if let Some(group_id) = &group_id {
            if self.absorb_bool(
                self.store.is_group_member(subject_id, group_id).await,
                "is_group_member",
            ) {
                identity.grant(RoleLevel::GroupMember);
            }
            if self.absorb_bool(
                self.store.is_group_creator(subject_id, group_id).await,
                "is_group_creator",
            ) {
                identity.grant(RoleLevel::GroupCreator);
            }
        }

        if let Some(edit_id) = raw.edit_id
            && self.absorb_bool(
                self.store.is_edit_creator(subject_id, edit_id).await,
                "is_edit_creator",
            )
        {
            identity.grant(RoleLevel::EditCreator);
        }

        identity
    }

    /// Store failures resolve to "not granted", never upward.
    fn absorb_bool(&self, result: StoreResult<bool>, query: &str) -> bool {
        match result {
            Ok(granted) => granted,
            Err(e) => {
                debug!(error = %e, query, "store lookup failed, treating as not granted");
                false
            }
        }
    }

    fn absorb_group(&self, result: StoreResult<Option<String>>, query: &str) -> Option<String> {
        match result {
            Ok(found) => found,
            Err(e) => {
                debug!(error = %e, query, "store lookup failed, treating as not granted");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn resolver(store: Arc<MemoryStore>) -> RoleResolver {
        let codec = Arc::new(TokenCodec::new(&SecretString::new("resolver-test-secret")));
        RoleResolver::new(SecretString::new("admin-secret"), codec, store)
    }

    fn codec() -> TokenCodec {
        TokenCodec::new(&SecretString::new("resolver-test-secret"))
    }

    #[tokio::test]
    async fn test_no_credentials_is_external() {
        let resolver = resolver(Arc::new(MemoryStore::new()));
        let identity = resolver.resolve(&RawCredentials::default()).await;
        assert_eq!(identity.effective_role(), RoleLevel::External);
    }

    #[tokio::test]
    async fn test_admin_secret_match() {
        let resolver = resolver(Arc::new(MemoryStore::new()));
        let raw = RawCredentials {
            admin_secret: Some("admin-secret".to_string()),
            ..Default::default()
        };
        let identity = resolver.resolve(&raw).await;
        assert_eq!(identity.effective_role(), RoleLevel::Admin);
    }

    #[tokio::test]
    async fn test_admin_secret_mismatch() {
        let resolver = resolver(Arc::new(MemoryStore::new()));
        let raw = RawCredentials {
            admin_secret: Some("wrong".to_string()),
            ..Default::default()
        };
        let identity = resolver.resolve(&raw).await;
        assert_eq!(identity.effective_role(), RoleLevel::External);
    }

    #[tokio::test]
    async fn test_empty_configured_secret_never_matches() {
        let codec = Arc::new(codec());
        let resolver = RoleResolver::new(
            SecretString::new(""),
            codec,
            Arc::new(MemoryStore::new()),
        );
        let raw = RawCredentials {
            admin_secret: Some("".to_string()),
            ..Default::default()
        };
        let identity = resolver.resolve(&raw).await;
        assert_eq!(identity.effective_role(), RoleLevel::External);
    }

    #[tokio::test]
    async fn test_group_member_via_explicit_group() {
        let store = Arc::new(MemoryStore::new());
        store.add_group("g1", 1);
        store.add_member("g1", 2);
        let resolver = resolver(store);

        let raw = RawCredentials {
            bearer_token: Some(codec().issue(2, 30).unwrap()),
            group_id: Some("g1".to_string()),
            ..Default::default()
        };
        let identity = resolver.resolve(&raw).await;
        assert_eq!(identity.effective_role(), RoleLevel::GroupMember);
        assert!(!identity.has_role(RoleLevel::GroupCreator));
    }

    #[tokio::test]
    async fn test_group_creator_outranks_membership() {
        let store = Arc::new(MemoryStore::new());
        store.add_group("g1", 1);
        let resolver = resolver(store);

        let raw = RawCredentials {
            bearer_token: Some(codec().issue(1, 30).unwrap()),
            group_id: Some("g1".to_string()),
            ..Default::default()
        };
        let identity = resolver.resolve(&raw).await;
        // Creator is also a member; min() picks the creator role
        assert!(identity.has_role(RoleLevel::GroupMember));
        assert!(identity.has_role(RoleLevel::GroupCreator));
        assert_eq!(identity.effective_role(), RoleLevel::GroupCreator);
    }

    #[tokio::test]
    async fn test_group_derived_from_edit() {
        let store = Arc::new(MemoryStore::new());
        store.add_group("g1", 1);
        store.add_member("g1", 2);
        store.add_edit(7, "g1", 3);
        let resolver = resolver(store);

        // No explicit group id; the edit's owning group is looked up
        let raw = RawCredentials {
            bearer_token: Some(codec().issue(2, 30).unwrap()),
            edit_id: Some(7),
            ..Default::default()
        };
        let identity = resolver.resolve(&raw).await;
        assert_eq!(identity.effective_role(), RoleLevel::GroupMember);
    }

    #[tokio::test]
    async fn test_edit_creator() {
        let store = Arc::new(MemoryStore::new());
        store.add_group("g1", 1);
        store.add_member("g1", 2);
        store.add_edit(7, "g1", 2);
        let resolver = resolver(store);

        let raw = RawCredentials {
            bearer_token: Some(codec().issue(2, 30).unwrap()),
            edit_id: Some(7),
            ..Default::default()
        };
        let identity = resolver.resolve(&raw).await;
        assert!(identity.has_role(RoleLevel::EditCreator));
        assert!(identity.has_role(RoleLevel::GroupMember));
        // EditCreator outranks GroupMember
        assert_eq!(identity.effective_role(), RoleLevel::EditCreator);
    }

    #[tokio::test]
    async fn test_invalid_token_degrades_to_external() {
        let store = Arc::new(MemoryStore::new());
        store.add_group("g1", 1);
        store.add_member("g1", 2);
        let resolver = resolver(store);

        let raw = RawCredentials {
            bearer_token: Some("garbage".to_string()),
            group_id: Some("g1".to_string()),
            ..Default::default()
        };
        let identity = resolver.resolve(&raw).await;
        assert_eq!(identity.effective_role(), RoleLevel::External);
        assert!(identity.token_error.is_some());
    }

    #[tokio::test]
    async fn test_expired_token_degrades_to_external() {
        let resolver = resolver(Arc::new(MemoryStore::new()));
        let raw = RawCredentials {
            bearer_token: Some(codec().issue(2, -10).unwrap()),
            ..Default::default()
        };
        let identity = resolver.resolve(&raw).await;
        assert_eq!(identity.effective_role(), RoleLevel::External);
        assert_eq!(identity.token_error.as_deref(), Some("Token expired"));
    }

    #[tokio::test]
    async fn test_unknown_edit_not_granted() {
        let store = Arc::new(MemoryStore::new());
        let resolver = resolver(store);

        let raw = RawCredentials {
            bearer_token: Some(codec().issue(2, 30).unwrap()),
            edit_id: Some(999),
            ..Default::default()
        };
        let identity = resolver.resolve(&raw).await;
        assert_eq!(identity.effective_role(), RoleLevel::External);
    }

    #[tokio::test]
    async fn test_resolution_monotonic_under_store_change() {
        let store = Arc::new(MemoryStore::new());
        store.add_group("g1", 1);
        store.add_member("g1", 2);
        let resolver = resolver(Arc::clone(&store));

        let raw = RawCredentials {
            bearer_token: Some(codec().issue(2, 30).unwrap()),
            group_id: Some("g1".to_string()),
            ..Default::default()
        };

        let before = resolver.resolve(&raw).await;
        assert_eq!(before.effective_role(), RoleLevel::GroupMember);

        // Subject 2 becomes the group's creator; same raw credentials now
        // resolve strictly more privilege.
        store.set_group_creator("g1", 2);
        let after = resolver.resolve(&raw).await;
        assert_eq!(after.effective_role(), RoleLevel::GroupCreator);
        assert!(after.effective_role() < before.effective_role());
    }
}
