use crate::client::SupabaseRestClient;
use crate::realtime::RealtimeClient;
use crate::token::AccessTokenSource;
use async_trait::async_trait;
use collection_sync::{
    ChangeHandler, ChangeKind, Query, RowId, RowStore, StoreError, StoreResult,
};
use live_subscription::Subscription;
use serde_json::Value;
use std::sync::Arc;

/// [`RowStore`] backed by PostgREST for reads and writes and realtime
/// channels for change events.
pub struct SupabaseRowStore {
    rest: SupabaseRestClient,
    realtime: Arc<RealtimeClient>,
    tokens: Arc<dyn AccessTokenSource>,
}

impl SupabaseRowStore {
    pub fn new(
        rest: SupabaseRestClient,
        realtime: Arc<RealtimeClient>,
        tokens: Arc<dyn AccessTokenSource>,
    ) -> Self {
        Self {
            rest,
            realtime,
            tokens,
        }
    }

    pub fn realtime(&self) -> &Arc<RealtimeClient> {
        &self.realtime
    }

    /// The signed-in user's token, else the anon key.
    fn bearer(&self) -> String {
        self.tokens
            .access_token()
            .unwrap_or_else(|| self.rest.anon_key().to_string())
    }
}

#[async_trait]
impl RowStore for SupabaseRowStore {
    async fn query(&self, table: &str, query: &Query) -> StoreResult<Vec<Value>> {
        self.rest
            .select(table, query, &self.bearer())
            .await
            .map_err(|e| e.into_store_error(table))
    }

    fn on_change(
        &self,
        table: &str,
        kind: ChangeKind,
        handler: ChangeHandler,
    ) -> StoreResult<Subscription> {
        self.realtime
            .subscribe(table, kind, handler)
            .map_err(|e| StoreError::Subscribe {
                table: table.to_string(),
                kind,
                reason: e.to_string(),
            })
    }

    async fn insert(&self, table: &str, fields: Value) -> StoreResult<Value> {
        self.rest
            .insert(table, &fields, &self.bearer())
            .await
            .map_err(|e| e.into_store_error(table))
    }

    async fn update(&self, table: &str, id: &RowId, patch: Value) -> StoreResult<()> {
        self.rest
            .update(table, id, &patch, &self.bearer())
            .await
            .map_err(|e| e.into_store_error(table))
    }

    async fn delete(&self, table: &str, id: &RowId) -> StoreResult<()> {
        self.rest
            .delete(table, id, &self.bearer())
            .await
            .map_err(|e| e.into_store_error(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::RealtimeConfig;
    use collection_sync::ChangePayload;

    struct FixedToken(Option<&'static str>);

    impl AccessTokenSource for FixedToken {
        fn access_token(&self) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    fn store(token: Option<&'static str>) -> SupabaseRowStore {
        let tokens: Arc<dyn AccessTokenSource> = Arc::new(FixedToken(token));
        let config = RealtimeConfig::for_project("https://xyz.supabase.co", "anon").unwrap();
        SupabaseRowStore::new(
            SupabaseRestClient::new("https://xyz.supabase.co", "anon"),
            Arc::new(RealtimeClient::new(config, "anon", tokens.clone())),
            tokens,
        )
    }

    #[test]
    fn test_bearer_prefers_user_token() {
        assert_eq!(store(Some("jwt")).bearer(), "jwt");
        assert_eq!(store(None).bearer(), "anon");
    }

    #[tokio::test]
    async fn test_on_change_registers_channel_listener() {
        let store = store(None);
        let handler: ChangeHandler = Arc::new(|_: &ChangePayload| {});

        let sub = store.on_change("posts", ChangeKind::Insert, handler).unwrap();
        assert_eq!(store.realtime().listener_count("posts"), 1);

        sub.unsubscribe();
        assert_eq!(store.realtime().listener_count("posts"), 0);
    }

    #[tokio::test]
    async fn test_on_change_after_shutdown_is_subscribe_error() {
        let store = store(None);
        store.realtime().shutdown().await;

        let handler: ChangeHandler = Arc::new(|_: &ChangePayload| {});
        match store.on_change("todos", ChangeKind::Delete, handler) {
            Err(StoreError::Subscribe { table, kind, .. }) => {
                assert_eq!(table, "todos");
                assert_eq!(kind, ChangeKind::Delete);
            }
            other => panic!("unexpected {:?}", other.map(|s| s.label().to_string())),
        }
    }
}
