//! Supabase PostgREST client.

use crate::error::{SupabaseError, SupabaseResult};
use collection_sync::{Query, RowId};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};

/// REST client for `{api_url}/rest/v1/{table}`.
#[derive(Clone)]
pub struct SupabaseRestClient {
    http_client: reqwest::Client,
    api_url: String,
    anon_key: String,
}

impl SupabaseRestClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `api_url` - The Supabase project API URL (e.g., `https://xyz.supabase.co`)
    /// * `anon_key` - The Supabase anonymous API key
    pub fn new(api_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        let api_url: String = api_url.into();
        Self {
            http_client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
        }
    }

    pub fn anon_key(&self) -> &str {
        &self.anon_key
    }

    /// Build the REST API URL for a table.
    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.api_url, table)
    }

    /// Query parameters for a select.
    fn select_params(query: &Query) -> Vec<(&'static str, String)> {
        let mut params = vec![("select", "*".to_string())];
        if let Some(order) = &query.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            params.push(("order", format!("{}.{}", order.column, direction)));
        }
        params
    }

    fn id_filter(id: &RowId) -> [(&'static str, String); 1] {
        [("id", format!("eq.{}", id))]
    }

    /// Fetch rows. `bearer` is the user's access token, or the anon key.
    pub async fn select(&self, table: &str, query: &Query, bearer: &str) -> SupabaseResult<Vec<Value>> {
        debug!(table, "Selecting rows from Supabase");

        let response = self
            .http_client
            .get(self.rest_url(table))
            .query(&Self::select_params(query))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", bearer))
            .send()
            .await?;

        let response = self.check_response(response).await?;
        Ok(response.json().await?)
    }

    /// Insert one row and return it as stored.
    pub async fn insert<T: Serialize + ?Sized>(
        &self,
        table: &str,
        body: &T,
        bearer: &str,
    ) -> SupabaseResult<Value> {
        debug!(table, "Inserting row into Supabase");

        let response = self
            .http_client
            .post(self.rest_url(table))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", bearer))
            .header("Content-Type", "application/json")
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;

        let response = self.check_response(response).await?;
        let rows: Vec<Value> = response.json().await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| SupabaseError::Api {
                status: 200,
                message: format!("insert into {} returned no row", table),
            })
    }

    /// PATCH the row with `id`.
    pub async fn update<T: Serialize + ?Sized>(
        &self,
        table: &str,
        id: &RowId,
        body: &T,
        bearer: &str,
    ) -> SupabaseResult<()> {
        debug!(table, id = %id, "Updating row in Supabase");

        let response = self
            .http_client
            .patch(self.rest_url(table))
            .query(&Self::id_filter(id))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", bearer))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        self.check_response(response).await?;
        Ok(())
    }

    /// DELETE the row with `id`.
    pub async fn delete(&self, table: &str, id: &RowId, bearer: &str) -> SupabaseResult<()> {
        debug!(table, id = %id, "Deleting row from Supabase");

        let response = self
            .http_client
            .delete(self.rest_url(table))
            .query(&Self::id_filter(id))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", bearer))
            .send()
            .await?;

        self.check_response(response).await?;
        Ok(())
    }

    /// Check HTTP response for errors.
    async fn check_response(&self, response: reqwest::Response) -> SupabaseResult<reqwest::Response> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!("Supabase request failed: {} - {}", status, body);
            return Err(SupabaseError::Api {
                status,
                message: body,
            });
        }
        Ok(response)
    }
}

impl std::fmt::Debug for SupabaseRestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseRestClient")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}
