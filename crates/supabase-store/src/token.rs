use auth_bridge::AuthContext;

/// Supplies the bearer token for REST calls and channel joins.
///
/// `None` means the request goes out with the project's anon key.
pub trait AccessTokenSource: Send + Sync {
    fn access_token(&self) -> Option<String>;
}

impl AccessTokenSource for AuthContext {
    fn access_token(&self) -> Option<String> {
        AuthContext::access_token(self)
    }
}
