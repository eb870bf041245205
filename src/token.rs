// Read-only look at a JWT: the payload segment is base64url-decoded and
// parsed as JSON. Signatures are not checked.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token does not have three dot-separated segments")]
    Malformed,

    #[error("payload is not base64url: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("payload is not JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Claims carried by `token`, e.g. `{user_id, role, type, exp, iat}`.
pub fn decode_claims(token: &str) -> Result<Value, TokenError> {
    let mut segments = token.trim().split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_), None) if !payload.is_empty() => payload,
        _ => return Err(TokenError::Malformed),
    };
    // Some issuers pad anyway.
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn token_with(payload: &Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{}.{}.signature", header, body)
    }

    #[test]
    fn test_decode_claims() {
        let claims = json!({"user_id": 1, "role": "admin", "type": "access", "exp": 1700000000});
        assert_eq!(decode_claims(&token_with(&claims)).unwrap(), claims);
    }

    #[test]
    fn test_rejects_wrong_segment_count() {
        assert!(matches!(decode_claims("abc.def"), Err(TokenError::Malformed)));
        assert!(matches!(decode_claims("a.b.c.d"), Err(TokenError::Malformed)));
        assert!(matches!(decode_claims(""), Err(TokenError::Malformed)));
    }

    #[test]
    fn test_rejects_non_json_payload() {
        let token = format!("h.{}.s", URL_SAFE_NO_PAD.encode("not json"));
        assert!(matches!(decode_claims(&token), Err(TokenError::Json(_))));
    }

    #[test]
    fn test_rejects_bad_base64() {
        assert!(matches!(decode_claims("h.***.s"), Err(TokenError::Base64(_))));
    }
}
