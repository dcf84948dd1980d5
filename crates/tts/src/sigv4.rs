//! AWS Signature Version 4
//!
//! Just enough of SigV4 to sign Polly's REST calls: a single host header,
//! `x-amz-date`, an optional session token and a hashed payload.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use landing_judge_core::{Result, TtsError};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

/// One request to be signed
#[derive(Debug)]
pub struct SigningRequest<'a> {
    pub method: &'a str,
    pub host: &'a str,
    pub path: &'a str,
    /// Query parameters, unencoded
    pub query: &'a [(&'a str, &'a str)],
    pub payload: &'a [u8],
    pub region: &'a str,
    pub service: &'a str,
}

/// Headers to attach, in addition to `host`
pub fn sign(
    request: &SigningRequest<'_>,
    credentials: &Credentials,
    now: DateTime<Utc>,
) -> Result<Vec<(&'static str, String)>> {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();

    let mut headers: Vec<(&str, String)> = vec![
        ("host", request.host.to_string()),
        ("x-amz-date", amz_date.clone()),
    ];
    if let Some(token) = credentials.session_token.as_deref().filter(|t| !t.is_empty()) {
        headers.push(("x-amz-security-token", token.to_string()));
    }

    let signed_headers = headers
        .iter()
        .map(|(k, _)| *k)
        .collect::<Vec<_>>()
        .join(";");
    let canonical_headers: String = headers
        .iter()
        .map(|(k, v)| format!("{k}:{}\n", v.trim()))
        .collect();

    let canonical_request = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        request.method,
        request.path,
        canonical_query(request.query),
        canonical_headers,
        signed_headers,
        sha256_hex(request.payload),
    );

    let scope = format!("{date}/{}/{}/aws4_request", request.region, request.service);
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        sha256_hex(canonical_request.as_bytes())
    );

    let key = signing_key(&credentials.secret_access_key, &date, request.region, request.service)?;
    let signature = hex(&hmac(&key, string_to_sign.as_bytes())?);

    let authorization = format!(
        "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
        credentials.access_key_id
    );

    let mut out = vec![("x-amz-date", amz_date)];
    if let Some(token) = credentials.session_token.as_deref().filter(|t| !t.is_empty()) {
        out.push(("x-amz-security-token", token.to_string()));
    }
    out.push(("authorization", authorization));
    Ok(out)
}

pub fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Result<Vec<u8>> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date.as_bytes())?;
    let k_region = hmac(&k_date, region.as_bytes())?;
    let k_service = hmac(&k_region, service.as_bytes())?;
    hmac(&k_service, b"aws4_request")
}

/// Sorted, RFC 3986 encoded query string
pub fn canonical_query(query: &[(&str, &str)]) -> String {
    let mut pairs: Vec<(String, String)> = query
        .iter()
        .map(|(k, v)| (uri_encode(k), uri_encode(v)))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

pub fn uri_encode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| TtsError::not_configured("polly", format!("signing key: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SECRET: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";

    #[test]
    fn test_signing_key_vector() {
        let key = signing_key(SECRET, "20120215", "us-east-1", "iam").unwrap();
        assert_eq!(
            hex(&key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn test_get_vanilla_vector() {
        let creds = Credentials {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: SECRET.to_string(),
            session_token: None,
        };
        let request = SigningRequest {
            method: "GET",
            host: "example.amazonaws.com",
            path: "/",
            query: &[],
            payload: b"",
            region: "us-east-1",
            service: "service",
        };
        let now = Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap();
        let headers = sign(&request, &creds, now).unwrap();

        assert_eq!(headers[0], ("x-amz-date", "20150830T123600Z".to_string()));
        assert_eq!(
            headers[1].1,
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
             SignedHeaders=host;x-amz-date, \
             Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
        );
    }

    #[test]
    fn test_session_token_is_signed() {
        let creds = Credentials {
            access_key_id: "AKID".to_string(),
            secret_access_key: SECRET.to_string(),
            session_token: Some("token".to_string()),
        };
        let request = SigningRequest {
            method: "POST",
            host: "polly.us-east-1.amazonaws.com",
            path: "/v1/speech",
            query: &[],
            payload: b"{}",
            region: "us-east-1",
            service: "polly",
        };
        let headers = sign(&request, &creds, Utc::now()).unwrap();
        assert!(headers.iter().any(|(k, v)| *k == "x-amz-security-token" && v == "token"));
        let auth = &headers.last().unwrap().1;
        assert!(auth.contains("SignedHeaders=host;x-amz-date;x-amz-security-token"));
    }

    #[test]
    fn test_canonical_query_sorted_and_encoded() {
        assert_eq!(
            canonical_query(&[("NextToken", "a/b+c="), ("Engine", "neural")]),
            "Engine=neural&NextToken=a%2Fb%2Bc%3D"
        );
        assert_eq!(uri_encode("a b~"), "a%20b~");
    }
}
