//! Signature Version 4 request signing
//!
//! Produces the `x-amz-date`, `x-amz-security-token` and `authorization`
//! headers for a request. `host` is always signed; callers pass any other
//! headers they want covered (they must be sent byte-for-byte as given).

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use url::Url;

use super::Credentials;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// SHA-256 input block size
const BLOCK_SIZE: usize = 64;

/// Request parts covered by the signature
#[derive(Debug)]
pub struct SignableRequest<'a> {
    pub method: &'a str,
    pub url: &'a Url,
    pub headers: &'a [(&'a str, &'a str)],
    pub body: &'a [u8],
}

/// Where the signature is scoped
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub region: &'a str,
    pub service: &'a str,
}

/// Sign a request, returning the headers to attach to it
#[must_use]
pub fn sign(
    request: &SignableRequest<'_>,
    credentials: &Credentials,
    scope: Scope<'_>,
    now: DateTime<Utc>,
) -> Vec<(&'static str, String)> {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();

    let mut headers: Vec<(String, String)> = request
        .headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim().to_string()))
        .collect();
    headers.push(("host".to_string(), host_header(request.url)));
    headers.push(("x-amz-date".to_string(), amz_date.clone()));
    if let Some(token) = credentials.session_token() {
        headers.push(("x-amz-security-token".to_string(), token.to_string()));
    }
    headers.sort();

    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical_request = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        request.method.to_ascii_uppercase(),
        canonical_uri(request.url),
        canonical_query(request.url),
        canonical_headers,
        signed_headers,
        hex::encode(Sha256::digest(request.body)),
    );

    let credential_scope = format!("{date}/{}/{}/aws4_request", scope.region, scope.service);
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{credential_scope}\n{}",
        hex::encode(Sha256::digest(canonical_request.as_bytes())),
    );

    let key = signing_key(credentials.secret_access_key(), &date, scope);
    let signature = hex::encode(hmac(&key, string_to_sign.as_bytes()));

    let authorization = format!(
        "{ALGORITHM} Credential={}/{credential_scope}, SignedHeaders={signed_headers}, Signature={signature}",
        credentials.access_key_id(),
    );

    let mut out = vec![("x-amz-date", amz_date)];
    if let Some(token) = credentials.session_token() {
        out.push(("x-amz-security-token", token.to_string()));
    }
    out.push(("authorization", authorization));
    out
}

/// Derive the per-day signing key
#[must_use]
pub fn signing_key(secret: &str, date: &str, scope: Scope<'_>) -> [u8; 32] {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date.as_bytes());
    let k_region = hmac(&k_date, scope.region.as_bytes());
    let k_service = hmac(&k_region, scope.service.as_bytes());
    hmac(&k_service, b"aws4_request")
}

/// HMAC-SHA256 (RFC 2104)
fn hmac(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut block = [0u8; BLOCK_SIZE];
    if key.len() > BLOCK_SIZE {
        block[..32].copy_from_slice(&Sha256::digest(key));
    } else {
        block[..key.len()].copy_from_slice(key);
    }

    let inner = Sha256::new()
        .chain_update(block.map(|b| b ^ 0x36))
        .chain_update(data)
        .finalize();

    Sha256::new()
        .chain_update(block.map(|b| b ^ 0x5c))
        .chain_update(inner)
        .finalize()
        .into()
}

fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

/// Path segments encoded once more on top of the wire encoding
fn canonical_uri(url: &Url) -> String {
    let path = url.path();
    if path.is_empty() || path == "/" {
        return "/".to_string();
    }

    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn canonical_query(url: &Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            (
                urlencoding::encode(&k).into_owned(),
                urlencoding::encode(&v).into_owned(),
            )
        })
        .collect();
    pairs.sort();

    pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    const EXAMPLE_SECRET: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";

    #[test]
    fn derives_documented_signing_key() {
        let key = signing_key(
            EXAMPLE_SECRET,
            "20120215",
            Scope {
                region: "us-east-1",
                service: "iam",
            },
        );
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn hmac_matches_rfc_4231() {
        // Test case 2
        assert_eq!(
            hex::encode(hmac(b"Jefe", b"what do ya want for nothing?")),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );

        // Test case 6: key longer than one block
        assert_eq!(
            hex::encode(hmac(
                &[0xaa; 131],
                b"Test Using Larger Than Block-Size Key - Hash Key First"
            )),
            "60e431591ee0b67f0d8a26aacbf5b77f8e0bc6213728c5140546040f0ee37f54"
        );
    }

    #[test]
    fn signs_vanilla_get() {
        let url = Url::parse("https://example.amazonaws.com/").unwrap();
        let creds = Credentials::new("AKIDEXAMPLE", EXAMPLE_SECRET, None, None);
        let now = Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap();

        let headers = sign(
            &SignableRequest {
                method: "GET",
                url: &url,
                headers: &[],
                body: b"",
            },
            &creds,
            Scope {
                region: "us-east-1",
                service: "service",
            },
            now,
        );

        assert_eq!(headers[0], ("x-amz-date", "20150830T123600Z".to_string()));
        assert_eq!(
            headers[1].1,
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
             SignedHeaders=host;x-amz-date, \
             Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
        );
    }

    #[test]
    fn session_token_is_signed_and_sent() {
        let url = Url::parse("http://127.0.0.1:8080/v1/speech").unwrap();
        let creds = Credentials::new("AKID", "secret", Some("tok".to_string()), None);
        let headers = sign(
            &SignableRequest {
                method: "POST",
                url: &url,
                headers: &[("Content-Type", "application/json")],
                body: b"{}",
            },
            &creds,
            Scope {
                region: "us-east-1",
                service: "polly",
            },
            Utc::now(),
        );

        let names: Vec<&str> = headers.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, ["x-amz-date", "x-amz-security-token", "authorization"]);
        assert_eq!(headers[1].1, "tok");
        assert!(headers[2].1.contains(
            "SignedHeaders=content-type;host;x-amz-date;x-amz-security-token"
        ));
    }

    #[test]
    fn host_includes_explicit_port() {
        let url = Url::parse("http://localhost:4566/x").unwrap();
        assert_eq!(host_header(&url), "localhost:4566");

        let url = Url::parse("https://polly.us-east-1.amazonaws.com/v1/speech").unwrap();
        assert_eq!(host_header(&url), "polly.us-east-1.amazonaws.com");
    }

    #[test]
    fn canonical_uri_double_encodes() {
        let url = Url::parse("https://h/sessions/a%20b/text").unwrap();
        assert_eq!(canonical_uri(&url), "/sessions/a%2520b/text");
    }

    #[test]
    fn canonical_query_sorted() {
        let url = Url::parse("https://h/?b=2&a=1&c=x y").unwrap();
        assert_eq!(canonical_query(&url), "a=1&b=2&c=x%20y");
    }
}
