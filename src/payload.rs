//! Wire payload builders: HTTP-like text for web ports, opaque printable
//! bytes for everything else, and a minimal DNS encoding for port 53.

use crate::error::EncodingError;
use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 Chrome/91.0",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 14_6 like Mac OS X) AppleWebKit/605.1.15",
    "curl/7.68.0",
    "python-requests/2.25.1",
    "Wget/1.21",
];

const HTTP_METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "HEAD"];

const HTTP_PATHS: &[&str] = &[
    "/",
    "/index.html",
    "/api/users",
    "/api/data",
    "/login",
    "/logout",
    "/search",
    "/products",
    "/cart",
    "/checkout",
    "/about",
    "/contact",
    "/images/logo.png",
    "/css/style.css",
    "/js/app.js",
    "/favicon.ico",
];

const STATUS_CODES: &[(u16, &str)] = &[
    (200, "OK"),
    (201, "Created"),
    (204, "No Content"),
    (301, "Moved Permanently"),
    (302, "Found"),
    (304, "Not Modified"),
    (400, "Bad Request"),
    (401, "Unauthorized"),
    (403, "Forbidden"),
    (404, "Not Found"),
    (500, "Internal Server Error"),
];

const SERVERS: &[&str] = &["nginx/1.18.0", "Apache/2.4.46", "cloudflare"];

const DOMAIN_WORDS: &[&str] = &[
    "alder", "basalt", "cobalt", "drift", "ember", "fjord", "glacier", "harbor", "iris", "juniper",
    "krill", "lumen", "mesa", "nectar", "onyx", "pylon",
];

const DOMAIN_TLDS: &[&str] = &["com", "net", "org", "io"];

/// DNS record type codes used for queries: A, AAAA, MX
const DNS_QTYPES: &[u16] = &[1, 28, 15];

pub fn random_domain(rng: &mut impl Rng) -> String {
    let word = DOMAIN_WORDS.choose(rng).unwrap();
    let tld = DOMAIN_TLDS.choose(rng).unwrap();
    format!("{word}.{tld}")
}

/// Opaque printable payload of `len` bytes.
pub fn printable_bytes(rng: &mut impl Rng, len: usize) -> Vec<u8> {
    (0..len).map(|_| rng.gen_range(32..=126u8)).collect()
}

pub fn http_request(rng: &mut impl Rng) -> Vec<u8> {
    let method = *HTTP_METHODS.choose(rng).unwrap();
    let mut path = HTTP_PATHS.choose(rng).unwrap().to_string();
    if rng.gen_bool(0.3) {
        path.push_str(&format!(
            "?id={}&page={}",
            rng.gen_range(1..=10_000),
            rng.gen_range(1..=100)
        ));
    }

    let host = random_domain(rng);
    let user_agent = *USER_AGENTS.choose(rng).unwrap();
    let connection = if rng.gen_bool(0.5) { "keep-alive" } else { "close" };

    let mut headers = format!("{method} {path} HTTP/1.1\r\n");
    headers.push_str(&format!("Host: {host}\r\n"));
    headers.push_str(&format!("User-Agent: {user_agent}\r\n"));
    headers.push_str("Accept: */*\r\n");
    headers.push_str("Accept-Language: en-US,en;q=0.9\r\n");
    headers.push_str(&format!("Connection: {connection}\r\n"));

    let mut body = Vec::new();
    if method == "POST" || method == "PUT" {
        let data = serde_json::json!({
            "id": rng.gen_range(1..=10_000),
            "name": *DOMAIN_WORDS.choose(rng).unwrap(),
            "timestamp": Utc::now().to_rfc3339(),
        });
        body = serde_json::to_vec(&data).unwrap_or_default();
        headers.push_str("Content-Type: application/json\r\n");
        headers.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }

    headers.push_str("\r\n");
    let mut out = headers.into_bytes();
    out.extend_from_slice(&body);
    out
}

pub fn http_response(rng: &mut impl Rng) -> Vec<u8> {
    // Most responses are 200 OK
    let (code, status) = if rng.gen_bool(0.7) {
        (200, "OK")
    } else {
        *STATUS_CODES.choose(rng).unwrap()
    };

    let body = if rng.gen_bool(0.5) {
        serde_json::to_vec(&serde_json::json!({
            "status": if code < 400 { "success" } else { "error" },
            "data": { "id": rng.gen_range(1..=1000), "value": *DOMAIN_WORDS.choose(rng).unwrap() },
            "timestamp": Utc::now().to_rfc3339(),
        }))
        .unwrap_or_default()
    } else {
        let len = rng.gen_range(50..=500);
        printable_bytes(rng, len)
    };

    let server = *SERVERS.choose(rng).unwrap();
    let mut response = format!("HTTP/1.1 {code} {status}\r\n");
    response.push_str("Content-Type: application/json\r\n");
    response.push_str(&format!("Content-Length: {}\r\n", body.len()));
    response.push_str(&format!(
        "Date: {}\r\n",
        Utc::now().format("%a, %d %b %Y %H:%M:%S GMT")
    ));
    response.push_str(&format!("Server: {server}\r\n"));
    response.push_str("\r\n");

    let mut out = response.into_bytes();
    out.extend_from_slice(&body);
    out
}

/// One-question DNS query: random transaction id, standard-query flags, the
/// domain wire-encoded as length-prefixed labels, a record-type code and the
/// IN class.
pub fn dns_query(rng: &mut impl Rng, domain: &str) -> Result<Vec<u8>, EncodingError> {
    let mut query = Vec::with_capacity(12 + domain.len() + 6);
    query.extend_from_slice(&rng.gen::<u16>().to_be_bytes()); // transaction id
    query.extend_from_slice(&[0x01, 0x00]); // standard query
    query.extend_from_slice(&[0x00, 0x01]); // QDCOUNT
    query.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00]); // AN/NS/ARCOUNT

    for label in domain.split('.') {
        if label.is_empty() || label.len() > 63 {
            return Err(EncodingError::InvalidDnsLabel(label.to_string()));
        }
        query.push(label.len() as u8);
        query.extend_from_slice(label.as_bytes());
    }
    query.push(0);

    let qtype = *DNS_QTYPES.choose(rng).unwrap();
    query.extend_from_slice(&qtype.to_be_bytes());
    query.extend_from_slice(&[0x00, 0x01]); // class IN
    Ok(query)
}

/// DNS response derived from a query: same transaction id, response flag
/// bits, one A answer with a random TTL and a synthetic 4-byte address.
pub fn dns_response(rng: &mut impl Rng, query: &[u8]) -> Vec<u8> {
    let mut response = Vec::with_capacity(query.len() + 16);
    response.extend_from_slice(&query[..2]);
    response.extend_from_slice(&[0x81, 0x80]); // standard response, no error
    response.extend_from_slice(&query[4..6]); // QDCOUNT
    response.extend_from_slice(&[0x00, 0x01]); // ANCOUNT
    response.extend_from_slice(&query[8..]); // remaining counts + question

    response.extend_from_slice(&[0xc0, 0x0c]); // pointer to the question name
    response.extend_from_slice(&[0x00, 0x01]); // type A
    response.extend_from_slice(&[0x00, 0x01]); // class IN
    response.extend_from_slice(&rng.gen_range(60..=3600u32).to_be_bytes()); // TTL
    response.extend_from_slice(&[0x00, 0x04]); // RDLENGTH
    for _ in 0..4 {
        response.push(rng.gen_range(1..=254));
    }
    response
}

/// Transaction id of an encoded DNS message.
pub fn dns_transaction_id(message: &[u8]) -> Option<u16> {
    Some(u16::from_be_bytes([*message.first()?, *message.get(1)?]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn test_dns_query_layout() {
        let mut rng = Pcg32::seed_from_u64(1);
        let query = dns_query(&mut rng, "ember.net").unwrap();
        assert_eq!(&query[2..4], &[0x01, 0x00]);
        assert_eq!(&query[4..6], &[0x00, 0x01]);
        // qname: 5"ember" 3"net" 0
        assert_eq!(query[12], 5);
        assert_eq!(&query[13..18], b"ember");
        assert_eq!(query[18], 3);
        assert_eq!(query[22], 0);
    }

    #[test]
    fn test_dns_response_matches_query() {
        let mut rng = Pcg32::seed_from_u64(7);
        let query = dns_query(&mut rng, "mesa.io").unwrap();
        let response = dns_response(&mut rng, &query);
        assert_eq!(dns_transaction_id(&query), dns_transaction_id(&response));
        assert_eq!(&response[2..4], &[0x81, 0x80]);
        // one answer record appended
        assert_eq!(&response[6..8], &[0x00, 0x01]);
        assert_eq!(response.len(), query.len() + 16);
    }

    #[test]
    fn test_dns_label_validation() {
        let mut rng = Pcg32::seed_from_u64(0);
        assert!(matches!(
            dns_query(&mut rng, "a..b"),
            Err(EncodingError::InvalidDnsLabel(_))
        ));
        let long = "x".repeat(64);
        assert!(dns_query(&mut rng, &format!("{long}.com")).is_err());
    }

    #[test]
    fn test_printable_bytes_are_printable() {
        let mut rng = Pcg32::seed_from_u64(3);
        let payload = printable_bytes(&mut rng, 200);
        assert_eq!(payload.len(), 200);
        assert!(payload.iter().all(|b| (32..=126).contains(b)));
    }

    #[test]
    fn test_http_request_shape() {
        let mut rng = Pcg32::seed_from_u64(11);
        for _ in 0..20 {
            let req = http_request(&mut rng);
            let text = String::from_utf8_lossy(&req);
            assert!(text.contains(" HTTP/1.1\r\n"));
            assert!(text.contains("Host: "));
            assert!(text.contains("\r\n\r\n"));
        }
    }
}
