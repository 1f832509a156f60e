// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Test data generators for abuse simulation.

use std::net::{IpAddr, Ipv4Addr};

/// Generate a pool of source addresses for testing.
pub fn generate_ips(count: usize) -> Vec<IpAddr> {
    (0..count)
        .map(|i| {
            // Use 10.x.x.x private range
            let a = ((i >> 16) & 0xFF) as u8;
            let b = ((i >> 8) & 0xFF) as u8;
            let c = (i & 0xFF) as u8;
            IpAddr::V4(Ipv4Addr::new(10, a, b, c))
        })
        .collect()
}

/// Plausible user agents.
pub fn generate_user_agents(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("Mozilla/5.0 (X11; Linux x86_64) tip-client/{}.{}", i / 10, i % 10))
        .collect()
}

/// Clean tips with no PII.
pub fn generate_clean_tips(count: usize) -> Vec<String> {
    const PLACES: [&str; 5] = ["market", "station", "harbour", "library", "stadium"];
    const EVENTS: [&str; 5] = [
        "water leak near the entrance",
        "broken streetlight by the gate",
        "abandoned bicycle blocking the path",
        "graffiti on the north wall",
        "flooded underpass after the storm",
    ];
    (0..count)
        .map(|i| {
            format!(
                "Report {i}: {} at the {}",
                EVENTS[i % EVENTS.len()],
                PLACES[(i / EVENTS.len()) % PLACES.len()]
            )
        })
        .collect()
}

/// A tip carrying one piece of PII, with the secret that must not be
/// published and the token expected in its place.
#[derive(Debug, Clone)]
pub struct PiiSample {
    pub content: String,
    pub secret: &'static str,
    pub token: &'static str,
}

pub fn generate_pii_tips() -> Vec<PiiSample> {
    let samples: [(&str, &str, &str); 9] = [
        ("Email the organiser at jane.doe@example.org", "jane.doe@example.org", "[EMAIL_REDACTED]"),
        ("Call him on 555-867-5309 tonight", "555-867-5309", "[PHONE_REDACTED]"),
        ("Foreign number +44 20 7946 0958 keeps calling", "+44 20 7946 0958", "[PHONE_REDACTED]"),
        ("His SSN is 078-05-1120 apparently", "078-05-1120", "[SSN_REDACTED]"),
        ("Card 4111 1111 1111 1111 was skimmed", "4111 1111 1111 1111", "[CARD_REDACTED]"),
        ("The server at 203.0.113.42 is leaking", "203.0.113.42", "[IP_REDACTED]"),
        ("Photos are on https://files.example.net/dump", "https://files.example.net/dump", "[URL_REDACTED]"),
        ("Meet at 221 Baker Street after dark", "221 Baker Street", "[ADDRESS_REDACTED]"),
        ("Parcels go to PO Box 4471", "PO Box 4471", "[ADDRESS_REDACTED]"),
    ];
    samples
        .into_iter()
        .map(|(content, secret, token)| PiiSample {
            content: content.to_string(),
            secret,
            token,
        })
        .collect()
}

/// Payloads that should fail structural validation.
pub fn generate_spam_payloads() -> Vec<String> {
    vec![
        String::new(),
        "    \n\t  ".to_string(),
        "x".repeat(1001),
        "deals http://a.example http://b.example http://c.example http://d.example".to_string(),
        "buy buy buy buy buy cheap pills".to_string(),
        "WIN WIN win Win WIN prize now".to_string(),
    ]
}

/// Strings that look like tokens but were not minted by the service.
pub fn generate_forged_tokens() -> Vec<String> {
    vec![
        "not-base64-at-all!!".to_string(),
        "AAAA".to_string(),
        "A".repeat(120),
        "dXNlcl9mb3JnZWQ".to_string(),
        // Right length, wrong key
        "Q".repeat(64),
    ]
}
