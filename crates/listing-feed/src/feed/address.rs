//! Best-effort split of the free-text address columns.
//!
//! Agents type the street as `Rua Tal, 123` and the city as `Cidade-UF`.
//! Both splits follow that data-entry convention only; nothing here is a
//! postal lookup and values outside the convention pass through unchanged.

use regex::Regex;
use std::sync::OnceLock;

static HOUSE_NUMBER: OnceLock<Regex> = OnceLock::new();

fn house_number_pattern() -> &'static Regex {
    HOUSE_NUMBER.get_or_init(|| {
        Regex::new(r"^(?P<street>[^,]*),\s*(?P<number>\d+)").expect("house number pattern compiles")
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostalAddress {
    pub street: String,
    pub house_number: String,
    pub city: String,
    pub state_code: String,
}

/// Splits `Rua A, 123` into (`Rua A`, `123`). Without a comma followed by a
/// digit run the address is returned verbatim with an empty number.
pub fn split_street(address: &str) -> (String, String) {
    match house_number_pattern().captures(address) {
        Some(captures) => (
            captures["street"].trim().to_string(),
            captures["number"].to_string(),
        ),
        None => (address.to_string(), String::new()),
    }
}

/// Splits `São Paulo-SP` on the first hyphen. Without a hyphen, or with
/// nothing after it, the state falls back to `fallback_state`.
pub fn split_city(city: &str, fallback_state: &str) -> (String, String) {
    match city.split_once('-') {
        Some((name, state)) => {
            let state = state.trim();
            let state = if state.is_empty() {
                fallback_state
            } else {
                state
            };
            (name.trim().to_string(), state.to_string())
        }
        None => (city.to_string(), fallback_state.to_string()),
    }
}

pub fn decompose(address: &str, city: &str, fallback_state: &str) -> PostalAddress {
    let (street, house_number) = split_street(address);
    let (city, state_code) = split_city(city, fallback_state);
    PostalAddress {
        street,
        house_number,
        city,
        state_code,
    }
}
