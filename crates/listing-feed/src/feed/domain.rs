use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Filename used when the website configuration does not set `customXmlPath`.
pub const DEFAULT_FEED_FILENAME: &str = "vivareal.xml";

/// One listing as stored by the back-office catalog.
///
/// The catalog schema is loose: numeric columns may arrive as numbers or
/// numeric strings, text columns may hold numbers or `null`, and any of the
/// optional columns may be missing. Only `id` must be well-typed; the record
/// is validated when it is turned into a feed entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRecord {
    pub id: i64,
    #[serde(rename = "type", default, deserialize_with = "text_or_empty")]
    pub property_type: String,
    #[serde(default, deserialize_with = "lenient")]
    pub purpose: Option<Purpose>,
    #[serde(default, deserialize_with = "loose_status")]
    pub status: PropertyStatus,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub address: String,
    #[serde(default, deserialize_with = "optional_text")]
    pub neighborhood: Option<String>,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub city: String,
    #[serde(default, deserialize_with = "optional_text")]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub area: Option<LooseNumber>,
    #[serde(default)]
    pub bedrooms: Option<LooseNumber>,
    #[serde(default)]
    pub bathrooms: Option<LooseNumber>,
    #[serde(default)]
    pub suites: Option<LooseNumber>,
    #[serde(default)]
    pub parking_spots: Option<LooseNumber>,
    #[serde(default)]
    pub price: Option<LooseNumber>,
    #[serde(default)]
    pub description: Option<LooseText>,
    #[serde(default, deserialize_with = "text_list")]
    pub features: Option<Vec<String>>,
    #[serde(default, deserialize_with = "image_list")]
    pub images: Option<Vec<ImageRef>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Purpose {
    Sale,
    Rent,
    #[serde(other)]
    Other,
}

/// Listing status as recorded by agents. Unknown values are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PropertyStatus {
    Available,
    Sold,
    Rented,
    Other(String),
}

impl PropertyStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }

    /// Sold and rented listings are closed deals, gated by their own flag.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Sold | Self::Rented)
    }
}

impl Default for PropertyStatus {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl From<String> for PropertyStatus {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "available" => Self::Available,
            "sold" => Self::Sold,
            "rented" => Self::Rented,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for PropertyStatus {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<PropertyStatus> for String {
    fn from(value: PropertyStatus) -> Self {
        match value {
            PropertyStatus::Available => "available".to_string(),
            PropertyStatus::Sold => "sold".to_string(),
            PropertyStatus::Rented => "rented".to_string(),
            PropertyStatus::Other(raw) => raw,
        }
    }
}

/// Numeric column that may have been stored as a JSON number or as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LooseNumber {
    Number(serde_json::Number),
    Text(String),
    Other(Value),
}

impl LooseNumber {
    /// Finite numeric value, or `None` when the column does not hold a number.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            Self::Number(number) => number.as_f64(),
            Self::Text(raw) => raw.trim().parse::<f64>().ok(),
            Self::Other(_) => None,
        }?;
        value.is_finite().then_some(value)
    }
}

impl From<i64> for LooseNumber {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<f64> for LooseNumber {
    fn from(value: f64) -> Self {
        serde_json::Number::from_f64(value)
            .map(Self::Number)
            .unwrap_or(Self::Other(Value::Null))
    }
}

impl From<&str> for LooseNumber {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Required text column that may have been stored with the wrong JSON type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LooseText {
    Text(String),
    Other(Value),
}

impl LooseText {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Other(_) => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Other(Value::Null))
    }
}

impl From<String> for LooseText {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for LooseText {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Image entry. Legacy rows store a bare URL string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageRef {
    Url(String),
    Detailed {
        url: String,
        #[serde(default, rename = "isFeatured")]
        is_featured: Option<bool>,
    },
}

impl ImageRef {
    pub fn url(&self) -> &str {
        match self {
            Self::Url(url) => url,
            Self::Detailed { url, .. } => url,
        }
    }
}

/// Feed section of the website configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedConfig {
    #[serde(default)]
    pub viva_real_username: Option<String>,
    #[serde(default)]
    pub include_inactive_properties: bool,
    #[serde(default)]
    pub include_sold_properties: bool,
    #[serde(default)]
    pub xml_automatic_update: bool,
    #[serde(default)]
    pub custom_xml_path: Option<String>,
    #[serde(default)]
    pub last_update: Option<DateTime<Utc>>,
}

impl FeedConfig {
    /// Relative publish path, falling back to [`DEFAULT_FEED_FILENAME`].
    pub fn publish_path(&self) -> &str {
        self.custom_xml_path
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .unwrap_or(DEFAULT_FEED_FILENAME)
    }
}

/// Scalars read as text; numbers and booleans keep their JSON spelling.
fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_text(Value::deserialize(deserializer)?))
}

fn text_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_text(deserializer)?.unwrap_or_default())
}

fn loose_status<'de, D>(deserializer: D) -> Result<PropertyStatus, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_text(deserializer)?
        .map(PropertyStatus::from)
        .unwrap_or_default())
}

/// Drops a value of the wrong shape instead of failing the record.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    Ok(serde_json::from_value(Value::deserialize(deserializer)?).ok())
}

fn text_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(Some(items.into_iter().filter_map(scalar_text).collect())),
        _ => Ok(None),
    }
}

fn image_list<'de, D>(deserializer: D) -> Result<Option<Vec<ImageRef>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(Some(
            items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
        )),
        _ => Ok(None),
    }
}
