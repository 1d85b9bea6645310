use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Integer(i64),
    Float(f64),
}

impl From<StringOrNumber> for String {
    fn from(value: StringOrNumber) -> Self {
        match value {
            StringOrNumber::String(s) => s,
            StringOrNumber::Integer(n) => n.to_string(),
            StringOrNumber::Float(n) => n.to_string(),
        }
    }
}

/// Accepts an id the provider may send either as a JSON string or a number.
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    StringOrNumber::deserialize(deserializer).map(String::from)
}

pub fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<StringOrNumber>::deserialize(deserializer).map(|v| v.map(String::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(deserialize_with = "string_or_number")]
        id: String,
        #[serde(default, deserialize_with = "opt_string_or_number")]
        issuer: Option<String>,
    }

    #[test]
    fn accepts_numeric_and_string_ids() {
        let p: Probe = serde_json::from_str(r#"{"id": 123456789, "issuer": "25"}"#).unwrap();
        assert_eq!(p.id, "123456789");
        assert_eq!(p.issuer.as_deref(), Some("25"));

        let p: Probe = serde_json::from_str(r#"{"id": "abc", "issuer": 25}"#).unwrap();
        assert_eq!(p.id, "abc");
        assert_eq!(p.issuer.as_deref(), Some("25"));

        let p: Probe = serde_json::from_str(r#"{"id": "abc", "issuer": null}"#).unwrap();
        assert_eq!(p.issuer, None);
    }
}
