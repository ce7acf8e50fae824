use serde_json::Value;

/// Paths tried, in order, for the intent id.
const ID_PATHS: [&[&str]; 4] = [
    &["id"],
    &["payment_intent_id"],
    &["paymentIntent", "id"],
    &["data", "id"],
];

const STATUS_PATHS: [&[&str]; 2] = [&["status"], &["data", "status"]];

/// Known locations of the hosted payment page. The whole document is
/// searched only when none of these is present.
const REDIRECT_PATHS: [&[&str]; 3] = [
    &["redirect_url"],
    &["hosted_page_url"],
    &["next_action", "redirect_url"],
];

/// A provider-side payment intent, reduced to the fields the booking flow
/// needs. The full response is kept in `raw`.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentIntent {
    pub id: Option<String>,
    pub status: Option<String>,
    pub redirect_url: Option<String>,
    pub raw: Value,
}

impl PaymentIntent {
    pub fn from_value(raw: Value) -> Self {
        let id = first_string(&raw, &ID_PATHS);
        let status = first_string(&raw, &STATUS_PATHS);
        let redirect_url = first_string(&raw, &REDIRECT_PATHS).or_else(|| find_first_url(&raw));
        Self { id, status, redirect_url, raw }
    }
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |v, key| v.get(key))
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_string(value: &Value, paths: &[&[&str]]) -> Option<String> {
    paths
        .iter()
        .filter_map(|path| lookup(value, path))
        .find_map(as_text)
}

/// Depth-first search for the first string that looks like an absolute URL.
pub fn find_first_url(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if s.starts_with("http://") || s.starts_with("https://") => {
            Some(s.clone())
        }
        Value::Object(map) => map.values().find_map(find_first_url),
        Value::Array(items) => items.iter().find_map(find_first_url),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn top_level_fields() {
        let pi = PaymentIntent::from_value(json!({
            "id": "pi_1",
            "status": "requires_payment_instrument",
            "redirect_url": "https://pay.ziina.com/pi_1"
        }));
        assert_eq!(pi.id.as_deref(), Some("pi_1"));
        assert_eq!(pi.status.as_deref(), Some("requires_payment_instrument"));
        assert_eq!(pi.redirect_url.as_deref(), Some("https://pay.ziina.com/pi_1"));
    }

    #[test]
    fn nested_fields() {
        let pi = PaymentIntent::from_value(json!({
            "data": { "id": "pi_2", "status": "completed" },
            "next_action": { "redirect_url": "https://pay.ziina.com/next" }
        }));
        assert_eq!(pi.id.as_deref(), Some("pi_2"));
        assert_eq!(pi.status.as_deref(), Some("completed"));
        assert_eq!(pi.redirect_url.as_deref(), Some("https://pay.ziina.com/next"));
    }

    #[test]
    fn blank_id_falls_through_to_next_path() {
        let pi = PaymentIntent::from_value(json!({
            "id": "",
            "paymentIntent": { "id": "pi_3" }
        }));
        assert_eq!(pi.id.as_deref(), Some("pi_3"));
    }

    #[test]
    fn known_field_wins_over_tree_search() {
        let pi = PaymentIntent::from_value(json!({
            "links": ["https://example.com/docs"],
            "hosted_page_url": "https://pay.ziina.com/hosted"
        }));
        assert_eq!(pi.redirect_url.as_deref(), Some("https://pay.ziina.com/hosted"));
    }

    #[test]
    fn tree_search_finds_url_in_arrays() {
        let pi = PaymentIntent::from_value(json!({
            "id": "pi_4",
            "actions": [{ "kind": "note", "text": "ftp://nope" }, { "href": "https://pay.ziina.com/deep" }]
        }));
        assert_eq!(pi.redirect_url.as_deref(), Some("https://pay.ziina.com/deep"));
    }

    #[test]
    fn no_url_anywhere() {
        let pi = PaymentIntent::from_value(json!({ "id": "pi_5", "status": "pending" }));
        assert_eq!(pi.redirect_url, None);
    }
}
