//! Value objects decoded from chat service payloads.
//!
//! Decoding is deliberately lenient: missing or mistyped fields are treated as
//! absent, and list items that cannot be read are skipped with a warning.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::DispatchError;

/// A product suggested by the assistant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Product {
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub price: String,
    #[serde(alias = "first_image", deserialize_with = "lenient_opt_string")]
    pub image: Option<String>,
    #[serde(deserialize_with = "lenient_string_list")]
    pub features: Vec<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub link: String,
}

/// An order belonging to the signed-in customer.
///
/// The service has emitted more than one schema for orders, so every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Order {
    #[serde(deserialize_with = "lenient_opt_string")]
    pub order_id: Option<String>,
    #[serde(
        rename = "itemname",
        alias = "product_name",
        alias = "item_name",
        deserialize_with = "lenient_opt_string"
    )]
    pub item_name: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub status: Option<String>,
    #[serde(rename = "order_date", deserialize_with = "lenient_opt_string")]
    pub date: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub invoice_no: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub invoice_url: Option<String>,
    #[serde(rename = "product_image", alias = "image", deserialize_with = "lenient_opt_string")]
    pub image: Option<String>,
}

impl Order {
    pub fn display_item_name(&self) -> &str {
        self.item_name.as_deref().unwrap_or("Product")
    }

    pub fn display_order_id(&self) -> &str {
        self.order_id.as_deref().unwrap_or("N/A")
    }

    pub fn display_status(&self) -> &str {
        self.status.as_deref().unwrap_or("Pending")
    }
}

impl Product {
    /// Product name cut down to at most `max_words` words, with a trailing ellipsis when cut.
    pub fn short_name(&self, max_words: usize) -> String {
        let words: Vec<&str> = self.name.split_whitespace().collect();
        if words.len() > max_words {
            format!("{}...", words[..max_words].join(" "))
        } else {
            self.name.clone()
        }
    }
}

/// Top-level status of a chat reply. `status: "error"` never reaches this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyStatus {
    Success,
    Other(String),
}

/// Content of a reply's `data` object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplyData {
    pub answer: Option<String>,
    pub orders: Vec<Order>,
    pub products: Vec<Product>,
    pub comparison: Vec<Value>,
    pub end: Option<String>,
}

/// Decoded response of `POST /chat`
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub status: ReplyStatus,
    pub data: Option<ReplyData>,
}

impl ChatReply {
    /// Interpret a decoded response body.
    ///
    /// Accepts both the bare `{status, data}` shape and the `{"response": {...}}` envelope.
    /// A payload reporting `status: "error"` becomes [`DispatchError::Service`].
    pub fn from_value(value: Value) -> Result<Self, DispatchError> {
        let value = unwrap_envelope(value);
        let Value::Object(mut body) = value else {
            return Err(DispatchError::Malformed(
                "expected a JSON object in chat response".to_string(),
            ));
        };

        let data = match body.remove("data") {
            Some(Value::Object(map)) => Some(ReplyData::from_map(map)),
            _ => None,
        };

        let status = body
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        match status.as_str() {
            "success" => Ok(Self { status: ReplyStatus::Success, data }),
            "error" => Err(DispatchError::Service {
                answer: data.and_then(|d| d.answer),
            }),
            _ => Ok(Self { status: ReplyStatus::Other(status), data }),
        }
    }

    /// Answer text carried in `data`, if any
    pub fn answer(&self) -> Option<&str> {
        self.data.as_ref().and_then(|d| d.answer.as_deref())
    }
}

impl ReplyData {
    fn from_map(mut map: serde_json::Map<String, Value>) -> Self {
        Self {
            answer: map.remove("answer").and_then(non_empty_text),
            orders: decode_list(map.remove("orders"), "order"),
            products: decode_list(map.remove("products"), "product"),
            comparison: match map.remove("comparison") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            end: map.remove("end").and_then(non_empty_text),
        }
    }
}

/// Result of an OTP request or verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpReply {
    pub accepted: bool,
    pub message: Option<String>,
}

impl OtpReply {
    /// The auth endpoints report success as `error: "0"`; failures may instead use the
    /// chat-style `{status: "error", data: {answer}}` shape.
    pub fn from_value(value: Value) -> Result<Self, DispatchError> {
        let value = unwrap_envelope(value);
        let Value::Object(body) = value else {
            return Err(DispatchError::Malformed(
                "expected a JSON object in auth response".to_string(),
            ));
        };

        let accepted = match body.get("error") {
            Some(Value::String(code)) => code == "0",
            Some(Value::Number(code)) => code.as_i64() == Some(0),
            Some(Value::Bool(flag)) => !flag,
            _ => false,
        } && body.get("status").and_then(Value::as_str) != Some("error");

        let data = body.get("data");
        let message = body
            .get("message")
            .cloned()
            .and_then(non_empty_text)
            .or_else(|| data.and_then(|d| d.get("answer")).cloned().and_then(non_empty_text))
            .or_else(|| data.and_then(|d| d.get("message")).cloned().and_then(non_empty_text));

        Ok(Self { accepted, message })
    }
}

fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.get("response").is_some_and(is_truthy) => {
            map.remove("response").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64() != Some(0.0),
        _ => true,
    }
}

fn non_empty_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        _ => None,
    }
}

fn decode_list<T: for<'de> Deserialize<'de>>(value: Option<Value>, kind: &str) -> Vec<T> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<T>(item) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::warn!(kind, error = %e, "skipping unreadable item in chat reply");
                None
            }
        })
        .collect()
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(scalar_to_string(Value::deserialize(deserializer)?).unwrap_or_default())
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(scalar_to_string(Value::deserialize(deserializer)?).filter(|s| !s.is_empty()))
}

fn lenient_string_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items.into_iter().filter_map(scalar_to_string).collect(),
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_and_bare_shapes_decode_alike() {
        let bare = json!({"status": "success", "data": {"answer": "Hi"}});
        let wrapped = json!({"response": {"status": "success", "data": {"answer": "Hi"}}});

        let a = ChatReply::from_value(bare).unwrap();
        let b = ChatReply::from_value(wrapped).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.answer(), Some("Hi"));
    }

    #[test]
    fn error_status_becomes_service_error() {
        let err = ChatReply::from_value(json!({"status": "error"})).unwrap_err();
        assert_eq!(err, DispatchError::Service { answer: None });

        let err = ChatReply::from_value(json!({
            "status": "error",
            "data": {"answer": "Sorry, I couldn't parse the response."}
        }))
        .unwrap_err();
        assert_eq!(
            err,
            DispatchError::Service { answer: Some("Sorry, I couldn't parse the response.".into()) }
        );
    }

    #[test]
    fn non_object_body_is_malformed() {
        assert!(matches!(
            ChatReply::from_value(json!(["not", "an", "object"])),
            Err(DispatchError::Malformed(_))
        ));
    }

    #[test]
    fn unknown_status_is_kept_as_other() {
        let reply = ChatReply::from_value(json!({"status": "pending"})).unwrap();
        assert_eq!(reply.status, ReplyStatus::Other("pending".into()));
        assert!(reply.data.is_none());
    }

    #[test]
    fn order_accepts_either_item_name_field() {
        let reply = ChatReply::from_value(json!({
            "status": "success",
            "data": {
                "orders": [
                    {"itemname": "LED TV", "order_id": 1201, "status": "Delivered"},
                    {"product_name": "Washer", "order_id": "A-7"},
                    "garbage"
                ]
            }
        }))
        .unwrap();

        let orders = reply.data.unwrap().orders;
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].display_item_name(), "LED TV");
        assert_eq!(orders[0].display_order_id(), "1201");
        assert_eq!(orders[1].display_item_name(), "Washer");
        assert_eq!(orders[1].display_status(), "Pending");
    }

    #[test]
    fn product_fields_are_lenient() {
        let product: Product = serde_json::from_value(json!({
            "name": "Split AC",
            "price": 32990,
            "first_image": "https://img/ac.png",
            "features": ["Inverter", 5, null],
            "link": "https://shop/ac"
        }))
        .unwrap();

        assert_eq!(product.price, "32990");
        assert_eq!(product.image.as_deref(), Some("https://img/ac.png"));
        assert_eq!(product.features, vec!["Inverter".to_string(), "5".to_string()]);
    }

    #[test]
    fn long_product_names_are_shortened() {
        let product = Product {
            name: "Samsung 183 L 4 Star Direct Cool Single Door Refrigerator".into(),
            ..Default::default()
        };
        assert_eq!(product.short_name(6), "Samsung 183 L 4 Star Direct...");

        let short = Product { name: "Mixer Grinder".into(), ..Default::default() };
        assert_eq!(short.short_name(6), "Mixer Grinder");
    }

    #[test]
    fn empty_answer_is_absent() {
        let reply = ChatReply::from_value(json!({
            "status": "success",
            "data": {"answer": "", "end": "  "}
        }))
        .unwrap();
        let data = reply.data.unwrap();
        assert!(data.answer.is_none());
        assert!(data.end.is_none());
    }

    #[test]
    fn otp_reply_reads_error_code_and_message() {
        let ok = OtpReply::from_value(json!({"error": "0", "message": "OTP sent"})).unwrap();
        assert!(ok.accepted);
        assert_eq!(ok.message.as_deref(), Some("OTP sent"));

        let failed = OtpReply::from_value(json!({
            "status": "error",
            "data": {"answer": "We're currently unable to reach our OTP service."}
        }))
        .unwrap();
        assert!(!failed.accepted);
        assert_eq!(
            failed.message.as_deref(),
            Some("We're currently unable to reach our OTP service.")
        );
    }
}
