use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{errors::DeliveryError, identity::ChatIdentity};

/// The only parse mode this crate renders for.
pub const PARSE_MODE: &str = "MarkdownV2";

/// Body of a `sendMessage` call.
#[derive(Clone, Debug, Serialize)]
pub struct SendMessage<'a> {
    pub chat_id: &'a ChatIdentity,
    pub text: &'a str,
    pub parse_mode: &'static str,
    pub disable_notification: bool,
}

impl<'a> SendMessage<'a> {
    pub fn new(chat_id: &'a ChatIdentity, text: &'a str, mute: bool) -> Self {
        Self {
            chat_id,
            text,
            parse_mode: PARSE_MODE,
            disable_notification: mute,
        }
    }

    /// Serialize to the JSON request body.
    pub fn encode(&self) -> Result<Vec<u8>, DeliveryError> {
        serde_json::to_vec(self).map_err(DeliveryError::Encoding)
    }
}

/// Bot API acknowledgment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApiResult {
    Ok,
    Error { code: i64, message: String },
}

impl ApiResult {
    pub fn decode(body: &[u8]) -> Result<Self, DeliveryError> {
        serde_json::from_slice(body).map_err(|e| DeliveryError::Protocol(e.to_string()))
    }

    /// Successful acknowledgments produce nothing; rejections become errors.
    pub fn into_result(self) -> Result<(), DeliveryError> {
        match self {
            ApiResult::Ok => Ok(()),
            ApiResult::Error { code, message } => Err(DeliveryError::Api { code, message }),
        }
    }
}

// Extra fields are kept loosely typed so that a successful response is
// accepted no matter what else it carries.
#[derive(Deserialize)]
struct RawResponse {
    ok: bool,
    #[serde(default)]
    error_code: Option<Value>,
    #[serde(default)]
    description: Option<Value>,
}

impl RawResponse {
    fn into_api_result(self) -> Result<ApiResult, String> {
        if self.ok {
            return Ok(ApiResult::Ok);
        }
        let code = self
            .error_code
            .as_ref()
            .and_then(Value::as_i64)
            .ok_or_else(|| "missing or invalid field `error_code`".to_string())?;
        let message = match self.description {
            Some(Value::String(s)) => s,
            _ => return Err("missing or invalid field `description`".to_string()),
        };
        Ok(ApiResult::Error { code, message })
    }
}

impl<'de> Deserialize<'de> for ApiResult {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawResponse::deserialize(deserializer)?
            .into_api_result()
            .map_err(serde::de::Error::custom)
    }
}
