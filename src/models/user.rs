use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::utils::value::value_to_string;

/// The profile of the signed-in user, as returned by the login or profile endpoint.
///
/// Unknown fields are kept in `extra` so applications can carry their own
/// extension data through the session without a custom type.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(default, alias = "display_name", alias = "name", alias = "username")]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl UserProfile {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        UserProfile {
            id: id.into(),
            display_name: display_name.into(),
            ..Default::default()
        }
    }
}

/// Servers disagree on whether ids are numbers or strings; we always keep a string.
fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Err(serde::de::Error::custom("user id must not be null")),
        other => Ok(value_to_string(other)),
    }
}

/// A profile response is either the bare profile or `{ "user": { ... } }`.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum ProfileEnvelope {
    Wrapped {
        #[serde(alias = "profile")]
        user: UserProfile,
    },
    Bare(UserProfile),
}

impl From<ProfileEnvelope> for UserProfile {
    fn from(envelope: ProfileEnvelope) -> Self {
        match envelope {
            ProfileEnvelope::Wrapped { user } => user,
            ProfileEnvelope::Bare(user) => user,
        }
    }
}
