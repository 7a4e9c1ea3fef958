use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The user a feature is being evaluated for.
///
/// All of the attribute bags are opaque to the engine; conditions look values
/// up in them by key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
    /// Stable identifier of the user, used for bucketing and whitelists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// The group the user belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_group: Option<String>,

    /// Device attributes, for example `type`, `os` or `browser`.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub device: Map<String, Value>,

    /// Location attributes, for example `country`, `region` or `city`.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub location: Map<String, Value>,

    /// Free-form attributes.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub custom: Map<String, Value>,
}

impl UserContext {
    /// Creates an empty (anonymous) context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the user id.
    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Sets the user group.
    #[must_use]
    pub fn with_user_group(mut self, group: impl Into<String>) -> Self {
        self.user_group = Some(group.into());
        self
    }

    /// Adds a device attribute.
    #[must_use]
    pub fn with_device(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.device.insert(key.into(), value.into());
        self
    }

    /// Adds a location attribute.
    #[must_use]
    pub fn with_location(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.location.insert(key.into(), value.into());
        self
    }

    /// Adds a custom attribute.
    #[must_use]
    pub fn with_custom(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }

    /// The user id, if any.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// The id used for bucketing: the user id, or `anonymous` when there is
    /// none.
    #[must_use]
    pub fn bucketing_id<'a>(&'a self, anonymous: &'a str) -> &'a str {
        self.user_id().unwrap_or(anonymous)
    }
}
