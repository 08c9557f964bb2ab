//! Users and their roles

use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fields of the user record that a profile update is never allowed to change
const IMMUTABLE_FIELDS: [&str; 2] = ["id", "role"];

/// Portal role
///
/// The set is closed, but the remote service is free to send a role the portal doesn't know yet.
/// Such a role is kept as `Other` and is treated as a student when it comes to landing routes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    Teacher,
    Student,
    Intern,
    Job,
    Other(String),
}

impl Role {
    /// Wire name of the role
    pub fn as_str(&self) -> &str {
        match self {
            Self::Admin => "admin",
            Self::Teacher => "teacher",
            Self::Student => "student",
            Self::Intern => "intern",
            Self::Job => "job",
            Self::Other(role) => role,
        }
    }
}

impl From<&str> for Role {
    fn from(role: &str) -> Self {
        match role.trim().to_ascii_lowercase().as_str() {
            "admin" => Self::Admin,
            "teacher" => Self::Teacher,
            "student" => Self::Student,
            "intern" => Self::Intern,
            "job" => Self::Job,
            _ => Self::Other(role.to_owned()),
        }
    }
}

impl From<String> for Role {
    fn from(role: String) -> Self {
        role.as_str().into()
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Other(role) => role,
            role => role.as_str().to_owned(),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User identifier as assigned by the authentication service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Number(i64),
    Text(String),
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

/// User profile record
///
/// Only `id` and `role` matter to the session logic. Every other field is carried along
/// untouched for the views to display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Remaining display fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    /// Helper to create an user with no display fields
    pub fn new(id: UserId, role: Role) -> Self {
        Self {
            id,
            role,
            name: None,
            email: None,
            extra: Map::new(),
        }
    }

    /// Merges partial profile fields into this user.
    ///
    /// `id` and `role` present in the update are ignored.
    pub fn merge(&mut self, update: &ProfileUpdate) -> Result<(), serde_json::Error> {
        let Value::Object(mut fields) = serde_json::to_value(&*self)? else {
            return Err(serde_json::Error::custom("user is not serialized as an object"));
        };

        for (key, value) in &update.0 {
            if !IMMUTABLE_FIELDS.contains(&key.as_str()) {
                fields.insert(key.clone(), value.clone());
            }
        }

        *self = serde_json::from_value(Value::Object(fields))?;
        Ok(())
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self::Number(id)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_owned())
    }
}

/// Partial user fields sent on profile update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileUpdate(Map<String, Value>);

impl ProfileUpdate {
    /// Adds a field to the update
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Updated fields
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for ProfileUpdate {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

impl TryFrom<&User> for ProfileUpdate {
    type Error = serde_json::Error;

    fn try_from(user: &User) -> Result<Self, Self::Error> {
        match serde_json::to_value(user)? {
            Value::Object(fields) => Ok(Self(fields)),
            _ => Err(serde_json::Error::custom("user is not serialized as an object")),
        }
    }
}
