use serde_json::Value;
use time::OffsetDateTime;

/// Client-submitted user record before any checks. Each slot keeps the raw
/// JSON value so the validator can tell "wrong type" from "wrong content".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPayload {
    pub username: Option<Value>,
    pub hashed_password: Option<Value>,
    pub email: Option<Value>,
    pub phone_number: Option<Value>,
    pub first_name: Option<Value>,
    pub last_name: Option<Value>,
    pub join_date: Option<Value>,
    pub is_supplier: Option<Value>,
}

impl UserPayload {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl From<Value> for UserPayload {
    fn from(body: Value) -> Self {
        let Value::Object(mut fields) = body else {
            return Self::default();
        };
        Self {
            username: fields.remove("username"),
            hashed_password: fields.remove("hashedPassword"),
            email: fields.remove("email"),
            phone_number: fields.remove("phoneNumber"),
            first_name: fields.remove("firstName"),
            last_name: fields.remove("lastName"),
            join_date: fields.remove("joinDate"),
            is_supplier: fields.remove("isSupplier"),
        }
    }
}

/// A fully validated registration.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub username: String,
    pub hashed_password: String,
    pub email: String,
    pub phone_number: String,
    pub first_name: String,
    pub last_name: String,
    pub join_date: OffsetDateTime,
    pub is_supplier: bool,
}

/// Validated partial update; `None` leaves the stored column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserChanges {
    pub username: Option<String>,
    pub hashed_password: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub join_date: Option<OffsetDateTime>,
    pub is_supplier: Option<bool>,
}
