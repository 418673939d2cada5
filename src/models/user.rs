use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub user_type: UserType,
    pub phone_number: String,
    pub years_of_experience: Option<i64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Client,
    Owner,
    Admin,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Client => "client",
            UserType::Owner => "owner",
            UserType::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "owner" => UserType::Owner,
            "admin" => UserType::Admin,
            _ => UserType::Client,
        }
    }
}
