use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::CoreError;

/// Lead lifecycle. Any transition between these values is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    #[default]
    New,
    Contacted,
    Qualified,
    Sold,
    Lost,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 5] = [
        LeadStatus::New,
        LeadStatus::Contacted,
        LeadStatus::Qualified,
        LeadStatus::Sold,
        LeadStatus::Lost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Qualified => "qualified",
            LeadStatus::Sold => "sold",
            LeadStatus::Lost => "lost",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|s| s.as_str()).collect()
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::ValidationError(format!("invalid status '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContactMethod {
    #[default]
    Whatsapp,
    Phone,
    Email,
}

impl ContactMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactMethod::Whatsapp => "whatsapp",
            ContactMethod::Phone => "phone",
            ContactMethod::Email => "email",
        }
    }
}

impl FromStr for ContactMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "whatsapp" => Ok(ContactMethod::Whatsapp),
            "phone" => Ok(ContactMethod::Phone),
            "email" => Ok(ContactMethod::Email),
            other => Err(CoreError::ValidationError(format!(
                "invalid contact method '{}'",
                other
            ))),
        }
    }
}

pub const DEFAULT_SOURCE: &str = "chatbot";

/// A captured prospect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub preferred_body_type: Option<String>,
    pub preferred_brand: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub preferred_color: Option<String>,
    pub max_mileage: Option<f64>,
    pub contact_method: ContactMethod,
    pub notes: Option<String>,
    pub source: String,
    pub status: LeadStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Upsert payload keyed by phone. `None` fields keep whatever is stored; on insert
/// `contact_method` and `source` fall back to their defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientUpsert {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub preferred_body_type: Option<String>,
    pub preferred_brand: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub preferred_color: Option<String>,
    pub max_mileage: Option<f64>,
    pub contact_method: Option<ContactMethod>,
    pub notes: Option<String>,
    pub source: Option<String>,
}

impl ClientUpsert {
    /// Builds the client row that an insert of this payload produces.
    pub fn into_new_client(self, id: i64, now: DateTime<Utc>) -> Client {
        Client {
            id,
            name: self.name,
            phone: self.phone,
            email: self.email,
            preferred_body_type: self.preferred_body_type,
            preferred_brand: self.preferred_brand,
            min_price: self.min_price,
            max_price: self.max_price,
            preferred_color: self.preferred_color,
            max_mileage: self.max_mileage,
            contact_method: self.contact_method.unwrap_or_default(),
            notes: self.notes,
            source: self.source.unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            status: LeadStatus::New,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrites `client` with every field this payload provides.
    pub fn apply_to(self, client: &mut Client, now: DateTime<Utc>) {
        client.name = self.name;
        overwrite(&mut client.email, self.email);
        overwrite(&mut client.preferred_body_type, self.preferred_body_type);
        overwrite(&mut client.preferred_brand, self.preferred_brand);
        overwrite(&mut client.min_price, self.min_price);
        overwrite(&mut client.max_price, self.max_price);
        overwrite(&mut client.preferred_color, self.preferred_color);
        overwrite(&mut client.max_mileage, self.max_mileage);
        overwrite(&mut client.notes, self.notes);
        if let Some(method) = self.contact_method {
            client.contact_method = method;
        }
        if let Some(source) = self.source {
            client.source = source;
        }
        client.updated_at = now;
    }
}

fn overwrite<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

/// Listing filters. `None` means no filter.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientQuery {
    pub status: Option<LeadStatus>,
    pub source: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl ClientQuery {
    pub const DEFAULT_LIMIT: i64 = 20;
    pub const MAX_LIMIT: i64 = 100;

    pub fn new(status: Option<LeadStatus>, source: Option<String>, limit: Option<i64>, offset: Option<i64>) -> Self {
        Self {
            status,
            source,
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT),
            offset: offset.unwrap_or(0).max(0),
        }
    }
}

impl Default for ClientQuery {
    fn default() -> Self {
        Self::new(None, None, None, None)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub pages: i64,
}

impl Pagination {
    pub fn new(total: i64, limit: i64, offset: i64) -> Self {
        let pages = if limit > 0 { (total + limit - 1) / limit } else { 0 };
        Self { total, limit, offset, pages }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientPage {
    pub clients: Vec<Client>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upsert(name: &str) -> ClientUpsert {
        ClientUpsert {
            name: name.into(),
            phone: "5512345678".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("sold".parse::<LeadStatus>().unwrap(), LeadStatus::Sold);
        assert!("archived".parse::<LeadStatus>().is_err());
        assert_eq!(LeadStatus::names(), vec!["new", "contacted", "qualified", "sold", "lost"]);
    }

    #[test]
    fn test_insert_applies_defaults() {
        let client = upsert("Ana").into_new_client(1, Utc::now());
        assert_eq!(client.contact_method, ContactMethod::Whatsapp);
        assert_eq!(client.source, "chatbot");
        assert_eq!(client.status, LeadStatus::New);
    }

    #[test]
    fn test_update_keeps_unspecified_fields() {
        let now = Utc::now();
        let mut first = upsert("Ana");
        first.email = Some("ana@example.com".into());
        first.preferred_brand = Some("mazda".into());
        first.source = Some("website".into());
        let mut client = first.into_new_client(1, now);

        let mut second = upsert("Ana María");
        second.preferred_brand = Some("kia".into());
        second.apply_to(&mut client, now);

        assert_eq!(client.name, "Ana María");
        assert_eq!(client.email.as_deref(), Some("ana@example.com"));
        assert_eq!(client.preferred_brand.as_deref(), Some("kia"));
        assert_eq!(client.source, "website");
    }

    #[test]
    fn test_query_clamps_limit() {
        assert_eq!(ClientQuery::new(None, None, Some(500), None).limit, 100);
        assert_eq!(ClientQuery::new(None, None, Some(0), Some(-3)).limit, 1);
        assert_eq!(ClientQuery::new(None, None, Some(0), Some(-3)).offset, 0);
        assert_eq!(ClientQuery::default().limit, 20);
    }

    #[test]
    fn test_pagination_pages_round_up() {
        assert_eq!(Pagination::new(41, 20, 0).pages, 3);
        assert_eq!(Pagination::new(40, 20, 0).pages, 2);
        assert_eq!(Pagination::new(0, 20, 0).pages, 0);
    }
}
