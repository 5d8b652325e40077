use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(pub String);

impl Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Dwolla customer id, the last path segment of the customer URL
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CustomerId(pub String);

impl Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub dwolla_customer_id: CustomerId,
    pub dwolla_customer_url: String,
}

impl User {
    pub fn from_new(id: UserId, user: NewUser) -> Self {
        let NewUser {
            name,
            email,
            dwolla_customer_id,
            dwolla_customer_url,
        } = user;
        Self {
            id,
            name,
            email,
            dwolla_customer_id,
            dwolla_customer_url,
        }
    }

    pub fn has_customer_id(&self) -> bool {
        !self.dwolla_customer_id.0.trim().is_empty()
    }
}

/// A user that hasn't been assigned an id by the document store yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub dwolla_customer_id: CustomerId,
    pub dwolla_customer_url: String,
}

impl NewUser {
    /// Returns `None` if the customer URL has no path segment to take the customer id from
    pub fn new(name: String, email: String, dwolla_customer_url: String) -> Option<Self> {
        let dwolla_customer_id = extract_customer_id_from_url(&dwolla_customer_url)?;
        Some(Self {
            name,
            email,
            dwolla_customer_id,
            dwolla_customer_url,
        })
    }
}

pub fn extract_customer_id_from_url(url: &str) -> Option<CustomerId> {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty() && !segment.contains(':'))
        .map(|segment| CustomerId(segment.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(
        "https://api-sandbox.dwolla.com/customers/fc451a7a-ae30-4404-aB95-e3553fcd733f",
        Some("fc451a7a-ae30-4404-aB95-e3553fcd733f")
    )]
    #[case("https://api.dwolla.com/customers/cust_1/", Some("cust_1"))]
    #[case("cust_1", Some("cust_1"))]
    #[case("", None)]
    #[case("https://", None)]
    fn customer_id_is_last_path_segment(#[case] url: &str, #[case] expected: Option<&str>) {
        assert_eq!(
            expected.map(|id| CustomerId(id.to_string())),
            extract_customer_id_from_url(url)
        );
    }

    #[test]
    fn new_user_takes_customer_id_from_url() {
        let user = NewUser::new(
            "Jane Doe".to_string(),
            "jane@example.com".to_string(),
            "https://api-sandbox.dwolla.com/customers/cust_1".to_string(),
        )
        .unwrap();
        assert_eq!(CustomerId("cust_1".to_string()), user.dwolla_customer_id);
    }

    #[test]
    fn blank_customer_id_is_reported() {
        let user = User {
            id: UserId("user-1".to_string()),
            name: "Jane Doe".to_string(),
            email: "jane@example.com".to_string(),
            dwolla_customer_id: CustomerId(" ".to_string()),
            dwolla_customer_url: String::new(),
        };
        assert!(!user.has_customer_id());
    }
}
