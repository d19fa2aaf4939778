use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use circulib_core::{DomainError, DomainResult, Entity, MemberId, ValueObject};

/// Collection holding member documents.
pub const MEMBERS_COLLECTION: &str = "members";

/// A validated email address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Parse and validate an email address.
    ///
    /// Validation is deliberately shallow: a single `@` with non-empty
    /// local and domain parts, no whitespace. Mailbox verification is a
    /// delivery concern, not a domain one.
    pub fn parse(raw: impl Into<String>) -> DomainResult<Self> {
        let raw = raw.into();
        if raw.chars().any(char::is_whitespace) {
            return Err(DomainError::validation("email cannot contain whitespace"));
        }
        let well_formed = match raw.split_once('@') {
            Some((local, domain)) => !local.is_empty() && domain.contains('.'),
            None => false,
        };
        if !well_formed {
            return Err(DomainError::validation(format!("malformed email: {raw}")));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for EmailAddress {}

impl core::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A registered library member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    member_id: MemberId,
    full_name: String,
    email: EmailAddress,
    joined_at: DateTime<Utc>,
}

impl Member {
    /// Register a member.
    pub fn new(
        member_id: MemberId,
        full_name: impl Into<String>,
        email: EmailAddress,
        joined_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let full_name = full_name.into();
        if full_name.trim().is_empty() {
            return Err(DomainError::validation("full name cannot be empty"));
        }
        Ok(Self {
            member_id,
            full_name,
            email,
            joined_at,
        })
    }

    pub fn member_id(&self) -> MemberId {
        self.member_id
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn email(&self) -> &EmailAddress {
        &self.email
    }

    pub fn joined_at(&self) -> DateTime<Utc> {
        self.joined_at
    }

    /// Replace the member's contact email.
    pub fn change_email(&mut self, email: EmailAddress) {
        self.email = email;
    }
}

impl Entity for Member {
    type Id = MemberId;

    fn id(&self) -> &Self::Id {
        &self.member_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_member() -> Member {
        Member::new(
            MemberId::new(),
            "Nguyen Thi B",
            EmailAddress::parse("nguyenb@example.com").unwrap(),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn change_email_replaces_contact() {
        let mut member = test_member();
        let new_email = EmailAddress::parse("newemail@example.com").unwrap();
        member.change_email(new_email.clone());
        assert_eq!(member.email(), &new_email);
    }

    #[test]
    fn empty_name_is_rejected() {
        let err = Member::new(
            MemberId::new(),
            "",
            EmailAddress::parse("a@example.com").unwrap(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn rejects_emails_without_at_sign() {
        assert!(EmailAddress::parse("example.com").is_err());
    }

    #[test]
    fn rejects_emails_with_empty_local_part() {
        assert!(EmailAddress::parse("@example.com").is_err());
    }

    proptest! {
        /// Anything with whitespace is rejected regardless of shape.
        #[test]
        fn whitespace_is_always_rejected(local in "[a-z]{1,8}", domain in "[a-z]{1,8}") {
            let raw = format!("{local} @{domain}.com");
            prop_assert!(EmailAddress::parse(raw).is_err());
        }

        /// Plain `local@domain.tld` shapes always parse.
        #[test]
        fn simple_addresses_parse(local in "[a-z0-9]{1,12}", domain in "[a-z]{1,12}") {
            let raw = format!("{local}@{domain}.com");
            prop_assert!(EmailAddress::parse(raw).is_ok());
        }
    }
}
