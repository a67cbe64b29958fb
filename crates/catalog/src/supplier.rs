use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainResult, Entity, SupplierId};

use crate::validate;

pub const NAME_MAX_CHARS: usize = 150;
const CONTACT_MAX_CHARS: usize = 150;
const PHONE_MAX_CHARS: usize = 30;

/// Supplier of products. Unique by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    id: SupplierId,
    name: String,
    contact_name: String,
    email: String,
    phone: String,
    address: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

/// Input for creating a supplier. Contact fields are optional (blank).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSupplier {
    pub name: String,
    #[serde(default)]
    pub contact_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl NewSupplier {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contact_name: String::new(),
            email: String::new(),
            phone: String::new(),
            address: String::new(),
            is_active: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierChanges {
    pub name: Option<String>,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub is_active: Option<bool>,
}

fn default_active() -> bool {
    true
}

impl Supplier {
    pub fn new(id: SupplierId, draft: NewSupplier, created_at: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id,
            name: validate::required("name", &draft.name, NAME_MAX_CHARS)?,
            contact_name: validate::bounded("contact_name", &draft.contact_name, CONTACT_MAX_CHARS)?,
            email: validate::email(&draft.email)?,
            phone: validate::bounded("phone", &draft.phone, PHONE_MAX_CHARS)?,
            address: draft.address.trim().to_string(),
            is_active: draft.is_active,
            created_at,
        })
    }

    /// Rebuild from persisted fields (storage adapters only; no validation).
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: SupplierId,
        name: String,
        contact_name: String,
        email: String,
        phone: String,
        address: String,
        is_active: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            contact_name,
            email,
            phone,
            address,
            is_active,
            created_at,
        }
    }

    pub fn with_changes(&self, changes: SupplierChanges) -> DomainResult<Self> {
        let mut next = self.clone();
        if let Some(name) = changes.name {
            next.name = validate::required("name", &name, NAME_MAX_CHARS)?;
        }
        if let Some(contact_name) = changes.contact_name {
            next.contact_name = validate::bounded("contact_name", &contact_name, CONTACT_MAX_CHARS)?;
        }
        if let Some(email) = changes.email {
            next.email = validate::email(&email)?;
        }
        if let Some(phone) = changes.phone {
            next.phone = validate::bounded("phone", &phone, PHONE_MAX_CHARS)?;
        }
        if let Some(address) = changes.address {
            next.address = address.trim().to_string();
        }
        if let Some(is_active) = changes.is_active {
            next.is_active = is_active;
        }
        Ok(next)
    }

    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }

    pub fn id_typed(&self) -> SupplierId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact_name(&self) -> &str {
        &self.contact_name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }
}

impl Entity for Supplier {
    type Id = SupplierId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_core::DomainError;

    fn tech_supply() -> NewSupplier {
        NewSupplier {
            name: "TechSupply S.L.".into(),
            contact_name: "Carlos Martínez".into(),
            email: "info@techsupply.es".into(),
            phone: "+34 910 123 456".into(),
            address: "Calle Mayor 15, Madrid".into(),
            is_active: true,
        }
    }

    #[test]
    fn new_supplier_keeps_contact_details() {
        let supplier = Supplier::new(SupplierId::new(), tech_supply(), Utc::now()).unwrap();
        assert_eq!(supplier.name(), "TechSupply S.L.");
        assert_eq!(supplier.email(), "info@techsupply.es");
        assert_eq!(supplier.phone(), "+34 910 123 456");
    }

    #[test]
    fn invalid_email_is_a_validation_error() {
        let mut draft = tech_supply();
        draft.email = "techsupply.es".into();
        let err = Supplier::new(SupplierId::new(), draft, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("techsupply.es")));
    }

    #[test]
    fn phone_length_is_bounded() {
        let mut draft = tech_supply();
        draft.phone = "9".repeat(31);
        assert!(Supplier::new(SupplierId::new(), draft, Utc::now()).is_err());
    }

    #[test]
    fn clearing_email_through_changes_is_allowed() {
        let supplier = Supplier::new(SupplierId::new(), tech_supply(), Utc::now()).unwrap();
        let updated = supplier
            .with_changes(SupplierChanges {
                email: Some(String::new()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(updated.email(), "");
        assert_eq!(updated.contact_name(), "Carlos Martínez");
    }
}
