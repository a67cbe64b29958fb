use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{CategoryId, DomainResult, Entity};

use crate::validate;

pub const NAME_MAX_CHARS: usize = 100;

/// Product category. Unique by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    id: CategoryId,
    name: String,
    description: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

/// Input for creating a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl NewCategory {
    /// Minimal draft used by get-or-create paths (CSV import, seeding).
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            is_active: true,
        }
    }
}

/// Partial update; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

fn default_active() -> bool {
    true
}

impl Category {
    pub fn new(id: CategoryId, draft: NewCategory, created_at: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id,
            name: validate::required("name", &draft.name, NAME_MAX_CHARS)?,
            description: draft.description.trim().to_string(),
            is_active: draft.is_active,
            created_at,
        })
    }

    /// Rebuild from persisted fields (storage adapters only; no validation).
    pub fn restore(
        id: CategoryId,
        name: String,
        description: String,
        is_active: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            description,
            is_active,
            created_at,
        }
    }

    /// Validate `changes` against this category and return the updated value.
    pub fn with_changes(&self, changes: CategoryChanges) -> DomainResult<Self> {
        let mut next = self.clone();
        if let Some(name) = changes.name {
            next.name = validate::required("name", &name, NAME_MAX_CHARS)?;
        }
        if let Some(description) = changes.description {
            next.description = description.trim().to_string();
        }
        if let Some(is_active) = changes.is_active {
            next.is_active = is_active;
        }
        Ok(next)
    }

    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }

    pub fn id_typed(&self) -> CategoryId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }
}

impl Entity for Category {
    type Id = CategoryId;

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

    #[test]
    fn new_category_trims_name_and_defaults_active() {
        let draft: NewCategory = serde_json::from_str(r#"{"name":"  Oficina  "}"#).unwrap();
        let category = Category::new(CategoryId::new(), draft, Utc::now()).unwrap();
        assert_eq!(category.name(), "Oficina");
        assert_eq!(category.description(), "");
        assert!(category.is_active());
    }

    #[test]
    fn rejects_empty_and_overlong_names() {
        let err = Category::new(CategoryId::new(), NewCategory::named(" "), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let long = "x".repeat(NAME_MAX_CHARS + 1);
        assert!(Category::new(CategoryId::new(), NewCategory::named(long), Utc::now()).is_err());
    }

    #[test]
    fn with_changes_keeps_identity_and_unset_fields() {
        let created = Utc::now();
        let category = Category::new(
            CategoryId::new(),
            NewCategory {
                name: "Herramientas".into(),
                description: "Manuales".into(),
                is_active: true,
            },
            created,
        )
        .unwrap();

        let updated = category
            .with_changes(CategoryChanges {
                is_active: Some(false),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(updated.id(), category.id());
        assert_eq!(updated.created_at(), created);
        assert_eq!(updated.description(), "Manuales");
        assert!(!updated.is_active());
    }
}
