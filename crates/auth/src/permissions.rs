use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier, `"<resource>.<action>"` (e.g. `"movements.add"`).
///
/// The wildcard `"*"` grants every permission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const ALL: Permission = Permission::from_static("*");

    pub const CATEGORIES_VIEW: Permission = Permission::from_static("categories.view");
    pub const CATEGORIES_ADD: Permission = Permission::from_static("categories.add");
    pub const CATEGORIES_CHANGE: Permission = Permission::from_static("categories.change");
    pub const CATEGORIES_DELETE: Permission = Permission::from_static("categories.delete");

    pub const SUPPLIERS_VIEW: Permission = Permission::from_static("suppliers.view");
    pub const SUPPLIERS_ADD: Permission = Permission::from_static("suppliers.add");
    pub const SUPPLIERS_CHANGE: Permission = Permission::from_static("suppliers.change");
    pub const SUPPLIERS_DELETE: Permission = Permission::from_static("suppliers.delete");

    pub const PRODUCTS_VIEW: Permission = Permission::from_static("products.view");
    pub const PRODUCTS_ADD: Permission = Permission::from_static("products.add");
    pub const PRODUCTS_CHANGE: Permission = Permission::from_static("products.change");
    pub const PRODUCTS_DELETE: Permission = Permission::from_static("products.delete");

    pub const MOVEMENTS_VIEW: Permission = Permission::from_static("movements.view");
    pub const MOVEMENTS_ADD: Permission = Permission::from_static("movements.add");

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
