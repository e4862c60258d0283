use std::borrow::{Borrow, Cow};

use serde::{Deserialize, Serialize};

macro_rules! impl_name_newtype {
    ($t:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $t(Cow<'static, str>);

        impl $t {
            pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
                Self(name.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $t {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl From<&'static str> for $t {
            fn from(value: &'static str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $t {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

impl_name_newtype!(
    Resource,
    "Named object under access control (one logical endpoint group, e.g. a controller)."
);
impl_name_newtype!(
    Privilege,
    "Named action on a resource (e.g. a controller action)."
);
