use serde_json::Value;

/// Options for [`KeyValueStore::bind`](crate::KeyValueStore::bind).
///
/// A bare default value converts into options directly, so
/// `store.bind(&scope, "theme", "light")` and
/// `store.bind(&scope, "theme", BindOptions::new().default_value("light"))`
/// are equivalent.
#[derive(Clone, Debug, PartialEq)]
pub struct BindOptions {
    /// Written to the store when the store-name has no value yet.
    pub default_value: Value,
    /// Key to persist under; the scope path is used when unset or empty.
    pub store_name: Option<String>,
}

impl BindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = value.into();
        self
    }

    pub fn store_name(mut self, name: impl Into<String>) -> Self {
        self.store_name = Some(name.into());
        self
    }

    pub(crate) fn effective_store_name<'a>(&'a self, key: &'a str) -> &'a str {
        effective(self.store_name.as_deref(), key)
    }
}

impl Default for BindOptions {
    fn default() -> Self {
        Self {
            default_value: Value::String(String::new()),
            store_name: None,
        }
    }
}

impl From<()> for BindOptions {
    fn from(_: ()) -> Self {
        Self::default()
    }
}

impl From<Value> for BindOptions {
    fn from(value: Value) -> Self {
        Self::default().default_value(value)
    }
}

impl From<&str> for BindOptions {
    fn from(value: &str) -> Self {
        Self::default().default_value(value)
    }
}

impl From<String> for BindOptions {
    fn from(value: String) -> Self {
        Self::default().default_value(value)
    }
}

/// Options for [`KeyValueStore::unbind`](crate::KeyValueStore::unbind).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnbindOptions {
    /// Store-name the binding was made under, when it differs from the path.
    pub store_name: Option<String>,
    /// Also delete the persisted value.
    pub remove: bool,
}

impl UnbindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unbind and delete the persisted value.
    pub fn removing() -> Self {
        Self::new().remove(true)
    }

    pub fn store_name(mut self, name: impl Into<String>) -> Self {
        self.store_name = Some(name.into());
        self
    }

    pub fn remove(mut self, remove: bool) -> Self {
        self.remove = remove;
        self
    }

    pub(crate) fn effective_store_name<'a>(&'a self, key: &'a str) -> &'a str {
        effective(self.store_name.as_deref(), key)
    }
}

fn effective<'a>(store_name: Option<&'a str>, key: &'a str) -> &'a str {
    store_name.filter(|name| !name.is_empty()).unwrap_or(key)
}
