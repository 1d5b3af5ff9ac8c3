use std::path::PathBuf;

/// How an array-typed field surfaces in its owning table's row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArrayPolicy {
    /// Replace the field with an integer element count (`Null` when the
    /// field is absent).
    #[default]
    Count,
    /// Drop the field from the owning row entirely.
    Omit,
}

/// Where a record's surrogate key comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum KeySource {
    /// Allocate from the [`KeyAllocator`](crate::flatten::KeyAllocator); the
    /// key is surfaced as a reserved `_id` root column.
    #[default]
    Generated,
    /// Reuse an integer-valued source field as the key. Falls back to the
    /// allocator when the field is absent or not integer-like; no extra
    /// column is added since the field is already one.
    Field(String),
}

/// Configuration for one relationalize run.
#[derive(Debug, Clone)]
pub struct RelationalizeConfig {
    /// Name of the root table; auxiliary table names are derived from it.
    pub root_name: String,

    /// Separator joining path segments into auxiliary table names.
    pub separator: String,

    pub array_policy: ArrayPolicy,

    pub key_source: KeySource,

    /// Scratch location for implementations that spill large intermediate
    /// state. The in-memory engine ignores it.
    pub working_area: Option<PathBuf>,
}

impl RelationalizeConfig {
    /// A root table name is required; everything else has defaults.
    pub fn new(root_name: impl Into<String>) -> Self {
        RelationalizeConfig {
            root_name: root_name.into(),
            separator: String::from("_"),
            array_policy: ArrayPolicy::default(),
            key_source: KeySource::default(),
            working_area: None,
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn with_array_policy(mut self, policy: ArrayPolicy) -> Self {
        self.array_policy = policy;
        self
    }

    /// Use the named source field as the surrogate key.
    pub fn with_key_field(mut self, field: impl Into<String>) -> Self {
        self.key_source = KeySource::Field(field.into());
        self
    }
}
