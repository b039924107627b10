use thiserror::Error;

/// `ConfigurationError` taxonomy (§7): raised at `ComponentRegistryBuilder::build`/
/// `register` time, never after construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("registry already has the maximum of {limit} registered components")]
    TooManyComponents { limit: usize },

    #[error("component {component:?} declares {count} fields, exceeding the limit of {limit}")]
    TooManyFields {
        component: &'static str,
        count: usize,
        limit: usize,
    },
}
