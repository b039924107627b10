use thiserror::Error;

/// The differ never fails on well-formed input (§4.1 "Failure semantics"); this
/// enum exists only to give programmer-error assertions (a malformed ECS adapter)
/// a typed, descriptive panic message.
#[derive(Debug, Clone, Error)]
pub enum DifferError {
    #[error("entity {entity:?} is tracked as live but missing from the world's networked archetypes")]
    UntrackedLiveEntity { entity: String },

    #[error("archetype {archetype:?} reported by the world has no resident entities")]
    EmptyArchetype { archetype: String },
}
