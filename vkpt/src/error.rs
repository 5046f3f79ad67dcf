use glam::UVec2;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown cvar: {0}")]
    UnknownCvar(String),

    #[error("invalid value for cvar `{name}`: {value:?}")]
    InvalidCvarValue { name: String, value: String },

    #[error("expected `<cvar> <value>`, got {0:?}")]
    InvalidCvarCommand(String),

    #[error("viewport must not be empty (got {0})")]
    EmptyViewport(UVec2),

    #[error("render width must be even (got {0})")]
    OddRenderWidth(u32),

    #[error("pass graph is invalid: {0}")]
    InvalidPassGraph(String),

    #[error("missing shader for pass `{0}`")]
    MissingShader(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
