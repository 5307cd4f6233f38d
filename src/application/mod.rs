//! Application services: the request/render pipeline and its collaborators.

pub mod checker;
pub mod error;
pub mod pipeline;
pub mod render;
