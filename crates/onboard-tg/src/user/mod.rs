//! Users of the bot and the operations that the rest of the app needs on them.

mod error;
mod model;
mod repo;
mod service;

pub(crate) use error::*;
pub(crate) use model::*;
pub(crate) use repo::*;
pub(crate) use service::*;
