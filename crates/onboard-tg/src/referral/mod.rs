//! Referral codes and crediting of the users who invited others.

mod codec;
mod service;
mod stats;
mod store;

pub(crate) use codec::*;
pub(crate) use service::*;
pub(crate) use stats::*;
pub(crate) use store::*;

use serde::Deserialize;

#[derive(Deserialize)]
pub(crate) struct Config {
    /// Key of the referral codes obfuscation. Changing it invalidates
    /// all referral links shared before.
    pub(crate) secret_key: String,
}
