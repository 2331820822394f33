#![warn(clippy::pedantic)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
)]

pub mod convert;
pub mod editor;
pub mod error;
pub mod io;
pub mod resources;
pub mod types;
pub(crate) mod csv;

pub use crate::error::{Error, Result};
pub use crate::io::{Reader, Writer};

#[must_use]
pub fn name(with_version: bool) -> String {
    let mut name = "Skyforge".to_string();
    if with_version {
        let version = version();
        if !version.is_empty() {
            name.push(' ');
            name.push_str(&version);
        }
    }
    name
}

#[must_use]
pub fn version() -> String {
    const VERSION: Option<&str> = option_env!("CARGO_PKG_VERSION");
    VERSION.unwrap_or("").to_string()
}
