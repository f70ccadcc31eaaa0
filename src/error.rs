//! Errors returned as `Err` from loader and registry entry points.
//!
//! Only wiring bugs surface this way: a referenced title with no backing
//! document or module, or a load request that names nothing to load.
//! Content-authoring failures travel as data inside the result union
//! instead (see `fault`).

use thiserror::Error;

use crate::module::Title;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// Referenced title has no document and no module. Names the requester
    /// when known, to aid diagnosing missing-dependency chains.
    #[error("{}", not_found_message(.title, .requester))]
    NotFound {
        title: Title,
        requester: Option<Title>,
    },

    /// Load request carried neither a title nor literal source.
    #[error("load request carries neither a title nor literal source")]
    EmptyRequest,
}

impl Error {
    pub fn not_found(title: impl Into<Title>, requester: Option<&Title>) -> Self {
        Self::NotFound {
            title: title.into(),
            requester: requester.cloned(),
        }
    }
}

fn not_found_message(title: &Title, requester: &Option<Title>) -> String {
    match requester {
        Some(requester) => {
            format!("no module or document named `{title}` (required by `{requester}`)")
        }
        None => format!("no module or document named `{title}`"),
    }
}
