//! Name lookups for data sources
//!
//! Vendor list endpoints filter names by substring, so every lookup by name
//! re-checks for an exact match and refuses to guess between duplicates.

use crate::{ProviderError, Result};

/// The single item whose name equals `name` exactly.
pub fn find_exact<T>(items: Vec<T>, kind: &str, name: &str, name_of: impl Fn(&T) -> &str) -> Result<T> {
    let mut matches: Vec<T> = items.into_iter().filter(|item| name_of(item) == name).collect();
    match matches.len() {
        0 => Err(ProviderError::NotFoundByName {
            kind: kind.to_string(),
            name: name.to_string(),
        }),
        1 => Ok(matches.remove(0)),
        count => Err(ProviderError::AmbiguousName {
            kind: kind.to_string(),
            name: name.to_string(),
            count,
        }),
    }
}
