//! Field-name collision avoidance.

use crate::record::FieldSet;

/// Returns `desired` if no field in `fields` carries that name, otherwise the first of
/// `desired0`, `desired1`, ... that is free.
///
/// ```
/// use bulkgeo_core_common::{FieldSet, FieldType, unique_field_name};
///
/// let mut fields = FieldSet::new();
/// assert_eq!(unique_field_name("place", &fields), "place");
///
/// fields.push_field("place", FieldType::String).unwrap();
/// assert_eq!(unique_field_name("place", &fields), "place0");
///
/// fields.push_field("place0", FieldType::String).unwrap();
/// assert_eq!(unique_field_name("place", &fields), "place1");
/// ```
#[must_use]
pub fn unique_field_name(desired: &str, fields: &FieldSet) -> String {
    if !fields.contains(desired) {
        return desired.to_string();
    }
    (0u64..)
        .map(|suffix| format!("{desired}{suffix}"))
        .find(|candidate| !fields.contains(candidate))
        .unwrap_or_else(|| desired.to_string())
}
