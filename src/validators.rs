pub(crate) const MAX_LONGITUDE: f64 = 180.0;
pub(crate) const MAX_LATITUDE: f64 = 90.0;

pub(crate) fn is_valid_longitude(longitude: f64) -> bool {
    longitude.is_finite() && (-MAX_LONGITUDE..=MAX_LONGITUDE).contains(&longitude)
}

pub(crate) fn is_valid_latitude(latitude: f64) -> bool {
    latitude.is_finite() && (-MAX_LATITUDE..=MAX_LATITUDE).contains(&latitude)
}

/// Names must contain something other than whitespace.
pub(crate) fn is_valid_name(name: &str) -> bool {
    !name.trim().is_empty()
}

/// Ids become key path segments, so anything that could escape the namespace is refused.
pub(crate) fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id != "." && id != ".." && !id.contains('/') && !id.contains('\\')
}
