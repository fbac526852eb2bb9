//! Typed view over a decoded hash payload.
//!
//! Stages never pass raw field maps around; they decode once and read the
//! handful of fields they care about through an [`EntityView`].

use crate::profile::EntityProfile;
use crate::value::V2Value;
use crate::FieldMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityView {
    pub objid: Option<String>,
    pub extid: Option<String>,
    pub owner_ref: Option<String>,
    pub display_key: Option<String>,
    pub created: Option<f64>,
}

impl EntityView {
    /// View over a legacy payload, where every field is a bare string.
    pub fn from_legacy(fields: &FieldMap, profile: &EntityProfile) -> Self {
        let text = |name: &str| {
            fields
                .get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Self {
            objid: text(profile.id_field),
            extid: text(profile.extid_field),
            owner_ref: profile.owner.and_then(|o| text(o.field)),
            display_key: text(profile.display_field),
            created: text(profile.created_field)
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|c| c.is_finite() && *c > 0.0),
        }
    }

    /// View over a V2 payload, where every field is serialized JSON.
    pub fn from_v2(fields: &FieldMap, profile: &EntityProfile) -> Self {
        let value = |name: &str| fields.get(name).map(|v| V2Value::from_serialized(v));
        let text = |name: &str| value(name).and_then(|v| v.as_str().map(str::to_string));
        Self {
            objid: text(profile.id_field),
            extid: text(profile.extid_field),
            owner_ref: profile.owner.and_then(|o| text(o.field)),
            display_key: text(profile.display_field),
            created: value(profile.created_field)
                .and_then(|v| v.as_f64())
                .filter(|c| c.is_finite() && *c > 0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{CUSTOMER, CUSTOM_DOMAIN};

    fn map(pairs: &[(&str, &str)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_legacy_view() {
        let view = EntityView::from_legacy(
            &map(&[
                ("custid", "a@example.com"),
                ("display_domain", "x.example"),
                ("created", "1000"),
                ("extid", ""),
            ]),
            &CUSTOM_DOMAIN,
        );
        assert_eq!(view.owner_ref.as_deref(), Some("a@example.com"));
        assert_eq!(view.display_key.as_deref(), Some("x.example"));
        assert_eq!(view.created, Some(1000.0));
        assert_eq!(view.extid, None);
        assert_eq!(view.objid, None);
    }

    #[test]
    fn test_zero_created_is_absent() {
        let view = EntityView::from_legacy(&map(&[("created", "0")]), &CUSTOM_DOMAIN);
        assert_eq!(view.created, None);
    }

    #[test]
    fn test_v2_view_reads_json_values() {
        let view = EntityView::from_v2(
            &map(&[
                ("display_domain", "\"x.example\""),
                ("created", "1000.0"),
                ("objid", "\"o1\""),
                ("custid", "null"),
            ]),
            &CUSTOM_DOMAIN,
        );
        assert_eq!(view.display_key.as_deref(), Some("x.example"));
        assert_eq!(view.created, Some(1000.0));
        assert_eq!(view.objid.as_deref(), Some("o1"));
        assert_eq!(view.owner_ref, None);
    }

    #[test]
    fn test_profile_without_owner() {
        let view = EntityView::from_legacy(&map(&[("email", "a@example.com"), ("custid", "c1")]), &CUSTOMER);
        assert_eq!(view.display_key.as_deref(), Some("a@example.com"));
        assert_eq!(view.owner_ref, None);
    }
}
