//! Entity profiles: the static migration contract for one entity type.
//!
//! A profile names the V1 and V2 keyspaces, declares the field-type tables
//! used by the transcoder, and names every secondary index the index builder
//! writes. Stages are written once against profiles; adding an entity means
//! adding a profile, not a code path.
//!
//! ```text
//! V1                                   V2
//! customdomain:values        (zset)    custom_domain:instances            (zset)
//! customdomain:<id>:object   (hash) →  custom_domain:<objid>:object       (hash)
//! customdomain:<id>:brand    (hash) →  custom_domain:<objid>:brand        (hash)
//! customdomain:display_domains         custom_domain:display_domain_index (hash)
//! ```

/// Declared type of a legacy field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    /// Floats and timestamps. Legacy timestamps are integer seconds, V2
    /// stores float seconds.
    Float,
    Boolean,
}

/// Field name → declared kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldTable(pub &'static [(&'static str, FieldKind)]);

impl FieldTable {
    pub fn kind_of(&self, field: &str) -> Option<FieldKind> {
        self.0
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, kind)| *kind)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.kind_of(field).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().map(|(name, _)| *name)
    }
}

/// A secondary per-entity record (branding, image assets, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubRecordDef {
    pub v1_suffix: &'static str,
    pub v2_suffix: &'static str,
    pub fields: FieldTable,
}

/// Ownership relationship: legacy owner reference → organization id.
#[derive(Debug, Clone, Copy)]
pub struct OwnerDef {
    /// Field in the legacy object carrying the owner reference.
    pub field: &'static str,
    /// V2 hash mapping canonical id → org id.
    pub ownership_index: &'static str,
    /// Reverse participation zset key is `<prefix>:<org_id>:<suffix>`.
    pub participation_prefix: &'static str,
    pub participation_suffix: &'static str,
    /// HSET key in the organization index file mapping owner ref → org id.
    pub relationship_index: &'static str,
    /// ZADD key in the organization index file listing every org id.
    pub org_ordering_index: &'static str,
}

impl OwnerDef {
    pub fn participation_key(&self, org_id: &str) -> String {
        format!(
            "{}:{}:{}",
            self.participation_prefix, org_id, self.participation_suffix
        )
    }
}

/// V2 secondary index keys.
#[derive(Debug, Clone, Copy)]
pub struct IndexKeys {
    pub ordering: &'static str,
    pub display_lookup: &'static str,
    /// Kept for readers still on the older lookup name.
    pub display_lookup_compat: &'static str,
    pub extid_lookup: &'static str,
    pub objid_lookup: &'static str,
}

/// Classification of a V1 key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyShape<'a> {
    /// The legacy aggregate index (compared during validation, never output).
    AggregateIndex,
    Object {
        legacy_id: &'a str,
    },
    SubRecord {
        legacy_id: &'a str,
        def: &'static SubRecordDef,
    },
    /// Global/singleton records, excluded from output and indexing.
    Global,
    Unrecognized,
}

#[derive(Debug, Clone, Copy)]
pub struct EntityProfile {
    pub name: &'static str,
    pub v1_prefix: &'static str,
    pub v2_prefix: &'static str,
    pub aggregate_suffix: &'static str,
    pub object_suffix: &'static str,
    pub global_suffixes: &'static [&'static str],
    pub fields: FieldTable,
    pub sub_records: &'static [SubRecordDef],
    pub id_field: &'static str,
    pub extid_field: &'static str,
    pub created_field: &'static str,
    pub display_field: &'static str,
    pub owner: Option<OwnerDef>,
    pub indexes: IndexKeys,
    /// Fields whose presence is reported as coverage during validation.
    pub coverage_fields: &'static [&'static str],
}

impl EntityProfile {
    pub fn by_name(name: &str) -> Option<&'static EntityProfile> {
        PROFILES.iter().copied().find(|p| p.name == name)
    }

    pub fn all() -> &'static [&'static EntityProfile] {
        PROFILES
    }

    pub fn classify<'k>(&self, key: &'k str) -> KeyShape<'k> {
        let parts: Vec<&str> = key.split(':').collect();
        if parts.first() != Some(&self.v1_prefix) {
            return KeyShape::Unrecognized;
        }
        match parts.as_slice() {
            [_, suffix] if *suffix == self.aggregate_suffix => KeyShape::AggregateIndex,
            [_, suffix] if self.global_suffixes.iter().any(|g| g == suffix) => KeyShape::Global,
            [_, id, suffix] if !id.is_empty() => {
                if *suffix == self.object_suffix {
                    KeyShape::Object { legacy_id: *id }
                } else if let Some(def) = self.sub_record(suffix) {
                    KeyShape::SubRecord {
                        legacy_id: *id,
                        def,
                    }
                } else {
                    KeyShape::Unrecognized
                }
            }
            _ => KeyShape::Unrecognized,
        }
    }

    pub fn sub_record(&self, v1_suffix: &str) -> Option<&'static SubRecordDef> {
        self.sub_records.iter().find(|s| s.v1_suffix == v1_suffix)
    }

    pub fn v1_aggregate_key(&self) -> String {
        format!("{}:{}", self.v1_prefix, self.aggregate_suffix)
    }

    pub fn v2_object_key(&self, objid: &str) -> String {
        format!("{}:{}:{}", self.v2_prefix, objid, self.object_suffix)
    }

    pub fn v2_sub_key(&self, objid: &str, def: &SubRecordDef) -> String {
        format!("{}:{}:{}", self.v2_prefix, objid, def.v2_suffix)
    }

    /// A canonical id must be a single non-empty key segment.
    pub fn is_valid_objid(objid: &str) -> bool {
        !objid.is_empty() && !objid.contains(':')
    }

    /// Canonical id of a V2 primary object key, `None` for sub-records.
    pub fn v2_primary_objid<'k>(&self, key: &'k str) -> Option<&'k str> {
        let rest = key.strip_prefix(self.v2_prefix)?.strip_prefix(':')?;
        let objid = rest
            .strip_suffix(self.object_suffix)?
            .strip_suffix(':')?;
        Self::is_valid_objid(objid).then_some(objid)
    }
}

static PROFILES: &[&EntityProfile] = &[&CUSTOM_DOMAIN, &CUSTOMER, &ORGANIZATION];

pub static CUSTOM_DOMAIN: EntityProfile = EntityProfile {
    name: "custom_domain",
    v1_prefix: "customdomain",
    v2_prefix: "custom_domain",
    aggregate_suffix: "values",
    object_suffix: "object",
    global_suffixes: &["display_domains", "owners"],
    fields: FieldTable(&[
        ("domainid", FieldKind::String),
        ("objid", FieldKind::String),
        ("extid", FieldKind::String),
        ("display_domain", FieldKind::String),
        ("custid", FieldKind::String),
        ("base_domain", FieldKind::String),
        ("subdomain", FieldKind::String),
        ("trd", FieldKind::String),
        ("tld", FieldKind::String),
        ("sld", FieldKind::String),
        ("_original_value", FieldKind::String),
        ("txt_validation_host", FieldKind::String),
        ("txt_validation_value", FieldKind::String),
        ("status", FieldKind::String),
        ("vhost", FieldKind::String),
        ("verified", FieldKind::Boolean),
        ("resolving", FieldKind::Boolean),
        ("created", FieldKind::Float),
        ("updated", FieldKind::Float),
    ]),
    sub_records: &[
        SubRecordDef {
            v1_suffix: "brand",
            v2_suffix: "brand",
            fields: FieldTable(&[
                ("primary_color", FieldKind::String),
                ("font_family", FieldKind::String),
                ("corner_style", FieldKind::String),
                ("button_text_light", FieldKind::Boolean),
                ("allow_public_homepage", FieldKind::Boolean),
                ("allow_public_api", FieldKind::Boolean),
                ("locale", FieldKind::String),
            ]),
        },
        SubRecordDef {
            v1_suffix: "logo",
            v2_suffix: "logo",
            fields: IMAGE_FIELDS,
        },
        SubRecordDef {
            v1_suffix: "icon",
            v2_suffix: "icon",
            fields: IMAGE_FIELDS,
        },
    ],
    id_field: "objid",
    extid_field: "extid",
    created_field: "created",
    display_field: "display_domain",
    owner: Some(OwnerDef {
        field: "custid",
        ownership_index: "custom_domain:owners",
        participation_prefix: "organization",
        participation_suffix: "domains",
        relationship_index: "organization:contact_email_index",
        org_ordering_index: "organization:instances",
    }),
    indexes: IndexKeys {
        ordering: "custom_domain:instances",
        display_lookup: "custom_domain:display_domain_index",
        display_lookup_compat: "custom_domain:display_domains",
        extid_lookup: "custom_domain:extid_lookup",
        objid_lookup: "custom_domain:objid_lookup",
    },
    coverage_fields: &[
        "display_domain",
        "custid",
        "org_id",
        "extid",
        "created",
        "base_domain",
        "status",
        "verified",
    ],
};

const IMAGE_FIELDS: FieldTable = FieldTable(&[
    ("filename", FieldKind::String),
    ("content_type", FieldKind::String),
    ("encoded", FieldKind::String),
    ("bytes", FieldKind::Integer),
    ("width", FieldKind::Integer),
    ("height", FieldKind::Integer),
    ("ratio", FieldKind::Float),
]);

pub static CUSTOMER: EntityProfile = EntityProfile {
    name: "customer",
    v1_prefix: "customer",
    v2_prefix: "customer",
    aggregate_suffix: "values",
    object_suffix: "object",
    global_suffixes: &["email_index"],
    fields: FieldTable(&[
        ("custid", FieldKind::String),
        ("objid", FieldKind::String),
        ("extid", FieldKind::String),
        ("email", FieldKind::String),
        ("role", FieldKind::String),
        ("locale", FieldKind::String),
        ("planid", FieldKind::String),
        ("apitoken", FieldKind::String),
        ("passphrase", FieldKind::String),
        ("passphrase_encryption", FieldKind::String),
        ("verified", FieldKind::Boolean),
        ("contributor", FieldKind::Boolean),
        ("secrets_created", FieldKind::Integer),
        ("secrets_shared", FieldKind::Integer),
        ("emails_sent", FieldKind::Integer),
        ("last_login", FieldKind::Float),
        ("created", FieldKind::Float),
        ("updated", FieldKind::Float),
    ]),
    sub_records: &[],
    id_field: "objid",
    extid_field: "extid",
    created_field: "created",
    display_field: "email",
    owner: None,
    indexes: IndexKeys {
        ordering: "customer:instances",
        display_lookup: "customer:email_index",
        display_lookup_compat: "customer:email_lookup",
        extid_lookup: "customer:extid_lookup",
        objid_lookup: "customer:objid_lookup",
    },
    coverage_fields: &["email", "extid", "created", "role", "verified"],
};

/// Organizations migrate first; their contact-email lookup and ordering
/// index are the relationship source for owned entities.
pub static ORGANIZATION: EntityProfile = EntityProfile {
    name: "organization",
    v1_prefix: "organization",
    v2_prefix: "organization",
    aggregate_suffix: "values",
    object_suffix: "object",
    global_suffixes: &[],
    fields: FieldTable(&[
        ("orgid", FieldKind::String),
        ("objid", FieldKind::String),
        ("extid", FieldKind::String),
        ("display_name", FieldKind::String),
        ("description", FieldKind::String),
        ("contact_email", FieldKind::String),
        ("owner_id", FieldKind::String),
        ("planid", FieldKind::String),
        ("is_default", FieldKind::Boolean),
        ("created", FieldKind::Float),
        ("updated", FieldKind::Float),
    ]),
    sub_records: &[],
    id_field: "objid",
    extid_field: "extid",
    created_field: "created",
    display_field: "contact_email",
    owner: None,
    indexes: IndexKeys {
        ordering: "organization:instances",
        display_lookup: "organization:contact_email_index",
        display_lookup_compat: "organization:contact_emails",
        extid_lookup: "organization:extid_lookup",
        objid_lookup: "organization:objid_lookup",
    },
    coverage_fields: &["contact_email", "display_name", "extid", "created", "owner_id"],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_custom_domain_keys() {
        let p = &CUSTOM_DOMAIN;
        assert_eq!(p.classify("customdomain:values"), KeyShape::AggregateIndex);
        assert_eq!(p.classify("customdomain:owners"), KeyShape::Global);
        assert_eq!(
            p.classify("customdomain:abc:object"),
            KeyShape::Object { legacy_id: "abc" }
        );
        match p.classify("customdomain:abc:logo") {
            KeyShape::SubRecord { legacy_id, def } => {
                assert_eq!(legacy_id, "abc");
                assert_eq!(def.v2_suffix, "logo");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(p.classify("customdomain:abc:mystery"), KeyShape::Unrecognized);
        assert_eq!(p.classify("customdomain::object"), KeyShape::Unrecognized);
        assert_eq!(p.classify("customer:abc:object"), KeyShape::Unrecognized);
        assert_eq!(p.classify("customdomain:a:b:c"), KeyShape::Unrecognized);
    }

    #[test]
    fn test_v2_keys() {
        let p = &CUSTOM_DOMAIN;
        assert_eq!(p.v2_object_key("o1"), "custom_domain:o1:object");
        assert_eq!(p.v2_primary_objid("custom_domain:o1:object"), Some("o1"));
        assert_eq!(p.v2_primary_objid("custom_domain:o1:brand"), None);
        assert_eq!(p.v2_primary_objid("customdomain:o1:object"), None);
        assert_eq!(p.v2_primary_objid("custom_domain:cd:1:object"), None);
        assert!(EntityProfile::is_valid_objid("o1"));
        assert!(!EntityProfile::is_valid_objid("cd:1"));
        assert!(!EntityProfile::is_valid_objid(""));
        let brand = p.sub_record("brand").unwrap();
        assert_eq!(p.v2_sub_key("o1", brand), "custom_domain:o1:brand");
    }

    #[test]
    fn test_participation_key() {
        let owner = CUSTOM_DOMAIN.owner.unwrap();
        assert_eq!(owner.participation_key("org1"), "organization:org1:domains");
    }

    #[test]
    fn test_lookup_by_name() {
        assert_eq!(EntityProfile::by_name("customer").unwrap().name, "customer");
        assert!(EntityProfile::by_name("nope").is_none());
        assert_eq!(EntityProfile::all().len(), 3);
    }

    #[test]
    fn test_organization_indexes_feed_owner_relationship() {
        let owner = CUSTOM_DOMAIN.owner.unwrap();
        assert_eq!(ORGANIZATION.indexes.display_lookup, owner.relationship_index);
        assert_eq!(ORGANIZATION.indexes.ordering, owner.org_ordering_index);
        assert_eq!(ORGANIZATION.indexes.ordering, "organization:instances");
        assert_eq!(ORGANIZATION.display_field, "contact_email");
    }
}
