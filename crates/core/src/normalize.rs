//! Record normalization: maps the format-specific fields of one
//! [`ImportRecord`] onto the canonical property names of its entity type,
//! splitting them between the entity itself and its description.
//!
//! Normalization is a pure function of the record. A missing identifier is
//! an [`CoreError::InvalidRecord`]; fields that have no mapping are dropped
//! and returned as warnings for the caller to log.

use indexmap::IndexMap;
use serde_json::Value;

use crate::bundle::Bundle;
use crate::entity::EntityType;
use crate::error::CoreError;
use crate::record::{ImportRecord, SourceFormat};
use crate::types::{keys, labels, Properties};

/// Language assumed for descriptions whose source does not declare one.
pub const DEFAULT_LANGUAGE: &str = "eng";

/// Separator for repeated values of a single-valued property.
pub const VALUE_JOINER: &str = "\n\n";

/// Which bundle a mapped field lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Unit,
    Description,
}

/// One row of a mapping table.
#[derive(Debug, Clone, Copy)]
pub struct FieldMapping {
    pub path: &'static str,
    pub property: &'static str,
    pub target: Target,
    pub multivalued: bool,
}

const fn unit(path: &'static str, property: &'static str) -> FieldMapping {
    FieldMapping {
        path,
        property,
        target: Target::Unit,
        multivalued: false,
    }
}

const fn desc(path: &'static str, property: &'static str) -> FieldMapping {
    FieldMapping {
        path,
        property,
        target: Target::Description,
        multivalued: false,
    }
}

const fn desc_list(path: &'static str, property: &'static str) -> FieldMapping {
    FieldMapping {
        path,
        property,
        target: Target::Description,
        multivalued: true,
    }
}

// ---------------------------------------------------------------------------
// Mapping tables
// ---------------------------------------------------------------------------

const EAD_MAPPINGS: &[FieldMapping] = &[
    unit("archdesc/did/unitid", keys::IDENTIFIER),
    desc("archdesc/did/unittitle", keys::NAME),
    desc("eadheader/profiledesc/langusage/language/@langcode", keys::LANGUAGE_CODE),
    desc("archdesc/@level", "levelOfDescription"),
    desc_list("archdesc/did/unitdate", "unitDates"),
    desc("archdesc/did/physdesc/extent", "extentAndMedium"),
    desc("archdesc/did/abstract", "abstract"),
    desc_list("archdesc/did/langmaterial/language", "languageOfMaterial"),
    desc("archdesc/did/repository/corpname", "repositoryName"),
    desc("archdesc/scopecontent/p", "scopeAndContent"),
    desc("archdesc/bioghist/p", "biographicalHistory"),
    desc("archdesc/custodhist/p", "archivalHistory"),
    desc("archdesc/acqinfo/p", "acquisition"),
    desc("archdesc/appraisal/p", "appraisal"),
    desc("archdesc/accruals/p", "accruals"),
    desc("archdesc/arrangement/p", "systemOfArrangement"),
    desc("archdesc/accessrestrict/p", "conditionsOfAccess"),
    desc("archdesc/userestrict/p", "conditionsOfReproduction"),
    desc("archdesc/phystech/p", "physicalCharacteristics"),
    desc("archdesc/otherfindaid/p", "findingAids"),
    desc("archdesc/originalsloc/p", "locationOfOriginals"),
    desc("archdesc/altformavail/p", "locationOfCopies"),
    desc("archdesc/bibliography/p", "publicationNote"),
    desc("archdesc/odd/p", "notes"),
    desc_list("archdesc/controlaccess/subject", "subjectAccess"),
    desc_list("archdesc/controlaccess/persname", "personAccess"),
    desc_list("archdesc/controlaccess/famname", "familyAccess"),
    desc_list("archdesc/controlaccess/corpname", "corporateBodyAccess"),
    desc_list("archdesc/controlaccess/geogname", "placeAccess"),
    desc_list("archdesc/controlaccess/genreform", "genreAccess"),
];

const EAG_MAPPINGS: &[FieldMapping] = &[
    unit("archguide/identity/repositorid", keys::IDENTIFIER),
    desc("archguide/identity/autform", keys::NAME),
    desc("archguide/identity/autform/@xml:lang", keys::LANGUAGE_CODE),
    desc_list("archguide/identity/parform", "parallelFormsOfName"),
    desc("archguide/desc/repositories/repository/geogarea", "geographicArea"),
    desc("archguide/desc/repositories/repository/location/street", "street"),
    desc(
        "archguide/desc/repositories/repository/location/municipalityPostalcode",
        "municipality",
    ),
    desc("archguide/desc/repositories/repository/location/country", "countryName"),
    desc("archguide/desc/repositories/repository/telephone", "telephone"),
    desc("archguide/desc/repositories/repository/email", "email"),
    desc("archguide/desc/repositories/repository/webpage", "webpage"),
    desc(
        "archguide/desc/repositories/repository/repositorhist/descriptiveNote/p",
        "history",
    ),
    desc(
        "archguide/desc/repositories/repository/holdings/descriptiveNote/p",
        "holdings",
    ),
    desc("archguide/desc/repositories/repository/timetable/opening", "openingTimes"),
    desc("archguide/desc/repositories/repository/access/termsOfUse", "conditions"),
    desc("archguide/desc/repositories/repository/accessibility", "accessibility"),
];

const CSV_COUNTRY_MAPPINGS: &[FieldMapping] = &[unit(keys::IDENTIFIER, keys::IDENTIFIER)];

const CSV_REPOSITORY_MAPPINGS: &[FieldMapping] = &[
    unit(keys::IDENTIFIER, keys::IDENTIFIER),
    desc(keys::NAME, keys::NAME),
    desc(keys::LANGUAGE_CODE, keys::LANGUAGE_CODE),
    desc("otherFormsOfName", "otherFormsOfName"),
    desc("history", "history"),
    desc("street", "street"),
    desc("postalCode", "postalCode"),
    desc("municipality", "municipality"),
    desc("email", "email"),
    desc("telephone", "telephone"),
    desc("webpage", "webpage"),
];

const CSV_UNIT_MAPPINGS: &[FieldMapping] = &[
    unit(keys::IDENTIFIER, keys::IDENTIFIER),
    desc(keys::NAME, keys::NAME),
    desc(keys::LANGUAGE_CODE, keys::LANGUAGE_CODE),
    desc("levelOfDescription", "levelOfDescription"),
    desc("unitDates", "unitDates"),
    desc("extentAndMedium", "extentAndMedium"),
    desc("scopeAndContent", "scopeAndContent"),
    desc("biographicalHistory", "biographicalHistory"),
    desc("archivalHistory", "archivalHistory"),
    desc("conditionsOfAccess", "conditionsOfAccess"),
    desc("conditionsOfReproduction", "conditionsOfReproduction"),
    desc("notes", "notes"),
];

/// The mapping table for a source format.
pub fn mappings(format: SourceFormat) -> Result<&'static [FieldMapping], CoreError> {
    match format {
        SourceFormat::Ead => Ok(EAD_MAPPINGS),
        SourceFormat::Eag => Ok(EAG_MAPPINGS),
        SourceFormat::Csv(EntityType::Country) => Ok(CSV_COUNTRY_MAPPINGS),
        SourceFormat::Csv(EntityType::Repository) => Ok(CSV_REPOSITORY_MAPPINGS),
        SourceFormat::Csv(EntityType::DocumentaryUnit) => Ok(CSV_UNIT_MAPPINGS),
        SourceFormat::Csv(other) => Err(CoreError::invalid_record(format!(
            "{other} records cannot be imported from CSV"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// A normalized record and the fields that were dropped on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub bundle: Bundle,
    pub warnings: Vec<String>,
}

/// Collected values for one property, before they are flattened.
struct Collected {
    multivalued: bool,
    values: Vec<String>,
}

fn flatten(collected: IndexMap<&'static str, Collected>) -> Properties {
    collected
        .into_iter()
        .map(|(property, c)| {
            let value = if c.multivalued {
                Value::Array(c.values.into_iter().map(Value::String).collect())
            } else {
                Value::String(c.values.join(VALUE_JOINER))
            };
            (property.to_string(), value)
        })
        .collect()
}

/// Turn one raw record into a bundle for its entity type, with at most one
/// description sub-bundle.
pub fn normalize(record: &ImportRecord) -> Result<Normalized, CoreError> {
    normalize_with_language(record, DEFAULT_LANGUAGE)
}

/// [`normalize`], giving descriptions that declare no language
/// `default_language` instead of [`DEFAULT_LANGUAGE`].
pub fn normalize_with_language(
    record: &ImportRecord,
    default_language: &str,
) -> Result<Normalized, CoreError> {
    let table = mappings(record.format)?;
    let entity_type = record.format.entity_type();

    let mut unit_values: IndexMap<&'static str, Collected> = IndexMap::new();
    let mut desc_values: IndexMap<&'static str, Collected> = IndexMap::new();
    let mut warnings = Vec::new();

    for (path, raw) in &record.fields {
        let value = raw.trim();
        if value.is_empty() {
            continue;
        }
        let Some(mapping) = table.iter().find(|m| m.path == path.as_str()) else {
            warnings.push(format!("{}: dropped unmapped field '{path}'", record.location));
            continue;
        };
        let bucket = match mapping.target {
            Target::Unit => &mut unit_values,
            Target::Description => &mut desc_values,
        };
        bucket
            .entry(mapping.property)
            .or_insert_with(|| Collected {
                multivalued: mapping.multivalued,
                values: Vec::new(),
            })
            .values
            .push(value.to_string());
    }

    if !unit_values.contains_key(keys::IDENTIFIER) {
        return Err(CoreError::invalid_record(format!(
            "{}: {} record has no '{}'",
            record.location,
            record.format.name(),
            keys::IDENTIFIER
        )));
    }

    let mut bundle = Bundle::new(entity_type).with_data(flatten(unit_values));

    if let Some(desc_type) = entity_type.description_type() {
        if !desc_values.is_empty() {
            let mut data = flatten(desc_values);
            data.entry(keys::LANGUAGE_CODE.to_string())
                .or_insert_with(|| Value::String(default_language.to_string()));
            data.insert(
                keys::SOURCE_FILE_ID.to_string(),
                Value::String(record.source_id.clone()),
            );
            bundle = bundle.with_relation(
                labels::HAS_DESCRIPTION,
                Bundle::new(desc_type).with_data(data),
            );
        }
    } else if !desc_values.is_empty() {
        warnings.push(format!(
            "{}: {entity_type} has no description; dropped {} field(s)",
            record.location,
            desc_values.len()
        ));
    }

    Ok(Normalized { bundle, warnings })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn ead(fields: &[(&str, &str)]) -> ImportRecord {
        fields.iter().fold(
            ImportRecord::new("gb/repo-001/item-01.xml", "item-01", SourceFormat::Ead),
            |r, (p, v)| r.with_field(*p, *v),
        )
    }

    fn description(n: &Normalized) -> &Bundle {
        &n.bundle.relations[labels::HAS_DESCRIPTION][0]
    }

    #[test]
    fn ead_fields_split_between_unit_and_description() {
        let n = normalize(&ead(&[
            ("archdesc/did/unitid", "item-01"),
            ("archdesc/did/unittitle", "Letters"),
            ("archdesc/@level", "file"),
        ]))
        .unwrap();
        assert_eq!(n.bundle.entity_type, EntityType::DocumentaryUnit);
        assert_eq!(n.bundle.identifier(), Some("item-01"));
        assert_eq!(n.bundle.data.len(), 1);

        let d = description(&n);
        assert_eq!(d.entity_type, EntityType::DocumentaryUnitDescription);
        assert_eq!(d.str_value(keys::NAME), Some("Letters"));
        assert_eq!(d.str_value("levelOfDescription"), Some("file"));
        assert_eq!(d.str_value(keys::LANGUAGE_CODE), Some(DEFAULT_LANGUAGE));
        assert_eq!(d.str_value(keys::SOURCE_FILE_ID), Some("item-01"));
    }

    #[test]
    fn repeated_single_values_are_joined_and_lists_kept() {
        let n = normalize(&ead(&[
            ("archdesc/did/unitid", "c1"),
            ("archdesc/did/unittitle", "T"),
            ("archdesc/scopecontent/p", "First."),
            ("archdesc/scopecontent/p", "Second."),
            ("archdesc/controlaccess/subject", "Deportation"),
            ("archdesc/controlaccess/subject", "Camps"),
        ]))
        .unwrap();
        let d = description(&n);
        assert_eq!(d.data["scopeAndContent"], json!("First.\n\nSecond."));
        assert_eq!(d.data["subjectAccess"], json!(["Deportation", "Camps"]));
    }

    #[test]
    fn unmapped_fields_are_dropped_with_warning() {
        let n = normalize(&ead(&[
            ("archdesc/did/unitid", "c1"),
            ("archdesc/did/unittitle", "T"),
            ("archdesc/dao/@href", "http://example.org/scan.jpg"),
        ]))
        .unwrap();
        assert_eq!(n.warnings.len(), 1);
        assert!(n.warnings[0].contains("archdesc/dao/@href"));
        assert!(!description(&n).data.contains_key("href"));
    }

    #[test]
    fn missing_identifier_is_invalid_record() {
        let r = ead(&[("archdesc/did/unittitle", "No id"), ("archdesc/did/unitid", "   ")]);
        assert_matches!(normalize(&r), Err(CoreError::InvalidRecord(_)));
    }

    #[test]
    fn declared_language_wins_over_default() {
        let n = normalize(&ead(&[
            ("archdesc/did/unitid", "c1"),
            ("archdesc/did/unittitle", "Brieven"),
            ("eadheader/profiledesc/langusage/language/@langcode", "nld"),
        ]))
        .unwrap();
        assert_eq!(description(&n).str_value(keys::LANGUAGE_CODE), Some("nld"));
    }

    #[test]
    fn configured_default_language_applies_when_undeclared() {
        let record = ead(&[("archdesc/did/unitid", "c1"), ("archdesc/did/unittitle", "Briefe")]);
        let n = normalize_with_language(&record, "deu").unwrap();
        assert_eq!(description(&n).str_value(keys::LANGUAGE_CODE), Some("deu"));
    }

    #[test]
    fn csv_country_rows_drop_description_fields() {
        let r = ImportRecord::new("countries.csv:2", "2", SourceFormat::Csv(EntityType::Country))
            .with_field("identifier", "nl")
            .with_field("name", "Netherlands");
        let n = normalize(&r).unwrap();
        assert!(n.bundle.relations.is_empty());
        assert_eq!(n.warnings.len(), 1);
    }

    #[test]
    fn csv_cannot_carry_system_events() {
        let r = ImportRecord::new("x.csv:2", "2", SourceFormat::Csv(EntityType::SystemEvent));
        assert_matches!(normalize(&r), Err(CoreError::InvalidRecord(_)));
    }
}
