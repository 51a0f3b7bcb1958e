use serde_json::{json, Map};
use tracegrade_footprint::MemoryFootprint;

use super::imports::is_dotted_identifier;
use super::{Annotation, AnnotationMeta, Evaluation};
use crate::error::{VerifyError, VerifyResult};

/// Asserts that no observed value is an instance of a type.
#[derive(Debug, Clone)]
pub struct ForbidType {
    meta: AnnotationMeta,
    type_name: String,
}

impl ForbidType {
    pub fn new(type_name: impl Into<String>) -> VerifyResult<Self> {
        let type_name = type_name.into();
        if !is_dotted_identifier(&type_name) {
            return Err(VerifyError::InvalidType(type_name));
        }
        Ok(Self {
            meta: AnnotationMeta::default(),
            type_name,
        })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

impl Annotation for ForbidType {
    fn meta(&self) -> &AnnotationMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut AnnotationMeta {
        &mut self.meta
    }

    fn kind(&self) -> &'static str {
        "forbid_type"
    }

    fn evaluate(&self, footprint: &MemoryFootprint) -> VerifyResult<Evaluation> {
        // `numpy.ndarray` also matches values whose type name is `ndarray`,
        // but a qualified `object` is never the universal base.
        let short = self
            .type_name
            .rsplit_once('.')
            .map(|(_, short)| short)
            .filter(|short| *short != "object");
        let found = footprint.iter().any(|entry| {
            entry.value.is_instance(&self.type_name)
                || short.is_some_and(|short| entry.value.is_instance(short))
        });
        Ok(Evaluation::leaf(!found))
    }

    fn describe(&self, fields: &mut Map<String, serde_json::Value>) {
        fields.insert("type_".into(), json!(self.type_name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::AnnotationRef;
    use tracegrade_footprint::{FootprintEntry, Object};

    fn satisfied(type_name: &str, fp: &MemoryFootprint) -> bool {
        AnnotationRef::new(ForbidType::new(type_name).unwrap())
            .check(fp)
            .unwrap()
            .satisfied()
    }

    #[test]
    fn forbids_instances() {
        let fp = MemoryFootprint::from_values([
            FootprintEntry::new(1.5, 1, None),
            FootprintEntry::new(true, 2, None),
            FootprintEntry::new(Object::new("Deque").with_base("Sequence"), 3, None),
        ]);
        assert!(!satisfied("float", &fp));
        assert!(!satisfied("int", &fp));
        assert!(!satisfied("Sequence", &fp));
        assert!(satisfied("str", &fp));
        assert!(satisfied("list", &fp));
    }

    #[test]
    fn qualified_names_match_short_type_names() {
        let fp = MemoryFootprint::from_values([FootprintEntry::new(
            tracegrade_footprint::NdArray::vector(vec![1.0]),
            1,
            None,
        )]);
        assert!(!satisfied("numpy.ndarray", &fp));
        assert!(satisfied("pandas.DataFrame", &fp));
    }

    #[test]
    fn qualified_object_is_not_the_universal_base() {
        let fp = MemoryFootprint::from_values([
            FootprintEntry::new(1, 1, None),
            FootprintEntry::new(Object::new("Node"), 2, None),
        ]);
        assert!(satisfied("pkg.object", &fp));
        assert!(!satisfied("object", &fp));
        assert!(!satisfied("graph.Node", &fp));
    }

    #[test]
    fn empty_footprint_has_no_forbidden_values() {
        assert!(satisfied("float", &MemoryFootprint::new()));
    }

    #[test]
    fn rejects_non_types() {
        assert_eq!(
            ForbidType::new("list[int]").unwrap_err(),
            VerifyError::InvalidType("list[int]".into())
        );
    }

    #[test]
    fn dict_form() {
        let d = AnnotationRef::new(ForbidType::new("numpy.ndarray").unwrap()).to_dict();
        assert_eq!(d["type"], "forbid_type");
        assert_eq!(d["type_"], "numpy.ndarray");
    }
}
