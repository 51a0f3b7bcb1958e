use serde_json::{json, Map};
use tracegrade_footprint::MemoryFootprint;

use super::{Annotation, AnnotationMeta, Evaluation};
use crate::error::{VerifyError, VerifyResult};

/// `a.b.c` where every segment is an identifier.
pub(crate) fn is_dotted_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|segment| {
            let mut chars = segment.chars();
            matches!(chars.next(), Some(c) if c == '_' || c.is_alphabetic())
                && chars.all(|c| c == '_' || c.is_alphanumeric())
        })
}

fn validate_module(module: String) -> VerifyResult<String> {
    if is_dotted_identifier(&module) {
        Ok(module)
    } else {
        Err(VerifyError::InvalidModule(module))
    }
}

/// Asserts that a module was imported.
#[derive(Debug, Clone)]
pub struct RequireImport {
    meta: AnnotationMeta,
    module: String,
}

impl RequireImport {
    pub fn new(module: impl Into<String>) -> VerifyResult<Self> {
        Ok(Self {
            meta: AnnotationMeta::default(),
            module: validate_module(module.into())?,
        })
    }

    pub fn module(&self) -> &str {
        &self.module
    }
}

impl Annotation for RequireImport {
    fn meta(&self) -> &AnnotationMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut AnnotationMeta {
        &mut self.meta
    }

    fn kind(&self) -> &'static str {
        "require_import"
    }

    fn evaluate(&self, footprint: &MemoryFootprint) -> VerifyResult<Evaluation> {
        Ok(Evaluation::leaf(footprint.imports().contains(&self.module)))
    }

    fn describe(&self, fields: &mut Map<String, serde_json::Value>) {
        fields.insert("module".into(), json!(self.module));
    }
}

/// Asserts that a module was not imported.
#[derive(Debug, Clone)]
pub struct ForbidImport {
    meta: AnnotationMeta,
    module: String,
}

impl ForbidImport {
    pub fn new(module: impl Into<String>) -> VerifyResult<Self> {
        Ok(Self {
            meta: AnnotationMeta::default(),
            module: validate_module(module.into())?,
        })
    }

    pub fn module(&self) -> &str {
        &self.module
    }
}

impl Annotation for ForbidImport {
    fn meta(&self) -> &AnnotationMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut AnnotationMeta {
        &mut self.meta
    }

    fn kind(&self) -> &'static str {
        "forbid_import"
    }

    fn evaluate(&self, footprint: &MemoryFootprint) -> VerifyResult<Evaluation> {
        Ok(Evaluation::leaf(!footprint.imports().contains(&self.module)))
    }

    fn describe(&self, fields: &mut Map<String, serde_json::Value>) {
        fields.insert("module".into(), json!(self.module));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::AnnotationRef;

    fn footprint() -> MemoryFootprint {
        let mut fp = MemoryFootprint::new();
        fp.add_imports(["numpy", "os.path"]);
        fp
    }

    fn satisfied(annotation: impl Annotation + 'static) -> bool {
        AnnotationRef::new(annotation).check(&footprint()).unwrap().satisfied()
    }

    #[test]
    fn identifiers() {
        assert!(is_dotted_identifier("numpy"));
        assert!(is_dotted_identifier("os.path"));
        assert!(is_dotted_identifier("_private.mod2"));
        assert!(!is_dotted_identifier(""));
        assert!(!is_dotted_identifier("2fast"));
        assert!(!is_dotted_identifier("a..b"));
        assert!(!is_dotted_identifier("has space"));
    }

    #[test]
    fn require_import() {
        assert!(satisfied(RequireImport::new("numpy").unwrap()));
        assert!(satisfied(RequireImport::new("os.path").unwrap()));
        assert!(!satisfied(RequireImport::new("pandas").unwrap()));
    }

    #[test]
    fn forbid_import() {
        assert!(!satisfied(ForbidImport::new("numpy").unwrap()));
        assert!(satisfied(ForbidImport::new("pandas").unwrap()));
    }

    #[test]
    fn invalid_module_names() {
        assert_eq!(
            RequireImport::new("not a module").unwrap_err(),
            VerifyError::InvalidModule("not a module".into())
        );
        assert!(ForbidImport::new("").is_err());
    }
}
