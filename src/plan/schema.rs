//! Resolving the schema that streamed values are checked against.

use tracing::debug;

use super::classify::DecoderSlot;
use crate::encoding::{CodecRegistry, EncodingConfig, FileSpec};
use crate::error::{PlanError, PlanResult};
use crate::syntax::{Expr, File};
use crate::value::{Instance, Runtime, Value};

/// Decodes schema files and narrows the result with `--schema`.
pub struct SchemaResolver<'a> {
    cfg: &'a EncodingConfig,
    registry: &'a CodecRegistry,
    runtime: Runtime,
}

impl<'a> SchemaResolver<'a> {
    pub fn new(cfg: &'a EncodingConfig, registry: &'a CodecRegistry) -> Self {
        Self {
            cfg,
            registry,
            runtime: Runtime::new(),
        }
    }

    /// Every document of every schema file, in order.
    pub fn decode_all(&self, schemas: Vec<DecoderSlot>) -> PlanResult<Vec<File>> {
        let mut files = Vec::new();
        for slot in schemas {
            let mut d = slot.into_decoder(self.cfg, self.registry);
            while let Some(file) = d.file() {
                files.push(file.clone());
                d.next();
            }
            if let Some(err) = d.take_err() {
                return Err(err);
            }
            d.close();
        }
        Ok(files)
    }

    /// Build one schema value from `schemas`, optionally narrowed by `expr`.
    ///
    /// No files and no expression is not an error: there is simply no
    /// schema.
    pub fn resolve(&self, schemas: &[FileSpec], expr: Option<&Expr>) -> PlanResult<Option<Value>> {
        if schemas.is_empty() {
            return narrow(&[], expr);
        }
        let slots = schemas.iter().cloned().map(DecoderSlot::new).collect();
        let files = self.decode_all(slots)?;
        let inst = self.runtime.build("schema", &files)?;
        narrow(&[&inst], expr)
    }
}

/// Pick the schema value out of the instances that could provide one.
///
/// Without an expression a single context is the schema as a whole. With an
/// expression exactly one context is required and the expression is
/// evaluated in it; a failure is reported against that instance.
pub fn narrow(contexts: &[&Instance], expr: Option<&Expr>) -> PlanResult<Option<Value>> {
    let Some(expr) = expr else {
        return Ok(match contexts {
            [only] => Some(only.value.clone()),
            _ => None,
        });
    };
    let inst = match contexts {
        [] => return Err(PlanError::SchemaWithoutSchema),
        [only] => only,
        _ => return Err(PlanError::MultipleSchemas),
    };
    let value = inst.value.eval(expr);
    if let Some(err) = value.err() {
        return Err(PlanError::Validation(err.in_file(&inst.id)));
    }
    debug!(instance = %inst.id, "resolved schema");
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{Interpretation, Mode};
    use crate::syntax::{parse_expr, parse_file};

    fn inst(id: &str, src: &str) -> Instance {
        Runtime::new()
            .build(id, &[parse_file("s.cue", src).unwrap()])
            .unwrap()
    }

    fn resolver_run(schemas: &[FileSpec], expr: Option<&str>) -> PlanResult<Option<Value>> {
        let cfg = EncodingConfig::new(Mode::Export);
        let registry = CodecRegistry::default();
        let expr = expr.map(|e| parse_expr("--schema", e).unwrap());
        SchemaResolver::new(&cfg, &registry).resolve(schemas, expr.as_ref())
    }

    #[test]
    fn no_files_no_expression_is_absence() {
        assert_eq!(resolver_run(&[], None).unwrap(), None);
    }

    #[test]
    fn expression_without_files_fails() {
        let err = resolver_run(&[], Some("#A")).unwrap_err();
        assert_eq!(err.to_string(), "schema flag specified without a schema");
    }

    #[test]
    fn files_are_decoded_and_narrowed() {
        let spec = FileSpec::new("s.json")
            .with_interpretation(Interpretation::JsonSchema)
            .with_source(
                r#"{"$defs": {"Port": {"type": "integer", "minimum": 1}}, "type": "object"}"#,
            );
        let v = resolver_run(&[spec], Some("#Port")).unwrap().unwrap();
        assert!(v.unify(&Value::Int(0)).is_bottom());
        assert_eq!(v.unify(&Value::Int(80)), Value::Int(80));
    }

    #[test]
    fn two_contexts_with_expression() {
        let a = inst("a", "#A: int");
        let b = inst("b", "#A: string");
        let expr = parse_expr("--schema", "#A").unwrap();
        assert!(matches!(
            narrow(&[&a, &b], Some(&expr)),
            Err(PlanError::MultipleSchemas)
        ));
        assert_eq!(narrow(&[&a, &b], None).unwrap(), None);
    }

    #[test]
    fn failing_expression_names_the_instance() {
        let a = inst("pkg", "#A: int");
        let expr = parse_expr("--schema", "#B").unwrap();
        let err = narrow(&[&a], Some(&expr)).unwrap_err();
        assert!(matches!(err, PlanError::Validation(_)));
        assert!(err.to_string().starts_with("pkg: "), "{}", err);
    }
}
