//! Build plan assembly.
//!
//! A [`BuildPlan`] is assembled once from the loaded [`BuildUnit`]s and the
//! command's flags. Assembly decides which data files act as schemas, which
//! are placed into configuration and which are streamed, and fixes the
//! iterator that will produce the command's values.

mod classify;
mod iter;
mod placement;
mod schema;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

pub use classify::{classify, Classified, DecoderSlot};
pub use iter::{ExprIter, InstanceIter, PlanIter, StreamIter};
pub use placement::{new_name, place_orphans, PlacementFlags};
pub use schema::{narrow, SchemaResolver};

use crate::build::BuildUnit;
use crate::encoding::{CodecRegistry, EncodingConfig};
use crate::error::{PlanError, PlanResult};
use crate::syntax::{parse_expr, Expr, File};
use crate::value::{Instance, Runtime};

/// Flags that shape a build plan.
#[derive(Debug, Clone, Default)]
pub struct PlanFlags {
    /// `-e`: expressions evaluated against every value.
    pub expressions: Vec<String>,
    /// `-d/--schema`: selects the schema data is checked against.
    pub schema: Option<String>,
    /// Fold data files into configuration rather than streaming them.
    pub merge: bool,
    pub placement: PlacementFlags,
    /// Producing new configuration source from data.
    pub importing: bool,
}

impl PlanFlags {
    pub fn new() -> Self {
        Self {
            merge: true,
            ..Default::default()
        }
    }
}

/// Everything a command needs to produce its values.
#[derive(Debug)]
pub struct BuildPlan {
    pub cfg: EncodingConfig,
    pub registry: CodecRegistry,
    instances: Vec<PlanResult<Instance>>,
    orphan_schema: Option<Instance>,
    orphaned: Vec<DecoderSlot>,
    /// Files produced by placement, in import mode the files to write.
    pub imported: Vec<File>,
    expressions: Vec<(String, Expr)>,
    schema_label: Option<String>,
}

impl BuildPlan {
    /// Values are streamed from data files rather than taken from instances.
    pub fn is_streaming(&self) -> bool {
        !self.orphaned.is_empty()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn expression_count(&self) -> usize {
        self.expressions.len()
    }

    /// The iterator over the plan's values. Consumes the plan's sources; a
    /// second call yields nothing.
    pub fn iter(&mut self) -> PlanIter {
        let base = if self.orphaned.is_empty() {
            let schema = self.orphan_schema.take().map(|i| i.value);
            PlanIter::Instances(
                InstanceIter::new(std::mem::take(&mut self.instances)).with_orphan_schema(schema),
            )
        } else {
            PlanIter::Stream(StreamIter::new(
                std::mem::take(&mut self.orphaned),
                self.cfg.clone(),
                self.registry.clone(),
                self.schema_label.clone(),
            ))
        };
        if self.expressions.is_empty() {
            base
        } else {
            PlanIter::Expressions(ExprIter::new(base, self.expressions.clone()))
        }
    }
}

/// Assemble the plan for `units`.
///
/// Any failure aborts assembly; no partial plan is returned.
pub fn assemble(
    units: Vec<BuildUnit>,
    flags: &PlanFlags,
    mut cfg: EncodingConfig,
    registry: CodecRegistry,
) -> PlanResult<BuildPlan> {
    if units.iter().filter(|u| u.user).count() > 1 {
        return Err(PlanError::TwoFilePackages);
    }

    let expressions = flags
        .expressions
        .iter()
        .map(|src| parse_expr("--expression", src).map(|e| (src.clone(), e)))
        .collect::<PlanResult<Vec<_>>>()?;
    let schema_expr = flags
        .schema
        .as_deref()
        .map(|src| parse_expr("--schema", src))
        .transpose()?;
    if expressions.len() > 1 {
        cfg.stream = true;
    }
    if !flags.importing {
        flags.placement.check()?;
    }

    let runtime = Runtime::new();
    let mut packages: Vec<BuildUnit> = Vec::new();
    let mut orphan_unit: Option<BuildUnit> = None;
    let mut imported = Vec::new();
    let mut seen: HashSet<PathBuf> = HashSet::new();

    for mut unit in units {
        if let Some(err) = unit.err.take() {
            return Err(err);
        }
        if unit.user {
            orphan_unit = Some(unit);
            continue;
        }
        if flags.importing && !unit.orphaned.is_empty() {
            let fresh: Vec<_> = std::mem::take(&mut unit.orphaned)
                .into_iter()
                .filter(|spec| seen.insert(absolute(&spec.path)))
                .collect();
            let classified = classify::classify_specs(fresh.clone(), &cfg, &registry, true)?;
            unit.orphaned = fresh;
            let schemas = SchemaResolver::new(&cfg, &registry).decode_all(classified.schemas)?;
            for file in schemas {
                let file = import_schema_file(file, flags, &unit);
                imported.push(file.clone());
                unit.add_syntax(file);
            }
            if !classified.values.is_empty() {
                let placed = place_orphans(
                    &mut unit,
                    classified.values,
                    &flags.placement,
                    true,
                    &cfg,
                    &registry,
                )?;
                imported.extend(placed.unwrap_or_default());
            }
        }
        packages.push(unit);
    }

    let mut streaming: Vec<DecoderSlot> = Vec::new();
    let mut orphan_schema = None;
    if let Some(mut unit) = orphan_unit {
        let Classified { schemas, values } = classify(&unit, &cfg, &registry, flags.importing)?;
        let had_schema_files = !schemas.is_empty();
        let had_syntax = !unit.syntax.is_empty();
        let had_values = !values.is_empty();

        let schema_files = SchemaResolver::new(&cfg, &registry).decode_all(schemas)?;
        for file in schema_files {
            let file = if flags.importing {
                let file = import_schema_file(file, flags, &unit);
                imported.push(file.clone());
                file
            } else {
                file
            };
            unit.add_syntax(file);
        }

        let place = schema_expr.is_none()
            && (flags.importing
                || flags.placement.any()
                || (flags.merge && unit.syntax.len() + values.len() > 1));
        if had_values {
            if place {
                let placed = place_orphans(
                    &mut unit,
                    values,
                    &flags.placement,
                    flags.importing,
                    &cfg,
                    &registry,
                )?;
                imported.extend(placed.unwrap_or_default());
            } else {
                streaming = values;
            }
        }
        debug!(
            unit = %unit.display_path,
            placed = had_values && place,
            streamed = streaming.len(),
            "assembled file arguments"
        );

        if !unit.syntax.is_empty() {
            if had_schema_files && !had_syntax && !had_values && !packages.is_empty() {
                orphan_schema = Some(runtime.build(&unit.display_path, &unit.syntax)?);
            } else {
                packages.push(unit);
            }
        }
    }

    let mut instances: Vec<PlanResult<Instance>> = packages
        .iter()
        .map(|u| runtime.build(&u.display_path, &u.syntax))
        .collect();

    let mut schema_label = None;
    if !streaming.is_empty() || schema_expr.is_some() {
        let built = instances.into_iter().collect::<PlanResult<Vec<_>>>()?;
        if !streaming.is_empty() && schema_expr.is_none() && built.len() > 1 {
            return Err(PlanError::StreamWithMultipleInstances);
        }
        let contexts: Vec<&Instance> = built.iter().collect();
        let schema = narrow(&contexts, schema_expr.as_ref())?;
        if !streaming.is_empty() {
            schema_label = match (&flags.schema, built.as_slice()) {
                (Some(src), _) => Some(src.clone()),
                (None, [only]) => Some(only.id.clone()),
                _ => None,
            };
            if let Some(schema) = schema {
                cfg.set_schema(schema)?;
            }
            cfg.stream = true;
            instances = Vec::new();
        } else {
            instances = built.into_iter().map(Ok).collect();
        }
    }

    info!(
        instances = instances.len(),
        streamed = streaming.len(),
        expressions = expressions.len(),
        imported = imported.len(),
        "build plan assembled"
    );
    Ok(BuildPlan {
        cfg,
        registry,
        instances,
        orphan_schema,
        orphaned: streaming,
        imported,
        expressions,
        schema_label,
    })
}

/// A decoded schema file as it is written out by import.
fn import_schema_file(mut file: File, flags: &PlanFlags, unit: &BuildUnit) -> File {
    file.filename = new_name(&file.filename, 0);
    if let Some(pkg) = flags.placement.pkg_name.as_ref().or(unit.pkg_name.as_ref()) {
        file.package = Some(pkg.clone());
    }
    file
}

fn absolute(path: &str) -> PathBuf {
    std::path::absolute(Path::new(path)).unwrap_or_else(|_| PathBuf::from(path))
}
