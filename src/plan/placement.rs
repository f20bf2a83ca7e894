//! Placing decoded data files into the configuration namespace.
//!
//! Without flags each object's fields land at the root. `--path` nests an
//! object under labels computed from the object itself, `--list` gathers
//! objects into lists (one list per distinct path) and `--files` keeps every
//! object in a file of its own.

use std::path::Path;

use regex::Regex;
use tracing::debug;

use super::classify::DecoderSlot;
use crate::build::BuildUnit;
use crate::encoding::{CodecRegistry, EncodingConfig};
use crate::error::{PlanError, PlanResult};
use crate::syntax::{parse_expr, parse_file, Decl, Expr, Field, File, Label, Pos, StructLit};
use crate::value::{Runtime, Value};

/// Flags controlling placement.
#[derive(Debug, Clone, Default)]
pub struct PlacementFlags {
    /// `--files`: one output file per object.
    pub files: bool,
    /// `--list`: concatenate objects into lists.
    pub list: bool,
    /// `--path`/`-l`: label expressions or full label paths.
    pub paths: Vec<String>,
    /// `--with-context`: evaluate paths against `{data, filename, index, recordCount}`.
    pub with_context: bool,
    /// `--package`/`-p`.
    pub pkg_name: Option<String>,
    pub force: bool,
    /// Data files of package directories must match this to be placed.
    pub file_filter: Option<Regex>,
}

impl PlacementFlags {
    /// True when any flag asks for explicit placement.
    pub fn any(&self) -> bool {
        self.files || self.list || !self.paths.is_empty()
    }

    /// `--with-context` only means something together with another flag.
    pub fn check(&self) -> PlanResult<()> {
        if self.with_context && !self.any() {
            return Err(PlanError::flag(
                "with-context",
                "flag \"with-context\" must be used with at least one of flag \"path\", \"list\", or \"files\"",
            ));
        }
        Ok(())
    }
}

/// Name of the configuration file generated for `filename`'s `i`th object.
pub fn new_name(filename: &str, i: usize) -> String {
    if filename == "-" {
        return filename.to_string();
    }
    let stem = match Path::new(filename).extension() {
        Some(ext) => &filename[..filename.len() - ext.len() - 1],
        None => filename,
    };
    if i > 0 {
        format!("{}-{}.cue", stem, i)
    } else {
        format!("{}.cue", stem)
    }
}

/// Objects gathered per label path for `--list`.
#[derive(Debug, Default)]
struct ListIndex {
    elems: Option<Vec<Expr>>,
    children: Vec<(Label, ListIndex)>,
}

impl ListIndex {
    fn at(&mut self, path: &[Label]) -> &mut ListIndex {
        let Some((first, rest)) = path.split_first() else {
            return self;
        };
        let pos = match self.children.iter().position(|(l, _)| l.name() == first.name()) {
            Some(pos) => pos,
            None => {
                self.children.push((first.clone(), ListIndex::default()));
                self.children.len() - 1
            }
        };
        self.children[pos].1.at(rest)
    }

    fn push(&mut self, path: &[Label], expr: Expr) {
        self.at(path).elems.get_or_insert_with(Vec::new).push(expr);
    }

    fn is_empty(&self) -> bool {
        self.elems.is_none() && self.children.is_empty()
    }

    fn field_decls(children: Vec<(Label, ListIndex)>) -> Vec<Decl> {
        children
            .into_iter()
            .map(|(label, idx)| Decl::Field(Field::new(label, idx.into_expr())))
            .collect()
    }

    fn into_expr(self) -> Expr {
        let list = self.elems.map(Expr::list);
        let fields = (!self.children.is_empty()).then(|| {
            Expr::Struct(StructLit {
                decls: Self::field_decls(self.children),
                pos: Pos::default(),
            })
        });
        match (list, fields) {
            (Some(l), Some(s)) => Expr::Unify(Box::new(l), Box::new(s)),
            (Some(l), None) => l,
            (None, Some(s)) => s,
            (None, None) => Expr::structure(Vec::<(String, Expr)>::new()),
        }
    }

    /// Root declarations: a root list is embedded, labelled lists are fields.
    fn into_decls(self) -> Vec<Decl> {
        let mut decls = Self::field_decls(self.children);
        if let Some(elems) = self.elems {
            decls.push(Decl::Embed(Expr::list(elems)));
        }
        decls
    }
}

/// Builds one output file from a sequence of objects.
struct Placer<'f> {
    flags: &'f PlacementFlags,
    runtime: Runtime,
    decls: Vec<Decl>,
    index: ListIndex,
}

impl<'f> Placer<'f> {
    fn new(flags: &'f PlacementFlags) -> Self {
        Self {
            flags,
            runtime: Runtime::new(),
            decls: Vec::new(),
            index: ListIndex::default(),
        }
    }

    /// Place object `i` of the `count` objects decoded from `filename`.
    fn add(&mut self, filename: &str, i: usize, count: usize, obj: &File) -> PlanResult<()> {
        let expr = obj.to_expr();
        let labels = if self.flags.paths.is_empty() {
            Vec::new()
        } else {
            self.labels(filename, i, count, &expr)?
        };

        if self.flags.list {
            self.index.push(&labels, expr);
            return Ok(());
        }
        let Some((first, rest)) = labels.split_first() else {
            return match expr {
                Expr::Struct(lit) => {
                    self.decls.extend(lit.decls);
                    Ok(())
                }
                Expr::List(_) => Err(PlanError::placement(
                    "expected struct as object root, did you mean to use the --list flag?",
                )),
                _ => Err(PlanError::placement("cannot map non-struct to object root")),
            };
        };
        let value = rest.iter().rev().fold(expr, |inner, label| {
            Expr::Struct(StructLit {
                decls: vec![Decl::Field(Field::new(label.clone(), inner))],
                pos: Pos::default(),
            })
        });
        self.decls.push(Decl::Field(Field::new(first.clone(), value)));
        Ok(())
    }

    fn labels(&self, filename: &str, i: usize, count: usize, expr: &Expr) -> PlanResult<Vec<Label>> {
        let scope_expr = if self.flags.with_context {
            Expr::structure([
                ("data", expr.clone()),
                ("filename", Expr::string(filename)),
                ("index", Expr::int(i as i64)),
                ("recordCount", Expr::int(count as i64)),
            ])
        } else {
            expr.clone()
        };
        let scope = self.runtime.compile_file(&File::from_expr(filename, scope_expr));

        let mut labels = Vec::new();
        for path in &self.flags.paths {
            match parse_expr("--path", path) {
                Ok(e) => {
                    let v = scope.eval(&e);
                    match v.resolved() {
                        Value::String(s) => labels.push(Label::data(s.as_str())),
                        other => {
                            let reason = match other.err() {
                                Some(err) => err.to_string(),
                                None => format!("expected string, found {}", other.type_name()),
                            };
                            return Err(PlanError::flag(
                                "path",
                                format!("unsupported label path type: {}", reason),
                            ));
                        }
                    }
                }
                Err(_) => {
                    let full = parse_full_path(path).map_err(|err| {
                        PlanError::flag(
                            "path",
                            format!(
                                "labels must be expressions (-l foo -l '\"bar\"') or full paths (-l '\"foo\": \"bar\":'): {}",
                                err
                            ),
                        )
                    })?;
                    labels.extend(full);
                }
            }
        }
        Ok(labels)
    }

    fn finish(mut self, filename: String, pkg: Option<&str>) -> File {
        if !self.index.is_empty() {
            self.decls.extend(self.index.into_decls());
        }
        File {
            filename,
            package: pkg.map(str::to_string),
            decls: self.decls,
        }
    }
}

/// Parse a label path such as `a: "b":` into its labels.
fn parse_full_path(path: &str) -> PlanResult<Vec<Label>> {
    let file = parse_file("--path", &format!("{}_", path))
        .map_err(|err| PlanError::flag("path", format!("parser error in path {:?}: {}", path, err)))?;
    let [decl] = file.decls.as_slice() else {
        return Err(PlanError::flag(
            "path",
            "path flag must be a space-separated sequence of labels",
        ));
    };
    let mut labels = Vec::new();
    let mut decl = decl;
    loop {
        let Decl::Field(field) = decl else {
            return Err(PlanError::flag("path", format!("{:?} not a sequence of labels", path)));
        };
        labels.push(field.label.clone());
        match &field.value {
            Expr::Struct(lit) => match lit.decls.as_slice() {
                [inner] => decl = inner,
                _ => {
                    return Err(PlanError::flag("path", "path value may not contain a struct"))
                }
            },
            _ => break,
        }
    }
    Ok(labels)
}

/// Decode the `values` of `unit` and add the placed files to its syntax.
///
/// Returns the placed files, or `None` when a data file of a package
/// directory does not match the file filter and nothing was placed.
pub fn place_orphans(
    unit: &mut BuildUnit,
    values: Vec<DecoderSlot>,
    flags: &PlacementFlags,
    importing: bool,
    cfg: &EncodingConfig,
    registry: &CodecRegistry,
) -> PlanResult<Option<Vec<File>>> {
    let pkg = match (&flags.pkg_name, &unit.pkg_name) {
        (Some(flag), Some(existing)) if flag != existing && !flags.force => {
            return Err(PlanError::flag(
                "package",
                format!(
                    "\"package\" flag clashes with existing package name ({} vs {})",
                    flag, existing
                ),
            ))
        }
        (Some(flag), _) => Some(flag.clone()),
        (None, existing) => existing.clone(),
    };

    if !unit.user {
        if let Some(re) = &flags.file_filter {
            let all_match = values.iter().all(|slot| {
                let base = Path::new(&slot.spec().path)
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("");
                re.is_match(base)
            });
            if !all_match {
                return Ok(None);
            }
        }
    }

    let cfg = match &unit.module_root {
        Some(root) => cfg.with_proto_path(root.clone()),
        None => cfg.clone(),
    };

    let mut files = Vec::new();
    let mut shared_list: Option<(String, Placer)> = None;
    for slot in values {
        let mut d = slot.into_decoder(&cfg, registry);
        let filename = d.filename().to_string();
        let mut objs = Vec::new();
        while let Some(file) = d.file() {
            let mut obj = file.clone();
            obj.filename = new_name(&filename, 0);
            objs.push(obj);
            d.next();
        }
        if let Some(err) = d.take_err() {
            return Err(err);
        }
        d.close();

        if flags.files {
            for (i, obj) in objs.iter().enumerate() {
                let mut placer = Placer::new(flags);
                placer.add(&filename, i, objs.len(), obj)?;
                files.push(placer.finish(new_name(&filename, i), pkg.as_deref()));
            }
            continue;
        }
        if importing && objs.len() > 1 && flags.paths.is_empty() && !flags.list {
            return Err(PlanError::placement(format!(
                "path, list, or files flag needed to handle multiple objects in file {}",
                filename
            )));
        }
        if !flags.list && flags.paths.is_empty() && !flags.with_context {
            for mut obj in objs {
                if pkg.is_some() {
                    obj.package = pkg.clone();
                }
                files.push(obj);
            }
        } else if flags.list {
            let (_, placer) =
                shared_list.get_or_insert_with(|| (new_name(&filename, 0), Placer::new(flags)));
            for (i, obj) in objs.iter().enumerate() {
                placer.add(&filename, i, objs.len(), obj)?;
            }
        } else {
            let mut placer = Placer::new(flags);
            for (i, obj) in objs.iter().enumerate() {
                placer.add(&filename, i, objs.len(), obj)?;
            }
            files.push(placer.finish(new_name(&filename, 0), pkg.as_deref()));
        }
    }
    if let Some((name, placer)) = shared_list {
        files.push(placer.finish(name, pkg.as_deref()));
    }

    debug!(unit = %unit.display_path, files = files.len(), "placed data files");
    for f in &files {
        unit.add_syntax(f.clone());
    }
    Ok(Some(files))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{FileSpec, Mode};
    use crate::syntax::format_file;

    fn unit(files: &[(&str, &str)]) -> (BuildUnit, Vec<DecoderSlot>) {
        let mut u = BuildUnit::new(true, ".", "args");
        let mut slots = Vec::new();
        for (name, src) in files {
            let spec = FileSpec::new(*name).with_source(*src);
            u.orphaned.push(spec.clone());
            slots.push(DecoderSlot::new(spec));
        }
        (u, slots)
    }

    fn place(files: &[(&str, &str)], flags: PlacementFlags, importing: bool) -> PlanResult<Vec<String>> {
        let (mut u, slots) = unit(files);
        let cfg = EncodingConfig::new(Mode::Export);
        let placed = place_orphans(&mut u, slots, &flags, importing, &cfg, &CodecRegistry::default())?
            .unwrap_or_default();
        Ok(placed
            .iter()
            .map(|f| format!("{}\n{}", f.filename, format_file(f, 4)))
            .collect())
    }

    #[test]
    fn names() {
        assert_eq!(new_name("data/x.json", 0), "data/x.cue");
        assert_eq!(new_name("data/x.json", 2), "data/x-2.cue");
        assert_eq!(new_name("-", 3), "-");
        assert_eq!(new_name("noext", 0), "noext.cue");
    }

    #[test]
    fn root_placement_keeps_objects_separate() {
        let out = place(&[("a.json", r#"{"a": 1}"#), ("b.yaml", "b: 2")], PlacementFlags::default(), false)
            .unwrap();
        assert_eq!(out, vec!["a.cue\na: 1\n", "b.cue\nb: 2\n"]);
    }

    #[test]
    fn path_nests_under_evaluated_labels() {
        let flags = PlacementFlags {
            paths: vec!["kind".into(), "name".into()],
            ..Default::default()
        };
        let out = place(&[("a.yaml", "kind: svc\nname: web\nport: 80\n")], flags, false).unwrap();
        assert_eq!(
            out,
            vec!["a.cue\nsvc: {\n    web: {\n        kind: \"svc\"\n        name: \"web\"\n        port: 80\n    }\n}\n"]
        );
    }

    #[test]
    fn full_label_paths() {
        let flags = PlacementFlags {
            paths: vec!["\"x\": y:".into()],
            ..Default::default()
        };
        let out = place(&[("a.json", r#"{"a": 1}"#)], flags, false).unwrap();
        assert_eq!(out, vec!["a.cue\nx: {\n    y: {\n        a: 1\n    }\n}\n"]);
    }

    #[test]
    fn list_shares_one_list_per_path_across_files() {
        let flags = PlacementFlags {
            list: true,
            paths: vec!["\"items\"".into()],
            ..Default::default()
        };
        let out = place(&[("a.json", r#"{"a": 1}"#), ("b.json", r#"{"a": 1}"#)], flags, false).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(
            out[0],
            "a.cue\nitems: [\n    {\n        a: 1\n    },\n    {\n        a: 1\n    },\n]\n"
        );
    }

    #[test]
    fn root_list_is_embedded() {
        let flags = PlacementFlags {
            list: true,
            ..Default::default()
        };
        let out = place(&[("a.yaml", "1\n---\n2\n")], flags, false).unwrap();
        assert_eq!(out, vec!["a.cue\n[1, 2]\n"]);
    }

    #[test]
    fn with_context_exposes_record_fields() {
        let flags = PlacementFlags {
            paths: vec!["filename".into(), "data.name".into()],
            with_context: true,
            ..Default::default()
        };
        let out = place(&[("a.json", r#"{"name": "n"}"#)], flags, false).unwrap();
        assert_eq!(
            out,
            vec!["a.cue\n\"a.json\": {\n    n: {\n        name: \"n\"\n    }\n}\n"]
        );
    }

    #[test]
    fn files_flag_splits_objects() {
        let flags = PlacementFlags {
            files: true,
            pkg_name: Some("cfg".into()),
            ..Default::default()
        };
        let out = place(&[("a.yaml", "a: 1\n---\nb: 2\n")], flags, true).unwrap();
        assert_eq!(out, vec!["a.cue\npackage cfg\n\na: 1\n", "a-1.cue\npackage cfg\n\nb: 2\n"]);
    }

    #[test]
    fn import_of_several_objects_needs_a_flag() {
        let err = place(&[("a.yaml", "a: 1\n---\nb: 2\n")], PlacementFlags::default(), true).unwrap_err();
        assert_eq!(
            err.to_string(),
            "path, list, or files flag needed to handle multiple objects in file a.yaml"
        );
    }

    #[test]
    fn non_struct_roots() {
        let flags = PlacementFlags {
            paths: Vec::new(),
            files: true,
            ..Default::default()
        };
        let err = place(&[("a.json", "[1]")], flags.clone(), false).unwrap_err();
        assert!(err.to_string().contains("did you mean to use the --list flag?"));
        let err = place(&[("a.json", "1")], flags, false).unwrap_err();
        assert_eq!(err.to_string(), "cannot map non-struct to object root");
    }

    #[test]
    fn package_clash() {
        let (mut u, slots) = unit(&[("a.json", "{}")]);
        u.pkg_name = Some("old".into());
        let flags = PlacementFlags {
            pkg_name: Some("new".into()),
            ..Default::default()
        };
        let cfg = EncodingConfig::new(Mode::Export);
        let err = place_orphans(&mut u, slots, &flags, false, &cfg, &CodecRegistry::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "\"package\" flag clashes with existing package name (new vs old)"
        );
    }

    #[test]
    fn with_context_alone_is_rejected() {
        let flags = PlacementFlags {
            with_context: true,
            ..Default::default()
        };
        assert!(flags.check().unwrap_err().to_string().contains("with-context"));
    }
}
