//! Sorting a unit's data files into schemas and values.

use tracing::debug;

use crate::build::BuildUnit;
use crate::encoding::{CodecRegistry, Decoder, Encoding, EncodingConfig, FileSpec, Form, Interpretation};
use crate::error::{PlanError, PlanResult};

/// A data file and, once something needed to look inside it, its decoder.
///
/// The decoder is opened on first use and kept, so a file peeked at during
/// classification is not read twice.
#[derive(Debug)]
pub struct DecoderSlot {
    spec: FileSpec,
    decoder: Option<Decoder>,
}

impl DecoderSlot {
    pub fn new(spec: FileSpec) -> Self {
        Self {
            spec,
            decoder: None,
        }
    }

    pub fn spec(&self) -> &FileSpec {
        &self.spec
    }

    pub fn is_open(&self) -> bool {
        self.decoder.is_some()
    }

    /// The decoder, opening it if needed.
    pub fn peek(&mut self, cfg: &EncodingConfig, registry: &CodecRegistry) -> &Decoder {
        let spec = &self.spec;
        self.decoder
            .get_or_insert_with(|| Decoder::open(spec, cfg, registry))
    }

    /// Hand over the decoder, opening it if it was never peeked at.
    pub fn into_decoder(self, cfg: &EncodingConfig, registry: &CodecRegistry) -> Decoder {
        match self.decoder {
            Some(d) => d,
            None => Decoder::open(&self.spec, cfg, registry),
        }
    }

    /// Release the decoder if one was opened.
    pub fn close(&mut self) {
        if let Some(d) = self.decoder.as_mut() {
            d.close();
        }
    }
}

/// The outcome of classifying a unit.
#[derive(Debug, Default)]
pub struct Classified {
    pub schemas: Vec<DecoderSlot>,
    pub values: Vec<DecoderSlot>,
}

/// Split the data files of `unit` into schemas and values.
///
/// In import mode the result becomes configuration source, which text
/// protocol buffers cannot be turned into.
pub fn classify(
    unit: &BuildUnit,
    cfg: &EncodingConfig,
    registry: &CodecRegistry,
    importing: bool,
) -> PlanResult<Classified> {
    classify_specs(unit.orphaned.iter().cloned(), cfg, registry, importing)
}

pub(crate) fn classify_specs(
    specs: impl IntoIterator<Item = FileSpec>,
    cfg: &EncodingConfig,
    registry: &CodecRegistry,
    importing: bool,
) -> PlanResult<Classified> {
    let mut out = Classified::default();
    for spec in specs {
        if let Encoding::Other(enc) = &spec.encoding {
            return Err(PlanError::UnsupportedEncoding {
                file: spec.path.clone(),
                encoding: enc.clone(),
            });
        }
        if importing && spec.encoding == Encoding::TextProto {
            return Err(PlanError::TextProtoImport {
                file: spec.path.clone(),
            });
        }
        let mut slot = DecoderSlot::new(spec);
        let is_schema = is_schema(&mut slot, cfg, registry);
        debug!(file = %slot.spec.path, schema = is_schema, "classified data file");
        if is_schema {
            out.schemas.push(slot);
        } else {
            out.values.push(slot);
        }
    }
    Ok(out)
}

fn is_schema(slot: &mut DecoderSlot, cfg: &EncodingConfig, registry: &CodecRegistry) -> bool {
    let spec = &slot.spec;
    if spec.requires_schema() {
        return false;
    }
    if matches!(
        spec.interpretation,
        Some(Interpretation::JsonSchema | Interpretation::OpenApi)
    ) || spec.encoding == Encoding::Protobuf
    {
        return true;
    }
    if !matches!(spec.form, Some(Form::Schema | Form::Final)) {
        return false;
    }
    slot.peek(cfg, registry).interpretation().is_some()
}
