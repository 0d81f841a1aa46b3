use crate::{
    block::{Origin, RawMessage, ReportFile},
    codec::{CheckDigits, FieldReader},
    config::DecoderConfig,
    cursor::{BitCursor, TextCursor},
    descriptor::Descriptor,
    errors::{Error, Result},
    message::{Encoding, Message, Subset, Value, Variable},
    opcodes::Opcodes,
    structs::{
        bufr::{BufrMessage, INDICATOR as BUFR_INDICATOR, MessageVersion},
        crex::{SubsetEnd, parse_description, parse_subset_end, parse_trailer},
    },
    tables::{CachedProvider, DescriptorTable, FileTableProvider, TableProvider},
};
use crextables::Fxy;
use std::sync::Arc;

/// Counter read in front of a CREX delayed replication group.
pub const IMPLICIT_DELAYED_COUNTER: Fxy = Fxy::new(0, 31, 1);

/// Interpreter state for one message. Check digits and the work budgets
/// carry over from one subset to the next.
///
/// `max_variables` bounds three counts separately: stored variables, Table D
/// expansions and replication passes.
pub struct Engine<'t, R: FieldReader> {
    table: &'t DescriptorTable,
    reader: R,
    check_digits: CheckDigits,
    max_variables: usize,
    max_nesting: usize,
    decoded: usize,
    expansions: usize,
    repetitions: usize,
    depth: usize,
}

impl<'t, R: FieldReader> Engine<'t, R> {
    pub fn new(
        table: &'t DescriptorTable,
        reader: R,
        check_digits: CheckDigits,
        config: &DecoderConfig,
    ) -> Self {
        Self {
            table,
            reader,
            check_digits,
            max_variables: config.max_variables,
            max_nesting: config.max_nesting,
            decoded: 0,
            expansions: 0,
            repetitions: 0,
            depth: 0,
        }
    }

    pub fn reader(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Variables decoded so far across all subsets.
    pub fn decoded(&self) -> usize {
        self.decoded
    }

    /// Consumes `opcodes`, appending every decoded variable to `subset`.
    pub fn run(&mut self, mut opcodes: Opcodes, subset: &mut Subset) -> Result<()> {
        while !opcodes.is_empty() {
            let fxy = opcodes.pop_front()?;
            match Descriptor::from(fxy) {
                Descriptor::Element(code) => {
                    self.decode_element(code, subset)?;
                }
                Descriptor::Replication { group_size, count } => {
                    let counter = if count == 0 {
                        Some(self.delayed_counter(&mut opcodes, group_size)?)
                    } else {
                        None
                    };
                    let group = opcodes
                        .pop_front_n(group_size)
                        .map_err(|e| e.at(self.reader.offset()))?;
                    let times = match counter {
                        Some(code) => self.decode_counter(code, subset)?,
                        None => count,
                    };
                    self.replicate(group, times, subset)?;
                }
                Descriptor::Modifier { .. } => {
                    return Err(Error::UnsupportedModifier {
                        fxy,
                        offset: self.reader.offset(),
                    });
                }
                Descriptor::Sequence(code) => {
                    let expansion = self
                        .table
                        .lookup_sequence(code)
                        .map_err(|e| e.at(self.reader.offset()))?;
                    // a Table D entry that refers back to itself never decodes anything
                    self.expansions += 1;
                    if self.expansions > self.max_variables {
                        return Err(Error::TooManyVariables {
                            limit: self.max_variables,
                            offset: self.reader.offset(),
                        });
                    }
                    opcodes.splice_in_place_of_current(expansion);
                }
            }
        }
        Ok(())
    }

    fn delayed_counter(&mut self, opcodes: &mut Opcodes, group_size: usize) -> Result<Fxy> {
        if !R::EXPLICIT_DELAYED_COUNTER {
            return Ok(IMPLICIT_DELAYED_COUNTER);
        }
        let offset = self.reader.offset();
        let code = opcodes
            .pop_front()
            .map_err(|_| Error::InsufficientOpcodes {
                requested: group_size + 1,
                available: 0,
                offset,
            })?;
        if code.f() != 0 || code.x() != 31 {
            return Err(Error::framing(
                offset,
                format!("delayed replication followed by {code}, expected a class 31 counter"),
            ));
        }
        Ok(code)
    }

    fn decode_element(&mut self, code: Fxy, subset: &mut Subset) -> Result<Value> {
        let offset = self.reader.offset();
        let entry = Arc::clone(self.table.lookup_element(code).map_err(|e| e.at(offset))?);
        let value = self.reader.read_field(&entry, &mut self.check_digits)?;

        if self.decoded >= self.max_variables {
            return Err(Error::TooManyVariables {
                limit: self.max_variables,
                offset,
            });
        }
        self.decoded += 1;
        subset.push(Variable::new(entry, value.clone()));
        Ok(value)
    }

    fn decode_counter(&mut self, code: Fxy, subset: &mut Subset) -> Result<usize> {
        let offset = self.reader.offset();
        let value = self.decode_element(code, subset)?;
        match value.as_f64() {
            Some(n) if n >= 0.0 && n.fract() == 0.0 && n <= u32::MAX as f64 => Ok(n as usize),
            _ => Err(Error::MalformedValue {
                fxy: code,
                text: value.to_string(),
                offset,
            }),
        }
    }

    fn replicate(&mut self, group: Opcodes, times: usize, subset: &mut Subset) -> Result<()> {
        if self.depth >= self.max_nesting {
            return Err(Error::NestingTooDeep {
                limit: self.max_nesting,
                offset: self.reader.offset(),
            });
        }
        if group.is_empty() {
            return Ok(());
        }

        self.depth += 1;
        let result = (0..times).try_for_each(|_| {
            // nested groups can loop without storing anything
            self.repetitions += 1;
            if self.repetitions > self.max_variables {
                return Err(Error::TooManyVariables {
                    limit: self.max_variables,
                    offset: self.reader.offset(),
                });
            }
            self.run(group.clone(), subset)
        });
        self.depth -= 1;
        result
    }
}

/// Decodes whole messages against tables from a [`TableProvider`].
pub struct Decoder<P: TableProvider = CachedProvider<FileTableProvider>> {
    provider: P,
    config: DecoderConfig,
}

impl Decoder {
    /// A decoder reading compiled tables from the configured directory.
    pub fn from_config(config: DecoderConfig) -> Self {
        let provider = CachedProvider::new(FileTableProvider::new(config.tables_path()));
        Decoder { provider, config }
    }
}

impl<P: TableProvider> Decoder<P> {
    pub fn new(provider: P) -> Self {
        Self::with_config(provider, DecoderConfig::default())
    }

    pub fn with_config(provider: P, config: DecoderConfig) -> Self {
        Decoder { provider, config }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Decodes a CREX or BUFR message, told apart by its indicator.
    pub fn decode(&self, data: &[u8], origin: Origin) -> Result<Message> {
        let start = data
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(data.len());
        let head = &data[start..(start + BUFR_INDICATOR.len()).min(data.len())];
        if !head.is_empty() && BUFR_INDICATOR.starts_with(head) {
            self.decode_bufr(&data[start..], origin)
        } else {
            self.decode_crex(data, origin)
        }
    }

    pub fn decode_raw(&self, raw: &RawMessage) -> Result<Message> {
        match raw.encoding {
            Encoding::Crex => self.decode_crex(&raw.data, raw.origin.clone()),
            Encoding::Bufr => self.decode_bufr(&raw.data, raw.origin.clone()),
        }
    }

    /// Decodes every message of `file`, logging and skipping failures.
    pub fn decode_all(&self, file: &ReportFile) -> Vec<Message> {
        file.messages()
            .iter()
            .filter_map(|raw| match self.decode_raw(raw) {
                Ok(message) => Some(message),
                Err(e) => {
                    tracing::warn!(
                        source = %raw.origin.source,
                        offset = raw.origin.offset,
                        error_offset = ?e.offset(),
                        error = %e,
                        "skipping undecodable message"
                    );
                    None
                }
            })
            .collect()
    }

    pub fn decode_crex(&self, data: &[u8], origin: Origin) -> Result<Message> {
        let mut cursor = TextCursor::new(data);
        let description = parse_description(&mut cursor)?;
        let table = self.provider.load(&description.table_key())?;

        let check_digits = if description.check_digits {
            CheckDigits::enabled(self.config.verify_check_digits)
        } else {
            CheckDigits::disabled()
        };
        let mut engine = Engine::new(&table, cursor, check_digits, &self.config);

        let mut subsets = vec![];
        loop {
            let mut subset = Subset::new();
            engine.run(description.descriptors.clone(), &mut subset)?;
            subsets.push(subset);
            if parse_subset_end(engine.reader())? == SubsetEnd::Last {
                break;
            }
        }
        parse_trailer(engine.reader())?;

        let message = Message {
            header: description.header(),
            origin,
            subsets,
        };
        tracing::debug!(
            origin = %message.origin,
            subsets = message.subset_count(),
            variables = message.variable_count(),
            "decoded CREX message"
        );
        Ok(message)
    }

    pub fn decode_bufr(&self, data: &[u8], origin: Origin) -> Result<Message> {
        let bufr = BufrMessage::parse(data)?;
        if bufr.is_compressed() {
            return Err(Error::Unsupported("compressed BUFR data".to_string()));
        }

        let table = self.provider.load(&bufr.table_key())?;
        let descriptors = Opcodes::from(bufr.descriptors()?);
        let cursor = BitCursor::with_base_offset(bufr.data_block(), bufr.data_offset());
        let mut engine = Engine::new(&table, cursor, CheckDigits::disabled(), &self.config);

        let mut subsets = Vec::with_capacity(bufr.subsets_count() as usize);
        for _ in 0..bufr.subsets_count() {
            let mut subset = Subset::new();
            engine.run(descriptors.clone(), &mut subset)?;
            subsets.push(subset);
        }

        let message = Message {
            header: bufr.header(),
            origin,
            subsets,
        };
        tracing::debug!(
            origin = %message.origin,
            edition = bufr.edition(),
            subsets = message.subset_count(),
            variables = message.variable_count(),
            "decoded BUFR message"
        );
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::MemoryTableProvider;
    use crextables::prelude::{BTableEntry, DTableEntry};

    fn element(x: u8, y: u16, width: u32) -> BTableEntry {
        BTableEntry {
            fxy: Fxy::new(0, x, y),
            class_name_en: "Test".into(),
            element_name_en: format!("Element {x:02}{y:03}"),
            bufr_unit: "Numeric".into(),
            bufr_scale: 0,
            bufr_reference_value: 0,
            bufr_datawidth_bits: 8,
            crex_unit: Some("Numeric".into()),
            crex_scale: Some(0),
            crex_datawidth_char: Some(width),
            note_en: None,
            status: None,
        }
    }

    fn table() -> DescriptorTable {
        DescriptorTable::new(
            vec![element(1, 1, 2), element(1, 2, 3), element(31, 1, 3)],
            vec![DTableEntry {
                fxy: Fxy::new(3, 1, 1),
                fxy_chain: vec![Fxy::new(0, 1, 1), Fxy::new(0, 1, 2)],
                category: None,
                title_en: None,
                status: None,
            }],
        )
    }

    fn run(table: &DescriptorTable, codes: Vec<Fxy>, data: &[u8]) -> Result<Subset> {
        let mut engine = Engine::new(
            table,
            TextCursor::new(data),
            CheckDigits::disabled(),
            &DecoderConfig::default(),
        );
        let mut subset = Subset::new();
        engine.run(Opcodes::from(codes), &mut subset)?;
        Ok(subset)
    }

    #[test]
    fn sequence_expands_in_place() {
        let table = table();
        let subset = run(
            &table,
            vec![Fxy::new(3, 1, 1), Fxy::new(0, 1, 1)],
            b"11 222 33",
        )
        .unwrap();
        let values: Vec<f64> = subset.iter().filter_map(|v| v.as_f64()).collect();
        assert_eq!(values, vec![11.0, 222.0, 33.0]);
    }

    #[test]
    fn implicit_counter_is_stored() {
        let table = table();
        let subset = run(
            &table,
            vec![Fxy::new(1, 1, 0), Fxy::new(0, 1, 1)],
            b"002 10 20",
        )
        .unwrap();
        assert_eq!(
            subset.codes(),
            vec![Fxy::new(0, 31, 1), Fxy::new(0, 1, 1), Fxy::new(0, 1, 1)]
        );
    }

    #[test]
    fn missing_counter_is_malformed() {
        let table = table();
        let err = run(&table, vec![Fxy::new(1, 1, 0), Fxy::new(0, 1, 1)], b"///").unwrap_err();
        assert!(matches!(err, Error::MalformedValue { offset: 0, .. }));
    }

    #[test]
    fn decoder_sniffs_the_encoding() {
        let decoder = Decoder::new(MemoryTableProvider::with_fallback(table()));
        let message = decoder
            .decode(b"\r\nCREX++ T010001 A003 B01001++ 42++ 7777", Origin::default())
            .unwrap();
        assert_eq!(message.encoding(), Encoding::Crex);

        assert!(matches!(
            decoder.decode(b"BU", Origin::default()),
            Err(Error::PrematureEndOfMessage { .. })
        ));
        assert!(matches!(
            decoder.decode(b"GRIB", Origin::default()),
            Err(Error::NotThisFormat { .. })
        ));
    }
}
