#![allow(dead_code)]

use crextables::prelude::{BTableEntry, DTableEntry};
use librcrex::{DescriptorTable, Fxy, MemoryTableProvider};

pub fn numeric(
    x: u8,
    y: u16,
    name: &str,
    crex_width: u32,
    bits: u32,
    scale: i32,
    reference: i32,
) -> BTableEntry {
    BTableEntry {
        fxy: Fxy::new(0, x, y),
        class_name_en: "Test".into(),
        element_name_en: name.into(),
        bufr_unit: "Numeric".into(),
        bufr_scale: scale,
        bufr_reference_value: reference,
        bufr_datawidth_bits: bits,
        crex_unit: Some("Numeric".into()),
        crex_scale: Some(scale),
        crex_datawidth_char: Some(crex_width),
        note_en: None,
        status: None,
    }
}

pub fn string(x: u8, y: u16, name: &str, chars: u32) -> BTableEntry {
    BTableEntry {
        bufr_unit: "CCITT IA5".into(),
        crex_unit: Some("Character".into()),
        ..numeric(x, y, name, chars, chars * 8, 0, 0)
    }
}

pub fn sequence(x: u8, y: u16, chain: &[Fxy]) -> DTableEntry {
    DTableEntry {
        fxy: Fxy::new(3, x, y),
        fxy_chain: chain.to_vec(),
        category: None,
        title_en: None,
        status: None,
    }
}

pub const BLOCK: Fxy = Fxy::new(0, 1, 1);
pub const STATION: Fxy = Fxy::new(0, 1, 2);
pub const NAME: Fxy = Fxy::new(0, 1, 15);
pub const LATITUDE: Fxy = Fxy::new(0, 5, 1);
pub const TEMPERATURE: Fxy = Fxy::new(0, 12, 101);
pub const COUNTER: Fxy = Fxy::new(0, 31, 1);
pub const LONG_COUNTER: Fxy = Fxy::new(0, 31, 2);

/// Codes `0 11 001` to `0 11 005`, three characters or eight bits each.
pub fn group_element(i: usize) -> Fxy {
    Fxy::new(0, 11, i as u16 + 1)
}

pub fn elements() -> Vec<BTableEntry> {
    let mut entries = vec![
        numeric(1, 1, "WMO block number", 3, 7, 0, 0),
        numeric(1, 2, "WMO station number", 3, 10, 0, 0),
        string(1, 15, "Station or site name", 8),
        numeric(5, 1, "Latitude (high accuracy)", 7, 25, 5, -9000000),
        BTableEntry {
            bufr_unit: "K".into(),
            crex_unit: Some("C".into()),
            crex_scale: Some(1),
            ..numeric(12, 101, "Temperature/air temperature", 4, 16, 2, 0)
        },
        numeric(31, 1, "Delayed descriptor replication factor", 3, 8, 0, 0),
        numeric(31, 2, "Extended delayed descriptor replication factor", 5, 16, 0, 0),
    ];
    entries.extend((0..5).map(|i| {
        let fxy = group_element(i);
        numeric(fxy.x(), fxy.y(), &format!("Group element {}", i + 1), 3, 8, 0, 0)
    }));
    entries
}

pub fn sequences() -> Vec<DTableEntry> {
    vec![
        sequence(1, 1, &[BLOCK, STATION]),
        sequence(1, 2, &[Fxy::new(3, 1, 1), TEMPERATURE]),
        // refers to itself
        sequence(99, 999, &[Fxy::new(3, 99, 999)]),
    ]
}

pub fn table() -> DescriptorTable {
    DescriptorTable::new(elements(), sequences())
}

pub fn provider() -> MemoryTableProvider {
    MemoryTableProvider::with_fallback(table())
}

pub fn approx(a: Option<f64>, b: f64) -> bool {
    a.is_some_and(|a| (a - b).abs() < 1e-6)
}

/// Packs fields most significant bit first.
#[derive(Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bits: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: u64, width: usize) -> &mut Self {
        for i in (0..width).rev() {
            if self.bits % 8 == 0 {
                self.bytes.push(0);
            }
            let bit = ((value >> i) & 1) as u8;
            if let Some(last) = self.bytes.last_mut() {
                *last |= bit << (7 - self.bits % 8);
            }
            self.bits += 1;
        }
        self
    }

    pub fn push_str(&mut self, text: &str) -> &mut Self {
        for b in text.bytes() {
            self.push(b as u64, 8);
        }
        self
    }

    pub fn finish(&self) -> Vec<u8> {
        self.bytes.clone()
    }
}

pub struct BufrBuilder {
    pub edition: u8,
    pub centre: u16,
    pub subcentre: u16,
    pub master_version: u8,
    pub local_version: u8,
    pub subsets: u16,
    pub compressed: bool,
    pub descriptors: Vec<Fxy>,
    pub data: Vec<u8>,
}

impl BufrBuilder {
    pub fn new(edition: u8, descriptors: &[Fxy], data: Vec<u8>) -> Self {
        Self {
            edition,
            centre: 98,
            subcentre: 0,
            master_version: 13,
            local_version: 0,
            subsets: 1,
            compressed: false,
            descriptors: descriptors.to_vec(),
            data,
        }
    }

    pub fn subsets(mut self, n: u16) -> Self {
        self.subsets = n;
        self
    }

    pub fn compressed(mut self) -> Self {
        self.compressed = true;
        self
    }

    fn section1(&self) -> Vec<u8> {
        if self.edition == 4 {
            let mut s = vec![0, 0, 22, 0];
            s.extend_from_slice(&self.centre.to_be_bytes());
            s.extend_from_slice(&self.subcentre.to_be_bytes());
            s.extend_from_slice(&[0, 0, 2, 0, 0, self.master_version, self.local_version]);
            s.extend_from_slice(&2024u16.to_be_bytes());
            s.extend_from_slice(&[1, 2, 3, 4, 5]);
            s
        } else {
            vec![
                0,
                0,
                17,
                0,
                self.subcentre as u8,
                self.centre as u8,
                0,
                0,
                2,
                0,
                self.master_version,
                self.local_version,
                24,
                1,
                2,
                3,
                4,
            ]
        }
    }

    fn section3(&self) -> Vec<u8> {
        let len = 7 + 2 * self.descriptors.len();
        let mut s = (len as u32).to_be_bytes()[1..].to_vec();
        s.push(0);
        s.extend_from_slice(&self.subsets.to_be_bytes());
        s.push(if self.compressed { 0xC0 } else { 0x80 });
        for fxy in &self.descriptors {
            s.push((fxy.f() << 6) | fxy.x());
            s.push(fxy.y() as u8);
        }
        s
    }

    fn section4(&self) -> Vec<u8> {
        let len = 4 + self.data.len();
        let mut s = (len as u32).to_be_bytes()[1..].to_vec();
        s.push(0);
        s.extend_from_slice(&self.data);
        s
    }

    pub fn build(&self) -> Vec<u8> {
        let body: Vec<u8> = [self.section1(), self.section3(), self.section4()].concat();
        let total = 8 + body.len() + 4;
        let mut message = b"BUFR".to_vec();
        message.extend_from_slice(&(total as u32).to_be_bytes()[1..]);
        message.push(self.edition);
        message.extend_from_slice(&body);
        message.extend_from_slice(b"7777");
        message
    }
}
