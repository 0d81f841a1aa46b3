mod common;

use common::*;
use crextables::{
    TableType,
    pattern::{local_file_stem, master_file_stem},
    prelude::{CompiledTableB, CompiledTableD},
};
use flate2::{Compression, write::GzEncoder};
use librcrex::{
    CachedProvider, DescriptorTable, Decoder, DecoderConfig, Error, FileTableProvider, Fxy,
    TableKey, TableProvider, read_messages, split_messages,
    tables::LocalTableKey,
};
use std::io::Write;
use std::path::Path;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

fn write_master(base: &Path, version: u32) {
    CompiledTableB::build(elements(), base.join(master_file_stem(TableType::B, version))).unwrap();
    CompiledTableD::build(sequences(), base.join(master_file_stem(TableType::D, version))).unwrap();
}

fn write_local(base: &Path, centre: u16, version: u32) {
    let renamed = numeric(1, 1, "Local block number", 3, 7, 0, 0);
    let extra = numeric(1, 192, "Local station class", 2, 4, 0, 0);
    CompiledTableB::build(
        vec![renamed, extra],
        base.join(local_file_stem(TableType::B, centre, version)),
    )
    .unwrap();
    CompiledTableD::build(
        vec![sequence(1, 192, &[Fxy::new(0, 1, 192), BLOCK])],
        base.join(local_file_stem(TableType::D, centre, version)),
    )
    .unwrap();
}

fn key(version: u8, local: Option<LocalTableKey>) -> TableKey {
    TableKey {
        master_table: 0,
        edition: 4,
        version,
        local,
    }
}

#[test]
fn compiled_tables_feed_the_file_provider() {
    let dir = tempfile::tempdir().unwrap();
    write_master(dir.path(), 13);

    let provider = FileTableProvider::new(dir.path());
    let table = provider.load(&key(13, None)).unwrap();
    assert_eq!(
        table.lookup_element(TEMPERATURE).unwrap().element_name_en,
        "Temperature/air temperature"
    );
    let chain: Vec<Fxy> = table.lookup_sequence(Fxy::new(3, 1, 1)).unwrap().iter().collect();
    assert_eq!(chain, vec![BLOCK, STATION]);
}

#[test]
fn missing_master_version_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    write_master(dir.path(), 11);

    let provider = FileTableProvider::new(dir.path());
    assert!(provider.load(&key(14, None)).is_ok());
    assert!(matches!(
        provider.load(&key(10, None)),
        Err(Error::TableNotFound(_))
    ));
}

#[test]
fn local_tables_shadow_master_entries() {
    let dir = tempfile::tempdir().unwrap();
    write_master(dir.path(), 13);
    write_local(dir.path(), 98, 1);

    let provider = FileTableProvider::new(dir.path());
    let local = LocalTableKey {
        centre: 98,
        subcentre: 0,
        version: 1,
    };
    let table = provider.load(&key(13, Some(local))).unwrap();
    assert_eq!(
        table.lookup_element(BLOCK).unwrap().element_name_en,
        "Local block number"
    );
    assert!(table.lookup_element(STATION).is_ok());
    assert!(table.lookup_sequence(Fxy::new(3, 1, 192)).is_ok());

    let missing = LocalTableKey {
        centre: 7,
        ..local
    };
    assert!(provider.load(&key(13, Some(missing))).is_err());
}

#[test]
fn bufr_with_local_tables_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    write_master(dir.path(), 13);
    write_local(dir.path(), 98, 1);

    let data = BitWriter::new().push(2, 4).push(6, 7).finish();
    let mut builder = BufrBuilder::new(4, &[Fxy::new(3, 1, 192)], data);
    builder.local_version = 1;

    let decoder = Decoder::from_config(DecoderConfig {
        tables_path: Some(dir.path().to_path_buf()),
        ..DecoderConfig::default()
    });
    let message = decoder
        .decode(&builder.build(), librcrex::Origin::default())
        .unwrap();
    let subset = &message.subsets()[0];
    assert_eq!(subset.codes(), vec![Fxy::new(0, 1, 192), BLOCK]);
    assert_eq!(subset.get(1).unwrap().name(), "Local block number");
    assert_eq!(decoder.provider().cached_keys(), 1);
}

struct CountingProvider {
    loads: AtomicUsize,
}

impl TableProvider for CountingProvider {
    fn load(&self, _key: &TableKey) -> librcrex::Result<Arc<DescriptorTable>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(table()))
    }
}

#[test]
fn cache_loads_each_key_once() {
    let cached = Arc::new(CachedProvider::new(CountingProvider {
        loads: AtomicUsize::new(0),
    }));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cached = Arc::clone(&cached);
            std::thread::spawn(move || cached.load(&key(13, None)).unwrap())
        })
        .collect();
    let tables: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(cached.inner().loads.load(Ordering::SeqCst), 1);
    assert!(tables.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));

    cached.load(&key(14, None)).unwrap();
    assert_eq!(cached.inner().loads.load(Ordering::SeqCst), 2);
    assert_eq!(cached.cached_keys(), 2);
}

const STREAM: &str = "header junk\r\n\
    CREX++ T010001 A003 B01001++ 500++ 7777\r\n\
    CREX++ T010001 A003 B01001++ 5x0++ 7777\r\n\
    CREX++ T010001 A003 B01001 B01002++ 006 260+ 010 150++ 7777\r\n";

#[test]
fn decode_all_skips_bad_messages() {
    let file = split_messages("stream", STREAM.as_bytes());
    assert_eq!(file.message_count(), 3);

    let logs = Captured::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();

    let decoder = Decoder::new(provider());
    let messages = tracing::subscriber::with_default(subscriber, || decoder.decode_all(&file));
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].origin.offset, STREAM.find("CREX++").unwrap());
    assert_eq!(messages[1].subset_count(), 2);

    let text = logs.text();
    assert_eq!(text.matches("skipping undecodable message").count(), 1, "{text}");
    assert!(text.contains("5x0"), "{text}");
}

#[test]
fn data_values_spelt_like_the_end_marker() {
    let stream = "CREX++ T010001 A000 B12101 B01001++ 7777 001++ 7777\n\
                  CREX++ T010001 A003 B01001++ 500++ 7777\n";
    let file = split_messages("stream", stream.as_bytes());
    assert_eq!(file.message_count(), 2);

    let messages = Decoder::new(provider()).decode_all(&file);
    assert_eq!(messages.len(), 2);
    assert!(approx(messages[0].subsets()[0].get(0).unwrap().as_f64(), 777.7));
}

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn gzipped_files_are_read_transparently() {
    let dir = tempfile::tempdir().unwrap();

    let plain = dir.path().join("reports.crex");
    std::fs::write(&plain, STREAM).unwrap();

    let gz = dir.path().join("reports.crex.gz");
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(STREAM.as_bytes()).unwrap();
    std::fs::write(&gz, encoder.finish().unwrap()).unwrap();

    let a = read_messages(&plain).unwrap();
    let b = read_messages(&gz).unwrap();
    assert_eq!(a.message_count(), b.message_count());
    for (x, y) in a.messages().iter().zip(b.messages()) {
        assert_eq!(x.data, y.data);
    }
    assert!(matches!(
        read_messages(dir.path().join("absent")),
        Err(Error::Io(_))
    ));
}
