//! Writer format invariants, checked by decoding the raw files.
//!
//! Coverage:
//! - Data records strictly ascending by key
//! - Every Index offset lands on a Data record boundary for that key
//! - Every Summary offset lands on an Index entry boundary for that key
//! - The Filter answers positive for every written key
//! - Generation numbering and file naming

#[cfg(test)]
mod tests {
    use crate::filter::Filter;
    use crate::memtable::Memtable;
    use crate::memtable::map::MapMemtable;
    use crate::sstable::tests::helpers::*;
    use crate::sstable::writer::SstWriter;
    use crate::sstable::{TableFile, decode_record, decode_sparse_entry, table_path};
    use tempfile::TempDir;

    fn sample_pairs() -> Vec<(Vec<u8>, Vec<u8>)> {
        (0..37u32)
            .map(|i| {
                (
                    format!("key-{i:04}").into_bytes(),
                    format!("value-{i:04}").into_bytes(),
                )
            })
            .collect()
    }

    fn flush_sample(dir: &std::path::Path, index_stride: usize, summary_stride: usize) -> u64 {
        let pairs = sample_pairs();
        let mut table = MapMemtable::new(64);
        for (key, value) in &pairs {
            table.put(key, value);
        }
        SstWriter::new(&writer_config(dir, index_stride, summary_stride))
            .flush(&table)
            .unwrap()
    }

    #[test]
    fn test_four_files_per_generation() {
        init_tracing();
        let tmp = TempDir::new().unwrap();
        let generation = flush_sample(tmp.path(), 3, 2);

        assert_eq!(generation, 1);
        for name in [
            "usertable-01-Data.txt",
            "usertable-01-Index.txt",
            "usertable-01-Summary.txt",
            "usertable-01-Filter.txt",
        ] {
            assert!(tmp.path().join(name).exists(), "{name}");
        }
    }

    #[test]
    fn test_generation_numbers_increase() {
        init_tracing();
        let tmp = TempDir::new().unwrap();

        assert_eq!(flush_sample(tmp.path(), 3, 2), 1);
        assert_eq!(flush_sample(tmp.path(), 3, 2), 2);
        assert_eq!(flush_sample(tmp.path(), 3, 2), 3);
    }

    #[test]
    fn test_data_records_strictly_ascending() {
        init_tracing();
        let tmp = TempDir::new().unwrap();
        let generation = flush_sample(tmp.path(), 3, 2);

        let data =
            std::fs::read(table_path(tmp.path(), generation, TableFile::Data)).unwrap();
        let mut pos = 0;
        let mut previous: Option<Vec<u8>> = None;
        let mut count = 0;
        while pos < data.len() {
            let (record, next) = decode_record(&data, pos).unwrap();
            if let Some(previous) = &previous {
                assert!(previous < &record.key, "keys must strictly ascend");
            }
            previous = Some(record.key);
            pos = next;
            count += 1;
        }
        assert_eq!(count, 37);
        assert_eq!(pos, data.len());
    }

    #[test]
    fn test_index_offsets_land_on_record_boundaries() {
        init_tracing();
        let tmp = TempDir::new().unwrap();
        let generation = flush_sample(tmp.path(), 3, 2);

        let data =
            std::fs::read(table_path(tmp.path(), generation, TableFile::Data)).unwrap();
        let index =
            std::fs::read(table_path(tmp.path(), generation, TableFile::Index)).unwrap();

        let mut pos = 0;
        let mut entries = 0;
        while let Some((key, offset, next)) = decode_sparse_entry(&index, pos).unwrap() {
            let (record, _) = decode_record(&data, offset as usize).unwrap();
            assert_eq!(record.key, key, "index offset must point at its own key");
            pos = next;
            entries += 1;
        }
        // 37 records, stride 3 → entries at records 3, 6, …, 36.
        assert_eq!(entries, 12);
    }

    #[test]
    fn test_summary_offsets_land_on_index_boundaries() {
        init_tracing();
        let tmp = TempDir::new().unwrap();
        let generation = flush_sample(tmp.path(), 3, 2);

        let index =
            std::fs::read(table_path(tmp.path(), generation, TableFile::Index)).unwrap();
        let summary =
            std::fs::read(table_path(tmp.path(), generation, TableFile::Summary)).unwrap();

        let mut pos = 0;
        let mut entries = 0;
        while let Some((key, offset, next)) = decode_sparse_entry(&summary, pos).unwrap() {
            let (index_key, _, _) = decode_sparse_entry(&index, offset as usize)
                .unwrap()
                .expect("summary offset must land inside the index");
            assert_eq!(index_key, key, "summary offset must point at its own key");
            pos = next;
            entries += 1;
        }
        // Summary stride 2 over 12 index entries → every 6th record: 6 entries.
        assert_eq!(entries, 6);
    }

    #[test]
    fn test_filter_positive_for_every_written_key() {
        init_tracing();
        let tmp = TempDir::new().unwrap();
        let generation = flush_sample(tmp.path(), 3, 2);

        let filter_bytes =
            std::fs::read(table_path(tmp.path(), generation, TableFile::Filter)).unwrap();
        let filter = Filter::from_bytes(&filter_bytes).unwrap();

        for (key, _) in sample_pairs() {
            assert!(filter.query(&key));
        }
    }

    #[test]
    fn test_tombstones_serialize_without_value_fields() {
        init_tracing();
        let tmp = TempDir::new().unwrap();

        let mut table = MapMemtable::new(8);
        table.put(b"alive", b"v");
        table.logical_delete(b"dead");
        let generation = SstWriter::new(&writer_config(tmp.path(), 1, 2))
            .flush(&table)
            .unwrap();

        let data =
            std::fs::read(table_path(tmp.path(), generation, TableFile::Data)).unwrap();

        let (first, next) = decode_record(&data, 0).unwrap();
        assert_eq!(first.key, b"alive");
        assert!(!first.tombstone);

        let (second, end) = decode_record(&data, next).unwrap();
        assert_eq!(second.key, b"dead");
        assert!(second.tombstone);
        assert!(second.value.is_empty());
        assert_eq!(end, data.len());
        // Tombstone record: 1 + 4 + 4 bytes, no value fields.
        assert_eq!(end - next, 1 + 4 + 4);
    }

    #[test]
    fn test_no_tmp_files_left_behind() {
        init_tracing();
        let tmp = TempDir::new().unwrap();
        flush_sample(tmp.path(), 3, 2);

        for dir_entry in std::fs::read_dir(tmp.path()).unwrap() {
            let name = dir_entry.unwrap().file_name();
            assert!(
                !name.to_string_lossy().ends_with(".tmp"),
                "leftover {name:?}"
            );
        }
    }
}
