//! Basic put / get / delete semantics through the full engine.

#[cfg(test)]
mod tests {
    use crate::engine::EngineError;
    use crate::engine::tests::helpers::*;
    use tempfile::TempDir;

    #[test]
    fn test_put_then_get() {
        init_tracing();
        let tmp = TempDir::new().unwrap();
        let mut engine = small_engine(tmp.path(), 4, 64);

        engine.put(b"hello", b"world").unwrap();
        assert_eq!(engine.get(b"hello").unwrap(), Some(b"world".to_vec()));
        assert_eq!(engine.get(b"missing").unwrap(), None);
    }

    #[test]
    fn test_overwrite_returns_latest() {
        init_tracing();
        let tmp = TempDir::new().unwrap();
        let mut engine = small_engine(tmp.path(), 4, 64);

        engine.put(b"k", b"v1").unwrap();
        engine.put(b"k", b"v2").unwrap();
        assert_eq!(engine.get(b"k").unwrap(), Some(b"v2".to_vec()));
    }

    #[test]
    fn test_delete_then_get_is_none() {
        init_tracing();
        let tmp = TempDir::new().unwrap();
        let mut engine = small_engine(tmp.path(), 4, 64);

        engine.put(b"k", b"v1").unwrap();
        engine.delete(b"k").unwrap();
        assert_eq!(engine.get(b"k").unwrap(), None);

        // A later put revives the key.
        engine.put(b"k", b"v2").unwrap();
        assert_eq!(engine.get(b"k").unwrap(), Some(b"v2".to_vec()));
    }

    #[test]
    fn test_delete_of_never_written_key() {
        init_tracing();
        let tmp = TempDir::new().unwrap();
        let mut engine = small_engine(tmp.path(), 4, 64);

        engine.delete(b"ghost").unwrap();
        assert_eq!(engine.get(b"ghost").unwrap(), None);
    }

    #[test]
    fn test_empty_key_rejected_before_io() {
        init_tracing();
        let tmp = TempDir::new().unwrap();
        let mut engine = small_engine(tmp.path(), 4, 64);

        assert!(matches!(
            engine.put(b"", b"v"),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            engine.delete(b""),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            engine.get(b""),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_empty_value_rejected() {
        init_tracing();
        let tmp = TempDir::new().unwrap();
        let mut engine = small_engine(tmp.path(), 4, 64);

        assert!(matches!(
            engine.put(b"k", b""),
            Err(EngineError::InvalidArgument(_))
        ));
        // The rejected put left no trace.
        assert_eq!(engine.get(b"k").unwrap(), None);
    }

    #[test]
    fn test_binary_keys_and_values() {
        init_tracing();
        let tmp = TempDir::new().unwrap();
        let mut engine = small_engine(tmp.path(), 4, 64);

        let key = [0x00, 0xFF, 0x7F, 0x80];
        let value = [0xDE, 0xAD, 0xBE, 0xEF, 0x00];
        engine.put(&key, &value).unwrap();
        assert_eq!(engine.get(&key).unwrap(), Some(value.to_vec()));
    }

    #[test]
    fn test_stats_reflect_activity() {
        init_tracing();
        let tmp = TempDir::new().unwrap();
        let mut engine = small_engine(tmp.path(), 4, 64);

        engine.put(b"a", b"1").unwrap();
        engine.put(b"b", b"2").unwrap();

        let stats = engine.stats().unwrap();
        assert_eq!(stats.resident_entries, 2);
        assert_eq!(stats.generations, 0);
        assert_eq!(stats.wal_segments.0, 0);
    }
}
