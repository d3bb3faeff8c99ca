//! Admission control at the engine surface.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::engine::{Engine, EngineError};
    use crate::engine::tests::helpers::*;
    use tempfile::TempDir;

    #[test]
    fn test_exhausted_bucket_rejects_third_put() {
        init_tracing();
        let tmp = TempDir::new().unwrap();

        // Two tokens, no refill: the first two operations pass, the third
        // is rejected.
        let mut config = small_config(tmp.path(), 4, 64);
        config.token_bucket_size = 2;
        config.token_bucket_rate = 0;
        let mut engine = Engine::open(config).unwrap();

        engine.put(b"a", b"1").unwrap();
        engine.put(b"b", b"2").unwrap();
        assert!(matches!(
            engine.put(b"c", b"3"),
            Err(EngineError::RateLimited)
        ));
    }

    #[test]
    fn test_reads_consume_tokens_too() {
        init_tracing();
        let tmp = TempDir::new().unwrap();

        let mut config = small_config(tmp.path(), 4, 64);
        config.token_bucket_size = 2;
        config.token_bucket_rate = 0;
        let mut engine = Engine::open(config).unwrap();

        engine.put(b"a", b"1").unwrap();
        assert_eq!(engine.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert!(matches!(engine.get(b"a"), Err(EngineError::RateLimited)));
    }

    #[test]
    fn test_rejected_write_leaves_no_trace() {
        init_tracing();
        let tmp = TempDir::new().unwrap();

        let mut config = small_config(tmp.path(), 4, 64);
        config.token_bucket_size = 1;
        config.token_bucket_rate = 0;
        let mut engine = Engine::open(config).unwrap();

        engine.put(b"a", b"1").unwrap();
        assert!(matches!(
            engine.put(b"b", b"2"),
            Err(EngineError::RateLimited)
        ));

        // Nothing of the rejected put reached the WAL or mempool.
        assert_eq!(engine.stats().unwrap().resident_entries, 1);
    }

    #[test]
    fn test_refill_unblocks_traffic() {
        init_tracing();
        let tmp = TempDir::new().unwrap();

        let mut config = small_config(tmp.path(), 4, 64);
        config.token_bucket_size = 1;
        config.token_bucket_rate = 1000;
        config.fill_interval = Duration::from_millis(10);
        let mut engine = Engine::open(config).unwrap();

        engine.put(b"a", b"1").unwrap();
        std::thread::sleep(Duration::from_millis(25));
        engine.put(b"b", b"2").unwrap();
    }
}
