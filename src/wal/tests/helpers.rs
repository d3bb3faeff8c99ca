use tracing_subscriber::EnvFilter;

/// Installs a tracing subscriber honoring `RUST_LOG`, once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A key of `len` bytes with a recognizable, index-dependent pattern.
/// Distinct per index for any `len >= 7`.
pub fn patterned_key(i: usize, len: usize) -> Vec<u8> {
    format!("k{i:06}-").into_bytes().into_iter().cycle().take(len).collect()
}

/// A value of `len` bytes derived from the index.
pub fn patterned_value(i: usize, len: usize) -> Vec<u8> {
    format!("v{i:06}-").into_bytes().into_iter().cycle().take(len).collect()
}
