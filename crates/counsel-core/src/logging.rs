/// Initialize structured logging for binaries embedding the engine.
/// Respects `RUST_LOG`, defaulting to INFO.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();
}
