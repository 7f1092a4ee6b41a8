use tracing_subscriber::{EnvFilter, fmt};

pub(crate) fn init_test_logging() {
    static INIT: std::sync::Once = std::sync::Once::new();

    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("micheline_typedef=debug,warn"));
        fmt().with_env_filter(filter).with_test_writer().init();
    });
}
