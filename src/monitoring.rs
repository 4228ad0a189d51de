pub fn init_logger() {
  use tracing::metadata::LevelFilter;
  use tracing_subscriber::{
    EnvFilter, Layer,
    filter::Directive,
    fmt::{self, format::FmtSpan},
    prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
  };

  // everything outside this workspace only reports warnings
  let default_directive = Directive::from(LevelFilter::WARN);

  let crate_level = if cfg!(debug_assertions) { "debug" } else { "info" };
  let filter_directives =
    std::env::var("RUST_LOG").unwrap_or_else(|_| format!("sfsp={crate_level},sfspcomm={crate_level}"));

  let filter = EnvFilter::builder()
    .with_default_directive(default_directive)
    .parse_lossy(filter_directives);

  // tests install the subscriber once per process; later calls are no-ops
  let _ = tracing_subscriber::registry()
    .with(
      fmt::layer()
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::CLOSE)
        .with_filter(filter),
    )
    .try_init();
}
