use std::future::Future;
use std::sync::LazyLock;

/// Runtime that drives the async PostgreSQL driver from synchronous call sites.
static ASYNC_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to create tokio runtime for database sessions")
});

pub(super) fn block_on<F: Future>(future: F) -> F::Output {
    ASYNC_RUNTIME.block_on(future)
}
