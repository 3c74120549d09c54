pub mod bw;
pub mod context;
pub mod crc;
pub mod error;
pub mod frame;
pub mod ident;
pub mod ps;
pub mod rpc;
pub mod rt;
pub mod transport;

#[cfg(test)]
#[ctor::ctor]
fn setup_test_logging() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .with_ansi(true)
        .init();
}
