

use std::time::Duration;

use crate::client::{Client, Config};

fn init_test_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn client_with<F>(f: F) -> Client
where
    F: FnOnce(crate::client::ConfigBuilder) -> crate::client::ConfigBuilder,
{
    init_test_log();
    let builder = Config::builder().timeout(Duration::from_secs(5));
    Client::with_config(f(builder).build().unwrap())
}

fn client() -> Client {
    client_with(|b| b)
}
