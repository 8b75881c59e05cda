use std::time::Duration;

use once_cell::sync::Lazy;
use reqwest::Client;

// Per-request timeouts are set at the call site from configuration; the
// shared client only bounds connection establishment.
static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .connect_timeout(Duration::from_secs(15))
        .build()
        .expect("Failed to build HTTP client")
});

pub fn get_http_client() -> &'static Client {
    &HTTP_CLIENT
}
