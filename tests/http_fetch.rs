use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use strata::assets::{Fetcher, HttpFetcher, SchemeFetcher};
use strata::error::FetchError;

/// Serve canned HTTP/1.1 responses on a local port and return its base URL.
async fn serve() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]).to_string();
                let path = request.split_whitespace().nth(1).unwrap_or("/");

                let response = match path {
                    "/logo.png" => "HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello",
                    "/broken" => "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                    // Promises more bytes than it sends
                    "/truncated" => "HTTP/1.1 200 OK\r\nContent-Length: 100\r\nConnection: close\r\n\r\nshort",
                    _ => "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                };
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{addr}")
}

fn fetcher() -> HttpFetcher {
    // Local listener, never through an environment proxy
    HttpFetcher::with_client(reqwest::Client::builder().no_proxy().build().unwrap())
}

#[tokio::test]
async fn test_http_fetch_downloads_body() {
    let base = serve().await;
    let bytes = fetcher().fetch(&format!("{base}/logo.png")).await.unwrap();
    assert_eq!(bytes, b"hello");
}

#[tokio::test]
async fn test_http_fetch_maps_status_errors() {
    let base = serve().await;

    let missing = fetcher().fetch(&format!("{base}/missing.png")).await;
    assert!(matches!(missing, Err(FetchError::NotFound(_))));

    let broken = fetcher().fetch(&format!("{base}/broken")).await;
    assert!(matches!(broken, Err(FetchError::Io { message, .. }) if message.contains("500")));
}

#[tokio::test]
async fn test_http_fetch_interrupted_body_is_aborted() {
    let base = serve().await;
    let truncated = fetcher().fetch(&format!("{base}/truncated")).await;
    assert!(matches!(truncated, Err(FetchError::Aborted { .. })));
}

#[tokio::test]
async fn test_scheme_fetcher_sends_urls_over_http() {
    let base = serve().await;
    let fetcher = SchemeFetcher::new(Default::default(), fetcher());
    let bytes = fetcher.fetch(&format!("{base}/logo.png")).await.unwrap();
    assert_eq!(bytes, b"hello");
}
