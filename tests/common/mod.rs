//! Test utilities shared across the crawl engine's integration tests.

use mockito::{Mock, Server};

/// Creates a mock endpoint that returns HTML content.
#[allow(dead_code)]
pub fn create_html_mock(server: &mut Server, path: &str, html: &str) -> Mock {
    server.mock("GET", path).with_status(200).with_header("content-type", "text/html; charset=utf-8").with_body(html).create()
}

/// Creates a mock endpoint that returns an error status.
#[allow(dead_code)]
pub fn create_error_mock(server: &mut Server, path: &str, status: usize) -> Mock {
    server.mock("GET", path).with_status(status).with_body("error").create()
}

/// Creates a sample `robots.txt` disallowing the given paths.
#[allow(dead_code)]
pub fn create_robots_txt(disallow_paths: &[&str]) -> String {
    let mut content = String::from("User-agent: *\n");
    for path in disallow_paths {
        content.push_str(&format!("Disallow: {path}\n"));
    }
    content
}

#[allow(dead_code)]
pub fn test_url(server: &Server, path: &str) -> String {
    format!("{}{}", server.url(), path)
}
