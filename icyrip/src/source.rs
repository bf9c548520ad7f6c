//! Opening the byte source for a recording.
//!
//! URL sources are fetched with a hand-written HTTP/1.0 request so that the
//! raw response, status line and headers included, reaches the demuxer
//! untouched. ICY servers often answer with `ICY 200 OK`, which ordinary HTTP
//! clients reject.

use std::fs::File;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use log::debug;
use url::Url;

/// Open `location`: `-` for stdin, an `http://` URL, or a file path.
pub fn open(location: &str, timeout: Option<Duration>) -> anyhow::Result<Box<dyn Read>> {
    if location == "-" {
        return Ok(Box::new(io::stdin().lock()));
    }

    if let Ok(url) = Url::parse(location) {
        match url.scheme() {
            "http" | "icy" => return Ok(Box::new(connect(&url, timeout)?)),
            "https" => bail!("https streams are not supported: {location}"),
            // Anything else, e.g. a Windows drive letter, is treated as a path.
            _ => {}
        }
    }

    let path = Path::new(location);
    if !path.is_file() {
        return Err(anyhow!("input file does not exist: {}", path.display()));
    }
    let file =
        File::open(path).with_context(|| format!("failed to open '{}'", path.display()))?;
    Ok(Box::new(file))
}

fn connect(url: &Url, timeout: Option<Duration>) -> anyhow::Result<TcpStream> {
    let host = url
        .host_str()
        .ok_or_else(|| anyhow!("stream URL has no host: {url}"))?;
    let port = url.port().unwrap_or(80);

    let mut stream = TcpStream::connect((host, port))
        .with_context(|| format!("failed to connect to {host}:{port}"))?;
    stream
        .set_read_timeout(timeout)
        .context("failed to configure the read timeout")?;

    let request = build_request(url, host);
    debug!("sending request:\n{}", request.trim_end());
    stream
        .write_all(request.as_bytes())
        .with_context(|| format!("failed to send request to {host}:{port}"))?;

    Ok(stream)
}

fn build_request(url: &Url, host: &str) -> String {
    let mut target = url.path().to_owned();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }
    let host_header = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    };

    format!(
        "GET {target} HTTP/1.0\r\n\
         Host: {host_header}\r\n\
         User-Agent: {}/{}\r\n\
         Accept: */*\r\n\
         Icy-MetaData: 1\r\n\
         Connection: close\r\n\r\n",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_asks_for_metadata() {
        let url = Url::parse("http://radio.example.com:8000/live.mp3?sid=1").unwrap();
        let request = build_request(&url, "radio.example.com");

        assert!(request.starts_with("GET /live.mp3?sid=1 HTTP/1.0\r\n"));
        assert!(request.contains("\r\nHost: radio.example.com:8000\r\n"));
        assert!(request.contains("\r\nIcy-MetaData: 1\r\n"));
        assert!(request.ends_with("\r\n\r\n"));
    }

    #[test]
    fn default_port_is_omitted_from_host_header() {
        let url = Url::parse("http://radio.example.com/").unwrap();
        let request = build_request(&url, "radio.example.com");
        assert!(request.contains("\r\nHost: radio.example.com\r\n"));
    }

    #[test]
    fn missing_files_are_reported() {
        let err = open("definitely-missing.icy", None).err().unwrap();
        assert!(err.to_string().contains("input file does not exist"));
    }

    #[test]
    fn https_is_rejected() {
        let err = open("https://radio.example.com/", None).err().unwrap();
        assert!(err.to_string().contains("https"));
    }
}
