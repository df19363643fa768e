//! Shared helpers for the integration tests: a tiny HTTP server that answers
//! from a closure, and builders for API-shaped JSON bodies.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use cosmic_wallhaven_wallpaper::WallhavenClient;
use serde_json::{json, Value};

type Handler = dyn Fn(&str) -> (u16, Vec<u8>) + Send + Sync;

/// Serves one response per connection on 127.0.0.1 and records every
/// request target (path plus query string).
pub struct FixtureServer {
    base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FixtureServer {
    pub fn start(handler: impl Fn(&str) -> (u16, Vec<u8>) + Send + Sync + 'static) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<Handler> = Arc::new(handler);

        let log = requests.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                let handler = handler.clone();
                let log = log.clone();
                thread::spawn(move || serve_one(stream, handler.as_ref(), &log));
            }
        });

        Self { base_url, requests }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Gallery client pointed at this server.
    pub fn client(&self) -> WallhavenClient {
        let http = reqwest::Client::builder().no_proxy().build().unwrap();
        WallhavenClient::with_http_client(http, self.base_url())
    }
}

fn serve_one(stream: TcpStream, handler: &Handler, log: &Mutex<Vec<String>>) {
    let mut reader = BufReader::new(stream.try_clone().unwrap());

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    let target = request_line
        .split_whitespace()
        .nth(1)
        .unwrap_or_default()
        .to_string();

    // GET requests only; skip headers up to the blank line
    loop {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) if line.trim().is_empty() => break,
            Ok(_) => {}
            Err(_) => return,
        }
    }

    log.lock().unwrap().push(target.clone());
    let (status, body) = handler(&target);

    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        reason(status),
        body.len()
    );
    let mut stream = stream;
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(&body);
    let _ = stream.flush();
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        401 => "Unauthorized",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// A `/search` entry; `path` points at `{image_base}/full/{id}.jpg`.
pub fn summary_json(id: &str, image_base: &str) -> Value {
    json!({
        "id": id,
        "url": format!("https://wallhaven.cc/w/{id}"),
        "short_url": format!("https://whvn.cc/{id}"),
        "views": 1520,
        "favorites": 37,
        "source": "",
        "purity": "sfw",
        "category": "general",
        "dimension_x": 1920,
        "dimension_y": 1080,
        "resolution": "1920x1080",
        "ratio": "1.78",
        "file_size": 734003,
        "file_type": "image/jpeg",
        "created_at": "2024-03-02 10:11:12",
        "colors": ["#000000", "#424153"],
        "path": format!("{image_base}/full/{id}.jpg"),
        "thumbs": {
            "large": format!("{image_base}/lg/{id}.jpg"),
            "original": format!("{image_base}/orig/{id}.jpg"),
            "small": format!("{image_base}/small/{id}.jpg"),
        }
    })
}

pub fn search_body(ids: &[&str], current_page: u32, last_page: u32, seed: Option<&str>) -> Vec<u8> {
    let data: Vec<Value> = ids
        .iter()
        .map(|id| summary_json(id, "https://w.wallhaven.cc"))
        .collect();
    serde_json::to_vec(&json!({
        "data": data,
        "meta": {
            "current_page": current_page,
            "last_page": last_page,
            "per_page": "24",
            "total": ids.len(),
            "query": "",
            "seed": seed,
        }
    }))
    .unwrap()
}
