use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

use reqwest::blocking::Client;

use super::ZipcodebaseClient;

/// Local HTTP server answering one canned response per connection, in order.
pub(crate) struct StubServer {
    base_url: String,
    handle: JoinHandle<Vec<String>>,
}

impl StubServer {
    pub(crate) fn start(responses: Vec<(u16, &'static str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub server");
        let address = listener.local_addr().expect("stub server address");

        let handle = thread::spawn(move || {
            let mut request_lines = Vec::new();
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().expect("accept connection");
                let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));

                let mut request_line = String::new();
                reader.read_line(&mut request_line).expect("read request line");
                request_lines.push(request_line.trim_end().to_string());
                loop {
                    let mut header = String::new();
                    let read = reader.read_line(&mut header).expect("read header");
                    if read == 0 || header == "\r\n" {
                        break;
                    }
                }

                let reason = if status < 400 { "OK" } else { "Error" };
                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream
                    .write_all(response.as_bytes())
                    .expect("write response");
            }
            request_lines
        });

        Self {
            base_url: format!("http://{address}/api/v1"),
            handle,
        }
    }

    pub(crate) fn client(&self, api_key: &str) -> ZipcodebaseClient {
        let http = Client::builder()
            .no_proxy()
            .build()
            .expect("build http client");
        ZipcodebaseClient::with_client(http, self.base_url.clone(), api_key)
    }

    /// Waits for every scripted response to be served.
    pub(crate) fn request_lines(self) -> Vec<String> {
        self.handle.join().expect("stub server thread")
    }
}
