use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use serde_json::{json, Value};

/// `pfas-calcd` on an ephemeral HTTP port; killed on drop.
struct HttpDaemon {
    child: Child,
    addr: String,
}

impl HttpDaemon {
    fn start(access_key: &str) -> Self {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
            listener.local_addr().expect("local addr").to_string()
        };
        let child = Command::new(env!("CARGO_BIN_EXE_pfas-calcd"))
            .env("PFAS_CALCD_TRANSPORT", "http")
            .env("PFAS_CALC_HTTP_ADDR", &addr)
            .env("PFAS_CALC_ACCESS_KEY", access_key)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn pfas-calcd");

        let ready = (0..100).any(|_| {
            if TcpStream::connect(&addr).is_ok() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(20));
            false
        });
        assert!(ready, "pfas-calcd did not listen on {addr}");
        Self { child, addr }
    }

    /// Sends raw head + body and returns (status, body).
    fn exchange(&self, head: &str, body: &str) -> (u16, String) {
        let mut stream = TcpStream::connect(&self.addr).expect("connect");
        stream.write_all(head.as_bytes()).expect("write head");
        stream.write_all(body.as_bytes()).expect("write body");
        let mut raw = String::new();
        stream.read_to_string(&mut raw).expect("read reply");

        let (status_head, payload) = raw.split_once("\r\n\r\n").unwrap_or((raw.as_str(), ""));
        let status = status_head
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse().ok())
            .expect("status code");
        (status, payload.to_string())
    }

    fn send(&self, method: &str, path: &str, body: &str) -> (u16, String) {
        let head = format!(
            "{method} {path} HTTP/1.1\r\nHost: {}\r\nContent-Length: {}\r\n\r\n",
            self.addr,
            body.len()
        );
        self.exchange(&head, body)
    }

    fn rpc(&self, request: &Value) -> Value {
        let (status, body) = self.send("POST", "/mcp", &request.to_string());
        assert_eq!(status, 200, "{body}");
        serde_json::from_str(&body).expect("rpc json")
    }
}

impl Drop for HttpDaemon {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn tool_call(id: u64, name: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": {"name": name, "arguments": arguments}
    })
}

#[test]
fn gated_estimate_over_http() {
    let daemon = HttpDaemon::start("site-office");

    let (status, health) = daemon.send("GET", "/health", "");
    assert_eq!(status, 200);
    let health: Value = serde_json::from_str(&health).expect("health json");
    assert_eq!(health["access_gate"], true);

    let site = json!({
        "water_volume": 1_000_000,
        "influent_concentration": {"PFOA": 10.0},
        "receptor_type": "drinking_water",
        "water_method": "gac"
    });

    let denied = daemon.rpc(&tool_call(1, "estimate_compute", json!({"site": site})));
    assert_eq!(denied["error"]["code"], -32001);
    assert_eq!(denied["error"]["data"]["kind"], "session_required");

    let unlocked = daemon.rpc(&tool_call(2, "access_unlock", json!({"access_key": "site-office"})));
    let session_id = unlocked["result"]["structuredContent"]["session_id"]
        .as_str()
        .expect("session id")
        .to_string();

    let computed = daemon.rpc(&tool_call(
        3,
        "estimate_compute",
        json!({"site": site, "session_id": session_id}),
    ));
    assert_eq!(
        computed["result"]["structuredContent"]["display"]["grand_total"],
        "£80,000"
    );

    let exported = daemon.rpc(&tool_call(
        4,
        "estimate_export",
        json!({"site": site, "session_id": session_id, "table": "compliance", "site_name": "Depot"}),
    ));
    assert_eq!(
        exported["result"]["structuredContent"]["file_name"],
        "Depot_compliance.csv"
    );
}

#[test]
fn routing_errors_map_to_http_statuses() {
    let daemon = HttpDaemon::start("");

    assert_eq!(daemon.send("GET", "/nope", "").0, 404);
    assert_eq!(daemon.send("GET", "/mcp", "").0, 405);

    let (status, body) = daemon.send("POST", "/mcp", "{not json");
    assert_eq!(status, 400);
    assert!(body.contains("-32700"));

    let notification = r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
    assert_eq!(daemon.send("POST", "/mcp", notification).0, 204);
}

#[test]
fn oversized_body_is_refused_and_server_keeps_serving() {
    let daemon = HttpDaemon::start("");

    let head = format!(
        "POST /mcp HTTP/1.1\r\nHost: {}\r\nContent-Length: 18446744073709551615\r\n\r\n",
        daemon.addr
    );
    let (status, body) = daemon.exchange(&head, "");
    assert_eq!(status, 413);
    assert!(body.contains("payload_too_large"));

    let (status, _) = daemon.send("GET", "/health", "");
    assert_eq!(status, 200);
}
