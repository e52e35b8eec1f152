use std::fmt;
use std::time::Duration;

use serde_json::{Value, json};

use super::{ExecutionStrategy, RPC_STRATEGY, success};
use crate::config::AppConfig;
use crate::error::ErrorKind;
use crate::execmeta::output_preview;
use crate::runlog::{Level, LogEvent, RunLog};
use crate::types::{ContractCall, SimulationResult};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub enum RpcError {
    Transport(String),
    Status { code: u16, body: String },
    Decode(String),
    Remote { code: Option<i64>, message: String },
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcError::Transport(msg) => write!(f, "RPC request failed: {msg}"),
            RpcError::Status { code, body } => {
                write!(f, "RPC endpoint returned HTTP {code}: {}", output_preview(body, 200))
            }
            RpcError::Decode(msg) => write!(f, "RPC response could not be decoded: {msg}"),
            RpcError::Remote { code: Some(code), message } => write!(f, "RPC error {code}: {message}"),
            RpcError::Remote { code: None, message } => write!(f, "RPC error: {message}"),
        }
    }
}

impl std::error::Error for RpcError {}

/// JSON-RPC 2.0 envelope; the params shape belongs to the endpoint.
pub fn simulate_request_body(call: &ContractCall) -> Value {
    let mut params = json!({
        "contractId": call.contract_id,
        "functionName": call.function_name,
        "args": call.args,
    });
    if let Some(network) = &call.network {
        params["network"] = Value::String(network.clone());
    }
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "simulateTransaction",
        "params": params,
    })
}

fn interpret_response(response: Value) -> Result<Value, RpcError> {
    if let Some(err) = response.get("error").filter(|e| !e.is_null()) {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| err.to_string());
        return Err(RpcError::Remote {
            code: err.get("code").and_then(Value::as_i64),
            message,
        });
    }
    response
        .get("result")
        .cloned()
        .ok_or_else(|| RpcError::Decode("response has neither result nor error".to_string()))
}

/// Simulates by POSTing to the configured RPC endpoint.
pub struct RpcStrategy<'a> {
    log: &'a RunLog,
    endpoint: String,
    agent: ureq::Agent,
}

impl<'a> RpcStrategy<'a> {
    pub fn new(cfg: &AppConfig, log: &'a RunLog) -> Self {
        Self::with_timeout(&cfg.rpc_url, cfg.simulate_timeout(), log)
    }

    pub fn with_timeout(endpoint: &str, timeout: Duration, log: &'a RunLog) -> Self {
        Self {
            log,
            endpoint: endpoint.to_string(),
            agent: ureq::AgentBuilder::new()
                .timeout(timeout)
                .timeout_connect(CONNECT_TIMEOUT.min(timeout))
                .build(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn post(&self, body: &Value) -> Result<Value, RpcError> {
        let response = match self
            .agent
            .post(&self.endpoint)
            .set("Content-Type", "application/json")
            .send_json(body)
        {
            Ok(resp) => resp,
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                return Err(RpcError::Status { code, body });
            }
            Err(ureq::Error::Transport(t)) => return Err(RpcError::Transport(t.to_string())),
        };
        let value: Value = response
            .into_json()
            .map_err(|e| RpcError::Decode(e.to_string()))?;
        interpret_response(value)
    }
}

impl ExecutionStrategy for RpcStrategy<'_> {
    fn name(&self) -> &'static str {
        RPC_STRATEGY
    }

    fn simulate(&self, call: &ContractCall) -> SimulationResult {
        let body = simulate_request_body(call);
        match self.post(&body) {
            Ok(result) => {
                self.log.record(
                    LogEvent::new("rpc.simulated", Level::Info, format!("simulate {}", call.function_name))
                        .data(json!({ "endpoint": self.endpoint })),
                );
                success(RPC_STRATEGY, result, None)
            }
            Err(e) => {
                self.log.record(
                    LogEvent::new("rpc.failed", Level::Warn, e.to_string())
                        .data(json!({ "endpoint": self.endpoint })),
                );
                SimulationResult::failure(RPC_STRATEGY, ErrorKind::Execution, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    const ID: &str = "CDLZFC3SYJYDZT7K67VZ75HPJVIEUVNIXF47ZG2FB2RMQQVU2HHGCYSC";

    fn call() -> ContractCall {
        let mut args = Map::new();
        args.insert("amount".to_string(), json!(5));
        ContractCall {
            contract_id: ID.to_string(),
            function_name: "transfer".to_string(),
            args,
            network: Some("testnet".to_string()),
        }
    }

    /// Serves one canned HTTP response and hands back the request body.
    fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let url = format!("http://{}/", listener.local_addr().expect("addr"));
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            let body_start = loop {
                let n = stream.read(&mut chunk).expect("read");
                if n == 0 {
                    break buf.len();
                }
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };
            let head = String::from_utf8_lossy(&buf[..body_start]).to_lowercase();
            let wanted = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            while buf.len() < body_start + wanted {
                let n = stream.read(&mut chunk).expect("read body");
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            stream.write_all(response.as_bytes()).expect("write");
            String::from_utf8_lossy(&buf[body_start..]).to_string()
        });
        (url, handle)
    }

    #[test]
    fn envelope_is_json_rpc_2() {
        let body = simulate_request_body(&call());
        assert_eq!(body["jsonrpc"], "2.0");
        assert_eq!(body["method"], "simulateTransaction");
        assert_eq!(body["params"]["contractId"], ID);
        assert_eq!(body["params"]["args"]["amount"], 5);
        assert_eq!(body["params"]["network"], "testnet");
    }

    #[test]
    fn result_member_is_success() {
        let (url, server) = serve_once("200 OK", r#"{"jsonrpc":"2.0","id":1,"result":{"cost":42}}"#);
        let log = RunLog::disabled();
        let res = RpcStrategy::with_timeout(&url, Duration::from_secs(5), &log).simulate(&call());
        let sent: Value = serde_json::from_str(&server.join().expect("server")).expect("request json");
        assert_eq!(sent["params"]["functionName"], "transfer");
        assert!(res.success, "{res:?}");
        assert_eq!(res.result, Some(json!({"cost": 42})));
        assert_eq!(res.strategy, RPC_STRATEGY);
    }

    #[test]
    fn error_member_is_failure() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"invalid contract"}}"#,
        );
        let log = RunLog::disabled();
        let res = RpcStrategy::with_timeout(&url, Duration::from_secs(5), &log).simulate(&call());
        server.join().expect("server");
        assert!(!res.success);
        assert_eq!(res.error.as_deref(), Some("RPC error -32602: invalid contract"));
        assert_eq!(res.error_kind, Some(ErrorKind::Execution));
    }

    #[test]
    fn http_status_is_failure() {
        let (url, server) = serve_once("503 Service Unavailable", r#"{"busy":true}"#);
        let log = RunLog::disabled();
        let res = RpcStrategy::with_timeout(&url, Duration::from_secs(5), &log).simulate(&call());
        server.join().expect("server");
        assert!(!res.success);
        assert!(res.error.as_deref().unwrap_or("").contains("HTTP 503"), "{res:?}");
    }

    #[test]
    fn missing_members_is_decode_error() {
        let err = interpret_response(json!({"jsonrpc": "2.0"})).expect_err("decode");
        assert!(matches!(err, RpcError::Decode(_)));
    }
}
