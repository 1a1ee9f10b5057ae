use std::io;
use std::net::{TcpListener, TcpStream};
use std::time::Instant;

use pfas_calc_core::{
    resolve_scenario, scenarios, CalcError, Calculator, Catalog, Estimate, Medium, Scenario,
    SiteInput,
};
use pfas_calc_export::{
    compliance_file_name, export_file_name, format_gbp, BreakdownTable, ComplianceTable,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::access::{AccessError, AccessGate};
use crate::config::ServerConfig;
use crate::protocol::{
    JsonRpcRequest, JsonRpcResponse, ACCESS_DENIED, CALCULATION_FAILED, INTERNAL_ERROR,
    INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR,
};
use crate::transport::{
    read_http_request, read_stdio_message, write_http_response, write_stdio_message,
    HttpIncoming, HttpRequest, StdioMessage, MAX_BODY_BYTES,
};

const DEFAULT_MCP_PROTOCOL_VERSION: &str = "2024-11-05";
const NO_SELECTION_WARNING: &str = "Select at least one treatment method to calculate costs.";

pub struct CalcServer {
    catalog: &'static Catalog,
    config: ServerConfig,
    gate: AccessGate,
}

impl CalcServer {
    pub fn new() -> Result<Self, String> {
        Self::with_config(ServerConfig::from_env()?)
    }

    pub fn with_config(config: ServerConfig) -> Result<Self, String> {
        let catalog = Catalog::builtin().map_err(|e| e.to_string())?;
        resolve_scenario(&config.default_scenario).map_err(|e| e.to_string())?;
        let gate = AccessGate::new(config.access_key.clone(), config.session_ttl_ms);
        Ok(Self {
            catalog,
            config,
            gate,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::error(
                request.id.unwrap_or(Value::Null),
                INVALID_REQUEST,
                "invalid jsonrpc version",
            ));
        }

        let is_notification = request.id.is_none();
        let id = request.id.clone().unwrap_or(Value::Null);

        if is_notification && request.method == "notifications/initialized" {
            return None;
        }

        let response = match request.method.as_str() {
            "initialize" => {
                let protocol_version = request
                    .params
                    .get("protocolVersion")
                    .and_then(Value::as_str)
                    .unwrap_or(DEFAULT_MCP_PROTOCOL_VERSION);
                JsonRpcResponse::success(
                    id,
                    json!({
                        "protocolVersion": protocol_version,
                        "serverInfo": {"name": "pfas-calc-mcp", "version": env!("CARGO_PKG_VERSION")},
                        "capabilities": {
                            "tools": {
                                "listChanged": false
                            }
                        },
                        "accessGate": self.gate.is_enabled()
                    }),
                )
            }
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(id, self.tools_list_result()),
            "tools/call" => self.handle_tools_call(id, request.params),
            _ => JsonRpcResponse::error(id, METHOD_NOT_FOUND, "method not found"),
        };

        Some(response)
    }

    fn tools_list_result(&self) -> Value {
        let site_schema = json!({
            "type": "object",
            "required": ["receptor_type"],
            "properties": {
                "water_volume": {"type": ["number", "string"], "minimum": 0},
                "soil_mass": {"type": ["number", "string"], "minimum": 0},
                "influent_concentration": {
                    "type": "object",
                    "additionalProperties": {"type": "number", "minimum": 0}
                },
                "receptor_type": {"type": "string", "enum": ["drinking_water", "environmental"]},
                "water_method": {"type": "string"},
                "soil_method": {"type": "string"}
            }
        });
        let scenario_ids = scenarios().iter().map(|s| s.id).collect::<Vec<_>>();

        json!({
            "tools": [
                {
                    "name": "catalog_list",
                    "description": "List treatment methods with mechanism, unit cost range, efficiency range, readiness and secondary waste.",
                    "inputSchema": {
                        "type": "object",
                        "properties": {
                            "medium": {"type": "string", "enum": ["water", "soil"]}
                        }
                    }
                },
                {
                    "name": "scenario_list",
                    "description": "List scenario presets and the cost index each one selects.",
                    "inputSchema": {"type": "object", "properties": {}}
                },
                {
                    "name": "access_unlock",
                    "description": "Exchange the shared access key for a session id required by estimate tools.",
                    "inputSchema": {
                        "type": "object",
                        "required": ["access_key"],
                        "properties": {"access_key": {"type": "string"}}
                    }
                },
                {
                    "name": "estimate_compute",
                    "description": "Compute remediation costs, residual concentrations and compliance for a site.",
                    "inputSchema": {
                        "type": "object",
                        "required": ["site"],
                        "properties": {
                            "site": site_schema,
                            "scenario": {"type": "string", "enum": scenario_ids},
                            "session_id": {"type": "string"}
                        }
                    }
                },
                {
                    "name": "estimate_export",
                    "description": "Compute an estimate and export the cost breakdown or compliance table as CSV.",
                    "inputSchema": {
                        "type": "object",
                        "required": ["site"],
                        "properties": {
                            "site": site_schema,
                            "scenario": {"type": "string", "enum": scenario_ids},
                            "session_id": {"type": "string"},
                            "site_name": {"type": "string"},
                            "table": {"type": "string", "enum": ["breakdown", "compliance"]},
                            "include_scenario": {"type": "boolean"}
                        }
                    }
                }
            ]
        })
    }

    fn handle_tools_call(&self, id: Value, params: Value) -> JsonRpcResponse {
        let parsed: ToolsCallParams = match serde_json::from_value(params) {
            Ok(v) => v,
            Err(err) => {
                return JsonRpcResponse::error(id, INVALID_PARAMS, format!("invalid params: {err}"));
            }
        };

        let start = Instant::now();
        let response = match parsed.name.as_str() {
            "catalog_list" => self.exec_catalog_list(id, parsed.arguments),
            "scenario_list" => self.exec_scenario_list(id),
            "access_unlock" => self.exec_access_unlock(id, parsed.arguments),
            "estimate_compute" => self.exec_estimate_compute(id, parsed.arguments),
            "estimate_export" => self.exec_estimate_export(id, parsed.arguments),
            _ => JsonRpcResponse::error(id, METHOD_NOT_FOUND, "unknown tool"),
        };
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        match &response.error {
            Some(err) => log::info!(
                "tool {} failed in {elapsed_ms:.2}ms: {}",
                parsed.name,
                err.message
            ),
            None => log::debug!("tool {} ok in {elapsed_ms:.2}ms", parsed.name),
        }
        response
    }

    fn exec_catalog_list(&self, id: Value, arguments: Option<Value>) -> JsonRpcResponse {
        let args: CatalogListInput = match decode_args(arguments) {
            Ok(v) => v,
            Err(message) => return JsonRpcResponse::error(id, INVALID_PARAMS, message),
        };
        let media = match args.medium {
            Some(medium) => vec![medium],
            None => vec![Medium::Water, Medium::Soil],
        };

        let mut methods = Vec::new();
        for medium in media {
            for method in self.catalog.methods(medium) {
                match serde_json::to_value(method) {
                    Ok(v) => methods.push(v),
                    Err(err) => {
                        return JsonRpcResponse::error(
                            id,
                            INTERNAL_ERROR,
                            format!("failed to serialize method {}: {err}", method.id),
                        )
                    }
                }
            }
        }

        JsonRpcResponse::success(
            id,
            json!({
                "content": [{
                    "type": "text",
                    "text": format!("{} treatment methods", methods.len())
                }],
                "structuredContent": {
                    "methods": methods
                }
            }),
        )
    }

    fn exec_scenario_list(&self, id: Value) -> JsonRpcResponse {
        JsonRpcResponse::success(
            id,
            json!({
                "content": [{
                    "type": "text",
                    "text": format!("default scenario: {}", self.config.default_scenario)
                }],
                "structuredContent": {
                    "default": self.config.default_scenario,
                    "scenarios": scenarios()
                        .iter()
                        .map(|s| json!({
                            "id": s.id,
                            "label": s.label,
                            "cost_index": s.cost_index.as_u8()
                        }))
                        .collect::<Vec<_>>()
                }
            }),
        )
    }

    fn exec_access_unlock(&self, id: Value, arguments: Option<Value>) -> JsonRpcResponse {
        let args: AccessUnlockInput = match decode_args(arguments) {
            Ok(v) => v,
            Err(message) => return JsonRpcResponse::error(id, INVALID_PARAMS, message),
        };
        match self.gate.unlock(&args.access_key) {
            Ok(context) => {
                log::info!("access session {} opened", context.session_id);
                JsonRpcResponse::success(
                    id,
                    json!({
                        "content": [{"type": "text", "text": "access granted"}],
                        "structuredContent": {
                            "session_id": context.session_id,
                            "lease_ttl_ms": self.gate.ttl_ms(),
                            "lease_expires_ms": context.lease_expires_ms,
                            "gate_enabled": self.gate.is_enabled()
                        }
                    }),
                )
            }
            Err(err) => {
                log::warn!("access unlock rejected: {err}");
                access_error_response(id, err)
            }
        }
    }

    fn exec_estimate_compute(&self, id: Value, arguments: Option<Value>) -> JsonRpcResponse {
        let args: EstimateComputeInput = match decode_args(arguments) {
            Ok(v) => v,
            Err(message) => return JsonRpcResponse::error(id, INVALID_PARAMS, message),
        };
        if let Err(err) = self.gate.authorize(args.session_id.as_deref()) {
            return access_error_response(id, err);
        }
        let (scenario, estimate) = match self.run_estimate(&args.site, args.scenario.as_deref()) {
            Ok(v) => v,
            Err(err) => return calc_error_response(id, &err),
        };

        let estimate_json = match serde_json::to_value(&estimate) {
            Ok(v) => v,
            Err(err) => {
                return JsonRpcResponse::error(
                    id,
                    INTERNAL_ERROR,
                    format!("failed to serialize estimate: {err}"),
                )
            }
        };
        let warning = (!estimate.has_treatment()).then_some(NO_SELECTION_WARNING);
        let summary = format!(
            "{}: total {}, hazard index {:.3} ({})",
            scenario.label,
            format_gbp(estimate.grand_total),
            estimate.hazard_index,
            estimate.hazard_status.label()
        );

        JsonRpcResponse::success(
            id,
            json!({
                "content": [{"type": "text", "text": summary}],
                "structuredContent": {
                    "scenario": {
                        "id": scenario.id,
                        "label": scenario.label,
                        "cost_index": scenario.cost_index.as_u8()
                    },
                    "estimate": estimate_json,
                    "display": {
                        "water_removal": format_gbp(estimate.water.removal_cost),
                        "water_destruction": format_gbp(estimate.water.destruction_cost),
                        "soil_removal": format_gbp(estimate.soil.removal_cost),
                        "soil_destruction": format_gbp(estimate.soil.destruction_cost),
                        "grand_total": format_gbp(estimate.grand_total)
                    },
                    "has_treatment": estimate.has_treatment(),
                    "all_contaminants_pass": estimate.all_contaminants_pass(),
                    "warning": warning
                }
            }),
        )
    }

    fn exec_estimate_export(&self, id: Value, arguments: Option<Value>) -> JsonRpcResponse {
        let args: EstimateExportInput = match decode_args(arguments) {
            Ok(v) => v,
            Err(message) => return JsonRpcResponse::error(id, INVALID_PARAMS, message),
        };
        if let Err(err) = self.gate.authorize(args.session_id.as_deref()) {
            return access_error_response(id, err);
        }
        let (scenario, estimate) = match self.run_estimate(&args.site, args.scenario.as_deref()) {
            Ok(v) => v,
            Err(err) => return calc_error_response(id, &err),
        };

        let site_name = args.site_name.as_deref().unwrap_or_default();
        let table = args.table.unwrap_or_default();
        let (file_name, csv) = match table {
            ExportTable::Breakdown => {
                let mut breakdown = BreakdownTable::from_estimate(&estimate);
                if args.include_scenario.unwrap_or(false) {
                    breakdown = breakdown.with_scenario(scenario);
                }
                (export_file_name(site_name), breakdown.to_csv())
            }
            ExportTable::Compliance => (
                compliance_file_name(site_name),
                ComplianceTable::from_estimate(&estimate).to_csv(),
            ),
        };
        let csv = match csv {
            Ok(v) => v,
            Err(err) => {
                return JsonRpcResponse::error(id, INTERNAL_ERROR, format!("export failed: {err}"))
            }
        };

        JsonRpcResponse::success(
            id,
            json!({
                "content": [{"type": "text", "text": csv}],
                "structuredContent": {
                    "file_name": file_name,
                    "mime_type": "text/csv",
                    "csv": csv,
                    "scenario": scenario.id
                }
            }),
        )
    }

    fn run_estimate(
        &self,
        site: &SiteInput,
        scenario: Option<&str>,
    ) -> Result<(&'static Scenario, Estimate), CalcError> {
        let scenario = resolve_scenario(scenario.unwrap_or(&self.config.default_scenario))?;
        let estimate = Calculator::new(self.catalog).compute(site, scenario.cost_index)?;
        Ok((scenario, estimate))
    }

    /// Serves JSON-RPC on stdin/stdout until EOF. Each reply uses the framing
    /// of the request it answers.
    pub fn serve_stdio(&self) -> io::Result<()> {
        let mut input = io::stdin().lock();
        let mut output = io::stdout().lock();
        loop {
            let (response, framing) = match read_stdio_message(&mut input)? {
                StdioMessage::Eof => return Ok(()),
                StdioMessage::Rejected(reason, framing) => {
                    log::warn!("stdio frame rejected: {reason}");
                    (
                        Some(JsonRpcResponse::error(Value::Null, PARSE_ERROR, reason)),
                        framing,
                    )
                }
                StdioMessage::Payload(bytes, framing) => (self.handle_payload(&bytes), framing),
            };
            if let Some(response) = response {
                let bytes = serde_json::to_vec(&response)?;
                write_stdio_message(&mut output, &bytes, framing)?;
            }
        }
    }

    /// Serves one request per connection, sequentially.
    pub fn serve_http(&self, addr: &str) -> io::Result<()> {
        let listener = TcpListener::bind(addr)?;
        log::info!("pfas-calcd http listening on {}", listener.local_addr()?);
        for stream in listener.incoming() {
            let result = stream.and_then(|stream| self.handle_http_connection(&stream));
            if let Err(err) = result {
                log::warn!("http connection error: {err}");
            }
        }
        Ok(())
    }

    fn handle_http_connection(&self, stream: &TcpStream) -> io::Result<()> {
        let mut reader = io::BufReader::new(stream);
        let (status, body) = match read_http_request(&mut reader)? {
            HttpIncoming::Closed => return Ok(()),
            HttpIncoming::TooLarge(declared) => {
                log::warn!("http body of {declared} bytes refused");
                (
                    413,
                    Some(json!({
                        "error": "payload_too_large",
                        "message": format!("request body may not exceed {MAX_BODY_BYTES} bytes")
                    })),
                )
            }
            HttpIncoming::Malformed(reason) => (
                400,
                Some(json!({"error": "bad_request", "message": reason})),
            ),
            HttpIncoming::Request(req) => self.route_http(&req),
        };
        let body = match body {
            Some(value) => serde_json::to_vec(&value)?,
            None => Vec::new(),
        };
        let mut writer = stream;
        write_http_response(&mut writer, status, &body)
    }

    fn route_http(&self, req: &HttpRequest) -> (u16, Option<Value>) {
        match (req.method.as_str(), req.path.as_str()) {
            ("GET", "/health") => (
                200,
                Some(json!({
                    "status": "ok",
                    "access_gate": self.gate.is_enabled(),
                    "active_sessions": self.gate.active_sessions()
                })),
            ),
            ("POST", "/mcp") => match serde_json::from_slice::<JsonRpcRequest>(&req.body) {
                Err(err) => (
                    400,
                    response_value(&JsonRpcResponse::error(
                        Value::Null,
                        PARSE_ERROR,
                        format!("parse error: {err}"),
                    )),
                ),
                Ok(rpc) => match self.handle_request(rpc) {
                    Some(response) => (200, response_value(&response)),
                    None => (204, None),
                },
            },
            (_, "/mcp") => (
                405,
                Some(json!({"error": "method_not_allowed", "message": "use POST /mcp"})),
            ),
            _ => (
                404,
                Some(json!({"error": "not_found", "message": "unknown path"})),
            ),
        }
    }

    fn handle_payload(&self, bytes: &[u8]) -> Option<JsonRpcResponse> {
        match serde_json::from_slice::<JsonRpcRequest>(bytes) {
            Ok(request) => self.handle_request(request),
            Err(err) => Some(JsonRpcResponse::error(
                Value::Null,
                PARSE_ERROR,
                format!("parse error: {err}"),
            )),
        }
    }
}

fn response_value(response: &JsonRpcResponse) -> Option<Value> {
    serde_json::to_value(response).ok()
}

/// Missing or null arguments decode as `{}`, so tools without required
/// fields accept a bare call and the rest report the missing field.
fn decode_args<T: DeserializeOwned>(arguments: Option<Value>) -> Result<T, String> {
    let value = match arguments {
        None | Some(Value::Null) => json!({}),
        Some(v) => v,
    };
    serde_json::from_value(value).map_err(|err| format!("invalid tool arguments: {err}"))
}

fn calc_error_response(id: Value, err: &CalcError) -> JsonRpcResponse {
    JsonRpcResponse::error_with_data(
        id,
        CALCULATION_FAILED,
        err.to_string(),
        Some(json!({"kind": err.kind()})),
    )
}

fn access_error_response(id: Value, err: AccessError) -> JsonRpcResponse {
    JsonRpcResponse::error_with_data(
        id,
        ACCESS_DENIED,
        err.to_string(),
        Some(json!({"kind": err.code()})),
    )
}

#[derive(Debug, Deserialize)]
struct ToolsCallParams {
    name: String,
    arguments: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct CatalogListInput {
    medium: Option<Medium>,
}

#[derive(Debug, Deserialize)]
struct AccessUnlockInput {
    access_key: String,
}

#[derive(Debug, Deserialize)]
struct EstimateComputeInput {
    site: SiteInput,
    scenario: Option<String>,
    session_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ExportTable {
    #[default]
    Breakdown,
    Compliance,
}

#[derive(Debug, Deserialize)]
struct EstimateExportInput {
    site: SiteInput,
    scenario: Option<String>,
    session_id: Option<String>,
    site_name: Option<String>,
    table: Option<ExportTable>,
    include_scenario: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_arguments_decode_as_empty_object() {
        let input: CatalogListInput = decode_args(None).expect("empty args");
        assert!(input.medium.is_none());

        let err = decode_args::<AccessUnlockInput>(Some(Value::Null)).unwrap_err();
        assert!(err.contains("access_key"));
    }

    #[test]
    fn calc_errors_carry_their_kind() {
        let err = CalcError::InvalidScenario("worst".to_string());
        let response = calc_error_response(json!(7), &err);
        let error = response.error.expect("error");
        assert_eq!(error.code, CALCULATION_FAILED);
        assert_eq!(error.data, Some(json!({"kind": "invalid_scenario"})));
    }
}
