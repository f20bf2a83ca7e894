//! Test fixtures - reusable input files.

/// Two YAML documents of different shapes
pub const TWO_DOCUMENTS_YAML: &str = "name: web\nport: 80\n---\nreplicas: 3\n";

/// A configuration constraining `port`
pub const PORT_SCHEMA: &str = "port: int & >0\nname: string\n";

/// Data that satisfies [`PORT_SCHEMA`]
pub const GOOD_SERVICE_JSON: &str = r#"{"name": "web", "port": 8080}"#;

/// Data whose `port` is a string
pub const BAD_SERVICE_JSON: &str = r#"{"name": "web", "port": "http"}"#;

/// A definition and a regular field
pub const DEFINITION_CUE: &str = "#Service: {\n    name: string\n}\nsvc: #Service & {name: \"web\"}\n";
