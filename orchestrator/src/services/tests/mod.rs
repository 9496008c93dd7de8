//! Service-specific tests
//!
//! Each service has its own test file. File-backed services run against a
//! fresh temporary directory, the Bing client against a local mock server.


#[cfg(test)]
pub mod common {
    use std::path::Path;

    /// Write an exported cookie jar holding the given `_U` value
    pub fn write_cookie_file(dir: &Path, name: &str, auth: &str) {
        let jar = serde_json::json!([
            { "name": "MUID", "value": "muid-value", "domain": ".bing.com" },
            { "name": "_U", "value": auth, "domain": ".bing.com" },
        ]);
        std::fs::write(dir.join(name), jar.to_string()).unwrap();
    }
}
